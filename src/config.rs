use std::path::PathBuf;

use log::warn;

use crate::error::SwapError;

/// Mint обёрнутого SOL, базовая валюта для `ape-in` и `sell-all`.
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Публичный список пулов Raydium (official + unOfficial).
pub const RAYDIUM_LIQUIDITY_URL: &str = "https://api.raydium.io/v2/sdk/liquidity/mainnet.json";

pub const SOLSCAN_TX_URL: &str = "https://solscan.io/tx";

pub const DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS: u64 = 1_500_000;
pub const DEFAULT_SLIPPAGE_PERCENT: u64 = 5;

/// Сколько раз RPC-нода сама переотправляет транзакцию.
pub const SEND_MAX_RETRIES: usize = 20;

pub const ENV_RPC_ENDPOINT: &str = "RPC_ENDPOINT";
pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";
pub const ENV_APE_IN_AMOUNT: &str = "APE_IN_AMOUNT";
pub const ENV_PRIORITY_FEE: &str = "PRIORITY_FEE_MICRO_LAMPORTS";
pub const ENV_SLIPPAGE: &str = "SLIPPAGE_PERCENT";
pub const ENV_LIQUIDITY_URL: &str = "LIQUIDITY_URL";

/// Настройки процесса, собранные из окружения.
#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_endpoint: String,
    pub private_key: String,
    pub ape_in_amount: Option<String>,
    pub priority_fee_micro_lamports: u64,
    pub slippage_percent: u64,
    pub liquidity_url: String,
}

impl Config {
    /// Подгружает `.env` (если есть) и читает переменные процесса.
    pub fn from_env() -> Result<Self, SwapError> {
        if let Some(warning) = dotenv_warning(dotenvy::dotenv()) {
            warn!("{}", warning);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Та же логика поверх произвольного источника значений.
    ///
    /// Пустая строка считается отсутствующим значением.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SwapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rpc_endpoint = get(ENV_RPC_ENDPOINT).ok_or(SwapError::MissingEnv(ENV_RPC_ENDPOINT))?;
        let private_key = get(ENV_PRIVATE_KEY).ok_or(SwapError::MissingEnv(ENV_PRIVATE_KEY))?;

        let priority_fee_micro_lamports = match get(ENV_PRIORITY_FEE) {
            Some(raw) => parse_u64(ENV_PRIORITY_FEE, &raw)?,
            None => DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS,
        };

        let slippage_percent = match get(ENV_SLIPPAGE) {
            Some(raw) => {
                let value = parse_u64(ENV_SLIPPAGE, &raw)?;
                if value >= 100 {
                    return Err(SwapError::InvalidConfig {
                        key: ENV_SLIPPAGE,
                        reason: format!("{} должно быть меньше 100", value),
                    });
                }
                value
            }
            None => DEFAULT_SLIPPAGE_PERCENT,
        };

        Ok(Self {
            rpc_endpoint,
            private_key,
            ape_in_amount: get(ENV_APE_IN_AMOUNT).map(|v| v.trim().to_string()),
            priority_fee_micro_lamports,
            slippage_percent,
            liquidity_url: get(ENV_LIQUIDITY_URL)
                .unwrap_or_else(|| RAYDIUM_LIQUIDITY_URL.to_string()),
        })
    }
}

/// Отсутствие `.env` нормально, битый или нечитаемый файл стоит показать.
fn dotenv_warning(result: Result<PathBuf, dotenvy::Error>) -> Option<String> {
    match result {
        Ok(_) => None,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => Some(format!("Не удалось загрузить .env: {}", e)),
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, SwapError> {
    raw.trim().parse::<u64>().map_err(|e| SwapError::InvalidConfig {
        key,
        reason: e.to_string(),
    })
}
