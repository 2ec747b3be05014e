use std::str::FromStr;

use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

use crate::error::SwapError;

/// Одна запись пула из `liquidity/mainnet.json`.
///
/// Адреса хранятся строками: подбор пула идёт простым сравнением строк,
/// в `Pubkey` они переводятся только для выбранного пула.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolKeysJson {
    pub id: String,
    pub base_mint: String,
    pub quote_mint: String,
    pub lp_mint: String,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub lp_decimals: u8,
    pub version: u8,
    pub program_id: String,
    pub authority: String,
    pub open_orders: String,
    pub target_orders: String,
    pub base_vault: String,
    pub quote_vault: String,
    pub withdraw_queue: String,
    pub lp_vault: String,
    pub market_version: u8,
    pub market_program_id: String,
    pub market_id: String,
    pub market_authority: String,
    pub market_base_vault: String,
    pub market_quote_vault: String,
    pub market_bids: String,
    pub market_asks: String,
    pub market_event_queue: String,
    #[serde(default)]
    pub lookup_table_account: Option<String>,
}

impl PoolKeysJson {
    pub fn matches_pair(&self, mint_a: &str, mint_b: &str) -> bool {
        (self.base_mint == mint_a && self.quote_mint == mint_b)
            || (self.base_mint == mint_b && self.quote_mint == mint_a)
    }
}

/// Ответ эндпоинта со списком пулов. Любой из списков может отсутствовать.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityListing {
    #[serde(default)]
    pub official: Option<Vec<PoolKeysJson>>,
    #[serde(default)]
    pub un_official: Option<Vec<PoolKeysJson>>,
}

impl LiquidityListing {
    /// Сначала official, затем unOfficial.
    pub fn pools(&self) -> impl Iterator<Item = &PoolKeysJson> {
        self.official
            .iter()
            .flatten()
            .chain(self.un_official.iter().flatten())
    }

    pub fn len(&self) -> usize {
        self.official.as_ref().map_or(0, Vec::len) + self.un_official.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Скачивает список пулов Raydium одним HTTP GET.
///
/// # Возвращает:
/// - `Ok(LiquidityListing)` при статусе 2xx и валидном JSON
/// - `Err` при сетевой ошибке, не-2xx ответе или битом JSON
pub async fn fetch_liquidity_list(client: &Client, url: &str) -> Result<LiquidityListing> {
    info!("Загружаем список пулов: {}", url);

    let res = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Запрос списка пулов {} не удался", url))?;

    let res = res
        .error_for_status()
        .with_context(|| format!("Эндпоинт {} вернул ошибку", url))?;

    let listing: LiquidityListing = res
        .json()
        .await
        .context("Невалидный JSON списка пулов")?;

    debug!("Получено пулов: {}", listing.len());
    Ok(listing)
}

/// Первый пул, чья пара (base, quote) совпадает с (a, b) в любом порядке.
pub fn find_pool<'a>(
    listing: &'a LiquidityListing,
    mint_a: &str,
    mint_b: &str,
) -> Option<&'a PoolKeysJson> {
    listing.pools().find(|pool| pool.matches_pair(mint_a, mint_b))
}

/// Как `find_pool`, но отсутствие пула — ошибка `PoolNotFound`.
pub fn require_pool<'a>(
    listing: &'a LiquidityListing,
    mint_a: &str,
    mint_b: &str,
) -> Result<&'a PoolKeysJson, SwapError> {
    find_pool(listing, mint_a, mint_b).ok_or_else(|| SwapError::PoolNotFound {
        mint_a: mint_a.to_string(),
        mint_b: mint_b.to_string(),
    })
}

/// Ключи пула AMM v4, готовые для инструкций.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolKeys {
    pub id: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub version: u8,
    pub program_id: Pubkey,
    pub authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub market_version: u8,
    pub market_program_id: Pubkey,
    pub market_id: Pubkey,
    pub market_authority: Pubkey,
    pub market_base_vault: Pubkey,
    pub market_quote_vault: Pubkey,
    pub market_bids: Pubkey,
    pub market_asks: Pubkey,
    pub market_event_queue: Pubkey,
}

fn parse_key(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("Невалидный адрес в поле {}: {}", field, value))
}

impl TryFrom<&PoolKeysJson> for PoolKeys {
    type Error = anyhow::Error;

    fn try_from(json: &PoolKeysJson) -> Result<Self> {
        Ok(Self {
            id: parse_key("id", &json.id)?,
            base_mint: parse_key("baseMint", &json.base_mint)?,
            quote_mint: parse_key("quoteMint", &json.quote_mint)?,
            lp_mint: parse_key("lpMint", &json.lp_mint)?,
            base_decimals: json.base_decimals,
            quote_decimals: json.quote_decimals,
            version: json.version,
            program_id: parse_key("programId", &json.program_id)?,
            authority: parse_key("authority", &json.authority)?,
            open_orders: parse_key("openOrders", &json.open_orders)?,
            target_orders: parse_key("targetOrders", &json.target_orders)?,
            base_vault: parse_key("baseVault", &json.base_vault)?,
            quote_vault: parse_key("quoteVault", &json.quote_vault)?,
            market_version: json.market_version,
            market_program_id: parse_key("marketProgramId", &json.market_program_id)?,
            market_id: parse_key("marketId", &json.market_id)?,
            market_authority: parse_key("marketAuthority", &json.market_authority)?,
            market_base_vault: parse_key("marketBaseVault", &json.market_base_vault)?,
            market_quote_vault: parse_key("marketQuoteVault", &json.market_quote_vault)?,
            market_bids: parse_key("marketBids", &json.market_bids)?,
            market_asks: parse_key("marketAsks", &json.market_asks)?,
            market_event_queue: parse_key("marketEventQueue", &json.market_event_queue)?,
        })
    }
}
