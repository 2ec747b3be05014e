use std::str::FromStr;

use anyhow::{Context, Result};
use log::{debug, error, info};
use reqwest::Client;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSendTransactionConfig};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    compute_budget::ComputeBudgetInstruction,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use spl_associated_token_account::get_associated_token_address;

use crate::amm::{self, AmountOut, FixedSide, Slippage, SwapDirection};
use crate::config::{Config, ENV_APE_IN_AMOUNT, SEND_MAX_RETRIES, SOLSCAN_TX_URL, WSOL_MINT};
use crate::error::SwapError;
use crate::pool::{fetch_liquidity_list, require_pool, LiquidityListing, PoolKeys, PoolKeysJson};
use crate::token_account::{
    ensure_ata_instruction, find_token_account, get_owner_token_accounts, select_token_account,
    unwrap_sol_instruction, wrap_sol_instructions, OwnerTokenAccount,
};

/// Всё, что нужно для одного запуска: RPC, HTTP-клиент, кошелёк и настройки.
pub struct SwapContext {
    pub rpc: RpcClient,
    pub http: Client,
    pub payer: Keypair,
    pub config: Config,
}

impl SwapContext {
    pub fn new(config: Config, payer: Keypair) -> Self {
        let rpc = RpcClient::new_with_commitment(
            config.rpc_endpoint.clone(),
            CommitmentConfig::confirmed(),
        );
        Self {
            rpc,
            http: Client::new(),
            payer,
            config,
        }
    }

    fn slippage(&self) -> Slippage {
        Slippage::percent(self.config.slippage_percent)
    }
}

/// Сумма свапа: в человеческих единицах токена или уже в минимальных.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    Ui(String),
    Raw(u64),
}

impl Amount {
    pub fn to_raw(&self, decimals: u8) -> Result<u64, SwapError> {
        match self {
            Amount::Ui(value) => ui_amount_to_raw(value, decimals),
            Amount::Raw(value) => Ok(*value),
        }
    }
}

/// Переводит десятичную строку (`"1.25"`) в минимальные единицы без потери точности.
pub fn ui_amount_to_raw(value: &str, decimals: u8) -> Result<u64, SwapError> {
    let invalid = || SwapError::InvalidAmount(value.to_string());
    let trimmed = value.trim();

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (trimmed, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !all_digits(int_part)
        || !all_digits(frac_part)
    {
        return Err(invalid());
    }
    if frac_part.len() > decimals as usize {
        return Err(invalid());
    }

    let scale = 10u64.checked_pow(decimals as u32).ok_or_else(invalid)?;
    let int_value: u64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };

    let frac_value: u64 = if frac_part.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac_part, width = decimals as usize);
        padded.parse().map_err(|_| invalid())?
    };

    int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(invalid)
}

pub fn explorer_url(signature: &Signature) -> String {
    format!("{}/{}", SOLSCAN_TX_URL, signature)
}

fn wsol_mint() -> Pubkey {
    spl_token::native_mint::id()
}

/// Собирает инструкции свапа для кошелька `owner`.
///
/// SOL на входе оборачивается в WSOL ATA, на выходе принимается в него же;
/// в обоих случаях WSOL ATA закрывается в конце транзакции.
/// Входной SPL-токен берётся из существующего аккаунта,
/// для выходного ATA создаётся при необходимости.
pub fn build_swap_instructions(
    owner: &Pubkey,
    keys: &PoolKeys,
    direction: SwapDirection,
    quote: &AmountOut,
    fixed_side: FixedSide,
    priority_fee_micro_lamports: u64,
    owner_accounts: &[OwnerTokenAccount],
) -> Result<Vec<Instruction>> {
    let wsol = wsol_mint();
    let input_mint = direction.input_mint(keys);
    let output_mint = direction.output_mint(keys);

    let mut instructions = vec![ComputeBudgetInstruction::set_compute_unit_price(
        priority_fee_micro_lamports,
    )];

    let source = if input_mint == wsol {
        instructions.extend(wrap_sol_instructions(owner, quote.amount_in)?);
        get_associated_token_address(owner, &wsol)
    } else {
        select_token_account(owner_accounts, owner, &input_mint)
            .map(|account| account.pubkey)
            .ok_or_else(|| SwapError::TokenAccountNotFound(input_mint.to_string()))?
    };

    let destination = match select_token_account(owner_accounts, owner, &output_mint) {
        Some(account) if output_mint != wsol => account.pubkey,
        _ => {
            instructions.push(ensure_ata_instruction(owner, &output_mint));
            get_associated_token_address(owner, &output_mint)
        }
    };

    let (amount_in, min_amount_out) = (quote.amount_in, quote.min_amount_out);
    instructions.push(match fixed_side {
        FixedSide::In => {
            amm::swap_base_in(keys, &source, &destination, owner, amount_in, min_amount_out)
        }
        FixedSide::Out => {
            amm::swap_base_out(keys, &source, &destination, owner, amount_in, min_amount_out)
        }
    });

    if input_mint == wsol || output_mint == wsol {
        instructions.push(unwrap_sol_instruction(owner)?);
    }

    Ok(instructions)
}

/// Считает котировку и собирает подписанную legacy-транзакцию свапа в `to_token`.
pub async fn get_swap_transaction(
    ctx: &SwapContext,
    to_token: &Pubkey,
    amount: &Amount,
    keys: &PoolKeys,
    fixed_side: FixedSide,
) -> Result<(Transaction, AmountOut)> {
    let owner = ctx.payer.pubkey();
    let direction = SwapDirection::towards(keys, to_token);

    let state = amm::fetch_pool_state(&ctx.rpc, keys).await?;
    let amount_in = amount.to_raw(state.input_decimals(direction))?;
    let quote = amm::compute_amount_out(&state, amount_in, direction, ctx.slippage())?;

    info!(
        "Котировка {} -> {}: in={} out={} min_out={} fee={} \
         цена={:.9} исполнение={:.9} влияние={:.4}%",
        direction.input_mint(keys),
        direction.output_mint(keys),
        quote.amount_in,
        quote.amount_out,
        quote.min_amount_out,
        quote.fee,
        quote.current_price,
        quote.execution_price,
        quote.price_impact
    );

    let owner_accounts = get_owner_token_accounts(&ctx.rpc, &owner).await?;
    let instructions = build_swap_instructions(
        &owner,
        keys,
        direction,
        &quote,
        fixed_side,
        ctx.config.priority_fee_micro_lamports,
        &owner_accounts,
    )?;

    let blockhash = ctx
        .rpc
        .get_latest_blockhash()
        .await
        .context("Не удалось получить blockhash")?;
    let tx =
        Transaction::new_signed_with_payer(&instructions, Some(&owner), &[&ctx.payer], blockhash);
    debug!("Транзакция собрана: {} инструкций", instructions.len());

    Ok((tx, quote))
}

/// Отправляет транзакцию без preflight; переотправкой занимается RPC-нода.
pub async fn send_swap(rpc: &RpcClient, tx: &Transaction) -> Result<Signature> {
    let config = RpcSendTransactionConfig {
        skip_preflight: true,
        max_retries: Some(SEND_MAX_RETRIES),
        ..Default::default()
    };

    let signature = rpc
        .send_transaction_with_config(tx, config)
        .await
        .context("Отправка транзакции не удалась")?;
    Ok(signature)
}

fn parse_mint(value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("Невалидный mint: {}", value))
}

async fn load_pool(ctx: &SwapContext, mint_a: &str, mint_b: &str) -> Result<PoolKeys> {
    let listing = fetch_liquidity_list(&ctx.http, &ctx.config.liquidity_url).await?;
    let pool = require_pool(&listing, mint_a, mint_b)?;
    info!("Пул найден: {}", pool.id);
    PoolKeys::try_from(pool)
}

/// Прямой свап `amount` токена `input_mint` в `output_mint`.
pub async fn swap(
    ctx: &SwapContext,
    input_mint: &str,
    output_mint: &str,
    amount: &str,
) -> Result<Signature> {
    let to_token = parse_mint(output_mint)?;
    let keys = load_pool(ctx, input_mint, output_mint).await?;

    let amount = Amount::Ui(amount.to_string());
    let (tx, _) = get_swap_transaction(ctx, &to_token, &amount, &keys, FixedSide::In).await?;
    send_swap(&ctx.rpc, &tx).await
}

/// Покупка `mint` на `APE_IN_AMOUNT` SOL.
pub async fn ape_in(ctx: &SwapContext, mint: &str) -> Result<Signature> {
    let amount = ctx
        .config
        .ape_in_amount
        .clone()
        .ok_or(SwapError::MissingEnv(ENV_APE_IN_AMOUNT))?;
    let to_token = parse_mint(mint)?;
    let keys = load_pool(ctx, WSOL_MINT, mint).await?;

    let amount = Amount::Ui(amount);
    let (tx, _) = get_swap_transaction(ctx, &to_token, &amount, &keys, FixedSide::In).await?;
    send_swap(&ctx.rpc, &tx).await
}

/// Баланс для `sell-all`: аккаунт с `mint` обязан существовать и быть непустым.
pub fn sell_amount(accounts: &[OwnerTokenAccount], mint: &Pubkey) -> Result<u64, SwapError> {
    let account = find_token_account(accounts, mint)
        .ok_or_else(|| SwapError::TokenAccountNotFound(mint.to_string()))?;
    if account.amount == 0 {
        return Err(SwapError::EmptyBalance(mint.to_string()));
    }
    Ok(account.amount)
}

#[derive(Debug)]
pub struct SellAllPlan<'a> {
    pub pool: &'a PoolKeysJson,
    pub amount: u64,
}

/// Проверки `sell-all` до какой-либо отправки: аккаунт токена и пул токен/SOL.
pub fn plan_sell_all<'a>(
    accounts: &[OwnerTokenAccount],
    listing: &'a LiquidityListing,
    mint: &Pubkey,
) -> Result<SellAllPlan<'a>, SwapError> {
    let amount = sell_amount(accounts, mint)?;
    let pool = require_pool(listing, &mint.to_string(), WSOL_MINT)?;
    Ok(SellAllPlan { pool, amount })
}

/// Продаёт весь баланс `mint` в SOL.
///
/// # Возвращает:
/// - `Ok(Some(signature))` — транзакция отправлена
/// - `Ok(None)` — отправка не удалась, ошибка уже выведена
/// - `Err` — нет аккаунта токена, нет пула или сбой до отправки
pub async fn sell_all(ctx: &SwapContext, mint: &str) -> Result<Option<Signature>> {
    let mint = parse_mint(mint)?;
    let owner_accounts = get_owner_token_accounts(&ctx.rpc, &ctx.payer.pubkey()).await?;

    // до загрузки списка пулов
    sell_amount(&owner_accounts, &mint)?;

    let listing = fetch_liquidity_list(&ctx.http, &ctx.config.liquidity_url).await?;
    let plan = plan_sell_all(&owner_accounts, &listing, &mint)?;
    info!("Продаём {} единиц {} через пул {}", plan.amount, mint, plan.pool.id);

    let keys = PoolKeys::try_from(plan.pool)?;
    let amount = Amount::Raw(plan.amount);
    let (tx, _) = get_swap_transaction(ctx, &wsol_mint(), &amount, &keys, FixedSide::Out).await?;

    match send_swap(&ctx.rpc, &tx).await {
        Ok(signature) => Ok(Some(signature)),
        Err(e) => {
            error!("Failed to swap specified token: {:#}", e);
            eprintln!("Failed to swap specified token: {:#}", e);
            Ok(None)
        }
    }
}

/// Чем закончился запуск режима.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Транзакция отправлена.
    Submitted,
    /// `sell-all` остановился штатно: нечего или некуда продавать, либо отправка не удалась.
    Aborted,
    Failed,
}

impl Outcome {
    /// Итог прямого свапа или `ape-in`: любая ошибка считается сбоем.
    pub fn of_swap(result: &Result<Signature>) -> Self {
        match result {
            Ok(_) => Outcome::Submitted,
            Err(_) => Outcome::Failed,
        }
    }

    /// Итог `sell-all`. Сбоем считаются только ошибки RPC, сети и данных.
    pub fn of_sell_all(result: &Result<Option<Signature>>) -> Self {
        match result {
            Ok(Some(_)) => Outcome::Submitted,
            Ok(None) => Outcome::Aborted,
            Err(e) => match e.downcast_ref::<SwapError>() {
                Some(
                    SwapError::TokenAccountNotFound(_)
                    | SwapError::PoolNotFound { .. }
                    | SwapError::EmptyBalance(_),
                ) => Outcome::Aborted,
                _ => Outcome::Failed,
            },
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Submitted | Outcome::Aborted => 0,
            Outcome::Failed => 1,
        }
    }
}
