//! Raydium AMM v4: состояние пула, расчёт котировки и инструкции свапа.

use anyhow::{Context, Result};
use log::debug;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_program::program_pack::Pack;
use solana_sdk::{
    account::Account,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use spl_token::state::Account as TokenAccount;

use crate::error::SwapError;
use crate::pool::PoolKeys;

/// Размер аккаунта `AmmInfo`.
pub const AMM_INFO_LEN: usize = 752;

// Смещения полей внутри AmmInfo (16 u64 параметров, затем Fees, затем StateData).
const COIN_DECIMALS_OFFSET: usize = 32;
const PC_DECIMALS_OFFSET: usize = 40;
const SWAP_FEE_NUMERATOR_OFFSET: usize = 176;
const SWAP_FEE_DENOMINATOR_OFFSET: usize = 184;
const NEED_TAKE_PNL_COIN_OFFSET: usize = 192;
const NEED_TAKE_PNL_PC_OFFSET: usize = 200;

const SWAP_BASE_IN_TAG: u8 = 9;
const SWAP_BASE_OUT_TAG: u8 = 11;

/// Направление свапа относительно пары пула.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    BaseToQuote,
    QuoteToBase,
}

impl SwapDirection {
    /// `BaseToQuote`, если получаем quote-токен пула.
    pub fn towards(keys: &PoolKeys, to_token: &Pubkey) -> Self {
        if keys.quote_mint == *to_token {
            SwapDirection::BaseToQuote
        } else {
            SwapDirection::QuoteToBase
        }
    }

    pub fn input_mint(self, keys: &PoolKeys) -> Pubkey {
        match self {
            SwapDirection::BaseToQuote => keys.base_mint,
            SwapDirection::QuoteToBase => keys.quote_mint,
        }
    }

    pub fn output_mint(self, keys: &PoolKeys) -> Pubkey {
        match self {
            SwapDirection::BaseToQuote => keys.quote_mint,
            SwapDirection::QuoteToBase => keys.base_mint,
        }
    }
}

/// Какая сторона свапа фиксирована.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedSide {
    /// Точный вход, минимальный выход.
    In,
    /// Точный выход, максимальный вход.
    Out,
}

/// Допуск проскальзывания как дробь.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slippage {
    pub numerator: u64,
    pub denominator: u64,
}

impl Slippage {
    pub fn percent(value: u64) -> Self {
        Self {
            numerator: value,
            denominator: 100,
        }
    }
}

/// Резервы и параметры пула на момент чтения.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub base_reserve: u64,
    pub quote_reserve: u64,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub swap_fee_numerator: u64,
    pub swap_fee_denominator: u64,
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, SwapError> {
    data.get(offset..offset + 8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| SwapError::InvalidAccountData(format!("нет u64 по смещению {}", offset)))
}

fn decimals(value: u64) -> Result<u8, SwapError> {
    u8::try_from(value).map_err(|_| SwapError::InvalidAccountData(format!("decimals = {}", value)))
}

impl PoolState {
    /// Собирает состояние из сырых данных AmmInfo и двух хранилищ пула.
    ///
    /// Резерв = баланс хранилища минус `need_take_pnl` соответствующей стороны.
    pub fn from_accounts(
        amm_data: &[u8],
        base_vault_data: &[u8],
        quote_vault_data: &[u8],
    ) -> Result<Self, SwapError> {
        if amm_data.len() < AMM_INFO_LEN {
            return Err(SwapError::InvalidAccountData(format!(
                "AmmInfo длиной {} байт, ожидается {}",
                amm_data.len(),
                AMM_INFO_LEN
            )));
        }

        let base_vault = TokenAccount::unpack(base_vault_data)
            .map_err(|e| SwapError::InvalidAccountData(format!("base vault: {}", e)))?;
        let quote_vault = TokenAccount::unpack(quote_vault_data)
            .map_err(|e| SwapError::InvalidAccountData(format!("quote vault: {}", e)))?;

        let need_take_pnl_coin = read_u64(amm_data, NEED_TAKE_PNL_COIN_OFFSET)?;
        let need_take_pnl_pc = read_u64(amm_data, NEED_TAKE_PNL_PC_OFFSET)?;

        Ok(Self {
            base_reserve: base_vault.amount.saturating_sub(need_take_pnl_coin),
            quote_reserve: quote_vault.amount.saturating_sub(need_take_pnl_pc),
            base_decimals: decimals(read_u64(amm_data, COIN_DECIMALS_OFFSET)?)?,
            quote_decimals: decimals(read_u64(amm_data, PC_DECIMALS_OFFSET)?)?,
            swap_fee_numerator: read_u64(amm_data, SWAP_FEE_NUMERATOR_OFFSET)?,
            swap_fee_denominator: read_u64(amm_data, SWAP_FEE_DENOMINATOR_OFFSET)?,
        })
    }

    pub fn input_decimals(&self, direction: SwapDirection) -> u8 {
        match direction {
            SwapDirection::BaseToQuote => self.base_decimals,
            SwapDirection::QuoteToBase => self.quote_decimals,
        }
    }

    fn output_decimals(&self, direction: SwapDirection) -> u8 {
        match direction {
            SwapDirection::BaseToQuote => self.quote_decimals,
            SwapDirection::QuoteToBase => self.base_decimals,
        }
    }

    fn reserves(&self, direction: SwapDirection) -> (u64, u64) {
        match direction {
            SwapDirection::BaseToQuote => (self.base_reserve, self.quote_reserve),
            SwapDirection::QuoteToBase => (self.quote_reserve, self.base_reserve),
        }
    }
}

fn account_data<'a>(
    accounts: &'a [Option<Account>],
    index: usize,
    name: &str,
    pool: &Pubkey,
) -> Result<&'a [u8]> {
    accounts
        .get(index)
        .and_then(Option::as_ref)
        .map(|account| account.data.as_slice())
        .with_context(|| format!("Аккаунт {} пула {} не найден", name, pool))
}

/// Читает AmmInfo и оба хранилища одним `getMultipleAccounts`.
pub async fn fetch_pool_state(rpc: &RpcClient, keys: &PoolKeys) -> Result<PoolState> {
    let accounts = rpc
        .get_multiple_accounts(&[keys.id, keys.base_vault, keys.quote_vault])
        .await
        .context("Не удалось прочитать аккаунты пула")?;

    let state = PoolState::from_accounts(
        account_data(&accounts, 0, "amm", &keys.id)?,
        account_data(&accounts, 1, "baseVault", &keys.id)?,
        account_data(&accounts, 2, "quoteVault", &keys.id)?,
    )?;
    debug!(
        "Пул {}: base_reserve={} quote_reserve={} fee={}/{}",
        keys.id,
        state.base_reserve,
        state.quote_reserve,
        state.swap_fee_numerator,
        state.swap_fee_denominator
    );
    Ok(state)
}

/// Ожидаемый результат свапа.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountOut {
    pub amount_in: u64,
    pub amount_out: u64,
    pub min_amount_out: u64,
    pub fee: u64,
    /// Цена выходного токена во входном до свапа, в человеческих единицах.
    pub current_price: f64,
    pub execution_price: f64,
    /// В процентах.
    pub price_impact: f64,
}

fn ui(amount: u128, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

/// Котировка constant product с комиссией пула и проскальзыванием.
pub fn compute_amount_out(
    state: &PoolState,
    amount_in: u64,
    direction: SwapDirection,
    slippage: Slippage,
) -> Result<AmountOut, SwapError> {
    if amount_in == 0 {
        return Err(SwapError::InvalidAmount("amount_in = 0".to_string()));
    }
    if state.swap_fee_denominator == 0 {
        return Err(SwapError::InvalidAccountData("swap_fee_denominator = 0".to_string()));
    }

    let (reserve_in, reserve_out) = state.reserves(direction);
    if reserve_in == 0 || reserve_out == 0 {
        return Err(SwapError::EmptyPool);
    }

    let amount_in_raw = amount_in as u128;
    let fee = amount_in_raw * state.swap_fee_numerator as u128 / state.swap_fee_denominator as u128;
    let amount_in_with_fee = amount_in_raw - fee.min(amount_in_raw);

    let reserve_in = reserve_in as u128;
    let reserve_out = reserve_out as u128;
    let amount_out = reserve_out * amount_in_with_fee / (reserve_in + amount_in_with_fee);

    let min_amount_out = amount_out * slippage.denominator as u128
        / (slippage.denominator as u128 + slippage.numerator as u128);

    let in_decimals = state.input_decimals(direction);
    let out_decimals = state.output_decimals(direction);

    let current_price = ui(reserve_out, out_decimals) / ui(reserve_in, in_decimals);
    let execution_price = if amount_in_with_fee == 0 {
        0.0
    } else {
        ui(amount_out, out_decimals) / ui(amount_in_with_fee, in_decimals)
    };
    let price_impact = ((current_price - execution_price).abs() / current_price) * 100.0;

    // amount_out < reserve_out <= u64::MAX
    Ok(AmountOut {
        amount_in,
        amount_out: amount_out as u64,
        min_amount_out: min_amount_out as u64,
        fee: fee as u64,
        current_price,
        execution_price,
        price_impact,
    })
}

/// Данные инструкции свапа AMM v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapInstructionData {
    BaseIn { amount_in: u64, minimum_amount_out: u64 },
    BaseOut { max_amount_in: u64, amount_out: u64 },
}

impl SwapInstructionData {
    pub fn pack(&self) -> Vec<u8> {
        let (tag, first, second) = match *self {
            SwapInstructionData::BaseIn {
                amount_in,
                minimum_amount_out,
            } => (SWAP_BASE_IN_TAG, amount_in, minimum_amount_out),
            SwapInstructionData::BaseOut {
                max_amount_in,
                amount_out,
            } => (SWAP_BASE_OUT_TAG, max_amount_in, amount_out),
        };

        let mut buf = Vec::with_capacity(17);
        buf.push(tag);
        buf.extend_from_slice(&first.to_le_bytes());
        buf.extend_from_slice(&second.to_le_bytes());
        buf
    }
}

fn swap_accounts(
    keys: &PoolKeys,
    user_source: &Pubkey,
    user_destination: &Pubkey,
    owner: &Pubkey,
) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new(keys.id, false),
        AccountMeta::new_readonly(keys.authority, false),
        AccountMeta::new(keys.open_orders, false),
        AccountMeta::new(keys.target_orders, false),
        AccountMeta::new(keys.base_vault, false),
        AccountMeta::new(keys.quote_vault, false),
        AccountMeta::new_readonly(keys.market_program_id, false),
        AccountMeta::new(keys.market_id, false),
        AccountMeta::new(keys.market_bids, false),
        AccountMeta::new(keys.market_asks, false),
        AccountMeta::new(keys.market_event_queue, false),
        AccountMeta::new(keys.market_base_vault, false),
        AccountMeta::new(keys.market_quote_vault, false),
        AccountMeta::new_readonly(keys.market_authority, false),
        AccountMeta::new(*user_source, false),
        AccountMeta::new(*user_destination, false),
        AccountMeta::new_readonly(*owner, true),
    ]
}

/// `swap_base_in`: отдаём ровно `amount_in`, получаем не меньше `minimum_amount_out`.
pub fn swap_base_in(
    keys: &PoolKeys,
    user_source: &Pubkey,
    user_destination: &Pubkey,
    owner: &Pubkey,
    amount_in: u64,
    minimum_amount_out: u64,
) -> Instruction {
    Instruction {
        program_id: keys.program_id,
        accounts: swap_accounts(keys, user_source, user_destination, owner),
        data: SwapInstructionData::BaseIn {
            amount_in,
            minimum_amount_out,
        }
        .pack(),
    }
}

/// `swap_base_out`: получаем ровно `amount_out`, отдаём не больше `max_amount_in`.
pub fn swap_base_out(
    keys: &PoolKeys,
    user_source: &Pubkey,
    user_destination: &Pubkey,
    owner: &Pubkey,
    max_amount_in: u64,
    amount_out: u64,
) -> Instruction {
    Instruction {
        program_id: keys.program_id,
        accounts: swap_accounts(keys, user_source, user_destination, owner),
        data: SwapInstructionData::BaseOut {
            max_amount_in,
            amount_out,
        }
        .pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::program_option::COption;
    use spl_token::state::AccountState;

    fn state(base_reserve: u64, quote_reserve: u64) -> PoolState {
        PoolState {
            base_reserve,
            quote_reserve,
            base_decimals: 6,
            quote_decimals: 9,
            swap_fee_numerator: 25,
            swap_fee_denominator: 10_000,
        }
    }

    fn keys() -> PoolKeys {
        PoolKeys {
            id: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            base_decimals: 6,
            quote_decimals: 9,
            version: 4,
            program_id: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            market_version: 4,
            market_program_id: Pubkey::new_unique(),
            market_id: Pubkey::new_unique(),
            market_authority: Pubkey::new_unique(),
            market_base_vault: Pubkey::new_unique(),
            market_quote_vault: Pubkey::new_unique(),
            market_bids: Pubkey::new_unique(),
            market_asks: Pubkey::new_unique(),
            market_event_queue: Pubkey::new_unique(),
        }
    }

    fn vault(amount: u64) -> Vec<u8> {
        let account = TokenAccount {
            mint: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            amount,
            delegate: COption::None,
            state: AccountState::Initialized,
            is_native: COption::None,
            delegated_amount: 0,
            close_authority: COption::None,
        };
        let mut buf = vec![0u8; TokenAccount::LEN];
        TokenAccount::pack(account, &mut buf).unwrap();
        buf
    }

    fn amm_info(need_take_pnl_coin: u64, need_take_pnl_pc: u64) -> Vec<u8> {
        let mut data = vec![0u8; AMM_INFO_LEN];
        let mut put = |offset: usize, value: u64| {
            data[offset..offset + 8].copy_from_slice(&value.to_le_bytes())
        };
        put(COIN_DECIMALS_OFFSET, 6);
        put(PC_DECIMALS_OFFSET, 9);
        put(SWAP_FEE_NUMERATOR_OFFSET, 25);
        put(SWAP_FEE_DENOMINATOR_OFFSET, 10_000);
        put(NEED_TAKE_PNL_COIN_OFFSET, need_take_pnl_coin);
        put(NEED_TAKE_PNL_PC_OFFSET, need_take_pnl_pc);
        data
    }

    #[test]
    fn pool_state_subtracts_pending_pnl() {
        let parsed =
            PoolState::from_accounts(&amm_info(100, 7), &vault(1_000_100), &vault(2_000_007))
                .unwrap();
        assert_eq!(parsed, state(1_000_000, 2_000_000));
    }

    #[test]
    fn pool_state_rejects_truncated_amm_info() {
        let err = PoolState::from_accounts(&[0u8; 200], &vault(1), &vault(1)).unwrap_err();
        assert!(matches!(err, SwapError::InvalidAccountData(_)));
    }

    #[test]
    fn pool_state_rejects_garbage_vault() {
        let err = PoolState::from_accounts(&amm_info(0, 0), &[1u8; 10], &vault(1)).unwrap_err();
        assert!(matches!(err, SwapError::InvalidAccountData(_)));
    }

    #[test]
    fn quote_applies_fee_and_slippage() {
        let quote = compute_amount_out(
            &state(1_000_000_000, 1_000_000_000),
            1_000_000,
            SwapDirection::BaseToQuote,
            Slippage::percent(5),
        )
        .unwrap();

        // fee = 1_000_000 * 25 / 10_000
        assert_eq!(quote.fee, 2_500);
        // 1e9 * 997_500 / (1e9 + 997_500)
        assert_eq!(quote.amount_out, 996_505);
        // 996_505 * 100 / 105
        assert_eq!(quote.min_amount_out, 949_052);
        assert!(quote.min_amount_out < quote.amount_out);
        assert!(quote.price_impact > 0.0 && quote.price_impact < 1.0);
    }

    #[test]
    fn quote_direction_swaps_reserves() {
        let pool = state(500_000, 4_000_000_000);
        let exact = Slippage::percent(0);
        let to_quote =
            compute_amount_out(&pool, 1_000, SwapDirection::BaseToQuote, exact).unwrap();
        let to_base = compute_amount_out(&pool, 1_000, SwapDirection::QuoteToBase, exact).unwrap();

        assert!(to_quote.amount_out > to_base.amount_out);
        assert_eq!(to_quote.amount_out, to_quote.min_amount_out);
    }

    #[test]
    fn quote_rejects_empty_pool_and_zero_input() {
        let slippage = Slippage::percent(5);
        let err = compute_amount_out(&state(0, 10), 10, SwapDirection::BaseToQuote, slippage)
            .unwrap_err();
        assert!(matches!(err, SwapError::EmptyPool));

        let err = compute_amount_out(&state(10, 10), 0, SwapDirection::BaseToQuote, slippage)
            .unwrap_err();
        assert!(matches!(err, SwapError::InvalidAmount(_)));
    }

    #[test]
    fn direction_follows_output_token() {
        let keys = keys();
        assert_eq!(SwapDirection::towards(&keys, &keys.quote_mint), SwapDirection::BaseToQuote);
        assert_eq!(SwapDirection::towards(&keys, &keys.base_mint), SwapDirection::QuoteToBase);
        assert_eq!(SwapDirection::QuoteToBase.input_mint(&keys), keys.quote_mint);
        assert_eq!(SwapDirection::QuoteToBase.output_mint(&keys), keys.base_mint);
    }

    #[test]
    fn swap_base_in_layout() {
        let keys = keys();
        let (source, destination, owner) =
            (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let ix = swap_base_in(&keys, &source, &destination, &owner, 1_000, 900);

        assert_eq!(ix.program_id, keys.program_id);
        assert_eq!(ix.data[0], 9);
        assert_eq!(&ix.data[1..9], &1_000u64.to_le_bytes());
        assert_eq!(&ix.data[9..17], &900u64.to_le_bytes());
        assert_eq!(ix.accounts.len(), 18);
        assert_eq!(ix.accounts[0].pubkey, spl_token::id());
        assert_eq!(ix.accounts[4].pubkey, keys.target_orders);
        assert_eq!(ix.accounts[15].pubkey, source);
        assert_eq!(ix.accounts[16].pubkey, destination);

        let signers: Vec<_> = ix.accounts.iter().filter(|meta| meta.is_signer).collect();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].pubkey, owner);
    }

    #[test]
    fn swap_base_out_uses_its_own_tag() {
        let keys = keys();
        let user = Pubkey::new_unique();
        let ix = swap_base_out(&keys, &user, &user, &user, 5_000, 42);

        assert_eq!(ix.data.len(), 17);
        assert_eq!(ix.data[0], 11);
        assert_eq!(&ix.data[1..9], &5_000u64.to_le_bytes());
        assert_eq!(&ix.data[9..17], &42u64.to_le_bytes());
    }
}
