use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use log::debug;
use serde_json::Value;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_request::TokenAccountsFilter};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use spl_token::instruction::{close_account, sync_native};

/// Токен-аккаунт кошелька в SPL Token программе.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerTokenAccount {
    pub pubkey: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
}

/// Разбирает `jsonParsed` представление токен-аккаунта.
fn parse_token_account(pubkey: &str, data: &Value) -> Result<OwnerTokenAccount> {
    let info = data
        .get("parsed")
        .and_then(|parsed| parsed.get("info"))
        .ok_or_else(|| anyhow!("Аккаунт {} без parsed.info", pubkey))?;

    let mint = info
        .get("mint")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Аккаунт {} без mint", pubkey))?;

    let amount = info
        .get("tokenAmount")
        .and_then(|amount| amount.get("amount"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Аккаунт {} без tokenAmount.amount", pubkey))?;

    Ok(OwnerTokenAccount {
        pubkey: Pubkey::from_str(pubkey)
            .with_context(|| format!("Невалидный адрес аккаунта {}", pubkey))?,
        mint: Pubkey::from_str(mint).with_context(|| format!("Невалидный mint {}", mint))?,
        amount: amount
            .parse()
            .with_context(|| format!("Невалидный баланс {} у {}", amount, pubkey))?,
    })
}

/// Все токен-аккаунты владельца в SPL Token программе.
pub async fn get_owner_token_accounts(
    rpc: &RpcClient,
    owner: &Pubkey,
) -> Result<Vec<OwnerTokenAccount>> {
    let keyed = rpc
        .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(spl_token::id()))
        .await
        .context("get_token_accounts_by_owner")?;

    let mut accounts = Vec::with_capacity(keyed.len());
    for item in keyed {
        let data = serde_json::to_value(&item.account.data).context("serialize ui account data")?;
        accounts.push(parse_token_account(&item.pubkey, &data)?);
    }

    debug!("У {} токен-аккаунтов: {}", owner, accounts.len());
    Ok(accounts)
}

/// Первый аккаунт, держащий `mint`.
pub fn find_token_account<'a>(
    accounts: &'a [OwnerTokenAccount],
    mint: &Pubkey,
) -> Option<&'a OwnerTokenAccount> {
    accounts.iter().find(|account| account.mint == *mint)
}

/// Аккаунт кошелька для `mint`: ATA, если он есть среди аккаунтов, иначе первый найденный.
pub fn select_token_account<'a>(
    accounts: &'a [OwnerTokenAccount],
    owner: &Pubkey,
    mint: &Pubkey,
) -> Option<&'a OwnerTokenAccount> {
    let ata = get_associated_token_address(owner, mint);
    accounts
        .iter()
        .find(|account| account.pubkey == ata)
        .or_else(|| find_token_account(accounts, mint))
}

/// Создание ATA, если его ещё нет.
pub fn ensure_ata_instruction(owner: &Pubkey, mint: &Pubkey) -> Instruction {
    create_associated_token_account_idempotent(owner, owner, mint, &spl_token::id())
}

/// Оборачивает `lamports` SOL в WSOL ATA владельца.
pub fn wrap_sol_instructions(owner: &Pubkey, lamports: u64) -> Result<Vec<Instruction>> {
    let wsol_mint = spl_token::native_mint::id();
    let wsol_account = get_associated_token_address(owner, &wsol_mint);

    Ok(vec![
        ensure_ata_instruction(owner, &wsol_mint),
        system_instruction::transfer(owner, &wsol_account, lamports),
        sync_native(&spl_token::id(), &wsol_account)?,
    ])
}

/// Закрывает WSOL ATA, весь баланс возвращается владельцу в SOL.
pub fn unwrap_sol_instruction(owner: &Pubkey) -> Result<Instruction> {
    let wsol_account = get_associated_token_address(owner, &spl_token::native_mint::id());
    Ok(close_account(&spl_token::id(), &wsol_account, owner, owner, &[])?)
}
