use thiserror::Error;

/// Ошибки предметной области свапа.
///
/// Всё остальное (сеть, RPC, разбор JSON) проходит как `anyhow::Error` с контекстом.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("No liquidity pool found for {mint_a} / {mint_b}")]
    PoolNotFound { mint_a: String, mint_b: String },

    #[error("Specified token account not found in wallet: {0}")]
    TokenAccountNotFound(String),

    #[error("Token account for {0} has zero balance")]
    EmptyBalance(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Pool has empty reserves")]
    EmptyPool,

    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),
}
