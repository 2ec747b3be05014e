pub mod amm;
pub mod cli;
pub mod config;
pub mod error;
pub mod keyloader;
pub mod pool;
pub mod swap;
pub mod token_account;
