use std::process::ExitCode;

use raydium_swap::{
    cli::{self, Mode},
    config::Config,
    keyloader,
    swap::{self, explorer_url, Outcome, SwapContext},
};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mode = match cli::parse_mode(std::env::args_os()) {
        Ok(mode) => mode,
        Err(e) => e.exit(),
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Ошибка конфигурации: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let payer = match keyloader::read_keypair_from_base58_string(&config.private_key) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("Ошибка загрузки ключа: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let ctx = SwapContext::new(config, payer);

    let (result, outcome) = match mode {
        Mode::Swap {
            input_mint,
            output_mint,
            amount,
        } => {
            let result = swap::swap(&ctx, &input_mint, &output_mint, &amount).await;
            let outcome = Outcome::of_swap(&result);
            (result.map(Some), outcome)
        }
        Mode::ApeIn { mint } => {
            let result = swap::ape_in(&ctx, &mint).await;
            let outcome = Outcome::of_swap(&result);
            (result.map(Some), outcome)
        }
        Mode::SellAll { mint } => {
            let result = swap::sell_all(&ctx, &mint).await;
            let outcome = Outcome::of_sell_all(&result);
            (result, outcome)
        }
    };

    match result {
        Ok(Some(signature)) => println!("{}", explorer_url(&signature)),
        Ok(None) => {}
        Err(e) => eprintln!("{:#}", e),
    }

    ExitCode::from(outcome.exit_code())
}
