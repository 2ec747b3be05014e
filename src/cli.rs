use clap::{Parser, Subcommand};

/// Свапы на Raydium AMM v4 с одного кошелька.
///
/// Без подкоманды выполняется прямой свап: `<INPUT_MINT> <OUTPUT_MINT> <AMOUNT>`.
#[derive(Debug, Parser)]
#[command(
    name = "raydium-swap",
    version,
    args_conflicts_with_subcommands = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Mint входного токена
    pub input_mint: Option<String>,

    /// Mint выходного токена
    pub output_mint: Option<String>,

    /// Сумма во входном токене, в человеческих единицах (например `0.5`)
    pub amount: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Продать весь баланс токена в SOL
    #[command(name = "sell-all")]
    SellAll { mint: String },
    /// Купить токен на сумму APE_IN_AMOUNT в SOL
    #[command(name = "ape-in")]
    ApeIn { mint: String },
}

/// Что именно запускать.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    SellAll { mint: String },
    ApeIn { mint: String },
    Swap {
        input_mint: String,
        output_mint: String,
        amount: String,
    },
}

impl Cli {
    pub fn mode(self) -> Result<Mode, clap::Error> {
        match self.command {
            Some(Command::SellAll { mint }) => Ok(Mode::SellAll { mint }),
            Some(Command::ApeIn { mint }) => Ok(Mode::ApeIn { mint }),
            None => match (self.input_mint, self.output_mint, self.amount) {
                (Some(input_mint), Some(output_mint), Some(amount)) => Ok(Mode::Swap {
                    input_mint,
                    output_mint,
                    amount,
                }),
                _ => Err(clap::Error::raw(
                    clap::error::ErrorKind::MissingRequiredArgument,
                    "swap requires <INPUT_MINT> <OUTPUT_MINT> <AMOUNT>\n",
                )),
            },
        }
    }
}

/// Разбирает аргументы и сразу сводит их к `Mode`.
pub fn parse_mode<I, T>(args: I) -> Result<Mode, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)?.mode()
}
