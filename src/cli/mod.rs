//! CLI definitions for brokerlink.

pub mod angel;
pub mod kite;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::auth::callback::{is_loopback_host, DEFAULT_CALLBACK_HOST, DEFAULT_CALLBACK_PORT};
use crate::types::angel::AngelInterval;
use crate::types::{KiteInterval, TickMode};

/// Kite Connect and SmartAPI helper
#[derive(Parser, Debug)]
#[command(name = "brokerlink", version, about = "Kite Connect and SmartAPI session helper")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Zerodha Kite Connect
    Kite(KiteArgs),
    /// Angel One SmartAPI
    Angel(AngelArgs),
}

#[derive(Parser, Debug)]
pub struct KiteArgs {
    #[command(subcommand)]
    pub command: KiteCommands,
}

#[derive(Subcommand, Debug)]
pub enum KiteCommands {
    /// Log in through the browser and save an access token
    Login(LoginArgs),
    /// Exchange an already captured request token
    Exchange(ExchangeArgs),
    /// Show where the access token comes from
    Status,
    /// Invalidate the access token and delete the token file
    Logout,
    /// Print last traded prices
    Ltp(LtpArgs),
    /// Print historical candles for a symbol
    Historical(HistoricalArgs),
    /// Stream live ticks until Ctrl-C
    Ticker(TickerArgs),
}

/// Arguments for `brokerlink kite login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Listener port when the redirect URL has none
    #[arg(long, default_value_t = DEFAULT_CALLBACK_PORT)]
    pub port: u16,

    /// Loopback interface the callback listener binds to
    #[arg(long, default_value = DEFAULT_CALLBACK_HOST, value_parser = parse_loopback_host)]
    pub host: String,

    /// Also write KITE_ACCESS_TOKEN into .env
    #[arg(long)]
    pub write_env: bool,

    /// Print the login URL without opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Seconds to wait for the redirect before asking for manual entry
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
}

/// Arguments for `brokerlink kite exchange`.
#[derive(Parser, Debug)]
pub struct ExchangeArgs {
    /// Request token (defaults to KITE_REQUEST_TOKEN)
    #[arg(long)]
    pub request_token: Option<String>,

    /// Also write KITE_ACCESS_TOKEN into .env
    #[arg(long)]
    pub write_env: bool,
}

#[derive(Parser, Debug)]
pub struct LtpArgs {
    /// Instruments as EXCHANGE:TRADINGSYMBOL
    #[arg(required = true, num_args = 1..)]
    pub instruments: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct HistoricalArgs {
    /// Trading symbol, e.g. INFY
    pub symbol: String,

    #[arg(long, default_value = "NSE")]
    pub exchange: String,

    /// minute, 3minute, 5minute, 10minute, 15minute, 30minute, 60minute or day
    #[arg(long, default_value = "5minute")]
    pub interval: KiteInterval,

    /// How many days back from now
    #[arg(long, default_value_t = 5)]
    pub days: i64,

    #[arg(long)]
    pub continuous: bool,

    /// Include open interest
    #[arg(long)]
    pub oi: bool,

    /// Print at most this many candles
    #[arg(long, default_value_t = 5)]
    pub limit: usize,
}

#[derive(Parser, Debug)]
pub struct TickerArgs {
    /// Trading symbols to subscribe to
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    #[arg(long, default_value = "NSE")]
    pub exchange: String,

    /// ltp, quote or full
    #[arg(long, default_value = "full")]
    pub mode: TickMode,
}

#[derive(Parser, Debug)]
pub struct AngelArgs {
    #[command(subcommand)]
    pub command: AngelCommands,
}

#[derive(Subcommand, Debug)]
pub enum AngelCommands {
    /// Log in with password and TOTP and print the JWT
    Login,
    /// Fetch historical candles
    Candles(CandlesArgs),
    /// Estimate brokerage for orders listed in a JSON file
    Brokerage(BrokerageArgs),
    /// Modify an open order
    ModifyOrder(ModifyOrderArgs),
    /// Search trading symbols
    Search(SearchArgs),
}

#[derive(Parser, Debug)]
pub struct CandlesArgs {
    #[arg(long, default_value = "NSE")]
    pub exchange: String,

    #[arg(long)]
    pub symbol_token: String,

    #[arg(long, default_value = "FIVE_MINUTE")]
    pub interval: AngelInterval,

    /// Start, as "YYYY-MM-DD HH:MM"
    #[arg(long)]
    pub from: String,

    /// End, as "YYYY-MM-DD HH:MM"
    #[arg(long)]
    pub to: String,
}

#[derive(Parser, Debug)]
pub struct BrokerageArgs {
    /// JSON file holding a list of orders, or {"orders": [...]}
    #[arg(long)]
    pub orders: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ModifyOrderArgs {
    #[arg(long)]
    pub order_id: String,

    #[arg(long)]
    pub tradingsymbol: String,

    #[arg(long)]
    pub symbol_token: String,

    #[arg(long)]
    pub price: String,

    #[arg(long)]
    pub quantity: String,

    #[arg(long, default_value = "NSE")]
    pub exchange: String,

    #[arg(long, default_value = "NORMAL")]
    pub variety: String,

    #[arg(long, default_value = "LIMIT")]
    pub order_type: String,

    #[arg(long, default_value = "INTRADAY")]
    pub product_type: String,

    #[arg(long, default_value = "DAY")]
    pub duration: String,
}

#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// Symbol fragment, e.g. SBIN
    pub query: String,

    #[arg(long, default_value = "NSE")]
    pub exchange: String,
}

fn parse_loopback_host(raw: &str) -> Result<String, String> {
    if is_loopback_host(raw) {
        Ok(raw.to_string())
    } else {
        Err(format!("{raw} is not a loopback address"))
    }
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn kite(args: &[&str]) -> KiteCommands {
        let argv = ["brokerlink", "kite"].iter().chain(args).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Kite(kite) => kite.command,
            other => panic!("expected Kite, got {other:?}"),
        }
    }

    fn angel(args: &[&str]) -> AngelCommands {
        let argv = ["brokerlink", "angel"].iter().chain(args).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Angel(angel) => angel.command,
            other => panic!("expected Angel, got {other:?}"),
        }
    }

    #[test]
    fn parse_login_defaults() {
        match kite(&["login"]) {
            KiteCommands::Login(args) => {
                assert_eq!(args.port, 8765);
                assert_eq!(args.host, "127.0.0.1");
                assert!(!args.write_env);
                assert!(!args.no_browser);
                assert_eq!(args.timeout_secs, 300);
            }
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parse_login_with_all_options() {
        match kite(&[
            "login",
            "--port",
            "9000",
            "--host",
            "localhost",
            "--write-env",
            "--no-browser",
            "--timeout-secs",
            "30",
        ]) {
            KiteCommands::Login(args) => {
                assert_eq!(args.port, 9000);
                assert_eq!(args.host, "localhost");
                assert!(args.write_env);
                assert!(args.no_browser);
                assert_eq!(args.timeout_secs, 30);
            }
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parse_login_rejects_public_host() {
        for host in ["0.0.0.0", "192.168.1.5", "example.com"] {
            assert!(
                Cli::try_parse_from(["brokerlink", "kite", "login", "--host", host]).is_err(),
                "{host}"
            );
        }
    }

    #[test]
    fn parse_login_rejects_bad_port() {
        assert!(Cli::try_parse_from(["brokerlink", "kite", "login", "--port", "70000"]).is_err());
    }

    #[test]
    fn parse_exchange_and_status() {
        match kite(&["exchange", "--request-token", "rt", "--write-env"]) {
            KiteCommands::Exchange(args) => {
                assert_eq!(args.request_token.as_deref(), Some("rt"));
                assert!(args.write_env);
            }
            other => panic!("expected Exchange, got {other:?}"),
        }
        assert!(matches!(kite(&["status"]), KiteCommands::Status));
        assert!(matches!(kite(&["logout"]), KiteCommands::Logout));
    }

    #[test]
    fn parse_ltp_requires_instruments() {
        assert!(Cli::try_parse_from(["brokerlink", "kite", "ltp"]).is_err());
        match kite(&["ltp", "NSE:INFY", "NSE:TCS"]) {
            KiteCommands::Ltp(args) => assert_eq!(args.instruments, vec!["NSE:INFY", "NSE:TCS"]),
            other => panic!("expected Ltp, got {other:?}"),
        }
    }

    #[test]
    fn parse_historical_defaults() {
        match kite(&["historical", "INFY", "--oi"]) {
            KiteCommands::Historical(args) => {
                assert_eq!(args.symbol, "INFY");
                assert_eq!(args.exchange, "NSE");
                assert_eq!(args.interval, KiteInterval::FiveMinute);
                assert_eq!(args.days, 5);
                assert!(args.oi);
                assert!(!args.continuous);
                assert_eq!(args.limit, 5);
            }
            other => panic!("expected Historical, got {other:?}"),
        }
    }

    #[test]
    fn parse_ticker_mode() {
        match kite(&["ticker", "INFY", "TCS", "--mode", "quote"]) {
            KiteCommands::Ticker(args) => {
                assert_eq!(args.symbols, vec!["INFY", "TCS"]);
                assert_eq!(args.mode, TickMode::Quote);
            }
            other => panic!("expected Ticker, got {other:?}"),
        }
    }

    #[test]
    fn parse_angel_commands() {
        assert!(matches!(angel(&["login"]), AngelCommands::Login));
        match angel(&["search", "SBIN"]) {
            AngelCommands::Search(args) => {
                assert_eq!(args.query, "SBIN");
                assert_eq!(args.exchange, "NSE");
            }
            other => panic!("expected Search, got {other:?}"),
        }
        match angel(&[
            "candles",
            "--symbol-token",
            "3045",
            "--from",
            "2025-04-02 09:30",
            "--to",
            "2025-04-02 11:00",
        ]) {
            AngelCommands::Candles(args) => {
                assert_eq!(args.interval, AngelInterval::FiveMinute);
                assert_eq!(args.symbol_token, "3045");
            }
            other => panic!("expected Candles, got {other:?}"),
        }
        match angel(&["brokerage", "--orders", "orders.json"]) {
            AngelCommands::Brokerage(args) => assert_eq!(args.orders, PathBuf::from("orders.json")),
            other => panic!("expected Brokerage, got {other:?}"),
        }
    }

    #[test]
    fn parse_modify_order_defaults() {
        match angel(&[
            "modify-order",
            "--order-id",
            "250402000297497",
            "--tradingsymbol",
            "SBIN-EQ",
            "--symbol-token",
            "3045",
            "--price",
            "699",
            "--quantity",
            "2",
        ]) {
            AngelCommands::ModifyOrder(args) => {
                assert_eq!(args.variety, "NORMAL");
                assert_eq!(args.order_type, "LIMIT");
                assert_eq!(args.product_type, "INTRADAY");
                assert_eq!(args.duration, "DAY");
            }
            other => panic!("expected ModifyOrder, got {other:?}"),
        }
    }
}
