//! brokerlink CLI binary entry point.

use brokerlink::cli::{angel, kite, AngelCommands, Cli, Commands, KiteCommands};
use brokerlink::config::BrokerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse_args();
    let config = BrokerConfig::from_env();

    let result = match &cli.command {
        Commands::Kite(args) => match &args.command {
            KiteCommands::Login(args) => kite::handle_login(&config, args).await,
            KiteCommands::Exchange(args) => kite::handle_exchange(&config, args).await,
            KiteCommands::Status => kite::handle_status(&config).await,
            KiteCommands::Logout => kite::handle_logout(&config).await,
            KiteCommands::Ltp(args) => kite::handle_ltp(&config, args).await,
            KiteCommands::Historical(args) => kite::handle_historical(&config, args).await,
            KiteCommands::Ticker(args) => kite::handle_ticker(&config, args).await,
        },
        Commands::Angel(args) => match &args.command {
            AngelCommands::Login => angel::handle_login(&config).await,
            AngelCommands::Candles(args) => angel::handle_candles(&config, args).await,
            AngelCommands::Brokerage(args) => angel::handle_brokerage(&config, args).await,
            AngelCommands::ModifyOrder(args) => angel::handle_modify_order(&config, args).await,
            AngelCommands::Search(args) => angel::handle_search(&config, args).await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
