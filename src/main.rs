use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Use library instead of local modules
use wallet_screener::{
    screen_wallet, telemetry, wallet_history, Address, Blockmate, ChainVerification, Config,
    SqliteLedger,
};

/// Screen wallet addresses for risk categories from the command line.
#[derive(Parser)]
#[command(name = "wallet-screener", version)]
struct Cli {
    /// PATH to TOML configuration file
    #[arg(long, env = "WALLET_SCREENER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the provider for categories and record them in the ledger
    Screen { address: String },

    /// Print every recorded category with its revision
    History {
        address: String,

        /// Write CSV to stdout instead of a table
        #[arg(long)]
        csv: bool,
    },

    /// Re-compute the ledger hash chain for an address
    Verify { address: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    telemetry::init_tracing(&config.log)?;

    match cli.command {
        Command::Screen { address } => run_screen(&config, &address).await,
        Command::History { address, csv } => run_history(&config, &address, csv).await,
        Command::Verify { address } => run_verify(&config, &address).await,
    }
}

fn open_ledger(config: &Config) -> Result<SqliteLedger> {
    SqliteLedger::open(&config.ledger.path)
        .with_context(|| format!("unable to open ledger at {}", config.ledger.path.display()))
}

async fn run_screen(config: &Config, address: &str) -> Result<()> {
    let address = Address::parse(address)?;
    config.validate()?;

    let provider = Blockmate::new(&config.provider.blockmate)
        .context("unable to construct Blockmate risk provider")?;
    let ledger = open_ledger(config)?;

    println!("🔎 Screening {}...", address);
    let categories = screen_wallet(&provider, &ledger, &address).await?;

    if categories.is_empty() {
        println!("✓ No risk categories found");
    } else {
        println!("⚠️  {} risk categories:", categories.len());
        for category in &categories {
            println!("   - {}", category);
        }
    }

    Ok(())
}

async fn run_history(config: &Config, address: &str, csv: bool) -> Result<()> {
    let address = Address::parse(address)?;
    let ledger = open_ledger(config)?;

    let history = wallet_history(&ledger, &address).await?;

    if csv {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        for entry in &history {
            writer.serialize(entry).context("failed to write CSV row")?;
        }
        writer.flush()?;
        return Ok(());
    }

    println!("📜 History for {}", address);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if history.is_empty() {
        println!("(no screenings recorded)");
    }
    for entry in &history {
        println!("{:>6}  {}", entry.revision, entry.category);
    }

    Ok(())
}

async fn run_verify(config: &Config, address: &str) -> Result<()> {
    let address = Address::parse(address)?;
    let ledger = open_ledger(config)?;

    match ledger.verify_chain(&address).await? {
        ChainVerification::Intact { entries } => {
            println!("✅ Hash chain intact: {} entries", entries);
            Ok(())
        }
        ChainVerification::Broken { revision } => {
            anyhow::bail!("hash chain broken at revision {revision}")
        }
    }
}
