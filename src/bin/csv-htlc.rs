use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use csv_htlc::{serialize, HtlcConfig, HtlcContract, SpendBranch, SATOSHIS_PER_BTC};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "csv-htlc")]
#[command(about = "Two-party hash-locked outputs with a relative lock time")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Contract and spend description (JSON)
    #[arg(long)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the witness script as ASM and hex
    Script,
    /// Print the P2WSH address to fund
    Address,
    /// Build, sign and finalize a spend of the funding coin
    Spend {
        #[arg(long, value_enum)]
        branch: Branch,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Branch {
    Immediate,
    Timelocked,
}

impl From<Branch> for SpendBranch {
    fn from(branch: Branch) -> Self {
        match branch {
            Branch::Immediate => SpendBranch::Immediate,
            Branch::Timelocked => SpendBranch::Timelocked,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "csv_htlc=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let json = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading config {}", cli.config.display()))?;
    let config = HtlcConfig::from_json(&json).context("parsing config")?;

    let contract = HtlcContract::new(config.template().context("contract parameters")?)
        .context("compiling witness script")?;

    match cli.command {
        Commands::Script => {
            println!("{}", contract.witness_script().to_asm());
            println!("{}", contract.witness_script().to_hex());
        }
        Commands::Address => {
            let address = contract
                .address(&config.network_params())
                .context("deriving address")?;
            println!("{}", address);
        }
        Commands::Spend { branch } => spend(&config, &contract, branch.into())?,
    }
    Ok(())
}

fn spend(config: &HtlcConfig, contract: &HtlcContract, branch: SpendBranch) -> Result<()> {
    let preimage = config.preimage_for(branch);
    let destination = config
        .destination_address()
        .context("destination address")?;
    let secret_keys = [
        config.party_a.secret_key().context("party A secret key")?,
        config.party_b.secret_key().context("party B secret key")?,
    ];

    let tx = contract
        .spend(
            config.funding_outpoint().context("funding outpoint")?,
            config.funding.value,
            destination,
            config.destination.value,
            preimage,
            &secret_keys,
        )
        .with_context(|| format!("spending through the {} branch", branch))?;

    tracing::info!(
        fee_btc = tx.fee() as f64 / SATOSHIS_PER_BTC as f64,
        vsize = serialize::vsize(&tx)?,
        "spend ready"
    );
    println!("{}", serialize::to_hex(&tx)?);
    println!("{}", serialize::txid(&tx));
    Ok(())
}
