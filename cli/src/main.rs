use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::path::{Path, PathBuf};

use gridmart_exchange::FeeQuote;
use gridmart_genesis::{GenesisBuilder, GenesisConfig};
use gridmart_loyalty::TierTable;
use gridmart_primitives::{Address, Amount, Points};
use gridmart_runtime::{Marketplace, Operation};

/// Gridmart energy marketplace CLI
#[derive(Parser)]
#[command(name = "gridmart", version, about = "Gridmart energy marketplace command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new Ed25519 keypair and print its market address
    Keygen {
        /// Output file for the secret key
        #[arg(short, long, default_value = "participant.key")]
        output: PathBuf,
    },

    /// Genesis configuration commands
    Genesis {
        #[command(subcommand)]
        command: GenesisCommands,
    },

    /// Quote the commission for a sale
    Fee {
        /// Listing price
        #[arg(long)]
        price: Amount,

        /// Seller's loyalty points
        #[arg(long, default_value = "0")]
        points: Points,

        /// Genesis file providing the tiers and base rate (devnet if omitted)
        #[arg(long)]
        genesis: Option<PathBuf>,
    },

    /// Apply a JSON list of operations to a market started from genesis
    Simulate {
        /// Genesis file (JSON or TOML)
        #[arg(long)]
        genesis: PathBuf,

        /// JSON file containing an array of operations
        #[arg(long)]
        ops: PathBuf,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum GenesisCommands {
    /// Generate a devnet genesis file
    Init {
        /// Market identifier
        #[arg(long)]
        market_id: String,

        /// Output path for the genesis file (.json or .toml)
        #[arg(long, default_value = "genesis.json")]
        output: PathBuf,
    },

    /// Validate and summarize a genesis file
    Show {
        /// Path to the genesis file
        #[arg(long)]
        genesis: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { output } => cmd_keygen(output),
        Commands::Genesis { command } => match command {
            GenesisCommands::Init { market_id, output } => cmd_genesis_init(&market_id, output),
            GenesisCommands::Show { genesis } => cmd_genesis_show(&genesis),
        },
        Commands::Fee {
            price,
            points,
            genesis,
        } => cmd_fee(price, points, genesis.as_deref()),
        Commands::Simulate { genesis, ops } => cmd_simulate(&genesis, &ops),
        Commands::Version => cmd_version(),
    }
}

fn load_genesis(path: &Path) -> GenesisConfig {
    let config = GenesisConfig::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error reading genesis file: {e}");
        std::process::exit(1);
    });
    config.validate().unwrap_or_else(|e| {
        eprintln!("Genesis validation failed: {e}");
        std::process::exit(1);
    });
    config
}

fn cmd_keygen(output: PathBuf) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let address = Address::from_verifying_key(&signing_key.verifying_key());
    let secret_hex = hex::encode(signing_key.to_bytes());

    std::fs::write(&output, &secret_hex).unwrap_or_else(|e| {
        eprintln!("Error writing key file: {e}");
        std::process::exit(1);
    });

    println!("Generated new Ed25519 keypair");
    println!("  Address: {address}");
    println!("  Secret key saved to: {}", output.display());
}

fn cmd_genesis_init(market_id: &str, output: PathBuf) {
    let devnet = GenesisConfig::default_devnet();
    let mut builder = GenesisBuilder::new(market_id, devnet.params.owner, devnet.params.exchange)
        .with_genesis_time(devnet.genesis_time)
        .with_commission_rate(devnet.params.commission_rate)
        .with_points_divisor(devnet.params.points_divisor);
    for tier in &devnet.tiers {
        builder = builder.with_tier(tier.threshold, tier.discount);
    }
    for account in &devnet.accounts {
        builder = builder.with_account(account.address, account.energy);
    }
    let config = builder.build().unwrap_or_else(|e| {
        eprintln!("Error building genesis: {e}");
        std::process::exit(1);
    });

    config.to_file(&output).unwrap_or_else(|e| {
        eprintln!("Error writing genesis file: {e}");
        std::process::exit(1);
    });

    println!("Genesis file created: {}", output.display());
    println!("  Market ID: {}", config.market_id);
    println!("  Tiers: {}", config.tiers.len());
    println!("  Accounts: {}", config.accounts.len());
    println!("  Genesis hash: {}", hex::encode(config.genesis_hash));
}

fn cmd_genesis_show(path: &Path) {
    let config = load_genesis(path);
    let params = &config.params;

    println!("Genesis: {}", path.display());
    println!("  Market ID: {}", config.market_id);
    println!("  Genesis time: {}", config.genesis_time);
    println!("  Owner: {}", params.owner);
    println!("  Exchange: {}", params.exchange);
    println!("  Commission rate: {}", params.commission_rate);
    println!("  Points divisor: {}", params.points_divisor);
    println!("  Tiers:");
    for (i, tier) in config.tiers.iter().enumerate() {
        println!("    [{i}] >= {} points: {}% off", tier.threshold, tier.discount);
    }
    println!("  Authorized callers: {}", config.authorized_callers.len());
    println!("  Accounts: {}", config.accounts.len());
    println!(
        "  Total energy: {}",
        config.total_energy().unwrap_or_default()
    );
    println!("  Genesis hash: {}", hex::encode(config.genesis_hash));
}

fn cmd_fee(price: Amount, points: Points, genesis: Option<&Path>) {
    let config = match genesis {
        Some(path) => load_genesis(path),
        None => GenesisConfig::default_devnet(),
    };
    let tiers: TierTable = config.tier_table();
    let discount = tiers.discount_for(points);
    let rate = tiers.commission_rate(points, config.params.commission_rate);
    let quote = FeeQuote::new(price, rate);

    println!("Commission Quote");
    println!("  Price: {}", quote.price);
    println!("  Seller points: {points}");
    println!("  Tier discount: {discount}%");
    println!("  Effective rate: {} (x{} precision)", quote.rate, gridmart_primitives::PRECISION);
    println!("  Fee: {}", quote.fee);
    println!("  Seller proceeds: {}", quote.proceeds);
}

fn cmd_simulate(genesis: &Path, ops_path: &Path) {
    let config = load_genesis(genesis);
    let raw = std::fs::read_to_string(ops_path).unwrap_or_else(|e| {
        eprintln!("Error reading operations file: {e}");
        std::process::exit(1);
    });
    let ops: Vec<Operation> = serde_json::from_str(&raw).unwrap_or_else(|e| {
        eprintln!("Invalid operations file: {e}");
        std::process::exit(1);
    });

    let mut market = Marketplace::from_genesis(&config).unwrap_or_else(|e| {
        eprintln!("Error initializing market: {e}");
        std::process::exit(1);
    });
    let from = market.log().next_seq();
    let receipts = market.apply_batch(ops);

    let failed = receipts.iter().filter(|r| !r.success).count();
    tracing::info!(operations = receipts.len(), failed, "simulation finished");

    let output = serde_json::json!({
        "receipts": receipts,
        "notifications": market.log().since(from),
        "supply": market.supply(),
        "state_root": hex::encode(market.state_root()),
    });
    let rendered = serde_json::to_string_pretty(&output).unwrap_or_else(|e| {
        eprintln!("Error rendering output: {e}");
        std::process::exit(1);
    });
    println!("{rendered}");
}

fn cmd_version() {
    println!(
        "gridmart {} (Gridmart energy marketplace CLI)",
        env!("CARGO_PKG_VERSION")
    );
}
