use clap::{Parser, ValueEnum};
use icp_lookup::server::envelope::LookupResponse;
use icp_lookup::utils::{logger, validation::Validate};
use icp_lookup::{AppConfig, LookupQuery};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    /// 以企業名稱查域名
    Entity,
    /// 以域名查企業
    Domain,
}

#[derive(Parser)]
#[command(name = "icp_query")]
#[command(about = "Run a single ICP filing lookup and print the JSON envelope")]
struct Args {
    /// Entity name or domain to look up
    word: String,

    /// Query kind
    #[arg(short, long, value_enum, default_value = "entity")]
    kind: Kind,

    /// Path to TOML configuration file
    #[arg(short, long, default_value = "icp-lookup.toml")]
    config: String,

    /// Ask for historical (superseded) filings
    #[arg(long)]
    history: bool,

    /// Refresh from providers even when the cache is fresh
    #[arg(long)]
    force: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    let config = match AppConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("❌ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    let query = match args.kind {
        Kind::Entity => LookupQuery::by_entity(&args.word),
        Kind::Domain => LookupQuery::by_domain(&args.word),
    }
    .with_history(args.history)
    .with_force(args.force);

    let service = config.build_service().await?;
    let response = match service.lookup(&query).await {
        Ok(outcome) => LookupResponse::success(&outcome),
        Err(e) => LookupResponse::failure(&e),
    };

    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.status != 0 {
        std::process::exit(response.status);
    }
    Ok(())
}
