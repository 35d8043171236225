use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tracing::{info, warn};

use overseer_shop::{config, db, stripe, web};

/// Payment service for the Overseer Discord bot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the listen port from SHOP_PORT
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Skip running database migrations at startup
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    let mut config = config::AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let tiers: Vec<&String> = config.prices.keys().collect();
    info!("Configured tiers: {:?}", tiers);

    info!("Connecting to PostgreSQL...");
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if args.skip_migrations {
        warn!("--skip-migrations: assuming the schema is already in place");
    } else {
        info!("Running database migrations...");
        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let stripe = stripe::StripeClient::new(&config.stripe_secret_key, &config.api_base);

    let state = web::AppState {
        config,
        stripe,
        pool,
    };

    info!("Starting shop server...");
    web::start_web_server(state).await
}
