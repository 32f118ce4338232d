use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use barangay_api::auth::{hash_password, issue_token, Claims};
use barangay_api::config::AppConfig;
use barangay_api::database::Database;
use barangay_api::state::AppState;
use barangay_api::types::Role;

#[derive(Parser)]
#[command(name = "barangay-api")]
#[command(about = "Barangay records management API server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve,

    #[command(about = "Mint a bearer token without a login round trip")]
    Token {
        #[arg(long)]
        user_id: i64,
        #[arg(long, default_value = "admin")]
        role: String,
        #[arg(long, default_value = "operator")]
        username: String,
    },

    #[command(about = "Print an argon2 hash suitable for users.password_hash")]
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Token { user_id, role, username } => {
            let claims = Claims::new(user_id, username, &Role::parse(&role), config.security.jwt_expiry_hours);
            println!("{}", issue_token(&config.security, &claims)?);
            Ok(())
        }
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Barangay API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let db = Database::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    if config.database.run_migrations {
        db.migrate().await.context("failed to run migrations")?;
        tracing::info!("Migrations applied");
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app = barangay_api::app(AppState::new(db, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Barangay API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
