//! Creates or updates a dashboard user. There is no public sign-up, so this is
//! how accounts come into existence.

use clap::Parser;
use db::DBService;
use services::services::auth::AuthService;
use tracing_subscriber::EnvFilter;
use utils_jwt::JwtManager;

#[derive(Debug, Parser)]
#[command(name = "seed-user", about = "Create or update a VibeWeb OS user")]
struct Args {
    /// Login e-mail; an existing user with this e-mail is overwritten.
    #[arg(long)]
    email: String,

    #[arg(long)]
    username: Option<String>,

    /// Display name shown in the activity feed.
    #[arg(long)]
    name: String,

    #[arg(long, env = "SEED_USER_PASSWORD", hide_env_values = true)]
    password: String,

    /// Defaults to the asset directory database.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let db = match args.database_url.as_deref() {
        Some(url) => DBService::connect(url).await?,
        None => DBService::new().await?,
    };

    // Tokens are never issued here; the manager only satisfies the service.
    let jwt = JwtManager::new("seed-user", chrono::Duration::hours(1))?;
    let auth = AuthService::new(db.pool, jwt)?;
    let user = auth
        .provision(
            &args.email,
            args.username.as_deref(),
            &args.name,
            &args.password,
        )
        .await?;

    tracing::info!(user_id = user.id, email = %user.email, "User provisioned");
    Ok(())
}
