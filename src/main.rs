use std::{fs, path::Path, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::{postgres::PgPoolOptions, PgPool};

use market_referrals::{
    models::{referrals::ReferralNode, users::UserSummary},
    repositories::{OrderRepository, SettingsRepository, UserRepository, UserStore},
    services::{
        self, referral_tree::ReferralTree, referrals::ReferralRegistry, tokens::TokenIssuer,
        Stores,
    },
    settings::Settings,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations and serve the HTTP API.
    Serve,
    /// Print the referral tree below a user.
    ReferralTree {
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value_t = 3)]
        depth: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let settings = Settings::load(&args.config).expect("Failed to load settings.");

    init_logging(&args.log4rs).expect("Failed to initialize logging.");
    log::info!("Starting marketplace referral service.");

    let conn = PgPoolOptions::new()
        .max_connections(settings.postgres.max_connections)
        .connect(&settings.postgres.url)
        .await
        .expect("Could not connect to database.");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(conn, &settings).await,
        Command::ReferralTree { user_id, depth } => print_tree(conn, &user_id, depth).await,
    }
}

async fn serve(conn: PgPool, settings: &Settings) -> Result<()> {
    sqlx::migrate!("./migrations").run(&conn).await?;
    log::info!("Database migrations applied.");

    let channels = services::start_services(
        Stores {
            users: Arc::new(UserRepository::new(conn.clone())),
            orders: Arc::new(OrderRepository::new(conn.clone())),
            settings: Arc::new(SettingsRepository::new(conn)),
        },
        settings.referrals.default_commission_percent,
    );

    let tokens = TokenIssuer::new(
        &settings.auth.jwt_secret,
        chrono::Duration::hours(settings.auth.token_ttl_hours),
    );

    services::http::start_http_server(channels, tokens, &settings.http.listen).await
}

async fn print_tree(conn: PgPool, user_id: &str, depth: usize) -> Result<()> {
    let users: Arc<dyn UserStore> = Arc::new(UserRepository::new(conn));
    let root = users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found: {user_id}"))?;

    let tree = ReferralTree::new(
        ReferralRegistry::new(users),
        &UserSummary::from(root),
    );
    tree.expand_levels(depth).await?;

    let root = tree.snapshot().await;
    log::info!("Printing {} referral nodes for {}.", root.count(), user_id);
    print_node(&root, 0);

    Ok(())
}

fn print_node(node: &ReferralNode, indent: usize) {
    println!(
        "{:indent$}{} ({}) [{:?}]",
        "",
        node.name,
        node.referral_code,
        node.state,
        indent = indent * 2
    );
    for child in &node.children {
        print_node(child, indent + 1);
    }
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
