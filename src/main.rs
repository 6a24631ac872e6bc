use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use growth_tracker::{api, config::Config, db, jobs, mailer};

#[derive(Parser)]
#[command(name = "growth")]
#[command(about = "Personal growth tracking service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP server
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Apply pending database migrations and exit
    Migrate,
    /// Run a scheduled job once, in-process
    Cron {
        #[command(subcommand)]
        job: CronJob,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum CronJob {
    /// Email reminders for habits not yet logged today
    DailyReminders,
    /// Email the weekly progress summary
    WeeklySummary,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "growth_tracker=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<db::Database> {
    let db = match &config.db_path {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    let db = open_database(&config)?;
    let purged = db.delete_expired_auth_sessions()?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }
    if config.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET_KEY is not set; cron endpoints will reject every call");
    }

    let app = api::create_router_with_state(api::AppState::new(db, config));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Growth tracker listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = Config::from_env();

    match cli.command {
        Some(Commands::Serve { port, host }) => serve(config, &host, port).await?,
        Some(Commands::Migrate) => {
            open_database(&config)?;
            tracing::info!("Database is up to date");
        }
        Some(Commands::Cron { job }) => {
            let db = open_database(&config)?;
            let mailer = mailer::from_config(&config.email);
            let today = chrono::Utc::now().date_naive();
            let report = match job {
                CronJob::DailyReminders => {
                    jobs::send_daily_reminders(&db, mailer.as_ref(), &config.app_url, today).await?
                }
                CronJob::WeeklySummary => {
                    jobs::send_weekly_summaries(&db, mailer.as_ref(), &config.app_url, today).await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => serve(config, "127.0.0.1", 3000).await?,
    }

    Ok(())
}
