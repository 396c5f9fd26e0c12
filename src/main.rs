use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use qonto_watcher::{
    config::{Config, WatchOverrides},
    notify::Notifier,
    qonto::Client,
    watch::Watcher,
};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line tool for the Qonto banking API.
///
/// Credentials and defaults come from `QONTO_*` environment variables,
/// optionally loaded from a `.env` file.
#[derive(Parser)]
#[command(name = "qonto", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Display an organization and its bank accounts
    Organization {
        /// Organization name, defaults to the login
        name: Option<String>,
    },
    /// Watch an account and log, email or call a webhook on each new transaction
    Watch(WatchArgs),
}

#[derive(Args)]
struct WatchArgs {
    /// Slug of the account to watch
    #[arg(short, long)]
    slug: Option<String>,

    /// IBAN of the account to watch
    #[arg(short, long)]
    iban: Option<String>,

    /// Only report these statuses (pending, reversed, declined, completed)
    #[arg(long, value_delimiter = ',')]
    statuses: Vec<String>,

    /// Send an email to this address for each new transaction
    #[arg(short, long)]
    email: Option<String>,

    /// POST each new transaction as JSON to this URL
    #[arg(short, long)]
    webhook: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    format!("{}=debug,qonto_watcher=debug", env!("CARGO_CRATE_NAME")).into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::new().context("error loading config")?;

    match cli.command {
        Command::Organization { name } => organization(&config, name).await,
        Command::Watch(args) => watch(&config, args).await,
    }
}

async fn organization(config: &Config, name: Option<String>) -> anyhow::Result<()> {
    let client = Client::new(&config.api).context("error creating client")?;
    let name = name.unwrap_or_else(|| config.api.login.clone());

    let organization = client
        .get_organization(&name)
        .await
        .context("unable to get organization")?;

    print!("{organization}");

    Ok(())
}

async fn watch(config: &Config, args: WatchArgs) -> anyhow::Result<()> {
    let watch_config = config
        .watch(WatchOverrides {
            slug: args.slug,
            iban: args.iban,
            statuses: args.statuses,
            email_to: args.email,
            webhook: args.webhook,
        })
        .context("invalid watch config")?;

    let client = Client::new(&config.api).context("error creating client")?;
    let notifier = Notifier::from_config(&watch_config).context("error creating notifier")?;

    let stats = Watcher::new(client, &watch_config, notifier)
        .run(shutdown_signal())
        .await;

    info!(
        dispatched = stats.dispatched,
        email_sent = stats.email_sent,
        email_failed = stats.email_failed,
        webhook_sent = stats.webhook_sent,
        webhook_failed = stats.webhook_failed,
        "watcher stopped"
    );

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("error installing ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("error installing signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
