use chrono::Utc;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use sorteio_engine::application::capacity::CapacityResolver;
use sorteio_engine::application::engine::ResolutionEngine;
use sorteio_engine::application::reminder::ReminderFlow;
use sorteio_engine::application::runner::TransactionalRunner;
use sorteio_engine::config::Settings;
use sorteio_engine::domain::ports::{
    EligibilityIndexBox, NotifierBox, NumberSourceBox, RoundStoreBox,
};
use sorteio_engine::infrastructure::lotomania::LotomaniaSource;
use sorteio_engine::infrastructure::postgres::{PgConfigTable, PgStore};
use sorteio_engine::infrastructure::smtp::{LogNotifier, SmtpNotifier};
use sorteio_engine::interfaces::email::TemplateContext;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Raffle draw resolution and notification jobs", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve pending raffle rounds against the latest official number.
    Resolve,
    /// Notify participants of tonight's draw (read-only).
    Remind,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Resolve => run_resolution(&cli.settings).await,
        Command::Remind => run_reminder(&cli.settings).await,
    }
}

fn notifier_for(settings: &Settings) -> Result<NotifierBox> {
    // The commit flag gates transport independently of storage: dry runs
    // only ever log their intents.
    Ok(if settings.commit {
        Box::new(SmtpNotifier::new(settings).into_diagnostic()?)
    } else {
        Box::new(LogNotifier::new(TemplateContext::from_settings(settings)))
    })
}

async fn run_resolution(settings: &Settings) -> Result<()> {
    info!(commit = settings.commit, "resolution run starting");
    let store = PgStore::connect(settings).await.into_diagnostic()?;

    let rounds: RoundStoreBox = Box::new(store.clone());
    let eligibility: EligibilityIndexBox = Box::new(store.clone());
    let numbers: NumberSourceBox = Box::new(
        LotomaniaSource::new(settings.lotomania_endpoint.clone()).into_diagnostic()?,
    );
    let capacity = CapacityResolver::new(vec![
        Box::new(PgConfigTable::new(store.clone(), "settings")),
        Box::new(PgConfigTable::new(store.clone(), "app_config")),
    ]);

    let engine = ResolutionEngine::new(rounds, eligibility, numbers, capacity, notifier_for(settings)?);
    let runner = TransactionalRunner::new(Box::new(store), settings.commit);
    let summary = runner.execute(&engine, Utc::now()).await.into_diagnostic()?;
    info!(
        evaluated = summary.evaluated,
        finalized = summary.finalized,
        recovered = summary.recovered,
        skipped = summary.skipped,
        notifications = summary.notifications,
        "resolution run finished"
    );
    Ok(())
}

async fn run_reminder(settings: &Settings) -> Result<()> {
    info!(commit = settings.commit, "reminder run starting");

    // Fuse: a dry run in production is almost always an accident; require the
    // explicit override before doing anything, even connecting.
    if settings.environment.eq_ignore_ascii_case("production")
        && !settings.commit
        && !settings.allow_prod_dryrun
    {
        info!("fuse: aborted (dry run in production without --allow-prod-dryrun)");
        return Ok(());
    }

    let store = PgStore::connect_read_only(settings).await.into_diagnostic()?;
    let flow = ReminderFlow::new(
        Box::new(store.clone()),
        Box::new(store),
        notifier_for(settings)?,
        settings.fallback_recipient().map(str::to_string),
    );
    let summary = flow.run().await.into_diagnostic()?;
    info!(notified = summary.notified, "reminder run finished");
    Ok(())
}
