use anyhow::Context;
use clap::Parser;
use formwatch::base::error::WatchError;
use formwatch::config::{load_account, load_time_table};
use formwatch::schedule::runner::{Scheduler, DEFAULT_MAX_ATTEMPTS};
use formwatch::snapshot::{JsonSnapshotWriter, LogNotifier};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "formwatch", about = "Scheduled report-portal watcher")]
struct Args {
    /// Attempts per scheduled run before giving up on the slot.
    #[arg(short = 'c', long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Account file path.
    #[arg(short = 'a', long, default_value = "config/account.json")]
    account: PathBuf,

    /// Time table file path.
    #[arg(short = 't', long, default_value = "config/timeTable.json")]
    time_table: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();
    info!("starting up");

    // SIGHUP cancels the current cycle and reloads config; SIGINT/SIGTERM
    // cancel and exit. Each cycle gets a fresh token and listener.
    let exit = Arc::new(AtomicBool::new(false));
    loop {
        let cancel = CancellationToken::new();
        spawn_signal_listener(cancel.clone(), exit.clone());

        let account = load_account(&args.account)
            .with_context(|| format!("loading account from {}", args.account.display()))?;
        let table = load_time_table(&args.time_table)
            .with_context(|| format!("loading time table from {}", args.time_table.display()))?;

        let sink = Box::new(JsonSnapshotWriter::new(account.file.clone()));
        let scheduler = Scheduler::new(account, table, args.max_attempts, sink, Box::new(LogNotifier));

        match scheduler.run(cancel.clone()).await {
            Ok(()) | Err(WatchError::Cancelled) => {}
            Err(err) => {
                cancel.cancel();
                return Err(err.into());
            }
        }
        if exit.load(Ordering::SeqCst) {
            break;
        }
        info!("reloading configuration");
    }

    info!("exit");
    Ok(())
}

fn spawn_signal_listener(cancel: CancellationToken, exit: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let (mut interrupt, mut terminate, mut hangup) = match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(i), Ok(t), Ok(h)) => (i, t, h),
            _ => {
                error!("signal listener unavailable");
                return;
            }
        };
        tokio::select! {
            _ = interrupt.recv() => exit.store(true, Ordering::SeqCst),
            _ = terminate.recv() => exit.store(true, Ordering::SeqCst),
            _ = hangup.recv() => info!("reload requested"),
        }
        cancel.cancel();
    });
}
