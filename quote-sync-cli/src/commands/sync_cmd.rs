//! Sync CLI commands for exchanging quotes with the remote collection.

use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use tokio::sync::broadcast::error::RecvError;

use quote_sync_core::{
    check_server, Conflict, EngineError, Resolution, SyncEngine, SyncError, SyncEvent, SyncReport,
    SyncState, ValidationError,
};

use crate::config::Config;

/// How often `sync watch` re-probes the server
const PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Sync with the remote collection
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Resolve every pending conflict this way (keep-local, use-remote, remove)
    #[arg(long, value_name = "CHOICE")]
    resolve: Option<Resolution>,

    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Clone, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration, state and server status
    Status,

    /// Deliver queued changes without a full sync
    Push,

    /// Keep syncing on a timer until interrupted
    Watch {
        /// Seconds between syncs (10 to 300)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Turn the remembered auto-sync schedule on or off
    Auto {
        state: Toggle,

        /// Seconds between syncs (10 to 300)
        #[arg(long)]
        interval: Option<u64>,
    },
}

impl SyncCommand {
    pub async fn run(&self, engine: &SyncEngine, config: &Config) -> Result<(), SyncCommandError> {
        match &self.command {
            None => self.sync(engine).await,
            Some(SyncSubcommand::Status) => self.status(engine, config).await,
            Some(SyncSubcommand::Push) => self.push(engine).await,
            Some(SyncSubcommand::Watch { interval }) => {
                self.watch(engine, config, interval_ms(*interval, config)).await
            }
            Some(SyncSubcommand::Auto { state, interval }) => {
                match state {
                    Toggle::On => {
                        let ms = interval_ms(*interval, config);
                        engine.enable_auto_sync(ms)?;
                        println!("Auto-sync enabled every {} s", ms / 1000);
                        println!("Conflicts will now be resolved automatically (remote wins).");
                    }
                    Toggle::Off => {
                        engine.disable_auto_sync();
                        println!("Auto-sync disabled");
                    }
                }
                Ok(())
            }
        }
    }

    async fn sync(&self, engine: &SyncEngine) -> Result<(), SyncCommandError> {
        println!("Syncing with server...");
        println!();

        let report = engine.run_cycle().await?;
        print_report(&report);

        let pending = engine.pending_conflicts();
        if pending.is_empty() {
            return Ok(());
        }

        let Some(choice) = self.resolve else {
            println!();
            println!("Conflicts needing resolution:");
            print_conflicts(&pending);
            println!();
            println!("Re-run with --resolve keep-local|use-remote|remove to settle them.");
            return Ok(());
        };

        // A resolved conflict leaves the list, so the next one slides into `index`
        let mut index = 0;
        for conflict in &pending {
            match engine.resolve_conflict(index, choice).await {
                Ok(()) => println!("  ✓ {} -> {}", conflict, choice),
                Err(EngineError::Validation(ValidationError::NoRemoteRecord(_))) => {
                    println!("  - {} left pending: no remote copy to use", conflict);
                    index += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let drained = engine.drain_queue().await;
        if !drained.is_empty() {
            println!(
                "Uploaded {} kept record(s), {} still queued",
                drained.delivered.len(),
                drained.failed.len()
            );
        }
        Ok(())
    }

    async fn push(&self, engine: &SyncEngine) -> Result<(), SyncCommandError> {
        let queued = engine.queue_len().await;
        if queued == 0 {
            println!("Nothing queued.");
            return Ok(());
        }

        let report = engine.drain_queue().await;
        println!(
            "Delivered {} of {} queued change(s)",
            report.delivered.len(),
            queued
        );
        for item in &report.failed {
            println!("  ✗ {} ({}) still queued", item.payload.id, item.kind);
        }
        Ok(())
    }

    async fn status(&self, engine: &SyncEngine, config: &Config) -> Result<(), SyncCommandError> {
        let state = engine.sync_state();

        println!("Sync Configuration");
        println!("==================");
        println!();
        println!(
            "Server:       {}/{}",
            config.remote.base_url.value.trim_end_matches('/'),
            config.remote.collection
        );
        println!(
            "Auto-sync:    {}",
            if state.auto_sync_enabled {
                format!("enabled, every {} s", state.interval_ms / 1000)
            } else {
                "disabled".to_string()
            }
        );
        println!(
            "After writes: {}",
            if config.sync.auto_sync {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!(
            "Offline mode: {}",
            if state.offline_mode { "on" } else { "off" }
        );
        match state.last_sync_at {
            Some(at) => println!("Last sync:    {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Last sync:    never"),
        }

        let queued = engine.queued_items().await;
        println!("Queued:       {}", queued.len());
        for item in &queued {
            println!(
                "  - {} {} ({})",
                item.kind,
                item.payload.id,
                item.enqueued_at.format("%Y-%m-%d %H:%M")
            );
        }
        println!();

        print!("Server status: ");
        if check_server(&config.remote.base_url.value).await {
            println!("✓ reachable");
        } else {
            println!("✗ unreachable");
        }
        Ok(())
    }

    async fn watch(
        &self,
        engine: &SyncEngine,
        config: &Config,
        interval_ms: u64,
    ) -> Result<(), SyncCommandError> {
        let mut events = engine.subscribe();
        let previous = engine.sync_state();
        engine.enable_auto_sync(interval_ms)?;

        println!(
            "Watching {} every {} s (Ctrl-C to stop)",
            config.remote.base_url.value,
            interval_ms / 1000
        );

        // One cycle right away rather than after the first interval
        if let Err(e) = engine.run_cycle().await {
            println!("  ✗ {}", e);
        }

        let mut probe = tokio::time::interval(PROBE_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = probe.tick() => {
                    let online = check_server(&config.remote.base_url.value).await;
                    if engine.set_online(online) {
                        println!("  ↻ back online");
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} sync event(s)", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        restore_auto_sync(engine, &previous);
        engine.shutdown();
        println!("Stopped.");
        Ok(())
    }
}

/// Puts the remembered auto-sync choice back the way it was before `watch`.
fn restore_auto_sync(engine: &SyncEngine, previous: &SyncState) {
    if !previous.auto_sync_enabled {
        engine.disable_auto_sync();
    } else if let Err(e) = engine.set_interval(previous.interval_ms) {
        tracing::warn!("Could not restore auto-sync interval: {}", e);
    }
}

fn interval_ms(interval_secs: Option<u64>, config: &Config) -> u64 {
    interval_secs
        .unwrap_or(config.sync.interval_secs)
        .saturating_mul(1000)
}

fn print_report(report: &SyncReport) {
    println!("  ✓ fetched {} remote quote(s)", report.fetched);
    if report.auto_resolved {
        println!("  ✓ resolved {} conflict(s) automatically", report.conflicts.len());
    }
    if !report.drain.is_empty() {
        println!(
            "  ✓ delivered {} queued change(s), {} still queued",
            report.drain.delivered.len(),
            report.drain.failed.len()
        );
    }
    println!("  {} quote(s) stored locally", report.records);
}

fn print_conflicts(conflicts: &[Conflict]) {
    for (index, conflict) in conflicts.iter().enumerate() {
        println!("  {}. {}", index, conflict);
    }
}

fn print_event(event: &SyncEvent) {
    let now = chrono::Local::now().format("%H:%M:%S");
    match event {
        SyncEvent::SyncCompleted { report } => println!(
            "[{}] synced: {} remote, {} local",
            now, report.fetched, report.records
        ),
        SyncEvent::SyncFailed { cause } => println!("[{}] sync failed: {}", now, cause),
        SyncEvent::ConflictsDetected { conflicts } => {
            println!("[{}] {} conflict(s)", now, conflicts.len());
            print_conflicts(conflicts);
        }
        SyncEvent::QueueDrained { delivered, failed } => println!(
            "[{}] delivered {} queued change(s), {} still queued",
            now, delivered, failed
        ),
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    Sync(SyncError),
    Engine(EngineError),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::Sync(e) => write!(f, "Sync failed: {}", e),
            SyncCommandError::Engine(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::Sync(e) => Some(e),
            SyncCommandError::Engine(e) => Some(e),
        }
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::Sync(e)
    }
}

impl From<EngineError> for SyncCommandError {
    fn from(e: EngineError) -> Self {
        SyncCommandError::Engine(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use quote_sync_core::{FileStore, HttpGateway, SchedulerState};
    use std::sync::Arc;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        sync: SyncCommand,
    }

    #[test]
    fn test_parse_resolve_choice() {
        let parsed = Harness::try_parse_from(["sync", "--resolve", "use-remote"]).unwrap();
        assert_eq!(parsed.sync.resolve, Some(Resolution::UseRemote));
        assert!(parsed.sync.command.is_none());

        assert!(Harness::try_parse_from(["sync", "--resolve", "whatever"]).is_err());
    }

    #[test]
    fn test_parse_watch_interval() {
        let parsed = Harness::try_parse_from(["sync", "watch", "--interval", "30"]).unwrap();
        assert!(matches!(
            parsed.sync.command,
            Some(SyncSubcommand::Watch { interval: Some(30) })
        ));
    }

    fn offline_engine(dir: &std::path::Path) -> SyncEngine {
        let gateway = Arc::new(HttpGateway::new("http://127.0.0.1:9", "posts", "1"));
        let backend = Arc::new(FileStore::new(dir.to_path_buf()));
        SyncEngine::builder(gateway, backend).online(false).build()
    }

    #[tokio::test]
    async fn test_watch_leaves_auto_sync_off_when_it_was_off() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = offline_engine(temp_dir.path());
        let previous = engine.sync_state();

        engine.enable_auto_sync(30_000).unwrap();
        restore_auto_sync(&engine, &previous);

        assert!(!engine.sync_state().auto_sync_enabled);
        assert_eq!(engine.scheduler_state(), SchedulerState::Stopped);
        assert!(!offline_engine(temp_dir.path()).sync_state().auto_sync_enabled);
    }

    #[tokio::test]
    async fn test_watch_keeps_remembered_auto_sync_interval() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = offline_engine(temp_dir.path());
        engine.enable_auto_sync(120_000).unwrap();
        let previous = engine.sync_state();

        engine.enable_auto_sync(30_000).unwrap();
        restore_auto_sync(&engine, &previous);
        engine.shutdown();

        let state = offline_engine(temp_dir.path()).sync_state();
        assert!(state.auto_sync_enabled);
        assert_eq!(state.interval_ms, 120_000);
    }

    #[test]
    fn test_interval_falls_back_to_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(temp_dir.path().join("none.yaml"))).unwrap();
        assert_eq!(interval_ms(None, &config), 60_000);
        assert_eq!(interval_ms(Some(15), &config), 15_000);
    }
}
