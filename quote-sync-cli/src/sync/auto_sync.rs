//! Auto-sync around CLI commands.
//!
//! When `sync.auto_sync` is set, read commands sync first and write commands
//! sync afterwards, so one-shot invocations stay close to the remote without
//! an explicit `quotes sync`.

use quote_sync_core::{check_server, SyncEngine};

use crate::config::Config;

/// Runs one cycle if auto-sync is enabled and the server answers.
///
/// Failures are reported on stderr and otherwise ignored: the CLI keeps
/// working offline and the queue catches up later.
pub async fn try_auto_sync(engine: &SyncEngine, config: &Config) {
    if !config.sync.auto_sync {
        return;
    }

    // Fast fail before paying for a full request timeout
    if !check_server(&config.remote.base_url.value).await {
        engine.set_online(false);
        eprintln!("Auto-sync: server unreachable, skipping");
        return;
    }

    match engine.run_cycle().await {
        Ok(report) => {
            let pending = engine.pending_conflicts().len();
            if pending > 0 {
                eprintln!(
                    "Auto-sync: {} conflict(s) need resolution; run 'quotes sync --resolve <choice>'",
                    pending
                );
            }
            tracing::debug!("Auto-sync fetched {} record(s)", report.fetched);
        }
        Err(e) => eprintln!("Auto-sync: {}", e),
    }
}
