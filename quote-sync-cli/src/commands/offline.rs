use clap::{Args, ValueEnum};

use quote_sync_core::SyncEngine;

#[derive(Debug, Clone, ValueEnum)]
pub enum OfflineState {
    On,
    Off,
}

/// Work offline: queue every change instead of sending it
#[derive(Debug, Args)]
pub struct OfflineCommand {
    /// Omit to show the current setting
    pub state: Option<OfflineState>,
}

impl OfflineCommand {
    pub async fn run(&self, engine: &SyncEngine) {
        match self.state {
            Some(OfflineState::On) => {
                engine.set_offline_mode(true);
                println!("Offline mode on. Changes will be queued.");
            }
            Some(OfflineState::Off) => {
                engine.set_offline_mode(false);
                let report = engine.drain_queue().await;
                println!("Offline mode off.");
                if !report.is_empty() {
                    println!(
                        "Delivered {} queued change(s), {} still queued",
                        report.delivered.len(),
                        report.failed.len()
                    );
                }
            }
            None => {
                let state = engine.sync_state();
                let queued = engine.queue_len().await;
                println!(
                    "Offline mode: {} ({} change(s) queued)",
                    if state.offline_mode { "on" } else { "off" },
                    queued
                );
            }
        }
    }
}
