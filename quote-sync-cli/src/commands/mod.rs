mod config_cmd;
mod offline;
mod quote;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use offline::OfflineCommand;
pub use quote::{
    AddCommand, FilterCommand, ListCommand, RandomCommand, SearchCommand, StatsCommand,
};
pub use sync_cmd::SyncCommand;
