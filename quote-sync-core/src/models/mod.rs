mod defaults;
mod record;

pub use defaults::default_records;
pub use record::{RawRecord, Record, RecordSource};
