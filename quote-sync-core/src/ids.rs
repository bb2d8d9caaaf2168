//! Record id generation.
//!
//! Locally created records get ids of the form `local_<unix_millis>_<suffix>`
//! where the suffix is nine random base36 characters. Hosts and tests can swap
//! in any other [`IdGenerator`].

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use rand::Rng;

/// Prefix for ids assigned on this device.
pub const LOCAL_ID_PREFIX: &str = "local_";

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Produces ids for records created locally.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Default generator: timestamp plus random suffix.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalIdGenerator;

impl IdGenerator for LocalIdGenerator {
    fn next_id(&self) -> String {
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
            .collect();
        format!(
            "{}{}_{}",
            LOCAL_ID_PREFIX,
            Utc::now().timestamp_millis(),
            suffix
        )
    }
}

/// Deterministic generator yielding `<prefix>_1`, `<prefix>_2`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicUsize,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicUsize::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", self.prefix, n)
    }
}
