use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Wall-clock source shared by key generation and record timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Builds storage keys of the form `<epoch millis>.<extension>`.
///
/// Two calls within the same millisecond with the same extension yield the
/// same key; the store then overwrites the earlier object.
#[derive(Clone)]
pub struct KeyGenerator {
    clock: Arc<dyn Clock>,
}

impl KeyGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn generate(&self, extension: &str) -> String {
        format_key(self.clock.now(), extension)
    }
}

pub fn format_key(at: DateTime<Utc>, extension: &str) -> String {
    format!("{}.{}", at.timestamp_millis(), extension)
}
