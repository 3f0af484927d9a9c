use std::time::Duration;

use tracing::warn;

const MAX_BATCH_ENV: &str = "WEFT_MAX_BATCH";
const BATCH_WAIT_ENV: &str = "WEFT_BATCH_WAIT_US";
const YIELD_TICKS_ENV: &str = "WEFT_YIELD_TICKS";

const DEFAULT_MAX_BATCH: usize = 100;
const DEFAULT_YIELD_TICKS: u32 = 4;
const DEFAULT_BATCH_WAIT: Duration = Duration::from_millis(1);

/// Batching window for every loader of a request.
///
/// A window opens when the first key of a new batch is registered. The batch is
/// dispatched once the window closes: after `yield_ticks` scheduler yields plus
/// `batch_wait`, or as soon as `max_batch_size` keys are pending. Loaders of a
/// [`RequestContext`](crate::RequestContext) additionally hold the window
/// while the request has lookups in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub max_batch_size: usize,
    pub batch_wait: Duration,
    pub yield_ticks: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH,
            batch_wait: DEFAULT_BATCH_WAIT,
            yield_ticks: DEFAULT_YIELD_TICKS,
        }
    }
}

impl LoaderConfig {
    /// Reads `WEFT_MAX_BATCH`, `WEFT_BATCH_WAIT_US` and `WEFT_YIELD_TICKS`,
    /// keeping the default for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_batch_size = parse_or(&lookup, MAX_BATCH_ENV, defaults.max_batch_size)
            .max(1);
        let batch_wait = Duration::from_micros(parse_or(
            &lookup,
            BATCH_WAIT_ENV,
            defaults.batch_wait.as_micros() as u64,
        ));
        let yield_ticks = parse_or(&lookup, YIELD_TICKS_ENV, defaults.yield_ticks);
        Self {
            max_batch_size,
            batch_wait,
            yield_ticks,
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_batch_wait(mut self, batch_wait: Duration) -> Self {
        self.batch_wait = batch_wait;
        self
    }

    /// Suspends until the batching window closes.
    pub(crate) async fn window(&self) {
        for _ in 0..self.yield_ticks {
            tokio::task::yield_now().await;
        }
        if !self.batch_wait.is_zero() {
            tokio::time::sleep(self.batch_wait).await;
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(%name, value = %raw, "ignoring unparsable loader setting");
            default
        }
    }
}
