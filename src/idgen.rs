//! Snowflake-style prefixed primary key generation.
//!
//! Every table's primary key is a `{prefix}{snowflake}` string, where the
//! snowflake packs milliseconds-since-epoch, worker id, process id and a
//! per-prefix sequence. The generator is an injected service with a
//! swappable clock so tests can seed it deterministically instead of
//! depending on process-global state.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

/// Custom epoch: 2021-01-01 00:00:00 UTC, in milliseconds.
pub const EPOCH_MS: u64 = 1_609_459_200_000;

const WORKER_ID_BITS: u32 = 5;
const PROCESS_ID_BITS: u32 = 5;
const SEQUENCE_BITS: u32 = 12;
const MAX_WORKER_ID: u64 = 1 << WORKER_ID_BITS;
const MAX_PROCESS_ID: u64 = 1 << PROCESS_ID_BITS;
const MAX_SEQUENCE: u64 = 1 << SEQUENCE_BITS;
const MAX_TIMESTAMP: u64 = 1 << (64 - WORKER_ID_BITS - PROCESS_ID_BITS - SEQUENCE_BITS);

/// Maximum allowed prefix length.
pub const MAX_PREFIX_LEN: usize = 10;

/// Millisecond clock source, swappable for tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Pack a snowflake from its components.
pub fn make_snowflake(timestamp_ms: u64, worker_id: u64, process_id: u64, sequence: u64) -> u64 {
    let mut sid = (timestamp_ms.saturating_sub(EPOCH_MS) % MAX_TIMESTAMP)
        << (WORKER_ID_BITS + PROCESS_ID_BITS + SEQUENCE_BITS);
    sid += (worker_id % MAX_WORKER_ID) << (PROCESS_ID_BITS + SEQUENCE_BITS);
    sid += (process_id % MAX_PROCESS_ID) << SEQUENCE_BITS;
    sid += sequence % MAX_SEQUENCE;
    sid
}

/// Recover the creation time embedded in a snowflake.
pub fn snowflake_to_time(snowflake: u64) -> DateTime<Utc> {
    let ms = (snowflake >> (WORKER_ID_BITS + PROCESS_ID_BITS + SEQUENCE_BITS)) + EPOCH_MS;
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[derive(Debug, Default)]
struct GenState {
    last_ms: u64,
    sequences: HashMap<String, u64>,
}

/// Prefixed snowflake ID generator.
///
/// Sequence counters are tracked per prefix and reset on every clock tick;
/// within a single millisecond they wrap at 4096.
pub struct IdGenerator {
    clock: Arc<dyn Clock>,
    worker_id: u64,
    process_id: u64,
    state: Mutex<GenState>,
}

impl IdGenerator {
    /// Create a generator backed by the system clock with a random worker id.
    pub fn new() -> Self {
        use rand::Rng;
        let worker_id = rand::thread_rng().gen_range(0..MAX_WORKER_ID);
        Self::with_clock(Arc::new(SystemClock), worker_id, std::process::id() as u64)
    }

    /// Create a generator with an explicit clock and identity (test-seedable).
    pub fn with_clock(clock: Arc<dyn Clock>, worker_id: u64, process_id: u64) -> Self {
        Self {
            clock,
            worker_id,
            process_id,
            state: Mutex::new(GenState::default()),
        }
    }

    /// Generate the next `{prefix}{snowflake}` id.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` exceeds [`MAX_PREFIX_LEN`]; prefixes are static
    /// per-table constants, so this is a programming error.
    pub fn next_id(&self, prefix: &str) -> String {
        assert!(
            prefix.len() <= MAX_PREFIX_LEN,
            "id prefix '{prefix}' exceeds {MAX_PREFIX_LEN} chars"
        );

        let now_ms = self.clock.now_ms();
        let sequence = {
            let mut state = self.state.lock().expect("id generator state poisoned");
            if now_ms != state.last_ms {
                state.last_ms = now_ms;
                state.sequences.clear();
            }
            let seq = state.sequences.entry(prefix.to_string()).or_insert(0);
            let current = *seq;
            *seq = (*seq + 1) % MAX_SEQUENCE;
            current
        };

        let snowflake = make_snowflake(now_ms, self.worker_id, self.process_id, sequence);
        format!("{prefix}{snowflake}")
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("worker_id", &self.worker_id)
            .field("process_id", &self.process_id)
            .finish()
    }
}
