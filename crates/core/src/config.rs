//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backing table store.
    #[serde(default)]
    pub store: StoreConfig,
    /// Payload chunking and encoding.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Retry budget for store calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Batch sizing and parallelism.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Per-call timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Orphaned chunk sweeping.
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl AppConfig {
    /// Validate every section, reporting the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()?;
        self.chunking.validate()?;
        self.retry.validate()?;
        self.batch.validate()?;
        self.timeouts.validate()?;
        self.sweep.validate()?;

        // A writer stops short of committing once its chunks are older than
        // the grace period minus this budget, so the budget must fit inside it.
        let budget = self.call_budget();
        if self.sweep.grace_period() <= budget {
            return Err(format!(
                "sweep.grace_period_secs {} must exceed the {}ms a manifest commit may take \
                 (retry.max_attempts x timeouts.operation_timeout_ms plus backoff)",
                self.sweep.grace_period_secs,
                budget.as_millis()
            ));
        }
        Ok(())
    }

    /// Longest one store call may take across every retry: each attempt
    /// runs to its timeout and each backoff waits the maximum delay.
    pub fn call_budget(&self) -> Duration {
        let attempts = self.retry.max_attempts;
        self.timeouts
            .operation_timeout()
            .saturating_mul(attempts)
            .saturating_add(
                self.retry
                    .max_delay()
                    .saturating_mul(attempts.saturating_sub(1)),
            )
    }

    /// How long after its chunks were written a writer may still start its
    /// manifest commit.
    pub fn commit_deadline(&self) -> Duration {
        self.sweep.grace_period().saturating_sub(self.call_budget())
    }
}

/// Table store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local tables (testing, ephemeral use).
    Memory,
    /// SQLite database file.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// How long a writer waits on a locked database before failing.
        #[serde(default = "default_busy_timeout_ms")]
        busy_timeout_ms: u64,
    },
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/tessera.db"),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Validate store configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::Sqlite { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err("store.path must not be empty".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Compression algorithm configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionConfig {
    /// No compression.
    None,
    /// Gzip compression (widely readable).
    Gzip,
    /// Zstd compression (recommended: fast, good ratio).
    #[default]
    Zstd,
}

impl CompressionConfig {
    /// Stable lowercase name, as written in config files and records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CompressionConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "zstd" => Ok(Self::Zstd),
            other => Err(format!("unknown compression {other:?}")),
        }
    }
}

/// Chunking configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk body size in bytes. Must fit the store's item size limit
    /// with room left for the key and attributes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,
    /// Compression applied to encoded payloads.
    #[serde(default)]
    pub compression: CompressionConfig,
}

fn default_max_chunk_size() -> u64 {
    crate::DEFAULT_CHUNK_SIZE
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            compression: CompressionConfig::default(),
        }
    }
}

impl ChunkingConfig {
    /// Validate chunking configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(crate::MIN_CHUNK_SIZE..=crate::MAX_CHUNK_SIZE).contains(&self.max_chunk_size) {
            return Err(format!(
                "chunking.max_chunk_size {} must be between {} and {}",
                self.max_chunk_size,
                crate::MIN_CHUNK_SIZE,
                crate::MAX_CHUNK_SIZE
            ));
        }
        Ok(())
    }
}

/// Retry configuration for store calls.
///
/// Delays double from `base_delay_ms` up to `max_delay_ms`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    8
}

fn default_base_delay_ms() -> u64 {
    25
}

fn default_max_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Validate retry configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(format!(
                "retry.base_delay_ms {} exceeds retry.max_delay_ms {}",
                self.base_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }

    /// Get the base delay as a Duration.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Get the maximum delay as a Duration.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Batch sizing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items per batch write. Clamped to the backend's limit.
    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,
    /// Keys per batch read. Clamped to the backend's limit.
    #[serde(default = "default_read_batch_size")]
    pub read_batch_size: usize,
    /// Batch calls in flight at once within one operation.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_write_batch_size() -> usize {
    25
}

fn default_read_batch_size() -> usize {
    100
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            write_batch_size: default_write_batch_size(),
            read_batch_size: default_read_batch_size(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl BatchConfig {
    /// Validate batch configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.write_batch_size == 0 || self.read_batch_size == 0 {
            return Err("batch sizes must be at least 1".to_string());
        }
        if self.max_concurrency == 0 {
            return Err("batch.max_concurrency must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Timeouts applied to individual store calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound on any single point or batch call.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_operation_timeout_ms() -> u64 {
    10_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    /// Validate timeout configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.operation_timeout_ms == 0 {
            return Err("timeouts.operation_timeout_ms must be at least 1".to_string());
        }
        Ok(())
    }

    /// Get the operation timeout as a Duration.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Orphaned chunk sweep configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Chunks younger than this are never swept. Writers give up on a
    /// commit that could finish after their chunks reach this age.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Keys fetched per scan page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_grace_period_secs() -> u64 {
    3600
}

fn default_page_size() -> usize {
    500
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            page_size: default_page_size(),
        }
    }
}

impl SweepConfig {
    /// Validate sweep configuration.
    pub fn validate(&self) -> Result<(), String> {
        // Grace period is converted to i64 nanoseconds when compared with UpdateTime.
        if self.grace_period_secs > (i64::MAX / 1_000_000_000) as u64 {
            return Err(format!(
                "sweep.grace_period_secs {} is too large",
                self.grace_period_secs
            ));
        }
        if self.grace_period_secs == 0 {
            return Err("sweep.grace_period_secs must be at least 1".to_string());
        }
        if self.page_size == 0 {
            return Err("sweep.page_size must be at least 1".to_string());
        }
        Ok(())
    }

    /// Get the grace period as a Duration.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}
