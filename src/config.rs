//! Benchmark configuration.
//!
//! Everything the runs depend on is spelled out here instead of being left to
//! runtime defaults. A config can be built in code with [`BenchConfig::builder`]
//! or loaded from a JSON file; missing fields fall back to the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{PoolError, Result};

const DEFAULT_PAUSE_MS: u64 = 1000;
const DEFAULT_TASK_COUNTS: [usize; 2] = [2000, 20_000];
const MIN_STACK_SIZE: usize = 64 * 1024;
const MAX_PLATFORM_THREADS: usize = 65_536;

/// Reusable OS worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Upper bound on live worker threads; further items queue.
    pub max_threads: usize,
    /// Idle workers retire after this long.
    pub keep_alive_ms: u64,
    pub stack_size: usize,
    pub thread_name_prefix: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            max_threads: 4096,
            keep_alive_ms: 60_000,
            stack_size: 256 * 1024,
            thread_name_prefix: "platform".to_string(),
        }
    }
}

impl PlatformConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 {
            return Err(PoolError::config("platform.max_threads must be > 0"));
        }
        if self.max_threads > MAX_PLATFORM_THREADS {
            return Err(PoolError::config(format!(
                "platform.max_threads too large (max {})",
                MAX_PLATFORM_THREADS
            )));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(PoolError::config(format!(
                "platform.stack_size must be at least {} bytes",
                MIN_STACK_SIZE
            )));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(PoolError::config("platform.thread_name_prefix must not be empty"));
        }
        // std::thread::Builder::name panics on interior NULs
        if self.thread_name_prefix.contains('\0') {
            return Err(PoolError::config(
                "platform.thread_name_prefix must not contain NUL bytes",
            ));
        }
        Ok(())
    }
}

/// Per-task executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    /// OS threads the runtime multiplexes tasks onto.
    pub carrier_threads: usize,
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            carrier_threads: num_cpus::get(),
        }
    }
}

impl VirtualConfig {
    pub fn validate(&self) -> Result<()> {
        if self.carrier_threads == 0 {
            return Err(PoolError::config("virtual.carrier_threads must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// How long every work item stays suspended.
    pub pause_ms: u64,
    pub task_counts: Vec<usize>,
    pub platform: PlatformConfig,
    #[serde(rename = "virtual")]
    pub virtual_threads: VirtualConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            pause_ms: DEFAULT_PAUSE_MS,
            task_counts: DEFAULT_TASK_COUNTS.to_vec(),
            platform: PlatformConfig::default(),
            virtual_threads: VirtualConfig::default(),
        }
    }
}

impl BenchConfig {
    pub fn builder() -> BenchConfigBuilder {
        BenchConfigBuilder::new()
    }

    /// Load a config from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PoolError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        let config: BenchConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        log::debug!("Loaded benchmark config from {}", path.display());
        Ok(config)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pause_ms == 0 {
            return Err(PoolError::config("pause_ms must be > 0"));
        }
        if self.task_counts.is_empty() {
            return Err(PoolError::config("task_counts must not be empty"));
        }
        if self.task_counts.contains(&0) {
            return Err(PoolError::config("every task count must be > 0"));
        }

        self.platform.validate()?;
        self.virtual_threads.validate()
    }
}

#[derive(Debug, Default)]
pub struct BenchConfigBuilder {
    config: BenchConfig,
}

impl BenchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: BenchConfig::default(),
        }
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.config.pause_ms = pause.as_millis() as u64;
        self
    }

    pub fn task_counts<I: IntoIterator<Item = usize>>(mut self, counts: I) -> Self {
        self.config.task_counts = counts.into_iter().collect();
        self
    }

    pub fn max_platform_threads(mut self, n: usize) -> Self {
        self.config.platform.max_threads = n;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.platform.keep_alive_ms = keep_alive.as_millis() as u64;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.platform.stack_size = size;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.platform.thread_name_prefix = prefix.into();
        self
    }

    pub fn carrier_threads(mut self, n: usize) -> Self {
        self.config.virtual_threads.carrier_threads = n;
        self
    }

    pub fn build(self) -> Result<BenchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_one_second_and_two_counts() {
        let config = BenchConfig::default();
        assert_eq!(config.pause(), Duration::from_secs(1));
        assert_eq!(config.task_counts, vec![2000, 20_000]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_rejects_invalid_values() {
        assert!(matches!(
            BenchConfig::builder().pause(Duration::ZERO).build(),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            BenchConfig::builder().max_platform_threads(0).build(),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            BenchConfig::builder().carrier_threads(0).build(),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            BenchConfig::builder().task_counts(Vec::new()).build(),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            BenchConfig::builder().task_counts([10, 0]).build(),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            BenchConfig::builder().stack_size(1024).build(),
            Err(PoolError::Config(_))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: BenchConfig =
            serde_json::from_str(r#"{ "pause_ms": 50, "platform": { "max_threads": 8 } }"#)
                .unwrap();
        assert_eq!(config.pause(), Duration::from_millis(50));
        assert_eq!(config.platform.max_threads, 8);
        assert_eq!(config.platform.thread_name_prefix, "platform");
        assert_eq!(config.task_counts, vec![2000, 20_000]);
    }

    #[test]
    fn nul_in_thread_prefix_is_rejected() {
        let config: BenchConfig =
            serde_json::from_str(r#"{ "platform": { "thread_name_prefix": "bad\u0000name" } }"#)
                .unwrap();
        assert!(config.platform.thread_name_prefix.contains('\0'));
        assert!(matches!(config.validate(), Err(PoolError::Config(_))));
        assert!(matches!(
            BenchConfig::builder().thread_name_prefix("a\0b").build(),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            BenchConfig::builder().thread_name_prefix("").build(),
            Err(PoolError::Config(_))
        ));
    }

    #[test]
    fn virtual_section_uses_short_key() {
        let config: BenchConfig =
            serde_json::from_str(r#"{ "virtual": { "carrier_threads": 3 } }"#).unwrap();
        assert_eq!(config.virtual_threads.carrier_threads, 3);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = BenchConfig::from_json_file("/nonexistent/bench.json").unwrap_err();
        match err {
            PoolError::ConfigFile { path, .. } => assert_eq!(path, "/nonexistent/bench.json"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
