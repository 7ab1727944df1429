use serde::Deserialize;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::consts::*;
use crate::error::{GalopError, Result};
use crate::executor::manager::RetryPolicy;
use crate::executor::parser::SubmitFormat;

/// Optional configuration file.
///
/// Every section and key has a default, an empty file is a valid config.
///
/// # Example
///
/// ``` toml
/// [scheduler]
/// submit = "ccc_msub"
/// query = "sacct"
/// format = "msub-v1"
/// poll_interval = 60
/// max_attempts = 3
/// retry_backoff = 30
///
/// [memory]
/// default = 10
///
/// [memory.tiers]
/// xlarge = 30
/// xxlarge = 30
/// ```
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub memory: MemoryTable,
}

impl Config {
    /// Read a configuration file and return a Config struct.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file.
    ///
    /// # Example
    ///
    /// ``` rust, no_run
    /// use galop::config::Config;
    ///
    /// let config = Config::read("galop.toml").unwrap();
    /// ```
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| GalopError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents)
    }

    /// Parse a configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}

/// How jobs are handed to the cluster and how their state is queried.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Submit command, receives the script path as its only argument
    pub submit: String,
    /// Accounting command used by `--wait`
    pub query: String,
    /// Contract of the submit command's output
    pub format: SubmitFormat,
    /// Seconds between two status polls
    pub poll_interval: u64,
    /// Attempts per submission, 1 means no retry
    pub max_attempts: u32,
    /// Seconds of backoff, multiplied by the attempt number
    pub retry_backoff: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            submit: SUBMIT_CMD.to_string(),
            query: QUERY_CMD.to_string(),
            format: SubmitFormat::default(),
            poll_interval: POLL_INTERVAL_SECS,
            max_attempts: 1,
            retry_backoff: RETRY_BACKOFF_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_backoff))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

/// Queue tier to GB-per-cpu mapping.
///
/// Queues not listed in `tiers` get `default`.
///
/// # Example
///
/// ``` rust
/// use galop::config::MemoryTable;
///
/// let table = MemoryTable::default();
///
/// assert_eq!(table.memory(36, "normal"), 360);
/// assert_eq!(table.memory(36, "xlarge"), 1080);
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryTable {
    pub default: u64,
    pub tiers: BTreeMap<String, u64>,
}

impl Default for MemoryTable {
    fn default() -> Self {
        let tiers = LARGE_MEMORY_QUEUES
            .iter()
            .map(|queue| (queue.to_string(), LARGE_GB_PER_CPU))
            .collect();

        Self {
            default: DEFAULT_GB_PER_CPU,
            tiers,
        }
    }
}

impl MemoryTable {
    /// GB per cpu granted on `queue`
    pub fn per_cpu(&self, queue: &str) -> u64 {
        self.tiers.get(queue).copied().unwrap_or(self.default)
    }

    /// Total memory request in GB
    pub fn memory(&self, cpus: u32, queue: &str) -> u64 {
        u64::from(cpus) * self.per_cpu(queue)
    }
}

/// Where rendered scripts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Hand scripts to the cluster scheduler
    Scheduler,
    /// Run scripts as foreground subprocesses
    Local,
}

impl FromStr for SubmissionMode {
    type Err = String;

    /// Convert a string to a SubmissionMode
    ///
    /// # Example
    ///
    /// ```rust
    /// use galop::config::SubmissionMode;
    ///
    /// let mode: SubmissionMode = "msub".parse().unwrap();
    /// assert_eq!(mode, SubmissionMode::Scheduler);
    /// ```
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "msub" | "scheduler" => Ok(SubmissionMode::Scheduler),
            "local" => Ok(SubmissionMode::Local),
            _ => Err(format!("unknown submission mode: {}", s)),
        }
    }
}

impl fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionMode::Scheduler => write!(f, "msub"),
            SubmissionMode::Local => write!(f, "local"),
        }
    }
}

/// Global submission context, fixed for the lifetime of a runner.
///
/// `work_dir` is the pipeline output directory: scripts are submitted and
/// executed from there, so the relative paths in job commands resolve
/// against it. A relative `work_dir` is made absolute against the current
/// directory when the context is built, since script paths are handed to
/// processes that already run inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionContext {
    pub account: String,
    pub mode: SubmissionMode,
    pub no_launch: bool,
    pub verbose: bool,
    pub work_dir: PathBuf,
    pub submission_dir: PathBuf,
}

impl SubmissionContext {
    pub fn new(account: &str, mode: SubmissionMode, work_dir: &Path) -> Self {
        let work_dir = std::path::absolute(work_dir).unwrap_or_else(|_| work_dir.to_path_buf());

        Self {
            account: account.to_string(),
            mode,
            no_launch: false,
            verbose: false,
            submission_dir: work_dir.join(SUBMISSION_SCRIPTS),
            work_dir,
        }
    }

    pub fn no_launch(mut self, no_launch: bool) -> Self {
        self.no_launch = no_launch;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_is_pure_in_cpus_and_queue() {
        let table = MemoryTable::default();

        assert_eq!(table.memory(36, "normal"), 360);
        assert_eq!(table.memory(36, "xlarge"), 1080);
        assert_eq!(table.memory(36, "xxlarge"), 1080);
        assert_eq!(table.memory(2, "small"), 20);
        assert_eq!(table.memory(0, "xlarge"), 0);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.scheduler.submit, "ccc_msub");
        assert_eq!(config.scheduler.max_attempts, 1);
    }

    #[test]
    fn memory_tiers_can_be_overridden() {
        let config = Config::parse(
            r#"
            [memory]
            default = 8

            [memory.tiers]
            xlarge = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.memory.memory(10, "xlarge"), 500);
        assert_eq!(config.memory.memory(10, "normal"), 80);
        // listing tiers replaces the default table
        assert_eq!(config.memory.memory(10, "xxlarge"), 80);
    }

    #[test]
    fn scheduler_section_is_parsed() {
        let config = Config::parse(
            r#"
            [scheduler]
            submit = "sbatch"
            format = "sbatch-v1"
            poll_interval = 5
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.submit, "sbatch");
        assert_eq!(config.scheduler.format, SubmitFormat::SbatchV1);
        assert_eq!(config.scheduler.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.scheduler.retry_policy().max_attempts, 3);
        assert_eq!(config.scheduler.query, "sacct");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("[scheduler]\nsubmitt = \"x\"\n").is_err());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::read("/nonexistent/galop.toml").unwrap_err();
        assert!(matches!(err, GalopError::ConfigRead { .. }));
    }

    #[test]
    fn submission_mode_accepts_aliases() {
        assert_eq!("scheduler".parse::<SubmissionMode>(), Ok(SubmissionMode::Scheduler));
        assert_eq!("LOCAL".parse::<SubmissionMode>(), Ok(SubmissionMode::Local));
        assert_eq!(
            "slurm".parse::<SubmissionMode>(),
            Err("unknown submission mode: slurm".to_string())
        );
    }

    #[test]
    fn context_places_scripts_under_work_dir() {
        let ctx = SubmissionContext::new("me", SubmissionMode::Local, Path::new("/out"))
            .no_launch(true);

        assert_eq!(ctx.submission_dir, PathBuf::from("/out/Submission_scripts"));
        assert!(ctx.no_launch);
        assert!(!ctx.verbose);
    }

    #[test]
    fn relative_work_dir_is_made_absolute() {
        let ctx = SubmissionContext::new("me", SubmissionMode::Local, Path::new("out"));
        let cwd = std::env::current_dir().unwrap();

        assert_eq!(ctx.work_dir, cwd.join("out"));
        assert_eq!(ctx.submission_dir, cwd.join("out").join(SUBMISSION_SCRIPTS));
    }
}
