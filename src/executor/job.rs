use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};

use crate::config::MemoryTable;
use crate::consts::*;

/// Opaque reference to a job registered in a [`Runner`](crate::executor::manager::Runner).
///
/// A handle is only meaningful for the runner that issued it; handing it
/// to another runner is reported as a dangling dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub(crate) runner: u64,
    pub(crate) index: usize,
}

impl JobHandle {
    /// Position of the job in creation order
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.index)
    }
}

/// Scheduler quality-of-service tag
///
/// # Example
///
/// ```rust
/// use galop::executor::job::Qos;
///
/// let qos: Qos = "long".parse().unwrap();
/// assert_eq!(qos.time_limit(), 3 * 24 * 60 * 60);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qos {
    Long,
    Week,
    Nolimit,
    Xlarge,
    Xxlarge,
}

impl Qos {
    /// Wall-clock limit in seconds granted by this QoS
    pub fn time_limit(&self) -> u64 {
        match self {
            Qos::Long => LONG_TIME_LIMIT,
            Qos::Week | Qos::Xlarge | Qos::Xxlarge => WEEK_TIME_LIMIT,
            Qos::Nolimit => NOLIMIT_TIME_LIMIT,
        }
    }
}

/// Wall-clock limit for an optional QoS, 24h when none is requested.
///
/// # Example
///
/// ```rust
/// use galop::executor::job::{time_limit, Qos};
///
/// assert_eq!(time_limit(None), 86400);
/// assert_eq!(time_limit(Some(Qos::Week)), 604800);
/// ```
pub fn time_limit(qos: Option<Qos>) -> u64 {
    qos.map_or(DEFAULT_TIME_LIMIT, |q| q.time_limit())
}

impl FromStr for Qos {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" => Ok(Qos::Long),
            "week" => Ok(Qos::Week),
            "nolimit" => Ok(Qos::Nolimit),
            "xlarge" => Ok(Qos::Xlarge),
            "xxlarge" => Ok(Qos::Xxlarge),
            _ => Err(format!("unknown QoS: {}", s)),
        }
    }
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qos::Long => write!(f, "long"),
            Qos::Week => write!(f, "week"),
            Qos::Nolimit => write!(f, "nolimit"),
            Qos::Xlarge => write!(f, "xlarge"),
            Qos::Xxlarge => write!(f, "xxlarge"),
        }
    }
}

/// Resources requested by a single job
///
/// The time limit follows the QoS unless overridden with
/// [`Resources::time_limit`]. Memory is not stored: it is derived from
/// the cpu count and the queue through a [`MemoryTable`].
///
/// # Example
///
/// ```rust
/// use galop::executor::job::{Qos, Resources};
///
/// let res = Resources::new("normal", 36).qos(Some(Qos::Long));
/// assert_eq!(res.time_limit, 259200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    pub queue: String,
    pub cpus: u32,
    pub qos: Option<Qos>,
    pub time_limit: u64,
}

impl Resources {
    pub fn new(queue: &str, cpus: u32) -> Self {
        Self {
            queue: queue.to_string(),
            cpus,
            qos: None,
            time_limit: DEFAULT_TIME_LIMIT,
        }
    }

    /// Set the QoS and the time limit it implies
    pub fn qos(mut self, qos: Option<Qos>) -> Self {
        self.qos = qos;
        self.time_limit = time_limit(qos);
        self
    }

    /// Override the wall-clock limit, in seconds
    pub fn time_limit(mut self, seconds: u64) -> Self {
        self.time_limit = seconds;
        self
    }

    /// Memory request in GB
    pub fn memory(&self, table: &MemoryTable) -> u64 {
        table.memory(self.cpus, &self.queue)
    }
}

/// Condition a dependent job waits for. Only "predecessor succeeded" is
/// supported by the scheduler directives we emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyType {
    #[default]
    AfterOk,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyType::AfterOk => write!(f, "afterok"),
        }
    }
}

/// Ordered set of predecessor jobs together with the condition that
/// applies to all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dependencies {
    jobs: Vec<JobHandle>,
    kind: DependencyType,
}

impl Dependencies {
    /// No dependency, the job is eligible to start immediately
    pub fn none() -> Self {
        Self::default()
    }

    /// Start only after every job in `jobs` succeeded. Duplicates are
    /// dropped, first occurrence wins.
    pub fn after_ok<I>(jobs: I) -> Self
    where
        I: IntoIterator<Item = JobHandle>,
    {
        let mut unique: Vec<JobHandle> = Vec::new();
        for job in jobs {
            if !unique.contains(&job) {
                unique.push(job);
            }
        }

        Self {
            jobs: unique,
            kind: DependencyType::AfterOk,
        }
    }

    /// Convenience for the common "maybe one predecessor" case
    pub fn after_opt(job: Option<JobHandle>) -> Self {
        Self::after_ok(job)
    }

    pub fn jobs(&self) -> &[JobHandle] {
        &self.jobs
    }

    pub fn kind(&self) -> DependencyType {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Lifecycle of a job inside one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Registered, not yet rendered
    Pending,
    /// Script rendered in no-launch mode, never handed to the submitter
    NotLaunched,
    /// Accepted by the scheduler, outcome unknown
    Submitted,
    Succeeded,
    Failed,
    /// A dependency failed, the job was never executed
    Skipped,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending | JobState::Submitted)
    }

    /// Whether dependents may still run after this job
    pub fn blocks_dependents(&self) -> bool {
        matches!(self, JobState::Failed | JobState::Skipped)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::NotLaunched => "not-launched",
            JobState::Submitted => "submitted",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Identifier a job resolves to once processed by the runner
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobId {
    /// Identifier returned by the scheduler's submit command
    Scheduler(String),
    /// Job executed as a local subprocess
    Local(usize),
    /// No-launch mode, never submitted
    Placeholder(usize),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Scheduler(id) => write!(f, "{}", id),
            JobId::Local(index) => write!(f, "local.{}", index),
            JobId::Placeholder(index) => write!(f, "nolaunch.{}", index),
        }
    }
}

/// Paths of the script and of the files its output is redirected to.
/// `<name>.sh` maps to `<name>.o` and `<name>.e`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPaths {
    pub script: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

impl ScriptPaths {
    pub fn new(dir: &Path, name: &str) -> Self {
        let script = dir.join(format!("{}.{}", name, SCRIPT_EXT));
        let stdout = script.with_extension(STDOUT_EXT);
        let stderr = script.with_extension(STDERR_EXT);

        Self {
            script,
            stdout,
            stderr,
        }
    }
}

/// A unit of work registered in a runner
///
/// Everything but the run bookkeeping (`state`, `id`, `exit_code`,
/// `submitted_at`) is fixed at registration.
#[derive(Debug, Clone)]
pub struct Job {
    pub(crate) handle: JobHandle,
    pub(crate) name: String,
    pub(crate) command: String,
    pub(crate) resources: Resources,
    pub(crate) dependencies: Dependencies,
    pub(crate) paths: ScriptPaths,
    pub(crate) state: JobState,
    pub(crate) id: Option<JobId>,
    pub(crate) exit_code: Option<i32>,
    pub(crate) submitted_at: Option<DateTime<Local>>,
}

impl Job {
    pub(crate) fn new(
        handle: JobHandle,
        name: String,
        command: String,
        resources: Resources,
        dependencies: Dependencies,
        submission_dir: &Path,
    ) -> Self {
        let paths = ScriptPaths::new(submission_dir, &name);

        Self {
            handle,
            name,
            command,
            resources,
            dependencies,
            paths,
            state: JobState::Pending,
            id: None,
            exit_code: None,
            submitted_at: None,
        }
    }

    pub fn handle(&self) -> JobHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn paths(&self) -> &ScriptPaths {
        &self.paths
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn id(&self) -> Option<&JobId> {
        self.id.as_ref()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn submitted_at(&self) -> Option<DateTime<Local>> {
        self.submitted_at
    }
}

/// Builder for the multi-line shell payload of a job
///
/// # Example
///
/// ```rust
/// use galop::executor::job::Payload;
///
/// let cmd = Payload::new()
///     .line("cd Assembly/Flye/")
///     .line("flye")
///     .arg("--nano-hq")
///     .args(&["reads.fastq", "-t", "36"])
///     .build();
///
/// assert_eq!(cmd, "cd Assembly/Flye/\nflye --nano-hq reads.fastq -t 36\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Payload {
    lines: Vec<String>,
}

impl Payload {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Start a new line
    pub fn line<S: AsRef<str>>(mut self, line: S) -> Self {
        self.lines.push(line.as_ref().to_string());
        self
    }

    /// Add an empty line
    pub fn blank(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    /// Append an argument to the current line
    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        match self.lines.last_mut() {
            Some(last) => {
                if !last.is_empty() {
                    last.push(' ');
                }
                last.push_str(arg.as_ref());
            }
            None => self.lines.push(arg.as_ref().to_string()),
        }
        self
    }

    /// Append several arguments to the current line
    pub fn args<S: AsRef<str>>(mut self, args: &[S]) -> Self {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    pub fn build(self) -> String {
        let mut cmd = self.lines.join("\n");
        cmd.push('\n');
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_limit_follows_qos() {
        assert_eq!(time_limit(None), 86400);
        assert_eq!(time_limit(Some(Qos::Long)), 259200);
        assert_eq!(time_limit(Some(Qos::Week)), 604800);
        assert_eq!(time_limit(Some(Qos::Xlarge)), 604800);
        assert_eq!(time_limit(Some(Qos::Xxlarge)), 604800);
        assert_eq!(time_limit(Some(Qos::Nolimit)), 100 * 86400);
    }

    #[test]
    fn qos_parses_case_insensitively() {
        assert_eq!("WEEK".parse::<Qos>(), Ok(Qos::Week));
        assert_eq!("forever".parse::<Qos>(), Err("unknown QoS: forever".to_string()));
        assert_eq!(Qos::Nolimit.to_string(), "nolimit");
    }

    #[test]
    fn resources_override_time_limit() {
        let res = Resources::new("normal", 4)
            .qos(Some(Qos::Week))
            .time_limit(3600);
        assert_eq!(res.time_limit, 3600);
        assert_eq!(res.qos, Some(Qos::Week));
    }

    #[test]
    fn dependencies_are_an_ordered_set() {
        let a = JobHandle { runner: 0, index: 0 };
        let b = JobHandle { runner: 0, index: 1 };
        let deps = Dependencies::after_ok([b, a, b]);

        assert_eq!(deps.jobs(), &[b, a]);
        assert_eq!(deps.kind(), DependencyType::AfterOk);
        assert!(Dependencies::after_opt(None).is_empty());
    }

    #[test]
    fn script_paths_swap_extension() {
        let paths = ScriptPaths::new(Path::new("/out/Submission_scripts"), "hapog_1");

        assert_eq!(paths.script, PathBuf::from("/out/Submission_scripts/hapog_1.sh"));
        assert_eq!(paths.stdout, PathBuf::from("/out/Submission_scripts/hapog_1.o"));
        assert_eq!(paths.stderr, PathBuf::from("/out/Submission_scripts/hapog_1.e"));
    }

    #[test]
    fn payload_joins_lines() {
        let cmd = Payload::new().line("a").blank().arg("b").build();
        assert_eq!(cmd, "a\nb\n");

        let cmd = Payload::new().arg("x").arg("y").build();
        assert_eq!(cmd, "x y\n");
    }

    #[test]
    fn job_ids_render_distinctly() {
        assert_eq!(JobId::Scheduler("1234".into()).to_string(), "1234");
        assert_eq!(JobId::Local(2).to_string(), "local.2");
        assert_eq!(JobId::Placeholder(2).to_string(), "nolaunch.2");
    }
}
