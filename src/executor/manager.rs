use hashbrown::HashMap;
use log::{debug, error, info, warn};

use std::fmt;
use std::path::MAIN_SEPARATOR;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::{Config, MemoryTable, SubmissionContext, SubmissionMode};
use crate::consts::*;
use crate::error::{GalopError, Result};
use crate::executor::job::{Dependencies, Job, JobHandle, JobId, JobState, Resources, ScriptPaths};
use crate::executor::parser::QueryState;
use crate::executor::script::{render, write_script};
use crate::executor::submit::{LocalSubmitter, SchedulerSubmitter, Submission, Submitter};

static NEXT_RUNNER: AtomicU64 = AtomicU64::new(0);

/// Bounded retries for rejected submissions
///
/// The n-th retry waits `backoff * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(RETRY_BACKOFF_SECS))
    }
}

/// Job counts per state after a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pending: usize,
    pub not_launched: usize,
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed + self.skipped > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} submitted, {} succeeded, {} failed, {} skipped, {} not launched, {} pending",
            self.submitted,
            self.succeeded,
            self.failed,
            self.skipped,
            self.not_launched,
            self.pending
        )
    }
}

/// Job dependency graph and submission driver
///
/// Jobs are registered with [`Runner::add_job`] and processed in creation
/// order by [`Runner::run`]. A dependency must be registered before its
/// dependents, so creation order is always a topological order of the
/// graph and the graph can never contain a cycle.
pub struct Runner {
    id: u64,
    context: SubmissionContext,
    memory: MemoryTable,
    submitter: Box<dyn Submitter>,
    retry: RetryPolicy,
    poll_interval: Duration,
    jobs: Vec<Job>,
    names: HashMap<String, JobHandle>,
}

impl Runner {
    /// Create a runner submitting through the scheduler or locally,
    /// depending on `context.mode`
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// use galop::config::{Config, SubmissionContext, SubmissionMode};
    /// use galop::executor::manager::Runner;
    /// use std::path::Path;
    ///
    /// let context = SubmissionContext::new("genoscope", SubmissionMode::Scheduler, Path::new("/out"));
    /// let runner = Runner::new(context, &Config::default());
    ///
    /// assert!(runner.jobs().is_empty());
    /// ```
    pub fn new(context: SubmissionContext, config: &Config) -> Self {
        let submitter: Box<dyn Submitter> = match context.mode {
            SubmissionMode::Scheduler => Box::new(SchedulerSubmitter::new(
                &config.scheduler,
                &context.work_dir,
            )),
            SubmissionMode::Local => Box::new(LocalSubmitter::new(&context.work_dir)),
        };

        Self::with_submitter(context, config.memory.clone(), submitter)
            .retry(config.scheduler.retry_policy())
            .poll_interval(config.scheduler.poll_interval())
    }

    /// Create a runner around an arbitrary submitter
    pub fn with_submitter(
        context: SubmissionContext,
        memory: MemoryTable,
        submitter: Box<dyn Submitter>,
    ) -> Self {
        Self {
            id: NEXT_RUNNER.fetch_add(1, Ordering::Relaxed),
            context,
            memory,
            submitter,
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            jobs: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn context(&self) -> &SubmissionContext {
        &self.context
    }

    /// All jobs, in creation order
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, handle: JobHandle) -> Option<&Job> {
        self.resolve(handle).map(|index| &self.jobs[index])
    }

    pub fn state(&self, handle: JobHandle) -> Option<JobState> {
        self.job(handle).map(|job| job.state)
    }

    /// Look a job up by name
    pub fn handle(&self, name: &str) -> Option<JobHandle> {
        self.names.get(name).copied()
    }

    /// Register a job. Nothing touches the disk until [`Runner::run`].
    ///
    /// # Arguments
    ///
    /// * `command` - Opaque shell payload, appended verbatim to the script
    /// * `name` - Unique name, also the script's file stem
    /// * `resources` - Queue, cpus, QoS and time limit
    /// * `dependencies` - Jobs previously registered in this runner
    ///
    /// # Errors
    ///
    /// `DuplicateName`, `DanglingDependency`, `EmptyCommand` or
    /// `InvalidName`. The runner is left untouched on error.
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// use galop::config::{Config, SubmissionContext, SubmissionMode};
    /// use galop::executor::job::{Dependencies, Resources};
    /// use galop::executor::manager::Runner;
    /// use std::path::Path;
    ///
    /// let context = SubmissionContext::new("genoscope", SubmissionMode::Local, Path::new("/out"));
    /// let mut runner = Runner::new(context, &Config::default());
    ///
    /// let reads = runner
    ///     .add_job("echo reads", "readsets_filtlong", Resources::new("normal", 2), Dependencies::none())
    ///     .unwrap();
    /// runner
    ///     .add_job("echo flye", "flye_filtlong", Resources::new("normal", 36), Dependencies::after_ok([reads]))
    ///     .unwrap();
    /// ```
    pub fn add_job<C, N>(
        &mut self,
        command: C,
        name: N,
        resources: Resources,
        dependencies: Dependencies,
    ) -> Result<JobHandle>
    where
        C: Into<String>,
        N: Into<String>,
    {
        let command = command.into();
        let name = name.into();

        if name.is_empty() || name == "." || name == ".." || name.contains(['/', MAIN_SEPARATOR])
        {
            return Err(GalopError::InvalidName(name));
        }

        if command.trim().is_empty() {
            return Err(GalopError::EmptyCommand(name));
        }

        if self.names.contains_key(&name) {
            return Err(GalopError::DuplicateName(name));
        }

        if let Some(dependency) = dependencies
            .jobs()
            .iter()
            .find(|dep| self.resolve(**dep).is_none())
        {
            return Err(GalopError::DanglingDependency {
                job: name,
                dependency: *dependency,
            });
        }

        if self.context.mode == SubmissionMode::Local && resources.cpus as usize > num_cpus::get()
        {
            warn!(
                "WARN: {} requests {} cpus but this host only has {}",
                name,
                resources.cpus,
                num_cpus::get()
            );
        }

        let handle = JobHandle {
            runner: self.id,
            index: self.jobs.len(),
        };

        debug!(
            "INFO: registered {} as {} after {:?}",
            name,
            handle,
            dependencies.jobs()
        );

        self.jobs.push(Job::new(
            handle,
            name.clone(),
            command,
            resources,
            dependencies,
            &self.context.submission_dir,
        ));
        self.names.insert(name, handle);

        Ok(handle)
    }

    /// Render and submit every pending job, in creation order.
    ///
    /// Jobs registered by a previous call keep their state, so a runner
    /// can be driven stage by stage. With `wait`, blocks until every
    /// scheduler job reaches a terminal state.
    ///
    /// # Errors
    ///
    /// A script that cannot be written or a submission the scheduler
    /// rejects stops the run at that job; later jobs stay pending.
    pub fn run(&mut self, wait: bool) -> Result<RunSummary> {
        let pending = self
            .jobs
            .iter()
            .filter(|job| job.state == JobState::Pending)
            .map(|job| job.handle.index)
            .collect::<Vec<_>>();

        info!(
            "INFO: processing {} job(s) [mode: {}, no-launch: {}]",
            pending.len(),
            self.context.mode,
            self.context.no_launch
        );

        for index in pending {
            self.process(index)?;
        }

        if wait && !self.context.no_launch {
            self.wait_all()?;
        }

        let summary = self.summary();
        info!("INFO: {}", summary);

        Ok(summary)
    }

    /// Counts over every job registered so far
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        for job in &self.jobs {
            match job.state {
                JobState::Pending => summary.pending += 1,
                JobState::NotLaunched => summary.not_launched += 1,
                JobState::Submitted => summary.submitted += 1,
                JobState::Succeeded => summary.succeeded += 1,
                JobState::Failed => summary.failed += 1,
                JobState::Skipped => summary.skipped += 1,
            }
        }

        summary
    }

    fn resolve(&self, handle: JobHandle) -> Option<usize> {
        (handle.runner == self.id && handle.index < self.jobs.len()).then_some(handle.index)
    }

    /// First dependency of `index` that prevents it from ever running
    fn blocking_dependency(&self, index: usize) -> Option<usize> {
        self.jobs[index]
            .dependencies
            .jobs()
            .iter()
            .map(|dep| dep.index)
            .find(|&dep| self.jobs[dep].state.blocks_dependents())
    }

    fn process(&mut self, index: usize) -> Result<()> {
        if let Some(dep) = self.blocking_dependency(index) {
            warn!(
                "WARN: skipping {}: dependency {} is {}",
                self.jobs[index].name, self.jobs[dep].name, self.jobs[dep].state
            );
            self.jobs[index].state = JobState::Skipped;
            return Ok(());
        }

        // INFO: dependencies precede their dependents, all are resolved here
        let dependency_ids = self.jobs[index]
            .dependencies
            .jobs()
            .iter()
            .filter_map(|dep| self.jobs[dep.index].id.clone())
            .collect::<Vec<_>>();

        let script = render(
            &self.jobs[index],
            &dependency_ids,
            &self.context,
            &self.memory,
        );
        let paths = self.jobs[index].paths.clone();
        write_script(&paths.script, &script)?;

        if self.context.verbose {
            info!("-- {}", paths.script.display());
        } else {
            debug!("-- {}", paths.script.display());
        }

        if self.context.no_launch {
            let job = &mut self.jobs[index];
            job.id = Some(JobId::Placeholder(index));
            job.state = JobState::NotLaunched;
            return Ok(());
        }

        let submission = match self.submit_with_retry(&paths) {
            Ok(submission) => submission,
            Err(e) => {
                self.jobs[index].state = JobState::Failed;
                return Err(e);
            }
        };

        let job = &mut self.jobs[index];
        job.submitted_at = Some(chrono::Local::now());

        match submission {
            Submission::Queued(id) => {
                info!(
                    "INFO: Successfully submitted {} with jobid {}",
                    job.name, id
                );
                job.id = Some(JobId::Scheduler(id));
                job.state = JobState::Submitted;
            }
            Submission::Finished { exit_code } => {
                job.id = Some(JobId::Local(index));
                job.exit_code = exit_code;

                if exit_code == Some(0) {
                    info!("INFO: {} finished successfully", job.name);
                    job.state = JobState::Succeeded;
                } else {
                    error!(
                        "ERROR: {} failed with exit code {:?}, see {}",
                        job.name,
                        exit_code,
                        paths.stderr.display()
                    );
                    job.state = JobState::Failed;
                }
            }
        }

        Ok(())
    }

    fn submit_with_retry(&mut self, paths: &ScriptPaths) -> Result<Submission> {
        let mut attempt = 1;

        loop {
            match self.submitter.submit(paths) {
                Ok(submission) => return Ok(submission),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "WARN: attempt {}/{} failed: {}. Retrying in {:?}...",
                        attempt, self.retry.max_attempts, e, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll the scheduler until no job is left in `Submitted`.
    fn wait_all(&mut self) -> Result<()> {
        let start = chrono::Local::now();
        let mut failed_polls = 0;

        loop {
            self.skip_orphans();

            let active = self
                .jobs
                .iter()
                .filter(|job| job.state == JobState::Submitted)
                .map(|job| job.handle.index)
                .collect::<Vec<_>>();

            if active.is_empty() {
                break;
            }

            if self.poll(&active) {
                failed_polls = 0;
            } else {
                failed_polls += 1;
                if failed_polls >= MAX_QUERY_FAILURES {
                    return Err(GalopError::Query {
                        id: active
                            .iter()
                            .map(|&index| self.jobs[index].name.as_str())
                            .collect::<Vec<_>>()
                            .join(","),
                        reason: format!("{} consecutive polls failed", failed_polls),
                    });
                }
            }

            let remaining = self
                .jobs
                .iter()
                .filter(|job| job.state == JobState::Submitted)
                .count();
            if remaining == 0 {
                self.skip_orphans();
                break;
            }

            debug!(
                "INFO: {} job(s) still running after {}s",
                remaining,
                (chrono::Local::now() - start).num_seconds()
            );
            std::thread::sleep(self.poll_interval);
        }

        info!(
            "INFO: all jobs reached a terminal state after {}s",
            (chrono::Local::now() - start).num_seconds()
        );

        Ok(())
    }

    /// Query each active job once. Returns false when every query failed.
    fn poll(&mut self, active: &[usize]) -> bool {
        let mut answered = false;

        for &index in active {
            // INFO: dependencies come first, a failure earlier in this pass counts
            if self.skip_if_orphaned(index) {
                continue;
            }

            let id = match &self.jobs[index].id {
                Some(JobId::Scheduler(id)) => id.clone(),
                _ => continue,
            };

            match self.submitter.query(&id) {
                Ok(QueryState::Active) => answered = true,
                Ok(QueryState::Succeeded) => {
                    answered = true;
                    info!("INFO: {} ({}) completed", self.jobs[index].name, id);
                    self.jobs[index].state = JobState::Succeeded;
                }
                Ok(QueryState::Failed) => {
                    answered = true;
                    error!(
                        "ERROR: {} ({}) failed, see {}",
                        self.jobs[index].name,
                        id,
                        self.jobs[index].paths.stderr.display()
                    );
                    self.jobs[index].state = JobState::Failed;
                }
                Err(e) => warn!("WARN: {}", e),
            }
        }

        answered
    }

    /// Submitted jobs behind a failed dependency will never be started by
    /// the scheduler. There is no cancel path, so they are only marked.
    fn skip_orphans(&mut self) {
        for index in 0..self.jobs.len() {
            if self.jobs[index].state == JobState::Submitted {
                self.skip_if_orphaned(index);
            }
        }
    }

    fn skip_if_orphaned(&mut self, index: usize) -> bool {
        let Some(dep) = self.blocking_dependency(index) else {
            return false;
        };

        warn!(
            "WARN: {} ({}) will never start: dependency {} is {}",
            self.jobs[index].name,
            self.jobs[index]
                .id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            self.jobs[dep].name,
            self.jobs[dep].state
        );
        self.jobs[index].state = JobState::Skipped;

        true
    }
}
