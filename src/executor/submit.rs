use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::SchedulerConfig;
use crate::consts::*;
use crate::error::{GalopError, Result};
use crate::executor::job::ScriptPaths;
use crate::executor::parser::{parse_state, JobIdParser, QueryState};

/// Outcome of handing one script to a [`Submitter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Accepted by the scheduler under this identifier
    Queued(String),
    /// Ran to completion in the foreground. `None` when the child was
    /// killed by a signal.
    Finished { exit_code: Option<i32> },
}

/// Executes rendered scripts.
///
/// The runner only ever talks to this trait, test doubles implement it
/// to observe calls.
pub trait Submitter {
    fn submit(&mut self, paths: &ScriptPaths) -> Result<Submission>;

    fn query(&mut self, id: &str) -> Result<QueryState>;
}

/// Hands scripts to the cluster scheduler
pub struct SchedulerSubmitter {
    submit_cmd: String,
    query_cmd: String,
    parser: Box<dyn JobIdParser>,
    work_dir: PathBuf,
}

impl SchedulerSubmitter {
    pub fn new(config: &SchedulerConfig, work_dir: &Path) -> Self {
        Self {
            submit_cmd: config.submit.clone(),
            query_cmd: config.query.clone(),
            parser: Box::new(config.format),
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Swap the job-id contract, mostly useful for schedulers not covered
    /// by [`SubmitFormat`](crate::executor::parser::SubmitFormat)
    pub fn with_parser(mut self, parser: Box<dyn JobIdParser>) -> Self {
        self.parser = parser;
        self
    }
}

impl Submitter for SchedulerSubmitter {
    fn submit(&mut self, paths: &ScriptPaths) -> Result<Submission> {
        let output = Command::new(&self.submit_cmd)
            .arg(&paths.script)
            .current_dir(&self.work_dir)
            .output()
            .map_err(|e| GalopError::Submission {
                script: paths.script.clone(),
                reason: format!("could not execute {}: {}", self.submit_cmd, e),
            })?;

        if !output.status.success() {
            return Err(GalopError::Submission {
                script: paths.script.clone(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.submit_cmd,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = self.parser.parse(&stdout)?;

        Ok(Submission::Queued(id))
    }

    fn query(&mut self, id: &str) -> Result<QueryState> {
        let output = Command::new(&self.query_cmd)
            .args(["-n", "-X", "-P", "-o", "State", "-j", id])
            .output()
            .map_err(|e| GalopError::Query {
                id: id.to_string(),
                reason: format!("could not execute {}: {}", self.query_cmd, e),
            })?;

        if !output.status.success() {
            return Err(GalopError::Query {
                id: id.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_state(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Runs scripts as foreground `bash` subprocesses, stdout and stderr
/// redirected to the job's `.o` and `.e` files.
pub struct LocalSubmitter {
    shell: String,
    work_dir: PathBuf,
}

impl LocalSubmitter {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            shell: LOCAL_SHELL.to_string(),
            work_dir: work_dir.to_path_buf(),
        }
    }
}

impl Submitter for LocalSubmitter {
    fn submit(&mut self, paths: &ScriptPaths) -> Result<Submission> {
        let redirect = |path: &Path| {
            File::create(path).map_err(|source| GalopError::FileWrite {
                path: path.to_path_buf(),
                source,
            })
        };
        let stdout = redirect(&paths.stdout)?;
        let stderr = redirect(&paths.stderr)?;

        let status = Command::new(&self.shell)
            .arg(&paths.script)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .map_err(|e| GalopError::Submission {
                script: paths.script.clone(),
                reason: format!("could not execute {}: {}", self.shell, e),
            })?;

        Ok(Submission::Finished {
            exit_code: status.code(),
        })
    }

    fn query(&mut self, id: &str) -> Result<QueryState> {
        Err(GalopError::Query {
            id: id.to_string(),
            reason: "local jobs finish before submit returns and cannot be queried".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::parser::SubmitFormat;

    fn scheduler(submit: &str, dir: &Path) -> SchedulerSubmitter {
        let config = SchedulerConfig {
            submit: submit.to_string(),
            ..SchedulerConfig::default()
        };
        SchedulerSubmitter::new(&config, dir)
    }

    #[test]
    fn scheduler_parses_the_submit_output() {
        let dir = tempfile::tempdir().unwrap();
        // echo stands in for the scheduler, the "script path" is its reply
        let paths = ScriptPaths {
            script: PathBuf::from("Submitted Batch Session 31337"),
            stdout: dir.path().join("job.o"),
            stderr: dir.path().join("job.e"),
        };

        let mut submitter = scheduler("echo", dir.path());

        assert_eq!(
            submitter.submit(&paths).unwrap(),
            Submission::Queued("31337".into())
        );
    }

    #[test]
    fn scheduler_failure_is_a_submission_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut submitter = scheduler("false", dir.path());
        let paths = ScriptPaths::new(dir.path(), "job");

        let err = submitter.submit(&paths).unwrap_err();
        assert!(matches!(err, GalopError::Submission { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn scheduler_garbage_is_unparsable() {
        let dir = tempfile::tempdir().unwrap();
        let mut submitter =
            scheduler("echo", dir.path()).with_parser(Box::new(SubmitFormat::MsubV1));
        let paths = ScriptPaths::new(dir.path(), "job");

        let err = submitter.submit(&paths).unwrap_err();
        assert!(matches!(err, GalopError::UnparsableOutput { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn local_reports_the_real_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ScriptPaths::new(dir.path(), "job");
        std::fs::write(&paths.script, "echo out\necho err >&2\nexit 3\n").unwrap();

        let mut submitter = LocalSubmitter::new(dir.path());
        let result = submitter.submit(&paths).unwrap();

        assert_eq!(result, Submission::Finished { exit_code: Some(3) });
        assert_eq!(std::fs::read_to_string(&paths.stdout).unwrap(), "out\n");
        assert_eq!(std::fs::read_to_string(&paths.stderr).unwrap(), "err\n");
    }

    #[test]
    fn local_runs_in_the_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ScriptPaths::new(dir.path(), "job");
        std::fs::write(&paths.script, "touch here.txt\n").unwrap();

        LocalSubmitter::new(dir.path()).submit(&paths).unwrap();

        assert!(dir.path().join("here.txt").exists());
    }

    #[test]
    fn local_jobs_cannot_be_queried() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalSubmitter::new(dir.path()).query("local.0").is_err());
    }
}
