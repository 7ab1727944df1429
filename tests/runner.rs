use std::fs;
use std::path::Path;

use galop::config::{Config, SubmissionContext, SubmissionMode};
use galop::error::GalopError;
use galop::executor::job::{Dependencies, JobId, JobState, Resources};
use galop::executor::manager::Runner;

fn local_runner(dir: &Path, no_launch: bool) -> Runner {
    let context = SubmissionContext::new("tester", SubmissionMode::Local, dir).no_launch(no_launch);
    fs::create_dir_all(&context.submission_dir).unwrap();

    Runner::new(context, &Config::default())
}

fn res() -> Resources {
    Resources::new("normal", 1)
}

#[test]
fn local_jobs_run_in_dependency_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = local_runner(dir.path(), false);

    let a = runner
        .add_job("echo A >> order.txt", "A", res(), Dependencies::none())
        .unwrap();
    let b = runner
        .add_job("echo B >> order.txt", "B", res(), Dependencies::after_ok([a]))
        .unwrap();

    let summary = runner.run(true).unwrap();

    assert_eq!(summary.succeeded, 2);
    assert!(!summary.has_failures());
    assert_eq!(fs::read_to_string(dir.path().join("order.txt")).unwrap(), "A\nB\n");

    let job_b = runner.job(b).unwrap();
    assert_eq!(job_b.state(), JobState::Succeeded);
    assert_eq!(job_b.exit_code(), Some(0));
    assert_eq!(runner.job(a).unwrap().id(), Some(&JobId::Local(0)));

    let script = fs::read_to_string(&job_b.paths().script).unwrap();
    assert!(script.contains("#MSUB -E --dependency=afterok:local.0\n"));
    assert!(script.ends_with("\necho B >> order.txt\n"));

    let a_started = fs::metadata(&runner.job(a).unwrap().paths().stdout)
        .unwrap()
        .modified()
        .unwrap();
    let b_started = fs::metadata(&job_b.paths().stdout).unwrap().modified().unwrap();
    assert!(a_started <= b_started);
}

#[test]
fn local_failure_skips_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = local_runner(dir.path(), false);

    let a = runner
        .add_job("echo A >> order.txt\nexit 1", "A", res(), Dependencies::none())
        .unwrap();
    let b = runner
        .add_job("echo B >> order.txt", "B", res(), Dependencies::after_ok([a]))
        .unwrap();
    let c = runner
        .add_job("echo C >> order.txt", "C", res(), Dependencies::after_ok([b]))
        .unwrap();
    let d = runner
        .add_job("echo D >> order.txt", "D", res(), Dependencies::none())
        .unwrap();

    let summary = runner.run(false).unwrap();

    assert_eq!(runner.state(a), Some(JobState::Failed));
    assert_eq!(runner.job(a).unwrap().exit_code(), Some(1));
    assert_eq!(runner.state(b), Some(JobState::Skipped));
    assert_eq!(runner.state(c), Some(JobState::Skipped));
    assert_eq!(runner.state(d), Some(JobState::Succeeded));
    assert!(!runner.job(b).unwrap().paths().script.exists());

    assert_eq!(fs::read_to_string(dir.path().join("order.txt")).unwrap(), "A\nD\n");
    assert_eq!((summary.failed, summary.skipped, summary.succeeded), (1, 2, 1));
    assert!(summary.has_failures());
}

#[test]
fn no_launch_writes_scripts_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = local_runner(dir.path(), true);

    let a = runner
        .add_job("touch ran_a", "A", res(), Dependencies::none())
        .unwrap();
    runner
        .add_job("touch ran_b", "B", res(), Dependencies::after_ok([a]))
        .unwrap();

    let summary = runner.run(true).unwrap();

    assert_eq!(summary.not_launched, 2);
    for job in runner.jobs() {
        assert!(job.paths().script.exists());
        assert!(!job.paths().stdout.exists());
        assert_eq!(job.state(), JobState::NotLaunched);
        assert_eq!(job.submitted_at(), None);
    }
    assert!(!dir.path().join("ran_a").exists());
    assert!(!dir.path().join("ran_b").exists());
}

#[test]
fn stages_share_one_runner() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = local_runner(dir.path(), false);

    let reads = runner
        .add_job("echo reads > reads.txt", "reads", res(), Dependencies::none())
        .unwrap();
    runner.run(false).unwrap();

    runner
        .add_job("cat reads.txt > asm.txt", "asm", res(), Dependencies::after_ok([reads]))
        .unwrap();
    let summary = runner.run(false).unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(fs::read_to_string(dir.path().join("asm.txt")).unwrap(), "reads\n");
}

#[test]
fn registration_errors_stop_before_any_script() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = local_runner(dir.path(), false);

    runner
        .add_job("echo a", "A", res(), Dependencies::none())
        .unwrap();
    let err = runner
        .add_job("echo again", "A", res(), Dependencies::none())
        .unwrap_err();

    assert!(matches!(err, GalopError::DuplicateName(_)));
    assert_eq!(fs::read_dir(&runner.context().submission_dir).unwrap().count(), 0);
}

#[test]
fn relative_work_dir_runs_from_the_current_dir() {
    let dir = tempfile::tempdir().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let context = SubmissionContext::new("tester", SubmissionMode::Local, Path::new("out"));
    fs::create_dir_all(&context.submission_dir).unwrap();
    let mut runner = Runner::new(context, &Config::default());
    let a = runner
        .add_job("echo A > a.txt", "A", res(), Dependencies::none())
        .unwrap();
    let summary = runner.run(false);

    std::env::set_current_dir(previous).unwrap();

    assert_eq!(summary.unwrap().succeeded, 1);
    assert_eq!(runner.state(a), Some(JobState::Succeeded));
    assert!(runner.context().work_dir.is_absolute());
    assert_eq!(fs::read_to_string(dir.path().join("out/a.txt")).unwrap(), "A\n");
}
