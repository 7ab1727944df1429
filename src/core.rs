pub mod assemblies;
pub mod checks;
pub mod layout;
pub mod polishing;
pub mod readsets;

use log::info;
use std::path::{Path, PathBuf};

use crate::cli::{Args, AssemblyArgs, PolishingArgs, SubArgs, SubmissionArgs};
use crate::config::{Config, SubmissionContext};
use crate::consts::*;
use crate::error::{GalopError, Result};
use crate::executor::job::{Qos, Resources};
use crate::executor::manager::{RunSummary, Runner};

use assemblies::AssemblyPlan;
use polishing::PolishingPlan;
use readsets::{ReadsetJobs, ReadsetPlan, Technology};

/// Settings shared by every job of one pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Directory holding the bundled binaries and the `benchme` wrapper
    pub tools: PathBuf,
    pub queue: String,
    pub cores: u32,
    pub qos: Option<Qos>,
    /// Block at the end of the stage until its jobs are terminal
    pub wait: bool,
}

impl Stage {
    pub fn resources(&self) -> Resources {
        Resources::new(&self.queue, self.cores).qos(self.qos)
    }

    /// Path of a bundled tool, as it appears in job commands
    pub fn tool(&self, relative: &str) -> String {
        self.tools.join(relative).display().to_string()
    }

    pub fn benchme(&self) -> String {
        self.tool(BENCHME)
    }
}

/// Run the selected pipeline step.
///
/// Options are validated and the directory tree is built before the first
/// job is registered. Jobs that failed or were skipped turn into
/// [`GalopError::JobsFailed`].
pub fn run(args: Args) -> Result<RunSummary> {
    let Args {
        command,
        submission,
    } = args;

    let config = match &submission.config {
        Some(path) => Config::read(path)?,
        None => Config::default(),
    };

    let summary = match command {
        SubArgs::Assembly { args } => assembly(&submission, &args, &config)?,
        SubArgs::Polishing { args } => polishing(&submission, &args, &config)?,
    };

    if summary.has_failures() {
        return Err(GalopError::JobsFailed(summary.failed + summary.skipped));
    }

    Ok(summary)
}

fn new_runner(submission: &SubmissionArgs, output: &Path, config: &Config) -> Runner {
    let context = SubmissionContext::new(&submission.account, submission.submode, output)
        .no_launch(submission.nolaunch)
        .verbose(submission.verbose);

    Runner::new(context, config)
}

fn assembly(submission: &SubmissionArgs, args: &AssemblyArgs, config: &Config) -> Result<RunSummary> {
    let output = checks::assembly_output(submission.dir.as_deref())?;
    let projects = checks::projects(&args.proj)?;
    checks::input(args.input.as_deref(), submission.force, &projects)?;
    let assemblers = checks::parse_list(&args.assemblers)?;
    let readsets = checks::parse_list(&args.readsets)?;
    let genome_size = checks::genome_size(args.size)?;
    let input = args.input.as_deref().map(checks::absolute).transpose()?;

    if submission.force {
        layout::require_existing(&output)?;
    } else {
        layout::create_assembly_tree(&output)?;
    }

    let stage = Stage {
        tools: submission.tools_dir()?,
        queue: args.assembly_queue.clone(),
        cores: args.assembly_cores,
        qos: submission.qos,
        wait: submission.wait,
    };
    let mut runner = new_runner(submission, &output, config);

    let readset_jobs = if args.no_readset {
        info!("INFO: readset creation disabled");
        ReadsetJobs::default()
    } else {
        let plan = ReadsetPlan {
            input,
            projects,
            genome_size,
            coverage: args.cov,
            readsets: readsets.clone(),
            all_readsets: args.all_readsets,
            technology: if args.pacbio {
                Technology::Pacbio
            } else {
                Technology::Nanopore
            },
        };
        readsets::launch(&mut runner, &stage, &plan)?
    };

    let plan = AssemblyPlan {
        genome_size,
        assemblers,
        readsets,
        nano_hq: !args.nano_raw,
        output,
    };
    assemblies::launch(&mut runner, &stage, &plan, &readset_jobs)?;

    Ok(runner.summary())
}

fn polishing(submission: &SubmissionArgs, args: &PolishingArgs, config: &Config) -> Result<RunSummary> {
    let assembly = checks::assembly(args.assembly.as_deref())?;
    let output = checks::polishing_output(submission.dir.as_deref(), args.assembly_dir.as_deref())?;
    checks::paired_ends(&args.pe1, &args.pe2)?;
    checks::medaka_model(args.no_medaka, &args.model)?;

    let assembly_dir = match &args.assembly_dir {
        Some(dir) => checks::absolute(dir)?,
        None => output.clone(),
    };

    if submission.force {
        layout::require_existing(&output)?;
    } else {
        layout::create_polishing_tree(&output)?;
    }

    let stage = Stage {
        tools: submission.tools_dir()?,
        queue: args.polishing_queue.clone(),
        cores: args.polishing_cores,
        qos: submission.qos,
        wait: submission.wait,
    };
    let mut runner = new_runner(submission, &output, config);

    let plan = PolishingPlan {
        assembly,
        assembly_dir,
        output,
        racon: args.racon,
        medaka_model: (!args.no_medaka).then(|| args.model.clone()),
        pe1: args
            .pe1
            .iter()
            .map(|pe| checks::absolute(pe))
            .collect::<Result<_>>()?,
        pe2: args
            .pe2
            .iter()
            .map(|pe| checks::absolute(pe))
            .collect::<Result<_>>()?,
    };
    polishing::launch(&mut runner, &stage, &plan)?;

    Ok(runner.summary())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_resources_follow_qos() {
        let stage = Stage {
            tools: PathBuf::from("/opt/galop/tools"),
            queue: "xlarge".to_string(),
            cores: 36,
            qos: Some(Qos::Week),
            wait: false,
        };

        let res = stage.resources();
        assert_eq!(res.queue, "xlarge");
        assert_eq!(res.cpus, 36);
        assert_eq!(res.time_limit, WEEK_TIME_LIMIT);
        assert_eq!(stage.benchme(), "/opt/galop/tools/benchme");
        assert_eq!(stage.tool("flye/bin/flye"), "/opt/galop/tools/flye/bin/flye");
    }
}
