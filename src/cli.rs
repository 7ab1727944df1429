use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SubmissionMode;
use crate::consts::*;
use crate::error::{GalopError, Result};
use crate::executor::job::Qos;

pub const QUEUES: &[&str] = &["normal", "xlarge", "small", "broadwell", "xxlarge"];

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Genome assembly pipeline: renders and submits batch jobs with afterok dependencies",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubArgs,

    #[command(flatten)]
    pub submission: SubmissionArgs,
}

#[derive(Debug, Subcommand)]
pub enum SubArgs {
    #[command(name = "assembly")]
    Assembly {
        #[command(flatten)]
        args: AssemblyArgs,
    },
    #[command(name = "polishing")]
    Polishing {
        #[command(flatten)]
        args: PolishingArgs,
    },
}

/// Options shared by both steps
///
/// # Example
///
/// ```bash,no_run
/// galop --submode local --nolaunch assembly -i reads.fastq -s 12
/// ```
#[derive(Debug, Parser, Clone)]
pub struct SubmissionArgs {
    #[arg(
        long = "submode",
        help = "Either submit with the cluster scheduler or run in local mode",
        value_name = "MODE",
        default_value = "msub",
        global = true
    )]
    pub submode: SubmissionMode,

    #[arg(
        long = "nolaunch",
        help = "Create submission scripts but do not launch them",
        global = true
    )]
    pub nolaunch: bool,

    #[arg(
        long = "account",
        help = "Account to use for submission",
        value_name = "ACCOUNT",
        env = "USER",
        default_value = GALOP,
        global = true
    )]
    pub account: String,

    #[arg(
        long = "qos",
        help = "QoS to use for submission [long, week, nolimit, xlarge, xxlarge]",
        value_name = "QOS",
        global = true
    )]
    pub qos: Option<Qos>,

    #[arg(
        long = "wait",
        help = "Wait for all jobs of a stage to finish before moving on",
        global = true
    )]
    pub wait: bool,

    #[arg(
        short = 'd',
        long = "dir",
        help = "Output directory",
        value_name = "DIR",
        global = true
    )]
    pub dir: Option<PathBuf>,

    #[arg(long = "force", help = "Skip directory creation", global = true)]
    pub force: bool,

    #[arg(
        long = "tools",
        help = "Directory with the bundled tools [default: <galop dir>/tools]",
        value_name = "DIR",
        global = true
    )]
    pub tools: Option<PathBuf>,

    #[arg(
        long = "config",
        help = "Optional TOML file with scheduler and memory settings",
        value_name = "TOML",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Log every submission script",
        global = true
    )]
    pub verbose: bool,
}

impl SubmissionArgs {
    /// `--tools`, or the `tools` directory next to the executable
    pub fn tools_dir(&self) -> Result<PathBuf> {
        if let Some(tools) = &self.tools {
            return Ok(tools.clone());
        }

        let exe = std::env::current_exe()?;
        exe.parent().map(|dir| dir.join(TOOLS)).ok_or_else(|| {
            GalopError::InvalidOption(format!(
                "cannot locate the tools directory next to {}, use --tools",
                exe.display()
            ))
        })
    }
}

/// Build readsets and launch assemblers
///
/// # Example
///
/// ```bash,no_run
/// galop assembly -p BCM,A,B -p BWW,AB -s 450 --assemblers Flye,Raven
/// galop --nolaunch assembly -i reads.fastq -s 12 --readsets Full
/// ```
///
/// # Note
///
/// * Either `--proj` or `-i` is required, unless `--force` is given
/// * Necat and Nextdenovo only run on the full readset
#[derive(Debug, Parser, Clone)]
pub struct AssemblyArgs {
    #[arg(
        short = 'p',
        long = "proj",
        help = "Project and material codes, can be given multiple times (eg. -p BCM,A,B -p BWW,AB)",
        value_name = "CODE,MATERIAL"
    )]
    pub proj: Vec<String>,

    #[arg(short = 'i', help = "Nanopore reads fastq file", value_name = "FASTQ")]
    pub input: Option<PathBuf>,

    #[arg(
        short = 's',
        long = "size",
        help = "Estimated size of the genome in Mb",
        value_name = "MB"
    )]
    pub size: Option<f64>,

    #[arg(
        short = 'c',
        long = "cov",
        help = "Coverage to use for longest and filtlong subsets",
        value_name = "COV",
        default_value_t = DEFAULT_COVERAGE
    )]
    pub cov: u32,

    #[arg(
        long = "assemblers",
        help = "Comma-separated list of assemblers. Choices: Flye, Hifiasm, Necat, Nextdenovo, Raven, Shasta, Smartdenovo, Wtdbg2",
        value_name = "LIST",
        default_value = DEFAULT_ASSEMBLERS
    )]
    pub assemblers: String,

    #[arg(
        long = "readsets",
        help = "Comma-separated list of readsets. Choices: Full, Filtlong, Longest",
        value_name = "LIST",
        default_value = DEFAULT_READSETS
    )]
    pub readsets: String,

    #[arg(long = "no-readset", help = "Disable readset creation")]
    pub no_readset: bool,

    #[arg(
        long = "all-readsets",
        help = "Use every run on disk instead of the runs validated by lsRunProj"
    )]
    pub all_readsets: bool,

    #[arg(long = "nano-raw", help = "Use --nano-raw instead of --nano-hq in Flye")]
    pub nano_raw: bool,

    #[arg(long = "pacbio", help = "Look for PacBio runs when building readsets")]
    pub pacbio: bool,

    #[arg(
        long = "assembly-queue",
        alias = "assembly_queue",
        help = "Cluster queue to use for the assembly step",
        value_name = "QUEUE",
        default_value = DEFAULT_QUEUE,
        value_parser = PossibleValuesParser::new(QUEUES.iter().copied())
    )]
    pub assembly_queue: String,

    #[arg(
        long = "assembly-cores",
        alias = "assembly_core",
        help = "Number of cores to use for the assembly step",
        value_name = "N",
        default_value_t = DEFAULT_CORES
    )]
    pub assembly_cores: u32,
}

/// Polish an assembly with Racon, medaka and Hapo-G
///
/// # Example
///
/// ```bash,no_run
/// galop polishing -a asm/Assembly/Flye/full.fasta --assembly-dir asm --pe1 r1.fq.gz --pe2 r2.fq.gz
/// ```
#[derive(Debug, Parser, Clone)]
pub struct PolishingArgs {
    #[arg(
        short = 'm',
        long = "model",
        help = "Model to use for medaka polishing",
        value_name = "MODEL",
        default_value = MEDAKA_MODEL
    )]
    pub model: String,

    #[arg(
        long = "pe1",
        help = "Path to an Illumina R1 file (.gz or .fastq), can be given multiple times",
        value_name = "FASTQ"
    )]
    pub pe1: Vec<PathBuf>,

    #[arg(
        long = "pe2",
        help = "Path to an Illumina R2 file (.gz or .fastq), can be given multiple times",
        value_name = "FASTQ"
    )]
    pub pe2: Vec<PathBuf>,

    #[arg(
        short = 'a',
        long = "assembly",
        help = "Assembly to polish",
        value_name = "FASTA"
    )]
    pub assembly: Option<PathBuf>,

    #[arg(
        long = "assembly-dir",
        alias = "assembly_dir",
        help = "Output directory of the assembly step",
        value_name = "DIR"
    )]
    pub assembly_dir: Option<PathBuf>,

    #[arg(long = "racon", help = "Enable the racon step")]
    pub racon: bool,

    #[arg(long = "no-medaka", alias = "no_medaka", help = "Skip the medaka step")]
    pub no_medaka: bool,

    #[arg(
        long = "polishing-queue",
        alias = "polishing_queue",
        help = "Cluster queue to use for the polishing step",
        value_name = "QUEUE",
        default_value = DEFAULT_QUEUE,
        value_parser = PossibleValuesParser::new(QUEUES.iter().copied())
    )]
    pub polishing_queue: String,

    #[arg(
        long = "polishing-cores",
        alias = "polishing_core",
        help = "Number of cores to use for the polishing step",
        value_name = "N",
        default_value_t = DEFAULT_CORES
    )]
    pub polishing_cores: u32,
}
