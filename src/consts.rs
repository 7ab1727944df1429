// project-wide names
pub const GALOP: &str = "galop";
pub const DEFAULT_OUTPUT: &str = "nanopore_assembly";
pub const TOOLS: &str = "tools";
pub const BENCHME: &str = "benchme";

// directory tree
pub const SUBMISSION_SCRIPTS: &str = "Submission_scripts";
pub const READS: &str = "Reads";
pub const ASSEMBLY: &str = "Assembly";
pub const POLISHING: &str = "Polishing";
pub const ASSEMBLER_DIRS: &[&str] = &["Smartdenovo", "Raven", "Wtdbg2", "Flye", "Hifiasm"];
pub const POLISHING_DIRS: &[&str] = &["Racon", "Medaka", "Hapog"];

// script extensions
pub const SCRIPT_EXT: &str = "sh";
pub const STDOUT_EXT: &str = "o";
pub const STDERR_EXT: &str = "e";

// scheduler defaults
pub const SUBMIT_CMD: &str = "ccc_msub";
pub const QUERY_CMD: &str = "sacct";
pub const LOCAL_SHELL: &str = "bash";
pub const DEFAULT_QUEUE: &str = "normal";
pub const DEFAULT_CORES: u32 = 36;
pub const READSET_CORES: u32 = 2;
pub const POLL_INTERVAL_SECS: u64 = 60;
pub const RETRY_BACKOFF_SECS: u64 = 30;
pub const MAX_QUERY_FAILURES: u32 = 5;

// memory tiers, GB per cpu
pub const DEFAULT_GB_PER_CPU: u64 = 10;
pub const LARGE_GB_PER_CPU: u64 = 30;
pub const LARGE_MEMORY_QUEUES: &[&str] = &["xlarge", "xxlarge"];

// wall-clock limits, seconds
pub const DAY: u64 = 24 * 60 * 60;
pub const DEFAULT_TIME_LIMIT: u64 = DAY;
pub const LONG_TIME_LIMIT: u64 = 3 * DAY;
pub const WEEK_TIME_LIMIT: u64 = 7 * DAY;
pub const NOLIMIT_TIME_LIMIT: u64 = 100 * DAY;

// readset files
pub const FULL_FASTQ: &str = "Reads/full.fastq";
pub const FULL_FILT_FASTQ: &str = "Reads/full_filt.fastq";
pub const FILTLONG_FASTQ: &str = "Reads/filtlong.fastq";
pub const LONGEST_FASTQ: &str = "Reads/longest.fastq";
pub const USED_READSETS: &str = "Reads/used_readsets.txt";

// tool defaults
pub const MEDAKA_MODEL: &str = "r941_prom_sup_g507";
pub const MEDAKA_IMAGE: &str = "/env/cns/bigtmp2/ONT/container/singularity_files/medaka/medaka.img";
pub const NEXTDENOVO_CFG: &str = "/env/ig/soft/rdbioseq/nextdenovo_rdbioseq/2.5.1/doc/run_wrapper.cfg";
pub const PROJECTS_ROOT: &str = "/env/cns/proj";
pub const MIN_CONTIG: u32 = 2000;
pub const HAPOG_ROUNDS: usize = 2;
pub const DEFAULT_ASSEMBLERS: &str = "Smartdenovo,Wtdbg2,Flye,Necat,Nextdenovo";
pub const DEFAULT_READSETS: &str = "Full,Filtlong,Longest";
pub const DEFAULT_COVERAGE: u32 = 30;
