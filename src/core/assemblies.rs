use log::info;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::consts::*;
use crate::core::readsets::{Readset, ReadsetJobs};
use crate::core::Stage;
use crate::error::Result;
use crate::executor::job::{Dependencies, JobHandle, Payload};
use crate::executor::manager::Runner;

const AWK_GFA_TO_FASTA: &str = r#"awk '/^S/{print ">"$2;print $3}'"#;

/// Supported assemblers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assembler {
    Flye,
    Hifiasm,
    Necat,
    Nextdenovo,
    Raven,
    Shasta,
    Smartdenovo,
    Wtdbg2,
}

impl Assembler {
    /// Lowercase name used as job name prefix
    pub fn name(&self) -> &'static str {
        match self {
            Assembler::Flye => "flye",
            Assembler::Hifiasm => "hifiasm",
            Assembler::Necat => "necat",
            Assembler::Nextdenovo => "nextdenovo",
            Assembler::Raven => "raven",
            Assembler::Shasta => "shasta",
            Assembler::Smartdenovo => "smartdenovo",
            Assembler::Wtdbg2 => "wtdbg2",
        }
    }

    /// Assemblers too slow to be run on the subsets
    pub fn full_only(&self) -> bool {
        matches!(self, Assembler::Necat | Assembler::Nextdenovo)
    }

    /// Build the command assembling `readset`
    ///
    /// # Arguments
    ///
    /// * `stage` - Tools directory and cores
    /// * `plan` - Genome size and read type
    /// * `readset` - Readset being assembled, used in output names
    /// * `reads` - Absolute path of the readset fastq
    pub fn command(&self, stage: &Stage, plan: &AssemblyPlan, readset: Readset, reads: &str) -> String {
        let job = AssemblyJob {
            stage,
            plan,
            readset: readset.name(),
            reads,
        };

        match self {
            Assembler::Flye => job.flye(),
            Assembler::Hifiasm => job.hifiasm(),
            Assembler::Necat => job.necat(),
            Assembler::Nextdenovo => job.nextdenovo(),
            Assembler::Raven => job.raven(),
            Assembler::Shasta => job.shasta(),
            Assembler::Smartdenovo => job.smartdenovo(),
            Assembler::Wtdbg2 => job.wtdbg2(),
        }
    }
}

impl FromStr for Assembler {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FLYE" => Ok(Assembler::Flye),
            "HIFIASM" => Ok(Assembler::Hifiasm),
            "NECAT" => Ok(Assembler::Necat),
            "NEXTDENOVO" => Ok(Assembler::Nextdenovo),
            "RAVEN" => Ok(Assembler::Raven),
            "SHASTA" => Ok(Assembler::Shasta),
            "SMARTDENOVO" => Ok(Assembler::Smartdenovo),
            "WTDBG2" => Ok(Assembler::Wtdbg2),
            _ => Err(format!(
                "assembler '{}' is not in the list of authorized assemblers",
                s
            )),
        }
    }
}

impl fmt::Display for Assembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What the assembly stage runs
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyPlan {
    /// Genome size in Mb
    pub genome_size: f64,
    pub assemblers: Vec<Assembler>,
    pub readsets: Vec<Readset>,
    /// `--nano-hq` reads for Flye, `--nano-raw` otherwise
    pub nano_hq: bool,
    /// Output directory holding `Reads/`
    pub output: PathBuf,
}

impl AssemblyPlan {
    fn megabases(&self) -> u64 {
        self.genome_size as u64
    }

    fn bases(&self) -> u64 {
        (self.genome_size * 1_000_000.0) as u64
    }
}

struct AssemblyJob<'a> {
    stage: &'a Stage,
    plan: &'a AssemblyPlan,
    readset: &'static str,
    reads: &'a str,
}

impl AssemblyJob<'_> {
    fn fastoche(&self, fasta: &str, stats: &str) -> String {
        format!(
            "fastoche -f {} -m {} -g {} > {}",
            fasta,
            MIN_CONTIG,
            self.plan.bases(),
            stats
        )
    }

    fn flye(&self) -> String {
        let flye = self.stage.tool("flye/bin/flye");
        let mode = if self.plan.nano_hq {
            "--nano-hq"
        } else {
            "--nano-raw"
        };
        let rs = self.readset;

        Payload::new()
            .line("cd Assembly/Flye/")
            .line("module unload python/* python2/* python3/*")
            .line("module load extenv/ig extenv/rdbioseq fastoche c/gnu/7.3.0 c++/gnu/7.3.0 python/3.7")
            .line(format!("echo -e \"Flye\\t$({} --version)\" >> ../software.versions", flye))
            .line(self.stage.benchme())
            .args(&[flye.as_str(), mode, self.reads])
            .arg(format!("-t {}", self.stage.cores))
            .arg(format!("-g {}m", self.plan.megabases()))
            .arg(format!("-o {}", rs))
            .line(format!("mv {}/assembly.fasta {}.fasta", rs, rs))
            .line(format!("mv {}/assembly_info.txt {}.assembly_info.txt", rs, rs))
            .line(self.fastoche(&format!("{}.fasta", rs), &format!("{}.stats", rs)))
            .build()
    }

    fn necat(&self) -> String {
        let necat = self.stage.tool("NECAT/Linux-amd64");

        Payload::new()
            .line(format!("reads={}", self.reads))
            .line("cd Assembly/")
            .line("module load extenv/ig extenv/rdbioseq fastoche perl_rdbioseq c/gnu/7.3.0 c++/gnu/7.3.0")
            .line(format!("export PATH={}/bin:$PATH", necat))
            .line(format!(
                "echo -e \"Necat\\t$(head -n 1 {}/VERSION | cut -d ' ' -f 2)\" >> software.versions",
                necat
            ))
            .blank()
            .line("necat.pl config config.txt")
            .line(format!(
                "cat config.txt | sed 's/PROJECT=.*$/PROJECT=Necat/g' \
                 | sed 's/ONT_READ_LIST=.*$/ONT_READ_LIST=reads.txt/g' \
                 | sed 's/GENOME_SIZE=.*$/GENOME_SIZE={}000000/g' \
                 | sed 's/THREADS=4.*$/THREADS={}/g' > config_tmp.txt",
                self.plan.megabases(),
                self.stage.cores
            ))
            .line("mv config_tmp.txt config.txt")
            .line("echo $reads > reads.txt")
            .blank()
            .line(format!("{} necat.pl bridge config.txt", self.stage.benchme()))
            .line("mv Necat/6-bridge_contigs/polished_contigs.fasta Necat/")
            .line("mv Necat/6-bridge_contigs/bridged_contigs.fasta Necat/")
            .blank()
            .line(self.fastoche(
                "Necat/polished_contigs.fasta",
                "Necat/polished_contigs.stats",
            ))
            .build()
    }

    fn raven(&self) -> String {
        let rs = self.readset;

        Payload::new()
            .line("cd Assembly/Raven/")
            .line(format!("mkdir -p {} && cd {}", rs, rs))
            .line("module load extenv/ig extenv/rdbioseq fastoche c/gnu/7.3.0 c++/gnu/7.3.0 zlib/original/1.2.8 python/3.7")
            .line(self.stage.benchme())
            .arg(self.stage.tool("raven/build/bin/raven"))
            .arg(format!("-t {} -p 1 {} > {}_consensus.fasta", self.stage.cores, self.reads, rs))
            .line(format!("mv {}_consensus.fasta ../{}.fasta", rs, rs))
            .line(self.fastoche(
                &format!("../{}.fasta", rs),
                &format!("../{}_consensus.stats", rs),
            ))
            .build()
    }

    fn smartdenovo(&self) -> String {
        let rs = self.readset;

        Payload::new()
            .line("cd Assembly/Smartdenovo/")
            .line("module load extenv/ig extenv/rdbioseq fastoche c/gnu/7.3.0 c++/gnu/7.3.0 python/3.7")
            .line("echo -e \"Smartdenovo\\t8488de9\" >> ../software.versions")
            .line(self.stage.tool("smartdenovo/smartdenovo.pl"))
            .arg(format!(
                "-p {} -t {} -k 17 -c 1 {} > {}.make",
                rs, self.stage.cores, self.reads, rs
            ))
            .line(format!("{} make -f {}.make", self.stage.benchme(), rs))
            .line(format!(
                "find . -name '{}*' -not -name '*.dmo.cns' -not -name '*.make' -delete",
                rs
            ))
            .line(self.fastoche(&format!("{}.dmo.cns", rs), &format!("{}.stats", rs)))
            .line(format!("mv {}.dmo.cns {}.fasta", rs, rs))
            .build()
    }

    fn wtdbg2(&self) -> String {
        let wtdbg2 = self.stage.tool("wtdbg2/wtdbg2");
        let prefix = format!("wtdbg2_{}", self.readset);

        Payload::new()
            .line("cd Assembly/Wtdbg2/")
            .line("module load extenv/ig extenv/rdbioseq fastoche c/gnu/7.3.0 c++/gnu/7.3.0 python/3.7")
            .line(format!(
                "echo -e \"Wtdbg2\\t$({} --version | cut -d ' ' -f 2)\" >> ../software.versions",
                wtdbg2
            ))
            .line(self.stage.benchme())
            .arg(&wtdbg2)
            .arg(format!(
                "-i {} -xont -X5000 -g{}m -o {} -t {}",
                self.reads,
                self.plan.megabases(),
                prefix,
                self.stage.cores
            ))
            .line(self.stage.benchme())
            .arg(self.stage.tool("wtdbg2/wtpoa-cns"))
            .arg(format!(
                "-i {}.ctg.lay.gz -t {} -fo {}.ctg.lay.fasta",
                prefix, self.stage.cores, prefix
            ))
            .line(self.fastoche(
                &format!("{}.ctg.lay.fasta", prefix),
                &format!("{}.ctg.lay.stats", prefix),
            ))
            .line(format!(
                "find . -name '{}*' -not -name '{}.ctg.lay.*' -delete",
                prefix, prefix
            ))
            .build()
    }

    fn hifiasm(&self) -> String {
        let rs = self.readset;
        let mut cmd = Payload::new()
            .line("cd Assembly/Hifiasm/")
            .line("module load extenv/ig extenv/rdbioseq fastoche hifiasm_rdbioseq")
            .line("echo -e \"Hifiasm\\t$(hifiasm --version)\" >> ../software.versions")
            .line(format!("mkdir -p {} && cd {}", rs, rs))
            .line(format!(
                "{} hifiasm -o hifiasm -t {} {}",
                self.stage.benchme(),
                self.stage.cores,
                self.reads
            ));

        let haplotypes = [
            ("haploid", "hifiasm.bp.p_ctg.gfa"),
            ("hap1", "hifiasm.bp.hap1.p_ctg.gfa"),
            ("hap2", "hifiasm.bp.hap2.p_ctg.gfa"),
        ];

        for (name, gfa) in haplotypes {
            cmd = cmd.line(format!("{} {} > {}.fasta", AWK_GFA_TO_FASTA, gfa, name));
        }
        cmd = cmd.blank();
        for (name, _) in haplotypes {
            cmd = cmd.line(self.fastoche(&format!("{}.fasta", name), &format!("{}.stats", name)));
        }

        cmd.build()
    }

    fn nextdenovo(&self) -> String {
        let rs = self.readset;

        Payload::new()
            .line(format!("mkdir -p Assembly/Nextdenovo/{}", rs))
            .line(format!("cd Assembly/Nextdenovo/{}", rs))
            .blank()
            .line("module load extenv/rdbioseq fastoche nextdenovo_rdbioseq")
            .blank()
            .line("echo -e \"Nextdenovo\\t$(nextDenovo --version | tail -n 1 | cut -d ' ' -f 2)\" >> ../../software.versions")
            .line(format!("echo '{}' > reads.fofn", self.reads))
            .line(format!("cp {} run_tmp.cfg", NEXTDENOVO_CFG))
            .line(format!(
                "cat run_tmp.cfg | sed 's/{{threads}}/{}/g' | sed 's/{{genomesize}}/{}m/g' > run.cfg",
                self.stage.cores, self.plan.genome_size
            ))
            .line("rm run_tmp.cfg")
            .blank()
            .line(format!("{} nextDenovo run.cfg", self.stage.benchme()))
            .line(format!("mv rundir/03.ctg_graph/nd.asm.fasta {}.fasta", rs))
            .line(self.fastoche(&format!("{}.fasta", rs), &format!("{}.stats", rs)))
            .blank()
            .line("rm -r rundir")
            .build()
    }

    fn shasta(&self) -> String {
        Payload::new()
            .line("mkdir -p Assembly/Shasta")
            .line("cd Assembly/Shasta")
            .line("module load extenv/rdbioseq fastoche shasta_rdbioseq")
            .blank()
            .line("shasta")
            .arg(format!("--input {}", self.reads))
            .arg(format!("--assemblyDirectory {}", self.readset))
            .arg("--command assemble")
            .arg(format!("--threads {}", self.stage.cores))
            .arg("--config Nanopore-Phased-Jan2022")
            .build()
    }
}

/// Register one job per (readset, assembler) pair and run them.
///
/// Readsets are taken in `Full`, `Filtlong`, `Longest` order and
/// assemblers in the order given. Necat and Nextdenovo are only run on the
/// full readset. Each job waits for the job producing its readset, when
/// there is one.
///
/// # Example
///
/// ```text
/// flye_full         afterok:readsets_dedup_read_names
/// smartdenovo_full  afterok:readsets_dedup_read_names
/// flye_filtlong     afterok:readsets_filtlong
/// ```
pub fn launch(
    runner: &mut Runner,
    stage: &Stage,
    plan: &AssemblyPlan,
    readset_jobs: &ReadsetJobs,
) -> Result<Vec<JobHandle>> {
    info!("INFO: Assemblies");

    let mut jobs = Vec::new();

    for readset in Readset::ALL
        .into_iter()
        .filter(|readset| plan.readsets.contains(readset))
    {
        let reads = plan.output.join(readset.fastq()).display().to_string();

        for assembler in plan
            .assemblers
            .iter()
            .filter(|assembler| readset == Readset::Full || !assembler.full_only())
        {
            let job = runner.add_job(
                assembler.command(stage, plan, readset, &reads),
                format!("{}_{}", assembler, readset),
                stage.resources(),
                Dependencies::after_opt(readset_jobs.get(readset)),
            )?;
            jobs.push(job);
        }
    }

    runner.run(stage.wait)?;

    Ok(jobs)
}
