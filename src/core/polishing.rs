use log::{info, warn};

use std::path::{Path, PathBuf};

use crate::consts::*;
use crate::core::Stage;
use crate::error::Result;
use crate::executor::job::{Dependencies, JobHandle, Payload};
use crate::executor::manager::Runner;

/// What the polishing stage runs
#[derive(Debug, Clone, PartialEq)]
pub struct PolishingPlan {
    /// Assembly to polish
    pub assembly: PathBuf,
    /// Output directory of the assembly step, holding `Reads/full.fastq`
    pub assembly_dir: PathBuf,
    /// Output directory of this step
    pub output: PathBuf,
    pub racon: bool,
    /// Medaka model, `None` skips medaka
    pub medaka_model: Option<String>,
    pub pe1: Vec<PathBuf>,
    pub pe2: Vec<PathBuf>,
}

impl PolishingPlan {
    fn full_reads(&self) -> String {
        self.assembly_dir.join(FULL_FASTQ).display().to_string()
    }

    fn hapog(&self) -> bool {
        !self.pe1.is_empty() && !self.pe2.is_empty()
    }
}

pub fn racon_command(stage: &Stage, plan: &PolishingPlan, assembly: &Path) -> String {
    let reads = plan.full_reads();

    Payload::new()
        .line("cd Polishing/Racon")
        .line("module load nanoporetech racon extenv/rdbioseq fastoche")
        .line("echo -e \"Racon\\t$(racon --version)\" > ../software.versions")
        .line(format!(
            "{} minimap2 -x map-ont -t {} {} {} > minimap.paf",
            stage.benchme(),
            stage.cores,
            assembly.display(),
            reads
        ))
        .line(format!(
            "{} racon -u -t {} {} minimap.paf {} > racon.fasta",
            stage.benchme(),
            stage.cores,
            reads,
            assembly.display()
        ))
        .line(format!("fastoche -f racon.fasta -m {} > racon.stats", MIN_CONTIG))
        .build()
}

pub fn medaka_command(stage: &Stage, plan: &PolishingPlan, assembly: &Path, model: &str) -> String {
    Payload::new()
        .line("cd Polishing")
        .line(format!(
            "echo -e \"Medaka\\t$(apptainer exec {} medaka --version | cut -d ' ' -f 2)\" >> software.versions",
            MEDAKA_IMAGE
        ))
        .line(format!("{} apptainer exec --bind /env:/env \\", stage.benchme()))
        .line(format!(
            "  --pwd $(pwd) --containall --no-home {} \\",
            MEDAKA_IMAGE
        ))
        .line(format!(
            "    medaka_consensus -i {} -d {} -t {} -m {} -o Medaka",
            plan.full_reads(),
            assembly.display(),
            stage.cores,
            model
        ))
        .line("module load extenv/rdbioseq fastoche")
        .line(format!(
            "fastoche -f Medaka/consensus.fasta -m {} > Medaka/consensus.stats",
            MIN_CONTIG
        ))
        .build()
}

pub fn hapog_command(stage: &Stage, plan: &PolishingPlan, assembly: &Path, round: usize) -> String {
    let mut cmd = Payload::new()
        .line("cd Polishing/Hapog")
        .line("module load extenv/rdbioseq hapog fastoche")
        .line("echo -e \"Hapog\\t$(module list -l | grep hapog | cut -d ' ' -f 1)\" >> ../software.versions")
        .line(format!("python {}", stage.tool("HAPO-G/hapog.py")))
        .arg(format!("--genome {}", assembly.display()))
        .arg(format!("-t {}", stage.cores))
        .arg(format!("-o hapog_{}", round));

    for pe in &plan.pe1 {
        cmd = cmd.arg(format!("--pe1 {}", pe.display()));
    }
    for pe in &plan.pe2 {
        cmd = cmd.arg(format!("--pe2 {}", pe.display()));
    }

    cmd.line(format!(
        "fastoche -f hapog_{r}/hapog_results/hapog.fasta -m {} > hapog_{r}/hapog_results/hapog.stats",
        MIN_CONTIG,
        r = round
    ))
    .build()
}

/// Chain the polishing jobs and run them.
///
/// Racon (optional), then medaka (unless disabled), then Hapo-G rounds
/// when paired-end reads are given. Each step polishes the output of the
/// previous one and waits for it.
///
/// # Returns
///
/// The last job of the chain, `None` when nothing was registered
pub fn launch(runner: &mut Runner, stage: &Stage, plan: &PolishingPlan) -> Result<Option<JobHandle>> {
    info!("INFO: Polishing");

    let polishing = plan.output.join(POLISHING);
    let mut assembly = plan.assembly.clone();
    let mut last: Option<JobHandle> = None;

    if plan.racon {
        last = Some(runner.add_job(
            racon_command(stage, plan, &assembly),
            "racon",
            stage.resources(),
            Dependencies::none(),
        )?);
        assembly = polishing.join("Racon").join("racon.fasta");
    }

    if let Some(model) = &plan.medaka_model {
        last = Some(runner.add_job(
            medaka_command(stage, plan, &assembly, model),
            "medaka",
            stage.resources(),
            Dependencies::after_opt(last),
        )?);
        assembly = polishing.join("Medaka").join("consensus.fasta");
    }

    if plan.hapog() {
        for round in 1..=HAPOG_ROUNDS {
            last = Some(runner.add_job(
                hapog_command(stage, plan, &assembly, round),
                format!("hapog_{}", round),
                stage.resources(),
                Dependencies::after_opt(last),
            )?);
            assembly = polishing
                .join("Hapog")
                .join(format!("hapog_{}", round))
                .join("hapog_results")
                .join("hapog.fasta");
        }
    }

    if last.is_none() {
        warn!("WARN: no polishing step selected, nothing to launch");
    }

    runner.run(stage.wait)?;

    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> Stage {
        Stage {
            tools: PathBuf::from("/opt/galop/tools"),
            queue: "normal".to_string(),
            cores: 8,
            qos: None,
            wait: false,
        }
    }

    fn plan() -> PolishingPlan {
        PolishingPlan {
            assembly: PathBuf::from("/asm/Assembly/Flye/full.fasta"),
            assembly_dir: PathBuf::from("/asm"),
            output: PathBuf::from("/asm"),
            racon: true,
            medaka_model: Some(MEDAKA_MODEL.to_string()),
            pe1: vec![PathBuf::from("/il/r1.fq.gz"), PathBuf::from("/il/r1b.fq.gz")],
            pe2: vec![PathBuf::from("/il/r2.fq.gz")],
        }
    }

    #[test]
    fn racon_maps_full_reads() {
        let plan = plan();
        let cmd = racon_command(&stage(), &plan, &plan.assembly);

        assert!(cmd.contains(
            "/opt/galop/tools/benchme minimap2 -x map-ont -t 8 /asm/Assembly/Flye/full.fasta \
             /asm/Reads/full.fastq > minimap.paf\n"
        ));
    }

    #[test]
    fn medaka_runs_in_the_container() {
        let plan = plan();
        let cmd = medaka_command(&stage(), &plan, Path::new("/asm/Polishing/Racon/racon.fasta"), "r10");

        assert!(cmd.contains("apptainer exec --bind /env:/env \\\n  --pwd $(pwd)"));
        assert!(cmd.contains(
            "medaka_consensus -i /asm/Reads/full.fastq -d /asm/Polishing/Racon/racon.fasta -t 8 -m r10 -o Medaka\n"
        ));
    }

    #[test]
    fn hapog_lists_every_paired_end() {
        let plan = plan();
        let cmd = hapog_command(&stage(), &plan, Path::new("/g.fasta"), 2);

        assert!(cmd.contains(
            "python /opt/galop/tools/HAPO-G/hapog.py --genome /g.fasta -t 8 -o hapog_2 \
             --pe1 /il/r1.fq.gz --pe1 /il/r1b.fq.gz --pe2 /il/r2.fq.gz\n"
        ));
        assert!(cmd.contains("fastoche -f hapog_2/hapog_results/hapog.fasta -m 2000"));
    }
}
