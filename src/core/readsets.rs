use log::{info, warn};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::consts::*;
use crate::core::checks::Project;
use crate::core::Stage;
use crate::error::Result;
use crate::executor::job::{Dependencies, JobHandle, Payload, Resources};
use crate::executor::manager::Runner;

/// Read subsets an assembler can be run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readset {
    /// Every read, deduplicated
    Full,
    /// Best reads by filtlong up to the target coverage
    Filtlong,
    /// Longest reads up to the target coverage
    Longest,
}

impl Readset {
    pub const ALL: [Readset; 3] = [Readset::Full, Readset::Filtlong, Readset::Longest];

    /// Lowercase name used in job and file names
    pub fn name(&self) -> &'static str {
        match self {
            Readset::Full => "full",
            Readset::Filtlong => "filtlong",
            Readset::Longest => "longest",
        }
    }

    /// Fastq path, relative to the output directory
    pub fn fastq(&self) -> &'static str {
        match self {
            Readset::Full => FULL_FASTQ,
            Readset::Filtlong => FILTLONG_FASTQ,
            Readset::Longest => LONGEST_FASTQ,
        }
    }
}

impl FromStr for Readset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FULL" => Ok(Readset::Full),
            "FILTLONG" => Ok(Readset::Filtlong),
            "LONGEST" => Ok(Readset::Longest),
            _ => Err(format!(
                "readset '{}' is not in the list of authorized readsets",
                s
            )),
        }
    }
}

impl fmt::Display for Readset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Sequencing technology of the project runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Technology {
    #[default]
    Nanopore,
    Pacbio,
}

impl Technology {
    fn runs_dir(&self) -> &'static str {
        match self {
            Technology::Nanopore => "RunsNanopore",
            Technology::Pacbio => "RunsPacbio",
        }
    }

    fn tech(&self) -> &'static str {
        match self {
            Technology::Nanopore => "nanopore",
            Technology::Pacbio => "pacbio",
        }
    }
}

/// What the readset stage builds
#[derive(Debug, Clone, PartialEq)]
pub struct ReadsetPlan {
    /// Single fastq used as the full readset instead of project runs
    pub input: Option<PathBuf>,
    pub projects: Vec<Project>,
    /// Genome size in Mb
    pub genome_size: f64,
    pub coverage: u32,
    pub readsets: Vec<Readset>,
    /// Take every run on disk instead of the runs validated by `lsRunProj`
    pub all_readsets: bool,
    pub technology: Technology,
}

/// Last job producing each readset, `None` when nothing has to be waited for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadsetJobs {
    pub full: Option<JobHandle>,
    pub filtlong: Option<JobHandle>,
    pub longest: Option<JobHandle>,
}

impl ReadsetJobs {
    pub fn get(&self, readset: Readset) -> Option<JobHandle> {
        match readset {
            Readset::Full => self.full,
            Readset::Filtlong => self.filtlong,
            Readset::Longest => self.longest,
        }
    }
}

/// Concatenate every run of the selected projects into the full readset
pub fn concat_command(plan: &ReadsetPlan) -> String {
    let mut cmd = Payload::new().line(format!("echo \"\" > {}", USED_READSETS));

    if !plan.all_readsets {
        cmd = cmd.line("module load extenv/rdbioseq commontools");
    }

    for project in &plan.projects {
        for material in &project.materials {
            cmd = cmd.blank();

            if plan.all_readsets {
                let runs = format!(
                    "{}/projet_{}/{}/{}/",
                    PROJECTS_ROOT,
                    project.code,
                    material,
                    plan.technology.runs_dir()
                );

                for (pattern, reader) in [("*.fastq", "cat"), ("*.fastq.gz", "gunzip -c")] {
                    cmd = cmd
                        .line(format!("find {} -name '{}' >> {}", runs, pattern, USED_READSETS))
                        .line(format!(
                            "find {} -name '{}' | xargs -I {{}} bash -c '{} {{}} >> {}'",
                            runs, pattern, reader, FULL_FASTQ
                        ));
                }
            } else {
                let selector = format!(
                    "-p {},{} -tech {}",
                    project.code,
                    material,
                    plan.technology.tech()
                );

                cmd = cmd
                    .line(format!(
                        "lsRunProj -format path,filename,validProd,validBioinfo,nbnt,techversion,location,nanoporeBasecallerVersion {} | \
                         awk 'BEGIN{{OFS=\"\\t\"}}{{if($4==1 && $7==\"CNS\"){{print $1\"/\"$2, $5, $6}}}}' >> {}",
                        selector, USED_READSETS
                    ))
                    .line(format!(
                        "lsRunProj -format path,filename,validProd,validBioinfo,location,nanoporeBasecallerVersion {} | \
                         awk '{{if($4==1 && $5==\"CNS\"){{print $1\"/\"$2}}}}' | \
                         xargs -I {{}} bash -c 'zcat -f {{}} >> {}'",
                        selector, FULL_FASTQ
                    ));
            }
        }
    }

    cmd.build()
}

pub fn dedup_command(stage: &Stage) -> String {
    Payload::new()
        .line("module load extenv/ig c/gnu/7.3.0 c++/gnu/7.3.0")
        .blank()
        .line(stage.benchme())
        .arg(stage.tool("seqkit"))
        .args(&["rmdup", "-n", "-j", "2", "-o", FULL_FILT_FASTQ, FULL_FASTQ])
        .line(format!("mv {} {}", FULL_FILT_FASTQ, FULL_FASTQ))
        .build()
}

/// Keep the best reads up to `coverage` times the genome size
pub fn filtlong_command(stage: &Stage, plan: &ReadsetPlan) -> String {
    let target_bases = (plan.genome_size as u64) * u64::from(plan.coverage) * 1_000_000;

    Payload::new()
        .line("module load extenv/ig c/gnu/7.3.0 c++/gnu/7.3.0")
        .line(stage.benchme())
        .arg(stage.tool("filtlong/bin/filtlong"))
        .arg(format!("-t {}", target_bases))
        .arg(format!("{} > {}", FULL_FASTQ, FILTLONG_FASTQ))
        .build()
}

pub fn longest_command(stage: &Stage, plan: &ReadsetPlan) -> String {
    Payload::new()
        .line("module load extenv/ig c/gnu/7.3.0 c++/gnu/7.3.0")
        .line(stage.benchme())
        .arg(stage.tool("get_longest_nap/get_longest_nap"))
        .arg(format!("-f {}", FULL_FASTQ))
        .arg(format!("-g {}", plan.genome_size))
        .arg(format!("-o {}", LONGEST_FASTQ))
        .arg(format!("-c {}", plan.coverage))
        .build()
}

pub fn fastoche_command(readset: Readset) -> String {
    Payload::new()
        .line("module load extenv/ig extenv/rdbioseq fastoche")
        .line(format!(
            "fastoche -f {} > {}/{}.stats",
            readset.fastq(),
            READS,
            readset.name()
        ))
        .build()
}

/// Link a user-provided fastq as the full readset. An existing link is
/// kept as is.
fn link_input(input: &Path, link: &Path) -> Result<()> {
    if link.symlink_metadata().is_ok() {
        warn!(
            "WARN: {} already exists, keeping it as the full readset",
            link.display()
        );
        return Ok(());
    }

    std::os::unix::fs::symlink(input, link)?;
    info!("INFO: linked {} -> {}", link.display(), input.display());

    Ok(())
}

/// Register the readset jobs and run them.
///
/// The full readset comes from `plan.input` or from a concatenation job,
/// then is deduplicated. Filtlong and longest subsets are derived from the
/// deduplicated reads, and every readset gets a `fastoche` statistics job.
///
/// # Returns
///
/// The jobs assemblers have to wait for, one per readset
pub fn launch(runner: &mut Runner, stage: &Stage, plan: &ReadsetPlan) -> Result<ReadsetJobs> {
    info!("INFO: Readsets creation");

    let resources = Resources::new(&stage.queue, READSET_CORES).qos(stage.qos);
    let stats = Resources::new(&stage.queue, READSET_CORES);

    let concat = match &plan.input {
        Some(input) => {
            link_input(input, &runner.context().work_dir.join(FULL_FASTQ))?;
            None
        }
        None => Some(runner.add_job(
            concat_command(plan),
            "readsets_concat_reads",
            resources.clone(),
            Dependencies::none(),
        )?),
    };

    let dedup = runner.add_job(
        dedup_command(stage),
        "readsets_dedup_read_names",
        resources.clone(),
        Dependencies::after_opt(concat),
    )?;

    let mut jobs = ReadsetJobs {
        full: Some(dedup),
        ..Default::default()
    };

    for readset in Readset::ALL {
        let producer = match readset {
            Readset::Full => dedup,
            Readset::Filtlong | Readset::Longest if !plan.readsets.contains(&readset) => continue,
            Readset::Filtlong => {
                let job = runner.add_job(
                    filtlong_command(stage, plan),
                    "readsets_filtlong",
                    resources.clone(),
                    Dependencies::after_ok([dedup]),
                )?;
                jobs.filtlong = Some(job);
                job
            }
            Readset::Longest => {
                let job = runner.add_job(
                    longest_command(stage, plan),
                    "readsets_longest",
                    resources.clone(),
                    Dependencies::after_ok([dedup]),
                )?;
                jobs.longest = Some(job);
                job
            }
        };

        runner.add_job(
            fastoche_command(readset),
            format!("fastoche_{}", readset),
            stats.clone(),
            Dependencies::after_ok([producer]),
        )?;
    }

    runner.run(stage.wait)?;

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> Stage {
        Stage {
            tools: PathBuf::from("/opt/galop/tools"),
            queue: "normal".to_string(),
            cores: 36,
            qos: None,
            wait: false,
        }
    }

    fn plan() -> ReadsetPlan {
        ReadsetPlan {
            input: None,
            projects: vec!["BCM,A,B".parse().unwrap()],
            genome_size: 12.5,
            coverage: 30,
            readsets: Readset::ALL.to_vec(),
            all_readsets: false,
            technology: Technology::Nanopore,
        }
    }

    #[test]
    fn filtlong_targets_coverage_bases() {
        let cmd = filtlong_command(&stage(), &plan());

        assert!(cmd.contains(
            "/opt/galop/tools/benchme /opt/galop/tools/filtlong/bin/filtlong -t 360000000 \
             Reads/full.fastq > Reads/filtlong.fastq"
        ));
    }

    #[test]
    fn longest_keeps_fractional_size() {
        let cmd = longest_command(&stage(), &plan());
        assert!(cmd.contains("-f Reads/full.fastq -g 12.5 -o Reads/longest.fastq -c 30"));
    }

    #[test]
    fn concat_uses_lsrunproj_per_material() {
        let cmd = concat_command(&plan());

        assert!(cmd.starts_with("echo \"\" > Reads/used_readsets.txt\nmodule load"));
        assert_eq!(cmd.matches("-p BCM,A -tech nanopore").count(), 2);
        assert_eq!(cmd.matches("-p BCM,B -tech nanopore").count(), 2);
        assert!(cmd.contains("awk '{if($4==1 && $5==\"CNS\"){print $1\"/\"$2}}'"));
    }

    #[test]
    fn concat_all_readsets_walks_run_dirs() {
        let mut plan = plan();
        plan.all_readsets = true;
        plan.technology = Technology::Pacbio;

        let cmd = concat_command(&plan);

        assert!(!cmd.contains("lsRunProj"));
        assert!(cmd.contains(
            "find /env/cns/proj/projet_BCM/A/RunsPacbio/ -name '*.fastq.gz' | \
             xargs -I {} bash -c 'gunzip -c {} >> Reads/full.fastq'"
        ));
    }

    #[test]
    fn readset_names_parse_case_insensitively() {
        assert_eq!("FiltLong".parse::<Readset>(), Ok(Readset::Filtlong));
        assert!("half".parse::<Readset>().is_err());
        assert_eq!(Readset::Longest.fastq(), "Reads/longest.fastq");
    }
}
