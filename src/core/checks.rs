use log::warn;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::consts::*;
use crate::error::{GalopError, Result};

/// Project code with the material codes whose runs make up the readset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub code: String,
    pub materials: Vec<String>,
}

impl FromStr for Project {
    type Err = String;

    /// Parse a `CODE,MATERIAL[,MATERIAL...]` entry
    ///
    /// # Example
    ///
    /// ```rust
    /// use galop::core::checks::Project;
    ///
    /// let project: Project = "BCM,A,B".parse().unwrap();
    /// assert_eq!(project.code, "BCM");
    /// assert_eq!(project.materials, vec!["A", "B"]);
    /// ```
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut fields = s.split(',').map(str::trim);
        let code = fields.next().unwrap_or_default();
        let materials = fields.map(str::to_string).collect::<Vec<_>>();

        if code.is_empty() || materials.is_empty() || materials.iter().any(|m| m.is_empty()) {
            return Err(format!(
                "project '{}' must be formatted as CODE,MATERIAL[,MATERIAL...]",
                s
            ));
        }

        Ok(Project {
            code: code.to_string(),
            materials,
        })
    }
}

/// Absolute version of `path`, relative paths are taken from the current
/// directory. The path does not need to exist.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Output directory of the assembly step, `./nanopore_assembly` by default
pub fn assembly_output(dir: Option<&Path>) -> Result<PathBuf> {
    absolute(dir.unwrap_or_else(|| Path::new(DEFAULT_OUTPUT)))
}

/// Output directory of the polishing step, the assembly directory by default
pub fn polishing_output(dir: Option<&Path>, assembly_dir: Option<&Path>) -> Result<PathBuf> {
    match dir.or(assembly_dir) {
        Some(dir) => absolute(dir),
        None => Err(GalopError::InvalidOption(
            "polishing needs an output directory: use --dir or --assembly-dir".to_string(),
        )),
    }
}

/// Assembly input: a fastq file, project codes, or `--force`
pub fn input(input: Option<&Path>, force: bool, projects: &[Project]) -> Result<()> {
    if input.is_none() && projects.is_empty() && !force {
        return Err(GalopError::InvalidOption(
            "select either project codes and materials (--proj) or a single fastq file (-i)"
                .to_string(),
        ));
    }

    if let Some(input) = input {
        if !input.exists() {
            return Err(GalopError::InvalidOption(format!(
                "input file {} does not exist",
                input.display()
            )));
        }
    }

    Ok(())
}

pub fn projects(entries: &[String]) -> Result<Vec<Project>> {
    entries
        .iter()
        .map(|entry| entry.parse::<Project>().map_err(GalopError::InvalidOption))
        .collect()
}

/// Genome size in Mb, required and strictly positive
pub fn genome_size(size: Option<f64>) -> Result<f64> {
    match size {
        Some(size) if size.is_finite() && size > 0.0 => Ok(size),
        Some(size) => Err(GalopError::InvalidOption(format!(
            "genome size must be a positive number of Mb, got {}",
            size
        ))),
        None => Err(GalopError::InvalidOption(
            "specify a genome size in Mb with --size".to_string(),
        )),
    }
}

/// Every paired-end file must exist
pub fn paired_ends(pe1: &[PathBuf], pe2: &[PathBuf]) -> Result<()> {
    for (flag, files) in [("--pe1", pe1), ("--pe2", pe2)] {
        if let Some(missing) = files.iter().find(|pe| !pe.exists()) {
            return Err(GalopError::InvalidOption(format!(
                "path to {} {} does not exist",
                flag,
                missing.display()
            )));
        }
    }

    if pe1.is_empty() != pe2.is_empty() {
        warn!("WARN: Hapo-G needs both --pe1 and --pe2, it will not be launched");
    }

    Ok(())
}

pub fn medaka_model(no_medaka: bool, model: &str) -> Result<()> {
    if !no_medaka && model.trim().is_empty() {
        return Err(GalopError::InvalidOption(
            "no medaka model was given with --model and --no-medaka was not specified"
                .to_string(),
        ));
    }

    Ok(())
}

pub fn assembly(assembly: Option<&Path>) -> Result<PathBuf> {
    match assembly {
        Some(path) => absolute(path),
        None => Err(GalopError::InvalidOption(
            "no assembly was provided, use --assembly".to_string(),
        )),
    }
}

/// Parse a comma-separated, case-insensitive list, keeping the given order
/// and dropping repeats.
///
/// # Example
///
/// ```rust
/// use galop::core::assemblies::Assembler;
/// use galop::core::checks::parse_list;
///
/// let assemblers = parse_list::<Assembler>("flye,Raven,FLYE").unwrap();
/// assert_eq!(assemblers, vec![Assembler::Flye, Assembler::Raven]);
/// ```
pub fn parse_list<T>(list: &str) -> Result<Vec<T>>
where
    T: FromStr<Err = String> + PartialEq,
{
    let mut items = Vec::new();

    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let item = entry.parse::<T>().map_err(GalopError::InvalidOption)?;
        if !items.contains(&item) {
            items.push(item);
        }
    }

    if items.is_empty() {
        return Err(GalopError::InvalidOption(format!("empty list: '{}'", list)));
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_need_a_material() {
        assert!("BCM".parse::<Project>().is_err());
        assert!("BCM,".parse::<Project>().is_err());
        assert!(",A".parse::<Project>().is_err());

        let parsed = projects(&["BWW,AB".to_string()]).unwrap();
        assert_eq!(parsed[0].code, "BWW");
        assert_eq!(parsed[0].materials, vec!["AB"]);
    }

    #[test]
    fn assembly_needs_some_input() {
        assert!(input(None, false, &[]).is_err());
        assert!(input(None, true, &[]).is_ok());

        let project = "BCM,A".parse::<Project>().unwrap();
        assert!(input(None, false, &[project]).is_ok());
        assert!(input(Some(Path::new("/nonexistent/reads.fastq")), false, &[]).is_err());
    }

    #[test]
    fn genome_size_is_required() {
        assert!(genome_size(None).is_err());
        assert!(genome_size(Some(0.0)).is_err());
        assert!(genome_size(Some(f64::NAN)).is_err());
        assert_eq!(genome_size(Some(12.5)).unwrap(), 12.5);
    }

    #[test]
    fn output_directories_default() {
        let out = assembly_output(None).unwrap();
        assert!(out.is_absolute());
        assert!(out.ends_with(DEFAULT_OUTPUT));

        assert_eq!(
            polishing_output(None, Some(Path::new("/data/asm"))).unwrap(),
            PathBuf::from("/data/asm")
        );
        assert_eq!(
            polishing_output(Some(Path::new("/data/pol")), Some(Path::new("/data/asm"))).unwrap(),
            PathBuf::from("/data/pol")
        );
        assert!(polishing_output(None, None).is_err());
    }

    #[test]
    fn missing_paired_end_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = dir.path().join("r1.fastq.gz");
        std::fs::write(&r1, "").unwrap();

        assert!(paired_ends(&[r1.clone()], &[]).is_ok());
        assert!(paired_ends(&[r1], &[dir.path().join("r2.fastq.gz")]).is_err());
    }

    #[test]
    fn medaka_needs_a_model() {
        assert!(medaka_model(false, "").is_err());
        assert!(medaka_model(true, "").is_ok());
        assert!(medaka_model(false, MEDAKA_MODEL).is_ok());
    }

    #[test]
    fn lists_reject_unknown_entries() {
        use crate::core::readsets::Readset;

        assert!(parse_list::<Readset>("Full,Nope").is_err());
        assert!(parse_list::<Readset>(" , ").is_err());
        assert_eq!(
            parse_list::<Readset>("longest,full").unwrap(),
            vec![Readset::Longest, Readset::Full]
        );
    }
}
