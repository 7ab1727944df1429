use log::info;

use std::io::ErrorKind;
use std::path::Path;

use crate::consts::*;
use crate::error::{GalopError, Result};

/// Create one directory, failing if it already exists
fn create_dir(path: &Path, label: &str) -> Result<()> {
    match std::fs::create_dir(path) {
        Ok(()) => {
            info!("{}", label);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(GalopError::InvalidOption(format!(
            "directory {} already exists. Remove it or use --force to skip directory creation",
            path.display()
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(GalopError::InvalidOption(format!(
            "path to {} does not exist",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Create one directory, an existing one is fine
fn ensure_dir(path: &Path, label: &str) -> Result<()> {
    match std::fs::create_dir(path) {
        Ok(()) => {
            info!("{}", label);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Build the assembly tree under `output`, which must not exist yet.
///
/// ```text
/// <output>/
///   Reads/
///   Assembly/{Smartdenovo,Raven,Wtdbg2,Flye,Hifiasm}/
///   Submission_scripts/
/// ```
pub fn create_assembly_tree(output: &Path) -> Result<()> {
    info!("INFO: Creating directory tree...");

    create_dir(output, &format!("-- {}/", output.display()))?;
    create_dir(&output.join(READS), &format!("---- {}/", READS))?;
    create_dir(&output.join(ASSEMBLY), &format!("---- {}/", ASSEMBLY))?;

    for tool in ASSEMBLER_DIRS {
        create_dir(
            &output.join(ASSEMBLY).join(tool),
            &format!("------ {}", tool),
        )?;
    }

    create_dir(
        &output.join(SUBMISSION_SCRIPTS),
        &format!("---- {}/", SUBMISSION_SCRIPTS),
    )
}

/// Build the polishing tree. `output` and its submission directory may
/// already exist, typically when polishing inside an assembly directory.
pub fn create_polishing_tree(output: &Path) -> Result<()> {
    info!("INFO: Creating directory tree...");

    ensure_dir(output, &format!("-- {}/", output.display()))?;
    create_dir(&output.join(POLISHING), &format!("---- {}/", POLISHING))?;

    for tool in POLISHING_DIRS {
        create_dir(
            &output.join(POLISHING).join(tool),
            &format!("------ {}", tool),
        )?;
    }

    ensure_dir(
        &output.join(SUBMISSION_SCRIPTS),
        &format!("---- {}/", SUBMISSION_SCRIPTS),
    )
}

/// With `--force` nothing is created, the output directory must be there
pub fn require_existing(output: &Path) -> Result<()> {
    if output.is_dir() {
        Ok(())
    } else {
        Err(GalopError::InvalidOption(format!(
            "--force skips directory creation but {} does not exist",
            output.display()
        )))
    }
}
