//! Contracts for the text printed by external scheduler commands.
//!
//! Each submit format is versioned: a change in the scheduler's output is
//! a new variant with its own fixtures, never an edit of an existing one.

use serde::Deserialize;
use std::fmt;

use crate::error::{GalopError, Result};

/// Extracts a job identifier from the stdout of a submit command
pub trait JobIdParser {
    fn parse(&self, stdout: &str) -> Result<String>;
}

/// Known submit output contracts
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitFormat {
    /// `ccc_msub`: `Submitted Batch Session <id>`
    #[default]
    #[serde(rename = "msub-v1")]
    MsubV1,
    /// `sbatch`: `Submitted batch job <id>`
    #[serde(rename = "sbatch-v1")]
    SbatchV1,
    /// `sbatch --parsable`: `<id>` or `<id>;<cluster>`
    #[serde(rename = "parsable-v1")]
    ParsableV1,
}

impl fmt::Display for SubmitFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitFormat::MsubV1 => write!(f, "msub-v1"),
            SubmitFormat::SbatchV1 => write!(f, "sbatch-v1"),
            SubmitFormat::ParsableV1 => write!(f, "parsable-v1"),
        }
    }
}

impl JobIdParser for SubmitFormat {
    /// Parse a job identifier out of the submit command's stdout.
    ///
    /// Leading lines that do not match the contract (banners, warnings)
    /// are ignored; the first matching line wins.
    ///
    /// # Example
    ///
    /// ```rust
    /// use galop::executor::parser::{JobIdParser, SubmitFormat};
    ///
    /// let id = SubmitFormat::MsubV1.parse("Submitted Batch Session 4242\n").unwrap();
    /// assert_eq!(id, "4242");
    /// ```
    fn parse(&self, stdout: &str) -> Result<String> {
        let found = match self {
            SubmitFormat::MsubV1 => stdout
                .lines()
                .find_map(|line| prefixed_id(line, &["Submitted", "Batch", "Session"])),
            SubmitFormat::SbatchV1 => stdout
                .lines()
                .find_map(|line| prefixed_id(line, &["Submitted", "batch", "job"])),
            SubmitFormat::ParsableV1 => stdout.lines().find_map(|line| {
                let id = line.trim().split(';').next()?;
                is_job_id(id).then(|| id.to_string())
            }),
        };

        found.ok_or_else(|| GalopError::UnparsableOutput {
            format: self.to_string(),
            output: stdout.to_string(),
        })
    }
}

/// Fixed-position token after an exact word prefix: the line must be the
/// prefix followed by exactly one numeric token.
fn prefixed_id(line: &str, prefix: &[&str]) -> Option<String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    if tokens.len() != prefix.len() + 1 || tokens[..prefix.len()] != *prefix {
        return None;
    }

    let id = tokens[prefix.len()];
    is_job_id(id).then(|| id.to_string())
}

fn is_job_id(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// Coarse state of a scheduler job as seen by the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Queued, running, or not yet visible in accounting
    Active,
    Succeeded,
    Failed,
}

/// Map the output of `sacct -n -X -P -o State -j <id>` to a [`QueryState`].
///
/// Only the first word of the first non-empty line is read, so
/// `CANCELLED by 1234` is a cancellation. Empty output means the job is
/// not in accounting yet.
pub fn parse_state(stdout: &str) -> QueryState {
    let state = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split_whitespace().next())
        .unwrap_or_default()
        .trim_end_matches('+');

    match state {
        "COMPLETED" => QueryState::Succeeded,
        "FAILED" | "CANCELLED" | "TIMEOUT" | "OUT_OF_MEMORY" | "NODE_FAIL" | "PREEMPTED"
        | "BOOT_FAIL" | "DEADLINE" | "REVOKED" => QueryState::Failed,
        _ => QueryState::Active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // captured from ccc_msub
    const MSUB_OK: &str = "Submitted Batch Session 6543210\n";
    const MSUB_WITH_BANNER: &str =
        "WARNING: project quota at 92%\nSubmitted Batch Session 77\n";
    const MSUB_REJECTED: &str = "error: Batch job submission failed: Invalid account\n";

    // captured from sbatch
    const SBATCH_OK: &str = "Submitted batch job 123456\n";

    #[test]
    fn msub_v1_reads_the_session_id() {
        assert_eq!(SubmitFormat::MsubV1.parse(MSUB_OK).unwrap(), "6543210");
        assert_eq!(SubmitFormat::MsubV1.parse(MSUB_WITH_BANNER).unwrap(), "77");
    }

    #[test]
    fn msub_v1_rejects_other_output() {
        for output in [MSUB_REJECTED, "", SBATCH_OK, "Submitted Batch Session abc\n"] {
            let err = SubmitFormat::MsubV1.parse(output).unwrap_err();
            assert!(matches!(err, GalopError::UnparsableOutput { .. }), "{output:?}");
        }
    }

    #[test]
    fn msub_v1_rejects_trailing_tokens() {
        assert!(SubmitFormat::MsubV1
            .parse("Submitted Batch Session 12 on cluster\n")
            .is_err());
    }

    #[test]
    fn sbatch_v1_reads_the_job_id() {
        assert_eq!(SubmitFormat::SbatchV1.parse(SBATCH_OK).unwrap(), "123456");
        assert!(SubmitFormat::SbatchV1.parse(MSUB_OK).is_err());
    }

    #[test]
    fn parsable_v1_drops_cluster_suffix() {
        assert_eq!(SubmitFormat::ParsableV1.parse("98765;irene\n").unwrap(), "98765");
        assert_eq!(SubmitFormat::ParsableV1.parse("98765").unwrap(), "98765");
        assert!(SubmitFormat::ParsableV1.parse("queued\n").is_err());
    }

    #[test]
    fn accounting_states_are_mapped() {
        assert_eq!(parse_state("COMPLETED\n"), QueryState::Succeeded);
        assert_eq!(parse_state("FAILED\n"), QueryState::Failed);
        assert_eq!(parse_state("CANCELLED by 1001\n"), QueryState::Failed);
        assert_eq!(parse_state("TIMEOUT\n"), QueryState::Failed);
        assert_eq!(parse_state("RUNNING\n"), QueryState::Active);
        assert_eq!(parse_state("PENDING\n"), QueryState::Active);
        assert_eq!(parse_state("\n\n"), QueryState::Active);
        assert_eq!(parse_state(""), QueryState::Active);
    }
}
