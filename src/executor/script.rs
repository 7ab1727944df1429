use std::path::Path;

use crate::config::{MemoryTable, SubmissionContext};
use crate::error::{GalopError, Result};
use crate::executor::job::{Job, JobId};

/// Render the batch script of a job.
///
/// Pure: the same job, dependency identifiers, context and memory table
/// always give the same text. `dependency_ids` are the resolved
/// identifiers of `job`'s dependencies, in declaration order.
///
/// # Example
///
/// ```text
/// #!/bin/bash
/// #MSUB -A genoscope
/// #MSUB -q normal
/// #MSUB -c 36
/// #MSUB -E '--mem=360G'
/// #MSUB -E --dependency=afterok:1234
/// #MSUB -E --qos=long
/// #MSUB -T 259200
/// #MSUB -o /out/Submission_scripts/flye_full.o
/// #MSUB -e /out/Submission_scripts/flye_full.e
///
/// cd Assembly/Flye/
/// ...
/// ```
pub fn render(
    job: &Job,
    dependency_ids: &[JobId],
    context: &SubmissionContext,
    memory: &MemoryTable,
) -> String {
    let resources = job.resources();
    let mut header = vec![
        "#!/bin/bash".to_string(),
        format!("#MSUB -A {}", context.account),
        format!("#MSUB -q {}", resources.queue),
        format!("#MSUB -c {}", resources.cpus),
        format!("#MSUB -E '--mem={}G'", resources.memory(memory)),
    ];

    if !dependency_ids.is_empty() {
        let ids = dependency_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(":");
        header.push(format!(
            "#MSUB -E --dependency={}:{}",
            job.dependencies().kind(),
            ids
        ));
    }

    if let Some(qos) = resources.qos {
        header.push(format!("#MSUB -E --qos={}", qos));
    }

    header.push(format!("#MSUB -T {}", resources.time_limit));
    header.push(format!("#MSUB -o {}", job.paths().stdout.display()));
    header.push(format!("#MSUB -e {}", job.paths().stderr.display()));

    let mut script = header.join("\n");
    script.push_str("\n\n");
    script.push_str(job.command());
    if !script.ends_with('\n') {
        script.push('\n');
    }

    script
}

/// Write a rendered script to `path`. The parent directory must exist.
pub fn write_script(path: &Path, script: &str) -> Result<()> {
    std::fs::write(path, script).map_err(|source| GalopError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}
