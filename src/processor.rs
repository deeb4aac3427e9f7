use crate::error::{EmptyFieldWarning, Result};
use crate::filter::{FilterResult, RecordFilter, TermMatches};
use crate::parser::parse_file;
use crate::types::Bibliography;
use std::collections::BTreeMap;
use std::fs::Permissions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Decision taken for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub key: String,
    pub title: String,
    pub result: FilterResult,
    pub matches: Option<TermMatches>,
}

/// What a stage did to a collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub stage: String,
    pub decisions: Vec<Decision>,
    pub warnings: Vec<EmptyFieldWarning>,
}

impl StageReport {
    pub fn total(&self) -> usize {
        self.decisions.len()
    }

    pub fn kept(&self) -> usize {
        self.decisions.iter().filter(|d| d.result.is_keep()).count()
    }

    pub fn discarded(&self) -> usize {
        self.total() - self.kept()
    }

    pub fn included(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(|d| d.result.is_keep())
    }

    pub fn excluded(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(|d| !d.result.is_keep())
    }

    /// Discarded records per exclusion reason
    pub fn reason_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for decision in &self.decisions {
            if let FilterResult::FilterOut(exclusion) = &decision.result {
                *counts.entry(exclusion.reason()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Apply `filter` to every entry, keeping survivors in their original order
pub fn apply_filter(bibliography: &mut Bibliography, filter: &dyn RecordFilter) -> StageReport {
    let mut report = StageReport {
        stage: filter.name().to_string(),
        ..Default::default()
    };

    bibliography.retain_records(|record| {
        let evaluation = filter.evaluate(record);
        for warning in &evaluation.warnings {
            warn!("{}, treating it as empty", warning);
        }
        if let FilterResult::FilterOut(exclusion) = &evaluation.result {
            debug!(key = %record.key, reason = %exclusion.reason(), "discarding entry");
        }

        let keep = evaluation.result.is_keep();
        report.warnings.extend(evaluation.warnings);
        report.decisions.push(Decision {
            key: record.key.clone(),
            title: record.title(),
            result: evaluation.result,
            matches: evaluation.matches,
        });
        keep
    });

    report
}

/// Read and parse `input`, then filter it
pub fn screen_file(
    input: &Path,
    filter: &dyn RecordFilter,
) -> Result<(Bibliography, StageReport)> {
    info!(stage = filter.name(), input = %input.display(), "reading entries");
    let mut bibliography = parse_file(input)?;
    let report = apply_filter(&mut bibliography, filter);
    info!(
        stage = filter.name(),
        kept = report.kept(),
        discarded = report.discarded(),
        "stage complete"
    );
    Ok((bibliography, report))
}

/// Read `input`, filter it and write the survivors to `output`.
/// Nothing is written when the input cannot be read or parsed.
pub fn run_stage(input: &Path, output: &Path, filter: &dyn RecordFilter) -> Result<StageReport> {
    let (bibliography, report) = screen_file(input, filter)?;

    let mut writes = PendingWrites::new(Some(input));
    writes.stage(output, bibliography.to_bibtex().as_bytes())?;
    writes.commit()?;
    Ok(report)
}

/// Outputs of one run. Each is written to a temporary file beside its
/// destination; none is renamed into place before all of them are written.
/// Dropping without [`commit`](Self::commit) removes the temporary files.
#[derive(Debug, Default)]
pub struct PendingWrites {
    template: Option<PathBuf>,
    staged: Vec<(NamedTempFile, PathBuf)>,
}

impl PendingWrites {
    /// New outputs take the permissions of the file they replace, else those
    /// of `template` (usually the input), else `rw-r--r--`
    pub fn new(template: Option<&Path>) -> Self {
        Self {
            template: template.map(Path::to_path_buf),
            staged: Vec::new(),
        }
    }

    pub fn stage(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut builder = tempfile::Builder::new();
        if let Some(permissions) = self.permissions_for(path) {
            builder.permissions(permissions);
        }
        let mut file = builder.tempfile_in(dir)?;
        file.write_all(contents)?;
        file.flush()?;

        self.staged.push((file, path.to_path_buf()));
        Ok(())
    }

    /// Rename every staged file into place
    pub fn commit(self) -> Result<()> {
        for (file, path) in self.staged {
            file.persist(&path).map_err(|e| e.error)?;
            debug!(output = %path.display(), "written");
        }
        Ok(())
    }

    fn permissions_for(&self, path: &Path) -> Option<Permissions> {
        std::iter::once(path)
            .chain(self.template.as_deref())
            .find_map(|candidate| std::fs::metadata(candidate).ok())
            .filter(|metadata| metadata.is_file())
            .map(|metadata| metadata.permissions())
            .or_else(default_permissions)
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}
