//! Persistence for predictions, engineered features and the run report.
//!
//! Every file is first written in full to a sibling temporary file. Targets
//! are only replaced once all files of a run are staged, so a failed run
//! leaves neither truncated nor partial output behind.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PipelineError, Result, Stage};
use crate::evaluate::PredictionRecord;
use crate::features::DerivedRow;
use crate::pipeline::RunSummary;

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| PipelineError::Json {
        path: "<log>".into(),
        source,
    })?;
    info!("{}", json);
    Ok(())
}

/// Writes `records` as CSV with a header row, replacing any existing file.
pub fn write_records<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    commit_all(vec![stage_records(path.as_ref(), records)?])
}

/// Engineered feature table, one row per usable observation.
pub fn write_features(path: impl AsRef<Path>, rows: &[DerivedRow]) -> Result<()> {
    write_records(path, rows)
}

/// Writes the prediction table and, when given, the JSON report.
///
/// Both files are staged before either target is touched.
pub fn write_run(
    predictions: impl AsRef<Path>,
    records: &[PredictionRecord],
    report: Option<(&Path, &RunSummary)>,
) -> Result<()> {
    let mut staged = vec![stage_records(predictions.as_ref(), records)?];
    if let Some((path, summary)) = report {
        staged.push(stage_json(path, summary)?);
    }
    commit_all(staged)
}

/// A fully written temporary file waiting to replace its target. Dropping it
/// uncommitted removes the temporary file.
#[derive(Debug)]
struct StagedFile {
    tmp: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn create(path: &Path) -> Result<(Self, File)> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(Stage::Output, parent, e))?;
        }

        let tmp = temp_sibling(path);
        debug!(tmp = %tmp.display(), "Writing to temporary file");
        let file = File::create(&tmp).map_err(|e| PipelineError::io(Stage::Output, &tmp, e))?;
        let staged = Self {
            tmp,
            path: path.to_path_buf(),
            committed: false,
        };
        Ok((staged, file))
    }

    fn commit(&mut self) -> Result<()> {
        fs::rename(&self.tmp, &self.path)
            .map_err(|e| PipelineError::io(Stage::Output, &self.path, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

fn stage_records<T: Serialize>(path: &Path, records: &[T]) -> Result<StagedFile> {
    let (staged, file) = StagedFile::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| PipelineError::csv(Stage::Output, path, e))?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::io(Stage::Output, path, e))?;

    debug!(path = %path.display(), rows = records.len(), "CSV staged");
    Ok(staged)
}

fn stage_json(path: &Path, value: &impl Serialize) -> Result<StagedFile> {
    let (staged, file) = StagedFile::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| PipelineError::Json {
        path: path.display().to_string(),
        source,
    })?;
    writer
        .flush()
        .map_err(|e| PipelineError::io(Stage::Output, path, e))?;
    Ok(staged)
}

/// Moves every staged file into place. If a rename fails, targets already
/// replaced by this call are removed and the remaining temporaries dropped.
fn commit_all(mut files: Vec<StagedFile>) -> Result<()> {
    for i in 0..files.len() {
        if let Err(e) = files[i].commit() {
            for done in &files[..i] {
                let _ = fs::remove_file(&done.path);
            }
            return Err(e);
        }
    }
    for file in &files {
        info!(path = %file.path.display(), "Output written");
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
