use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use shiftjack::BatchReport;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("malformed JSON in {path:?}: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// Writes `value` as pretty JSON, creating missing parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ReportError> {
    let io_error = |source| ReportError::Io {
        source,
        path: path.to_path_buf(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| ReportError::Json {
        source,
        path: path.to_path_buf(),
    })?;
    writer.write_all(b"\n").map_err(io_error)?;
    writer.flush().map_err(io_error)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ReportError> {
    let file = File::open(path).map_err(|source| ReportError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ReportError::Json {
        source,
        path: path.to_path_buf(),
    })
}

pub fn write_report(path: &Path, report: &BatchReport) -> Result<(), ReportError> {
    write_json(path, report)
}

/// Loads a batch report. A report without a label is named after its file stem.
pub fn read_report(path: &Path) -> Result<BatchReport, ReportError> {
    let mut report: BatchReport = read_json(path)?;
    if report.label.is_none() {
        report.label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftjack::simulation::{card_source::UniformCardSource, Simulator};
    use shiftjack::{Batch, Rule};

    fn sample_report(label: Option<&str>) -> BatchReport {
        let mut simulator = Simulator::new(&Rule::default(), UniformCardSource::seeded(3));
        let mut batch = Batch::new();
        simulator.run_batch(20, &mut batch, &mut ()).unwrap();
        batch.into_report(label.map(String::from))
    }

    #[test]
    fn report_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("baseline.json");
        let report = sample_report(Some("baseline"));
        write_report(&path, &report).unwrap();
        assert_eq!(read_report(&path).unwrap(), report);
    }

    #[test]
    fn unlabeled_report_takes_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fewshot_t07.json");
        write_report(&path, &sample_report(None)).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("\"label\""));
        assert_eq!(read_report(&path).unwrap().label.as_deref(), Some("fewshot_t07"));
    }

    #[test]
    fn bad_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"player_card_frequencies\": 3}").unwrap();
        assert!(matches!(read_report(&path), Err(ReportError::Json { .. })));
        assert!(matches!(
            read_report(&dir.path().join("missing.json")),
            Err(ReportError::Io { .. })
        ));
    }
}
