use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::RecorderError;
use crate::metrics::calculator::PhaseMetrics;

/// Append-only CSV sink shared by every measurement cycle.
///
/// A whole row is formatted up front and written with a single call under
/// the lock, so rows from concurrent cycles never interleave. Failed
/// cycles append nothing; the log only ever contains complete rows.
#[derive(Debug)]
pub struct MetricsRecorder {
    file: Mutex<File>,
    path: PathBuf,
}

impl MetricsRecorder {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RecorderError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| RecorderError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, metrics: &PhaseMetrics) -> Result<(), RecorderError> {
        let mut row = metrics.row_cells().join(",");
        row.push('\n');

        let mut file = self.file.lock().map_err(|_| RecorderError::Poisoned)?;
        file.write_all(row.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::calculator::FIELD_COUNT;
    use crate::timing::{Timeline, TimelineOffsets};
    use std::sync::Arc;

    fn sample_metrics() -> PhaseMetrics {
        let timeline = Timeline::from_offsets(TimelineOffsets {
            conn_requested: Some(0),
            dns_start: Some(5),
            dns_done: Some(55),
            connect_start: Some(60),
            connect_done: Some(160),
            tls_start: Some(165),
            tls_done: Some(365),
            conn_acquired: Some(370),
            first_byte: Some(870),
            response_done: Some(1370),
        });
        PhaseMetrics::from_timeline(&timeline).expect("ordered timeline")
    }

    fn temp_log(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "h2bench-recorder-{name}-{}.csv",
            std::process::id()
        ));
        std::fs::remove_file(&path).ok();
        path
    }

    #[test]
    fn appends_one_complete_row_per_measurement() {
        let path = temp_log("single");
        let recorder = MetricsRecorder::create(&path).expect("open log");
        let metrics = sample_metrics();

        recorder.append(&metrics).expect("append row");
        recorder.append(&metrics).expect("append row");

        let content = std::fs::read_to_string(&path).expect("read log");
        let rows: Vec<&str> = content.lines().collect();
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.split(',').count(), FIELD_COUNT);
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn concurrent_appends_never_interleave() {
        let path = temp_log("concurrent");
        let recorder = Arc::new(MetricsRecorder::create(&path).expect("open log"));
        let metrics = sample_metrics();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let recorder = recorder.clone();
                std::thread::spawn(move || recorder.append(&metrics).expect("append row"))
            })
            .collect();
        for handle in handles {
            handle.join().expect("appender thread");
        }

        let content = std::fs::read_to_string(&path).expect("read log");
        let rows: Vec<&str> = content.lines().collect();
        assert_eq!(rows.len(), 16);
        let expected = metrics.row_cells().join(",");
        for row in rows {
            assert_eq!(row, expected);
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn open_failure_names_the_path() {
        let missing_dir = std::env::temp_dir().join("h2bench-no-such-dir").join("m.csv");
        let err = MetricsRecorder::create(&missing_dir).expect_err("open must fail");
        assert!(matches!(err, RecorderError::Open { .. }));
    }
}
