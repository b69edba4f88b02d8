//! Batch export worker
//!
//! Files are analyzed one after another on a dedicated thread. Progress is
//! posted as [`BatchEvent`]s; the caller owns the receiving end and decides
//! how to display it. A shared stop flag is checked between files.

use anyhow::{Context, Result};
use framecode_analysis::{write_raw_csv, AnalysisSpec, ChannelStats, FileAnalysis, FileSummary};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Progress messages posted by the worker
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started { total: usize },
    FileStarted { index: usize, path: PathBuf },
    FileDone { index: usize, path: PathBuf, channels: usize },
    FileFailed { index: usize, path: PathBuf, error: String },
    Finished { processed: usize, failed: usize, cancelled: bool },
}

/// Where raw per-file CSVs are written
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Skip,
    /// `<file stem>.csv` next to each data file
    BesideSource,
    Directory(PathBuf),
}

impl RawOutput {
    pub fn target(&self, source: &Path) -> Option<PathBuf> {
        match self {
            RawOutput::Skip => None,
            RawOutput::BesideSource => Some(source.with_extension("csv")),
            RawOutput::Directory(dir) => {
                let stem = source.file_stem().unwrap_or(source.as_os_str());
                Some(dir.join(format!("{}.csv", stem.to_string_lossy())))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub files: Vec<PathBuf>,
    pub spec: AnalysisSpec,
    pub raw: RawOutput,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub summaries: Vec<FileSummary>,
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.summaries.iter().filter(|s| s.result.is_err()).count()
    }
}

/// Expand the command line sources into a sorted list of distinct data files.
///
/// Directories are scanned one level deep for files ending in `.<suffix>`;
/// plain files are taken as given.
pub fn collect_sources(sources: &[PathBuf], suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for source in sources {
        if source.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(source)
                .with_context(|| format!("Failed to read directory {:?}", source))?
            {
                let path = entry?.path();
                let matches = path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case(suffix))
                    .unwrap_or(false);
                if path.is_file() && matches {
                    found.push(path);
                }
            }
            found.sort();
            debug!("{} data file(s) in {:?}", found.len(), source);
            files.extend(found);
        } else if source.exists() {
            files.push(source.clone());
        } else {
            anyhow::bail!("Source {:?} does not exist", source);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Analyze one file: load, optionally write its raw CSV, apply the analysis spec.
pub fn process_file(
    path: &Path,
    spec: &AnalysisSpec,
    raw: &RawOutput,
) -> Result<(bool, Vec<ChannelStats>)> {
    let mut analysis =
        FileAnalysis::load(path).with_context(|| format!("Failed to load {:?}", path))?;

    if let Some(target) = raw.target(path) {
        write_raw_csv(&analysis, &target)
            .with_context(|| format!("Failed to write raw data to {:?}", target))?;
    }

    let stats = spec
        .apply(&mut analysis)
        .with_context(|| format!("Failed to compute statistics for {:?}", path))?;
    Ok((analysis.missed_timestamps, stats))
}

/// Run the job on the calling thread, posting progress to `events`.
///
/// A failing file is recorded with its full error chain and the batch moves
/// on. Send errors are ignored: a dropped receiver only loses progress.
pub fn run_batch(
    job: &BatchJob,
    stop: &AtomicBool,
    events: &UnboundedSender<BatchEvent>,
) -> BatchOutcome {
    let _ = events.send(BatchEvent::Started {
        total: job.files.len(),
    });

    let mut summaries = Vec::with_capacity(job.files.len());
    let mut cancelled = false;

    for (index, path) in job.files.iter().enumerate() {
        if stop.load(Ordering::SeqCst) {
            warn!("batch cancelled after {} of {} files", index, job.files.len());
            cancelled = true;
            break;
        }

        let _ = events.send(BatchEvent::FileStarted {
            index,
            path: path.clone(),
        });

        let file = path.display().to_string();
        let summary = match process_file(path, &job.spec, &job.raw) {
            Ok((missed, stats)) => {
                let _ = events.send(BatchEvent::FileDone {
                    index,
                    path: path.clone(),
                    channels: stats.len(),
                });
                FileSummary {
                    file,
                    missed_timestamps: Some(missed),
                    result: Ok(stats),
                }
            }
            Err(e) => {
                let error = format!("{:?}", e);
                warn!("{:?} failed: {:#}", path, e);
                let _ = events.send(BatchEvent::FileFailed {
                    index,
                    path: path.clone(),
                    error: error.clone(),
                });
                FileSummary {
                    file,
                    missed_timestamps: None,
                    result: Err(error),
                }
            }
        };
        summaries.push(summary);
    }

    let outcome = BatchOutcome {
        summaries,
        cancelled,
    };
    let _ = events.send(BatchEvent::Finished {
        processed: outcome.summaries.len(),
        failed: outcome.failed(),
        cancelled,
    });
    info!(
        "batch finished: {} file(s), {} failed",
        outcome.summaries.len(),
        outcome.failed()
    );
    outcome
}

/// Start the job on its own thread.
///
/// The receiver closes once the worker returns; join the handle for the
/// accumulated summaries.
pub fn spawn_batch(
    job: BatchJob,
    stop: Arc<AtomicBool>,
) -> Result<(JoinHandle<BatchOutcome>, UnboundedReceiver<BatchEvent>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = thread::Builder::new()
        .name("framecode-batch".into())
        .spawn(move || run_batch(&job, &stop, &tx))
        .context("Failed to spawn batch worker")?;
    Ok((handle, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecode_store::{ChannelConfig, ChannelKind, DataFile, Value};
    use tempfile::TempDir;

    fn write_file(path: &Path) {
        let mut file = DataFile::create(path).unwrap();
        let id = file
            .create_channel(ChannelKind::Event, ChannelConfig::named("rear"))
            .unwrap();
        file.notify_saw_first().unwrap();
        for t in [0.0, 0.5, 1.0] {
            file.add_timestamp(t).unwrap();
        }
        file.set_value(id, 0.5, Value::Event(true)).unwrap();
        file.notify_saw_last().unwrap();
    }

    fn job(files: Vec<PathBuf>, raw: RawOutput) -> BatchJob {
        BatchJob {
            files,
            spec: AnalysisSpec::all_statistics(),
            raw,
        }
    }

    #[test]
    fn test_collect_sources_scans_one_level() {
        let dir = TempDir::new().unwrap();
        write_file(&dir.path().join("b.fcd"));
        write_file(&dir.path().join("a.fcd"));
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write_file(&dir.path().join("nested").join("c.fcd"));

        let files = collect_sources(&[dir.path().to_path_buf()], "fcd").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.fcd", "b.fcd"]);

        assert!(collect_sources(&[dir.path().join("ghost.fcd")], "fcd").is_err());
    }

    #[test]
    fn test_file_named_twice_is_collected_once() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.fcd");
        let b = dir.path().join("b.fcd");
        write_file(&a);
        write_file(&b);

        let files = collect_sources(&[b.clone(), dir.path().to_path_buf(), b.clone()], "fcd").unwrap();
        assert_eq!(files, vec![a, b]);
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.fcd");
        std::fs::write(&bad, b"garbage").unwrap();
        let good = dir.path().join("good.fcd");
        write_file(&good);

        let stop = AtomicBool::new(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = run_batch(
            &job(vec![bad, good.clone()], RawOutput::BesideSource),
            &stop,
            &tx,
        );

        assert!(!outcome.cancelled);
        assert_eq!(outcome.failed(), 1);
        assert!(outcome.summaries[0]
            .result
            .as_ref()
            .unwrap_err()
            .contains("Failed to load"));
        assert!(outcome.summaries[1].result.is_ok());
        assert!(good.with_extension("csv").exists());

        drop(tx);
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.first(), Some(&BatchEvent::Started { total: 2 }));
        assert_eq!(
            events.last(),
            Some(&BatchEvent::Finished {
                processed: 2,
                failed: 1,
                cancelled: false
            })
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, BatchEvent::FileFailed { index: 0, .. })));
    }

    #[test]
    fn test_existing_raw_output_fails_that_file() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.fcd");
        write_file(&good);
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("good.csv"), "keep").unwrap();

        let stop = AtomicBool::new(false);
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = run_batch(&job(vec![good], RawOutput::Directory(out.clone())), &stop, &tx);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(std::fs::read_to_string(out.join("good.csv")).unwrap(), "keep");
    }

    #[test]
    fn test_stop_flag_cancels_between_files() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.fcd");
        write_file(&good);

        let stop = Arc::new(AtomicBool::new(true));
        let (handle, mut rx) = spawn_batch(job(vec![good], RawOutput::Skip), stop).unwrap();
        let outcome = handle.join().unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.summaries.is_empty());

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(BatchEvent::Finished {
                processed: 0,
                failed: 0,
                cancelled: true
            })
        );
    }
}
