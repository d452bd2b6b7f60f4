//! Durable run file writer.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use torsion_engine::{DataSink, RunHeader, Sample, SinkFactory};
use torsion_errors::DurabilityError;
use tracing::{debug, info, warn};

use crate::format::{DATA_SUFFIX, header_text, row_text, run_stem};

/// Name clashes tolerated within one second before giving up.
const MAX_SUFFIX: u32 = 99;

/// Creates one run folder and data file per run below `root`.
#[derive(Debug, Clone)]
pub struct RunFileFactory {
    root: PathBuf,
}

impl RunFileFactory {
    /// Factory writing below `root`. The directory is created on first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Newest data file written for `header`, if any.
    ///
    /// Follows the same suffix order as file creation, so after a run this is
    /// the file its sink wrote.
    pub fn latest_file_for(&self, header: &RunHeader) -> Option<PathBuf> {
        let stem = run_stem(header);
        (1..=MAX_SUFFIX)
            .map(|attempt| self.candidate(&stem, attempt).1)
            .take_while(|path| path.is_file())
            .last()
    }

    fn candidate(&self, stem: &str, attempt: u32) -> (PathBuf, PathBuf) {
        let name = if attempt == 1 {
            stem.to_string()
        } else {
            format!("{stem}_{attempt}")
        };
        let dir = self.root.join(&name);
        let path = dir.join(format!("{name}{DATA_SUFFIX}"));
        (dir, path)
    }

    /// Create the run folder and a data file that did not exist before.
    ///
    /// Two runs of the same sample within one second get `_2`, `_3`, ...
    /// appended to the folder and file stem.
    fn create_run_file(&self, header: &RunHeader) -> Result<(PathBuf, File), DurabilityError> {
        let stem = run_stem(header);
        for attempt in 1..=MAX_SUFFIX {
            let (dir, path) = self.candidate(&stem, attempt);
            fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "run file exists, trying next suffix");
                }
                Err(e) => return Err(io_error(&path, e)),
            }
        }
        Err(DurabilityError::Format(format!(
            "more than {MAX_SUFFIX} runs named {stem} in one second"
        )))
    }
}

impl SinkFactory for RunFileFactory {
    fn open_run(&mut self, header: &RunHeader) -> Result<Box<dyn DataSink>, DurabilityError> {
        let (path, mut file) = self.create_run_file(header)?;
        file.write_all(header_text(header).as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| io_error(&path, e))?;

        info!(path = %path.display(), "run file created");
        Ok(Box::new(RunFileSink {
            path,
            file: Some(file),
            rows: 0,
        }))
    }
}

/// Appends synced rows to one run file.
#[derive(Debug)]
pub struct RunFileSink {
    path: PathBuf,
    file: Option<File>,
    rows: u64,
}

impl RunFileSink {
    /// Path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Sync and close the file. Further appends fail with
    /// [`DurabilityError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns the error of the final sync.
    pub fn close(&mut self) -> Result<(), DurabilityError> {
        match self.file.take() {
            Some(file) => file.sync_all().map_err(|e| io_error(&self.path, e)),
            None => Ok(()),
        }
    }
}

impl DataSink for RunFileSink {
    fn append(&mut self, sample: &Sample) -> Result<(), DurabilityError> {
        let Some(file) = self.file.as_mut() else {
            return Err(DurabilityError::closed(self.path.display().to_string()));
        };
        // One write per row keeps a crash from interleaving partial rows.
        file.write_all(row_text(sample).as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|e| io_error(&self.path, e))?;
        self.rows = self.rows.saturating_add(1);
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    /// Removes the header-only file, and the run folder if nothing else is
    /// in it. A sink that already holds rows is kept.
    fn discard(mut self: Box<Self>) {
        if self.rows > 0 {
            return;
        }
        self.file = None;
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "unused run file removed"),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "could not remove unused run file");
                return;
            }
        }
        if let Some(dir) = self.path.parent()
            && let Err(err) = fs::remove_dir(dir)
        {
            debug!(dir = %dir.display(), %err, "run folder kept");
        }
    }
}

impl Drop for RunFileSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(%err, "final sync of run file failed");
        } else {
            debug!(path = %self.path.display(), rows = self.rows, "run file closed");
        }
    }
}

fn io_error(path: &Path, source: io::Error) -> DurabilityError {
    DurabilityError::io(path.display().to_string(), source)
}
