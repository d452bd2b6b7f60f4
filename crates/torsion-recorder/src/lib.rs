//! Run records for the torsion bench.
//!
//! Every run gets its own folder `{YYYYmmdd}_{HHMMSS}_{sample}` below the
//! configured root, holding one tab-separated `..._DATA.txt` file: two `#`
//! header lines, a column line, a unit line, then one row per sample.
//!
//! [`RunFileFactory`] implements [`SinkFactory`](torsion_engine::SinkFactory)
//! and [`RunFileSink`] implements [`DataSink`](torsion_engine::DataSink).
//! Each row is synced to disk before `append` returns, so a crash can at
//! worst truncate the row being written. [`read_run_file`] parses a record
//! back, tolerating such a truncated last row.

#![deny(clippy::unwrap_used)]

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{format_elapsed, parse_elapsed, run_stem, sanitize_sample_name};
pub use reader::{RecordError, RecordParameters, RecordRow, RunRecord, read_run_file};
pub use writer::{RunFileFactory, RunFileSink};
