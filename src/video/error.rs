//! Error kinds for the source/sink services

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by frame sources and sinks.
///
/// Only the open variants abort a run; read and write failures are handled
/// per tick by the pipeline (skip or keep going).
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("cannot open video source {path}: {source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open video sink {path}: {source}")]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode frame: {0}")]
    DecodeRead(String),

    #[error("failed to write frame: {source}")]
    SinkWrite {
        #[source]
        source: io::Error,
    },

    #[error("malformed container: {0}")]
    Malformed(String),
}

/// Rejected operator key input. Stays in the control surface; the previous
/// valid key is retained.
#[derive(Debug, Error)]
#[error("invalid key {text:?}: not a signed 64-bit integer")]
pub struct KeyParseError {
    pub text: String,
}
