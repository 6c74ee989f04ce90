//! Opaque source/sink services used by the pipeline
//!
//! Container and codec negotiation live behind these traits; the pipeline
//! only sees `open`/`read`/`write`/`is_open`/`release`.

use crate::video::error::VideoError;
use crate::video::frame::VideoFrame;

/// Pull-based frame producer.
pub trait FrameSource: Send {
    /// Read the next frame. `Ok(None)` signals end-of-stream, the normal
    /// termination path. `Err` is a transient decode failure; the caller
    /// decides whether to retry on the next tick.
    fn read(&mut self) -> Result<Option<VideoFrame>, VideoError>;

    fn is_open(&self) -> bool;

    /// Release the underlying handle. Must be idempotent.
    fn release(&mut self);
}

/// Push-based frame persister with fixed geometry for the whole run.
pub trait FrameSink: Send {
    fn write(&mut self, frame: &VideoFrame) -> Result<(), VideoError>;

    fn is_open(&self) -> bool;

    /// Flush and finalize the container (trailer, index, header patch-up).
    /// Must be idempotent; the file is a valid container afterwards with
    /// however many frames were fully written.
    fn release(&mut self) -> Result<(), VideoError>;
}
