//! Frame processing pipeline
//!
//! The pipeline separates control from data movement:
//! - the coordinator owns lifecycle (start, stop, key edits, state feed)
//! - a single periodic worker task owns the source and sink handles and
//!   drives read → scramble → display → persist at a fixed cadence
//!
//! Ticks are strictly sequential; stop is cooperative through a
//! cancellation token and never detaches handles from a running tick.

pub mod coordinator;
pub mod state;
mod worker;

pub use coordinator::ScrambleCoordinator;
pub use state::PipelineState;

use crate::video::error::VideoError;
use crate::video::frame::FrameGeometry;
use crate::video::traits::FrameSink;

/// Deferred sink construction: the output geometry is only known once the
/// first frame has been decoded.
pub type SinkFactory =
    Box<dyn FnMut(FrameGeometry) -> Result<Box<dyn FrameSink>, VideoError> + Send>;
