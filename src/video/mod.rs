//! Frame model and the opaque source/sink services

pub mod avi;
pub mod error;
pub mod frame;
pub mod traits;

pub use error::VideoError;
pub use frame::{FrameGeometry, VideoFrame};
pub use traits::{FrameSink, FrameSource};
