//! Key-driven row scrambling
//!
//! The permutation is regenerated per frame from the live key, so a key edit
//! mid-run takes effect on the next frame without touching already-emitted
//! output.

pub mod permutation;
pub mod transform;

pub use transform::{Direction, apply};

use crate::video::VideoFrame;

/// Scramble or unscramble one frame with the permutation derived from
/// `key` and the frame's own height.
pub fn scramble_frame(frame: &VideoFrame, key: i64, direction: Direction) -> VideoFrame {
    let perm = permutation::generate(key, frame.height());
    transform::apply(frame, &perm, direction)
}
