//! videoscramble: key-driven video row scrambler
//!
//! Reads a video frame by frame, relocates rows with a permutation derived
//! deterministically from an integer key (forward to scramble, inverse to
//! restore), pushes original and processed frames to a display sink, and
//! persists the processed stream. The same key that scrambled a stream
//! unscrambles it exactly.

pub mod config;
pub mod display;
pub mod pipeline;
pub mod scramble;
pub mod video;
