//! Row relocation: the actual scramble/unscramble step

use crate::video::VideoFrame;
use bytes::Bytes;

/// Which way rows move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Scramble: source row `i` lands at destination row `perm[i]`.
    Forward,
    /// Unscramble: source row `perm[i]` lands at destination row `i`.
    Inverse,
}

impl Direction {
    /// Label used by the control surface ("Encryption" is visual
    /// obfuscation wording, not a cryptographic claim).
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Forward => "Encryption",
            Direction::Inverse => "Decryption",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Relocate the rows of `source` according to `permutation`.
///
/// Produces a new frame with identical geometry. Each row copy moves
/// `width * channels` bytes untouched; the bijection guarantees every
/// destination row is written exactly once.
///
/// The permutation length must equal the frame height. The pipeline always
/// regenerates the permutation from the current frame, so a mismatch is a
/// caller bug, not a runtime condition.
pub fn apply(source: &VideoFrame, permutation: &[usize], direction: Direction) -> VideoFrame {
    let geometry = source.geometry();
    assert_eq!(
        permutation.len(),
        geometry.height,
        "permutation length does not match frame height"
    );

    let stride = geometry.row_bytes();
    let mut out = vec![0u8; geometry.frame_bytes()];

    for i in 0..geometry.height {
        let (src, dst) = match direction {
            Direction::Forward => (i, permutation[i]),
            Direction::Inverse => (permutation[i], i),
        };
        out[dst * stride..(dst + 1) * stride].copy_from_slice(source.row(src));
    }

    VideoFrame::from_packed(geometry, Bytes::from(out))
}
