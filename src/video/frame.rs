//! In-memory frame representation

use bytes::Bytes;

/// Fixed geometry of a video stream, taken from its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    /// Bytes per pixel (e.g. 3 for BGR24).
    pub channels: usize,
}

impl FrameGeometry {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Packed bytes per row.
    pub fn row_bytes(&self) -> usize {
        self.width * self.channels
    }

    /// Total packed frame size in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.row_bytes() * self.height
    }
}

impl std::fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// A single decoded frame: packed, row-major, top-down, byte-per-channel.
///
/// The payload is a [`Bytes`] handle, so pushing the same frame to the
/// display sink and the persistence sink clones a refcount, not pixels.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    geometry: FrameGeometry,
    data: Bytes,
}

impl VideoFrame {
    /// Wrap a packed pixel buffer. Panics if the buffer length does not
    /// match the geometry; frame producers own that contract.
    pub fn from_packed(geometry: FrameGeometry, data: Bytes) -> Self {
        assert_eq!(
            data.len(),
            geometry.frame_bytes(),
            "frame buffer does not match geometry {}",
            geometry
        );
        Self { geometry, data }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn width(&self) -> usize {
        self.geometry.width
    }

    pub fn height(&self) -> usize {
        self.geometry.height
    }

    pub fn channels(&self) -> usize {
        self.geometry.channels
    }

    /// Borrow row `i` (top-down).
    pub fn row(&self, i: usize) -> &[u8] {
        let stride = self.geometry.row_bytes();
        &self.data[i * stride..(i + 1) * stride]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_access() {
        let geometry = FrameGeometry::new(2, 3, 3);
        let data: Vec<u8> = (0..18).collect();
        let frame = VideoFrame::from_packed(geometry, Bytes::from(data));

        assert_eq!(frame.row(0), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(frame.row(2), &[12, 13, 14, 15, 16, 17]);
        assert_eq!(frame.geometry().frame_bytes(), 18);
    }

    #[test]
    #[should_panic]
    fn test_size_mismatch_panics() {
        let geometry = FrameGeometry::new(4, 4, 3);
        let _ = VideoFrame::from_packed(geometry, Bytes::from(vec![0u8; 7]));
    }
}
