//! Display sink seam
//!
//! The pipeline pushes every tick's original/processed pair through
//! [`DisplaySink`]. Rendering is someone else's job: the channel-backed
//! implementation marshals frames to whichever task owns the presentation
//! surface, and a full channel just drops the preview — display is
//! best-effort and never stalls the frame cadence.

use crate::video::VideoFrame;
use log::trace;
use tokio::sync::mpsc;

/// One tick's worth of preview material.
#[derive(Debug, Clone)]
pub struct FramePreview {
    pub original: VideoFrame,
    pub processed: VideoFrame,
}

/// Consumer of per-tick frame pairs. Implementations must not block and
/// must swallow their own failures.
pub trait DisplaySink: Send + Sync {
    fn present(&self, original: &VideoFrame, processed: &VideoFrame);
}

/// Sends previews over a bounded channel to the presentation owner.
pub struct PreviewChannel {
    tx: mpsc::Sender<FramePreview>,
}

impl PreviewChannel {
    /// Create the channel; the receiver side belongs to the render loop.
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<FramePreview>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }
}

impl DisplaySink for PreviewChannel {
    fn present(&self, original: &VideoFrame, processed: &VideoFrame) {
        let preview = FramePreview {
            original: original.clone(),
            processed: processed.clone(),
        };
        if self.tx.try_send(preview).is_err() {
            // Receiver busy or gone; the next tick brings a fresher frame.
            trace!("preview dropped, display channel full");
        }
    }
}

/// Discards every preview. Used by headless runs and tests.
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn present(&self, _original: &VideoFrame, _processed: &VideoFrame) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::FrameGeometry;
    use bytes::Bytes;

    fn frame() -> VideoFrame {
        VideoFrame::from_packed(FrameGeometry::new(2, 2, 3), Bytes::from(vec![7u8; 12]))
    }

    #[tokio::test]
    async fn test_preview_delivery() {
        let (display, mut rx) = PreviewChannel::new(4);
        display.present(&frame(), &frame());

        let preview = rx.recv().await.unwrap();
        assert_eq!(preview.original.data(), preview.processed.data());
    }

    #[test]
    fn test_full_channel_drops_silently() {
        let (display, _rx) = PreviewChannel::new(1);
        display.present(&frame(), &frame());
        // Second push hits a full channel; must not panic or block.
        display.present(&frame(), &frame());
    }
}
