//! Periodic tick worker
//!
//! One dedicated task pulls, transforms, and emits frames at a fixed
//! cadence. Ticks never overlap, so frame N's sink write happens before
//! frame N+1's read. The worker owns the source and sink handles outright
//! and releases both on every exit path; teardown safety comes from that
//! ownership, not from locks around I/O.

use crate::config::SharedKey;
use crate::display::DisplaySink;
use crate::pipeline::state::PipelineState;
use crate::pipeline::SinkFactory;
use crate::scramble::{self, Direction};
use crate::video::{FrameSink, FrameSource};
use log::{error, info, warn};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub(crate) struct TickWorker {
    pub source: Box<dyn FrameSource>,
    pub open_sink: SinkFactory,
    pub sink: Option<Box<dyn FrameSink>>,
    pub output: PathBuf,
    pub direction: Direction,
    pub key: SharedKey,
    pub display: Arc<dyn DisplaySink>,
    pub cancel: CancellationToken,
    pub state_tx: watch::Sender<PipelineState>,
    pub tick_interval: Duration,
    pub frames_done: u64,
}

impl TickWorker {
    /// Drive ticks until end-of-stream, a fatal sink error, or cancellation.
    pub(crate) async fn run(mut self) {
        let cancel = self.cancel.clone();
        let mut interval = tokio::time::interval(self.tick_interval);
        // Best-effort pacing: a slow tick delays the next one instead of
        // bursting to catch up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if self.tick().is_break() {
                        break;
                    }
                }
            }
        }

        self.release();
    }

    /// Process one frame. `Break` ends the run.
    fn tick(&mut self) -> ControlFlow<()> {
        let frame = match self.source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("end of video stream after {} frames", self.frames_done);
                return ControlFlow::Break(());
            }
            Err(e) => {
                // Transient decode failure: skip this tick, try the next.
                warn!("frame read failed, skipping tick: {}", e);
                return ControlFlow::Continue(());
            }
        };

        // The sink geometry is fixed by whatever the first frame looks like.
        if self.sink.is_none() {
            match (self.open_sink)(frame.geometry()) {
                Ok(sink) => {
                    info!("output sink opened ({})", frame.geometry());
                    self.sink = Some(sink);
                }
                Err(e) => {
                    error!("cannot open output sink: {}", e);
                    return ControlFlow::Break(());
                }
            }
        }

        // Key is re-read every tick: edits apply from here on, never
        // retroactively.
        let processed = scramble::scramble_frame(&frame, self.key.get(), self.direction);

        self.display.present(&frame, &processed);

        if let Some(sink) = self.sink.as_mut() {
            if sink.is_open() {
                if let Err(e) = sink.write(&processed) {
                    // One bad write must not abort the stream.
                    warn!("frame write failed: {}", e);
                }
            }
        }

        self.frames_done += 1;
        ControlFlow::Continue(())
    }

    /// Release source and sink and publish Idle. Runs on every exit path.
    fn release(mut self) {
        if self.source.is_open() {
            self.source.release();
        }

        if let Some(mut sink) = self.sink.take() {
            match sink.release() {
                Ok(()) => info!("video saved to {}", self.output.display()),
                Err(e) => warn!("failed to finalize {}: {}", self.output.display(), e),
            }
        }

        self.state_tx.send_replace(PipelineState::Idle);
    }
}
