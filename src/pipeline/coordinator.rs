//! Run lifecycle coordination
//!
//! [`ScrambleCoordinator`] is the control surface's handle onto the core:
//! it opens the source, spawns the tick worker, relays key edits, and owns
//! the one and only teardown path.

use crate::config::{RunConfig, SharedKey, TICK_INTERVAL, parse_key};
use crate::display::DisplaySink;
use crate::pipeline::SinkFactory;
use crate::pipeline::state::PipelineState;
use crate::pipeline::worker::TickWorker;
use crate::video::avi::{AviFrameSink, AviFrameSource};
use crate::video::error::{KeyParseError, VideoError};
use crate::video::{FrameSink, FrameSource};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ScrambleCoordinator {
    config: RunConfig,
    key: SharedKey,
    display: Arc<dyn DisplaySink>,
    state_tx: watch::Sender<PipelineState>,
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
}

impl ScrambleCoordinator {
    pub fn new(config: RunConfig, key: i64, display: Arc<dyn DisplaySink>) -> Self {
        let (state_tx, _) = watch::channel(PipelineState::Idle);
        Self {
            config,
            key: SharedKey::new(key),
            display,
            state_tx,
            cancel: None,
            worker: None,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Open the configured input file and begin processing. Fails with
    /// [`VideoError::SourceOpen`] and stays Idle if the file cannot be
    /// opened; a start while already Running is a warn-and-ignore.
    pub fn start(&mut self) -> Result<(), VideoError> {
        if !self.state().is_idle() {
            warn!("start requested while {}", self.state());
            return Ok(());
        }

        let source = AviFrameSource::open(&self.config.input)?;

        let output = self.config.output.clone();
        let fps = self.config.frame_rate;
        let open_sink: SinkFactory = Box::new(move |geometry| {
            AviFrameSink::create(&output, geometry, fps)
                .map(|sink| Box::new(sink) as Box<dyn FrameSink>)
        });

        self.spawn(Box::new(source), open_sink);
        Ok(())
    }

    /// Begin processing with caller-supplied source and sink services.
    /// Same contract as [`start`](Self::start) past the open step.
    pub fn start_with(&mut self, source: Box<dyn FrameSource>, open_sink: SinkFactory) {
        if !self.state().is_idle() {
            warn!("start requested while {}", self.state());
            return;
        }
        self.spawn(source, open_sink);
    }

    fn spawn(&mut self, source: Box<dyn FrameSource>, open_sink: SinkFactory) {
        let cancel = CancellationToken::new();

        let worker = TickWorker {
            source,
            open_sink,
            sink: None,
            output: self.config.output.clone(),
            direction: self.config.direction,
            key: self.key.clone(),
            display: Arc::clone(&self.display),
            cancel: cancel.clone(),
            state_tx: self.state_tx.clone(),
            tick_interval: TICK_INTERVAL,
            frames_done: 0,
        };

        self.state_tx.send_replace(PipelineState::Running);
        self.cancel = Some(cancel);
        self.worker = Some(tokio::spawn(worker.run()));
        info!("processing started: {}", self.status_line());
    }

    /// Stop the run. Idempotent; safe to call while a tick is in flight.
    ///
    /// Cancellation prevents new ticks from starting, then we wait up to one
    /// tick interval for the current one to finish. The worker releases the
    /// source and sink itself on exit, so handles are never pulled out from
    /// under an in-flight tick.
    pub async fn stop(&mut self) {
        if self.worker.is_none() && self.state().is_idle() {
            return;
        }

        if self.state().is_running() {
            self.state_tx.send_replace(PipelineState::Stopping);
        }

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        if let Some(handle) = self.worker.take() {
            match tokio::time::timeout(TICK_INTERVAL, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("tick worker ended abnormally: {}", e),
                Err(_) => {
                    // The worker still owns its handles and will release
                    // them whenever its in-flight tick completes.
                    warn!("tick worker did not finish within one tick interval");
                }
            }
        }

        self.state_tx.send_replace(PipelineState::Idle);
        info!("processing stopped, output at {}", self.config.output.display());
    }

    /// External shutdown trigger (window close, SIGINT). Funnels into the
    /// same [`stop`](Self::stop) path; there is no second teardown route.
    pub async fn request_shutdown(&mut self) {
        self.stop().await;
    }

    /// Wait until the current run (if any) has fully wound down.
    pub async fn wait_idle(&self) {
        let mut rx = self.state_tx.subscribe();
        while !rx.borrow_and_update().is_idle() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    // ── Control surface ─────────────────────────────────────────

    pub fn state(&self) -> PipelineState {
        *self.state_tx.borrow()
    }

    /// State feed for a control surface (button label, progress UI).
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    pub fn key(&self) -> i64 {
        self.key.get()
    }

    /// Replace the key; takes effect on the next processed frame.
    pub fn set_key(&self, key: i64) {
        self.key.set(key);
        info!("key updated to {}", key);
    }

    /// Parse free-form key text. On success the key is updated; on failure
    /// the previous valid key is retained and the error stays local.
    pub fn update_key_from_text(&self, text: &str) -> Result<i64, KeyParseError> {
        let key = parse_key(text)?;
        self.set_key(key);
        Ok(key)
    }

    /// Human-readable status for the control surface.
    pub fn status_line(&self) -> String {
        format!(
            "Key: {} | Mode: {} | Out: {}",
            self.key.get(),
            self.config.direction,
            self.config.output.display()
        )
    }
}
