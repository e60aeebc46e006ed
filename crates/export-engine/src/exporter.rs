//! Export orchestration.
//!
//! An [`Exporter`] runs at most one session at a time. Each session is a
//! single Tokio task that walks the keyframes in order, captures one frame
//! per keyframe, and hands the finished sequence to the encoder. Every
//! suspension point (the settle delays and the encoder wait) races against
//! the session's cancel signal. Image scaling and PNG encoding run on the
//! blocking pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use keyreel_capture_engine::{
    CaptureOptions, CapturedFrame, FrameCapture, ScratchStorage, WindowGrab,
};
use keyreel_common::config::{AppConfig, TimingConfig};
use keyreel_common::error::{ReelError, ReelResult};
use keyreel_encode_engine::{EncodeJob, EncodeResult, EncoderLocator, EncoderProcessManager};
use keyreel_scene_core::{KeyframeId, KeyframeSource, RenderSurface};
use tokio::sync::{broadcast, watch};

use crate::events::{ExportEvent, ExportOutcome, ExportProgress, FailureDetail};
use crate::sequencer;
use crate::session::{ExportSession, ExportState, SessionParams, SessionSnapshot};
use crate::settings::{ExportSettings, MIN_FRAME_RATE};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Everything an [`Exporter`] needs besides the scene collaborators.
#[derive(Debug, Clone)]
pub struct ExporterOptions {
    pub settings: ExportSettings,
    pub timing: TimingConfig,
    pub capture: CaptureOptions,
    pub scratch: ScratchStorage,
    pub encoder: EncoderProcessManager,
}

impl ExporterOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            settings: ExportSettings {
                export_path: config.export.output_path.clone(),
                frame_rate: config.export.frame_rate.max(MIN_FRAME_RATE),
            },
            timing: config.timing.clone(),
            capture: CaptureOptions::from(&config.capture),
            scratch: ScratchStorage::from_config(&config.scratch),
            encoder: EncoderProcessManager::new(EncoderLocator::from_config(&config.encoder))
                .with_timeout(config.timing.encode_timeout()),
        }
    }
}

/// Drives keyframe-by-keyframe capture and the final encode.
///
/// Dropping the exporter cancels a running session; its scratch directory
/// is still removed.
pub struct Exporter {
    settings: Mutex<ExportSettings>,
    timing: TimingConfig,
    capture: FrameCapture,
    scratch: ScratchStorage,
    encoder: EncoderProcessManager,
    shared: Arc<Shared>,
    run: Mutex<Option<RunHandle>>,
}

struct RunHandle {
    cancel: watch::Sender<bool>,
    /// Set once the session has cleaned up and reported its outcome.
    done: watch::Receiver<bool>,
}

impl Exporter {
    pub fn new(options: ExporterOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings: Mutex::new(options.settings),
            timing: options.timing,
            capture: FrameCapture::new(options.capture),
            scratch: options.scratch,
            encoder: options.encoder,
            shared: Arc::new(Shared {
                snapshot: Mutex::new(SessionSnapshot::default()),
                events,
            }),
            run: Mutex::new(None),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ExporterOptions::from_config(config))
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ExportEvent> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot()
    }

    pub fn is_exporting(&self) -> bool {
        self.shared.is_exporting()
    }

    pub fn state(&self) -> ExportState {
        lock(&self.shared.snapshot).state
    }

    pub fn current_frame(&self) -> usize {
        lock(&self.shared.snapshot).current_frame
    }

    pub fn total_frames(&self) -> usize {
        lock(&self.shared.snapshot).total_frames
    }

    pub fn status(&self) -> String {
        lock(&self.shared.snapshot).status.clone()
    }

    pub fn export_path(&self) -> PathBuf {
        lock(&self.settings).export_path.clone()
    }

    pub fn frame_rate(&self) -> u32 {
        lock(&self.settings).frame_rate
    }

    /// Set the output path for the next export. Accepts `file://` URLs.
    pub fn set_export_path(&self, raw: &str) {
        let mut settings = lock(&self.settings);
        settings.set_export_path(raw);
        tracing::debug!(path = %settings.export_path.display(), "Export path set");
    }

    /// Set the frame rate for the next export; rates below 2 are ignored.
    pub fn set_frame_rate(&self, rate: u32) -> bool {
        let accepted = lock(&self.settings).set_frame_rate(rate);
        if !accepted {
            tracing::debug!(rate, "Ignoring frame rate below minimum");
        }
        accepted
    }

    pub fn check_encoder_available(&self) -> bool {
        let available = self.encoder.is_available();
        tracing::debug!(available, "Encoder check");
        available
    }

    /// Start exporting the source's keyframes as seen through `surface`.
    ///
    /// Validation failures return an error and leave no session behind.
    /// Outside a Tokio runtime this fails with `InvalidInput`.
    pub fn start_export(
        &self,
        keyframes: Option<Arc<dyn KeyframeSource>>,
        surface: Option<Arc<dyn RenderSurface>>,
        width: u32,
        height: u32,
    ) -> ReelResult<()> {
        let mut run = lock(&self.run);
        if self.shared.is_exporting() {
            tracing::warn!("Export already in progress");
            return Err(ReelError::AlreadyExporting);
        }

        let (Some(source), Some(surface)) = (keyframes, surface) else {
            self.shared
                .set_status("Error: Invalid keyframe source or render surface");
            return Err(ReelError::invalid_input(
                "A keyframe source and a render surface are required",
            ));
        };
        if width == 0 || height == 0 {
            self.shared.set_status("Error: Invalid output size");
            return Err(ReelError::invalid_input(format!(
                "Output size must be non-zero, got {width}x{height}"
            )));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            self.shared.set_status("Error: No async runtime");
            ReelError::invalid_input(format!("Export requires a Tokio runtime: {e}"))
        })?;

        let encoder_path = self.encoder.locate().map_err(|e| {
            self.shared.set_status("Error: FFmpeg not found");
            e
        })?;

        let keyframes = sequencer::resolve_order(source.as_ref()).map_err(|e| {
            self.shared.set_status("Error: No keyframes found");
            e
        })?;

        let scratch = self.scratch.acquire().map_err(|e| {
            self.shared
                .set_status("Error: Failed to create scratch directory");
            e
        })?;

        let settings = lock(&self.settings).clone();
        let params = SessionParams {
            output_path: settings.export_path,
            frame_rate: settings.frame_rate,
            width,
            height,
        };

        tracing::info!(
            frames = keyframes.len(),
            output = %params.output_path.display(),
            frame_rate = params.frame_rate,
            width,
            height,
            encoder = %encoder_path.display(),
            scratch = %scratch.path().display(),
            "Starting animation export"
        );

        let session = ExportSession::new(keyframes, params, scratch);
        self.shared.begin_session(session.total());

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let runner = SessionRunner {
            shared: Arc::clone(&self.shared),
            source,
            surface,
            capture: self.capture.clone(),
            encoder: self.encoder.clone(),
            encoder_path,
            timing: self.timing.clone(),
            cancel: CancelSignal(cancel_rx),
            done: done_tx,
        };
        runtime.spawn(runner.run(session));

        *run = Some(RunHandle {
            cancel: cancel_tx,
            done: done_rx,
        });
        Ok(())
    }

    /// Stop the running export, if any, and wait until its cleanup is done.
    ///
    /// Concurrent callers all return after the same cleanup.
    pub async fn stop_export(&self) {
        let mut done = {
            let run = lock(&self.run);
            if !self.shared.is_exporting() {
                return;
            }
            let Some(handle) = run.as_ref() else {
                return;
            };
            tracing::info!("Stopping export");
            // Fails only if the session already finished on its own.
            let _ = handle.cancel.send(true);
            handle.done.clone()
        };

        // The sender is dropped without a value only if the task died.
        if done.wait_for(|finished| *finished).await.is_err() {
            tracing::error!("Export task ended without finishing");
            self.shared.abandon_session();
        }
    }
}

/// State observable from outside the session task.
struct Shared {
    snapshot: Mutex<SessionSnapshot>,
    events: broadcast::Sender<ExportEvent>,
}

impl Shared {
    fn snapshot(&self) -> SessionSnapshot {
        lock(&self.snapshot).clone()
    }

    fn is_exporting(&self) -> bool {
        lock(&self.snapshot).exporting
    }

    fn emit(&self, event: ExportEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: ExportState) {
        let changed = {
            let mut snapshot = lock(&self.snapshot);
            let changed = snapshot.state != state;
            snapshot.state = state;
            changed
        };
        if changed {
            tracing::trace!(%state, "Export state");
            self.emit(ExportEvent::StateChanged(state));
        }
    }

    fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        let changed = {
            let mut snapshot = lock(&self.snapshot);
            let changed = snapshot.status != status;
            snapshot.status = status.clone();
            changed
        };
        if changed {
            tracing::debug!(status = %status, "Export status");
            self.emit(ExportEvent::StatusChanged(status));
        }
    }

    fn set_current_frame(&self, frame: usize) {
        lock(&self.snapshot).current_frame = frame;
        self.emit(ExportEvent::CurrentFrameChanged(frame));
    }

    fn begin_session(&self, total: usize) {
        let status = "Starting export...".to_string();
        {
            let mut snapshot = lock(&self.snapshot);
            snapshot.state = ExportState::Starting;
            snapshot.exporting = true;
            snapshot.total_frames = total;
            snapshot.current_frame = 0;
            snapshot.status = status.clone();
        }
        self.emit(ExportEvent::StateChanged(ExportState::Starting));
        self.emit(ExportEvent::TotalFramesChanged(total));
        self.emit(ExportEvent::CurrentFrameChanged(0));
        self.emit(ExportEvent::ExportingChanged(true));
        self.emit(ExportEvent::StatusChanged(status));
    }

    fn end_session(&self, state: ExportState, status: String) {
        {
            let mut snapshot = lock(&self.snapshot);
            snapshot.state = state;
            snapshot.exporting = false;
            snapshot.status = status.clone();
        }
        self.emit(ExportEvent::StateChanged(state));
        self.emit(ExportEvent::StatusChanged(status));
        self.emit(ExportEvent::ExportingChanged(false));
    }

    /// Back to idle, unless a new session started in the meantime.
    fn return_to_idle(&self, from: ExportState) {
        let changed = {
            let mut snapshot = lock(&self.snapshot);
            if snapshot.state == from && !snapshot.exporting {
                snapshot.state = ExportState::Idle;
                true
            } else {
                false
            }
        };
        if changed {
            self.emit(ExportEvent::StateChanged(ExportState::Idle));
        }
    }

    /// Reset after the session task died without finishing.
    fn abandon_session(&self) {
        if self.is_exporting() {
            self.end_session(
                ExportState::Failed,
                "Error: Export task failed".to_string(),
            );
            self.return_to_idle(ExportState::Failed);
        }
    }
}

/// The session was stopped while suspended.
struct Interrupted;

struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// Set, or the exporter is gone.
    fn is_set(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    async fn cancelled(&mut self) {
        // A dropped sender also ends the wait.
        let _ = self.0.wait_for(|stop| *stop).await;
    }

    async fn sleep(&mut self, delay: Duration) -> Result<(), Interrupted> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Interrupted),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

struct SessionRunner {
    shared: Arc<Shared>,
    source: Arc<dyn KeyframeSource>,
    surface: Arc<dyn RenderSurface>,
    capture: FrameCapture,
    encoder: EncoderProcessManager,
    encoder_path: PathBuf,
    timing: TimingConfig,
    cancel: CancelSignal,
    done: watch::Sender<bool>,
}

impl SessionRunner {
    async fn run(mut self, mut session: ExportSession) {
        let outcome = self.drive(&mut session).await;
        self.finish(session, outcome);
        self.done.send_replace(true);
    }

    async fn drive(&mut self, session: &mut ExportSession) -> ExportOutcome {
        if self.cancel.sleep(self.timing.start_delay()).await.is_err() {
            return cancelled(session);
        }

        while let Some(keyframe) = session.current_keyframe() {
            if let Err(outcome) = self.capture_step(session, keyframe).await {
                return outcome;
            }
        }

        self.encode(session).await
    }

    /// Load one keyframe, let it settle, capture it, then pause before the
    /// next one.
    async fn capture_step(
        &mut self,
        session: &mut ExportSession,
        keyframe: KeyframeId,
    ) -> Result<(), ExportOutcome> {
        let sequence = session.index();
        let total = session.total();
        let (width, height) = (session.params().width, session.params().height);

        self.shared.set_state(ExportState::CapturingFrame);
        let status = format!(
            "Capturing frame {} of {} (keyframe {})",
            sequence + 1,
            total,
            keyframe
        );
        self.shared.set_status(status.clone());
        let eta_secs = (sequence > 0).then(|| session.clock().eta_secs(sequence, total));
        self.shared.emit(ExportEvent::Progress(ExportProgress {
            frame: sequence + 1,
            total,
            keyframe,
            status,
            eta_secs,
        }));

        if !self.source.load_keyframe(keyframe) {
            tracing::warn!(%keyframe, "Keyframe source rejected load request");
        }

        self.shared.set_state(ExportState::WaitingSettle);
        if self.cancel.sleep(self.timing.render_settle()).await.is_err() {
            return Err(cancelled(session));
        }

        self.shared.set_state(ExportState::Capturing);
        let hidden = self.surface.set_overlays_hidden(true);
        if hidden && self.cancel.sleep(self.timing.overlay_settle()).await.is_err() {
            self.surface.set_overlays_hidden(false);
            return Err(cancelled(session));
        }

        let grab = self.capture.grab(self.surface.as_ref());
        if hidden {
            self.surface.set_overlays_hidden(false);
        }
        let result = match grab {
            Ok(grab) => {
                let path = session.scratch().frame_path(sequence);
                self.write_frame(grab, sequence, width, height, path).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(frame) => {
                let frame = frame.for_keyframe(keyframe);
                tracing::info!(
                    sequence = frame.sequence,
                    keyframe = %keyframe,
                    path = %frame.path.display(),
                    "Captured frame"
                );
            }
            Err(e) => {
                tracing::error!(sequence, %keyframe, error = %e, "Frame capture failed");
                return Err(ExportOutcome::Failed {
                    message: format!("Failed to capture frame {keyframe}: {e}"),
                    detail: FailureDetail::Capture {
                        sequence,
                        keyframe,
                        reason: e.to_string(),
                    },
                });
            }
        }

        session.advance();
        self.shared.set_current_frame(session.index());

        if self.cancel.sleep(self.timing.inter_frame()).await.is_err() {
            return Err(cancelled(session));
        }
        Ok(())
    }

    async fn write_frame(
        &self,
        grab: WindowGrab,
        sequence: usize,
        width: u32,
        height: u32,
        path: PathBuf,
    ) -> ReelResult<CapturedFrame> {
        let capture = self.capture.clone();
        tokio::task::spawn_blocking(move || capture.write_frame(grab, sequence, width, height, path))
            .await
            .unwrap_or_else(|e| Err(ReelError::capture(format!("Frame writer stopped: {e}"))))
    }

    async fn encode(&mut self, session: &ExportSession) -> ExportOutcome {
        match session.scratch().frame_count() {
            Ok(0) => return storage_failure("No frames were captured"),
            Ok(found) if found != session.total() => {
                return storage_failure(format!(
                    "Expected {} frames in scratch storage, found {found}",
                    session.total()
                ));
            }
            Ok(_) => {}
            Err(e) => return storage_failure(format!("Failed to list captured frames: {e}")),
        }

        if self.cancel.is_set() {
            return cancelled(session);
        }

        self.shared.set_state(ExportState::Encoding);
        self.shared.set_status("Generating video...");

        let params = session.params();
        let job = EncodeJob::new(
            self.encoder_path.clone(),
            session.scratch().input_pattern(),
            params.frame_rate,
            params.output_path.clone(),
        );

        let mut process = match self.encoder.start(&job) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(error = %e, "Encoder launch failed");
                return encode_outcome(EncodeResult::from(e), session);
            }
        };

        let result = tokio::select! {
            biased;
            result = process.wait() => Some(result),
            _ = self.cancel.cancelled() => None,
        };

        match result {
            Some(result) => encode_outcome(result, session),
            None if process.has_exited() => {
                tracing::debug!("Encoder exited before the stop request");
                encode_outcome(process.wait().await, session)
            }
            None => {
                process.terminate(self.timing.kill_grace()).await;
                cancelled(session)
            }
        }
    }

    fn finish(&self, mut session: ExportSession, outcome: ExportOutcome) {
        if let Err(e) = session.scratch_mut().release() {
            tracing::warn!(error = %e, "Failed to clean up scratch directory");
        }

        match &outcome {
            ExportOutcome::Completed {
                output_path,
                frames,
                elapsed_secs,
            } => tracing::info!(
                output = %output_path.display(),
                frames,
                elapsed_secs,
                started_at = %session.clock().epoch_wall(),
                "Export completed"
            ),
            ExportOutcome::Failed { message, .. } => {
                tracing::error!(message = %message, "Export failed")
            }
            ExportOutcome::Cancelled { frames_captured } => {
                tracing::info!(frames_captured, "Export cancelled")
            }
        }

        let state = outcome.state();
        self.shared.end_session(state, outcome.status());
        self.shared.emit(ExportEvent::Finished(outcome));
        self.shared.return_to_idle(state);
    }
}

fn cancelled(session: &ExportSession) -> ExportOutcome {
    ExportOutcome::Cancelled {
        frames_captured: session.index(),
    }
}

fn storage_failure(reason: impl Into<String>) -> ExportOutcome {
    let reason = reason.into();
    ExportOutcome::Failed {
        message: reason.clone(),
        detail: FailureDetail::Storage { reason },
    }
}

fn encode_outcome(result: EncodeResult, session: &ExportSession) -> ExportOutcome {
    let message = result.message();
    match result {
        EncodeResult::Success { output_path } => ExportOutcome::Completed {
            output_path,
            frames: session.total(),
            elapsed_secs: session.clock().elapsed_secs(),
        },
        EncodeResult::Failure {
            exit_code,
            diagnostics,
        } => ExportOutcome::Failed {
            message,
            detail: FailureDetail::Encoder {
                exit_code,
                diagnostics,
            },
        },
        EncodeResult::LaunchFailure { kind, reason } => ExportOutcome::Failed {
            message,
            detail: FailureDetail::Launch { kind, reason },
        },
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
