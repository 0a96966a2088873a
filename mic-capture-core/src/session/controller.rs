use std::sync::Arc;

use uuid::Uuid;

use crate::models::audio_models::{InterruptionEvent, RecordPermission, RenderDiagnostics};
use crate::models::config::{AudioFormatDescriptor, CaptureConfiguration, PlaybackSource};
use crate::models::error::{CaptureError, HardwareStatus, RenderError};
use crate::models::state::RecordingState;
use crate::processing::ring_buffer::{RingBuffer, RingReader};
use crate::render::capture::CaptureHandler;
use crate::render::playback::{OutputSource, PlaybackFeeder, PlaybackHandler, PlaybackQueue};
use crate::render::{CaptureShared, EngineCallbacks};
use crate::session::monitor::CaptureMonitor;
use crate::traits::audio_session::AudioSession;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::hardware::{HardwareBackend, HardwareUnit};

/// The live hardware unit plus what teardown needs to know about it.
struct HardwareUnitHandle<U> {
    id: Uuid,
    unit: U,
    initialized: bool,
}

/// Owns the hardware unit and drives every start/stop/interruption transition.
///
/// Generic over the platform audio layer (`HardwareBackend`) and audio session
/// (`AudioSession`). All mutating operations take `&mut self`, so callers must
/// serialize them (one control thread, or a mutex around the controller). The
/// render callbacks never touch the unit handle; they only read the shared
/// running flag.
///
/// Data flow:
/// ```text
/// [hardware] → render_input → [RingBuffer] + [LevelEstimator] → CaptureMonitor (consumers)
/// [hardware] ← render_output ← silence | RingReader (monitor) | QueueSource ← PlaybackFeeder
/// ```
pub struct LifecycleController<B: HardwareBackend, S: AudioSession> {
    backend: B,
    session: S,
    config: CaptureConfiguration,
    state: RecordingState,
    unit: Option<HardwareUnitHandle<B::Unit>>,
    shared: Arc<CaptureShared>,
    playback_queue: Option<PlaybackQueue>,
    playback_feeder: Option<PlaybackFeeder>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    failures_seen: u64,
}

impl<B: HardwareBackend, S: AudioSession> LifecycleController<B, S> {
    /// Validate the configuration and pre-allocate every buffer.
    pub fn new(backend: B, session: S, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        let ring = RingBuffer::new(config.buffer_capacity, config.format.channels as usize)?;
        let (playback_queue, playback_feeder) = if config.playback_source == PlaybackSource::Queue {
            let (queue, feeder) = PlaybackQueue::with_capacity(config.playback_queue_capacity);
            (Some(queue), Some(feeder))
        } else {
            (None, None)
        };

        Ok(Self {
            backend,
            session,
            config,
            state: RecordingState::Idle,
            unit: None,
            shared: Arc::new(CaptureShared::new(ring)),
            playback_queue,
            playback_feeder,
            delegate: None,
            failures_seen: 0,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn format(&self) -> &AudioFormatDescriptor {
        &self.config.format
    }

    /// Whether the hardware callbacks are currently delivering audio.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn current_level(&self) -> f32 {
        self.shared.level().current_level()
    }

    /// The most recent `count` captured samples, oldest first.
    pub fn read_snapshot(&self, count: usize) -> Result<Vec<f32>, CaptureError> {
        self.shared.ring().read_snapshot(count)
    }

    /// Read-only handle for consumer threads.
    pub fn monitor(&self) -> CaptureMonitor {
        CaptureMonitor::new(Arc::clone(&self.shared))
    }

    /// Index-tracking reader over the capture ring, starting at the write cursor.
    pub fn ring_reader(&self) -> RingReader {
        RingReader::new(Arc::clone(self.shared.ring()))
    }

    /// Producer for [`PlaybackSource::Queue`]. Handed out once.
    pub fn take_playback_feeder(&mut self) -> Option<PlaybackFeeder> {
        self.playback_feeder.take()
    }

    pub fn diagnostics(&self) -> RenderDiagnostics {
        self.shared.stats().snapshot()
    }

    /// Session permission and activation, then the hardware unit.
    pub fn start_recording(&mut self) -> Result<(), CaptureError> {
        self.start_session()?;
        self.start_unit()
    }

    /// Tear down the unit and deactivate the session.
    pub fn stop_recording(&mut self) -> Result<(), CaptureError> {
        let unit_result = self.stop_unit();

        let session_result = if self.state.has_session() {
            self.session.deactivate()
        } else {
            Ok(())
        };
        if let Err(ref e) = session_result {
            log::warn!("Audio session deactivation failed: {}", e);
        }

        self.set_state(RecordingState::Idle);
        unit_result.and(session_result)
    }

    /// Check microphone permission and activate the audio session.
    ///
    /// Transitions: idle/interrupted → session_active. No-op if a session is
    /// already active.
    pub fn start_session(&mut self) -> Result<(), CaptureError> {
        if self.state.has_session() {
            return Ok(());
        }

        let granted = match self.session.record_permission() {
            RecordPermission::Granted => true,
            RecordPermission::Denied => false,
            RecordPermission::Undetermined => {
                log::info!("Requesting record permission");
                self.session.request_record_permission()
            }
        };
        if !granted {
            log::warn!("Record permission denied");
            return Err(self.report(CaptureError::PermissionDenied));
        }

        if let Err(e) = self.session.activate() {
            log::error!("Audio session activation failed: {}", e);
            return Err(self.report(e));
        }

        log::info!("Audio session active");
        self.set_state(RecordingState::SessionActive);
        Ok(())
    }

    /// Create, initialize and start a hardware unit.
    ///
    /// Idempotent: a running unit is fully stopped and released first, so at
    /// most one hardware handle exists. Any failure part way releases the
    /// new unit before returning.
    pub fn start_unit(&mut self) -> Result<(), CaptureError> {
        match self.state {
            RecordingState::SessionActive | RecordingState::UnitRunning => {}
            RecordingState::Interrupted => return Err(self.report(CaptureError::Interrupted)),
            RecordingState::Idle => {
                return Err(self.report(CaptureError::InvalidState(
                    "audio session is not active".into(),
                )))
            }
        }

        if self.unit.is_some() {
            log::info!("Restarting hardware unit");
            if let Err(e) = self.stop_unit() {
                log::warn!("Teardown before restart reported: {}", e);
            }
        }

        let callbacks = Box::new(self.build_callbacks());
        let unit = self
            .backend
            .create_unit(
                &self.config.format,
                self.config.max_frames_per_period,
                callbacks,
            )
            .map_err(|status| self.report(CaptureError::hardware("create unit", status)))?;

        let id = Uuid::new_v4();
        log::debug!("Created hardware unit {}", id);
        self.unit = Some(HardwareUnitHandle {
            id,
            unit,
            initialized: false,
        });

        if let Err(e) = self.initialize_and_start() {
            log::error!("Hardware unit {} failed to start: {}", id, e);
            self.shared.set_running(false);
            if let Err(release_error) = self.release_unit() {
                log::debug!("Release after failed start reported: {}", release_error);
            }
            return Err(self.report(e));
        }

        log::info!(
            "Hardware unit {} running: {} Hz, {} ch, {}-bit",
            id,
            self.config.format.sample_rate,
            self.config.format.channels,
            self.config.format.bits_per_sample()
        );
        self.set_state(RecordingState::UnitRunning);
        Ok(())
    }

    /// Stop hardware callbacks and release the unit.
    ///
    /// After this returns no callback runs again. Teardown always runs to the
    /// end; the first hardware failure is returned afterwards.
    pub fn stop_unit(&mut self) -> Result<(), CaptureError> {
        let Some(handle) = self.unit.as_mut() else {
            return Ok(());
        };

        self.shared.set_running(false);
        let stop_result = handle
            .unit
            .stop()
            .map_err(|status| CaptureError::hardware("stop unit", status));
        if let Err(ref e) = stop_result {
            log::warn!("Hardware unit {}: {}", handle.id, e);
        }

        let release_result = self.release_unit();

        let result = stop_result.and(release_result);
        if let Err(ref e) = result {
            self.notify_error(e);
        }
        result
    }

    /// Uninitialize and dispose the unit and clear the handle.
    ///
    /// Callbacks are marked stopped first. A running controller drops back to
    /// `SessionActive`.
    pub fn release_unit(&mut self) -> Result<(), CaptureError> {
        let Some(mut handle) = self.unit.take() else {
            return Ok(());
        };
        self.shared.set_running(false);

        let uninit_result = if handle.initialized {
            handle.unit.uninitialize()
        } else {
            Ok(())
        };
        let dispose_result = handle.unit.dispose();

        for (operation, result) in [("uninitialize unit", uninit_result), ("dispose unit", dispose_result)] {
            if let Err(status) = result {
                log::warn!("Hardware unit {}: {} failed with {}", handle.id, operation, status);
            }
        }
        log::debug!("Released hardware unit {}", handle.id);
        if self.state.is_running() {
            self.set_state(RecordingState::SessionActive);
        }

        uninit_result
            .map_err(|status| CaptureError::hardware("uninitialize unit", status))
            .and(dispose_result.map_err(|status| CaptureError::hardware("dispose unit", status)))
    }

    /// React to an external interruption.
    ///
    /// `Began` while running stops the unit, deactivates the session and
    /// enters `Interrupted`. `Ended` restarts only when
    /// `resume_after_interruption` is configured; otherwise the state stays
    /// `Interrupted` until the host calls [`Self::start_recording`].
    pub fn handle_interruption(&mut self, event: InterruptionEvent) -> Result<(), CaptureError> {
        match event {
            InterruptionEvent::Began => {
                if !self.state.is_running() {
                    log::debug!("Interruption began while {}; nothing to stop", self.state);
                    return Ok(());
                }
                log::info!("Audio interruption began; stopping capture");

                if let Err(e) = self.stop_unit() {
                    log::warn!("Teardown on interruption reported: {}", e);
                }
                if let Err(e) = self.session.deactivate() {
                    log::warn!("Audio session deactivation failed: {}", e);
                }
                self.set_state(RecordingState::Interrupted);
                Ok(())
            }
            InterruptionEvent::Ended => {
                if !self.state.is_interrupted() {
                    return Ok(());
                }
                if self.config.resume_after_interruption {
                    log::info!("Audio interruption ended; resuming capture");
                    self.start_recording()
                } else {
                    log::info!("Audio interruption ended; waiting for explicit restart");
                    Ok(())
                }
            }
        }
    }

    /// Log and report render failures recorded since the last check.
    ///
    /// The render path cannot log or recover; this is where the control
    /// thread picks that up. Call it periodically.
    pub fn check_render_health(&mut self) -> RenderDiagnostics {
        let diagnostics = self.diagnostics();
        let new_failures = diagnostics.render_failures - self.failures_seen;
        if new_failures > 0 {
            self.failures_seen = diagnostics.render_failures;
            let error = match diagnostics.last_failure {
                Some(RenderError::Hardware(status)) => CaptureError::hardware("render", status),
                Some(failure) => CaptureError::Render(failure),
                None => CaptureError::hardware(
                    "render",
                    HardwareStatus(diagnostics.last_failure_status),
                ),
            };
            log::warn!("{} render period(s) failed, last: {}", new_failures, error);
            self.notify_error(&error);
        }
        diagnostics
    }

    // --- Internal helpers ---

    fn initialize_and_start(&mut self) -> Result<(), CaptureError> {
        let handle = self
            .unit
            .as_mut()
            .ok_or_else(|| CaptureError::InvalidState("no hardware unit".into()))?;

        handle
            .unit
            .initialize()
            .map_err(|status| CaptureError::hardware("initialize unit", status))?;
        handle.initialized = true;

        // Mark running before start so the very first period is captured.
        self.shared.set_running(true);
        handle
            .unit
            .start()
            .map_err(|status| CaptureError::hardware("start unit", status))
    }

    fn build_callbacks(&self) -> EngineCallbacks {
        let format = self.config.format;
        let max_frames = self.config.max_frames_per_period;

        let source = match (self.config.playback_source, &self.playback_queue) {
            (PlaybackSource::Monitor, _) => {
                OutputSource::Monitor(RingReader::new(Arc::clone(self.shared.ring())))
            }
            (PlaybackSource::Queue, Some(queue)) => match queue.attach() {
                Some(source) => OutputSource::Queue(source),
                None => {
                    log::warn!("Playback queue is still held by a released unit; output is silent");
                    OutputSource::Silence
                }
            },
            _ => OutputSource::Silence,
        };

        EngineCallbacks::new(
            CaptureHandler::new(format, max_frames, Arc::clone(&self.shared)),
            PlaybackHandler::new(format, max_frames, source, Arc::clone(&self.shared)),
        )
    }

    fn set_state(&mut self, new_state: RecordingState) {
        if self.state == new_state {
            return;
        }
        log::debug!("Recording state {} → {}", self.state, new_state);
        self.state = new_state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(new_state);
        }
    }

    fn notify_error(&self, error: &CaptureError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }

    fn report(&self, error: CaptureError) -> CaptureError {
        self.notify_error(&error);
        error
    }
}

impl<B: HardwareBackend, S: AudioSession> Drop for LifecycleController<B, S> {
    fn drop(&mut self) {
        if self.unit.is_some() {
            if let Err(e) = self.stop_unit() {
                log::warn!("Teardown on drop reported: {}", e);
            }
        }
    }
}
