//! Threaded stand-in for a platform audio unit.
//!
//! Each started unit owns a dedicated I/O thread that plays the hardware's
//! part: once per period it hands the registered callbacks a rendered input
//! buffer and an output buffer to fill, exactly as a real-time audio thread
//! would.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use mic_capture_core::processing::sample_format;
use mic_capture_core::{
    AudioFormatDescriptor, AudioTimestamp, HardwareBackend, HardwareStatus, HardwareUnit,
    InputRender, RenderCallbacks, RenderContext,
};

use crate::signal::{Signal, SignalGenerator};

const PARAM_ERROR: i32 = -50;
const CANNOT_DO_IN_CURRENT_CONTEXT: i32 = -10863;
const UNINITIALIZED: i32 = -10867;
const FORMAT_NOT_SUPPORTED: i32 = -10868;

/// Decoded output samples kept by the hardware. Older samples are discarded.
const OUTPUT_TAP_LIMIT: usize = 1 << 16;

/// How long an exhausted I/O thread sleeps between checks of the run flag.
const IDLE_POLL: Duration = Duration::from_millis(1);

/// How the I/O thread spaces its periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// One period per `period_frames / sample_rate` of wall time.
    #[default]
    RealTime,
    /// Back to back, as fast as the callbacks return.
    Unpaced,
}

/// Behaviour of every unit a [`SimulatedBackend`] creates.
#[derive(Debug, Clone)]
pub struct SimulatedOptions {
    pub signal: Signal,
    /// Frames delivered per callback. Must not exceed the controller's
    /// `max_frames_per_period`.
    pub period_frames: usize,
    pub pacing: Pacing,
    /// Stop delivering after this many periods per unit. The thread stays
    /// alive until the unit is stopped.
    pub max_periods: Option<u64>,
}

impl Default for SimulatedOptions {
    fn default() -> Self {
        Self {
            signal: Signal::default(),
            period_frames: 512,
            pacing: Pacing::RealTime,
            max_periods: None,
        }
    }
}

#[derive(Default)]
struct HardwareState {
    periods: AtomicU64,
    render_errors: AtomicU64,
    units_created: AtomicUsize,
    live_units: AtomicUsize,
    streaming: AtomicUsize,
    input_failure: AtomicI32,
    start_failure: AtomicI32,
    output: Mutex<Vec<f32>>,
}

/// Observation and fault-injection handle shared by a backend and its units.
///
/// Cheap to clone; keep one after moving the backend into a controller.
#[derive(Clone, Default)]
pub struct SimulatedHardware {
    state: Arc<HardwareState>,
}

impl SimulatedHardware {
    /// Periods delivered across every unit.
    pub fn periods(&self) -> u64 {
        self.state.periods.load(Ordering::Acquire)
    }

    /// Callback invocations that returned an error.
    pub fn render_errors(&self) -> u64 {
        self.state.render_errors.load(Ordering::Relaxed)
    }

    pub fn units_created(&self) -> usize {
        self.state.units_created.load(Ordering::Relaxed)
    }

    /// Units created and not yet disposed.
    pub fn live_units(&self) -> usize {
        self.state.live_units.load(Ordering::Relaxed)
    }

    /// Whether any I/O thread is currently running.
    pub fn is_streaming(&self) -> bool {
        self.state.streaming.load(Ordering::Acquire) > 0
    }

    /// Make the next input render fail with `status`.
    pub fn inject_input_failure(&self, status: i32) {
        self.state.input_failure.store(status, Ordering::Relaxed);
    }

    /// Make the next `start` on any unit fail with `status`.
    pub fn inject_start_failure(&self, status: i32) {
        self.state.start_failure.store(status, Ordering::Relaxed);
    }

    /// Decoded samples the callbacks wrote to the output bus, oldest first.
    pub fn output_samples(&self) -> Vec<f32> {
        self.state.output.lock().clone()
    }

    pub fn clear_output(&self) {
        self.state.output.lock().clear();
    }

    /// Block until `count` periods have been delivered in total.
    /// Returns false on timeout.
    pub fn wait_for_periods(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.periods() < count {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(IDLE_POLL);
        }
        true
    }

    /// Consume a one-shot injected status. Zero means nothing is armed.
    fn take_status(slot: &AtomicI32) -> Result<(), HardwareStatus> {
        HardwareStatus::check(slot.swap(0, Ordering::Relaxed))
    }

    fn record_output(&self, samples: &[f32]) {
        let mut output = self.state.output.lock();
        output.extend_from_slice(samples);
        if output.len() > OUTPUT_TAP_LIMIT {
            let excess = output.len() - OUTPUT_TAP_LIMIT;
            output.drain(..excess);
        }
    }
}

/// [`HardwareBackend`] whose units run on a plain thread and capture a
/// generated [`Signal`].
pub struct SimulatedBackend {
    options: SimulatedOptions,
    hardware: SimulatedHardware,
}

impl SimulatedBackend {
    pub fn new(options: SimulatedOptions) -> Self {
        Self {
            options,
            hardware: SimulatedHardware::default(),
        }
    }

    pub fn options(&self) -> &SimulatedOptions {
        &self.options
    }

    pub fn hardware(&self) -> SimulatedHardware {
        self.hardware.clone()
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(SimulatedOptions::default())
    }
}

impl HardwareBackend for SimulatedBackend {
    type Unit = SimulatedUnit;

    fn create_unit(
        &mut self,
        format: &AudioFormatDescriptor,
        max_frames_per_period: usize,
        callbacks: Box<dyn RenderCallbacks>,
    ) -> Result<SimulatedUnit, HardwareStatus> {
        if let Err(reason) = format.validate() {
            log::error!("Simulated unit rejected format: {}", reason);
            return Err(HardwareStatus(FORMAT_NOT_SUPPORTED));
        }
        let period_frames = self.options.period_frames;
        if period_frames == 0 || period_frames > max_frames_per_period {
            log::error!(
                "Simulated period of {} frames does not fit a maximum of {}",
                period_frames,
                max_frames_per_period
            );
            return Err(HardwareStatus(PARAM_ERROR));
        }

        let id = self.hardware.state.units_created.fetch_add(1, Ordering::Relaxed);
        self.hardware.state.live_units.fetch_add(1, Ordering::Relaxed);
        log::debug!("Created simulated unit #{}", id);

        Ok(SimulatedUnit {
            id,
            format: *format,
            options: self.options.clone(),
            hardware: self.hardware.clone(),
            callbacks: Some(callbacks),
            io_thread: None,
            running: Arc::new(AtomicBool::new(false)),
            initialized: false,
        })
    }
}

/// One simulated hardware unit.
///
/// The callbacks live in the unit while it is stopped and move onto the I/O
/// thread while it runs. `stop` joins the thread and takes them back, so no
/// callback runs after `stop` returns.
pub struct SimulatedUnit {
    id: usize,
    format: AudioFormatDescriptor,
    options: SimulatedOptions,
    hardware: SimulatedHardware,
    callbacks: Option<Box<dyn RenderCallbacks>>,
    io_thread: Option<thread::JoinHandle<Box<dyn RenderCallbacks>>>,
    running: Arc<AtomicBool>,
    initialized: bool,
}

impl SimulatedUnit {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.io_thread.is_some()
    }

    fn join_io_thread(&mut self) -> Result<(), HardwareStatus> {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.io_thread.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(callbacks) => {
                self.callbacks = Some(callbacks);
                Ok(())
            }
            Err(_) => {
                log::error!("Simulated unit #{} I/O thread panicked", self.id);
                Err(HardwareStatus(CANNOT_DO_IN_CURRENT_CONTEXT))
            }
        }
    }
}

impl HardwareUnit for SimulatedUnit {
    fn initialize(&mut self) -> Result<(), HardwareStatus> {
        self.initialized = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), HardwareStatus> {
        if !self.initialized {
            return Err(HardwareStatus(UNINITIALIZED));
        }
        if self.io_thread.is_some() {
            return Ok(());
        }
        SimulatedHardware::take_status(&self.hardware.state.start_failure)?;
        let Some(callbacks) = self.callbacks.take() else {
            return Err(HardwareStatus(CANNOT_DO_IN_CURRENT_CONTEXT));
        };

        self.running.store(true, Ordering::Release);
        let io = IoLoop {
            callbacks,
            running: Arc::clone(&self.running),
            hardware: self.hardware.clone(),
            format: self.format,
            options: self.options.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("sim-audio-io-{}", self.id))
            .spawn(move || io.run())
            .map_err(|e| {
                log::error!("Failed to spawn simulated I/O thread: {}", e);
                HardwareStatus(CANNOT_DO_IN_CURRENT_CONTEXT)
            })?;

        self.io_thread = Some(handle);
        log::debug!("Simulated unit #{} started", self.id);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HardwareStatus> {
        let result = self.join_io_thread();
        log::debug!("Simulated unit #{} stopped", self.id);
        result
    }

    fn uninitialize(&mut self) -> Result<(), HardwareStatus> {
        let result = self.join_io_thread();
        self.initialized = false;
        result
    }

    fn dispose(mut self) -> Result<(), HardwareStatus> {
        let result = self.join_io_thread();
        log::debug!("Disposed simulated unit #{}", self.id);
        result
    }
}

impl Drop for SimulatedUnit {
    fn drop(&mut self) {
        let _ = self.join_io_thread();
        self.hardware.state.live_units.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Microphone side of the simulated hardware. Honors injected failures.
struct SimulatedInput {
    generator: SignalGenerator,
    hardware: SimulatedHardware,
}

impl InputRender for SimulatedInput {
    fn render(&mut self, _ctx: &RenderContext, dest: &mut [u8]) -> Result<(), HardwareStatus> {
        SimulatedHardware::take_status(&self.hardware.state.input_failure)?;
        self.generator.fill(dest);
        Ok(())
    }
}

struct IoLoop {
    callbacks: Box<dyn RenderCallbacks>,
    running: Arc<AtomicBool>,
    hardware: SimulatedHardware,
    format: AudioFormatDescriptor,
    options: SimulatedOptions,
}

impl IoLoop {
    fn run(mut self) -> Box<dyn RenderCallbacks> {
        let frames = self.options.period_frames;
        let channels = self.format.channels as usize;
        let period = self.format.period_duration(frames);

        let mut input = SimulatedInput {
            generator: SignalGenerator::new(self.options.signal, self.format, frames),
            hardware: self.hardware.clone(),
        };
        let mut output = vec![0u8; frames * self.format.frame_size()];
        let mut played = vec![0.0f32; frames * channels];

        let started = Instant::now();
        let mut deadline = started;
        let mut sample_time = 0.0f64;
        let mut delivered = 0u64;

        self.hardware.state.streaming.fetch_add(1, Ordering::AcqRel);
        while self.running.load(Ordering::Acquire) {
            if self.options.max_periods.is_some_and(|max| delivered >= max) {
                thread::sleep(IDLE_POLL);
                continue;
            }

            let timestamp = AudioTimestamp {
                sample_time,
                host_time_ns: started.elapsed().as_nanos() as u64,
            };

            let input_ctx = RenderContext::input(timestamp, frames as u32);
            if self.callbacks.render_input(&input_ctx, &mut input).is_err() {
                self.hardware.state.render_errors.fetch_add(1, Ordering::Relaxed);
            }

            let output_ctx = RenderContext::output(timestamp, frames as u32);
            match self.callbacks.render_output(&output_ctx, &mut output) {
                Ok(()) => {
                    sample_format::decode_into(self.format.sample_format, &output, &mut played);
                    self.hardware.record_output(&played);
                }
                Err(_) => {
                    self.hardware.state.render_errors.fetch_add(1, Ordering::Relaxed);
                }
            }

            sample_time += frames as f64;
            delivered += 1;
            self.hardware.state.periods.fetch_add(1, Ordering::AcqRel);

            match self.options.pacing {
                Pacing::RealTime => {
                    deadline += period;
                    if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                        thread::sleep(wait);
                    }
                }
                Pacing::Unpaced => thread::yield_now(),
            }
        }
        self.hardware.state.streaming.fetch_sub(1, Ordering::AcqRel);

        self.callbacks
    }
}
