use crate::models::audio_models::RenderContext;
use crate::models::config::AudioFormatDescriptor;
use crate::models::error::{HardwareStatus, RenderError};

/// Pull interface the hardware hands to the input callback.
///
/// Rendering copies the period's captured microphone frames into `dest`,
/// which is exactly `ctx.frame_count * frame_size` bytes in the negotiated
/// format.
pub trait InputRender {
    fn render(&mut self, ctx: &RenderContext, dest: &mut [u8]) -> Result<(), HardwareStatus>;
}

/// The two entry points the hardware layer invokes once per audio period.
///
/// Implemented by the core and registered with a [`HardwareBackend`] when a
/// unit is created. The implementation is the callback context: the hardware
/// layer owns it and passes it back on every invocation, on its real-time
/// thread. Neither method may block, allocate, log or take a lock.
pub trait RenderCallbacks: Send + 'static {
    /// A period of microphone input is ready to be pulled from `input`.
    fn render_input(
        &mut self,
        ctx: &RenderContext,
        input: &mut dyn InputRender,
    ) -> Result<(), RenderError>;

    /// Fill `output` with `ctx.frame_count` frames for the speaker.
    fn render_output(&mut self, ctx: &RenderContext, output: &mut [u8]) -> Result<(), RenderError>;
}

/// Factory for hardware audio units (the platform audio layer).
pub trait HardwareBackend: Send {
    type Unit: HardwareUnit;

    /// Create a unit for `format` with `callbacks` registered on its input
    /// and output buses. The unit is not yet initialized.
    fn create_unit(
        &mut self,
        format: &AudioFormatDescriptor,
        max_frames_per_period: usize,
        callbacks: Box<dyn RenderCallbacks>,
    ) -> Result<Self::Unit, HardwareStatus>;
}

/// Live hardware audio unit.
///
/// Owned exclusively by the lifecycle controller. Teardown is always
/// `stop`, `uninitialize`, `dispose`. Once `uninitialize` returns no
/// callback is running or will run again.
pub trait HardwareUnit: Send {
    fn initialize(&mut self) -> Result<(), HardwareStatus>;

    /// Begin invoking the registered callbacks.
    fn start(&mut self) -> Result<(), HardwareStatus>;

    fn stop(&mut self) -> Result<(), HardwareStatus>;

    fn uninitialize(&mut self) -> Result<(), HardwareStatus>;

    /// Release the unit and its registered callbacks.
    fn dispose(self) -> Result<(), HardwareStatus>;
}
