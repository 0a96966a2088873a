use std::fs;
use std::path::Path;

use mic_capture_core::{CaptureConfiguration, InterruptionEvent, LifecycleController, SampleFormat};
use mic_capture_sim::{SimulatedBackend, SimulatedOptions, SimulatedSession};

use crate::audio_state::{emit_level, AudioState, ConsoleDelegate, DiagnosticsInfo, LevelPayload};

/// Load a JSON capture configuration, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<CaptureConfiguration, String> {
    let Some(path) = path else {
        return Ok(CaptureConfiguration::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let config: CaptureConfiguration =
        serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))?;
    config.validate()?;
    Ok(config)
}

/// Switch the capture format to the signed-integer encoding of `bits`.
pub fn apply_bit_depth(config: &mut CaptureConfiguration, bits: &str) -> Result<(), String> {
    let bits: u16 = bits
        .parse()
        .map_err(|e| format!("bit depth {:?}: {}", bits, e))?;
    config.format.sample_format = SampleFormat::signed_integer(bits)
        .ok_or_else(|| format!("no signed-integer format with {} bits", bits))?;
    config.validate()
}

pub fn start_recording(
    config: CaptureConfiguration,
    options: SimulatedOptions,
    state: &AudioState,
) -> Result<(), String> {
    let mut controller_guard = state.controller.lock();

    // Drop any previous controller; its unit is torn down on drop.
    *controller_guard = None;

    let backend = SimulatedBackend::new(options);
    let hardware = backend.hardware();
    let mut controller = LifecycleController::new(backend, SimulatedSession::granted(), config)
        .map_err(|e| e.to_string())?;
    controller.set_delegate(ConsoleDelegate::new());
    controller.start_recording().map_err(|e| e.to_string())?;

    *controller_guard = Some(controller);
    *state.hardware.lock() = Some(hardware);
    Ok(())
}

pub fn interrupt(event: InterruptionEvent, state: &AudioState) -> Result<(), String> {
    let mut controller_guard = state.controller.lock();
    let controller = controller_guard.as_mut().ok_or("no active controller")?;
    controller.handle_interruption(event).map_err(|e| e.to_string())
}

pub fn resume_recording(state: &AudioState) -> Result<(), String> {
    let mut controller_guard = state.controller.lock();
    let controller = controller_guard.as_mut().ok_or("no active controller")?;
    controller.start_recording().map_err(|e| e.to_string())
}

pub fn report_level(state: &AudioState) -> Result<(), String> {
    let mut controller_guard = state.controller.lock();
    let controller = controller_guard.as_mut().ok_or("no active controller")?;
    controller.check_render_health();

    let monitor = controller.monitor();
    emit_level(LevelPayload {
        level: monitor.current_level(),
        total_written: monitor.total_written(),
    });
    Ok(())
}

pub fn stop_recording(state: &AudioState) -> Result<DiagnosticsInfo, String> {
    let mut controller_guard = state.controller.lock();
    let controller = controller_guard.as_mut().ok_or("no active controller")?;

    controller.stop_recording().map_err(|e| e.to_string())?;
    let info = get_diagnostics_locked(controller, state)?;

    // Drop controller so the next start begins from idle
    *controller_guard = None;
    Ok(info)
}

pub fn get_diagnostics(state: &AudioState) -> Result<DiagnosticsInfo, String> {
    let controller_guard = state.controller.lock();
    let controller = controller_guard.as_ref().ok_or("no active controller")?;
    get_diagnostics_locked(controller, state)
}

fn get_diagnostics_locked(
    controller: &crate::audio_state::Controller,
    state: &AudioState,
) -> Result<DiagnosticsInfo, String> {
    let hardware_guard = state.hardware.lock();
    let hardware = hardware_guard.as_ref().ok_or("no simulated hardware")?;
    Ok(DiagnosticsInfo::new(
        controller.state(),
        controller.diagnostics(),
        hardware,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_depth_selects_integer_format() {
        let mut config = CaptureConfiguration::default();
        apply_bit_depth(&mut config, "16").unwrap();
        assert_eq!(config.format.sample_format, SampleFormat::I16);
        assert_eq!(config.format.bytes_per_sample(), 2);

        apply_bit_depth(&mut config, "24").unwrap();
        assert_eq!(config.format.sample_format, SampleFormat::I24);
    }

    #[test]
    fn unsupported_bit_depth_leaves_config_alone() {
        let mut config = CaptureConfiguration::default();
        let before = config.format.sample_format;

        assert!(apply_bit_depth(&mut config, "8").is_err());
        assert!(apply_bit_depth(&mut config, "loud").is_err());
        assert_eq!(config.format.sample_format, before);
    }
}
