mod audio_state;
mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use mic_capture_core::InterruptionEvent;
use mic_capture_sim::{Signal, SimulatedOptions};

use audio_state::AudioState;

const METER_INTERVAL: Duration = Duration::from_millis(100);
const METER_TICKS: usize = 10;

/// Records from the simulated microphone, rides out an interruption and
/// prints the final diagnostics.
///
/// Usage: `mic-capture-demo [config.json] [bits]`. `bits` picks a 16, 24 or
/// 32-bit integer capture format. Set `RUST_LOG=debug` for the controller's
/// lifecycle logging.
fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args_os().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let bit_depth = args.next().map(|bits| bits.to_string_lossy().into_owned());

    match run(config_path, bit_depth) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: Option<PathBuf>, bit_depth: Option<String>) -> Result<(), String> {
    let mut config = commands::load_config(config_path.as_deref())?;
    if let Some(bits) = bit_depth {
        commands::apply_bit_depth(&mut config, &bits)?;
    }
    let options = SimulatedOptions {
        signal: Signal::Sine {
            frequency: 440.0,
            amplitude: 0.3,
        },
        period_frames: config.max_frames_per_period.min(512),
        ..SimulatedOptions::default()
    };
    let state = AudioState::new();

    commands::start_recording(config, options, &state)?;
    meter(&state)?;
    let before = commands::get_diagnostics(&state)?;
    log::info!("{} input periods before interruption", before.render.input_periods);

    commands::interrupt(InterruptionEvent::Began, &state)?;
    commands::interrupt(InterruptionEvent::Ended, &state)?;
    commands::resume_recording(&state)?;
    meter(&state)?;

    let diagnostics = commands::stop_recording(&state)?;
    let json = serde_json::to_string_pretty(&diagnostics).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn meter(state: &AudioState) -> Result<(), String> {
    for _ in 0..METER_TICKS {
        thread::sleep(METER_INTERVAL);
        commands::report_level(state)?;
    }
    Ok(())
}
