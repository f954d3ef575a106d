//! turretd - pan/tilt visual servo daemon
//!
//! This daemon:
//! 1. Loads the turret configuration (file + env + flags)
//! 2. Binds one servo per axis to its PWM channel
//! 3. Connects the camera source and the inference engine
//! 4. Runs the control loop until interrupted

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use turret_tracker::{
    class_name, detect::engines, open_channel, CameraSource, ControlLoop, FrameCenter, LogSink,
    Servo, TrackingController, TurretConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the turret config file (JSON). Falls back to TURRET_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Camera device override (e.g. /dev/video0 or stub://camera).
    #[arg(long)]
    camera: Option<String>,
    /// Target class id override.
    #[arg(long)]
    target_class: Option<u32>,
    /// ONNX model path override.
    #[arg(long)]
    model: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = TurretConfig::load_from(args.config.as_deref())?;
    if let Some(camera) = args.camera {
        cfg.camera.device = camera;
    }
    if let Some(target_class) = args.target_class {
        cfg.target_class = target_class;
    }
    if let Some(model) = args.model {
        cfg.inference.model_path = Some(model);
    }

    log::info!(
        "turretd starting: target class {} ({}), camera {}, {}x{}",
        cfg.target_class,
        class_name(cfg.target_class).unwrap_or("unknown"),
        cfg.camera.device,
        cfg.camera.width,
        cfg.camera.height
    );

    let pan = Servo::new(
        "pan",
        open_channel(&cfg.servos.pan.channel)?,
        &cfg.servos.pan.servo_config(cfg.servos.frequency_hz),
    )
    .context("construct pan servo")?;
    let tilt = Servo::new(
        "tilt",
        open_channel(&cfg.servos.tilt.channel)?,
        &cfg.servos.tilt.servo_config(cfg.servos.frequency_hz),
    )
    .context("construct tilt servo")?;

    let mut source = CameraSource::new(cfg.camera.clone())?;
    source.connect()?;

    let mut engine = engines::from_settings(
        &cfg.inference,
        cfg.target_class,
        cfg.camera.width,
        cfg.camera.height,
    )?;
    engine.warm_up().context("warm up inference engine")?;
    log::info!("inference engine: {}", engine.name());

    let controller = TrackingController::new(
        FrameCenter::of_resolution(cfg.camera.width, cfg.camera.height),
        cfg.gains,
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            log::info!("interrupt received, stopping");
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("install interrupt handler")?;
    }

    let mut control_loop = ControlLoop::new(
        source,
        engine,
        LogSink::new(),
        controller,
        cfg.target_class,
        pan,
        tilt,
    );
    control_loop.run(&shutdown)?;

    log::info!("turretd stopped");
    Ok(())
}
