mod arm;
mod config;
mod dispatch;
mod gesture;
mod model_download;
mod pipeline;
mod session;
mod stats;
mod types;

use std::{
    io::{self, BufRead},
    thread,
};

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{Receiver, bounded};

use crate::{
    config::{AppConfig, Args},
    dispatch::{Effector, LogEffector, gesture_action_label},
    types::Gesture,
};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    if args.help_gestures {
        print_gesture_guide();
        return Ok(());
    }

    let config = AppConfig::from_args(&args)?;
    log::debug!("config: {config:?}");
    print_gesture_guide();

    run(&config)
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn print_gesture_guide() {
    println!("Gesture guide:");
    for gesture in Gesture::ALL.iter().filter(|g| **g != Gesture::None) {
        println!(
            "  {}{:<14} {:<12} ({})",
            gesture.emoji(),
            gesture.display_name(),
            gesture_action_label(*gesture),
            gesture.description()
        );
    }
    println!("Type 'q' and press Enter to quit.");
}

/// Sends a quit signal when `q` is entered on stdin.
fn spawn_quit_watcher() -> Receiver<()> {
    let (quit_tx, quit_rx) = bounded(1);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("q") {
                let _ = quit_tx.try_send(());
                break;
            }
        }
    });
    quit_rx
}

fn build_effector(config: &AppConfig) -> Result<Box<dyn Effector>> {
    if config.control.dry_run {
        log::info!("dry run: actions are logged, not performed");
        return Ok(Box::new(LogEffector));
    }

    #[cfg(feature = "os-input")]
    {
        Ok(Box::new(dispatch::EnigoEffector::new()?))
    }

    #[cfg(not(feature = "os-input"))]
    {
        log::warn!("built without os-input, falling back to dry run");
        Ok(Box::new(LogEffector))
    }
}

#[cfg(feature = "camera-nokhwa")]
fn run(config: &AppConfig) -> Result<()> {
    use crate::{
        pipeline::{CameraCapture, HandposeDetector},
        session::Session,
    };

    let detector = HandposeDetector::open(&config.detector, config.control.mirror)?;
    let camera = CameraCapture::open(&config.camera)?;
    let effector = build_effector(config)?;

    let mut session = Session::open(config, camera, detector, effector, spawn_quit_watcher());
    let summary = session.run()?;
    summary.log();
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn run(_config: &AppConfig) -> Result<()> {
    anyhow::bail!("built without camera support; enable the camera-nokhwa feature")
}
