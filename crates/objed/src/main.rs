use std::{
    path::{Path, PathBuf},
    process,
};

use anyhow::Context;
use objed::{
    debug::{DebugInfo, DebugKey},
    detector::Detector,
    timer::Timer,
    train::{self, TrainConfig},
    Image,
};

const USAGE: &str = "usage:
    objed train <config.json>
    objed detect <detector.json> <image>...";

fn main() -> anyhow::Result<()> {
    objed::init_logger!();

    let mut args = std::env::args_os().skip(1);
    let command = args.next().unwrap_or_default();
    let args: Vec<PathBuf> = args.map(PathBuf::from).collect();
    match (command.to_str(), args.as_slice()) {
        (Some("train"), [config]) => run_train(config),
        (Some("detect"), [detector, images @ ..]) if !images.is_empty() => {
            run_detect(detector, images)
        }
        _ => {
            eprintln!("{USAGE}");
            process::exit(1);
        }
    }
}

fn run_train(config_path: &Path) -> anyhow::Result<()> {
    let config = TrainConfig::load(config_path).with_context(|| {
        format!("failed to load training configuration '{}'", config_path.display())
    })?;
    log::info!(
        "training a {}x{} {} into '{}'",
        config.classifier_width,
        config.classifier_height,
        config.classifier_type,
        config.classifier_path.display()
    );
    let timer = Timer::new("train");
    timer.time(|| train::train(&config)).context("training failed")?;
    log::info!("{timer}");
    Ok(())
}

fn run_detect(detector_path: &Path, images: &[PathBuf]) -> anyhow::Result<()> {
    let mut detector = Detector::load(detector_path)
        .with_context(|| format!("failed to load detector '{}'", detector_path.display()))?;
    let t_load = Timer::new("load");

    let mut debug = DebugInfo::new();
    for path in images {
        let image = t_load
            .time(|| Image::load(path))
            .with_context(|| format!("failed to load image '{}'", path.display()))?;

        debug.clear();
        let detections = detector.detect(&image, Some(&mut debug));
        println!("# {} {}", path.display(), detections.len());
        for detection in &detections {
            let rect = detection.rect();
            println!(
                "{} {} {} {} {}",
                rect.x(),
                rect.y(),
                rect.width(),
                rect.height(),
                detection.power()
            );
        }

        let windows = debug.get(DebugKey::EvaluationCount).unwrap_or(0);
        let stages = debug.get(DebugKey::TotalStageCount).unwrap_or(0);
        log::debug!(
            "'{}': {windows} windows, {:.2} stages per window",
            path.display(),
            stages as f64 / windows.max(1) as f64
        );
    }

    for timer in detector.timers().chain([&t_load]) {
        log::debug!("{timer}");
    }
    Ok(())
}
