use crate::{
    classifier::{Cascade, Classifier},
    error::TrainError,
};

use super::{DatasetProcessor, StageTrainer, TrainConfig};

/// Grows a cascade classifier stage by stage and stores it at `ClassifierPath`.
///
/// An existing cascade at `ClassifierPath` is resumed. Every stage is trained on the positives
/// and negatives the stages before it accept, and the cascade is saved after each stage.
/// Training ends when the samples fall to the configured thresholds, after `LevelCount` stages,
/// or when no weak classifier beats chance anymore.
pub fn train_cascade(config: &TrainConfig) -> Result<(), TrainError> {
    let dataset = DatasetProcessor::new(config)?;
    let mut stage = StageTrainer::new(config)?;
    let mut cascade = resume_cascade(config)?;

    let mut levels = 0;
    loop {
        let label = format!("({})", "C".repeat(cascade.len() + 1));
        log::info!("training stage '{label}' of the cascade classifier");

        let gate = Classifier::from(cascade.clone());
        let mut pos = dataset.positives(&gate)?;
        if pos.len() <= config.positive_count_threshold {
            log::info!("positive sample count {} reached the threshold", pos.len());
            break;
        }
        let mut neg = dataset.negatives(&gate)?;
        if neg.len() <= config.negative_count_threshold {
            log::info!("negative sample count {} reached the threshold", neg.len());
            break;
        }

        let strong = match stage.train(&mut pos, &mut neg) {
            Ok(strong) => strong,
            Err(e @ TrainError::NoWeakClassifier { .. }) => {
                log::error!("cannot train stage '{label}': {e}");
                break;
            }
            Err(e) => return Err(e),
        };
        cascade.push(strong);
        Classifier::from(cascade.clone()).save(&config.classifier_path)?;

        levels += 1;
        if config.level_count > 0 && levels >= config.level_count {
            log::info!("trained the requested {levels} stages");
            break;
        }
    }
    Ok(())
}

fn resume_cascade(config: &TrainConfig) -> Result<Cascade, TrainError> {
    let (width, height) = config.size();
    let path = &config.classifier_path;
    if !path.exists() {
        return Ok(Cascade::new(width, height));
    }
    match Classifier::load(path)? {
        Classifier::Cascade(cascade) if cascade.width() == width && cascade.height() == height => {
            log::info!(
                "resuming cascade classifier '{}' with {} stages",
                path.display(),
                cascade.len()
            );
            Ok(cascade)
        }
        other => Err(TrainError::InvalidConfig(format!(
            "'{}' holds a {}x{} {}, expected a {width}x{height} {}",
            path.display(),
            other.width(),
            other.height(),
            other.type_name(),
            Cascade::TYPE,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use serde_json::json;

    use crate::test::stump;

    use super::*;

    #[test]
    fn resumes_matching_cascades_only() {
        let dir = env::temp_dir().join(format!("objed-resume-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cascade.json");
        let _ = fs::remove_file(&path);

        let mut config: TrainConfig = serde_json::from_value(json!({
            "ClassifierPath": path,
            "ClassifierWidth": 5,
            "ClassifierHeight": 5,
        }))
        .unwrap();
        assert!(resume_cascade(&config).unwrap().is_empty());

        let cascade = Cascade::from_children(5, 5, [stump(5, 5, 10, [1.0, -1.0])]);
        Classifier::from(cascade).save(&path).unwrap();
        assert_eq!(resume_cascade(&config).unwrap().len(), 1);

        config.classifier_width = 7;
        assert!(matches!(
            resume_cascade(&config),
            Err(TrainError::InvalidConfig(_))
        ));

        stump(7, 5, 10, [1.0, -1.0]).save(&path).unwrap();
        assert!(matches!(
            resume_cascade(&config),
            Err(TrainError::InvalidConfig(_))
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
