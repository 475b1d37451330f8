use std::{env, fs, path::Path};

use objed::{
    classifier::{Classifier, Haar1Stump, OneRect, Stump},
    debug::{DebugInfo, DebugKey},
    detector::{Detector, Lazy, Multi, Scales, Scan, Simple},
    pool::ImagePool,
    rect::Rect,
    Image,
};
use serde_json::json;

/// 10x10 black frame with a white 3x3 block at (4, 4).
fn frame() -> Image {
    Image::from_fn(10, 10, |x, y| {
        if (4..7).contains(&x) && (4..7).contains(&y) {
            255
        } else {
            0
        }
    })
}

/// Accepts 3x3 windows whose mean brightness exceeds `threshold`.
fn brightness(threshold: i32) -> Classifier {
    Haar1Stump::new(
        3,
        3,
        "gray",
        OneRect::new(Rect::from_center(0, 0, 3, 3)),
        Stump::new(threshold, [1.0, -1.0]),
    )
    .into()
}

fn simple(threshold: i32) -> Detector {
    Detector::new(Simple::new(Scan::new(brightness(threshold)), Scales::default()))
}

#[test]
fn simple_detector_finds_the_block() {
    let image = frame();
    let mut detector = simple(200);

    let mut debug = DebugInfo::new();
    let raw = detector.raw_detections(&image, Some(&mut debug));
    assert_eq!(raw, [Rect::from_top_left(4, 4, 3, 3)]);
    assert_eq!(debug.get(DebugKey::EvaluationCount), Some(64));
    assert_eq!(debug.get(DebugKey::TotalStageCount), Some(0));

    let detections = detector.detect(&image, None);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].rect(), Rect::from_top_left(4, 4, 3, 3));
    assert_eq!(detections[0].power(), 1);
}

#[test]
fn clustering_keeps_the_window_count() {
    let image = frame();
    let mut detector = simple(100);
    assert_eq!(detector.raw_detections(&image, None).len(), 9);

    // Diagonal neighbours overlap by 4/9 and start clusters of their own.
    let detections = detector.detect(&image, None);
    assert_eq!(detections.len(), 5);
    assert_eq!(detections.iter().map(|d| d.power()).sum::<i32>(), 9);
    assert_eq!(detections[0].rect(), Rect::from_top_left(3, 3, 3, 3));
    assert_eq!(detections[0].power(), 3);
}

#[test]
fn lazy_detector_refines_coarse_hits() {
    let image = frame();
    let mut detector = Detector::new(Lazy::new(
        Scan::new(brightness(100)),
        Scales::default(),
        1.0,
        1.0,
    ));
    let mut debug = DebugInfo::new();
    let raw = detector.raw_detections(&image, Some(&mut debug));
    assert_eq!(raw, [Rect::from_top_left(3, 3, 3, 3)]);
    // 3x3 coarse windows, then the 2x2 fine cell of the single coarse hit.
    assert_eq!(debug.get(DebugKey::EvaluationCount), Some(13));
}

#[test]
fn multi_detector_merges_its_children() {
    let image = frame();
    let mut detector = Detector::new(Multi::new([simple(200), simple(200)]));
    assert_eq!(detector.raw_detections(&image, None).len(), 2);

    let detections = detector.detect(&image, None);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].rect(), Rect::from_top_left(4, 4, 3, 3));
    assert_eq!(detections[0].power(), 2);
}

#[test]
fn image_pools_can_be_swapped() {
    let image = frame();
    let mut detector = simple(200);
    detector.detect(&image, None);
    assert!(!detector.image_pool().base().is_empty());

    let old = detector.set_image_pool(ImagePool::new());
    assert_eq!(old.base().width(), 10);
    assert!(detector.image_pool().base().is_empty());
    assert_eq!(detector.detect(&image, None).len(), 1);

    detector.reset_image_pool();
    assert_eq!(detector.detect(&image, None).len(), 1);
}

#[test]
fn detectors_load_from_documents() {
    let dir = env::temp_dir().join(format!("objed-detect-{}", std::process::id()));
    fs::create_dir_all(dir.join("models")).unwrap();
    brightness(200).save(dir.join("models/bright.json")).unwrap();

    let doc = json!({
        "type": "multiDetector",
        "detectorList": [
            {"type": "simpleDetector", "classifier": "models/bright.json"},
            {
                "type": "lazyDetector",
                "classifier": "models/bright.json",
                "xRawStep": 1.0,
                "yRawStep": 1.0,
            },
        ],
    });
    let path = dir.join("detector.json");
    fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    let mut detector = Detector::load(&path).unwrap();
    assert_eq!(detector.type_name(), Multi::TYPE);
    let detections = detector.detect(&frame(), None);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].rect(), Rect::from_top_left(4, 4, 3, 3));

    assert!(Detector::from_document(&json!({"type": "simpleDetector"}), Path::new(".")).is_err());
    fs::remove_dir_all(&dir).unwrap();
}
