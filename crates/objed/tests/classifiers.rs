use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use objed::{
    classifier::{
        Additive, Cascade, Classifier, ClassifierExtension, EvalStats, Haar1Stump, Haar2Pw,
        Haar3Stump, Linear, Max, Mean, MeanRange, OneRect, Parallel, Piecewise, Roi, Side,
        Stump, ThreeRect, Tree, TwoRect,
    },
    error::{EvalError, ModelError, PoolError},
    factory::Factory,
    pool::ImagePool,
    rect::Rect,
    Image,
};
use serde_json::{json, Value};

/// Responds with a fixed value and counts its evaluations.
#[derive(Debug, Clone)]
struct Counting {
    value: f32,
    count: Arc<AtomicUsize>,
}

impl ClassifierExtension for Counting {
    fn type_name(&self) -> &str {
        "countingClassifier"
    }

    fn width(&self) -> i32 {
        3
    }

    fn height(&self) -> i32 {
        3
    }

    fn prepare(&self, _pool: &mut ImagePool) -> Result<(), PoolError> {
        Ok(())
    }

    fn evaluate(
        &self,
        _pool: &ImagePool,
        _x: i32,
        _y: i32,
        _stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(self.value)
    }

    fn serialize(&self) -> Value {
        json!({"type": "countingClassifier", "width": 3, "height": 3, "value": self.value})
    }

    fn clone_box(&self) -> Box<dyn ClassifierExtension> {
        Box::new(self.clone())
    }
}

fn counting_factory() -> (Factory, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let mut factory = Factory::new();
    let shared = count.clone();
    factory.register_classifier("countingClassifier", move |doc, _, _| {
        let value = doc
            .get("value")
            .and_then(Value::as_f64)
            .ok_or_else(|| ModelError::MissingField("value".into()))?;
        Ok(Box::new(Counting {
            value: value as f32,
            count: shared.clone(),
        }) as Box<dyn ClassifierExtension>)
    });
    (factory, count)
}

fn list(type_name: &str, values: &[f32]) -> Value {
    let children: Vec<Value> = values
        .iter()
        .map(|v| json!({"type": "countingClassifier", "width": 3, "height": 3, "value": v}))
        .collect();
    json!({"type": type_name, "width": 3, "height": 3, "clList": children})
}

#[test]
fn cascade_skips_stages_after_a_rejection() {
    let (factory, count) = counting_factory();
    let cascade = factory
        .create_classifier(&list("cascadeClassifier", &[-1.0, 2.0, 3.0]), Path::new("."))
        .unwrap();
    assert_eq!(cascade.evaluate(&ImagePool::new(), 1, 1), Ok(-1.0));
    assert_eq!(count.load(Ordering::Relaxed), 1);

    let cascade = factory
        .create_classifier(&list("CASCADECLASSIFIER", &[1.0, 0.0, 3.0]), Path::new("."))
        .map(|_| ());
    assert!(matches!(cascade, Err(ModelError::UnknownType(_))));

    let cascade = factory
        .create_classifier(&list("cascadeClassifier", &[1.0, 0.0, 3.0]), Path::new("."))
        .unwrap();
    count.store(0, Ordering::Relaxed);
    assert_eq!(cascade.evaluate(&ImagePool::new(), 1, 1), Ok(3.0));
    assert_eq!(count.load(Ordering::Relaxed), 3);
}

#[test]
fn extensions_survive_cloning_and_serialization() {
    let (factory, count) = counting_factory();
    let doc = list("parallelClassifier", &[-1.0, 0.5]);
    let parallel = factory.create_classifier(&doc, Path::new(".")).unwrap();
    assert_eq!(parallel.to_document(), doc);

    let copy = parallel.clone();
    drop(parallel);
    assert_eq!(copy.evaluate(&ImagePool::new(), 1, 1), Ok(0.5));
    assert_eq!(count.load(Ordering::Relaxed), 2);
}

/// A 3x3 classifier that responds with `value` everywhere.
fn constant(value: f32) -> Classifier {
    Haar1Stump::new(
        3,
        3,
        "gray",
        OneRect::new(Rect::from_center(0, 0, 3, 3)),
        Stump::new(-1, [value, value]),
    )
    .into()
}

#[test]
fn parallel_mirrors_cascade() {
    let mut rng = fastrand::Rng::with_seed(0x0b1ed);
    let mut pool = ImagePool::new();
    constant(0.0).prepare(&mut pool).unwrap();
    pool.update(&Image::filled(3, 3, 1, 0));

    for _ in 0..200 {
        let values: Vec<f32> = (0..rng.usize(1..6))
            .map(|_| {
                let magnitude = 0.25 + rng.f32();
                if rng.bool() {
                    magnitude
                } else {
                    -magnitude
                }
            })
            .collect();
        let cascade = Cascade::from_children(3, 3, values.iter().map(|&v| constant(v)));
        let parallel = Parallel::from_children(3, 3, values.iter().map(|&v| constant(-v)));

        let mut stats = EvalStats::new();
        let c = cascade.evaluate(&pool, 1, 1, &mut stats).unwrap();
        let p = parallel.evaluate(&pool, 1, 1, &mut stats).unwrap();
        assert_eq!(p, -c, "{values:?}");
    }
}

fn model() -> Classifier {
    let stump = Haar1Stump::new(
        7,
        7,
        "gray",
        OneRect::new(Rect::from_top_left(-3, -3, 7, 3)),
        Stump::new(90, [0.75, -0.5]),
    );
    let pw = Haar2Pw::new(
        7,
        7,
        "gray",
        TwoRect::new(
            Rect::from_top_left(-3, -3, 3, 7),
            Rect::from_top_left(0, -3, 3, 7),
            false,
        ),
        Piecewise::new(vec![-1.0, -0.25, 0.5, 1.25]),
    );
    let three = Haar3Stump::new(
        7,
        7,
        "gray|gradient1",
        ThreeRect::new(
            Rect::from_top_left(-3, -1, 2, 3),
            Rect::from_top_left(-1, -1, 2, 3),
            Rect::from_top_left(1, -1, 2, 3),
            true,
        ),
        Stump::new(60, [1.0, -1.0]),
    );
    let stage = Additive::from_children(7, 7, [stump.clone().into(), pw.into()]);

    let mut linear = Linear::new(7, 7);
    linear.push(three.clone().into(), 0.5);
    linear.push(constant(0.25), 2.0);

    let mut tree = Tree::new(7, 7);
    tree.set_central(stump.into());
    tree.branch_or_insert(Side::Right).set_central(linear.into());
    tree.branch_or_insert(Side::Left)
        .set_central(Mean::new(5, 5, vec![MeanRange::new(10, 200, "gray")]).into());

    let max = Max::from_children(7, 7, [three.into(), Roi::new(7, 7).into()]);
    Cascade::from_children(7, 7, [stage.into(), tree.into(), max.into()]).into()
}

#[test]
fn documents_round_trip() {
    let original = model();
    let doc = original.to_document();
    let text = serde_json::to_string_pretty(&doc).unwrap();
    let loaded = Classifier::from_document(&serde_json::from_str(&text).unwrap(), Path::new("."))
        .unwrap();
    assert_eq!(loaded.to_document(), doc);

    let mut rng = fastrand::Rng::with_seed(17);
    let image = Image::from_fn(32, 24, |_, _| rng.u8(..));
    let (mut a, mut b) = (ImagePool::new(), ImagePool::new());
    original.prepare(&mut a).unwrap();
    loaded.prepare(&mut b).unwrap();
    a.update(&image);
    b.update(&image);

    for y in 3..21 {
        for x in 3..29 {
            assert_eq!(
                original.evaluate(&a, x, y),
                loaded.evaluate(&b, x, y),
                "window at ({x}, {y})"
            );
        }
    }
}

#[test]
fn invalid_documents() {
    let cases = [
        json!({"type": "cascadeClassifier", "width": 4, "height": 3, "clList": []}),
        json!({"type": "cascadeClassifier", "width": 3, "height": 3}),
        json!({"type": "noSuchClassifier", "width": 3, "height": 3}),
        json!({
            "type": "parallelClassifier", "width": 5, "height": 5,
            "clList": [constant(1.0).to_document()],
        }),
        json!({
            "type": "cascadeClassifier", "width": 3, "height": 3,
            "clList": [model().to_document()],
        }),
    ];
    for doc in cases {
        assert!(
            Classifier::from_document(&doc, Path::new(".")).is_err(),
            "{doc} was accepted"
        );
    }
}

#[test]
fn integrals_follow_the_latest_frame() {
    let mut rng = fastrand::Rng::with_seed(99);
    let mut pool = ImagePool::new();
    constant(0.0).prepare(&mut pool).unwrap();

    let mut frame = || {
        let data = (0..24 * 16 * 3).map(|_| rng.u8(..)).collect();
        Image::from_raw(24, 16, 3, data)
    };
    pool.update(&frame());
    pool.update(&frame());

    let gray = pool.cached_image("gray").unwrap().clone();
    let integral = pool.cached_integral("gray").unwrap();
    for _ in 0..100 {
        let (x, y) = (rng.i32(0..24), rng.i32(0..16));
        let (w, h) = (rng.i32(0..=24 - x), rng.i32(0..=16 - y));
        let mut expected = 0;
        for yy in y..y + h {
            for xx in x..x + w {
                expected += u32::from(gray.get(xx as u32, yy as u32, 0));
            }
        }
        assert_eq!(integral.rect_sum(x, y, w, h), Some(expected), "{x} {y} {w} {h}");
    }
}
