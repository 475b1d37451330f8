//! Weak classifier candidates and their training.
//!
//! Candidates are generated from one-line descriptions of a feature family:
//!
//! ```text
//! <Kind> -preproc=<id> -wd=<a:b/s> -ht=<a:b/s> [-dist=<a:b/s>] [-bins=<a:b/s>] [-normalize=<bool>]
//! ```
//!
//! `Kind` is one of `Haar1StumpWc`, `Haar2StumpWc`, `Haar3StumpWc`, `Haar1PwWc`, `Haar2PwWc` or
//! `Haar3PwWc`. Every range `a:b/s` lists `a, a + s, ...` up to `b`. One candidate is generated
//! for every combination of parameters and every placement of the feature rectangles inside the
//! classifier window. Two- and three-rectangle features are placed side by side and one above the
//! other.

use std::collections::HashMap;

use itertools::iproduct;

use crate::{
    classifier::{
        doc, Classifier, Feature, Haar, Haar1Pw, Haar1Stump, Haar2Pw, Haar2Stump, Haar3Pw,
        Haar3Stump, OneRect, Piecewise, Response, Stump, ThreeRect, TwoRect,
    },
    error::{EvalError, PoolError, TrainError},
    num::EPSILON,
    pool::ImagePool,
    rect::Rect,
};

use super::SampleSet;

/// An untrained or trained weak classifier.
#[derive(Debug, Clone)]
pub enum WeakClassifier {
    Haar1Stump(Haar1Stump),
    Haar2Stump(Haar2Stump),
    Haar3Stump(Haar3Stump),
    Haar1Pw(Haar1Pw),
    Haar2Pw(Haar2Pw),
    Haar3Pw(Haar3Pw),
}

macro_rules! dispatch {
    ($this:expr, $wc:ident => $e:expr) => {
        match $this {
            WeakClassifier::Haar1Stump($wc) => $e,
            WeakClassifier::Haar2Stump($wc) => $e,
            WeakClassifier::Haar3Stump($wc) => $e,
            WeakClassifier::Haar1Pw($wc) => $e,
            WeakClassifier::Haar2Pw($wc) => $e,
            WeakClassifier::Haar3Pw($wc) => $e,
        }
    };
}

impl WeakClassifier {
    pub fn type_name(&self) -> &'static str {
        dispatch!(self, wc => wc.type_name())
    }

    pub fn prepare(&self, pool: &mut ImagePool) -> Result<(), PoolError> {
        dispatch!(self, wc => wc.prepare(pool))
    }

    /// Fits the response of this weak classifier to the weighted samples.
    ///
    /// Returns the normalization factor `Z` of the fitted classifier. Smaller is better, and a
    /// classifier with `Z >= 1` is no better than chance.
    pub fn train(&mut self, pos: &SampleSet<'_>, neg: &SampleSet<'_>) -> Result<f64, EvalError> {
        dispatch!(self, wc => wc.fit(pos, neg))
    }

    pub fn to_classifier(&self) -> Classifier {
        dispatch!(self, wc => wc.clone().into())
    }
}

impl From<WeakClassifier> for Classifier {
    fn from(wc: WeakClassifier) -> Self {
        dispatch!(wc, wc => wc.into())
    }
}

/// Smoothing term added to both weight sums of a response value.
fn smoothing(pos: &SampleSet<'_>, neg: &SampleSet<'_>) -> f64 {
    f64::from(EPSILON) / (pos.len() + neg.len()) as f64
}

/// Real AdaBoost confidence of a partition with positive weight `p` and negative weight `n`.
fn confidence(p: f64, n: f64, smoothing: f64) -> f32 {
    (0.5 * ((p + smoothing) / (n + smoothing)).ln()) as f32
}

/// Collects the feature statistics of the window centered in every sample.
fn statistics<F: Feature, R: Response>(
    haar: &Haar<F, R>,
    set: &SampleSet<'_>,
) -> Result<Vec<(i32, f64)>, EvalError> {
    let (x, y) = (haar.width() / 2, haar.height() / 2);
    set.iter()
        .map(|(sample, weight)| Ok((haar.statistic(sample.pool(), x, y)?, weight)))
        .collect()
}

trait Fit {
    fn fit(&mut self, pos: &SampleSet<'_>, neg: &SampleSet<'_>) -> Result<f64, EvalError>;
}

impl<F: Feature> Fit for Haar<F, Stump> {
    fn fit(&mut self, pos: &SampleSet<'_>, neg: &SampleSet<'_>) -> Result<f64, EvalError> {
        let haar = &*self;
        // Weight of the samples whose statistic equals the index.
        let histogram = |set: &SampleSet<'_>| -> Result<[f64; 256], EvalError> {
            let mut hist = [0.0; 256];
            for (stat, weight) in statistics(haar, set)? {
                hist[stat.clamp(0, 255) as usize] += weight;
            }
            Ok(hist)
        };
        let pos_hist = histogram(pos)?;
        let neg_hist = histogram(neg)?;
        let (pos_total, neg_total) = (pos.total_weight(), neg.total_weight());
        let smoothing = smoothing(pos, neg);

        let mut best_z = 1.0 + f64::from(EPSILON);
        let mut best = None;
        // Weight at or below the threshold (side 1).
        let (mut pos_low, mut neg_low) = (0.0, 0.0);
        for threshold in 0..256 {
            pos_low += pos_hist[threshold];
            neg_low += neg_hist[threshold];
            let (pos_high, neg_high) = (pos_total - pos_low, neg_total - neg_low);
            let z = 2.0 * ((pos_high * neg_high).max(0.0).sqrt() + (pos_low * neg_low).sqrt());
            if z < best_z {
                best_z = z;
                best = Some(Stump::new(
                    threshold as i32,
                    [
                        confidence(pos_high, neg_high, smoothing),
                        confidence(pos_low, neg_low, smoothing),
                    ],
                ));
            }
        }

        if let Some(stump) = best {
            self.set_response(stump);
        }
        Ok(best_z)
    }
}

impl<F: Feature> Fit for Haar<F, Piecewise> {
    fn fit(&mut self, pos: &SampleSet<'_>, neg: &SampleSet<'_>) -> Result<f64, EvalError> {
        let haar = &*self;
        let count = haar.response().bins().len();
        let histogram = |set: &SampleSet<'_>| -> Result<Vec<f64>, EvalError> {
            let mut hist = vec![0.0; count];
            for (stat, weight) in statistics(haar, set)? {
                hist[Piecewise::bin(stat, count)] += weight;
            }
            Ok(hist)
        };
        let pos_hist = histogram(pos)?;
        let neg_hist = histogram(neg)?;
        let smoothing = smoothing(pos, neg);

        let mut z = 0.0;
        let mut bins = Vec::with_capacity(count);
        for (&p, &n) in pos_hist.iter().zip(&neg_hist) {
            bins.push(confidence(p, n, smoothing));
            z += 2.0 * (p * n).sqrt();
        }
        self.set_response(Piecewise::new(bins));
        Ok(z)
    }
}

/// Generates weak classifier candidates from family descriptions.
#[derive(Debug, Clone, Copy)]
pub struct WcMaker {
    width: i32,
    height: i32,
}

struct Params<'a> {
    line: &'a str,
    values: HashMap<&'a str, &'a str>,
}

impl<'a> Params<'a> {
    fn error(&self, reason: impl Into<String>) -> TrainError {
        TrainError::InvalidWcLine {
            line: self.line.to_string(),
            reason: reason.into(),
        }
    }

    fn required(&self, name: &str) -> Result<&'a str, TrainError> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| self.error(format!("missing parameter '-{name}'")))
    }

    /// Parses the range `a:b/s` into `a, a + s, ...` up to `max(a, b)`.
    fn range(&self, name: &str, default: Option<&str>) -> Result<Vec<i32>, TrainError> {
        let text = match (self.values.get(name), default) {
            (Some(text), _) => *text,
            (None, Some(default)) => default,
            (None, None) => self.required(name)?,
        };
        let int = |s: &str| {
            s.trim()
                .parse::<i32>()
                .map_err(|_| self.error(format!("invalid range '{text}' for '-{name}'")))
        };
        let (bounds, step) = match text.split_once('/') {
            Some((bounds, step)) => (bounds, int(step)?),
            None => (text, 1),
        };
        let (min, max) = match bounds.split_once(':') {
            Some((min, max)) => (int(min)?, int(max)?),
            None => (int(bounds)?, i32::MIN),
        };
        let step = step.max(1) as usize;
        Ok((min..=max.max(min)).step_by(step).collect())
    }

    fn positive_range(&self, name: &str, default: Option<&str>) -> Result<Vec<i32>, TrainError> {
        let range = self.range(name, default)?;
        if range.iter().any(|&v| v <= 0) {
            return Err(self.error(format!("'-{name}' must be positive")));
        }
        Ok(range)
    }

    fn flag(&self, name: &str) -> Result<bool, TrainError> {
        match self.values.get(name).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("false") | Some("0") => Ok(false),
            Some("true") | Some("1") => Ok(true),
            Some(other) => Err(self.error(format!("invalid flag '{other}' for '-{name}'"))),
        }
    }
}

/// Rectangle families shared by all weak classifier kinds.
struct Layout {
    preproc: String,
    widths: Vec<i32>,
    heights: Vec<i32>,
    dists: Vec<i32>,
    normalize: bool,
}

impl WcMaker {
    /// Creates a maker for classifiers of the given size.
    ///
    /// # Panics
    ///
    /// Panics if the size is not positive and odd.
    #[track_caller]
    pub fn new(width: i32, height: i32) -> Self {
        doc::assert_size(width, height);
        Self { width, height }
    }

    /// Generates every candidate described by `line`.
    pub fn make(&self, line: &str) -> Result<Vec<WeakClassifier>, TrainError> {
        let mut items = line.split_whitespace();
        let kind = items.next().unwrap_or_default();
        let mut params = Params {
            line,
            values: HashMap::new(),
        };
        for item in items {
            match item.split_once('=') {
                Some((name, value)) if name.starts_with('-') && !value.contains('=') => {
                    params.values.insert(name.trim_start_matches('-'), value);
                }
                _ => return Err(params.error(format!("malformed parameter '{item}'"))),
            }
        }

        let preproc = params.required("preproc")?.to_string();
        ImagePool::validate_id(&preproc).map_err(|e| params.error(e.to_string()))?;
        let layout = Layout {
            preproc,
            widths: params.positive_range("wd", None)?,
            heights: params.positive_range("ht", None)?,
            dists: params.range("dist", Some("0"))?,
            normalize: params.flag("normalize")?,
        };

        let bins = || params.positive_range("bins", None);
        let candidates: Vec<WeakClassifier> = match kind {
            "Haar1StumpWc" => self
                .one_rect(&layout)
                .map(|(p, f)| Haar1Stump::new(self.width, self.height, p, f, stump()).into())
                .collect(),
            "Haar2StumpWc" => self
                .two_rect(&layout)
                .map(|(p, f)| Haar2Stump::new(self.width, self.height, p, f, stump()).into())
                .collect(),
            "Haar3StumpWc" => self
                .three_rect(&layout)
                .map(|(p, f)| Haar3Stump::new(self.width, self.height, p, f, stump()).into())
                .collect(),
            "Haar1PwWc" => self.with_bins(self.one_rect(&layout), &bins()?),
            "Haar2PwWc" => self.with_bins(self.two_rect(&layout), &bins()?),
            "Haar3PwWc" => self.with_bins(self.three_rect(&layout), &bins()?),
            "" => return Err(params.error("empty line")),
            other => return Err(params.error(format!("unknown weak classifier kind '{other}'"))),
        };
        log::debug!("'{line}' generated {} candidates", candidates.len());
        Ok(candidates)
    }

    /// Generates the candidates of every line.
    pub fn make_all<S: AsRef<str>>(&self, lines: &[S]) -> Result<Vec<WeakClassifier>, TrainError> {
        let mut candidates = Vec::new();
        for line in lines {
            candidates.extend(self.make(line.as_ref())?);
        }
        Ok(candidates)
    }

    /// Iterates over the placements of the first rectangle for every width, height and distance.
    ///
    /// Rectangles are relative to the window center, and their far edge stays at least one pixel
    /// inside the window.
    fn placements<'l>(
        &self,
        layout: &'l Layout,
        dists: &'l [i32],
    ) -> impl Iterator<Item = (Rect, i32)> + 'l {
        let (w2, h2) = (self.width / 2, self.height / 2);
        iproduct!(&layout.widths, &layout.heights, dists).flat_map(move |(&wd, &ht, &dist)| {
            let (x_step, y_step) = ((wd / 4).max(1) as usize, (ht / 4).max(1) as usize);
            iproduct!(
                (-h2 + 1..=h2 - 1).step_by(y_step),
                (-w2 + 1..=w2 - 1).step_by(x_step)
            )
            .map(move |(y, x)| Rect::from_top_left(x, y, wd, ht))
            .filter(move |r| r.right() <= w2 - 1 && r.bottom() <= h2 - 1)
            .map(move |r| (r, dist))
        })
    }

    /// Returns whether `rect` ends at least one pixel inside the window.
    fn fits(&self, rect: &Rect) -> bool {
        rect.right() <= self.width / 2 - 1 && rect.bottom() <= self.height / 2 - 1
    }

    fn one_rect<'l>(&self, layout: &'l Layout) -> impl Iterator<Item = (String, OneRect)> + 'l {
        // Distances do not apply to single rectangles.
        self.placements(layout, &[0])
            .map(move |(rect, _)| (layout.preproc.clone(), OneRect::new(rect)))
    }

    fn two_rect<'l>(&self, layout: &'l Layout) -> impl Iterator<Item = (String, TwoRect)> + 'l {
        let this = *self;
        self.placements(layout, &layout.dists).flat_map(move |(r0, dist)| {
            let (dx, dy) = (dist + r0.width(), dist + r0.height());
            [r0.move_by(dx, 0), r0.move_by(0, dy)]
                .into_iter()
                .filter(move |r1| this.fits(r1))
                .map(move |r1| {
                    let feature = TwoRect::new(r0, r1, layout.normalize);
                    (layout.preproc.clone(), feature)
                })
        })
    }

    fn three_rect<'l>(&self, layout: &'l Layout) -> impl Iterator<Item = (String, ThreeRect)> + 'l {
        let this = *self;
        self.placements(layout, &layout.dists).flat_map(move |(r0, dist)| {
            let (dx, dy) = (dist + r0.width(), dist + r0.height());
            [(dx, 0), (0, dy)]
                .into_iter()
                .map(move |(dx, dy)| (r0.move_by(dx, dy), r0.move_by(2 * dx, 2 * dy)))
                .filter(move |(_, r2)| this.fits(r2))
                .map(move |(r1, r2)| {
                    let feature = ThreeRect::new(r0, r1, r2, layout.normalize);
                    (layout.preproc.clone(), feature)
                })
        })
    }

    fn with_bins<F: Feature>(
        &self,
        features: impl Iterator<Item = (String, F)>,
        bins: &[i32],
    ) -> Vec<WeakClassifier>
    where
        Haar<F, Piecewise>: Into<WeakClassifier>,
    {
        let features: Vec<_> = features.collect();
        bins.iter()
            .flat_map(|&count| {
                features.iter().map(move |(preproc, feature)| -> WeakClassifier {
                    let response = Piecewise::zeros(count as usize);
                    let haar: Haar<F, Piecewise> = Haar::new(
                        self.width,
                        self.height,
                        preproc.clone(),
                        feature.clone(),
                        response,
                    );
                    haar.into()
                })
            })
            .collect()
    }
}

fn stump() -> Stump {
    Stump::new(0, [0.0, 0.0])
}

macro_rules! impl_from {
    ($($variant:ident),+) => {
        $(
            impl From<$variant> for WeakClassifier {
                fn from(wc: $variant) -> Self {
                    Self::$variant(wc)
                }
            }
        )+
    };
}

impl_from!(Haar1Stump, Haar2Stump, Haar3Stump, Haar1Pw, Haar2Pw, Haar3Pw);

#[cfg(test)]
mod tests {
    use crate::{train::Sample, Image};

    use super::*;

    fn rects(wc: &WeakClassifier) -> Vec<Rect> {
        dispatch!(wc, wc => wc.feature().rects())
    }

    #[test]
    fn one_rect_placements() {
        let maker = WcMaker::new(7, 7);
        let wcs = maker.make("Haar1StumpWc -preproc=gray -wd=1 -ht=1").unwrap();
        // x and y run over -2..=1 so that the rectangle ends at 2 at most.
        assert_eq!(wcs.len(), 16);
        assert_eq!(rects(&wcs[0]), [Rect::from_top_left(-2, -2, 1, 1)]);
        assert_eq!(rects(&wcs[15]), [Rect::from_top_left(1, 1, 1, 1)]);
        assert!(wcs.iter().all(|wc| wc.type_name() == "haar1StumpClassifier"));

        let wcs = maker.make("Haar1StumpWc -preproc=gray -wd=1:4/3 -ht=4").unwrap();
        // wd = 1 fits at 4 x positions, wd = 4 at one; ht = 4 only at y = -2.
        assert_eq!(wcs.len(), 5);
    }

    #[test]
    fn multi_rect_orientations() {
        let maker = WcMaker::new(9, 9);
        let wcs = maker.make("Haar2StumpWc -preproc=gray -wd=3 -ht=3").unwrap();
        // The first rectangle fits at x, y in -3..=0. Its right neighbour only fits at x = -3
        // and the one below it only at y = -3.
        assert_eq!(wcs.len(), 8);
        assert_eq!(
            rects(&wcs[0]),
            [Rect::from_top_left(-3, -3, 3, 3), Rect::from_top_left(0, -3, 3, 3)]
        );
        assert_eq!(
            rects(&wcs[1]),
            [Rect::from_top_left(-3, -3, 3, 3), Rect::from_top_left(-3, 0, 3, 3)]
        );
        let wcs = maker.make("Haar2StumpWc -preproc=gray -wd=3 -ht=3 -dist=1").unwrap();
        assert!(wcs.is_empty());

        let wcs = maker.make("Haar3StumpWc -preproc=gray -wd=1 -ht=2").unwrap();
        assert!(!wcs.is_empty());
        for wc in &wcs {
            let r = rects(wc);
            let horizontal = r[1].x() - r[0].x() == 1 && r[2].x() - r[1].x() == 1;
            let vertical = r[1].y() - r[0].y() == 2 && r[2].y() - r[1].y() == 2;
            assert!(horizontal ^ vertical, "{r:?}");
            assert!(r[2].right() <= 3 && r[2].bottom() <= 3);
        }
    }

    #[test]
    fn piecewise_bins() {
        let maker = WcMaker::new(5, 5);
        let wcs = maker.make("Haar1PwWc -preproc=gray -wd=1 -ht=1 -bins=4:8/4").unwrap();
        assert_eq!(wcs.len(), 8);
        let counts: Vec<_> = wcs
            .iter()
            .map(|wc| match wc {
                WeakClassifier::Haar1Pw(haar) => haar.response().bins().len(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(counts, [4, 4, 4, 4, 8, 8, 8, 8]);
    }

    #[test]
    fn malformed_lines() {
        let maker = WcMaker::new(5, 5);
        for line in [
            "",
            "Haar4StumpWc -preproc=gray -wd=1 -ht=1",
            "Haar1StumpWc -wd=1 -ht=1",
            "Haar1StumpWc -preproc=sepia -wd=1 -ht=1",
            "Haar1StumpWc -preproc=gray -wd=x -ht=1",
            "Haar1StumpWc -preproc=gray -wd=0 -ht=1",
            "Haar1StumpWc -preproc=gray wd 1 -ht=1",
            "Haar1PwWc -preproc=gray -wd=1 -ht=1",
            "Haar2StumpWc -preproc=gray -wd=1 -ht=1 -normalize=maybe",
        ] {
            assert!(
                matches!(maker.make(line), Err(TrainError::InvalidWcLine { .. })),
                "'{line}' was accepted"
            );
        }
    }

    fn samples(values: &[u8]) -> Vec<Sample> {
        values
            .iter()
            .map(|&v| Sample::new(&Image::filled(5, 5, 1, v), "mem"))
            .collect()
    }

    fn prepared(wc: &WeakClassifier, samples: &mut [Sample]) {
        for sample in samples {
            wc.prepare(sample.pool_mut()).unwrap();
        }
    }

    #[test]
    fn stump_separates_brightness() {
        let mut wc = WcMaker::new(5, 5)
            .make("Haar1StumpWc -preproc=gray -wd=1 -ht=1")
            .unwrap()
            .remove(0);
        let (mut pos, mut neg) = (samples(&[200, 180]), samples(&[20, 40]));
        prepared(&wc, &mut pos);
        prepared(&wc, &mut neg);
        let mut pos = SampleSet::new(&pos);
        let mut neg = SampleSet::new(&neg);
        pos.fill(0.25);
        neg.fill(0.25);

        let z = wc.train(&pos, &neg).unwrap();
        assert!(z < 1e-6, "{z}");
        let WeakClassifier::Haar1Stump(haar) = &wc else {
            panic!("unexpected {wc:?}");
        };
        // The first threshold with all negatives at or below it.
        assert_eq!(haar.response().threshold(), 40);
        let [high, low] = haar.response().values();
        assert!(high > 0.0 && low < 0.0, "{high} {low}");
    }

    #[test]
    fn piecewise_fits_every_bin() {
        let mut wc = WcMaker::new(5, 5)
            .make("Haar1PwWc -preproc=gray -wd=1 -ht=1 -bins=2")
            .unwrap()
            .remove(0);
        let (mut pos, mut neg) = (samples(&[200, 250]), samples(&[20, 200]));
        prepared(&wc, &mut pos);
        prepared(&wc, &mut neg);
        let mut pos = SampleSet::new(&pos);
        let mut neg = SampleSet::new(&neg);
        pos.fill(0.25);
        neg.fill(0.25);

        let z = wc.train(&pos, &neg).unwrap();
        // The dark bin only holds a negative, the bright one 0.5 positive and 0.25 negative weight.
        approx::assert_relative_eq!(z, 2.0 * (0.5f64 * 0.25).sqrt());
        let WeakClassifier::Haar1Pw(haar) = &wc else {
            panic!("unexpected {wc:?}");
        };
        let bins = haar.response().bins();
        assert!(bins[0] < 0.0 && bins[1] > 0.0, "{bins:?}");
    }
}
