//! Positive and negative sample extraction.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;

use crate::{
    classifier::Classifier,
    detector::{
        scan::{scale_image, size},
        Scales,
    },
    error::{EvalError, ModelError, PoolError, TrainError},
    pool::ImagePool,
    rect::Rect,
    timer::Timer,
    Image,
};

use super::{Sample, TrainConfig};

/// File extensions of the images read from dataset directories (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Produces the training samples that pass the classifier trained so far.
#[derive(Debug, Clone)]
pub struct DatasetProcessor {
    width: i32,
    height: i32,
    scales: Scales,
    negative_count: usize,
    positives: Vec<PathBuf>,
    negatives: Vec<PathBuf>,
}

impl DatasetProcessor {
    /// Lists the images of the positive and negative dataset directories of `config`.
    pub fn new(config: &TrainConfig) -> Result<Self, TrainError> {
        config.validate()?;
        let positives = list_images(&config.positive_dataset_list)?;
        if positives.is_empty() {
            return Err(TrainError::InvalidConfig("there are no positive images".into()));
        }
        let negatives = list_images(&config.negative_dataset_list)?;
        if negatives.is_empty() {
            return Err(TrainError::InvalidConfig("there are no negative images".into()));
        }
        log::info!(
            "found {} positive and {} negative images",
            positives.len(),
            negatives.len()
        );

        let (width, height) = config.size();
        Ok(Self {
            width,
            height,
            scales: config.scales(),
            negative_count: config.negative_count,
            positives,
            negatives,
        })
    }

    pub fn positive_paths(&self) -> &[PathBuf] {
        &self.positives
    }

    pub fn negative_paths(&self) -> &[PathBuf] {
        &self.negatives
    }

    /// Loads every positive image, resized to the classifier size, and keeps those `gate` accepts.
    pub fn positives(&self, gate: &Classifier) -> Result<Vec<Sample>, TrainError> {
        self.check_gate(gate)?;
        let timer = Timer::new("positives");
        let (width, height) = (self.width as u32, self.height as u32);

        let samples = timer.time(|| {
            self.positives
                .par_iter()
                .filter_map(|path| {
                    let image = match load_image(path) {
                        Ok(image) => image.resize(width, height),
                        Err(e) => {
                            log::warn!("{e}");
                            return None;
                        }
                    };
                    let mut sample = Sample::new(&image, path.clone());
                    if let Err(e) = gate.prepare(sample.pool_mut()) {
                        return Some(Err(e));
                    }
                    let (x, y) = (self.width / 2, self.height / 2);
                    accepts(gate, sample.pool(), x, y).then_some(Ok(sample))
                })
                .collect::<Result<Vec<_>, PoolError>>()
        });
        let samples = samples.map_err(ModelError::from)?;

        log::info!("{} positive samples ({timer})", samples.len());
        Ok(samples)
    }

    /// Collects up to about `NegativeCount` windows that `gate` accepts from the negative images.
    ///
    /// Every negative image is scanned at every scale. To spread the samples over the whole image
    /// instead of taking the first windows, only every `period`-th window is considered in one
    /// pass, where `period` is the number of windows per wanted sample. Further passes with
    /// shifted window indices run until enough samples are found or every window was visited.
    pub fn negatives(&self, gate: &Classifier) -> Result<Vec<Sample>, TrainError> {
        self.check_gate(gate)?;
        let timer = Timer::new("negatives");
        let mut samples = Vec::new();

        for path in &self.negatives {
            if samples.len() >= self.negative_count {
                break;
            }
            let image = match load_image(path) {
                Ok(image) => image,
                Err(e) => {
                    log::warn!("{e}");
                    continue;
                }
            };

            let guard = timer.start();
            let pyramid: Vec<Image> = self
                .scales
                .iter()
                .map(|scale| scale_image(&image, scale))
                .collect();
            let period = self.period(&pyramid);
            let before = samples.len();

            for shift in 0..period {
                if samples.len() >= self.negative_count {
                    break;
                }
                let found = pyramid
                    .par_iter()
                    .map_init(ImagePool::new, |pool, level| {
                        self.scan_level(gate, pool, level, path, period, shift)
                    })
                    .collect::<Result<Vec<_>, PoolError>>()
                    .map_err(ModelError::from)?;
                samples.extend(found.into_iter().flatten());
            }
            drop(guard);

            log::debug!(
                "{} negative samples from '{}' (period {period})",
                samples.len() - before,
                path.display()
            );
        }

        log::info!("{} negative samples ({timer})", samples.len());
        Ok(samples)
    }

    fn check_gate(&self, gate: &Classifier) -> Result<(), TrainError> {
        if gate.width() != self.width || gate.height() != self.height {
            return Err(TrainError::InvalidConfig(format!(
                "classifier size {}x{} does not match the configured size {}x{}",
                gate.width(),
                gate.height(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Returns the number of windows in `pyramid` per wanted negative sample.
    fn period(&self, pyramid: &[Image]) -> u64 {
        let windows: u64 = pyramid
            .iter()
            .map(|level| {
                let (w, h) = size(level);
                let w = (w - self.width).max(0) as u64;
                let h = (h - self.height).max(0) as u64;
                w * h
            })
            .sum();
        (windows / self.negative_count as u64).max(1)
    }

    /// Crops the windows of `level` that `gate` accepts and whose index is `shift` modulo
    /// `period`.
    fn scan_level(
        &self,
        gate: &Classifier,
        pool: &mut ImagePool,
        level: &Image,
        source: &Path,
        period: u64,
        shift: u64,
    ) -> Result<Vec<Sample>, PoolError> {
        gate.prepare(pool)?;
        pool.update(level);

        let (w2, h2) = (self.width / 2, self.height / 2);
        let (level_width, level_height) = size(level);
        let mut found = Vec::new();
        let mut index = 0u64;
        for y in h2..level_height - h2 {
            for x in w2..level_width - w2 {
                if index % period == shift && accepts(gate, pool, x, y) {
                    let window = Rect::from_top_left(x - w2, y - h2, self.width, self.height);
                    found.push(Sample::new(&level.crop(window), source));
                }
                index += 1;
            }
        }
        Ok(found)
    }
}

/// Returns whether `gate` accepts the window centered at `(x, y)`.
///
/// A classifier without any stages accepts everything. Other evaluation errors reject the window.
fn accepts(gate: &Classifier, pool: &ImagePool, x: i32, y: i32) -> bool {
    match gate.evaluate(pool, x, y) {
        Ok(response) => response > 0.0,
        Err(EvalError::Empty(_)) => true,
        Err(e) => {
            log::trace!("rejecting window at ({x}, {y}): {e}");
            false
        }
    }
}

fn load_image(path: &Path) -> Result<Image, TrainError> {
    Image::load(path).map_err(|source| TrainError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Lists the images directly inside `dirs`, sorted by file name within each directory.
fn list_images(dirs: &[PathBuf]) -> Result<Vec<PathBuf>, TrainError> {
    let mut images = Vec::new();
    for dir in dirs {
        let io_error = |source| TrainError::Io {
            path: dir.clone(),
            source,
        };
        let mut found = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && is_image(&path) {
                found.push(path);
            }
        }
        found.sort();
        images.extend(found);
    }
    Ok(images)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use crate::{classifier::Cascade, test::stump};

    use super::*;

    #[test]
    fn image_extensions() {
        assert!(is_image(Path::new("a/b.JPG")));
        assert!(is_image(Path::new("b.png")));
        assert!(!is_image(Path::new("b.txt")));
        assert!(!is_image(Path::new("png")));
    }

    fn processor(negative_count: usize) -> DatasetProcessor {
        DatasetProcessor {
            width: 3,
            height: 3,
            scales: Scales::default(),
            negative_count,
            positives: Vec::new(),
            negatives: Vec::new(),
        }
    }

    #[test]
    fn sampling_period() {
        let pyramid = [Image::filled(13, 7, 1, 0), Image::filled(2, 2, 1, 0)];
        // 10 * 4 windows, none in the second level.
        assert_eq!(processor(10).period(&pyramid), 4);
        assert_eq!(processor(1000).period(&pyramid), 1);
    }

    #[test]
    fn shifted_scans_cover_every_window() {
        let processor = processor(100);
        let gate = Classifier::from(Cascade::new(3, 3));
        let level = Image::filled(6, 5, 1, 7);
        let mut pool = ImagePool::new();

        // 4 * 3 windows.
        let counts: Vec<usize> = (0..3)
            .map(|shift| {
                processor
                    .scan_level(&gate, &mut pool, &level, Path::new("n.png"), 3, shift)
                    .unwrap()
                    .len()
            })
            .collect();
        assert_eq!(counts, [4, 4, 4]);
    }

    #[test]
    fn rejected_windows_are_skipped() {
        let processor = processor(100);
        // Bright windows only.
        let gate = stump(3, 3, 100, [1.0, -1.0]);
        let level = Image::from_fn(8, 3, |x, _| if x < 4 { 0 } else { 255 });
        let mut pool = ImagePool::new();
        let found = processor
            .scan_level(&gate, &mut pool, &level, Path::new("n.png"), 1, 0)
            .unwrap();
        // Windows centered at x = 4 (mean 170), 5 and 6.
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].pool().base().get(0, 0, 0), 0);
        assert_eq!(found[1].pool().base().get(0, 0, 0), 255);
        assert_eq!(found[0].source(), Path::new("n.png"));
    }
}
