//! Shared fixtures for unit tests.

use crate::{
    classifier::{Classifier, Haar1Stump, OneRect, Stump},
    pool::ImagePool,
    rect::Rect,
    Image,
};

/// A `width x height` stump over the mean gray value of the whole window.
pub fn stump(width: i32, height: i32, threshold: i32, values: [f32; 2]) -> Classifier {
    Haar1Stump::new(
        width,
        height,
        "gray",
        OneRect::new(Rect::from_center(0, 0, width, height)),
        Stump::new(threshold, values),
    )
    .into()
}

/// A 3x3 classifier that always responds with `value`.
pub fn constant(value: f32) -> Classifier {
    stump(3, 3, -1, [value, value])
}

/// Returns a pool prepared for `classifier` and updated with `image`.
pub fn prepared_pool(classifier: &Classifier, image: &Image) -> ImagePool {
    let mut pool = ImagePool::new();
    classifier.prepare(&mut pool).unwrap();
    pool.update(image);
    pool
}

/// Returns a pool prepared for `classifier` and updated with a uniform gray frame.
pub fn uniform_pool(classifier: &Classifier, width: u32, height: u32, value: u8) -> ImagePool {
    prepared_pool(classifier, &Image::filled(width, height, 1, value))
}
