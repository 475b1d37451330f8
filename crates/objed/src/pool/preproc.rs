//! Preprocessing methods available to [`ImagePool`][super::ImagePool] pipelines.
//!
//! A pipeline id is a `|`-separated chain of method names, applied left to right to the base
//! frame (eg. `gray|gradient1`). Every method produces a single-channel image of the same size
//! as its input. All spatial methods convert their input to gray first.

use std::borrow::Cow;

use crate::Image;

/// Gradient direction codes, as produced by [`gradient_components`].
const DIR_0: u8 = 1;
const DIR_45: u8 = 2;
const DIR_90: u8 = 4;
const DIR_135: u8 = 8;

/// A single preprocessing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Luma of an RGB input.
    Gray,
    /// Extracts a single channel. Out-of-range channels produce a black image.
    Channel(u32),
    /// `max(r, g, b) - min(r, g, b)`.
    Saturation,
    /// Gradient magnitude (`0`) or signed gradient along the horizontal/vertical (`1`) or
    /// diagonal (`2`) directions.
    Gradient(u8),
    /// Non-maximum suppressed gradient edges, selected like [`Method::Gradient`].
    Canny(u8),
    /// Direction codes of gradient local maxima.
    RawCanny,
    /// Binary mask of the pixels whose gray value equals the given index.
    Filter(i32),
    /// Removes isolated white pixels from a binary image.
    NoSalt,
}

impl Method {
    /// Parses a method name such as `gray`, `channel2` or `gradient1`.
    ///
    /// A missing numeric suffix is read as `0`.
    pub fn parse(name: &str) -> Option<Self> {
        fn suffix<T: std::str::FromStr + Default>(rest: &str) -> Option<T> {
            if rest.is_empty() {
                Some(T::default())
            } else {
                rest.parse().ok()
            }
        }

        if name == "gray" {
            Some(Self::Gray)
        } else if name == "saturation" {
            Some(Self::Saturation)
        } else if name == "rawCanny" {
            Some(Self::RawCanny)
        } else if name == "noSalt" {
            Some(Self::NoSalt)
        } else if let Some(rest) = name.strip_prefix("channel") {
            suffix(rest).map(Self::Channel)
        } else if let Some(rest) = name.strip_prefix("gradient") {
            suffix(rest).filter(|d| *d <= 2).map(Self::Gradient)
        } else if let Some(rest) = name.strip_prefix("canny") {
            suffix(rest).filter(|d| *d <= 2).map(Self::Canny)
        } else if let Some(rest) = name.strip_prefix("filter") {
            suffix(rest).map(Self::Filter)
        } else {
            None
        }
    }

    /// Applies this method to `input`, producing a new single-channel image.
    pub fn apply(&self, input: &Image) -> Image {
        match *self {
            Self::Gray => gray(input).into_owned(),
            Self::Channel(c) => channel(input, c),
            Self::Saturation => saturation(input),
            Self::Gradient(d) => gradient(&gray(input), d),
            Self::Canny(d) => canny(&gray(input), d),
            Self::RawCanny => raw_canny(&gray(input)),
            Self::Filter(index) => filter(&gray(input), index),
            Self::NoSalt => no_salt(&gray(input)),
        }
    }
}

/// Converts `image` to a single gray channel, borrowing it if it already is one.
///
/// RGB(A) images use the BT.601 luma weights in 14-bit fixed point. Gray+alpha images keep
/// their gray channel.
pub fn gray(image: &Image) -> Cow<'_, Image> {
    match image.channels() {
        1 => Cow::Borrowed(image),
        2 => Cow::Owned(channel(image, 0)),
        _ => {
            let mut out = Image::new(image.width(), image.height(), 1);
            let channels = usize::from(image.channels());
            for y in 0..image.height() {
                let src = image.row(y);
                for (dst, px) in out.row_mut(y).iter_mut().zip(src.chunks_exact(channels)) {
                    let (r, g, b) = (u32::from(px[0]), u32::from(px[1]), u32::from(px[2]));
                    *dst = ((r * 4899 + g * 9617 + b * 1868 + 8192) >> 14) as u8;
                }
            }
            Cow::Owned(out)
        }
    }
}

fn channel(image: &Image, channel: u32) -> Image {
    let mut out = Image::new(image.width(), image.height(), 1);
    if channel >= u32::from(image.channels()) {
        return out;
    }
    let channels = usize::from(image.channels());
    let c = channel as usize;
    for y in 0..image.height() {
        let src = image.row(y);
        for (dst, px) in out.row_mut(y).iter_mut().zip(src.chunks_exact(channels)) {
            *dst = px[c];
        }
    }
    out
}

fn saturation(image: &Image) -> Image {
    let mut out = Image::new(image.width(), image.height(), 1);
    if image.channels() < 3 {
        return out;
    }
    let channels = usize::from(image.channels());
    for y in 0..image.height() {
        let src = image.row(y);
        for (dst, px) in out.row_mut(y).iter_mut().zip(src.chunks_exact(channels)) {
            let max = px[0].max(px[1]).max(px[2]);
            let min = px[0].min(px[1]).min(px[2]);
            *dst = max - min;
        }
    }
    out
}

/// Central-difference gradient of a gray image.
///
/// Border pixels have a zero gradient and direction code `0`.
struct Gradient {
    width: usize,
    height: usize,
    /// Gradient magnitude, scaled by `1/√2` so that it fits into `0..=255`.
    magnitude: Vec<f32>,
    direction: Vec<u8>,
}

impl Gradient {
    #[inline]
    fn mg(&self, x: usize, y: usize) -> f32 {
        self.magnitude[y * self.width + x]
    }

    #[inline]
    fn dir(&self, x: usize, y: usize) -> u8 {
        self.direction[y * self.width + x]
    }
}

fn gradient_components(gray: &Image) -> Gradient {
    let width = gray.width() as usize;
    let height = gray.height() as usize;
    let mut magnitude = vec![0.0; width * height];
    let mut direction = vec![0; width * height];

    let t = (std::f32::consts::PI / 8.0).tan();
    let data = gray.data();
    let px = |x: usize, y: usize| f32::from(data[y * width + x]);
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let dx = px(x + 1, y) - px(x - 1, y);
            let dy = px(x, y + 1) - px(x, y - 1);
            let i = y * width + x;
            magnitude[i] = (dx * dx + dy * dy).sqrt() / std::f32::consts::SQRT_2;

            let (dxa, dya) = (dx.abs(), dy.abs());
            direction[i] = if dya < dxa * t {
                DIR_0
            } else if dxa < dya * t {
                DIR_90
            } else if dx * dy > 0.0 {
                DIR_45
            } else if dx * dy < 0.0 {
                DIR_135
            } else {
                0
            };
        }
    }

    Gradient {
        width,
        height,
        magnitude,
        direction,
    }
}

fn gradient(gray: &Image, variant: u8) -> Image {
    let grad = gradient_components(gray);
    let mut out = Image::new(gray.width(), gray.height(), 1);
    for y in 0..grad.height {
        let row = out.row_mut(y as u32);
        for (x, dst) in row.iter_mut().enumerate() {
            let mg = grad.mg(x, y) as i32;
            let half = mg >> 1;
            *dst = match (variant, grad.dir(x, y)) {
                (0, _) => mg.min(255) as u8,
                (1, DIR_0) | (2, DIR_45) => (128 + half) as u8,
                (1, DIR_90) | (2, DIR_135) => (128 - half) as u8,
                _ => 128,
            };
        }
    }
    out
}

/// Neighbours along the gradient direction of `(x, y)`: the pixel "behind" and "ahead".
fn along(grad: &Gradient, dir: u8, x: usize, y: usize) -> Option<(f32, f32)> {
    match dir {
        DIR_0 => Some((grad.mg(x - 1, y), grad.mg(x + 1, y))),
        DIR_45 => Some((grad.mg(x - 1, y - 1), grad.mg(x + 1, y + 1))),
        DIR_90 => Some((grad.mg(x, y - 1), grad.mg(x, y + 1))),
        DIR_135 => Some((grad.mg(x + 1, y - 1), grad.mg(x - 1, y + 1))),
        _ => None,
    }
}

fn canny(gray: &Image, variant: u8) -> Image {
    let grad = gradient_components(gray);
    let mut out = Image::new(gray.width(), gray.height(), 1);
    let off = if variant == 0 { 0 } else { 128 };
    for y in 1..grad.height.saturating_sub(1) {
        let row = out.row_mut(y as u32);
        for x in 1..grad.width.saturating_sub(1) {
            let mg = grad.mg(x, y);
            let dir = grad.dir(x, y);
            let is_max = along(&grad, dir, x, y).map_or(false, |(n1, n2)| n1 < mg && mg >= n2);
            row[x] = if !is_max {
                off
            } else {
                match (dir, variant) {
                    (DIR_0, 0 | 1) | (DIR_45, 0 | 2) => 255,
                    (DIR_90 | DIR_135, 0) => 255,
                    (DIR_90, 1) | (DIR_135, 2) => 0,
                    _ => 128,
                }
            };
        }
    }
    out
}

fn raw_canny(gray: &Image) -> Image {
    let grad = gradient_components(gray);
    let mut out = Image::new(gray.width(), gray.height(), 1);
    for y in 1..grad.height.saturating_sub(1) {
        let row = out.row_mut(y as u32);
        for x in 1..grad.width.saturating_sub(1) {
            let mg = grad.mg(x, y);
            let dir = grad.dir(x, y);
            row[x] = match along(&grad, dir, x, y) {
                Some((n1, n2)) if n1 < mg && mg > n2 => dir,
                _ => 0,
            };
        }
    }
    out
}

fn filter(gray: &Image, index: i32) -> Image {
    let mut out = Image::new(gray.width(), gray.height(), 1);
    for y in 0..gray.height() {
        for (dst, src) in out.row_mut(y).iter_mut().zip(gray.row(y)) {
            *dst = if i32::from(*src) == index { 255 } else { 0 };
        }
    }
    out
}

fn no_salt(gray: &Image) -> Image {
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    let mut out = Image::new(gray.width(), gray.height(), 1);
    let data = gray.data();
    for y in 1..height.saturating_sub(1) {
        let row = out.row_mut(y as u32);
        for x in 1..width.saturating_sub(1) {
            if data[y * width + x] != 255 {
                continue;
            }
            let mut neighbours = 0u32;
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    if (nx, ny) != (x, y) {
                        neighbours += u32::from(data[ny * width + nx]);
                    }
                }
            }
            if neighbours > 0 {
                row[x] = 255;
            }
        }
    }
    out
}
