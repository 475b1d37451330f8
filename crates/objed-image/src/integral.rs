use std::fmt;

use crate::Image;

/// A summed-area table of an [`Image`].
///
/// An integral image is one pixel wider and taller than its source. The value at `(x, y)` is the
/// sum of all source samples above and to the left of `(x, y)` (exclusive), computed separately
/// for every channel.
///
/// Sums are accumulated with 64-bit integers and stored as wrapping 32-bit values. Differences of
/// stored values are computed with wrapping arithmetic, so rectangle sums are exact as long as the
/// sum itself fits in a `u32` (which holds for any rectangle of up to 16 million pixels).
#[derive(Clone, PartialEq, Eq)]
pub struct IntegralImage {
    width: u32,
    height: u32,
    channels: u8,
    buf: Vec<u32>,
}

impl IntegralImage {
    /// Computes the integral image of `image`.
    pub fn new(image: &Image) -> Self {
        let mut this = Self {
            width: 0,
            height: 0,
            channels: 1,
            buf: Vec::new(),
        };
        this.compute(image);
        this
    }

    /// Recomputes `self` from `image`, reusing the existing allocation where possible.
    pub fn compute(&mut self, image: &Image) {
        let channels = usize::from(image.channels());
        let width = image.width() as usize + 1;
        let height = image.height() as usize + 1;

        self.width = width as u32;
        self.height = height as u32;
        self.channels = image.channels();
        self.buf.clear();
        self.buf.resize(width * height * channels, 0);

        let stride = width * channels;
        let mut acc = vec![0u64; channels];
        for y in 1..height {
            acc.iter_mut().for_each(|a| *a = 0);
            let src = image.row(y as u32 - 1);
            let (above, row) = self.buf[(y - 1) * stride..][..2 * stride].split_at_mut(stride);
            for x in 1..width {
                for c in 0..channels {
                    acc[c] += u64::from(src[(x - 1) * channels + c]);
                    let i = x * channels + c;
                    row[i] = (u64::from(above[i]) + acc[c]) as u32;
                }
            }
        }
    }

    /// Returns the width of the table (source width + 1).
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the table (source height + 1).
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    #[inline]
    fn at(&self, x: usize, y: usize, channel: usize) -> u32 {
        self.buf[(y * self.width as usize + x) * usize::from(self.channels) + channel]
    }

    /// Sums the first channel over the source rectangle `(x, y, w, h)`.
    ///
    /// Returns `None` if the rectangle is not fully contained in the source image or has a
    /// negative size.
    #[inline]
    pub fn rect_sum(&self, x: i32, y: i32, w: i32, h: i32) -> Option<u32> {
        self.rect_sum_channel(0, x, y, w, h)
    }

    /// Sums `channel` over the source rectangle `(x, y, w, h)`.
    pub fn rect_sum_channel(&self, channel: u8, x: i32, y: i32, w: i32, h: i32) -> Option<u32> {
        if x < 0 || y < 0 || w < 0 || h < 0 || channel >= self.channels {
            return None;
        }
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        if x + w >= self.width as usize || y + h >= self.height as usize {
            return None;
        }
        let c = usize::from(channel);
        let a = self.at(x, y, c);
        let b = self.at(x + w, y, c);
        let d = self.at(x, y + h, c);
        let e = self.at(x + w, y + h, c);
        Some(e.wrapping_sub(b).wrapping_sub(d).wrapping_add(a))
    }

    /// Computes the integer mean of the first channel over the source rectangle `(x, y, w, h)`.
    ///
    /// Returns `None` for rectangles outside the image and for empty rectangles.
    #[inline]
    pub fn rect_aver(&self, x: i32, y: i32, w: i32, h: i32) -> Option<i32> {
        let area = i64::from(w) * i64::from(h);
        if area <= 0 {
            return None;
        }
        let sum = self.rect_sum(x, y, w, h)?;
        Some((i64::from(sum) / area) as i32)
    }
}

impl fmt::Debug for IntegralImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} IntegralImage",
            self.width, self.height, self.channels
        )
    }
}
