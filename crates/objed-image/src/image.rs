use std::{fmt, path::Path};

use image::{
    imageops::{self, FilterType},
    ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba,
};
use itertools::iproduct;

use crate::rect::Rect;

/// An owned 8-bit image with 1 to 4 interleaved channels.
///
/// Multi-channel images are interpreted as RGB(A). Single-channel images are grayscale or
/// the output of a preprocessing method.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: u8,
    buf: Vec<u8>,
}

impl Image {
    /// Creates a zero-filled image of the given dimensions.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is not in `1..=4`.
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        Self::filled(width, height, channels, 0)
    }

    /// Creates an image with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Self {
        assert!(
            (1..=4).contains(&channels),
            "unsupported channel count {channels}"
        );
        Self {
            width,
            height,
            channels,
            buf: vec![value; width as usize * height as usize * usize::from(channels)],
        }
    }

    /// Creates an [`Image`] from raw, preexisting interleaved pixel data.
    ///
    /// `buf` needs to have a length of exactly `width * height * channels`, or this function will
    /// panic.
    pub fn from_raw(width: u32, height: u32, channels: u8, buf: Vec<u8>) -> Self {
        assert!(
            (1..=4).contains(&channels),
            "unsupported channel count {channels}"
        );
        let expected_size = width as usize * height as usize * usize::from(channels);
        assert_eq!(
            expected_size,
            buf.len(),
            "incorrect buffer size {} for {}x{}x{} image",
            buf.len(),
            width,
            height,
            channels,
        );
        Self {
            width,
            height,
            channels,
            buf,
        }
    }

    /// Creates a single-channel image by invoking `f` with the coordinates of every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        let buf = iproduct!(0..height, 0..width).map(|(y, x)| f(x, y)).collect();
        Self::from_raw(width, height, 1, buf)
    }

    /// Loads an image from the filesystem.
    ///
    /// Grayscale files are loaded as single-channel images, everything else as 3-channel RGB.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, image::ImageError> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> Result<Self, image::ImageError> {
        let dynamic = image::open(path)?;
        let image = if dynamic.color().has_color() {
            let buf = dynamic.to_rgb8();
            Self::from_raw(buf.width(), buf.height(), 3, buf.into_raw())
        } else {
            let buf = dynamic.to_luma8();
            Self::from_raw(buf.width(), buf.height(), 1, buf.into_raw())
        };
        log::trace!("loaded {:?} from '{}'", image, path.display());
        Ok(image)
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the number of interleaved channels per pixel.
    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Returns `true` if the image contains no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns a [`Rect`] covering this image.
    ///
    /// The rectangle will be positioned at `(0, 0)` and have the width and height of the image.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0, 0, self.width as i32, self.height as i32)
    }

    #[inline]
    fn index(&self, x: u32, y: u32, channel: u8) -> usize {
        debug_assert!(x < self.width && y < self.height && channel < self.channels);
        (y as usize * self.width as usize + x as usize) * usize::from(self.channels)
            + usize::from(channel)
    }

    /// Gets a sample at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    #[inline]
    pub fn get(&self, x: u32, y: u32, channel: u8) -> u8 {
        self.buf[self.index(x, y, channel)]
    }

    /// Sets a sample at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, channel: u8, value: u8) {
        let index = self.index(x, y, channel);
        self.buf[index] = value;
    }

    /// Returns the interleaved samples of row `y`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * usize::from(self.channels);
        &self.buf[y as usize * stride..][..stride]
    }

    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * usize::from(self.channels);
        &mut self.buf[y as usize * stride..][..stride]
    }

    /// Returns the raw interleaved pixel data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Returns a bilinearly resampled copy of this image with the given size.
    ///
    /// Resizing to the current size returns an exact copy.
    pub fn resize(&self, width: u32, height: u32) -> Image {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if self.is_empty() || width == 0 || height == 0 {
            return Image::new(width, height, self.channels);
        }

        log::trace!(
            "resize from {}x{} -> {}x{}",
            self.width,
            self.height,
            width,
            height,
        );

        let buf = match self.channels {
            1 => resize_buf::<Luma<u8>>(self, width, height),
            2 => resize_buf::<LumaA<u8>>(self, width, height),
            3 => resize_buf::<Rgb<u8>>(self, width, height),
            _ => resize_buf::<Rgba<u8>>(self, width, height),
        };
        Image::from_raw(width, height, self.channels, buf)
    }

    /// Copies the area covered by `rect` into a new [`Image`].
    ///
    /// Pixels of `rect` that lie outside of `self` are zero. The returned image always has the
    /// size of `rect`.
    pub fn crop(&self, rect: Rect) -> Image {
        let width = rect.width().max(0) as u32;
        let height = rect.height().max(0) as u32;
        let mut out = Image::new(width, height, self.channels);
        let Some(visible) = self.rect().intersection(&rect) else {
            return out;
        };

        let channels = usize::from(self.channels);
        let span = visible.width() as usize * channels;
        for y in visible.y()..visible.bottom() {
            let src_x = visible.x() as usize * channels;
            let dst_x = (visible.x() - rect.x()) as usize * channels;
            let src = &self.row(y as u32)[src_x..][..span];
            out.row_mut((y - rect.y()) as u32)[dst_x..][..span].copy_from_slice(src);
        }
        out
    }
}

fn resize_buf<P>(image: &Image, width: u32, height: u32) -> Vec<u8>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let src: ImageBuffer<P, &[u8]> =
        ImageBuffer::from_raw(image.width(), image.height(), image.data())
            .expect("failed to create ImageBuffer");
    imageops::resize(&src, width, height, FilterType::Triangle).into_raw()
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} Image",
            self.width, self.height, self.channels
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_access() {
        let mut image = Image::new(2, 3, 3);
        image.set(1, 2, 2, 0xab);
        assert_eq!(image.get(1, 2, 2), 0xab);
        assert_eq!(image.row(2), &[0, 0, 0, 0, 0, 0xab]);
        assert_eq!(image.data().len(), 18);
    }

    #[test]
    fn resize_identity() {
        let image = Image::from_fn(7, 5, |x, y| (x * 10 + y) as u8);
        assert_eq!(image.resize(7, 5), image);
    }

    #[test]
    fn resize_uniform() {
        let image = Image::filled(8, 8, 1, 100);
        let small = image.resize(3, 5);
        assert_eq!(small.width(), 3);
        assert_eq!(small.height(), 5);
        assert!(small.data().iter().all(|&v| v == 100));
    }

    #[test]
    fn crop_partially_outside() {
        let image = Image::from_fn(4, 4, |x, y| (y * 4 + x) as u8 + 1);
        let crop = image.crop(Rect::from_top_left(2, -1, 3, 3));
        assert_eq!(crop.width(), 3);
        assert_eq!(crop.height(), 3);
        assert_eq!(crop.row(0), &[0, 0, 0]);
        assert_eq!(crop.row(1), &[3, 4, 0]);
        assert_eq!(crop.row(2), &[7, 8, 0]);
    }
}
