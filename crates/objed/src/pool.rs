//! Lazily populated cache of preprocessed images and their integral images.

pub mod preproc;

use std::collections::BTreeMap;

use crate::{error::PoolError, Image, IntegralImage};

use self::preproc::Method;

/// Separates the steps of a preprocessing pipeline id.
pub const SEPARATOR: char = '|';

#[derive(Debug, Clone)]
struct Derived {
    method: Method,
    /// Id of the image `method` is applied to, or `None` for the base frame.
    source: Option<String>,
    image: Image,
}

/// Holds a frame together with every derived image and integral image requested so far.
///
/// Entries are keyed by their pipeline id (see [`preproc`]). Once an entry has been requested,
/// [`ImagePool::update`] recomputes it for every new frame, so classifiers only need to register
/// the ids they use once (in their `prepare` step) and can then look them up with
/// [`ImagePool::cached_integral`] through a shared reference.
#[derive(Debug, Clone)]
pub struct ImagePool {
    base: Image,
    images: BTreeMap<String, Derived>,
    integrals: BTreeMap<String, IntegralImage>,
}

impl ImagePool {
    /// Creates an empty pool whose base frame is an empty image.
    pub fn new() -> Self {
        Self {
            base: Image::new(0, 0, 1),
            images: BTreeMap::new(),
            integrals: BTreeMap::new(),
        }
    }

    /// Checks that every step of the pipeline `id` names a known method.
    pub fn validate_id(id: &str) -> Result<(), PoolError> {
        for step in id.split(SEPARATOR) {
            if Method::parse(step).is_none() {
                return Err(unknown_method(id, step));
            }
        }
        Ok(())
    }

    /// Replaces the base frame and recomputes every registered entry.
    pub fn update(&mut self, frame: &Image) {
        self.base.clone_from(frame);

        // Ids sort after their sources (`a` < `a|b`), so sources are always fresh here.
        let ids: Vec<String> = self.images.keys().cloned().collect();
        for id in ids {
            let output = {
                let entry = &self.images[&id];
                entry.method.apply(self.source(entry.source.as_deref()))
            };
            if let Some(entry) = self.images.get_mut(&id) {
                entry.image = output;
            }
        }

        for (id, integral) in &mut self.integrals {
            if let Some(entry) = self.images.get(id) {
                integral.compute(&entry.image);
            }
        }
    }

    fn source(&self, id: Option<&str>) -> &Image {
        match id.and_then(|id| self.images.get(id)) {
            Some(entry) => &entry.image,
            None => &self.base,
        }
    }

    fn ensure_image(&mut self, id: &str) -> Result<(), PoolError> {
        if self.images.contains_key(id) {
            return Ok(());
        }

        let (source, name) = match id.rfind(SEPARATOR) {
            Some(pos) => (Some(&id[..pos]), &id[pos + 1..]),
            None => (None, id),
        };
        let method = Method::parse(name).ok_or_else(|| unknown_method(id, name))?;
        if let Some(source) = source {
            self.ensure_image(source)?;
        }

        let image = method.apply(self.source(source));
        log::trace!("registered pool image '{id}' ({image:?})");
        self.images.insert(
            id.to_string(),
            Derived {
                method,
                source: source.map(str::to_string),
                image,
            },
        );
        Ok(())
    }

    /// Returns the derived image `id`, computing and registering it on first use.
    pub fn image(&mut self, id: &str) -> Result<&Image, PoolError> {
        self.ensure_image(id)?;
        Ok(&self.images[id].image)
    }

    /// Returns the integral image of the derived image `id`, computing and registering both on
    /// first use.
    pub fn integral(&mut self, id: &str) -> Result<&IntegralImage, PoolError> {
        if !self.integrals.contains_key(id) {
            self.ensure_image(id)?;
            let integral = IntegralImage::new(&self.images[id].image);
            self.integrals.insert(id.to_string(), integral);
        }
        Ok(&self.integrals[id])
    }

    /// Returns the derived image `id` if it has been registered.
    pub fn cached_image(&self, id: &str) -> Option<&Image> {
        self.images.get(id).map(|entry| &entry.image)
    }

    /// Returns the integral image of `id` if it has been registered.
    pub fn cached_integral(&self, id: &str) -> Option<&IntegralImage> {
        self.integrals.get(id)
    }

    /// Returns the current frame.
    pub fn base(&self) -> &Image {
        &self.base
    }

    /// Returns the ids of all registered derived images, in ascending order.
    pub fn image_names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    /// Returns the ids of all registered integral images, in ascending order.
    pub fn integral_names(&self) -> impl Iterator<Item = &str> {
        self.integrals.keys().map(String::as_str)
    }
}

impl Default for ImagePool {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown_method(id: &str, method: &str) -> PoolError {
    PoolError::UnknownMethod {
        id: id.to_string(),
        method: method.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_chains() {
        let mut pool = ImagePool::new();
        pool.update(&Image::filled(4, 4, 3, 10));
        pool.integral("gray|filter10").unwrap();

        assert_eq!(
            pool.image_names().collect::<Vec<_>>(),
            ["gray", "gray|filter10"]
        );
        assert_eq!(pool.integral_names().collect::<Vec<_>>(), ["gray|filter10"]);
        assert_eq!(
            pool.cached_integral("gray|filter10").unwrap().rect_sum(0, 0, 4, 4),
            Some(16 * 255)
        );
        assert!(pool.cached_integral("gray").is_none());
    }

    #[test]
    fn update_recomputes_everything() {
        let mut pool = ImagePool::new();
        pool.integral("gray|filter10").unwrap();
        pool.integral("gray").unwrap();
        assert_eq!(pool.cached_integral("gray").unwrap().width(), 1);

        pool.update(&Image::filled(3, 2, 1, 10));
        assert_eq!(pool.base().width(), 3);
        let ii = pool.cached_integral("gray|filter10").unwrap();
        assert_eq!(ii.rect_sum(0, 0, 3, 2), Some(6 * 255));

        pool.update(&Image::filled(3, 2, 1, 11));
        let ii = pool.cached_integral("gray|filter10").unwrap();
        assert_eq!(ii.rect_sum(0, 0, 3, 2), Some(0));
        let ii = pool.cached_integral("gray").unwrap();
        assert_eq!(ii.rect_sum(0, 0, 3, 2), Some(6 * 11));
    }

    #[test]
    fn unknown_methods() {
        let mut pool = ImagePool::new();
        assert_eq!(
            pool.image("gray|blur").unwrap_err(),
            PoolError::UnknownMethod {
                id: "gray|blur".into(),
                method: "blur".into()
            }
        );
        assert!(pool.integral("").is_err());
        assert!(pool.image_names().next().is_none());

        assert!(ImagePool::validate_id("gray|gradient2|noSalt").is_ok());
        assert!(ImagePool::validate_id("gray||gradient").is_err());
        assert!(ImagePool::validate_id("gradient4").is_err());
    }
}
