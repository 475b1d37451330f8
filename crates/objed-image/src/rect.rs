//! Axis-aligned geometry primitives.
//!
//! All types are generic over their coordinate type (see [`Coord`]). Detections and feature
//! rectangles use `i32`, while region-of-interest checks use `f64` fractions of the frame size.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::num::Coord;

/// An axis-aligned rectangle.
///
/// Rectangles span `x..x+width` horizontally and `y..y+height` vertically. They are allowed to
/// have zero or negative size, in which case they are considered empty.
///
/// The document form is `{"x": .., "y": .., "width": .., "height": ..}`.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect<T = i32> {
    x: T,
    y: T,
    width: T,
    height: T,
}

impl<T: Coord> Rect<T> {
    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(x: T, y: T, width: T, height: T) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle extending outwards from a center point.
    ///
    /// For integer coordinates, the center pixel of an odd-sized rectangle is exactly
    /// `(x_center, y_center)`.
    pub fn from_center(x_center: T, y_center: T, width: T, height: T) -> Self {
        Self {
            x: x_center - width / T::TWO,
            y: y_center - height / T::TWO,
            width,
            height,
        }
    }

    /// Creates a rectangle from its top-left (inclusive) and bottom-right (exclusive) corners.
    pub fn from_corners(left: T, top: T, right: T, bottom: T) -> Self {
        Self::from_top_left(left, top, right - left, bottom - top)
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> T {
        self.x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> T {
        self.y
    }

    #[inline]
    pub fn width(&self) -> T {
        self.width
    }

    #[inline]
    pub fn height(&self) -> T {
        self.height
    }

    /// Returns the (exclusive) X coordinate of the right side.
    #[inline]
    pub fn right(&self) -> T {
        self.x + self.width
    }

    /// Returns the (exclusive) Y coordinate of the bottom side.
    #[inline]
    pub fn bottom(&self) -> T {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> T {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= T::ZERO || self.height <= T::ZERO
    }

    pub fn center(&self) -> Point<T> {
        Point::new(self.x + self.width / T::TWO, self.y + self.height / T::TWO)
    }

    #[must_use]
    pub fn move_by(&self, x: T, y: T) -> Self {
        Self::from_top_left(self.x + x, self.y + y, self.width, self.height)
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns `None` when the intersection is empty (ie. the rectangles do not overlap or merely
    /// touch).
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self::from_corners(left, top, right, bottom))
    }

    /// Returns the area of the intersection of `self` and `other`, or zero if they don't overlap.
    pub fn intersection_area(&self, other: &Self) -> T {
        self.intersection(other).map_or(T::ZERO, |r| r.area())
    }

    /// Returns the smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        Self::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Returns whether `self` contains `other`.
    pub fn contains_rect(&self, other: &Self) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    /// Returns whether `point` lies inside `self`, including all four edges.
    pub fn contains_point(&self, point: Point<T>) -> bool {
        self.x <= point.x
            && point.x <= self.right()
            && self.y <= point.y
            && point.y <= self.bottom()
    }
}

impl<T: Coord> fmt::Debug for Rect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point<T = i32> {
    x: T,
    y: T,
}

impl<T: Coord> Point<T> {
    #[inline]
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn x(&self) -> T {
        self.x
    }

    #[inline]
    pub fn y(&self) -> T {
        self.y
    }
}

/// A 2D extent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size<T = i32> {
    width: T,
    height: T,
}

impl<T: Coord> Size<T> {
    #[inline]
    pub fn new(width: T, height: T) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> T {
        self.width
    }

    #[inline]
    pub fn height(&self) -> T {
        self.height
    }
}

/// A closed interval `[min, max]`.
///
/// The document form is `{"min": .., "max": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Interval<T = i32> {
    min: T,
    max: T,
}

impl<T: Coord> Interval<T> {
    #[inline]
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn min(&self) -> T {
        self.min
    }

    #[inline]
    pub fn max(&self) -> T {
        self.max
    }

    /// Returns whether `value` lies in the interval, including both bounds.
    #[inline]
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_rect() {
        let outer = Rect::from_top_left(-8, -8, 16, 16);
        assert!(outer.contains_rect(&outer));
        assert!(outer.contains_rect(&Rect::from_top_left(-8, -8, 15, 15)));
        assert!(outer.contains_rect(&Rect::from_top_left(-7, -7, 15, 15)));
        assert!(!outer.contains_rect(&Rect::from_top_left(-7, -8, 16, 16)));
        assert!(!outer.contains_rect(&Rect::from_top_left(-8, -7, 16, 16)));
        assert!(!outer.contains_rect(&Rect::from_top_left(-8, -8, 17, 16)));
        assert!(!outer.contains_rect(&Rect::from_top_left(-9, -8, 10, 10)));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::from_top_left(0, 0, 10, 10);
        let b = Rect::from_top_left(5, 5, 1, 1);
        assert_eq!(a.intersection(&b), Some(b));
        assert_eq!(b.intersection(&a), Some(b));
        assert_eq!(b.intersection(&Rect::from_top_left(6, 0, 5, 10)), None);
        assert_eq!(
            a.intersection(&Rect::from_top_left(8, -2, 4, 4)),
            Some(Rect::from_top_left(8, 0, 2, 2)),
        );
        assert_eq!(a.intersection_area(&Rect::from_top_left(10, 0, 5, 5)), 0);
    }

    #[test]
    fn test_union() {
        let a = Rect::from_top_left(0, 0, 2, 2);
        let b = Rect::from_top_left(3, -1, 2, 2);
        assert_eq!(a.union(&b), Rect::from_top_left(0, -1, 5, 3));
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn test_from_center() {
        let r = Rect::from_center(5, 5, 3, 3);
        assert_eq!(r, Rect::from_top_left(4, 4, 3, 3));
        assert_eq!(r.center(), Point::new(5, 5));

        let r = Rect::from_center(0.5, 0.5, 1.0, 1.0);
        assert_eq!(r, Rect::from_top_left(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_contains_point_inclusive() {
        let roi = Rect::from_top_left(0.0, 0.0, 1.0, 1.0);
        assert!(roi.contains_point(Point::new(0.0, 0.0)));
        assert!(roi.contains_point(Point::new(1.0, 1.0)));
        assert!(roi.contains_point(Point::new(0.5, 1.0)));
        assert!(!roi.contains_point(Point::new(1.01, 0.5)));
        assert!(!roi.contains_point(Point::new(0.5, -0.01)));
    }

    #[test]
    fn test_intersection_is_contained() {
        let mut rng = fastrand::Rng::with_seed(0x0b_1ed);
        for _ in 0..1000 {
            let mut rect = || {
                Rect::from_top_left(
                    rng.i32(-20..20),
                    rng.i32(-20..20),
                    rng.i32(0..20),
                    rng.i32(0..20),
                )
            };
            let (a, b) = (rect(), rect());
            if let Some(i) = a.intersection(&b) {
                assert!(a.contains_rect(&i), "{a:?} {b:?} {i:?}");
                assert!(b.contains_rect(&i), "{a:?} {b:?} {i:?}");
                assert!(!i.is_empty());
            }
            let u = a.union(&b);
            assert!(u.contains_rect(&a) && u.contains_rect(&b));
        }
    }

    #[test]
    fn test_interval() {
        let i = Interval::new(10, 20);
        assert!(i.contains(10));
        assert!(i.contains(20));
        assert!(!i.contains(21));
        assert!(!i.contains(9));
    }
}
