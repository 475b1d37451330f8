//! Grouping of overlapping detections.
//!
//! A sliding-window classifier typically fires on many neighbouring windows around every object.
//! [`cluster`] merges such hits into a single [`Detection`] whose `power` counts how many raw
//! windows it stands for, and [`merge_included`] folds detections nested inside larger ones into
//! their container.

use std::cmp::Reverse;

use crate::rect::Rect;

/// A rectangle together with the number of raw hits it represents.
#[derive(Clone, Copy, PartialEq)]
pub struct Cluster<T = i32> {
    rect: Rect<T>,
    power: i32,
}

impl<T> std::fmt::Debug for Cluster<T>
where
    Rect<T>: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("rect", &self.rect)
            .field("power", &self.power)
            .finish()
    }
}

/// A detected object in frame coordinates.
pub type Detection = Cluster<i32>;

impl<T: Copy> Cluster<T> {
    #[inline]
    pub fn new(rect: Rect<T>, power: i32) -> Self {
        Self { rect, power }
    }

    #[inline]
    pub fn rect(&self) -> Rect<T> {
        self.rect
    }

    /// Returns the number of raw detections merged into this cluster.
    #[inline]
    pub fn power(&self) -> i32 {
        self.power
    }
}

/// Running sums of a cluster under construction.
struct Accumulator {
    rect: Rect,
    power: i32,
    sums: [i64; 4],
}

impl Accumulator {
    fn new(rect: Rect, power: i32) -> Self {
        let w = i64::from(power);
        Self {
            rect,
            power,
            sums: [
                i64::from(rect.x()) * w,
                i64::from(rect.y()) * w,
                i64::from(rect.width()) * w,
                i64::from(rect.height()) * w,
            ],
        }
    }

    fn overlaps(&self, rect: &Rect, overlap: f64) -> bool {
        let area = self.rect.area().max(rect.area());
        f64::from(self.rect.intersection_area(rect)) > f64::from(area) * overlap
    }

    fn add(&mut self, rect: Rect, power: i32) {
        let w = i64::from(power);
        self.power += power;
        self.sums[0] += i64::from(rect.x()) * w;
        self.sums[1] += i64::from(rect.y()) * w;
        self.sums[2] += i64::from(rect.width()) * w;
        self.sums[3] += i64::from(rect.height()) * w;

        let n = i64::from(self.power);
        self.rect = Rect::from_top_left(
            (self.sums[0] / n) as i32,
            (self.sums[1] / n) as i32,
            (self.sums[2] / n) as i32,
            (self.sums[3] / n) as i32,
        );
    }
}

fn cluster_weighted(items: impl Iterator<Item = (Rect, i32)>, overlap: f64) -> Vec<Detection> {
    let mut clusters: Vec<Accumulator> = Vec::new();
    for (rect, power) in items {
        // Most recently started clusters are checked first.
        match clusters.iter_mut().rev().find(|c| c.overlaps(&rect, overlap)) {
            Some(cluster) => cluster.add(rect, power),
            None => clusters.push(Accumulator::new(rect, power)),
        }
    }
    clusters
        .into_iter()
        .map(|c| Cluster::new(c.rect, c.power))
        .collect()
}

/// Groups overlapping rectangles into clusters.
///
/// A rectangle joins the most recently started cluster whose intersection with it covers more
/// than `overlap` times the larger of the two areas. The cluster geometry is the (truncated)
/// mean of its members. With `overlap >= 1`, every rectangle becomes its own cluster.
pub fn cluster(rects: &[Rect], overlap: f64) -> Vec<Detection> {
    if overlap >= 1.0 {
        return rects.iter().map(|r| Cluster::new(*r, 1)).collect();
    }
    cluster_weighted(rects.iter().map(|r| (*r, 1)), overlap)
}

/// Groups overlapping clusters, weighting each input by its power.
///
/// With `overlap >= 1`, the input is returned unchanged.
pub fn cluster_clusters(clusters: &[Detection], overlap: f64) -> Vec<Detection> {
    if overlap >= 1.0 {
        return clusters.to_vec();
    }
    cluster_weighted(clusters.iter().map(|c| (c.rect, c.power)), overlap)
}

/// Merges every cluster into each larger cluster that fully contains it.
///
/// Clusters are visited by descending area (ties keep their input order). A cluster contained in
/// one or more already accepted clusters adds its power to all of them and is dropped. Otherwise
/// it is accepted. Applying this function to its own output returns the output unchanged.
pub fn merge_included(clusters: &[Detection]) -> Vec<Detection> {
    let mut sorted = clusters.to_vec();
    sorted.sort_by_key(|c| Reverse(c.rect.area()));

    let mut merged: Vec<Detection> = Vec::with_capacity(sorted.len());
    for candidate in sorted {
        let mut included = false;
        for accepted in &mut merged {
            if accepted.rect.contains_rect(&candidate.rect) {
                accepted.power += candidate.power;
                included = true;
            }
        }
        if !included {
            merged.push(candidate);
        }
    }
    merged
}
