//! Hexagonal coverage of a disc by sample points.
//!
//! Points are laid out in concentric hexagonal rings around the center. Ring
//! `i` holds `6 * i` points, each projected from a point of ring `i - 1` along
//! a geodesic with a bearing that is a multiple of 60 degrees. Ring spacing is
//! `sqrt(3) * cell_radius`, so neighbouring cells touch without gaps.

use crate::error::{GeoError, Result};
use geographiclib_rs::{DirectGeodesic, Geodesic, InverseGeodesic};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use scout_core::{Point, ScanLocation, VisitOrder};
use std::ops::Deref;
use tracing::debug;

/// Default cell radius in meters.
pub const DEFAULT_CELL_RADIUS_M: f64 = 70.0;

/// Ordered, immutable list of sample points for one scan cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageSet {
    points: Vec<Point>,
}

impl CoverageSet {
    /// Wrap an already ordered list of points.
    #[must_use]
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// The points in visit order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Return a new set with `order` applied.
    #[must_use]
    pub fn ordered(mut self, order: VisitOrder) -> Self {
        match order {
            VisitOrder::RingOrder => {}
            VisitOrder::Reversed => self.points.reverse(),
            VisitOrder::Shuffled { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                self.points.shuffle(&mut rng);
            }
        }
        self
    }
}

impl Deref for CoverageSet {
    type Target = [Point];

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

impl IntoIterator for CoverageSet {
    type Item = Point;
    type IntoIter = std::vec::IntoIter<Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

/// Computes hexagonal coverage sets on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy)]
pub struct CoverageGenerator {
    cell_radius_m: f64,
}

impl Default for CoverageGenerator {
    fn default() -> Self {
        Self {
            cell_radius_m: DEFAULT_CELL_RADIUS_M,
        }
    }
}

impl CoverageGenerator {
    /// Create a generator with the given cell radius.
    pub fn new(cell_radius_m: f64) -> Result<Self> {
        if !(cell_radius_m.is_finite() && cell_radius_m > 0.0) {
            return Err(GeoError::InvalidArgument(format!(
                "cell radius must be positive, got {cell_radius_m}"
            )));
        }
        Ok(Self { cell_radius_m })
    }

    /// Cell radius in meters.
    #[must_use]
    pub fn cell_radius_m(&self) -> f64 {
        self.cell_radius_m
    }

    /// Distance between neighbouring rings.
    #[must_use]
    pub fn ring_spacing_m(&self) -> f64 {
        3f64.sqrt() * self.cell_radius_m
    }

    /// Generate the coverage of the disc of `radius_m` around `center`.
    ///
    /// Rings are generated until one lies entirely outside the disc; only
    /// points within `radius_m` of the center are kept. The center is always
    /// the first point.
    pub fn generate(&self, center: Point, radius_m: f64) -> Result<CoverageSet> {
        if !(radius_m.is_finite() && radius_m > 0.0) {
            return Err(GeoError::InvalidArgument(format!(
                "radius must be positive, got {radius_m}"
            )));
        }
        if !center.is_complete() {
            return Err(GeoError::InvalidArgument(format!(
                "center {center} has a missing coordinate"
            )));
        }

        let geodesic = Geodesic::wgs84();
        let spacing = self.ring_spacing_m();
        let mut kept = vec![center];
        let mut previous = vec![center];

        for ring in 1usize.. {
            let mut current = Vec::with_capacity(6 * ring);
            let mut any_inside = false;

            for j in 0..6 * ring {
                let source = previous[ring_source_index(ring, j)];
                let bearing = ring_bearing(ring, j);
                let (latitude, longitude): (f64, f64) =
                    geodesic.direct(source.latitude, source.longitude, bearing, spacing);
                let point = Point::new(latitude, longitude, center.altitude);

                let distance: f64 = geodesic.inverse(
                    center.latitude,
                    center.longitude,
                    latitude,
                    longitude,
                );
                if distance <= radius_m {
                    any_inside = true;
                    kept.push(point);
                }
                current.push(point);
            }

            if !any_inside {
                debug!(
                    rings = ring,
                    points = kept.len(),
                    radius_m,
                    "Generated coverage around {center}"
                );
                break;
            }
            previous = current;
        }

        Ok(CoverageSet::from_points(kept))
    }

    /// Cover several locations in one set.
    ///
    /// Locations are covered in reverse order so the most recently added one
    /// is scanned first; `order` is applied to the concatenated result.
    pub fn cover_locations(
        &self,
        locations: &[ScanLocation],
        order: VisitOrder,
    ) -> Result<CoverageSet> {
        let mut points = Vec::new();
        for location in locations.iter().rev() {
            let set = self.generate(location.center(), location.radius_m)?;
            points.extend(set);
        }
        Ok(CoverageSet::from_points(points).ordered(order))
    }
}

/// Index in ring `ring - 1` of the point that point `j` of `ring` is projected from.
fn ring_source_index(ring: usize, j: usize) -> usize {
    j + usize::from(j % ring == 0) - j / ring - 1
}

/// Bearing in degrees from the source point to point `j` of `ring`.
#[allow(clippy::cast_precision_loss)]
fn ring_bearing(ring: usize, j: usize) -> f64 {
    ((j + ring - 1) / ring * 60) as f64
}
