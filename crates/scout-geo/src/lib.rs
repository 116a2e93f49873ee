//! Scout Geo - Geospatial coverage for scan cycles.
//!
//! Turns scan locations (center plus radius) into the ordered list of sample
//! points a scan cycle visits.
//!
//! # Example
//!
//! ```rust
//! use scout_core::Point;
//! use scout_geo::CoverageGenerator;
//!
//! let generator = CoverageGenerator::default();
//! let set = generator.generate(Point::at_ground(48.0, 11.0), 140.0).unwrap();
//! assert_eq!(set.len(), 7);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod coverage;
#[allow(missing_docs)]
pub mod error;

pub use coverage::{CoverageGenerator, CoverageSet, DEFAULT_CELL_RADIUS_M};
pub use error::{GeoError, Result};
pub use scout_core::VisitOrder;
