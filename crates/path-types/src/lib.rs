//! # Path Types
//!
//! Shared geometry, path-configuration and path-record types for the layer
//! path planner. These types are the contract between the planner (which
//! builds up `PathRecord`s) and anything consuming them: an emitter, a
//! test, or a downstream G-code dialect writer.
//!
//! ## Modules
//!
//! - [`geometry`]: integer-micrometre points, polygons, arclength and trim.
//! - [`config`]: `PathConfig`, the immutable per-role path bundle, compared
//!   by identity via [`config::ConfigRef`].
//! - [`record`]: `PathRecord`, the mutable-until-sealed unit the planner
//!   queues, and the `RetractLevel` lattice.

pub mod config;
pub mod geometry;
pub mod record;

pub use config::{ConfigRef, PathConfig};
pub use geometry::{polygon_length, trim, IntPoint, Polygon, PolygonSet};
pub use record::{PathRecord, RetractLevel};
