//! # Layer Planner
//!
//! Per-layer path planner for a 3D-printing slicer: given one layer's
//! geometry and a machine/material profile, produces an ordered sequence of
//! travel, extrusion, retraction, fan and tool-change moves, then drives an
//! output sink to serialize them.
//!
//! The planner itself ([`queue::Planner`]) is the core; [`core::router`]
//! (inside-boundary routing) and [`core::optimizer`] (traversal order) feed
//! it, and [`emit`] drains a finished layer. Geometry, configs and records
//! live in the sibling `path-types` crate; machine/material settings live in
//! `print-profile`.

pub mod core;
pub mod emit;
pub mod error;
pub mod queue;

pub use core::optimizer::{order_polygons, OptimizedOrder};
pub use core::router::{RouteResult, Router, VisibilityRouter};
pub use emit::{Sink, TextGcodeSink};
pub use error::{PlannerError, Result};
pub use queue::{fan_floor_percent, Planner};
