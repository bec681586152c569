//! # relief-core
//!
//! Foundation utilities shared by the ReliefLink crates.
//!
//! - **Geospatial math**: [`geo::haversine_mi`], [`geo::clip_by_radius`],
//!   and the best-effort [`geo::wgs84_from_any`] coordinate normalizer
//! - **Text**: [`text::clamp_chars`] for bounded answer strings
//! - **Logging**: [`logging::init`] tracing-subscriber setup
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other relief crates. No network,
//! no I/O, no shared state.

#![deny(unsafe_code)]

pub mod geo;
pub mod logging;
pub mod text;
