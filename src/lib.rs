//! parkam
//! Parking availability map backed by an ArcGIS Enterprise portal: web map
//! session lifecycle, layer classification, per-zone occupancy markers and
//! portal sign-in state, served over HTTP by the `parkam` binary.

pub mod arcgis;
pub mod classify;
pub mod error;
pub mod guard;
pub mod host;
pub mod identity;
pub mod markers;
pub mod models;
pub mod occupancy;
pub mod render;
pub mod sanitize;
pub mod server;
pub mod session;
