//! host.rs
//! Seams to the map-hosting collaborator. `ArcGisHost` is the production
//! implementation; tests plug in an in-memory one.

use async_trait::async_trait;

use crate::error::MapError;
use crate::models::types::{LayerDescriptor, ParkingFeature};

/// What to open: portal, web map item and the caller's credentials.
#[derive(Clone, Debug, PartialEq)]
pub struct MapTarget {
    pub portal_url: String,
    pub web_map_id: String,
    pub token: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureQuery {
    pub where_clause: String,
    pub out_fields: Vec<String>,
    pub return_geometry: bool,
    pub limit: u32,
}

impl FeatureQuery {
    /// Every feature, every field, with geometry.
    pub fn all(limit: u32) -> Self {
        Self { where_clause: "1=1".into(), out_fields: vec!["*".into()], return_geometry: true, limit }
    }
}

#[async_trait]
pub trait MapHost: Send + Sync {
    async fn open(&self, target: &MapTarget) -> Result<Box<dyn MapSession>, MapError>;
}

/// One acquired map. Layers keep the web map's order.
#[async_trait]
pub trait MapSession: Send + Sync {
    fn layers(&self) -> &[LayerDescriptor];

    async fn query(&self, layer: &LayerDescriptor, query: &FeatureQuery) -> Result<Vec<ParkingFeature>, MapError>;

    /// Returns false for an unknown index.
    fn set_visibility(&mut self, index: usize, visible: bool) -> bool;

    fn dispose(&mut self);
}
