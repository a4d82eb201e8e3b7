//! In-memory map host shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use parkam::error::MapError;
use parkam::guard::SessionGuard;
use parkam::host::{FeatureQuery, MapHost, MapSession, MapTarget};
use parkam::models::config::AppCfg;
use parkam::models::types::{Coord, Geometry, LayerDescriptor, ParkingFeature};
use parkam::occupancy::FixedOccupancy;
use parkam::session::MapController;

#[derive(Default)]
pub struct Calls {
    pub opens: AtomicUsize,
    pub disposals: AtomicUsize,
    pub queries: Mutex<Vec<(String, FeatureQuery)>>,
    pub tokens: Mutex<Vec<Option<String>>>,
}

pub struct MemoryHost {
    pub layers: Vec<LayerDescriptor>,
    pub features: Vec<ParkingFeature>,
    pub open_error: Option<fn() -> MapError>,
    pub calls: Arc<Calls>,
}

impl MemoryHost {
    pub fn new(layers: Vec<LayerDescriptor>, features: Vec<ParkingFeature>) -> Self {
        Self { layers, features, open_error: None, calls: Arc::new(Calls::default()) }
    }
}

struct MemorySession {
    layers: Vec<LayerDescriptor>,
    features: Vec<ParkingFeature>,
    calls: Arc<Calls>,
}

#[async_trait]
impl MapHost for MemoryHost {
    async fn open(&self, target: &MapTarget) -> Result<Box<dyn MapSession>, MapError> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        self.calls.tokens.lock().push(target.token.clone());
        if let Some(make) = self.open_error {
            return Err(make());
        }
        Ok(Box::new(MemorySession {
            layers: self.layers.clone(),
            features: self.features.clone(),
            calls: self.calls.clone(),
        }))
    }
}

#[async_trait]
impl MapSession for MemorySession {
    fn layers(&self) -> &[LayerDescriptor] { &self.layers }

    async fn query(&self, layer: &LayerDescriptor, q: &FeatureQuery) -> Result<Vec<ParkingFeature>, MapError> {
        self.calls.queries.lock().push((layer.url.clone(), q.clone()));
        Ok(self.features.clone())
    }

    fn set_visibility(&mut self, index: usize, visible: bool) -> bool {
        match self.layers.get_mut(index) {
            Some(l) => { l.visible = visible; true }
            None => false,
        }
    }

    fn dispose(&mut self) {
        self.calls.disposals.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn feature(attrs: Value, geometry: Option<Geometry>) -> ParkingFeature {
    ParkingFeature { attributes: attrs.as_object().cloned().unwrap_or_default(), geometry }
}

pub fn square(x0: f64, y0: f64, side: f64) -> Geometry {
    Geometry::Polygon(vec![vec![
        Coord::new(x0, y0),
        Coord::new(x0 + side, y0),
        Coord::new(x0 + side, y0 + side),
        Coord::new(x0, y0 + side),
        Coord::new(x0, y0),
    ]])
}

pub fn parking_layer(cfg: &AppCfg) -> LayerDescriptor {
    LayerDescriptor::feature(cfg.arcgis.parking_layer_url.clone(), "Parking Lots")
}

pub fn bay_layer(cfg: &AppCfg) -> LayerDescriptor {
    LayerDescriptor::feature(cfg.arcgis.bay_layer_url.clone(), "Bays")
}

pub fn controller(cfg: AppCfg, host: MemoryHost, occupancy: FixedOccupancy) -> MapController {
    MapController::new(cfg, Arc::new(host), Arc::new(SessionGuard::new()), Box::new(occupancy))
}
