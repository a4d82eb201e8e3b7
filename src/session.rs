//! session.rs
//! Mount/unmount lifecycle of the parking map.
//!
//! A mount claims the `SessionGuard`, opens the web map, classifies its
//! layers, queries the parking layer and builds the markers. Every step
//! after a suspension point checks the instance's liveness flag; once the
//! instance is unmounted its results are dropped and the session disposed.
//! Failures end in a rendered error state, never in a failed mount.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::classify::{LayerClassifier, LayerRole};
use crate::error::MapError;
use crate::guard::{Claim, SessionGuard};
use crate::host::{FeatureQuery, MapHost, MapSession, MapTarget};
use crate::markers::{MarkerBuilder, MarkerDescriptor};
use crate::models::config::AppCfg;
use crate::models::types::{LayerDescriptor, ParkingStatistics, ParkingZoneInfo};
use crate::occupancy::OccupancySource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapStatus {
    Unmounted,
    Loading,
    Ready,
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct LayerView {
    pub title: String,
    pub url: String,
    pub role: LayerRole,
    pub visible: bool,
}

/// What the browser page renders.
#[derive(Clone, Debug, Serialize)]
pub struct MapView {
    pub instance: Option<Uuid>,
    /// Loading overlay goes away once this is set, error or not
    pub ready: bool,
    pub error: Option<String>,
    pub center: (f64, f64),
    pub zoom: u8,
    pub layers: Vec<LayerView>,
    pub bays_visible: bool,
    pub parking_layer: Option<String>,
    pub markers: Vec<MarkerDescriptor>,
    pub zones: Vec<ParkingZoneInfo>,
}

impl MapView {
    fn empty(cfg: &AppCfg) -> Self {
        Self {
            instance: None,
            ready: false,
            error: None,
            center: cfg.center,
            zoom: cfg.zoom,
            layers: Vec::new(),
            bays_visible: true,
            parking_layer: None,
            markers: Vec::new(),
            zones: Vec::new(),
        }
    }

    pub fn status(&self) -> MapStatus {
        match (self.instance, self.ready, &self.error) {
            (None, _, _) => MapStatus::Unmounted,
            (_, false, _) => MapStatus::Loading,
            (_, true, Some(_)) => MapStatus::Error,
            (_, true, None) => MapStatus::Ready,
        }
    }

    pub fn statistics(&self) -> ParkingStatistics { ParkingStatistics::from_zones(&self.zones) }

    pub fn bay_toggle_label(&self) -> &'static str {
        if self.bays_visible { "Hide Bays" } else { "Show Bays" }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountOutcome {
    /// Another instance holds the guard
    Skipped,
    Ready(Uuid),
    /// Acquisition failed; the error view is up
    Failed(Uuid),
    /// Unmounted while bootstrapping; results dropped
    Abandoned(Uuid),
}

struct Instance {
    claim: Claim,
    alive: Arc<AtomicBool>,
    session: Option<Box<dyn MapSession>>,
    bay_indices: Vec<usize>,
}

struct Loaded {
    session: Box<dyn MapSession>,
    layers: Vec<LayerView>,
    bay_indices: Vec<usize>,
    parking_layer: Option<String>,
    markers: Vec<MarkerDescriptor>,
    zones: Vec<ParkingZoneInfo>,
}

pub struct MapController {
    cfg: AppCfg,
    host: Arc<dyn MapHost>,
    guard: Arc<SessionGuard>,
    occupancy: Mutex<Box<dyn OccupancySource>>,
    classifier: LayerClassifier,
    instance: Mutex<Option<Instance>>,
    view: RwLock<MapView>,
}

impl MapController {
    pub fn new(
        cfg: AppCfg,
        host: Arc<dyn MapHost>,
        guard: Arc<SessionGuard>,
        occupancy: Box<dyn OccupancySource>,
    ) -> Self {
        let classifier = LayerClassifier::new(&cfg.arcgis);
        let view = RwLock::new(MapView::empty(&cfg));
        Self { cfg, host, guard, occupancy: Mutex::new(occupancy), classifier, instance: Mutex::new(None), view }
    }

    pub fn guard(&self) -> &SessionGuard { &self.guard }

    pub async fn view(&self) -> MapView { self.view.read().await.clone() }

    /// Applies `f` to the view unless the instance has been unmounted.
    async fn apply(&self, alive: &AtomicBool, f: impl FnOnce(&mut MapView)) -> bool {
        let mut v = self.view.write().await;
        if !alive.load(Ordering::SeqCst) { return false; }
        f(&mut v);
        true
    }

    pub async fn mount(&self, token: Option<String>) -> MountOutcome {
        let alive = Arc::new(AtomicBool::new(true));
        let id = {
            let mut slot = self.instance.lock();
            let Some(claim) = self.guard.try_acquire() else { return MountOutcome::Skipped };
            let id = claim.id();
            *slot = Some(Instance { claim, alive: alive.clone(), session: None, bay_indices: Vec::new() });
            id
        };

        let fresh = MapView { instance: Some(id), ..MapView::empty(&self.cfg) };
        self.apply(&alive, |v| *v = fresh).await;

        match self.bootstrap(token, &alive).await {
            Ok(Some(loaded)) => self.finish(id, &alive, loaded).await,
            Ok(None) => MountOutcome::Abandoned(id),
            Err(e) => {
                warn!("map initialization failed: {e}");
                if let Some(inst) = self.instance.lock().as_ref().filter(|i| i.claim.id() == id) {
                    self.guard.mark_failed(&inst.claim);
                }
                let msg = e.user_message();
                let applied = self.apply(&alive, |v| { v.error = Some(msg); v.ready = true; }).await;
                if applied { MountOutcome::Failed(id) } else { MountOutcome::Abandoned(id) }
            }
        }
    }

    async fn bootstrap(&self, token: Option<String>, alive: &AtomicBool) -> Result<Option<Loaded>, MapError> {
        self.cfg.arcgis.validate()?;
        let target = MapTarget {
            portal_url: self.cfg.arcgis.portal_url.clone(),
            web_map_id: self.cfg.arcgis.web_map_id.clone(),
            token,
        };
        let mut session = self.host.open(&target).await?;
        if !alive.load(Ordering::SeqCst) {
            session.dispose();
            return Ok(None);
        }

        let all = session.layers().to_vec();
        let roles = self.classifier.roles(&all);
        let bay_indices: Vec<usize> =
            all.iter().enumerate().filter(|(_, l)| self.classifier.is_bay_layer(l)).map(|(i, _)| i).collect();
        info!(layers = all.len(), bays = bay_indices.len(), "layers classified");

        let layers = all
            .iter()
            .zip(&roles)
            .map(|(l, role)| LayerView { title: l.title.clone(), url: l.url.clone(), role: *role, visible: l.visible })
            .collect();

        let parking = self.classifier.parking_layer(&all).map(|(l, rule)| {
            info!(title = %l.title, url = %l.url, ?rule, "parking layer selected");
            l.clone()
        });
        let (markers, zones) = match &parking {
            Some(layer) => self.load_markers(session.as_ref(), layer).await,
            None => {
                warn!("{}", MapError::LayerNotFound);
                (Vec::new(), Vec::new())
            }
        };
        if !alive.load(Ordering::SeqCst) {
            session.dispose();
            return Ok(None);
        }

        Ok(Some(Loaded {
            session,
            layers,
            bay_indices,
            parking_layer: parking.map(|l| l.title),
            markers,
            zones,
        }))
    }

    async fn load_markers(
        &self,
        session: &dyn MapSession,
        layer: &LayerDescriptor,
    ) -> (Vec<MarkerDescriptor>, Vec<ParkingZoneInfo>) {
        let features = match session.query(layer, &FeatureQuery::all(self.cfg.query_limit)).await {
            Ok(f) => f,
            Err(e) => {
                warn!("parking layer query failed: {e}");
                return (Vec::new(), Vec::new());
            }
        };
        let mut source = self.occupancy.lock();
        let mut builder = MarkerBuilder::new(source.as_mut());
        let markers = builder.build(&features);
        info!(features = features.len(), markers = markers.len(), "parking markers built");
        (markers, builder.into_zones())
    }

    async fn finish(&self, id: Uuid, alive: &AtomicBool, loaded: Loaded) -> MountOutcome {
        let Loaded { mut session, layers, bay_indices, parking_layer, markers, zones } = loaded;
        {
            let mut slot = self.instance.lock();
            match slot.as_mut() {
                Some(inst) if inst.claim.id() == id && alive.load(Ordering::SeqCst) => {
                    self.guard.mark_ready(&inst.claim);
                    inst.session = Some(session);
                    inst.bay_indices = bay_indices;
                }
                _ => {
                    session.dispose();
                    return MountOutcome::Abandoned(id);
                }
            }
        }
        let applied = self
            .apply(alive, |v| {
                v.layers = layers;
                v.parking_layer = parking_layer;
                v.markers = markers;
                v.zones = zones;
                v.ready = true;
            })
            .await;
        if applied { MountOutcome::Ready(id) } else { MountOutcome::Abandoned(id) }
    }

    /// Tears the current instance down. Returns false when nothing is mounted.
    pub async fn unmount(&self) -> bool {
        let taken = self.instance.lock().take();
        let Some(mut inst) = taken else { return false };
        inst.alive.store(false, Ordering::SeqCst);
        if let Some(mut s) = inst.session.take() {
            s.dispose();
        }
        let id = inst.claim.id();
        self.guard.release(inst.claim);
        let mut v = self.view.write().await;
        if v.instance == Some(id) {
            *v = MapView::empty(&self.cfg);
        }
        true
    }

    /// Flips every bay layer at once. Returns the new visibility. Until the
    /// map is ready there are no bay layers and nothing changes.
    pub async fn toggle_bays(&self) -> bool {
        let mut v = self.view.write().await;
        if v.status() != MapStatus::Ready {
            return v.bays_visible;
        }
        let visible = !v.bays_visible;
        v.bays_visible = visible;
        if let Some(inst) = self.instance.lock().as_mut() {
            let indices = inst.bay_indices.clone();
            if let Some(s) = inst.session.as_mut() {
                for i in indices {
                    s.set_visibility(i, visible);
                    if let Some(l) = v.layers.get_mut(i) { l.visible = visible; }
                }
            }
        }
        visible
    }
}
