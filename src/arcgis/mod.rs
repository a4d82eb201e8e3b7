//! arcgis
//! `MapHost` over the ArcGIS REST API: portal description, web map item
//! data and feature layer queries.

pub mod fetch;
pub mod model;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use crate::error::{FailureKind, MapError};
use crate::host::{FeatureQuery, MapHost, MapSession, MapTarget};
use crate::models::types::{LayerDescriptor, ParkingFeature};

use fetch::{get_as, get_json, FetchError};
use model::{QueryResponse, WebMapData};

fn acquisition_error(e: FetchError) -> MapError {
    match e.kind() {
        FailureKind::Connectivity => MapError::connectivity(e.to_string()),
        FailureKind::Generic => MapError::generic(e.to_string()),
    }
}

/// `https://host/portal/` + `sharing/rest/...`, tolerating trailing slashes.
pub fn sharing_url(portal_url: &str, path: &str) -> Result<Url, MapError> {
    let base = format!("{}/", portal_url.trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|u| u.join(&format!("sharing/rest/{}", path.trim_start_matches('/'))))
        .map_err(|e| MapError::generic(format!("invalid portal url {portal_url}: {e}")))
}

#[derive(Clone)]
pub struct ArcGisHost {
    client: Client,
}

impl ArcGisHost {
    pub fn new(client: Client) -> Self { Self { client } }
}

#[async_trait]
impl MapHost for ArcGisHost {
    async fn open(&self, target: &MapTarget) -> Result<Box<dyn MapSession>, MapError> {
        let token = target.token.as_deref();

        // Portal description is optional, the web map can load without it
        let portal_self = sharing_url(&target.portal_url, "portals/self")?;
        if let Err(e) = get_json(&self.client, portal_self.as_str(), &[], token).await {
            debug!("portal self-description unavailable: {e}");
        }

        let item = sharing_url(&target.portal_url, &format!("content/items/{}/data", target.web_map_id))?;
        let layers = match get_as::<WebMapData>(&self.client, item.as_str(), &[], token).await {
            Ok(data) => data.layer_descriptors(),
            Err(e) if e.kind() == FailureKind::Connectivity => return Err(acquisition_error(e)),
            Err(e) => {
                warn!("web map {} failed to load, using empty base map: {e}", target.web_map_id);
                Vec::new()
            }
        };
        info!(web_map = %target.web_map_id, layers = layers.len(), "web map loaded");

        Ok(Box::new(ArcGisSession {
            client: self.client.clone(),
            token: target.token.clone(),
            layers,
            disposed: false,
        }))
    }
}

pub struct ArcGisSession {
    client: Client,
    token: Option<String>,
    layers: Vec<LayerDescriptor>,
    disposed: bool,
}

#[async_trait]
impl MapSession for ArcGisSession {
    fn layers(&self) -> &[LayerDescriptor] { &self.layers }

    async fn query(&self, layer: &LayerDescriptor, q: &FeatureQuery) -> Result<Vec<ParkingFeature>, MapError> {
        if self.disposed {
            return Err(MapError::Query("session disposed".into()));
        }
        if layer.url.is_empty() {
            return Err(MapError::Query(format!("layer '{}' has no service url", layer.title)));
        }
        let url = format!("{}/query", layer.url.trim_end_matches('/'));
        let params = [
            ("where", q.where_clause.clone()),
            ("outFields", q.out_fields.join(",")),
            ("returnGeometry", q.return_geometry.to_string()),
            ("resultRecordCount", q.limit.to_string()),
            ("outSR", "4326".to_string()),
        ];
        let resp: QueryResponse = get_as(&self.client, &url, &params, self.token.as_deref())
            .await
            .map_err(|e| MapError::Query(e.to_string()))?;
        Ok(resp.features.into_iter().map(ParkingFeature::from).collect())
    }

    fn set_visibility(&mut self, index: usize, visible: bool) -> bool {
        match self.layers.get_mut(index) {
            Some(l) => { l.visible = visible; true }
            None => false,
        }
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.layers.clear();
    }
}
