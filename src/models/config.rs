//! config.rs
//! Service configuration: portal endpoints, web map, layer URLs and the
//! identity app registration. Every value has a fallback default and can
//! be overridden from the environment.

use std::env;

use crate::error::MapError;

pub const DEFAULT_PORTAL_URL: &str = "https://arcgis.curtin.edu.au/portal";
pub const DEFAULT_WEBMAP_ID: &str = "3402fc5486cf41f2a9e77e4459c1d58c";
pub const DEFAULT_BAY_LAYER_URL: &str =
    "https://arcgis.curtin.edu.au/arcgis/rest/services/Hosted/Park_Aid_Bays/FeatureServer/0";
pub const DEFAULT_UNDER_BAY_LAYER_URL: &str =
    "https://arcgis.curtin.edu.au/arcgis/rest/services/Hosted/Park_Aid_Bays_Under/FeatureServer/0";
pub const DEFAULT_PARKING_LAYER_URL: &str =
    "https://arcgis.curtin.edu.au/arcgis/rest/services/ParKam/ParKam/FeatureServer/4";
pub const DEFAULT_APP_ID: &str = "iE6Peb7aGPZ0U6yo";

/// Web map and layer endpoints.
#[derive(Clone, Debug, PartialEq)]
pub struct ArcGisCfg {
    pub portal_url: String,
    pub web_map_id: String,
    pub bay_layer_url: String,
    pub under_bay_layer_url: String,
    pub parking_layer_url: String,
}

impl Default for ArcGisCfg {
    fn default() -> Self {
        Self {
            portal_url: DEFAULT_PORTAL_URL.into(),
            web_map_id: DEFAULT_WEBMAP_ID.into(),
            bay_layer_url: DEFAULT_BAY_LAYER_URL.into(),
            under_bay_layer_url: DEFAULT_UNDER_BAY_LAYER_URL.into(),
            parking_layer_url: DEFAULT_PARKING_LAYER_URL.into(),
        }
    }
}

impl ArcGisCfg {
    /// A session cannot start without a portal and a web map id.
    pub fn validate(&self) -> Result<(), MapError> {
        if self.portal_url.trim().is_empty() {
            return Err(MapError::ConfigurationMissing("portal url"));
        }
        if self.web_map_id.trim().is_empty() {
            return Err(MapError::ConfigurationMissing("web map id"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthConfig {
    pub portal_url: String,
    pub app_id: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { portal_url: DEFAULT_PORTAL_URL.into(), app_id: DEFAULT_APP_ID.into() }
    }
}

#[derive(Clone, Debug)]
pub struct AppCfg {
    /// HTTP listen address
    pub bind: String,
    /// Static files for the browser map page
    pub web_dir: String,
    pub arcgis: ArcGisCfg,
    pub auth: AuthConfig,
    /// Pre-issued portal token, if any
    pub token: Option<String>,
    /// Max features requested from the parking layer
    pub query_limit: u32,
    /// Initial view (lon, lat)
    pub center: (f64, f64),
    pub zoom: u8,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            web_dir: "web".into(),
            arcgis: ArcGisCfg::default(),
            auth: AuthConfig::default(),
            token: None,
            query_limit: 100,
            center: (115.894, -32.005),
            zoom: 14,
        }
    }
}

impl AppCfg {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Same as `from_env` but reading through `get`. Unset and empty
    /// values keep the default.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let var = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        let mut c = AppCfg::default();
        if let Some(v) = var("BIND") { c.bind = v; }
        if let Some(v) = var("WEB_DIR") { c.web_dir = v; }
        if let Some(v) = var("ARCGIS_PORTAL_URL") {
            c.arcgis.portal_url = v.clone();
            c.auth.portal_url = v;
        }
        if let Some(v) = var("ARCGIS_WEBMAP_ID") { c.arcgis.web_map_id = v; }
        if let Some(v) = var("ARCGIS_BAY_LAYER_URL") { c.arcgis.bay_layer_url = v; }
        if let Some(v) = var("ARCGIS_UNDER_BAY_LAYER_URL") { c.arcgis.under_bay_layer_url = v; }
        if let Some(v) = var("ARCGIS_PARKING_LAYER_URL") { c.arcgis.parking_layer_url = v; }
        if let Some(v) = var("ARCGIS_APP_ID") { c.auth.app_id = v; }
        c.token = var("ARCGIS_TOKEN");
        if let Some(v) = var("PARKING_QUERY_LIMIT") { c.query_limit = v.parse().unwrap_or(c.query_limit); }
        c
    }
}
