//! model.rs
//! Wire shapes of the portal REST API and their conversion into the
//! crate's layer and feature types.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::types::{Coord, Extent, Geometry, LayerDescriptor, LayerType, ParkingFeature};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebMapData {
    #[serde(default)]
    pub operational_layers: Vec<OperationalLayer>,
}

fn visible_by_default() -> bool { true }

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationalLayer {
    #[serde(default)]
    pub layer_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "visible_by_default")]
    pub visibility: bool,
    /// Children of a group layer
    #[serde(default)]
    pub layers: Vec<OperationalLayer>,
}

impl WebMapData {
    /// Operational layers in drawing order, group layers flattened in place.
    pub fn layer_descriptors(&self) -> Vec<LayerDescriptor> {
        fn walk(layers: &[OperationalLayer], out: &mut Vec<LayerDescriptor>) {
            for l in layers {
                out.push(LayerDescriptor {
                    kind: LayerType::from_web_map(&l.layer_type),
                    url: l.url.clone().unwrap_or_default(),
                    title: l.title.clone().unwrap_or_default(),
                    visible: l.visibility,
                });
                walk(&l.layers, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.operational_layers, &mut out);
        out
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
pub struct RawFeature {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<RawGeometry>,
}

/// Esri JSON geometry. Variant order matters: a point matches any object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawGeometry {
    Polygon { rings: Vec<Vec<Vec<f64>>> },
    Polyline { paths: Vec<Vec<Vec<f64>>> },
    Envelope { xmin: f64, ymin: f64, xmax: f64, ymax: f64 },
    Point { x: Option<f64>, y: Option<f64> },
}

fn parts(raw: &[Vec<Vec<f64>>]) -> Vec<Vec<Coord>> {
    raw.iter()
        .map(|part| part.iter().filter(|p| p.len() >= 2).map(|p| Coord::new(p[0], p[1])).collect())
        .collect()
}

impl RawGeometry {
    pub fn into_geometry(self) -> Option<Geometry> {
        match self {
            RawGeometry::Polygon { rings } => Some(Geometry::Polygon(parts(&rings))),
            RawGeometry::Polyline { paths } => Some(Geometry::Polyline(parts(&paths))),
            RawGeometry::Envelope { xmin, ymin, xmax, ymax } => {
                Some(Geometry::Envelope(Extent { xmin, ymin, xmax, ymax }))
            }
            RawGeometry::Point { x: Some(x), y: Some(y) } => Some(Geometry::Point(Coord::new(x, y))),
            RawGeometry::Point { .. } => None,
        }
    }
}

impl From<RawFeature> for ParkingFeature {
    fn from(f: RawFeature) -> Self {
        ParkingFeature {
            attributes: f.attributes,
            geometry: f.geometry.and_then(RawGeometry::into_geometry),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}
