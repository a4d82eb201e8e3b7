//! types.rs
//! Shared data model: features coming back from the portal, layer
//! descriptors, per-zone occupancy records, tiers and statistics.

use chrono::{DateTime, Utc};
use geo::{BoundingRect, Coord as GeoCoord, MultiPoint, Point};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Map-space coordinate (lon/lat when queried with `outSR=4326`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn center(&self) -> Coord {
        Coord::new((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }
}

/// Feature geometry as returned by a layer query.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Coord),
    Polygon(Vec<Vec<Coord>>),
    Polyline(Vec<Vec<Coord>>),
    Envelope(Extent),
}

impl Geometry {
    /// Bounding extent of the shape. Points have none, same as the portal's
    /// own geometry model.
    pub fn extent(&self) -> Option<Extent> {
        match self {
            Geometry::Point(_) => None,
            Geometry::Envelope(e) => Some(*e),
            Geometry::Polygon(parts) | Geometry::Polyline(parts) => {
                let pts: MultiPoint<f64> = parts
                    .iter()
                    .flatten()
                    .filter(|c| c.x.is_finite() && c.y.is_finite())
                    .map(|c| Point::from(GeoCoord { x: c.x, y: c.y }))
                    .collect();
                let rect = pts.bounding_rect()?;
                Some(Extent {
                    xmin: rect.min().x,
                    ymin: rect.min().y,
                    xmax: rect.max().x,
                    ymax: rect.max().y,
                })
            }
        }
    }
}

/// One record of a parking layer query. Attribute names are whatever the
/// upstream schema uses; see `markers::ZONE_NAME_KEYS` and friends.
#[derive(Clone, Debug, Default)]
pub struct ParkingFeature {
    pub attributes: Map<String, Value>,
    pub geometry: Option<Geometry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerType {
    Feature,
    Tile,
    VectorTile,
    MapImage,
    Other,
}

impl LayerType {
    /// Maps a web map `layerType` value onto our layer kinds.
    pub fn from_web_map(layer_type: &str) -> Self {
        match layer_type {
            "ArcGISFeatureLayer" => LayerType::Feature,
            "ArcGISTiledMapServiceLayer" | "ArcGISTiledImageServiceLayer" => LayerType::Tile,
            "VectorTileLayer" => LayerType::VectorTile,
            "ArcGISMapServiceLayer" => LayerType::MapImage,
            _ => LayerType::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerDescriptor {
    #[serde(rename = "type")]
    pub kind: LayerType,
    pub url: String,
    pub title: String,
    pub visible: bool,
}

impl LayerDescriptor {
    pub fn feature(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self { kind: LayerType::Feature, url: url.into(), title: title.into(), visible: true }
    }

    pub fn is_feature(&self) -> bool { self.kind == LayerType::Feature }
}

/// Occupancy figures for one zone during a map session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParkingZoneInfo {
    pub zone: String,
    pub vacant: u32,
    pub total: u32,
    pub vacant_percentage: u8,
    pub last_updated: DateTime<Utc>,
}

impl ParkingZoneInfo {
    /// Builds a record, clamping `vacant` into `0..=total`.
    pub fn new(zone: impl Into<String>, vacant: u32, total: u32, last_updated: DateTime<Utc>) -> Self {
        let vacant = vacant.min(total);
        Self {
            zone: zone.into(),
            vacant,
            total,
            vacant_percentage: vacancy_percentage(vacant, total),
            last_updated,
        }
    }

    pub fn tier(&self) -> OccupancyTier { OccupancyTier::from_percentage(self.vacant_percentage) }
}

/// `round(vacant / total * 100)`, 0 for an empty lot.
pub fn vacancy_percentage(vacant: u32, total: u32) -> u8 {
    if total == 0 { return 0; }
    ((vacant as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OccupancyTier {
    Plenty,
    Limited,
    AlmostFull,
    /// Legend only, never assigned to an active marker.
    Closed,
}

impl OccupancyTier {
    pub const ALL: [OccupancyTier; 4] =
        [OccupancyTier::Plenty, OccupancyTier::Limited, OccupancyTier::AlmostFull, OccupancyTier::Closed];

    pub fn from_percentage(pct: u8) -> Self {
        if pct >= 50 { OccupancyTier::Plenty }
        else if pct >= 20 { OccupancyTier::Limited }
        else { OccupancyTier::AlmostFull }
    }

    pub fn color(self) -> &'static str {
        match self {
            OccupancyTier::Plenty => "#10B981",
            OccupancyTier::Limited => "#F59E0B",
            OccupancyTier::AlmostFull => "#EF4444",
            OccupancyTier::Closed => "#6B7280",
        }
    }

    pub fn legend_label(self) -> &'static str {
        match self {
            OccupancyTier::Plenty => "Plenty of parking",
            OccupancyTier::Limited => "Limited parking",
            OccupancyTier::AlmostFull => "Almost full",
            OccupancyTier::Closed => "Lot closed",
        }
    }

    /// Qualitative status shown in the detail popup.
    pub fn status_label(self) -> &'static str {
        match self {
            OccupancyTier::Plenty => "Plenty Available",
            OccupancyTier::Limited => "Limited Spaces",
            OccupancyTier::AlmostFull => "Almost Full",
            OccupancyTier::Closed => "Closed",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LegendItem {
    pub tier: OccupancyTier,
    pub color: &'static str,
    pub label: &'static str,
}

pub fn legend() -> Vec<LegendItem> {
    OccupancyTier::ALL
        .iter()
        .map(|&tier| LegendItem { tier, color: tier.color(), label: tier.legend_label() })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParkingStatistics {
    pub total_spaces: u64,
    pub total_occupied: u64,
    pub total_available: u64,
    pub overall_percentage: u8,
}

impl ParkingStatistics {
    pub fn from_zones<'a>(zones: impl IntoIterator<Item = &'a ParkingZoneInfo>) -> Self {
        let (mut spaces, mut occupied) = (0u64, 0u64);
        for z in zones {
            spaces += z.total as u64;
            occupied += z.total.saturating_sub(z.vacant) as u64;
        }
        let available = spaces - occupied;
        let overall_percentage = if spaces > 0 {
            ((available as f64 / spaces as f64) * 100.0).round() as u8
        } else { 0 };
        Self { total_spaces: spaces, total_occupied: occupied, total_available: available, overall_percentage }
    }
}
