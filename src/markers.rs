//! markers.rs
//! Turns parking layer features into marker descriptors.
//!
//! Per feature: drop closed or unmonitored lots, resolve and clean the zone
//! name, skip excluded zones, attach occupancy (one record per zone per
//! session), find a display anchor and compose the callout marker. Any
//! rejection just means one marker fewer.
//!
//! Source schemas disagree on attribute naming, so every lookup goes
//! through an ordered key table instead of per-schema branches.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::types::{Coord, Geometry, OccupancyTier, ParkingFeature, ParkingZoneInfo};
use crate::occupancy::OccupancySource;
use crate::sanitize::sanitize;

/// Zones never shown on the map.
pub const EXCLUDED_ZONES: [&str; 2] = ["B418", "PL2"];

/// Zone name candidates, highest priority first.
pub const ZONE_NAME_KEYS: &[&str] = &["Zone", "NAME", "Name", "name", "ZONE", "ID", "OBJECTID"];
pub const STATUS_KEYS: &[&str] = &["status", "Status", "STATUS", "state", "State", "STATE"];
pub const MONITORED_KEYS: &[&str] = &["isMonitored", "IsMonitored", "IS_MONITORED"];
const OBJECT_ID_KEY: &str = "OBJECTID";

/// Why a feature produced no marker. Logged at debug, never surfaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    Closed,
    Unmonitored,
    NoName,
    InvalidName(String),
    Excluded(String),
    NoAnchor,
}

// --------------------------------------
// Attribute lookups
// --------------------------------------

/// Non-empty string, non-zero number or `true`.
fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

pub fn is_closed(attrs: &Map<String, Value>) -> bool {
    STATUS_KEYS.iter().any(|k| {
        attrs.get(*k).and_then(Value::as_str).is_some_and(|s| s.trim().eq_ignore_ascii_case("closed"))
    })
}

/// False only when some monitoring flag explicitly says so (bool or text).
pub fn is_monitored(attrs: &Map<String, Value>) -> bool {
    !MONITORED_KEYS.iter().any(|k| match attrs.get(*k) {
        Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("false"),
        _ => false,
    })
}

/// First present name candidate, else `Zone <OBJECTID>` when the feature
/// at least carries an object id.
pub fn raw_zone_name(attrs: &Map<String, Value>) -> Option<String> {
    ZONE_NAME_KEYS
        .iter()
        .filter_map(|k| attrs.get(*k))
        .find(|v| is_present(v))
        .map(value_text)
        .or_else(|| attrs.get(OBJECT_ID_KEY).filter(|v| !v.is_null()).map(|v| format!("Zone {}", value_text(v))))
}

/// Extent center when the shape has one, the point itself for points.
pub fn anchor(geometry: Option<&Geometry>) -> Option<Coord> {
    let g = geometry?;
    if let Some(e) = g.extent() {
        return Some(e.center());
    }
    match g {
        Geometry::Point(p) if p.x.is_finite() && p.y.is_finite() => Some(*p),
        _ => None,
    }
}

// --------------------------------------
// Marker descriptor
// --------------------------------------

pub const BUBBLE_HEIGHT: f64 = 30.0;
const POINTER: f64 = 8.0;
const BADGE_SIZE: f64 = 20.0;
const FONT: &str = "Arial";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Outline {
    pub color: &'static str,
    pub width: f64,
}

/// Speech-bubble background, sized to the longer text line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Callout {
    pub path: String,
    pub width: f64,
    pub height: f64,
    pub fill: &'static str,
    pub outline: Outline,
    pub x_offset: f64,
    pub y_offset: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Badge {
    pub color: &'static str,
    pub size: f64,
    pub outline: Outline,
    pub x_offset: f64,
    pub y_offset: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Center,
    Left,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextLabel {
    pub text: String,
    pub color: &'static str,
    pub font_family: &'static str,
    pub font_size: f64,
    pub bold: bool,
    pub align: Align,
    pub x_offset: f64,
    pub y_offset: f64,
}

/// Payload of the on-click detail popup.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerDetail {
    pub zone: String,
    pub vacant: u32,
    pub total: u32,
    pub vacant_percentage: u8,
    pub status: &'static str,
    pub last_updated: DateTime<Utc>,
}

/// Everything a renderer needs to draw one marker group.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerDescriptor {
    pub anchor: Coord,
    pub tier: OccupancyTier,
    pub callout: Callout,
    pub badge: Badge,
    /// Badge letter, zone name, percentage
    pub labels: [TextLabel; 3],
    pub detail: MarkerDetail,
}

pub fn percent_text(pct: u8) -> String { format!("{pct}% free") }

fn bubble_path(w: f64, h: f64) -> String {
    format!(
        "M 5 5 L {a} 5 Q {w} 5 {w} 10 L {w} {b} Q {w} {h} {a} {h} L 20 {h} L 15 {p} L 10 {h} L 10 {h} Q 5 {h} 5 {b} L 5 10 Q 5 5 10 5 Z",
        a = w - 5.0,
        b = h - 5.0,
        p = h + POINTER,
    )
}

impl MarkerDescriptor {
    pub fn compose(anchor: Coord, info: &ParkingZoneInfo) -> Self {
        let tier = info.tier();
        let color = tier.color();
        let pct = percent_text(info.vacant_percentage);

        let zone_w = info.zone.chars().count() as f64 * 7.0;
        let pct_w = pct.chars().count() as f64 * 6.0;
        let width = zone_w.max(pct_w) + 20.0;
        let h = BUBBLE_HEIGHT;
        let mid = (h + POINTER) / 2.0;

        let callout = Callout {
            path: bubble_path(width, h),
            width,
            height: h,
            fill: "white",
            outline: Outline { color: "#ddd", width: 1.0 },
            x_offset: width / 2.0 - 15.0,
            y_offset: mid,
        };
        let badge = Badge {
            color,
            size: BADGE_SIZE,
            outline: Outline { color: "white", width: 2.0 },
            x_offset: 0.0,
            y_offset: (h + 19.0) / 2.0,
        };
        let labels = [
            TextLabel {
                text: "P".into(), color: "white", font_family: FONT, font_size: 12.0, bold: true,
                align: Align::Center, x_offset: 0.0, y_offset: mid + 1.0,
            },
            TextLabel {
                text: info.zone.clone(), color: "#2d3748", font_family: FONT, font_size: 10.0, bold: true,
                align: Align::Left, x_offset: 13.0, y_offset: mid + 6.0,
            },
            TextLabel {
                text: pct, color: "#718096", font_family: FONT, font_size: 9.0, bold: false,
                align: Align::Left, x_offset: 13.0, y_offset: mid - 6.0,
            },
        ];
        let detail = MarkerDetail {
            zone: info.zone.clone(),
            vacant: info.vacant,
            total: info.total,
            vacant_percentage: info.vacant_percentage,
            status: tier.status_label(),
            last_updated: info.last_updated,
        };

        Self { anchor, tier, callout, badge, labels, detail }
    }
}

// --------------------------------------
// Builder
// --------------------------------------

/// Builds markers for one map session. Zone records are created lazily and
/// shared by every feature with the same zone name.
pub struct MarkerBuilder<'s> {
    source: &'s mut dyn OccupancySource,
    excluded: Vec<String>,
    zones: HashMap<String, ParkingZoneInfo>,
    order: Vec<String>,
}

impl<'s> MarkerBuilder<'s> {
    pub fn new(source: &'s mut dyn OccupancySource) -> Self {
        Self {
            source,
            excluded: EXCLUDED_ZONES.iter().map(|z| z.to_string()).collect(),
            zones: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn with_exclusions(mut self, excluded: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded = excluded.into_iter().map(Into::into).collect();
        self
    }

    /// Validated, cleaned zone name for a feature.
    pub fn zone_for(&self, attrs: &Map<String, Value>) -> Result<String, RejectReason> {
        if is_closed(attrs) { return Err(RejectReason::Closed); }
        if !is_monitored(attrs) { return Err(RejectReason::Unmonitored); }
        let raw = raw_zone_name(attrs).ok_or(RejectReason::NoName)?;
        let zone = sanitize(&raw);
        if zone.chars().count() < 2 || zone == "undefined" || zone == "null" {
            return Err(RejectReason::InvalidName(zone));
        }
        if self.excluded.iter().any(|z| *z == zone) {
            return Err(RejectReason::Excluded(zone));
        }
        Ok(zone)
    }

    fn info_for(&mut self, zone: &str) -> &ParkingZoneInfo {
        if !self.zones.contains_key(zone) {
            let info = self.source.zone_info(zone);
            self.order.push(zone.to_string());
            self.zones.insert(zone.to_string(), info);
        }
        &self.zones[zone]
    }

    pub fn marker_for(&mut self, feature: &ParkingFeature) -> Result<MarkerDescriptor, RejectReason> {
        let zone = self.zone_for(&feature.attributes)?;
        let info = self.info_for(&zone).clone();
        let at = anchor(feature.geometry.as_ref()).ok_or(RejectReason::NoAnchor)?;
        Ok(MarkerDescriptor::compose(at, &info))
    }

    pub fn build(&mut self, features: &[ParkingFeature]) -> Vec<MarkerDescriptor> {
        let mut out = Vec::with_capacity(features.len());
        for (i, f) in features.iter().enumerate() {
            match self.marker_for(f) {
                Ok(m) => out.push(m),
                Err(reason) => debug!(feature = i, ?reason, "feature skipped"),
            }
        }
        out
    }

    pub fn zone(&self, name: &str) -> Option<&ParkingZoneInfo> { self.zones.get(name) }

    /// Zone records in first-seen order.
    pub fn into_zones(mut self) -> Vec<ParkingZoneInfo> {
        self.order.iter().filter_map(|z| self.zones.remove(z)).collect()
    }
}
