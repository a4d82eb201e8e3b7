//! render.rs
//! Rendering adapter for marker descriptors: a GeoJSON FeatureCollection
//! for the browser map (one point feature per marker group, style parts
//! and detail in the properties) and the popup HTML fragment.

use geojson::{Feature, FeatureCollection, GeoJson, Geometry as GjGeometry, JsonObject, Value as GjValue};
use serde_json::{json, Value};

use crate::markers::{percent_text, MarkerDescriptor, MarkerDetail};

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn popup_title(detail: &MarkerDetail) -> String {
    format!("{} Parking", detail.zone)
}

/// Detail popup body for a marker.
pub fn popup_html(detail: &MarkerDetail, color: &str) -> String {
    format!(
        concat!(
            r#"<div style="padding: 10px;">"#,
            r#"<div style="margin-bottom: 8px;"><strong>Availability:</strong> {pct}</div>"#,
            r#"<div style="margin-bottom: 8px;"><strong>Spaces:</strong> {vacant} available out of {total} total</div>"#,
            r#"<div style="margin-bottom: 8px;"><strong>Status:</strong> "#,
            r#"<span style="color: {color}; font-weight: bold;">{status}</span></div>"#,
            r#"<div style="font-size: 12px; color: #666;">Last updated: {ts}</div>"#,
            r#"</div>"#,
        ),
        pct = percent_text(detail.vacant_percentage),
        vacant = detail.vacant,
        total = detail.total,
        color = color,
        status = escape(detail.status),
        ts = detail.last_updated.format("%H:%M:%S"),
    )
}

fn marker_feature(m: &MarkerDescriptor) -> Feature {
    let mut props = JsonObject::new();
    props.insert("zone".into(), json!(m.detail.zone));
    props.insert("tier".into(), json!(m.tier));
    props.insert("color".into(), json!(m.tier.color()));
    props.insert(
        "style".into(),
        json!({ "callout": m.callout, "badge": m.badge, "labels": m.labels }),
    );
    props.insert("detail".into(), serde_json::to_value(&m.detail).unwrap_or(Value::Null));
    props.insert(
        "popup".into(),
        json!({
            "title": escape(&popup_title(&m.detail)),
            "content": popup_html(&m.detail, m.tier.color()),
        }),
    );

    Feature {
        bbox: None,
        geometry: Some(GjGeometry::new(GjValue::Point(vec![m.anchor.x, m.anchor.y]))),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

pub fn to_feature_collection(markers: &[MarkerDescriptor]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: markers.iter().map(marker_feature).collect(),
        foreign_members: None,
    }
}

pub fn to_geojson(markers: &[MarkerDescriptor]) -> String {
    GeoJson::FeatureCollection(to_feature_collection(markers)).to_string()
}
