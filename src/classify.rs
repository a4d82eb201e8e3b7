//! classify.rs
//! Picks the bay overlays and the single parking layer out of a web map's
//! layer list. Upstream map authors don't name things consistently, so the
//! parking lookup is a cascade that prefers exact configuration over
//! name heuristics.

use serde::Serialize;

use crate::models::config::ArcGisCfg;
use crate::models::types::LayerDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerRole {
    Bay,
    Parking,
    Other,
}

/// Which cascade rule selected the parking layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParkingMatch {
    ExactUrl,
    ParkamService,
    Title,
    FirstFeatureLayer,
}

#[derive(Clone, Debug)]
pub struct LayerClassifier {
    bay_urls: [String; 2],
    parking_url: String,
}

impl LayerClassifier {
    pub fn new(cfg: &ArcGisCfg) -> Self {
        Self {
            bay_urls: [cfg.bay_layer_url.clone(), cfg.under_bay_layer_url.clone()],
            parking_url: cfg.parking_layer_url.clone(),
        }
    }

    pub fn is_bay_layer(&self, layer: &LayerDescriptor) -> bool {
        if !layer.is_feature() { return false; }
        let title = layer.title.to_lowercase();
        self.bay_urls.iter().any(|u| !u.is_empty() && *u == layer.url)
            || title.contains("bay")
            || title.contains("underground")
            || layer.url.contains("bay")
            || layer.url.contains("underground")
    }

    /// Bay overlays in map order.
    pub fn bay_layers<'a>(&self, layers: &'a [LayerDescriptor]) -> Vec<&'a LayerDescriptor> {
        layers.iter().filter(|l| self.is_bay_layer(l)).collect()
    }

    /// First match wins, rules tried in order. Only feature layers qualify.
    pub fn parking_layer<'a>(
        &self,
        layers: &'a [LayerDescriptor],
    ) -> Option<(&'a LayerDescriptor, ParkingMatch)> {
        let features: Vec<&LayerDescriptor> = layers.iter().filter(|l| l.is_feature()).collect();

        if let Some(l) = first_where(&features, |l| !self.parking_url.is_empty() && l.url == self.parking_url) {
            return Some((l, ParkingMatch::ExactUrl));
        }
        if let Some(l) = first_where(&features, |l| l.url.contains("ParKam") && l.url.contains("/4")) {
            return Some((l, ParkingMatch::ParkamService));
        }
        if let Some(l) = first_where(&features, |l| {
            let t = l.title.to_lowercase();
            t.contains("parking") || t.contains("parkam")
        }) {
            return Some((l, ParkingMatch::Title));
        }
        features.first().map(|l| (*l, ParkingMatch::FirstFeatureLayer))
    }

    /// Role of every layer, parallel to `layers`. The parking layer is never
    /// also tagged as a bay.
    pub fn roles(&self, layers: &[LayerDescriptor]) -> Vec<LayerRole> {
        let parking = self.parking_layer(layers).map(|(l, _)| l);
        layers
            .iter()
            .map(|l| {
                if parking.is_some_and(|p| std::ptr::eq(p, l)) { LayerRole::Parking }
                else if self.is_bay_layer(l) { LayerRole::Bay }
                else { LayerRole::Other }
            })
            .collect()
    }
}

fn first_where<'a>(
    layers: &[&'a LayerDescriptor],
    pred: impl Fn(&LayerDescriptor) -> bool,
) -> Option<&'a LayerDescriptor> {
    layers.iter().copied().find(|l| pred(l))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::LayerType;

    fn cfg(parking: &str) -> ArcGisCfg {
        ArcGisCfg {
            bay_layer_url: "https://host/Hosted/Bays_A/FeatureServer/0".into(),
            under_bay_layer_url: "https://host/Hosted/Bays_B/FeatureServer/0".into(),
            parking_layer_url: parking.into(),
            ..ArcGisCfg::default()
        }
    }

    #[test]
    fn parking_rule_two_beats_fallback() {
        let layers = vec![
            LayerDescriptor::feature("X", ""),
            LayerDescriptor::feature("https://host/ParKam/ParKam/FeatureServer/4", ""),
        ];
        let c = LayerClassifier::new(&cfg("Y"));
        let (l, rule) = c.parking_layer(&layers).unwrap();
        assert_eq!(l.url, "https://host/ParKam/ParKam/FeatureServer/4");
        assert_eq!(rule, ParkingMatch::ParkamService);
    }

    #[test]
    fn parking_cascade_order() {
        let layers = vec![
            LayerDescriptor::feature("https://a/0", "Campus Parking"),
            LayerDescriptor::feature("https://host/ParKam/ParKam/FeatureServer/4", ""),
            LayerDescriptor::feature("https://exact/1", "whatever"),
        ];
        let c = LayerClassifier::new(&cfg("https://exact/1"));
        assert_eq!(c.parking_layer(&layers).unwrap().1, ParkingMatch::ExactUrl);

        let c = LayerClassifier::new(&cfg("nope"));
        assert_eq!(c.parking_layer(&layers[..1]).unwrap().1, ParkingMatch::Title);

        let only = vec![LayerDescriptor::feature("https://z/0", "Buildings")];
        assert_eq!(c.parking_layer(&only).unwrap().1, ParkingMatch::FirstFeatureLayer);
        assert!(c.parking_layer(&[]).is_none());
    }

    #[test]
    fn parking_ignores_non_feature_layers() {
        let tile = LayerDescriptor {
            kind: LayerType::Tile,
            url: "https://host/ParKam/ParKam/MapServer/4".into(),
            title: "Parking tiles".into(),
            visible: true,
        };
        let c = LayerClassifier::new(&cfg("https://host/ParKam/ParKam/MapServer/4"));
        assert!(c.parking_layer(&[tile]).is_none());
    }

    #[test]
    fn bay_selection() {
        let layers = vec![
            LayerDescriptor::feature("https://x/unrelated/0", "Underground Bays"),
            LayerDescriptor::feature("https://x/bay_points/0", "Visitor Lot"),
            LayerDescriptor::feature("https://x/roads/0", "Roads"),
            LayerDescriptor::feature("https://host/Hosted/Bays_B/FeatureServer/0", "B"),
            LayerDescriptor { kind: LayerType::Tile, url: "bay".into(), title: "Bay".into(), visible: true },
        ];
        let c = LayerClassifier::new(&cfg("Y"));
        let bays: Vec<_> = c.bay_layers(&layers).iter().map(|l| l.title.as_str()).collect();
        assert_eq!(bays, vec!["Underground Bays", "Visitor Lot", "B"]);
    }

    #[test]
    fn roles_never_double_tag() {
        let layers = vec![
            LayerDescriptor::feature("https://x/parking_bays/0", "Parking Bays"),
            LayerDescriptor::feature("https://x/roads/0", "Roads"),
        ];
        let c = LayerClassifier::new(&cfg("https://x/parking_bays/0"));
        assert_eq!(c.roles(&layers), vec![LayerRole::Parking, LayerRole::Other]);
    }
}
