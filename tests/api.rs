mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{bay_layer, controller, feature, parking_layer, Calls, MemoryHost};
use parkam::error::MapError;
use parkam::identity::{Identity, IdentityProvider, UserInfo};
use parkam::models::config::{AppCfg, AuthConfig};
use parkam::models::types::{Coord, Geometry};
use parkam::occupancy::FixedOccupancy;
use parkam::server::api::{router, ApiState};
use parkam::session::MapController;

struct OneUser;

#[async_trait]
impl IdentityProvider for OneUser {
    async fn resolve(&self, _cfg: &AuthConfig, token: &str) -> Result<Option<UserInfo>, MapError> {
        Ok((token == "valid").then(|| UserInfo { full_name: "Pat Lee".into(), username: "plee".into() }))
    }
}

fn setup() -> (Router, Arc<MapController>) {
    let (app, map, _) = setup_with_calls();
    (app, map)
}

fn setup_with_calls() -> (Router, Arc<MapController>, Arc<Calls>) {
    let cfg = AppCfg::default();
    let host = MemoryHost::new(
        vec![bay_layer(&cfg), parking_layer(&cfg)],
        vec![
            feature(json!({"Zone": "P1"}), Some(Geometry::Point(Coord::new(115.9, -32.0)))),
            feature(json!({"Zone": "P2"}), Some(Geometry::Point(Coord::new(115.8, -32.1)))),
        ],
    );
    let calls = host.calls.clone();
    let map = Arc::new(controller(
        cfg.clone(),
        host,
        FixedOccupancy::default().with("P1", 75, 100).with("P2", 0, 50),
    ));
    let identity = Arc::new(Identity::new(cfg.auth.clone(), Arc::new(OneUser), None));
    (router(ApiState { map: map.clone(), identity }, "web"), map, calls)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health() {
    let (app, _) = setup();
    let resp = app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn map_lifecycle_over_http() {
    let (app, _) = setup();

    let (_, v) = call(&app, "GET", "/map", None).await;
    assert_eq!(v["status"], "unmounted");
    assert_eq!(v["zoom"], 14);

    let (code, v) = call(&app, "POST", "/map/mount", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(v["result"], "ready");

    let (code, v) = call(&app, "POST", "/map/mount", None).await;
    assert_eq!(code, StatusCode::CONFLICT);
    assert_eq!(v["result"], "skipped");

    let (_, v) = call(&app, "GET", "/map", None).await;
    assert_eq!(v["status"], "ready");
    assert_eq!(v["marker_count"], 2);
    assert_eq!(v["bay_layers"], json!(["Bays"]));
    assert_eq!(v["parking_layer"], "Parking Lots");
    assert_eq!(v["bay_toggle_label"], "Hide Bays");
    assert!(v.get("message").is_none());

    let (_, v) = call(&app, "POST", "/map/bays/toggle", None).await;
    assert_eq!(v["bays_visible"], false);
    assert_eq!(v["label"], "Show Bays");

    let (_, v) = call(&app, "GET", "/stats", None).await;
    assert_eq!(v["total_spaces"], 150);
    assert_eq!(v["total_available"], 75);
    assert_eq!(v["total_occupied"], 75);
    assert_eq!(v["overall_percentage"], 50);

    let (_, v) = call(&app, "POST", "/map/unmount", None).await;
    assert_eq!(v["unmounted"], true);
    let (_, v) = call(&app, "GET", "/map", None).await;
    assert_eq!(v["status"], "unmounted");
}

#[tokio::test]
async fn markers_geojson() {
    let (app, map) = setup();
    let resp = app
        .clone()
        .oneshot(Request::get("/map/markers").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    map.mount(None).await;
    let resp = app.oneshot(Request::get("/map/markers").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "application/geo+json; charset=utf-8"
    );
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["type"], "FeatureCollection");
    assert_eq!(v["features"].as_array().map(Vec::len), Some(2));
    assert_eq!(v["features"][1]["properties"]["tier"], "almost-full");
}

#[tokio::test]
async fn legend_lists_four_tiers() {
    let (app, _) = setup();
    let (_, v) = call(&app, "GET", "/legend", None).await;
    let items = v.as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 4);
    assert_eq!(items[0]["color"], "#10B981");
    assert_eq!(items[3]["label"], "Lot closed");
}

#[tokio::test]
async fn auth_flow() {
    let (app, _) = setup();

    let (_, v) = call(&app, "GET", "/auth/status", None).await;
    assert_eq!(v["state"], "loading");

    let (code, _) = call(&app, "POST", "/auth/token", Some(json!({"token": " "}))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let (_, v) = call(&app, "POST", "/auth/token", Some(json!({"token": "valid"}))).await;
    assert_eq!(v["state"], "authenticated");
    assert_eq!(v["user"]["full_name"], "Pat Lee");

    let (_, v) = call(&app, "POST", "/auth/signout", None).await;
    assert_eq!(v["state"], "anonymous");
}

#[tokio::test]
async fn signing_in_reopens_map_with_token() {
    let (app, map, calls) = setup_with_calls();
    map.mount(None).await;

    call(&app, "POST", "/auth/token", Some(json!({"token": "valid"}))).await;
    assert_eq!(*calls.tokens.lock(), vec![None, Some("valid".to_string())]);
    assert_eq!(calls.disposals.load(Ordering::SeqCst), 1);
    let (_, v) = call(&app, "GET", "/map", None).await;
    assert_eq!(v["status"], "ready");
    assert_eq!(v["marker_count"], 2);
}

#[tokio::test]
async fn signing_out_closes_map() {
    let (app, _, calls) = setup_with_calls();
    call(&app, "POST", "/auth/token", Some(json!({"token": "valid"}))).await;
    let (_, v) = call(&app, "GET", "/map", None).await;
    assert_eq!(v["status"], "ready");

    call(&app, "POST", "/auth/signout", None).await;
    assert_eq!(calls.disposals.load(Ordering::SeqCst), 1);
    let (_, v) = call(&app, "GET", "/map", None).await;
    assert_eq!(v["status"], "unmounted");
    assert_eq!(v["marker_count"], 0);
    let (code, _) = call(&app, "GET", "/map/markers", None).await;
    assert_eq!(code, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn rejected_token_leaves_map_closed() {
    let (app, _, calls) = setup_with_calls();
    let (_, v) = call(&app, "POST", "/auth/token", Some(json!({"token": "forged"}))).await;
    assert_eq!(v["state"], "anonymous");
    assert_eq!(calls.opens.load(Ordering::SeqCst), 0);
    let (_, v) = call(&app, "GET", "/map", None).await;
    assert_eq!(v["status"], "unmounted");
}

#[tokio::test]
async fn sign_in_redirects_to_portal() {
    let (app, _) = setup();
    let req = Request::get("/auth/signin?redirect_uri=http%3A%2F%2Flocalhost%3A8080%2F")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://arcgis.curtin.edu.au/portal/sharing/rest/oauth2/authorize?"));
    assert!(location.contains("response_type=token"));
    assert!(location.contains("client_id=iE6Peb7aGPZ0U6yo"));
}
