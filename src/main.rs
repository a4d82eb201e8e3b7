//! main.rs
//! Parking map service: loads config, opens the web map session in the
//! background and serves the map API plus the static page.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parkam::arcgis::ArcGisHost;
use parkam::guard::SessionGuard;
use parkam::identity::{Identity, PortalIdentity};
use parkam::models::config::AppCfg;
use parkam::occupancy::RandomOccupancy;
use parkam::server::api::{follow_auth, router, ApiState};
use parkam::session::MapController;

fn set(v: &str) -> &'static str { if v.is_empty() { "missing" } else { "set" } }

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = AppCfg::from_env();
    info!(
        portal = %cfg.arcgis.portal_url,
        web_map = %cfg.arcgis.web_map_id,
        parking_layer = %cfg.arcgis.parking_layer_url,
        app_id = set(&cfg.auth.app_id),
        token = if cfg.token.is_some() { "set" } else { "missing" },
        "config loaded"
    );

    // HTTP client with compression
    let client = Client::builder().brotli(true).gzip(true).deflate(true).build()?;

    let identity = Arc::new(Identity::new(
        cfg.auth.clone(),
        Arc::new(PortalIdentity::new(client.clone())),
        cfg.token.clone(),
    ));
    let map = Arc::new(MapController::new(
        cfg.clone(),
        Arc::new(ArcGisHost::new(client)),
        Arc::new(SessionGuard::new()),
        Box::new(RandomOccupancy::new()),
    ));

    let state = ApiState { map: map.clone(), identity };

    // Sign-in check; the map opens only for a signed-in user
    {
        let state = state.clone();
        tokio::spawn(async move {
            let auth = state.identity.initialize().await;
            follow_auth(&state, &auth).await;
        });
    }

    let app = router(state, &cfg.web_dir);
    info!("listening on http://{}", cfg.bind);
    let listener = tokio::net::TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;
    let serve = axum::serve(listener, app);
    tokio::select! {
        r = serve => { r?; },
        _ = signal::ctrl_c() => { info!("shutdown signal received"); }
    }

    map.unmount().await;
    Ok(())
}
