//! error.rs
//! Failure taxonomy for map sessions. Everything here is caught by the
//! session controller and turned into a degraded-but-rendered map state.

use thiserror::Error;

/// How a session acquisition failure is reported to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Portal unreachable, timed out or answered with a server error
    Connectivity,
    Generic,
}

#[derive(Debug, Error)]
pub enum MapError {
    /// A required setting is empty. Not retryable without new config.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    #[error("map session acquisition failed: {detail}")]
    SessionAcquisitionFailed { kind: FailureKind, detail: String },

    /// No usable parking layer in the web map. Non-fatal.
    #[error("no parking layer found")]
    LayerNotFound,

    #[error("layer query failed: {0}")]
    Query(String),
}

impl MapError {
    pub fn connectivity(detail: impl Into<String>) -> Self {
        MapError::SessionAcquisitionFailed { kind: FailureKind::Connectivity, detail: detail.into() }
    }

    pub fn generic(detail: impl Into<String>) -> Self {
        MapError::SessionAcquisitionFailed { kind: FailureKind::Generic, detail: detail.into() }
    }

    /// Short text for the map error panel. Never includes raw payloads.
    pub fn user_message(&self) -> String {
        match self {
            MapError::ConfigurationMissing(what) => {
                format!("Map configuration incomplete: {what} not set")
            }
            MapError::SessionAcquisitionFailed { kind: FailureKind::Connectivity, .. } => {
                "Server connection error - please try refreshing the page".into()
            }
            MapError::SessionAcquisitionFailed { .. } => "Failed to load map".into(),
            MapError::LayerNotFound => "No parking layer available".into(),
            MapError::Query(_) => "Parking data unavailable".into(),
        }
    }
}

/// Classifies a reqwest failure: transport problems and 5xx answers are
/// connectivity, the rest is generic.
pub fn classify_http(err: &reqwest::Error) -> FailureKind {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        return FailureKind::Connectivity;
    }
    match err.status() {
        Some(s) if s.is_server_error() => FailureKind::Connectivity,
        _ => FailureKind::Generic,
    }
}
