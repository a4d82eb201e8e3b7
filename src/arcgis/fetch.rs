//! fetch.rs
//! GET helper for portal REST endpoints. The portal reports many failures
//! as `200 OK` with an `{"error": {...}}` body, so both paths end up in
//! `FetchError`.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::{classify_http, FailureKind};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },
    #[error("portal error {code}: {message}")]
    Portal { code: i64, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transport { source, .. } => classify_http(source),
            FetchError::Status { status, .. } if status.is_server_error() => FailureKind::Connectivity,
            FetchError::Portal { code, .. } if *code >= 500 => FailureKind::Connectivity,
            _ => FailureKind::Generic,
        }
    }
}

#[derive(Deserialize)]
struct PortalErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// `f=json` is always added; `token` only when present.
pub async fn get_json(
    client: &Client,
    url: &str,
    params: &[(&str, String)],
    token: Option<&str>,
) -> Result<Value, FetchError> {
    let mut req = client.get(url).query(&[("f", "json")]).query(params);
    if let Some(t) = token { req = req.query(&[("token", t)]); }
    let resp = req.send().await.map_err(|source| FetchError::Transport { url: url.to_string(), source })?;
    match resp.status() {
        StatusCode::OK => {
            let body: Value = resp
                .json()
                .await
                .map_err(|e| FetchError::Decode(e.to_string()))?;
            if let Some(err) = body.get("error") {
                let e: PortalErrorBody = serde_json::from_value(err.clone())
                    .unwrap_or(PortalErrorBody { code: 0, message: String::new() });
                return Err(FetchError::Portal { code: e.code, message: e.message });
            }
            Ok(body)
        }
        status => Err(FetchError::Status { url: url.to_string(), status }),
    }
}

/// `get_json` decoded into `T`.
pub async fn get_as<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    params: &[(&str, String)],
    token: Option<&str>,
) -> Result<T, FetchError> {
    let body = get_json(client, url, params, token).await?;
    serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_kinds() {
        let e = FetchError::Status { url: "u".into(), status: StatusCode::BAD_GATEWAY };
        assert_eq!(e.kind(), FailureKind::Connectivity);
        let e = FetchError::Status { url: "u".into(), status: StatusCode::NOT_FOUND };
        assert_eq!(e.kind(), FailureKind::Generic);
        let e = FetchError::Portal { code: 500, message: "Unable to load".into() };
        assert_eq!(e.kind(), FailureKind::Connectivity);
        let e = FetchError::Portal { code: 498, message: "Invalid token".into() };
        assert_eq!(e.kind(), FailureKind::Generic);
    }
}
