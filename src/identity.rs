//! identity.rs
//! Portal sign-in state. The browser does the OAuth dance against the
//! portal; this side keeps the resulting token, resolves who it belongs to
//! and exposes `{loading, authenticated, anonymous}`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::arcgis::fetch::get_as;
use crate::arcgis::model::PortalUser;
use crate::arcgis::sharing_url;
use crate::error::MapError;
use crate::models::config::AuthConfig;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub full_name: String,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AuthState {
    Loading,
    Authenticated { user: UserInfo },
    Anonymous,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool { matches!(self, AuthState::Authenticated { .. }) }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The user a token belongs to, `None` when the portal doesn't accept it.
    async fn resolve(&self, cfg: &AuthConfig, token: &str) -> Result<Option<UserInfo>, MapError>;
}

/// Resolves tokens through `sharing/rest/community/self`.
pub struct PortalIdentity {
    client: Client,
}

impl PortalIdentity {
    pub fn new(client: Client) -> Self { Self { client } }
}

#[async_trait]
impl IdentityProvider for PortalIdentity {
    async fn resolve(&self, cfg: &AuthConfig, token: &str) -> Result<Option<UserInfo>, MapError> {
        let url = sharing_url(&cfg.portal_url, "community/self")?;
        match get_as::<PortalUser>(&self.client, url.as_str(), &[], Some(token)).await {
            Ok(u) if u.username.is_some() || u.full_name.is_some() => Ok(Some(UserInfo {
                full_name: u.full_name.unwrap_or_else(|| "Unknown User".into()),
                username: u.username.unwrap_or_else(|| "unknown".into()),
            })),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("token check failed: {e}");
                Ok(None)
            }
        }
    }
}

/// OAuth2 implicit-flow authorize URL for the sign-in dialog.
pub fn sign_in_url(cfg: &AuthConfig, redirect_uri: &str) -> Result<Url, MapError> {
    let mut url = sharing_url(&cfg.portal_url, "oauth2/authorize")?;
    url.query_pairs_mut()
        .append_pair("client_id", &cfg.app_id)
        .append_pair("response_type", "token")
        .append_pair("redirect_uri", redirect_uri);
    Ok(url)
}

/// Sign-in state for the service.
pub struct Identity {
    cfg: AuthConfig,
    provider: Arc<dyn IdentityProvider>,
    state: RwLock<AuthState>,
    token: RwLock<Option<String>>,
}

impl Identity {
    pub fn new(cfg: AuthConfig, provider: Arc<dyn IdentityProvider>, token: Option<String>) -> Self {
        Self { cfg, provider, state: RwLock::new(AuthState::Loading), token: RwLock::new(token) }
    }

    pub fn config(&self) -> &AuthConfig { &self.cfg }

    pub async fn state(&self) -> AuthState { self.state.read().await.clone() }

    pub async fn token(&self) -> Option<String> { self.token.read().await.clone() }

    /// Resolves the held token, if any. Ends in `Authenticated` or
    /// `Anonymous`, never stays `Loading`.
    pub async fn initialize(&self) -> AuthState {
        info!(
            portal = if self.cfg.portal_url.is_empty() { "missing" } else { "set" },
            app_id = if self.cfg.app_id.is_empty() { "missing" } else { "set" },
            "initializing auth"
        );
        let next = if self.cfg.portal_url.is_empty() || self.cfg.app_id.is_empty() {
            warn!("missing required authentication configuration");
            AuthState::Anonymous
        } else {
            match self.token().await {
                None => AuthState::Anonymous,
                Some(t) => match self.provider.resolve(&self.cfg, &t).await {
                    Ok(Some(user)) => {
                        info!(username = %user.username, "user signed in");
                        AuthState::Authenticated { user }
                    }
                    Ok(None) => AuthState::Anonymous,
                    Err(e) => {
                        warn!("authentication initialization failed: {e}");
                        AuthState::Anonymous
                    }
                },
            }
        };
        *self.state.write().await = next.clone();
        next
    }

    /// Stores a token handed back by the OAuth redirect and re-checks.
    pub async fn accept_token(&self, token: String) -> AuthState {
        *self.token.write().await = Some(token);
        *self.state.write().await = AuthState::Loading;
        self.initialize().await
    }

    /// Drops the credentials.
    pub async fn sign_out(&self) {
        *self.token.write().await = None;
        *self.state.write().await = AuthState::Anonymous;
        info!("signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProvider;

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn resolve(&self, _cfg: &AuthConfig, token: &str) -> Result<Option<UserInfo>, MapError> {
            match token {
                "good" => Ok(Some(UserInfo { full_name: "Jo Doe".into(), username: "jdoe".into() })),
                "boom" => Err(MapError::connectivity("down")),
                _ => Ok(None),
            }
        }
    }

    fn identity(cfg: AuthConfig, token: Option<&str>) -> Identity {
        Identity::new(cfg, Arc::new(FakeProvider), token.map(String::from))
    }

    #[tokio::test]
    async fn starts_loading_then_resolves() {
        let id = identity(AuthConfig::default(), Some("good"));
        assert_eq!(id.state().await, AuthState::Loading);
        let s = id.initialize().await;
        assert!(s.is_authenticated());
        assert_eq!(id.state().await, s);
    }

    #[tokio::test]
    async fn anonymous_paths() {
        assert_eq!(identity(AuthConfig::default(), None).initialize().await, AuthState::Anonymous);
        assert_eq!(identity(AuthConfig::default(), Some("bad")).initialize().await, AuthState::Anonymous);
        assert_eq!(identity(AuthConfig::default(), Some("boom")).initialize().await, AuthState::Anonymous);
        let no_app = AuthConfig { app_id: String::new(), ..AuthConfig::default() };
        assert_eq!(identity(no_app, Some("good")).initialize().await, AuthState::Anonymous);
    }

    #[tokio::test]
    async fn token_then_sign_out() {
        let id = identity(AuthConfig::default(), None);
        id.initialize().await;
        assert!(id.accept_token("good".into()).await.is_authenticated());
        id.sign_out().await;
        assert_eq!(id.state().await, AuthState::Anonymous);
        assert!(id.token().await.is_none());
    }

    #[test]
    fn authorize_url() {
        let cfg = AuthConfig { portal_url: "https://gis.example.org/portal".into(), app_id: "APP".into() };
        let u = sign_in_url(&cfg, "http://localhost:8080/").unwrap();
        assert_eq!(u.path(), "/portal/sharing/rest/oauth2/authorize");
        let q: Vec<(String, String)> = u.query_pairs().into_owned().collect();
        assert!(q.contains(&("client_id".into(), "APP".into())));
        assert!(q.contains(&("response_type".into(), "token".into())));
        assert!(q.contains(&("redirect_uri".into(), "http://localhost:8080/".into())));
    }

    #[test]
    fn auth_state_json() {
        let s = AuthState::Authenticated { user: UserInfo { full_name: "A".into(), username: "a".into() } };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["state"], "authenticated");
        assert_eq!(v["user"]["username"], "a");
        assert_eq!(serde_json::to_value(AuthState::Loading).unwrap()["state"], "loading");
    }
}
