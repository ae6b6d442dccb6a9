//! Cluster access capability
//!
//! The orchestration core treats the client as an opaque handle: it is passed
//! through agent state to tools untouched and never logged.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::core::config::ClusterConfig;
use crate::core::{CompanionError, Result};

/// Read access to a cluster API server
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Base URL of the API server
    fn api_server(&self) -> &str;

    /// GET an API path such as `/api/v1/namespaces/default/pods`
    async fn execute_get_api_request(&self, uri: &str) -> Result<serde_json::Value>;
}

/// Cluster client talking to the API server over HTTPS with a bearer token
pub struct HttpClusterClient {
    client: Client,
    api_server: String,
    token: Option<String>,
}

impl HttpClusterClient {
    pub fn new(api_server: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_server: api_server.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a client from config; absent API server is a configuration error
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        let api_server = config
            .api_server
            .clone()
            .ok_or_else(|| CompanionError::config("cluster.api_server is not set"))?;
        Self::new(api_server, config.token.clone())
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    fn api_server(&self) -> &str {
        &self.api_server
    }

    async fn execute_get_api_request(&self, uri: &str) -> Result<serde_json::Value> {
        if !uri.starts_with('/') {
            return Err(CompanionError::cluster(format!(
                "API path must start with '/': {}",
                uri
            )));
        }

        debug!(uri, "cluster GET");
        let mut request = self.client.get(format!("{}{}", self.api_server, uri));
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompanionError::cluster(format!(
                "GET {} failed ({}): {}",
                uri, status, body
            )));
        }

        Ok(response.json().await?)
    }
}

/// Kinds whose resource name is the lowercased kind itself
const UNPLURALIZED_KINDS: &[&str] = &["endpoints"];

/// Lowercase resource name of a kind, e.g. `Ingress` → `ingresses`
pub fn plural(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if UNPLURALIZED_KINDS.contains(&lower.as_str()) {
        return lower;
    }

    if lower.ends_with(['s', 'x']) || lower.ends_with("ch") || lower.ends_with("sh") {
        return format!("{}es", lower);
    }
    if let Some(stem) = lower.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", lower)
}

/// API path of a resource, following the core/group split of the cluster API
pub fn resource_path(
    api_version: &str,
    kind: &str,
    namespace: Option<&str>,
    name: Option<&str>,
) -> String {
    let prefix = if api_version.contains('/') {
        format!("/apis/{}", api_version)
    } else {
        format!("/api/{}", api_version)
    };
    let mut path = prefix;
    if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
        path.push_str(&format!("/namespaces/{}", ns));
    }
    path.push('/');
    path.push_str(&plural(kind));
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        path.push('/');
        path.push_str(name);
    }
    path
}
