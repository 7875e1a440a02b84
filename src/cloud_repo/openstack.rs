// OpenStack compute (Nova) over HTTP, authenticated with a Keystone v3 application credential

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::{CloudError, CloudProvider, ServerSpec};
use crate::config::CloudConfig;
use crate::models::ServerSummary;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on `servers_links` pages followed in one listing.
const MAX_LIST_PAGES: usize = 100;

#[derive(Debug, Clone)]
struct Session {
    token: String,
    compute_url: String,
}

pub struct OpenStackRepo {
    http: Client,
    config: CloudConfig,
    session: RwLock<Session>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ServerList {
    #[serde(default)]
    servers: Vec<RawServer>,
    #[serde(default)]
    servers_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    #[serde(default)]
    rel: String,
}

/// One page of `/servers/detail` and the `next` link, if any.
#[derive(Debug)]
struct ServerPage {
    servers: Vec<ServerSummary>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    id: String,
    name: String,
    #[serde(default)]
    status: String,
    #[serde(rename = "OS-SRV-USG:launched_at", default)]
    launched_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: ServerRef,
}

#[derive(Debug, Deserialize)]
struct ServerRef {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

fn tokens_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{}/auth/tokens", base)
    } else {
        format!("{}/v3/auth/tokens", base)
    }
}

fn select_compute_endpoint(
    catalog: &[CatalogEntry],
    interface: &str,
    region: Option<&str>,
) -> Option<String> {
    catalog
        .iter()
        .filter(|e| e.service_type == "compute")
        .flat_map(|e| e.endpoints.iter())
        .find(|ep| {
            ep.interface == interface
                && region.is_none_or(|r| {
                    ep.region.as_deref() == Some(r) || ep.region_id.as_deref() == Some(r)
                })
        })
        .map(|ep| ep.url.trim_end_matches('/').to_string())
}

/// Nova reports launch time as a naive UTC timestamp (`2024-05-01T10:00:00.000000`);
/// RFC 3339 is accepted too. Anything else is treated as "not launched".
pub fn parse_launched_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn decode_servers(body: &str) -> Result<ServerPage, CloudError> {
    let list: ServerList =
        serde_json::from_str(body).map_err(|e| CloudError::Decode(format!("server list: {}", e)))?;
    let next = list
        .servers_links
        .into_iter()
        .find(|l| l.rel == "next")
        .map(|l| l.href);
    let servers = list
        .servers
        .into_iter()
        .map(|s| {
            let launched_at = s.launched_at.as_deref().and_then(parse_launched_at);
            if launched_at.is_none() && s.launched_at.as_deref().is_some_and(|r| !r.is_empty()) {
                warn!(server = %s.name, raw = ?s.launched_at, "unparseable launch time");
            }
            ServerSummary {
                id: s.id,
                name: s.name,
                status: s.status,
                launched_at,
            }
        })
        .collect();
    Ok(ServerPage { servers, next })
}

async fn error_for(resp: Response) -> CloudError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    CloudError::from_status(status, body)
}

async fn authenticate(http: &Client, config: &CloudConfig) -> Result<Session, CloudError> {
    let body = json!({
        "auth": {
            "identity": {
                "methods": ["application_credential"],
                "application_credential": {
                    "id": config.application_credential_id,
                    "secret": config.application_credential_secret,
                }
            }
        }
    });
    let resp = http
        .post(tokens_url(&config.auth_url))
        .json(&body)
        .send()
        .await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(CloudError::Auth(format!("{}: {}", status, text)));
    }
    let token = resp
        .headers()
        .get("X-Subject-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| CloudError::Auth("missing X-Subject-Token header".into()))?;
    let parsed: TokenResponse = resp
        .json()
        .await
        .map_err(|e| CloudError::Decode(format!("token body: {}", e)))?;
    let compute_url = select_compute_endpoint(
        &parsed.token.catalog,
        &config.interface,
        config.region_name.as_deref(),
    )
    .ok_or_else(|| {
        CloudError::Auth(format!(
            "no compute endpoint for interface {} in region {:?}",
            config.interface, config.region_name
        ))
    })?;
    Ok(Session { token, compute_url })
}

impl OpenStackRepo {
    /// Authenticate and resolve the compute endpoint. Fails when the provider is unreachable.
    pub async fn connect(config: &CloudConfig) -> Result<Self, CloudError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(crate::version::user_agent())
            .build()?;
        let session = authenticate(&http, config).await?;
        info!(compute_url = %session.compute_url, "authenticated to OpenStack");
        Ok(Self {
            http,
            config: config.clone(),
            session: RwLock::new(session),
        })
    }

    /// Send a request built against the current session; on 401 re-authenticate once and retry.
    async fn send<F>(&self, build: F) -> Result<Response, CloudError>
    where
        F: Fn(&Client, &Session) -> RequestBuilder + Send + Sync,
    {
        let session = self.session.read().await.clone();
        let resp = build(&self.http, &session)
            .header("X-Auth-Token", &session.token)
            .send()
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }
        debug!("token rejected; re-authenticating");
        let fresh = authenticate(&self.http, &self.config).await?;
        *self.session.write().await = fresh.clone();
        Ok(build(&self.http, &fresh)
            .header("X-Auth-Token", &fresh.token)
            .send()
            .await?)
    }
}

#[async_trait]
impl CloudProvider for OpenStackRepo {
    #[instrument(skip(self), fields(repo = "openstack", operation = "list_servers"))]
    async fn list_servers(&self) -> Result<Vec<ServerSummary>, CloudError> {
        let mut servers = Vec::new();
        let mut next: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let resp = match &next {
                Some(href) => self.send(|http, _| http.get(href)).await?,
                None => {
                    self.send(|http, s| http.get(format!("{}/servers/detail", s.compute_url)))
                        .await?
                }
            };
            if !resp.status().is_success() {
                return Err(error_for(resp).await);
            }
            let page = decode_servers(&resp.text().await?)?;
            servers.extend(page.servers);
            match page.next {
                Some(href) if next.as_deref() != Some(href.as_str()) => next = Some(href),
                _ => return Ok(servers),
            }
        }
        warn!(pages = MAX_LIST_PAGES, "server listing truncated");
        Ok(servers)
    }

    #[instrument(skip(self, spec), fields(repo = "openstack", operation = "create_server", name = %spec.name))]
    async fn create_server(&self, spec: &ServerSpec) -> Result<String, CloudError> {
        let body = json!({
            "server": {
                "name": spec.name,
                "imageRef": spec.image_id,
                "flavorRef": spec.flavor_id,
                "networks": [{ "uuid": spec.network_id }],
                "key_name": spec.keypair_name,
                "security_groups": [{ "name": spec.security_group }],
            }
        });
        let resp = self
            .send(|http, s| http.post(format!("{}/servers", s.compute_url)).json(&body))
            .await?;
        if !resp.status().is_success() {
            return Err(error_for(resp).await);
        }
        let created: ServerEnvelope = resp
            .json()
            .await
            .map_err(|e| CloudError::Decode(format!("create response: {}", e)))?;
        Ok(created.server.id)
    }

    #[instrument(skip(self), fields(repo = "openstack", operation = "server_status"))]
    async fn server_status(&self, id: &str) -> Result<Option<String>, CloudError> {
        let resp = self
            .send(|http, s| http.get(format!("{}/servers/{}", s.compute_url, id)))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(error_for(resp).await);
        }
        let server: ServerEnvelope = resp
            .json()
            .await
            .map_err(|e| CloudError::Decode(format!("server {}: {}", id, e)))?;
        Ok(Some(server.server.status.unwrap_or_default()))
    }

    #[instrument(skip(self), fields(repo = "openstack", operation = "delete_server"))]
    async fn delete_server(&self, id: &str) -> Result<(), CloudError> {
        let resp = self
            .send(|http, s| http.delete(format!("{}/servers/{}", s.compute_url, id)))
            .await?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(error_for(resp).await)
    }
}
