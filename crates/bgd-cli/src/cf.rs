//! Platform transport over the `cf` command-line client.
//!
//! Mutating operations run `cf` with inherited output so the user sees its
//! progress. Queries go through `cf curl` against the v2 API and parse the
//! JSON body:
//!
//! - apps, routes and scale: `/v2/spaces/<guid>/summary`, with the space
//!   GUID read from the client's `config.json`
//! - domains: `/v2/shared_domains` and `/v2/private_domains`; the first
//!   shared domain is the default one

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::debug;

use bgd_core::{PlatformDomains, Route, ScaleParameters};
use bgd_deploy::{Platform, PlatformApp, PlatformError, PlatformResult, PushRequest};

/// Talks to the platform through a `cf` executable.
#[derive(Debug, Clone)]
pub struct CfCli {
    binary: PathBuf,
    config_file: Option<PathBuf>,
}

impl CfCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_file: cf_config_path(
                std::env::var_os("CF_HOME").map(PathBuf::from),
                std::env::var_os("HOME").map(PathBuf::from),
            ),
        }
    }

    /// Run a command, streaming its output to ours.
    async fn run(&self, args: &[String]) -> PlatformResult<()> {
        let command = self.describe(args);
        debug!(%command, "running");
        let status = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| PlatformError::Spawn {
                command: command.clone(),
                message: e.to_string(),
            })?;
        if !status.success() {
            return Err(PlatformError::Command {
                command,
                message: format!("exited with {status}"),
            });
        }
        Ok(())
    }

    /// `cf curl <path>`, decoded as `T`.
    async fn curl<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<T> {
        let args = ["curl".to_string(), path.to_string()];
        let command = self.describe(&args);
        debug!(%command, "querying");
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| PlatformError::Spawn {
                command: command.clone(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(PlatformError::Command {
                command,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_response(&String::from_utf8_lossy(&output.stdout))
    }

    /// Every resource of a paged v2 listing.
    async fn list_domains(&self, path: &str) -> PlatformResult<Vec<String>> {
        let mut names = Vec::new();
        let mut next = Some(path.to_string());
        while let Some(page) = next {
            let response: Page<DomainEntity> = self.curl(&page).await?;
            names.extend(response.resources.into_iter().map(|r| r.entity.name));
            next = response.next_url;
        }
        Ok(names)
    }

    fn space_guid(&self) -> PlatformResult<String> {
        let path = self.config_file.as_deref().ok_or_else(|| {
            PlatformError::Response("cannot locate cf config, is HOME set?".to_string())
        })?;
        read_space_guid(path)
    }

    fn describe(&self, args: &[String]) -> String {
        let mut command = self.binary.display().to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }
}

#[async_trait]
impl Platform for CfCli {
    async fn list_apps(&self) -> PlatformResult<Vec<PlatformApp>> {
        let guid = self.space_guid()?;
        let summary: SpaceSummary = self.curl(&format!("/v2/spaces/{guid}/summary")).await?;
        Ok(summary.apps.into_iter().map(PlatformApp::from).collect())
    }

    async fn push(&self, request: &PushRequest) -> PlatformResult<()> {
        self.run(&push_args(request)?).await
    }

    async fn delete(&self, app_name: &str) -> PlatformResult<()> {
        let args = ["delete", app_name, "-f", "-r"].map(String::from);
        self.run(&args).await
    }

    async fn rename(&self, from: &str, to: &str) -> PlatformResult<()> {
        let args = ["rename", from, to].map(String::from);
        self.run(&args).await
    }

    async fn map_route(&self, app_name: &str, route: &Route) -> PlatformResult<()> {
        self.run(&route_args("map-route", app_name, route)).await
    }

    async fn unmap_route(&self, app_name: &str, route: &Route) -> PlatformResult<()> {
        self.run(&route_args("unmap-route", app_name, route)).await
    }

    async fn default_domain(&self) -> PlatformResult<String> {
        let shared: Page<DomainEntity> = self.curl("/v2/shared_domains").await?;
        first_domain(shared.resources.into_iter().map(|r| r.entity.name))
    }

    async fn shared_domains(&self) -> PlatformResult<Vec<String>> {
        self.list_domains("/v2/shared_domains").await
    }

    async fn private_domains(&self) -> PlatformResult<Vec<String>> {
        self.list_domains("/v2/private_domains").await
    }

    async fn domains(&self) -> PlatformResult<PlatformDomains> {
        let shared = self.shared_domains().await?;
        Ok(PlatformDomains {
            default_domain: first_domain(shared.iter().cloned())?,
            shared,
            private: self.private_domains().await?,
        })
    }
}

fn first_domain(mut names: impl Iterator<Item = String>) -> PlatformResult<String> {
    names
        .next()
        .ok_or_else(|| PlatformError::Response("No CF Domains found".to_string()))
}

/// Arguments for `cf push`. The app needs a name and a route with both a
/// host and a domain.
pub fn push_args(request: &PushRequest) -> PlatformResult<Vec<String>> {
    let refuse = |reason: &str| Err(PlatformError::Response(reason.to_string()));
    if request.app_name.is_empty() {
        return refuse("Expected app to have name, cannot push without name");
    }
    if request.route.host.is_empty() {
        return refuse("Expected new app to have a host");
    }
    if request.route.domain_name.is_empty() {
        return refuse("Expected new app to have a domain name");
    }

    let mut args = vec![
        "push".to_string(),
        request.app_name.clone(),
        "-n".to_string(),
        request.route.host.clone(),
        "-d".to_string(),
        request.route.domain_name.clone(),
    ];
    let scale = &request.scale;
    if scale.instance_count != 0 {
        args.extend(["-i".to_string(), scale.instance_count.to_string()]);
    }
    if scale.memory_mb != 0 {
        args.extend(["-m".to_string(), format!("{}M", scale.memory_mb)]);
    }
    if scale.disk_quota_mb != 0 {
        args.extend(["-k".to_string(), format!("{}M", scale.disk_quota_mb)]);
    }
    if let Some(manifest) = &request.manifest_path {
        args.extend(["-f".to_string(), manifest.display().to_string()]);
    }
    Ok(args)
}

/// Arguments for `cf map-route` / `cf unmap-route`. A bare-domain route
/// has no `-n`.
pub fn route_args(verb: &str, app_name: &str, route: &Route) -> Vec<String> {
    let mut args = vec![
        verb.to_string(),
        app_name.to_string(),
        route.domain_name.clone(),
    ];
    if !route.host.is_empty() {
        args.extend(["-n".to_string(), route.host.clone()]);
    }
    if let Some(path) = &route.path {
        args.extend(["--path".to_string(), path.clone()]);
    }
    if let Some(port) = route.port {
        args.extend(["--port".to_string(), port.to_string()]);
    }
    args
}

/// Where the `cf` client keeps its config: `$CF_HOME/.cf/config.json`,
/// falling back to the home directory.
pub fn cf_config_path(cf_home: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    cf_home
        .filter(|dir| !dir.as_os_str().is_empty())
        .or(home)
        .map(|dir| dir.join(".cf").join("config.json"))
}

#[derive(Debug, Deserialize)]
struct CfConfig {
    #[serde(rename = "SpaceFields", default)]
    space_fields: SpaceFields,
}

#[derive(Debug, Default, Deserialize)]
struct SpaceFields {
    #[serde(rename = "GUID", default)]
    guid: String,
}

/// GUID of the targeted space.
pub fn read_space_guid(config_file: &Path) -> PlatformResult<String> {
    let text = std::fs::read_to_string(config_file).map_err(|e| {
        PlatformError::Response(format!("cannot read {}: {e}", config_file.display()))
    })?;
    let config: CfConfig = serde_json::from_str(&text).map_err(|e| {
        PlatformError::Response(format!("cannot parse {}: {e}", config_file.display()))
    })?;
    if config.space_fields.guid.is_empty() {
        return Err(PlatformError::Response(
            "no space targeted, use 'cf target -s SPACE'".to_string(),
        ));
    }
    Ok(config.space_fields.guid)
}

/// v2 API error body. Present on every response type we decode.
#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    description: String,
    #[serde(default)]
    error_code: String,
}

/// Decode a `cf curl` body, turning API error payloads into errors.
pub(crate) fn parse_response<T: DeserializeOwned>(body: &str) -> PlatformResult<T> {
    let error: ApiError = serde_json::from_str(body)
        .map_err(|e| PlatformError::Response(format!("invalid JSON from cf curl: {e}")))?;
    if !error.error_code.is_empty() {
        return Err(PlatformError::Response(format!(
            "{}: {}",
            error.description, error.error_code
        )));
    }
    serde_json::from_str(body)
        .map_err(|e| PlatformError::Response(format!("unexpected cf curl response: {e}")))
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    resources: Vec<Resource<T>>,
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Resource<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct DomainEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpaceSummary {
    #[serde(default)]
    apps: Vec<SummaryApp>,
}

#[derive(Debug, Deserialize)]
struct SummaryApp {
    name: String,
    #[serde(default)]
    instances: u32,
    #[serde(default)]
    memory: u64,
    #[serde(default)]
    disk_quota: u64,
    #[serde(default)]
    routes: Vec<SummaryRoute>,
}

#[derive(Debug, Deserialize)]
struct SummaryRoute {
    #[serde(default)]
    host: String,
    domain: SummaryDomain,
    #[serde(default)]
    path: String,
    #[serde(default)]
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SummaryDomain {
    name: String,
}

impl From<SummaryApp> for PlatformApp {
    fn from(app: SummaryApp) -> Self {
        PlatformApp {
            name: app.name,
            routes: app.routes.into_iter().map(Route::from).collect(),
            scale: ScaleParameters {
                instance_count: app.instances,
                memory_mb: app.memory,
                disk_quota_mb: app.disk_quota,
            },
        }
    }
}

impl From<SummaryRoute> for Route {
    fn from(route: SummaryRoute) -> Self {
        let path = route.path.trim_start_matches('/');
        Route {
            host: route.host,
            domain_name: route.domain.name,
            path: (!path.is_empty()).then(|| path.to_string()),
            port: route.port.filter(|&port| port != 0),
        }
    }
}
