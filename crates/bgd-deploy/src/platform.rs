//! Platform control interface.
//!
//! Everything the orchestrator does to the platform goes through
//! [`Platform`]. Implementations are thin transports; all sequencing and
//! policy lives in the orchestrator.

use std::path::PathBuf;

use async_trait::async_trait;

use bgd_core::{LiveApp, PlatformDomains, Route, RouteSet, ScaleParameters};

use crate::error::PlatformResult;

/// An app as listed by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformApp {
    pub name: String,
    pub routes: RouteSet,
    pub scale: ScaleParameters,
}

impl From<PlatformApp> for LiveApp {
    fn from(app: PlatformApp) -> Self {
        LiveApp {
            name: app.name,
            routes: app.routes,
            scale: app.scale,
        }
    }
}

/// Arguments for pushing a new app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    pub app_name: String,
    /// The single route the app is created with.
    pub route: Route,
    pub manifest_path: Option<PathBuf>,
    /// Unset fields are left to the platform's defaults.
    pub scale: ScaleParameters,
}

/// Operations on the targeted space. All calls may fail.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn list_apps(&self) -> PlatformResult<Vec<PlatformApp>>;

    async fn push(&self, request: &PushRequest) -> PlatformResult<()>;

    async fn delete(&self, app_name: &str) -> PlatformResult<()>;

    async fn rename(&self, from: &str, to: &str) -> PlatformResult<()>;

    async fn map_route(&self, app_name: &str, route: &Route) -> PlatformResult<()>;

    async fn unmap_route(&self, app_name: &str, route: &Route) -> PlatformResult<()>;

    async fn default_domain(&self) -> PlatformResult<String>;

    async fn shared_domains(&self) -> PlatformResult<Vec<String>>;

    async fn private_domains(&self) -> PlatformResult<Vec<String>>;

    /// Default, shared, and private domains in one value.
    async fn domains(&self) -> PlatformResult<PlatformDomains> {
        Ok(PlatformDomains {
            default_domain: self.default_domain().await?,
            shared: self.shared_domains().await?,
            private: self.private_domains().await?,
        })
    }
}
