//! Shared types used across the blue-green deploy crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A route forwarding traffic to an app.
///
/// Identity is the full `(host, domain_name, path, port)` tuple, so routes
/// can be held in ordered sets without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Hostname label(s). Empty when the route is the bare domain.
    pub host: String,
    pub domain_name: String,
    /// Context path, stored without the leading `/`.
    pub path: Option<String>,
    pub port: Option<u16>,
}

impl Route {
    /// An HTTP route with no path and no port.
    pub fn new(host: impl Into<String>, domain_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            domain_name: domain_name.into(),
            path: None,
            port: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Externally addressable name: always `{host}.{domain_name}`.
    ///
    /// Smoke-test scripts receive this string as their only argument, so the
    /// format is fixed.
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.host, self.domain_name)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_empty() {
            write!(f, "{}", self.domain_name)?;
        } else {
            write!(f, "{}.{}", self.host, self.domain_name)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if let Some(path) = &self.path {
            write!(f, "/{path}")?;
        }
        Ok(())
    }
}

/// Deduplicated, deterministically ordered collection of routes.
pub type RouteSet = BTreeSet<Route>;

/// Whether a domain is shared across all orgs or owned by one org.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Shared,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub kind: DomainKind,
}

/// Domains visible to the targeted space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformDomains {
    /// Domain used when a route or push does not name one.
    pub default_domain: String,
    pub shared: Vec<String>,
    pub private: Vec<String>,
}

impl PlatformDomains {
    pub fn new(default_domain: impl Into<String>) -> Self {
        Self {
            default_domain: default_domain.into(),
            shared: Vec::new(),
            private: Vec::new(),
        }
    }

    /// Groups of candidate domains in matching priority order: every shared
    /// domain is considered before any private one.
    pub fn by_priority(&self) -> [(DomainKind, &[String]); 2] {
        [
            (DomainKind::Shared, self.shared.as_slice()),
            (DomainKind::Private, self.private.as_slice()),
        ]
    }
}

/// Instance count and resource quotas. Zero means "unset".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleParameters {
    pub instance_count: u32,
    pub memory_mb: u64,
    pub disk_quota_mb: u64,
}

impl ScaleParameters {
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    /// Keep every explicitly set field and fill the unset ones from `fallback`.
    pub fn or(self, fallback: &ScaleParameters) -> ScaleParameters {
        ScaleParameters {
            instance_count: non_zero_or(self.instance_count, fallback.instance_count),
            memory_mb: non_zero_or(self.memory_mb, fallback.memory_mb),
            disk_quota_mb: non_zero_or(self.disk_quota_mb, fallback.disk_quota_mb),
        }
    }
}

fn non_zero_or<T: Default + PartialEq>(value: T, fallback: T) -> T {
    if value == T::default() { fallback } else { value }
}

/// One application as described by a resolved manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSpec {
    /// `None` when the manifest entry carries no `name`.
    pub name: Option<String>,
    pub routes: RouteSet,
    pub scale: ScaleParameters,
}

impl AppSpec {
    /// An entry applies to `app_name` if it names that app or names none.
    pub fn applies_to(&self, app_name: &str) -> bool {
        self.name.as_deref().is_none_or(|name| name == app_name)
    }
}

/// The currently promoted app, as observed on the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveApp {
    pub name: String,
    pub routes: RouteSet,
    pub scale: ScaleParameters,
}
