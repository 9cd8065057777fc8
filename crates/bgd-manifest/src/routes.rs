//! Route declarations in a manifest entry.
//!
//! Two syntaxes are supported:
//! - `host`/`hosts` crossed with `domain`/`domains` (default domain when no
//!   domain is declared),
//! - `routes: [{route: "host.domain[:port][/path]"}]`, decomposed against
//!   the platform's known domains.

use bgd_core::{Domain, PlatformDomains, Route};

/// Cartesian product of hosts and domains.
pub fn routes_from_hosts(default_domain: &str, hosts: &[String], domains: &[String]) -> Vec<Route> {
    let mut routes = Vec::new();
    for host in hosts {
        if domains.is_empty() {
            routes.push(Route::new(host.as_str(), default_domain));
            continue;
        }
        for domain in domains {
            routes.push(Route::new(host.as_str(), domain.as_str()));
        }
    }
    routes
}

/// Decompose a `routes:` entry string into a route.
pub fn parse_route(raw: &str, domains: &PlatformDomains) -> Result<Route, String> {
    let (without_path, path) = split_path(raw);
    let (name, port) = split_port(without_path)?;
    let (host, domain) = decompose(name, domains)
        .ok_or_else(|| format!("The route {name} did not match any existing domains"))?;
    Ok(Route {
        host,
        domain_name: domain.name,
        path: path.map(str::to_string),
        port,
    })
}

/// Split at the first `/`; the path is everything after it.
fn split_path(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('/') {
        Some((name, path)) if !path.is_empty() => (name, Some(path)),
        Some((name, _)) => (name, None),
        None => (raw, None),
    }
}

/// Split a single trailing `:port`. A port of 0 means none.
fn split_port(raw: &str) -> Result<(&str, Option<u16>), String> {
    let mut parts = raw.split(':');
    let name = parts.next().unwrap_or_default();
    match (parts.next(), parts.next()) {
        (Some(port), None) => {
            let port: u16 = port
                .parse()
                .map_err(|_| format!("Invalid port for route {raw}"))?;
            Ok((name, (port != 0).then_some(port)))
        }
        _ => Ok((name, None)),
    }
}

/// Find the domain a route name belongs to, and the hostname in front of it.
///
/// Shared domains are tried before private ones. Within each group the whole
/// name is tried first (bare domain, empty host), then leading labels are
/// moved into the host one at a time until a known domain remains.
pub fn decompose(name: &str, domains: &PlatformDomains) -> Option<(String, Domain)> {
    for (kind, candidates) in domains.by_priority() {
        let known = |suffix: &str| candidates.iter().any(|d| d == suffix);

        if known(name) {
            return Some((String::new(), Domain { name: name.to_string(), kind }));
        }

        let labels: Vec<&str> = name.split('.').collect();
        for split in 1..labels.len() {
            let suffix = labels[split..].join(".");
            if known(&suffix) {
                return Some((labels[..split].join("."), Domain { name: suffix, kind }));
            }
        }
    }
    None
}
