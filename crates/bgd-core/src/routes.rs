//! Route resolution for the promoted app.

use tracing::debug;

use crate::types::{Route, RouteSet};

/// Routes the promoted app must own: the union of what the manifest declares
/// and what the live app already serves.
///
/// Falls back to `{app_name}.{default_domain}` when both inputs are empty, so
/// the result is never empty.
pub fn resolve(
    manifest_routes: &RouteSet,
    live_routes: &RouteSet,
    app_name: &str,
    default_domain: &str,
) -> RouteSet {
    let mut routes: RouteSet = manifest_routes.union(live_routes).cloned().collect();
    if routes.is_empty() {
        debug!(app = app_name, domain = default_domain, "no declared routes, using default");
        routes.insert(Route::new(app_name, default_domain));
    }
    routes
}

/// `{host}.{domain}` for a route.
pub fn fqdn(route: &Route) -> String {
    route.fqdn()
}
