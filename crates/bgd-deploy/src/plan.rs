//! Per-invocation deployment plan.
//!
//! Derived from the target name, the platform's domains, the manifest entry
//! for the app, and the live app. Nothing here is persisted.

use bgd_core::routes::resolve;
use bgd_core::{AppNames, AppSpec, LiveApp, PlatformDomains, Route, RouteSet, ScaleParameters};

#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub names: AppNames,
    pub staging_name: String,
    pub old_name: String,
    pub failed_name: String,
    /// The staging app's only route until promotion.
    pub probe_route: Route,
    /// Routes the promoted app must own.
    pub desired_routes: RouteSet,
    pub scale: ScaleParameters,
    pub live_app: Option<LiveApp>,
}

impl DeploymentPlan {
    pub fn new(
        app_name: &str,
        domains: &PlatformDomains,
        manifest_app: Option<&AppSpec>,
        live_app: Option<LiveApp>,
    ) -> Self {
        let names = AppNames::new(app_name);
        let staging_name = names.staging();
        let probe_route = Route::new(staging_name.as_str(), domains.default_domain.as_str());

        let manifest_routes = manifest_app.map(|app| app.routes.clone()).unwrap_or_default();
        let live_routes = live_app.as_ref().map(|app| app.routes.clone()).unwrap_or_default();
        let desired_routes = resolve(
            &manifest_routes,
            &live_routes,
            app_name,
            &domains.default_domain,
        );

        let manifest_scale = manifest_app.map(|app| app.scale).unwrap_or_default();
        let scale = match &live_app {
            Some(live) => manifest_scale.or(&live.scale),
            None => manifest_scale,
        };

        Self {
            old_name: names.old(),
            failed_name: names.failed(),
            names,
            staging_name,
            probe_route,
            desired_routes,
            scale,
            live_app,
        }
    }

    pub fn app_name(&self) -> &str {
        self.names.live()
    }
}
