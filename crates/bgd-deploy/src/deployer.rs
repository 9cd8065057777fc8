//! Deploy orchestrator driving the blue-green state machine.
//!
//! Phases run strictly in order, each blocking on its platform calls:
//!
//! ```text
//! Cleanup → Stage → Validate (optional) → Promote | Fail → Done
//! ```
//!
//! A failed smoke test renames the staging app to `-failed` and issues no
//! call at all against the live app. Any platform error ends the deploy
//! where it happened; completed steps are not compensated.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use bgd_core::config::ManifestErrorPolicy;
use bgd_core::routes::fqdn;
use bgd_core::{AppNames, AppSpec, LiveApp, PlatformDomains, Route, RouteSet};
use bgd_manifest::ManifestSource;

use crate::error::{DeployResult, during};
use crate::plan::DeploymentPlan;
use crate::platform::{Platform, PushRequest};
use crate::smoke::{SmokeTest, SmokeTestOutcome};

/// Current phase of a deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPhase {
    /// Reading domains and the manifest; nothing changed yet.
    Pending,
    /// Deleting leftover `-old`, `-new`, and `-failed` apps.
    Cleanup,
    /// Pushing the staging app with its probe route.
    Stage,
    /// Running the smoke test against the probe route.
    Validate,
    /// Moving routes and names over to the staging app.
    Promote,
    /// Setting the rejected staging app aside.
    Fail,
    Done,
}

/// Settings fixed for the lifetime of a [`Deployer`].
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Version of the tool performing the deploy, for logs.
    pub version: String,
    pub manifest_policy: ManifestErrorPolicy,
    pub smoke_test_timeout: Option<Duration>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            manifest_policy: ManifestErrorPolicy::default(),
            smoke_test_timeout: None,
        }
    }
}

/// What one invocation was asked to do.
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub app_name: String,
    /// Passed through to the push.
    pub manifest_path: Option<PathBuf>,
    pub smoke_test: Option<PathBuf>,
}

/// How a deploy ended, when no error stopped it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The staging app now runs under the target name with these routes.
    Promoted { app_name: String, routes: RouteSet },
    /// Validation failed; the staging app was renamed and the live app left alone.
    Failed { staged_as: String, reason: String },
}

/// Runs blue-green deploys against a platform.
pub struct Deployer<P> {
    platform: P,
    config: DeployConfig,
    phase: DeployPhase,
}

impl<P: Platform> Deployer<P> {
    pub fn new(platform: P, config: DeployConfig) -> Self {
        Self {
            platform,
            config,
            phase: DeployPhase::Pending,
        }
    }

    pub fn phase(&self) -> &DeployPhase {
        &self.phase
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Run one complete deploy.
    pub async fn deploy(
        &mut self,
        request: &DeployRequest,
        manifest: &dyn ManifestSource,
    ) -> DeployResult<DeployOutcome> {
        let app_name = request.app_name.as_str();
        info!(app = app_name, version = %self.config.version, "starting blue-green deploy");
        self.phase = DeployPhase::Pending;

        let domains = self
            .platform
            .domains()
            .await
            .map_err(during("could not look up domains"))?;
        debug!(default_domain = %domains.default_domain, "platform domains loaded");
        let manifest_app = self.load_manifest_app(manifest, app_name, &domains)?;

        self.enter(app_name, DeployPhase::Cleanup);
        let live_app = self.cleanup(&AppNames::new(app_name)).await?;

        let plan = DeploymentPlan::new(app_name, &domains, manifest_app.as_ref(), live_app);

        self.enter(app_name, DeployPhase::Stage);
        self.stage(&plan, request).await?;

        let validation = match &request.smoke_test {
            Some(script) => {
                self.enter(app_name, DeployPhase::Validate);
                SmokeTest::new(script, self.config.smoke_test_timeout)
                    .run(&fqdn(&plan.probe_route))
                    .await?
            }
            None => SmokeTestOutcome::Skipped,
        };

        debug!(
            app = app_name,
            routes = ?plan.desired_routes,
            "resolved routes for promoted app"
        );
        self.unmap_routes(&plan.staging_name, std::iter::once(&plan.probe_route))
            .await?;

        let outcome = if validation.passed() {
            self.enter(app_name, DeployPhase::Promote);
            self.promote(&plan).await?;
            DeployOutcome::Promoted {
                app_name: app_name.to_string(),
                routes: plan.desired_routes.clone(),
            }
        } else {
            self.enter(app_name, DeployPhase::Fail);
            self.fail(&plan).await?;
            DeployOutcome::Failed {
                staged_as: plan.failed_name.clone(),
                reason: validation.describe(),
            }
        };

        self.enter(app_name, DeployPhase::Done);
        Ok(outcome)
    }

    /// Resolve the manifest entry for `app_name`.
    ///
    /// This is the single place manifest problems are judged: with the
    /// `Warn` policy they are logged and the deploy continues on live-app and
    /// platform defaults; with `Abort` they end the deploy before any change.
    pub fn load_manifest_app(
        &self,
        manifest: &dyn ManifestSource,
        app_name: &str,
        domains: &PlatformDomains,
    ) -> DeployResult<Option<AppSpec>> {
        let resolved = manifest.load().and_then(|manifest| match manifest {
            Some(manifest) => manifest.app_params(app_name, domains),
            None => Ok(None),
        });
        match resolved {
            Ok(app) => {
                if app.is_none() {
                    debug!(app = app_name, "no manifest entry for app");
                }
                Ok(app)
            }
            Err(e) if self.config.manifest_policy == ManifestErrorPolicy::Warn => {
                warn!(app = app_name, error = %e, "ignoring manifest, using live app and platform defaults");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete stale versions and return the live app, if there is one.
    async fn cleanup(&self, names: &AppNames) -> DeployResult<Option<LiveApp>> {
        let apps = self
            .platform
            .list_apps()
            .await
            .map_err(during("could not load apps in space, are you logged in?"))?;

        for stale in names.stale(apps.iter().map(|app| app.name.as_str())) {
            info!(app = stale, "deleting old app version");
            self.platform
                .delete(stale)
                .await
                .map_err(during(format!("could not delete old app version {stale}")))?;
        }

        let live = apps
            .into_iter()
            .find(|app| app.name == names.live())
            .map(LiveApp::from);
        match &live {
            Some(live) => debug!(app = %live.name, routes = live.routes.len(), "found live app"),
            None => debug!(app = names.live(), "no live app, first deploy"),
        }
        Ok(live)
    }

    async fn stage(&self, plan: &DeploymentPlan, request: &DeployRequest) -> DeployResult<()> {
        let push = PushRequest {
            app_name: plan.staging_name.clone(),
            route: plan.probe_route.clone(),
            manifest_path: request.manifest_path.clone(),
            scale: plan.scale,
        };
        info!(app = %push.app_name, route = %push.route, scale = ?push.scale, "pushing staging app");
        self.platform
            .push(&push)
            .await
            .map_err(during(format!("could not push {}", push.app_name)))
    }

    async fn promote(&self, plan: &DeploymentPlan) -> DeployResult<()> {
        self.map_routes(&plan.staging_name, &plan.desired_routes).await?;

        match &plan.live_app {
            Some(live) => {
                self.rename(&live.name, &plan.old_name).await?;
                self.rename(&plan.staging_name, plan.app_name()).await?;
                self.unmap_routes(&plan.old_name, &live.routes).await?;
            }
            None => self.rename(&plan.staging_name, plan.app_name()).await?,
        }
        info!(app = plan.app_name(), routes = plan.desired_routes.len(), "promoted new version");
        Ok(())
    }

    async fn fail(&self, plan: &DeploymentPlan) -> DeployResult<()> {
        self.rename(&plan.staging_name, &plan.failed_name).await?;
        warn!(
            app = plan.app_name(),
            staged_as = %plan.failed_name,
            "smoke test failed, live app left untouched"
        );
        Ok(())
    }

    async fn map_routes(&self, app_name: &str, routes: &RouteSet) -> DeployResult<()> {
        for route in routes {
            debug!(app = app_name, route = %route, "mapping route");
            self.platform
                .map_route(app_name, route)
                .await
                .map_err(during(format!("could not map route {route} to {app_name}")))?;
        }
        Ok(())
    }

    async fn unmap_routes<'r, I>(&self, app_name: &str, routes: I) -> DeployResult<()>
    where
        I: IntoIterator<Item = &'r Route>,
    {
        for route in routes {
            debug!(app = app_name, route = %route, "unmapping route");
            self.platform
                .unmap_route(app_name, route)
                .await
                .map_err(during(format!("could not unmap route {route} from {app_name}")))?;
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> DeployResult<()> {
        debug!(from, to, "renaming app");
        self.platform
            .rename(from, to)
            .await
            .map_err(during(format!("could not rename app {from} to {to}")))
    }

    fn enter(&mut self, app_name: &str, phase: DeployPhase) {
        info!(app = app_name, phase = ?phase, "entering phase");
        self.phase = phase;
    }
}
