//! End-to-end deploy scenarios.
//!
//! Every scenario runs against an in-memory platform that applies each call
//! to its own app table and records it, so tests can assert both the final
//! state of the space and the exact order of operations.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use bgd_core::config::ManifestErrorPolicy;
use bgd_core::{Route, RouteSet, ScaleParameters};
use bgd_deploy::*;
use bgd_manifest::{Manifest, ManifestError, ManifestResult, ManifestSource};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Push {
        app: String,
        route: Route,
        scale: ScaleParameters,
    },
    Delete(String),
    Rename(String, String),
    Map(String, Route),
    Unmap(String, Route),
}

impl Call {
    /// Apps this call acts on.
    fn targets(&self) -> Vec<&str> {
        match self {
            Call::Push { app, .. } | Call::Delete(app) | Call::Map(app, _) | Call::Unmap(app, _) => {
                vec![app.as_str()]
            }
            Call::Rename(from, to) => vec![from.as_str(), to.as_str()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Push,
    Rename,
    Map,
}

#[derive(Default)]
struct FakeState {
    apps: BTreeMap<String, PlatformApp>,
    calls: Vec<Call>,
    fail_on: Option<Op>,
}

#[derive(Default)]
struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    fn with_apps(apps: Vec<PlatformApp>) -> Self {
        let platform = Self::default();
        {
            let mut state = platform.state.lock().unwrap();
            for app in apps {
                state.apps.insert(app.name.clone(), app);
            }
        }
        platform
    }

    fn failing_on(self, op: Op) -> Self {
        self.state.lock().unwrap().fail_on = Some(op);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn app(&self, name: &str) -> Option<PlatformApp> {
        self.state.lock().unwrap().apps.get(name).cloned()
    }

    fn app_names(&self) -> Vec<String> {
        self.state.lock().unwrap().apps.keys().cloned().collect()
    }

    fn record(&self, op: Option<Op>, call: Call) -> PlatformResult<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        if op.is_some() && state.fail_on == op {
            return Err(PlatformError::Command {
                command: format!("{call:?}"),
                message: "injected failure".to_string(),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn list_apps(&self) -> PlatformResult<Vec<PlatformApp>> {
        Ok(self.state.lock().unwrap().apps.values().cloned().collect())
    }

    async fn push(&self, request: &PushRequest) -> PlatformResult<()> {
        let call = Call::Push {
            app: request.app_name.clone(),
            route: request.route.clone(),
            scale: request.scale,
        };
        let mut state = self.record(Some(Op::Push), call)?;
        state.apps.insert(
            request.app_name.clone(),
            PlatformApp {
                name: request.app_name.clone(),
                routes: [request.route.clone()].into_iter().collect(),
                scale: request.scale,
            },
        );
        Ok(())
    }

    async fn delete(&self, app_name: &str) -> PlatformResult<()> {
        let mut state = self.record(None, Call::Delete(app_name.to_string()))?;
        state.apps.remove(app_name);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> PlatformResult<()> {
        let mut state = self.record(Some(Op::Rename), Call::Rename(from.to_string(), to.to_string()))?;
        let mut app = state
            .apps
            .remove(from)
            .ok_or_else(|| PlatformError::Response(format!("no app named {from}")))?;
        app.name = to.to_string();
        state.apps.insert(to.to_string(), app);
        Ok(())
    }

    async fn map_route(&self, app_name: &str, route: &Route) -> PlatformResult<()> {
        let mut state = self.record(Some(Op::Map), Call::Map(app_name.to_string(), route.clone()))?;
        if let Some(app) = state.apps.get_mut(app_name) {
            app.routes.insert(route.clone());
        }
        Ok(())
    }

    async fn unmap_route(&self, app_name: &str, route: &Route) -> PlatformResult<()> {
        let mut state = self.record(None, Call::Unmap(app_name.to_string(), route.clone()))?;
        if let Some(app) = state.apps.get_mut(app_name) {
            app.routes.remove(route);
        }
        Ok(())
    }

    async fn default_domain(&self) -> PlatformResult<String> {
        Ok("example.com".to_string())
    }

    async fn shared_domains(&self) -> PlatformResult<Vec<String>> {
        Ok(vec!["example.com".to_string()])
    }

    async fn private_domains(&self) -> PlatformResult<Vec<String>> {
        Ok(vec!["corp.internal".to_string()])
    }
}

/// Manifest source that always fails to load.
struct BrokenManifest;

impl ManifestSource for BrokenManifest {
    fn load(&self) -> ManifestResult<Option<Manifest>> {
        Err(ManifestError::Parse("Invalid manifest. Expected a map".to_string()))
    }
}

fn no_manifest() -> Option<Manifest> {
    None
}

fn live_app(name: &str, routes: &[Route]) -> PlatformApp {
    PlatformApp {
        name: name.to_string(),
        routes: routes.iter().cloned().collect(),
        scale: ScaleParameters {
            instance_count: 2,
            memory_mb: 256,
            disk_quota_mb: 1024,
        },
    }
}

fn request(app: &str, smoke_test: Option<&str>) -> DeployRequest {
    DeployRequest {
        app_name: app.to_string(),
        manifest_path: None,
        smoke_test: smoke_test.map(PathBuf::from),
    }
}

fn routes(list: &[Route]) -> RouteSet {
    list.iter().cloned().collect()
}

fn route(host: &str) -> Route {
    Route::new(host, "example.com")
}

#[tokio::test]
async fn first_deploy_without_manifest() {
    let mut deployer = Deployer::new(FakePlatform::default(), DeployConfig::default());

    let outcome = deployer.deploy(&request("foo", None), &no_manifest()).await.unwrap();

    assert_eq!(
        outcome,
        DeployOutcome::Promoted {
            app_name: "foo".to_string(),
            routes: routes(&[route("foo")]),
        }
    );
    assert_eq!(deployer.phase(), &DeployPhase::Done);

    let platform = deployer.platform();
    assert_eq!(platform.app_names(), vec!["foo".to_string()]);
    assert_eq!(platform.app("foo").unwrap().routes, routes(&[route("foo")]));
    assert_eq!(
        platform.calls(),
        vec![
            Call::Push {
                app: "foo-new".to_string(),
                route: route("foo-new"),
                scale: ScaleParameters::default(),
            },
            Call::Unmap("foo-new".to_string(), route("foo-new")),
            Call::Map("foo-new".to_string(), route("foo")),
            Call::Rename("foo-new".to_string(), "foo".to_string()),
        ]
    );
}

#[tokio::test]
async fn promotion_moves_every_live_route() {
    let platform = FakePlatform::with_apps(vec![live_app("app", &[route("app"), route("www")])]);
    let mut deployer = Deployer::new(platform, DeployConfig::default());

    let outcome = deployer.deploy(&request("app", None), &no_manifest()).await.unwrap();
    assert!(matches!(outcome, DeployOutcome::Promoted { .. }));

    let platform = deployer.platform();
    assert_eq!(platform.app_names(), vec!["app".to_string(), "app-old".to_string()]);
    assert_eq!(platform.app("app").unwrap().routes, routes(&[route("app"), route("www")]));
    assert!(platform.app("app-old").unwrap().routes.is_empty());

    // Live scale is carried over when the manifest says nothing.
    let pushed = platform.calls().into_iter().find_map(|call| match call {
        Call::Push { scale, .. } => Some(scale),
        _ => None,
    });
    assert_eq!(pushed, Some(live_app("app", &[]).scale));
}

#[tokio::test]
async fn promotion_renames_before_unmapping_old_routes() {
    let platform = FakePlatform::with_apps(vec![live_app("app", &[route("app")])]);
    let mut deployer = Deployer::new(platform, DeployConfig::default());
    deployer.deploy(&request("app", None), &no_manifest()).await.unwrap();

    let calls = deployer.platform().calls();
    let tail: Vec<_> = calls.iter().skip_while(|call| !matches!(call, Call::Map(..))).collect();
    assert_eq!(
        tail,
        vec![
            &Call::Map("app-new".to_string(), route("app")),
            &Call::Rename("app".to_string(), "app-old".to_string()),
            &Call::Rename("app-new".to_string(), "app".to_string()),
            &Call::Unmap("app-old".to_string(), route("app")),
        ]
    );
}

#[tokio::test]
async fn stale_versions_are_deleted_first() {
    let platform = FakePlatform::with_apps(vec![
        live_app("app", &[route("app")]),
        live_app("app-failed", &[]),
        live_app("app-new", &[]),
        live_app("app-old", &[]),
        live_app("app-other", &[route("other")]),
        live_app("myapp-old", &[]),
    ]);
    let mut deployer = Deployer::new(platform, DeployConfig::default());
    deployer.deploy(&request("app", None), &no_manifest()).await.unwrap();

    let platform = deployer.platform();
    let calls = platform.calls();
    assert_eq!(
        &calls[..3],
        &[
            Call::Delete("app-failed".to_string()),
            Call::Delete("app-new".to_string()),
            Call::Delete("app-old".to_string()),
        ]
    );
    assert!(!calls.iter().any(|call| call.targets().contains(&"app-other")));
    assert!(!calls.iter().any(|call| call.targets().contains(&"myapp-old")));
    assert_eq!(
        platform.app_names(),
        vec!["app", "app-old", "app-other", "myapp-old"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn manifest_routes_and_scale_apply() {
    let manifest = Manifest::from_yaml(
        "applications:\n- name: app\n  instances: 3\n  memory: 1G\n  routes:\n  - route: api.corp.internal/v1\n",
    )
    .unwrap();
    let platform = FakePlatform::with_apps(vec![live_app("app", &[route("app")])]);
    let mut deployer = Deployer::new(platform, DeployConfig::default());

    let outcome = deployer.deploy(&request("app", None), &manifest).await.unwrap();

    let api = Route::new("api", "corp.internal").with_path("v1");
    assert_eq!(
        outcome,
        DeployOutcome::Promoted {
            app_name: "app".to_string(),
            routes: routes(&[route("app"), api.clone()]),
        }
    );
    let platform = deployer.platform();
    assert_eq!(platform.app("app").unwrap().routes, routes(&[route("app"), api]));
    assert_eq!(
        platform.calls()[0],
        Call::Push {
            app: "app-new".to_string(),
            route: route("app-new"),
            scale: ScaleParameters {
                instance_count: 3,
                memory_mb: 1024,
                disk_quota_mb: 1024,
            },
        }
    );
}

#[tokio::test]
async fn broken_manifest_warns_and_continues_by_default() {
    let platform = FakePlatform::with_apps(vec![live_app("app", &[route("app")])]);
    let mut deployer = Deployer::new(platform, DeployConfig::default());

    let outcome = deployer.deploy(&request("app", None), &BrokenManifest).await.unwrap();
    assert_eq!(
        outcome,
        DeployOutcome::Promoted {
            app_name: "app".to_string(),
            routes: routes(&[route("app")]),
        }
    );
}

#[tokio::test]
async fn broken_manifest_aborts_before_any_change() {
    let platform = FakePlatform::with_apps(vec![live_app("app", &[route("app")])]);
    let config = DeployConfig {
        manifest_policy: ManifestErrorPolicy::Abort,
        ..DeployConfig::default()
    };
    let mut deployer = Deployer::new(platform, config);

    let err = deployer.deploy(&request("app", None), &BrokenManifest).await.unwrap_err();
    assert!(matches!(err, DeployError::Manifest(ManifestError::Parse(_))));
    assert!(deployer.platform().calls().is_empty());
    assert_eq!(deployer.phase(), &DeployPhase::Pending);
}

#[cfg(unix)]
#[tokio::test]
async fn passing_smoke_test_promotes() {
    let platform = FakePlatform::with_apps(vec![live_app("app", &[route("app")])]);
    let mut deployer = Deployer::new(platform, DeployConfig::default());

    let outcome = deployer
        .deploy(&request("app", Some("true")), &no_manifest())
        .await
        .unwrap();
    assert!(matches!(outcome, DeployOutcome::Promoted { .. }));
    assert!(deployer.platform().app("app-old").is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn failing_smoke_test_leaves_live_app_alone() {
    let platform = FakePlatform::with_apps(vec![live_app("app", &[route("app"), route("www")])]);
    let mut deployer = Deployer::new(platform, DeployConfig::default());

    let outcome = deployer
        .deploy(&request("app", Some("false")), &no_manifest())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DeployOutcome::Failed {
            staged_as: "app-failed".to_string(),
            reason: "smoke test exited with status 1".to_string(),
        }
    );
    assert_eq!(deployer.phase(), &DeployPhase::Done);

    let platform = deployer.platform();
    assert!(!platform.calls().iter().any(|call| call.targets().contains(&"app")));
    assert_eq!(platform.app("app").unwrap().routes, routes(&[route("app"), route("www")]));
    assert!(platform.app("app-failed").unwrap().routes.is_empty());
    assert!(platform.app("app-new").is_none());
    assert_eq!(
        platform.calls().last(),
        Some(&Call::Rename("app-new".to_string(), "app-failed".to_string()))
    );
}

#[tokio::test]
async fn unlaunchable_smoke_test_ends_the_deploy() {
    let platform = FakePlatform::with_apps(vec![live_app("app", &[route("app")])]);
    let mut deployer = Deployer::new(platform, DeployConfig::default());

    let err = deployer
        .deploy(&request("app", Some("/nonexistent/smoke-test")), &no_manifest())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::SmokeTestLaunch { .. }));
    assert_eq!(deployer.phase(), &DeployPhase::Validate);

    // The staging app stays where it was pushed.
    let platform = deployer.platform();
    assert_eq!(platform.app("app-new").unwrap().routes, routes(&[route("app-new")]));
    assert_eq!(platform.app("app").unwrap().routes, routes(&[route("app")]));
}

#[tokio::test]
async fn platform_error_stops_the_deploy() {
    let platform =
        FakePlatform::with_apps(vec![live_app("app", &[route("app")])]).failing_on(Op::Rename);
    let mut deployer = Deployer::new(platform, DeployConfig::default());

    let err = deployer.deploy(&request("app", None), &no_manifest()).await.unwrap_err();
    match err {
        DeployError::Platform { operation, .. } => {
            assert_eq!(operation, "could not rename app app to app-old");
        }
        other => panic!("expected platform error, got {other:?}"),
    }
    assert_eq!(deployer.phase(), &DeployPhase::Promote);
    assert_eq!(
        deployer.platform().calls().last(),
        Some(&Call::Rename("app".to_string(), "app-old".to_string()))
    );
}

#[tokio::test]
async fn failed_push_is_terminal() {
    let platform = FakePlatform::default().failing_on(Op::Push);
    let mut deployer = Deployer::new(platform, DeployConfig::default());

    let err = deployer.deploy(&request("app", None), &no_manifest()).await.unwrap_err();
    assert!(matches!(err, DeployError::Platform { .. }));
    assert_eq!(deployer.platform().calls().len(), 1);
    assert!(deployer.platform().app_names().is_empty());
}

#[tokio::test]
async fn failed_route_mapping_keeps_names_in_place() {
    let platform =
        FakePlatform::with_apps(vec![live_app("app", &[route("app")])]).failing_on(Op::Map);
    let mut deployer = Deployer::new(platform, DeployConfig::default());

    let err = deployer.deploy(&request("app", None), &no_manifest()).await.unwrap_err();
    assert!(matches!(err, DeployError::Platform { .. }));

    let platform = deployer.platform();
    assert!(!platform.calls().iter().any(|call| matches!(call, Call::Rename(..))));
    assert_eq!(platform.app("app").unwrap().routes, routes(&[route("app")]));
    assert!(platform.app("app-new").unwrap().routes.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn smoke_test_targets_the_probe_route() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("smoke.sh");
    std::fs::write(&script, "#!/bin/sh\n[ \"$1\" = app-new.example.com ]\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let platform = FakePlatform::with_apps(vec![live_app("app", &[route("app")])]);
    let mut deployer = Deployer::new(platform, DeployConfig::default());
    let request = DeployRequest {
        smoke_test: Some(script),
        ..request("app", None)
    };

    let outcome = deployer.deploy(&request, &no_manifest()).await.unwrap();
    assert!(matches!(outcome, DeployOutcome::Promoted { .. }));
}
