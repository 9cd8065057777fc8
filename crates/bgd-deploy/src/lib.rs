//! bgd-deploy: the blue-green deployment orchestrator.
//!
//! A [`Deployer`] drives one deploy against a [`Platform`]:
//!
//! 1. delete stale `-old`, `-new`, and `-failed` versions of the app
//! 2. push `<app>-new` with a single probe route on the default domain
//! 3. optionally run a smoke test script against the probe route
//! 4. unmap the probe route, then either promote the new version or
//!    rename it to `<app>-failed` and leave the live app alone
//!
//! Route and scale decisions are made up front in a [`DeploymentPlan`].

pub mod deployer;
pub mod error;
pub mod plan;
pub mod platform;
pub mod smoke;

pub use deployer::{DeployConfig, DeployOutcome, DeployPhase, DeployRequest, Deployer};
pub use error::{DeployError, DeployResult, PlatformError, PlatformResult};
pub use plan::DeploymentPlan;
pub use platform::{Platform, PlatformApp, PushRequest};
pub use smoke::{SmokeTest, SmokeTestOutcome};
