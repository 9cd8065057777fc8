//! App naming convention for blue-green deploys.
//!
//! A deploy of `app` owns up to four platform apps: the live `app`, the
//! staging `app-new`, the previous `app-old`, and a rejected `app-failed`.
//! A name belongs to the deploy only when it is exactly `app` or `app`
//! followed by one of the three suffixes, so `other-app-old` or `app-older`
//! never do.

pub const STAGING_SUFFIX: &str = "-new";
pub const OLD_SUFFIX: &str = "-old";
pub const FAILED_SUFFIX: &str = "-failed";

/// Role a platform app name plays relative to the target app name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRole {
    /// Exactly the target name.
    Live,
    Old,
    New,
    Failed,
    Unrelated,
}

impl AppRole {
    /// Leftover versions from a previous deploy, removed before staging.
    pub fn is_stale(self) -> bool {
        matches!(self, AppRole::Old | AppRole::New | AppRole::Failed)
    }
}

/// Derived names and classifier for one target app.
#[derive(Debug, Clone)]
pub struct AppNames {
    app_name: String,
}

impl AppNames {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
        }
    }

    pub fn live(&self) -> &str {
        &self.app_name
    }

    pub fn staging(&self) -> String {
        format!("{}{STAGING_SUFFIX}", self.app_name)
    }

    pub fn old(&self) -> String {
        format!("{}{OLD_SUFFIX}", self.app_name)
    }

    pub fn failed(&self) -> String {
        format!("{}{FAILED_SUFFIX}", self.app_name)
    }

    pub fn classify(&self, name: &str) -> AppRole {
        match name.strip_prefix(self.app_name.as_str()) {
            Some("") => AppRole::Live,
            Some(OLD_SUFFIX) => AppRole::Old,
            Some(STAGING_SUFFIX) => AppRole::New,
            Some(FAILED_SUFFIX) => AppRole::Failed,
            _ => AppRole::Unrelated,
        }
    }

    /// Names left behind by earlier deploys of this app, in input order.
    pub fn stale<'a, I>(&self, names: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter(|name| self.classify(name).is_stale())
            .collect()
    }
}
