//! Forking policy settings.
//!
//! One [`ProxySettings`] value travels with each proxy operation. The core
//! copies the relevant pieces onto every branch it creates, so changing a
//! setting mid-operation only affects branches created afterwards (except
//! for the proxy timeout, which the core propagates to live branches
//! explicitly).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default overall timeout for a proxy operation.
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(180);

/// Policy knobs for one proxy operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Start all branches at once (true) or one at a time (false).
    pub parallel: bool,
    /// Follow 3xx redirects by forking onto their Contact URIs.
    pub recurse: bool,
    /// Insert this element into the route set for in-dialog requests.
    pub record_route: bool,
    /// Insert a Path entry on REGISTER-style flows.
    pub add_to_path: bool,
    /// Stay in the response path and aggregate (true) or hand the first
    /// final response straight through (false).
    pub supervised: bool,
    /// Suppress the automatic CANCEL of losing branches on a 2xx/6xx win.
    pub no_cancel: bool,
    /// How long a branch may run without a final response.
    pub proxy_timeout: Duration,
    /// Shorter deadline for the first provisional response, when set.
    pub timeout_1xx: Option<Duration>,
    /// Per-attempt deadline used instead of `proxy_timeout` in sequential
    /// mode, when set.
    pub sequential_search_timeout: Option<Duration>,
}

impl Default for ProxySettings {
    fn default() -> Self {
        ProxySettings {
            parallel: true,
            recurse: true,
            record_route: false,
            add_to_path: false,
            supervised: true,
            no_cancel: false,
            proxy_timeout: DEFAULT_PROXY_TIMEOUT,
            timeout_1xx: None,
            sequential_search_timeout: None,
        }
    }
}

impl ProxySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn with_supervised(mut self, supervised: bool) -> Self {
        self.supervised = supervised;
        self
    }

    pub fn with_no_cancel(mut self, no_cancel: bool) -> Self {
        self.no_cancel = no_cancel;
        self
    }

    pub fn with_proxy_timeout(mut self, timeout: Duration) -> Self {
        self.proxy_timeout = timeout;
        self
    }

    pub fn with_timeout_1xx(mut self, timeout: Duration) -> Self {
        self.timeout_1xx = Some(timeout);
        self
    }

    pub fn with_sequential_search_timeout(mut self, timeout: Duration) -> Self {
        self.sequential_search_timeout = Some(timeout);
        self
    }

    /// Effective per-branch timeout in the current mode. In sequential mode
    /// a configured sequential-search timeout replaces the overall timeout.
    pub fn branch_timeout(&self) -> Duration {
        if self.parallel {
            self.proxy_timeout
        } else {
            self.sequential_search_timeout.unwrap_or(self.proxy_timeout)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.proxy_timeout.is_zero() {
            return Err("proxy timeout must be positive".to_string());
        }
        if matches!(self.timeout_1xx, Some(t) if t.is_zero()) {
            return Err("1xx timeout must be positive".to_string());
        }
        if matches!(self.sequential_search_timeout, Some(t) if t.is_zero()) {
            return Err("sequential search timeout must be positive".to_string());
        }
        Ok(())
    }
}
