//! Shared-secret admin gate.
//!
//! The gate compares a supplied secret against the configured one and, on a
//! match, hands out an [`AdminToken`]. Every admin-only operation takes the
//! token by reference, so holding one is the only way to reach them. There is
//! no session, expiry, lockout or audit trail.

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Proof that the caller supplied the admin secret.
///
/// Can only be obtained from [`AccessGate::grant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminToken {
    _private: (),
}

/// Checks supplied secrets against the process-wide admin secret.
pub struct AccessGate {
    secret: String,
}

impl AccessGate {
    /// Create a gate for `secret`.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Create a gate from the `access` section of the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        if config.uses_default_secret() {
            warn!("Using the built-in admin secret; set access.admin_secret");
        }
        Self::new(config.access.admin_secret.clone())
    }

    /// Check whether `supplied` equals the admin secret.
    #[must_use]
    pub fn authenticate(&self, supplied: &str) -> bool {
        supplied == self.secret
    }

    /// Exchange the admin secret for a capability token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if `supplied` is not the admin secret.
    pub fn grant(&self, supplied: &str) -> Result<AdminToken> {
        if self.authenticate(supplied) {
            debug!("Admin token granted");
            Ok(AdminToken { _private: () })
        } else {
            warn!("Rejected admin secret");
            Err(Error::Unauthorized)
        }
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("secret", &"<redacted>")
            .finish()
    }
}
