//! Who is performing a write.

use crate::error::{DataError, DataResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id.
    pub user_id: String,
    /// Name shown on attributed records.
    pub display_name: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Source of the current caller identity.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, if any.
    fn current(&self) -> Option<Identity>;

    /// The current identity, or `Unauthorized`.
    fn require(&self) -> DataResult<Identity> {
        self.current()
            .ok_or_else(|| DataError::unauthorized("no signed-in identity"))
    }
}

/// An identity that only changes when told to.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    identity: RwLock<Option<Identity>>,
}

impl StaticIdentity {
    /// Signed in as `identity`.
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
        }
    }

    /// Nobody signed in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Replaces the current identity.
    pub fn set(&self, identity: Option<Identity>) {
        *self.identity.write() = identity;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<Identity> {
        self.identity.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn anonymous_is_unauthorized() {
        let provider = StaticIdentity::anonymous();
        assert!(provider.current().is_none());
        assert_eq!(provider.require().unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn sign_in_and_out() {
        let provider = StaticIdentity::anonymous();
        provider.set(Some(Identity::new("u1", "Ana")));
        assert_eq!(provider.require().unwrap().user_id, "u1");
        provider.set(None);
        assert!(provider.require().is_err());
    }
}
