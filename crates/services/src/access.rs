use std::collections::HashSet;
use std::sync::Arc;

use course_core::model::{Role, User, UserId, normalize_email};
use storage::repository::{StorageError, UserRepository};

use crate::error::AccessError;

/// Decides whether a resolved user may run administrator operations.
pub trait AdminPolicy: Send + Sync {
    fn is_admin(&self, user: &User) -> bool;
}

/// Admin policy backed by the `Admin` role plus a configured email list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailAllowList {
    emails: HashSet<String>,
}

impl EmailAllowList {
    #[must_use]
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| normalize_email(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Parses a comma-separated list, ignoring blanks.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl AdminPolicy for EmailAllowList {
    fn is_admin(&self, user: &User) -> bool {
        user.role == Role::Admin || self.contains(&user.email)
    }
}

/// Resolves forwarded identities and gates admin-only operations.
#[derive(Clone)]
pub struct AccessService {
    users: Arc<dyn UserRepository>,
    policy: Arc<dyn AdminPolicy>,
}

impl AccessService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, policy: Arc<dyn AdminPolicy>) -> Self {
        Self { users, policy }
    }

    /// Look up the caller in the user directory.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Unauthorized` when the id is unknown.
    /// Returns `AccessError::Storage` if repository access fails.
    pub async fn resolve(&self, user_id: UserId) -> Result<User, AccessError> {
        match self.users.get_user(user_id).await {
            Ok(user) => Ok(user),
            Err(StorageError::NotFound) => Err(AccessError::Unauthorized),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the caller and require administrator rights.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Unauthorized` for an unknown caller and
    /// `AccessError::Forbidden` when the policy rejects them.
    pub async fn require_admin(&self, user_id: UserId) -> Result<User, AccessError> {
        let user = self.resolve(user_id).await?;
        if self.policy.is_admin(&user) {
            Ok(user)
        } else {
            tracing::warn!(user_id = %user_id, "admin operation refused");
            Err(AccessError::Forbidden)
        }
    }

    #[must_use]
    pub fn is_admin(&self, user: &User) -> bool {
        self.policy.is_admin(user)
    }
}
