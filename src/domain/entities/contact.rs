//! Read-only view of portal users.
//!
//! The `users` table belongs to the account backend; chat only reads names,
//! email addresses and roles from it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::UserRole;
use crate::shared::error::AppError;

/// Contact details needed to address a chat notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub role: UserRole,
}

impl UserContact {
    /// "First Last", falling back to the email address.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }

    /// Name used in a salutation.
    pub fn greeting_name(&self) -> String {
        self.first_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| self.display_name())
    }
}

/// Lookup of portal users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_contact(&self, user_id: i64) -> Result<Option<UserContact>, AppError>;

    /// Ids of all admin accounts.
    async fn admin_ids(&self) -> Result<Vec<i64>, AppError>;
}
