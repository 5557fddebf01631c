//! Closed role set and the authorization checks built on it.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use super::{
    errors::{AuthError, AuthResult},
    models::{Principal, UserId},
};

/// User role. New accounts start as `Viewer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Editor,
    #[default]
    Viewer,
}

/// Roles allowed on user-administration routes.
pub const ADMINISTRATORS: &[Role] = &[Role::Admin];

/// Roles allowed on content mutation routes.
pub const CONTENT_AUTHORS: &[Role] = &[Role::Admin, Role::Editor];

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Viewer => "Viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`Role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid role")]
pub struct ParseRoleError;

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Editor" => Ok(Role::Editor),
            "Viewer" => Ok(Role::Viewer),
            _ => Err(ParseRoleError),
        }
    }
}

/// Pass if `role` is one of `permitted`, otherwise fail with `Forbidden`.
pub fn authorize(role: Role, permitted: &[Role]) -> AuthResult<()> {
    if permitted.contains(&role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Ownership-aware gate for mutating an authored resource.
///
/// Admins may mutate anything, Editors only what they authored, Viewers nothing.
pub fn authorize_owned_mutation(caller: &Principal, author: UserId) -> AuthResult<()> {
    match caller.role {
        Role::Admin => Ok(()),
        Role::Editor if caller.id == author => Ok(()),
        Role::Editor | Role::Viewer => Err(AuthError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role,
            email: "someone@example.com".to_string(),
            name: "Someone".to_string(),
        }
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::Admin, Role::Editor, Role::Viewer] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!("admin".parse::<Role>(), Err(ParseRoleError));
        assert_eq!("".parse::<Role>(), Err(ParseRoleError));
    }

    #[test]
    fn test_default_role_is_viewer() {
        assert_eq!(Role::default(), Role::Viewer);
    }

    #[test]
    fn test_authorize_checks_membership() {
        assert!(authorize(Role::Admin, ADMINISTRATORS).is_ok());
        assert!(matches!(
            authorize(Role::Editor, ADMINISTRATORS),
            Err(AuthError::Forbidden)
        ));
        assert!(authorize(Role::Editor, CONTENT_AUTHORS).is_ok());
        assert!(matches!(
            authorize(Role::Viewer, CONTENT_AUTHORS),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn test_owned_mutation() {
        let admin = principal(Role::Admin);
        let editor = principal(Role::Editor);
        let viewer = principal(Role::Viewer);
        let someone_else = Uuid::new_v4();

        assert!(authorize_owned_mutation(&admin, someone_else).is_ok());
        assert!(authorize_owned_mutation(&editor, editor.id).is_ok());
        assert!(authorize_owned_mutation(&editor, someone_else).is_err());
        assert!(authorize_owned_mutation(&viewer, viewer.id).is_err());
    }
}
