//! Role-based authorization decisions for user-management actions.
//!
//! Every check here is pure: no IO, no panics. The caller is passed in explicitly
//! as `Option<&Claims>`, `None` meaning the request carried no token.

use crate::{
    error::AuthError,
    types::{Claims, Role, User, UserID},
};

/// A protected action, together with whatever the decision depends on.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    ListUsers,
    CreateUser {
        role: Role,
    },
    GetUser {
        target: UserID,
    },
    /// Checked before the target is loaded, so a non-admin cannot tell a
    /// missing id from someone else's.
    UpdateTarget {
        target: UserID,
    },
    UpdateUser {
        existing: &'a User,
        requested_role: Role,
    },
    DeleteUser {
        target: UserID,
    },
}

/// Reject anonymous callers.
pub fn require_caller(caller: Option<&Claims>) -> Result<&Claims, AuthError> {
    caller.ok_or(AuthError::Unauthorized)
}

pub fn authorize(caller: Option<&Claims>, action: &Action<'_>) -> Result<(), AuthError> {
    let caller = require_caller(caller)?;
    let is_admin = caller.is_admin();

    match *action {
        Action::ListUsers => {
            if !is_admin {
                return Err(forbidden("requires admin role"));
            }
        }
        Action::CreateUser { role } => {
            if role.is_admin() && !is_admin {
                return Err(forbidden("only admins can create admin users"));
            }
            if !is_admin {
                return Err(forbidden("requires admin role"));
            }
        }
        Action::GetUser { target } => {
            if caller.user_id != target && !is_admin {
                return Err(forbidden("can only view own user or must be admin"));
            }
        }
        Action::UpdateTarget { target } => {
            if caller.user_id != target && !is_admin {
                return Err(forbidden("can only update own user or must be admin"));
            }
        }
        Action::UpdateUser {
            existing,
            requested_role,
        } => {
            let is_self = caller.user_id == existing.id;

            if existing.role != requested_role && !is_admin {
                return Err(forbidden("only admins can change user roles"));
            }
            if existing.role.is_admin() && !is_self && !is_admin {
                return Err(forbidden("only admins can update admin users"));
            }
            if !is_self && !is_admin {
                return Err(forbidden("can only update own user or must be admin"));
            }
        }
        Action::DeleteUser { target } => {
            if !is_admin {
                return Err(forbidden("only admins can delete users"));
            }
            if caller.user_id == target {
                return Err(forbidden("admins cannot delete themselves"));
            }
        }
    }

    Ok(())
}

fn forbidden(reason: &str) -> AuthError {
    AuthError::Forbidden(reason.to_string())
}
