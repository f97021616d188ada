//! Pure authorization decisions.
//!
//! No state and no store access: callers load whatever resource context the
//! decision needs and pass it in. Field restriction is enforced by rebuilding
//! the payload from the whitelist, never by rejecting extra keys, so a
//! non-admin sending `budget` simply loses that key.

use crate::store::{Project, Role, User};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Mutation permitted on the named wire fields only.
    AllowedWithFields(&'static [&'static str]),
    Denied(&'static str),
}

/// Wire-level fields an assigned employee may change on their project.
pub const EMPLOYEE_PROJECT_FIELDS: &[&str] = &["status", "docsLink", "description", "techStack"];

/// Decision table for a single project. Admins may do anything; employees may
/// read and (field-restricted) update projects assigned to them by strict id
/// equality. An unassigned project is not editable by any employee.
pub fn project_decision(actor: &User, action: Action, project: &Project) -> Decision {
    if actor.role == Role::Admin {
        return Decision::Allowed;
    }
    let assigned = project.assigned_to.as_deref() == Some(actor.id.as_str());
    match action {
        Action::Read => {
            if assigned {
                Decision::Allowed
            } else {
                Decision::Denied("Not authorized to view this project")
            }
        }
        Action::Update => {
            if assigned {
                Decision::AllowedWithFields(EMPLOYEE_PROJECT_FIELDS)
            } else {
                Decision::Denied("Not authorized to update this project")
            }
        }
        Action::Create => Decision::Denied("Access Denied: Only Admins can launch projects"),
        Action::Delete => Decision::Denied("Access Denied: Only Admins can delete projects"),
    }
}

/// Gate for admin-only resources: provisioning and listing identities,
/// deleting users, forced password resets, global settings, email logs.
pub fn require_admin(actor: &User, denied_msg: &'static str) -> Decision {
    if actor.role == Role::Admin {
        Decision::Allowed
    } else {
        Decision::Denied(denied_msg)
    }
}

/// Rebuild an update payload from the whitelist. Keys outside the whitelist
/// are dropped silently; the transport layer is never trusted to have
/// filtered anything.
pub fn restrict_payload(payload: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    for field in fields {
        if let Some(v) = payload.get(*field) {
            out.insert((*field).to_string(), v.clone());
        }
    }
    out
}
