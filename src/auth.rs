//! Capability checks for schedule operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "schedule:create")]
    ScheduleCreate,
    #[serde(rename = "schedule:read")]
    ScheduleRead,
    #[serde(rename = "schedule:update")]
    ScheduleUpdate,
    #[serde(rename = "schedule:delete")]
    ScheduleDelete,
    #[serde(rename = "schedule:list")]
    ScheduleList,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ScheduleCreate => "schedule:create",
            Capability::ScheduleRead => "schedule:read",
            Capability::ScheduleUpdate => "schedule:update",
            Capability::ScheduleDelete => "schedule:delete",
            Capability::ScheduleList => "schedule:list",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
        }
    }

    /// Admins and teachers manage schedules; students may only look.
    pub fn grants(&self, capability: Capability) -> bool {
        match self {
            Role::Admin | Role::Teacher => true,
            Role::Student => matches!(capability, Capability::ScheduleRead | Capability::ScheduleList),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        match normalized.strip_prefix("ROLE_").unwrap_or(&normalized) {
            "ADMIN" => Ok(Role::Admin),
            "TEACHER" => Ok(Role::Teacher),
            "STUDENT" => Ok(Role::Student),
            _ => Err(format!("unknown role '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("caller has no recognised roles")]
    Unauthenticated,
    #[error("{capability} is not granted to {roles}")]
    Forbidden { capability: Capability, roles: String },
}

pub fn authorize(roles: &[Role], capability: Capability) -> Result<(), AuthError> {
    if roles.is_empty() {
        return Err(AuthError::Unauthenticated);
    }
    if roles.iter().any(|role| role.grants(capability)) {
        return Ok(());
    }
    let roles = roles.iter().map(Role::as_str).collect::<Vec<_>>().join(", ");
    Err(AuthError::Forbidden { capability, roles })
}

/// Parses a comma separated role list; unknown entries are ignored.
pub fn parse_roles(raw: &str) -> Vec<Role> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .filter_map(|part| match part.parse::<Role>() {
            Ok(role) => Some(role),
            Err(err) => {
                tracing::debug!("{err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Capability; 5] = [
        Capability::ScheduleCreate,
        Capability::ScheduleRead,
        Capability::ScheduleUpdate,
        Capability::ScheduleDelete,
        Capability::ScheduleList,
    ];

    #[test]
    fn managers_hold_every_capability() {
        for capability in ALL {
            assert!(authorize(&[Role::Admin], capability).is_ok());
            assert!(authorize(&[Role::Teacher], capability).is_ok());
        }
    }

    #[test]
    fn students_read_only() {
        assert!(authorize(&[Role::Student], Capability::ScheduleRead).is_ok());
        assert!(authorize(&[Role::Student], Capability::ScheduleList).is_ok());
        let err = authorize(&[Role::Student], Capability::ScheduleCreate).unwrap_err();
        assert_eq!(err.to_string(), "schedule:create is not granted to STUDENT");
        assert!(authorize(&[Role::Student, Role::Teacher], Capability::ScheduleDelete).is_ok());
    }

    #[test]
    fn missing_roles_are_unauthenticated() {
        assert_eq!(authorize(&[], Capability::ScheduleRead), Err(AuthError::Unauthenticated));
    }

    #[test]
    fn parses_role_headers() {
        assert_eq!(parse_roles("ROLE_ADMIN, student"), vec![Role::Admin, Role::Student]);
        assert_eq!(parse_roles("janitor,"), Vec::<Role>::new());
        assert!(parse_roles("").is_empty());
    }
}
