//! Ownership guard.
//!
//! A manual is owned by exactly one user. Steps and images have no owner of
//! their own: callers resolve them to the parent manual and check that.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated user id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub i64);

impl Principal {
    pub fn id(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of access being requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Reading; granted to anyone for public resources.
    Read,
    /// Any mutation; owner only.
    Write,
}

/// A resource with a single owning user.
pub trait OwnedResource {
    fn resource_id(&self) -> i64;
    fn owner_id(&self) -> i64;
    fn is_public(&self) -> bool;
}

/// Returned when a principal may not access a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenied {
    pub principal: i64,
    pub resource_id: i64,
    pub access: Access,
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.access {
            Access::Read => "read",
            Access::Write => "modify",
        };
        write!(
            f,
            "user {} may not {verb} manual {}",
            self.principal, self.resource_id
        )
    }
}

impl std::error::Error for AccessDenied {}

/// Decide whether `principal` may access `manual`.
///
/// Write access requires ownership. Read access is also granted when the
/// manual is public.
pub fn authorize_manual<R: OwnedResource + ?Sized>(
    principal: Principal,
    manual: &R,
    access: Access,
) -> Result<(), AccessDenied> {
    let owner = manual.owner_id() == principal.0;
    let allowed = match access {
        Access::Write => owner,
        Access::Read => owner || manual.is_public(),
    };
    if allowed {
        Ok(())
    } else {
        Err(AccessDenied {
            principal: principal.0,
            resource_id: manual.resource_id(),
            access,
        })
    }
}
