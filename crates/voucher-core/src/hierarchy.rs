//! Reseller hierarchy types.
//!
//! The hierarchy is a strict tree: Owner → Mitra Cabang → Cabang → Link.
//! Every node's parent must hold the next-higher role. Admin is an operator
//! role that sits outside the tree.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::tier::Tier;
use crate::UserId;

/// Role of a user in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Root of the hierarchy.
    Owner,
    /// Back-office operator.
    Admin,
    /// Top reseller tier under the Owner.
    MitraCabang,
    /// Branch under a Mitra Cabang.
    Cabang,
    /// Point of sale under a Cabang.
    Link,
}

impl Role {
    /// Storage and wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::MitraCabang => "mitra_cabang",
            Self::Cabang => "cabang",
            Self::Link => "link",
        }
    }

    /// Whether the role may perform administrative operations.
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// The revenue tier this role earns on, if any.
    #[must_use]
    pub const fn tier(&self) -> Option<Tier> {
        match self {
            Self::Link => Some(Tier::Link),
            Self::Cabang => Some(Tier::Cabang),
            Self::MitraCabang => Some(Tier::MitraCabang),
            Self::Owner | Self::Admin => None,
        }
    }

    /// Check that `parent` is an acceptable parent for a user with this role.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the parent is missing, present where
    /// none is allowed, or holds the wrong role.
    pub fn validate_parent(self, parent: Option<&User>) -> Result<()> {
        let parent_role = parent.map(|p| p.role);
        let ok = match self {
            Self::Owner | Self::Admin => parent_role.is_none(),
            Self::MitraCabang => matches!(parent_role, None | Some(Self::Owner)),
            Self::Cabang => parent_role == Some(Self::MitraCabang),
            Self::Link => parent_role == Some(Self::Cabang),
        };

        if ok {
            Ok(())
        } else {
            Err(LedgerError::invalid(format!(
                "a {self} cannot have {} as parent",
                parent_role.map_or_else(|| "no user".to_string(), |r| format!("a {r}"))
            )))
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Owner => "Owner",
            Self::Admin => "Admin",
            Self::MitraCabang => "Mitra Cabang",
            Self::Cabang => "Cabang",
            Self::Link => "Link",
        };
        f.write_str(label)
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(' ', "_").as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "mitra_cabang" => Ok(Self::MitraCabang),
            "cabang" => Ok(Self::Cabang),
            "link" => Ok(Self::Link),
            other => Err(LedgerError::invalid(format!("unknown role: {other}"))),
        }
    }
}

/// A user as resolved by the hierarchy directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: UserId,
    /// Role in the hierarchy.
    pub role: Role,
    /// Parent node, `None` for Owner, Admin and Owner-less Mitra Cabang.
    pub parent_id: Option<UserId>,
    /// Display name.
    pub full_name: String,
    /// Unique login name.
    pub username: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Registration request for a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    /// Role of the new user.
    pub role: Role,
    /// Parent node.
    #[serde(default)]
    pub parent_id: Option<UserId>,
    /// Display name.
    pub full_name: String,
    /// Unique login name.
    pub username: String,
}

impl NewUser {
    /// Validate the request against the resolved parent and build the user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for blank names or a parent of the wrong tier.
    pub fn into_user(self, parent: Option<&User>) -> Result<User> {
        if self.full_name.trim().is_empty() {
            return Err(LedgerError::invalid("full_name must not be empty"));
        }
        if self.username.trim().is_empty() {
            return Err(LedgerError::invalid("username must not be empty"));
        }
        self.role.validate_parent(parent)?;

        Ok(User {
            id: UserId::generate(),
            role: self.role,
            parent_id: parent.map(|p| p.id),
            full_name: self.full_name.trim().to_string(),
            username: self.username.trim().to_string(),
            created_at: Utc::now(),
        })
    }
}

/// The full chain above a Link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestry {
    /// The Link itself.
    pub link_id: UserId,
    /// The Link's Cabang.
    pub cabang_id: UserId,
    /// The Cabang's Mitra Cabang.
    pub mitra_cabang_id: UserId,
}

impl Ancestry {
    /// Build the ancestry of `link` from its resolved parent and grandparent.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `link` is not a Link.
    /// - `NotFound` if an ancestor is missing or the chain has the wrong roles.
    pub fn resolve(link: &User, cabang: Option<&User>, mitra: Option<&User>) -> Result<Self> {
        if link.role != Role::Link {
            return Err(LedgerError::invalid(format!(
                "user {} is a {}, not a Link",
                link.id, link.role
            )));
        }

        let cabang = cabang
            .filter(|c| Some(c.id) == link.parent_id && c.role == Role::Cabang)
            .ok_or_else(|| LedgerError::not_found("cabang of link", link.id))?;

        let mitra = mitra
            .filter(|m| Some(m.id) == cabang.parent_id && m.role == Role::MitraCabang)
            .ok_or_else(|| LedgerError::not_found("mitra cabang of cabang", cabang.id))?;

        Ok(Self {
            link_id: link.id,
            cabang_id: cabang.id,
            mitra_cabang_id: mitra.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, parent: Option<&User>) -> User {
        User {
            id: UserId::generate(),
            role,
            parent_id: parent.map(|p| p.id),
            full_name: format!("{role} user"),
            username: format!("{}-{}", role.as_str(), UserId::generate()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn role_parses_wire_and_display_names() {
        assert_eq!("mitra_cabang".parse::<Role>().unwrap(), Role::MitraCabang);
        assert_eq!("Mitra Cabang".parse::<Role>().unwrap(), Role::MitraCabang);
        assert_eq!("LINK".parse::<Role>().unwrap(), Role::Link);
        assert!("reseller".parse::<Role>().is_err());
    }

    #[test]
    fn parent_rules_follow_the_tree() {
        let owner = user(Role::Owner, None);
        let mitra = user(Role::MitraCabang, Some(&owner));
        let cabang = user(Role::Cabang, Some(&mitra));

        assert!(Role::MitraCabang.validate_parent(None).is_ok());
        assert!(Role::MitraCabang.validate_parent(Some(&owner)).is_ok());
        assert!(Role::Cabang.validate_parent(Some(&mitra)).is_ok());
        assert!(Role::Link.validate_parent(Some(&cabang)).is_ok());

        assert!(Role::Cabang.validate_parent(None).is_err());
        assert!(Role::Link.validate_parent(Some(&mitra)).is_err());
        assert!(Role::Owner.validate_parent(Some(&owner)).is_err());
    }

    #[test]
    fn ancestry_resolves_full_chain() {
        let mitra = user(Role::MitraCabang, None);
        let cabang = user(Role::Cabang, Some(&mitra));
        let link = user(Role::Link, Some(&cabang));

        let ancestry = Ancestry::resolve(&link, Some(&cabang), Some(&mitra)).unwrap();
        assert_eq!(ancestry.link_id, link.id);
        assert_eq!(ancestry.cabang_id, cabang.id);
        assert_eq!(ancestry.mitra_cabang_id, mitra.id);
    }

    #[test]
    fn ancestry_rejects_broken_chain() {
        let mitra = user(Role::MitraCabang, None);
        let cabang = user(Role::Cabang, Some(&mitra));
        let orphan = user(Role::Link, None);

        let err = Ancestry::resolve(&orphan, Some(&cabang), Some(&mitra)).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let link = user(Role::Link, Some(&cabang));
        let err = Ancestry::resolve(&link, Some(&cabang), None).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let err = Ancestry::resolve(&cabang, Some(&mitra), None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument(_)));
    }

    #[test]
    fn new_user_requires_names() {
        let request = NewUser {
            role: Role::MitraCabang,
            parent_id: None,
            full_name: "  ".into(),
            username: "mitra1".into(),
        };
        assert!(request.into_user(None).is_err());
    }
}
