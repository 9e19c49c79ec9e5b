//! Revenue tiers and their ledger columns.
//!
//! Each tier earns one share of every sale. [`TierColumns`] is the single
//! place that knows which sale columns belong to a tier: who owns the row,
//! the per-sale share, the running unclaimed total and what a deposit clears.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::hierarchy::Role;
use crate::sale::VoucherSale;
use crate::UserId;

/// A revenue-earning tier of the hierarchy (the Owner takes the residual).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Point of sale.
    Link,
    /// Branch.
    Cabang,
    /// Branch partner.
    MitraCabang,
}

/// Column layout and reset behaviour of one tier on `voucher_sales`.
pub struct TierColumns {
    /// Column holding the tier member's user id.
    pub owner_column: &'static str,
    /// Column holding the tier's per-sale share.
    pub fee_column: &'static str,
    /// `SET` clause applied to every sale row of the member on deposit.
    pub reset_assignments: &'static str,
    owner_of: fn(&VoucherSale) -> UserId,
    fee_of: fn(&VoucherSale) -> i64,
    clear: fn(&mut VoucherSale),
}

static LINK_COLUMNS: TierColumns = TierColumns {
    owner_column: "link_id",
    fee_column: "fee_link",
    reset_assignments: "total_pendapatan_link = 0, fee_link = 0",
    owner_of: |s| s.link_id,
    fee_of: |s| s.fee_link,
    clear: |s| {
        s.total_pendapatan_link = 0;
        s.fee_link = 0;
    },
};

static CABANG_COLUMNS: TierColumns = TierColumns {
    owner_column: "cabang_id",
    fee_column: "fee_cabang",
    reset_assignments: "total_pendapatan_cabang = 0, fee_cabang = 0",
    owner_of: |s| s.cabang_id,
    fee_of: |s| s.fee_cabang,
    clear: |s| {
        s.total_pendapatan_cabang = 0;
        s.fee_cabang = 0;
    },
};

// No running total column exists for this tier; a deposit clears the
// per-sale commission directly.
static MITRA_COLUMNS: TierColumns = TierColumns {
    owner_column: "mitra_cabang_id",
    fee_column: "komisi_mitra",
    reset_assignments: "komisi_mitra = 0",
    owner_of: |s| s.mitra_cabang_id,
    fee_of: |s| s.komisi_mitra,
    clear: |s| s.komisi_mitra = 0,
};

impl fmt::Debug for TierColumns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierColumns")
            .field("owner_column", &self.owner_column)
            .field("fee_column", &self.fee_column)
            .field("reset_assignments", &self.reset_assignments)
            .finish_non_exhaustive()
    }
}

impl TierColumns {
    /// The member of this tier that `sale` credits.
    #[must_use]
    pub fn owner(&self, sale: &VoucherSale) -> UserId {
        (self.owner_of)(sale)
    }

    /// Whether `sale` belongs to `member` on this tier.
    #[must_use]
    pub fn owns(&self, sale: &VoucherSale, member: &UserId) -> bool {
        (self.owner_of)(sale) == *member
    }

    /// This tier's unclaimed share on `sale`.
    #[must_use]
    pub fn unclaimed(&self, sale: &VoucherSale) -> i64 {
        (self.fee_of)(sale)
    }

    /// Apply the deposit reset to `sale`.
    pub fn reset(&self, sale: &mut VoucherSale) {
        (self.clear)(sale);
    }
}

impl Tier {
    /// All tiers, bottom-up.
    pub const ALL: [Self; 3] = [Self::Link, Self::Cabang, Self::MitraCabang];

    /// Column descriptor for this tier.
    #[must_use]
    pub fn columns(self) -> &'static TierColumns {
        match self {
            Self::Link => &LINK_COLUMNS,
            Self::Cabang => &CABANG_COLUMNS,
            Self::MitraCabang => &MITRA_COLUMNS,
        }
    }

    /// The role whose members earn on this tier.
    #[must_use]
    pub const fn role(self) -> Role {
        match self {
            Self::Link => Role::Link,
            Self::Cabang => Role::Cabang,
            Self::MitraCabang => Role::MitraCabang,
        }
    }

    /// Storage and wire name of the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.role().as_str()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.role().fmt(f)
    }
}

impl FromStr for Tier {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let role: Role = s.parse()?;
        role.tier()
            .ok_or_else(|| LedgerError::invalid(format!("{role} is not a revenue tier")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_round_trips_through_role_names() {
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().unwrap(), tier);
            assert_eq!(tier.role().tier(), Some(tier));
        }
        assert!("owner".parse::<Tier>().is_err());
        assert_eq!("Mitra Cabang".parse::<Tier>().unwrap(), Tier::MitraCabang);
    }

    #[test]
    fn only_mitra_reset_leaves_running_totals_alone() {
        assert!(Tier::Link.columns().reset_assignments.contains("total_pendapatan_link"));
        assert!(Tier::Cabang.columns().reset_assignments.contains("total_pendapatan_cabang"));
        assert_eq!(Tier::MitraCabang.columns().reset_assignments, "komisi_mitra = 0");
    }
}
