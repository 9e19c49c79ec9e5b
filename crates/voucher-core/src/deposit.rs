//! Deposits: payouts of a tier's unclaimed revenue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::hierarchy::User;
use crate::tier::Tier;
use crate::{DepositId, UserId};

/// A recorded payout to one hierarchy node. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Deposit id (time-ordered).
    pub id: DepositId,
    /// Tier the payout belongs to.
    pub kategori: Tier,
    /// Recipient, whose role matches `kategori`.
    pub user_id: UserId,
    /// Amount paid out.
    pub jumlah: i64,
    /// Free-form note.
    pub keterangan: String,
    /// When the deposit was recorded.
    pub created_at: DateTime<Utc>,
}

impl Deposit {
    /// Recipient when `kategori` is Link.
    #[must_use]
    pub fn link_id(&self) -> Option<UserId> {
        (self.kategori == Tier::Link).then_some(self.user_id)
    }

    /// Recipient when `kategori` is Cabang.
    #[must_use]
    pub fn cabang_id(&self) -> Option<UserId> {
        (self.kategori == Tier::Cabang).then_some(self.user_id)
    }

    /// Recipient when `kategori` is Mitra Cabang.
    #[must_use]
    pub fn mitra_id(&self) -> Option<UserId> {
        (self.kategori == Tier::MitraCabang).then_some(self.user_id)
    }
}

/// A request to record a deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeposit {
    /// Tier of the recipient.
    pub kategori: Tier,
    /// Recipient.
    pub user_id: UserId,
    /// Amount paid out.
    pub jumlah: i64,
    /// Free-form note.
    #[serde(default)]
    pub keterangan: String,
}

impl NewDeposit {
    /// Check the request shape before the recipient is looked up.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `jumlah` is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.jumlah <= 0 {
            return Err(LedgerError::invalid("jumlah must be positive"));
        }
        Ok(())
    }

    /// Validate against the resolved recipient and build the deposit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `jumlah` is not positive, `recipient` is not
    /// the requested user, or the recipient's role differs from `kategori`.
    pub fn into_deposit(self, recipient: &User) -> Result<Deposit> {
        self.validate()?;
        if recipient.id != self.user_id {
            return Err(LedgerError::Internal(format!(
                "resolved user {} does not match requested {}",
                recipient.id, self.user_id
            )));
        }
        if recipient.role != self.kategori.role() {
            return Err(LedgerError::invalid(format!(
                "user {} is a {}, not a {}",
                recipient.id, recipient.role, self.kategori
            )));
        }

        Ok(Deposit {
            id: DepositId::generate(),
            kategori: self.kategori,
            user_id: self.user_id,
            jumlah: self.jumlah,
            keterangan: self.keterangan.trim().to_string(),
            created_at: Utc::now(),
        })
    }
}
