//! Fee schedules and the revenue split.
//!
//! A fee schedule is keyed by (Cabang, voucher type) and fixes the unit price
//! plus the unit share of each tier. The Owner keeps whatever remains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::UserId;

/// Per-unit price and tier fees for one voucher type under one Cabang.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// The Cabang this schedule applies to.
    pub cabang_id: UserId,
    /// Voucher type the schedule prices.
    pub voucher_type: String,
    /// Selling price per voucher.
    pub unit_price: i64,
    /// Link share per voucher.
    pub unit_fee_link: i64,
    /// Cabang share per voucher.
    pub unit_fee_cabang: i64,
    /// Mitra Cabang commission per voucher.
    pub unit_komisi_mitra: i64,
    /// Last change.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// The outcome of splitting one sale across the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    /// `quantity * unit_price`.
    pub gross: i64,
    /// Link share.
    pub fee_link: i64,
    /// Cabang share.
    pub fee_cabang: i64,
    /// Mitra Cabang commission.
    pub komisi_mitra: i64,
    /// Owner residual.
    pub pendapatan_owner: i64,
}

impl FeeSchedule {
    /// Check that the schedule can be stored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank voucher type, negative amounts, or
    /// tier fees that exceed the unit price.
    pub fn validate(&self) -> Result<()> {
        if self.voucher_type.trim().is_empty() {
            return Err(LedgerError::invalid("voucher_type must not be empty"));
        }
        if [
            self.unit_price,
            self.unit_fee_link,
            self.unit_fee_cabang,
            self.unit_komisi_mitra,
        ]
        .iter()
        .any(|v| *v < 0)
        {
            return Err(LedgerError::invalid("prices and fees must not be negative"));
        }

        let fees = self
            .unit_fee_link
            .checked_add(self.unit_fee_cabang)
            .and_then(|v| v.checked_add(self.unit_komisi_mitra))
            .ok_or_else(|| LedgerError::invalid("fee total overflows"))?;
        if fees > self.unit_price {
            return Err(LedgerError::invalid(format!(
                "tier fees ({fees}) exceed unit price ({})",
                self.unit_price
            )));
        }
        Ok(())
    }

    /// Split a sale of `quantity` vouchers.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `quantity` is not positive or the amounts overflow.
    /// - `FailedPrecondition` if any share comes out negative, which means the
    ///   stored schedule is misconfigured.
    pub fn split(&self, quantity: i64) -> Result<RevenueSplit> {
        if quantity <= 0 {
            return Err(LedgerError::invalid("quantity must be positive"));
        }

        let times = |unit: i64| {
            unit.checked_mul(quantity)
                .ok_or_else(|| LedgerError::invalid("sale amount overflows"))
        };

        let gross = times(self.unit_price)?;
        let fee_link = times(self.unit_fee_link)?;
        let fee_cabang = times(self.unit_fee_cabang)?;
        let komisi_mitra = times(self.unit_komisi_mitra)?;
        let pendapatan_owner = gross
            .checked_sub(fee_link)
            .and_then(|v| v.checked_sub(fee_cabang))
            .and_then(|v| v.checked_sub(komisi_mitra))
            .ok_or_else(|| LedgerError::invalid("sale amount overflows"))?;

        if fee_link < 0 || fee_cabang < 0 || komisi_mitra < 0 || pendapatan_owner < 0 {
            return Err(LedgerError::precondition(format!(
                "fee schedule for {} under cabang {} yields a negative share",
                self.voucher_type, self.cabang_id
            )));
        }

        Ok(RevenueSplit {
            gross,
            fee_link,
            fee_cabang,
            komisi_mitra,
            pendapatan_owner,
        })
    }
}

impl RevenueSplit {
    /// Sum of all four shares. Always equals `gross`.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.fee_link + self.fee_cabang + self.komisi_mitra + self.pendapatan_owner
    }
}
