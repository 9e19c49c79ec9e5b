//! Voucher sale records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::hierarchy::Ancestry;
use crate::pricing::RevenueSplit;
use crate::{SaleId, UserId};

/// Upper bound on page size for sale listings.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size used when a listing does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One recorded sale and its split across the hierarchy.
///
/// `fee_*` / `komisi_mitra` are this sale's shares. `total_pendapatan_*` are
/// the tier's unclaimed running balance as of this sale. A deposit zeroes the
/// depositing tier's columns on every one of its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherSale {
    /// Sale id (time-ordered).
    pub id: SaleId,
    /// Voucher type sold.
    pub voucher_type: String,
    /// Number of vouchers sold.
    pub quantity_sold: i64,
    /// Selling Link.
    pub link_id: UserId,
    /// Link's Cabang at the time of sale.
    pub cabang_id: UserId,
    /// Cabang's Mitra Cabang at the time of sale.
    pub mitra_cabang_id: UserId,
    /// When the sale was recorded.
    pub created_at: DateTime<Utc>,
    /// Link share.
    pub fee_link: i64,
    /// Cabang share.
    pub fee_cabang: i64,
    /// Mitra Cabang commission.
    pub komisi_mitra: i64,
    /// Owner residual.
    pub pendapatan_owner: i64,
    /// Link's unclaimed total including this sale.
    pub total_pendapatan_link: i64,
    /// Cabang's unclaimed total including this sale.
    pub total_pendapatan_cabang: i64,
}

impl VoucherSale {
    /// Build a sale row from its split and the tiers' unclaimed totals before it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a running total overflows.
    pub fn new(
        voucher_type: String,
        quantity_sold: i64,
        ancestry: &Ancestry,
        split: &RevenueSplit,
        link_unclaimed_before: i64,
        cabang_unclaimed_before: i64,
    ) -> Result<Self> {
        let overflow = || LedgerError::invalid("sale amount overflows");
        let total_pendapatan_link = link_unclaimed_before
            .checked_add(split.fee_link)
            .ok_or_else(overflow)?;
        let total_pendapatan_cabang = cabang_unclaimed_before
            .checked_add(split.fee_cabang)
            .ok_or_else(overflow)?;

        Ok(Self {
            id: SaleId::generate(),
            voucher_type,
            quantity_sold,
            link_id: ancestry.link_id,
            cabang_id: ancestry.cabang_id,
            mitra_cabang_id: ancestry.mitra_cabang_id,
            created_at: Utc::now(),
            fee_link: split.fee_link,
            fee_cabang: split.fee_cabang,
            komisi_mitra: split.komisi_mitra,
            pendapatan_owner: split.pendapatan_owner,
            total_pendapatan_link,
            total_pendapatan_cabang,
        })
    }
}

/// A request to record a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    /// Voucher type sold.
    pub voucher_type: String,
    /// Number of vouchers sold.
    pub quantity: i64,
    /// Selling Link.
    pub link_id: UserId,
}

impl NewSale {
    /// Check the request shape.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank voucher type or non-positive quantity.
    pub fn validate(&self) -> Result<()> {
        if self.voucher_type.trim().is_empty() {
            return Err(LedgerError::invalid("voucher_type must not be empty"));
        }
        if self.quantity <= 0 {
            return Err(LedgerError::invalid("quantity must be positive"));
        }
        Ok(())
    }
}

/// Filter for listing sales. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleFilter {
    /// Only sales of this Link.
    pub link_id: Option<UserId>,
    /// Only sales under this Cabang.
    pub cabang_id: Option<UserId>,
    /// Only sales under this Mitra Cabang.
    pub mitra_cabang_id: Option<UserId>,
    /// Page size.
    pub limit: usize,
    /// Rows to skip.
    pub offset: usize,
}

impl SaleFilter {
    /// Whether `sale` passes the id filters.
    #[must_use]
    pub fn matches(&self, sale: &VoucherSale) -> bool {
        self.link_id.map_or(true, |id| id == sale.link_id)
            && self.cabang_id.map_or(true, |id| id == sale.cabang_id)
            && self.mitra_cabang_id.map_or(true, |id| id == sale.mitra_cabang_id)
    }

    /// Page size clamped to [`MAX_PAGE_SIZE`]. Zero means the default.
    #[must_use]
    pub fn page_size(&self) -> usize {
        match self.limit {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ancestry() -> Ancestry {
        Ancestry {
            link_id: UserId::generate(),
            cabang_id: UserId::generate(),
            mitra_cabang_id: UserId::generate(),
        }
    }

    #[test]
    fn running_totals_accumulate_from_prior_balance() {
        let split = RevenueSplit {
            gross: 200_000,
            fee_link: 20_000,
            fee_cabang: 10_000,
            komisi_mitra: 6_000,
            pendapatan_owner: 164_000,
        };
        let sale = VoucherSale::new("A".into(), 20, &ancestry(), &split, 5_000, 7_000).unwrap();
        assert_eq!(sale.total_pendapatan_link, 25_000);
        assert_eq!(sale.total_pendapatan_cabang, 17_000);
    }

    #[test]
    fn running_total_overflow_is_rejected() {
        let split = RevenueSplit {
            gross: i64::MAX,
            fee_link: i64::MAX / 2 + 1,
            fee_cabang: 0,
            komisi_mitra: 0,
            pendapatan_owner: i64::MAX / 2,
        };
        let err = VoucherSale::new("A".into(), 1, &ancestry(), &split, i64::MAX / 2 + 1, 0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument(_)));
    }

    #[test]
    fn new_sale_validation() {
        let mut sale = NewSale {
            voucher_type: "A".into(),
            quantity: 1,
            link_id: UserId::generate(),
        };
        assert!(sale.validate().is_ok());
        sale.quantity = 0;
        assert!(sale.validate().is_err());
        sale.quantity = 1;
        sale.voucher_type = " ".into();
        assert!(sale.validate().is_err());
    }

    #[test]
    fn filter_page_size_is_clamped() {
        let filter = SaleFilter {
            limit: 1_000,
            ..SaleFilter::default()
        };
        assert_eq!(filter.page_size(), MAX_PAGE_SIZE);
        assert_eq!(SaleFilter::default().page_size(), DEFAULT_PAGE_SIZE);
    }
}
