//! Voucher stock and bulk import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::UserId;

/// Remaining stock of one voucher type at one Link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherStock {
    /// Voucher type.
    pub voucher_type: String,
    /// Holding Link.
    pub link_id: UserId,
    /// Link's Cabang.
    pub cabang_id: UserId,
    /// Cabang's Mitra Cabang.
    pub mitra_cabang_id: UserId,
    /// Vouchers left. Never negative.
    pub amount: i64,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

/// A request to hand stock to a Link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDistribution {
    /// Voucher type.
    pub voucher_type: String,
    /// Receiving Link.
    pub link_id: UserId,
    /// Vouchers added.
    pub amount: i64,
}

impl NewDistribution {
    /// Check the request shape.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank voucher type or non-positive amount.
    pub fn validate(&self) -> Result<()> {
        if self.voucher_type.trim().is_empty() {
            return Err(LedgerError::invalid("voucher_type must not be empty"));
        }
        if self.amount <= 0 {
            return Err(LedgerError::invalid("amount must be positive"));
        }
        Ok(())
    }
}

/// One row of a bulk stock import, identified by usernames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockImportRow {
    /// Mitra Cabang username.
    pub mitra_username: String,
    /// Cabang username.
    pub cabang_username: String,
    /// Link username.
    pub link_username: String,
    /// Voucher type.
    pub voucher_type: String,
    /// Vouchers added.
    pub amount: i64,
}

impl StockImportRow {
    /// Check that every field is present and the amount is positive.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("mitra_username", &self.mitra_username),
            ("cabang_username", &self.cabang_username),
            ("link_username", &self.link_username),
            ("voucher_type", &self.voucher_type),
        ] {
            if value.trim().is_empty() {
                return Err(LedgerError::invalid(format!("{field} must not be empty")));
            }
        }
        if self.amount <= 0 {
            return Err(LedgerError::invalid("amount must be positive"));
        }
        Ok(())
    }
}

/// A failed import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    /// 1-based row number in the submitted batch.
    pub row: usize,
    /// Why the row was skipped.
    pub message: String,
}

/// Aggregated outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Rows applied.
    pub success_count: usize,
    /// Rows skipped.
    pub error_count: usize,
    /// One entry per skipped row.
    pub errors: Vec<ImportRowError>,
}

impl ImportReport {
    /// Count an applied row.
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    /// Count a skipped row.
    pub fn record_error(&mut self, row: usize, message: impl Into<String>) {
        self.error_count += 1;
        self.errors.push(ImportRowError {
            row,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_row_requires_all_fields() {
        let mut row = StockImportRow {
            mitra_username: "mitra".into(),
            cabang_username: "cabang".into(),
            link_username: "link".into(),
            voucher_type: "A".into(),
            amount: 10,
        };
        assert!(row.validate().is_ok());

        row.link_username = String::new();
        let err = row.validate().unwrap_err();
        assert!(err.to_string().contains("link_username"));

        row.link_username = "link".into();
        row.amount = -5;
        assert!(row.validate().is_err());
    }

    #[test]
    fn report_counts_rows() {
        let mut report = ImportReport::default();
        report.record_success();
        report.record_error(2, "bad row");
        report.record_success();

        assert_eq!(report.success_count, 2);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.errors[0].row, 2);
    }
}
