//! Request and response types that only exist on the wire.

use serde::{Deserialize, Serialize};

use voucher_core::{Deposit, KlaimStatus, StockImportRow, Tier, UserId, VoucherSale};

/// Outcome of a deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositReceipt {
    /// The recorded deposit.
    #[serde(flatten)]
    pub deposit: Deposit,
    /// Sale rows whose revenue was reset.
    pub rows_reset: u64,
}

/// Unclaimed revenue of a member in one tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// Tier queried.
    pub tier: Tier,
    /// Member queried.
    pub user_id: UserId,
    /// Revenue earned since the last deposit.
    pub unclaimed: i64,
}

/// A page of sales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesPage {
    /// Sales (newest first).
    pub sales: Vec<VoucherSale>,
    /// Page size applied.
    pub limit: usize,
    /// Rows skipped.
    pub offset: usize,
}

/// Bulk import request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ImportStockRequest<'a> {
    pub rows: &'a [StockImportRow],
}

/// Review decision on a claim.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResolveClaimRequest<'a> {
    pub status: KlaimStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catatan: Option<&'a str>,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
