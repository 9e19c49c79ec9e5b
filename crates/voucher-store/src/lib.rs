//! Storage layer for the voucher-sales ledger.
//!
//! Two backends implement [`Store`]:
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`. Every mutation runs in one
//!   transaction and locks the rows it reads before writing (`FOR UPDATE`).
//! - [`MemoryStore`]: a single-mutex in-memory store used by tests and local
//!   runs. It validates everything before touching state, so a rejected call
//!   leaves no partial writes.
//!
//! # Tables
//!
//! - `users`: the reseller hierarchy
//! - `voucher_prices`: fee schedules keyed by (Cabang, voucher type)
//! - `voucher_stocks`: remaining vouchers per (voucher type, Link)
//! - `voucher_sales`: one row per sale with its split and running totals
//! - `deposit`: payouts, one recipient column set per row
//! - `kupon_hadiah`, `kupon_hadiah_item`, `klaim_kupon`: coupons and claims

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use voucher_core::{
    rank_winners, Deposit, FeeSchedule, KlaimId, KlaimKupon, KlaimStatus, KuponHadiah, KuponId,
    LedgerError, NewDeposit, NewDistribution, NewSale, NewUser, SaleFilter, Tier, User, UserId,
    VoucherSale, VoucherStock, Winner,
};

/// Outcome of a recorded deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    /// The stored deposit.
    #[serde(flatten)]
    pub deposit: Deposit,
    /// Sale rows whose tier columns were zeroed.
    pub rows_reset: u64,
}

/// The storage trait defining all ledger operations.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Directory
    // =========================================================================

    /// Register a user under an existing parent.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `parent_id` is unknown.
    /// - `InvalidArgument` if the parent's role breaks the hierarchy.
    /// - `FailedPrecondition` if the username is taken.
    async fn create_user(&self, request: NewUser) -> Result<User>;

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    // =========================================================================
    // Fee schedules
    // =========================================================================

    /// Insert or replace the fee schedule of (Cabang, voucher type).
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the schedule is inconsistent or `cabang_id` is
    ///   not a Cabang.
    /// - `NotFound` if `cabang_id` is unknown.
    async fn put_fee_schedule(&self, schedule: FeeSchedule) -> Result<FeeSchedule>;

    /// Get the fee schedule of (Cabang, voucher type).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn fee_schedule(
        &self,
        cabang_id: &UserId,
        voucher_type: &str,
    ) -> Result<Option<FeeSchedule>>;

    // =========================================================================
    // Stock
    // =========================================================================

    /// Add vouchers to a Link's stock, creating the row if needed.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a bad request or a user that is not a Link.
    /// - `NotFound` if the Link or its ancestors are missing.
    async fn distribute_stock(&self, request: &NewDistribution) -> Result<VoucherStock>;

    /// Stock rows held by a Link.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_stock(&self, link_id: &UserId) -> Result<Vec<VoucherStock>>;

    // =========================================================================
    // Sales
    // =========================================================================

    /// Record a sale: split the revenue, consume stock and append the sale row
    /// with updated running totals, all or nothing.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a bad request, a non-Link seller or overflow.
    /// - `NotFound` for an unknown Link, broken ancestry, missing fee
    ///   schedule or missing stock row.
    /// - `InsufficientStock` if the Link holds fewer vouchers than requested.
    /// - `FailedPrecondition` if the fee schedule yields a negative share.
    async fn record_sale(&self, request: &NewSale) -> Result<VoucherSale>;

    /// Sales matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_sales(&self, filter: &SaleFilter) -> Result<Vec<VoucherSale>>;

    /// Unclaimed revenue of `user_id` in `tier`: the sum of the tier's
    /// per-sale share over the user's rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn unclaimed_balance(&self, tier: Tier, user_id: &UserId) -> Result<i64>;

    /// Vouchers sold per member of `tier` between `from` and `to` inclusive,
    /// by sale date (UTC).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn sales_totals(
        &self,
        tier: Tier,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(UserId, i64)>>;

    // =========================================================================
    // Deposits
    // =========================================================================

    /// Record a payout and zero the tier's columns on every sale row of the
    /// recipient, all or nothing.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a non-positive amount or a role mismatch.
    /// - `NotFound` for an unknown recipient.
    async fn record_deposit(&self, request: NewDeposit) -> Result<DepositReceipt>;

    /// Deposits paid to a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_deposits(&self, user_id: &UserId) -> Result<Vec<Deposit>>;

    // =========================================================================
    // Coupons
    // =========================================================================

    /// Store a validated coupon.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_kupon(&self, kupon: &KuponHadiah) -> Result<()>;

    /// Get a coupon by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_kupon(&self, id: &KuponId) -> Result<Option<KuponHadiah>>;

    /// All coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_kupons(&self) -> Result<Vec<KuponHadiah>>;

    /// File a claim for `user_id` at their current winning position.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown coupon or user.
    /// - `FailedPrecondition` if the user may not claim (see
    ///   [`KuponHadiah::claim_position`]).
    async fn create_claim(
        &self,
        kupon_id: &KuponId,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<KlaimKupon>;

    /// Claims, optionally restricted to one coupon, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_claims(&self, kupon_id: Option<&KuponId>) -> Result<Vec<KlaimKupon>>;

    /// Approve or reject a pending claim.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown claim.
    /// - `InvalidArgument` if `decision` is `menunggu`.
    /// - `FailedPrecondition` if the claim was already reviewed.
    async fn resolve_claim(
        &self,
        id: &KlaimId,
        decision: KlaimStatus,
        catatan: Option<String>,
    ) -> Result<KlaimKupon>;

    /// Current ranking of a coupon's participants.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown coupon.
    async fn coupon_winners(&self, kupon_id: &KuponId) -> Result<Vec<Winner>> {
        let kupon = self
            .get_kupon(kupon_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("coupon", kupon_id))?;
        let totals = self
            .sales_totals(kupon.target_role, kupon.periode_mulai, kupon.periode_berakhir)
            .await?;
        Ok(rank_winners(&kupon, totals))
    }
}
