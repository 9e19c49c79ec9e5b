//! Core types and rules for the voucher-sales ledger.
//!
//! This crate provides the domain model shared by the store, the HTTP service
//! and the client SDK:
//!
//! - **Identifiers**: `UserId`, `KuponId`, `KlaimId`, `SaleId`, `DepositId`
//! - **Hierarchy**: `User`, `Role`, `Ancestry`
//! - **Tiers**: `Tier` and its per-tier column descriptor `TierColumns`
//! - **Pricing**: `FeeSchedule`, `RevenueSplit`
//! - **Sales & stock**: `VoucherSale`, `VoucherStock`, `StockImportRow`
//! - **Deposits**: `Deposit`, `NewDeposit`
//! - **Coupons**: `KuponHadiah`, `KlaimKupon`, `KlaimStatus`
//!
//! # Money
//!
//! All amounts are whole Rupiah stored as `i64`, so a sale's four shares
//! always add up to its gross value without rounding.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod deposit;
pub mod error;
pub mod hierarchy;
pub mod ids;
pub mod kupon;
pub mod notification;
pub mod pricing;
pub mod sale;
pub mod stock;
pub mod tier;

pub use deposit::{Deposit, NewDeposit};
pub use error::{LedgerError, Result};
pub use hierarchy::{Ancestry, NewUser, Role, User};
pub use ids::{DepositId, IdError, KlaimId, KuponId, SaleId, UserId};
pub use kupon::{rank_winners, Hadiah, KlaimKupon, KlaimStatus, KuponHadiah, NewKupon, Winner};
pub use notification::{Notification, NotificationKind};
pub use pricing::{FeeSchedule, RevenueSplit};
pub use sale::{NewSale, SaleFilter, VoucherSale, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use stock::{ImportReport, ImportRowError, NewDistribution, StockImportRow, VoucherStock};
pub use tier::{Tier, TierColumns};
