//! Notification messages sent to hierarchy members.

use serde::{Deserialize, Serialize};

use crate::deposit::Deposit;
use crate::kupon::{KlaimKupon, KlaimStatus};
use crate::stock::VoucherStock;
use crate::UserId;

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A payout was recorded.
    Deposit,
    /// Stock was handed to a Link.
    Stock,
    /// A coupon claim was reviewed.
    Klaim,
}

/// A message for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient.
    pub user_id: UserId,
    /// Short title.
    pub title: String,
    /// Message body.
    pub message: String,
    /// Category.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Optional deep link in the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
}

impl Notification {
    /// Tell the recipient of a deposit about the payout.
    #[must_use]
    pub fn deposit_received(deposit: &Deposit) -> Self {
        Self {
            user_id: deposit.user_id,
            title: "Deposit diterima".into(),
            message: format!(
                "Deposit sebesar Rp{} telah dicatat. {}",
                deposit.jumlah, deposit.keterangan
            )
            .trim_end()
            .to_string(),
            kind: NotificationKind::Deposit,
            link_url: Some(format!("/deposits/{}", deposit.id)),
        }
    }

    /// Tell a Link that stock was added.
    #[must_use]
    pub fn stock_received(stock: &VoucherStock, added: i64) -> Self {
        Self {
            user_id: stock.link_id,
            title: "Stok voucher bertambah".into(),
            message: format!(
                "{added} voucher {} ditambahkan, sisa stok {}",
                stock.voucher_type, stock.amount
            ),
            kind: NotificationKind::Stock,
            link_url: Some("/stock".into()),
        }
    }

    /// Tell a claimant the outcome of their claim.
    #[must_use]
    pub fn claim_resolved(klaim: &KlaimKupon) -> Self {
        let outcome = match klaim.status {
            KlaimStatus::Disetujui => "disetujui",
            KlaimStatus::Ditolak => "ditolak",
            KlaimStatus::Menunggu => "menunggu",
        };
        Self {
            user_id: klaim.user_id,
            title: "Klaim kupon diproses".into(),
            message: format!(
                "Klaim posisi {} Anda {}{}",
                klaim.posisi_pemenang,
                outcome,
                klaim
                    .catatan
                    .as_deref()
                    .map(|c| format!(": {c}"))
                    .unwrap_or_default()
            ),
            kind: NotificationKind::Klaim,
            link_url: Some(format!("/coupons/{}", klaim.kupon_id)),
        }
    }
}
