//! Reward coupons (kupon hadiah) and claims.
//!
//! A coupon ranks the members of one tier by vouchers sold within its period.
//! Members at or above the sales threshold take positions `1..=jumlah_pemenang`
//! and may file one claim each; an admin then approves or rejects the claim.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::hierarchy::User;
use crate::tier::Tier;
use crate::{KlaimId, KuponId, UserId};

/// Prize for one winning position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hadiah {
    /// 1-based position.
    pub posisi: u32,
    /// Prize description.
    pub hadiah: String,
}

/// A coupon definition. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KuponHadiah {
    /// Coupon id.
    pub id: KuponId,
    /// Display name.
    pub nama: String,
    /// Tier whose members compete.
    pub target_role: Tier,
    /// Minimum vouchers sold within the period to qualify.
    pub minimal_penjualan: i64,
    /// First day of the period (inclusive).
    pub periode_mulai: NaiveDate,
    /// Last day of the period (inclusive).
    pub periode_berakhir: NaiveDate,
    /// Number of winning positions.
    pub jumlah_pemenang: u32,
    /// Prizes ordered by position.
    pub hadiah: Vec<Hadiah>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl KuponHadiah {
    /// Whether the period has started on `today`.
    #[must_use]
    pub fn has_started(&self, today: NaiveDate) -> bool {
        today >= self.periode_mulai
    }

    /// Position `user` may claim, given the current ranking and the claims
    /// already filed against this coupon.
    ///
    /// # Errors
    ///
    /// Returns `FailedPrecondition` when the period has not started, the user
    /// is outside the target tier or the winners, or the user or their
    /// position already holds a claim.
    pub fn claim_position(
        &self,
        user: &User,
        winners: &[Winner],
        claims: &[KlaimKupon],
        today: NaiveDate,
    ) -> Result<u32> {
        if !self.has_started(today) {
            return Err(LedgerError::precondition(format!(
                "coupon {} starts on {}",
                self.id, self.periode_mulai
            )));
        }
        if user.role != self.target_role.role() {
            return Err(LedgerError::precondition(format!(
                "coupon {} is for {}, user {} is a {}",
                self.id, self.target_role, user.id, user.role
            )));
        }

        let posisi = winners
            .iter()
            .find(|w| w.user_id == user.id)
            .map(|w| w.posisi)
            .ok_or_else(|| {
                LedgerError::precondition(format!(
                    "user {} is not among the winners of coupon {}",
                    user.id, self.id
                ))
            })?;

        if claims.iter().any(|c| c.user_id == user.id) {
            return Err(LedgerError::precondition(format!(
                "user {} already claimed coupon {}",
                user.id, self.id
            )));
        }
        if claims.iter().any(|c| c.posisi_pemenang == posisi) {
            return Err(LedgerError::precondition(format!(
                "position {posisi} of coupon {} is already claimed",
                self.id
            )));
        }
        Ok(posisi)
    }
}

/// A request to create a coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKupon {
    /// Display name.
    pub nama: String,
    /// Tier whose members compete.
    pub target_role: Tier,
    /// Minimum vouchers sold within the period to qualify.
    pub minimal_penjualan: i64,
    /// First day of the period.
    pub periode_mulai: NaiveDate,
    /// Last day of the period.
    pub periode_berakhir: NaiveDate,
    /// Number of winning positions.
    pub jumlah_pemenang: u32,
    /// One prize per position.
    pub hadiah: Vec<Hadiah>,
}

impl NewKupon {
    /// Validate the definition as of `today` and build the coupon.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the name is blank, the threshold is not
    /// positive, the period is empty or already over, or the prize positions
    /// are not exactly `1..=jumlah_pemenang`.
    pub fn into_kupon(mut self, today: NaiveDate) -> Result<KuponHadiah> {
        if self.nama.trim().is_empty() {
            return Err(LedgerError::invalid("nama must not be empty"));
        }
        if self.minimal_penjualan <= 0 {
            return Err(LedgerError::invalid("minimal_penjualan must be positive"));
        }
        if self.periode_mulai >= self.periode_berakhir {
            return Err(LedgerError::invalid(
                "periode_mulai must be before periode_berakhir",
            ));
        }
        if self.periode_berakhir < today {
            return Err(LedgerError::invalid("periode_berakhir is in the past"));
        }
        if self.jumlah_pemenang == 0 {
            return Err(LedgerError::invalid("jumlah_pemenang must be positive"));
        }
        if self.hadiah.len() != self.jumlah_pemenang as usize {
            return Err(LedgerError::invalid(format!(
                "expected {} prizes, got {}",
                self.jumlah_pemenang,
                self.hadiah.len()
            )));
        }
        if self.hadiah.iter().any(|h| h.hadiah.trim().is_empty()) {
            return Err(LedgerError::invalid("prize description must not be empty"));
        }

        self.hadiah.sort_by_key(|h| h.posisi);
        let consecutive = self
            .hadiah
            .iter()
            .zip(1u32..)
            .all(|(h, expected)| h.posisi == expected);
        if !consecutive {
            return Err(LedgerError::invalid(
                "prize positions must run from 1 to jumlah_pemenang without gaps",
            ));
        }

        Ok(KuponHadiah {
            id: KuponId::generate(),
            nama: self.nama.trim().to_string(),
            target_role: self.target_role,
            minimal_penjualan: self.minimal_penjualan,
            periode_mulai: self.periode_mulai,
            periode_berakhir: self.periode_berakhir,
            jumlah_pemenang: self.jumlah_pemenang,
            hadiah: self.hadiah,
            created_at: Utc::now(),
        })
    }
}

/// Claim approval state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KlaimStatus {
    /// Awaiting review.
    Menunggu,
    /// Approved.
    Disetujui,
    /// Rejected.
    Ditolak,
}

impl KlaimStatus {
    /// Storage and wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Menunggu => "menunggu",
            Self::Disetujui => "disetujui",
            Self::Ditolak => "ditolak",
        }
    }

    /// Parse a review decision. Only the two terminal states are accepted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `menunggu` or any unknown value.
    pub fn decision(s: &str) -> Result<Self> {
        match s.parse()? {
            Self::Menunggu => Err(LedgerError::invalid(
                "decision must be disetujui or ditolak",
            )),
            terminal => Ok(terminal),
        }
    }
}

impl fmt::Display for KlaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KlaimStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "menunggu" => Ok(Self::Menunggu),
            "disetujui" => Ok(Self::Disetujui),
            "ditolak" => Ok(Self::Ditolak),
            other => Err(LedgerError::invalid(format!("unknown claim status: {other}"))),
        }
    }
}

/// A claim filed by a winner against a coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KlaimKupon {
    /// Claim id.
    pub id: KlaimId,
    /// Coupon claimed.
    pub kupon_id: KuponId,
    /// Claimant.
    pub user_id: UserId,
    /// Winning position the claim is for.
    pub posisi_pemenang: u32,
    /// Review state.
    pub status: KlaimStatus,
    /// Reviewer note.
    pub catatan: Option<String>,
    /// Filing time.
    pub created_at: DateTime<Utc>,
    /// Review time.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl KlaimKupon {
    /// A new pending claim.
    #[must_use]
    pub fn new(kupon_id: KuponId, user_id: UserId, posisi_pemenang: u32) -> Self {
        Self {
            id: KlaimId::generate(),
            kupon_id,
            user_id,
            posisi_pemenang,
            status: KlaimStatus::Menunggu,
            catatan: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Move a pending claim to `decision`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `decision` is `menunggu`.
    /// - `FailedPrecondition` if the claim was already reviewed.
    pub fn resolve(&mut self, decision: KlaimStatus, catatan: Option<String>) -> Result<()> {
        if decision == KlaimStatus::Menunggu {
            return Err(LedgerError::invalid(
                "decision must be disetujui or ditolak",
            ));
        }
        if self.status != KlaimStatus::Menunggu {
            return Err(LedgerError::precondition(format!(
                "claim {} is already {}",
                self.id, self.status
            )));
        }

        self.status = decision;
        self.catatan = catatan.filter(|c| !c.trim().is_empty());
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

/// A ranked participant of a coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// 1-based position.
    pub posisi: u32,
    /// Participant.
    pub user_id: UserId,
    /// Vouchers sold within the period.
    pub total_terjual: i64,
}

/// Rank per-user sales totals into winners of `kupon`.
///
/// Users below `minimal_penjualan` are dropped; the rest are ordered by total
/// descending (ties by user id) and cut at `jumlah_pemenang`.
#[must_use]
pub fn rank_winners(kupon: &KuponHadiah, mut totals: Vec<(UserId, i64)>) -> Vec<Winner> {
    totals.retain(|(_, total)| *total >= kupon.minimal_penjualan);
    totals.sort_by(|(a_id, a), (b_id, b)| b.cmp(a).then_with(|| a_id.cmp(b_id)));

    totals
        .into_iter()
        .take(kupon.jumlah_pemenang as usize)
        .zip(1u32..)
        .map(|((user_id, total_terjual), posisi)| Winner {
            posisi,
            user_id,
            total_terjual,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn request(positions: &[u32], jumlah_pemenang: u32) -> NewKupon {
        NewKupon {
            nama: "Promo Maret".into(),
            target_role: Tier::Link,
            minimal_penjualan: 100,
            periode_mulai: today(),
            periode_berakhir: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            jumlah_pemenang,
            hadiah: positions
                .iter()
                .map(|p| Hadiah {
                    posisi: *p,
                    hadiah: format!("Hadiah {p}"),
                })
                .collect(),
        }
    }

    #[test]
    fn accepts_unordered_consecutive_positions() {
        let kupon = request(&[2, 1, 3], 3).into_kupon(today()).unwrap();
        let positions: Vec<_> = kupon.hadiah.iter().map(|h| h.posisi).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(kupon.hadiah[1].hadiah, "Hadiah 2");
    }

    #[test]
    fn rejects_gap_in_positions() {
        let err = request(&[1, 3], 2).into_kupon(today()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_duplicate_positions() {
        assert!(request(&[1, 1], 2).into_kupon(today()).is_err());
    }

    #[test]
    fn rejects_prize_count_mismatch() {
        assert!(request(&[1, 2], 3).into_kupon(today()).is_err());
    }

    #[test]
    fn rejects_bad_period_and_threshold() {
        let mut req = request(&[1], 1);
        req.periode_berakhir = req.periode_mulai;
        assert!(req.into_kupon(today()).is_err());

        let req = request(&[1], 1);
        let later = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert!(req.into_kupon(later).is_err());

        let mut req = request(&[1], 1);
        req.minimal_penjualan = 0;
        assert!(req.into_kupon(today()).is_err());

        let mut req = request(&[1], 1);
        req.nama = String::new();
        assert!(req.into_kupon(today()).is_err());
    }

    #[test]
    fn claim_resolves_once() {
        let mut claim = KlaimKupon::new(KuponId::generate(), UserId::generate(), 1);
        claim
            .resolve(KlaimStatus::Disetujui, Some("ok".into()))
            .unwrap();
        assert_eq!(claim.status, KlaimStatus::Disetujui);
        assert!(claim.resolved_at.is_some());

        let err = claim.resolve(KlaimStatus::Ditolak, None).unwrap_err();
        assert!(matches!(err, LedgerError::FailedPrecondition(_)));
    }

    #[test]
    fn decision_rejects_pending_and_unknown() {
        assert_eq!(
            KlaimStatus::decision("disetujui").unwrap(),
            KlaimStatus::Disetujui
        );
        assert!(KlaimStatus::decision("menunggu").is_err());
        assert!(KlaimStatus::decision("approved").is_err());
    }

    #[test]
    fn claim_position_requires_winning_participant() {
        use crate::hierarchy::Role;

        let kupon = request(&[1, 2], 2).into_kupon(today()).unwrap();
        let participant = |role| User {
            id: UserId::generate(),
            role,
            parent_id: None,
            full_name: "Peserta".into(),
            username: format!("peserta-{}", UserId::generate()),
            created_at: Utc::now(),
        };
        let winner = participant(Role::Link);
        let loser = participant(Role::Link);
        let cabang = participant(Role::Cabang);
        let winners = rank_winners(&kupon, vec![(winner.id, 500), (cabang.id, 900)]);

        assert_eq!(kupon.claim_position(&winner, &winners, &[], today()).unwrap(), 2);
        assert!(kupon.claim_position(&loser, &winners, &[], today()).is_err());
        assert!(kupon.claim_position(&cabang, &winners, &[], today()).is_err());

        let filed = KlaimKupon::new(kupon.id, winner.id, 2);
        let err = kupon
            .claim_position(&winner, &winners, &[filed], today())
            .unwrap_err();
        assert!(matches!(err, LedgerError::FailedPrecondition(_)));

        let before = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert!(kupon.claim_position(&winner, &winners, &[], before).is_err());
    }

    #[test]
    fn ranking_applies_threshold_and_limit() {
        let kupon = request(&[1, 2], 2).into_kupon(today()).unwrap();
        let (a, b, c, d) = (
            UserId::generate(),
            UserId::generate(),
            UserId::generate(),
            UserId::generate(),
        );
        let winners = rank_winners(&kupon, vec![(a, 150), (b, 99), (c, 400), (d, 120)]);

        assert_eq!(winners.len(), 2);
        assert_eq!(winners[0].user_id, c);
        assert_eq!(winners[0].posisi, 1);
        assert_eq!(winners[1].user_id, a);
        assert_eq!(winners[1].posisi, 2);
    }
}
