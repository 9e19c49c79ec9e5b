//! In-memory storage implementation.
//!
//! All state sits behind one `tokio` mutex, which gives every operation the
//! same isolation a database transaction would. Operations validate first and
//! mutate last, so an error leaves the store untouched.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;

use voucher_core::{
    rank_winners, Ancestry, Deposit, FeeSchedule, KlaimId, KlaimKupon, KlaimStatus, KuponHadiah,
    KuponId, LedgerError, NewDeposit, NewDistribution, NewSale, NewUser, Role, SaleFilter, Tier,
    User, UserId, VoucherSale, VoucherStock,
};

use crate::error::Result;
use crate::{DepositReceipt, Store};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    prices: HashMap<(UserId, String), FeeSchedule>,
    stock: HashMap<(String, UserId), VoucherStock>,
    sales: Vec<VoucherSale>,
    deposits: Vec<Deposit>,
    kupons: HashMap<KuponId, KuponHadiah>,
    claims: Vec<KlaimKupon>,
}

impl Inner {
    fn user(&self, id: &UserId) -> std::result::Result<&User, LedgerError> {
        self.users
            .get(id)
            .ok_or_else(|| LedgerError::not_found("user", id))
    }

    fn ancestry(&self, link_id: &UserId) -> std::result::Result<Ancestry, LedgerError> {
        let link = self.user(link_id)?;
        let cabang = link.parent_id.and_then(|id| self.users.get(&id));
        let mitra = cabang
            .and_then(|c| c.parent_id)
            .and_then(|id| self.users.get(&id));
        Ancestry::resolve(link, cabang, mitra)
    }

    fn unclaimed(&self, tier: Tier, user_id: &UserId) -> std::result::Result<i64, LedgerError> {
        let columns = tier.columns();
        self.sales
            .iter()
            .filter(|s| columns.owns(s, user_id))
            .try_fold(0_i64, |total, s| total.checked_add(columns.unclaimed(s)))
            .ok_or_else(|| LedgerError::invalid("unclaimed balance overflows"))
    }

    fn totals(&self, tier: Tier, from: NaiveDate, to: NaiveDate) -> Vec<(UserId, i64)> {
        let columns = tier.columns();
        let mut totals: HashMap<UserId, i64> = HashMap::new();
        for sale in &self.sales {
            let day = sale.created_at.date_naive();
            if day < from || day > to {
                continue;
            }
            *totals.entry(columns.owner(sale)).or_default() += sale.quantity_sold;
        }
        totals.into_iter().collect()
    }
}

/// In-memory implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, request: NewUser) -> Result<User> {
        let mut inner = self.inner.lock().await;

        let parent = request.parent_id.as_ref().map(|id| inner.user(id)).transpose()?;
        let user = request.into_user(parent)?;

        if inner.users.values().any(|u| u.username == user.username) {
            return Err(LedgerError::precondition(format!(
                "username {} is already taken",
                user.username
            ))
            .into());
        }

        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.inner.lock().await.users.get(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn put_fee_schedule(&self, mut schedule: FeeSchedule) -> Result<FeeSchedule> {
        schedule.validate()?;
        let mut inner = self.inner.lock().await;

        let cabang = inner.user(&schedule.cabang_id)?;
        if cabang.role != Role::Cabang {
            return Err(LedgerError::invalid(format!(
                "user {} is a {}, not a Cabang",
                cabang.id, cabang.role
            ))
            .into());
        }

        schedule.updated_at = Utc::now();
        inner.prices.insert(
            (schedule.cabang_id, schedule.voucher_type.clone()),
            schedule.clone(),
        );
        Ok(schedule)
    }

    async fn fee_schedule(
        &self,
        cabang_id: &UserId,
        voucher_type: &str,
    ) -> Result<Option<FeeSchedule>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .prices
            .get(&(*cabang_id, voucher_type.to_string()))
            .cloned())
    }

    async fn distribute_stock(&self, request: &NewDistribution) -> Result<VoucherStock> {
        request.validate()?;
        let mut inner = self.inner.lock().await;
        let ancestry = inner.ancestry(&request.link_id)?;

        let key = (request.voucher_type.clone(), request.link_id);
        let current = inner.stock.get(&key).map_or(0, |s| s.amount);
        let amount = current
            .checked_add(request.amount)
            .ok_or_else(|| LedgerError::invalid("stock amount overflows"))?;

        let row = VoucherStock {
            voucher_type: request.voucher_type.clone(),
            link_id: ancestry.link_id,
            cabang_id: ancestry.cabang_id,
            mitra_cabang_id: ancestry.mitra_cabang_id,
            amount,
            updated_at: Utc::now(),
        };
        inner.stock.insert(key, row.clone());
        Ok(row)
    }

    async fn list_stock(&self, link_id: &UserId) -> Result<Vec<VoucherStock>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .stock
            .values()
            .filter(|s| s.link_id == *link_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.voucher_type.cmp(&b.voucher_type));
        Ok(rows)
    }

    async fn record_sale(&self, request: &NewSale) -> Result<VoucherSale> {
        request.validate()?;
        let mut inner = self.inner.lock().await;

        let ancestry = inner.ancestry(&request.link_id)?;
        let schedule = inner
            .prices
            .get(&(ancestry.cabang_id, request.voucher_type.clone()))
            .ok_or_else(|| {
                LedgerError::not_found(
                    "fee schedule",
                    format!("{} at cabang {}", request.voucher_type, ancestry.cabang_id),
                )
            })?;
        let split = schedule.split(request.quantity)?;

        let key = (request.voucher_type.clone(), request.link_id);
        let available = inner.stock.get(&key).map(|s| s.amount).ok_or_else(|| {
            LedgerError::not_found(
                "voucher stock",
                format!("{} at link {}", request.voucher_type, request.link_id),
            )
        })?;
        if available < request.quantity {
            return Err(LedgerError::InsufficientStock {
                available,
                requested: request.quantity,
            }
            .into());
        }

        let sale = VoucherSale::new(
            request.voucher_type.clone(),
            request.quantity,
            &ancestry,
            &split,
            inner.unclaimed(Tier::Link, &ancestry.link_id)?,
            inner.unclaimed(Tier::Cabang, &ancestry.cabang_id)?,
        )?;

        if let Some(row) = inner.stock.get_mut(&key) {
            row.amount = available - request.quantity;
            row.updated_at = sale.created_at;
        }
        inner.sales.push(sale.clone());
        Ok(sale)
    }

    async fn list_sales(&self, filter: &SaleFilter) -> Result<Vec<VoucherSale>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sales
            .iter()
            .rev()
            .filter(|s| filter.matches(s))
            .skip(filter.offset)
            .take(filter.page_size())
            .cloned()
            .collect())
    }

    async fn unclaimed_balance(&self, tier: Tier, user_id: &UserId) -> Result<i64> {
        Ok(self.inner.lock().await.unclaimed(tier, user_id)?)
    }

    async fn sales_totals(
        &self,
        tier: Tier,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(UserId, i64)>> {
        Ok(self.inner.lock().await.totals(tier, from, to))
    }

    async fn record_deposit(&self, request: NewDeposit) -> Result<DepositReceipt> {
        request.validate()?;
        let mut inner = self.inner.lock().await;

        let recipient = inner.user(&request.user_id)?;
        let deposit = request.into_deposit(recipient)?;

        let columns = deposit.kategori.columns();
        let mut rows_reset = 0;
        for sale in inner
            .sales
            .iter_mut()
            .filter(|s| columns.owns(s, &deposit.user_id))
        {
            columns.reset(sale);
            rows_reset += 1;
        }
        inner.deposits.push(deposit.clone());

        Ok(DepositReceipt {
            deposit,
            rows_reset,
        })
    }

    async fn list_deposits(&self, user_id: &UserId) -> Result<Vec<Deposit>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .deposits
            .iter()
            .rev()
            .filter(|d| d.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn put_kupon(&self, kupon: &KuponHadiah) -> Result<()> {
        self.inner
            .lock()
            .await
            .kupons
            .insert(kupon.id, kupon.clone());
        Ok(())
    }

    async fn get_kupon(&self, id: &KuponId) -> Result<Option<KuponHadiah>> {
        Ok(self.inner.lock().await.kupons.get(id).cloned())
    }

    async fn list_kupons(&self) -> Result<Vec<KuponHadiah>> {
        let inner = self.inner.lock().await;
        let mut kupons: Vec<_> = inner.kupons.values().cloned().collect();
        kupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(kupons)
    }

    async fn create_claim(
        &self,
        kupon_id: &KuponId,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<KlaimKupon> {
        let mut inner = self.inner.lock().await;

        let kupon = inner
            .kupons
            .get(kupon_id)
            .ok_or_else(|| LedgerError::not_found("coupon", kupon_id))?;
        let user = inner.user(user_id)?;

        let winners = rank_winners(
            kupon,
            inner.totals(kupon.target_role, kupon.periode_mulai, kupon.periode_berakhir),
        );
        let filed: Vec<_> = inner
            .claims
            .iter()
            .filter(|c| c.kupon_id == *kupon_id)
            .cloned()
            .collect();
        let posisi = kupon.claim_position(user, &winners, &filed, today)?;

        let claim = KlaimKupon::new(*kupon_id, *user_id, posisi);
        inner.claims.push(claim.clone());
        Ok(claim)
    }

    async fn list_claims(&self, kupon_id: Option<&KuponId>) -> Result<Vec<KlaimKupon>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .claims
            .iter()
            .rev()
            .filter(|c| kupon_id.map_or(true, |id| c.kupon_id == *id))
            .cloned()
            .collect())
    }

    async fn resolve_claim(
        &self,
        id: &KlaimId,
        decision: KlaimStatus,
        catatan: Option<String>,
    ) -> Result<KlaimKupon> {
        let mut inner = self.inner.lock().await;
        let claim = inner
            .claims
            .iter_mut()
            .find(|c| c.id == *id)
            .ok_or_else(|| LedgerError::not_found("claim", id))?;

        claim.resolve(decision, catatan)?;
        Ok(claim.clone())
    }
}
