//! PostgreSQL storage implementation.
//!
//! Queries are built at runtime (`sqlx::query`) so the crate compiles without
//! a live database. Tier-specific column names come from
//! [`voucher_core::TierColumns`], which only holds static identifiers.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use voucher_core::{
    rank_winners, Ancestry, Deposit, FeeSchedule, Hadiah, KlaimId, KlaimKupon, KlaimStatus,
    KuponHadiah, KuponId, LedgerError, NewDeposit, NewDistribution, NewSale, NewUser, Role,
    SaleFilter, Tier, User, UserId, VoucherSale, VoucherStock,
};

use crate::error::{Result, StoreError};
use crate::{DepositReceipt, Store};

const USER_COLUMNS: &str = "id, role, parent_id, full_name, username, created_at";

const SALE_COLUMNS: &str = "id, voucher_type, quantity_sold, link_id, cabang_id, \
     mitra_cabang_id, created_at, fee_link, fee_cabang, komisi_mitra, pendapatan_owner, \
     total_pendapatan_link, total_pendapatan_cabang";

const STOCK_COLUMNS: &str =
    "voucher_type, link_id, cabang_id, mitra_cabang_id, amount, updated_at";

const PRICE_COLUMNS: &str = "cabang_id, voucher_type, unit_price, unit_fee_link, \
     unit_fee_cabang, unit_komisi_mitra, updated_at";

const DEPOSIT_COLUMNS: &str = "id, kategori, COALESCE(link_id, cabang_id, mitra_id) AS user_id, \
     jumlah, keterangan, created_at";

const KUPON_COLUMNS: &str = "id, nama, target_role, minimal_penjualan, periode_mulai, \
     periode_berakhir, jumlah_pemenang, created_at";

const KLAIM_COLUMNS: &str =
    "id, kupon_id, user_id, posisi_pemenang, status, catatan, created_at, resolved_at";

/// PostgreSQL-backed storage implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `url` with at most `max_connections` pooled connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Migration` if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    /// Lock and load a user row.
    async fn lock_user(conn: &mut PgConnection, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Lock a Link and its ancestors, top of the chain last.
    async fn lock_ancestry(conn: &mut PgConnection, link_id: &UserId) -> Result<Ancestry> {
        let link = Self::lock_user(conn, link_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("user", link_id))?;
        let cabang = match link.parent_id {
            Some(id) => Self::lock_user(conn, &id).await?,
            None => None,
        };
        let mitra = match cabang.as_ref().and_then(|c| c.parent_id) {
            Some(id) => Self::lock_user(conn, &id).await?,
            None => None,
        };
        Ok(Ancestry::resolve(&link, cabang.as_ref(), mitra.as_ref())?)
    }

    async fn unclaimed_in(conn: &mut PgConnection, tier: Tier, user_id: &UserId) -> Result<i64> {
        let columns = tier.columns();
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM({}), 0)::BIGINT FROM voucher_sales WHERE {} = $1",
            columns.fee_column, columns.owner_column
        ))
        .bind(user_id.as_uuid())
        .fetch_one(&mut *conn)
        .await?;
        Ok(total)
    }

    async fn totals_in(
        conn: &mut PgConnection,
        tier: Tier,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(UserId, i64)>> {
        let owner = tier.columns().owner_column;
        let rows = sqlx::query(&format!(
            "SELECT {owner} AS owner, SUM(quantity_sold)::BIGINT AS total \
             FROM voucher_sales \
             WHERE (created_at AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2 \
             GROUP BY {owner}"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| -> Result<(UserId, i64)> {
                Ok((
                    UserId::from_uuid(row.try_get("owner")?),
                    row.try_get("total")?,
                ))
            })
            .collect()
    }

    async fn load_hadiah(conn: &mut PgConnection, kupon_id: &KuponId) -> Result<Vec<Hadiah>> {
        let rows = sqlx::query(
            "SELECT posisi, hadiah FROM kupon_hadiah_item WHERE kupon_id = $1 ORDER BY posisi",
        )
        .bind(kupon_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(hadiah_from_row).collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, request: NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let parent = match request.parent_id {
            Some(id) => Some(
                Self::lock_user(&mut tx, &id)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("user", id))?,
            ),
            None => None,
        };
        let user = request.into_user(parent.as_ref())?;

        let inserted = sqlx::query(
            "INSERT INTO users (id, role, parent_id, full_name, username, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id.as_uuid())
        .bind(user.role.as_str())
        .bind(user.parent_id.map(|id| *id.as_uuid()))
        .bind(&user.full_name)
        .bind(&user.username)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(LedgerError::precondition(format!(
                    "username {} is already taken",
                    user.username
                ))
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn put_fee_schedule(&self, schedule: FeeSchedule) -> Result<FeeSchedule> {
        schedule.validate()?;

        let cabang = self
            .find_user(&schedule.cabang_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("user", schedule.cabang_id))?;
        if cabang.role != Role::Cabang {
            return Err(LedgerError::invalid(format!(
                "user {} is a {}, not a Cabang",
                cabang.id, cabang.role
            ))
            .into());
        }

        let row = sqlx::query(&format!(
            "INSERT INTO voucher_prices \
                 (cabang_id, voucher_type, unit_price, unit_fee_link, unit_fee_cabang, \
                  unit_komisi_mitra, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, now()) \
             ON CONFLICT (cabang_id, voucher_type) DO UPDATE SET \
                 unit_price = EXCLUDED.unit_price, \
                 unit_fee_link = EXCLUDED.unit_fee_link, \
                 unit_fee_cabang = EXCLUDED.unit_fee_cabang, \
                 unit_komisi_mitra = EXCLUDED.unit_komisi_mitra, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {PRICE_COLUMNS}"
        ))
        .bind(schedule.cabang_id.as_uuid())
        .bind(&schedule.voucher_type)
        .bind(schedule.unit_price)
        .bind(schedule.unit_fee_link)
        .bind(schedule.unit_fee_cabang)
        .bind(schedule.unit_komisi_mitra)
        .fetch_one(&self.pool)
        .await?;

        price_from_row(&row)
    }

    async fn fee_schedule(
        &self,
        cabang_id: &UserId,
        voucher_type: &str,
    ) -> Result<Option<FeeSchedule>> {
        let row = sqlx::query(&format!(
            "SELECT {PRICE_COLUMNS} FROM voucher_prices \
             WHERE cabang_id = $1 AND voucher_type = $2"
        ))
        .bind(cabang_id.as_uuid())
        .bind(voucher_type)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(price_from_row).transpose()
    }

    async fn distribute_stock(&self, request: &NewDistribution) -> Result<VoucherStock> {
        request.validate()?;
        let mut tx = self.pool.begin().await?;
        let ancestry = Self::lock_ancestry(&mut tx, &request.link_id).await?;

        let row = sqlx::query(&format!(
            "INSERT INTO voucher_stocks \
                 (voucher_type, link_id, cabang_id, mitra_cabang_id, amount, updated_at) \
             VALUES ($1, $2, $3, $4, $5, now()) \
             ON CONFLICT (voucher_type, link_id) DO UPDATE SET \
                 amount = voucher_stocks.amount + EXCLUDED.amount, \
                 cabang_id = EXCLUDED.cabang_id, \
                 mitra_cabang_id = EXCLUDED.mitra_cabang_id, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {STOCK_COLUMNS}"
        ))
        .bind(&request.voucher_type)
        .bind(ancestry.link_id.as_uuid())
        .bind(ancestry.cabang_id.as_uuid())
        .bind(ancestry.mitra_cabang_id.as_uuid())
        .bind(request.amount)
        .fetch_one(&mut *tx)
        .await?;
        let stock = stock_from_row(&row)?;

        tx.commit().await?;
        Ok(stock)
    }

    async fn list_stock(&self, link_id: &UserId) -> Result<Vec<VoucherStock>> {
        let rows = sqlx::query(&format!(
            "SELECT {STOCK_COLUMNS} FROM voucher_stocks WHERE link_id = $1 ORDER BY voucher_type"
        ))
        .bind(link_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(stock_from_row).collect()
    }

    async fn record_sale(&self, request: &NewSale) -> Result<VoucherSale> {
        request.validate()?;
        let mut tx = self.pool.begin().await?;

        // Holding the tier owners' rows serializes running-total updates
        // against concurrent sales and deposits.
        let ancestry = Self::lock_ancestry(&mut tx, &request.link_id).await?;

        let schedule = sqlx::query(&format!(
            "SELECT {PRICE_COLUMNS} FROM voucher_prices \
             WHERE cabang_id = $1 AND voucher_type = $2"
        ))
        .bind(ancestry.cabang_id.as_uuid())
        .bind(&request.voucher_type)
        .fetch_optional(&mut *tx)
        .await?
        .as_ref()
        .map(price_from_row)
        .transpose()?
        .ok_or_else(|| {
            LedgerError::not_found(
                "fee schedule",
                format!("{} at cabang {}", request.voucher_type, ancestry.cabang_id),
            )
        })?;
        let split = schedule.split(request.quantity)?;

        let available: i64 = sqlx::query_scalar(
            "SELECT amount FROM voucher_stocks \
             WHERE voucher_type = $1 AND link_id = $2 FOR UPDATE",
        )
        .bind(&request.voucher_type)
        .bind(request.link_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
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

        sqlx::query(
            "UPDATE voucher_stocks SET amount = amount - $3, updated_at = now() \
             WHERE voucher_type = $1 AND link_id = $2",
        )
        .bind(&request.voucher_type)
        .bind(request.link_id.as_uuid())
        .bind(request.quantity)
        .execute(&mut *tx)
        .await?;

        let link_before = Self::unclaimed_in(&mut tx, Tier::Link, &ancestry.link_id).await?;
        let cabang_before = Self::unclaimed_in(&mut tx, Tier::Cabang, &ancestry.cabang_id).await?;
        let sale = VoucherSale::new(
            request.voucher_type.clone(),
            request.quantity,
            &ancestry,
            &split,
            link_before,
            cabang_before,
        )?;

        sqlx::query(&format!(
            "INSERT INTO voucher_sales ({SALE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(sale.id.to_string())
        .bind(&sale.voucher_type)
        .bind(sale.quantity_sold)
        .bind(sale.link_id.as_uuid())
        .bind(sale.cabang_id.as_uuid())
        .bind(sale.mitra_cabang_id.as_uuid())
        .bind(sale.created_at)
        .bind(sale.fee_link)
        .bind(sale.fee_cabang)
        .bind(sale.komisi_mitra)
        .bind(sale.pendapatan_owner)
        .bind(sale.total_pendapatan_link)
        .bind(sale.total_pendapatan_cabang)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(sale)
    }

    async fn list_sales(&self, filter: &SaleFilter) -> Result<Vec<VoucherSale>> {
        let limit = i64::try_from(filter.page_size()).unwrap_or(i64::MAX);
        let offset = i64::try_from(filter.offset).unwrap_or(i64::MAX);

        let rows = sqlx::query(&format!(
            "SELECT {SALE_COLUMNS} FROM voucher_sales \
             WHERE ($1::UUID IS NULL OR link_id = $1) \
               AND ($2::UUID IS NULL OR cabang_id = $2) \
               AND ($3::UUID IS NULL OR mitra_cabang_id = $3) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4 OFFSET $5"
        ))
        .bind(filter.link_id.map(|id| *id.as_uuid()))
        .bind(filter.cabang_id.map(|id| *id.as_uuid()))
        .bind(filter.mitra_cabang_id.map(|id| *id.as_uuid()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(sale_from_row).collect()
    }

    async fn unclaimed_balance(&self, tier: Tier, user_id: &UserId) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::unclaimed_in(&mut conn, tier, user_id).await
    }

    async fn sales_totals(
        &self,
        tier: Tier,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(UserId, i64)>> {
        let mut conn = self.pool.acquire().await?;
        Self::totals_in(&mut conn, tier, from, to).await
    }

    async fn record_deposit(&self, request: NewDeposit) -> Result<DepositReceipt> {
        request.validate()?;
        let mut tx = self.pool.begin().await?;

        let recipient = Self::lock_user(&mut tx, &request.user_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("user", request.user_id))?;
        let deposit = request.into_deposit(&recipient)?;
        let columns = deposit.kategori.columns();

        sqlx::query(
            "INSERT INTO deposit \
             (id, kategori, link_id, cabang_id, mitra_id, jumlah, keterangan, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(deposit.id.to_string())
        .bind(deposit.kategori.as_str())
        .bind(deposit.link_id().map(|id| *id.as_uuid()))
        .bind(deposit.cabang_id().map(|id| *id.as_uuid()))
        .bind(deposit.mitra_id().map(|id| *id.as_uuid()))
        .bind(deposit.jumlah)
        .bind(&deposit.keterangan)
        .bind(deposit.created_at)
        .execute(&mut *tx)
        .await?;

        let rows_reset = sqlx::query(&format!(
            "UPDATE voucher_sales SET {} WHERE {} = $1",
            columns.reset_assignments, columns.owner_column
        ))
        .bind(deposit.user_id.as_uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(DepositReceipt {
            deposit,
            rows_reset,
        })
    }

    async fn list_deposits(&self, user_id: &UserId) -> Result<Vec<Deposit>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEPOSIT_COLUMNS} FROM deposit \
             WHERE link_id = $1 OR cabang_id = $1 OR mitra_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(deposit_from_row).collect()
    }

    async fn put_kupon(&self, kupon: &KuponHadiah) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO kupon_hadiah ({KUPON_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(kupon.id.as_uuid())
        .bind(&kupon.nama)
        .bind(kupon.target_role.as_str())
        .bind(kupon.minimal_penjualan)
        .bind(kupon.periode_mulai)
        .bind(kupon.periode_berakhir)
        .bind(to_i32(kupon.jumlah_pemenang)?)
        .bind(kupon.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &kupon.hadiah {
            sqlx::query(
                "INSERT INTO kupon_hadiah_item (kupon_id, posisi, hadiah) VALUES ($1, $2, $3)",
            )
            .bind(kupon.id.as_uuid())
            .bind(to_i32(item.posisi)?)
            .bind(&item.hadiah)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_kupon(&self, id: &KuponId) -> Result<Option<KuponHadiah>> {
        let mut conn = self.pool.acquire().await?;
        let Some(row) = sqlx::query(&format!(
            "SELECT {KUPON_COLUMNS} FROM kupon_hadiah WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let hadiah = Self::load_hadiah(&mut conn, id).await?;
        kupon_from_row(&row, hadiah).map(Some)
    }

    async fn list_kupons(&self) -> Result<Vec<KuponHadiah>> {
        let rows = sqlx::query(&format!(
            "SELECT {KUPON_COLUMNS} FROM kupon_hadiah ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let items = sqlx::query(
            "SELECT kupon_id, posisi, hadiah FROM kupon_hadiah_item ORDER BY kupon_id, posisi",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut by_kupon: HashMap<Uuid, Vec<Hadiah>> = HashMap::new();
        for item in &items {
            by_kupon
                .entry(item.try_get("kupon_id")?)
                .or_default()
                .push(hadiah_from_row(item)?);
        }

        rows.iter()
            .map(|row| -> Result<KuponHadiah> {
                let id: Uuid = row.try_get("id")?;
                kupon_from_row(row, by_kupon.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn create_claim(
        &self,
        kupon_id: &KuponId,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<KlaimKupon> {
        let mut tx = self.pool.begin().await?;

        // Locking the coupon serializes claims against it.
        let row = sqlx::query(&format!(
            "SELECT {KUPON_COLUMNS} FROM kupon_hadiah WHERE id = $1 FOR UPDATE"
        ))
        .bind(kupon_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::not_found("coupon", kupon_id))?;
        let hadiah = Self::load_hadiah(&mut tx, kupon_id).await?;
        let kupon = kupon_from_row(&row, hadiah)?;

        let user = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()?
            .ok_or_else(|| LedgerError::not_found("user", user_id))?;

        let totals = Self::totals_in(
            &mut tx,
            kupon.target_role,
            kupon.periode_mulai,
            kupon.periode_berakhir,
        )
        .await?;
        let winners = rank_winners(&kupon, totals);

        let filed = sqlx::query(&format!(
            "SELECT {KLAIM_COLUMNS} FROM klaim_kupon WHERE kupon_id = $1"
        ))
        .bind(kupon_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(klaim_from_row)
        .collect::<Result<Vec<_>>>()?;

        let posisi = kupon.claim_position(&user, &winners, &filed, today)?;
        let claim = KlaimKupon::new(*kupon_id, *user_id, posisi);

        sqlx::query(&format!(
            "INSERT INTO klaim_kupon ({KLAIM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(claim.id.as_uuid())
        .bind(claim.kupon_id.as_uuid())
        .bind(claim.user_id.as_uuid())
        .bind(to_i32(claim.posisi_pemenang)?)
        .bind(claim.status.as_str())
        .bind(&claim.catatan)
        .bind(claim.created_at)
        .bind(claim.resolved_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(claim)
    }

    async fn list_claims(&self, kupon_id: Option<&KuponId>) -> Result<Vec<KlaimKupon>> {
        let rows = sqlx::query(&format!(
            "SELECT {KLAIM_COLUMNS} FROM klaim_kupon \
             WHERE ($1::UUID IS NULL OR kupon_id = $1) \
             ORDER BY created_at DESC"
        ))
        .bind(kupon_id.map(|id| *id.as_uuid()))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(klaim_from_row).collect()
    }

    async fn resolve_claim(
        &self,
        id: &KlaimId,
        decision: KlaimStatus,
        catatan: Option<String>,
    ) -> Result<KlaimKupon> {
        let mut tx = self.pool.begin().await?;

        let mut claim = sqlx::query(&format!(
            "SELECT {KLAIM_COLUMNS} FROM klaim_kupon WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .as_ref()
        .map(klaim_from_row)
        .transpose()?
        .ok_or_else(|| LedgerError::not_found("claim", id))?;

        claim.resolve(decision, catatan)?;

        sqlx::query(
            "UPDATE klaim_kupon SET status = $2, catatan = $3, resolved_at = $4 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(claim.status.as_str())
        .bind(&claim.catatan)
        .bind(claim.resolved_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(claim)
    }
}

// =============================================================================
// Row decoding
// =============================================================================

fn parse<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StoreError::Decode(format!("{value}: {e}")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("{value} exceeds INTEGER")))
}

fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("{value} is negative")))
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        role: parse::<Role>(row.try_get("role")?)?,
        parent_id: row
            .try_get::<Option<Uuid>, _>("parent_id")?
            .map(UserId::from_uuid),
        full_name: row.try_get("full_name")?,
        username: row.try_get("username")?,
        created_at: row.try_get("created_at")?,
    })
}

fn price_from_row(row: &PgRow) -> Result<FeeSchedule> {
    Ok(FeeSchedule {
        cabang_id: UserId::from_uuid(row.try_get("cabang_id")?),
        voucher_type: row.try_get("voucher_type")?,
        unit_price: row.try_get("unit_price")?,
        unit_fee_link: row.try_get("unit_fee_link")?,
        unit_fee_cabang: row.try_get("unit_fee_cabang")?,
        unit_komisi_mitra: row.try_get("unit_komisi_mitra")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn stock_from_row(row: &PgRow) -> Result<VoucherStock> {
    Ok(VoucherStock {
        voucher_type: row.try_get("voucher_type")?,
        link_id: UserId::from_uuid(row.try_get("link_id")?),
        cabang_id: UserId::from_uuid(row.try_get("cabang_id")?),
        mitra_cabang_id: UserId::from_uuid(row.try_get("mitra_cabang_id")?),
        amount: row.try_get("amount")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn sale_from_row(row: &PgRow) -> Result<VoucherSale> {
    Ok(VoucherSale {
        id: parse(row.try_get("id")?)?,
        voucher_type: row.try_get("voucher_type")?,
        quantity_sold: row.try_get("quantity_sold")?,
        link_id: UserId::from_uuid(row.try_get("link_id")?),
        cabang_id: UserId::from_uuid(row.try_get("cabang_id")?),
        mitra_cabang_id: UserId::from_uuid(row.try_get("mitra_cabang_id")?),
        created_at: row.try_get("created_at")?,
        fee_link: row.try_get("fee_link")?,
        fee_cabang: row.try_get("fee_cabang")?,
        komisi_mitra: row.try_get("komisi_mitra")?,
        pendapatan_owner: row.try_get("pendapatan_owner")?,
        total_pendapatan_link: row.try_get("total_pendapatan_link")?,
        total_pendapatan_cabang: row.try_get("total_pendapatan_cabang")?,
    })
}

fn deposit_from_row(row: &PgRow) -> Result<Deposit> {
    Ok(Deposit {
        id: parse(row.try_get("id")?)?,
        kategori: parse::<Tier>(row.try_get("kategori")?)?,
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        jumlah: row.try_get("jumlah")?,
        keterangan: row.try_get("keterangan")?,
        created_at: row.try_get("created_at")?,
    })
}

fn hadiah_from_row(row: &PgRow) -> Result<Hadiah> {
    Ok(Hadiah {
        posisi: to_u32(row.try_get("posisi")?)?,
        hadiah: row.try_get("hadiah")?,
    })
}

fn kupon_from_row(row: &PgRow, hadiah: Vec<Hadiah>) -> Result<KuponHadiah> {
    Ok(KuponHadiah {
        id: KuponId::from_uuid(row.try_get("id")?),
        nama: row.try_get("nama")?,
        target_role: parse::<Tier>(row.try_get("target_role")?)?,
        minimal_penjualan: row.try_get("minimal_penjualan")?,
        periode_mulai: row.try_get("periode_mulai")?,
        periode_berakhir: row.try_get("periode_berakhir")?,
        jumlah_pemenang: to_u32(row.try_get("jumlah_pemenang")?)?,
        hadiah,
        created_at: row.try_get("created_at")?,
    })
}

fn klaim_from_row(row: &PgRow) -> Result<KlaimKupon> {
    Ok(KlaimKupon {
        id: KlaimId::from_uuid(row.try_get("id")?),
        kupon_id: KuponId::from_uuid(row.try_get("kupon_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        posisi_pemenang: to_u32(row.try_get("posisi_pemenang")?)?,
        status: parse::<KlaimStatus>(row.try_get("status")?)?,
        catatan: row.try_get("catatan")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

/// These run against the database named by `DATABASE_URL` and are skipped
/// when it is unset. Every test creates its own users, so they can share a
/// database with other runs.
#[cfg(test)]
mod tests {
    use super::*;

    struct Tree {
        mitra: User,
        cabang: User,
        links: [User; 2],
    }

    async fn store() -> Option<PgStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping postgres test");
            return None;
        };
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .unwrap();
        let store = PgStore::from_pool(pool);
        store.migrate().await.unwrap();
        Some(store)
    }

    async fn user(store: &PgStore, role: Role, parent: Option<&User>, name: &str) -> User {
        store
            .create_user(NewUser {
                role,
                parent_id: parent.map(|p| p.id),
                full_name: name.to_uppercase(),
                username: format!("{name}-{}", Uuid::new_v4()),
            })
            .await
            .unwrap()
    }

    /// One Mitra → Cabang with two Links, each holding `stock` vouchers of
    /// type A at 10 000 (fees 1 000 / 500 / 300).
    async fn seeded(store: &PgStore, stock: i64) -> Tree {
        let mitra = user(store, Role::MitraCabang, None, "mitra").await;
        let cabang = user(store, Role::Cabang, Some(&mitra), "cabang").await;
        let first = user(store, Role::Link, Some(&cabang), "link-a").await;
        let second = user(store, Role::Link, Some(&cabang), "link-b").await;

        store
            .put_fee_schedule(FeeSchedule {
                cabang_id: cabang.id,
                voucher_type: "A".into(),
                unit_price: 10_000,
                unit_fee_link: 1_000,
                unit_fee_cabang: 500,
                unit_komisi_mitra: 300,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        for link in [&first, &second] {
            store
                .distribute_stock(&NewDistribution {
                    voucher_type: "A".into(),
                    link_id: link.id,
                    amount: stock,
                })
                .await
                .unwrap();
        }

        Tree {
            mitra,
            cabang,
            links: [first, second],
        }
    }

    async fn sell(store: &PgStore, link: &User, quantity: i64) -> Result<VoucherSale> {
        store
            .record_sale(&NewSale {
                voucher_type: "A".into(),
                quantity,
                link_id: link.id,
            })
            .await
    }

    async fn sales_of(store: &PgStore, link: &User) -> Vec<VoucherSale> {
        store
            .list_sales(&SaleFilter {
                link_id: Some(link.id),
                ..SaleFilter::default()
            })
            .await
            .unwrap()
    }

    async fn deposit(store: &PgStore, kategori: Tier, user: &User, jumlah: i64) -> DepositReceipt {
        store
            .record_deposit(NewDeposit {
                kategori,
                user_id: user.id,
                jumlah,
                keterangan: "transfer".into(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn oversell_leaves_stock_and_sales_unchanged() {
        let Some(store) = store().await else { return };
        let tree = seeded(&store, 5).await;
        let link = &tree.links[0];

        sell(&store, link, 3).await.unwrap();
        let err = sell(&store, link, 3).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::InsufficientStock {
                available: 2,
                requested: 3
            })
        ));

        assert_eq!(store.list_stock(&link.id).await.unwrap()[0].amount, 2);
        assert_eq!(sales_of(&store, link).await.len(), 1);
        assert_eq!(
            store.unclaimed_balance(Tier::Link, &link.id).await.unwrap(),
            3_000
        );
    }

    #[tokio::test]
    async fn running_totals_accumulate_per_link() {
        let Some(store) = store().await else { return };
        let tree = seeded(&store, 10).await;
        let [first, second] = &tree.links;

        sell(&store, first, 2).await.unwrap();
        let other = sell(&store, second, 1).await.unwrap();
        let latest = sell(&store, first, 3).await.unwrap();

        assert_eq!(other.total_pendapatan_link, 1_000);
        assert_eq!(latest.total_pendapatan_link, 5_000);
        assert_eq!(latest.total_pendapatan_cabang, 3_000);
        assert_eq!(latest.mitra_cabang_id, tree.mitra.id);
    }

    #[tokio::test]
    async fn link_deposit_resets_only_that_links_rows() {
        let Some(store) = store().await else { return };
        let tree = seeded(&store, 10).await;
        let [first, second] = &tree.links;

        sell(&store, first, 2).await.unwrap();
        sell(&store, first, 1).await.unwrap();
        sell(&store, second, 4).await.unwrap();

        let receipt = deposit(&store, Tier::Link, first, 3_000).await;
        assert_eq!(receipt.rows_reset, 2);
        assert_eq!(receipt.deposit.link_id(), Some(first.id));

        for sale in sales_of(&store, first).await {
            assert_eq!(sale.fee_link, 0);
            assert_eq!(sale.total_pendapatan_link, 0);
            assert_eq!(sale.fee_cabang, sale.quantity_sold * 500);
            assert_eq!(sale.komisi_mitra, sale.quantity_sold * 300);
        }
        let untouched = sales_of(&store, second).await;
        assert_eq!(untouched[0].fee_link, 4_000);
        assert_eq!(untouched[0].total_pendapatan_link, 4_000);

        assert_eq!(
            store.unclaimed_balance(Tier::Link, &first.id).await.unwrap(),
            0
        );
        assert_eq!(
            store.unclaimed_balance(Tier::Link, &second.id).await.unwrap(),
            4_000
        );
        assert_eq!(
            store
                .unclaimed_balance(Tier::Cabang, &tree.cabang.id)
                .await
                .unwrap(),
            3_500
        );

        let deposits = store.list_deposits(&first.id).await.unwrap();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].user_id, first.id);
        assert_eq!(deposits[0].kategori, Tier::Link);
    }

    #[tokio::test]
    async fn mitra_deposit_zeroes_only_komisi() {
        let Some(store) = store().await else { return };
        let tree = seeded(&store, 10).await;
        let [first, second] = &tree.links;

        sell(&store, first, 2).await.unwrap();
        sell(&store, second, 1).await.unwrap();

        let receipt = deposit(&store, Tier::MitraCabang, &tree.mitra, 900).await;
        assert_eq!(receipt.rows_reset, 2);
        assert_eq!(receipt.deposit.mitra_id(), Some(tree.mitra.id));

        for link in [first, second] {
            for sale in sales_of(&store, link).await {
                assert_eq!(sale.komisi_mitra, 0);
                assert_eq!(sale.fee_link, sale.quantity_sold * 1_000);
                assert_eq!(sale.fee_cabang, sale.quantity_sold * 500);
                assert_ne!(sale.total_pendapatan_link, 0);
                assert_ne!(sale.total_pendapatan_cabang, 0);
            }
        }
        assert_eq!(
            store
                .unclaimed_balance(Tier::MitraCabang, &tree.mitra.id)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .unclaimed_balance(Tier::Cabang, &tree.cabang.id)
                .await
                .unwrap(),
            1_500
        );
    }

    #[tokio::test]
    async fn deposit_for_wrong_role_writes_nothing() {
        let Some(store) = store().await else { return };
        let tree = seeded(&store, 10).await;
        let link = &tree.links[0];
        sell(&store, link, 1).await.unwrap();

        let err = store
            .record_deposit(NewDeposit {
                kategori: Tier::Cabang,
                user_id: link.id,
                jumlah: 100,
                keterangan: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::InvalidArgument(_))
        ));

        assert!(store.list_deposits(&link.id).await.unwrap().is_empty());
        assert_eq!(sales_of(&store, link).await[0].fee_link, 1_000);
    }
}
