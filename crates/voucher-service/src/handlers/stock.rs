//! Stock distribution and bulk import handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use voucher_core::{
    ImportReport, LedgerError, NewDistribution, Notification, Role, StockImportRow, User, UserId,
    VoucherStock,
};
use voucher_store::StoreError;

use crate::auth::{AdminAuth, Caller};
use crate::error::ApiError;
use crate::extract::{AppJson, AppPath};
use crate::state::AppState;

/// Maximum rows accepted in one import.
const MAX_IMPORT_ROWS: usize = 1000;

/// Hand vouchers to a Link.
pub async fn distribute_stock(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    AppJson(body): AppJson<NewDistribution>,
) -> Result<Json<VoucherStock>, ApiError> {
    let stock = state.store.distribute_stock(&body).await?;

    tracing::info!(
        actor = %admin.actor,
        link_id = %stock.link_id,
        voucher_type = %stock.voucher_type,
        added = body.amount,
        amount = stock.amount,
        "Stock distributed"
    );
    state.notify(Notification::stock_received(&stock, body.amount));

    Ok(Json(stock))
}

/// Bulk import request.
#[derive(Debug, Deserialize)]
pub struct ImportStockRequest {
    /// Rows to apply, in order.
    pub rows: Vec<StockImportRow>,
}

/// Apply each row as its own distribution. A bad row is reported and skipped;
/// it never aborts the batch.
pub async fn import_stock(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    AppJson(body): AppJson<ImportStockRequest>,
) -> Result<Json<ImportReport>, ApiError> {
    if body.rows.len() > MAX_IMPORT_ROWS {
        return Err(ApiError::BadRequest(format!(
            "At most {MAX_IMPORT_ROWS} rows per import"
        )));
    }

    let mut report = ImportReport::default();
    for (index, row) in body.rows.iter().enumerate() {
        let row_number = index + 1;
        match import_row(&state, row).await {
            Ok(stock) => {
                report.record_success();
                state.notify(Notification::stock_received(&stock, row.amount));
            }
            Err(err) => {
                tracing::debug!(row = row_number, error = %err, "Import row skipped");
                report.record_error(row_number, row_message(&err));
            }
        }
    }

    tracing::info!(
        actor = %admin.actor,
        success_count = report.success_count,
        error_count = report.error_count,
        "Stock import finished"
    );

    Ok(Json(report))
}

async fn import_row(state: &AppState, row: &StockImportRow) -> Result<VoucherStock, StoreError> {
    row.validate()?;

    let mitra = lookup(state, &row.mitra_username, Role::MitraCabang).await?;
    let cabang = lookup(state, &row.cabang_username, Role::Cabang).await?;
    let link = lookup(state, &row.link_username, Role::Link).await?;

    if cabang.parent_id != Some(mitra.id) {
        return Err(LedgerError::invalid(format!(
            "cabang {} does not belong to mitra {}",
            cabang.username, mitra.username
        ))
        .into());
    }
    if link.parent_id != Some(cabang.id) {
        return Err(LedgerError::invalid(format!(
            "link {} does not belong to cabang {}",
            link.username, cabang.username
        ))
        .into());
    }

    state
        .store
        .distribute_stock(&NewDistribution {
            voucher_type: row.voucher_type.trim().to_string(),
            link_id: link.id,
            amount: row.amount,
        })
        .await
}

async fn lookup(state: &AppState, username: &str, role: Role) -> Result<User, StoreError> {
    let user = state
        .store
        .find_user_by_username(username.trim())
        .await?
        .ok_or_else(|| LedgerError::not_found("user", username.trim()))?;
    if user.role != role {
        return Err(LedgerError::invalid(format!(
            "{} is a {}, not a {role}",
            user.username, user.role
        ))
        .into());
    }
    Ok(user)
}

/// Row error text. Storage faults are not echoed back.
fn row_message(err: &StoreError) -> String {
    err.as_ledger()
        .map_or_else(|| "internal error".to_string(), ToString::to_string)
}

/// Stock held by a Link.
pub async fn list_stock(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    AppPath(link_id): AppPath<UserId>,
) -> Result<Json<Vec<VoucherStock>>, ApiError> {
    caller.require(&link_id)?;
    Ok(Json(state.store.list_stock(&link_id).await?))
}
