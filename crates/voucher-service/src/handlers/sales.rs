//! Sale handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use voucher_core::{NewSale, Role, SaleFilter, VoucherSale};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

/// Record a sale made by a Link. A member may only record their own sales.
pub async fn record_sale(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    AppJson(body): AppJson<NewSale>,
) -> Result<(StatusCode, Json<VoucherSale>), ApiError> {
    caller.require(&body.link_id)?;

    let sale = state.store.record_sale(&body).await?;

    tracing::info!(
        sale_id = %sale.id,
        link_id = %sale.link_id,
        cabang_id = %sale.cabang_id,
        mitra_cabang_id = %sale.mitra_cabang_id,
        voucher_type = %sale.voucher_type,
        quantity = sale.quantity_sold,
        fee_link = sale.fee_link,
        fee_cabang = sale.fee_cabang,
        komisi_mitra = sale.komisi_mitra,
        pendapatan_owner = sale.pendapatan_owner,
        "Sale recorded"
    );

    Ok((StatusCode::CREATED, Json(sale)))
}

/// List sales response.
#[derive(Debug, Serialize)]
pub struct ListSalesResponse {
    /// Sales (newest first).
    pub sales: Vec<VoucherSale>,
    /// Page size applied.
    pub limit: usize,
    /// Rows skipped.
    pub offset: usize,
}

/// List sales. Members only see rows they take a share of.
pub async fn list_sales(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    AppQuery(mut filter): AppQuery<SaleFilter>,
) -> Result<Json<ListSalesResponse>, ApiError> {
    if let Caller::Member(user) = &caller {
        let own = Some(user.id);
        match user.role {
            Role::Link => filter.link_id = own,
            Role::Cabang => filter.cabang_id = own,
            Role::MitraCabang => filter.mitra_cabang_id = own,
            Role::Owner | Role::Admin => {}
        }
    }

    let sales = state.store.list_sales(&filter).await?;

    Ok(Json(ListSalesResponse {
        sales,
        limit: filter.page_size(),
        offset: filter.offset,
    }))
}
