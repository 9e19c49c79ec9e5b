//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{coupons, deposits, health, prices, sales, stock, users};
use crate::state::AppState;

/// Maximum concurrent requests for sale recording.
/// Points of sale report continuously, so they get their own budget.
const SALES_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Directory
/// - `POST /v1/users` - Register a user (admin)
/// - `GET /v1/users/me` - Current user
/// - `PUT /v1/prices` - Set a fee schedule (admin)
///
/// ## Stock
/// - `POST /v1/stock/distribute` - Hand vouchers to a Link (admin)
/// - `POST /v1/stock/import` - Bulk import (admin)
/// - `GET /v1/stock/:link_id` - Stock of a Link
///
/// ## Sales and payouts
/// - `POST /v1/sales` - Record a sale
/// - `GET /v1/sales` - List sales
/// - `GET /v1/balance/:tier/:user_id` - Unclaimed revenue
/// - `POST /v1/deposits` - Record a deposit (admin)
/// - `GET /v1/deposits/:user_id` - Deposits of a user
///
/// ## Coupons
/// - `POST /v1/coupons` - Create a coupon (admin)
/// - `GET /v1/coupons` - List coupons
/// - `GET /v1/coupons/:id/winners` - Current ranking
/// - `POST /v1/coupons/:id/claims` - Claim a prize
/// - `GET /v1/claims` - List claims (admin)
/// - `POST /v1/claims/:id/resolve` - Approve or reject (admin)
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let sales_routes = Router::new()
        .route("/", post(sales::record_sale).get(sales::list_sales))
        .layer(ConcurrencyLimitLayer::new(SALES_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Directory
        .route("/users", post(users::register_user))
        .route("/users/me", get(users::me))
        .route("/prices", put(prices::set_fee_schedule))
        // Stock
        .route("/stock/distribute", post(stock::distribute_stock))
        .route("/stock/import", post(stock::import_stock))
        .route("/stock/:link_id", get(stock::list_stock))
        // Payouts
        .route("/balance/:tier/:user_id", get(deposits::unclaimed_balance))
        .route("/deposits", post(deposits::record_deposit))
        .route("/deposits/:user_id", get(deposits::list_deposits))
        // Coupons
        .route(
            "/coupons",
            post(coupons::create_coupon).get(coupons::list_coupons),
        )
        .route("/coupons/:id/winners", get(coupons::coupon_winners))
        .route("/coupons/:id/claims", post(coupons::claim_coupon))
        .route("/claims", get(coupons::list_claims))
        .route("/claims/:id/resolve", post(coupons::resolve_claim))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        // Sales (with their own concurrency limit)
        .nest("/sales", sales_routes);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
