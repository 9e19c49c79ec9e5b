//! Voucher ledger HTTP client implementation.

use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use voucher_core::{
    ImportReport, KlaimId, KlaimKupon, KlaimStatus, KuponId, NewDeposit, NewDistribution, NewSale,
    SaleFilter, StockImportRow, Tier, UserId, VoucherSale, VoucherStock,
};

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, DepositReceipt, ImportStockRequest, ResolveClaimRequest,
    SalesPage,
};

/// How the client authenticates.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Back-office admin key, sent as `X-Admin-Key`.
    AdminKey(String),
    /// A member's JWT, sent as `Authorization: Bearer`.
    Bearer(String),
}

/// Voucher ledger API client.
#[derive(Debug, Clone)]
pub struct VoucherClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl VoucherClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the service (e.g., `"http://voucher-ledger:8080"`)
    /// * `credentials` - Admin key or member token
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Result<Self, ClientError> {
        Self::with_options(base_url, credentials, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        credentials: Credentials,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::AdminKey(key) => request.header("x-admin-key", key),
            Credentials::Bearer(token) => request.bearer_auth(token),
        }
    }

    /// Record a sale.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InsufficientStock`] when the Link holds too few
    /// vouchers, or another error if the request fails.
    pub async fn record_sale(&self, sale: &NewSale) -> Result<VoucherSale, ClientError> {
        let url = format!("{}/v1/sales", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(sale)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List sales visible to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_sales(&self, filter: &SaleFilter) -> Result<SalesPage, ClientError> {
        let url = format!("{}/v1/sales", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .query(filter)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Record a deposit and reset the recipient's unclaimed revenue.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn record_deposit(&self, deposit: &NewDeposit) -> Result<DepositReceipt, ClientError> {
        let url = format!("{}/v1/deposits", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(deposit)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Hand vouchers to a Link.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn distribute_stock(
        &self,
        distribution: &NewDistribution,
    ) -> Result<VoucherStock, ClientError> {
        let url = format!("{}/v1/stock/distribute", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(distribution)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Import stock rows in bulk. Bad rows are reported, not fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects the batch.
    pub async fn import_stock(&self, rows: &[StockImportRow]) -> Result<ImportReport, ClientError> {
        let url = format!("{}/v1/stock/import", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(&ImportStockRequest { rows })
            .send()
            .await?;

        let report: ImportReport = self.handle_response(response).await?;
        tracing::debug!(
            success_count = report.success_count,
            error_count = report.error_count,
            "Stock import finished"
        );
        Ok(report)
    }

    /// Unclaimed revenue of `user_id` in `tier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn unclaimed_balance(
        &self,
        tier: Tier,
        user_id: &UserId,
    ) -> Result<BalanceResponse, ClientError> {
        let url = format!(
            "{}/v1/balance/{}/{user_id}",
            self.base_url,
            tier.as_str()
        );
        let response = self.authorize(self.client.get(&url)).send().await?;

        self.handle_response(response).await
    }

    /// Claim a coupon prize for the authenticated member.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::FailedPrecondition`] when the member is not an
    /// unclaimed winner, or another error if the request fails.
    pub async fn claim_coupon(&self, kupon_id: &KuponId) -> Result<KlaimKupon, ClientError> {
        let url = format!("{}/v1/coupons/{kupon_id}/claims", self.base_url);
        let response = self.authorize(self.client.post(&url)).send().await?;

        self.handle_response(response).await
    }

    /// Approve or reject a pending claim.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::FailedPrecondition`] when the claim was already
    /// resolved, or another error if the request fails.
    pub async fn resolve_claim(
        &self,
        klaim_id: &KlaimId,
        status: KlaimStatus,
        catatan: Option<&str>,
    ) -> Result<KlaimKupon, ClientError> {
        let url = format!("{}/v1/claims/{klaim_id}/resolve", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(&ResolveClaimRequest { status, catatan })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let detail = |key: &str| {
                    api_error
                        .error
                        .details
                        .as_ref()
                        .and_then(|d| d.get(key))
                        .and_then(serde_json::Value::as_i64)
                        .unwrap_or(0)
                };

                match api_error.error.code.as_str() {
                    "insufficient_stock" => Err(ClientError::InsufficientStock {
                        available: detail("available"),
                        requested: detail("requested"),
                    }),
                    "not_found" => Err(ClientError::NotFound(api_error.error.message)),
                    "failed_precondition" => {
                        Err(ClientError::FailedPrecondition(api_error.error.message))
                    }
                    "bad_request" => Err(ClientError::InvalidRequest(api_error.error.message)),
                    "unauthorized" => Err(ClientError::Unauthorized),
                    "forbidden" => Err(ClientError::Forbidden),
                    code => Err(ClientError::Api {
                        code: code.to_string(),
                        message: api_error.error.message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client =
            VoucherClient::new("http://localhost:8080/", Credentials::AdminKey("k".into()))
                .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_options() {
        let options = ClientOptions { timeout_seconds: 5 };
        let client = VoucherClient::with_options(
            "http://localhost:8080",
            Credentials::Bearer("t".into()),
            options,
        )
        .unwrap();
        assert!(matches!(client.credentials, Credentials::Bearer(_)));
    }
}
