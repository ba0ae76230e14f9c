use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use storefront_core::{GatewayError, GatewayResult, PaymentLink, PaymentLinkProvider, PaymentLinkRequest, RedirectOpener};
use tracing::info;

use crate::http_gateway::{status_error, transport_error};

/// E-wallet (MoMo) payment link endpoint
#[derive(Debug, Clone)]
pub struct HttpWalletGateway {
    http: Client,
    gateway_url: String,
}

impl HttpWalletGateway {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            gateway_url: gateway_url.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayRequestBody<'a> {
    amount: i64,
    order_info: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayResponseBody {
    pay_url: Option<String>,
}

#[async_trait]
impl PaymentLinkProvider for HttpWalletGateway {
    async fn request_payment_link(&self, request: &PaymentLinkRequest) -> GatewayResult<PaymentLink> {
        let body = PayRequestBody {
            amount: request.amount.minor_units(),
            order_info: &request.order_info,
        };
        let response = self
            .http
            .post(&self.gateway_url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, "payment link", text));
        }

        let parsed: PayResponseBody = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(format!("payment link: {}", e)))?;
        info!(order_id = %request.order_id, has_url = parsed.pay_url.is_some(), "Payment link received");
        Ok(PaymentLink {
            redirect_url: parsed.pay_url,
        })
    }
}

/// Terminal stand-in for the platform URL opener: prints the link
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleRedirectOpener;

#[async_trait]
impl RedirectOpener for ConsoleRedirectOpener {
    async fn open(&self, url: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(url, "Opening payment redirect");
        println!("Open this link to pay: {}", url);
        Ok(())
    }
}
