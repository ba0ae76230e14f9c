//! REST client for the storefront backend.
//!
//! Wire DTOs mirror the backend's JSON (`productId`, `_id`, `totalPrice`)
//! and are converted to the records in `storefront_core::gateway` at the
//! edge; nothing outside this module sees the wire shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use storefront_core::{
    CartGateway, GatewayError, GatewayResult, NewOrder, OrderLineRecord, OrderRecord, RemoteCart,
    RemoteCartLine,
};
use storefront_shared::{Masked, Money, OrderId, ProductRef, UserId};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpCartGateway {
    http: Client,
    base_url: String,
    api_token: Option<Masked<String>>,
}

impl HttpCartGateway {
    pub fn new(base_url: impl Into<String>, api_token: Option<Masked<String>>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%method, url = %url, "Storefront request");
        let builder = self.http.request(method, url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Send and turn non-2xx answers into `GatewayError`
    async fn send(&self, builder: RequestBuilder, what: &str) -> GatewayResult<Response> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, what, body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> GatewayResult<T> {
        let response = self.send(builder, what).await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(format!("{}: {}", what, e)))
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_decode() {
        GatewayError::MalformedResponse(e.to_string())
    } else {
        GatewayError::NetworkUnavailable(e.to_string())
    }
}

pub(crate) fn status_error(status: StatusCode, what: &str, body: String) -> GatewayError {
    if status == StatusCode::NOT_FOUND {
        return GatewayError::NotFound(what.to_string());
    }
    warn!(status = status.as_u16(), what, "Storefront request rejected");
    GatewayError::Rejected {
        status: status.as_u16(),
        message: if body.is_empty() { what.to_string() } else { body },
    }
}

#[derive(Debug, Deserialize)]
struct CartBody {
    #[serde(default)]
    products: Vec<CartLineBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLineBody {
    product_id: PopulatedProduct,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct PopulatedProduct {
    #[serde(rename = "_id")]
    id: String,
    price: i64,
    #[serde(default)]
    stock: u32,
}

impl From<CartLineBody> for RemoteCartLine {
    fn from(body: CartLineBody) -> Self {
        Self {
            product: ProductRef::new(body.product_id.id),
            quantity: body.quantity,
            unit_price: Money::new(body.product_id.price),
            stock_available: body.product_id.stock,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddToCartBody<'a> {
    product_id: &'a str,
    quantity: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct QuantityBody {
    quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewOrderBody<'a> {
    user_id: &'a str,
    products: Vec<OrderLineBody>,
    total_price: i64,
    payment_method: &'static str,
}

impl<'a> From<&'a NewOrder> for NewOrderBody<'a> {
    fn from(order: &'a NewOrder) -> Self {
        Self {
            user_id: order.user.as_str(),
            products: order.lines.iter().map(OrderLineBody::from).collect(),
            total_price: order.total_price.minor_units(),
            payment_method: order.payment_method.as_wire_str(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderLineBody {
    product_id: ProductField,
    quantity: u32,
    price: i64,
}

impl From<&OrderLineRecord> for OrderLineBody {
    fn from(line: &OrderLineRecord) -> Self {
        Self {
            product_id: ProductField::Id(line.product.as_str().to_string()),
            quantity: line.quantity,
            price: line.unit_price.minor_units(),
        }
    }
}

impl From<OrderLineBody> for OrderLineRecord {
    fn from(body: OrderLineBody) -> Self {
        Self {
            product: ProductRef::new(body.product_id.into_id()),
            quantity: body.quantity,
            unit_price: Money::new(body.price),
        }
    }
}

/// Order lines come back either with a bare product id or populated
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ProductField {
    Id(String),
    Populated {
        #[serde(rename = "_id")]
        id: String,
    },
}

impl ProductField {
    fn into_id(self) -> String {
        match self {
            ProductField::Id(id) | ProductField::Populated { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedBody {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderBody {
    #[serde(rename = "_id")]
    id: String,
    status: String,
    #[serde(default)]
    products: Vec<OrderLineBody>,
    total_price: i64,
    payment_method: Option<String>,
    date: DateTime<Utc>,
}

impl From<OrderBody> for OrderRecord {
    fn from(body: OrderBody) -> Self {
        Self {
            id: OrderId::new(body.id),
            status: body.status,
            lines: body.products.into_iter().map(OrderLineRecord::from).collect(),
            total_price: Money::new(body.total_price),
            payment_method: body.payment_method,
            created_at: body.date,
        }
    }
}

#[async_trait]
impl CartGateway for HttpCartGateway {
    async fn fetch_cart(&self, user: &UserId) -> GatewayResult<RemoteCart> {
        let body: CartBody = self
            .send_json(self.request(Method::GET, &format!("cart/{}", user)), "cart")
            .await?;
        Ok(RemoteCart {
            lines: body.products.into_iter().map(RemoteCartLine::from).collect(),
        })
    }

    async fn add_to_cart(&self, user: &UserId, product: &ProductRef, quantity: u32) -> GatewayResult<()> {
        let body = AddToCartBody {
            product_id: product.as_str(),
            quantity,
        };
        self.send(self.request(Method::POST, &format!("cart/{}", user)).json(&body), "cart")
            .await?;
        Ok(())
    }

    async fn update_quantity(
        &self,
        user: &UserId,
        product: &ProductRef,
        quantity: u32,
    ) -> GatewayResult<u32> {
        let request = self
            .request(Method::PUT, &format!("cart/{}/{}", user, product))
            .json(&QuantityBody { quantity });
        let body: QuantityBody = self.send_json(request, "cart line").await?;
        Ok(body.quantity)
    }

    async fn remove_line(&self, user: &UserId, product: &ProductRef) -> GatewayResult<()> {
        self.send(self.request(Method::DELETE, &format!("cart/{}/{}", user, product)), "cart line")
            .await?;
        Ok(())
    }

    async fn create_order(&self, order: &NewOrder) -> GatewayResult<OrderId> {
        let request = self.request(Method::POST, "orders").json(&NewOrderBody::from(order));
        let body: CreatedBody = self.send_json(request, "order").await?;
        Ok(OrderId::new(body.id))
    }

    async fn cancel_order(&self, order_id: &OrderId) -> GatewayResult<()> {
        self.send(self.request(Method::DELETE, &format!("orders/{}", order_id)), "order")
            .await?;
        Ok(())
    }

    async fn fetch_order(&self, order_id: &OrderId) -> GatewayResult<OrderRecord> {
        let body: OrderBody = self
            .send_json(self.request(Method::GET, &format!("orders/{}", order_id)), "order")
            .await?;
        Ok(body.into())
    }

    async fn list_orders(&self, user: &UserId) -> GatewayResult<Vec<OrderRecord>> {
        let bodies: Vec<OrderBody> = self
            .send_json(self.request(Method::GET, &format!("orders/user/{}", user)), "orders")
            .await?;
        Ok(bodies.into_iter().map(OrderRecord::from).collect())
    }
}
