pub mod cart;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::commands::auth::{AuthResponse, LoginRequest, RegisterRequest};
use crate::commands::order::{OrderView, PlaceOrderRequest, UpdateStatusRequest};
use crate::commands::product::{CreateProductRequest, ProductFilter, ProductPage};
use crate::commands::stats::{CustomerStats, FarmerStats};
use crate::db::{Product, ProductWithFarmer};
use crate::error::{MarketError, MarketResult};

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Deserialize)]
struct OrderEnvelope {
    order: OrderView,
}

#[derive(Deserialize)]
struct ProductEnvelope {
    product: Product,
}

/// Typed HTTP client for the marketplace API. Holds the bearer token from
/// the last register/login and attaches it to every request.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Maps non-2xx responses back onto the server's error taxonomy.
    async fn expect_json<T: DeserializeOwned>(response: Response) -> MarketResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = response
            .json::<MessageBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_else(|_| status.to_string());

        Err(match status {
            StatusCode::BAD_REQUEST => MarketError::Validation(message),
            StatusCode::UNAUTHORIZED => MarketError::Auth(message),
            StatusCode::FORBIDDEN => MarketError::Forbidden(message),
            StatusCode::NOT_FOUND => MarketError::NotFound(message),
            _ => MarketError::Internal(message),
        })
    }

    pub async fn register(&mut self, request: &RegisterRequest) -> MarketResult<AuthResponse> {
        let response = self
            .http
            .post(self.url("/api/auth/register"))
            .json(request)
            .send()
            .await?;
        let auth: AuthResponse = Self::expect_json(response).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> MarketResult<AuthResponse> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let auth: AuthResponse = Self::expect_json(response).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn products(&self, filter: &ProductFilter) -> MarketResult<ProductPage> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(city) = &filter.city {
            query.push(("city", city.clone()));
        }
        if let Some(category) = filter.category {
            query.push(("category", serde_json::to_value(category)?.as_str().unwrap_or_default().to_string()));
        }
        if let Some(search) = &filter.search {
            query.push(("search", search.clone()));
        }
        if let Some(page) = filter.page {
            query.push(("page", page.to_string()));
        }
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }

        let response = self
            .http
            .get(self.url("/api/products"))
            .query(&query)
            .send()
            .await?;
        Self::expect_json(response).await
    }

    pub async fn product(&self, id: Uuid) -> MarketResult<ProductWithFarmer> {
        let response = self
            .http
            .get(self.url(&format!("/api/products/{}", id)))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    pub async fn create_product(&self, request: &CreateProductRequest) -> MarketResult<Product> {
        let response = self
            .authorize(self.http.post(self.url("/api/products")))
            .json(request)
            .send()
            .await?;
        let envelope: ProductEnvelope = Self::expect_json(response).await?;
        Ok(envelope.product)
    }

    pub async fn my_products(&self) -> MarketResult<Vec<Product>> {
        let response = self
            .authorize(self.http.get(self.url("/api/products/farmer/my-products")))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    /// Checkout: submits the scratch cart for server-side validation and
    /// pricing. The returned order is the source of truth from here on.
    pub async fn place_order(&self, request: &PlaceOrderRequest) -> MarketResult<OrderView> {
        let response = self
            .authorize(self.http.post(self.url("/api/orders")))
            .json(request)
            .send()
            .await?;
        let envelope: OrderEnvelope = Self::expect_json(response).await?;
        Ok(envelope.order)
    }

    pub async fn customer_orders(&self) -> MarketResult<Vec<OrderView>> {
        let response = self
            .authorize(self.http.get(self.url("/api/orders/customer/my-orders")))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    pub async fn farmer_orders(&self) -> MarketResult<Vec<OrderView>> {
        let response = self
            .authorize(self.http.get(self.url("/api/orders/farmer/my-orders")))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    pub async fn order(&self, id: Uuid) -> MarketResult<OrderView> {
        let response = self
            .authorize(self.http.get(self.url(&format!("/api/orders/{}", id))))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    pub async fn update_order_status(
        &self,
        id: Uuid,
        status: &str,
        notes: Option<String>,
    ) -> MarketResult<OrderView> {
        let response = self
            .authorize(self.http.put(self.url(&format!("/api/orders/{}/status", id))))
            .json(&UpdateStatusRequest {
                status: status.to_string(),
                notes,
            })
            .send()
            .await?;
        let envelope: OrderEnvelope = Self::expect_json(response).await?;
        Ok(envelope.order)
    }

    pub async fn complete_payment(&self, id: Uuid) -> MarketResult<OrderView> {
        let response = self
            .authorize(self.http.put(self.url(&format!("/api/orders/{}/payment", id))))
            .send()
            .await?;
        let envelope: OrderEnvelope = Self::expect_json(response).await?;
        Ok(envelope.order)
    }

    pub async fn customer_stats(&self) -> MarketResult<CustomerStats> {
        let response = self
            .authorize(self.http.get(self.url("/api/customers/stats")))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    pub async fn farmer_stats(&self) -> MarketResult<FarmerStats> {
        let response = self
            .authorize(self.http.get(self.url("/api/farmers/stats")))
            .send()
            .await?;
        Self::expect_json(response).await
    }
}
