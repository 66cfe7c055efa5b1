use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commands::order::{DeliveryAddress, OrderLineRequest, PlaceOrderRequest};
use crate::db::{ProductWithFarmer, Unit};
use crate::error::MarketResult;

/// What the cart remembers about a product at the moment it was added.
/// Purely a display snapshot: the server reprices every line from the live
/// product at checkout and its numbers are the only ones that count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub price: f64,
    pub unit: Unit,
    pub image: String,
}

impl From<&ProductWithFarmer> for CartProduct {
    fn from(p: &ProductWithFarmer) -> Self {
        CartProduct {
            id: p.id,
            farmer_id: p.farmer_id,
            name: p.name.clone(),
            price: p.price,
            unit: p.unit,
            image: p.image.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product: CartProduct,
    pub quantity: i32,
}

impl CartLine {
    pub fn subtotal(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

/// Client-held scratch shopping list. Never validated server-side until
/// checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds a product, merging into an existing line for the same product.
    pub fn add(&mut self, product: CartProduct, quantity: i32) {
        if quantity < 1 {
            return;
        }
        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => line.quantity += quantity,
            None => self.lines.push(CartLine { product, quantity }),
        }
    }

    /// Sets a line's quantity; zero or less removes the line.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: i32) {
        if quantity < 1 {
            self.remove(product_id);
        } else if let Some(line) = self.lines.iter_mut().find(|l| l.product.id == product_id) {
            line.quantity = quantity;
        }
    }

    pub fn remove(&mut self, product_id: Uuid) {
        self.lines.retain(|l| l.product.id != product_id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Display total from the snapshotted prices.
    pub fn total(&self) -> f64 {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// The cart's single farmer, when all lines agree on one. Checkout is
    /// going to reject a mixed cart anyway, so the UI checks this up front.
    pub fn single_farmer(&self) -> Option<Uuid> {
        let first = self.lines.first()?.product.farmer_id;
        self.lines
            .iter()
            .all(|l| l.product.farmer_id == first)
            .then_some(first)
    }

    pub fn to_order_request(
        &self,
        delivery_address: DeliveryAddress,
        delivery_instructions: Option<String>,
        notes: Option<String>,
    ) -> PlaceOrderRequest {
        PlaceOrderRequest {
            products: self
                .lines
                .iter()
                .map(|l| OrderLineRequest {
                    product_id: l.product.id,
                    quantity: l.quantity,
                })
                .collect(),
            delivery_address,
            delivery_instructions,
            notes,
        }
    }

    /// JSON round-trip for browser-local persistence.
    pub fn to_json(&self) -> MarketResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> MarketResult<Cart> {
        Ok(serde_json::from_str(raw)?)
    }
}
