//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, VariantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderError, OrderStatus};

/// A line of a placed order. Frozen at creation: later catalog price or name
/// changes never reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    /// The variant whose price and stock counter applied, if any.
    pub variant_id: Option<VariantId>,
    pub variant_label: Option<String>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

impl OrderLine {
    /// Prices a line. Fails if `unit_price × quantity` does not fit in
    /// [`Money`].
    pub fn new(
        product_id: ProductId,
        variant_id: Option<VariantId>,
        variant_label: Option<String>,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Result<Self, OrderError> {
        let subtotal = unit_price
            .checked_times(quantity)
            .ok_or_else(|| OrderError::AmountOverflow {
                what: format!("subtotal for {product_id}"),
            })?;
        Ok(Self {
            product_id,
            variant_id,
            variant_label,
            product_name: product_name.into(),
            unit_price,
            quantity,
            subtotal,
        })
    }
}

/// Delivery address as entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
}

impl ShippingAddress {
    pub fn validate(&self) -> Result<(), OrderError> {
        let required = [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
        ];
        match required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(OrderError::IncompleteAddress { field }),
            None => Ok(()),
        }
    }
}

/// One entry of an order's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
}

/// Builds a human-facing order number such as `ORD-20240131-9F2C41AB`.
pub fn generate_order_number(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
    format!("ORD-{}-{suffix}", at.format("%Y%m%d"))
}
