//! Cart aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, ProductId, UserId, VariantId};
use serde::{Deserialize, Serialize};
use store::{Product, Version};

use crate::aggregate::Aggregate;

use super::{CartError, CartEvent};

/// One product (or product variant) in a cart.
///
/// Lines never hold stock; availability is checked when the line changes and
/// again when an order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_label: Option<String>,
    pub quantity: u32,
    /// Price per unit when the line was last changed.
    pub unit_price: Money,
    pub subtotal: Money,
}

impl CartLine {
    pub fn matches(&self, product_id: &ProductId, variant_id: Option<&VariantId>) -> bool {
        &self.product_id == product_id && self.variant_id.as_ref() == variant_id
    }
}

/// A user's shopping cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    id: Option<AggregateId>,

    user_id: Option<UserId>,

    lines: Vec<CartLine>,

    /// Always the sum of line subtotals, recomputed on every change.
    total_amount: Money,

    updated_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    version: Version,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn owner(&self) -> Option<UserId> {
        self.user_id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CartEvent::CartOpened(data) => {
                self.id = Some(data.cart_id);
                self.user_id = Some(data.user_id);
                self.updated_at = Some(data.opened_at);
            }
            CartEvent::LineAdded(line) => self.lines.push(line),
            CartEvent::LineQuantityChanged(data) => {
                if let Some(line) = self
                    .lines
                    .iter_mut()
                    .find(|l| l.matches(&data.product_id, data.variant_id.as_ref()))
                {
                    line.quantity = data.quantity;
                    line.unit_price = data.unit_price;
                    line.subtotal = data.unit_price.times(data.quantity);
                }
            }
            CartEvent::LineRemoved(data) => self
                .lines
                .retain(|l| !l.matches(&data.product_id, data.variant_id.as_ref())),
            CartEvent::CartCleared { cleared_at } => {
                self.lines.clear();
                self.updated_at = Some(cleared_at);
            }
        }
        self.total_amount = self.lines.iter().map(|l| l.subtotal).sum();
    }
}

// Query methods
impl Cart {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &ProductId, variant_id: Option<&VariantId>) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.matches(product_id, variant_id))
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |count, line| count.saturating_add(line.quantity))
    }
}

// Command methods (return events)
impl Cart {
    /// Adds `quantity` units of a product, merging into an existing line.
    ///
    /// The variant only applies if the product has it and it is active;
    /// otherwise the base product is added. The merged quantity must fit the
    /// product's current availability.
    pub fn add_item(
        &self,
        cart_id: AggregateId,
        user_id: UserId,
        product: &Product,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let resolved = product.resolve(variant_id);
        let existing = self.line(&product.id, resolved.variant_id.as_ref());
        let requested = existing
            .map_or(0, |line| line.quantity)
            .saturating_add(quantity);

        if !resolved.availability.allows(requested) {
            return Err(CartError::InsufficientStock {
                product_id: product.id.clone(),
                variant_id: resolved.variant_id,
                requested,
                available: resolved.availability.units(),
            });
        }

        let mut events = Vec::with_capacity(2);
        if self.id.is_none() {
            events.push(CartEvent::cart_opened(cart_id, user_id));
        }

        events.push(match existing {
            Some(line) => CartEvent::line_quantity_changed(line, requested, resolved.unit_price),
            None => CartEvent::LineAdded(CartLine {
                product_id: product.id.clone(),
                variant_id: resolved.variant_id,
                product_name: product.name.clone(),
                variant_label: resolved.variant_label,
                quantity: requested,
                unit_price: resolved.unit_price,
                subtotal: resolved.unit_price.times(requested),
            }),
        });

        Ok(events)
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn set_quantity(
        &self,
        product: &Product,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        let line = self.existing_line(&product.id, variant_id)?;

        if quantity == 0 {
            return Ok(vec![CartEvent::line_removed(line)]);
        }

        let resolved = product.resolve(line.variant_id.as_ref());
        if !resolved.availability.allows(quantity) {
            return Err(CartError::InsufficientStock {
                product_id: product.id.clone(),
                variant_id: line.variant_id.clone(),
                requested: quantity,
                available: resolved.availability.units(),
            });
        }

        Ok(vec![CartEvent::line_quantity_changed(
            line,
            quantity,
            resolved.unit_price,
        )])
    }

    pub fn remove_item(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<Vec<CartEvent>, CartError> {
        let line = self.existing_line(product_id, variant_id)?;
        Ok(vec![CartEvent::line_removed(line)])
    }

    /// Empties the cart. A cart with no lines is left untouched.
    pub fn clear(&self) -> Result<Vec<CartEvent>, CartError> {
        if self.lines.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::cart_cleared()])
    }

    fn existing_line(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<&CartLine, CartError> {
        self.line(product_id, variant_id)
            .ok_or_else(|| CartError::ItemNotFound {
                product_id: product_id.clone(),
                variant_id: variant_id.cloned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::Variant;

    fn apples() -> Product {
        Product {
            id: ProductId::new("APPLE"),
            name: "Apples".to_string(),
            price: Money::from_minor(2000),
            stock: 5,
            variants: vec![
                Variant {
                    id: VariantId::new("1kg"),
                    label: "1 kg".to_string(),
                    price: Money::from_minor(15000),
                    stock: Some(2),
                    active: true,
                },
                Variant {
                    id: VariantId::new("crate"),
                    label: "Crate".to_string(),
                    price: Money::from_minor(120000),
                    stock: None,
                    active: true,
                },
                Variant {
                    id: VariantId::new("old"),
                    label: "Old pack".to_string(),
                    price: Money::from_minor(1),
                    stock: Some(100),
                    active: false,
                },
            ],
        }
    }

    fn cart_with(
        product: &Product,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Cart {
        let mut cart = Cart::default();
        let events = cart
            .add_item(AggregateId::new(), UserId::new(), product, variant_id, quantity)
            .unwrap();
        cart.apply_events(events);
        cart
    }

    #[test]
    fn first_add_opens_the_cart() {
        let cart_id = AggregateId::new();
        let user_id = UserId::new();

        let events = Cart::default()
            .add_item(cart_id, user_id, &apples(), None, 2)
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CartEvent::CartOpened(_)));

        let mut cart = Cart::default();
        cart.apply_events(events);
        assert_eq!(cart.id(), Some(cart_id));
        assert_eq!(cart.user_id(), Some(user_id));
        assert_eq!(cart.total_amount(), Money::from_minor(4000));
    }

    #[test]
    fn add_merges_and_checks_combined_quantity() {
        let product = apples();
        let cart = cart_with(&product, None, 3);

        let err = cart
            .add_item(AggregateId::new(), UserId::new(), &product, None, 3)
            .unwrap_err();
        assert!(matches!(
            err,
            CartError::InsufficientStock {
                requested: 6,
                available: 5,
                ..
            }
        ));

        let events = cart
            .add_item(AggregateId::new(), UserId::new(), &product, None, 2)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CartEvent::LineQuantityChanged(_)));
    }

    #[test]
    fn zero_quantity_add_is_rejected() {
        let err = Cart::default()
            .add_item(AggregateId::new(), UserId::new(), &apples(), None, 0)
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity { quantity: 0 }));
    }

    #[test]
    fn variant_lines_use_variant_price_and_stock() {
        let product = apples();
        let kilo = VariantId::new("1kg");
        let cart = cart_with(&product, Some(&kilo), 2);

        let line = cart.line(&product.id, Some(&kilo)).unwrap();
        assert_eq!(line.unit_price, Money::from_minor(15000));
        assert_eq!(line.variant_label.as_deref(), Some("1 kg"));

        let err = cart
            .add_item(AggregateId::new(), UserId::new(), &product, Some(&kilo), 1)
            .unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock { available: 2, .. }));
    }

    #[test]
    fn untracked_variant_is_unconstrained() {
        let product = apples();
        let crate_variant = VariantId::new("crate");
        let cart = cart_with(&product, Some(&crate_variant), 500);
        assert_eq!(cart.item_count(), 500);
    }

    #[test]
    fn inactive_variant_falls_back_to_base_product() {
        let product = apples();
        let cart = cart_with(&product, Some(&VariantId::new("old")), 1);

        let line = &cart.lines()[0];
        assert_eq!(line.variant_id, None);
        assert_eq!(line.unit_price, Money::from_minor(2000));
    }

    #[test]
    fn set_quantity_zero_removes_line_and_total() {
        let product = apples();
        let mut cart = cart_with(&product, None, 2);
        let kilo = VariantId::new("1kg");
        let events = cart
            .add_item(AggregateId::new(), UserId::new(), &product, Some(&kilo), 1)
            .unwrap();
        cart.apply_events(events);
        assert_eq!(cart.total_amount(), Money::from_minor(4000 + 15000));

        let events = cart.set_quantity(&product, None, 0).unwrap();
        cart.apply_events(events);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total_amount(), Money::from_minor(15000));
    }

    #[test]
    fn set_quantity_revalidates_against_stock() {
        let product = apples();
        let cart = cart_with(&product, None, 1);

        let err = cart.set_quantity(&product, None, 6).unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock { requested: 6, .. }));

        let mut cart = cart;
        let events = cart.set_quantity(&product, None, 5).unwrap();
        cart.apply_events(events);
        assert_eq!(cart.total_amount(), Money::from_minor(10000));
    }

    #[test]
    fn missing_lines_are_reported() {
        let product = apples();
        let cart = cart_with(&product, None, 1);

        let err = cart
            .remove_item(&product.id, Some(&VariantId::new("1kg")))
            .unwrap_err();
        assert!(matches!(err, CartError::ItemNotFound { .. }));

        let err = cart
            .set_quantity(&product, Some(&VariantId::new("1kg")), 1)
            .unwrap_err();
        assert!(matches!(err, CartError::ItemNotFound { .. }));
    }

    #[test]
    fn clear_empties_and_is_noop_when_empty() {
        let mut cart = cart_with(&apples(), None, 2);
        let events = cart.clear().unwrap();
        cart.apply_events(events);

        assert!(cart.is_empty());
        assert_eq!(cart.total_amount(), Money::ZERO);
        assert!(cart.clear().unwrap().is_empty());
        assert!(Cart::default().clear().unwrap().is_empty());
    }
}
