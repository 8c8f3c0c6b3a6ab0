//! All-or-nothing stock holds for order lines.

use domain::{DomainError, OrderLine};
use store::CatalogStore;

/// Reserves and releases stock for whole orders.
///
/// Each line is one conditional decrement against the counter recorded on
/// the line (variant or base product). Lines are reserved in order; if a
/// line fails, the lines before it are released in reverse order before the
/// error is returned, so a failed reservation leaves stock as it was.
pub struct StockReservation<C: CatalogStore> {
    catalog: C,
}

impl<C: CatalogStore> StockReservation<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reserve(&self, lines: &[OrderLine]) -> Result<(), DomainError> {
        for (index, line) in lines.iter().enumerate() {
            let result = self
                .catalog
                .decrement_stock(&line.product_id, line.variant_id.as_ref(), line.quantity)
                .await;

            if let Err(e) = result {
                metrics::counter!("stock_reservation_failures_total").increment(1);
                tracing::warn!(
                    product_id = %line.product_id,
                    error = %e,
                    reserved = index,
                    "stock reservation failed, releasing earlier lines"
                );
                self.release(&lines[..index]).await;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Returns every line's quantity to stock, last line first.
    ///
    /// Release is best effort: a line that cannot be returned is logged and
    /// skipped. Returns the lines that were released.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn release(&self, lines: &[OrderLine]) -> Vec<OrderLine> {
        let mut released = Vec::with_capacity(lines.len());
        for line in lines.iter().rev() {
            match self
                .catalog
                .increment_stock(&line.product_id, line.variant_id.as_ref(), line.quantity)
                .await
            {
                Ok(_) => released.push(line.clone()),
                Err(e) => tracing::error!(
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    error = %e,
                    "failed to release stock"
                ),
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, ProductId, VariantId};
    use store::{InMemoryCatalogStore, Product, Variant};

    fn catalog_products() -> Vec<Product> {
        vec![
            Product {
                id: ProductId::new("RICE"),
                name: "Rice".to_string(),
                price: Money::from_minor(9000),
                stock: 10,
                variants: vec![Variant {
                    id: VariantId::new("5kg"),
                    label: "5 kg".to_string(),
                    price: Money::from_minor(42000),
                    stock: Some(2),
                    active: true,
                }],
            },
            Product {
                id: ProductId::new("DAL"),
                name: "Dal".to_string(),
                price: Money::from_minor(12000),
                stock: 1,
                variants: vec![],
            },
        ]
    }

    fn line(product: &str, variant: Option<&str>, quantity: u32) -> OrderLine {
        OrderLine::new(
            ProductId::new(product),
            variant.map(VariantId::new),
            None,
            product,
            Money::from_minor(100),
            quantity,
        ).unwrap()
    }

    #[tokio::test]
    async fn reserve_decrements_each_counter() {
        let catalog = InMemoryCatalogStore::with_products(catalog_products()).await;
        let reservation = StockReservation::new(catalog.clone());

        reservation
            .reserve(&[line("RICE", None, 4), line("RICE", Some("5kg"), 2)])
            .await
            .unwrap();

        let rice = ProductId::new("RICE");
        assert_eq!(catalog.stock_of(&rice, None).await, Some(6));
        assert_eq!(
            catalog.stock_of(&rice, Some(&VariantId::new("5kg"))).await,
            Some(0)
        );
    }

    #[tokio::test]
    async fn failed_line_releases_earlier_lines() {
        let catalog = InMemoryCatalogStore::with_products(catalog_products()).await;
        let reservation = StockReservation::new(catalog.clone());

        let err = reservation
            .reserve(&[
                line("RICE", None, 3),
                line("RICE", Some("5kg"), 1),
                line("DAL", None, 2),
            ])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        let rice = ProductId::new("RICE");
        assert_eq!(catalog.stock_of(&rice, None).await, Some(10));
        assert_eq!(
            catalog.stock_of(&rice, Some(&VariantId::new("5kg"))).await,
            Some(2)
        );
        assert_eq!(catalog.stock_of(&ProductId::new("DAL"), None).await, Some(1));
    }

    #[tokio::test]
    async fn reserve_release_reserve_consumes_the_same_quantity() {
        let catalog = InMemoryCatalogStore::with_products(catalog_products()).await;
        let reservation = StockReservation::new(catalog.clone());
        let lines = [line("RICE", None, 7)];

        reservation.reserve(&lines).await.unwrap();
        assert_eq!(reservation.release(&lines).await.len(), 1);
        assert_eq!(
            catalog.stock_of(&ProductId::new("RICE"), None).await,
            Some(10)
        );
        reservation.reserve(&lines).await.unwrap();
        assert_eq!(
            catalog.stock_of(&ProductId::new("RICE"), None).await,
            Some(3)
        );
    }

    #[tokio::test]
    async fn release_skips_lines_it_cannot_return() {
        let catalog = InMemoryCatalogStore::with_products(catalog_products()).await;
        let reservation = StockReservation::new(catalog.clone());

        let released = reservation
            .release(&[line("GONE", None, 1), line("DAL", None, 1)])
            .await;

        assert_eq!(released.len(), 1);
        assert_eq!(released[0].product_id, ProductId::new("DAL"));
        assert_eq!(catalog.stock_of(&ProductId::new("DAL"), None).await, Some(2));
    }
}
