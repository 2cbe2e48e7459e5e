use crate::domain::order::Order;
use crate::domain::payment::Payment;
use crate::domain::ports::Backend;
use crate::domain::product::{Product, SerialKey, Variant};
use crate::error::Result;
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct FixtureSerial {
    pub product_id: Uuid,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    pub content: String,
}

/// A JSON snapshot of catalog, orders and payments used to seed a store.
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub serials: Vec<FixtureSerial>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Fixture {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Writes every record through the store ports.
    pub async fn seed(self, backend: &Backend) -> Result<()> {
        for product in self.products {
            backend.catalog.store_product(product).await?;
        }
        for variant in self.variants {
            backend.catalog.store_variant(variant).await?;
        }
        for order in self.orders {
            backend.orders.store(order).await?;
        }
        let serials: Vec<SerialKey> = self
            .serials
            .into_iter()
            .map(|s| SerialKey::new(s.product_id, s.variant_id, s.content))
            .collect();
        let added = backend.inventory.add_serials(serials).await?;
        for payment in self.payments {
            backend.payments.store(payment).await?;
        }
        tracing::debug!(serials = added, "Fixture seeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryStore;

    #[tokio::test]
    async fn test_seed_partial_fixture() {
        let product_id = Uuid::new_v4();
        let json = format!(
            r#"{{
                "products": [{{"id": "{id}", "name": "Game Key", "delivery_type": "serials"}}],
                "serials": [{{"product_id": "{id}", "content": "K1"}}, {{"product_id": "{id}", "content": "K2"}}]
            }}"#,
            id = product_id
        );
        let backend = Backend::from_store(InMemoryStore::new());
        Fixture::from_reader(json.as_bytes()).unwrap().seed(&backend).await.unwrap();

        let product = backend.catalog.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.name, "Game Key");
        assert!(!product.unlimited_stock);
        assert_eq!(backend.inventory.available_serials(product_id, None).await.unwrap(), 2);
    }
}
