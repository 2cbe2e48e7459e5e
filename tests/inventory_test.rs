use std::collections::HashSet;
use storefront_pipeline::domain::ports::Backend;
use storefront_pipeline::domain::product::{ClaimRequest, SelectionMethod, SerialKey};
use storefront_pipeline::error::PipelineError;
use storefront_pipeline::infrastructure::in_memory::InMemoryStore;
use uuid::Uuid;

#[tokio::test]
async fn test_concurrent_claims_never_share_a_serial() {
    let backend = Backend::from_store(InMemoryStore::new());
    let product_id = Uuid::new_v4();
    let serials = (0..20)
        .map(|i| SerialKey::new(product_id, None, format!("KEY-{:02}", i)))
        .collect();
    backend.inventory.add_serials(serials).await.unwrap();

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let inventory = backend.inventory.clone();
            tokio::spawn(async move {
                inventory
                    .claim_stock(ClaimRequest {
                        product_id,
                        variant_id: None,
                        quantity: 1,
                        order_id: Uuid::new_v4(),
                        selection: SelectionMethod::Random,
                    })
                    .await
            })
        })
        .collect();

    let mut claimed = HashSet::new();
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(keys) => {
                for key in keys {
                    assert!(claimed.insert(key.content), "serial handed out twice");
                }
            }
            Err(PipelineError::OutOfStock { .. }) => out_of_stock += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(claimed.len(), 20);
    assert_eq!(out_of_stock, 5);
    assert_eq!(backend.inventory.available_serials(product_id, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_claim_is_all_or_nothing() {
    let backend = Backend::from_store(InMemoryStore::new());
    let product_id = Uuid::new_v4();
    let serials = vec![
        SerialKey::new(product_id, None, "A"),
        SerialKey::new(product_id, None, "B"),
    ];
    backend.inventory.add_serials(serials).await.unwrap();

    let result = backend
        .inventory
        .claim_stock(ClaimRequest {
            product_id,
            variant_id: None,
            quantity: 3,
            order_id: Uuid::new_v4(),
            selection: SelectionMethod::First,
        })
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::OutOfStock {
            requested: 3,
            available: 2,
            ..
        })
    ));
    assert_eq!(backend.inventory.available_serials(product_id, None).await.unwrap(), 2);
}
