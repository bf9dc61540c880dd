//! Catalog scenarios: reference resolution, guarded delete, and the
//! separately named purge path.

mod common;

use common::TestApp;

use aurum_api::{
    errors::ServiceError,
    services::catalog::{
        AddProductImageRequest, CreateCollectionRequest, CreateProductRequest, ProductRef,
        UpdateCollectionRequest,
    },
    services::orders::{CreateOrderRequest, OrderItemRequest},
};

#[tokio::test]
async fn products_resolve_by_id_and_slug_in_one_batch() {
    let app = TestApp::new().await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;
    app.seed_product("Pearl Necklace", "pearl-necklace", 120_000, 5).await;

    let resolved = app
        .services
        .catalog
        .resolve_many(&[
            ProductRef::Id(ring.id),
            ProductRef::Slug("pearl-necklace".to_string()),
        ])
        .await
        .unwrap();

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].id, ring.id);
    assert_eq!(resolved[1].slug, "pearl-necklace");
}

#[tokio::test]
async fn duplicate_slugs_are_rejected() {
    let app = TestApp::new().await;
    app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    let err = app
        .services
        .catalog
        .create_product(CreateProductRequest {
            name: "Another Ring".to_string(),
            slug: "aurora-ring".to_string(),
            description: None,
            price: 100_000,
            compare_at_price: None,
            inventory: 1,
            collection_id: None,
            tags: None,
            images: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn collection_filter_lists_only_its_products() {
    let app = TestApp::new().await;
    let rings = app
        .services
        .catalog
        .create_collection(CreateCollectionRequest {
            name: "Rings".to_string(),
            slug: "rings".to_string(),
        })
        .await
        .unwrap();

    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;
    app.seed_product("Pearl Necklace", "pearl-necklace", 120_000, 5).await;

    app.services
        .catalog
        .update_product(
            ring.id,
            aurum_api::services::catalog::UpdateProductRequest {
                name: None,
                description: None,
                price: None,
                compare_at_price: None,
                inventory: None,
                collection_id: Some(rings.id),
                tags: None,
            },
        )
        .await
        .unwrap();

    let listed = app
        .services
        .catalog
        .list_products(None, Some("rings".to_string()))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, ring.id);
}

#[tokio::test]
async fn delete_refuses_products_with_order_history() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    app.services
        .orders
        .create_order(
            user.id,
            CreateOrderRequest {
                items: vec![OrderItemRequest {
                    product: "aurora-ring".to_string(),
                    quantity: 1,
                }],
                email: "shopper@example.com".to_string(),
                phone: "+919999999999".to_string(),
                shipping_address: "12 Marine Drive, Mumbai 400001".to_string(),
            },
        )
        .await
        .unwrap();

    let err = app.services.catalog.delete_product(ring.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // The separately named purge path removes the history too.
    let removed = app.services.catalog.purge_product(ring.id).await.unwrap();
    assert_eq!(removed, 1);

    let err = app
        .services
        .catalog
        .resolve(&ProductRef::Id(ring.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidProduct(_)));
}

#[tokio::test]
async fn name_search_narrows_the_listing() {
    let app = TestApp::new().await;
    app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;
    app.seed_product("Pearl Necklace", "pearl-necklace", 120_000, 5).await;

    let listed = app
        .services
        .catalog
        .list_products(Some("Necklace".to_string()), None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].slug, "pearl-necklace");
}

#[tokio::test]
async fn gallery_images_can_be_added_and_removed() {
    let app = TestApp::new().await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    let first = app
        .services
        .catalog
        .add_product_image(
            ring.id,
            AddProductImageRequest {
                url: "https://cdn.example.com/aurora-1.jpg".to_string(),
                position: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(first.position, 0);

    let second = app
        .services
        .catalog
        .add_product_image(
            ring.id,
            AddProductImageRequest {
                url: "https://cdn.example.com/aurora-2.jpg".to_string(),
                position: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(second.position, 1);

    app.services
        .catalog
        .remove_product_image(ring.id, first.id)
        .await
        .unwrap();

    let (_, images) = app
        .services
        .catalog
        .get_product(&ProductRef::Id(ring.id))
        .await
        .unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, second.id);
}

#[tokio::test]
async fn collection_renames_keep_slugs_unique() {
    let app = TestApp::new().await;
    let rings = app
        .services
        .catalog
        .create_collection(CreateCollectionRequest {
            name: "Rings".to_string(),
            slug: "rings".to_string(),
        })
        .await
        .unwrap();
    app.services
        .catalog
        .create_collection(CreateCollectionRequest {
            name: "Necklaces".to_string(),
            slug: "necklaces".to_string(),
        })
        .await
        .unwrap();

    let err = app
        .services
        .catalog
        .update_collection(
            rings.id,
            UpdateCollectionRequest {
                name: None,
                slug: Some("necklaces".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let renamed = app
        .services
        .catalog
        .update_collection(
            rings.id,
            UpdateCollectionRequest {
                name: Some("Gold Rings".to_string()),
                slug: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Gold Rings");
    assert_eq!(renamed.slug, "rings");
}

#[tokio::test]
async fn unreferenced_products_delete_cleanly() {
    let app = TestApp::new().await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    app.services.catalog.delete_product(ring.id).await.unwrap();

    let err = app
        .services
        .catalog
        .resolve(&ProductRef::Slug("aurora-ring".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidProduct(_)));
}
