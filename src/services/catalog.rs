use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{collection, order_item, product, product_image},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// A client-supplied product reference: either a UUID or a slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductRef {
    Id(Uuid),
    Slug(String),
}

impl ProductRef {
    /// Anything that parses as a UUID is an id; everything else is a slug.
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => ProductRef::Id(id),
            Err(_) => ProductRef::Slug(raw.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub slug: String,
    pub description: Option<String>,
    /// Price in minor currency units (paise)
    pub price: i64,
    pub compare_at_price: Option<i64>,
    #[serde(default)]
    pub inventory: i32,
    pub collection_id: Option<Uuid>,
    pub tags: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub compare_at_price: Option<i64>,
    pub inventory: Option<i32>,
    pub collection_id: Option<Uuid>,
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCollectionRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub slug: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCollectionRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddProductImageRequest {
    #[validate(url)]
    pub url: String,
    /// Position in the gallery; appended at the end when omitted
    pub position: Option<i32>,
}

/// Catalog service for products, collections, and product images.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Resolve a batch of product references in two queries, one per kind.
    ///
    /// Returns products in the same order as the input references. Any
    /// reference that matches nothing fails the whole batch.
    #[instrument(skip(self, refs), fields(count = refs.len()))]
    pub async fn resolve_many(
        &self,
        refs: &[ProductRef],
    ) -> Result<Vec<product::Model>, ServiceError> {
        let ids: Vec<Uuid> = refs
            .iter()
            .filter_map(|r| match r {
                ProductRef::Id(id) => Some(*id),
                ProductRef::Slug(_) => None,
            })
            .collect();
        let slugs: Vec<String> = refs
            .iter()
            .filter_map(|r| match r {
                ProductRef::Slug(slug) => Some(slug.clone()),
                ProductRef::Id(_) => None,
            })
            .collect();

        let mut by_id: HashMap<Uuid, product::Model> = HashMap::new();
        let mut by_slug: HashMap<String, product::Model> = HashMap::new();

        if !ids.is_empty() {
            for p in product::Entity::find()
                .filter(product::Column::Id.is_in(ids))
                .all(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
            {
                by_id.insert(p.id, p);
            }
        }
        if !slugs.is_empty() {
            for p in product::Entity::find()
                .filter(product::Column::Slug.is_in(slugs))
                .all(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
            {
                by_slug.insert(p.slug.clone(), p);
            }
        }

        refs.iter()
            .map(|r| match r {
                ProductRef::Id(id) => by_id.get(id).cloned().ok_or_else(|| {
                    warn!("Unknown product id {}", id);
                    ServiceError::InvalidProduct(id.to_string())
                }),
                ProductRef::Slug(slug) => by_slug.get(slug).cloned().ok_or_else(|| {
                    warn!("Unknown product slug {}", slug);
                    ServiceError::InvalidProduct(slug.clone())
                }),
            })
            .collect()
    }

    /// Resolve a single reference.
    pub async fn resolve(&self, reference: &ProductRef) -> Result<product::Model, ServiceError> {
        let mut resolved = self.resolve_many(std::slice::from_ref(reference)).await?;
        resolved
            .pop()
            .ok_or_else(|| ServiceError::InvalidProduct(format!("{:?}", reference)))
    }

    /// List products, optionally narrowed by a name substring and a
    /// collection slug.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        search: Option<String>,
        collection_slug: Option<String>,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = product::Entity::find().order_by_asc(product::Column::Name);

        if let Some(q) = search {
            let q = q.trim().to_string();
            if !q.is_empty() {
                query = query.filter(product::Column::Name.contains(&q));
            }
        }

        if let Some(slug) = collection_slug {
            let coll = collection::Entity::find()
                .filter(collection::Column::Slug.eq(slug.clone()))
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::NotFound(format!("Collection {} not found", slug)))?;
            query = query.filter(product::Column::CollectionId.eq(coll.id));
        }

        query.all(&*self.db).await.map_err(ServiceError::db_error)
    }

    /// A product with its images, for the detail page.
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        reference: &ProductRef,
    ) -> Result<(product::Model, Vec<product_image::Model>), ServiceError> {
        let prod = self.resolve(reference).await?;
        let images = product_image::Entity::find()
            .filter(product_image::Column::ProductId.eq(prod.id))
            .order_by_asc(product_image::Column::Position)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok((prod, images))
    }

    #[instrument(skip(self, req), fields(slug = %req.slug))]
    pub async fn create_product(
        &self,
        req: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        req.validate()?;
        if req.price < 0 {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }
        if req.inventory < 0 {
            return Err(ServiceError::ValidationError(
                "Inventory cannot be negative".to_string(),
            ));
        }

        let existing = product::Entity::find()
            .filter(product::Column::Slug.eq(req.slug.clone()))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product slug '{}' is already taken",
                req.slug
            )));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let product_id = Uuid::new_v4();
        let model = product::ActiveModel {
            id: Set(product_id),
            name: Set(req.name),
            slug: Set(req.slug),
            description: Set(req.description),
            price: Set(req.price),
            compare_at_price: Set(req.compare_at_price),
            inventory: Set(req.inventory),
            collection_id: Set(req.collection_id),
            tags: Set(req.tags),
            ..Default::default()
        };
        let created = model.insert(&txn).await.map_err(|e| {
            error!("Failed to insert product: {}", e);
            ServiceError::db_error(e)
        })?;

        for (position, url) in req.images.into_iter().enumerate() {
            let image = product_image::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                url: Set(url),
                position: Set(position as i32),
                created_at: Set(chrono::Utc::now()),
            };
            image.insert(&txn).await.map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Err(e) = self.event_sender.send(Event::ProductCreated(product_id)).await {
            warn!("Failed to emit product created event: {}", e);
        }
        info!("Created product {}", product_id);
        Ok(created)
    }

    #[instrument(skip(self, req))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        req: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        req.validate()?;

        let existing = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = req.name {
            active.name = Set(name);
        }
        if let Some(description) = req.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = req.price {
            if price < 0 {
                return Err(ServiceError::ValidationError(
                    "Price cannot be negative".to_string(),
                ));
            }
            active.price = Set(price);
        }
        if let Some(compare_at) = req.compare_at_price {
            active.compare_at_price = Set(Some(compare_at));
        }
        if let Some(inventory) = req.inventory {
            if inventory < 0 {
                return Err(ServiceError::ValidationError(
                    "Inventory cannot be negative".to_string(),
                ));
            }
            active.inventory = Set(inventory);
        }
        if let Some(collection_id) = req.collection_id {
            active.collection_id = Set(Some(collection_id));
        }
        if let Some(tags) = req.tags {
            active.tags = Set(Some(tags));
        }

        let updated = active.update(&*self.db).await.map_err(ServiceError::db_error)?;

        if let Err(e) = self.event_sender.send(Event::ProductUpdated(product_id)).await {
            warn!("Failed to emit product updated event: {}", e);
        }
        Ok(updated)
    }

    /// Delete a product, refusing when any order line references it.
    ///
    /// This keeps order history intact. `purge_product` is the separate,
    /// admin-only path that removes the history too.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let referenced = order_item::Entity::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if referenced > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product {} appears in {} order line(s); purge it instead",
                product_id, referenced
            )));
        }

        let result = product::Entity::delete_by_id(product_id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        if let Err(e) = self.event_sender.send(Event::ProductDeleted(product_id)).await {
            warn!("Failed to emit product deleted event: {}", e);
        }
        Ok(())
    }

    /// Force-delete a product together with every order line that references
    /// it, in one transaction. Destructive by design and only reachable
    /// through the admin purge endpoint.
    #[instrument(skip(self))]
    pub async fn purge_product(&self, product_id: Uuid) -> Result<u64, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let lines = order_item::Entity::delete_many()
            .filter(order_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let result = product::Entity::delete_by_id(product_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        warn!(
            "Purged product {} and {} order line(s)",
            product_id, lines.rows_affected
        );
        if let Err(e) = self.event_sender.send(Event::ProductPurged(product_id)).await {
            warn!("Failed to emit product purged event: {}", e);
        }
        Ok(lines.rows_affected)
    }

    /// Append or insert an image into a product's gallery.
    #[instrument(skip(self, req))]
    pub async fn add_product_image(
        &self,
        product_id: Uuid,
        req: AddProductImageRequest,
    ) -> Result<product_image::Model, ServiceError> {
        req.validate()?;

        let exists = product::Entity::find_by_id(product_id)
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if exists == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        let position = match req.position {
            Some(p) if p >= 0 => p,
            Some(_) => {
                return Err(ServiceError::ValidationError(
                    "Image position cannot be negative".to_string(),
                ))
            }
            None => {
                let count = product_image::Entity::find()
                    .filter(product_image::Column::ProductId.eq(product_id))
                    .count(&*self.db)
                    .await
                    .map_err(ServiceError::db_error)?;
                count as i32
            }
        };

        let image = product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            url: Set(req.url),
            position: Set(position),
            created_at: Set(chrono::Utc::now()),
        };
        let created = image.insert(&*self.db).await.map_err(ServiceError::db_error)?;

        if let Err(e) = self.event_sender.send(Event::ProductUpdated(product_id)).await {
            warn!("Failed to emit product updated event: {}", e);
        }
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn remove_product_image(
        &self,
        product_id: Uuid,
        image_id: Uuid,
    ) -> Result<(), ServiceError> {
        let result = product_image::Entity::delete_many()
            .filter(product_image::Column::Id.eq(image_id))
            .filter(product_image::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Image {} not found on product {}",
                image_id, product_id
            )));
        }

        if let Err(e) = self.event_sender.send(Event::ProductUpdated(product_id)).await {
            warn!("Failed to emit product updated event: {}", e);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_collections(&self) -> Result<Vec<collection::Model>, ServiceError> {
        collection::Entity::find()
            .order_by_asc(collection::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, req), fields(slug = %req.slug))]
    pub async fn create_collection(
        &self,
        req: CreateCollectionRequest,
    ) -> Result<collection::Model, ServiceError> {
        req.validate()?;

        let existing = collection::Entity::find()
            .filter(collection::Column::Slug.eq(req.slug.clone()))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Collection slug '{}' is already taken",
                req.slug
            )));
        }

        let collection_id = Uuid::new_v4();
        let model = collection::ActiveModel {
            id: Set(collection_id),
            name: Set(req.name),
            slug: Set(req.slug),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await.map_err(ServiceError::db_error)?;

        if let Err(e) = self
            .event_sender
            .send(Event::CollectionCreated(collection_id))
            .await
        {
            warn!("Failed to emit collection created event: {}", e);
        }
        Ok(created)
    }

    #[instrument(skip(self, req))]
    pub async fn update_collection(
        &self,
        collection_id: Uuid,
        req: UpdateCollectionRequest,
    ) -> Result<collection::Model, ServiceError> {
        req.validate()?;

        let existing = collection::Entity::find_by_id(collection_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Collection {} not found", collection_id))
            })?;

        if let Some(slug) = &req.slug {
            if *slug != existing.slug {
                let taken = collection::Entity::find()
                    .filter(collection::Column::Slug.eq(slug.clone()))
                    .count(&*self.db)
                    .await
                    .map_err(ServiceError::db_error)?;
                if taken > 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Collection slug '{}' is already taken",
                        slug
                    )));
                }
            }
        }

        let mut active: collection::ActiveModel = existing.into();
        if let Some(name) = req.name {
            active.name = Set(name);
        }
        if let Some(slug) = req.slug {
            active.slug = Set(slug);
        }
        let updated = active.update(&*self.db).await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }

    /// Delete a collection. Products in it are detached, not deleted.
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, collection_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        product::Entity::update_many()
            .col_expr(product::Column::CollectionId, sea_orm::sea_query::Expr::value(Option::<Uuid>::None))
            .filter(product::Column::CollectionId.eq(collection_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let result = collection::Entity::delete_by_id(collection_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Collection {} not found",
                collection_id
            )));
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Err(e) = self
            .event_sender
            .send(Event::CollectionDeleted(collection_id))
            .await
        {
            warn!("Failed to emit collection deleted event: {}", e);
        }
        Ok(())
    }
}
