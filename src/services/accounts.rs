use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{AuthService, TokenPair},
    entities::{address, user},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: user::Model,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpsertAddressRequest {
    #[validate(length(min = 1, max = 200))]
    pub recipient_name: String,
    #[validate(length(min = 1, max = 500))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Account service: registration, login, and the address book.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    auth_service: Arc<AuthService>,
    event_sender: EventSender,
    admin_emails: Vec<String>,
}

impl AccountService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth_service: Arc<AuthService>,
        event_sender: EventSender,
        admin_emails: Vec<String>,
    ) -> Self {
        Self {
            db,
            auth_service,
            event_sender,
            admin_emails,
        }
    }

    fn is_admin_email(&self, email: &str) -> bool {
        let needle = email.to_ascii_lowercase();
        self.admin_emails
            .iter()
            .any(|e| e.to_ascii_lowercase() == needle)
    }

    /// Register a new account.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<user::Model, ServiceError> {
        req.validate()?;

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(req.email.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "Email is already registered".to_string(),
            ));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| ServiceError::HashError(e.to_string()))?
            .to_string();

        let user_id = Uuid::new_v4();
        let model = user::ActiveModel {
            id: Set(user_id),
            email: Set(req.email),
            name: Set(req.name),
            phone: Set(req.phone),
            password_hash: Set(password_hash),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await.map_err(ServiceError::db_error)?;

        if let Err(e) = self.event_sender.send(Event::UserRegistered(user_id)).await {
            warn!("Failed to emit user registered event: {}", e);
        }
        info!("User {} registered", user_id);
        Ok(created)
    }

    /// Verify credentials and issue a token.
    ///
    /// Accounts whose email is on the configured admin list get the admin
    /// role in their token. Wrong email and wrong password are reported
    /// identically.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        req.validate()?;

        let user = user::Entity::find()
            .filter(user::Column::Email.eq(req.email.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed)
            .map_err(|_| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        let mut roles = vec!["customer".to_string()];
        if self.is_admin_email(&user.email) {
            roles.push("admin".to_string());
        }

        let tokens = self
            .auth_service
            .generate_token(user.id, &user.email, roles)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        if let Err(e) = self.event_sender.send(Event::UserLoggedIn(user.id)).await {
            warn!("Failed to emit login event: {}", e);
        }

        Ok(LoginResponse { user, tokens })
    }

    #[instrument(skip(self))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    #[instrument(skip(self))]
    pub async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<address::Model>, ServiceError> {
        address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::IsDefault)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Add an address. At most one address per user is the default; marking
    /// a new one default clears the old flag in the same transaction.
    #[instrument(skip(self, req))]
    pub async fn add_address(
        &self,
        user_id: Uuid,
        req: UpsertAddressRequest,
    ) -> Result<address::Model, ServiceError> {
        req.validate()?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        // First address becomes the default regardless of the flag.
        let count = address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .len();
        let make_default = req.is_default || count == 0;

        if make_default {
            Self::clear_default(&txn, user_id).await?;
        }

        let model = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            recipient_name: Set(req.recipient_name),
            line1: Set(req.line1),
            line2: Set(req.line2),
            city: Set(req.city),
            state: Set(req.state),
            postal_code: Set(req.postal_code),
            country: Set(req.country),
            phone: Set(req.phone),
            is_default: Set(make_default),
            ..Default::default()
        };
        let created = model.insert(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(created)
    }

    #[instrument(skip(self, req))]
    pub async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        req: UpsertAddressRequest,
    ) -> Result<address::Model, ServiceError> {
        req.validate()?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let existing = address::Entity::find_by_id(address_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;
        if existing.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Address belongs to another account".to_string(),
            ));
        }

        if req.is_default && !existing.is_default {
            Self::clear_default(&txn, user_id).await?;
        }

        let mut active: address::ActiveModel = existing.into();
        active.recipient_name = Set(req.recipient_name);
        active.line1 = Set(req.line1);
        active.line2 = Set(req.line2);
        active.city = Set(req.city);
        active.state = Set(req.state);
        active.postal_code = Set(req.postal_code);
        active.country = Set(req.country);
        active.phone = Set(req.phone);
        active.is_default = Set(req.is_default);
        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let existing = address::Entity::find_by_id(address_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;
        if existing.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Address belongs to another account".to_string(),
            ));
        }

        address::Entity::delete_by_id(address_id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    async fn clear_default<C: sea_orm::ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        address::Entity::update_many()
            .col_expr(
                address::Column::IsDefault,
                sea_orm::sea_query::Expr::value(false),
            )
            .filter(address::Column::UserId.eq(user_id))
            .filter(address::Column::IsDefault.eq(true))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }
}
