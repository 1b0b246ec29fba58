//! # User Repository
//!
//! User lookup and credential handling. Passwords are stored as
//! HMAC-SHA256(secret, salt || password) hex digests with a random per-user
//! salt; verification is constant-time.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::RepositoryError;
use crate::idgen::IdGenerator;
use crate::models::user::{ActiveModel as UserActiveModel, Entity as User, Model as UserModel};
use crate::models::user;

type HmacSha256 = Hmac<Sha256>;

/// Request data for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub sys_id: i32,
    pub org_id: i32,
    pub username: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_superuser: bool,
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    db: &'a DatabaseConnection,
    idgen: &'a IdGenerator,
    secret: &'a str,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a DatabaseConnection, idgen: &'a IdGenerator, secret: &'a str) -> Self {
        Self { db, idgen, secret }
    }

    fn digest(&self, salt: &str, password: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(salt.as_bytes());
        mac.update(password.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn new_salt() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    pub async fn create_user(
        &self,
        request: CreateUserRequest,
    ) -> Result<UserModel, RepositoryError> {
        if request.username.trim().is_empty() {
            return Err(RepositoryError::validation_error("username cannot be empty"));
        }

        let (salt, digest) = match &request.password {
            Some(password) if !password.is_empty() => {
                let salt = Self::new_salt();
                let digest = self.digest(&salt, password);
                (Some(salt), Some(digest))
            }
            _ => (None, None),
        };

        let model = UserActiveModel {
            id: Set(self.idgen.next_id("U")),
            sys_id: Set(request.sys_id),
            org_id: Set(request.org_id),
            username: Set(request.username),
            phone: Set(request.phone),
            email: Set(request.email),
            password_digest: Set(digest),
            password_salt: Set(salt),
            is_active: Set(true),
            is_superuser: Set(request.is_superuser),
            create_time: Set(chrono::Utc::now().into()),
        };

        Ok(model.insert(self.db).await?)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserModel>, RepositoryError> {
        Ok(User::find_by_id(id).one(self.db).await?)
    }

    pub async fn find_by_username(
        &self,
        sys_id: i32,
        username: &str,
    ) -> Result<Option<UserModel>, RepositoryError> {
        Ok(User::find()
            .filter(user::Column::SysId.eq(sys_id))
            .filter(user::Column::Username.eq(username))
            .one(self.db)
            .await?)
    }

    pub async fn find_by_phone(
        &self,
        sys_id: i32,
        phone: &str,
    ) -> Result<Option<UserModel>, RepositoryError> {
        Ok(User::find()
            .filter(user::Column::SysId.eq(sys_id))
            .filter(user::Column::Phone.eq(phone))
            .one(self.db)
            .await?)
    }

    pub async fn find_by_email(
        &self,
        sys_id: i32,
        email: &str,
    ) -> Result<Option<UserModel>, RepositoryError> {
        Ok(User::find()
            .filter(user::Column::SysId.eq(sys_id))
            .filter(user::Column::Email.eq(email))
            .one(self.db)
            .await?)
    }

    /// Constant-time password verification.
    pub fn verify_password(&self, user: &UserModel, password: &str) -> bool {
        let (Some(salt), Some(stored)) = (&user.password_salt, &user.password_digest) else {
            return false;
        };
        let computed = self.digest(salt, password);
        ConstantTimeEq::ct_eq(computed.as_bytes(), stored.as_bytes()).into()
    }
}
