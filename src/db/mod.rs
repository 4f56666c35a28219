//! Persistent user store.
//!
//! Defines the `User` record, the `UserStore` seam the orchestrator writes
//! through, and its implementations: DynamoDB for deployments and an
//! in-memory store for tests and local runs. Email uniqueness is enforced
//! inside `insert` at the storage layer, not checked-then-inserted above it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod dynamodb;
pub mod memory;

pub use dynamodb::DynamoUserStore;
pub use memory::MemoryUserStore;

/// Notification value that opts a user into broadcast subscriber lists.
pub const NOTIFICATION_OPT_IN: &str = "yes";

/// A confirmed user record. Created exactly once, at successful signup
/// verification, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// bcrypt hash, never the raw password.
    pub password: String,
    pub role: Vec<String>,
    pub notification: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Insert payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Vec<String>,
    pub notification: String,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("user with email {0} already exists")]
    DuplicateEmail(String),
    #[error("failed to put item: {0}")]
    PutItem(
        aws_sdk_dynamodb::error::SdkError<
            aws_sdk_dynamodb::operation::put_item::PutItemError,
        >,
    ),
    #[error("failed to get item: {0}")]
    GetItem(
        aws_sdk_dynamodb::error::SdkError<
            aws_sdk_dynamodb::operation::get_item::GetItemError,
        >,
    ),
    #[error("failed to query items: {0}")]
    Query(
        aws_sdk_dynamodb::error::SdkError<
            aws_sdk_dynamodb::operation::query::QueryError,
        >,
    ),
    #[error("failed to scan items: {0}")]
    Scan(
        aws_sdk_dynamodb::error::SdkError<
            aws_sdk_dynamodb::operation::scan::ScanError,
        >,
    ),
    #[error("failed to parse {0} from stored item")]
    Parse(String),
}

/// Storage seam for confirmed users.
#[async_trait::async_trait]
pub trait UserStore: std::fmt::Debug + Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Every user whose `notification` field equals `flag`, in no
    /// guaranteed order.
    async fn find_by_notification(&self, flag: &str) -> Result<Vec<User>, StoreError>;

    /// Persists a new user. Must fail with `DuplicateEmail` if a record
    /// with the same email already exists, atomically with the write.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
}
