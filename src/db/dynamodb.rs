//! DynamoDB-backed user store.
//!
//! The table is keyed by email, which makes the unique-email constraint a
//! property of the write itself: `insert` uses a conditional put with
//! `attribute_not_exists(email)`, so two concurrent signups for the same
//! address cannot both land. Lookups by id go through a GSI; subscriber
//! lookups scan with a filter on the notification flag.

use std::collections::HashMap;

use aws_config::meta::region::RegionProviderChain;
use aws_config::Region;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as AwsDynamoDbClient;
use tracing::info;

use super::{NewUser, StoreError, User, UserStore};

/// Connection and table settings for the user table.
#[derive(Debug, Clone)]
pub struct DynamoDbConfig {
    /// AWS region (e.g., "us-west-2")
    pub region: String,
    /// DynamoDB table name
    pub table_name: String,
    /// Name of the GSI keyed by user id
    pub id_index_name: String,
}

#[derive(Debug)]
pub struct DynamoUserStore {
    client: AwsDynamoDbClient,
    config: DynamoDbConfig,
}

impl DynamoUserStore {
    /// Creates a new store instance bound to the configured table.
    pub async fn new(config: DynamoDbConfig) -> Self {
        let region_provider =
            RegionProviderChain::first_try(Region::new(config.region.clone()));
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;
        let client = AwsDynamoDbClient::new(&shared_config);

        Self { client, config }
    }

    fn marshal(user: &User) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
        item.insert("id".to_string(), AttributeValue::S(user.id.clone()));
        item.insert("name".to_string(), AttributeValue::S(user.name.clone()));
        item.insert(
            "password".to_string(),
            AttributeValue::S(user.password.clone()),
        );
        item.insert(
            "role".to_string(),
            AttributeValue::L(
                user.role
                    .iter()
                    .map(|r| AttributeValue::S(r.clone()))
                    .collect(),
            ),
        );
        item.insert(
            "notification".to_string(),
            AttributeValue::S(user.notification.clone()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(user.created_at.to_rfc3339()),
        );
        item
    }

    fn unmarshal(item: &HashMap<String, AttributeValue>) -> Result<User, StoreError> {
        let string_field = |field: &str| -> Result<String, StoreError> {
            item.get(field)
                .and_then(|av| av.as_s().ok())
                .map(|s| s.to_string())
                .ok_or_else(|| StoreError::Parse(field.to_string()))
        };

        let role = item
            .get("role")
            .and_then(|av| av.as_l().ok())
            .ok_or_else(|| StoreError::Parse("role".to_string()))?
            .iter()
            .map(|av| {
                av.as_s()
                    .map(|s| s.to_string())
                    .map_err(|_| StoreError::Parse("role".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let created_at = string_field("created_at")?
            .parse::<chrono::DateTime<chrono::Utc>>()
            .map_err(|_| StoreError::Parse("created_at".to_string()))?;

        Ok(User {
            id: string_field("id")?,
            name: string_field("name")?,
            email: string_field("email")?,
            password: string_field("password")?,
            role,
            notification: string_field("notification")?,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl UserStore for DynamoUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.config.table_name)
            .key("email", AttributeValue::S(email.to_string()))
            .send()
            .await
            .map_err(StoreError::GetItem)?;

        output.item.as_ref().map(Self::unmarshal).transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let output = self
            .client
            .query()
            .table_name(&self.config.table_name)
            .index_name(&self.config.id_index_name)
            .key_condition_expression("id = :id")
            .expression_attribute_values(":id", AttributeValue::S(id.to_string()))
            .limit(1)
            .send()
            .await
            .map_err(StoreError::Query)?;

        output.items().first().map(Self::unmarshal).transpose()
    }

    async fn find_by_notification(&self, flag: &str) -> Result<Vec<User>, StoreError> {
        let mut users = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.config.table_name)
                .filter_expression("notification = :flag")
                .expression_attribute_values(":flag", AttributeValue::S(flag.to_string()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(StoreError::Scan)?;

            for item in output.items() {
                users.push(Self::unmarshal(item)?);
            }

            start_key = output.last_evaluated_key().cloned();
            if start_key.is_none() {
                break;
            }
        }

        Ok(users)
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: new_user.name,
            email: new_user.email,
            password: new_user.password,
            role: new_user.role,
            notification: new_user.notification,
            created_at: chrono::Utc::now(),
        };

        self.client
            .put_item()
            .table_name(&self.config.table_name)
            .set_item(Some(Self::marshal(&user)))
            .condition_expression("attribute_not_exists(email)")
            .send()
            .await
            .map_err(|e| {
                let duplicate = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if duplicate {
                    StoreError::DuplicateEmail(user.email.clone())
                } else {
                    StoreError::PutItem(e)
                }
            })?;

        info!("Saved user record for email: {}", user.email);
        Ok(user)
    }
}
