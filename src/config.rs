/// Configuration Module
///
/// Configuration management for the user microservice. Loads and merges the
/// YAML configuration file with `APP_`-prefixed environment variables and
/// exposes the typed settings the service components are built from.

use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application metadata configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct Application {
    /// Name of the application
    pub name: String,
}

/// gRPC server configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct GrpcConfig {
    /// Server configuration
    pub server: ServerConfig,
}

/// Server bind configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server endpoint
    pub endpoint: String,
    /// Server port
    pub port: u16,
}

/// Remote auth service client configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct AuthClientConfig {
    /// Auth service URL (e.g., "http://auth:50051")
    pub url: String,
}

/// DynamoDB configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DynamoDbConfig {
    /// DynamoDB table name
    pub table_name: String,
    /// AWS region
    pub region: String,
    /// Name of the GSI keyed by user id
    pub id_index_name: String,
}

/// Mail API configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MailConfig {
    /// Message endpoint of the mail API
    pub api_url: String,
    /// Basic-auth username
    pub api_user: String,
    /// Basic-auth secret
    pub api_key: String,
    /// Sender address
    pub from: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Signup staging configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct OtpConfig {
    /// One-time code time-to-live in milliseconds
    pub ttl_millis: u64,
    /// How often expired cache entries are swept, in seconds
    pub sweep_interval_secs: u64,
}

/// User service configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct UserServiceConfig {
    /// gRPC configuration
    pub grpc: GrpcConfig,
    /// Remote auth service configuration
    pub auth: AuthClientConfig,
    /// DynamoDB configuration
    pub dynamodb: DynamoDbConfig,
    /// Mail configuration
    pub mail: MailConfig,
    /// Signup staging configuration
    pub otp: OtpConfig,
}

/// Application configuration settings
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Application metadata
    pub application: Application,
    /// User service configuration
    pub user: UserServiceConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Covers every loader failure: unreadable file, malformed YAML, and
    /// missing or mistyped values all surface through the config crate.
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl Config {
    /// Creates a new Config instance by loading and merging configuration
    /// from multiple sources.
    ///
    /// # Configuration Sources
    /// Configuration is loaded in the following order (later sources
    /// override earlier ones):
    /// 1. Base configuration (`config/application.yml`)
    /// 2. Environment variables (prefixed with `APP_`)
    pub fn new() -> Result<Self, ConfigError> {
        let builder = ConfigFile::builder()
            .add_source(File::with_name("config/application.yml"))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        config
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Returns the user service configuration.
    pub fn user(&self) -> &UserServiceConfig {
        &self.user
    }
}
