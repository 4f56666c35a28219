/// User Microservice Library
///
/// Core functionality for the user microservice: OTP-based signup
/// verification staged through a TTL cache, durable user storage, and a
/// typed facade over the remote auth service.
///
/// # Modules
/// - `signup`: signup orchestration and subscriber/profile queries
/// - `auth`: remote auth service facade (token issuance, logout)
/// - `cache`: ephemeral TTL key-value cache
/// - `db`: persistent user store (DynamoDB and in-memory)
/// - `mail`: verification mail dispatch
/// - `grpc`: gRPC service implementation
/// - `config`: configuration management

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod grpc;
pub mod mail;
pub mod signup;

/// Generated protocol buffer code
pub mod proto {
    pub mod user {
        tonic::include_proto!("user");
    }
    pub mod auth {
        tonic::include_proto!("auth");
    }
}
