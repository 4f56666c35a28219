//! User Microservice
//!
//! Main entry point for the user microservice. The service owns OTP-based
//! signup verification and the subscriber/profile lookups, and forwards
//! login/logout to a separately-deployed auth service over gRPC.
//!
//! # Flow
//! 1. Caller submits signup details
//! 2. Service stages the pending signup in the TTL cache and mails an OTP
//! 3. Caller submits the OTP
//! 4. Service hashes the password and persists the user in DynamoDB
//! 5. Login and logout are forwarded through the auth facade

use std::sync::Arc;
use std::time::Duration;

use tonic::transport::Server;
use tracing::{info, Level};
use tracing_subscriber::fmt;

use user_service::auth::AuthFacade;
use user_service::cache::TtlCache;
use user_service::config::Config;
use user_service::db::dynamodb::DynamoDbConfig;
use user_service::db::DynamoUserStore;
use user_service::grpc::UserServer;
use user_service::mail::{HttpMailer, MailConfig};
use user_service::proto::user::user_service_server::UserServiceServer;
use user_service::signup::SignupService;

/// Initializes the logging system with appropriate configuration.
///
/// Sets up structured logging with timestamps and log levels using
/// the tracing framework.
fn setup_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fmt()
        .with_max_level(Level::DEBUG)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stdout)
        .try_init()
        .map_err(|e| e.into())
}

/// Initializes and starts all service dependencies.
///
/// Sets up the following components:
/// - DynamoDB-backed user store
/// - TTL cache for staged signups, with a periodic expiry sweep
/// - HTTP mail client for OTP dispatch
/// - Auth facade, connected before the server takes traffic
/// - gRPC server with the user service endpoints
async fn setup_services(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let user_config = config.user();

    info!(
        "Initializing user store with table: {}",
        user_config.dynamodb.table_name
    );
    let store = DynamoUserStore::new(DynamoDbConfig {
        region: user_config.dynamodb.region.clone(),
        table_name: user_config.dynamodb.table_name.clone(),
        id_index_name: user_config.dynamodb.id_index_name.clone(),
    })
    .await;
    info!("User store initialized successfully");

    info!("Initializing mail client...");
    let mailer = HttpMailer::new(MailConfig {
        api_url: user_config.mail.api_url.clone(),
        api_user: user_config.mail.api_user.clone(),
        api_key: user_config.mail.api_key.clone(),
        from: user_config.mail.from.clone(),
        timeout_secs: user_config.mail.timeout_secs,
    })?;
    info!("Mail client initialized successfully");

    let cache = TtlCache::new();
    let sweep_cache = cache.clone();
    let sweep_interval = Duration::from_secs(user_config.otp.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweep_cache.sweep_expired().await;
        }
    });

    // Bind the remote handle before serving; consumers receive it as an
    // immutable dependency.
    let auth = AuthFacade::connect(user_config.auth.url.clone()).await?;
    info!("Auth facade connected successfully");

    let signup = SignupService::new(
        Arc::new(store),
        cache,
        Arc::new(mailer),
        Duration::from_millis(user_config.otp.ttl_millis),
    );

    let addr = format!(
        "{}:{}",
        user_config.grpc.server.endpoint, user_config.grpc.server.port
    )
    .parse()?;
    info!("Starting server on {}", addr);

    let user_server = UserServer::new(Arc::new(signup), auth);

    Server::builder()
        .add_service(UserServiceServer::new(user_server))
        .serve(addr)
        .await?;

    Ok(())
}

/// Main entry point for the user microservice.
///
/// # Flow
/// 1. Initializes logging and configuration
/// 2. Sets up service dependencies (store, cache, mail, auth facade)
/// 3. Starts the gRPC server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    setup_logging()?;
    info!("User microservice starting up...");

    info!("Loading configuration...");
    let config =
        Config::new().map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
    info!("Configuration loaded successfully");

    setup_services(config).await?;

    Ok(())
}
