//! Remote auth service facade.
//!
//! Typed pass-through over the separately-deployed AuthService. The channel
//! is established once in `connect`, before the server starts taking
//! traffic, and the facade is handed to its consumers as an immutable
//! dependency; there is no lazily bound handle to call too early. No
//! business logic lives here: remote failures surface to the caller as
//! `AuthError::Remote` carrying the gRPC status.

use thiserror::Error;
use tonic::transport::Channel;
use tracing::{debug, info};

use crate::proto::auth::auth_service_client::AuthServiceClient;
use crate::proto::auth::{AuthLogoutRequest, AuthLogoutReply, TokenReply, TokenRequest};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("failed to connect to auth service: {0}")]
    Connect(#[from] tonic::transport::Error),
    #[error("auth service call failed: {0}")]
    Remote(#[from] tonic::Status),
}

/// Handle to the remote auth service, resolved at startup.
#[derive(Debug, Clone)]
pub struct AuthFacade {
    client: AuthServiceClient<Channel>,
}

impl AuthFacade {
    /// Establishes the channel to the auth service. Called once during
    /// service startup; the returned facade is cloned into each consumer.
    pub async fn connect(endpoint: String) -> Result<Self, AuthError> {
        info!("Connecting to auth service at {}", endpoint);
        let client = AuthServiceClient::connect(endpoint).await?;
        Ok(Self { client })
    }

    /// Exchanges credentials for a token.
    pub async fn get_token(
        &self,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<TokenReply, AuthError> {
        debug!("Forwarding token request for {}", email);
        let request = TokenRequest {
            email: email.to_string(),
            password: password.to_string(),
            device_id: device_id.to_string(),
        };

        let mut client = self.client.clone();
        let response = client.get_token(request).await?;
        Ok(response.into_inner())
    }

    /// Invalidates a token on the auth side.
    pub async fn logout(&self, token: &str) -> Result<AuthLogoutReply, AuthError> {
        debug!("Forwarding logout request");
        let request = AuthLogoutRequest {
            token: token.to_string(),
        };

        let mut client = self.client.clone();
        let response = client.logout(request).await?;
        Ok(response.into_inner())
    }
}
