//! gRPC implementation of the user service.
//!
//! Transport face of the signup orchestrator plus the pass-through login
//! and logout operations forwarded through the auth facade. This layer only
//! maps domain errors to gRPC status codes; no business logic lives here.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, error};

use crate::auth::{AuthError, AuthFacade};
use crate::proto::user::user_service_server::UserService;
use crate::proto::user::{
    LoginReply, LoginRequest, LogoutReply, LogoutRequest, NameEmailReply, NameEmailRequest,
    SignupReply, SignupRequest, SignupVerificationReply, SignupVerificationRequest,
    SubscriberReply, SubscriberRequest,
};
use crate::signup::{PendingSignup, SignupError, SignupService};

/// Maps orchestrator errors to gRPC status codes
impl From<SignupError> for Status {
    fn from(error: SignupError) -> Self {
        match error {
            SignupError::Conflict(email) => {
                Status::already_exists(format!("user with email {} already exists", email))
            }
            SignupError::InvalidOtp => {
                Status::invalid_argument("invalid or expired verification code")
            }
            SignupError::InconsistentState(_) => {
                Status::internal("pending signup is missing, restart the signup")
            }
            SignupError::NotFound(id) => Status::not_found(format!("user {} not found", id)),
            SignupError::MailDispatch(e) => {
                Status::internal(format!("failed to send verification mail: {}", e))
            }
            SignupError::Hash(e) => Status::internal(format!("hashing failed: {}", e)),
            SignupError::Encode(e) => Status::internal(format!("encoding failed: {}", e)),
            SignupError::Store(e) => Status::internal(format!("storage error: {}", e)),
        }
    }
}

/// Maps facade errors to gRPC status codes
impl From<AuthError> for Status {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Connect(e) => Status::unavailable(format!("auth service unreachable: {}", e)),
            // Remote status passes through unchanged.
            AuthError::Remote(status) => status,
        }
    }
}

pub struct UserServer {
    signup: Arc<SignupService>,
    auth: AuthFacade,
}

impl UserServer {
    pub fn new(signup: Arc<SignupService>, auth: AuthFacade) -> Self {
        Self { signup, auth }
    }
}

#[tonic::async_trait]
impl UserService for UserServer {
    async fn signup(
        &self,
        request: Request<SignupRequest>,
    ) -> Result<Response<SignupReply>, Status> {
        let req = request.into_inner();
        debug!("Received signup request for {}", req.email);

        let message = self
            .signup
            .initiate_signup(PendingSignup {
                name: req.name,
                email: req.email,
                password: req.password,
                role: req.role,
                notification: req.notification,
            })
            .await
            .map_err(|e| {
                error!("Signup failed: {}", e);
                Status::from(e)
            })?;

        Ok(Response::new(SignupReply {
            message: message.to_string(),
        }))
    }

    async fn signup_verification(
        &self,
        request: Request<SignupVerificationRequest>,
    ) -> Result<Response<SignupVerificationReply>, Status> {
        let req = request.into_inner();
        debug!("Received signup verification request");

        let user = self.signup.confirm_signup(&req.otp).await.map_err(|e| {
            error!("Signup verification failed: {}", e);
            Status::from(e)
        })?;

        Ok(Response::new(SignupVerificationReply {
            message: "Signup verified successfully".to_string(),
            id: user.id,
            name: user.name,
            email: user.email,
        }))
    }

    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginReply>, Status> {
        let req = request.into_inner();
        debug!("Received login request for {}", req.email);

        let reply = self
            .auth
            .get_token(&req.email, &req.password, &req.device_id)
            .await
            .map_err(|e| {
                error!("Login failed: {}", e);
                Status::from(e)
            })?;

        Ok(Response::new(LoginReply {
            token: reply.token,
            message: reply.message,
        }))
    }

    async fn logout(
        &self,
        request: Request<LogoutRequest>,
    ) -> Result<Response<LogoutReply>, Status> {
        let req = request.into_inner();
        debug!("Received logout request");

        let reply = self.auth.logout(&req.token).await.map_err(|e| {
            error!("Logout failed: {}", e);
            Status::from(e)
        })?;

        Ok(Response::new(LogoutReply {
            message: reply.message,
        }))
    }

    async fn get_subscriber(
        &self,
        request: Request<SubscriberRequest>,
    ) -> Result<Response<SubscriberReply>, Status> {
        let req = request.into_inner();
        debug!("Received subscriber lookup, request flag: {}", req.request);

        let emails = self.signup.subscribers(req.request).await.map_err(|e| {
            error!("Subscriber lookup failed: {}", e);
            Status::from(e)
        })?;

        Ok(Response::new(SubscriberReply { emails }))
    }

    async fn get_name_email(
        &self,
        request: Request<NameEmailRequest>,
    ) -> Result<Response<NameEmailReply>, Status> {
        let req = request.into_inner();
        debug!("Received profile lookup for id: {}", req.id);

        let profile = self.signup.profile(&req.id).await.map_err(|e| {
            error!("Profile lookup failed: {}", e);
            Status::from(e)
        })?;

        Ok(Response::new(NameEmailReply {
            name: profile.name,
            email: profile.email,
        }))
    }
}
