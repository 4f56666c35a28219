//! Signup orchestrator and user queries.
//!
//! Owns the two-phase signup flow: `initiate_signup` stages a one-time code
//! and the pending user payload in the TTL cache and mails the code;
//! `confirm_signup` consumes the staged pair, hashes the password and writes
//! the user record. Also hosts the read-only subscriber and profile lookups
//! served over gRPC.
//!
//! # Flow
//! 1. Caller submits signup details
//! 2. Orchestrator rejects emails that already have an account
//! 3. OTP and pending payload are staged in the cache (5 minute TTL)
//! 4. OTP is mailed to the address being claimed
//! 5. Caller submits the OTP
//! 6. Orchestrator hashes the password, persists the user and drops the
//!    staged entries

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::db::{NewUser, StoreError, User, UserStore, NOTIFICATION_OPT_IN};
use crate::mail::{MailError, Mailer};

/// bcrypt cost factor for stored passwords.
const BCRYPT_COST: u32 = 10;

/// How long a staged signup stays valid: 300 000 ms.
pub const OTP_TTL: Duration = Duration::from_millis(300_000);

/// Subject line of the verification mail.
const MAIL_SUBJECT: &str = "Signup Verification";

/// Confirmation returned to the caller; never carries the OTP.
pub const SIGNUP_MAIL_SENT: &str =
    "Registration email sent successfully. Verify with the OTP sent to your email.";

fn verification_body(otp: &str) -> String {
    format!(
        "Your one time password is {otp}. \
         Enter it within five minutes to finish creating your account. \
         If it expires, start the signup again to receive a new code."
    )
}

/// The proposed user record, staged in the cache until the OTP comes back.
/// Holds the raw password; hashing happens only at confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSignup {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Vec<String>,
    pub notification: String,
}

/// Name and email pair returned by the profile lookup. Deliberately not the
/// full record: no password hash or role list leaves this service.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub email: String,
}

#[derive(Error, Debug)]
pub enum SignupError {
    #[error("user with email {0} is already registered")]
    Conflict(String),
    #[error("invalid or expired verification code")]
    InvalidOtp,
    #[error("verification code {0} resolved but its pending signup is missing")]
    InconsistentState(String),
    #[error("user {0} not found")]
    NotFound(String),
    #[error("failed to dispatch verification mail: {0}")]
    MailDispatch(#[from] MailError),
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("failed to encode pending signup: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SignupError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(email) => SignupError::Conflict(email),
            other => SignupError::Store(other),
        }
    }
}

/// Coordinates cache, mail and the persistent store for signup, and serves
/// the subscriber/profile queries. All collaborators are injected at
/// construction.
#[derive(Clone)]
pub struct SignupService {
    store: Arc<dyn UserStore>,
    cache: TtlCache,
    mailer: Arc<dyn Mailer>,
    otp_ttl: Duration,
}

impl SignupService {
    pub fn new(
        store: Arc<dyn UserStore>,
        cache: TtlCache,
        mailer: Arc<dyn Mailer>,
        otp_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            mailer,
            otp_ttl,
        }
    }

    fn composite_key(email: &str, otp: &str) -> String {
        format!("{email}+{otp}")
    }

    /// Uniform draw over [1000, 9999].
    fn generate_otp() -> String {
        rand::thread_rng().gen_range(1000..=9999).to_string()
    }

    /// Stages a signup attempt and mails the one-time code.
    ///
    /// Fails with `Conflict` if the email already has an account. The
    /// `otp -> email` and `email+otp -> payload` entries are written as a
    /// pair before mail dispatch is attempted; a mail failure leaves them
    /// to expire on their own.
    pub async fn initiate_signup(
        &self,
        pending: PendingSignup,
    ) -> Result<&'static str, SignupError> {
        if self.store.find_by_email(&pending.email).await?.is_some() {
            warn!("Signup rejected, email already registered: {}", pending.email);
            return Err(SignupError::Conflict(pending.email));
        }

        let otp = Self::generate_otp();
        debug!("Staging signup for {}", pending.email);

        self.cache
            .set(&otp, Value::String(pending.email.clone()), self.otp_ttl)
            .await;
        self.cache
            .set(
                &Self::composite_key(&pending.email, &otp),
                serde_json::to_value(&pending)?,
                self.otp_ttl,
            )
            .await;

        self.mailer
            .send(&pending.email, MAIL_SUBJECT, &verification_body(&otp))
            .await?;

        info!("Verification mail sent to {}", pending.email);
        Ok(SIGNUP_MAIL_SENT)
    }

    /// Consumes a staged signup and persists the user.
    ///
    /// `InvalidOtp` covers codes never issued, already consumed, or past
    /// their TTL. A code that resolves to an email whose payload is gone is
    /// an `InconsistentState`. On success both cache entries are deleted so
    /// the code cannot be replayed; the store's unique-email constraint
    /// backstops any race with the deletes.
    pub async fn confirm_signup(&self, otp: &str) -> Result<User, SignupError> {
        let email = match self.cache.get(otp).await {
            Some(value) => value
                .as_str()
                .ok_or_else(|| SignupError::InconsistentState(otp.to_string()))?
                .to_string(),
            None => {
                debug!("Verification code not found or expired");
                return Err(SignupError::InvalidOtp);
            }
        };

        let key = Self::composite_key(&email, otp);
        let pending: PendingSignup = match self.cache.get(&key).await {
            Some(value) => serde_json::from_value(value)
                .map_err(|_| SignupError::InconsistentState(otp.to_string()))?,
            None => {
                warn!("Code resolved to {} but pending payload is gone", email);
                return Err(SignupError::InconsistentState(otp.to_string()));
            }
        };

        let hashed = bcrypt::hash(&pending.password, BCRYPT_COST)?;
        let user = self
            .store
            .insert(NewUser {
                name: pending.name,
                email: pending.email,
                password: hashed,
                role: pending.role,
                notification: pending.notification,
            })
            .await?;

        self.cache.delete(otp).await;
        self.cache.delete(&key).await;

        info!("Signup confirmed for {}", user.email);
        Ok(user)
    }

    /// Emails of users opted into notifications, in no guaranteed order.
    /// A false request flag short-circuits to an empty list.
    pub async fn subscribers(&self, request: bool) -> Result<Vec<String>, SignupError> {
        if !request {
            return Ok(Vec::new());
        }

        let users = self.store.find_by_notification(NOTIFICATION_OPT_IN).await?;
        Ok(users.into_iter().map(|user| user.email).collect())
    }

    /// Name and email of the user with the given id.
    pub async fn profile(&self, id: &str) -> Result<Profile, SignupError> {
        let user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| SignupError::NotFound(id.to_string()))?;

        Ok(Profile {
            name: user.name,
            email: user.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserStore;
    use crate::mail::MockMailer;
    use serde_json::json;
    use std::sync::Mutex;

    fn ann() -> PendingSignup {
        PendingSignup {
            name: "Ann".to_string(),
            email: "ann@x.com".to_string(),
            password: "pw1".to_string(),
            role: vec!["user".to_string()],
            notification: "yes".to_string(),
        }
    }

    /// Mock mailer that records every message body.
    fn recording_mailer(bodies: Arc<Mutex<Vec<String>>>) -> MockMailer {
        let mut mailer = MockMailer::new();
        mailer.expect_send().returning(move |_, _, body| {
            bodies.lock().unwrap().push(body.to_string());
            Ok(())
        });
        mailer
    }

    /// The code is only ever surfaced through the mail body.
    fn otp_from_body(body: &str) -> String {
        body.split_whitespace()
            .map(|word| word.trim_matches('.'))
            .find(|word| word.len() == 4 && word.chars().all(|c| c.is_ascii_digit()))
            .expect("mail body should carry a 4-digit code")
            .to_string()
    }

    fn service_with(
        store: Arc<dyn UserStore>,
        mailer: MockMailer,
        ttl: Duration,
    ) -> SignupService {
        SignupService::new(store, TtlCache::new(), Arc::new(mailer), ttl)
    }

    #[tokio::test]
    async fn initiate_stages_pair_and_sends_mail() {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let service = service_with(
            Arc::new(MemoryUserStore::new()),
            recording_mailer(bodies.clone()),
            OTP_TTL,
        );

        let message = service.initiate_signup(ann()).await.unwrap();
        assert_eq!(message, SIGNUP_MAIL_SENT);

        let otp = otp_from_body(&bodies.lock().unwrap()[0]);
        assert_eq!(service.cache.get(&otp).await, Some(json!("ann@x.com")));

        let staged = service
            .cache
            .get(&format!("ann@x.com+{otp}"))
            .await
            .expect("payload entry should be staged");
        let staged: PendingSignup = serde_json::from_value(staged).unwrap();
        assert_eq!(staged, ann());
    }

    #[tokio::test]
    async fn initiate_with_registered_email_is_conflict_and_writes_nothing() {
        let store = Arc::new(MemoryUserStore::new());
        store
            .insert(NewUser {
                name: "Ann".to_string(),
                email: "ann@x.com".to_string(),
                password: "hashed".to_string(),
                role: vec!["user".to_string()],
                notification: "yes".to_string(),
            })
            .await
            .unwrap();

        let mut mailer = MockMailer::new();
        mailer.expect_send().times(0);
        let service = service_with(store, mailer, OTP_TTL);

        let err = service.initiate_signup(ann()).await.unwrap_err();
        assert!(matches!(err, SignupError::Conflict(email) if email == "ann@x.com"));
        assert_eq!(service.cache.len().await, 0);
    }

    #[tokio::test]
    async fn mail_failure_propagates() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().returning(|_, _, _| {
            Err(MailError::Rejected {
                status: reqwest::StatusCode::BAD_GATEWAY,
                body: "upstream down".to_string(),
            })
        });
        let service = service_with(Arc::new(MemoryUserStore::new()), mailer, OTP_TTL);

        let err = service.initiate_signup(ann()).await.unwrap_err();
        assert!(matches!(err, SignupError::MailDispatch(_)));
    }

    #[tokio::test]
    async fn confirm_with_unknown_code_is_invalid_otp() {
        let service = service_with(
            Arc::new(MemoryUserStore::new()),
            MockMailer::new(),
            OTP_TTL,
        );

        let err = service.confirm_signup("1234").await.unwrap_err();
        assert!(matches!(err, SignupError::InvalidOtp));
    }

    #[tokio::test]
    async fn confirm_with_expired_code_is_invalid_otp() {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let service = service_with(
            Arc::new(MemoryUserStore::new()),
            recording_mailer(bodies.clone()),
            Duration::from_millis(20),
        );

        service.initiate_signup(ann()).await.unwrap();
        let otp = otp_from_body(&bodies.lock().unwrap()[0]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = service.confirm_signup(&otp).await.unwrap_err();
        assert!(matches!(err, SignupError::InvalidOtp));
    }

    #[tokio::test]
    async fn confirm_persists_user_with_hashed_password() {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryUserStore::new());
        let service = service_with(store.clone(), recording_mailer(bodies.clone()), OTP_TTL);

        service.initiate_signup(ann()).await.unwrap();
        let otp = otp_from_body(&bodies.lock().unwrap()[0]);

        let user = service.confirm_signup(&otp).await.unwrap();
        assert_eq!(user.name, "Ann");
        assert_eq!(user.email, "ann@x.com");
        assert_eq!(user.role, vec!["user".to_string()]);
        assert_eq!(user.notification, "yes");
        assert_ne!(user.password, "pw1");
        assert!(bcrypt::verify("pw1", &user.password).unwrap());

        let stored = store.find_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(stored, user);
    }

    #[tokio::test]
    async fn confirm_consumes_the_code() {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let service = service_with(
            Arc::new(MemoryUserStore::new()),
            recording_mailer(bodies.clone()),
            OTP_TTL,
        );

        service.initiate_signup(ann()).await.unwrap();
        let otp = otp_from_body(&bodies.lock().unwrap()[0]);

        service.confirm_signup(&otp).await.unwrap();
        assert_eq!(service.cache.len().await, 0);

        // Replay loses: both entries are gone.
        let err = service.confirm_signup(&otp).await.unwrap_err();
        assert!(matches!(err, SignupError::InvalidOtp));
    }

    #[tokio::test]
    async fn missing_payload_after_email_hit_is_inconsistent_state() {
        let service = service_with(
            Arc::new(MemoryUserStore::new()),
            MockMailer::new(),
            OTP_TTL,
        );

        // Stage only the otp -> email half of the pair.
        service
            .cache
            .set("4821", json!("ann@x.com"), OTP_TTL)
            .await;

        let err = service.confirm_signup("4821").await.unwrap_err();
        assert!(matches!(err, SignupError::InconsistentState(_)));
    }

    #[tokio::test]
    async fn subscribers_returns_opted_in_emails() {
        let store = Arc::new(MemoryUserStore::new());
        for (email, flag) in [("ann@x.com", "yes"), ("bob@x.com", "no"), ("cat@x.com", "yes")] {
            store
                .insert(NewUser {
                    name: email.to_string(),
                    email: email.to_string(),
                    password: "hashed".to_string(),
                    role: vec!["user".to_string()],
                    notification: flag.to_string(),
                })
                .await
                .unwrap();
        }
        let service = service_with(store, MockMailer::new(), OTP_TTL);

        let mut emails = service.subscribers(true).await.unwrap();
        emails.sort();
        assert_eq!(emails, vec!["ann@x.com", "cat@x.com"]);
    }

    #[tokio::test]
    async fn subscribers_with_false_flag_is_empty() {
        let service = service_with(
            Arc::new(MemoryUserStore::new()),
            MockMailer::new(),
            OTP_TTL,
        );

        assert!(service.subscribers(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn profile_returns_name_and_email_only() {
        let store = Arc::new(MemoryUserStore::new());
        let saved = store
            .insert(NewUser {
                name: "Ann".to_string(),
                email: "ann@x.com".to_string(),
                password: "hashed".to_string(),
                role: vec!["user".to_string()],
                notification: "yes".to_string(),
            })
            .await
            .unwrap();
        let service = service_with(store, MockMailer::new(), OTP_TTL);

        let profile = service.profile(&saved.id).await.unwrap();
        assert_eq!(
            profile,
            Profile {
                name: "Ann".to_string(),
                email: "ann@x.com".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn profile_for_unknown_id_is_not_found() {
        let service = service_with(
            Arc::new(MemoryUserStore::new()),
            MockMailer::new(),
            OTP_TTL,
        );

        let err = service.profile("missing").await.unwrap_err();
        assert!(matches!(err, SignupError::NotFound(id) if id == "missing"));
    }

    #[test]
    fn generated_otp_is_four_digits_in_range() {
        for _ in 0..100 {
            let otp = SignupService::generate_otp();
            assert_eq!(otp.len(), 4);
            let value: u32 = otp.parse().unwrap();
            assert!((1000..=9999).contains(&value));
        }
    }
}
