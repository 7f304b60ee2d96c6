//! Login, logout and role checks

use catalog_db::{ANONYMOUS_USERNAME, NewUser, User, UserRole};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attempts::{AttemptReservation, LoginAttemptTracker};
use crate::audit::{AuditEventKind, AuditSink};
use crate::context::IdentityContext;
use crate::error::AuthError;
use crate::password::{DUMMY_HASH, PasswordError, PasswordHasher};
use crate::store::UserStore;

pub const MSG_MISSING_CREDENTIALS: &str = "Login requires username and password";
pub const MSG_ACCOUNT_LOCKED: &str = "Login failed: account locked due to too many attempts";
pub const MSG_INVALID_CREDENTIALS: &str = "Login failed: invalid username or password";
pub const MSG_LOGIN_SUCCESS: &str = "Login successful";

/// Username reported when no identity context is bound
const UNKNOWN_USERNAME: &str = "unknown";

/// Outcome of a login attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResult {
    pub success: bool,
    pub message: String,
}

impl LoginResult {
    fn succeeded() -> Self {
        Self {
            success: true,
            message: MSG_LOGIN_SUCCESS.to_string(),
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    audit: Arc<dyn AuditSink>,
    hasher: PasswordHasher,
    tracker: Arc<LoginAttemptTracker>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        audit: Arc<dyn AuditSink>,
        hasher: PasswordHasher,
        tracker: Arc<LoginAttemptTracker>,
    ) -> Self {
        Self {
            store,
            audit,
            hasher,
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<LoginAttemptTracker> {
        &self.tracker
    }

    pub fn hasher(&self) -> PasswordHasher {
        self.hasher
    }

    // ==================== Login / Logout ====================

    /// Authenticate `username` and bind it as the current identity
    ///
    /// Credential problems are reported through [`LoginResult`]; `Err` is
    /// reserved for store failures, hashing failures and a missing
    /// identity scope.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Ok(LoginResult::failed(MSG_MISSING_CREDENTIALS));
        }

        let Some(reservation) = self.tracker.reserve(username) else {
            return Ok(self.reject_locked(username));
        };

        debug!("Login attempt for user: {}", username);

        // Always run a full verification so both failure paths cost the same
        let user = self.store.find_by_username(username).await?;
        let stored = match &user {
            Some(u) => u.password_hash.clone(),
            None => DUMMY_HASH.to_string(),
        };
        let password_valid = self.verify_blocking(password, stored).await?;

        let user = match (user, password_valid) {
            (Some(u), true) => u,
            (None, _) => {
                self.reject(reservation, username, "user not found");
                return Ok(LoginResult::failed(MSG_INVALID_CREDENTIALS));
            }
            (Some(_), false) => {
                self.reject(reservation, username, "invalid password");
                return Ok(LoginResult::failed(MSG_INVALID_CREDENTIALS));
            }
        };

        // Failures from concurrent attempts may have locked the account
        if !reservation.succeed() {
            return Ok(self.reject_locked(username));
        }
        IdentityContext::set(user)?;
        self.audit
            .record(username, AuditEventKind::LoginSuccess, MSG_LOGIN_SUCCESS);
        metrics::counter!("catalog_login_attempts_total", "outcome" => "success").increment(1);

        info!("User {} logged in successfully", username);
        Ok(LoginResult::succeeded())
    }

    fn reject_locked(&self, username: &str) -> LoginResult {
        warn!("Login rejected for locked account: {}", username);
        self.audit
            .record(username, AuditEventKind::LoginFailure, "account locked");
        metrics::counter!("catalog_login_attempts_total", "outcome" => "locked").increment(1);
        LoginResult::failed(MSG_ACCOUNT_LOCKED)
    }

    fn reject(&self, reservation: AttemptReservation<'_>, username: &str, detail: &str) {
        let count = reservation.fail();
        debug!("Login failed for {} ({}), {} failures", username, detail, count);
        self.audit
            .record(username, AuditEventKind::LoginFailure, detail);
        metrics::counter!("catalog_login_attempts_total", "outcome" => "failure").increment(1);
    }

    async fn verify_blocking(&self, password: &str, stored: String) -> Result<bool, AuthError> {
        let hasher = self.hasher;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| AuthError::Password(PasswordError::Hashing(e.to_string())))
    }

    /// Drop back to the anonymous identity
    ///
    /// Does nothing when no authenticated identity is bound.
    pub fn logout(&self) {
        match IdentityContext::get() {
            Some(user) if user.role.is_authenticated() => {
                if IdentityContext::set(User::anonymous()).is_ok() {
                    self.audit
                        .record(&user.username, AuditEventKind::Logout, "Logout");
                    info!("User {} logged out", user.username);
                }
            }
            _ => debug!("Logout requested without an authenticated identity"),
        }
    }

    // ==================== Role Checks ====================

    /// Fail with `AccessDenied` unless the current identity is an admin
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.is_admin() {
            return Ok(());
        }
        self.record_denial("administrator role required");
        Err(AuthError::AccessDenied)
    }

    /// Audit an access denial under the current username
    pub fn record_denial(&self, detail: &str) {
        let username = self.current_username();
        warn!("Access denied for {}: {}", username, detail);
        self.audit
            .record(&username, AuditEventKind::AccessDenied, detail);
        metrics::counter!("catalog_access_denied_total").increment(1);
    }

    pub fn is_admin(&self) -> bool {
        IdentityContext::get()
            .map(|user| user.role.is_admin())
            .unwrap_or(false)
    }

    pub fn is_authenticated(&self) -> bool {
        IdentityContext::get()
            .map(|user| user.role.is_authenticated())
            .unwrap_or(false)
    }

    /// Username of the current identity; never empty
    pub fn current_username(&self) -> String {
        match IdentityContext::get() {
            Some(user) if user.is_anonymous() => ANONYMOUS_USERNAME.to_string(),
            Some(user) if !user.username.is_empty() => user.username,
            _ => UNKNOWN_USERNAME.to_string(),
        }
    }

    pub fn current_user(&self) -> Result<User, AuthError> {
        IdentityContext::get_or_fail()
    }

    // ==================== Provisioning ====================

    /// Create an account with a policy-checked, hashed password
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        if role == UserRole::Anonymous {
            return Err(AuthError::InvalidRole(role.to_string()));
        }
        if username.is_empty() || username.eq_ignore_ascii_case(ANONYMOUS_USERNAME) {
            return Err(AuthError::InvalidUsername(username.to_string()));
        }

        let hasher = self.hasher;
        let candidate = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&candidate))
            .await
            .map_err(|e| AuthError::Password(PasswordError::Hashing(e.to_string())))??;

        let user = self
            .store
            .save(NewUser {
                username: username.to_string(),
                password_hash,
                role,
            })
            .await?;

        info!("Registered user {} with role {}", user.username, user.role);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempts::{LockoutPolicy, ManualClock};
    use crate::audit::RecordingAuditSink;
    use crate::password::PasswordPolicyViolation;
    use catalog_db::Database;
    use chrono::Duration;

    struct Fixture {
        service: AuthService,
        audit: Arc<RecordingAuditSink>,
        clock: Arc<ManualClock>,
    }

    async fn fixture() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let audit = Arc::new(RecordingAuditSink::new());
        let clock = Arc::new(ManualClock::default());
        let tracker = Arc::new(LoginAttemptTracker::with_clock(
            LockoutPolicy::default(),
            clock.clone(),
        ));
        let service = AuthService::new(
            Arc::new(db),
            audit.clone(),
            PasswordHasher::with_iterations(1_000),
            tracker,
        );

        service
            .register("admin", "Admin123!", UserRole::Admin)
            .await
            .unwrap();
        service
            .register("user", "User123!", UserRole::User)
            .await
            .unwrap();

        Fixture {
            service,
            audit,
            clock,
        }
    }

    #[tokio::test]
    async fn test_login_success_binds_identity() {
        let f = fixture().await;
        IdentityContext::scope(async {
            IdentityContext::set(User::anonymous()).unwrap();

            let result = f.service.login("admin", "Admin123!").await.unwrap();
            assert!(result.success);
            assert_eq!(result.message, MSG_LOGIN_SUCCESS);

            assert!(f.service.is_admin());
            assert!(f.service.is_authenticated());
            assert_eq!(f.service.current_username(), "admin");
            assert_eq!(f.service.current_user().unwrap().role, UserRole::Admin);
        })
        .await;

        let successes = f.audit.events_of(AuditEventKind::LoginSuccess);
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].username, "admin");
    }

    #[tokio::test]
    async fn test_missing_credentials_have_no_side_effects() {
        let f = fixture().await;
        IdentityContext::scope(async {
            for (username, password) in [("", "Admin123!"), ("admin", ""), ("", "")] {
                let result = f.service.login(username, password).await.unwrap();
                assert!(!result.success);
                assert_eq!(result.message, MSG_MISSING_CREDENTIALS);
            }
        })
        .await;

        assert!(f.audit.events().is_empty());
        assert!(f.service.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_identical() {
        let f = fixture().await;
        IdentityContext::scope(async {
            let unknown = f.service.login("ghost", "Whatever1!").await.unwrap();
            let wrong = f.service.login("admin", "Wrong123!").await.unwrap();

            assert!(!unknown.success);
            assert_eq!(unknown, wrong);
            assert_eq!(unknown.message, MSG_INVALID_CREDENTIALS);
        })
        .await;

        let failures = f.audit.events_of(AuditEventKind::LoginFailure);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].detail, "user not found");
        assert_eq!(failures[1].detail, "invalid password");
        assert_eq!(f.service.tracker().failure_count("ghost"), 1);
        assert_eq!(f.service.tracker().failure_count("admin"), 1);
    }

    #[tokio::test]
    async fn test_lockout_rejects_correct_password() {
        let f = fixture().await;
        IdentityContext::scope(async {
            for _ in 0..3 {
                let result = f.service.login("admin", "Wrong123!").await.unwrap();
                assert_eq!(result.message, MSG_INVALID_CREDENTIALS);
            }

            let result = f.service.login("admin", "Admin123!").await.unwrap();
            assert!(!result.success);
            assert_eq!(result.message, MSG_ACCOUNT_LOCKED);
            assert!(IdentityContext::get().is_none());
        })
        .await;

        let failures = f.audit.events_of(AuditEventKind::LoginFailure);
        assert_eq!(failures.last().unwrap().detail, "account locked");
        assert!(f.audit.events_of(AuditEventKind::LoginSuccess).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_guesses_are_capped_by_lockout() {
        let f = fixture().await;

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let service = f.service.clone();
                let password = if i == 10 { "Admin123!" } else { "Wrong123!" };
                tokio::spawn(IdentityContext::scope(async move {
                    service.login("admin", password).await.unwrap()
                }))
            })
            .collect();

        let mut verified = 0;
        for handle in handles {
            let result = handle.await.unwrap();
            if result.message != MSG_ACCOUNT_LOCKED {
                verified += 1;
            }
        }

        assert!(verified >= 1);
        assert!(verified <= 3, "{} guesses reached verification", verified);
        assert!(f.service.tracker().failure_count("admin") <= 3);
        assert!(f.audit.events_of(AuditEventKind::LoginSuccess).len() <= 1);
    }

    #[tokio::test]
    async fn test_lockout_expires_then_success_clears_count() {
        let f = fixture().await;
        IdentityContext::scope(async {
            for _ in 0..3 {
                f.service.login("user", "Wrong123!").await.unwrap();
            }
            assert!(f.service.tracker().is_locked("user"));

            f.clock.advance(Duration::minutes(3) + Duration::seconds(1));

            let result = f.service.login("user", "User123!").await.unwrap();
            assert!(result.success);
            assert_eq!(f.service.tracker().failure_count("user"), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let f = fixture().await;
        IdentityContext::scope(async {
            f.service.login("user", "Wrong123!").await.unwrap();
            f.service.login("user", "Wrong123!").await.unwrap();
            assert_eq!(f.service.tracker().failure_count("user"), 2);

            assert!(f.service.login("user", "User123!").await.unwrap().success);
            assert_eq!(f.service.tracker().failure_count("user"), 0);

            // two more failures are not enough to lock
            f.service.login("user", "Wrong123!").await.unwrap();
            f.service.login("user", "Wrong123!").await.unwrap();
            assert!(!f.service.tracker().is_locked("user"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_login_outside_scope_is_an_error() {
        let f = fixture().await;
        let result = f.service.login("admin", "Admin123!").await;
        assert!(matches!(result, Err(AuthError::ContextUnbound)));
    }

    #[tokio::test]
    async fn test_require_admin_gates_by_role() {
        let f = fixture().await;
        IdentityContext::scope(async {
            IdentityContext::set(User::anonymous()).unwrap();
            assert!(matches!(
                f.service.require_admin(),
                Err(AuthError::AccessDenied)
            ));

            f.service.login("user", "User123!").await.unwrap();
            assert!(matches!(
                f.service.require_admin(),
                Err(AuthError::AccessDenied)
            ));

            f.service.login("admin", "Admin123!").await.unwrap();
            assert!(f.service.require_admin().is_ok());
        })
        .await;

        let denied = f.audit.events_of(AuditEventKind::AccessDenied);
        let names: Vec<_> = denied.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["anonymous", "user"]);
    }

    #[tokio::test]
    async fn test_require_admin_outside_scope() {
        let f = fixture().await;
        assert!(matches!(
            f.service.require_admin(),
            Err(AuthError::AccessDenied)
        ));
        assert_eq!(
            f.audit.events_of(AuditEventKind::AccessDenied)[0].username,
            "unknown"
        );
    }

    #[tokio::test]
    async fn test_logout() {
        let f = fixture().await;
        IdentityContext::scope(async {
            IdentityContext::set(User::anonymous()).unwrap();
            f.service.logout();
            assert!(f.audit.events_of(AuditEventKind::Logout).is_empty());

            f.service.login("user", "User123!").await.unwrap();
            f.service.logout();

            assert!(IdentityContext::get().unwrap().is_anonymous());
            assert!(!f.service.is_authenticated());
            assert_eq!(f.service.current_username(), "anonymous");
        })
        .await;

        let logouts = f.audit.events_of(AuditEventKind::Logout);
        assert_eq!(logouts.len(), 1);
        assert_eq!(logouts[0].username, "user");

        // no scope at all
        f.service.logout();
        assert_eq!(f.audit.events_of(AuditEventKind::Logout).len(), 1);
    }

    #[tokio::test]
    async fn test_current_username_fallbacks() {
        let f = fixture().await;
        assert_eq!(f.service.current_username(), "unknown");
        assert!(!f.service.is_admin());
        assert!(!f.service.is_authenticated());

        IdentityContext::scope(async {
            assert_eq!(f.service.current_username(), "unknown");
            IdentityContext::set(User::anonymous()).unwrap();
            assert_eq!(f.service.current_username(), "anonymous");
        })
        .await;
    }

    #[tokio::test]
    async fn test_register_enforces_policy_and_roles() {
        let f = fixture().await;

        let weak = f.service.register("carol", "carol", UserRole::User).await;
        assert!(matches!(
            weak,
            Err(AuthError::Password(PasswordError::Policy(
                PasswordPolicyViolation::TooShort { min: 8, actual: 5 }
            )))
        ));

        let anon = f
            .service
            .register("carol", "Carol123!", UserRole::Anonymous)
            .await;
        assert!(matches!(anon, Err(AuthError::InvalidRole(_))));

        let reserved = f
            .service
            .register("anonymous", "Carol123!", UserRole::User)
            .await;
        assert!(matches!(reserved, Err(AuthError::InvalidUsername(_))));

        let duplicate = f.service.register("admin", "Admin456!", UserRole::User).await;
        assert!(matches!(duplicate, Err(AuthError::Store(_))));

        let carol = f
            .service
            .register("carol", "Carol123!", UserRole::User)
            .await
            .unwrap();
        assert_eq!(carol.role, UserRole::User);
        assert!(f.service.hasher().verify("Carol123!", &carol.password_hash));
    }
}
