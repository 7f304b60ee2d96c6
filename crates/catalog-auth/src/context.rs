//! Request-scoped identity
//!
//! The identity for a request lives in Tokio task-local storage for the
//! duration of [`IdentityContext::scope`]. Code running inside the scope
//! (on the same task) can read and replace it; anything outside sees no
//! binding at all. The slot is dropped with the scope, whether the wrapped
//! future completes, returns an error or panics.

use catalog_db::User;
use std::cell::RefCell;
use std::future::Future;

use crate::error::AuthError;

tokio::task_local! {
    static CURRENT_IDENTITY: RefCell<Option<User>>;
}

/// Accessor for the identity bound to the current task
pub struct IdentityContext;

impl IdentityContext {
    /// Run `future` with a fresh, empty identity slot
    pub async fn scope<F>(future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_IDENTITY.scope(RefCell::new(None), future).await
    }

    /// Whether the current task runs inside a scope
    pub fn is_bound() -> bool {
        CURRENT_IDENTITY.try_with(|_| ()).is_ok()
    }

    /// The bound identity, if any
    pub fn get() -> Option<User> {
        CURRENT_IDENTITY
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    /// Bind `user` as the current identity
    pub fn set(user: User) -> Result<(), AuthError> {
        CURRENT_IDENTITY
            .try_with(|slot| {
                *slot.borrow_mut() = Some(user);
            })
            .map_err(|_| AuthError::ContextUnbound)
    }

    /// Empty the slot; does nothing outside a scope
    pub fn clear() {
        let _ = CURRENT_IDENTITY.try_with(|slot| slot.borrow_mut().take());
    }

    /// The bound identity, or `ContextUnbound` when none is set
    pub fn get_or_fail() -> Result<User, AuthError> {
        Self::get().ok_or(AuthError::ContextUnbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_db::UserRole;

    fn user(name: &str, role: UserRole) -> User {
        let mut user = User::anonymous();
        user.username = name.to_string();
        user.role = role;
        user
    }

    #[tokio::test]
    async fn test_outside_scope() {
        assert!(!IdentityContext::is_bound());
        assert!(IdentityContext::get().is_none());
        assert!(matches!(
            IdentityContext::set(user("admin", UserRole::Admin)),
            Err(AuthError::ContextUnbound)
        ));
        assert!(matches!(
            IdentityContext::get_or_fail(),
            Err(AuthError::ContextUnbound)
        ));
        IdentityContext::clear();
    }

    #[tokio::test]
    async fn test_set_get_clear_inside_scope() {
        IdentityContext::scope(async {
            assert!(IdentityContext::is_bound());
            assert!(IdentityContext::get().is_none());
            assert!(IdentityContext::get_or_fail().is_err());

            IdentityContext::set(user("admin", UserRole::Admin)).unwrap();
            assert_eq!(IdentityContext::get_or_fail().unwrap().username, "admin");

            IdentityContext::set(User::anonymous()).unwrap();
            assert!(IdentityContext::get().unwrap().is_anonymous());

            IdentityContext::clear();
            assert!(IdentityContext::get().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn test_binding_does_not_outlive_scope() {
        let result: Result<(), &str> = IdentityContext::scope(async {
            IdentityContext::set(user("admin", UserRole::Admin)).unwrap();
            Err("handler failed")
        })
        .await;

        assert!(result.is_err());
        assert!(IdentityContext::get().is_none());

        IdentityContext::scope(async {
            assert!(IdentityContext::get().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn test_binding_does_not_survive_panic() {
        let handle = tokio::spawn(IdentityContext::scope(async {
            IdentityContext::set(user("admin", UserRole::Admin)).unwrap();
            if IdentityContext::get().is_some() {
                panic!("handler panicked");
            }
        }));
        let err = handle.await.unwrap_err();
        assert!(err.is_panic());

        let after = tokio::spawn(IdentityContext::scope(async { IdentityContext::get() }))
            .await
            .unwrap();
        assert!(after.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scopes_are_isolated() {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                tokio::spawn(IdentityContext::scope(async move {
                    let name = format!("user{}", i);
                    IdentityContext::set(user(&name, UserRole::User)).unwrap();
                    for _ in 0..10 {
                        tokio::task::yield_now().await;
                        assert_eq!(IdentityContext::get().unwrap().username, name);
                    }
                }))
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
