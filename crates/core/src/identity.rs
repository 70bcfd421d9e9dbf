use crate::domain::prediction::CurrentUser;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

pub type LogoutHandler = Arc<dyn Fn() + Send + Sync>;

pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;

    fn on_logout(&self, handler: LogoutHandler);
}

#[derive(Default)]
pub struct SessionIdentity {
    user: RwLock<Option<CurrentUser>>,
    handlers: Mutex<Vec<LogoutHandler>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: CurrentUser) -> Self {
        Self {
            user: RwLock::new(Some(user)),
            handlers: Mutex::default(),
        }
    }

    pub fn login(&self, user: CurrentUser) {
        tracing::info!(user_id = %user.id, role = ?user.role, "session login");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn logout(&self) {
        let previous = self
            .user
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // Handlers run outside the lock so they may call back into this provider.
        let handlers: Vec<LogoutHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        tracing::info!(
            user_id = previous.as_ref().map(|u| u.id.as_str()),
            handlers = handlers.len(),
            "session logout"
        );
        for handler in handlers {
            handler();
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<CurrentUser> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn on_logout(&self, handler: LogoutHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prediction::Role;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn logout_clears_user_and_notifies_handlers() {
        let identity = SessionIdentity::with_user(CurrentUser::new("u-1", Some(Role::User)));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        identity.on_logout(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(identity.current_user().map(|u| u.id), Some("u-1".to_string()));
        identity.logout();
        assert!(identity.current_user().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn login_replaces_user() {
        let identity = SessionIdentity::new();
        assert!(identity.current_user().is_none());
        identity.login(CurrentUser::new("u-2", Some(Role::OrgAdmin)));
        assert_eq!(
            identity.current_user().and_then(|u| u.role),
            Some(Role::OrgAdmin)
        );
    }
}
