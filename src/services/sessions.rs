use crate::models::users::{User, UserRole};

use dashmap::DashMap;
use uuid::Uuid;

/// One logged-in browser/tab. Created at login, destroyed at logout; the
/// role travels with the session so admin checks never re-derive it from
/// anything client-supplied.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub username: String,
    pub role: UserRole,
    pub created_at: chrono::NaiveDateTime,
}

pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            sessions: DashMap::new(),
        }
    }

    pub fn create(&self, user: &User) -> Session {
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: UserRole::parse(&user.role).unwrap_or(UserRole::User),
            created_at: chrono::Utc::now().naive_utc(),
        };

        self.sessions.insert(session.token.clone(), session.clone());
        session
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    pub fn destroy(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: &str) -> User {
        User {
            id: "u-1".to_string(),
            username: "minh_tran".to_string(),
            email: "minh@example.com".to_string(),
            password_hash: String::new(),
            password_salt: String::new(),
            role: role.to_string(),
            balance: 0,
            reserved_balance: 0,
            referral_code: "c0ffee00".to_string(),
            referred_by: None,
            referral_earned: 0,
            created_at: chrono::NaiveDateTime::default(),
            updated_at: chrono::NaiveDateTime::default(),
        }
    }

    #[test]
    fn session_lifecycle() {
        let store = SessionStore::new();
        let session = store.create(&user_with_role("user"));

        let found = store.get(&session.token).expect("session should exist");
        assert_eq!(found.user_id, "u-1");
        assert_eq!(found.role, UserRole::User);

        assert!(store.destroy(&session.token));
        assert!(store.get(&session.token).is_none());
        assert!(!store.destroy(&session.token));
    }

    #[test]
    fn admin_role_is_carried_into_the_session() {
        let store = SessionStore::new();
        let session = store.create(&user_with_role("admin"));
        assert_eq!(store.get(&session.token).unwrap().role, UserRole::Admin);
    }

    #[test]
    fn unknown_role_degrades_to_user() {
        let store = SessionStore::new();
        let session = store.create(&user_with_role("superadmin"));
        assert_eq!(session.role, UserRole::User);
    }

    #[test]
    fn tokens_are_unique_per_login() {
        let store = SessionStore::new();
        let user = user_with_role("user");
        let first = store.create(&user);
        let second = store.create(&user);
        assert_ne!(first.token, second.token);
        assert!(store.get(&first.token).is_some());
        assert!(store.get(&second.token).is_some());
    }
}
