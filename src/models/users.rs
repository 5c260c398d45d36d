use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<UserRole> {
        match value {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub password_salt: String,
    pub role: String,
    pub balance: i64,
    pub reserved_balance: i64,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub referral_earned: i64,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl User {
    pub fn available_balance(&self) -> i64 {
        self.balance - self.reserved_balance
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin.as_str()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub referral_code: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub balance: i64,
    pub reserved_balance: i64,
    pub available_balance: i64,
    pub referral_code: String,
    pub referral_earned: i64,
    pub created_at: chrono::NaiveDateTime,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        let available_balance = user.available_balance();

        Profile {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            balance: user.balance,
            reserved_balance: user.reserved_balance,
            available_balance,
            referral_code: user.referral_code,
            referral_earned: user.referral_earned,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u-1".to_string(),
            username: "hoang_dev".to_string(),
            email: "hoang@example.com".to_string(),
            password_hash: "abc".to_string(),
            password_salt: "salt".to_string(),
            role: "user".to_string(),
            balance: 20_000,
            reserved_balance: 5_000,
            referral_code: "a1b2c3d4".to_string(),
            referred_by: None,
            referral_earned: 0,
            created_at: chrono::NaiveDateTime::default(),
            updated_at: chrono::NaiveDateTime::default(),
        }
    }

    #[test]
    fn available_balance_subtracts_reserved() {
        let user = sample_user();
        assert_eq!(user.available_balance(), 15_000);

        let profile = Profile::from(user);
        assert_eq!(profile.available_balance, 15_000);
        assert_eq!(profile.balance, 20_000);
    }

    #[test]
    fn role_parsing_rejects_unknown_values() {
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("user"), Some(UserRole::User));
        assert_eq!(UserRole::parse("ADMIN"), None);
        assert_eq!(UserRole::parse(""), None);
    }

    #[test]
    fn admin_check_uses_role_column_only() {
        let mut user = sample_user();
        assert!(!user.is_admin());

        // Username must never grant privileges.
        user.username = "admin".to_string();
        assert!(!user.is_admin());

        user.role = "admin".to_string();
        assert!(user.is_admin());
    }
}
