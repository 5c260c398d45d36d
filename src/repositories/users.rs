use crate::models::users::{User, UserRole};

use anyhow::bail;
use sqlx::PgPool;
use uuid::Uuid;

/// Unique violations on these constraints mean the caller picked a taken
/// username or email; anything else (e.g. a freak referral-code collision)
/// stays a plain database error.
fn is_identity_conflict(constraint: Option<&str>) -> bool {
    matches!(
        constraint,
        Some("users_username_key") | Some("users_email_key")
    )
}

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        UserRepository { conn }
    }

    /// Creates an account. Username/email uniqueness is enforced by the
    /// database constraints, so two racing registrations both resolve to
    /// `UsernameOrEmailTaken` for the loser. The referral code, if given, is
    /// resolved to the referring user exactly once here; `referred_by` is
    /// never updated afterwards. Role is always 'user' - admins are
    /// provisioned directly in the database.
    pub async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        password_salt: &str,
        referral_code: Option<&str>,
    ) -> Result<User, anyhow::Error> {
        let referred_by: Option<String> = match referral_code {
            Some(code) => {
                sqlx::query_scalar("SELECT id FROM users WHERE referral_code = $1")
                    .bind(code)
                    .fetch_optional(&self.conn)
                    .await?
            }
            None => None,
        };

        let user_id = Uuid::new_v4().hyphenated().to_string();
        let own_code = Uuid::new_v4().simple().to_string()[..8].to_string();

        let inserted = sqlx::query_as::<_, User>(
            r#"
                INSERT INTO users
                (id, username, email, password_hash, password_salt, role, referral_code, referred_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
            "#,
        )
        .bind(&user_id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(password_salt)
        .bind(UserRole::User.as_str())
        .bind(&own_code)
        .bind(&referred_by)
        .fetch_one(&self.conn)
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db))
                if db.is_unique_violation() && is_identity_conflict(db.constraint()) =>
            {
                bail!("UsernameOrEmailTaken")
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, anyhow::Error> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.conn)
            .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_conflicts_map_by_constraint_name() {
        assert!(is_identity_conflict(Some("users_username_key")));
        assert!(is_identity_conflict(Some("users_email_key")));
        assert!(!is_identity_conflict(Some("users_referral_code_key")));
        assert!(!is_identity_conflict(None));
    }

    #[sqlx::test]
    async fn duplicate_registration_is_a_taken_conflict(pool: PgPool) {
        let repository = UserRepository::new(pool);

        repository
            .insert_user("tuan", "tuan@example.com", "h", "s", None)
            .await
            .unwrap();

        // Same username, different email: the constraint decides, not a
        // read-then-insert check that a concurrent registration could slip
        // past.
        let err = repository
            .insert_user("tuan", "tuan2@example.com", "h", "s", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "UsernameOrEmailTaken");

        let err = repository
            .insert_user("tuan2", "tuan@example.com", "h", "s", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "UsernameOrEmailTaken");
    }
}
