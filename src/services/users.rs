use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::sessions::{Session, SessionStore};
use super::{RequestHandler, Service, ServiceError};
use crate::models::users::{NewUser, Profile};
use crate::repositories::users::UserRepository;

pub enum UserRequest {
    Register {
        new_user: NewUser,
        response: oneshot::Sender<Result<Profile, ServiceError>>,
    },
    Login {
        email: String,
        password: String,
        response: oneshot::Sender<Result<(Session, Profile), ServiceError>>,
    },
    Logout {
        token: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    GetProfile {
        user_id: String,
        response: oneshot::Sender<Result<Profile, ServiceError>>,
    },
    ListUsers {
        response: oneshot::Sender<Result<Vec<Profile>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
    sessions: Arc<SessionStore>,
}

fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_password(password: &str, salt: &str) -> String {
    let digest = Sha256::digest(format!("{}{}", salt, password).as_bytes());
    hex::encode(digest)
}

fn validate_registration(new_user: &NewUser) -> Result<(), String> {
    if new_user.username.trim().len() < 3 {
        return Err("username must be at least 3 characters".to_string());
    }
    if !new_user.email.contains('@') {
        return Err("email address is not valid".to_string());
    }
    if new_user.password.len() < 6 {
        return Err("password must be at least 6 characters".to_string());
    }
    Ok(())
}

impl UserRequestHandler {
    pub fn new(sql_conn: PgPool, sessions: Arc<SessionStore>) -> Self {
        let repository = UserRepository::new(sql_conn);

        UserRequestHandler {
            repository,
            sessions,
        }
    }

    async fn register(&self, new_user: NewUser) -> Result<Profile, ServiceError> {
        validate_registration(&new_user).map_err(ServiceError::Validation)?;

        let salt = generate_salt();
        let hash = hash_password(&new_user.password, &salt);

        let user = self
            .repository
            .insert_user(
                new_user.username.trim(),
                new_user.email.trim(),
                &hash,
                &salt,
                new_user.referral_code.as_deref(),
            )
            .await
            .map_err(|e| {
                if e.to_string() == "UsernameOrEmailTaken" {
                    ServiceError::Conflict("username or email is already taken".to_string())
                } else {
                    ServiceError::Database(e.to_string())
                }
            })?;

        log::info!("registered user {} ({})", user.username, user.id);
        Ok(Profile::from(user))
    }

    async fn login(&self, email: &str, password: &str) -> Result<(Session, Profile), ServiceError> {
        let user = self
            .repository
            .get_user_by_email(email.trim())
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::Unauthorized("invalid credentials".to_string()))?;

        if hash_password(password, &user.password_salt) != user.password_hash {
            return Err(ServiceError::Unauthorized("invalid credentials".to_string()));
        }

        let session = self.sessions.create(&user);
        log::info!("user {} logged in", user.username);

        Ok((session, Profile::from(user)))
    }

    async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        if !self.sessions.destroy(token) {
            return Err(ServiceError::Unauthorized("session not found".to_string()));
        }
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, ServiceError> {
        let user = self
            .repository
            .get_user_by_id(user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", user_id)))?;

        Ok(Profile::from(user))
    }

    async fn list_users(&self) -> Result<Vec<Profile>, ServiceError> {
        let users = self
            .repository
            .list_users()
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        Ok(users.into_iter().map(Profile::from).collect())
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Register { new_user, response } => {
                let result = self.register(new_user).await;
                let _ = response.send(result);
            }
            UserRequest::Login {
                email,
                password,
                response,
            } => {
                let result = self.login(&email, &password).await;
                let _ = response.send(result);
            }
            UserRequest::Logout { token, response } => {
                let result = self.logout(&token).await;
                let _ = response.send(result);
            }
            UserRequest::GetProfile { user_id, response } => {
                let result = self.get_profile(&user_id).await;
                let _ = response.send(result);
            }
            UserRequest::ListUsers { response } => {
                let result = self.list_users().await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_depends_on_salt() {
        let first = hash_password("hunter22", "aaaa");
        let second = hash_password("hunter22", "bbbb");
        assert_ne!(first, second);
        assert_eq!(first, hash_password("hunter22", "aaaa"));
    }

    #[test]
    fn generated_salts_differ() {
        assert_ne!(generate_salt(), generate_salt());
        assert_eq!(generate_salt().len(), 32);
    }

    #[test]
    fn registration_validation() {
        let valid = NewUser {
            username: "hoang_dev".to_string(),
            email: "hoang@example.com".to_string(),
            password: "secret1".to_string(),
            referral_code: None,
        };
        assert!(validate_registration(&valid).is_ok());

        let mut short_name = valid.clone();
        short_name.username = "ab".to_string();
        assert!(validate_registration(&short_name).is_err());

        let mut bad_email = valid.clone();
        bad_email.email = "not-an-email".to_string();
        assert!(validate_registration(&bad_email).is_err());

        let mut weak_password = valid;
        weak_password.password = "12345".to_string();
        assert!(validate_registration(&weak_password).is_err());
    }
}
