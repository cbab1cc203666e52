use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::UserStore,
        repo_types::{NewUser, Role, User},
    },
    error::{ServiceError, ServiceResult, StoreError},
};

const INVALID_CREDENTIALS: &str = "invalid email or password";
const ACCOUNT_DISABLED: &str = "account is disabled";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_name(field: &str, value: &str) -> ServiceResult<()> {
    let len = value.trim().chars().count();
    if !(2..=50).contains(&len) {
        return Err(ServiceError::invalid(format!(
            "{field} must be between 2 and 50 characters"
        )));
    }
    Ok(())
}

pub struct UserService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, mut req: RegisterRequest) -> ServiceResult<AuthResponse> {
        req.email = req.email.trim().to_lowercase();

        if !is_valid_email(&req.email) {
            warn!("invalid email");
            return Err(ServiceError::invalid("invalid email"));
        }
        if req.password.len() < 8 {
            return Err(ServiceError::invalid("password must be at least 8 characters"));
        }
        check_name("first name", &req.first_name)?;
        check_name("last name", &req.last_name)?;
        if req.role == Role::Admin {
            return Err(ServiceError::invalid("role must be guest or host"));
        }

        let existing = self
            .users
            .get_by_email(&req.email)
            .await
            .map_err(ServiceError::store("failed to check existing user"))?;
        if existing.is_some() {
            warn!("email already registered");
            return Err(ServiceError::conflict("user with this email already exists"));
        }

        let password_hash = hash_password(&req.password).map_err(|e| {
            error!(error = %e, "hash_password failed");
            ServiceError::invalid("password could not be processed")
        })?;

        let user = self
            .users
            .create(NewUser {
                email: req.email,
                password_hash,
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                phone: req.phone,
                role: req.role,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => {
                    ServiceError::conflict("user with this email already exists")
                }
                other => ServiceError::store("failed to create user")(other),
            })?;

        info!(user_id = %user.id, role = ?user.role, "user registered");
        self.issue(&user)
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, mut req: LoginRequest) -> ServiceResult<AuthResponse> {
        req.email = req.email.trim().to_lowercase();

        let user = self
            .users
            .get_by_email(&req.email)
            .await
            .map_err(ServiceError::store("failed to get user by email"))?
            .ok_or_else(|| {
                warn!("login unknown email");
                ServiceError::Unauthorized(INVALID_CREDENTIALS.into())
            })?;

        let ok = verify_password(&req.password, &user.password_hash).unwrap_or_else(|e| {
            error!(error = %e, user_id = %user.id, "verify_password failed");
            false
        });
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        if !user.is_active {
            return Err(ServiceError::forbidden(ACCOUNT_DISABLED));
        }

        info!(user_id = %user.id, "user logged in");
        self.issue(&user)
    }

    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<AuthResponse> {
        let claims = self
            .keys
            .verify_refresh(refresh_token)
            .map_err(|_| ServiceError::Unauthorized("invalid refresh token".into()))?;

        let user = self
            .users
            .get(claims.sub)
            .await
            .map_err(ServiceError::store("failed to get user"))?
            .ok_or_else(|| ServiceError::Unauthorized("user not found".into()))?;
        if !user.is_active {
            return Err(ServiceError::forbidden(ACCOUNT_DISABLED));
        }

        self.issue(&user)
    }

    #[instrument(skip(self))]
    pub async fn me(&self, user_id: Uuid) -> ServiceResult<PublicUser> {
        let user = self
            .users
            .get(user_id)
            .await
            .map_err(ServiceError::store("failed to get user"))?
            .ok_or_else(|| ServiceError::not_found("user not found"))?;
        Ok(PublicUser::from(&user))
    }

    fn issue(&self, user: &User) -> ServiceResult<AuthResponse> {
        let sign_failed = |e: anyhow::Error| {
            error!(error = %e, user_id = %user.id, "jwt sign failed");
            ServiceError::Unauthorized("could not issue token".into())
        };
        let access_token = self.keys.sign_access(user.id, user.role).map_err(sign_failed)?;
        let refresh_token = self
            .keys
            .sign_refresh(user.id, user.role)
            .map_err(sign_failed)?;
        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: PublicUser::from(user),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::JwtConfig, memory::MemoryStore};

    fn service() -> (UserService, MemoryStore) {
        let store = MemoryStore::default();
        let keys = JwtKeys::from(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test".into(),
            audience: "test".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        });
        (UserService::new(Arc::new(store.clone()), keys), store)
    }

    fn register_req(email: &str, role: Role) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "correct-horse".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone: None,
            role,
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("guest@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[tokio::test]
    async fn register_normalizes_email_and_rejects_duplicates() {
        let (svc, _) = service();
        let res = svc
            .register(register_req("  Ada@Example.COM ", Role::Host))
            .await
            .unwrap();
        assert_eq!(res.user.email, "ada@example.com");
        assert_eq!(res.user.role, Role::Host);

        let err = svc
            .register(register_req("ada@example.com", Role::Guest))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_refuses_admin_role() {
        let (svc, _) = service();
        let err = svc
            .register(register_req("root@example.com", Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn login_and_refresh() {
        let (svc, _) = service();
        svc.register(register_req("guest@example.com", Role::Guest))
            .await
            .unwrap();

        let err = svc
            .login(LoginRequest {
                email: "guest@example.com".into(),
                password: "wrong-password".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);

        let res = svc
            .login(LoginRequest {
                email: "GUEST@example.com".into(),
                password: "correct-horse".into(),
            })
            .await
            .unwrap();
        let refreshed = svc.refresh(&res.refresh_token).await.unwrap();
        assert_eq!(refreshed.user.id, res.user.id);

        let err = svc.refresh(&res.access_token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn disabled_accounts_cannot_log_in() {
        let (svc, store) = service();
        let res = svc
            .register(register_req("gone@example.com", Role::Guest))
            .await
            .unwrap();
        store.set_user_active(res.user.id, false);

        let err = svc
            .login(LoginRequest {
                email: "gone@example.com".into(),
                password: "correct-horse".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), ACCOUNT_DISABLED);
    }
}
