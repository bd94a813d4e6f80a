//! Registration, authentication and self-service account operations.
//!
//! Everything here is keyed on the actor's own id; there is no path that
//! reads or writes another user's account.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{Engine, EngineError, EngineResult, Issues};
use crate::auth::password::PasswordService;
use crate::helpers::{double_option, non_blank, now};
use crate::models::{NewUser, User, UserChanges, UserRole};
use crate::store::{StoreError, UserStats};

pub const USER_SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterInput {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "securepassword123", min_length = 8)]
    pub password: String,
    #[validate(length(max = 255, message = "Full name must be at most 255 characters"))]
    #[schema(example = "Jane Doe")]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginInput {
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "securepassword123")]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileInput {
    /// `null` clears the name; omitting the field leaves it unchanged.
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 255, message = "Full name must be at most 255 characters"))]
    #[schema(value_type = Option<String>, example = "Jane Doe")]
    pub full_name: Option<Option<String>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// What other users get to see of someone.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub full_name: Option<String>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Engine {
    fn hash_password(&self, password: &str) -> EngineResult<String> {
        self.passwords
            .hash(password)
            .map_err(|e| EngineError::Internal(format!("password hashing failed: {}", e)))
    }

    fn check_password_policy(&self, issues: &mut Issues, field: &str, password: &str) {
        if let Err(e) = self.password_policy.validate(password) {
            issues.add(field, e.code(), e.to_string());
        }
    }

    pub fn register(&self, input: RegisterInput) -> EngineResult<User> {
        let mut issues = Issues::check(&input);
        self.check_password_policy(&mut issues, "password", &input.password);
        issues.into_result()?;

        let email = normalize_email(&input.email);
        if self.store.find_user_by_email(&email)?.is_some() {
            warn!(email = %email, "Registration attempted with existing email");
            return Err(email_taken());
        }

        let new_user = NewUser {
            email,
            password_hash: self.hash_password(&input.password)?,
            full_name: non_blank(input.full_name.as_deref()),
            role: UserRole::User,
        };

        let user = self.store.insert_user(new_user).map_err(|e| match e {
            StoreError::UniqueViolation(_) => email_taken(),
            other => other.into(),
        })?;

        info!(user_id = %user.id, email = %user.email, "User registered");
        Ok(user)
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub fn authenticate(&self, email: &str, password: &str) -> EngineResult<User> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email)? else {
            warn!(email = %email, "Login attempt for unknown email");
            return Err(EngineError::InvalidCredentials);
        };

        let valid = PasswordService::verify(password, &user.password_hash).unwrap_or(false);
        if !valid {
            warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(EngineError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = %user.id, "Login attempt for inactive account");
            return Err(EngineError::AccountInactive);
        }

        info!(user_id = %user.id, "User authenticated");
        Ok(user)
    }

    pub fn current_user(&self, actor_id: Uuid) -> EngineResult<User> {
        self.store
            .find_user(actor_id)?
            .ok_or(EngineError::NotFound)
    }

    pub fn update_profile(&self, actor_id: Uuid, input: UpdateProfileInput) -> EngineResult<User> {
        Issues::check(&input).into_result()?;

        let mut changes = UserChanges::at(now());
        changes.full_name = input
            .full_name
            .map(|name| non_blank(name.as_deref()));

        let user = self
            .store
            .update_user(actor_id, &changes)?
            .ok_or(EngineError::NotFound)?;

        info!(user_id = %actor_id, "Profile updated");
        Ok(user)
    }

    pub fn change_password(&self, actor_id: Uuid, input: ChangePasswordInput) -> EngineResult<()> {
        let mut issues = Issues::check(&input);
        self.check_password_policy(&mut issues, "new_password", &input.new_password);
        issues.into_result()?;

        let user = self.current_user(actor_id)?;
        let verified =
            PasswordService::verify(&input.current_password, &user.password_hash).unwrap_or(false);
        if !verified {
            warn!(user_id = %actor_id, "Password change with wrong current password");
            return Err(EngineError::invalid(
                "current_password",
                "INVALID_PASSWORD",
                "Current password is incorrect",
            ));
        }

        let mut changes = UserChanges::at(now());
        changes.password_hash = Some(self.hash_password(&input.new_password)?);
        self.store
            .update_user(actor_id, &changes)?
            .ok_or(EngineError::NotFound)?;

        info!(user_id = %actor_id, "Password changed");
        Ok(())
    }

    /// Soft delete: the row and everything it authored stay in place.
    pub fn deactivate(&self, actor_id: Uuid) -> EngineResult<()> {
        let mut changes = UserChanges::at(now());
        changes.is_active = Some(false);
        self.store
            .update_user(actor_id, &changes)?
            .ok_or(EngineError::NotFound)?;

        info!(user_id = %actor_id, "User deactivated");
        Ok(())
    }

    pub fn user_stats(&self, actor_id: Uuid) -> EngineResult<UserStats> {
        Ok(self.store.user_stats(actor_id)?)
    }

    /// Active users matching `search` by email or name, for picking members.
    pub fn search_active_users(
        &self,
        _actor_id: Uuid,
        search: Option<&str>,
    ) -> EngineResult<Vec<UserSummary>> {
        let users = self.store.search_active_users(search, USER_SEARCH_LIMIT)?;
        Ok(users.into_iter().map(UserSummary::from).collect())
    }
}

fn email_taken() -> EngineError {
    EngineError::invalid("email", "EMAIL_TAKEN", "Email is already registered")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing;

    #[test]
    fn test_register_normalizes_email_and_hashes_password() {
        let engine = testing::engine();
        let user = engine
            .register(RegisterInput {
                email: "  Jane@Example.COM ".to_string(),
                password: "correct-horse".to_string(),
                full_name: Some("Jane".to_string()),
            })
            .unwrap();

        assert_eq!(user.email, "jane@example.com");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert!(user.is_active);
        assert_eq!(user.role, UserRole::User);
    }

    #[test]
    fn test_register_reports_every_invalid_field() {
        let engine = testing::engine();
        let err = engine
            .register(RegisterInput {
                email: "not-an-email".to_string(),
                password: "short".to_string(),
                full_name: None,
            })
            .unwrap_err();

        let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "password"]);
    }

    #[test]
    fn test_register_rejects_taken_email() {
        let engine = testing::engine();
        testing::user(&engine, "jane@example.com");

        let err = engine
            .register(RegisterInput {
                email: "JANE@example.com".to_string(),
                password: "correct-horse".to_string(),
                full_name: None,
            })
            .unwrap_err();

        assert_eq!(err.issues()[0].code, "EMAIL_TAKEN");
    }

    #[test]
    fn test_authenticate() {
        let engine = testing::engine();
        let user = testing::user(&engine, "jane@example.com");

        let ok = engine.authenticate("Jane@example.com", "correct-horse").unwrap();
        assert_eq!(ok.id, user.id);

        assert!(matches!(
            engine.authenticate("jane@example.com", "wrong"),
            Err(EngineError::InvalidCredentials)
        ));
        assert!(matches!(
            engine.authenticate("nobody@example.com", "correct-horse"),
            Err(EngineError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_deactivated_user_cannot_authenticate() {
        let engine = testing::engine();
        let user = testing::user(&engine, "jane@example.com");

        engine.deactivate(user.id).unwrap();

        assert!(matches!(
            engine.authenticate("jane@example.com", "correct-horse"),
            Err(EngineError::AccountInactive)
        ));
        assert!(!engine.current_user(user.id).unwrap().is_active);
    }

    #[test]
    fn test_update_profile_distinguishes_clear_from_absent() {
        let engine = testing::engine();
        let user = testing::user(&engine, "jane@example.com");

        let named = engine
            .update_profile(
                user.id,
                UpdateProfileInput {
                    full_name: Some(Some("Jane".to_string())),
                },
            )
            .unwrap();
        assert_eq!(named.full_name.as_deref(), Some("Jane"));

        let untouched = engine
            .update_profile(user.id, UpdateProfileInput::default())
            .unwrap();
        assert_eq!(untouched.full_name.as_deref(), Some("Jane"));

        let cleared = engine
            .update_profile(user.id, UpdateProfileInput { full_name: Some(None) })
            .unwrap();
        assert!(cleared.full_name.is_none());
    }

    #[test]
    fn test_change_password_requires_current_password() {
        let engine = testing::engine();
        let user = testing::user(&engine, "jane@example.com");

        let err = engine
            .change_password(
                user.id,
                ChangePasswordInput {
                    current_password: "guess".to_string(),
                    new_password: "battery-staple".to_string(),
                },
            )
            .unwrap_err();
        assert_eq!(err.issues()[0].field, "current_password");

        engine
            .change_password(
                user.id,
                ChangePasswordInput {
                    current_password: "correct-horse".to_string(),
                    new_password: "battery-staple".to_string(),
                },
            )
            .unwrap();
        assert!(engine.authenticate("jane@example.com", "battery-staple").is_ok());
        assert!(engine.authenticate("jane@example.com", "correct-horse").is_err());
    }

    #[test]
    fn test_search_active_users_excludes_deactivated() {
        let engine = testing::engine();
        let active = testing::user(&engine, "sam@example.com");
        let gone = testing::user(&engine, "samantha@example.com");
        engine.deactivate(gone.id).unwrap();

        let found = engine.search_active_users(active.id, Some("sam")).unwrap();

        let ids: Vec<Uuid> = found.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![active.id]);
    }
}
