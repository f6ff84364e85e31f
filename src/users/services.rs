use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::users::dto::{CreateUserRequest, LoginRequest, UpdateUserRequest};
use crate::users::repo::{User, UserChanges};

fn email_taken(users: &[User], email: &str) -> bool {
    users.iter().any(|u| u.email == email)
}

fn find_user(users: &[User], id: Uuid) -> Option<&User> {
    users.iter().find(|u| u.id == id)
}

/// Create a new account. The email must not collide with any existing
/// record, active or not.
pub async fn create(db: &PgPool, input: CreateUserRequest) -> Result<User, AppError> {
    let users = User::fetch_all(db).await?;
    if email_taken(&users, &input.email) {
        warn!(email = %input.email, "email already registered");
        return Err(AppError::Conflict("E-mail already exists!".into()));
    }

    let hash = hash_password(&input.password)?;
    let user = User::insert(db, &input.name, &input.email, &hash).await?;
    info!(user_id = %user.id, "user created");
    Ok(user)
}

/// Authenticate and issue a session token carrying the account id and
/// admin flag. Unknown email and wrong password fail with the same
/// message.
pub async fn login(db: &PgPool, keys: &JwtKeys, input: LoginRequest) -> Result<String, AppError> {
    let user = User::find_by_email(db, &input.email)
        .await?
        .ok_or_else(|| AppError::Forbidden("Invalid credentials".into()))?;

    if !user.active {
        // Not a credential failure: callers see a bare server error
        // identifiable only by its message.
        return Err(AppError::Internal(anyhow::anyhow!("Inactive user")));
    }

    if !verify_password(&input.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AppError::Forbidden("Invalid credentials".into()));
    }

    let token = keys.sign(user.id, user.is_adm)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

/// Fetch one account by id, whether active or not.
pub async fn retrieve(db: &PgPool, id: Uuid) -> Result<User, AppError> {
    let users = User::fetch_all(db).await?;
    find_user(&users, id)
        .cloned()
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Apply a partial update. Returns the refreshed record when exactly
/// one row was written, `None` otherwise. Email uniqueness is not
/// re-checked on this path.
pub async fn update(
    db: &PgPool,
    id: Uuid,
    data: UpdateUserRequest,
) -> Result<Option<User>, AppError> {
    let users = User::fetch_all(db).await?;
    let found =
        find_user(&users, id).ok_or_else(|| AppError::NotFound("User not found".into()))?;

    // An incoming password is stored hashed, like on creation.
    let password_hash = match &data.password {
        Some(plain) => Some(hash_password(plain)?),
        None => None,
    };
    let changes = UserChanges {
        name: data.name,
        email: data.email,
        password_hash,
        is_adm: data.is_adm,
        active: data.active,
    };

    let affected = User::update_by_id(db, found.id, changes).await?;
    if affected == 1 {
        let refreshed = User::find_by_id(db, id).await?;
        info!(user_id = %id, "user updated");
        return Ok(refreshed);
    }
    Ok(None)
}

/// Soft delete: flips `active` off and persists the row in place.
pub async fn delete(db: &PgPool, id: Uuid) -> Result<(), AppError> {
    let mut user = User::find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if !user.active {
        // Same shape as login's inactive case: a bare server error.
        return Err(AppError::Internal(anyhow::anyhow!("Inactivated user")));
    }

    user.active = false;
    user.save(db).await?;
    info!(user_id = %id, "user deactivated");
    Ok(())
}

/// All accounts, inactive ones included, in store-native order.
pub async fn list(db: &PgPool) -> Result<Vec<User>, AppError> {
    let users = User::fetch_all(db).await?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
            is_adm: false,
            active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn email_scan_matches_exactly() {
        let users = vec![user("ana@mail.com"), user("ben@mail.com")];
        assert!(email_taken(&users, "ana@mail.com"));
        assert!(!email_taken(&users, "carla@mail.com"));
    }

    #[test]
    fn email_scan_is_case_sensitive() {
        let users = vec![user("Ana@mail.com")];
        assert!(!email_taken(&users, "ana@mail.com"));
        assert!(email_taken(&users, "Ana@mail.com"));
    }

    #[test]
    fn email_scan_includes_inactive_records() {
        let mut deactivated = user("old@mail.com");
        deactivated.active = false;
        assert!(email_taken(&[deactivated], "old@mail.com"));
    }

    #[test]
    fn id_scan_finds_matching_record() {
        let users = vec![user("a@mail.com"), user("b@mail.com")];
        let target = users[1].id;
        assert_eq!(find_user(&users, target).map(|u| u.id), Some(target));
    }

    #[test]
    fn id_scan_misses_unknown_id() {
        let users = vec![user("a@mail.com")];
        assert!(find_user(&users, Uuid::new_v4()).is_none());
    }
}
