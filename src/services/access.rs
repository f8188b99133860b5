use mongodb::bson::doc;

use crate::database::MongoDB;
use crate::models::{Membership, User};
use crate::utils::ApiError;

/// Loads the caller's user document and checks the admin role. The role
/// always comes from the database, never from token claims.
pub async fn require_admin(db: &MongoDB, email: &str) -> Result<User, ApiError> {
    let users = db.collection::<User>(User::COLLECTION);
    let user = users.find_one(doc! { "email": email }).await?;

    match user {
        Some(user) if user.role == User::ROLE_ADMIN => Ok(user),
        _ => Err(ApiError::Forbidden("admin role required".to_string())),
    }
}

/// Self-scoped routes take the target email as a parameter; it must match
/// the authenticated caller exactly. There is no admin bypass here.
pub fn require_self(principal_email: &str, target_email: &str) -> Result<(), ApiError> {
    if principal_email != target_email {
        return Err(ApiError::Forbidden(
            "email does not match authenticated caller".to_string(),
        ));
    }
    Ok(())
}

/// Checks for an active membership in the given club.
pub async fn require_active_member(
    db: &MongoDB,
    club_id: &str,
    email: &str,
) -> Result<Membership, ApiError> {
    let memberships = db.collection::<Membership>(Membership::COLLECTION);
    let membership = memberships
        .find_one(doc! {
            "clubId": club_id,
            "userEmail": email,
            "status": Membership::STATUS_ACTIVE,
        })
        .await?;

    membership.ok_or_else(|| ApiError::Forbidden("active membership required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_self_accepts_exact_match() {
        assert!(require_self("ana@example.com", "ana@example.com").is_ok());
    }

    #[test]
    fn test_require_self_is_case_sensitive() {
        assert!(require_self("ana@example.com", "Ana@example.com").is_err());
    }

    #[test]
    fn test_require_self_rejects_other_caller() {
        let err = require_self("ana@example.com", "bob@example.com").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
