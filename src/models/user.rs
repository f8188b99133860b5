use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// User document ("users" collection). The email is the identity every other
/// collection references; the ObjectId only matters for the admin
/// role-update route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: Option<String>,
    pub email: String,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// "member" or "admin"; documents written before the role field existed
    /// read back as "member".
    #[serde(default = "default_role")]
    pub role: String,
    pub created_at: Option<DateTime>,
}

impl User {
    pub const COLLECTION: &'static str = "users";
    pub const ROLE_ADMIN: &'static str = "admin";
    pub const ROLE_MEMBER: &'static str = "member";
}

fn default_role() -> String {
    User::ROLE_MEMBER.to_string()
}

/// POST /users body. Role and creation time are forced server-side.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// PATCH /users/{id}/role body.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// User as returned over the API (hex id, RFC 3339 timestamp).
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub role: String,
    pub created_at: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name,
            email: user.email,
            photo_url: user.photo_url,
            role: user.role,
            created_at: user
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_role_defaults_to_member() {
        let raw = doc! { "email": "a@x.com" };
        let user: User = mongodb::bson::from_document(raw).unwrap();
        assert_eq!(user.role, "member");
    }

    #[test]
    fn test_camel_case_field_names() {
        let user = User {
            id: None,
            name: Some("Ana".to_string()),
            email: "a@x.com".to_string(),
            photo_url: Some("https://img".to_string()),
            role: User::ROLE_ADMIN.to_string(),
            created_at: Some(DateTime::now()),
        };
        let doc = mongodb::bson::to_document(&user).unwrap();
        assert!(doc.contains_key("photoURL"));
        assert!(doc.contains_key("createdAt"));
        assert!(!doc.contains_key("_id"));
    }
}
