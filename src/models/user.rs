use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Access tier. A closed enum validated at the store boundary, so no read site
/// ever has to sanitize a free-form role string.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    /// bcrypt hash. Never serialized into any API response; read paths go
    /// through `profile()` / `admin_view()`.
    pub password: String,
    pub role: Role,
    pub is_active: bool,
    /// SHA-256 hex of the raw reset token, paired with a 10-minute expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_expire: Option<DateTime>,
    #[serde(default)]
    pub favorites: Vec<ObjectId>,
    pub created_at: DateTime,
}

impl User {
    /// Profile returned from register/login/me: identity plus favorite ids.
    pub fn profile(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.map(|id| id.to_hex()),
            "email": self.email,
            "role": self.role,
            "favorites": self.favorites.iter().map(|id| id.to_hex()).collect::<Vec<_>>(),
        })
    }

    /// View used by the admin account-management endpoints.
    pub fn admin_view(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.map(|id| id.to_hex()),
            "email": self.email,
            "role": self.role,
            "isActive": self.is_active,
            "favorites": self.favorites.iter().map(|id| id.to_hex()).collect::<Vec<_>>(),
            "createdAt": self.created_at.try_to_rfc3339_string().ok(),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDto {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginDto {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordDto {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordDto {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Admin update of another account. Both fields optional; absent means leave
/// unchanged.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserDto {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContactDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> User {
        User {
            id: Some(ObjectId::new()),
            email: "a@x.com".into(),
            password: "$2b$12$hash".into(),
            role: Role::User,
            is_active: true,
            reset_password_token: None,
            reset_password_expire: None,
            favorites: vec![ObjectId::new()],
            created_at: DateTime::from_millis(Utc::now().timestamp_millis()),
        }
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::from_str::<Role>("\"user\"").unwrap(), Role::User);
    }

    #[test]
    fn profile_never_exposes_password_or_reset_fields() {
        let user = sample();
        for view in [user.profile(), user.admin_view()] {
            let text = view.to_string();
            assert!(!text.contains("password"));
            assert!(!text.contains("$2b$12$hash"));
            assert!(!text.contains("reset"));
        }
    }

    #[test]
    fn profile_carries_favorite_ids() {
        let user = sample();
        let profile = user.profile();
        assert_eq!(
            profile["favorites"][0],
            user.favorites[0].to_hex().as_str()
        );
    }

    #[test]
    fn missing_reset_fields_deserialize_as_none() {
        let doc = serde_json::json!({
            "email": "a@x.com",
            "password": "h",
            "role": "user",
            "isActive": true,
            "createdAt": { "$date": { "$numberLong": "0" } },
        });
        let user: User = serde_json::from_value(doc).unwrap();
        assert!(user.reset_password_token.is_none());
        assert!(user.favorites.is_empty());
    }
}
