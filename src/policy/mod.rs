//! Resource ownership rules: who may act on which account or booking. Kept as
//! pure functions so the policy table is testable without a database.

use mongodb::bson::oid::ObjectId;

use crate::errors::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::user::{Role, User};

/// Admin account update (`PUT /api/users/:id`). An account can never mutate
/// its own role or active flag through this endpoint, and no admin can
/// deactivate another admin.
pub fn ensure_can_update_account(
    actor: &AuthenticatedUser,
    target: &User,
    new_is_active: Option<bool>,
) -> Result<(), ApiError> {
    if Some(actor.id) == target.id {
        return Err(ApiError::Forbidden(
            "You cannot modify your own account through this interface".to_string(),
        ));
    }
    if target.role == Role::Admin && new_is_active == Some(false) {
        return Err(ApiError::Forbidden(
            "Another administrator cannot be blocked".to_string(),
        ));
    }
    Ok(())
}

/// Admin account deletion (`DELETE /api/users/:id`): no self-deletion, no
/// deleting another admin.
pub fn ensure_can_delete_account(
    actor: &AuthenticatedUser,
    target: &User,
) -> Result<(), ApiError> {
    if Some(actor.id) == target.id {
        return Err(ApiError::Forbidden(
            "You cannot delete your own account".to_string(),
        ));
    }
    if target.role == Role::Admin {
        return Err(ApiError::Forbidden(
            "Another administrator cannot be deleted".to_string(),
        ));
    }
    Ok(())
}

/// Cancelling a reservation or test drive: the creating account or an admin.
pub fn ensure_can_cancel_booking(
    actor: &AuthenticatedUser,
    owner: ObjectId,
) -> Result<(), ApiError> {
    if actor.id == owner || actor.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Not authorized to cancel this booking".to_string(),
        ))
    }
}

/// Scope for `GET .../my` listings: plain users always see their own records;
/// an admin sees everything, or one account's records when `?user=` is given.
pub fn booking_list_owner(
    actor: &AuthenticatedUser,
    requested: Option<ObjectId>,
) -> Option<ObjectId> {
    if actor.role.is_admin() {
        requested
    } else {
        Some(actor.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mongodb::bson::DateTime;

    fn actor(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            id: ObjectId::new(),
            email: "admin@x.com".into(),
            role,
        }
    }

    fn account(role: Role) -> User {
        User {
            id: Some(ObjectId::new()),
            email: "target@x.com".into(),
            password: "hash".into(),
            role,
            is_active: true,
            reset_password_token: None,
            reset_password_expire: None,
            favorites: vec![],
            created_at: DateTime::from_millis(Utc::now().timestamp_millis()),
        }
    }

    #[test]
    fn admin_cannot_update_own_account() {
        let admin = actor(Role::Admin);
        let mut target = account(Role::Admin);
        target.id = Some(admin.id);
        assert!(matches!(
            ensure_can_update_account(&admin, &target, None),
            Err(ApiError::Forbidden(_))
        ));
        // Even a plain flag flip on self is rejected.
        assert!(ensure_can_update_account(&admin, &target, Some(false)).is_err());
    }

    #[test]
    fn admin_cannot_deactivate_another_admin() {
        let admin = actor(Role::Admin);
        let target = account(Role::Admin);
        assert!(matches!(
            ensure_can_update_account(&admin, &target, Some(false)),
            Err(ApiError::Forbidden(_))
        ));
        // Reactivating or leaving the flag alone is allowed.
        assert!(ensure_can_update_account(&admin, &target, Some(true)).is_ok());
        assert!(ensure_can_update_account(&admin, &target, None).is_ok());
    }

    #[test]
    fn admin_can_update_ordinary_accounts() {
        let admin = actor(Role::Admin);
        let target = account(Role::User);
        assert!(ensure_can_update_account(&admin, &target, Some(false)).is_ok());
    }

    #[test]
    fn admin_cannot_delete_self_or_peer_admin() {
        let admin = actor(Role::Admin);
        let mut own = account(Role::Admin);
        own.id = Some(admin.id);
        assert!(matches!(
            ensure_can_delete_account(&admin, &own),
            Err(ApiError::Forbidden(_))
        ));

        let peer = account(Role::Admin);
        assert!(matches!(
            ensure_can_delete_account(&admin, &peer),
            Err(ApiError::Forbidden(_))
        ));

        let user = account(Role::User);
        assert!(ensure_can_delete_account(&admin, &user).is_ok());
    }

    #[test]
    fn bookings_are_cancellable_by_owner_or_admin() {
        let owner_id = ObjectId::new();

        let mut owner = actor(Role::User);
        owner.id = owner_id;
        assert!(ensure_can_cancel_booking(&owner, owner_id).is_ok());

        let stranger = actor(Role::User);
        assert!(matches!(
            ensure_can_cancel_booking(&stranger, owner_id),
            Err(ApiError::Forbidden(_))
        ));

        let admin = actor(Role::Admin);
        assert!(ensure_can_cancel_booking(&admin, owner_id).is_ok());
    }

    #[test]
    fn listing_scope_ignores_user_param_for_ordinary_users() {
        let user = actor(Role::User);
        let other = ObjectId::new();
        assert_eq!(booking_list_owner(&user, Some(other)), Some(user.id));
        assert_eq!(booking_list_owner(&user, None), Some(user.id));

        let admin = actor(Role::Admin);
        assert_eq!(booking_list_owner(&admin, Some(other)), Some(other));
        assert_eq!(booking_list_owner(&admin, None), None);
    }
}
