use actix_web::{delete, get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

use crate::email::{self, Mailer};
use crate::errors::ApiError;
use crate::middleware::auth::{require_admin, require_auth};
use crate::models::user::{UpdateUserDto, User};
use crate::models::vehicle::Vehicle;
use crate::policy;

#[get("")]
pub async fn get_users(req: HttpRequest, db: web::Data<Database>) -> Result<HttpResponse, ApiError> {
    require_admin(&req.extensions())?;

    let users: Vec<User> = db
        .collection::<User>("users")
        .find(doc! {}, None)
        .await?
        .try_collect()
        .await?;

    let views: Vec<_> = users.iter().map(User::admin_view).collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": views.len(),
        "data": views,
    })))
}

#[get("/{id}")]
pub async fn get_user(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req.extensions())?;
    let id = ObjectId::parse_str(path.as_str())?;

    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": user.admin_view(),
    })))
}

/// Update role and/or active flag of another account, subject to the
/// ownership rules. A change of the active flag triggers a best-effort
/// blocked/unblocked email.
#[put("/{id}")]
pub async fn update_user(
    req: HttpRequest,
    db: web::Data<Database>,
    mailer: web::Data<Mailer>,
    path: web::Path<String>,
    payload: web::Json<UpdateUserDto>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_admin(&req.extensions())?;
    let id = ObjectId::parse_str(path.as_str())?;

    let users = db.collection::<User>("users");
    let mut target = users
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    policy::ensure_can_update_account(&actor, &target, payload.is_active)?;

    let mut update = doc! {};
    if let Some(role) = payload.role {
        if role != target.role {
            update.insert("role", role.as_str());
            target.role = role;
        }
    }
    let active_changed = match payload.is_active {
        Some(active) if active != target.is_active => {
            update.insert("isActive", active);
            target.is_active = active;
            true
        }
        _ => false,
    };

    if !update.is_empty() {
        users
            .update_one(doc! { "_id": id }, doc! { "$set": update }, None)
            .await?;
    }

    if active_changed {
        mailer
            .send_best_effort(email::account_status_changed(&target.email, target.is_active))
            .await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": target.admin_view(),
        "msg": "User updated successfully",
    })))
}

#[delete("/{id}")]
pub async fn delete_user(
    req: HttpRequest,
    db: web::Data<Database>,
    mailer: web::Data<Mailer>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_admin(&req.extensions())?;
    let id = ObjectId::parse_str(path.as_str())?;

    let users = db.collection::<User>("users");
    let target = users
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    policy::ensure_can_delete_account(&actor, &target)?;

    users.delete_one(doc! { "_id": id }, None).await?;

    mailer
        .send_best_effort(email::account_deleted(&target.email))
        .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": {},
        "msg": "User deleted successfully",
    })))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFavoriteDto {
    pub vehicle_id: String,
}

/// Hex id list after toggling, plus whether the vehicle was already present.
fn toggled_favorites(current: &[ObjectId], vehicle_id: ObjectId) -> (bool, Vec<String>) {
    if current.contains(&vehicle_id) {
        (
            true,
            current
                .iter()
                .filter(|id| **id != vehicle_id)
                .map(|id| id.to_hex())
                .collect(),
        )
    } else {
        let mut favorites: Vec<String> = current.iter().map(|id| id.to_hex()).collect();
        favorites.push(vehicle_id.to_hex());
        (false, favorites)
    }
}

/// Toggle a vehicle in the caller's embedded favorites list. Always scoped to
/// self; a second toggle removes the entry again.
#[post("/favorites/toggle")]
pub async fn toggle_favorite(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<ToggleFavoriteDto>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;
    let vehicle_id = ObjectId::parse_str(&payload.vehicle_id)?;

    db.collection::<Vehicle>("vehicles")
        .find_one(doc! { "_id": vehicle_id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Vehicle not found".to_string()))?;

    let users = db.collection::<User>("users");
    let user = users
        .find_one(doc! { "_id": identity.id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let (was_favorite, favorites) = toggled_favorites(&user.favorites, vehicle_id);
    let (update, msg) = if was_favorite {
        (
            doc! { "$pull": { "favorites": vehicle_id } },
            "Vehicle removed from favorites",
        )
    } else {
        (
            doc! { "$addToSet": { "favorites": vehicle_id } },
            "Vehicle added to favorites",
        )
    };

    users
        .update_one(doc! { "_id": identity.id }, update, None)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "msg": msg,
        "data": favorites,
    })))
}

/// Resolve the caller's favorites to vehicle documents, skipping ids whose
/// vehicle has since been deleted.
#[get("/favorites")]
pub async fn get_favorite_vehicles(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;

    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": identity.id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let vehicles: Vec<Vehicle> = db
        .collection::<Vehicle>("vehicles")
        .find(doc! { "_id": { "$in": user.favorites.clone() } }, None)
        .await?
        .try_collect()
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": vehicles.len(),
        "data": vehicles,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_an_absent_vehicle_appends_its_hex_id() {
        let existing = ObjectId::new();
        let added = ObjectId::new();

        let (was_favorite, favorites) = toggled_favorites(&[existing], added);
        assert!(!was_favorite);
        assert_eq!(favorites, vec![existing.to_hex(), added.to_hex()]);
    }

    #[test]
    fn toggling_a_present_vehicle_removes_only_that_entry() {
        let kept = ObjectId::new();
        let removed = ObjectId::new();

        let (was_favorite, favorites) = toggled_favorites(&[kept, removed], removed);
        assert!(was_favorite);
        assert_eq!(favorites, vec![kept.to_hex()]);
    }

    #[test]
    fn toggling_twice_restores_the_original_list() {
        let existing = ObjectId::new();
        let toggled = ObjectId::new();

        let (_, after_add) = toggled_favorites(&[existing], toggled);
        let ids: Vec<ObjectId> = after_add
            .iter()
            .map(|hex| ObjectId::parse_str(hex).unwrap())
            .collect();
        let (_, after_remove) = toggled_favorites(&ids, toggled);
        assert_eq!(after_remove, vec![existing.to_hex()]);
    }
}
