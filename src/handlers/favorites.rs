use actix_web::{delete, get, post, web, HttpMessage, HttpRequest, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;

use crate::errors::{is_duplicate_key, ApiError};
use crate::middleware::auth::require_auth;
use crate::models::favorite::{AddFavoriteDto, Favorite};
use crate::models::vehicle::Vehicle;

#[post("")]
pub async fn add_favorite(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<AddFavoriteDto>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;
    let vehicle_id = ObjectId::parse_str(&payload.vehicle_id)?;

    db.collection::<Vehicle>("vehicles")
        .find_one(doc! { "_id": vehicle_id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Vehicle not found".to_string()))?;

    let mut favorite = Favorite {
        id: None,
        user: identity.id,
        vehicle: vehicle_id,
        created_at: DateTime::from_millis(Utc::now().timestamp_millis()),
    };

    // The unique (user, vehicle) index turns a concurrent double-add into a
    // conflict instead of a second document.
    let inserted = db
        .collection::<Favorite>("favorites")
        .insert_one(&favorite, None)
        .await
        .map_err(|err| {
            if is_duplicate_key(&err) {
                ApiError::Conflict("This vehicle is already in your favorites".to_string())
            } else {
                ApiError::from(err)
            }
        })?;
    favorite.id = inserted.inserted_id.as_object_id();

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": favorite,
        "msg": "Vehicle added to favorites",
    })))
}

#[delete("/{vehicleId}")]
pub async fn remove_favorite(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;
    let vehicle_id = ObjectId::parse_str(path.as_str())?;

    let removed = db
        .collection::<Favorite>("favorites")
        .find_one_and_delete(doc! { "user": identity.id, "vehicle": vehicle_id }, None)
        .await?;

    if removed.is_none() {
        return Err(ApiError::NotFound(
            "Favorite not found or already removed".to_string(),
        ));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": {},
        "msg": "Vehicle removed from favorites",
    })))
}

/// Caller's favorites with the vehicle documents resolved; entries whose
/// vehicle no longer exists are skipped.
#[get("")]
pub async fn get_favorites(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;

    let favorites: Vec<Favorite> = db
        .collection::<Favorite>("favorites")
        .find(doc! { "user": identity.id }, None)
        .await?
        .try_collect()
        .await?;

    let vehicle_ids: Vec<ObjectId> = favorites.iter().map(|favorite| favorite.vehicle).collect();
    let vehicles: Vec<Vehicle> = db
        .collection::<Vehicle>("vehicles")
        .find(doc! { "_id": { "$in": vehicle_ids } }, None)
        .await?
        .try_collect()
        .await?;

    let resolved: Vec<_> = favorites
        .iter()
        .filter_map(|favorite| {
            let vehicle = vehicles
                .iter()
                .find(|vehicle| vehicle.id == Some(favorite.vehicle))?;
            Some(serde_json::json!({
                "id": favorite.id.map(|id| id.to_hex()),
                "vehicle": vehicle,
                "createdAt": favorite.created_at.try_to_rfc3339_string().ok(),
            }))
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": resolved.len(),
        "data": resolved,
    })))
}
