use actix_web::{delete, get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::FindOptions;
use mongodb::Database;

use crate::errors::ApiError;
use crate::middleware::auth::require_admin;
use crate::models::vehicle::{Vehicle, VehicleListQuery, VehiclePayload};

#[get("")]
pub async fn get_vehicles(
    db: web::Data<Database>,
    query: web::Query<VehicleListQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut filter = doc! {};
    if let Some(vehicle_type) = query.vehicle_type {
        filter.insert("type", vehicle_type.as_str());
    }
    if let Some(is_featured) = query.is_featured {
        filter.insert("isFeatured", is_featured);
    }

    let options = FindOptions::builder()
        .sort(doc! { "createdAt": -1 })
        .build();

    let vehicles: Vec<Vehicle> = db
        .collection::<Vehicle>("vehicles")
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": vehicles.len(),
        "data": vehicles,
    })))
}

#[get("/{id}")]
pub async fn get_vehicle(
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = ObjectId::parse_str(path.as_str())?;

    let vehicle = db
        .collection::<Vehicle>("vehicles")
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Vehicle not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": vehicle,
    })))
}

#[post("")]
pub async fn create_vehicle(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<VehiclePayload>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_admin(&req.extensions())?;

    let mut vehicle = Vehicle::from_payload(payload.into_inner(), actor.id)?;

    let vehicles = db.collection::<Vehicle>("vehicles");
    let inserted = vehicles.insert_one(&vehicle, None).await?;
    vehicle.id = inserted.inserted_id.as_object_id();

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": vehicle,
    })))
}

#[put("/{id}")]
pub async fn update_vehicle(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
    payload: web::Json<VehiclePayload>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req.extensions())?;
    let id = ObjectId::parse_str(path.as_str())?;

    let vehicles = db.collection::<Vehicle>("vehicles");
    let existing = vehicles
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Vehicle not found".to_string()))?;

    // Full replacement, revalidated against the conditional field rules.
    // Ownership and creation time survive the update.
    let mut updated = Vehicle::from_payload(payload.into_inner(), existing.user)?;
    updated.id = Some(id);
    updated.created_at = existing.created_at;

    vehicles
        .replace_one(doc! { "_id": id }, &updated, None)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": updated,
    })))
}

#[delete("/{id}")]
pub async fn delete_vehicle(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req.extensions())?;
    let id = ObjectId::parse_str(path.as_str())?;

    let vehicles = db.collection::<Vehicle>("vehicles");
    vehicles
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Vehicle not found".to_string()))?;

    vehicles.delete_one(doc! { "_id": id }, None).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": {},
    })))
}

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Listings created per month, for the admin dashboard chart.
#[get("/stats/additions")]
pub async fn get_vehicle_addition_stats(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req.extensions())?;

    let pipeline = vec![
        doc! { "$group": {
            "_id": {
                "year": { "$year": "$createdAt" },
                "month": { "$month": "$createdAt" },
            },
            "count": { "$sum": 1 },
        }},
        doc! { "$sort": { "_id.year": 1, "_id.month": 1 } },
    ];

    let groups: Vec<Document> = db
        .collection::<Vehicle>("vehicles")
        .aggregate(pipeline, None)
        .await?
        .try_collect()
        .await?;

    let mut data = Vec::with_capacity(groups.len());
    for group in groups {
        let key = group.get_document("_id").map_err(|_| ApiError::Internal)?;
        let year = key.get_i32("year").map_err(|_| ApiError::Internal)?;
        let month = key.get_i32("month").map_err(|_| ApiError::Internal)?;
        let count = group
            .get_i32("count")
            .map(i64::from)
            .or_else(|_| group.get_i64("count"))
            .map_err(|_| ApiError::Internal)?;
        data.push(serde_json::json!({
            "monthYear": format!("{} {}", MONTH_NAMES[(month - 1) as usize], year),
            "count": count,
        }));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": data,
    })))
}
