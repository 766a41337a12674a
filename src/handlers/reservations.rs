use actix_web::{get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::FindOptions;
use mongodb::Database;
use validator::Validate;

use crate::email::{self, Mailer};
use crate::errors::ApiError;
use crate::middleware::auth::{require_admin, require_auth};
use crate::models::reservation::{
    BookingListQuery, CreateReservationDto, Reservation, UpdateStatusDto,
};
use crate::models::status::{self, BookingStatus};
use crate::models::user::User;
use crate::models::vehicle::{Vehicle, VehicleType};
use crate::policy;

const KIND: &str = "reservation";

fn view(reservation: &Reservation, vehicle: Option<&Vehicle>, user_email: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "id": reservation.id.map(|id| id.to_hex()),
        "vehicle": vehicle,
        "user": {
            "id": reservation.user.to_hex(),
            "email": user_email,
        },
        "startDate": reservation.start_date.try_to_rfc3339_string().ok(),
        "endDate": reservation.end_date.try_to_rfc3339_string().ok(),
        "status": reservation.status,
        "totalPrice": reservation.total_price,
        "message": reservation.message,
        "createdAt": reservation.created_at.try_to_rfc3339_string().ok(),
    })
}

#[post("")]
pub async fn create_reservation(
    req: HttpRequest,
    db: web::Data<Database>,
    mailer: web::Data<Mailer>,
    payload: web::Json<CreateReservationDto>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;
    payload.validate().map_err(ApiError::from)?;

    if payload.end_date < payload.start_date {
        return Err(ApiError::Validation(
            "End date must be on or after the start date".to_string(),
        ));
    }

    let vehicle_id = ObjectId::parse_str(&payload.vehicle)?;
    let vehicle = db
        .collection::<Vehicle>("vehicles")
        .find_one(doc! { "_id": vehicle_id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Vehicle not found".to_string()))?;

    if vehicle.vehicle_type != VehicleType::Rent {
        return Err(ApiError::Validation(
            "This vehicle is not available for rent".to_string(),
        ));
    }

    let mut reservation = Reservation {
        id: None,
        vehicle: vehicle_id,
        user: identity.id,
        start_date: DateTime::from_chrono(payload.start_date),
        end_date: DateTime::from_chrono(payload.end_date),
        status: BookingStatus::Pending,
        total_price: None,
        message: payload.message.clone(),
        created_at: DateTime::from_millis(Utc::now().timestamp_millis()),
    };

    let inserted = db
        .collection::<Reservation>("reservations")
        .insert_one(&reservation, None)
        .await?;
    reservation.id = inserted.inserted_id.as_object_id();

    let label = vehicle.label();
    let period = reservation.period();
    mailer
        .send_best_effort(email::booking_received_user(
            &identity.email,
            KIND,
            &label,
            &period,
        ))
        .await;
    mailer
        .send_best_effort(email::booking_received_operator(
            mailer.operator(),
            KIND,
            &label,
            &identity.email,
            &period,
            reservation.message.as_deref(),
        ))
        .await;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": view(&reservation, Some(&vehicle), Some(&identity.email)),
    })))
}

#[get("/my")]
pub async fn get_my_reservations(
    req: HttpRequest,
    db: web::Data<Database>,
    query: web::Query<BookingListQuery>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;

    let requested = match &query.user {
        Some(raw) => Some(ObjectId::parse_str(raw)?),
        None => None,
    };

    let mut filter = doc! {};
    if let Some(owner) = policy::booking_list_owner(&identity, requested) {
        filter.insert("user", owner);
    }

    let options = FindOptions::builder()
        .sort(doc! { "createdAt": -1 })
        .build();
    let reservations: Vec<Reservation> = db
        .collection::<Reservation>("reservations")
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let vehicle_ids: Vec<ObjectId> = reservations.iter().map(|r| r.vehicle).collect();
    let vehicles: Vec<Vehicle> = db
        .collection::<Vehicle>("vehicles")
        .find(doc! { "_id": { "$in": vehicle_ids } }, None)
        .await?
        .try_collect()
        .await?;

    let user_ids: Vec<ObjectId> = reservations.iter().map(|r| r.user).collect();
    let users: Vec<User> = db
        .collection::<User>("users")
        .find(doc! { "_id": { "$in": user_ids } }, None)
        .await?
        .try_collect()
        .await?;

    let data: Vec<_> = reservations
        .iter()
        .map(|reservation| {
            let vehicle = vehicles.iter().find(|v| v.id == Some(reservation.vehicle));
            let email = users
                .iter()
                .find(|u| u.id == Some(reservation.user))
                .map(|u| u.email.as_str());
            view(reservation, vehicle, email)
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": data.len(),
        "data": data,
    })))
}

#[put("/{id}/cancel")]
pub async fn cancel_reservation(
    req: HttpRequest,
    db: web::Data<Database>,
    mailer: web::Data<Mailer>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;
    let id = ObjectId::parse_str(path.as_str())?;

    let reservations = db.collection::<Reservation>("reservations");
    let mut reservation = reservations
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Reservation not found".to_string()))?;

    policy::ensure_can_cancel_booking(&identity, reservation.user)?;
    let change = status::cancel(reservation.status)?;

    // Status is persisted before any notification goes out.
    reservations
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "status": change.to.as_str() } },
            None,
        )
        .await?;
    reservation.status = change.to;

    let vehicle = db
        .collection::<Vehicle>("vehicles")
        .find_one(doc! { "_id": reservation.vehicle }, None)
        .await?;
    let owner = db
        .collection::<User>("users")
        .find_one(doc! { "_id": reservation.user }, None)
        .await?;

    let label = vehicle
        .as_ref()
        .map(Vehicle::label)
        .unwrap_or_else(|| "the requested vehicle".to_string());
    let period = reservation.period();
    if let Some(owner) = &owner {
        mailer
            .send_best_effort(email::cancellation_user(&owner.email, KIND, &label, &period))
            .await;
        mailer
            .send_best_effort(email::cancellation_operator(
                mailer.operator(),
                KIND,
                &label,
                &owner.email,
                &period,
                identity.role.is_admin(),
            ))
            .await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": view(
            &reservation,
            vehicle.as_ref(),
            owner.as_ref().map(|u| u.email.as_str()),
        ),
    })))
}

#[put("/{id}/status")]
pub async fn update_reservation_status(
    req: HttpRequest,
    db: web::Data<Database>,
    mailer: web::Data<Mailer>,
    path: web::Path<String>,
    payload: web::Json<UpdateStatusDto>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req.extensions())?;
    let id = ObjectId::parse_str(path.as_str())?;

    let reservations = db.collection::<Reservation>("reservations");
    let mut reservation = reservations
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Reservation not found".to_string()))?;

    let change = match status::apply_transition(reservation.status, payload.status)? {
        Some(change) => change,
        // Already in the requested status: nothing persisted, nobody notified.
        None => {
            return Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "data": view(&reservation, None, None),
            })))
        }
    };

    reservations
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "status": change.to.as_str() } },
            None,
        )
        .await?;
    reservation.status = change.to;

    let vehicle = db
        .collection::<Vehicle>("vehicles")
        .find_one(doc! { "_id": reservation.vehicle }, None)
        .await?;
    let owner = db
        .collection::<User>("users")
        .find_one(doc! { "_id": reservation.user }, None)
        .await?;

    let label = vehicle
        .as_ref()
        .map(Vehicle::label)
        .unwrap_or_else(|| "the requested vehicle".to_string());
    let period = reservation.period();
    if let Some(owner) = &owner {
        mailer
            .send_best_effort(email::status_changed(
                &owner.email,
                KIND,
                &label,
                &period,
                change.to,
            ))
            .await;
        mailer
            .send_best_effort(email::status_changed_operator(
                mailer.operator(),
                KIND,
                &label,
                &owner.email,
                &period,
                change.to,
            ))
            .await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": view(
            &reservation,
            vehicle.as_ref(),
            owner.as_ref().map(|u| u.email.as_str()),
        ),
    })))
}

/// Booking counts per status, all four statuses always present.
#[get("/stats/status")]
pub async fn get_reservation_status_stats(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req.extensions())?;
    let stats = status_counts(&db, "reservations").await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true, "data": stats })))
}

pub async fn status_counts(
    db: &Database,
    collection: &str,
) -> Result<serde_json::Value, ApiError> {
    let pipeline = vec![doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } }];
    let groups: Vec<Document> = db
        .collection::<Document>(collection)
        .aggregate(pipeline, None)
        .await?
        .try_collect()
        .await?;

    let mut stats = serde_json::json!({
        "pending": 0,
        "confirmed": 0,
        "cancelled": 0,
        "completed": 0,
    });
    for group in groups {
        let name = group.get_str("_id").map_err(|_| ApiError::Internal)?;
        let count = group
            .get_i32("count")
            .map(i64::from)
            .or_else(|_| group.get_i64("count"))
            .map_err(|_| ApiError::Internal)?;
        if stats.get(name).is_some() {
            stats[name] = serde_json::json!(count);
        }
    }
    Ok(stats)
}
