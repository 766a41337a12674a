use actix_web::{get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use mongodb::Database;
use validator::Validate;

use crate::email::{self, Mailer};
use crate::errors::ApiError;
use crate::middleware::auth::{require_admin, require_auth};
use crate::models::reservation::{BookingListQuery, UpdateStatusDto};
use crate::models::status::{self, BookingStatus};
use crate::models::test_drive::{CreateTestDriveDto, TestDrive};
use crate::models::user::User;
use crate::models::vehicle::Vehicle;
use crate::policy;

use super::reservations::status_counts;

const KIND: &str = "test drive";

fn view(drive: &TestDrive, vehicle: Option<&Vehicle>, user_email: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "id": drive.id.map(|id| id.to_hex()),
        "vehicle": vehicle,
        "user": {
            "id": drive.user.to_hex(),
            "email": user_email,
        },
        "testDriveDate": drive.test_drive_date.try_to_rfc3339_string().ok(),
        "status": drive.status,
        "message": drive.message,
        "createdAt": drive.created_at.try_to_rfc3339_string().ok(),
    })
}

#[post("")]
pub async fn create_test_drive(
    req: HttpRequest,
    db: web::Data<Database>,
    mailer: web::Data<Mailer>,
    payload: web::Json<CreateTestDriveDto>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;
    payload.validate().map_err(ApiError::from)?;

    if payload.test_drive_date < Utc::now() {
        return Err(ApiError::Validation(
            "Test drive date must be in the future".to_string(),
        ));
    }

    let vehicle_id = ObjectId::parse_str(&payload.vehicle)?;
    let vehicle = db
        .collection::<Vehicle>("vehicles")
        .find_one(doc! { "_id": vehicle_id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Vehicle not found".to_string()))?;

    let mut drive = TestDrive {
        id: None,
        vehicle: vehicle_id,
        user: identity.id,
        test_drive_date: DateTime::from_chrono(payload.test_drive_date),
        status: BookingStatus::Pending,
        message: payload.message.clone(),
        created_at: DateTime::from_millis(Utc::now().timestamp_millis()),
    };

    let inserted = db
        .collection::<TestDrive>("testdrives")
        .insert_one(&drive, None)
        .await?;
    drive.id = inserted.inserted_id.as_object_id();

    let label = vehicle.label();
    let when = drive.when();
    mailer
        .send_best_effort(email::booking_received_user(
            &identity.email,
            KIND,
            &label,
            &when,
        ))
        .await;
    mailer
        .send_best_effort(email::booking_received_operator(
            mailer.operator(),
            KIND,
            &label,
            &identity.email,
            &when,
            drive.message.as_deref(),
        ))
        .await;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": view(&drive, Some(&vehicle), Some(&identity.email)),
    })))
}

#[get("/my")]
pub async fn get_my_test_drives(
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
    let drives: Vec<TestDrive> = db
        .collection::<TestDrive>("testdrives")
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let vehicle_ids: Vec<ObjectId> = drives.iter().map(|d| d.vehicle).collect();
    let vehicles: Vec<Vehicle> = db
        .collection::<Vehicle>("vehicles")
        .find(doc! { "_id": { "$in": vehicle_ids } }, None)
        .await?
        .try_collect()
        .await?;

    let user_ids: Vec<ObjectId> = drives.iter().map(|d| d.user).collect();
    let users: Vec<User> = db
        .collection::<User>("users")
        .find(doc! { "_id": { "$in": user_ids } }, None)
        .await?
        .try_collect()
        .await?;

    let data: Vec<_> = drives
        .iter()
        .map(|drive| {
            let vehicle = vehicles.iter().find(|v| v.id == Some(drive.vehicle));
            let email = users
                .iter()
                .find(|u| u.id == Some(drive.user))
                .map(|u| u.email.as_str());
            view(drive, vehicle, email)
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": data.len(),
        "data": data,
    })))
}

#[put("/{id}/cancel")]
pub async fn cancel_test_drive(
    req: HttpRequest,
    db: web::Data<Database>,
    mailer: web::Data<Mailer>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;
    let id = ObjectId::parse_str(path.as_str())?;

    let drives = db.collection::<TestDrive>("testdrives");
    let mut drive = drives
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Test drive not found".to_string()))?;

    policy::ensure_can_cancel_booking(&identity, drive.user)?;
    let change = status::cancel(drive.status)?;

    drives
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "status": change.to.as_str() } },
            None,
        )
        .await?;
    drive.status = change.to;

    let vehicle = db
        .collection::<Vehicle>("vehicles")
        .find_one(doc! { "_id": drive.vehicle }, None)
        .await?;
    let owner = db
        .collection::<User>("users")
        .find_one(doc! { "_id": drive.user }, None)
        .await?;

    let label = vehicle
        .as_ref()
        .map(Vehicle::label)
        .unwrap_or_else(|| "the requested vehicle".to_string());
    let when = drive.when();
    if let Some(owner) = &owner {
        mailer
            .send_best_effort(email::cancellation_user(&owner.email, KIND, &label, &when))
            .await;
        mailer
            .send_best_effort(email::cancellation_operator(
                mailer.operator(),
                KIND,
                &label,
                &owner.email,
                &when,
                identity.role.is_admin(),
            ))
            .await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": view(
            &drive,
            vehicle.as_ref(),
            owner.as_ref().map(|u| u.email.as_str()),
        ),
    })))
}

#[put("/{id}/status")]
pub async fn update_test_drive_status(
    req: HttpRequest,
    db: web::Data<Database>,
    mailer: web::Data<Mailer>,
    path: web::Path<String>,
    payload: web::Json<UpdateStatusDto>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req.extensions())?;
    let id = ObjectId::parse_str(path.as_str())?;

    let drives = db.collection::<TestDrive>("testdrives");
    let mut drive = drives
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Test drive not found".to_string()))?;

    let change = match status::apply_transition(drive.status, payload.status)? {
        Some(change) => change,
        None => {
            return Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "data": view(&drive, None, None),
            })))
        }
    };

    drives
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "status": change.to.as_str() } },
            None,
        )
        .await?;
    drive.status = change.to;

    let vehicle = db
        .collection::<Vehicle>("vehicles")
        .find_one(doc! { "_id": drive.vehicle }, None)
        .await?;
    let owner = db
        .collection::<User>("users")
        .find_one(doc! { "_id": drive.user }, None)
        .await?;

    let label = vehicle
        .as_ref()
        .map(Vehicle::label)
        .unwrap_or_else(|| "the requested vehicle".to_string());
    let when = drive.when();
    if let Some(owner) = &owner {
        mailer
            .send_best_effort(email::status_changed(
                &owner.email,
                KIND,
                &label,
                &when,
                change.to,
            ))
            .await;
        mailer
            .send_best_effort(email::status_changed_operator(
                mailer.operator(),
                KIND,
                &label,
                &owner.email,
                &when,
                change.to,
            ))
            .await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": view(
            &drive,
            vehicle.as_ref(),
            owner.as_ref().map(|u| u.email.as_str()),
        ),
    })))
}

#[get("/stats/status")]
pub async fn get_test_drive_status_stats(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req.extensions())?;
    let stats = status_counts(&db, "testdrives").await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true, "data": stats })))
}
