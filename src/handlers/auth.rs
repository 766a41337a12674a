use actix_web::{get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use mongodb::bson::{doc, DateTime};
use mongodb::Database;
use validator::Validate;

use crate::auth;
use crate::config::Config;
use crate::email::{self, Mailer};
use crate::errors::{is_duplicate_key, ApiError};
use crate::middleware::auth::require_auth;
use crate::models::user::{
    ContactDto, ForgotPasswordDto, LoginDto, RegisterDto, ResetPasswordDto, Role, User,
};

const RESET_TOKEN_TTL_MINUTES: i64 = 10;

fn reset_expiry(now: chrono::DateTime<Utc>) -> DateTime {
    DateTime::from_millis((now + Duration::minutes(RESET_TOKEN_TTL_MINUTES)).timestamp_millis())
}

#[post("/register")]
pub async fn register(
    db: web::Data<Database>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
    payload: web::Json<RegisterDto>,
) -> Result<HttpResponse, ApiError> {
    payload.validate().map_err(ApiError::from)?;

    let users = db.collection::<User>("users");
    if users
        .find_one(doc! { "email": &payload.email }, None)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let hashed_password = hash(payload.password.as_bytes(), DEFAULT_COST)?;
    let mut user = User {
        id: None,
        email: payload.email.clone(),
        password: hashed_password,
        role: Role::User,
        is_active: true,
        reset_password_token: None,
        reset_password_expire: None,
        favorites: Vec::new(),
        created_at: DateTime::from_millis(Utc::now().timestamp_millis()),
    };

    // The unique index closes the check-then-insert race.
    let inserted = users.insert_one(&user, None).await.map_err(|err| {
        if is_duplicate_key(&err) {
            ApiError::Conflict("An account with this email already exists".to_string())
        } else {
            ApiError::from(err)
        }
    })?;
    let account_id = inserted.inserted_id.as_object_id().ok_or(ApiError::Internal)?;
    user.id = Some(account_id);

    let token = auth::issue(account_id, &config.jwt_secret, config.jwt_expire_hours)?;

    mailer
        .send_best_effort(email::welcome(&user.email, &config.frontend_url))
        .await;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "token": token,
        "user": user.profile(),
    })))
}

#[post("/login")]
pub async fn login(
    db: web::Data<Database>,
    config: web::Data<Config>,
    payload: web::Json<LoginDto>,
) -> Result<HttpResponse, ApiError> {
    payload.validate().map_err(ApiError::from)?;

    // Identical failure for unknown email and wrong password, so the endpoint
    // cannot be used to enumerate accounts.
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "email": &payload.email }, None)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify(&payload.password, &user.password).unwrap_or(false) {
        return Err(ApiError::InvalidCredentials);
    }

    let account_id = user.id.ok_or(ApiError::Internal)?;
    let token = auth::issue(account_id, &config.jwt_secret, config.jwt_expire_hours)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "token": token,
        "user": user.profile(),
    })))
}

#[post("/forgotpassword")]
pub async fn forgot_password(
    db: web::Data<Database>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
    payload: web::Json<ForgotPasswordDto>,
) -> Result<HttpResponse, ApiError> {
    payload.validate().map_err(ApiError::from)?;

    let users = db.collection::<User>("users");
    let user = match users
        .find_one(doc! { "email": &payload.email }, None)
        .await?
    {
        Some(user) => user,
        // Same success response whether or not the account exists.
        None => {
            return Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "msg": "If your email address is registered, a reset link has been sent",
            })))
        }
    };
    let account_id = user.id.ok_or(ApiError::Internal)?;

    let (raw_token, hashed_token) = auth::generate_reset_token();
    users
        .update_one(
            doc! { "_id": account_id },
            doc! { "$set": {
                "resetPasswordToken": &hashed_token,
                "resetPasswordExpire": reset_expiry(Utc::now()),
            }},
            None,
        )
        .await?;

    let reset_url = format!("{}/resetpassword/{}", config.frontend_url, raw_token);

    // A reset link that never arrives must not stay live: on delivery failure
    // the token is cleared and the caller sees the error.
    if let Err(err) = mailer.send(&email::password_reset(&user.email, &reset_url)).await {
        users
            .update_one(
                doc! { "_id": account_id },
                doc! { "$unset": { "resetPasswordToken": "", "resetPasswordExpire": "" } },
                None,
            )
            .await?;
        return Err(err);
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "msg": "Reset email sent",
    })))
}

#[put("/resetpassword/{token}")]
pub async fn reset_password(
    db: web::Data<Database>,
    path: web::Path<String>,
    payload: web::Json<ResetPasswordDto>,
) -> Result<HttpResponse, ApiError> {
    payload.validate().map_err(ApiError::from)?;

    let hashed_token = auth::hash_reset_token(&path);
    let now = DateTime::from_millis(Utc::now().timestamp_millis());

    let users = db.collection::<User>("users");
    let user = users
        .find_one(
            doc! {
                "resetPasswordToken": &hashed_token,
                "resetPasswordExpire": { "$gt": now },
            },
            None,
        )
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid or expired reset token".to_string()))?;
    let account_id = user.id.ok_or(ApiError::Internal)?;

    let new_hash = hash(payload.password.as_bytes(), DEFAULT_COST)?;

    // Password swap and token clearing are one document update, so the token
    // can never be replayed after a successful reset.
    users
        .update_one(
            doc! { "_id": account_id },
            doc! {
                "$set": { "password": new_hash },
                "$unset": { "resetPasswordToken": "", "resetPasswordExpire": "" },
            },
            None,
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "msg": "Password reset successfully",
    })))
}

#[get("/me")]
pub async fn get_me(req: HttpRequest, db: web::Data<Database>) -> Result<HttpResponse, ApiError> {
    let identity = require_auth(&req.extensions())?;

    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": identity.id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": user.profile(),
    })))
}

#[post("/contact")]
pub async fn contact(
    mailer: web::Data<Mailer>,
    payload: web::Json<ContactDto>,
) -> Result<HttpResponse, ApiError> {
    payload.validate().map_err(ApiError::from)?;

    // Forwarding the message is the primary operation here, so a delivery
    // failure is surfaced, unlike the notification paths.
    let notification = email::contact_message(
        mailer.operator(),
        &payload.name,
        &payload.email,
        &payload.subject,
        &payload.message,
    );
    mailer.send(&notification).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "msg": "Your message has been sent",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_window_is_exactly_ten_minutes() {
        let now = Utc::now();
        let expiry = reset_expiry(now);
        assert_eq!(
            expiry.timestamp_millis() - now.timestamp_millis(),
            10 * 60 * 1000
        );
    }
}
