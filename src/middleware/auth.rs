use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Extensions, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

use crate::auth;
use crate::config::Config;
use crate::errors::ApiError;
use crate::models::user::{Role, User};

/// Identity resolved by the access guard and attached to the request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: ObjectId,
    pub email: String,
    pub role: Role,
}

/// Access guard. Requests carrying a bearer token get their identity resolved
/// against the credential store before any handler runs; requests without one
/// pass through anonymously and are rejected later by `require_auth` where it
/// matters. Fails fast with distinct 401 messages per token failure, and
/// 404 when the referenced account no longer exists.
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::to_string);

            if let Some(token) = token {
                let config = req
                    .app_data::<web::Data<Config>>()
                    .cloned()
                    .ok_or_else(|| Error::from(ApiError::Internal))?;
                let db = req
                    .app_data::<web::Data<Database>>()
                    .cloned()
                    .ok_or_else(|| Error::from(ApiError::Internal))?;

                let account_id = auth::verify(&token, &config.jwt_secret)
                    .map_err(|err| Error::from(ApiError::from(err)))?;

                let user = db
                    .collection::<User>("users")
                    .find_one(doc! { "_id": account_id }, None)
                    .await
                    .map_err(|err| Error::from(ApiError::from(err)))?
                    .ok_or_else(|| {
                        Error::from(ApiError::NotFound(
                            "Account for this token no longer exists".to_string(),
                        ))
                    })?;

                req.extensions_mut().insert(AuthenticatedUser {
                    id: user.id.unwrap_or(account_id),
                    email: user.email,
                    role: user.role,
                });
            }

            service.call(req).await
        })
    }
}

pub fn require_auth(extensions: &Extensions) -> Result<AuthenticatedUser, ApiError> {
    extensions
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthenticated("Not authorized, no token".to_string()))
}

/// Role gate composed after identity resolution.
pub fn require_role(
    extensions: &Extensions,
    allowed: &[Role],
) -> Result<AuthenticatedUser, ApiError> {
    let user = require_auth(extensions)?;
    if allowed.contains(&user.role) {
        Ok(user)
    } else {
        Err(ApiError::Forbidden(format!(
            "Role '{}' is not authorized to access this resource",
            user.role.as_str()
        )))
    }
}

pub fn require_admin(extensions: &Extensions) -> Result<AuthenticatedUser, ApiError> {
    require_role(extensions, &[Role::Admin])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_identity(role: Role) -> Extensions {
        let mut extensions = Extensions::new();
        extensions.insert(AuthenticatedUser {
            id: ObjectId::new(),
            email: "a@x.com".into(),
            role,
        });
        extensions
    }

    #[test]
    fn missing_identity_is_unauthenticated() {
        let extensions = Extensions::new();
        assert!(matches!(
            require_auth(&extensions),
            Err(ApiError::Unauthenticated(_))
        ));
        // The role gate composes after identity resolution, so the failure
        // stays a 401, not a 403.
        assert!(matches!(
            require_admin(&extensions),
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[test]
    fn role_outside_allowed_set_is_forbidden() {
        let extensions = with_identity(Role::User);
        assert!(matches!(
            require_admin(&extensions),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn allowed_role_resolves_identity() {
        let extensions = with_identity(Role::Admin);
        let user = require_admin(&extensions).unwrap();
        assert_eq!(user.role, Role::Admin);

        let extensions = with_identity(Role::User);
        assert!(require_role(&extensions, &[Role::User, Role::Admin]).is_ok());
    }
}
