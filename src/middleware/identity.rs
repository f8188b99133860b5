use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::services::identity::FirebaseAuth;
use crate::utils::ApiError;

/// Verified caller identity. Inserted into request extensions by
/// [`IdentityGate`]; handlers read it back with `web::ReqData<Principal>`.
#[derive(Debug, Clone)]
pub struct Principal {
    pub email: String,
    pub uid: String,
}

/// Rejects requests without a valid Firebase ID token.
///
/// Missing or malformed Authorization header -> 401. Token present but
/// rejected by the verifier -> 403. On success the decoded identity is
/// attached to the request for downstream guards and handlers.
pub struct IdentityGate;

impl<S, B> Transform<S, ServiceRequest> for IdentityGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = IdentityGateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityGateService {
            service: Rc::new(service),
        }))
    }
}

pub struct IdentityGateService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for IdentityGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let token = match parse_bearer(header.as_deref()) {
            Some(token) => token.to_string(),
            None => return Box::pin(ready(Err(ApiError::Unauthenticated.into()))),
        };

        let verifier = match req.app_data::<web::Data<FirebaseAuth>>() {
            Some(verifier) => verifier.clone(),
            None => {
                return Box::pin(ready(Err(ApiError::ExternalService(
                    "identity verifier not configured".to_string(),
                )
                .into())))
            }
        };

        Box::pin(async move {
            let claims = verifier.verify_id_token(&token).await?;
            log::debug!("🔓 Authenticated request from {}", claims.email);

            req.extensions_mut().insert(Principal {
                email: claims.email,
                uid: claims.sub,
            });

            service.call(req).await
        })
    }
}

/// The same check the gate runs, callable from handlers directly. Used on
/// paths where only some methods are authenticated (GET /users is admin,
/// POST /users on the same path is open), so a scope-level gate cannot sit
/// in front.
pub async fn authenticate(
    req: &HttpRequest,
    verifier: &FirebaseAuth,
) -> Result<Principal, ApiError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok());

    let token = parse_bearer(header).ok_or(ApiError::Unauthenticated)?;
    let claims = verifier.verify_id_token(token).await?;

    Ok(Principal {
        email: claims.email,
        uid: claims.sub,
    })
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
fn parse_bearer(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_extracts_token() {
        assert_eq!(parse_bearer(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
    }

    #[test]
    fn test_parse_bearer_rejects_missing_header() {
        assert_eq!(parse_bearer(None), None);
    }

    #[test]
    fn test_parse_bearer_rejects_wrong_scheme() {
        assert_eq!(parse_bearer(Some("Basic dXNlcjpwYXNz")), None);
    }

    #[test]
    fn test_parse_bearer_rejects_empty_token() {
        assert_eq!(parse_bearer(Some("Bearer ")), None);
        assert_eq!(parse_bearer(Some("Bearer    ")), None);
    }
}
