use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::database::MongoDB;
use crate::middleware::identity::Principal;
use crate::services::access;
use crate::utils::ApiError;

/// Restricts a scope to admin users. Must sit inside [`IdentityGate`]
/// (registered after it) so the [`Principal`] is already attached; the
/// role itself comes from the user document, never from the token.
pub struct RoleGate;

impl<S, B> Transform<S, ServiceRequest> for RoleGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RoleGateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RoleGateService {
            service: Rc::new(service),
        }))
    }
}

pub struct RoleGateService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RoleGateService<S>
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

        let principal = req.extensions().get::<Principal>().cloned();
        let db = req.app_data::<web::Data<MongoDB>>().cloned();

        Box::pin(async move {
            let principal = principal.ok_or(ApiError::Unauthenticated)?;
            let db = db.ok_or_else(|| {
                ApiError::Database("database handle not configured".to_string())
            })?;

            access::require_admin(&db, &principal.email).await?;
            log::debug!("🔐 Admin {} (uid {}) admitted", principal.email, principal.uid);

            service.call(req).await
        })
    }
}
