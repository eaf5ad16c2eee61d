/// Auth Guard
///
/// Validates the access token from the Authorization header and injects the
/// verified `Identity` into request extensions for route handlers.
/// Validation is stateless: the credential store is never consulted, so an
/// access token stays valid until it expires even after logout.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{decode_token, Identity, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingCredential,
    InvalidCredential,
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::MissingCredential => AppError::Auth(AuthError::MissingToken),
            Rejection::InvalidCredential => AppError::Auth(AuthError::TokenInvalid),
        }
    }
}

/// Turn a raw `Authorization` header value into a verified identity
pub fn authenticate(header: Option<&str>, config: &JwtSettings) -> Result<Identity, Rejection> {
    let token = header
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(Rejection::MissingCredential)?;

    decode_token(token, TokenKind::Access, config)
        .and_then(|claims| claims.identity())
        .map_err(|e| {
            tracing::warn!(error = %e, "Access token rejected");
            Rejection::InvalidCredential
        })
}

/// Middleware for protecting routes
pub struct AuthGuard {
    jwt_config: JwtSettings,
}

impl AuthGuard {
    pub fn new(jwt_config: JwtSettings) -> Self {
        Self { jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGuardService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct AuthGuardService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
}

impl<S, B> Service<ServiceRequest> for AuthGuardService<S>
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
        // Child of the request span opened by the logger middleware
        let span = tracing::info_span!("auth_guard");
        let _entered = span.enter();

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok());

        match authenticate(header, &self.jwt_config) {
            Ok(identity) => {
                tracing::debug!(user_id = %identity.account_id, "Access token validated");
                req.extensions_mut().insert(identity);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(rejection) => {
                tracing::debug!(?rejection, path = %req.path(), "Request rejected");
                let error = AppError::from(rejection);
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}
