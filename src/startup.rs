use actix_web::dev::Server;
use actix_web::{error, web, App, HttpRequest, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::configuration::JwtSettings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::AuthGuard;
use crate::routes::{
    delete_account, follow, followers, health_check, list_users, login, logout, me, profile,
    refresh, register, update_profile,
};
use crate::session::SessionManager;
use crate::store::CredentialStore;

// Extraction failures get the same JSON error body as every other failure
fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(ValidationError::Malformed(format!("Invalid request payload: {}", err)))
        .into()
}

fn path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(ValidationError::Malformed(format!("Invalid path: {}", err))).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(ValidationError::Malformed(format!("Invalid query: {}", err))).into()
}

pub fn run(
    listener: TcpListener,
    store: Arc<dyn CredentialStore>,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let sessions = SessionManager::new(store.clone(), jwt_config.clone());
    run_with_sessions(listener, store, sessions)
}

/// Like [`run`] with a pre-built session manager (custom span or hash cost)
pub fn run_with_sessions(
    listener: TcpListener,
    store: Arc<dyn CredentialStore>,
    sessions: SessionManager,
) -> Result<Server, std::io::Error> {
    let jwt_config = sessions.jwt_settings().clone();
    let sessions = web::Data::new(sessions);
    let store: web::Data<dyn CredentialStore> = web::Data::from(store);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(web::JsonConfig::default().error_handler(json_error))
            .app_data(web::PathConfig::default().error_handler(path_error))
            .app_data(web::QueryConfig::default().error_handler(query_error))
            .app_data(sessions.clone())
            .app_data(store.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .service(
                        web::resource("/logout")
                            .wrap(AuthGuard::new(jwt_config.clone()))
                            .route(web::post().to(logout)),
                    ),
            )
            .service(
                web::scope("/users")
                    .wrap(AuthGuard::new(jwt_config.clone()))
                    .route("", web::get().to(list_users))
                    .route("/me", web::get().to(me))
                    .route("/{user_id}", web::get().to(profile))
                    .route("/{user_id}", web::put().to(update_profile))
                    .route("/{user_id}", web::delete().to(delete_account))
                    .route("/{user_id}/follow", web::post().to(follow))
                    .route("/{user_id}/followers", web::get().to(followers)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
