#![allow(dead_code)]

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    // Session endpoints stay public; they establish or tear down the very
    // credentials the guard below checks for.
    let public_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/token/refresh", post(handlers::auth::refresh_token))
        .route("/logout", post(handlers::auth::logout))
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        );

    let quiz_routes = Router::new()
        .route("/quizzes", get(handlers::quiz::list_quizzes))
        .route("/quizzes/create", post(handlers::quiz::create_quiz))
        .route(
            "/quizzes/{id}",
            get(handlers::quiz::get_quiz)
                .patch(handlers::quiz::update_quiz)
                .delete(handlers::quiz::delete_quiz),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    public_routes
        .merge(quiz_routes)
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::request_id::request_id_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
