use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod holds;
pub mod middleware;
pub mod slots;
pub mod state;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new().merge(auth::routes()).merge(slots::routes());

    let client = Router::new()
        .merge(slots::stream_routes())
        .merge(holds::routes())
        .merge(bookings::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::client_auth_middleware,
        ));

    let admin = Router::new().merge(admin::routes()).route_layer(
        axum::middleware::from_fn_with_state(state.clone(), middleware::auth::admin_auth_middleware),
    );

    Router::new()
        .merge(public)
        .merge(client)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
