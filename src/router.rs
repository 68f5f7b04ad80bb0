use axum::{
    middleware::from_fn,
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config;
use crate::handlers::{auth, companies, jobs, system};
use crate::middleware::{authenticate_jwt, ensure_admin, ensure_logged_in};
use crate::state::AppState;

/// Full application router. `authenticate_jwt` wraps every route so the
/// `ensure_*` route layers always see the request's identity.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .merge(auth_routes())
        .merge(company_routes())
        .merge(job_routes())
        .layer(from_fn(authenticate_jwt));

    if config::config().api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    if config::config().security.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/whoami", get(auth::whoami).route_layer(from_fn(ensure_logged_in)))
}

fn company_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/companies",
            post(companies::create)
                .route_layer(from_fn(ensure_admin))
                .get(companies::list),
        )
        .route(
            "/companies/:handle",
            patch(companies::update)
                .delete(companies::delete)
                .route_layer(from_fn(ensure_admin))
                .get(companies::get),
        )
}

fn job_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/jobs",
            post(jobs::create).route_layer(from_fn(ensure_admin)).get(jobs::list),
        )
        .route(
            "/jobs/:id",
            patch(jobs::update)
                .delete(jobs::delete)
                .route_layer(from_fn(ensure_admin))
                .get(jobs::get),
        )
}
