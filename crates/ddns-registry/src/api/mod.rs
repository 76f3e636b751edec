//! HTTP API surface
//!
//! One router, shared by every listener. Handlers are stateless beyond the
//! [`AppState`] handles they are given.
//!
//! ## Routes
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/providers` | [`handlers::list_providers`] |
//! | POST | `/providers` | [`handlers::create_provider`] |
//! | GET | `/selectedProvider` | [`handlers::selected_provider`] |
//! | GET | `/osuuid` | [`handlers::identity`] |
//! | GET | `/openui` | [`handlers::open_companion`] |
//! | GET | `/shutdown`, `/restart` | 501 |
//! | GET, HEAD, POST, PUT | `/` | 501 |
//! | GET | `/favicon.ico` | static file |

pub mod error;
pub mod handlers;

use axum::http::{Method, header};
use axum::routing::get;
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use crate::cache::ProviderCache;
use crate::companion::CompanionLauncher;
use crate::identity::ServiceIdentity;
use crate::traits::StoreGateway;

pub use error::ApiError;

/// Handles shared by every request handler
#[derive(Clone)]
pub struct AppState {
    /// Durable store
    pub store: Arc<dyn StoreGateway>,
    /// Provider snapshot
    pub cache: Arc<ProviderCache>,
    /// Machine identifier
    pub identity: ServiceIdentity,
    /// Companion launcher
    pub companion: Arc<CompanionLauncher>,
}

impl AppState {
    /// Bundle the shared handles
    pub fn new(
        store: Arc<dyn StoreGateway>,
        cache: Arc<ProviderCache>,
        identity: ServiceIdentity,
        companion: Arc<CompanionLauncher>,
    ) -> Self {
        Self {
            store,
            cache,
            identity,
            companion,
        }
    }
}

/// Build the router served on every listener
pub fn router(state: AppState, favicon_path: &Path) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::not_implemented)
                .post(handlers::not_implemented)
                .put(handlers::not_implemented),
        )
        .route(
            "/providers",
            get(handlers::list_providers).post(handlers::create_provider),
        )
        .route("/selectedProvider", get(handlers::selected_provider))
        .route("/osuuid", get(handlers::identity))
        .route("/openui", get(handlers::open_companion))
        .route("/shutdown", get(handlers::not_implemented))
        .route("/restart", get(handlers::not_implemented))
        .route_service("/favicon.ico", ServeFile::new(favicon_path))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

// Both listeners are local and trusted, so any origin may call with credentials.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::PUT,
            Method::PATCH,
            Method::GET,
            Method::DELETE,
            Method::POST,
        ])
        .allow_headers([header::ORIGIN])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
}
