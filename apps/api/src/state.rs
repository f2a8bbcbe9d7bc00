//! Shared API state.

use rihlah_application::RateLimitService;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Rate limiting application service.
    pub rate_limit_service: RateLimitService,
    /// Bearer token required by the admin routes.
    pub admin_token: String,
}
