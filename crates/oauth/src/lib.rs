pub mod access;
pub mod clock;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod providers;
pub mod routes;
pub mod state;
pub mod storage;
pub mod types;

#[cfg(test)]
mod test_support;

pub use {
    access::{AuthenticatedClient, FetchOptions, TokenAccess, TokenRefresher},
    clock::{Clock, ManualClock, SystemClock},
    error::{Error, Result},
    flow::OAuthFlow,
    providers::{ProviderConfig, ProviderRegistry},
    routes::OAuthRoutes,
    storage::TokenStore,
    types::{
        AuthorizationRequest, EXPIRY_MARGIN_MS, NEVER_EXPIRES, PendingAuthorization, PkceChallenge,
        Token, TokenSummary, is_never_expiring, serialize_secret,
    },
};
