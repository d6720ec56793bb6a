// Application state shared across all modules

use std::sync::Arc;

use crate::auth::google::GoogleStrategy;
use crate::auth::reconcile::IdentityReconciler;
use crate::auth::session::CookieSettings;
use crate::auth::store::UserStore;
use crate::auth::token::TokenCodec;
use crate::common::config::AppConfig;

/// Explicitly constructed collaborators handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenCodec>,
    pub cookies: CookieSettings,
    pub users: Arc<dyn UserStore>,
    pub reconciler: Arc<IdentityReconciler>,
    /// `None` when Google credentials are not configured
    pub google: Option<Arc<GoogleStrategy>>,
}

impl AppState {
    pub fn new(config: &AppConfig, users: Arc<dyn UserStore>) -> Self {
        let tokens = Arc::new(TokenCodec::new(&config.jwt_secret, config.token_ttl));

        let cookies = CookieSettings {
            name: config.session_cookie_name.clone(),
            secure: config.cookie_secure,
            max_age: tokens.ttl(),
        };

        let reconciler = Arc::new(IdentityReconciler::new(
            users.clone(),
            config.reconcile_timeout,
        ));

        let google = config
            .google
            .as_ref()
            .map(|google| Arc::new(GoogleStrategy::new(google)));

        Self {
            tokens,
            cookies,
            users,
            reconciler,
            google,
        }
    }
}
