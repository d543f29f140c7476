//! Broker login flows and access-token storage.

pub mod callback;
pub mod error;
#[cfg(feature = "kite")]
pub mod flow;
pub mod providers;
pub mod store;
pub mod token;
#[cfg(feature = "angel")]
pub mod totp;

pub use callback::{CallbackListener, CallbackTarget, CaptureOutcome};
pub use error::AuthError;
#[cfg(feature = "kite")]
pub use flow::{
    build_login_url, require_access_token, stored_access_token, Destinations, PersistReport,
    TokenExchangeFlow, TokenSource,
};
pub use store::{EnvFile, FileTokenStore, PendingEnvWrite, TokenStore};
pub use token::{AccessToken, Credentials, KiteSession, RequestToken};
