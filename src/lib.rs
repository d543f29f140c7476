//! brokerlink: session helpers and clients for Zerodha Kite Connect and
//! Angel One SmartAPI.
//!
//! The centrepiece is the Kite login flow: build the login URL, catch the
//! `request_token` on a loopback listener (or let the operator paste it),
//! exchange it for an access token and persist that token for later runs.
//!
//! # Quick Start
//!
//! ```no_run
//! use brokerlink::auth::{CaptureOutcome, Destinations, TokenExchangeFlow};
//! use brokerlink::config::BrokerConfig;
//!
//! # async fn example() -> Result<(), brokerlink::auth::AuthError> {
//! let config = BrokerConfig::from_env();
//! let flow = TokenExchangeFlow::new(config.kite.clone())?;
//! println!("log in at {}", flow.login_url()?);
//!
//! let target = flow.callback_target("127.0.0.1", 8765).expect("loopback redirect");
//! let outcome = flow.capture_automatic(&target, std::time::Duration::from_secs(300)).await?;
//! if let CaptureOutcome::Captured(request_token) = outcome {
//!     let session = flow.exchange(request_token).await?;
//!     flow.persist(&session.access_token, &Destinations::from_config(&config.kite, true))?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod provider;
pub mod types;

#[cfg(feature = "ticker")]
pub mod ticker;

#[cfg(feature = "cli")]
pub mod cli;
