use brokerlink::auth::AuthError;
use brokerlink::error::{BrokerError, ErrorCategory, RecoverySuggestion};
use pretty_assertions::assert_eq;

#[test]
fn api_status_drives_category() {
    assert_eq!(BrokerError::api(403, "denied").category(), ErrorCategory::Authentication);
    assert_eq!(BrokerError::api(429, "slow down").category(), ErrorCategory::RateLimit);
    assert_eq!(BrokerError::api(502, "bad gateway").category(), ErrorCategory::Server);
    assert_eq!(BrokerError::api(400, "bad input").category(), ErrorCategory::Api);
}

#[test]
fn only_transient_errors_are_retryable() {
    assert!(BrokerError::RateLimited.is_retryable());
    assert!(BrokerError::Timeout(1000).is_retryable());
    assert!(BrokerError::api(503, "down").is_retryable());
    assert!(!BrokerError::Authentication("expired".into()).is_retryable());
    assert!(!BrokerError::InvalidArgument("empty".into()).is_retryable());
}

#[test]
fn recovery_suggestions() {
    assert_eq!(
        BrokerError::Authentication("expired".into()).recovery_suggestion(),
        RecoverySuggestion::Reauthenticate
    );
    assert_eq!(
        BrokerError::Configuration("KITE_API_KEY missing".into()).recovery_suggestion(),
        RecoverySuggestion::CheckConfiguration
    );
    assert_eq!(
        BrokerError::RateLimited.recovery_suggestion(),
        RecoverySuggestion::RetryLater
    );
    assert_eq!(
        BrokerError::NotFound("NSE:NOPE".into()).recovery_suggestion(),
        RecoverySuggestion::CheckRequest
    );
}

#[test]
fn auth_errors_convert_by_kind() {
    let config: BrokerError = AuthError::Configuration("KITE_API_SECRET missing in .env".into()).into();
    assert!(matches!(config, BrokerError::Configuration(_)));

    let rejected: BrokerError = AuthError::Exchange {
        status: Some(403),
        body: "invalid token".into(),
    }
    .into();
    assert!(matches!(rejected, BrokerError::Api { status: 403, .. }));
    assert_eq!(rejected.recovery_suggestion(), RecoverySuggestion::Reauthenticate);

    let timeout: BrokerError = AuthError::CaptureTimeout { secs: 120 }.into();
    assert!(matches!(timeout, BrokerError::Timeout(120_000)));

    let missing: BrokerError = AuthError::MissingToken.into();
    assert_eq!(missing.category(), ErrorCategory::Authentication);
}
