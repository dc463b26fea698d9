//! Conversions from external infrastructure errors into client-facing types.

use std::error::Error as _;

use reqwest::Error as HttpError;
use statline_common::error::TransportFailureKind;
use statline_domain::ClientError;

use crate::http::TransportError;

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

/// Typed failure kind of a reqwest error
///
/// Checked most specific first: a timed-out connect is a timeout.
fn failure_kind(err: &HttpError) -> TransportFailureKind {
    if err.is_timeout() {
        TransportFailureKind::Timeout
    } else if err.is_connect() {
        TransportFailureKind::Connect
    } else if err.is_body() {
        TransportFailureKind::Body
    } else if err.is_decode() {
        TransportFailureKind::Decode
    } else if err.is_request() || err.is_builder() || err.is_redirect() {
        TransportFailureKind::Request
    } else {
        TransportFailureKind::Other
    }
}

impl From<HttpError> for TransportError {
    fn from(value: HttpError) -> Self {
        let kind = failure_kind(&value);
        // reqwest's Display hides the root cause; keep the whole chain.
        let mut message = value.to_string();
        let mut source = value.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        TransportError::new(kind, message)
    }
}

/* -------------------------------------------------------------------------- */
/* Configuration failures → ClientError */
/* -------------------------------------------------------------------------- */

pub(crate) fn config_error(context: &str, err: impl std::fmt::Display) -> ClientError {
    ClientError::Config(format!("{context}: {err}"))
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Duration;

    use reqwest::blocking::Client;
    use statline_common::error::ErrorCategory;

    use super::*;

    #[test]
    fn refused_connection_maps_to_network() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let client = Client::builder().no_proxy().timeout(Duration::from_secs(5)).build().unwrap();
        let error = client.get(format!("http://{addr}")).send().unwrap_err();

        let mapped = TransportError::from(error);
        assert_eq!(mapped.kind, TransportFailureKind::Connect);
        assert_eq!(mapped.category(), ErrorCategory::Network);
    }

    #[test]
    fn invalid_url_maps_to_request() {
        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get("not a url").send().unwrap_err();

        let mapped = TransportError::from(error);
        assert_eq!(mapped.kind, TransportFailureKind::Request);
    }

    #[test]
    fn config_error_keeps_context() {
        let err = config_error("Invalid TOML format", "expected `=`");
        assert_eq!(err.to_string(), "Configuration error: Invalid TOML format: expected `=`");
    }
}
