//! Shared plumbing for the HTTP API providers

use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::domain::mailing::{MailerError, TransportError};

/// Upper bound for a single provider API call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the client every HTTP provider sends through
pub fn client() -> Result<Client, MailerError> {
    Ok(Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build the HTTP client")?)
}

/// Maps a failed request to a [`TransportError`]
pub fn request_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(REQUEST_TIMEOUT)
    } else {
        TransportError::CallFailed(err.into())
    }
}

/// Passes successful responses through and turns the rest into errors
pub async fn check(response: Response) -> Result<Response, TransportError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    Err(status_error(status, &body))
}

/// Decodes the body of a response that [`check`] accepted.
///
/// The provider has already taken the message at this point, so an unreadable
/// body is logged and yields [`None`] rather than failing the delivery.
pub async fn accepted<T: DeserializeOwned>(response: Response, provider: &str) -> Option<T> {
    match response.text().await {
        Ok(body) => decode_accepted(&body, provider),
        Err(e) => {
            warn!(provider, "could not read an accepted response: {}", e);
            None
        }
    }
}

fn decode_accepted<T: DeserializeOwned>(body: &str, provider: &str) -> Option<T> {
    serde_json::from_str(body)
        .map_err(|e| warn!(provider, body, "could not decode an accepted response: {}", e))
        .ok()
}

/// Maps a non-success status to a [`TransportError`]
pub fn status_error(status: StatusCode, body: &str) -> TransportError {
    let err = anyhow!("provider responded with {}: {}", status, body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TransportError::AuthenticationFailed(err)
        }
        _ => TransportError::CallFailed(err),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use testresult::TestResult;

    use crate::domain::mailing::ErrorKind;

    use super::*;

    #[test]
    fn test_unauthorized_is_auth_failure() {
        let err = status_error(StatusCode::UNAUTHORIZED, "bad key");

        assert_eq!(err.kind(), ErrorKind::TransportAuth);
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn test_forbidden_is_auth_failure() {
        assert_eq!(
            status_error(StatusCode::FORBIDDEN, "").kind(),
            ErrorKind::TransportAuth
        );
    }

    #[test]
    fn test_server_error_is_call_failure() {
        let err = status_error(StatusCode::BAD_GATEWAY, "upstream down");

        assert_eq!(err.kind(), ErrorKind::TransportCall);
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_client_builds() {
        assert!(client().is_ok());
    }

    #[derive(Debug, Deserialize)]
    struct Queued {
        id: String,
    }

    #[test]
    fn test_decode_accepted() {
        let queued: Option<Queued> = decode_accepted(r#"{"id": "<20240101.1@mg>"}"#, "test");

        assert_eq!(queued.map(|q| q.id), Some("<20240101.1@mg>".to_string()));
    }

    #[test]
    fn test_undecodable_accepted_body_is_not_an_error() {
        let queued: Option<Queued> = decode_accepted("<html>OK</html>", "test");

        assert!(queued.is_none());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout() -> TestResult {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            // accept and never answer
            if let Ok((stream, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(stream);
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_millis(200))
            .build()?;

        let result = client
            .get(format!("http://{}/", addr))
            .send()
            .await
            .map_err(request_error);

        assert!(matches!(
            result,
            Err(TransportError::Timeout(timeout)) if timeout == REQUEST_TIMEOUT
        ));

        Ok(())
    }
}
