//! An [`HttpClient`] that authenticates its own requests.

use std::sync::Arc;

use http::StatusCode;
use regauth_common::HttpClient;

use crate::auth::Auth;

/// Wraps an [`HttpClient`] so every request goes through an [`Auth`].
///
/// Each request gets an `Authorization` header if one is available. When
/// the server answers `401` and its challenges teach the authenticator
/// something new, the request is retried once with the refreshed header.
/// Otherwise the response is returned as-is, so callers still see the `401`.
pub struct AuthClient<C> {
    auth: Arc<Auth<C>>,
}

impl<C> AuthClient<C>
where
    C: Send + Sync + 'static,
{
    /// Wrap an existing authenticator; its client carries the traffic.
    pub fn new(auth: Arc<Auth<C>>) -> Self {
        Self { auth }
    }

    /// The authenticator shared by this client.
    pub fn auth(&self) -> &Arc<Auth<C>> {
        &self.auth
    }
}

impl<C> Clone for AuthClient<C> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<C> HttpClient for AuthClient<C>
where
    C: HttpClient + Send + Sync + 'static,
{
    type Error = C::Error;

    async fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
        let mut retry = request.clone();
        let mut request = request;
        self.auth.update_request(&mut request).await;

        let response = self.auth.client().send_http(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if let Err(_e) = self.auth.handle_response(retry.uri(), &response).await {
            #[cfg(feature = "tracing")]
            tracing::debug!(uri = %retry.uri(), error = %_e, "not retrying unauthorized request");
            return Ok(response);
        }

        self.auth.update_request(&mut retry).await;
        self.auth.client().send_http(retry).await
    }
}
