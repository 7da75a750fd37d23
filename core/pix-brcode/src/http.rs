//! HTTP client abstraction for fetching JWS payloads and JWKS documents.
//!
//! The core never owns sockets or timeouts: callers supply an
//! implementation of [`HttpClient`], and its errors pass through
//! [`PixError::Transport`](crate::PixError::Transport) untouched. A
//! [`reqwest`]-backed implementation ships behind the default-on
//! `reqwest-client` feature.
//!
//! # Thread safety
//!
//! The trait requires `Send + Sync`: the loader may be called from any
//! number of parallel workers sharing one client.

use crate::error::TransportError;

/// A plain HTTP response: status, body and headers.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
    /// Response headers as `(name, value)` pairs.
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    /// True when the status is in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking HTTP GET, as performed by the dynamic PIX loader.
///
/// Implementations are expected to carry their own timeout policy;
/// cancellation surfaces as a transport error.
pub trait HttpClient: Send + Sync {
    /// Fetch `url` and return the raw response.
    ///
    /// Non-2xx responses are returned as-is, not as errors; the loader
    /// decides how to treat them.
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Blanket implementation allowing `&T` where `T: HttpClient`.
impl<T: HttpClient + ?Sized> HttpClient for &T {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        (*self).get(url)
    }
}

/// Blanket implementation allowing `Box<T>` where `T: HttpClient`.
impl<T: HttpClient + ?Sized> HttpClient for Box<T> {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.as_ref().get(url)
    }
}

#[cfg(feature = "reqwest-client")]
mod reqwest_client {
    use super::{HttpClient, HttpResponse};
    use crate::error::TransportError;

    /// [`HttpClient`] backed by `reqwest::blocking`.
    #[derive(Debug, Default, Clone)]
    pub struct ReqwestClient {
        inner: reqwest::blocking::Client,
    }

    impl ReqwestClient {
        /// Create a client with reqwest's defaults.
        pub fn new() -> Self {
            Self::default()
        }

        /// Wrap a pre-configured blocking client (timeouts, proxies).
        pub fn from_client(inner: reqwest::blocking::Client) -> Self {
            Self { inner }
        }
    }

    impl HttpClient for ReqwestClient {
        fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
            let response = self.inner.get(url).send()?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let body = response.bytes()?.to_vec();
            Ok(HttpResponse {
                status,
                body,
                headers,
            })
        }
    }
}

#[cfg(feature = "reqwest-client")]
pub use reqwest_client::ReqwestClient;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_covers_the_2xx_range() {
        for status in [200, 201, 204, 299] {
            let response = HttpResponse {
                status,
                body: Vec::new(),
                headers: Vec::new(),
            };
            assert!(response.is_success());
        }
        for status in [199, 300, 301, 404, 500] {
            let response = HttpResponse {
                status,
                body: Vec::new(),
                headers: Vec::new(),
            };
            assert!(!response.is_success());
        }
    }
}
