//! Request extractors for authentication
//!
//! Pulls the caller's IP and the presented shared secret out of a request.

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

/// Used when neither a forwarded address nor a peer address is available
pub const UNKNOWN_IP: &str = "unknown";

/// First entry of `X-Forwarded-For`, if present and non-empty
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(ToOwned::to_owned)
}

/// Client IP address
///
/// Honors `X-Forwarded-For` (first entry) for deployments behind a reverse
/// proxy, then falls back to the socket peer address.
///
/// # Usage
/// ```ignore
/// async fn handler(ClientIp(ip): ClientIp) -> String {
///     format!("Hello, {ip}")
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_for(&parts.headers) {
            return Ok(ClientIp(ip));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientIp(peer.unwrap_or_else(|| UNKNOWN_IP.to_string())))
    }
}

/// Raw `Authorization` header value, if any
///
/// An empty header counts as missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSecret(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for SharedSecret
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        Ok(SharedSecret(secret))
    }
}
