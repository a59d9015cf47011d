//! Loopback server capturing the OAuth redirect
//!
//! When the registered redirect URI points at `127.0.0.1` or `localhost`,
//! the browser delivers the authorization result to this server instead of
//! the user pasting it back by hand.

use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Returns true if `redirect_uri` can be served by [`LocalCallbackServer`]
pub fn is_loopback(redirect_uri: &str) -> bool {
    Url::parse(redirect_uri)
        .map(|url| {
            url.scheme() == "http"
                && matches!(url.host_str(), Some("127.0.0.1") | Some("localhost"))
        })
        .unwrap_or(false)
}

/// Minimal HTTP server waiting for a single OAuth redirect
pub struct LocalCallbackServer {
    listener: TcpListener,
}

impl LocalCallbackServer {
    /// Binds to the host and port of `redirect_uri`
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = Url::parse(redirect_uri).context("Invalid redirect URI")?;
        let host = url.host_str().context("Redirect URI has no host")?;
        let port = url.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind callback server to {}:{}", host, port))?;

        info!(host, port, "OAuth callback server listening");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read callback server address")
    }

    /// Serves requests until one carries an authorization result
    ///
    /// # Returns
    /// The request path and query of the redirect, suitable for
    /// `OAuthManager::handle_redirect`
    pub async fn wait_for_redirect(self) -> Result<String> {
        let (tx, mut rx) = mpsc::channel::<String>(1);

        loop {
            tokio::select! {
                Some(uri) = rx.recv() => {
                    info!("Received OAuth redirect");
                    return Ok(uri);
                }
                accepted = self.listener.accept() => {
                    let (stream, _) = accepted.context("Failed to accept callback connection")?;
                    let tx = tx.clone();

                    let service = service_fn(move |req: Request<Incoming>| {
                        let tx = tx.clone();
                        async move {
                            let uri = req.uri().to_string();
                            debug!(uri = %uri, "Callback server received request");

                            if carries_authorization_result(&uri) {
                                let _ = tx.send(uri).await;
                                Ok::<_, Infallible>(html_response(StatusCode::OK, success_html()))
                            } else {
                                Ok(html_response(
                                    StatusCode::NOT_FOUND,
                                    error_html("This page does not carry an authorization result"),
                                ))
                            }
                        }
                    });

                    tokio::spawn(async move {
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            warn!(error = %e, "Callback server connection error");
                        }
                    });
                }
            }
        }
    }
}

fn carries_authorization_result(uri: &str) -> bool {
    Url::parse(&format!("http://localhost{}", uri))
        .map(|url| url.query_pairs().any(|(k, _)| k == "code" || k == "error"))
        .unwrap_or(false)
}

fn html_response(status: StatusCode, html: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(html)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>FeedSync - Authorization Complete</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authorization Complete</h1>
    <p>You can close this window and return to FeedSync.</p>
</body>
</html>"#
        .to_string()
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>FeedSync - Authorization Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authorization Error</h1>
    <p>{}</p>
</body>
</html>"#,
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback("http://127.0.0.1:8400/oauth"));
        assert!(is_loopback("http://localhost:9000/cb"));
        assert!(!is_loopback("https://example.com/oauth"));
        assert!(!is_loopback("feedsync://oauth"));
    }

    #[test]
    fn test_carries_authorization_result() {
        assert!(carries_authorization_result("/oauth?code=abc&state=x"));
        assert!(carries_authorization_result("/oauth?error=access_denied"));
        assert!(!carries_authorization_result("/favicon.ico"));
    }

    #[tokio::test]
    async fn test_wait_for_redirect_returns_uri() {
        let server = LocalCallbackServer::bind("http://127.0.0.1:0/oauth")
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let waiter = tokio::spawn(server.wait_for_redirect());

        let client = reqwest::Client::new();
        let favicon = client
            .get(format!("http://{}/favicon.ico", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(favicon.status(), reqwest::StatusCode::NOT_FOUND);

        let response = client
            .get(format!("http://{}/oauth?code=abc&state=xyz", addr))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let uri = waiter.await.unwrap().unwrap();
        assert_eq!(uri, "/oauth?code=abc&state=xyz");
    }
}
