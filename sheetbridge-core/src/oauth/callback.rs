//! Loopback listener that receives the provider's authorization redirect.
//!
//! A listener lives for exactly one authentication attempt:
//! [`CallbackListener::bind`] claims the port, [`CallbackListener::wait`]
//! serves until the first request on the callback path settles the attempt,
//! then closes every connection and releases the port before returning.
//! Requests on any other path get a 404 and leave the attempt pending.

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::OAuthError;

/// How long in-flight responses get to drain once the attempt is settled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Successful</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h1>Authorization Successful!</h1>
<p>You can now close this window and return to your application.</p>
</body>
</html>"#;

/// Query parameters the provider may send to the callback path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string. Empty values count as absent.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Decide the outcome of a callback request.
///
/// Checks run in a fixed order: provider error, missing code, then state.
/// The code is only returned once the state has matched.
pub fn evaluate_callback(params: &CallbackParams, expected_state: &str) -> Result<String, OAuthError> {
    if let Some(reason) = &params.error {
        return Err(OAuthError::AuthorizationDenied {
            reason: reason.clone(),
        });
    }
    let Some(code) = &params.code else {
        return Err(OAuthError::CodeNotReceived);
    };
    let state = params.state.as_deref().unwrap_or_default();
    if !states_match(state, expected_state) {
        return Err(OAuthError::StateMismatch);
    }
    Ok(code.clone())
}

fn states_match(received: &str, expected: &str) -> bool {
    received.as_bytes().ct_eq(expected.as_bytes()).into()
}

type Outcome = Result<String, OAuthError>;

struct CallbackState {
    expected_state: String,
    tx: Mutex<Option<oneshot::Sender<Outcome>>>,
}

/// A bound, not yet serving, callback listener.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    path: String,
}

impl CallbackListener {
    /// Bind the loopback port. Failure is fatal for the attempt.
    pub async fn bind(host: &str, port: u16, path: &str) -> Result<Self, OAuthError> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| OAuthError::Bind {
                addr: addr.clone(),
                message: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| OAuthError::Bind {
            addr: addr.clone(),
            message: e.to_string(),
        })?;

        debug!(addr = %local_addr, path, "OAuth callback listener bound");
        Ok(Self {
            listener,
            local_addr,
            path: path.to_string(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the attempt settles, the timeout elapses, or `cancel` fires.
    ///
    /// The port is released before this returns, whatever the outcome.
    pub async fn wait(
        self,
        expected_state: String,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Outcome {
        let Self {
            listener,
            local_addr,
            path,
        } = self;
        let (tx, rx) = oneshot::channel::<Outcome>();
        let state = Arc::new(CallbackState {
            expected_state,
            tx: Mutex::new(Some(tx)),
        });
        let app = build_callback_router(&path, state);

        let stop = CancellationToken::new();
        let server = {
            let stop = stop.clone();
            tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { stop.cancelled().await })
                    .await
            })
        };

        info!(addr = %local_addr, "Waiting for OAuth callback");

        let outcome = tokio::select! {
            received = rx => received.unwrap_or(Err(OAuthError::Cancelled)),
            _ = cancel.cancelled() => Err(OAuthError::Cancelled),
            _ = sleep_or_forever(timeout) => Err(OAuthError::CallbackTimeout {
                secs: timeout.map(|d| d.as_secs()).unwrap_or_default(),
            }),
        };

        stop.cancel();
        close_server(server).await;
        debug!(addr = %local_addr, "OAuth callback listener closed");

        if let Err(e) = &outcome {
            warn!(error = %e, "OAuth callback did not yield a code");
        }
        outcome
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Let the server drain in-flight responses, then force it down.
async fn close_server(mut server: tokio::task::JoinHandle<std::io::Result<()>>) {
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(Ok(Err(e))) => warn!(error = %e, "OAuth callback server error"),
        Ok(_) => {}
        Err(_) => {
            debug!("OAuth callback server did not drain in time, aborting");
            server.abort();
            let _ = server.await;
        }
    }
}

fn build_callback_router(path: &str, state: Arc<CallbackState>) -> Router {
    Router::new()
        .route(path, axum::routing::any(handle_callback))
        .fallback(handle_unknown_path)
        .with_state(state)
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let params = CallbackParams::from_query(query.as_deref());
    let outcome = evaluate_callback(&params, &state.expected_state);

    let Some(sender) = state.tx.lock().await.take() else {
        // A second request raced the first; the attempt is already settled.
        return html_response(
            StatusCode::BAD_REQUEST,
            error_page("This authorization request has already been handled."),
        );
    };

    let response = match &outcome {
        Ok(_) => html_response(StatusCode::OK, SUCCESS_PAGE.to_string()),
        Err(e) => html_response(StatusCode::BAD_REQUEST, error_page(&e.to_string())),
    };
    let _ = sender.send(outcome);
    response
}

async fn handle_unknown_path() -> Response {
    debug!("OAuth callback listener received request for unknown path");
    (
        StatusCode::NOT_FOUND,
        [(header::CONNECTION, "close")],
        "Not found",
    )
        .into_response()
}

fn html_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONNECTION, "close")], Html(body)).into_response()
}

fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h1>Authorization Failed</h1>
<p>{}</p>
<p>Please close this window and try again.</p>
</body>
</html>"#,
        escape_html(message)
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
