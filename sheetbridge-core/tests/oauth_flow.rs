//! End-to-end OAuth flows against a local token endpoint, driving the real
//! callback listener the way a browser would.

use axum::Router;
use axum::extract::State;
use axum::routing::post;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;

use sheetbridge_core::config::OAuthConfig;
use sheetbridge_core::oauth::pkce::challenge_for;
use sheetbridge_core::oauth::{
    Authenticator, BrowserLauncher, HttpTokenClient, TokenSet, TokenStore,
};

type Forms = Arc<Mutex<Vec<HashMap<String, String>>>>;

/// Token endpoint that answers both grant types and records every form.
async fn token_endpoint() -> (String, Forms) {
    let forms: Forms = Arc::default();
    let app = Router::new()
        .route(
            "/token",
            post(|State(forms): State<Forms>, body: String| async move {
                let form: HashMap<String, String> = url::form_urlencoded::parse(body.as_bytes())
                    .into_owned()
                    .collect();
                let reply = match form.get("grant_type").map(String::as_str) {
                    Some("authorization_code") => {
                        r#"{"access_token":"ya29.login","refresh_token":"1//fresh","expires_in":3599,"token_type":"Bearer"}"#
                    }
                    _ => r#"{"access_token":"ya29.refreshed","expires_in":3599}"#,
                };
                forms.lock().unwrap().push(form);
                reply
            }),
        )
        .with_state(forms.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/token", addr), forms)
}

/// Hands every authorization URL to the test instead of a real browser.
struct ChannelBrowser(mpsc::UnboundedSender<String>);

impl BrowserLauncher for ChannelBrowser {
    fn open(&self, url: &str) -> Result<(), String> {
        self.0.send(url.to_string()).map_err(|e| e.to_string())
    }
}

struct Harness {
    auth: Authenticator,
    urls: mpsc::UnboundedReceiver<String>,
    forms: Forms,
    token_path: std::path::PathBuf,
    _dir: TempDir,
}

async fn harness(stored: Option<TokenSet>) -> Harness {
    let dir = TempDir::new().unwrap();
    let token_path = dir.path().join("tokens.json");
    if let Some(token) = stored {
        TokenStore::new(&token_path).save(&token).unwrap();
    }

    let (token_url, forms) = token_endpoint().await;
    let config = OAuthConfig {
        client_id: "client-abc".into(),
        token_url,
        callback_port: 0,
        callback_timeout_secs: Some(10),
        token_path: Some(token_path.clone()),
        ..Default::default()
    };
    let http = reqwest::Client::new();
    let (tx, urls) = mpsc::unbounded_channel();
    let auth = Authenticator::with_parts(
        config.clone(),
        http.clone(),
        TokenStore::new(&token_path),
        Arc::new(HttpTokenClient::new(http, &config)),
        Arc::new(ChannelBrowser(tx)),
    );

    Harness {
        auth,
        urls,
        forms,
        token_path,
        _dir: dir,
    }
}

/// Follow the redirect the provider would issue for `auth_url`.
async fn redirect_back(auth_url: &str, code: &str, state: Option<&str>) -> reqwest::StatusCode {
    let auth_url = url::Url::parse(auth_url).unwrap();
    let params: HashMap<String, String> = auth_url.query_pairs().into_owned().collect();

    let mut callback = url::Url::parse(&params["redirect_uri"]).unwrap();
    callback.set_host(Some("127.0.0.1")).unwrap();
    callback
        .query_pairs_mut()
        .append_pair("code", code)
        .append_pair("state", state.unwrap_or(&params["state"]));

    reqwest::get(callback).await.unwrap().status()
}

#[tokio::test]
async fn test_browser_login_exchanges_code_with_matching_verifier() {
    let mut h = harness(None).await;

    let first = tokio::spawn({
        let auth = h.auth.clone();
        async move { auth.ensure_authenticated().await }
    });
    let second = tokio::spawn({
        let auth = h.auth.clone();
        async move { auth.ensure_authenticated().await }
    });

    let auth_url = h.urls.recv().await.unwrap();
    assert_eq!(
        redirect_back(&auth_url, "4/granted", None).await,
        reqwest::StatusCode::OK
    );

    assert_eq!(first.await.unwrap().unwrap().access_token, "ya29.login");
    assert_eq!(second.await.unwrap().unwrap().access_token, "ya29.login");
    assert!(h.urls.try_recv().is_err(), "only one browser window");

    let params: HashMap<String, String> = url::Url::parse(&auth_url)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect();
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["access_type"], "offline");

    let forms = h.forms.lock().unwrap().clone();
    assert_eq!(forms.len(), 1);
    let form = &forms[0];
    assert_eq!(form["grant_type"], "authorization_code");
    assert_eq!(form["code"], "4/granted");
    assert_eq!(form["client_id"], "client-abc");
    assert_eq!(form["redirect_uri"], params["redirect_uri"]);
    assert_eq!(challenge_for(&form["code_verifier"]), params["code_challenge"]);

    let stored = TokenStore::new(&h.token_path).load().unwrap();
    assert_eq!(stored.access_token, "ya29.login");
    assert_eq!(stored.refresh_token.as_deref(), Some("1//fresh"));
}

#[tokio::test]
async fn test_forged_state_fails_without_exchange() {
    let mut h = harness(None).await;
    let pending = tokio::spawn({
        let auth = h.auth.clone();
        async move { auth.ensure_authenticated().await }
    });

    let auth_url = h.urls.recv().await.unwrap();
    assert_eq!(
        redirect_back(&auth_url, "4/granted", Some("forged")).await,
        reqwest::StatusCode::BAD_REQUEST
    );

    assert!(pending.await.unwrap().is_err());
    assert!(h.forms.lock().unwrap().is_empty());
    assert!(!h.token_path.exists());
}

#[tokio::test]
async fn test_expired_stored_token_refreshes_without_browser() {
    let stored = TokenSet::new("ya29.old")
        .with_refresh_token("1//keep")
        .with_expiry_date(1_000);
    let mut h = harness(Some(stored)).await;

    let token = h.auth.ensure_authenticated().await.unwrap();
    assert_eq!(token.access_token, "ya29.refreshed");
    assert_eq!(token.refresh_token.as_deref(), Some("1//keep"));
    assert!(h.urls.try_recv().is_err());

    let forms = h.forms.lock().unwrap().clone();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0]["grant_type"], "refresh_token");
    assert_eq!(forms[0]["refresh_token"], "1//keep");

    let reloaded = TokenStore::new(&h.token_path).load().unwrap();
    assert_eq!(reloaded.access_token, "ya29.refreshed");
    assert_eq!(reloaded.refresh_token.as_deref(), Some("1//keep"));
}

#[tokio::test]
async fn test_shutdown_releases_pending_login() {
    let mut h = harness(None).await;
    let pending = tokio::spawn({
        let auth = h.auth.clone();
        async move { auth.ensure_authenticated().await }
    });

    let auth_url = h.urls.recv().await.unwrap();
    h.auth.shutdown();
    assert!(pending.await.unwrap().is_err());

    // The listener is gone, so the redirect can no longer connect.
    let params: HashMap<String, String> = url::Url::parse(&auth_url)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect();
    let mut callback = url::Url::parse(&params["redirect_uri"]).unwrap();
    callback.set_host(Some("127.0.0.1")).unwrap();
    assert!(reqwest::get(callback).await.is_err());
}
