//! Routes imitating an oauth2-proxy gate with dex (mock connector) behind it.
//!
//! Everything is served from one listener. The proxy issues a csrf cookie on
//! `/oauth2/start` and only accepts the callback if that cookie comes back,
//! then issues the session cookie that `/` requires. A client that does not
//! replay every cookie it was given can't finish the flow.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Query, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use cookie::Cookie;

pub const CSRF_COOKIE: &str = "_oauth2_proxy_csrf";
pub const SESSION_COOKIE: &str = "_oauth2_proxy";
pub const CSRF_TOKEN: &str = "csrf-4f1c2b";
pub const SESSION_TOKEN: &str = "session-9d7e31";
pub const AUTH_CODE: &str = "code-a81f05";
pub const AUTH_REQ_ID: &str = "qh5yrjzwbtnhbv";

/// Ways to make the mock misbehave for negative tests.
#[derive(Debug, Clone)]
pub struct MockBehaviour {
    /// Answer 404 for this path, whatever the method.
    pub fail_path: Option<String>,
    /// Leave the mock connector out of the dex login page.
    pub omit_mock_link: bool,
    /// Leave the grant form out of the approval page, only cancel remains.
    pub omit_grant_form: bool,
    /// Title of the protected resource.
    pub success_title: String,
}

impl Default for MockBehaviour {
    fn default() -> Self {
        MockBehaviour {
            fail_path: None,
            omit_mock_link: false,
            omit_grant_form: false,
            success_title: "Authorization Successful!".to_string(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct MockState {
    behaviour: MockBehaviour,
    requests: Mutex<Vec<String>>,
}

impl MockState {
    pub(crate) fn new(behaviour: MockBehaviour) -> Self {
        MockState {
            behaviour,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, line: String) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}

fn has_cookie(headers: &HeaderMap, name: &str, value: &str) -> bool {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .any(|c| c.name() == name && c.value() == value)
}

fn set_cookie(name: &str, value: &str) -> [(axum::http::HeaderName, String); 1] {
    [(SET_COOKIE, format!("{}={}; Path=/; HttpOnly", name, value))]
}

async fn record_and_fail(
    State(state): State<Arc<MockState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let line = format!("{} {}", request.method(), path);
    trace!(%line, "mock request");
    state.record(line);

    if state.behaviour.fail_path.as_deref() == Some(path.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}

async fn protected_root(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if has_cookie(&headers, SESSION_COOKIE, SESSION_TOKEN) {
        Html(format!(
            "<!DOCTYPE html><html><head><title>{}</title></head><body><p>Welcome</p></body></html>",
            state.behaviour.success_title
        ))
        .into_response()
    } else {
        Redirect::to("/oauth2/start?rd=%2F").into_response()
    }
}

async fn proxy_start() -> Response {
    (
        set_cookie(CSRF_COOKIE, CSRF_TOKEN),
        Redirect::to(&format!(
            "/dex/auth?client_id=oauth2-proxy&redirect_uri=%2Foauth2%2Fcallback&response_type=code&scope=openid+email&state={}",
            CSRF_TOKEN
        )),
    )
        .into_response()
}

async fn proxy_callback(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let code_ok = query.get("code").map(String::as_str) == Some(AUTH_CODE);
    let state_ok = query.get("state").map(String::as_str) == Some(CSRF_TOKEN);
    if code_ok && state_ok && has_cookie(&headers, CSRF_COOKIE, CSRF_TOKEN) {
        (set_cookie(SESSION_COOKIE, SESSION_TOKEN), Redirect::to("/")).into_response()
    } else {
        debug!(?query, "callback rejected");
        (StatusCode::FORBIDDEN, "Login Failed").into_response()
    }
}

async fn dex_login(State(state): State<Arc<MockState>>) -> Html<String> {
    let mock = if state.behaviour.omit_mock_link {
        String::new()
    } else {
        format!(
            r#"<div class="theme-form-row"><a href="/dex/auth/mock?req={}" target="_self">
  <button class="dex-btn theme-btn-provider"><span class="dex-btn-text">Log in with Example</span></button>
</a></div>"#,
            AUTH_REQ_ID
        )
    };
    Html(format!(
        r#"<!DOCTYPE html>
<html><head><title>dex</title></head>
<body class="theme-body">
<div class="theme-panel">
  <h2 class="theme-heading">Log in to dex </h2>
  <div>
    <div class="theme-form-row"><a href="/dex/auth/local?req={req}" target="_self">
      <button class="dex-btn theme-btn-provider"><span class="dex-btn-text">Log in with Email</span></button>
    </a></div>
    {mock}
  </div>
</div>
</body></html>"#,
        req = AUTH_REQ_ID,
        mock = mock
    ))
}

async fn dex_mock_connector(Query(query): Query<HashMap<String, String>>) -> Response {
    match query.get("req") {
        Some(req) if req == AUTH_REQ_ID => {
            Redirect::to(&format!("/dex/approval?req={}", AUTH_REQ_ID)).into_response()
        }
        _ => (StatusCode::BAD_REQUEST, "Invalid request").into_response(),
    }
}

async fn dex_approval_page(State(state): State<Arc<MockState>>) -> Html<String> {
    let form = |approval: &str, label: &str| {
        format!(
            r#"<div><form method="post">
  <input type="hidden" name="req" value="{}"/>
  <input type="hidden" name="approval" value="{}">
  <button type="submit" class="dex-btn">{}</button>
</form></div>"#,
            AUTH_REQ_ID, approval, label
        )
    };
    let grant = if state.behaviour.omit_grant_form {
        String::new()
    } else {
        form("approve", "Grant Access")
    };
    Html(format!(
        r#"<!DOCTYPE html>
<html><head><title>dex</title></head>
<body><div class="theme-panel">
  <h2 class="theme-heading">Grant Access</h2>
  <p>oauth2-proxy would like to:</p>
  <ul><li>View basic profile information</li></ul>
  {}
  {}
</div></body></html>"#,
        grant,
        form("rejected", "Cancel")
    ))
}

async fn dex_approval_submit(Form(form): Form<HashMap<String, String>>) -> Response {
    let req_ok = form.get("req").map(String::as_str) == Some(AUTH_REQ_ID);
    match form.get("approval").map(String::as_str) {
        Some("approve") if req_ok => Redirect::to(&format!(
            "/oauth2/callback?code={}&state={}",
            AUTH_CODE, CSRF_TOKEN
        ))
        .into_response(),
        Some("rejected") if req_ok => Redirect::to(&format!(
            "/oauth2/callback?error=access_denied&state={}",
            CSRF_TOKEN
        ))
        .into_response(),
        _ => {
            debug!(?form, "approval rejected");
            (StatusCode::BAD_REQUEST, "Invalid approval").into_response()
        }
    }
}

pub(crate) fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/", get(protected_root))
        .route("/oauth2/start", get(proxy_start))
        .route("/oauth2/callback", get(proxy_callback))
        .route("/dex/auth", get(dex_login))
        .route("/dex/auth/mock", get(dex_mock_connector))
        .route(
            "/dex/approval",
            get(dex_approval_page).post(dex_approval_submit),
        )
        .layer(middleware::from_fn_with_state(state.clone(), record_and_fail))
        .with_state(state)
}
