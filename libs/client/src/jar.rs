//! A deliberately flat cookie store.
//!
//! Every cookie the server has ever set is replayed on every later request,
//! whatever the target host or path. There is no expiry, scoping or
//! de-duplication. This is enough to carry the proxy's csrf and session
//! cookies through a redirect heavy login flow.

use std::sync::{PoisonError, RwLock};

use cookie::Cookie;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use url::Url;

#[derive(Debug, Default)]
pub struct FlatCookieJar {
    cookies: RwLock<Vec<Cookie<'static>>>,
}

impl FlatCookieJar {
    pub fn new() -> Self {
        FlatCookieJar::default()
    }

    /// Append all cookies in the order given. The url is ignored.
    pub fn store<I>(&self, _url: &Url, cookies: I)
    where
        I: IntoIterator<Item = Cookie<'static>>,
    {
        let mut guard = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        for cookie in cookies {
            trace!(name = %cookie.name(), "storing cookie");
            guard.push(cookie);
        }
    }

    /// Everything stored so far, in insertion order. The url is ignored.
    pub fn retrieve(&self, _url: &Url) -> Vec<Cookie<'static>> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Render cookies as a single `Cookie` request header value.
fn cookie_header(cookies: &[Cookie<'static>]) -> Option<HeaderValue> {
    if cookies.is_empty() {
        return None;
    }

    let joined = cookies
        .iter()
        .map(|c| format!("{}={}", c.name(), c.value()))
        .collect::<Vec<_>>()
        .join("; ");

    HeaderValue::from_str(&joined)
        .map_err(|e| {
            warn!(?e, "unable to encode stored cookies as a header");
        })
        .ok()
}

impl CookieStore for FlatCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let parsed = cookie_headers.filter_map(|hv| {
            let raw = hv.to_str().ok()?;
            match Cookie::parse(raw.to_string()) {
                Ok(c) => Some(c),
                Err(e) => {
                    debug!(?e, %raw, "skipping unparseable set-cookie header");
                    None
                }
            }
        });
        self.store(url, parsed);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        cookie_header(&self.retrieve(url))
    }
}
