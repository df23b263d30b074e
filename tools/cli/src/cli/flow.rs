//! The mock login walk.
//!
//! 1. fetch the protected resource, the proxy redirects to the dex login page
//! 2. find the mock connector link on that page
//! 3. follow it to the approval page
//! 4. scrape the grant access form
//! 5. post it back to the approval page url
//! 6. check the final page is the protected resource
//!
//! Only the latest response and the client, with its cookie jar, are carried
//! from one step to the next.

use std::fmt::{Display, Formatter};

use proxycheck_client::scrape::forms::grant_form_params;
use proxycheck_client::scrape::links::find_auth_link;
use proxycheck_client::scrape::title::ensure_authentication_success;
use proxycheck_client::scrape::{AUTH_LINK_FRAGMENT, AUTH_LINK_PATTERN, SUCCESS_TITLE};
use proxycheck_client::{ClientError, ProxyCheckClient};
use regex::Regex;

#[derive(Debug)]
pub enum FlowError {
    Client(ClientError),
    /// The login page, by url, had no link to the mock connector.
    NoAuthLink(String),
    /// The approval page, by url, had no grant access form.
    EmptyGrantForm(String),
    InvalidPattern(regex::Error),
}

impl Display for FlowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowError::Client(e) => write!(f, "{}", e),
            FlowError::NoAuthLink(page) => write!(
                f,
                "No valid link to proceed with authentication was found in the response from {}",
                page
            ),
            FlowError::EmptyGrantForm(page) => {
                write!(f, "No grant access form was found in the response from {}", page)
            }
            FlowError::InvalidPattern(e) => write!(f, "Invalid auth link pattern: {}", e),
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlowError::Client(e) => Some(e),
            FlowError::InvalidPattern(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ClientError> for FlowError {
    fn from(e: ClientError) -> Self {
        FlowError::Client(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOptions {
    /// Regex a link must match to be taken as the mock connector login.
    pub auth_link_pattern: String,
    /// Exact title of the protected resource.
    pub success_title: String,
    /// Refuse to post an empty form when no grant form was found.
    pub strict: bool,
}

impl Default for FlowOptions {
    fn default() -> Self {
        FlowOptions {
            auth_link_pattern: AUTH_LINK_FRAGMENT.to_string(),
            success_title: SUCCESS_TITLE.to_string(),
            strict: false,
        }
    }
}

impl FlowOptions {
    /// The compiled auth link pattern. The default pattern is shared, anything
    /// else is compiled here.
    pub fn auth_link_regex(&self) -> Result<Regex, FlowError> {
        if self.auth_link_pattern == AUTH_LINK_FRAGMENT {
            return Ok(AUTH_LINK_PATTERN.clone());
        }
        Regex::new(&self.auth_link_pattern).map_err(FlowError::InvalidPattern)
    }
}

pub async fn run_flow(client: &ProxyCheckClient, opts: &FlowOptions) -> Result<(), FlowError> {
    let pattern = opts.auth_link_regex()?;

    let response = client.fetch(client.get_url()).await?;
    let login_url = response.url().clone();
    debug!(%login_url, "landed on login page");

    let auth_url = find_auth_link(response, &login_url, &pattern)
        .await?
        .ok_or_else(|| FlowError::NoAuthLink(login_url.to_string()))?;
    info!(%auth_url, "starting mock authentication");

    let response = client.fetch(auth_url.as_str()).await?;
    let approval_url = response.url().clone();

    let params = grant_form_params(response, &approval_url).await?;
    if params.is_empty() {
        if opts.strict {
            return Err(FlowError::EmptyGrantForm(approval_url.to_string()));
        }
        warn!(%approval_url, "no grant access form found, submitting an empty form");
    }

    let response = client.submit(approval_url.as_str(), &params).await?;
    ensure_authentication_success(response, &opts.success_title).await?;
    Ok(())
}
