#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

#[macro_use]
extern crate lazy_static;

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

pub use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub mod jar;
pub mod scrape;

pub use crate::jar::FlatCookieJar;
pub use crate::scrape::forms::FormParams;

/// Protected resource used when nothing else is configured.
pub const DEFAULT_URI: &str = "http://172.30.0.4:4180";

#[derive(Debug)]
pub enum ClientError {
    Transport(reqwest::Error),
    /// Status other than 200, and the url that produced it.
    Http(StatusCode, String),
    UrlParse(url::ParseError),
    UnexpectedTitle { found: String, expected: String },
    ConfigParseIssue(String),
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "Transport error: {}", e),
            ClientError::Http(status, url) => {
                write!(f, "Unexpected response code {} from {}", status.as_u16(), url)
            }
            ClientError::UrlParse(e) => write!(f, "Unable to resolve url: {}", e),
            ClientError::UnexpectedTitle { found, expected } => {
                write!(f, "Unexpected HTML response ({}) != ({})", found, expected)
            }
            ClientError::ConfigParseIssue(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Transport(e) => Some(e),
            ClientError::UrlParse(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProxyCheckClientConfig {
    pub uri: Option<String>,
}

/// Parse a toml config file into `T`. A missing file gives `T::default()`.
pub fn read_optional_config<T, P>(config_path: P) -> Result<T, ClientError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path> + std::fmt::Debug,
{
    debug!("Attempting to load configuration from {:#?}", &config_path);

    if !config_path.as_ref().exists() {
        debug!("{:?} does not exist", config_path);
        return Ok(T::default());
    };

    let mut f = match File::open(&config_path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Configuration file {:#?} not found, skipping.", &config_path);
            return Ok(T::default());
        }
        Err(e) => {
            error!(?e, "Unable to open config file {:#?}", &config_path);
            return Err(ClientError::ConfigParseIssue(format!("{:?}", e)));
        }
    };

    let mut contents = String::new();
    f.read_to_string(&mut contents).map_err(|e| {
        error!("{:?}", e);
        ClientError::ConfigParseIssue(format!("{:?}", e))
    })?;

    toml::from_str(contents.as_str()).map_err(|e| {
        error!(?e, "Unable to parse config file {:#?}", &config_path);
        ClientError::ConfigParseIssue(format!("{:?}", e))
    })
}

#[derive(Debug, Clone)]
pub struct ProxyCheckClientBuilder {
    address: Option<String>,
    use_system_proxies: bool,
}

impl Default for ProxyCheckClientBuilder {
    fn default() -> Self {
        ProxyCheckClientBuilder::new()
    }
}

impl Display for ProxyCheckClientBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.address {
            Some(value) => writeln!(f, "address: {}", value)?,
            None => writeln!(f, "address: unset")?,
        }
        writeln!(f, "use_system_proxies: {}", self.use_system_proxies)
    }
}

/// A cookie replaying http client that walks the proxy login flow.
///
/// Cloning the underlying reqwest client is cheap, but each
/// [`ProxyCheckClient`] owns exactly one cookie jar. Use
/// [`ProxyCheckClient::new_session`] for a clean jar.
#[derive(Debug)]
pub struct ProxyCheckClient {
    pub(crate) client: reqwest::Client,
    pub(crate) addr: String,
    pub(crate) origin: Url,
    pub(crate) jar: Arc<FlatCookieJar>,
    pub(crate) builder: ProxyCheckClientBuilder,
}

impl ProxyCheckClientBuilder {
    pub fn new() -> Self {
        ProxyCheckClientBuilder {
            address: None,
            use_system_proxies: true,
        }
    }

    pub fn apply_config_options(self, pcc: ProxyCheckClientConfig) -> Self {
        let address = match pcc.uri {
            Some(uri) => Some(uri),
            None => {
                debug!("No URI in config supplied to apply_config_options");
                self.address
            }
        };
        ProxyCheckClientBuilder {
            address,
            use_system_proxies: self.use_system_proxies,
        }
    }

    /// Load options from a toml file if it exists. A missing file leaves the
    /// builder untouched, a file that can't be read or parsed is an error.
    pub fn read_options_from_optional_config<P: AsRef<Path> + std::fmt::Debug>(
        self,
        config_path: P,
    ) -> Result<Self, ClientError> {
        let config: ProxyCheckClientConfig = read_optional_config(config_path)?;
        Ok(self.apply_config_options(config))
    }

    pub fn address(self, address: String) -> Self {
        ProxyCheckClientBuilder {
            address: Some(address),
            use_system_proxies: self.use_system_proxies,
        }
    }

    pub fn no_proxy(self) -> Self {
        ProxyCheckClientBuilder {
            address: self.address,
            use_system_proxies: false,
        }
    }

    /// Generates a useragent header based on the package name and version
    pub fn user_agent() -> &'static str {
        static APP_USER_AGENT: &str =
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
        APP_USER_AGENT
    }

    /// Build the client ready for usage. Without an address the default
    /// protected resource is used.
    pub fn build(self) -> Result<ProxyCheckClient, ClientError> {
        let address = self
            .address
            .clone()
            .unwrap_or_else(|| DEFAULT_URI.to_string());

        let uri = Url::parse(&address).map_err(|e| {
            error!(?e, %address, "invalid address");
            ClientError::UrlParse(e)
        })?;
        let origin = Url::parse(&uri.origin().ascii_serialization()).map_err(ClientError::UrlParse)?;

        let jar = Arc::new(FlatCookieJar::new());

        let client_builder = reqwest::Client::builder()
            .user_agent(ProxyCheckClientBuilder::user_agent())
            .cookie_provider(jar.clone());

        let client_builder = match self.use_system_proxies {
            true => client_builder,
            false => client_builder.no_proxy(),
        };

        let client = client_builder.build().map_err(ClientError::Transport)?;

        Ok(ProxyCheckClient {
            client,
            addr: address,
            origin,
            jar,
            builder: self,
        })
    }
}

impl ProxyCheckClient {
    pub fn get_origin(&self) -> &Url {
        &self.origin
    }

    pub fn get_url(&self) -> &str {
        self.addr.as_str()
    }

    pub fn jar(&self) -> &FlatCookieJar {
        &self.jar
    }

    /// A fresh client with the same options and an empty cookie jar.
    pub fn new_session(&self) -> Result<Self, ClientError> {
        self.builder.clone().build()
    }

    fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let final_url = response.url().to_string();
        debug!(status = %response.status(), %final_url, "response");
        match response.status() {
            StatusCode::OK => Ok(response),
            unexpect => Err(ClientError::Http(unexpect, final_url)),
        }
    }

    /// GET `dest`, following redirects. Anything other than a final 200 is an
    /// error.
    pub async fn fetch(&self, dest: &str) -> Result<reqwest::Response, ClientError> {
        println!("GET {}...", dest);
        let response = self
            .client
            .get(dest)
            .send()
            .await
            .map_err(ClientError::Transport)?;
        Self::expect_ok(response)
    }

    /// POST `params` as a urlencoded form to `dest`, following redirects.
    pub async fn submit(
        &self,
        dest: &str,
        params: &FormParams,
    ) -> Result<reqwest::Response, ClientError> {
        println!("POST {}...", dest);
        debug!(
            fields = ?params.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            "submitting form"
        );
        let response = self
            .client
            .post(dest)
            .form(params)
            .send()
            .await
            .map_err(ClientError::Transport)?;
        Self::expect_ok(response)
    }
}
