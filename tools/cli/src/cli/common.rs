use std::path::PathBuf;

use proxycheck_client::{
    read_optional_config, ClientError, ProxyCheckClient, ProxyCheckClientBuilder,
    ProxyCheckClientConfig,
};
use serde::Deserialize;

use crate::flow::FlowOptions;
use crate::ProxyCheckParser;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/proxycheck/config.toml";

/// Everything the config file may set. Each field left out keeps its
/// default or command line value.
#[derive(Debug, Default, Deserialize)]
pub struct ProxyCheckConfig {
    pub uri: Option<String>,
    pub auth_link_pattern: Option<String>,
    pub success_title: Option<String>,
    pub strict: Option<bool>,
}

impl ProxyCheckConfig {
    pub fn client_config(&self) -> ProxyCheckClientConfig {
        ProxyCheckClientConfig {
            uri: self.uri.clone(),
        }
    }

    pub fn apply(&self, opts: FlowOptions) -> FlowOptions {
        FlowOptions {
            auth_link_pattern: self
                .auth_link_pattern
                .clone()
                .unwrap_or(opts.auth_link_pattern),
            success_title: self.success_title.clone().unwrap_or(opts.success_title),
            strict: self.strict.unwrap_or(opts.strict),
        }
    }
}

impl ProxyCheckParser {
    fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Read the config file. A missing file yields the empty config.
    pub fn read_config(&self) -> Result<ProxyCheckConfig, ClientError> {
        read_optional_config(self.config_path())
    }

    /// Defaults, then the config file, then the command line.
    pub fn to_client(&self, config: &ProxyCheckConfig) -> Result<ProxyCheckClient, ClientError> {
        let client_builder =
            ProxyCheckClientBuilder::new().apply_config_options(config.client_config());

        let client_builder = match &self.addr {
            Some(a) => client_builder.address(a.to_string()),
            None => client_builder,
        };

        let client_builder = match self.no_proxy {
            true => client_builder.no_proxy(),
            false => client_builder,
        };

        debug!(
            "Loaded configuration from {:?} - client builder state: {}",
            self.config_path(),
            &client_builder
        );
        client_builder.build()
    }

    pub fn flow_options(&self, config: &ProxyCheckConfig) -> FlowOptions {
        let opts = config.apply(FlowOptions::default());
        FlowOptions {
            strict: opts.strict || self.strict,
            ..opts
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::io::Write;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("proxycheck-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join(name);
        let mut f = fs::File::create(&path).expect("create config");
        f.write_all(contents.as_bytes()).expect("write config");
        path
    }

    #[test]
    fn test_one_config_read_feeds_client_and_flow() {
        let path = write_config(
            "flow.toml",
            r#"
uri = "http://proxy.example.com:4180"
success_title = "Welcome"
strict = true
"#,
        );
        let opt = ProxyCheckParser::try_parse_from([
            "proxycheck",
            "--config",
            path.to_str().expect("utf8 path"),
        ])
        .expect("args should parse");

        let config = opt.read_config().expect("config should load");
        assert_eq!(config.uri.as_deref(), Some("http://proxy.example.com:4180"));
        assert_eq!(config.auth_link_pattern, None);

        let flow = opt.flow_options(&config);
        assert_eq!(flow.success_title, "Welcome");
        assert_eq!(flow.auth_link_pattern, "/dex/auth/mock");
        assert!(flow.strict);

        let client = opt.to_client(&config).expect("client should build");
        assert_eq!(client.get_url(), "http://proxy.example.com:4180");

        // The command line address wins over the file.
        let opt = ProxyCheckParser::try_parse_from([
            "proxycheck",
            "-C",
            path.to_str().expect("utf8 path"),
            "-H",
            "http://cli.example.com",
        ])
        .expect("args should parse");
        let config = opt.read_config().expect("config should load");
        let client = opt.to_client(&config).expect("client should build");
        assert_eq!(client.get_url(), "http://cli.example.com");
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let opt = ProxyCheckParser::try_parse_from([
            "proxycheck",
            "--config",
            "/nonexistent/proxycheck/config.toml",
        ])
        .expect("args should parse");
        let config = opt.read_config().expect("missing file is not an error");
        assert_eq!(opt.flow_options(&config), FlowOptions::default());
        let client = opt.to_client(&config).expect("client should build");
        assert_eq!(client.get_url(), proxycheck_client::DEFAULT_URI);
    }

    #[test]
    fn test_bad_config_is_error() {
        let path = write_config("bad.toml", "strict = \"maybe\"\n");
        let opt = ProxyCheckParser::try_parse_from([
            "proxycheck",
            "--config",
            path.to_str().expect("utf8 path"),
        ])
        .expect("args should parse");
        assert!(matches!(
            opt.read_config(),
            Err(ClientError::ConfigParseIssue(_))
        ));
    }

    #[test]
    fn test_strict_flag() {
        let opt = ProxyCheckParser::try_parse_from([
            "proxycheck",
            "--config",
            "/nonexistent/proxycheck/config.toml",
            "--strict",
        ])
        .expect("args should parse");
        assert!(opt.flow_options(&ProxyCheckConfig::default()).strict);

        // The file can't turn a command line --strict back off.
        let config = ProxyCheckConfig {
            strict: Some(false),
            ..Default::default()
        };
        assert!(opt.flow_options(&config).strict);
    }
}
