#[derive(Debug, clap::Parser, Clone)]
#[clap(about = "Walk the dex mock login flow through an oauth2 proxy and check the protected resource is reached")]
pub struct ProxyCheckParser {
    /// Enable debugging of the proxycheck tool
    #[clap(short, long, env = "PROXYCHECK_DEBUG")]
    pub debug: bool,
    /// The URL of the protected resource behind the proxy
    #[clap(short = 'H', long = "url", env = "PROXYCHECK_URL",
    value_parser = clap::builder::NonEmptyStringValueParser::new())]
    pub addr: Option<String>,
    /// Path to a toml configuration file
    #[clap(short = 'C', long = "config", env = "PROXYCHECK_CONFIG")]
    pub config_path: Option<PathBuf>,
    /// Ignore any proxies configured in the environment
    #[clap(long = "no-proxy")]
    pub no_proxy: bool,
    /// Fail before submitting if the approval page has no grant access form
    #[clap(long, env = "PROXYCHECK_STRICT")]
    pub strict: bool,
}
