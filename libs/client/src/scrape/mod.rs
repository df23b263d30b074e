//! Page scraping for the mock login flow.
//!
//! [`links`] is a streaming token scan, [`forms`] and [`title`] parse the
//! whole document, since inputs have to be matched to their enclosing form.

use regex::Regex;

pub mod forms;
pub mod links;
pub mod title;

/// Path fragment of the dex mock connector login link.
pub const AUTH_LINK_FRAGMENT: &str = "/dex/auth/mock";
/// Title of the protected resource once logged in.
pub const SUCCESS_TITLE: &str = "Authorization Successful!";

lazy_static! {
    pub static ref AUTH_LINK_PATTERN: Regex = {
        #[allow(clippy::expect_used)]
        Regex::new(AUTH_LINK_FRAGMENT).expect("invalid auth link pattern")
    };
}
