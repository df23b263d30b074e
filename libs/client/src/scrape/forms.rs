//! Grant access form extraction.
//!
//! Unlike link collection this needs the full tree, each `input` has to be
//! tied back to the `form` that contains it.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

use crate::ClientError;

pub const APPROVAL_FIELD: &str = "approval";
pub const APPROVAL_GRANT: &str = "approve";

lazy_static! {
    static ref FORM_SELECTOR: Selector = {
        #[allow(clippy::expect_used)]
        Selector::parse("form").expect("invalid form selector")
    };
    static ref INPUT_SELECTOR: Selector = {
        #[allow(clippy::expect_used)]
        Selector::parse("input").expect("invalid input selector")
    };
}

/// The submittable state of one html form. Names are unique, a later input
/// with the same name replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormParams(BTreeMap<String, String>);

impl FormParams {
    pub fn new() -> Self {
        FormParams::default()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when this is the form that grants access.
    pub fn is_grant(&self) -> bool {
        self.get(APPROVAL_FIELD) == Some(APPROVAL_GRANT)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        FormParams(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn form_params(form: ElementRef<'_>) -> FormParams {
    let mut params = FormParams::new();
    for input in form.select(&INPUT_SELECTOR) {
        let el = input.value();
        params.set(
            el.attr("name").unwrap_or_default(),
            el.attr("value").unwrap_or_default(),
        );
    }
    params
}

/// Parameters of the last form in the document that grants access, or an
/// empty set when there is none.
pub fn grant_form_params_from_html(html: &str) -> FormParams {
    let document = Html::parse_document(html);
    let mut selected = FormParams::new();
    for (idx, form) in document.select(&FORM_SELECTOR).enumerate() {
        let params = form_params(form);
        trace!(form = idx, ?params, "found form");
        if params.is_grant() {
            selected = params;
        }
    }
    if selected.is_empty() {
        warn!("no grant access form found in page");
    }
    selected
}

/// Read the consent page and pull out the grant access form. `base` is not
/// needed to build the parameters, the caller posts back to the page url.
pub async fn grant_form_params(
    response: reqwest::Response,
    _base: &Url,
) -> Result<FormParams, ClientError> {
    let body = response.text().await.map_err(ClientError::Transport)?;
    Ok(grant_form_params_from_html(&body))
}
