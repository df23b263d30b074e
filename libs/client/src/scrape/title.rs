use scraper::{Html, Selector};

use crate::ClientError;

lazy_static! {
    static ref TITLE_SELECTOR: Selector = {
        #[allow(clippy::expect_used)]
        Selector::parse("title").expect("invalid title selector")
    };
}

/// Inner html of the first `title` element, or an empty string.
pub fn page_title(html: &str) -> String {
    Html::parse_document(html)
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.inner_html())
        .unwrap_or_default()
}

/// Exact, byte for byte, comparison of the page title.
pub fn verify_title(html: &str, expected: &str) -> Result<(), ClientError> {
    let found = page_title(html);
    if found == expected {
        Ok(())
    } else {
        Err(ClientError::UnexpectedTitle {
            found,
            expected: expected.to_string(),
        })
    }
}

/// Check that the final page is the protected resource.
pub async fn ensure_authentication_success(
    response: reqwest::Response,
    expected: &str,
) -> Result<(), ClientError> {
    let body = response.text().await.map_err(ClientError::Transport)?;
    verify_title(&body, expected)?;
    println!("Success!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::SUCCESS_TITLE;

    #[test]
    fn test_success_title_accepted() {
        let html = "<html><head><title>Authorization Successful!</title></head></html>";
        assert!(verify_title(html, SUCCESS_TITLE).is_ok());
        // Works for a bare fragment too, the parser supplies the head.
        assert!(verify_title("<title>Authorization Successful!</title>", SUCCESS_TITLE).is_ok());
    }

    #[test]
    fn test_title_is_exact() {
        for title in [
            "authorization successful!",
            "Authorization Successful",
            " Authorization Successful!",
            "Authorization Successful! ",
            "Sign In",
        ] {
            let html = format!("<title>{}</title>", title);
            let err = verify_title(&html, SUCCESS_TITLE).expect_err("title should not match");
            assert!(matches!(
                err,
                ClientError::UnexpectedTitle { ref found, ref expected }
                    if found == title && expected == SUCCESS_TITLE
            ));
        }
    }

    #[test]
    fn test_first_title_and_missing_title() {
        assert_eq!(page_title("<title>one</title><title>two</title>"), "one");
        assert_eq!(page_title("<p>no title</p>"), "");
        assert!(verify_title("<p>no title</p>", SUCCESS_TITLE).is_err());
    }

    #[test]
    fn test_mismatch_display_shows_both() {
        let err = verify_title("<title>Sign In</title>", SUCCESS_TITLE)
            .expect_err("title should not match");
        let rendered = err.to_string();
        assert!(rendered.contains("Sign In"));
        assert!(rendered.contains(SUCCESS_TITLE));
    }
}
