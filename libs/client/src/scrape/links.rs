//! Anchor collection over a single forward pass of the html token stream.
//!
//! No tree is built here. The tokenizer is fed bytes as they arrive off the
//! wire and every `href` seen on an `a` tag (start or end) is kept, in
//! document order, duplicates and all. The contents of raw text elements such
//! as `script` and `textarea` are text, anchors inside them are not links.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use regex::Regex;
use url::Url;

use crate::ClientError;

#[derive(Debug, Default)]
struct AnchorSink {
    links: Vec<String>,
}

impl TokenSink for AnchorSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        let Token::TagToken(tag) = token else {
            return TokenSinkResult::Continue;
        };

        if &*tag.name == "a" {
            for attr in tag.attrs.iter() {
                if &*attr.name.local == "href" {
                    self.links.push(attr.value.to_string());
                }
            }
        }

        // Without a tree builder nobody else switches the tokenizer into the
        // raw text states, so do it here for the elements that need it.
        if tag.kind != TagKind::StartTag || tag.self_closing {
            return TokenSinkResult::Continue;
        }
        match &*tag.name {
            "script" => TokenSinkResult::RawData(RawKind::ScriptData),
            "title" | "textarea" => TokenSinkResult::RawData(RawKind::Rcdata),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" | "noscript" => {
                TokenSinkResult::RawData(RawKind::Rawtext)
            }
            "plaintext" => TokenSinkResult::Plaintext,
            _ => TokenSinkResult::Continue,
        }
    }
}

/// Decode as much of `bytes` as possible. An incomplete multi-byte sequence
/// at the tail is left for the next chunk, invalid sequences become U+FFFD.
/// Returns the decoded text and how many bytes were consumed.
fn decode_utf8_prefix(bytes: &[u8]) -> (String, usize) {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                out.push_str(s);
                return (out, bytes.len());
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &rest[valid + bad..];
                    }
                    None => return (out, bytes.len() - (rest.len() - valid)),
                }
            }
        }
    }
}

pub struct LinkCollector {
    tokenizer: Tokenizer<AnchorSink>,
    input: BufferQueue,
    pending: Vec<u8>,
}

impl Default for LinkCollector {
    fn default() -> Self {
        LinkCollector::new()
    }
}

impl LinkCollector {
    pub fn new() -> Self {
        LinkCollector {
            tokenizer: Tokenizer::new(AnchorSink::default(), TokenizerOpts::default()),
            input: BufferQueue::default(),
            pending: Vec::new(),
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.input.push_back(StrTendril::from_slice(text));
        let _ = self.tokenizer.feed(&mut self.input);
    }

    /// Feed the next chunk of the document. Chunk boundaries may fall anywhere,
    /// including inside a tag or a multi-byte character.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let (text, used) = decode_utf8_prefix(&self.pending);
        self.pending.drain(..used);
        self.push_text(&text);
    }

    /// End of stream. Returns every href collected, in document order.
    pub fn finish(mut self) -> Vec<String> {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.push_text(&tail);
        }
        self.tokenizer.end();
        std::mem::take(&mut self.tokenizer.sink.links)
    }
}

/// Collect links from a complete document held in memory.
pub fn collect_links(body: &[u8]) -> Vec<String> {
    let mut collector = LinkCollector::new();
    collector.feed(body);
    collector.finish()
}

/// Collect links while draining the response body. A failure part way
/// through the body ends the scan and what was found so far is returned.
pub async fn links_from_response(mut response: reqwest::Response) -> Vec<String> {
    let mut collector = LinkCollector::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => collector.feed(&chunk),
            Ok(None) => break,
            Err(e) => {
                warn!(?e, "response body ended early, returning partial link list");
                break;
            }
        }
    }
    let links = collector.finish();
    trace!(?links, "collected links");
    links
}

/// Return the first link matching `pattern`, resolved against `base`.
pub fn find_matching_link(
    links: &[String],
    base: &Url,
    pattern: &Regex,
) -> Result<Option<Url>, ClientError> {
    match links.iter().find(|link| pattern.is_match(link)) {
        Some(link) => base.join(link).map(Some).map_err(ClientError::UrlParse),
        None => Ok(None),
    }
}

/// Locate the link that starts the mock connector login, made absolute
/// against `base`. `Ok(None)` if the page has no such link.
pub async fn find_auth_link(
    response: reqwest::Response,
    base: &Url,
    pattern: &Regex,
) -> Result<Option<Url>, ClientError> {
    let links = links_from_response(response).await;
    find_matching_link(&links, base, pattern)
}
