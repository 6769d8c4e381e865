//! Plain-data HTTP request and response types.
//!
//! # Design
//! The agent builds [`HttpRequest`] values and hands them to an injected
//! [`Transport`](crate::Transport), which answers with an [`HttpResponse`].
//! Neither type knows how it travels over the network, so tests can script
//! responses without a server.
//!
//! [`HttpResponse`] is consumed by value when it is normalized, which is what
//! guarantees its body is read exactly once. Bodies are kept as raw bytes;
//! nothing assumes they are UTF-8 until a caller asks for text or JSON.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::Error;

pub const AUTHORIZATION: &str = "Authorization";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const PREFER: &str = "Prefer";
pub const RETURN_REPRESENTATION: &str = "return=representation";

/// HTTP method for a request.
///
/// Methods are case-sensitive tokens. Anything other than the well-known
/// upper-case names, `get` included, is carried as [`HttpMethod::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    /// Any other valid method token (`TRACE`, `PROPFIND`, `get`, ...).
    Other(String),
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Head,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Other(token) => token,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    /// Parses a method token. An empty token is [`Error::MissingMethod`];
    /// one containing characters HTTP does not allow in a method (spaces,
    /// separators, non-ASCII) is [`Error::InvalidMethod`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::MissingMethod);
        }
        if let Some(known) = HttpMethod::ALL.into_iter().find(|method| method.as_str() == s) {
            return Ok(known);
        }
        if s.bytes().all(is_token_byte) {
            Ok(HttpMethod::Other(s.to_string()))
        } else {
            Err(Error::InvalidMethod(s.to_string()))
        }
    }
}

/// `tchar` from RFC 9110, section 5.6.2.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Reason phrase, e.g. `Not Found`. May be empty.
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The body as text, with invalid UTF-8 replaced by `U+FFFD`.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
