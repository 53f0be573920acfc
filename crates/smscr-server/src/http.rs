//! Minimal HTTP/1.x request parsing: header block, request line, query string
//! and the cookies the server cares about.

use std::collections::HashMap;
use std::io::{self, Read};

use pct_str::PctStr;

/// Largest accepted request header block.
pub const MAX_HEADER_BYTES: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("I/O error while reading request: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed in the middle of the request header")]
    UnexpectedEof,

    #[error("Request header exceeds {MAX_HEADER_BYTES} bytes")]
    HeaderTooLarge,

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Position in the end-of-header state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    Line,
    Cr,
    CrLf,
    /// Expecting the final `\n` of the blank line.
    Blank,
}

/// Read bytes up to and including the empty line that ends the header block.
///
/// Returns `None` if the peer closed the connection before sending anything.
pub fn read_request_header(reader: &mut impl Read) -> Result<Option<Vec<u8>>, HttpError> {
    let mut header = Vec::new();
    let mut state = HeaderState::Line;
    let mut byte = [0u8; 1];

    loop {
        if reader.read(&mut byte)? == 0 {
            return if header.is_empty() {
                Ok(None)
            } else {
                Err(HttpError::UnexpectedEof)
            };
        }
        if header.len() >= MAX_HEADER_BYTES {
            return Err(HttpError::HeaderTooLarge);
        }
        let b = byte[0];
        header.push(b);

        state = match (state, b) {
            (HeaderState::Blank, b'\n') => return Ok(Some(header)),
            (HeaderState::Line, b'\r') => HeaderState::Cr,
            (HeaderState::Line, b'\n') => HeaderState::Blank,
            (HeaderState::Cr, b'\n') => HeaderState::CrLf,
            (HeaderState::CrLf, b'\r') => HeaderState::Blank,
            _ => HeaderState::Line,
        };
    }
}

/// Split a header block into logical lines, folding continuation lines.
pub fn split_headers(block: &str) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            break;
        }
        match headers.last_mut() {
            Some(previous) if line.starts_with([' ', '\t']) => previous.push_str(line),
            _ => headers.push(line.to_string()),
        }
    }
    headers
}

/// The first line of a request: `GET /path?query HTTP/1.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

impl RequestLine {
    pub fn parse(line: &str) -> Result<Self, HttpError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [method, target, version] = parts.as_slice() else {
            return Err(HttpError::BadRequest(format!("malformed request line '{line}'")));
        };
        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_ascii_uppercase(),
        })
    }

    /// Only `GET` over HTTP/1.0 or HTTP/1.1 is served.
    pub fn validate(&self) -> Result<(), HttpError> {
        if self.method != "GET" {
            return Err(HttpError::BadRequest(format!("method {} not supported", self.method)));
        }
        if self.version != "HTTP/1.0" && self.version != "HTTP/1.1" {
            return Err(HttpError::BadRequest(format!("version {} not supported", self.version)));
        }
        Ok(())
    }

    /// Path and optional query string of the target.
    pub fn path_and_query(&self) -> (&str, Option<&str>) {
        match self.target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.target.as_str(), None),
        }
    }
}

/// Value of the first header called `name` (case-insensitive).
pub fn header_value<'h>(headers: &'h [String], name: &str) -> Option<&'h str> {
    headers.iter().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

/// Host name from the `Host` header with any port removed.
pub fn host(headers: &[String]) -> Option<String> {
    let value = header_value(headers, "Host")?;
    let host = match value.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => value,
    };
    (!host.is_empty()).then(|| host.to_string())
}

/// Value of cookie `name` from all `Cookie` headers, with surrounding quotes removed.
pub fn cookie(headers: &[String], name: &str) -> Option<String> {
    headers
        .iter()
        .skip(1)
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case("Cookie").then_some(value)
        })
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim().trim_matches('"').to_string())
        })
}

/// Decode an `application/x-www-form-urlencoded` query string.
///
/// Every pair must be `key=value` with a non-empty key and value.
pub fn parse_query(query: &str) -> Result<HashMap<String, String>, HttpError> {
    let mut params = HashMap::new();
    if query.is_empty() {
        return Ok(params);
    }
    for pair in query.split('&') {
        let (key, value) = pair
            .split_once('=')
            .filter(|(key, value)| !key.is_empty() && !value.is_empty() && !value.contains('='))
            .ok_or_else(|| HttpError::BadRequest(format!("malformed query parameter '{pair}'")))?;
        params.insert(url_decode(key)?, url_decode(value)?);
    }
    Ok(params)
}

fn url_decode(text: &str) -> Result<String, HttpError> {
    let text = text.replace('+', " ");
    let pct = PctStr::new(&text)
        .map_err(|err| HttpError::BadRequest(format!("invalid percent encoding: {err}")))?;
    Ok(pct.decode())
}
