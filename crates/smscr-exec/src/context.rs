//! Per-request response context.
//!
//! The context buffers response metadata (status, mime type, cookies, ...) until
//! the first write. That write emits the HTTP header built from the state at that
//! moment; changes made afterwards have no effect on the response.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Persistent parameters of one session, shared between its requests.
pub type SharedParameters = Arc<Mutex<HashMap<String, String>>>;

/// A cookie to be sent with the response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub max_age: Option<u32>,
    pub http_only: bool,
}

impl RcCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            max_age: None,
            http_only: false,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    fn header_line(&self) -> String {
        let mut line = format!("Set-Cookie: {}=\"{}\"", self.name, self.value);
        if let Some(domain) = &self.domain {
            let _ = write!(line, "; Domain={domain}");
        }
        if let Some(path) = &self.path {
            let _ = write!(line, "; Path={path}");
        }
        if let Some(max_age) = self.max_age {
            let _ = write!(line, "; Max-Age={max_age}");
        }
        if self.http_only {
            line.push_str("; HttpOnly");
        }
        line.push_str("\r\n");
        line
    }
}

/// Character sets the response body can be encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Latin1,
}

impl Charset {
    /// Look up a charset by one of its common labels, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "iso-8859-1" | "iso8859-1" | "iso_8859_1" | "latin1" | "latin-1" => Some(Charset::Latin1),
            _ => None,
        }
    }

    /// Canonical name, as used in the `Content-Type` header.
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
        }
    }

    /// Encode `text`; characters outside Latin-1 become `?`.
    pub fn encode(self, text: &str) -> Cow<'_, [u8]> {
        match self {
            Charset::Utf8 => Cow::Borrowed(text.as_bytes()),
            Charset::Latin1 if text.is_ascii() => Cow::Borrowed(text.as_bytes()),
            Charset::Latin1 => Cow::Owned(
                text.chars()
                    .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unsupported encoding '{0}'")]
pub struct UnsupportedEncoding(pub String);

/// Response state and parameter scopes for a single request.
pub struct RequestContext<'a> {
    output: &'a mut dyn Write,
    charset: Charset,
    status_code: u16,
    status_text: String,
    mime_type: String,
    content_length: Option<u64>,
    parameters: HashMap<String, String>,
    persistent_parameters: SharedParameters,
    temporary_parameters: HashMap<String, String>,
    output_cookies: Vec<RcCookie>,
    session_id: Option<String>,
    header_generated: bool,
}

impl<'a> RequestContext<'a> {
    /// A context with status `200 OK`, mime type `text/html` and UTF-8 output.
    pub fn new(
        output: &'a mut dyn Write,
        parameters: HashMap<String, String>,
        persistent_parameters: SharedParameters,
        output_cookies: Vec<RcCookie>,
    ) -> Self {
        Self {
            output,
            charset: Charset::Utf8,
            status_code: 200,
            status_text: "OK".into(),
            mime_type: "text/html".into(),
            content_length: None,
            parameters,
            persistent_parameters,
            temporary_parameters: HashMap::new(),
            output_cookies,
            session_id: None,
            header_generated: false,
        }
    }

    /// A context with no parameters, as used for standalone rendering.
    pub fn standalone(output: &'a mut dyn Write) -> Self {
        Self::new(output, HashMap::new(), SharedParameters::default(), Vec::new())
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    // -- response metadata ------------------------------------------------

    pub fn set_encoding(&mut self, encoding: &str) -> Result<(), UnsupportedEncoding> {
        self.charset =
            Charset::from_label(encoding).ok_or_else(|| UnsupportedEncoding(encoding.to_string()))?;
        Ok(())
    }

    pub fn encoding(&self) -> Charset {
        self.charset
    }

    pub fn set_status_code(&mut self, status_code: u16) {
        self.status_code = status_code;
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn set_status_text(&mut self, status_text: impl Into<String>) {
        self.status_text = status_text.into();
    }

    pub fn set_mime_type(&mut self, mime_type: impl Into<String>) {
        self.mime_type = mime_type.into();
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn set_content_length(&mut self, content_length: Option<u64>) {
        self.content_length = content_length;
    }

    pub fn add_cookie(&mut self, cookie: RcCookie) {
        self.output_cookies.push(cookie);
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn header_generated(&self) -> bool {
        self.header_generated
    }

    // -- request parameters -----------------------------------------------

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Parameter names in sorted order.
    pub fn parameter_names(&self) -> Vec<&str> {
        sorted_keys(&self.parameters)
    }

    // -- persistent (session) parameters ----------------------------------

    pub fn persistent_parameter(&self, name: &str) -> Option<String> {
        self.persistent_parameters.lock().get(name).cloned()
    }

    pub fn set_persistent_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.persistent_parameters.lock().insert(name.into(), value.into());
    }

    pub fn remove_persistent_parameter(&mut self, name: &str) {
        self.persistent_parameters.lock().remove(name);
    }

    // -- temporary parameters ---------------------------------------------

    pub fn temporary_parameter(&self, name: &str) -> Option<&str> {
        self.temporary_parameters.get(name).map(String::as_str)
    }

    pub fn temporary_parameter_names(&self) -> Vec<&str> {
        sorted_keys(&self.temporary_parameters)
    }

    pub fn set_temporary_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.temporary_parameters.insert(name.into(), value.into());
    }

    pub fn remove_temporary_parameter(&mut self, name: &str) {
        self.temporary_parameters.remove(name);
    }

    // -- output -----------------------------------------------------------

    /// Write raw bytes, emitting the header first if needed.
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.ensure_header()?;
        self.output.write_all(data)
    }

    /// Write text in the configured charset, emitting the header first if needed.
    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.ensure_header()?;
        let bytes = self.charset.encode(text);
        self.output.write_all(&bytes)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    fn ensure_header(&mut self) -> io::Result<()> {
        if self.header_generated {
            return Ok(());
        }
        let header = self.render_header();
        self.output.write_all(&Charset::Latin1.encode(&header))?;
        self.header_generated = true;
        Ok(())
    }

    fn render_header(&self) -> String {
        let mut header = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text);
        header.push_str("Content-Type: ");
        header.push_str(&self.mime_type);
        if self.mime_type.starts_with("text/") {
            header.push_str("; charset=");
            header.push_str(self.charset.name());
        }
        header.push_str("\r\n");
        if let Some(length) = self.content_length {
            let _ = write!(header, "Content-Length: {length}\r\n");
        }
        for cookie in &self.output_cookies {
            header.push_str(&cookie.header_line());
        }
        header.push_str("Connection: close\r\n\r\n");
        header
    }
}

fn sorted_keys(map: &HashMap<String, String>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(configure: impl FnOnce(&mut RequestContext<'_>)) -> String {
        let mut out = Vec::new();
        {
            let mut ctx = RequestContext::standalone(&mut out);
            configure(&mut ctx);
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_default_header() {
        let out = render(|ctx| ctx.write_str("hi").unwrap());
        assert_eq!(
            out,
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=UTF-8\r\nConnection: close\r\n\r\nhi"
        );
    }

    #[test]
    fn test_header_with_length_and_cookies() {
        let out = render(|ctx| {
            ctx.set_status_code(404);
            ctx.set_status_text("Not Found");
            ctx.set_mime_type("image/png");
            ctx.set_content_length(Some(3));
            ctx.add_cookie(
                RcCookie::new("sid", "ABC")
                    .with_domain("localhost")
                    .with_path("/")
                    .http_only(),
            );
            ctx.add_cookie(RcCookie::new("korisnik", "perica").with_max_age(3600));
            ctx.write(b"abc").unwrap();
        });
        assert_eq!(
            out,
            "HTTP/1.1 404 Not Found\r\n\
             Content-Type: image/png\r\n\
             Content-Length: 3\r\n\
             Set-Cookie: sid=\"ABC\"; Domain=localhost; Path=/; HttpOnly\r\n\
             Set-Cookie: korisnik=\"perica\"; Max-Age=3600\r\n\
             Connection: close\r\n\r\nabc"
        );
    }

    #[test]
    fn test_mutation_after_header_is_ignored() {
        let out = render(|ctx| {
            ctx.write_str("a").unwrap();
            assert!(ctx.header_generated());
            ctx.set_status_code(500);
            ctx.set_mime_type("text/plain");
            ctx.write_str("b").unwrap();
        });
        assert!(out.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/html;"));
        assert!(out.ends_with("\r\n\r\nab"));
        assert_eq!(out.matches("HTTP/1.1").count(), 1);
    }

    #[test]
    fn test_latin1_encoding() {
        let mut out = Vec::new();
        {
            let mut ctx = RequestContext::standalone(&mut out);
            ctx.set_encoding("iso-8859-1").unwrap();
            ctx.write_str("čćž é").unwrap();
        }
        let body = &out[out.len() - 5..];
        assert_eq!(body, &[b'?', b'?', b'?', b' ', 0xE9]);
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("charset=ISO-8859-1"));
    }

    #[test]
    fn test_unsupported_encoding() {
        let mut out = Vec::new();
        let mut ctx = RequestContext::standalone(&mut out);
        assert_eq!(
            ctx.set_encoding("EBCDIC"),
            Err(UnsupportedEncoding("EBCDIC".into()))
        );
        assert_eq!(ctx.encoding(), Charset::Utf8);
    }

    #[test]
    fn test_parameter_scopes() {
        let mut out = Vec::new();
        let persistent = SharedParameters::default();
        let params = HashMap::from([("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())]);
        let mut ctx = RequestContext::new(&mut out, params, persistent.clone(), Vec::new());

        assert_eq!(ctx.parameter("a"), Some("1"));
        assert_eq!(ctx.parameter_names(), vec!["a", "b"]);

        ctx.set_persistent_parameter("bgcolor", "FFFFFF");
        assert_eq!(persistent.lock().get("bgcolor").map(String::as_str), Some("FFFFFF"));
        ctx.remove_persistent_parameter("bgcolor");
        assert_eq!(ctx.persistent_parameter("bgcolor"), None);

        ctx.set_temporary_parameter("zbroj", "3");
        assert_eq!(ctx.temporary_parameter("zbroj"), Some("3"));
        ctx.remove_temporary_parameter("zbroj");
        assert!(ctx.temporary_parameter_names().is_empty());
    }

    #[test]
    fn test_charset_labels() {
        assert_eq!(Charset::from_label("UTF-8"), Some(Charset::Utf8));
        assert_eq!(Charset::from_label("Latin1"), Some(Charset::Latin1));
        assert_eq!(Charset::from_label("windows-1250"), None);
    }
}
