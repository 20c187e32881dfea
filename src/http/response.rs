use std::fmt;

/// Representation of a HTTP response with status code, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The status code.
    pub status: StatusCode,
    /// Header fields in the order they are written.
    pub headers: Vec<(String, String)>,
    /// The body.
    pub body: Vec<u8>,
}

/// Enum containing the status codes the demo server answers with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCode {
    /// 200
    Ok = 200,
    /// 400
    BadRequest = 400,
    /// 404
    NotFound = 404,
    /// 431
    RequestHeaderFieldsTooLarge = 431,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u16)
    }
}

impl StatusCode {
    /// The reason phrase written after the code.
    #[must_use]
    pub const fn reason_phrase(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
        }
    }
}

impl Response {
    /// Serializes the response. Hardcodes HTTP/1.1.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.status.reason_phrase());
        for (key, value) in &self.headers {
            head.push_str(key);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Helper function to remove boilerplate for creating html responses with associated headers.
#[must_use]
pub fn html_response(status: StatusCode, html: &str) -> Response {
    Response {
        status,
        headers: vec![
            ("content-type".to_string(), "text/html".to_string()),
            ("content-length".to_string(), html.len().to_string()),
            ("connection".to_string(), "close".to_string()),
        ],
        body: html.as_bytes().to_vec(),
    }
}
