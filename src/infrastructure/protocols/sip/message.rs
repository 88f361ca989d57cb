//! SIP message types and parsing

use bytes::Bytes;
use rsip::{Headers, Method, Request, Response, Uri};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SipError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Unsupported qop: {0}")]
    UnsupportedQop(String),
}

impl From<rsip::Error> for SipError {
    fn from(err: rsip::Error) -> Self {
        SipError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for SipError {
    fn from(err: std::io::Error) -> Self {
        SipError::TransportError(err.to_string())
    }
}

/// The methods a dialing user agent sends or has to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SipMethod {
    Invite,
    Ack,
    Cancel,
    Bye,
}

impl SipMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SipMethod::Invite => "INVITE",
            SipMethod::Ack => "ACK",
            SipMethod::Cancel => "CANCEL",
            SipMethod::Bye => "BYE",
        }
    }

    pub fn from_rsip(method: &Method) -> Option<Self> {
        match method {
            Method::Invite => Some(SipMethod::Invite),
            Method::Ack => Some(SipMethod::Ack),
            Method::Cancel => Some(SipMethod::Cancel),
            Method::Bye => Some(SipMethod::Bye),
            _ => None,
        }
    }
}

impl fmt::Display for SipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compact forms from RFC 3261 §7.3.3
fn compact_form(name: &str) -> Option<&'static str> {
    let compact = match name.to_ascii_lowercase().as_str() {
        "call-id" => "i",
        "contact" => "m",
        "content-length" => "l",
        "content-type" => "c",
        "from" => "f",
        "to" => "t",
        "via" => "v",
        _ => return None,
    };
    Some(compact)
}

/// Value of the first header called `name`, compared case-insensitively.
///
/// Goes through the rendered `Name: value` text so typed and untyped rsip
/// headers are handled the same way.
fn find_header(headers: &Headers, name: &str) -> Option<String> {
    let compact = compact_form(name);
    headers.iter().find_map(|header| {
        let rendered = header.to_string();
        let (header_name, value) = rendered.split_once(':')?;
        let header_name = header_name.trim();
        let matches = header_name.eq_ignore_ascii_case(name)
            || compact.is_some_and(|c| header_name.eq_ignore_ascii_case(c));
        matches.then(|| value.trim().to_string())
    })
}

/// `tag` (or any other) parameter of a From/To/Contact value
pub fn header_param(value: &str, param: &str) -> Option<String> {
    // parameters after a name-addr belong to the header, not the URI
    let params = match value.rfind('>') {
        Some(idx) => &value[idx + 1..],
        None => value.split_once(';').map(|(_, rest)| rest).unwrap_or(""),
    };
    params.split(';').find_map(|p| {
        let (key, val) = p.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case(param)
            .then(|| val.trim().to_string())
    })
}

/// URI inside `<...>`, or the bare URI before any parameters
pub fn header_uri(value: &str) -> String {
    match (value.find('<'), value.find('>')) {
        (Some(start), Some(end)) if end > start => value[start + 1..end].trim().to_string(),
        _ => value
            .split(';')
            .next()
            .unwrap_or(value)
            .trim()
            .to_string(),
    }
}

fn parse_cseq(value: &str) -> Option<(u32, String)> {
    let mut parts = value.split_whitespace();
    let seq = parts.next()?.parse().ok()?;
    let method = parts.next()?.to_ascii_uppercase();
    Some((seq, method))
}

/// SIP Request wrapper
#[derive(Debug, Clone)]
pub struct SipRequest {
    pub inner: Request,
}

impl SipRequest {
    pub fn new(inner: Request) -> Self {
        Self { inner }
    }

    pub fn parse(data: &[u8]) -> Result<Self, SipError> {
        let request = rsip::Request::try_from(data)?;
        Ok(Self::new(request))
    }

    pub fn method(&self) -> Option<SipMethod> {
        SipMethod::from_rsip(&self.inner.method)
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    pub fn header(&self, name: &str) -> Option<String> {
        find_header(&self.inner.headers, name)
    }

    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    pub fn call_id(&self) -> Option<String> {
        self.header("Call-ID")
    }

    pub fn from_tag(&self) -> Option<String> {
        self.header("From").and_then(|v| header_param(&v, "tag"))
    }

    pub fn to_tag(&self) -> Option<String> {
        self.header("To").and_then(|v| header_param(&v, "tag"))
    }

    pub fn cseq(&self) -> Option<u32> {
        self.header("CSeq").and_then(|v| parse_cseq(&v)).map(|(seq, _)| seq)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.inner.to_string())
    }
}

/// SIP Response wrapper
#[derive(Debug, Clone)]
pub struct SipResponse {
    pub inner: Response,
}

impl SipResponse {
    pub fn new(inner: Response) -> Self {
        Self { inner }
    }

    pub fn parse(data: &[u8]) -> Result<Self, SipError> {
        let response = rsip::Response::try_from(data)?;
        Ok(Self::new(response))
    }

    pub fn status_code(&self) -> u16 {
        self.inner.status_code.clone().into()
    }

    /// Reason phrase, when rsip kept one
    pub fn reason(&self) -> String {
        let rendered = self.inner.status_code.to_string();
        rendered
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim()
            .to_string()
    }

    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.status_code())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code())
    }

    pub fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    pub fn header(&self, name: &str) -> Option<String> {
        find_header(&self.inner.headers, name)
    }

    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    pub fn call_id(&self) -> Option<String> {
        self.header("Call-ID")
    }

    pub fn to_tag(&self) -> Option<String> {
        self.header("To").and_then(|v| header_param(&v, "tag"))
    }

    /// Sequence number and method of the CSeq header
    pub fn cseq(&self) -> Option<(u32, String)> {
        self.header("CSeq").and_then(|v| parse_cseq(&v))
    }

    pub fn contact_uri(&self) -> Option<String> {
        self.header("Contact").map(|v| header_uri(&v))
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.inner.to_string())
    }
}

/// SIP Message (either request or response)
#[derive(Debug, Clone)]
pub enum SipMessage {
    Request(SipRequest),
    Response(SipResponse),
}

impl SipMessage {
    pub fn parse(data: &[u8]) -> Result<Self, SipError> {
        // Responses start with the version, requests with a method
        if data.starts_with(b"SIP/") {
            return Ok(SipMessage::Response(SipResponse::parse(data)?));
        }

        if let Ok(request) = SipRequest::parse(data) {
            return Ok(SipMessage::Request(request));
        }

        Err(SipError::ParseError(
            "Could not parse as SIP request or response".to_string(),
        ))
    }

    pub fn is_request(&self) -> bool {
        matches!(self, SipMessage::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, SipMessage::Response(_))
    }

    pub fn as_request(&self) -> Option<&SipRequest> {
        match self {
            SipMessage::Request(req) => Some(req),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&SipResponse> {
        match self {
            SipMessage::Response(resp) => Some(resp),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            SipMessage::Request(req) => req.to_bytes(),
            SipMessage::Response(resp) => resp.to_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bye_request() {
        let data = b"BYE sip:1001@192.168.1.100:5060 SIP/2.0\r\n\
                     Via: SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bK776asdhds\r\n\
                     From: <sip:0796026659@pbx.example.com>;tag=a6c85cf\r\n\
                     To: <sip:1001@pbx.example.com>;tag=1928301774\r\n\
                     Call-ID: a84b4c76e66710@192.168.1.100\r\n\
                     CSeq: 231 BYE\r\n\
                     Content-Length: 0\r\n\r\n";

        let msg = SipMessage::parse(data).unwrap();
        assert!(msg.is_request());

        let req = msg.as_request().unwrap();
        assert_eq!(req.method(), Some(SipMethod::Bye));
        assert_eq!(req.call_id(), Some("a84b4c76e66710@192.168.1.100".to_string()));
        assert_eq!(req.cseq(), Some(231));
        assert_eq!(req.from_tag(), Some("a6c85cf".to_string()));
        assert_eq!(req.to_tag(), Some("1928301774".to_string()));
    }

    #[test]
    fn test_parse_invite_response() {
        let data = b"SIP/2.0 200 OK\r\n\
                     Via: SIP/2.0/UDP 192.168.1.100:5060;branch=z9hG4bK776asdhds\r\n\
                     From: <sip:1001@pbx.example.com>;tag=1928301774\r\n\
                     To: <sip:0796026659@pbx.example.com>;tag=a6c85cf\r\n\
                     Call-ID: a84b4c76e66710@192.168.1.100\r\n\
                     CSeq: 2 INVITE\r\n\
                     Contact: <sip:0796026659@10.0.0.5:5080;transport=udp>\r\n\
                     Content-Length: 0\r\n\r\n";

        let msg = SipMessage::parse(data).unwrap();
        assert!(msg.is_response());

        let resp = msg.as_response().unwrap();
        assert_eq!(resp.status_code(), 200);
        assert!(resp.is_success());
        assert_eq!(resp.to_tag(), Some("a6c85cf".to_string()));
        assert_eq!(resp.cseq(), Some((2, "INVITE".to_string())));
        assert_eq!(
            resp.contact_uri(),
            Some("sip:0796026659@10.0.0.5:5080;transport=udp".to_string())
        );
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let data = b"SIP/2.0 401 Unauthorized\r\n\
                     Via: SIP/2.0/UDP 192.168.1.100:5060;branch=z9hG4bK1\r\n\
                     call-id: abc@host\r\n\
                     CSeq: 1 INVITE\r\n\
                     WWW-Authenticate: Digest realm=\"test\", nonce=\"abc123\"\r\n\
                     Content-Length: 0\r\n\r\n";

        let resp = SipResponse::parse(data).unwrap();
        assert_eq!(resp.call_id(), Some("abc@host".to_string()));
        assert_eq!(
            resp.header("www-authenticate"),
            Some("Digest realm=\"test\", nonce=\"abc123\"".to_string())
        );
        assert_eq!(resp.to_tag(), None);
    }

    #[test]
    fn test_header_param_and_uri() {
        assert_eq!(header_param("<sip:a@b;lr>;tag=xyz", "tag"), Some("xyz".to_string()));
        assert_eq!(header_param("<sip:a@b;tag=inner>", "tag"), None);
        assert_eq!(header_param("sip:a@b;tag=bare", "tag"), Some("bare".to_string()));
        assert_eq!(header_uri("\"Bob\" <sip:bob@10.0.0.5>;expires=60"), "sip:bob@10.0.0.5");
        assert_eq!(header_uri("sip:bob@10.0.0.5;expires=60"), "sip:bob@10.0.0.5");
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(SipMessage::parse(b"\x80\x00 not sip").is_err());
    }
}
