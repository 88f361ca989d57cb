//! SIP message builder utilities

use super::message::{SipError, SipMethod, SipRequest, SipResponse};
use rsip::{Header, Headers, Response, StatusCode, Version};
use std::net::SocketAddr;

pub const MAX_FORWARDS: u32 = 70;

/// Builds an outgoing request as RFC 3261 text
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: SipMethod,
    uri: String,
    headers: Vec<(String, String)>,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new(method: SipMethod, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn via(self, local: SocketAddr, branch: &str) -> Self {
        self.header("Via", format!("SIP/2.0/UDP {};branch={};rport", local, branch))
            .header("Max-Forwards", MAX_FORWARDS.to_string())
    }

    pub fn from(self, uri: &str, tag: &str) -> Self {
        self.header("From", format!("<{}>;tag={}", uri, tag))
    }

    pub fn to(self, uri: &str, tag: Option<&str>) -> Self {
        match tag {
            Some(tag) => self.header("To", format!("<{}>;tag={}", uri, tag)),
            None => self.header("To", format!("<{}>", uri)),
        }
    }

    pub fn call_id(self, call_id: &str) -> Self {
        self.header("Call-ID", call_id)
    }

    /// CSeq carrying this request's own method
    pub fn cseq(self, seq: u32) -> Self {
        let method = self.method;
        self.header("CSeq", format!("{} {}", seq, method))
    }

    pub fn contact(self, uri: &str) -> Self {
        self.header("Contact", format!("<{}>", uri))
    }

    pub fn user_agent(self, user_agent: &str) -> Self {
        self.header("User-Agent", user_agent)
    }

    pub fn body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.to_string());
        self.body = body.into();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut head = format!("{} {} SIP/2.0\r\n", self.method, self.uri);
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        if let Some(content_type) = &self.content_type {
            head.push_str(&format!("Content-Type: {}\r\n", content_type));
        }
        head.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));

        let mut data = head.into_bytes();
        data.extend_from_slice(&self.body);
        data
    }
}

/// Build a simple SIP response from a request
pub struct ResponseBuilder {
    status_code: u16,
    headers: Vec<Header>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    /// Echo the dialog-identifying headers of `request`
    pub fn build_for_request(mut self, request: &SipRequest) -> Result<SipResponse, SipError> {
        for header in request.headers().iter() {
            match header {
                Header::Via(_) | Header::From(_) | Header::To(_) | Header::CallId(_) | Header::CSeq(_) => {
                    self.headers.push(header.clone());
                }
                _ => {}
            }
        }

        self.headers
            .push(Header::ContentLength(self.body.len().to_string().into()));

        let response = Response {
            status_code: StatusCode::from(self.status_code),
            headers: Headers::from(self.headers),
            body: self.body,
            version: Version::V2,
        };

        Ok(SipResponse::new(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite() -> Vec<u8> {
        RequestBuilder::new(SipMethod::Invite, "sip:0796026659@10.0.0.1")
            .via("192.168.1.100:5060".parse().unwrap(), "z9hG4bKabc")
            .from("sip:1001@10.0.0.1", "f00d")
            .to("sip:0796026659@10.0.0.1", None)
            .call_id("call-1@192.168.1.100")
            .cseq(1)
            .contact("sip:1001@192.168.1.100:5060")
            .user_agent("sip-dialer")
            .body("application/sdp", "v=0\r\n")
            .build()
    }

    #[test]
    fn test_request_text() {
        let text = String::from_utf8(invite()).unwrap();
        assert!(text.starts_with("INVITE sip:0796026659@10.0.0.1 SIP/2.0\r\n"));
        assert!(text.contains("Via: SIP/2.0/UDP 192.168.1.100:5060;branch=z9hG4bKabc;rport\r\n"));
        assert!(text.contains("Max-Forwards: 70\r\n"));
        assert!(text.contains("CSeq: 1 INVITE\r\n"));
        assert!(text.contains("Content-Type: application/sdp\r\n"));
        assert!(text.ends_with("Content-Length: 5\r\n\r\nv=0\r\n"));
    }

    #[test]
    fn test_request_parses_back() {
        let request = SipRequest::parse(&invite()).unwrap();
        assert_eq!(request.method(), Some(SipMethod::Invite));
        assert_eq!(request.call_id(), Some("call-1@192.168.1.100".to_string()));
        assert_eq!(request.cseq(), Some(1));
        assert_eq!(request.from_tag(), Some("f00d".to_string()));
        assert_eq!(request.to_tag(), None);
        assert_eq!(request.body(), b"v=0\r\n");
    }

    #[test]
    fn test_ack_without_body() {
        let ack = RequestBuilder::new(SipMethod::Ack, "sip:0796026659@10.0.0.5")
            .to("sip:0796026659@10.0.0.1", Some("remote"))
            .cseq(2)
            .build();
        let text = String::from_utf8(ack).unwrap();
        assert!(text.contains("To: <sip:0796026659@10.0.0.1>;tag=remote\r\n"));
        assert!(text.contains("CSeq: 2 ACK\r\n"));
        assert!(!text.contains("Content-Type"));
        assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn test_ok_for_bye() {
        let bye = b"BYE sip:1001@192.168.1.100:5060 SIP/2.0\r\n\
                    Via: SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bKbye\r\n\
                    From: <sip:0796026659@10.0.0.1>;tag=remote\r\n\
                    To: <sip:1001@10.0.0.1>;tag=f00d\r\n\
                    Call-ID: call-1@192.168.1.100\r\n\
                    CSeq: 7 BYE\r\n\
                    Content-Length: 0\r\n\r\n";
        let request = SipRequest::parse(bye).unwrap();
        let response = ResponseBuilder::ok().build_for_request(&request).unwrap();

        let reparsed = SipResponse::parse(&response.to_bytes()).unwrap();
        assert_eq!(reparsed.status_code(), 200);
        assert_eq!(reparsed.call_id(), Some("call-1@192.168.1.100".to_string()));
        assert_eq!(reparsed.cseq(), Some((7, "BYE".to_string())));
    }
}
