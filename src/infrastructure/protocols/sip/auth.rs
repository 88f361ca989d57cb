//! SIP Digest Authentication, client side (RFC 2617, RFC 3261 §22)

use super::message::SipError;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

/// The only nonce count ever sent: each challenge is answered exactly once
pub const NONCE_COUNT: &str = "00000001";

/// Account used to answer challenges
#[derive(Debug, Clone)]
pub struct DigestCredentials {
    pub username: String,
    pub password: String,
}

impl DigestCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Parsed `WWW-Authenticate` / `Proxy-Authenticate` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// Selected quality of protection; only `auth` is ever selected
    pub qop: Option<String>,
    pub algorithm: Option<String>,
}

impl AuthChallenge {
    /// Parse a challenge header value such as
    /// `Digest realm="test", nonce="abc123", qop="auth,auth-int"`
    pub fn parse(header_value: &str) -> Result<Self, SipError> {
        let value = header_value.trim();
        let (scheme, rest) = value.split_once(char::is_whitespace).unwrap_or((value, ""));
        if !scheme.eq_ignore_ascii_case("Digest") {
            return Err(SipError::Authentication(format!(
                "Unsupported auth scheme: {}",
                scheme
            )));
        }

        let params = parse_digest_params(rest);

        let realm = params
            .get("realm")
            .cloned()
            .ok_or_else(|| SipError::Authentication("Missing realm in challenge".to_string()))?;
        let nonce = params
            .get("nonce")
            .filter(|n| !n.is_empty())
            .cloned()
            .ok_or_else(|| SipError::Authentication("Missing nonce in challenge".to_string()))?;

        let algorithm = params.get("algorithm").cloned();
        if let Some(alg) = &algorithm {
            if !alg.eq_ignore_ascii_case("MD5") {
                return Err(SipError::UnsupportedAlgorithm(alg.clone()));
            }
        }

        let qop = match params.get("qop") {
            None => None,
            Some(offered) => {
                let auth = offered
                    .split(',')
                    .map(str::trim)
                    .find(|q| q.eq_ignore_ascii_case("auth"));
                match auth {
                    Some(_) => Some("auth".to_string()),
                    None => return Err(SipError::UnsupportedQop(offered.clone())),
                }
            }
        };

        Ok(Self {
            realm,
            nonce,
            opaque: params.get("opaque").cloned(),
            qop,
            algorithm,
        })
    }
}

/// Split `key=value, key="quoted, value"` pairs; keys are lower-cased
fn parse_digest_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    for part in parts {
        if let Some((key, value)) = part.trim().split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().trim_matches('"');
            params.insert(key, value.to_string());
        }
    }

    params
}

/// Calculate digest response
///
/// `HA1 = MD5(username:realm:password)`, `HA2 = MD5(method:uri)`, then
/// `MD5(HA1:nonce:HA2)` or, with qop, `MD5(HA1:nonce:nc:cnonce:qop:HA2)`.
#[allow(clippy::too_many_arguments)]
pub fn calculate_response(
    username: &str,
    password: &str,
    realm: &str,
    nonce: &str,
    method: &str,
    uri: &str,
    qop: Option<&str>,
    nc: Option<&str>,
    cnonce: Option<&str>,
) -> String {
    let ha1 = format!("{:x}", md5::compute(format!("{}:{}:{}", username, realm, password)));
    let ha2 = format!("{:x}", md5::compute(format!("{}:{}", method, uri)));

    let response = if let Some(qop_value) = qop {
        let nc_value = nc.unwrap_or(NONCE_COUNT);
        let cnonce_value = cnonce.unwrap_or("");
        let digest = md5::compute(format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, nonce, nc_value, cnonce_value, qop_value, ha2
        ));
        format!("{:x}", digest)
    } else {
        format!("{:x}", md5::compute(format!("{}:{}:{}", ha1, nonce, ha2)))
    };

    debug!("Calculated digest response for user {}", username);
    response
}

/// Fresh client nonce
fn generate_cnonce() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 8] = rng.gen();
    hex::encode(random_bytes)
}

/// Everything needed to render an `Authorization` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResponse {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub nc: Option<String>,
    pub cnonce: Option<String>,
}

impl DigestResponse {
    /// Answer `challenge` for `method uri`; a new cnonce is drawn when qop applies
    pub fn answer(
        credentials: &DigestCredentials,
        challenge: &AuthChallenge,
        method: &str,
        uri: &str,
    ) -> Self {
        let cnonce = challenge.qop.as_ref().map(|_| generate_cnonce());
        Self::answer_with_cnonce(credentials, challenge, method, uri, cnonce)
    }

    pub fn answer_with_cnonce(
        credentials: &DigestCredentials,
        challenge: &AuthChallenge,
        method: &str,
        uri: &str,
        cnonce: Option<String>,
    ) -> Self {
        let qop = challenge.qop.clone();
        let nc = qop.as_ref().map(|_| NONCE_COUNT.to_string());
        let cnonce = qop.as_ref().and(cnonce);

        let response = calculate_response(
            &credentials.username,
            &credentials.password,
            &challenge.realm,
            &challenge.nonce,
            method,
            uri,
            qop.as_deref(),
            nc.as_deref(),
            cnonce.as_deref(),
        );

        Self {
            username: credentials.username.clone(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: uri.to_string(),
            response,
            opaque: challenge.opaque.clone(),
            qop,
            nc,
            cnonce,
        }
    }

    /// Format as Authorization / Proxy-Authorization header value
    pub fn to_header_value(&self) -> String {
        let mut value = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}", algorithm=MD5"#,
            self.username, self.realm, self.nonce, self.uri, self.response
        );
        if let Some(opaque) = &self.opaque {
            value.push_str(&format!(r#", opaque="{}""#, opaque));
        }
        if let (Some(qop), Some(nc), Some(cnonce)) = (&self.qop, &self.nc, &self.cnonce) {
            value.push_str(&format!(r#", qop={}, nc={}, cnonce="{}""#, qop, nc, cnonce));
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc2617_vector_without_qop() {
        let response = calculate_response(
            "Mufasa",
            "Circle Of Life",
            "testrealm@host.com",
            "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            "GET",
            "/dir/index.html",
            None,
            None,
            None,
        );
        assert_eq!(response, "670fd8c2df070c60b045671b8b24ff02");
    }

    #[test]
    fn test_rfc2617_vector_with_qop() {
        let response = calculate_response(
            "Mufasa",
            "Circle Of Life",
            "testrealm@host.com",
            "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            "GET",
            "/dir/index.html",
            Some("auth"),
            Some("00000001"),
            Some("0a4f113b"),
        );
        assert_eq!(response, "6629fae49393a05397450978507c4ef1");
    }

    #[test]
    fn test_parse_challenge() {
        let challenge = AuthChallenge::parse(
            r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
        )
        .unwrap();

        assert_eq!(challenge.realm, "testrealm@host.com");
        assert_eq!(challenge.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(challenge.qop.as_deref(), Some("auth"));
        assert_eq!(challenge.opaque.as_deref(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
        assert_eq!(challenge.algorithm, None);
    }

    #[test]
    fn test_unsupported_challenges() {
        assert!(matches!(
            AuthChallenge::parse(r#"Digest realm="a", nonce="b", algorithm=MD5-sess"#),
            Err(SipError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            AuthChallenge::parse(r#"Digest realm="a", nonce="b", qop="auth-int""#),
            Err(SipError::UnsupportedQop(_))
        ));
        assert!(matches!(
            AuthChallenge::parse(r#"Digest realm="a""#),
            Err(SipError::Authentication(_))
        ));
        assert!(matches!(
            AuthChallenge::parse(r#"Basic realm="a""#),
            Err(SipError::Authentication(_))
        ));
    }

    #[test]
    fn test_answer_without_qop() {
        let credentials = DigestCredentials::new("1001", "secret");
        let challenge = AuthChallenge::parse(r#"Digest realm="test", nonce="abc123""#).unwrap();
        let answer = DigestResponse::answer(&credentials, &challenge, "INVITE", "sip:0796026659@127.0.0.1");

        assert_eq!(answer.response, "0faa73049625481c310c92b15bdcd6c0");
        assert_eq!(answer.cnonce, None);
        assert_eq!(
            answer.to_header_value(),
            r#"Digest username="1001", realm="test", nonce="abc123", uri="sip:0796026659@127.0.0.1", response="0faa73049625481c310c92b15bdcd6c0", algorithm=MD5"#
        );
    }

    #[test]
    fn test_answer_with_qop_uses_fresh_cnonce() {
        let credentials = DigestCredentials::new("1001", "secret");
        let challenge =
            AuthChallenge::parse(r#"Digest realm="test", nonce="abc123", qop="auth", algorithm=MD5"#)
                .unwrap();

        let first = DigestResponse::answer(&credentials, &challenge, "INVITE", "sip:x@y");
        let second = DigestResponse::answer(&credentials, &challenge, "INVITE", "sip:x@y");

        assert_eq!(first.nc.as_deref(), Some(NONCE_COUNT));
        assert_ne!(first.cnonce, second.cnonce);
        assert_ne!(first.response, second.response);
        assert!(first.to_header_value().contains("qop=auth, nc=00000001, cnonce=\""));
    }
}
