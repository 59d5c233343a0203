//! Client Authentication
//!
//! HTTP Basic credential checking for the RPC endpoint. The store itself
//! never sees credentials; the shell verifies every call against the shared
//! secret before dispatch, so an unauthenticated call can never reach the
//! store.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// The shared credential every RPC call must present.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials from the configured username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Check a presented username/password pair against the configured one.
    ///
    /// Both fields are compared in constant time so a probing client learns
    /// nothing from response timing.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = constant_time_eq(self.username.as_bytes(), username.as_bytes());
        let pass_ok = constant_time_eq(self.password.as_bytes(), password.as_bytes());
        user_ok && pass_ok
    }
}

/// Parse an `Authorization: Basic <base64>` header value into a
/// username/password pair. Returns `None` for any other scheme or for
/// malformed payloads.
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Timing-independent byte comparison. Length is still observable, which is
/// fine for fixed configured credentials.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_accepts_matching_pair() {
        let creds = Credentials::new("witness", "secret");
        assert!(creds.verify("witness", "secret"));
    }

    #[test]
    fn test_verify_rejects_mismatches() {
        let creds = Credentials::new("witness", "secret");
        assert!(!creds.verify("witness", "wrong"));
        assert!(!creds.verify("intruder", "secret"));
        assert!(!creds.verify("", ""));
    }

    #[test]
    fn test_parse_basic_round_trip() {
        let encoded = BASE64.encode("witness:secret");
        let header = format!("Basic {}", encoded);
        assert_eq!(
            parse_basic(&header),
            Some(("witness".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_parse_basic_password_may_contain_colon() {
        let encoded = BASE64.encode("witness:se:cret");
        let header = format!("Basic {}", encoded);
        assert_eq!(
            parse_basic(&header),
            Some(("witness".to_string(), "se:cret".to_string()))
        );
    }

    #[test]
    fn test_parse_basic_rejects_other_schemes() {
        assert_eq!(parse_basic("Bearer abcdef"), None);
        assert_eq!(parse_basic("Basic not-base64!!!"), None);
        assert_eq!(parse_basic(""), None);
    }
}
