//! HMAC HTTP signatures
//!
//! Implements the shared-secret variant of the "Signing HTTP Messages" draft
//! used by the CI server's validator client:
//!
//! ```text
//! Signature: keyId="hmac-key",algorithm="hmac-sha256",headers="(request-target) date digest",signature="<base64>"
//! ```
//!
//! The signing string is one `name: value` line per listed header, joined by
//! `\n`, where `(request-target)` renders as `<method> <path[?query]>`.

use crate::error::{GateError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use ring::{digest, hmac};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

/// Pseudo-header covering method and path
pub const REQUEST_TARGET: &str = "(request-target)";

const SIGNATURE_HEADER: &str = "signature";
const AUTHORIZATION_HEADER: &str = "authorization";
const AUTHORIZATION_SCHEME: &str = "Signature ";
const DATE_HEADER: &str = "date";
const DIGEST_HEADER: &str = "digest";
const DIGEST_SHA256: &str = "SHA-256";

/// Access to the parts of an HTTP request covered by a signature
pub trait SignedRequest {
    /// HTTP method, any case
    fn method(&self) -> &str;

    /// Path plus query string, e.g. `/hooks?x=1`
    fn request_target(&self) -> Cow<'_, str>;

    /// First value of a header, looked up case-insensitively
    fn header(&self, name: &str) -> Option<&str>;
}

/// Owned request head, for signing outside of an HTTP stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHead {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Create a head for `method` on `target`
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        RequestHead {
            method: method.into(),
            target: target.into(),
            headers: Vec::new(),
        }
    }

    /// Append a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a header in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Headers in insertion order
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

impl SignedRequest for RequestHead {
    fn method(&self) -> &str {
        &self.method
    }

    fn request_target(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.target)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Supported signature algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// `hmac-sha1`
    HmacSha1,
    /// `hmac-sha256`
    HmacSha256,
}

impl Algorithm {
    /// Parse the `algorithm` parameter
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hmac-sha1" => Some(Algorithm::HmacSha1),
            "hmac-sha256" => Some(Algorithm::HmacSha256),
            _ => None,
        }
    }

    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::HmacSha1 => "hmac-sha1",
            Algorithm::HmacSha256 => "hmac-sha256",
        }
    }

    fn hmac(&self) -> hmac::Algorithm {
        match self {
            Algorithm::HmacSha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            Algorithm::HmacSha256 => hmac::HMAC_SHA256,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parsed signature parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Key identifier chosen by the sender
    pub key_id: String,
    /// HMAC algorithm
    pub algorithm: Algorithm,
    /// Lower-cased header names covered by the signature, in order
    pub headers: Vec<String>,
    /// Base64 signature value
    pub signature: String,
}

impl Signature {
    /// Extract the signature from a request
    ///
    /// Looks at `Signature` first, then `Authorization: Signature ...`.
    pub fn from_request<R: SignedRequest + ?Sized>(request: &R) -> Result<Self> {
        if let Some(value) = request.header(SIGNATURE_HEADER) {
            return Self::parse(value);
        }

        match request.header(AUTHORIZATION_HEADER) {
            Some(value) if value.starts_with(AUTHORIZATION_SCHEME) => {
                Self::parse(&value[AUTHORIZATION_SCHEME.len()..])
            }
            _ => Err(GateError::MissingOrMalformedSignature(
                "no signature header".to_string(),
            )),
        }
    }

    /// Parse a `keyId="..",algorithm="..",...` parameter list
    pub fn parse(params: &str) -> Result<Self> {
        let mut key_id = None;
        let mut algorithm = None;
        let mut headers = None;
        let mut signature = None;

        for param in params.split(',') {
            let Some((name, value)) = param.trim().split_once('=') else {
                continue;
            };
            let Some(value) = value
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
            else {
                continue;
            };

            match name {
                "keyId" => key_id = Some(value.to_string()),
                "algorithm" => {
                    algorithm = Some(Algorithm::from_name(value).ok_or_else(|| {
                        GateError::MissingOrMalformedSignature(format!(
                            "unsupported algorithm {:?}",
                            value
                        ))
                    })?)
                }
                "headers" => headers = Some(parse_header_list(value)),
                "signature" => signature = Some(value.to_string()),
                _ => {}
            }
        }

        let missing =
            |what: &str| GateError::MissingOrMalformedSignature(format!("missing {}", what));

        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("signature"))?;
        let key_id = key_id.filter(|k| !k.is_empty()).ok_or_else(|| missing("keyId"))?;
        let algorithm = algorithm.ok_or_else(|| missing("algorithm"))?;
        let headers = headers
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| vec![DATE_HEADER.to_string()]);

        Ok(Signature {
            key_id,
            algorithm,
            headers,
            signature,
        })
    }

    /// Whether `name` is one of the signed headers
    pub fn covers(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.eq_ignore_ascii_case(name))
    }

    /// Build the string the HMAC is computed over
    pub fn signing_string<R: SignedRequest + ?Sized>(&self, request: &R) -> Result<String> {
        signing_string(&self.headers, request)
    }

    /// Render as a `Signature` header value
    pub fn to_header_value(&self) -> String {
        format!(
            r#"keyId="{}",algorithm="{}",headers="{}",signature="{}""#,
            self.key_id,
            self.algorithm,
            self.headers.join(" "),
            self.signature
        )
    }
}

fn parse_header_list(value: &str) -> Vec<String> {
    value
        .split_whitespace()
        .map(|h| h.to_ascii_lowercase())
        .collect()
}

fn signing_string<R: SignedRequest + ?Sized>(headers: &[String], request: &R) -> Result<String> {
    let mut lines = Vec::with_capacity(headers.len());
    for name in headers {
        if name == REQUEST_TARGET {
            lines.push(format!(
                "{}: {} {}",
                REQUEST_TARGET,
                request.method().to_ascii_lowercase(),
                request.request_target()
            ));
            continue;
        }

        let value = request.header(name).ok_or_else(|| {
            GateError::InvalidSignature(format!("signed header {:?} is missing", name))
        })?;
        lines.push(format!("{}: {}", name, value));
    }
    Ok(lines.join("\n"))
}

/// Validates signatures against the shared secret
pub struct Verifier {
    secret: Vec<u8>,
    max_clock_skew: Option<Duration>,
}

impl Verifier {
    /// Create a verifier; the secret must not be empty
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(GateError::ConfigError("missing secret key".to_string()));
        }
        Ok(Verifier {
            secret: secret.to_vec(),
            max_clock_skew: None,
        })
    }

    /// Reject requests whose `Date` is further than `skew` from now
    pub fn with_max_clock_skew(mut self, skew: Duration) -> Self {
        self.max_clock_skew = Some(skew);
        self
    }

    /// Configured clock skew, if any
    pub fn max_clock_skew(&self) -> Option<Duration> {
        self.max_clock_skew
    }

    /// Check `signature` against `request` at the current time
    pub fn verify<R: SignedRequest + ?Sized>(
        &self,
        signature: &Signature,
        request: &R,
    ) -> Result<()> {
        self.verify_at(signature, request, Utc::now())
    }

    /// Check `signature` against `request` as of `now`
    pub fn verify_at<R: SignedRequest + ?Sized>(
        &self,
        signature: &Signature,
        request: &R,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !signature.covers(DATE_HEADER) {
            return Err(GateError::InvalidSignature(
                "date is not a signed header".to_string(),
            ));
        }

        if let Some(skew) = self.max_clock_skew {
            check_date(request, skew, now)?;
        }

        let expected = BASE64
            .decode(signature.signature.as_bytes())
            .map_err(|e| GateError::InvalidSignature(format!("signature is not base64: {}", e)))?;
        let message = signature.signing_string(request)?;
        let key = hmac::Key::new(signature.algorithm.hmac(), &self.secret);

        hmac::verify(&key, message.as_bytes(), &expected)
            .map_err(|_| GateError::InvalidSignature("signature mismatch".to_string()))
    }

    /// Check the body against a signed `Digest` header
    ///
    /// A no-op when `digest` is not one of the signed headers.
    pub fn verify_digest<R: SignedRequest + ?Sized>(
        &self,
        signature: &Signature,
        request: &R,
        body: &[u8],
    ) -> Result<()> {
        if !signature.covers(DIGEST_HEADER) {
            return Ok(());
        }

        let header = request
            .header(DIGEST_HEADER)
            .ok_or_else(|| GateError::InvalidSignature("digest header is missing".to_string()))?;

        let encoded = header
            .split(',')
            .filter_map(|entry| entry.trim().split_once('='))
            .find(|(alg, _)| alg.eq_ignore_ascii_case(DIGEST_SHA256))
            .map(|(_, value)| value)
            .ok_or_else(|| {
                GateError::InvalidSignature(format!("unsupported digest {:?}", header))
            })?;

        let claimed = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| GateError::InvalidSignature(format!("digest is not base64: {}", e)))?;

        if claimed.as_slice() != digest::digest(&digest::SHA256, body).as_ref() {
            return Err(GateError::InvalidSignature("body digest mismatch".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("secret", &"<redacted>")
            .field("max_clock_skew", &self.max_clock_skew)
            .finish()
    }
}

fn check_date<R: SignedRequest + ?Sized>(
    request: &R,
    skew: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    let raw = request
        .header(DATE_HEADER)
        .ok_or_else(|| GateError::InvalidSignature("date header is missing".to_string()))?;
    let sent = DateTime::parse_from_rfc2822(raw)
        .map_err(|e| GateError::InvalidSignature(format!("bad date {:?}: {}", raw, e)))?
        .with_timezone(&Utc);

    let drift = (now - sent).num_seconds().unsigned_abs();
    if drift > skew.as_secs() {
        return Err(GateError::InvalidSignature(format!(
            "date is {}s away from server time",
            drift
        )));
    }
    Ok(())
}

/// Produces signatures in the same scheme
pub struct Signer {
    secret: Vec<u8>,
    key_id: String,
    algorithm: Algorithm,
    headers: Vec<String>,
}

impl Signer {
    /// HMAC-SHA256 signer over `(request-target) date digest`
    pub fn new(secret: impl AsRef<[u8]>, key_id: impl Into<String>) -> Self {
        Signer {
            secret: secret.as_ref().to_vec(),
            key_id: key_id.into(),
            algorithm: Algorithm::HmacSha256,
            headers: vec![
                REQUEST_TARGET.to_string(),
                DATE_HEADER.to_string(),
                DIGEST_HEADER.to_string(),
            ],
        }
    }

    /// Use another algorithm
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sign over these headers instead
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.headers = headers
            .into_iter()
            .map(|h| h.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Sign a request; every listed header must already be set
    pub fn sign<R: SignedRequest + ?Sized>(&self, request: &R) -> Result<Signature> {
        let message = signing_string(&self.headers, request)?;
        let key = hmac::Key::new(self.algorithm.hmac(), &self.secret);
        let tag = hmac::sign(&key, message.as_bytes());

        Ok(Signature {
            key_id: self.key_id.clone(),
            algorithm: self.algorithm,
            headers: self.headers.clone(),
            signature: BASE64.encode(tag.as_ref()),
        })
    }
}

/// `Digest` header value for a body
pub fn digest_header(body: &[u8]) -> String {
    let hash = digest::digest(&digest::SHA256, body);
    format!("{}={}", DIGEST_SHA256, BASE64.encode(hash.as_ref()))
}

/// HTTP date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "3e5f9b7c1d2a4b6c8d0e1f2a3b4c5d6e";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn signed_head(body: &[u8]) -> RequestHead {
        let mut head = RequestHead::new("POST", "/")
            .header("Date", http_date(fixed_now()))
            .header("Digest", digest_header(body));
        let signature = Signer::new(SECRET, "hmac-key").sign(&head).unwrap();
        head.insert("Signature", signature.to_header_value());
        head
    }

    fn verify(head: &RequestHead, verifier: &Verifier) -> Result<Signature> {
        let signature = Signature::from_request(head)?;
        verifier.verify_at(&signature, head, fixed_now())?;
        Ok(signature)
    }

    #[test]
    fn test_parse_parameters() {
        let sig = Signature::parse(
            r#"keyId="k1",algorithm="hmac-sha1",headers="(request-target) Date",signature="c2ln""#,
        )
        .unwrap();
        assert_eq!(sig.key_id, "k1");
        assert_eq!(sig.algorithm, Algorithm::HmacSha1);
        assert_eq!(sig.headers, vec!["(request-target)", "date"]);
        assert_eq!(sig.signature, "c2ln");
    }

    #[test]
    fn test_parse_defaults_to_date() {
        let sig = Signature::parse(r#"keyId="k",algorithm="hmac-sha256",signature="c2ln""#).unwrap();
        assert_eq!(sig.headers, vec!["date"]);
    }

    #[test]
    fn test_parse_rejects_incomplete() {
        for params in [
            r#"keyId="k",algorithm="hmac-sha256""#,
            r#"algorithm="hmac-sha256",signature="c2ln""#,
            r#"keyId="k",signature="c2ln""#,
            r#"keyId="k",algorithm="rsa-sha256",signature="c2ln""#,
            "garbage",
            "",
        ] {
            let err = Signature::parse(params).unwrap_err();
            assert!(
                matches!(err, GateError::MissingOrMalformedSignature(_)),
                "{}",
                params
            );
        }
    }

    #[test]
    fn test_missing_header() {
        let head = RequestHead::new("POST", "/");
        let err = Signature::from_request(&head).unwrap_err();
        assert!(matches!(err, GateError::MissingOrMalformedSignature(_)));

        let head = RequestHead::new("POST", "/").header("Authorization", "Bearer abc");
        let err = Signature::from_request(&head).unwrap_err();
        assert!(matches!(err, GateError::MissingOrMalformedSignature(_)));
    }

    #[test]
    fn test_signing_string() {
        let head = RequestHead::new("POST", "/hooks?x=1")
            .header("Date", "Fri, 01 Mar 2024 12:00:00 GMT")
            .header("Digest", "SHA-256=abc");
        let sig = Signature::parse(
            r#"keyId="k",algorithm="hmac-sha256",headers="(request-target) date digest",signature="c2ln""#,
        )
        .unwrap();
        assert_eq!(
            sig.signing_string(&head).unwrap(),
            "(request-target): post /hooks?x=1\ndate: Fri, 01 Mar 2024 12:00:00 GMT\ndigest: SHA-256=abc"
        );
    }

    #[test]
    fn test_round_trip() {
        let body = br#"{"build":{"author":"alice"}}"#;
        let head = signed_head(body);
        let verifier = Verifier::new(SECRET).unwrap();
        let signature = verify(&head, &verifier).unwrap();
        verifier.verify_digest(&signature, &head, body).unwrap();
    }

    #[test]
    fn test_authorization_fallback() {
        let mut head = RequestHead::new("POST", "/").header("Date", http_date(fixed_now()));
        let signature = Signer::new(SECRET, "k")
            .with_headers(["date"])
            .sign(&head)
            .unwrap();
        head.insert(
            "Authorization",
            format!("Signature {}", signature.to_header_value()),
        );
        verify(&head, &Verifier::new(SECRET).unwrap()).unwrap();
    }

    #[test]
    fn test_sha1() {
        let mut head = RequestHead::new("POST", "/").header("Date", http_date(fixed_now()));
        let signature = Signer::new(SECRET, "k")
            .with_algorithm(Algorithm::HmacSha1)
            .with_headers(["(request-target)", "date"])
            .sign(&head)
            .unwrap();
        head.insert("Signature", signature.to_header_value());
        let parsed = verify(&head, &Verifier::new(SECRET).unwrap()).unwrap();
        assert_eq!(parsed.algorithm, Algorithm::HmacSha1);
    }

    #[test]
    fn test_wrong_secret() {
        let head = signed_head(b"{}");
        let err = verify(&head, &Verifier::new("other-secret").unwrap()).unwrap_err();
        assert!(matches!(err, GateError::InvalidSignature(_)));
    }

    #[test]
    fn test_tampered_target() {
        let head = signed_head(b"{}");
        let mut moved = RequestHead::new("POST", "/elsewhere");
        for (name, value) in head.headers() {
            moved.insert(name.clone(), value.clone());
        }
        let err = verify(&moved, &Verifier::new(SECRET).unwrap()).unwrap_err();
        assert!(matches!(err, GateError::InvalidSignature(_)));
    }

    #[test]
    fn test_date_must_be_signed() {
        let mut head = RequestHead::new("POST", "/").header("Digest", digest_header(b"{}"));
        let signature = Signer::new(SECRET, "k")
            .with_headers(["(request-target)", "digest"])
            .sign(&head)
            .unwrap();
        head.insert("Signature", signature.to_header_value());
        let err = verify(&head, &Verifier::new(SECRET).unwrap()).unwrap_err();
        assert!(matches!(err, GateError::InvalidSignature(_)));
    }

    #[test]
    fn test_signed_header_missing() {
        let head = RequestHead::new("POST", "/").header(
            "Signature",
            r#"keyId="k",algorithm="hmac-sha256",headers="date",signature="c2ln""#,
        );
        let err = verify(&head, &Verifier::new(SECRET).unwrap()).unwrap_err();
        assert!(matches!(err, GateError::InvalidSignature(_)));
    }

    #[test]
    fn test_signature_not_base64() {
        let head = RequestHead::new("POST", "/")
            .header("Date", http_date(fixed_now()))
            .header(
                "Signature",
                r#"keyId="k",algorithm="hmac-sha256",headers="date",signature="%%%""#,
            );
        let err = verify(&head, &Verifier::new(SECRET).unwrap()).unwrap_err();
        assert!(matches!(err, GateError::InvalidSignature(_)));
    }

    #[test]
    fn test_clock_skew() {
        let head = signed_head(b"{}");
        let verifier = Verifier::new(SECRET)
            .unwrap()
            .with_max_clock_skew(Duration::from_secs(300));
        let signature = Signature::from_request(&head).unwrap();

        verifier
            .verify_at(&signature, &head, fixed_now() + chrono::Duration::seconds(299))
            .unwrap();
        let err = verifier
            .verify_at(&signature, &head, fixed_now() + chrono::Duration::seconds(301))
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidSignature(_)));
        let err = verifier
            .verify_at(&signature, &head, fixed_now() - chrono::Duration::seconds(301))
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidSignature(_)));
    }

    #[test]
    fn test_digest_mismatch() {
        let head = signed_head(br#"{"build":{"author":"alice"}}"#);
        let verifier = Verifier::new(SECRET).unwrap();
        let signature = verify(&head, &verifier).unwrap();
        let err = verifier
            .verify_digest(&signature, &head, br#"{"build":{"author":"mallory"}}"#)
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidSignature(_)));
    }

    #[test]
    fn test_digest_skipped_when_unsigned() {
        let mut head = RequestHead::new("POST", "/")
            .header("Date", http_date(fixed_now()))
            .header("Digest", "SHA-256=bogus");
        let signature = Signer::new(SECRET, "k")
            .with_headers(["date"])
            .sign(&head)
            .unwrap();
        head.insert("Signature", signature.to_header_value());
        let verifier = Verifier::new(SECRET).unwrap();
        let parsed = verify(&head, &verifier).unwrap();
        verifier.verify_digest(&parsed, &head, b"anything").unwrap();
    }

    #[test]
    fn test_unsupported_digest() {
        let mut head = RequestHead::new("POST", "/")
            .header("Date", http_date(fixed_now()))
            .header("Digest", "MD5=Q2hlY2sgSW50ZWdyaXR5IQ==");
        let signature = Signer::new(SECRET, "k").sign(&head).unwrap();
        head.insert("Signature", signature.to_header_value());
        let verifier = Verifier::new(SECRET).unwrap();
        let parsed = verify(&head, &verifier).unwrap();
        let err = verifier.verify_digest(&parsed, &head, b"{}").unwrap_err();
        assert!(matches!(err, GateError::InvalidSignature(_)));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            Verifier::new("").unwrap_err(),
            GateError::ConfigError(_)
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let verifier = Verifier::new(SECRET).unwrap();
        assert!(!format!("{:?}", verifier).contains(SECRET));
    }

    #[test]
    fn test_http_date() {
        assert_eq!(http_date(fixed_now()), "Fri, 01 Mar 2024 12:00:00 GMT");
    }
}
