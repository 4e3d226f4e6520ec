//! Secret scan over candidate text.
//!
//! Flags credential-shaped content before a candidate leaves the pipeline.
//! Findings are issues, never errors: the verdict decides what happens next.

use std::sync::LazyLock;

use regex::Regex;

/// Pattern definition for scanning.
struct SecretPattern {
    /// Source of the regex, quoted back in the issue text
    source: &'static str,
    regex: Regex,
}

/// AWS access key id shape.
pub const AWS_ACCESS_KEY: &str = r"AKIA[0-9A-Z]{16}";
/// Credential-ish words, case-insensitive.
pub const CREDENTIAL_WORD: &str = r"(?i)secret|password|passwd|token";
/// PEM private key headers: PKCS#8 plus the RSA, EC, DSA, OPENSSH and
/// ENCRYPTED forms.
pub const PRIVATE_KEY_HEADER: &str = r"-----BEGIN (?:[A-Z]+ )?PRIVATE KEY-----";

static PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    [AWS_ACCESS_KEY, CREDENTIAL_WORD, PRIVATE_KEY_HEADER]
        .into_iter()
        .map(|source| SecretPattern {
            source,
            regex: Regex::new(source).expect("secret pattern should compile"),
        })
        .collect()
});

/// One issue per matching pattern, in pattern order.
pub fn scan(text: &str) -> Vec<String> {
    PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| format!("Potential secret match: {}", p.source))
        .collect()
}
