//! Content digest helpers.
//!
//! Digests are `<algorithm>:<encoded>` strings, the same form used by the
//! OCI image specification and returned by ECR.

use sha2::{Digest, Sha256, Sha512};

/// Algorithm prefix for SHA-256 digests.
pub const SHA256: &str = "sha256";

/// Algorithm prefix for SHA-512 digests.
pub const SHA512: &str = "sha512";

/// Computes the SHA-256 digest of `data` in `sha256:<hex>` form.
///
/// # Examples
///
/// ```
/// use ecr_resolver_core::digest::sha256_digest;
///
/// let digest = sha256_digest(b"");
/// assert_eq!(
///     digest,
///     "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn sha256_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{SHA256}:{}", hex::encode(hasher.finalize()))
}

/// Computes the digest of `data` with the named algorithm.
///
/// Returns `None` for algorithms other than `sha256` and `sha512`.
#[must_use]
pub fn compute_digest(algorithm: &str, data: &[u8]) -> Option<String> {
    match algorithm {
        SHA256 => Some(sha256_digest(data)),
        SHA512 => Some(format!("{SHA512}:{}", hex::encode(Sha512::digest(data)))),
        _ => None,
    }
}

/// Returns true if `digest` is a well-formed `<algorithm>:<encoded>` digest.
///
/// Registered algorithms are held to their exact lower-case hex length.
/// Other algorithms only need a well-formed name and a non-empty encoding.
#[must_use]
pub fn is_valid_digest(digest: &str) -> bool {
    let Some((algorithm, encoded)) = digest.split_once(':') else {
        return false;
    };
    if !is_valid_algorithm(algorithm) || encoded.is_empty() {
        return false;
    }

    match algorithm {
        SHA256 => is_lower_hex(encoded, 64),
        SHA512 => is_lower_hex(encoded, 128),
        _ => encoded
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'=' | b'_' | b'-')),
    }
}

/// Algorithm names are lower-case alphanumeric runs joined by `+`, `.`, `_` or `-`.
fn is_valid_algorithm(algorithm: &str) -> bool {
    !algorithm.is_empty()
        && algorithm
            .split(['+', '.', '_', '-'])
            .all(|part| {
                !part.is_empty()
                    && part
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            })
}

fn is_lower_hex(encoded: &str, len: usize) -> bool {
    encoded.len() == len
        && encoded
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
