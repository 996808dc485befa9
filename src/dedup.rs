// Request deduplication for capture sessions
// Browsing produces many near-identical requests (polling, repeated
// navigation); fingerprints keep the replay matrix from exploding.

use sha2::{Digest, Sha256};

/// Stable fingerprint over method, URL without its query string, and body.
///
/// Two requests with the same method, path-only URL, and identical body get
/// the same token. Returns `None` when no fingerprint can be derived; callers
/// must then store the request unconditionally rather than fail capture.
pub fn fingerprint(method: &str, url: &str, body: &[u8]) -> Option<String> {
    let base_url = url.split('?').next()?;
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"|");
    hasher.update(base_url.as_bytes());
    hasher.update(b"|");
    hasher.update(body);
    let digest = hasher.finalize();
    Some(digest.iter().map(|b| format!("{:02x}", b)).collect())
}
