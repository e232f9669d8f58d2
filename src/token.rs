use sha2::{ Digest, Sha256 };

/// Proof of identity sent with every request to the stand service.
///
/// SHA-256 over the shared secret, the session callsign and the session CID, as lowercase hex.
pub fn generate_token(secret: &str, callsign: &str, cid: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(callsign.as_bytes());
    hasher.update(b":");
    hasher.update(cid.as_bytes());
    hex::encode(hasher.finalize())
}
