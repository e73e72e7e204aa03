//! Token generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Stable prefix so tokens are visually identifiable in configs and logs.
pub const TOKEN_PREFIX: &str = "mcp_";

/// Generate a new opaque token: the prefix plus 256 bits of OS entropy,
/// URL-safe base64 encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_format() {
        let token = generate_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        // 32 bytes → 43 base64url chars without padding.
        assert_eq!(token.len(), TOKEN_PREFIX.len() + 43);
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }
}
