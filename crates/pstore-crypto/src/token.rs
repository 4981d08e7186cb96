//! Share token generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pstore_core::ShareToken;
use rand::RngCore;

/// Random bytes behind each token (256 bits).
const TOKEN_BYTES: usize = 32;

/// A fresh URL-safe token drawn from the OS-seeded CSPRNG. It carries no
/// information about the file, the owner or any counter.
pub fn generate_share_token() -> ShareToken {
    let mut raw = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut raw);
    ShareToken::from(URL_SAFE_NO_PAD.encode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_shape() {
        let token = generate_share_token();
        assert_eq!(token.as_str().len(), 43);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_do_not_repeat() {
        let tokens: HashSet<String> = (0..1000)
            .map(|_| generate_share_token().as_str().to_string())
            .collect();
        assert_eq!(tokens.len(), 1000);
    }
}
