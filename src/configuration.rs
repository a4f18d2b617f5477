use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub tokens: TokenSettings,
}

/// Token issuance and key-material settings
///
/// TTLs are seconds. Recommended values: minutes for access tokens
/// (e.g. 300), weeks for refresh tokens (e.g. 2592000).
#[derive(serde::Deserialize, Clone)]
pub struct TokenSettings {
    pub access_token_expiry: i64,
    pub refresh_token_expiry: i64,
    /// HMAC secret for access-token signatures.
    pub signing_key: String,
    /// 256-bit key for refresh-token encryption; hex, base64, or 32 raw bytes.
    pub encryption_key: String,
}

impl TokenSettings {
    /// Decode the refresh-token encryption key into its 32-byte form.
    pub fn encryption_key_bytes(&self) -> Result<[u8; 32], ConfigError> {
        parse_key_material(&self.encryption_key).ok_or_else(|| {
            ConfigError::Message(
                "encryption_key must decode to exactly 32 bytes (hex, base64, or raw)".to_string(),
            )
        })
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("TOKENGATE").separator("__"))
        .build()?;
    settings.try_deserialize::<Settings>()
}

/// Accepts a 32-byte key as 64 hex chars, URL-safe or standard base64,
/// or 32 raw bytes.
fn parse_key_material(raw: &str) -> Option<[u8; 32]> {
    use base64::{engine::general_purpose, Engine as _};

    let trimmed = raw.trim();

    if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        let bytes = decode_hex(trimmed)?;
        return bytes.as_slice().try_into().ok();
    }

    if let Ok(bytes) = general_purpose::URL_SAFE_NO_PAD.decode(trimmed) {
        if bytes.len() == 32 {
            return bytes.as_slice().try_into().ok();
        }
    }

    if let Ok(bytes) = general_purpose::STANDARD.decode(trimmed) {
        if bytes.len() == 32 {
            return bytes.as_slice().try_into().ok();
        }
    }

    let raw_bytes = trimmed.as_bytes();
    if raw_bytes.len() == 32 {
        return raw_bytes.try_into().ok();
    }

    None
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }

    let mut bytes = Vec::with_capacity(input.len() / 2);
    let mut chars = input.chars();
    while let (Some(h), Some(l)) = (chars.next(), chars.next()) {
        let hi = h.to_digit(16)?;
        let lo = l.to_digit(16)?;
        bytes.push(((hi << 4) | lo) as u8);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_key() {
        let hex = "00".repeat(32);
        let key = parse_key_material(&hex).expect("hex key should parse");
        assert_eq!(key, [0u8; 32]);
    }

    #[test]
    fn parses_raw_key() {
        let raw = "0123456789abcdef0123456789abcdef";
        let key = parse_key_material(raw).expect("raw key should parse");
        assert_eq!(&key, raw.as_bytes());
    }

    #[test]
    fn parses_base64_key() {
        use base64::{engine::general_purpose, Engine as _};
        let encoded = general_purpose::STANDARD.encode([7u8; 32]);
        let key = parse_key_material(&encoded).expect("base64 key should parse");
        assert_eq!(key, [7u8; 32]);
    }

    #[test]
    fn rejects_wrong_length_key() {
        assert!(parse_key_material("too-short").is_none());
        assert!(parse_key_material(&"ff".repeat(8)).is_none());
    }

    #[test]
    fn settings_surface_key_errors() {
        let settings = TokenSettings {
            access_token_expiry: 300,
            refresh_token_expiry: 2_592_000,
            signing_key: "test-signing-secret".to_string(),
            encryption_key: "not-a-key".to_string(),
        };
        assert!(settings.encryption_key_bytes().is_err());
    }
}
