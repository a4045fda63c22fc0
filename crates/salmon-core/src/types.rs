use serde::{Deserialize, Serialize};

/// Direction of a cipher stream or whole-buffer transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    Encrypt,
    Decrypt,
}

/// Physical layout of the ciphertext
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionFormat {
    /// 16-byte header (magic, version, chunk size, nonce) precedes the body
    #[default]
    Salmon,
    /// No header; nonce and chunk size are supplied by the caller
    Generic,
}

impl EncryptionFormat {
    pub fn has_header(self) -> bool {
        matches!(self, EncryptionFormat::Salmon)
    }
}

/// AES-CTR backend used by a transformer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// AES-256 block primitive with the engine's own big-endian counter
    #[default]
    Default,
    /// RustCrypto `ctr` stream cipher with a 64-bit big-endian counter
    Ctr,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Default => f.write_str("default"),
            ProviderType::Ctr => f.write_str("ctr"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(ProviderType::Default),
            "ctr" => Ok(ProviderType::Ctr),
            other => Err(format!("unknown provider '{other}' (expected 'default' or 'ctr')")),
        }
    }
}
