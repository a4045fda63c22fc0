use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SalmonError, SalmonResult};
use crate::types::ProviderType;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// Default integrity chunk size (256 KiB)
pub const DEFAULT_CHUNK_SIZE: u32 = 256 * 1024;

/// Largest accepted integrity chunk size (8 MiB)
pub const MAX_CHUNK_SIZE: u32 = 8 * 1024 * 1024;

/// Top-level configuration (loaded from salmon.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SalmonConfig {
    pub engine: EngineConfig,
    pub log: LogConfig,
}

impl SalmonConfig {
    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> SalmonResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(SalmonError::Io)?;
        let config: SalmonConfig = toml::from_str(&content)
            .map_err(|e| SalmonError::Config(format!("parsing {}: {e}", path.display())))?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> SalmonResult<String> {
        toml::to_string_pretty(self).map_err(|e| SalmonError::Config(e.to_string()))
    }
}

/// Cipher engine settings shared by the facade and the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for whole-buffer transforms (0 = cpu_count)
    pub threads: usize,
    /// Internal stream buffer size in bytes
    pub buffer_size: usize,
    /// Integrity chunk size in bytes
    pub chunk_size: u32,
    /// Sign every chunk with HMAC-SHA256
    pub integrity: bool,
    /// Prepend the 16-byte header carrying nonce and chunk size
    pub header: bool,
    /// AES-CTR backend
    pub provider: ProviderType,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            buffer_size: DEFAULT_CHUNK_SIZE as usize,
            chunk_size: DEFAULT_CHUNK_SIZE,
            integrity: true,
            header: true,
            provider: ProviderType::Default,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> SalmonResult<()> {
        if self.chunk_size % BLOCK_SIZE as u32 != 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(SalmonError::Config(format!(
                "chunk_size must be a multiple of {BLOCK_SIZE} and at most {MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if self.buffer_size == 0 {
            return Err(SalmonError::Config("buffer_size must be positive".into()));
        }
        Ok(())
    }

    /// Thread count with `0` resolved to the number of available CPUs.
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[engine]
threads = 8
buffer_size = 1048576
chunk_size = 65536
integrity = false
header = false
provider = "ctr"

[log]
level = "debug"
format = "json"
"#;
        let config: SalmonConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.engine.threads, 8);
        assert_eq!(config.engine.buffer_size, 1_048_576);
        assert_eq!(config.engine.chunk_size, 65536);
        assert!(!config.engine.integrity);
        assert!(!config.engine.header);
        assert_eq!(config.engine.provider, ProviderType::Ctr);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: SalmonConfig = toml::from_str("").unwrap();

        assert_eq!(config.engine.threads, 1);
        assert_eq!(config.engine.chunk_size, 256 * 1024);
        assert!(config.engine.integrity);
        assert!(config.engine.header);
        assert_eq!(config.engine.provider, ProviderType::Default);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_parse_partial_config() {
        let config: SalmonConfig = toml::from_str("[engine]\nthreads = 4\n").unwrap();

        assert_eq!(config.engine.threads, 4);
        assert_eq!(config.engine.chunk_size, 256 * 1024);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_validate_rejects_unaligned_chunk() {
        let engine = EngineConfig {
            chunk_size: 1000,
            ..EngineConfig::default()
        };
        assert!(matches!(engine.validate(), Err(SalmonError::Config(_))));

        let engine = EngineConfig {
            chunk_size: 16 * 1024 * 1024,
            ..EngineConfig::default()
        };
        assert!(engine.validate().is_err());

        let engine = EngineConfig {
            buffer_size: 0,
            ..EngineConfig::default()
        };
        assert!(engine.validate().is_err());

        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_effective_threads() {
        let engine = EngineConfig {
            threads: 0,
            ..EngineConfig::default()
        };
        assert!(engine.effective_threads() >= 1);

        let engine = EngineConfig {
            threads: 3,
            ..EngineConfig::default()
        };
        assert_eq!(engine.effective_threads(), 3);
    }

    #[test]
    fn test_load_missing_and_present_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let config = SalmonConfig::load(&missing).unwrap();
        assert_eq!(config.engine.threads, 1);

        let path = dir.path().join("salmon.toml");
        std::fs::write(&path, "[engine]\nchunk_size = 4096\n").unwrap();
        let config = SalmonConfig::load(&path).unwrap();
        assert_eq!(config.engine.chunk_size, 4096);

        std::fs::write(&path, "[engine]\nchunk_size = 4095\n").unwrap();
        assert!(SalmonConfig::load(&path).is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = SalmonConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed: SalmonConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.engine.chunk_size, parsed.engine.chunk_size);
        assert_eq!(config.engine.provider, parsed.engine.provider);
        assert_eq!(config.log.format, parsed.log.format);
    }
}
