//! salmon: encrypt, decrypt and inspect salmon cipher streams
//!
//! Commands:
//!   encrypt <in> <out>                    - whole-file encryption on the parallel engine
//!   decrypt <in> <out>                    - whole-file decryption, every chunk verified
//!   inspect <file>                        - print the header and derived sizes
//!   read <file> --offset N --length M     - decrypt a byte range to stdout
//!   keygen                                - print a random key, hash key and nonce
//!   config show                           - display the effective configuration

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use salmon_core::config::{EngineConfig, LogConfig, SalmonConfig};
use salmon_crypto::{
    actual_size, generate_hash_key, generate_key, generate_nonce, AesStream, Decryptor,
    EncryptionFormat, EncryptionKey, EncryptionMode, Encryptor, HashKey, Header, Nonce,
    ProviderType, StreamOptions, NONCE_LENGTH,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "salmon",
    version,
    about = "Seekable AES-256-CTR encryption with chunked HMAC integrity",
    long_about = "salmon: encrypt, decrypt, inspect and randomly read salmon cipher streams"
)]
struct Cli {
    /// Path to salmon.toml configuration file
    #[arg(long, short = 'c', env = "SALMON_CONFIG", default_value = "salmon.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file
    Encrypt {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        keys: KeyArgs,
        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Decrypt a file, failing on the first chunk that does not verify
    Decrypt {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        keys: KeyArgs,
        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Print the header of an encrypted file
    Inspect { file: PathBuf },

    /// Decrypt a byte range of an encrypted file to stdout
    ///
    /// Only the chunks overlapping the range are read and verified.
    Read {
        file: PathBuf,
        /// Plaintext offset to start at
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Number of plaintext bytes to print (default: to the end)
        #[arg(long)]
        length: Option<u64>,
        #[command(flatten)]
        keys: KeyArgs,
        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Print a random key, hash key and nonce (base64)
    Keygen,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// 32-byte AES key, base64
    #[arg(long, env = "SALMON_KEY", hide_env_values = true)]
    key: String,

    /// 32-byte HMAC key, base64 (required with integrity)
    #[arg(long, env = "SALMON_HASH_KEY", hide_env_values = true)]
    hash_key: Option<String>,

    /// 8-byte nonce, base64 (encrypt: random if omitted; required without a header)
    #[arg(long)]
    nonce: Option<String>,
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Do not write/expect the 16-byte header
    #[arg(long)]
    no_header: bool,

    /// Disable per-chunk HMAC signatures
    #[arg(long)]
    no_integrity: bool,

    /// Chunk size in bytes (overrides config engine.chunk_size)
    #[arg(long)]
    chunk_size: Option<u32>,

    /// Worker threads, 0 = all CPUs (overrides config engine.threads)
    #[arg(long)]
    threads: Option<usize>,

    /// Transformer backend: default | ctr (overrides config engine.provider)
    #[arg(long)]
    provider: Option<ProviderType>,
}

/// Engine settings after applying command-line overrides to the config.
struct Settings {
    format: EncryptionFormat,
    integrity: bool,
    chunk_size: Option<u32>,
    threads: usize,
    provider: ProviderType,
    buffer_size: usize,
}

impl Settings {
    fn resolve(config: &SalmonConfig, layout: &LayoutArgs) -> Self {
        let engine = &config.engine;
        let integrity = engine.integrity && !layout.no_integrity;
        let chunk_size = if integrity {
            Some(layout.chunk_size.unwrap_or(engine.chunk_size))
        } else {
            None
        };
        let threads = EngineConfig {
            threads: layout.threads.unwrap_or(engine.threads),
            ..engine.clone()
        }
        .effective_threads();
        Self {
            format: if engine.header && !layout.no_header {
                EncryptionFormat::Salmon
            } else {
                EncryptionFormat::Generic
            },
            integrity,
            chunk_size,
            threads,
            provider: layout.provider.unwrap_or(engine.provider),
            buffer_size: engine.buffer_size,
        }
    }
}

/// Key material decoded from base64 arguments.
struct Keys {
    key: EncryptionKey,
    hash_key: Option<HashKey>,
    nonce: Option<Nonce>,
}

impl Keys {
    fn decode(args: &KeyArgs) -> Result<Self> {
        let key = EncryptionKey::from_slice(&decode_b64(&args.key, "--key")?)?;
        let hash_key = args
            .hash_key
            .as_deref()
            .map(|v| -> Result<HashKey> { Ok(HashKey::from_slice(&decode_b64(v, "--hash-key")?)?) })
            .transpose()?;
        let nonce = args
            .nonce
            .as_deref()
            .map(|v| {
                let bytes = decode_b64(v, "--nonce")?;
                <Nonce>::try_from(bytes.as_slice()).with_context(|| {
                    format!("--nonce must decode to {NONCE_LENGTH} bytes, got {}", bytes.len())
                })
            })
            .transpose()?;
        Ok(Self {
            key,
            hash_key,
            nonce,
        })
    }

    fn require_hash_key(&self, integrity: bool) -> Result<Option<&HashKey>> {
        match (&self.hash_key, integrity) {
            (_, false) => Ok(None),
            (Some(hash_key), true) => Ok(Some(hash_key)),
            (None, true) => anyhow::bail!(
                "integrity is enabled but no hash key was given\n\
                 Pass --hash-key or set SALMON_HASH_KEY, or use --no-integrity."
            ),
        }
    }
}

fn decode_b64(value: &str, flag: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value.trim())
        .with_context(|| format!("{flag} is not valid base64"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.log);

    match cli.command {
        Commands::Encrypt { input, output, keys, layout } => {
            cmd_encrypt(&config, &input, &output, &keys, &layout)
        }
        Commands::Decrypt { input, output, keys, layout } => {
            cmd_decrypt(&config, &input, &output, &keys, &layout)
        }
        Commands::Inspect { file } => cmd_inspect(&file),
        Commands::Read { file, offset, length, keys, layout } => {
            cmd_read(&config, &file, offset, length, &keys, &layout)
        }
        Commands::Keygen => cmd_keygen(),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

fn load_config(path: &Path) -> Result<SalmonConfig> {
    SalmonConfig::load(path).with_context(|| format!("loading config: {}", path.display()))
}

fn init_logging(log: &LogConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    // stdout carries plaintext for `read`, so logs always go to stderr
    match log.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

// ── `salmon encrypt` ──────────────────────────────────────────────────────────

fn cmd_encrypt(
    config: &SalmonConfig,
    input: &Path,
    output: &Path,
    key_args: &KeyArgs,
    layout: &LayoutArgs,
) -> Result<()> {
    let settings = Settings::resolve(config, layout);
    let keys = Keys::decode(key_args)?;
    let hash_key = keys.require_hash_key(settings.integrity)?;
    let nonce = match keys.nonce {
        Some(nonce) => nonce,
        None => {
            let nonce = generate_nonce();
            eprintln!("nonce: {}", BASE64.encode(nonce));
            nonce
        }
    };

    let data = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let encryptor = Encryptor::new(settings.threads)?
        .with_provider(settings.provider)
        .with_buffer_size(settings.buffer_size);
    let encrypted = encryptor.encrypt(
        &data,
        &keys.key,
        &nonce,
        settings.format,
        settings.integrity,
        hash_key,
        settings.chunk_size,
    )?;
    encryptor.close();

    std::fs::write(output, &encrypted)
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        plaintext = data.len(),
        ciphertext = encrypted.len(),
        threads = settings.threads,
        "encrypted"
    );
    Ok(())
}

// ── `salmon decrypt` ──────────────────────────────────────────────────────────

fn cmd_decrypt(
    config: &SalmonConfig,
    input: &Path,
    output: &Path,
    key_args: &KeyArgs,
    layout: &LayoutArgs,
) -> Result<()> {
    let settings = Settings::resolve(config, layout);
    let keys = Keys::decode(key_args)?;

    let data = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let decryptor = Decryptor::new(settings.threads)?
        .with_provider(settings.provider)
        .with_buffer_size(settings.buffer_size);
    let decrypted = decryptor
        .decrypt(
            &data,
            &keys.key,
            keys.nonce.as_ref(),
            settings.format,
            settings.integrity,
            keys.hash_key.as_ref(),
            settings.chunk_size,
        )
        .with_context(|| format!("decrypting {}", input.display()))?;
    decryptor.close();

    std::fs::write(output, &decrypted)
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        plaintext = decrypted.len(),
        "decrypted"
    );
    Ok(())
}

// ── `salmon inspect` ──────────────────────────────────────────────────────────

fn cmd_inspect(path: &Path) -> Result<()> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let size = file.metadata()?.len();
    let Some(header) = Header::read(&mut file)
        .with_context(|| format!("reading header of {}", path.display()))?
    else {
        println!("{}: empty", path.display());
        return Ok(());
    };

    let chunk_size = header.chunk_size();
    println!("file:        {}", path.display());
    println!("version:     {}", header.version());
    println!("nonce:       {}", BASE64.encode(header.nonce()));
    if chunk_size > 0 {
        println!("integrity:   on ({chunk_size}-byte chunks)");
    } else {
        println!("integrity:   off");
    }
    println!("size:        {size} bytes");
    println!(
        "plaintext:   {} bytes",
        actual_size(EncryptionMode::Decrypt, size, true, chunk_size)
    );
    Ok(())
}

// ── `salmon read` ─────────────────────────────────────────────────────────────

fn cmd_read(
    config: &SalmonConfig,
    path: &Path,
    offset: u64,
    length: Option<u64>,
    key_args: &KeyArgs,
    layout: &LayoutArgs,
) -> Result<()> {
    let settings = Settings::resolve(config, layout);
    let keys = Keys::decode(key_args)?;

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let options = StreamOptions {
        format: settings.format,
        integrity: settings.integrity,
        hash_key: keys.hash_key.clone(),
        chunk_size: settings.chunk_size,
        provider: settings.provider,
        buffer_size: settings.buffer_size,
        header: None,
    };
    let mut stream = AesStream::reader(file, &keys.key, keys.nonce.as_ref(), options)
        .with_context(|| format!("opening cipher stream over {}", path.display()))?;
    stream.seek(SeekFrom::Start(offset))?;

    let length = length.unwrap_or(u64::MAX);
    let mut stdout = io::stdout().lock();
    let copied = io::copy(&mut Read::by_ref(&mut stream).take(length), &mut stdout)
        .with_context(|| format!("reading {} at offset {offset}", path.display()))?;
    stdout.flush()?;
    tracing::debug!(offset, copied, len = stream.len(), "range read");
    Ok(())
}

// ── `salmon keygen` ───────────────────────────────────────────────────────────

fn cmd_keygen() -> Result<()> {
    let key = generate_key();
    let hash_key = generate_hash_key();
    println!("SALMON_KEY={}", BASE64.encode(key.as_bytes()));
    println!("SALMON_HASH_KEY={}", BASE64.encode(hash_key.as_bytes()));
    println!("nonce={}", BASE64.encode(generate_nonce()));
    Ok(())
}

// ── `salmon config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &SalmonConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let config = SalmonConfig::default();
        let layout = LayoutArgs {
            no_header: true,
            no_integrity: false,
            chunk_size: Some(4096),
            threads: Some(3),
            provider: Some(ProviderType::Ctr),
        };
        let settings = Settings::resolve(&config, &layout);
        assert_eq!(settings.format, EncryptionFormat::Generic);
        assert!(settings.integrity);
        assert_eq!(settings.chunk_size, Some(4096));
        assert_eq!(settings.threads, 3);
        assert_eq!(settings.provider, ProviderType::Ctr);
    }

    #[test]
    fn zero_threads_resolve_like_config() {
        let layout = LayoutArgs {
            no_header: false,
            no_integrity: false,
            chunk_size: None,
            threads: Some(0),
            provider: None,
        };
        let mut config = SalmonConfig::default();
        config.engine.threads = 0;
        let settings = Settings::resolve(&SalmonConfig::default(), &layout);
        assert_eq!(settings.threads, config.engine.effective_threads());
        assert!(settings.threads >= 1);
    }

    #[test]
    fn no_integrity_drops_chunk_size() {
        let layout = LayoutArgs {
            no_header: false,
            no_integrity: true,
            chunk_size: Some(4096),
            threads: None,
            provider: None,
        };
        let settings = Settings::resolve(&SalmonConfig::default(), &layout);
        assert!(!settings.integrity);
        assert_eq!(settings.chunk_size, None);
        assert_eq!(settings.format, EncryptionFormat::Salmon);
    }

    #[test]
    fn keys_decode_from_base64() {
        let args = KeyArgs {
            key: BASE64.encode([1u8; 32]),
            hash_key: Some(BASE64.encode([2u8; 32])),
            nonce: Some(BASE64.encode([3u8; 8])),
        };
        let keys = Keys::decode(&args).unwrap();
        assert_eq!(keys.key.as_bytes(), &[1u8; 32]);
        assert_eq!(keys.nonce, Some([3u8; 8]));
        assert!(keys.require_hash_key(true).unwrap().is_some());
    }

    #[test]
    fn short_key_is_rejected() {
        let args = KeyArgs {
            key: BASE64.encode([1u8; 16]),
            hash_key: None,
            nonce: None,
        };
        assert!(Keys::decode(&args).is_err());
    }

    #[test]
    fn integrity_without_hash_key_is_rejected() {
        let args = KeyArgs {
            key: BASE64.encode([1u8; 32]),
            hash_key: None,
            nonce: None,
        };
        let keys = Keys::decode(&args).unwrap();
        assert!(keys.require_hash_key(true).is_err());
        assert!(keys.require_hash_key(false).unwrap().is_none());
    }
}
