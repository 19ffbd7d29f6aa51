//! realmkey: deterministic keys and passwords from the command line
//!
//! # Usage
//!
//! ```bash
//! realmkey -t seed -o ~/.realmkey/seed          # new encrypted seed
//! realmkey -r example.com -s ~/.realmkey/seed   # password for a site
//! realmkey -t ed25519 -r ssh/host -s ~/.realmkey/seed -o id_ed25519
//! realmkey -t raw -l 32 -r api-token -u         # raw bytes, no seed
//! ```
//!
//! The master password comes from `-p`, then `REALMKEY_MASTER`, then an
//! interactive prompt.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use realmkey_core::{
    generate_encrypted_seed, get_key, get_password, get_raw_bytes, write_pem, EncryptedSeed,
    KeyType, MAX_RAW_LENGTH,
};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zeroize::Zeroizing;

use config::CliConfig;

const DEFAULT_RAW_LENGTH: usize = 32;

/// What to derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    Pass,
    Raw,
    Seed,
    Key(KeyType),
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pass" => Ok(Self::Pass),
            "raw" => Ok(Self::Raw),
            "seed" => Ok(Self::Seed),
            other => other.parse().map(Self::Key).map_err(|_| {
                let keys: Vec<&str> = KeyType::ALL.iter().map(|k| k.name()).collect();
                format!("expected pass, raw, seed or one of {}", keys.join(", "))
            }),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("pass"),
            Self::Raw => f.write_str("raw"),
            Self::Seed => f.write_str("seed"),
            Self::Key(kt) => write!(f, "{kt}"),
        }
    }
}

/// Deterministic password and key derivation.
#[derive(Parser, Debug)]
#[command(name = "realmkey", version, about)]
struct Cli {
    /// Master password (prefer REALMKEY_MASTER or the prompt)
    #[arg(short = 'p', long = "pass")]
    pass: Option<String>,

    /// Realm to derive for, e.g. a domain name
    #[arg(short = 'r', long)]
    realm: Option<String>,

    /// Output type: pass, raw, seed, ec256, ec384, ec521, rsa2048, rsa4096, x25519, ed25519
    #[arg(short = 't', long = "type", default_value = "pass")]
    kind: OutputKind,

    /// Encrypted seed file
    #[arg(short = 's', long)]
    seed: Option<PathBuf>,

    /// Output file (default: stdout). Never overwritten.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Password length, or byte count for `-t raw`
    #[arg(short = 'l', long)]
    length: Option<usize>,

    /// Allow keys and raw bytes without a seed
    #[arg(short = 'u', long = "unsafe")]
    allow_unsafe: bool,

    /// TOML config file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("realmkey: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    env_logger::Builder::new()
        .parse_filters(&config.general.log_level)
        .init();

    if cli.kind != OutputKind::Seed && cli.realm.is_none() {
        anyhow::bail!("--realm is required for -t {}", cli.kind);
    }

    let password = resolve_password(cli.pass.as_deref(), cli.kind == OutputKind::Seed)?;
    let payload = derive(&cli, &config, &password)?;

    // Only create the output once derivation succeeded
    let mut out = open_output(cli.output.as_deref())?;
    out.write_all(&payload)?;
    out.flush()?;
    Ok(())
}

/// Bytes to emit for `cli.kind`.
fn derive(cli: &Cli, config: &CliConfig, password: &str) -> Result<Zeroizing<Vec<u8>>> {
    let realm = cli.realm.as_deref().unwrap_or_default();
    let payload = match cli.kind {
        OutputKind::Seed => {
            let blob = generate_encrypted_seed(password).context("Failed to generate seed")?;
            log::info!("generated new encrypted seed");
            Zeroizing::new(blob.to_bytes())
        }
        OutputKind::Pass => {
            let seed = load_seed(config)?;
            let pass = get_password(password, realm, seed.as_ref(), &config.password)
                .context("Failed to derive password")?;
            let mut line = Zeroizing::new(pass.as_bytes().to_vec());
            line.push(b'\n');
            line
        }
        OutputKind::Raw => {
            let seed = load_seed(config)?;
            let len = cli.length.unwrap_or(DEFAULT_RAW_LENGTH);
            get_raw_bytes(password, realm, seed.as_ref(), len, cli.allow_unsafe)
                .context("Failed to derive raw bytes")?
        }
        OutputKind::Key(key_type) => {
            let seed = load_seed(config)?;
            let key = get_key(password, realm, seed.as_ref(), key_type, cli.allow_unsafe)
                .with_context(|| format!("Failed to derive {key_type} key"))?;
            let mut pem = Zeroizing::new(Vec::new());
            write_pem(&key, &mut *pem).context("Failed to encode key")?;
            pem
        }
    };
    Ok(payload)
}

/// Config file (if any), then env vars, then flags.
fn load_config(cli: &Cli) -> Result<CliConfig> {
    let mut config = match &cli.config {
        Some(path) => CliConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => CliConfig::default(),
    };

    config.apply_env_overrides();

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(seed) = &cli.seed {
        config.general.seed_file = Some(seed.clone());
    }
    match (cli.kind, cli.length) {
        (OutputKind::Pass, Some(len)) => config.password.length = len,
        (OutputKind::Raw, Some(len)) => anyhow::ensure!(
            len <= MAX_RAW_LENGTH,
            "--length {} exceeds maximum of {} raw bytes",
            len,
            MAX_RAW_LENGTH
        ),
        _ => {}
    }

    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

/// `-p` flag, then `REALMKEY_MASTER`, then an interactive prompt.
fn resolve_password(flag: Option<&str>, confirm: bool) -> Result<Zeroizing<String>> {
    if let Some(p) = flag {
        return Ok(Zeroizing::new(p.to_string()));
    }
    if let Ok(p) = std::env::var("REALMKEY_MASTER") {
        return Ok(Zeroizing::new(p));
    }

    let password = Zeroizing::new(
        rpassword::prompt_password("Master password: ").context("Failed to read password")?,
    );
    if confirm {
        let again = Zeroizing::new(
            rpassword::prompt_password("Repeat master password: ")
                .context("Failed to read password")?,
        );
        anyhow::ensure!(*password == *again, "Passwords do not match");
    }
    Ok(password)
}

fn load_seed(config: &CliConfig) -> Result<Option<EncryptedSeed>> {
    config.general.seed_file.as_deref().map(read_seed).transpose()
}

fn read_seed(path: &Path) -> Result<EncryptedSeed> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    EncryptedSeed::from_bytes(&bytes)
        .with_context(|| format!("Invalid seed file: {}", path.display()))
}

/// Stdout, or a new file readable only by the owner.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let Some(path) = path else {
        return Ok(Box::new(io::stdout().lock()));
    };

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let file = options
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(Box::new(file))
}
