use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::Env;
use fhe_vault_core::{
    DirectoryKeyStore, FheVault, PublicEvaluator, VaultConfig, standard_profiles,
};
use log::{LevelFilter, debug};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "fhe-vault",
    author,
    version,
    about = "Provision HE keys and encrypt real-valued frames"
)]
struct Cli {
    #[arg(long, global = true)]
    debug: bool,
    /// JSON file with `profile` and `keys_dir` settings.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a context and key pair and write the key store.
    Provision {
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Encrypt comma-separated values with a provisioned key store.
    Encrypt {
        #[arg(long, value_name = "DIR")]
        keys: Option<PathBuf>,
        #[arg(long, value_name = "CSV", allow_hyphen_values = true)]
        values: String,
        /// Binary output; prints hex to stdout when omitted.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Decrypt a ciphertext produced by `encrypt` or `sum`.
    Decrypt {
        #[arg(long, value_name = "DIR")]
        keys: Option<PathBuf>,
        #[arg(long, value_name = "FILE", conflicts_with = "cipher_hex")]
        cipher: Option<PathBuf>,
        #[arg(long, value_name = "HEX")]
        cipher_hex: Option<String>,
    },
    /// Write the public key and context as one bundle.
    ExportBundle {
        #[arg(long, value_name = "DIR")]
        keys: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Add ciphertexts together using only a public bundle.
    Sum {
        #[arg(long, value_name = "FILE")]
        bundle: PathBuf,
        #[arg(long = "cipher", value_name = "FILE", required = true)]
        ciphers: Vec<PathBuf>,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// List the compiled parameter profiles.
    Profiles,
    /// Provision, encrypt, decrypt and sum in a scratch directory.
    Demo {
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let config = match &cli.config {
        Some(path) => VaultConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => VaultConfig::default(),
    };
    debug!("config {:?}", config);
    match cli.command {
        Commands::Provision { out } => cmd_provision(&config, out),
        Commands::Encrypt { keys, values, out } => cmd_encrypt(&config, keys, &values, out),
        Commands::Decrypt {
            keys,
            cipher,
            cipher_hex,
        } => cmd_decrypt(&config, keys, cipher, cipher_hex),
        Commands::ExportBundle { keys, out } => cmd_export_bundle(&config, keys, &out),
        Commands::Sum {
            bundle,
            ciphers,
            out,
        } => cmd_sum(&bundle, &ciphers, &out),
        Commands::Profiles => cmd_profiles(),
        Commands::Demo { dir } => cmd_demo(&config, dir),
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default));
    builder.format_timestamp(None);
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

fn open_vault(config: &VaultConfig, keys: Option<PathBuf>) -> Result<FheVault> {
    let vault = FheVault::new(config.clone())?;
    let root = keys.unwrap_or_else(|| config.keys_dir.clone());
    vault
        .load(&DirectoryKeyStore::open(&root))
        .with_context(|| format!("loading key store from {}", root.display()))?;
    Ok(vault)
}

fn cmd_provision(config: &VaultConfig, out: Option<PathBuf>) -> Result<()> {
    let vault = FheVault::new(config.clone())?;
    let out = out.unwrap_or_else(|| config.keys_dir.clone());
    vault
        .provision(&out)
        .with_context(|| format!("provisioning into {}", out.display()))?;
    println!(
        "Provisioned profile '{}' into {}",
        vault.configured_profile().name,
        out.display()
    );
    if let Some(fingerprint) = vault.fingerprint() {
        println!("Context fingerprint: {fingerprint}");
    }
    Ok(())
}

fn cmd_encrypt(
    config: &VaultConfig,
    keys: Option<PathBuf>,
    values: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let vault = open_vault(config, keys)?;
    let frame = parse_values(values)?;
    let ciphertext = vault.encrypt(&frame)?;
    match out {
        Some(path) => {
            write_bytes(&path, "ciphertext", &ciphertext)?;
            println!(
                "Encrypted {} values into {} bytes at {}",
                frame.len(),
                ciphertext.len(),
                path.display()
            );
        }
        None => println!("{}", hex::encode(&ciphertext)),
    }
    Ok(())
}

fn cmd_decrypt(
    config: &VaultConfig,
    keys: Option<PathBuf>,
    cipher: Option<PathBuf>,
    cipher_hex: Option<String>,
) -> Result<()> {
    let ciphertext = match (cipher, cipher_hex) {
        (Some(path), _) => read_bytes(&path, "ciphertext")?,
        (None, Some(text)) => hex::decode(text.trim()).context("parsing hex ciphertext")?,
        (None, None) => bail!("pass --cipher FILE or --cipher-hex HEX"),
    };
    let vault = open_vault(config, keys)?;
    let values = vault.decrypt(&ciphertext)?;
    println!("{}", serde_json::to_string(&values)?);
    Ok(())
}

fn cmd_export_bundle(config: &VaultConfig, keys: Option<PathBuf>, out: &Path) -> Result<()> {
    let vault = open_vault(config, keys)?;
    let bundle = vault.export_public_bundle()?;
    write_bytes(out, "public bundle", &bundle)?;
    println!(
        "Wrote public bundle ({} bytes) to {}",
        bundle.len(),
        out.display()
    );
    Ok(())
}

fn cmd_sum(bundle_path: &Path, cipher_paths: &[PathBuf], out: &Path) -> Result<()> {
    let bundle = read_bytes(bundle_path, "public bundle")?;
    let evaluator = PublicEvaluator::from_bundle_default(&bundle)?;
    let envelopes = cipher_paths
        .iter()
        .map(|path| read_bytes(path, "ciphertext"))
        .collect::<Result<Vec<_>>>()?;
    let total = evaluator.sum(&envelopes)?;
    write_bytes(out, "sum", &total)?;
    println!(
        "Summed {} ciphertexts for context {} into {}",
        envelopes.len(),
        evaluator.fingerprint().short(),
        out.display()
    );
    Ok(())
}

fn cmd_profiles() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(standard_profiles())?);
    Ok(())
}

fn cmd_demo(config: &VaultConfig, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| env::temp_dir().join("fhe-vault-demo"));
    let vault = FheVault::new(config.clone())?;
    vault
        .provision(&dir)
        .with_context(|| format!("provisioning into {}", dir.display()))?;
    println!("Provisioned key store in {}", dir.display());

    let frame = [1.5f32, -2.25, 0.0];
    let ciphertext = vault.encrypt(&frame)?;
    let cipher_path = dir.join("frame.ct");
    write_bytes(&cipher_path, "ciphertext", &ciphertext)?;
    println!(
        "Encrypted {:?} into {} bytes ({})",
        frame,
        ciphertext.len(),
        cipher_path.display()
    );

    let reloaded = FheVault::new(config.clone())?;
    reloaded.load(&DirectoryKeyStore::open(&dir))?;
    let recovered = reloaded.decrypt(&read_bytes(&cipher_path, "ciphertext")?)?;
    println!("Decrypted after reload: {:?}", recovered);

    let evaluator = PublicEvaluator::from_bundle_default(&vault.export_public_bundle()?)?;
    let other = evaluator.encrypt(&[0.5, 0.25, -1.0])?;
    let total = evaluator.sum(&[ciphertext, other])?;
    println!("Public sum with [0.5, 0.25, -1.0]: {:?}", vault.decrypt(&total)?);
    Ok(())
}

fn parse_values(text: &str) -> Result<Vec<f32>> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f32>()
                .with_context(|| format!("invalid value '{part}'"))
        })
        .collect()
}

fn read_bytes(path: &Path, label: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {} from {}", label, path.display()))
}

fn write_bytes(path: &Path, label: &str, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("writing {} to {}", label, path.display()))
}
