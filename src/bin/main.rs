//! signtool-batch CLI
//!
//! Signs a list of files with the Windows SDK signing tool, one process per
//! file, and reports what happened to each of them.

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use signtool_batch::{
    adapters::{
        AlwaysSign, CertificateStore, ConfirmGate, DirectoryStore, DryRun, PowerShellStore,
        PromptGate, SdkToolLocator, StoreLocation, SubprocessInvoker, TerminalChooser,
        ToolLocator,
    },
    infra::config::{ConfigManager, ExportFormat, SigningConfiguration},
    BatchWorkflow, DigestAlgorithm, ResultReporter, SignSettings, SigningResult, SigningStatus,
    SigningTarget, Thumbprint, TimestampUrl,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "signtool-batch")]
#[command(about = "Batch code signing with signtool and a certificate from the store")]
#[command(long_about = "
signtool-batch - sign many files with one certificate

EXAMPLES:
    # Sign two files (the only code signing certificate is picked automatically)
    signtool-batch sign app.exe setup.msi

    # Use a specific certificate and ask before each file
    signtool-batch sign --thumbprint E3FCC04DD19109C7562A08486B16DAFDCB92BE81 --confirm *.dll

    # Show what would be signed
    signtool-batch sign --dry-run bin/*.exe

    # Which certificates and which signtool would be used
    signtool-batch list-certs
    signtool-batch locate-tool

ENVIRONMENT VARIABLES:
    SIGNTOOL_PATH   Explicit signtool.exe to use
    RUST_LOG        Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign one or more files
    Sign {
        /// Files to sign, processed in the order given
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Certificate thumbprint (SHA-1, 40 hex characters)
        #[arg(short, long, value_name = "THUMBPRINT")]
        thumbprint: Option<String>,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        tool: ToolArgs,

        /// Timestamp server URL
        #[arg(short = 'u', long, value_name = "URL")]
        timestamp_url: Option<String>,

        /// File digest algorithm
        #[arg(long, value_enum)]
        digest: Option<DigestArg>,

        /// Pass /debug to signtool
        #[arg(long)]
        debug: bool,

        /// Ask before signing each file
        #[arg(short, long, conflicts_with = "dry_run")]
        confirm: bool,

        /// Resolve everything, sign nothing
        #[arg(long)]
        dry_run: bool,

        /// Kill signtool after this many seconds per file (0 = wait forever)
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List certificates eligible for code signing
    ListCerts {
        #[command(flatten)]
        store: StoreArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which signtool a batch would use
    LocateTool {
        #[command(flatten)]
        tool: ToolArgs,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
struct StoreArgs {
    /// Read certificates from files in this directory instead of the OS store.
    /// signtool still selects by thumbprint, so the certificate with its
    /// private key must also be installed in the OS store to sign
    #[arg(long, value_name = "DIR")]
    cert_dir: Option<PathBuf>,

    /// OS certificate store to query
    #[arg(long, value_enum)]
    store: Option<StoreArg>,
}

#[derive(Args)]
struct ToolArgs {
    /// Explicit signtool.exe
    #[arg(long, value_name = "PATH", env = "SIGNTOOL_PATH")]
    signtool: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value (empty clears optional paths)
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import configuration
    Import {
        /// Configuration file to import
        file: PathBuf,
        /// Import format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum DigestArg {
    Sha256,
    Sha384,
    Sha512,
}

impl From<DigestArg> for DigestAlgorithm {
    fn from(arg: DigestArg) -> Self {
        match arg {
            DigestArg::Sha256 => DigestAlgorithm::Sha256,
            DigestArg::Sha384 => DigestAlgorithm::Sha384,
            DigestArg::Sha512 => DigestAlgorithm::Sha512,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum StoreArg {
    CurrentUser,
    LocalMachine,
}

impl From<StoreArg> for StoreLocation {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::CurrentUser => StoreLocation::CurrentUser,
            StoreArg::LocalMachine => StoreLocation::LocalMachine,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum ExportFormatArg {
    Toml,
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

/// Parameters for the sign command
struct SignCommandArgs {
    files: Vec<PathBuf>,
    thumbprint: Option<String>,
    store: StoreArgs,
    tool: ToolArgs,
    timestamp_url: Option<String>,
    digest: Option<DigestArg>,
    debug: bool,
    confirm: bool,
    dry_run: bool,
    timeout: Option<u64>,
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };

    match cli.command {
        Commands::Sign {
            files,
            thumbprint,
            store,
            tool,
            timestamp_url,
            digest,
            debug,
            confirm,
            dry_run,
            timeout,
            json,
        } => {
            let args = SignCommandArgs {
                files,
                thumbprint,
                store,
                tool,
                timestamp_url,
                digest,
                debug,
                confirm,
                dry_run,
                timeout,
                json,
            };
            let config = config_manager.load_or_default()?;
            handle_sign_command(args, &config)?;
        }

        Commands::ListCerts { store, json } => {
            let config = config_manager.load_or_default()?;
            handle_list_certs_command(&store, json, &config)?;
        }

        Commands::LocateTool { tool } => {
            let config = config_manager.load_or_default()?;
            let path = build_locator(&tool, &config).locate()?;
            println!("{}", path.display());
        }

        Commands::Config(config_cmd) => {
            handle_config_command(config_cmd, &config_manager)?;
        }
    }

    Ok(())
}

fn build_locator(tool: &ToolArgs, config: &SigningConfiguration) -> SdkToolLocator {
    let roots = if config.sdk_roots.is_empty() {
        SdkToolLocator::default_roots()
    } else {
        config.sdk_roots.clone()
    };
    SdkToolLocator::new(roots).with_explicit(
        tool.signtool
            .clone()
            .or_else(|| config.signtool_path.clone()),
    )
}

fn build_store(
    store: &StoreArgs,
    config: &SigningConfiguration,
) -> Result<Box<dyn CertificateStore>> {
    if let Some(dir) = store.cert_dir.clone().or_else(|| config.certificate_dir.clone()) {
        return Ok(Box::new(DirectoryStore::new(dir)));
    }

    let location = match store.store {
        Some(arg) => arg.into(),
        None => config.store_location()?,
    };
    Ok(Box::new(PowerShellStore::new(location)))
}

fn handle_sign_command(args: SignCommandArgs, config: &SigningConfiguration) -> Result<()> {
    // Every path must exist before the tool or store is touched
    let targets = args
        .files
        .iter()
        .map(SigningTarget::new)
        .collect::<signtool_batch::Result<Vec<_>>>()?;

    let settings = SignSettings {
        digest_algorithm: match args.digest {
            Some(arg) => arg.into(),
            None => config.digest_algorithm()?,
        },
        timestamp_url: match args.timestamp_url {
            Some(ref url) => TimestampUrl::new(url)?,
            None => config.timestamp_url()?,
        },
        debug: args.debug,
    };

    let timeout = match args.timeout {
        Some(seconds) => (seconds > 0).then(|| std::time::Duration::from_secs(seconds)),
        None => config.timeout(),
    };

    let locator = build_locator(&args.tool, config);
    let store = build_store(&args.store, config)?;
    let process = SubprocessInvoker::new().with_timeout(timeout);

    let thumbprint = args.thumbprint.as_deref().map(Thumbprint::new).transpose()?;

    let mut gate: Box<dyn ConfirmGate> = if args.dry_run {
        Box::new(DryRun)
    } else if args.confirm {
        Box::new(PromptGate::stdio())
    } else {
        Box::new(AlwaysSign)
    };

    let workflow = BatchWorkflow::new(&locator, store.as_ref(), &process).with_settings(settings);
    let outcome = match thumbprint {
        Some(thumbprint) => workflow.run_with_thumbprint(&targets, thumbprint, gate.as_mut())?,
        None => workflow.run(&targets, None, &mut TerminalChooser::stdio(), gate.as_mut())?,
    };

    let skipped = outcome.skipped.len();
    let results = ResultReporter::default().report(outcome.results);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results).into_diagnostic()?);
    } else {
        print_results(&results, skipped);
    }

    if results.iter().any(|r| !r.is_success()) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_results(results: &[SigningResult], skipped: usize) {
    for result in results {
        match result.status() {
            SigningStatus::Signed => println!("✅ {}", result.path().display()),
            SigningStatus::Failed => println!(
                "❌ {} (exit code {})",
                result.path().display(),
                result.exit_code()
            ),
            SigningStatus::LaunchFailed => {
                println!("❌ {} (signtool did not start)", result.path().display());
            }
            SigningStatus::TimedOut => println!("⏱️ {} (timed out)", result.path().display()),
        }
    }

    let signed = results.iter().filter(|r| r.is_success()).count();
    println!(
        "\n{signed} signed, {} failed, {skipped} skipped",
        results.len() - signed
    );
}

fn handle_list_certs_command(
    store: &StoreArgs,
    json: bool,
    config: &SigningConfiguration,
) -> Result<()> {
    let certificates = build_store(store, config)?.code_signing_certificates()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&certificates).into_diagnostic()?
        );
        return Ok(());
    }

    if certificates.is_empty() {
        println!("No code signing certificates found.");
        return Ok(());
    }

    println!("📋 Code signing certificates:");
    for cert in &certificates {
        println!("  {}", cert.thumbprint);
        println!("      Subject: {}", cert.subject);
        if let Some(ref issuer) = cert.issuer {
            println!("      Issuer:  {issuer}");
        }
        if let Some(ref not_after) = cert.not_after {
            println!("      Expires: {not_after}");
        }
    }
    Ok(())
}

fn handle_config_command(config_cmd: ConfigCommands, config_manager: &ConfigManager) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => {
            if !config_manager.config_path().exists() {
                println!("📋 No configuration file found. Use 'config init' to create one.");
                return Ok(());
            }
            let config = config_manager.load()?;
            let or_auto = |path: &Option<PathBuf>| {
                path.as_ref()
                    .map_or_else(|| "(auto)".to_string(), |p| p.display().to_string())
            };
            println!("📋 Current Configuration:");
            println!("  signtool path: {}", or_auto(&config.signtool_path));
            if config.sdk_roots.is_empty() {
                println!("  SDK roots: (default)");
            } else {
                for root in &config.sdk_roots {
                    println!("  SDK root: {}", root.display());
                }
            }
            println!("  Timestamp URL: {}", config.timestamp_url);
            println!("  Digest algorithm: {}", config.digest_algorithm);
            println!("  Store location: {}", config.store_location);
            println!("  Certificate directory: {}", or_auto(&config.certificate_dir));
            match config.timeout() {
                Some(timeout) => println!("  Timeout: {}s", timeout.as_secs()),
                None => println!("  Timeout: none"),
            }
            println!(
                "  Configuration file: {}",
                config_manager.config_path().display()
            );
        }

        ConfigCommands::Init => {
            config_manager.load_or_create_default()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
        }

        ConfigCommands::Set { key, value } => {
            config_manager.update_value(&key, &value)?;
            println!("✅ Configuration updated: {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager.export_config(format.into())?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }

        ConfigCommands::Import { file, format } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            config_manager.import_config(&content, format.into())?;
            println!("✅ Configuration imported from: {}", file.display());
        }
    }

    Ok(())
}
