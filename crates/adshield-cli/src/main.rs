//! adshield CLI
//!
//! Operator tool for inspecting and updating content blocking profiles.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use adshield_core::types::ResourceType;
use adshield_core::url::host_suffixes;
use adshield_parser::header;
use adshield_profile::{FilterProfile, ProfileDescriptor, ProfileError, TracingConsole};

#[derive(Parser)]
#[command(name = "adshield")]
#[command(about = "Content blocking profile tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a profile file header
    Header {
        /// Profile file to scan
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Check a request URL against a profile
    Check {
        /// Profile file holding the rules
        #[arg(short, long)]
        input: PathBuf,

        /// Page URL the request originates from
        #[arg(short, long, default_value = "")]
        base: String,

        /// Request URL to classify
        #[arg(short, long)]
        url: String,

        /// Resource type of the request
        #[arg(short = 't', long, value_enum, default_value = "other")]
        kind: RequestKind,
    },

    /// List cosmetic selectors for a domain
    Cosmetics {
        /// Profile file holding the rules
        #[arg(short, long)]
        input: PathBuf,

        /// Page domain to query
        #[arg(short, long)]
        domain: String,

        /// Skip generic (global) selectors
        #[arg(long)]
        domain_only: bool,
    },

    /// Download a subscription into a data directory
    Update {
        /// Data directory holding the contentBlocking cache
        #[arg(short = 'd', long, default_value = ".")]
        data_dir: PathBuf,

        /// Profile name (file stem under contentBlocking/)
        #[arg(short, long)]
        name: String,

        /// Subscription URL
        #[arg(short, long)]
        url: String,
    },
}

/// Host resource types accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RequestKind {
    Document,
    Subdocument,
    Stylesheet,
    Script,
    Image,
    Object,
    ObjectSubrequest,
    Xhr,
    Websocket,
    Popup,
    Other,
}

impl From<RequestKind> for ResourceType {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Document => ResourceType::MainFrame,
            RequestKind::Subdocument => ResourceType::SubFrame,
            RequestKind::Stylesheet => ResourceType::StyleSheet,
            RequestKind::Script => ResourceType::Script,
            RequestKind::Image => ResourceType::Image,
            RequestKind::Object => ResourceType::Object,
            RequestKind::ObjectSubrequest => ResourceType::ObjectSubrequest,
            RequestKind::Xhr => ResourceType::XmlHttpRequest,
            RequestKind::Websocket => ResourceType::WebSocket,
            RequestKind::Popup => ResourceType::Popup,
            RequestKind::Other => ResourceType::Other,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Header { input } => cmd_header(&input),
        Commands::Check {
            input,
            base,
            url,
            kind,
        } => cmd_check(&input, &base, &url, kind),
        Commands::Cosmetics {
            input,
            domain,
            domain_only,
        } => cmd_cosmetics(&input, &domain, domain_only),
        Commands::Update {
            data_dir,
            name,
            url,
        } => cmd_update(&data_dir, &name, &url),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_header(input: &PathBuf) -> Result<(), String> {
    let info = header::scan_header_file(input).map_err(|e| e.to_string())?;

    match info.title {
        Some(title) => println!("Title: {title}"),
        None => println!("Title: (none)"),
    }
    println!("Empty: {}", if info.is_empty { "yes" } else { "no" });

    Ok(())
}

fn cmd_check(input: &PathBuf, base: &str, url: &str, kind: RequestKind) -> Result<(), String> {
    let mut profile = FilterProfile::from_file(input);
    if profile.error() != ProfileError::None {
        return Err(format!("profile failed to load: {:?}", profile.error()));
    }

    let result = profile.check_url(base, url, kind.into());

    if result.is_exception {
        println!("exception: {}", result.rule.unwrap_or_default());
    } else if result.is_blocked {
        println!("blocked: {}", result.rule.unwrap_or_default());
    } else {
        println!("pass");
    }

    Ok(())
}

fn cmd_cosmetics(input: &PathBuf, domain: &str, domain_only: bool) -> Result<(), String> {
    let mut profile = FilterProfile::from_file(input);
    if profile.error() != ProfileError::None {
        return Err(format!("profile failed to load: {:?}", profile.error()));
    }

    let result = profile.cosmetic_filters(&host_suffixes(domain), domain_only);

    for selector in &result.rules {
        println!("{selector}");
    }
    for selector in &result.exceptions {
        println!("exception: {selector}");
    }

    Ok(())
}

fn cmd_update(data_dir: &PathBuf, name: &str, url: &str) -> Result<(), String> {
    let update_url = url::Url::parse(url).map_err(|e| format!("invalid update URL: {e}"))?;

    let descriptor = ProfileDescriptor {
        name: name.to_string(),
        update_url: Some(update_url),
        ..ProfileDescriptor::default()
    };
    let mut profile = FilterProfile::new(
        descriptor,
        data_dir.clone(),
        adshield_parser::ParserSettings::default(),
        std::sync::Arc::new(TracingConsole),
    );

    let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    runtime.block_on(async {
        if !profile.update(None) {
            return Err("update could not be started".to_string());
        }
        if !profile.finish_update().await {
            return Err(format!("update failed: {:?}", profile.error()));
        }
        Ok(())
    })?;

    println!(
        "updated {} ({})",
        profile.path().display(),
        profile.title()
    );

    Ok(())
}
