mod cli;

use skipsplice::{config, probe, server};
use skipsplice_av::{ByteProber, FfprobeProber};
use skipsplice_db::init_pool;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

fn build_prober(config: &config::ProbeConfig) -> Result<FfprobeProber> {
    let settings = probe::probe_settings(config).context("ffprobe is required")?;
    tracing::debug!(ffprobe = %settings.ffprobe.display(), "Using ffprobe");
    Ok(FfprobeProber::new(settings)?)
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over the config file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting skipsplice server");

    let db_path = config.database.path.to_string_lossy().into_owned();
    tracing::info!("Initializing database at {}", db_path);
    let db_pool = init_pool(&db_path)?;

    let prober: Arc<dyn ByteProber> = Arc::new(build_prober(&config.probe)?);

    server::start_server(config, db_pool, prober).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "skipsplice=trace,skipsplice_av=trace,skipsplice_media=debug,skipsplice_db=debug,tower_http=debug".to_string()
        } else {
            "skipsplice=info,skipsplice_av=info,skipsplice_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::ProbeOffset { url, seconds } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_offset(&url, seconds, cli.config.as_deref()))
        }
        Commands::Chapters { url, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(list_chapters(&url, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("skipsplice {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn probe_offset(url: &str, seconds: f64, config_path: Option<&Path>) -> Result<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        anyhow::bail!("Timestamp must be a non-negative number of seconds");
    }
    let config = config::load_config_or_default(config_path)?;
    let prober = build_prober(&config.probe)?;

    let source = prober.resolve(url).await;
    println!("Resolved: {}", source.final_url);
    match source.content_length {
        Some(len) => println!("Length: {} bytes", len),
        None => println!("Length: unknown"),
    }
    if let Some(duration) = source.duration {
        println!("Duration: {:.3}s", duration);
    }

    let offset = prober.find_offset(&source.final_url, seconds).await;
    if offset == 0 {
        println!("No usable offset found for {:.3}s", seconds);
    } else {
        println!("Offset at {:.3}s: {}", seconds, offset);
    }

    Ok(())
}

async fn list_chapters(url: &str, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let prober = build_prober(&config.probe)?;
    let chapters = prober.find_chapters(url).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&chapters)?);
        return Ok(());
    }

    if chapters.is_empty() {
        println!("No chapters found");
        return Ok(());
    }

    for (i, chapter) in chapters.iter().enumerate() {
        let marker = if chapter.is_intro() { " [intro]" } else { "" };
        println!(
            "  [{}] {:>9.3} - {:>9.3}  {}{}",
            i, chapter.start, chapter.end, chapter.title, marker
        );
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let ffprobe = config
        .probe
        .ffprobe_path
        .clone()
        .unwrap_or_else(|| "ffprobe".into());

    let tools = skipsplice_av::check_tools(&ffprobe);
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffprobe is missing. Install it to enable byte probing.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let warnings = config::validate_config(&config)?;
    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.database.path.display());
    println!(
        "  Admin key: {}",
        if config.server.admin_api_key.is_some() { "set" } else { "not set" }
    );
    println!(
        "  Oracles: introdb={} aniskip={} anime-skip={}",
        config.oracles.introdb_enabled,
        config.oracles.aniskip_enabled,
        config.oracles.animeskip_enabled && config.oracles.animeskip_client_id.is_some()
    );
    for warning in warnings {
        println!("  ! {}", warning);
    }

    Ok(())
}
