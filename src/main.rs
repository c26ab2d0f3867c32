use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use keel::bootstrap;
use keel::cli::{Cli, Command, OutputFormat};
use keel::config;
use keel::logging;
use keel::paths;
use keel::settings::Settings;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let terminal_filter = if cli.verbose {
        EnvFilter::new("keel=debug")
    } else {
        EnvFilter::from_default_env()
            .add_directive("keel=info".parse().expect("valid log directive"))
    };

    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter);

    // File layer: always captures keel=debug, initially discards until the
    // base dir is known from config.
    let (file_writer, file_handle) = logging::DeferredFileWriter::new();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("keel=debug"));

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();

    let config = config::load_config(&cli.config)?;

    match cli.command {
        Command::Probe => {
            let report = bootstrap::probe_report(&config);
            let any_available = report.iter().any(|(_, available)| *available);

            if matches!(cli.output, OutputFormat::Json) {
                let entries: Vec<ProbeJson> = report
                    .into_iter()
                    .map(|(source, available)| ProbeJson {
                        source: source.to_string(),
                        available,
                    })
                    .collect();
                println!(
                    "{}",
                    facet_json::to_string(&entries).expect("JSON serialization")
                );
            } else {
                for (source, available) in report {
                    let state = if available { "available" } else { "unavailable" };
                    println!("{source}: {state}");
                }
            }

            if !any_available {
                std::process::exit(1);
            }
        }

        Command::Settings => {
            let resolved = bootstrap::resolve(&config).await?;
            print_resolved(&resolved, &cli.output);
        }

        Command::Bootstrap => {
            // Activate file logging for the real boot path.
            let log_path = paths::log_dir(&config.base_dir()).join("keel.log");
            if let Err(e) = file_handle.set_file(&log_path) {
                tracing::warn!(path = %log_path.display(), error = %e, "boot log unavailable");
            }

            let resolved = bootstrap::resolve(&config).await?;
            let out_path = paths::resolved_settings_path(&config.base_dir());
            bootstrap::persist(&resolved.settings, &out_path).await?;

            if matches!(cli.output, OutputFormat::Json) {
                print_resolved(&resolved, &cli.output);
            } else {
                println!(
                    "Settings resolved from {} (agent {})",
                    resolved.source, resolved.settings.agent_id
                );
                println!("Written to {}", out_path.display());
            }
        }
    }

    Ok(())
}

fn print_resolved(resolved: &bootstrap::Resolved, output: &OutputFormat) {
    if matches!(output, OutputFormat::Json) {
        let json = ResolvedJson {
            source: resolved.source.to_string(),
            instance_id: resolved.instance_id.clone(),
            public_key: resolved.public_key.clone(),
            server_name: resolved.server_name.clone(),
            settings: resolved.settings.clone(),
        };
        println!(
            "{}",
            facet_json::to_string(&json).expect("JSON serialization")
        );
    } else {
        println!("source:    {}", resolved.source);
        if let Some(id) = &resolved.instance_id {
            println!("instance:  {id}");
        }
        if let Some(name) = &resolved.server_name {
            println!("server:    {name}");
        }
        println!("agent_id:  {}", resolved.settings.agent_id);
        println!("mbus:      {}", resolved.settings.mbus);
        if !resolved.settings.registry_endpoint.is_empty() {
            println!("registry:  {}", resolved.settings.registry_endpoint);
        }
        match &resolved.settings.networks {
            Some(networks) => {
                for (name, net) in networks {
                    println!("network:   {name} ({} {})", net.kind, net.ip);
                }
            }
            None => println!("network:   auto-detect"),
        }
    }
}

// ── JSON output structs ─────────────────────────────────────────────

#[derive(facet::Facet)]
struct ProbeJson {
    source: String,
    available: bool,
}

#[derive(facet::Facet)]
struct ResolvedJson {
    source: String,
    instance_id: Option<String>,
    public_key: Option<String>,
    server_name: Option<String>,
    settings: Settings,
}
