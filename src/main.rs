use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use auditmind::diagram::{ArtifactState, DiagramPipeline, DiagramSandbox};
use auditmind::types::AnalysisRequest;
use auditmind::{ConfigLoader, ReasoningOrchestrator, create_provider};

#[derive(Parser)]
#[command(name = "auditmind")]
#[command(
    version,
    about = "AI triage, remediation, and diagnosis engine for security scan findings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, help = "Load configuration from a specific file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Enable debug logging")]
    verbose: bool,

    #[arg(long, short, help = "Only log errors")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Diagnose a stuck scan
    Diagnose {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        scanner: String,
        #[arg(long, default_value = "scan")]
        phase: String,
        #[arg(long, default_value_t = 1800)]
        timeout_secs: u64,
        #[arg(long, help = "JSON file with repository metadata")]
        metadata: Option<PathBuf>,
    },

    /// Triage a security finding
    Triage {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "medium")]
        severity: String,
        #[arg(long)]
        scanner: String,
    },

    /// Generate a remediation plan for a vulnerability
    Remediate {
        #[arg(long)]
        vuln_type: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "unknown")]
        language: String,
        #[arg(long, help = "File with the vulnerable code or dependency context")]
        context: Option<PathBuf>,
    },

    /// Generate an architecture overview with a diagram
    Architecture {
        #[arg(long)]
        repo: String,
        #[arg(long, help = "File containing the repository file structure")]
        structure: PathBuf,
        #[arg(long = "config-file", help = "Configuration files to include")]
        config_files: Vec<PathBuf>,
        #[arg(long, help = "Render the generated diagram script")]
        render: bool,
    },

    /// Execute a diagram script in the sandbox
    Render {
        #[arg(help = "Diagram script to execute")]
        source: PathBuf,
        #[arg(long, short, default_value = "architecture_diagram.png")]
        output: PathBuf,
        #[arg(long, help = "Skip the automated repair cycle on failure")]
        no_repair: bool,
    },

    /// Check backend availability
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", style("✗").red());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "auditmind=debug"
    } else if quiet {
        "error"
    } else {
        "auditmind=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    match cli.command {
        Commands::Diagnose {
            repo,
            scanner,
            phase,
            timeout_secs,
            metadata,
        } => {
            let provider = create_provider(&config.llm)?;
            let orchestrator =
                ReasoningOrchestrator::new(provider, config.budget.cost_ceiling_usd);

            let mut request =
                AnalysisRequest::new(repo, scanner, phase, Duration::from_secs(timeout_secs));
            if let Some(path) = metadata {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                request = request.with_metadata(serde_json::from_str(&raw)?);
            }

            let analysis = orchestrator.analyze_stuck_scan(&request).await;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }

        Commands::Triage {
            title,
            description,
            severity,
            scanner,
        } => {
            let provider = create_provider(&config.llm)?;
            let orchestrator =
                ReasoningOrchestrator::new(provider, config.budget.cost_ceiling_usd);

            let triage = orchestrator
                .triage_finding(&title, &description, &severity, &scanner)
                .await;
            println!("{}", serde_json::to_string_pretty(&triage)?);
        }

        Commands::Remediate {
            vuln_type,
            description,
            language,
            context,
        } => {
            let provider = create_provider(&config.llm)?;
            let orchestrator =
                ReasoningOrchestrator::new(provider, config.budget.cost_ceiling_usd);

            let context_text = match context {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => String::new(),
            };

            let plan = orchestrator
                .generate_remediation(&vuln_type, &description, &context_text, &language)
                .await;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }

        Commands::Architecture {
            repo,
            structure,
            config_files,
            render,
        } => {
            let provider = create_provider(&config.llm)?;
            let orchestrator = ReasoningOrchestrator::new(
                provider.clone(),
                config.budget.cost_ceiling_usd,
            );

            let file_structure = std::fs::read_to_string(&structure)
                .with_context(|| format!("reading {}", structure.display()))?;
            let mut configs = BTreeMap::new();
            for path in config_files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                configs.insert(name, content);
            }

            let overview = orchestrator
                .generate_architecture_overview(&repo, &file_structure, &configs)
                .await;

            println!("{}", overview.report);

            if let Some(source) = overview.diagram_source {
                println!("\n{}", style("Diagram source:").bold());
                println!("{source}");

                if render {
                    let pipeline = DiagramPipeline::new(
                        DiagramSandbox::new(&config.sandbox),
                        provider,
                    );
                    let artifact = pipeline.render(source).await;
                    report_artifact(&artifact, &PathBuf::from("architecture_diagram.png"))?;
                }
            } else {
                println!(
                    "{} model produced no diagram source",
                    style("⚠").yellow()
                );
            }
        }

        Commands::Render {
            source,
            output,
            no_repair,
        } => {
            let script = std::fs::read_to_string(&source)
                .with_context(|| format!("reading {}", source.display()))?;
            let provider = create_provider(&config.llm)?;
            let pipeline = DiagramPipeline::new(DiagramSandbox::new(&config.sandbox), provider);

            let artifact = if no_repair {
                pipeline.render_once(script).await
            } else {
                pipeline.render(script).await
            };

            report_artifact(&artifact, &output)?;
        }

        Commands::Status => {
            let provider = create_provider(&config.llm)?;
            println!(
                "Provider: {} (model: {})",
                provider.name(),
                provider.model()
            );
            if provider.health_check().await? {
                println!("{} backend reachable", style("✓").green());
            } else {
                println!("{} backend unreachable", style("✗").red());
            }
        }
    }

    Ok(())
}

fn report_artifact(
    artifact: &auditmind::DiagramArtifact,
    output: &PathBuf,
) -> anyhow::Result<()> {
    match artifact.state {
        ArtifactState::Succeeded => {
            if let Some(image) = &artifact.image {
                std::fs::write(output, image)
                    .with_context(|| format!("writing {}", output.display()))?;
                println!(
                    "{} diagram rendered to {} ({} repair attempts)",
                    style("✓").green(),
                    output.display(),
                    artifact.repair_attempts
                );
            }
        }
        _ => {
            println!(
                "{} diagram failed: {}",
                style("✗").red(),
                artifact.last_failure.as_deref().unwrap_or("unknown")
            );
            println!("Last source:\n{}", artifact.source);
        }
    }
    Ok(())
}
