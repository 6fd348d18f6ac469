use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use flowc::diag::Diagnostic;
use flowc::pass::PassId;
use flowc::pipeline::{parse_program, run_pipeline, CompilationState, PipelineOptions};
use flowc::source::SourceFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    /// Verify the program; print nothing on success
    Check,
    Ast,
    Graph,
    Temporal,
    Dot,
    BuildInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ErrorFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "flowc",
    version,
    about = "Flowgraph compiler — checks dataflow query programs for runaway computations on live data"
)]
struct Cli {
    /// Program source file (`-` reads stdin)
    source: PathBuf,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Check)]
    emit: EmitStage,

    /// Diagnostic format
    #[arg(long, value_enum, default_value_t = ErrorFormat::Text)]
    error_format: ErrorFormat,

    /// Report every runaway violation instead of only the first
    #[arg(long)]
    all: bool,

    /// Filename reported in locations (defaults to the source path)
    #[arg(long)]
    filename: Option<String>,

    /// Verbosity level (-v info, -vv debug, -vvv trace); FLOWC_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Error)]
enum LoadError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

fn init_tracing(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("FLOWC_LOG").unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_source(cli: &Cli) -> Result<SourceFile, LoadError> {
    let path = cli.source.display().to_string();
    let text = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
        buf
    } else {
        std::fs::read_to_string(&cli.source).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?
    };
    let name = cli.filename.clone().unwrap_or(path);
    Ok(SourceFile::new(name, text))
}

fn report(diags: &[Diagnostic], source: &SourceFile, format: ErrorFormat) {
    for d in diags {
        match format {
            ErrorFormat::Text => eprintln!("{}", d.render(source)),
            ErrorFormat::Json => match serde_json::to_string(&d.report(source)) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("flowc: error: {e}"),
            },
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let source = match load_source(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("flowc: error: {e}");
            return ExitCode::from(2);
        }
    };
    tracing::info!(source = source.name(), emit = ?cli.emit, "compiling");

    let program = match parse_program(&source) {
        Ok(p) => p,
        Err(diags) => {
            report(&diags, &source, cli.error_format);
            return ExitCode::from(1);
        }
    };

    if cli.emit == EmitStage::Ast {
        println!("{program:#?}");
        return ExitCode::SUCCESS;
    }

    let terminal = match cli.emit {
        EmitStage::Graph | EmitStage::BuildInfo => PassId::BuildGraph,
        EmitStage::Temporal | EmitStage::Dot => PassId::Propagate,
        EmitStage::Check | EmitStage::Ast => PassId::CheckRunaway,
    };
    let options = PipelineOptions {
        all_violations: cli.all,
    };

    let mut state = CompilationState::new(source, program);
    let result = run_pipeline(&mut state, terminal, options, |_, _| {});
    if let Err(e) = result {
        tracing::debug!(error = %e, "pipeline stopped");
        report(&state.diagnostics, &state.source, cli.error_format);
        return ExitCode::from(1);
    }

    match cli.emit {
        EmitStage::Graph => {
            if let Some(graph) = &state.graph {
                print!("{graph}");
            }
        }
        EmitStage::BuildInfo => {
            if let Some(provenance) = &state.provenance {
                print!("{}", provenance.to_json());
            }
        }
        EmitStage::Temporal => {
            if let (Some(graph), Some(temporal)) = (&state.graph, &state.temporal) {
                match cli.error_format {
                    ErrorFormat::Json => match serde_json::to_string_pretty(&temporal.records(graph)) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("flowc: error: {e}");
                            return ExitCode::from(1);
                        }
                    },
                    ErrorFormat::Text => {
                        for node in &graph.nodes {
                            println!(
                                "{} {}: {} -> {}",
                                node.id,
                                node.name,
                                temporal.input(node.id),
                                temporal.output(node.id)
                            );
                        }
                    }
                }
            }
        }
        EmitStage::Dot => {
            if let Some(graph) = &state.graph {
                print!("{}", flowc::dot::emit_dot(graph, state.temporal.as_ref()));
            }
        }
        EmitStage::Check | EmitStage::Ast => {}
    }

    ExitCode::SUCCESS
}
