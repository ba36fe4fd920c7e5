use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, trace};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use words::diagnostics::{
    diagnostic_from_anyhow, diagnostic_from_compile_error, diagnostic_from_parse_error,
    diagnostic_from_runtime_error, Diagnostic, DiagnosticStage,
};
use words::interpreter::{Interpreter, Stack, StackValue, DEFAULT_MAX_CALL_DEPTH};
use words::lexer::lex_source;
use words::m0_backend::{LabelSource, M0Compiler, Target};
use words::parser::{parse, parse_source};

fn main() -> ExitCode {
    initialize_logging();

    let words = Words::parse();

    let result = match words.subcmd {
        WordsSubcommand::Run(run) => run_program(run),
        WordsSubcommand::Build(build) => env::current_dir()
            .context("reading the current directory")
            .map_err(|err| io_diagnostic("failed to prepare the build", &err))
            .and_then(|current_dir| build_program(&current_dir, build)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(diagnostic) => {
            eprintln!("{}", diagnostic.render_terminal_auto());
            ExitCode::FAILURE
        }
    }
}

fn run_program(run: Run) -> Result<(), Diagnostic> {
    let source_path = Path::new(&run.source);
    let source = read_source(source_path)?;

    let program = parse_source(&source)
        .map_err(|err| diagnostic_from_parse_error(&source, Some(source_path), &err))?;
    debug!(nodes = program.nodes.len(), "Parsed source file");

    let mut interpreter = Interpreter::new().with_max_call_depth(run.max_call_depth);
    let result = interpreter
        .execute_program(&program, Stack::from(run.stack))
        .map_err(|err| diagnostic_from_runtime_error(&source, Some(source_path), &err))?;
    info!(result = ?result, "Program finished");

    if let Some(value) = result {
        println!("{value}");
    }
    Ok(())
}

fn build_program(current_dir: &Path, build: Build) -> Result<(), Diagnostic> {
    let target_dir = current_dir.join("target").join("words");
    std::fs::create_dir_all(&target_dir)
        .with_context(|| format!("creating {}", target_dir.display()))
        .map_err(|err| io_diagnostic("failed to prepare the build", &err))?;

    let source_path = Path::new(&build.source);
    let source = read_source(source_path)?;

    let tokens = lex_source(&source).collect::<Vec<_>>();
    let tokens_path = target_dir.join("tokens.json");
    write_json(&tokens_path, &tokens)?;
    trace!(tokens_path = %tokens_path.display(), "Tokenized source file");

    let program = parse(tokens)
        .map_err(|err| diagnostic_from_parse_error(&source, Some(source_path), &err))?;
    let ast_path = target_dir.join("ast.json");
    write_json(&ast_path, &program)?;
    debug!(ast_path = %ast_path.display(), "Parsed source file");

    let labels = if build.deterministic_labels {
        LabelSource::Sequential(0)
    } else {
        LabelSource::Unique
    };
    let assembly = M0Compiler::new(build.target)
        .with_labels(labels)
        .compile(&program)
        .map_err(|err| diagnostic_from_compile_error(&source, Some(source_path), &err))?;

    let assembly_path = build
        .output
        .unwrap_or_else(|| target_dir.join("program.s"));
    write_artifact(&assembly_path, &assembly)?;
    info!(assembly_path = %assembly_path.display(), board = %build.target, "Assembly generated");

    Ok(())
}

fn read_source(path: &Path) -> Result<String, Diagnostic> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))
        .map_err(|err| io_diagnostic("failed to read the source file", &err))?;
    trace!(source_len = source.len(), "Read input file");
    Ok(source)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Diagnostic> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))
        .map_err(|err| io_diagnostic("failed to write a build artifact", &err))?;
    write_artifact(path, &json)
}

fn write_artifact(path: &Path, contents: &str) -> Result<(), Diagnostic> {
    std::fs::write(path, contents)
        .with_context(|| format!("writing {}", path.display()))
        .map_err(|err| io_diagnostic("failed to write a build artifact", &err))
}

fn io_diagnostic(message: &str, error: &anyhow::Error) -> Diagnostic {
    diagnostic_from_anyhow(DiagnosticStage::Io, "WORDS-IO-001", message, error)
}

fn initialize_logging() {
    let env_filter = env::var("RUST_LOG").unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_str(&env_filter).unwrap_or_default()),
        )
        .init();
}

#[derive(clap::Parser)]
#[clap(name = "words", about = "Interpret or compile Words programs.")]
struct Words {
    #[clap(subcommand)]
    subcmd: WordsSubcommand,
}

#[derive(clap::Subcommand)]
enum WordsSubcommand {
    /// Interpret a program and print the value left on top of the stack
    Run(Run),
    /// Compile a program to Cortex-M0 assembly
    Build(Build),
}

#[derive(clap::Parser, Debug)]
struct Run {
    source: String,

    /// Initial stack, bottom first (integers, True or False)
    #[clap(long, num_args = 1.., allow_hyphen_values = true)]
    stack: Vec<StackValue>,

    #[clap(long, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

#[derive(clap::Parser, Debug)]
struct Build {
    source: String,

    #[clap(long, default_value = "arduino_due")]
    target: Target,

    /// Assembly output path (defaults to target/words/program.s)
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Number labels sequentially instead of with unique ids
    #[clap(long)]
    deterministic_labels: bool,
}
