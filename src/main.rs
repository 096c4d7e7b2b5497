//! flowc CLI - compile workflow scripts to YAML/JSON documents

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use walkdir::WalkDir;

use flowc::error::{FixSuggestion, FlowcError, Result};
use flowc::findings::Finding;
use flowc::lex::{normalize, tokenize};
use flowc::util::constants::SOURCE_EXTENSION;
use flowc::{Compilation, Compiler, EmitOptions, FlowcConfig, OutputFormat};

#[derive(Parser)]
#[command(name = "flowc")]
#[command(about = "Compiler for indentation-sensitive task workflow scripts")]
#[command(version)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a workflow file and write the document
    Compile {
        /// Path to a .flow file
        file: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,

        /// Report unreachable tasks as warnings instead of errors
        #[arg(long)]
        no_strict: bool,

        /// Rewrite prose-only tasks through the augmentation service
        #[arg(long)]
        augment: bool,

        /// Record the compile time in the document
        #[arg(long)]
        timestamp: bool,
    },

    /// Validate and optimize a workflow file without writing output
    Check {
        /// Path to a .flow file
        file: PathBuf,

        #[arg(long)]
        no_strict: bool,
    },

    /// Compile every .flow file under a directory
    Build {
        dir: PathBuf,

        /// Output directory (next to each source when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Dump the token stream of a file
    Tokens {
        file: PathBuf,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API key masked)
    Show,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Compile {
            file,
            output,
            format,
            compact,
            no_strict,
            augment,
            timestamp,
        } => {
            let flags = Overrides {
                format,
                compact,
                no_strict,
                augment,
                timestamp,
            };
            compile_file(&file, output.as_deref(), flags).await
        }
        Commands::Check { file, no_strict } => {
            let flags = Overrides {
                no_strict,
                ..Overrides::default()
            };
            check_file(&file, flags).await
        }
        Commands::Build {
            dir,
            output,
            format,
        } => {
            let flags = Overrides {
                format,
                ..Overrides::default()
            };
            build_dir(&dir, output.as_deref(), flags).await
        }
        Commands::Tokens { file } => dump_tokens(&file),
        Commands::Config { action } => show_config(action),
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }
}

/// CLI flags layered over file and environment config
#[derive(Default)]
struct Overrides {
    format: Option<OutputFormat>,
    compact: bool,
    no_strict: bool,
    augment: bool,
    timestamp: bool,
}

fn load_config(flags: &Overrides) -> Result<FlowcConfig> {
    let mut config = FlowcConfig::load()?.with_env();
    if let Some(format) = flags.format {
        config.output.format = format;
    }
    config.output.compact |= flags.compact;
    config.output.timestamp |= flags.timestamp;
    config.augment.enabled |= flags.augment;
    if flags.no_strict {
        config.compile.strict = false;
    }
    config.validate()?;
    Ok(config)
}

/// Ctrl-C cancels outstanding augmentation; compilation finishes from source
fn interruptible(compiler: Compiler) -> Compiler {
    let token = compiler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, skipping remaining augmentation");
            token.cancel();
        }
    });
    compiler
}

fn emit_options(config: &FlowcConfig) -> EmitOptions {
    EmitOptions {
        format: config.output.format,
        compact: config.output.compact,
        timestamp: config.output.timestamp,
    }
}

async fn compile_file(file: &Path, output: Option<&Path>, flags: Overrides) -> Result<()> {
    let config = load_config(&flags)?;
    let options = emit_options(&config);
    let compiler = interruptible(Compiler::from_config(config)?);

    let compilation = compiler.compile_file(file).await?;
    print_warnings(&compilation.warnings);
    let rendered = compilation.render(&options)?;

    match output {
        Some(path) => {
            write_output(path, &rendered)?;
            eprintln!(
                "{} Compiled {} → {}",
                "✓".green(),
                file.display(),
                path.display().to_string().cyan()
            );
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

async fn check_file(file: &Path, flags: Overrides) -> Result<()> {
    let config = load_config(&flags)?;
    let compilation = Compiler::new(config).compile_file(file).await?;
    print_warnings(&compilation.warnings);

    println!("{} '{}' is valid", "✓".green(), file.display());
    print_summary(&compilation);
    Ok(())
}

async fn build_dir(dir: &Path, output: Option<&Path>, flags: Overrides) -> Result<()> {
    let config = load_config(&flags)?;
    let options = emit_options(&config);
    let sources = discover_sources(dir);
    if sources.is_empty() {
        println!("{} No .{} files under {}", "→".cyan(), SOURCE_EXTENSION, dir.display());
        return Ok(());
    }

    let compiler = Arc::new(interruptible(Compiler::from_config(config)?));
    let results = compiler.compile_many(sources).await;

    let mut failed = 0;
    for (source, result) in &results {
        let written = match result {
            Ok(compilation) => write_document(dir, source, output, compilation, &options),
            Err(e) => Err(e.to_string()),
        };
        match written {
            Ok(target) => println!(
                "  {} {} → {}",
                "✓".green(),
                source.display(),
                target.display()
            ),
            Err(reason) => {
                failed += 1;
                println!("  {} {}: {}", "✗".red(), source.display(), reason);
            }
        }
    }

    println!(
        "{} {} compiled, {} failed",
        "→".cyan(),
        results.len() - failed,
        failed
    );
    if failed > 0 {
        return Err(FlowcError::Io {
            path: dir.display().to_string(),
            reason: format!("{} of {} files failed to compile", failed, results.len()),
        });
    }
    Ok(())
}

fn write_document(
    root: &Path,
    source: &Path,
    out_dir: Option<&Path>,
    compilation: &Compilation,
    options: &EmitOptions,
) -> std::result::Result<PathBuf, String> {
    let target = output_path(root, source, out_dir, options.format);
    compilation
        .render(options)
        .and_then(|text| write_output(&target, &text))
        .map(|()| target)
        .map_err(|e| e.to_string())
}

fn dump_tokens(file: &Path) -> Result<()> {
    let source = std::fs::read_to_string(file).map_err(|e| FlowcError::Io {
        path: file.display().to_string(),
        reason: e.to_string(),
    })?;
    let tokens = tokenize(&normalize(&source))?;
    for token in &tokens {
        println!("{}", token);
    }
    Ok(())
}

fn show_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => println!("{}", FlowcConfig::config_path().display()),
        ConfigAction::Show => {
            let config = FlowcConfig::load()?.with_env();
            println!("{} {}", "#".dimmed(), FlowcConfig::config_path().display());
            print!("{}", config);
        }
    }
    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

/// Every `*.flow` file under `dir`, sorted for stable output
fn discover_sources(dir: &Path) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION))
        .collect();
    sources.sort();
    sources
}

/// `out_dir/<relative source>.{yaml,json}`, or next to the source
fn output_path(root: &Path, source: &Path, out_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let renamed = source.with_extension(format.extension());
    match out_dir {
        Some(out) => out.join(renamed.strip_prefix(root).unwrap_or(&renamed)),
        None => renamed,
    }
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    let io_error = |e: std::io::Error| FlowcError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, content).map_err(io_error)
}

fn print_warnings(warnings: &[Finding]) {
    for warning in warnings {
        eprintln!("{}", warning.to_string().yellow());
    }
}

fn print_summary(compilation: &Compilation) {
    let program = &compilation.program;
    println!("  Entry: {}", program.entry_point().unwrap_or("(none)"));
    println!("  Tasks: {}", program.tasks.len());
    println!("  Variables: {}", program.variables.len());
    println!("  Tools/agents: {}", program.declarations.len());
    println!("  Warnings: {}", compilation.warnings.len());
}

fn report_error(e: &FlowcError) {
    eprintln!("{} {}", "Error:".red().bold(), e);
    if let FlowcError::Validation { report } = e {
        for finding in &report.errors {
            eprintln!("  {} {}", "•".red(), finding);
        }
    }
    if let Some(suggestion) = e.fix_suggestion() {
        eprintln!("  {} {}", "Fix:".yellow(), suggestion);
    }
}
