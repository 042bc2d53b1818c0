//! CLI binary for edgequake-invoice.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ExtractionConfig` / `ServiceBackend`, runs one extraction
//! and prints the invoice.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_invoice::{
    build_service, extract_invoice, render_report, AzureConfig, ExtractionConfig, InvoiceError,
    ServiceBackend, StructuredOutputMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Azure OpenAI (endpoint and key from the environment)
  invoice-extract 0001.pdf

  # Another deployment, JSON schema response format
  invoice-extract --deployment gpt-4o-mini --api-version 2024-08-01-preview \
      --output-mode json-schema 0001.pdf

  # Any edgequake-llm provider instead of Azure
  invoice-extract --backend provider --provider openai --model gpt-4.1 0001.pdf

  # Machine-readable output with timing stats
  invoice-extract --json 0001.pdf > invoice.json

EXIT CODES:
  0  invoice extracted and printed
  1  the PDF could not be read or page 1 could not be rendered
  2  the service failed, returned an unusable reply, or configuration is invalid
  64 invalid command-line usage (unknown flag, bad value, missing input)

ENVIRONMENT VARIABLES:
  AZURE_OPENAI_ENDPOINT   Azure OpenAI resource endpoint
  AZURE_OPENAI_API_KEY    Azure OpenAI API key
  OPENAI_API_KEY          OpenAI API key (provider backend)
  ANTHROPIC_API_KEY       Anthropic API key (provider backend)
  GEMINI_API_KEY          Google Gemini API key (provider backend)
  PDFIUM_LIB_PATH         Path to libpdfium or the directory holding it
"#;

/// Extract structured invoice data from a scanned PDF using a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-extract",
    version,
    about = "Extract structured invoice data from a scanned PDF using a Vision LLM",
    long_about = "Renders page 1 of a PDF invoice, sends it to a vision-capable model together \
with a fixed invoice schema, and prints the extracted care provider, services and totals. \
Fields the model cannot see are printed as null.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the PDF invoice.
    input: PathBuf,

    /// Completion service: azure or provider.
    #[arg(long, env = "INVOICE_BACKEND", value_enum, default_value = "azure")]
    backend: BackendArg,

    /// Azure OpenAI resource endpoint.
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    azure_endpoint: Option<String>,

    /// Azure OpenAI API key.
    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    azure_api_key: Option<String>,

    /// Azure deployment name.
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT", default_value = "gpt-4o")]
    deployment: String,

    /// Azure REST API version.
    #[arg(long, env = "AZURE_OPENAI_API_VERSION", default_value = "2023-12-01-preview")]
    api_version: String,

    /// How the schema is sent to Azure: function-calling or json-schema.
    #[arg(long, env = "INVOICE_OUTPUT_MODE", value_enum, default_value = "function-calling")]
    output_mode: OutputModeArg,

    /// Skip TLS certificate verification for the Azure endpoint.
    #[arg(long, env = "INVOICE_INSECURE")]
    insecure: bool,

    /// edgequake-llm provider (openai, anthropic, gemini, ollama, ...).
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// edgequake-llm model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "INVOICE_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "INVOICE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to libpdfium or the directory holding it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "INVOICE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max output tokens for the extraction call.
    #[arg(long, env = "INVOICE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Service call timeout in seconds.
    #[arg(long, env = "INVOICE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output structured JSON (invoice + stats) instead of the report.
    #[arg(long, env = "INVOICE_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "INVOICE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the invoice.
    #[arg(short, long, env = "INVOICE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum BackendArg {
    Azure,
    Provider,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputModeArg {
    FunctionCalling,
    JsonSchema,
}

impl From<OutputModeArg> for StructuredOutputMode {
    fn from(v: OutputModeArg) -> Self {
        match v {
            OutputModeArg::FunctionCalling => StructuredOutputMode::FunctionCalling,
            OutputModeArg::JsonSchema => StructuredOutputMode::JsonSchema,
        }
    }
}

/// Exit code for command-line usage errors (sysexits `EX_USAGE`), kept apart
/// from the `1`/`2` extraction failures.
const USAGE_EXIT_CODE: u8 = 64;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too and are not failures.
            return if e.use_stderr() {
                ExitCode::from(USAGE_EXIT_CODE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(e) = invoice_error(&err) {
                eprintln!("{} {}", red("✘"), bold(&e.kind().to_string()));
            }
            eprintln!("{} {err:#}", red("error:"));
            ExitCode::from(exit_code(&err))
        }
    }
}

fn invoice_error(err: &anyhow::Error) -> Option<&InvoiceError> {
    err.chain().find_map(|e| e.downcast_ref::<InvoiceError>())
}

/// `1` for document and render failures, `2` for service, schema and
/// configuration failures. Errors that never reached the library count as
/// configuration failures.
fn exit_code(err: &anyhow::Error) -> u8 {
    invoice_error(err).map_or(2, InvoiceError::exit_code)
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(cli).await?;
    let backend = build_backend(cli)?;
    let service = build_service(&backend)?;

    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.set_message(format!("{} via {}", cli.input.display(), service.name()));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    // ── Run extraction ───────────────────────────────────────────────────
    let result = extract_invoice(&cli.input, &config, service.as_ref()).await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    let output = result?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    } else {
        handle
            .write_all(render_report(&output.invoice).as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{}  {} services  {}x{} px  {}",
            green("✔"),
            bold(&output.invoice.service_count().to_string()),
            output.stats.image_width,
            output.stats.image_height,
            dim(&format!(
                "render {}ms  /  {} {}ms",
                output.stats.render_duration_ms, output.stats.service, output.stats.service_duration_ms
            )),
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .max_tokens(cli.max_tokens);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path).await.map_err(|e| {
            InvoiceError::InvalidConfig(format!(
                "Failed to read system prompt from {}: {e}",
                path.display()
            ))
        })?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }

    Ok(builder.build()?)
}

/// Map CLI args to the service backend.
fn build_backend(cli: &Cli) -> Result<ServiceBackend> {
    match cli.backend {
        BackendArg::Azure => {
            let endpoint = cli.azure_endpoint.clone().ok_or_else(|| {
                InvoiceError::InvalidConfig(
                    "Azure endpoint not set; pass --azure-endpoint or set AZURE_OPENAI_ENDPOINT"
                        .into(),
                )
            })?;
            let key = cli.azure_api_key.clone().ok_or_else(|| {
                InvoiceError::InvalidConfig(
                    "Azure API key not set; pass --azure-api-key or set AZURE_OPENAI_API_KEY"
                        .into(),
                )
            })?;
            Ok(ServiceBackend::Azure(
                AzureConfig::new(endpoint, key)
                    .with_deployment(cli.deployment.clone())
                    .with_api_version(cli.api_version.clone())
                    .with_output_mode(cli.output_mode.clone().into())
                    .with_accept_invalid_certs(cli.insecure)
                    .with_timeout_secs(cli.api_timeout),
            ))
        }
        BackendArg::Provider => Ok(ServiceBackend::Provider {
            provider_name: cli.provider.clone(),
            model: cli.model.clone(),
        }),
    }
}
