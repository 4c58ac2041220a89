//! CLI binary for docextract.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `extract` processes one local file or URL and prints the result.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use docextract::pipeline::input;
use docextract::server::{self, ServerConfig};
use docextract::{
    DocumentExtractor, DocumentResult, ExtractionConfig, ExtractionRequest, ProcessingMode,
    RasterProfile,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start the HTTP service on port 3080
  docextract serve

  # Extract a scanned PDF with local OCR, pages 2 to 5
  docextract extract --mode ocr --page-range 2-5 contract.pdf

  # Selected pages through OpenAI, concurrently, as JSON
  docextract extract --mode openai --selected-pages 1,3,7 --parallel --json scan.pdf

  # Send a document to a running service
  curl -F document=@scan.pdf 'http://localhost:3080/api/process?mode=ocr&parallel=true'

PROCESSING MODES:
  ollama   local vision model (llama3.2-vision, llava)       OLLAMA_HOST
  ocr      local Tesseract engine (no model)                 TESSERACT_PATH
  openai   remote vision model (gpt-4o-mini, gpt-4o)         OPENAI_API_KEY

  Born-digital PDFs (a native text layer of more than 50 characters on any
  selected page) are answered from the text layer without any of the above.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise next to the binary or system)
  OPENAI_API_KEY          Enables the openai mode
  OLLAMA_HOST             Ollama server URL
  RUST_LOG                Overrides the log filter
"#;

/// Extract text from PDFs and images with OCR or vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "docextract",
    version,
    about = "Extract per-page text from PDFs and images",
    long_about = "Extract text from PDFs and images. Born-digital PDFs are read from their \
native text layer; scanned PDFs and images go through local Tesseract OCR, a local Ollama \
vision model, or an OpenAI vision model.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCEXTRACT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Extract one local file or URL.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 3080)]
    port: u16,

    /// Directory for uploaded files while they are processed.
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = 500)]
    max_file_size_mb: usize,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// Processing mode: ollama, ocr, openai. Default: DEFAULT_MODE.
    #[arg(long)]
    mode: Option<String>,

    /// Model for the selected mode.
    #[arg(long)]
    model: Option<String>,

    /// Page range, e.g. 2-5.
    #[arg(long)]
    page_range: Option<String>,

    /// Explicit pages, e.g. 1,3,7. Overrides --page-range.
    #[arg(long)]
    selected_pages: Option<String>,

    /// Process pages concurrently.
    #[arg(long)]
    parallel: bool,

    /// Print the full JSON result instead of plain text.
    #[arg(long)]
    json: bool,

    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    #[command(flatten)]
    engine: EngineArgs,
}

/// Settings shared by both commands, mapped onto [`ExtractionConfig`].
#[derive(Args, Debug)]
struct EngineArgs {
    /// Mode used when a request does not name one.
    #[arg(long, env = "DEFAULT_MODE", default_value = "ollama")]
    default_mode: String,

    /// Process pages concurrently when a request does not say.
    #[arg(long, env = "DEFAULT_PARALLEL")]
    default_parallel: bool,

    #[arg(long, env = "OLLAMA_MODEL", default_value = "llama3.2-vision")]
    ollama_model: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    openai_model: String,

    /// Max vision-model output tokens per page.
    #[arg(long, env = "OPENAI_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Vision-model temperature (0.0–2.0).
    #[arg(long, env = "VISION_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per page on vision-model failure.
    #[arg(long, env = "VISION_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Tesseract language(s), e.g. spa or eng+spa.
    #[arg(long, env = "OCR_LANGUAGE", default_value = "spa")]
    ocr_language: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "OCR_PSM_MODE", default_value_t = 6)]
    ocr_psm: u8,

    #[arg(long, env = "TESSERACT_PATH", default_value = "tesseract")]
    tesseract: PathBuf,

    /// OCR rasterisation density (72–600).
    #[arg(long, env = "PDF_DENSITY", default_value_t = 300)]
    density: u32,

    /// OCR image width cap in pixels.
    #[arg(long, env = "PDF_IMAGE_WIDTH", default_value_t = 2048)]
    image_width: u32,

    /// OCR image height cap in pixels.
    #[arg(long, env = "PDF_IMAGE_HEIGHT", default_value_t = 2048)]
    image_height: u32,

    /// JPEG quality of images sent to vision models.
    #[arg(long, env = "PDF_IMAGE_QUALITY", default_value_t = 80)]
    image_quality: u8,

    /// Native-text characters a page needs to count as born-digital.
    #[arg(long, env = "SCAN_TEXT_THRESHOLD", default_value_t = 50)]
    scan_text_threshold: usize,

    /// Max pages in flight in concurrent mode (0 = unbounded).
    #[arg(long, env = "CONCURRENCY", default_value_t = 0)]
    concurrency: usize,

    /// Per-page extraction timeout in seconds (0 = none).
    #[arg(long, env = "PAGE_TIMEOUT_SECS", default_value_t = 300)]
    page_timeout: u64,

    /// Scratch directory for rasterised pages.
    #[arg(long, env = "WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

impl EngineArgs {
    fn to_config(&self) -> Result<ExtractionConfig> {
        let default_mode: ProcessingMode = self
            .default_mode
            .parse()
            .context("Invalid DEFAULT_MODE")?;

        let mut builder = ExtractionConfig::builder()
            .default_mode(default_mode)
            .default_parallel(self.default_parallel)
            .ollama_model(&self.ollama_model)
            .openai_model(&self.openai_model)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .max_retries(self.max_retries)
            .ocr_language(&self.ocr_language)
            .ocr_psm(self.ocr_psm)
            .tesseract_binary(&self.tesseract)
            .ocr_profile(RasterProfile {
                dpi: self.density,
                max_width: self.image_width,
                max_height: self.image_height,
            })
            .image_quality(self.image_quality)
            .scan_text_threshold(self.scan_text_threshold)
            .concurrency(self.concurrency)
            .page_timeout_secs(self.page_timeout);

        if let Some(ref dir) = self.work_dir {
            builder = builder.work_dir(dir);
        }
        if let Some(ref lib) = self.pdfium_lib {
            builder = builder.pdfium_lib_path(lib);
        }

        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
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

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Extract(args) => run_extract(args, cli.quiet).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = args.engine.to_config()?;
    let extractor = Arc::new(DocumentExtractor::from_config(config));

    let server_config = ServerConfig {
        host: args.host,
        port: args.port,
        upload_dir: args.upload_dir,
        max_file_size: args.max_file_size_mb.saturating_mul(1024 * 1024),
    };

    server::serve(server_config, extractor)
        .await
        .context("HTTP service failed")
}

async fn run_extract(args: ExtractArgs, quiet: bool) -> Result<()> {
    let config = args.engine.to_config()?;

    let mode = match args.mode.as_deref() {
        Some(m) => Some(m.parse::<ProcessingMode>().context("Invalid --mode")?),
        None => None,
    };
    let request = ExtractionRequest {
        parallel: Some(args.parallel || config.default_parallel),
        mode,
        model: args.model.clone(),
        page_range: args.page_range.clone(),
        selected_pages: args.selected_pages.clone(),
    };

    let resolved = input::resolve_input(&args.input, args.download_timeout)
        .await
        .with_context(|| format!("Failed to open {}", args.input))?;

    let extractor = DocumentExtractor::from_config(config);
    let outcome = extractor
        .extract_kind(resolved.path(), resolved.kind(), &request)
        .await;
    extractor.shutdown().await;
    let result = outcome.context("Extraction failed")?;

    if !result.success {
        bail!(
            "{}",
            result
                .error
                .unwrap_or_else(|| "document could not be processed".to_string())
        );
    }

    let rendered = if args.json {
        serde_json::to_string_pretty(&result).context("Failed to serialize result")?
    } else {
        result.joined_text("\n\n")
    };

    match args.output {
        Some(ref path) => write_atomic(path, &rendered).await?,
        None => println!("{}", rendered),
    }

    if !quiet {
        report_summary(&result);
    }
    Ok(())
}

/// Temp file + rename so readers never see a partial result.
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn report_summary(result: &DocumentResult) {
    match (&result.pages, result.is_scanned) {
        (Some(pages), Some(scanned)) => {
            let failed = result.failed_pages();
            eprintln!(
                "{} page(s) of {} extracted ({}), {} failed",
                pages.len() - failed,
                result.total_pages.unwrap_or(0),
                if scanned { "scanned" } else { "native text" },
                failed
            );
            for page in pages.iter().filter(|p| !p.is_ok()) {
                if let Some(ref e) = page.error {
                    eprintln!("  page {}: {}", page.page, e);
                }
            }
        }
        _ => eprintln!("Image extracted"),
    }
}
