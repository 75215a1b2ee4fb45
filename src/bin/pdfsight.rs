//! CLI binary for pdfsight.
//!
//! A thin shim over the library crate that maps CLI flags and the settings
//! file to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfsight::{
    convert, convert_to_file, Backends, ConversionConfig, ConversionProgressCallback,
    PdfConverter, ProgressCallback, Settings,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while text and images are read,
/// then a bar over the images being captioned.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Reading");
        bar.set_message("Extracting text…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Captioning");
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_text_extracted(&self, chars: usize) {
        self.bar.set_message(format!("{chars} chars of text; looking for images…"));
    }

    fn on_detection_complete(&self, found: bool) {
        if !found {
            self.bar.println(format!("{} {}", dim("·"), dim("No significant images")));
        }
    }

    fn on_extraction_complete(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Captioning {total} image(s)…"))
        ));
    }

    fn on_image_start(&self, _position: usize, _total: usize, page: usize, index: usize) {
        self.bar.set_message(format!("page {page}, image {index}"));
    }

    fn on_image_captioned(&self, position: usize, total: usize, caption_len: usize) {
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            green("✓"),
            position,
            total,
            dim(&format!("{caption_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, position: usize, total: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            red("✗"),
            position,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, captioned: usize, failed: usize) {
        self.bar.finish_and_clear();

        if captioned + failed == 0 {
            return;
        }
        if failed == 0 {
            eprintln!(
                "{} {} image(s) captioned",
                green("✔"),
                bold(&captioned.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) captioned  ({} failed)",
                if captioned == 0 { red("✘") } else { cyan("⚠") },
                bold(&captioned.to_string()),
                captioned + failed,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Text layer only (stdout)
  pdfsight report.pdf

  # Caption the pictures too
  pdfsight --describe-images --provider openai --model gpt-4o report.pdf -o report.md

  # Custom prompt
  pdfsight --describe-images --prompt "Describe the chart and its axes." slides.pdf

  # Does this PDF contain pictures? (no API key needed)
  pdfsight --detect-only scan.pdf

  # Force the pure-Rust backend
  pdfsight --describe-images --backend lopdf report.pdf

  # Which image backends can run here?
  pdfsight --backends

  # Remember Azure OpenAI settings and smart processing
  AZURE_OPENAI_ENDPOINT=... pdfsight --save-settings

IMAGE BACKENDS:
  pdfium   native pdfium library, found via PDFIUM_LIB_PATH, ./ or the
           system library path
  lopdf    pure Rust, always available; decodes JPEG and raw samples

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY            OpenAI API key
  AZURE_OPENAI_ENDPOINT     Azure OpenAI endpoint (also read from settings)
  AZURE_OPENAI_API_KEY      Azure OpenAI key (also read from settings)
  AZURE_OPENAI_DEPLOYMENT   Azure deployment name (also read from settings)
  PDFIUM_LIB_PATH           Path to libpdfium (file or directory)
  RUST_LOG                  Log filter, overrides -v / -q
"#;

/// Convert PDF files and URLs to Markdown, describing the pictures inside.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsight",
    version,
    about = "Convert PDF files and URLs to Markdown, with captions for embedded images",
    long_about = "Convert PDF documents (local files or URLs) to Markdown. The text layer is \
extracted directly; with --describe-images every significant embedded picture is captioned \
by a vision LLM and the captions are appended under \"## Images in PDF\".",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present_any = ["backends", "save_settings"])]
    input: Option<String>,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "PDFSIGHT_OUTPUT")]
    output: Option<PathBuf>,

    /// Caption embedded images with a vision LLM.
    #[arg(long, env = "PDFSIGHT_DESCRIBE_IMAGES")]
    describe_images: bool,

    /// LLM provider: openai, azure, anthropic, gemini, ollama.
    #[arg(
        long,
        env = "PDFSIGHT_PROVIDER",
        long_help = "LLM provider for captions. Default: azure when the settings file holds a \
          complete Azure OpenAI connection, otherwise openai."
    )]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4o).
    #[arg(long, env = "PDFSIGHT_MODEL")]
    model: Option<String>,

    /// Prompt sent with each image, replacing the default.
    #[arg(long, env = "PDFSIGHT_PROMPT", conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the prompt from a text file.
    #[arg(long, env = "PDFSIGHT_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Image backend: auto, pdfium, lopdf, none.
    #[arg(long, env = "PDFSIGHT_BACKEND", value_enum, default_value = "auto")]
    backend: BackendArg,

    /// Skip the presence check and always extract images.
    #[arg(long, env = "PDFSIGHT_NO_SMART_DETECTION")]
    no_smart_detection: bool,

    /// Only report whether the PDF contains a significant image.
    #[arg(long)]
    detect_only: bool,

    /// List image backends and whether they can run, then exit.
    #[arg(long)]
    backends: bool,

    /// Settings file. Default: <config dir>/pdfsight/settings.json.
    #[arg(long, env = "PDFSIGHT_SETTINGS")]
    settings: Option<PathBuf>,

    /// Write the effective settings (Azure env vars, model, prompt,
    /// smart detection) to the settings file.
    #[arg(long)]
    save_settings: bool,

    /// Max LLM output tokens per caption.
    #[arg(long, env = "PDFSIGHT_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFSIGHT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per image on LLM failure.
    #[arg(long, env = "PDFSIGHT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFSIGHT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output structured JSON (ConversionResult) instead of Markdown.
    #[arg(long, env = "PDFSIGHT_JSON")]
    json: bool,

    /// Disable progress output.
    #[arg(long, env = "PDFSIGHT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSIGHT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSIGHT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackendArg {
    Auto,
    Pdfium,
    Lopdf,
    None,
}

impl BackendArg {
    fn backends(self) -> Option<Backends> {
        match self {
            BackendArg::Auto => None,
            BackendArg::Pdfium => Some(Backends::global().only("pdfium")),
            BackendArg::Lopdf => Some(Backends::global().only("lopdf")),
            BackendArg::None => Some(Backends::none()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v brings them back.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && !cli.detect_only
        && !cli.backends
        && cli.describe_images;
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

    // ── Backends listing ─────────────────────────────────────────────────
    if cli.backends {
        let backends = Backends::global();
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(backends.statuses())
                    .context("Failed to serialise backend list")?
            );
        } else {
            for status in backends.statuses() {
                let mark = if status.available { green("✓") } else { red("✗") };
                println!("{} {:<8} {}", mark, status.name, dim(&status.detail));
            }
        }
        return Ok(());
    }

    // ── Settings ─────────────────────────────────────────────────────────
    let settings_path = cli
        .settings
        .clone()
        .or_else(Settings::default_path)
        .context("No settings path: pass --settings, the platform has no config directory")?;
    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    let prompt = read_prompt(&cli).await?;

    if cli.save_settings {
        update_settings(&mut settings, &cli, prompt.as_deref());
        settings
            .save(&settings_path)
            .with_context(|| format!("Failed to save settings to {}", settings_path.display()))?;
        if !cli.quiet {
            eprintln!("{} Settings saved to {}", green("✔"), bold(&settings_path.display().to_string()));
        }
        if cli.input.is_none() {
            return Ok(());
        }
    }
    settings.apply_to_env();

    let Some(ref input) = cli.input else {
        anyhow::bail!("An input PDF path or URL is required");
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, &settings, prompt, progress_cb)?;

    // ── Detect-only mode ─────────────────────────────────────────────────
    if cli.detect_only {
        let found = PdfConverter::new(config)
            .detect_images(input)
            .await
            .context("Failed to check PDF for images")?;
        if cli.json {
            println!("{}", serde_json::json!({ "input": input, "images": found }));
        } else {
            println!("{}", if found { "images: yes" } else { "images: no" });
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = convert_to_file(input, output_path, &config)
            .await
            .context("Conversion failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {} chars  {} image(s) captioned  {}ms  →  {}",
                if stats.images_failed == 0 { green("✔") } else { cyan("⚠") },
                stats.text_chars,
                stats.images_captioned,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let output = convert(input, &config)
            .await
            .context("Conversion failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.markdown.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !show_progress && !cli.json {
            eprintln!(
                "Converted in {}ms: {} chars, {} image(s) captioned, {} failed",
                output.stats.total_duration_ms,
                output.stats.text_chars,
                output.stats.images_captioned,
                output.stats.images_failed,
            );
        }
    }

    Ok(())
}

async fn read_prompt(cli: &Cli) -> Result<Option<String>> {
    if let Some(ref path) = cli.prompt_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        return Ok(Some(text));
    }
    Ok(cli.prompt.clone())
}

/// Fold CLI flags and Azure environment variables into `settings`.
fn update_settings(settings: &mut Settings, cli: &Cli, prompt: Option<&str>) {
    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    if let Some(v) = env("AZURE_OPENAI_ENDPOINT") {
        settings.azure_openai_endpoint = v;
    }
    if let Some(v) = env("AZURE_OPENAI_API_KEY") {
        settings.azure_openai_api_key = v;
    }
    if let Some(v) = env("AZURE_OPENAI_DEPLOYMENT") {
        settings.azure_openai_deployment = v;
    }
    if let Some(v) = env("AZURE_OPENAI_API_VERSION") {
        settings.azure_openai_api_version = v;
    }
    if let Some(ref model) = cli.model {
        settings.llm_model = model.clone();
    }
    if let Some(prompt) = prompt {
        settings.use_custom_prompt = true;
        settings.custom_prompt = prompt.to_string();
    }
    settings.smart_pdf_processing = !cli.no_smart_detection;
}

/// Map settings, then CLI args, to `ConversionConfig`.
fn build_config(
    cli: &Cli,
    settings: &Settings,
    prompt: Option<String>,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = settings
        .apply_to(ConversionConfig::builder())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout);

    if cli.no_smart_detection {
        builder = builder.smart_detection(false);
    }
    if let Some(prompt) = prompt {
        builder = builder.prompt(prompt);
    }
    if let Some(backends) = cli.backend.backends() {
        builder = builder.backends(backends);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Captions only on request; the settings file alone never triggers LLM calls.
    if cli.describe_images {
        if let Some(ref provider) = cli.provider {
            config.provider_name = Some(provider.clone());
        } else if config.provider_name.is_none() {
            config.provider_name = Some("openai".to_string());
        }
        if let Some(ref model) = cli.model {
            config.model = Some(model.clone());
        }
    } else {
        config.provider_name = None;
    }

    Ok(config)
}
