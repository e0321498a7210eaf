//! CLI binary for pdfchat.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` / `ChatConfig`, renders progress, and runs the chat REPL.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfchat::backend::resolve_backend;
use pdfchat::config::DEFAULT_CHAT_MODEL;
use pdfchat::models::DEFAULT_API_BASE;
use pdfchat::pipeline::input::{resolve_source, SourceDocument};
use pdfchat::{
    list_models, run, ChatConfig, ConversationSession, PipelineConfig, PipelineOutput,
    PipelineProgressCallback, ProgressCallback, RunState,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Spinner while extracting, then a bar over the resolvable images.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Describing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, number: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&number))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage(&self, state: RunState) {
        match state {
            RunState::Extracting => {
                self.bar.set_prefix("Extracting");
                self.bar.set_message("text and images…");
            }
            RunState::Reconstructing => {
                self.bar.set_prefix("Writing");
                self.bar.set_message("enriched document…");
            }
            RunState::Done | RunState::Failed => self.bar.finish_and_clear(),
            RunState::Idle | RunState::DescribingImages => {}
        }
    }

    fn on_scan_complete(&self, placeholders: usize, resolvable: usize) {
        self.activate_bar(resolvable);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "{placeholders} image placeholder(s), {resolvable} to describe…"
            ))
        ));
    }

    fn on_image_start(&self, number: usize, filename: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(number, Instant::now());
        }
        self.bar.set_message(filename.to_string());
    }

    fn on_image_complete(&self, number: usize, filename: &str, description_len: usize) {
        let secs = self.elapsed_secs(number);
        self.bar.println(format!(
            "  {} Image {:>3}  {:<32}  {}  {}",
            green("✓"),
            number,
            filename,
            dim(&format!("{description_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, number: usize, filename: &str, error: &str) {
        let secs = self.elapsed_secs(number);
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Image {:>3}  {:<32}  {}  {}",
            red("✗"),
            number,
            filename,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_missing(&self, filename: &str) {
        self.bar
            .println(format!("  {} {} not found, left as-is", yellow("?"), filename));
    }

    fn on_run_complete(&self, image_count: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} image(s) described",
                green("✔"),
                bold(&image_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) described  ({} failed)",
                if failed == image_count {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&(image_count - failed).to_string()),
                image_count,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Describe every figure and write the enriched Markdown
  pdfchat convert report.pdf

  # Tell the describer what the document is about
  pdfchat convert report.pdf -i "Quarterly sales report; name every axis."

  # Text only, no model calls
  pdfchat convert report.pdf --no-images

  # Process then chat about the result
  pdfchat chat report.pdf

  # Chat about an existing Markdown file
  pdfchat chat pdf_output/report/report_with_descriptions.md

  # Which models can I use?
  pdfchat models

OUTPUT LAYOUT:
  <output-dir>/<name>/<name>.md                     plain extraction
  <output-dir>/<name>/<name>_with_descriptions.md   enriched document
  <output-dir>/<name>/image_description_<n>.txt     context + description per image

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  OPENAI_BASE_URL         OpenAI-compatible endpoint for `models`
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override description model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

/// Describe PDF figures in context and chat with the result.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchat",
    version,
    about = "Describe PDF figures in context with a vision LLM, then chat with the document",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFCHAT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFCHAT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the description pipeline on a PDF.
    Convert {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Print the PipelineOutput as JSON.
        #[arg(long, env = "PDFCHAT_JSON")]
        json: bool,
    },

    /// Process a PDF (or load a Markdown file) and chat about it.
    Chat {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Chat over the plain extraction instead of the enriched document.
        #[arg(long)]
        plain: bool,

        /// Chat model ID.
        #[arg(long, env = "PDFCHAT_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
        chat_model: String,

        /// Chat temperature (0.0–2.0).
        #[arg(long, env = "PDFCHAT_CHAT_TEMPERATURE", default_value_t = 0.7)]
        chat_temperature: f32,

        /// Max tokens per chat answer.
        #[arg(long, env = "PDFCHAT_CHAT_MAX_TOKENS", default_value_t = 300)]
        chat_max_tokens: usize,
    },

    /// List the models an OpenAI-compatible endpoint offers.
    Models {
        /// API base URL.
        #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_API_BASE)]
        base_url: String,

        /// API key.
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// PDF file (or, for `chat`, a Markdown file).
    input: PathBuf,

    /// Folder under which `<name>/` is created.
    #[arg(short, long, env = "PDFCHAT_OUTPUT_DIR", default_value = "pdf_output")]
    output_dir: PathBuf,

    /// Extra instructions for every image description.
    #[arg(short, long, env = "PDFCHAT_INSTRUCTIONS", default_value = "")]
    instructions: String,

    /// Lines of context on each side of an image (10–500).
    #[arg(long, env = "PDFCHAT_CONTEXT_SIZE", default_value_t = 100,
          value_parser = clap::value_parser!(u64).range(10..=500))]
    context_size: u64,

    /// Skip image description; only extract text.
    #[arg(long, env = "PDFCHAT_NO_IMAGES")]
    no_images: bool,

    /// Vision model ID for descriptions (e.g. gpt-4o-mini, gpt-4o).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Descriptions in flight at once. Output order is unaffected.
    #[arg(short, long, env = "PDFCHAT_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Max tokens per description.
    #[arg(long, env = "PDFCHAT_MAX_TOKENS", default_value_t = 500)]
    max_tokens: usize,

    /// Retries per image on a transient model failure.
    #[arg(long, env = "PDFCHAT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "PDFCHAT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file replacing the built-in description prompt.
    #[arg(long, env = "PDFCHAT_DESCRIPTION_PROMPT")]
    description_prompt: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFCHAT_PASSWORD")]
    password: Option<String>,

    /// Disable the progress bar.
    #[arg(long, env = "PDFCHAT_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose always wins.
    let show_progress = !cli.quiet
        && match &cli.command {
            Command::Convert { pipeline, json } => !pipeline.no_progress && !json,
            Command::Chat { pipeline, .. } => !pipeline.no_progress,
            Command::Models { .. } => false,
        };
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

    match cli.command {
        Command::Convert { pipeline, json } => {
            let config = build_config(&pipeline, show_progress).await?;
            let output = run(&pipeline.input, &config)
                .await
                .context("Pipeline failed")?;

            if json {
                let json =
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
                println!("{json}");
            } else if !cli.quiet {
                print_summary(&output);
            }
        }

        Command::Chat {
            pipeline,
            plain,
            chat_model,
            chat_temperature,
            chat_max_tokens,
        } => {
            let chat = ChatConfig {
                model: chat_model,
                temperature: chat_temperature.clamp(0.0, 2.0),
                max_tokens: chat_max_tokens,
                api_timeout_secs: pipeline.api_timeout,
            };
            // Fail on a missing credential before spending time on the PDF.
            let backend = resolve_backend(
                pipeline.provider.as_deref(),
                Some(&chat.model),
                DEFAULT_CHAT_MODEL,
            )
            .context("Chat model unavailable")?;

            let document = match resolve_source(&pipeline.input)? {
                SourceDocument::Markdown(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                SourceDocument::Pdf(path) => {
                    let config = build_config(&pipeline, show_progress).await?;
                    let output = run(&path, &config).await.context("Pipeline failed")?;
                    if !cli.quiet {
                        print_summary(&output);
                    }
                    if plain {
                        output.markdown
                    } else {
                        output.conversation_document()?
                    }
                }
            };

            repl(ConversationSession::seeded(&document), backend.as_ref(), &chat).await?;
        }

        Command::Models { base_url, api_key } => {
            let Some(api_key) = api_key.filter(|k| !k.is_empty()) else {
                bail!("No API key: set OPENAI_API_KEY or pass --api-key");
            };
            for id in list_models(&base_url, &api_key).await? {
                println!("{id}");
            }
        }
    }

    Ok(())
}

/// Interactive loop over stdin. `/reset` forgets the dialogue, `/quit` exits.
async fn repl(
    mut session: ConversationSession,
    backend: &dyn pdfchat::ModelBackend,
    chat: &ChatConfig,
) -> Result<()> {
    if let Some(ack) = session.transcript().first() {
        eprintln!("{} {}", cyan("assistant›"), ack.content);
    }
    eprintln!("{}", dim("Type a question, /reset to start over, /quit to exit."));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", bold("you›"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let question = line.trim();
        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                eprintln!("{}", dim("Conversation reset."));
                continue;
            }
            _ => {}
        }

        match session.ask(backend, question, chat).await {
            Ok(answer) => println!("{} {}\n", cyan("assistant›"), answer),
            Err(e) => eprintln!("{} {}", red("error:"), e),
        }
    }
    Ok(())
}

fn print_summary(output: &PipelineOutput) {
    eprintln!("   plain     {}", bold(&output.plain_path.display().to_string()));
    if let Some(ref enriched) = output.enriched_path {
        eprintln!("   enriched  {}", bold(&enriched.display().to_string()));
    }
    let s = &output.stats;
    eprintln!(
        "   {} image(s), {} failed, {} missing  —  {} tokens in / {} tokens out  —  {}ms",
        output.image_count,
        s.failed_descriptions,
        s.missing_images,
        dim(&s.total_input_tokens.to_string()),
        dim(&s.total_output_tokens.to_string()),
        s.total_duration_ms,
    );
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(args: &PipelineArgs, show_progress: bool) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .context_size(args.context_size as usize)
        .process_images(!args.no_images)
        .instructions(args.instructions.clone())
        .output_root(args.output_dir.clone())
        .concurrency(args.concurrency)
        .max_tokens(args.max_tokens)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout);

    if let Some(ref path) = args.description_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read description prompt from {:?}", path))?;
        builder = builder.description_prompt(prompt);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password.clone());
    }
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
