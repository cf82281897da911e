use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use webcloud_core::{Error, RenderConfig, SizeProfile};
use webcloud_local::config::{self, Config};
use webcloud_local::pipeline::{self, GenerateRequest, Source};
use webcloud_local::render::Wordcloud2ListRenderer;
use webcloud_local::{lexicon, FetchRoute, LocalFetcher};

mod envelope;
mod serve;

use envelope::{add_envelope_fields, error_payload, warning_hints_from};

#[derive(Parser, Debug)]
#[command(name = "webcloud")]
#[command(about = "Web page -> word cloud: extract body text, rank words, emit a weighted layout", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a page (with relay fallback) and print its extracted body text (json).
    Extract(ExtractCmd),
    /// Rank words of pasted text or a file (json).
    Rank(RankCmd),
    /// Full pipeline: fetch/extract (or pasted text) -> rank -> weights -> wordcloud2 layout (json).
    Generate(GenerateCmd),
    /// Serve `GET /api/extract-text?url=...` over HTTP.
    Serve(ServeCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// Per-route fetch timeout (ms). Malformed values keep the default.
    #[arg(long, env = "WEBCLOUD_TIMEOUT_MS")]
    timeout_ms: Option<String>,
    /// Fetch routes in order, comma-separated. `direct`, or a relay URL such as
    /// `https://relay.example/raw?url=` (the empty-valued key receives the target URL).
    #[arg(long, env = "WEBCLOUD_RELAYS")]
    relays: Option<String>,
    /// Response body cap (bytes). Malformed values keep the default.
    #[arg(long, env = "WEBCLOUD_MAX_BYTES")]
    max_bytes: Option<String>,
}

#[derive(clap::Args, Debug)]
struct TextInput {
    /// Pasted text (manual paste fallback).
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,
    /// Read text from a file.
    #[arg(long)]
    file: Option<std::path::PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ExtractCmd {
    /// Page URL (http/https).
    #[arg(long)]
    url: Option<String>,
    #[command(flatten)]
    fetch: FetchArgs,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct RankCmd {
    #[command(flatten)]
    input: TextInput,
    /// Number of terms to keep (1..=50).
    #[arg(long, default_value_t = 50)]
    top: usize,
    /// Size profile used for weights: small|medium|large
    #[arg(long, env = "WEBCLOUD_SIZE_PROFILE", default_value = "medium")]
    size: String,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct GenerateCmd {
    /// Page URL (http/https). Omit when passing --text/--file.
    #[arg(long, conflicts_with_all = ["text", "file"])]
    url: Option<String>,
    #[command(flatten)]
    input: TextInput,
    #[command(flatten)]
    fetch: FetchArgs,
    /// Number of terms to keep (1..=50).
    #[arg(long, default_value_t = 50)]
    top: usize,
    /// Size profile: small|medium|large (unknown names fall back to medium).
    #[arg(long, env = "WEBCLOUD_SIZE_PROFILE", default_value = "medium")]
    size: String,
    /// Font family handed to the layout engine.
    #[arg(long)]
    font_family: Option<String>,
    /// Palette name handed to the layout engine.
    #[arg(long)]
    palette: Option<String>,
    /// Canvas width (px).
    #[arg(long, default_value_t = 800)]
    width: u32,
    /// Canvas height (px).
    #[arg(long, default_value_t = 400)]
    height: u32,
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    /// Listen address.
    #[arg(long, env = "WEBCLOUD_LISTEN", default_value = "127.0.0.1:3001")]
    listen: std::net::SocketAddr,
    /// Allowed CORS origins (repeatable). Defaults to local dev origins.
    #[arg(long = "allow-origin")]
    allow_origin: Vec<String>,
    #[command(flatten)]
    fetch: FetchArgs,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing() {
    // stdout carries JSON; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Environment config with CLI overrides applied on top.
fn resolve_config(fetch: &FetchArgs) -> std::result::Result<Config, Error> {
    let mut cfg = Config::from_env()?;
    if let Some(t) = fetch.timeout_ms.as_deref() {
        cfg.timeout_ms = config::parse_timeout_ms(Some(t), cfg.timeout_ms);
    }
    if let Some(m) = fetch.max_bytes.as_deref() {
        cfg.max_bytes = config::parse_max_bytes(Some(m), cfg.max_bytes);
    }
    if let Some(r) = fetch.relays.as_deref() {
        let routes = FetchRoute::parse_list(r)?;
        if !routes.is_empty() {
            cfg.routes = routes;
        }
    }
    Ok(cfg)
}

fn read_text_input(input: &TextInput) -> Result<Option<String>> {
    if let Some(t) = &input.text {
        return Ok(Some(t.clone()));
    }
    if let Some(p) = &input.file {
        let s = std::fs::read_to_string(p)
            .with_context(|| format!("read text file {}", p.display()))?;
        return Ok(Some(s));
    }
    Ok(None)
}

/// Print a payload (success or failure) and turn it into an exit code.
fn emit(kind: &str, t0: Instant, res: std::result::Result<serde_json::Value, Error>) -> ExitCode {
    let elapsed_ms = t0.elapsed().as_millis();
    match res {
        Ok(mut v) => {
            v["ok"] = serde_json::json!(true);
            add_envelope_fields(&mut v, kind, elapsed_ms);
            println!("{v}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "{kind} failed");
            println!("{}", error_payload(kind, &e, elapsed_ms));
            ExitCode::from(1)
        }
    }
}

fn render_config(args: &GenerateCmd) -> RenderConfig {
    let mut rc = RenderConfig {
        width: args.width,
        height: args.height,
        ..RenderConfig::default()
    };
    if let Some(f) = &args.font_family {
        rc.font_family = f.clone();
    }
    if let Some(p) = &args.palette {
        rc.palette = p.clone();
    }
    rc
}

async fn run_extract(args: &ExtractCmd) -> std::result::Result<serde_json::Value, Error> {
    let cfg = resolve_config(&args.fetch)?;
    let fetcher = LocalFetcher::new(&cfg.user_agent)?;
    let page = pipeline::fetch_and_extract(&fetcher, &cfg, args.url.as_deref()).await?;
    let mut codes = Vec::new();
    if page.truncated {
        codes.push("fetch_truncated");
    }
    if page.attempts.len() > 1 {
        codes.push("relay_fallback_used");
    }
    Ok(serde_json::json!({
        "url": page.url,
        "final_url": page.final_url,
        "route": page.route,
        "attempts": page.attempts,
        "engine": page.extracted.engine,
        "matched_selectors": page.extracted.matched_selectors,
        "removed_elements": page.extracted.removed_elements,
        "length": page.extracted.chars,
        "text": page.extracted.text,
        "warning_codes": codes,
        "warning_hints": warning_hints_from(&codes),
    }))
}

fn run_rank(args: &RankCmd, text: &str) -> std::result::Result<serde_json::Value, Error> {
    let analysis = pipeline::analyze_text(text, SizeProfile::from_name(&args.size), args.top)?;
    let mut v = serde_json::to_value(&analysis).map_err(|e| Error::RenderFailure(e.to_string()))?;
    v["ruleset_version"] = serde_json::json!(lexicon::RULESET_VERSION);
    Ok(v)
}

async fn run_generate(
    args: &GenerateCmd,
    text: Option<String>,
) -> std::result::Result<serde_json::Value, Error> {
    let source = match (text, args.url.as_deref()) {
        (Some(t), _) => Source::Text(t),
        (None, Some(u)) => Source::Url(u.to_string()),
        (None, None) => return Err(Error::MissingParameter("url")),
    };
    let cfg = resolve_config(&args.fetch)?;
    let fetcher = LocalFetcher::new(&cfg.user_agent)?;
    let req = GenerateRequest {
        source,
        profile: SizeProfile::from_name(&args.size),
        top_n: args.top,
        render: render_config(args),
    };
    let cloud = pipeline::generate(&fetcher, &cfg, &Wordcloud2ListRenderer, &req).await?;

    let mut codes = Vec::new();
    if !cloud.omitted.is_empty() {
        codes.push("terms_omitted");
    }
    if cloud.layout.is_none() {
        codes.push("render_failed");
    }
    let mut v = serde_json::to_value(&cloud).map_err(|e| Error::RenderFailure(e.to_string()))?;
    v["ruleset_version"] = serde_json::json!(lexicon::RULESET_VERSION);
    v["warning_codes"] = serde_json::json!(codes);
    v["warning_hints"] = warning_hints_from(&codes);
    Ok(v)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => {
            let t0 = Instant::now();
            let res = run_extract(&args).await;
            if let (Ok(v), "text") = (&res, args.output.to_ascii_lowercase().as_str()) {
                println!("{}", v["text"].as_str().unwrap_or(""));
                return Ok(ExitCode::SUCCESS);
            }
            Ok(emit("extract", t0, res))
        }
        Commands::Rank(args) => {
            let t0 = Instant::now();
            let text = read_text_input(&args.input)?;
            let res = match text.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(t) => run_rank(&args, t),
                None => Err(Error::MissingParameter("text")),
            };
            if let (Ok(v), "text") = (&res, args.output.to_ascii_lowercase().as_str()) {
                for r in v["ranked"].as_array().into_iter().flatten() {
                    println!(
                        "{}\t{}\t{}",
                        r["rank"],
                        r["count"],
                        r["term"].as_str().unwrap_or("")
                    );
                }
                return Ok(ExitCode::SUCCESS);
            }
            Ok(emit("rank", t0, res))
        }
        Commands::Generate(args) => {
            let t0 = Instant::now();
            let text = read_text_input(&args.input)?;
            let res = run_generate(&args, text).await;
            Ok(emit("generate", t0, res))
        }
        Commands::Serve(args) => {
            let cfg = resolve_config(&args.fetch)?;
            let fetcher = LocalFetcher::new(&cfg.user_agent)?;
            let origins = if args.allow_origin.is_empty() {
                serve::DEFAULT_ALLOWED_ORIGINS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            } else {
                args.allow_origin.clone()
            };
            let state = serve::AppState {
                backend: Arc::new(fetcher),
                cfg: Arc::new(cfg),
            };
            serve::run(args.listen, state, &origins).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": envelope::SCHEMA_VERSION,
                "kind": "version",
                "ok": true,
                "name": "webcloud",
                "version": env!("CARGO_PKG_VERSION"),
                "ruleset_version": lexicon::RULESET_VERSION,
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("webcloud {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
