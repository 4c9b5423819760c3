use clap::{Parser, Subcommand};
use md_richtext::editor::load_persisted;
use md_richtext::paste::{self, ClipboardPayload, PasteStrategy};
use md_richtext::{Document, EditorConfig, MarkdownCodec, MediaAccountant, NodeRegistry};
use serde::Serialize;
use std::fmt::Display;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON editor config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a persisted document (JSON or markdown) as markdown
    Markdown { input: PathBuf },
    /// Print a persisted document as HTML
    Html { input: PathBuf },
    /// Convert a persisted document to the JSON tree form
    Import {
        input: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Report embedded media and payload usage; exits 1 when over capacity
    Media {
        input: PathBuf,
        #[arg(long)]
        max_payload_bytes: Option<u64>,
    },
    /// Show how pasting the input text would be handled
    Classify {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaReport {
    media: Vec<md_richtext::EmbeddedMediaInfo>,
    total_bytes: u64,
    max_payload_bytes: u64,
    usage_percent: f64,
    over_capacity: bool,
    validation: md_richtext::ValidationReport,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EditorConfig::from_file(path).unwrap_or_else(|err| fail(err)),
        None => EditorConfig::default(),
    };

    match &cli.command {
        Commands::Markdown { input } => markdown_command(input),
        Commands::Html { input } => html_command(input),
        Commands::Import { input, pretty } => import_command(input, *pretty),
        Commands::Media {
            input,
            max_payload_bytes,
        } => media_command(input, &config, *max_payload_bytes),
        Commands::Classify { input, json } => classify_command(input, *json),
    }
}

fn fail(err: impl Display) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}

fn read_input(path: &Path) -> String {
    let mut text = String::new();
    let result = if path == Path::new("-") {
        std::io::stdin().read_to_string(&mut text).map(|_| ())
    } else {
        std::fs::read_to_string(path).map(|contents| text = contents)
    };
    if let Err(err) = result {
        fail(format!("{}: {err}", path.display()));
    }
    text
}

fn load(path: &Path) -> Document {
    let input = read_input(path);
    load_persisted(&NodeRegistry::with_builtin_kinds(), &MarkdownCodec::new(), &input)
        .unwrap_or_else(|err| fail(err))
}

fn markdown_command(input: &Path) {
    let doc = load(input);
    println!("{}", MarkdownCodec::new().to_markdown(&doc));
}

fn html_command(input: &Path) {
    let doc = load(input);
    let html = NodeRegistry::with_builtin_kinds()
        .to_html(&doc)
        .unwrap_or_else(|err| fail(err));
    println!("{html}");
}

fn import_command(input: &Path, pretty: bool) {
    let doc = load(input);
    let value = NodeRegistry::with_builtin_kinds()
        .serialize_document(&doc)
        .unwrap_or_else(|err| fail(err));
    let output = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    println!("{}", output.unwrap_or_else(|err| fail(err)));
}

fn media_command(input: &Path, config: &EditorConfig, max_payload_bytes: Option<u64>) {
    let doc = load(input);
    let mut accountant = MediaAccountant::new(
        max_payload_bytes.unwrap_or(config.max_payload_bytes),
        config.max_image_bytes,
    );
    accountant.recompute(&doc);
    let usage = accountant.usage();
    let report = MediaReport {
        media: accountant.media().to_vec(),
        total_bytes: usage.total_bytes,
        max_payload_bytes: usage.max_payload_bytes,
        usage_percent: usage.percent(),
        over_capacity: accountant.is_over_capacity(),
        validation: accountant.validation(),
    };
    let output = serde_json::to_string_pretty(&report).unwrap_or_else(|err| fail(err));
    println!("{output}");
    if report.over_capacity {
        std::process::exit(1);
    }
}

fn classify_command(input: &Path, json: bool) {
    let text = read_input(input);
    let payload = ClipboardPayload::text(text.as_str());
    let strategy = paste::classify(&payload);
    let signals = paste::markdown_signals(&text);
    if json {
        let video = match &strategy {
            PasteStrategy::VideoEmbed(video) => Some(video),
            _ => None,
        };
        let output = serde_json::json!({
            "strategy": strategy.name(),
            "video": video,
            "signals": signals.iter().map(|signal| format!("{signal:?}")).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_else(|err| fail(err))
        );
    } else {
        println!("{}", strategy.name());
    }
}
