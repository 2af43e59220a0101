//! CLI entry point for `mailsift`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mailsift::config::Config;
use mailsift::model::{Address, Email};
use mailsift::parser::charset;
use mailsift::MessageParser;

#[derive(Parser)]
#[command(
    name = "mailsift",
    version,
    about = "Decode raw email messages into headers, bodies and files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of a message (`-` reads standard input)
    Show {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Also list headers without a dedicated field
        #[arg(long)]
        headers: bool,
    },
    /// Print the decoded message as JSON
    Json {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Include file contents as byte arrays
        #[arg(long)]
        with_data: bool,
    },
    /// Write every attached and inline file to a directory
    Extract {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = mailsift::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let parser = MessageParser::new(config.parser.clone());

    match cli.command {
        Commands::Show { path, headers } => cmd_show(&parser, &path, headers),
        Commands::Json { path, with_data } => cmd_json(&parser, &path, with_data),
        Commands::Extract { path, output } => cmd_extract(&parser, &path, &output),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = mailsift::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailsift.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Decode a message from a file, or from standard input when `path` is `-`.
fn load_message(parser: &MessageParser, path: &Path) -> anyhow::Result<Email> {
    if path.as_os_str() == "-" {
        let mut data = Vec::new();
        std::io::stdin().lock().read_to_end(&mut data)?;
        return Ok(parser.parse_bytes(&data));
    }
    Ok(parser.parse_file(path)?)
}

/// Print headers, body sizes and the file list in a human-readable layout.
fn cmd_show(parser: &MessageParser, path: &Path, show_extra: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let email = load_message(parser, path)?;
    let h = &email.headers;

    println!();
    println!("  {:<12} {}", "From", format_addresses(&h.from));
    println!("  {:<12} {}", "To", format_addresses(&h.to));
    if !h.cc.is_empty() {
        println!("  {:<12} {}", "Cc", format_addresses(&h.cc));
    }
    println!("  {:<12} {}", "Subject", h.subject);
    let date = h
        .date
        .map(|d| d.to_rfc2822())
        .unwrap_or_else(|| "(none)".to_string());
    println!("  {:<12} {}", "Date", date);
    if !h.message_id.is_empty() {
        println!("  {:<12} <{}>", "Message-ID", h.message_id);
    }
    println!("  {:<12} {}", "Type", h.content_type);
    if show_extra {
        for (name, values) in h.extra_headers.iter() {
            for value in values {
                println!("  {:<12} {}", name, value);
            }
        }
    }
    println!();

    for (label, body) in [
        ("Text", &email.text),
        ("HTML", &email.html),
        ("Enriched", &email.enriched_text),
    ] {
        if !body.is_empty() {
            println!(
                "  {:<12} {} chars",
                label,
                body.chars().count()
            );
        }
    }
    if !h.content_type.is_multipart() {
        let label = h
            .content_type
            .charset()
            .unwrap_or(parser.config().default_charset.as_str());
        let name = charset::lookup(label).map_or("UTF-8 (fallback)", |c| c.name());
        println!("  {:<12} {}", "Charset", name);
    }

    if !email.attached_files.is_empty() || !email.inline_files.is_empty() {
        println!();
        println!(
            "  {:<4} {:<8} {:<40} {:<30} {:>10}",
            "#", "Kind", "Name", "Type", "Size"
        );
        println!("  {}", "-".repeat(96));
    }
    let attached = email
        .attached_files
        .iter()
        .map(|f| ("attach", f.filename(), &f.content_type.media_type, f.data.len()));
    let inline = email
        .inline_files
        .iter()
        .map(|f| ("inline", f.filename(), &f.content_type.media_type, f.data.len()));
    for (i, (kind, name, media_type, size)) in attached.chain(inline).enumerate() {
        let name: String = name.unwrap_or("-").chars().take(39).collect();
        println!(
            "  {:<4} {:<8} {:<40} {:<30} {:>10}",
            i + 1,
            kind,
            name,
            media_type,
            format_size(size as u64, BINARY)
        );
    }

    if !email.text.is_empty() {
        println!();
        for line in email.text.lines().take(20) {
            println!("  {line}");
        }
    }
    println!();

    Ok(())
}

/// Print the decoded message as JSON.
fn cmd_json(parser: &MessageParser, path: &Path, with_data: bool) -> anyhow::Result<()> {
    let email = load_message(parser, path)?;

    let value = if with_data {
        serde_json::to_value(&email)?
    } else {
        let files = |kind: &str, name: Option<&str>, media_type: &str, size: usize| {
            serde_json::json!({
                "kind": kind,
                "filename": name,
                "content_type": media_type,
                "size": size,
            })
        };
        let mut file_list: Vec<serde_json::Value> = email
            .attached_files
            .iter()
            .map(|f| files("attached", f.filename(), &f.content_type.media_type, f.data.len()))
            .collect();
        file_list.extend(
            email
                .inline_files
                .iter()
                .map(|f| files("inline", f.filename(), &f.content_type.media_type, f.data.len())),
        );

        serde_json::json!({
            "headers": email.headers,
            "text": email.text,
            "html": email.html,
            "enriched_text": email.enriched_text,
            "files": file_list,
        })
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Extract all files of a message.
fn cmd_extract(parser: &MessageParser, path: &Path, output: &Path) -> anyhow::Result<()> {
    let email = load_message(parser, path)?;

    if email.attached_files.is_empty() && email.inline_files.is_empty() {
        println!("  No attached or inline files found.");
        return Ok(());
    }

    let paths = mailsift::export::files::export_files(&email, output)?;
    println!(
        "  Extracted {} file(s) to {}",
        paths.len(),
        output.display()
    );

    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailsift", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn format_addresses(list: &[Address]) -> String {
    if list.is_empty() {
        return "(none)".to_string();
    }
    list.iter()
        .map(Address::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
