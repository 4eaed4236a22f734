//! Command line interface for publishing to Nostr relays. Supports long-form
//! articles (NIP-23), short notes, event verification and NIP-19 decoding.

mod broadcast;
mod config;
mod content;
mod error;
mod event;
mod keys;
mod nip19;
mod publish;
mod relay;

use std::{fs, io::Write, path::PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use config::Settings;
use content::{ContentKind, ContentRecord};
use keys::Keys;
use nip19::Entity;
use publish::{Published, Publisher};

/// Command line interface entry point.
#[derive(Parser)]
#[command(
    name = "postr",
    author,
    version,
    about = "Publish articles and notes to Nostr relays"
)]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, env = "NOSTR", default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Generate a key and write a template configuration file at the
    /// `--env` path.
    Init,
    /// Publish a long-form article (kind 30023).
    Article {
        /// Stable identifier; republishing with the same one replaces the
        /// article. Defaults to the current time as `YYYYMMDDhhmm`.
        #[arg(long)]
        identifier: Option<String>,
        #[command(flatten)]
        post: PostArgs,
    },
    /// Publish a short note (kind 1).
    Note {
        #[command(flatten)]
        post: PostArgs,
    },
    /// Check ids and signatures of event JSON files.
    Verify {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Decode an npub, note or naddr.
    Decode { entity: String },
}

/// Arguments shared by `article` and `note`.
#[derive(Args)]
struct PostArgs {
    /// File holding the content body.
    file: PathBuf,
    /// Title of the document.
    #[arg(long)]
    title: String,
    /// Topic (can be specified multiple times).
    #[arg(short = 't', long = "tag")]
    tags: Vec<String>,
    /// Reference URL (can be specified multiple times).
    #[arg(short = 'r', long = "url")]
    urls: Vec<String>,
    /// Referenced event id (can be specified multiple times).
    #[arg(short = 'e', long = "event")]
    events: Vec<String>,
    /// Sign and print the event without sending it.
    #[arg(long)]
    dry_run: bool,
    /// Fail when fewer relays than this accepted the event.
    #[arg(long, default_value_t = 0)]
    min_delivered: usize,
}

impl PostArgs {
    fn record(&self) -> anyhow::Result<ContentRecord> {
        let content = fs::read_to_string(&self.file)
            .with_context(|| format!("reading {}", self.file.display()))?;
        Ok(ContentRecord {
            title: self.title.clone(),
            content,
            topics: self.tags.clone(),
            urls: self.urls.clone(),
            events: self.events.clone(),
        })
    }
}

/// Execute the selected CLI subcommand, writing results to `out`.
async fn run(cli: Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init => {
            let keys = Keys::generate();
            let nsec = keys.nsec().context("encoding generated key")?;
            config::write_template(&cli.env, &nsec)?;
            writeln!(out, "wrote {}", cli.env)?;
            if let Some(npub) = keys.npub() {
                writeln!(out, "pubkey {npub}")?;
            }
        }
        Commands::Article { identifier, post } => {
            let identifier =
                identifier.unwrap_or_else(|| chrono::Local::now().format("%Y%m%d%H%M").to_string());
            post_content(&cli.env, ContentKind::Article { identifier }, post, out).await?;
        }
        Commands::Note { post } => {
            post_content(&cli.env, ContentKind::Note, post, out).await?;
        }
        Commands::Verify { files } => {
            for f in files {
                let data = fs::read_to_string(&f).with_context(|| format!("reading {f}"))?;
                let ev: event::Event =
                    serde_json::from_str(&data).with_context(|| format!("parsing {f}"))?;
                ev.verify().with_context(|| format!("verifying {f}"))?;
                writeln!(out, "{f}: ok {}", ev.id)?;
            }
        }
        Commands::Decode { entity } => match nip19::decode(entity.trim())? {
            Entity::SecretKey(bytes) => {
                // never echo the secret itself
                let keys = Keys::from_slice(&bytes)?;
                writeln!(out, "secret key for pubkey {}", keys.public_hex())?;
            }
            Entity::PublicKey(pk) => writeln!(out, "pubkey {}", hex::encode(pk))?,
            Entity::Note(id) => writeln!(out, "event {}", hex::encode(id))?,
            Entity::Address(ptr) => {
                writeln!(out, "kind {}", ptr.kind)?;
                writeln!(out, "pubkey {}", hex::encode(ptr.pubkey))?;
                writeln!(out, "identifier {}", ptr.identifier)?;
                for relay in ptr.relays {
                    writeln!(out, "relay {relay}")?;
                }
            }
        },
    }
    Ok(())
}

async fn post_content(
    env_path: &str,
    kind: ContentKind,
    post: PostArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let cfg = Settings::from_env(env_path)?;
    let keys = Keys::parse(&cfg.nsec)?;
    let author = keys.npub();
    let record = post.record()?;
    let publisher = Publisher::new(keys, cfg.relays.clone(), cfg.broadcaster());

    if post.dry_run {
        let ev = publisher.sign(&record, &kind)?;
        writeln!(out, "{}", serde_json::to_string_pretty(&ev)?)?;
        return Ok(());
    }

    let published = publisher.publish(&record, &kind).await?;
    print_summary(out, &kind, &post, author, &published)?;

    let delivered = published.report.delivered_count();
    if delivered < post.min_delivered {
        bail!(
            "event {} accepted by {delivered} of {} relays, {} required",
            published.event.id,
            published.report.attempted(),
            post.min_delivered
        );
    }
    Ok(())
}

fn print_summary(
    out: &mut dyn Write,
    kind: &ContentKind,
    post: &PostArgs,
    author: Option<String>,
    published: &Published,
) -> anyhow::Result<()> {
    writeln!(out, "[*] {} published", kind.label())?;
    writeln!(out, "File: {}", post.file.display())?;
    if let Some(identifier) = kind.identifier() {
        writeln!(out, "Identifier: {identifier}")?;
    }
    writeln!(out, "Title: {}", post.title)?;
    writeln!(out, "Tags: [{}]", post.tags.join(", "))?;
    writeln!(out, "URLs: [{}]", post.urls.join(", "))?;
    writeln!(out, "Events: [{}]", post.events.join(", "))?;
    writeln!(out, "Event: {}", published.event.id)?;
    if let Some(npub) = author {
        writeln!(out, "Author: {npub}")?;
    }
    for r in &published.report.relays {
        writeln!(out, "Relay {}: {}", r.url, r.outcome)?;
    }
    match &published.address {
        Some(Ok(naddr)) => writeln!(out, "{naddr}")?,
        Some(Err(e)) => writeln!(out, "Address unavailable: {e}")?,
        None => {
            let note = hex::decode(&published.event.id)
                .ok()
                .and_then(|b| <[u8; 32]>::try_from(b).ok())
                .and_then(|b| nip19::encode_note(&b).ok());
            if let Some(note) = note {
                writeln!(out, "{note}")?;
            }
        }
    }
    Ok(())
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    run(cli, &mut std::io::stdout()).await
}
