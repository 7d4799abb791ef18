use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use paperchat_core::{AppConfig, ChatEvent, ChatSession, Submission, GREETING};
use paperchat_schema::UploadedFile;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "paperchat", version, about = "Ask questions about your documents")]
struct Cli {
    #[arg(long, help = "Path to the YAML config file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Interactive chat over the given documents")]
    Chat {
        #[arg(required = true, help = "Documents to ground answers in (.txt, .md, .pdf)")]
        files: Vec<PathBuf>,
    },
    #[command(about = "Ask a single question and exit")]
    Ask {
        #[arg(long, short, help = "The question to ask")]
        question: String,
        #[arg(required = true, help = "Documents to ground answers in (.txt, .md, .pdf)")]
        files: Vec<PathBuf>,
    },
    #[command(about = "Validate config and credentials")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("paperchat=info")
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Chat { files } => run_chat(config, &files).await,
        Commands::Ask { question, files } => run_ask(config, &question, &files).await,
        Commands::Validate => run_validate(config),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => {
            let default = PathBuf::from("paperchat.yaml");
            if default.exists() {
                AppConfig::load(&default)
            } else {
                Ok(AppConfig::default())
            }
        }
    }
}

fn load_files(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadedFile::new(name, bytes));
    }
    Ok(files)
}

fn build_session(config: AppConfig) -> Result<ChatSession> {
    // Resolving providers up front makes a missing API key fatal at startup
    // rather than on the first question.
    let provider = config.completion_provider()?;
    let embedder = config.embedding_provider()?;
    tracing::debug!(
        model = %config.provider.model,
        embedding = %config.embedding.model,
        "session ready"
    );
    Ok(ChatSession::new(provider, embedder, config))
}

async fn run_chat(config: AppConfig, paths: &[PathBuf]) -> Result<()> {
    let files = load_files(paths)?;
    let session = build_session(config)?;

    println!("{}", style(GREETING).dim());
    println!(
        "{}",
        style(format!(
            "loaded {} file(s); type a question, or /quit to exit",
            files.len()
        ))
        .dim()
    );

    let stdin = std::io::stdin();
    loop {
        print!("{} ", style(">").bold().cyan());
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let question = line.trim();
        if question == "/quit" || question == "/exit" {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match session.submit(question, files.clone()) {
            Ok(Submission::Accepted(rx)) => render_round(&session, rx).await,
            Ok(Submission::Ignored) => continue,
            Err(err) => eprintln!("{}", style(err).yellow()),
        }
    }

    Ok(())
}

async fn run_ask(config: AppConfig, question: &str, paths: &[PathBuf]) -> Result<()> {
    let files = load_files(paths)?;
    let session = build_session(config)?;

    match session.submit(question, files)? {
        Submission::Accepted(rx) => {
            render_round(&session, rx).await;
            Ok(())
        }
        Submission::Ignored => {
            anyhow::bail!("nothing to do: the question was empty or no files were given")
        }
    }
}

/// Render one answer round: stream deltas to stdout as they arrive, report
/// skipped files, and cancel the round if the user hits Ctrl-C.
async fn render_round(session: &ChatSession, mut rx: tokio::sync::mpsc::Receiver<ChatEvent>) {
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(ChatEvent::FileSkipped { name, reason }) => {
                    eprintln!("{}", style(format!("skipped {name}: {reason}")).yellow());
                }
                Some(ChatEvent::Delta(delta)) => {
                    print!("{delta}");
                    let _ = std::io::stdout().flush();
                }
                Some(ChatEvent::Completed { .. }) => {
                    println!();
                    break;
                }
                Some(ChatEvent::Cancelled { .. }) => {
                    println!();
                    eprintln!("{}", style("answer cancelled").yellow());
                    break;
                }
                Some(ChatEvent::Failed { error }) => {
                    println!();
                    eprintln!("{}", style(format!("error: {error}")).red());
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
            }
        }
    }
}

fn run_validate(config: AppConfig) -> Result<()> {
    println!("provider model:    {}", config.provider.model);
    println!("embedding model:   {}", config.embedding.model);
    println!(
        "retrieval:         chunk_size={} overlap={} top_k={}",
        config.retrieval.chunk_size, config.retrieval.chunk_overlap, config.retrieval.top_k
    );
    match config.resolve_api_key() {
        Ok(Some(_)) => println!("{}", style("api key: present").green()),
        Ok(None) => println!("{}", style("api key: not required").green()),
        Err(err) => {
            println!("{}", style(format!("api key: {err}")).red());
            anyhow::bail!("config validation failed");
        }
    }
    println!("{}", style("config ok").green());
    Ok(())
}
