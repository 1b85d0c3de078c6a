use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docqa_core::config::Config;
use docqa_rag::session::format_passage;
use docqa_rag::{AskOutcome, Session, Status};
use docqa_vector::IndexStore;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about your documents")]
struct Cli {
    /// Directory holding config.toml and the data/ tree
    #[arg(long, env = "DOCQA_HOME", default_value = ".")]
    home: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy files (or directories) into the document store and index them
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Answer one question
    Ask {
        question: String,
        /// Context passages to retrieve (1-10)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Interactive question loop; empty line or `exit` to leave
    Chat {
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Show what the persisted index holds
    Status,
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn print_status(status: &Status) {
    let icon = match status {
        Status::Warning(_) => "⚠️ ",
        Status::Error(_) => "❌",
        Status::Info(_) => "🧩",
        Status::Success(_) => "✅",
    };
    println!("{icon} {}", status.message());
}

fn print_outcome(outcome: &AskOutcome) {
    for status in &outcome.statuses {
        print_status(status);
    }
    for (i, hit) in outcome.hits.iter().enumerate() {
        println!("{}\n", format_passage(i + 1, hit));
    }
    if let Some(answer) = &outcome.answer {
        println!("{answer}");
    }
}

fn status(config: &Config) -> Result<()> {
    let settings = config.settings();
    let store = IndexStore::open(&config.vectorstore_dir(), &settings.data.table)?;
    match store.info()? {
        Some(info) => {
            println!("📦 Index at {}", store.dir().display());
            println!("   records:  {}", info.records);
            println!("   embedder: {} ({} dims)", info.embedder_id, info.dim);
            println!("   saved at: {}", info.saved_at);
        }
        None => println!("No index yet at {}. Run `docqa ingest <files>`.", store.dir().display()),
    }
    Ok(())
}

fn chat(session: &Session, k: Option<usize>) -> Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("❓ ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() || question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        print_outcome(&session.ask(question, k));
        println!();
    }
    Ok(())
}

fn run(cli: Cli, config: &Config) -> Result<()> {
    if let Command::Status = cli.command {
        return status(config);
    }
    let mut session = Session::from_config(config)?;
    match cli.command {
        Command::Ingest { paths } => {
            let report = session.ingest(&paths);
            for s in &report.statuses {
                print_status(s);
            }
            if report.statuses.iter().any(Status::is_error) {
                anyhow::bail!("ingestion did not complete");
            }
        }
        Command::Ask { question, k } => print_outcome(&session.ask(&question, k)),
        Command::Chat { k } => chat(&session, k)?,
        Command::Status => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_in(Path::new(&cli.home)).map_err(|e| {
        eprintln!("Error loading config: {e:#}");
        e
    })?;
    init_tracing(&config.settings().logging.level);
    tracing::debug!(home = %cli.home.display(), "configuration loaded");
    run(cli, &config)
}
