use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use warden_core::config::Config;
use warden_core::context::open_index;
use warden_core::{Answer, PrincipalResolver, RagContext};
use warden_memory::document::IngestionReport;
use warden_memory::{AccessLabel, DeleteSelector, Predicate, SessionId};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Role-aware question answering over labelled document folders")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "WARDEN_CONFIG", default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and index every document under the source folder
    Ingest {
        /// Folder to ingest instead of `ingestion.source_dir`
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print the ingestion report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer a single question
    Ask {
        #[command(flatten)]
        who: Caller,

        /// The question
        question: String,
    },

    /// Interactive session over stdin (`/reset` clears history, `/quit` exits)
    Chat {
        #[command(flatten)]
        who: Caller,
    },

    /// Remove indexed chunks
    Delete {
        /// Remove every chunk of this source id
        #[arg(long, conflicts_with_all = ["label", "all"])]
        source: Option<String>,

        /// Remove every chunk carrying this access label
        #[arg(long, conflicts_with = "all")]
        label: Option<String>,

        /// Remove everything
        #[arg(long)]
        all: bool,
    },

    /// Show what the index holds, optionally as seen by one role
    Stats {
        #[arg(long)]
        role: Option<String>,
    },
}

#[derive(clap::Args)]
struct Caller {
    /// Username looked up in `[principals]`
    #[arg(long, conflicts_with = "role", required_unless_present = "role")]
    user: Option<String>,

    /// Role to query as, bypassing principal lookup
    #[arg(long)]
    role: Option<String>,

    /// Conversation session id (defaults to the username or role)
    #[arg(long)]
    session: Option<String>,
}

struct Resolved {
    role: String,
    session: SessionId,
}

impl Caller {
    fn resolve(&self, ctx: &RagContext) -> anyhow::Result<Resolved> {
        let (role, default_session) = match (&self.user, &self.role) {
            (Some(user), _) => {
                let principal = ctx.principals().resolve(user)?;
                (principal.role, principal.username)
            }
            (None, Some(role)) => (role.clone(), format!("role:{role}")),
            (None, None) => bail!("either --user or --role is required"),
        };
        let session = SessionId::new(self.session.clone().unwrap_or(default_session));
        Ok(Resolved { role, session })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    init_subscriber(&config.observability.log_level);
    tracing::debug!(path = %cli.config.display(), "configuration loaded");

    match cli.command {
        Command::Ingest { dir, json } => ingest(config, dir.as_deref(), json).await,
        Command::Ask { who, question } => ask(config, &who, &question).await,
        Command::Chat { who } => chat(config, &who).await,
        Command::Delete { source, label, all } => delete(&config, source, label, all).await,
        Command::Stats { role } => stats(&config, role.as_deref()).await,
    }
}

fn init_subscriber(default_level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn ingest(config: Config, dir: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let ctx = RagContext::build(config)
        .await
        .context("failed to initialize warden")?;
    let source = ctx.directory_source(dir);
    let report = ctx
        .pipeline()?
        .run(&source)
        .await
        .context("ingestion aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &IngestionReport) {
    println!(
        "indexed {} of {} documents ({} chunks) in {} ms",
        report.documents_indexed,
        report.documents_seen,
        report.chunks_indexed,
        report.duration_ms
    );
    for failure in &report.failures {
        println!(
            "  failed {} at {:?}: {}",
            failure.source_id, failure.stage, failure.reason
        );
    }
}

async fn ask(config: Config, who: &Caller, question: &str) -> anyhow::Result<()> {
    let ctx = RagContext::build(config)
        .await
        .context("failed to initialize warden")?;
    let caller = who.resolve(&ctx)?;
    let answer = ctx
        .composer()
        .answer(question, &caller.role, &caller.session)
        .await?;
    print_answer(&answer);
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text.trim());
    if !answer.citations.is_empty() {
        println!();
        for (i, citation) in answer.citations.iter().enumerate() {
            println!(
                "[{}] {} (score {:.3})",
                i + 1,
                citation.source_id,
                citation.score
            );
        }
    }
}

async fn chat(config: Config, who: &Caller) -> anyhow::Result<()> {
    let ctx = RagContext::build(config)
        .await
        .context("failed to initialize warden")?;
    let caller = who.resolve(&ctx)?;
    let composer = ctx.composer();
    let conversations = ctx.conversations();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => {}
            "/quit" | "/exit" => break,
            "/reset" => {
                let removed = conversations.clear(&caller.session).await?;
                println!("cleared {removed} turns");
            }
            question => match composer.answer(question, &caller.role, &caller.session).await {
                Ok(answer) => print_answer(&answer),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => eprintln!("error: {e}"),
            },
        }
    }
    Ok(())
}

async fn delete(
    config: &Config,
    source: Option<String>,
    label: Option<String>,
    all: bool,
) -> anyhow::Result<()> {
    let selector = match (source, label, all) {
        (Some(source), _, _) => DeleteSelector::Source(source),
        (None, Some(label), _) => DeleteSelector::Matching(Predicate::only(
            AccessLabel::new(&label).context("invalid --label")?,
        )),
        (None, None, true) => DeleteSelector::Matching(Predicate::Unrestricted),
        (None, None, false) => bail!("one of --source, --label or --all is required"),
    };

    let index = open_index(config).await?;
    let removed = index.delete(selector).await?;
    println!("removed {removed} chunks");
    Ok(())
}

async fn stats(config: &Config, role: Option<&str>) -> anyhow::Result<()> {
    let index = open_index(config).await?;
    let predicate = role.map_or(Predicate::Unrestricted, Predicate::for_role);
    let entries = index.list(&predicate).await?;

    println!(
        "{} chunks ({} backend, dimension {})",
        entries.len(),
        config.index.backend,
        index.dimension()
    );

    let mut per_source: Vec<(&str, &AccessLabel, usize)> = Vec::new();
    for entry in &entries {
        match per_source.last_mut() {
            Some((source, _, n)) if *source == entry.source_id => *n += 1,
            _ => per_source.push((&entry.source_id, &entry.access_label, 1)),
        }
    }
    for (source, label, chunks) in per_source {
        println!("  {label:<12} {source} ({chunks} chunks)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_requires_user_or_role() {
        assert!(Cli::try_parse_from(["warden", "ask", "hi"]).is_err());
        assert!(Cli::try_parse_from(["warden", "ask", "--role", "hr", "hi"]).is_ok());
        assert!(
            Cli::try_parse_from(["warden", "ask", "--user", "a", "--role", "hr", "hi"]).is_err()
        );
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["warden", "stats", "--config", "/tmp/w.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/w.toml"));
        assert!(matches!(cli.command, Command::Stats { role: None }));
    }

    #[test]
    fn delete_selectors_conflict() {
        assert!(Cli::try_parse_from(["warden", "delete", "--source", "a.md", "--all"]).is_err());
        assert!(Cli::try_parse_from(["warden", "delete", "--label", "hr"]).is_ok());
    }
}
