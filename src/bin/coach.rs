//! coach CLI — operator interface to the coaching backend.

use coach_rs::coach::Coach;
use coach_rs::config::Config;
use coach_rs::config::secrets::ExposeSecret;
use coach_rs::db::Db;
use coach_rs::error::Error;
use coach_rs::llm::ChatModel;
use coach_rs::model::{UserId, UserProfile};
use coach_rs::tasks::{Dispatcher, DispatcherConfig, NoteExtractor};
use coach_rs::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "coach", about = "Nutrition and fitness coaching backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations and create the default users
    Migrate,
    /// Send one message to the coach and print the HTML reply
    Chat {
        /// User id or handle (e.g. "guest")
        #[arg(long, default_value = "guest")]
        user: String,
        /// The message
        prompt: String,
    },
    /// Chat interactively, one message per line, until EOF
    Talk {
        /// User id or handle
        #[arg(long, default_value = "guest")]
        user: String,
    },
    /// Show the notes stored for a user
    Notes {
        #[arg(long, default_value = "guest")]
        user: String,
    },
    /// Show the latest messages of a conversation
    History {
        #[arg(long, default_value = "guest")]
        user: String,
        /// Maximum messages to show
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i64).range(1..))]
        limit: i64,
    },
    /// Profile operations
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Print a profile as JSON
    Show {
        #[arg(long, default_value = "guest")]
        user: String,
    },
    /// Create or replace a profile from a JSON file
    Set {
        #[arg(long)]
        user: String,
        /// Path to the profile JSON (camelCase fields)
        file: PathBuf,
    },
}

/// Everything a chat session needs.
struct Session {
    coach: Coach<NoteExtractor>,
    tasks: Dispatcher<NoteExtractor>,
}

impl Session {
    fn new(config: &Config, db: Arc<Db>) -> anyhow::Result<Self> {
        let extractor = NoteExtractor::new(
            Arc::clone(&db),
            ChatModel::openai(&config.openai_api_key, &config.extraction_model)?,
        );
        let tasks = Dispatcher::new(
            extractor,
            DispatcherConfig {
                task_timeout: config.task_timeout,
            },
        );
        let coach = Coach::new(
            db,
            ChatModel::openai(&config.openai_api_key, &config.chat_model)?,
            tasks.clone(),
        );
        Ok(Self { coach, tasks })
    }

    /// Let pending extractions finish, then stop the worker.
    async fn finish(self) {
        self.tasks.wait_idle().await;
        self.tasks.shutdown().await;
        let stats = self.tasks.stats();
        if stats.failed + stats.timed_out > 0 {
            eprintln!(
                "{} of {} note extraction(s) failed, see logs",
                stats.failed + stats.timed_out,
                stats.submitted
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "coach".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;
    let db = Arc::new(db);

    match cli.command {
        Command::Migrate => {
            let created = db.seed_default_users().await?;
            println!("Migrations applied, {created} default user(s) created.");
            Ok(())
        }
        Command::Chat { user, prompt } => {
            let user_id = UserId::resolve(&user)?;
            let session = Session::new(&config, db)?;
            let reply = session.coach.reply(user_id, &prompt).await?;
            println!("{reply}");
            session.finish().await;
            Ok(())
        }
        Command::Talk { user } => cmd_talk(&config, db, &user).await,
        Command::Notes { user } => cmd_notes(&db, &user).await,
        Command::History { user, limit } => cmd_history(&db, &user, limit).await,
        Command::Profile { action } => match action {
            ProfileAction::Show { user } => cmd_profile_show(&db, &user).await,
            ProfileAction::Set { user, file } => cmd_profile_set(&db, &user, file).await,
        },
    }
}

async fn cmd_talk(config: &Config, db: Arc<Db>, user: &str) -> anyhow::Result<()> {
    let user_id = UserId::resolve(user)?;
    let session = Session::new(config, db)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Extractions already queued still get to run if the session ends on an error.
    let result = async {
        while let Some(line) = lines.next_line().await? {
            let prompt = line.trim();
            if prompt.is_empty() {
                continue;
            }
            let reply = session.coach.reply(user_id, prompt).await?;
            println!("{reply}\n");
        }
        anyhow::Ok(())
    }
    .await;

    session.finish().await;
    result
}

async fn cmd_notes(db: &Db, user: &str) -> anyhow::Result<()> {
    let user_id = UserId::resolve(user)?;
    let notes = db.list_notes(user_id).await?;

    if notes.is_empty() {
        println!("No notes for {user}.");
        return Ok(());
    }

    println!(
        "{:<20}  {:<24}  {:<5}  {:<12}  VALUE",
        "CATEGORY", "KEY", "CONF", "SOURCE"
    );
    println!("{}", "-".repeat(90));
    for note in &notes {
        println!(
            "{:<20}  {:<24}  {:<5.2}  {:<12}  {}",
            note.category, note.key, note.confidence, note.source, note.value
        );
    }
    println!("\n{} note(s)", notes.len());
    Ok(())
}

async fn cmd_history(db: &Db, user: &str, limit: i64) -> anyhow::Result<()> {
    let user_id = UserId::resolve(user)?;
    let messages = db.recent_messages(user_id, limit).await?;

    if messages.is_empty() {
        println!("No conversation for {user}.");
        return Ok(());
    }

    for m in &messages {
        println!(
            "[{}] {:<9} {}",
            m.timestamp.format("%Y-%m-%d %H:%M"),
            m.role,
            m.content
        );
    }
    Ok(())
}

async fn cmd_profile_show(db: &Db, user: &str) -> anyhow::Result<()> {
    let user_id = UserId::resolve(user)?;
    match db.get_profile(user_id).await? {
        Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
        None => return Err(Error::NotFound(format!("profile for '{user}' ({user_id})")).into()),
    }
    Ok(())
}

async fn cmd_profile_set(db: &Db, user: &str, file: PathBuf) -> anyhow::Result<()> {
    let user_id = UserId::resolve(user)?;
    let raw = tokio::fs::read_to_string(&file).await?;
    let mut profile: UserProfile = serde_json::from_str(&raw)?;
    profile.id = Some(user_id);

    db.upsert_profile(user_id, &profile).await?;
    println!("Saved profile for {user} ({user_id}).");
    Ok(())
}
