use amendment_core::schema::{
    ActorContext, ActorRole, AmendmentFilter, DocumentKind, Priority, StatusFilter, VoteChoice,
};
use amendment_core::workflow::NewAmendment;
use amendment_core::{audit, db, documents, workflow};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use schemars::schema_for;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ordtrack")]
#[command(about = "Municipal ordinance and amendment tracking CLI", long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "ordtrack.toml", global = true)]
    config: PathBuf,

    /// Database path (overrides the config file)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Acting user id, as supplied by the session layer
    #[arg(long, default_value = "clerk", global = true)]
    actor: String,

    /// Acting user role: super_admin, admin, or councilor
    #[arg(long, default_value = "admin", global = true)]
    role: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the ordinance/resolution registry and its attachments
    Document {
        #[command(subcommand)]
        command: DocumentCommands,
    },
    /// File a new amendment against a registered document
    File {
        /// Amendment title
        #[arg(long)]
        title: String,
        /// What the amendment changes
        #[arg(long, default_value = "")]
        description: String,
        /// Target document id
        #[arg(long)]
        document: i64,
        /// low, medium, high, or urgent
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Submit straight into the review queue instead of saving a draft
        #[arg(long)]
        submit: bool,
    },
    /// Apply an approve/reject/return decision to an amendment
    Decide {
        amendment_id: i64,
        /// approve, reject, or return
        action: String,
        /// Required for reject and return
        #[arg(long)]
        comments: Option<String>,
    },
    /// Record a councilor's vote on an amendment
    Vote {
        amendment_id: i64,
        voter: String,
        /// yes, no, or abstain
        choice: String,
    },
    /// List amendments with document details and vote tallies
    List {
        /// all, draft, pending, approved, or rejected
        #[arg(long, default_value = "all")]
        status: String,
        /// Case-insensitive substring over title, amendment number, document number
        #[arg(long)]
        search: Option<String>,
    },
    /// Show an amendment's workflow steps and signatures
    History { amendment_id: i64 },
    /// Counts of amendments by status bucket
    Stats,
    /// Show the audit trail, newest first
    Audit {
        /// Only entries whose actor contains this text
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Write markdown dossiers reconstructing each amendment's history
    Export {
        /// Output directory
        #[arg(long, default_value = "dossiers")]
        out_dir: PathBuf,
    },
    /// Export canonical JSON Schemas
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand)]
enum DocumentCommands {
    /// Register an ordinance or resolution
    Register {
        /// ordinance or resolution
        #[arg(long)]
        kind: String,
        #[arg(long)]
        title: String,
    },
    /// Attach a supporting document (file) to a legislative record
    Attach {
        document_id: i64,
        file: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// List a record's attachments
    Attachments { document_id: i64 },
    /// Remove an attachment (deletes the stored file, then the row)
    Detach { attachment_id: i64 },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for canonical types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

#[derive(Debug, Deserialize, Default)]
struct Config {
    #[serde(default)]
    storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
struct StorageConfig {
    #[serde(default = "default_db_path")]
    db_path: String,
    #[serde(default = "default_attachments_dir")]
    attachments_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            attachments_dir: default_attachments_dir(),
        }
    }
}

fn default_db_path() -> String {
    "ordtrack.db".to_string()
}

fn default_attachments_dir() -> PathBuf {
    PathBuf::from("attachments")
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config at {}", path.display()))?;
    let config = toml::from_str(&raw)
        .with_context(|| format!("Invalid config at {}", path.display()))?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let db_path = cli.db.clone().unwrap_or(config.storage.db_path.clone());

    // The session layer's role gate: anything outside the closed role set
    // never reaches the engine.
    let role = ActorRole::parse(&cli.role).ok_or_else(|| {
        anyhow!(
            "Unknown role '{}': expected super_admin, admin, or councilor",
            cli.role
        )
    })?;
    let actor = ActorContext::new(cli.actor.clone(), role);

    match cli.command {
        Commands::Document { command } => match command {
            DocumentCommands::Register { kind, title } => {
                let kind = DocumentKind::parse(&kind)
                    .ok_or_else(|| anyhow!("Unknown kind '{kind}': expected ordinance or resolution"))?;
                let mut conn = db::open(&db_path)?;
                let doc = documents::register_document(&mut conn, kind, &title, &actor)?;
                println!("Registered {} {}: {}", doc.kind, doc.number, doc.title);
            }
            DocumentCommands::Attach {
                document_id,
                file,
                content_type,
            } => {
                let bytes = fs::read(&file)
                    .with_context(|| format!("Cannot read {}", file.display()))?;
                let file_name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| anyhow!("Bad file name: {}", file.display()))?;
                let mut conn = db::open(&db_path)?;
                let store = documents::FsFileStore::new(&config.storage.attachments_dir);
                let attachment = documents::attach_supporting_document(
                    &mut conn,
                    &store,
                    document_id,
                    file_name,
                    content_type.as_deref(),
                    &bytes,
                    &actor,
                )?;
                println!(
                    "Attached {} ({} bytes) as #{}",
                    attachment.file_name, attachment.size_bytes, attachment.id
                );
            }
            DocumentCommands::Attachments { document_id } => {
                let conn = db::open(&db_path)?;
                let attachments = documents::list_supporting_documents(&conn, document_id)?;
                if attachments.is_empty() {
                    println!("No attachments.");
                }
                for a in attachments {
                    println!(
                        "#{} {} ({} bytes, uploaded by {} at {})",
                        a.id, a.file_name, a.size_bytes, a.uploaded_by, a.uploaded_at
                    );
                }
            }
            DocumentCommands::Detach { attachment_id } => {
                let mut conn = db::open(&db_path)?;
                let store = documents::FsFileStore::new(&config.storage.attachments_dir);
                documents::remove_supporting_document(&mut conn, &store, attachment_id, &actor)?;
                println!("Removed attachment #{attachment_id}");
            }
        },
        Commands::File {
            title,
            description,
            document,
            priority,
            submit,
        } => {
            let priority = Priority::parse(&priority).ok_or_else(|| {
                anyhow!("Unknown priority '{priority}': expected low, medium, high, or urgent")
            })?;
            let mut conn = db::open(&db_path)?;
            let amendment = workflow::file_amendment(
                &mut conn,
                &NewAmendment {
                    title: &title,
                    description: &description,
                    document_id: document,
                    priority,
                    submit,
                },
                &actor,
            )?;
            println!(
                "Filed {} ({}): {}",
                amendment.amendment_number, amendment.status, amendment.title
            );
        }
        Commands::Decide {
            amendment_id,
            action,
            comments,
        } => {
            let action = workflow::parse_action(&action)?;
            let mut conn = db::open(&db_path)?;
            let amendment = workflow::submit_decision(
                &mut conn,
                amendment_id,
                action,
                &actor,
                comments.as_deref(),
            )?;
            println!(
                "Amendment {} is now {}",
                amendment.amendment_number, amendment.status
            );
        }
        Commands::Vote {
            amendment_id,
            voter,
            choice,
        } => {
            let choice = VoteChoice::parse(&choice)
                .ok_or_else(|| anyhow!("Unknown choice '{choice}': expected yes, no, or abstain"))?;
            let mut conn = db::open(&db_path)?;
            workflow::cast_vote(&mut conn, amendment_id, &voter, choice, &actor)?;
            println!("Recorded {} vote by {voter}", choice.as_str());
        }
        Commands::List { status, search } => {
            let status = StatusFilter::parse(&status).ok_or_else(|| {
                anyhow!("Unknown status '{status}': expected all, draft, pending, approved, or rejected")
            })?;
            let conn = db::open(&db_path)?;
            let summaries =
                workflow::list_amendments(&conn, &AmendmentFilter { status, search })?;
            if summaries.is_empty() {
                println!("No amendments.");
            }
            for s in summaries {
                println!(
                    "{} [{}] {} | {} {} | votes: {} yes / {} no / {} cast",
                    s.amendment.amendment_number,
                    s.amendment.status,
                    s.amendment.title,
                    s.document_kind,
                    s.document_number,
                    s.tally.yes,
                    s.tally.no,
                    s.tally.total
                );
            }
        }
        Commands::History { amendment_id } => {
            let conn = db::open(&db_path)?;
            let amendment = db::get_amendment(&conn, amendment_id)?;
            println!(
                "{} [{}] {}",
                amendment.amendment_number, amendment.status, amendment.title
            );

            let steps = workflow::workflow_history(&conn, amendment_id)?;
            if steps.is_empty() {
                println!("No workflow actions recorded.");
            }
            for step in steps {
                match step.comments {
                    Some(c) => println!(
                        "{} {} {} -> {}: {}",
                        step.created_at, step.actor, step.step, step.status_after, c
                    ),
                    None => println!(
                        "{} {} {} -> {}",
                        step.created_at, step.actor, step.step, step.status_after
                    ),
                }
            }

            for sig in workflow::signatures(&conn, amendment_id)? {
                println!(
                    "signature: {} ({}) {}",
                    sig.signatory,
                    sig.signatory_role.as_str(),
                    sig.outcome.as_str()
                );
            }
        }
        Commands::Stats => {
            let conn = db::open(&db_path)?;
            let stats = workflow::approval_statistics(&conn)?;
            println!("total:    {}", stats.total);
            println!("pending:  {}", stats.pending);
            println!("approved: {}", stats.approved);
            println!("rejected: {}", stats.rejected);
            println!("draft:    {}", stats.draft);
        }
        Commands::Audit { filter, limit } => {
            let conn = db::open(&db_path)?;
            let entries = audit::recent(&conn, filter.as_deref(), limit)?;
            if entries.is_empty() {
                println!("No audit entries.");
            }
            for e in entries {
                println!("{} {} [{}] {}", e.created_at, e.actor, e.action, e.description);
            }
        }
        Commands::Export { out_dir } => {
            let conn = db::open(&db_path)?;
            let written = dossier::build_dossiers(&conn, &out_dir)?;
            println!("Wrote {written} dossiers to {}", out_dir.display());
        }
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir)?,
        },
    }

    Ok(())
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    let amendment_schema = schema_for!(amendment_core::schema::Amendment);
    let amendment_json = serde_json::to_string_pretty(&amendment_schema)?;
    fs::write(out_dir.join("Amendment.schema.json"), amendment_json)?;

    let summary_schema = schema_for!(amendment_core::schema::AmendmentSummary);
    let summary_json = serde_json::to_string_pretty(&summary_schema)?;
    fs::write(out_dir.join("AmendmentSummary.schema.json"), summary_json)?;

    let audit_schema = schema_for!(amendment_core::schema::AuditLogEntry);
    let audit_json = serde_json::to_string_pretty(&audit_schema)?;
    fs::write(out_dir.join("AuditLogEntry.schema.json"), audit_json)?;

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}
