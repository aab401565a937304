//! Local development harness.
//!
//! Drives the agent from stdin with the keyword classifier and a demo
//! operation registry, so the whole turn pipeline can be exercised without
//! any channel provider. This is not a transport: real deployments feed
//! [`voltaic_agent::Agent::handle_message`] from their channel adapters.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use {
    async_trait::async_trait,
    clap::Parser,
    serde_json::json,
    tracing::info,
    tracing_subscriber::EnvFilter,
};

use {
    voltaic_agent::{Agent, AgentDeps},
    voltaic_classifier::{ClassifierHandle, KeywordClassifier},
    voltaic_common::types::{ChannelType, InboundMessage, MediaRef, MessageKind},
    voltaic_config::VoltaicConfig,
    voltaic_identity::{IdentityDirectory, SqliteIdentityDirectory},
    voltaic_media::{FsBlobStore, MediaFetcher, SqliteAttachmentStore},
    voltaic_registry::{
        OperationError, OperationRegistry, OrgMembership, Role, StaticUserDirectory, UserRecord,
    },
    voltaic_sessions::{SessionLocks, SqliteSessionStore, TranscriptLog},
};

const DEMO_USER: &str = "demo-user";
const DEMO_ORG: &str = "demo-org";

#[derive(Parser)]
#[command(name = "voltaic", about = "Local development harness for the voltaic agent")]
struct Cli {
    /// Config file path. Standard locations are searched when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// State directory for the database, blobs, and transcripts.
    #[arg(long, default_value = ".voltaic", env = "VOLTAIC_STATE_DIR")]
    state_dir: PathBuf,

    /// Sender identifier to simulate (auto-verified on startup).
    #[arg(long, default_value = "+15550100")]
    sender: String,
}

/// Treats the media URL as a local file path. Dev harness only.
struct LocalFileFetcher;

#[async_trait]
impl MediaFetcher for LocalFileFetcher {
    async fn fetch(&self, media: &MediaRef) -> anyhow::Result<Vec<u8>> {
        let path = media.url.strip_prefix("file://").unwrap_or(&media.url);
        Ok(tokio::fs::read(path).await?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => voltaic_config::load_config(path)?,
        None => voltaic_config::discover_and_load(),
    };

    let agent = build_agent(&cli, &config).await?;
    info!(sender = %cli.sender, "harness ready");

    println!("voltaic dev harness — type a message, `upload <path>` to send a file, `quit` to exit");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }

        let msg = if let Some(path) = line.strip_prefix("upload ") {
            upload_message(&cli.sender, path.trim())
        } else {
            InboundMessage::text(ChannelType::Whatsapp, cli.sender.clone(), line)
        };

        let response = agent.handle_message(&msg).await;
        println!("agent> {}", response.message);
        if let Some(prompt) = &response.confirmation_prompt {
            println!("agent> {prompt}");
        }
        if let Some(data) = &response.data {
            println!("data>  {data}");
        }
        io::stdout().flush()?;
    }

    Ok(())
}

fn upload_message(sender: &str, path: &str) -> InboundMessage {
    let filename = PathBuf::from(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    InboundMessage {
        kind: MessageKind::Document,
        media: Some(MediaRef {
            url: path.to_string(),
            content_type: None,
            filename,
        }),
        text: None,
        ..InboundMessage::text(ChannelType::Whatsapp, sender, "")
    }
}

async fn build_agent(cli: &Cli, config: &VoltaicConfig) -> anyhow::Result<Agent> {
    let state_dir = &cli.state_dir;
    tokio::fs::create_dir_all(state_dir).await?;

    let db_path = config
        .storage
        .db_path
        .clone()
        .unwrap_or_else(|| state_dir.join("voltaic.db"));
    let options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true);
    let pool = sqlx::SqlitePool::connect_with(options).await?;

    SqliteIdentityDirectory::init_schema(&pool).await?;
    SqliteSessionStore::init_schema(&pool).await?;
    SqliteAttachmentStore::init_schema(&pool).await?;

    // Seed the simulated sender as a verified, linked contact.
    let identities = Arc::new(SqliteIdentityDirectory::new(pool.clone()));
    identities
        .record_first_contact(ChannelType::Whatsapp, &cli.sender, Some("Dev User"))
        .await?;
    identities
        .link_user(ChannelType::Whatsapp, &cli.sender, DEMO_USER)
        .await?;
    identities
        .mark_verified(ChannelType::Whatsapp, &cli.sender)
        .await?;

    let mut users = StaticUserDirectory::new();
    users.insert(UserRecord {
        id: DEMO_USER.into(),
        display_name: Some("Dev User".into()),
        default_org_id: Some(DEMO_ORG.into()),
        memberships: vec![OrgMembership {
            org_id: DEMO_ORG.into(),
            org_name: Some("Demo Portfolio".into()),
            role: Role::Admin,
        }],
        active: true,
    });
    let users = Arc::new(users);

    let registry = Arc::new(demo_registry(users.clone()));

    let blob_dir = config
        .storage
        .blob_dir
        .clone()
        .unwrap_or_else(|| state_dir.join("blobs"));
    let transcript_dir = config
        .storage
        .transcript_dir
        .clone()
        .unwrap_or_else(|| state_dir.join("transcripts"));

    let deps = AgentDeps {
        identities,
        users,
        registry,
        classifier: ClassifierHandle::new(
            Arc::new(KeywordClassifier::new()),
            Duration::from_secs(config.classifier.timeout_secs),
        ),
        sessions: SqliteSessionStore::new(pool.clone()),
        locks: SessionLocks::new(),
        transcript: TranscriptLog::new(transcript_dir),
        attachments: SqliteAttachmentStore::new(pool),
        blobs: Arc::new(FsBlobStore::new(blob_dir)),
        fetcher: Arc::new(LocalFileFetcher),
    };

    Ok(Agent::new(deps, &config.agent)?)
}

/// Echo-style handlers standing in for the business operation surface.
fn demo_registry(users: Arc<StaticUserDirectory>) -> OperationRegistry {
    let mut registry = OperationRegistry::new(users);

    registry.register("projects.status", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_read(&org) {
            return Err(OperationError::forbidden("no membership"));
        }
        Ok(json!({
            "id": input["project_id"],
            "status": "operational",
            "open_work_orders": 1,
        }))
    });

    registry.register("documents.search", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_read(&org) {
            return Err(OperationError::forbidden("no membership"));
        }
        Ok(json!({"query": input["query"], "hits": []}))
    });

    registry.register("diligence.summary", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_read(&org) {
            return Err(OperationError::forbidden("no membership"));
        }
        Ok(json!({"open_items": 3, "overdue": 1}))
    });

    registry.register("work_orders.create", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_write(&org) {
            return Err(OperationError::forbidden("read-only access"));
        }
        Ok(json!({
            "id": format!("wo-{}", &uuid_fragment()),
            "description": input["description"],
        }))
    });

    registry.register("datarooms.generate", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_write(&org) {
            return Err(OperationError::forbidden("read-only access"));
        }
        Ok(json!({"id": format!("dr-{}", &uuid_fragment()), "project_id": input["project_id"]}))
    });

    registry.register("attachments.link", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_write(&org) {
            return Err(OperationError::forbidden("read-only access"));
        }
        Ok(json!({"linked": true, "target_id": input["target_id"]}))
    });

    registry
}

fn uuid_fragment() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}
