mod config;
mod error;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use access::{Access, ResolvedToken, Verifier};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use policy::{
    CalendarId, CalendarSettings, Capability, CapabilitySet, EventId, EventSnapshot,
    ExternalAttendeeId, ProposedEvent, TenantId, UserId,
};
use serde::de::DeserializeOwned;
use storage::{ExternalIdentity, IssuedToken, ManagementToken, TokenId, TokenScope, TokenStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "calgate.toml";

#[derive(Parser)]
#[command(name = "calgate")]
#[command(about = "Issue and check calendar management tokens", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Tenant (organization) every operation is scoped to
    #[arg(long)]
    tenant: TenantId,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue or re-issue a token
    Issue {
        #[command(subcommand)]
        recipe: Recipe,
    },
    /// Revoke a token permanently
    Revoke {
        #[arg(long)]
        token: TokenId,
    },
    /// List tokens on a calendar or event
    List {
        #[arg(long, conflicts_with = "event", required_unless_present = "event")]
        calendar: Option<CalendarId>,
        #[arg(long)]
        event: Option<EventId>,
        /// Include revoked tokens
        #[arg(long)]
        all: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Verify a bearer credential and show the token it resolves to
    Resolve {
        #[arg(long)]
        bearer: String,
    },
    /// Check whether a caller may apply an event change (omit --new to cancel)
    CheckUpdate {
        #[arg(long, conflicts_with = "user")]
        bearer: Option<String>,
        #[arg(long)]
        user: Option<UserId>,
        /// Current event state (JSON)
        #[arg(long)]
        old: PathBuf,
        /// Proposed event state (JSON)
        #[arg(long)]
        new: Option<PathBuf>,
    },
    /// Check whether a caller may create an event on a calendar
    CheckSchedule {
        #[arg(long, conflicts_with = "user")]
        bearer: Option<String>,
        #[arg(long)]
        user: Option<UserId>,
        #[arg(long)]
        calendar: CalendarId,
        /// The calendar accepts public scheduling
        #[arg(long)]
        public: bool,
        /// Proposed event (JSON)
        #[arg(long)]
        proposed: PathBuf,
    },
}

#[derive(Subcommand)]
enum Recipe {
    /// Calendar-scoped token for a calendar owner
    Owner {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        calendar: CalendarId,
        /// Override the default bundle (repeatable)
        #[arg(long = "capability")]
        capabilities: Vec<Capability>,
    },
    /// Event-scoped token for a registered attendee
    Attendee {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        event: EventId,
        #[arg(long = "capability")]
        capabilities: Vec<Capability>,
    },
    /// Event-scoped token for an external attendee
    ExternalUpdate {
        #[arg(long)]
        attendee: ExternalAttendeeId,
        #[arg(long)]
        email: String,
        #[arg(long)]
        event: EventId,
        #[arg(long = "capability")]
        capabilities: Vec<Capability>,
    },
    /// Calendar-scoped booking token for an external attendee
    ExternalSchedule {
        #[arg(long)]
        attendee: ExternalAttendeeId,
        #[arg(long)]
        email: String,
        #[arg(long)]
        calendar: CalendarId,
    },
}

/// Exit code for a check that ran and denied.
const DENIED: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    init_tracing(&config);

    let db_path = config
        .storage
        .path
        .clone()
        .or_else(|| dirs_data_dir().map(|d| d.join("tokens.db")))
        .unwrap_or_else(|| PathBuf::from(".calgate/tokens.db"));
    let tenant = cli.tenant;

    match cli.command {
        Commands::Issue { recipe } => {
            let store = create_store(&db_path, &config)?;
            cmd_issue(&store, tenant, recipe)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Revoke { token } => {
            let store = open_store(&db_path, &config)?;
            cmd_revoke(&store, tenant, token)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List {
            calendar,
            event,
            all,
            json,
        } => {
            let store = open_store(&db_path, &config)?;
            let scope = match (calendar, event) {
                (Some(calendar), _) => TokenScope::Calendar(calendar),
                (None, Some(event)) => TokenScope::Event(event),
                (None, None) => return Err(access::Error::MissingRequiredParameter.into()),
            };
            cmd_list(&store, tenant, scope, all, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve { bearer } => {
            let store = open_store(&db_path, &config)?;
            let access = Verifier::new(&store).authorize(&bearer, tenant)?;
            match access.token() {
                Some(token) => {
                    print_resolved(token);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("access denied");
                    Ok(ExitCode::from(DENIED))
                }
            }
        }
        Commands::CheckUpdate {
            bearer,
            user,
            old,
            new,
        } => {
            let store = open_store(&db_path, &config)?;
            let old_event: EventSnapshot = read_json(&old)?;
            let new_event = new
                .as_deref()
                .map(read_json::<EventSnapshot>)
                .transpose()?;
            let access = match (bearer, user) {
                (Some(bearer), _) => Verifier::new(&store).authorize(&bearer, tenant)?,
                (None, Some(user)) => authorize_user_for_event(&store, user, tenant, &old_event)?,
                (None, None) => Access::Anonymous,
            };
            Ok(cmd_check_update(&access, &old_event, new_event.as_ref()))
        }
        Commands::CheckSchedule {
            bearer,
            user,
            calendar,
            public,
            proposed,
        } => {
            let proposed: ProposedEvent = read_json(&proposed)?;
            let settings = CalendarSettings {
                accepts_public_scheduling: public,
                ..Default::default()
            };
            let access = match (bearer, user) {
                (Some(bearer), _) => {
                    let store = open_store(&db_path, &config)?;
                    Verifier::new(&store).authorize(&bearer, tenant)?
                }
                (None, Some(user)) => {
                    let store = open_store(&db_path, &config)?;
                    Verifier::new(&store).authorize_user(user, tenant, None, Some(calendar))?
                }
                (None, None) => Access::Anonymous,
            };
            let allowed = access.can_perform_scheduling(calendar, &settings, &proposed);
            println!("{}", if allowed { "allow" } else { "deny" });
            Ok(exit_for(allowed))
        }
    }
}

fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_issue(store: &TokenStore, tenant: TenantId, recipe: Recipe) -> Result<()> {
    let issued = match recipe {
        Recipe::Owner {
            user,
            calendar,
            capabilities,
        } => store.issue_owner_token(tenant, user, calendar, override_set(capabilities))?,
        Recipe::Attendee {
            user,
            event,
            capabilities,
        } => store.issue_attendee_token(tenant, user, event, override_set(capabilities))?,
        Recipe::ExternalUpdate {
            attendee,
            email,
            event,
            capabilities,
        } => store.issue_external_update_token(
            tenant,
            ExternalIdentity::new(attendee, email),
            event,
            override_set(capabilities),
        )?,
        Recipe::ExternalSchedule {
            attendee,
            email,
            calendar,
        } => store.issue_external_schedule_token(
            tenant,
            ExternalIdentity::new(attendee, email),
            calendar,
        )?,
    };
    print_issued(&issued);
    Ok(())
}

/// No flags means "use the configured default bundle".
fn override_set(capabilities: Vec<Capability>) -> Option<CapabilitySet> {
    if capabilities.is_empty() {
        None
    } else {
        Some(capabilities.into())
    }
}

fn cmd_revoke(store: &TokenStore, tenant: TenantId, id: TokenId) -> Result<()> {
    let token = store.revoke(tenant, id).map_err(|e| match e {
        storage::Error::NotFound(_) => Error::TokenNotFound { id: id.to_string() },
        other => other.into(),
    })?;
    info!(tenant = %tenant, token = %id, "revoke requested from cli");
    if let Some(at) = token.revoked_at {
        println!("Token {id} revoked at {}", format_time(at));
    }
    Ok(())
}

fn cmd_list(
    store: &TokenStore,
    tenant: TenantId,
    scope: TokenScope,
    include_revoked: bool,
    json: bool,
) -> Result<()> {
    let tokens = store.list_for_scope(tenant, scope, include_revoked)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
        return Ok(());
    }

    if tokens.is_empty() {
        println!("No tokens found on {scope}.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<22}  {:<16}  {:<8}  CAPABILITIES",
        "TOKEN ID", "SUBJECT", "CREATED", "STATUS"
    );
    println!("{}", "-".repeat(110));

    for token in &tokens {
        println!(
            "{:<36}  {:<22}  {:<16}  {:<8}  {}",
            token.id,
            subject_label(token),
            format_time(token.created_at),
            if token.is_revoked() { "revoked" } else { "active" },
            token.capabilities
        );
    }

    Ok(())
}

fn cmd_check_update(
    access: &Access,
    old: &EventSnapshot,
    new: Option<&EventSnapshot>,
) -> ExitCode {
    if let Ok(required) = access.required_capabilities(old, new) {
        println!("required: {required}");
    }
    let allowed = access.can_perform_update(old, new);
    println!("{}", if allowed { "allow" } else { "deny" });
    exit_for(allowed)
}

/// Event-scoped grant first, then the owner grant on the event's calendar.
fn authorize_user_for_event(
    store: &TokenStore,
    user: UserId,
    tenant: TenantId,
    event: &EventSnapshot,
) -> Result<Access> {
    let verifier = Verifier::new(store);
    let access = verifier.authorize_user(user, tenant, Some(event.id), None)?;
    if access.is_granted() {
        return Ok(access);
    }
    Ok(verifier.authorize_user(user, tenant, None, Some(event.calendar_id))?)
}

fn exit_for(allowed: bool) -> ExitCode {
    if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(DENIED)
    }
}

fn print_issued(issued: &IssuedToken) {
    let token = &issued.token;
    println!("Token:        {}", token.id);
    println!("Scope:        {}", token.scope);
    println!("Subject:      {}", subject_label(token));
    println!("Capabilities: {}", token.capabilities);
    match issued.bearer() {
        Some(bearer) => {
            println!("Bearer:       {bearer}");
            println!("\nStore the bearer credential now; it cannot be shown again.");
        }
        None => println!("Bearer:       none (resolved through the owner's user identity)"),
    }
}

fn print_resolved(token: &ResolvedToken) {
    println!("Token:        {}", token.id());
    println!("Scope:        {}", token.scope());
    println!(
        "Subject:      {}",
        token
            .subject()
            .map_or_else(|| "anonymous".to_string(), |s| s.to_string())
    );
    println!("Capabilities: {}", token.capabilities());
}

fn subject_label(token: &ManagementToken) -> String {
    match (&token.subject, token.external_attendee()) {
        (_, Some(identity)) => format!("{} <{}>", identity.id, identity.email),
        (Some(subject), None) => subject.to_string(),
        (None, None) => "anonymous".to_string(),
    }
}

fn format_time(at: chrono::DateTime<chrono::Utc>) -> String {
    Local
        .from_utc_datetime(&at.naive_utc())
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| Error::Snapshot {
        path: path.to_path_buf(),
        source,
    })
}

fn create_store(db_path: &Path, config: &Config) -> Result<TokenStore> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(TokenStore::open(db_path)?.with_bundles(config.defaults.clone()))
}

fn open_store(db_path: &Path, config: &Config) -> Result<TokenStore> {
    if !db_path.exists() {
        return Err(Error::DatabaseNotFound {
            path: db_path.to_path_buf(),
        });
    }
    Ok(TokenStore::open(db_path)?.with_bundles(config.defaults.clone()))
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/calgate"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("calgate"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("calgate"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
