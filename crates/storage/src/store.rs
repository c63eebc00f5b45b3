//! SQLite token store implementation.

use crate::secret::{generate_secret, hash_secret};
use crate::{
    Error, ExternalIdentity, IssuedToken, ManagementToken, Result, Subject, TokenId, TokenScope,
};
use chrono::{DateTime, Utc};
use policy::{
    Bundles, CalendarId, Capability, CapabilitySet, EventId, ExternalAttendeeId, TenantId, UserId,
    external_schedule_bundle,
};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::Path;
use tracing::{debug, info};

const TOKEN_COLUMNS: &str = "id, tenant_id, calendar_id, event_id, user_id, \
     external_attendee_id, external_attendee_email, secret_hash, created_at, revoked_at";

/// SQLite-backed store of management tokens.
///
/// Every query is scoped by tenant. Tokens are never deleted.
pub struct TokenStore {
    conn: Connection,
    bundles: Bundles,
}

impl TokenStore {
    /// Open or create a token store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory token store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn,
            bundles: Bundles::default(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Replace the default capability bundles used when issuance callers
    /// don't supply their own set.
    pub fn with_bundles(mut self, bundles: Bundles) -> Self {
        self.bundles = bundles;
        self
    }

    pub fn bundles(&self) -> &Bundles {
        &self.bundles
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS management_tokens (
                id TEXT PRIMARY KEY,
                tenant_id INTEGER NOT NULL,
                calendar_id INTEGER,
                event_id INTEGER,
                user_id INTEGER,
                external_attendee_id INTEGER,
                external_attendee_email TEXT,
                secret_hash TEXT,
                created_at TEXT NOT NULL,
                revoked_at TEXT,
                CHECK ((calendar_id IS NULL) <> (event_id IS NULL)),
                CHECK (user_id IS NULL OR external_attendee_id IS NULL),
                CHECK ((external_attendee_id IS NULL) = (external_attendee_email IS NULL))
            );
            CREATE INDEX IF NOT EXISTS idx_tokens_calendar
                ON management_tokens(tenant_id, calendar_id);
            CREATE INDEX IF NOT EXISTS idx_tokens_event
                ON management_tokens(tenant_id, event_id);

            CREATE TABLE IF NOT EXISTS token_capabilities (
                token_id TEXT NOT NULL REFERENCES management_tokens(id),
                tenant_id INTEGER NOT NULL,
                capability TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (token_id, capability)
            );

            CREATE TRIGGER IF NOT EXISTS revocation_is_final
                BEFORE UPDATE OF revoked_at ON management_tokens
                WHEN OLD.revoked_at IS NOT NULL
            BEGIN
                SELECT RAISE(ABORT, 'revoked_at cannot change once set');
            END;
            "#,
        )?;
        Ok(())
    }

    /// Issue (or re-issue) a calendar-scoped token for a calendar owner.
    ///
    /// Owner tokens carry no secret; they are resolved through the
    /// authenticated user lookup.
    pub fn issue_owner_token(
        &self,
        tenant: TenantId,
        user: UserId,
        calendar: CalendarId,
        capabilities: Option<CapabilitySet>,
    ) -> Result<IssuedToken> {
        let capabilities = capabilities.unwrap_or_else(|| self.bundles.owner.clone());
        self.issue(
            tenant,
            TokenScope::Calendar(calendar),
            Some(Subject::user(user)),
            capabilities,
            false,
        )
    }

    /// Issue (or re-issue) an event-scoped token for a registered attendee.
    pub fn issue_attendee_token(
        &self,
        tenant: TenantId,
        user: UserId,
        event: EventId,
        capabilities: Option<CapabilitySet>,
    ) -> Result<IssuedToken> {
        let capabilities = capabilities.unwrap_or_else(|| self.bundles.attendee.clone());
        self.issue(
            tenant,
            TokenScope::Event(event),
            Some(Subject::user(user)),
            capabilities,
            true,
        )
    }

    /// Issue (or re-issue) an event-scoped token for an external attendee.
    pub fn issue_external_update_token(
        &self,
        tenant: TenantId,
        attendee: ExternalIdentity,
        event: EventId,
        capabilities: Option<CapabilitySet>,
    ) -> Result<IssuedToken> {
        let capabilities = capabilities.unwrap_or_else(|| self.bundles.external_attendee.clone());
        self.issue(
            tenant,
            TokenScope::Event(event),
            Some(Subject::ExternalAttendee(attendee)),
            capabilities,
            true,
        )
    }

    /// Issue (or re-issue) a calendar-scoped token that lets an external
    /// party book events on the calendar. Always exactly `{Create}`.
    pub fn issue_external_schedule_token(
        &self,
        tenant: TenantId,
        attendee: ExternalIdentity,
        calendar: CalendarId,
    ) -> Result<IssuedToken> {
        self.issue(
            tenant,
            TokenScope::Calendar(calendar),
            Some(Subject::ExternalAttendee(attendee)),
            external_schedule_bundle(),
            true,
        )
    }

    /// Issue an owner token for every owner lacking an active one.
    ///
    /// Existing tokens keep their capability sets. Returns only newly issued
    /// tokens.
    pub fn ensure_owner_tokens(
        &self,
        tenant: TenantId,
        calendar: CalendarId,
        owners: &[UserId],
    ) -> Result<Vec<IssuedToken>> {
        let scope = TokenScope::Calendar(calendar);
        let mut issued = Vec::new();
        for owner in owners {
            if self.find_active(tenant, scope, Some(&Subject::user(*owner)))?.is_none() {
                issued.push(self.issue_owner_token(tenant, *owner, calendar, None)?);
            }
        }
        Ok(issued)
    }

    /// Issue an attendee token for every attendee of `event` lacking an
    /// active one.
    pub fn ensure_attendee_tokens(
        &self,
        tenant: TenantId,
        event: EventId,
        users: &[UserId],
        external: &[ExternalIdentity],
    ) -> Result<Vec<IssuedToken>> {
        let scope = TokenScope::Event(event);
        let mut issued = Vec::new();
        for user in users {
            if self.find_active(tenant, scope, Some(&Subject::user(*user)))?.is_none() {
                issued.push(self.issue_attendee_token(tenant, *user, event, None)?);
            }
        }
        for attendee in external {
            let subject = Subject::ExternalAttendee(attendee.clone());
            if self.find_active(tenant, scope, Some(&subject))?.is_none() {
                issued.push(self.issue_external_update_token(
                    tenant,
                    attendee.clone(),
                    event,
                    None,
                )?);
            }
        }
        Ok(issued)
    }

    fn issue(
        &self,
        tenant: TenantId,
        scope: TokenScope,
        subject: Option<Subject>,
        capabilities: CapabilitySet,
        with_secret: bool,
    ) -> Result<IssuedToken> {
        if capabilities.is_empty() {
            return Err(Error::NoPermissionsSpecified);
        }

        let secret = with_secret.then(generate_secret);
        let secret_hash = secret.as_deref().map(hash_secret);

        let tx = self.conn.unchecked_transaction()?;
        let existing = find_active(&tx, tenant, scope, subject.as_ref())?;
        let reissued = existing.is_some();

        let id = match existing {
            Some(token) => {
                if with_secret {
                    tx.execute(
                        "UPDATE management_tokens SET secret_hash = ?1 WHERE id = ?2",
                        params![secret_hash, token.id.to_string()],
                    )?;
                }
                if let Some(identity) = subject.as_ref().and_then(Subject::external) {
                    tx.execute(
                        "UPDATE management_tokens SET external_attendee_email = ?1 WHERE id = ?2",
                        params![identity.email, token.id.to_string()],
                    )?;
                }
                token.id
            }
            None => {
                let id = TokenId::new();
                let external = subject.as_ref().and_then(Subject::external);
                tx.execute(
                    "INSERT INTO management_tokens (id, tenant_id, calendar_id, event_id, user_id, \
                     external_attendee_id, external_attendee_email, secret_hash, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        id.to_string(),
                        tenant.0,
                        scope.calendar_id().map(|c| c.0),
                        scope.event_id().map(|e| e.0),
                        subject.as_ref().and_then(Subject::user_id).map(|u| u.0),
                        external.map(|e| e.id.0),
                        external.map(|e| e.email.as_str()),
                        secret_hash,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                id
            }
        };

        replace_capabilities(&tx, tenant, id, &capabilities)?;
        tx.commit()?;

        let subject_label = subject
            .as_ref()
            .map_or_else(|| "anonymous".to_string(), Subject::to_string);
        info!(
            tenant = %tenant,
            token = %id,
            scope = %scope,
            subject = %subject_label,
            capabilities = %capabilities,
            reissued,
            "issued management token"
        );

        let token = self
            .get(tenant, id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(IssuedToken { token, secret })
    }

    /// Replace the capability set of an active token wholesale.
    pub fn set_capabilities(
        &self,
        tenant: TenantId,
        id: TokenId,
        capabilities: &CapabilitySet,
    ) -> Result<ManagementToken> {
        if capabilities.is_empty() {
            return Err(Error::NoPermissionsSpecified);
        }
        let token = self
            .get(tenant, id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if token.is_revoked() {
            return Err(Error::Revoked(id));
        }

        let tx = self.conn.unchecked_transaction()?;
        replace_capabilities(&tx, tenant, id, capabilities)?;
        tx.commit()?;

        info!(tenant = %tenant, token = %id, capabilities = %capabilities, "replaced token capabilities");
        self.get(tenant, id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Fetch a token by id, including revoked tokens.
    pub fn get(&self, tenant: TenantId, id: TokenId) -> Result<Option<ManagementToken>> {
        debug!(tenant = %tenant, token = %id, "looking up token");
        let sql =
            format!("SELECT {TOKEN_COLUMNS} FROM management_tokens WHERE tenant_id = ?1 AND id = ?2");
        let row = self
            .conn
            .query_row(&sql, params![tenant.0, id.to_string()], TokenRow::from_row)
            .optional()?;
        row.map(|r| load_token(&self.conn, r)).transpose()
    }

    /// The active token bound to exactly `(scope, subject)`, if any.
    ///
    /// `subject = None` matches only tokens with no bound identity.
    pub fn find_active(
        &self,
        tenant: TenantId,
        scope: TokenScope,
        subject: Option<&Subject>,
    ) -> Result<Option<ManagementToken>> {
        find_active(&self.conn, tenant, scope, subject)
    }

    /// The active token a registered user holds on `scope`, if any.
    pub fn find_active_for_user(
        &self,
        tenant: TenantId,
        user: UserId,
        scope: TokenScope,
    ) -> Result<Option<ManagementToken>> {
        self.find_active(tenant, scope, Some(&Subject::user(user)))
    }

    /// All tokens on `scope`, oldest first.
    pub fn list_for_scope(
        &self,
        tenant: TenantId,
        scope: TokenScope,
        include_revoked: bool,
    ) -> Result<Vec<ManagementToken>> {
        let (column, scope_id) = scope_column(scope);
        let revoked_sql = if include_revoked {
            ""
        } else {
            " AND revoked_at IS NULL"
        };
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM management_tokens \
             WHERE tenant_id = ?1 AND {column} = ?2{revoked_sql} ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![tenant.0, scope_id], TokenRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|row| load_token(&self.conn, row))
            .collect()
    }

    /// Revoke a token. Revoking an already revoked token is a no-op and keeps
    /// the first timestamp.
    pub fn revoke(&self, tenant: TenantId, id: TokenId) -> Result<ManagementToken> {
        let changed = self.conn.execute(
            "UPDATE management_tokens SET revoked_at = ?1 \
             WHERE tenant_id = ?2 AND id = ?3 AND revoked_at IS NULL",
            params![Utc::now().to_rfc3339(), tenant.0, id.to_string()],
        )?;
        if changed > 0 {
            info!(tenant = %tenant, token = %id, "revoked management token");
        }
        self.get(tenant, id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Revoke every active token on `scope`, e.g. when the event is cancelled.
    /// Returns how many tokens were revoked.
    pub fn revoke_scope(&self, tenant: TenantId, scope: TokenScope) -> Result<usize> {
        let (column, scope_id) = scope_column(scope);
        let sql = format!(
            "UPDATE management_tokens SET revoked_at = ?1 \
             WHERE tenant_id = ?2 AND {column} = ?3 AND revoked_at IS NULL"
        );
        let changed = self
            .conn
            .execute(&sql, params![Utc::now().to_rfc3339(), tenant.0, scope_id])?;
        info!(tenant = %tenant, scope = %scope, revoked = changed, "revoked tokens on scope");
        Ok(changed)
    }
}

fn scope_column(scope: TokenScope) -> (&'static str, i64) {
    match scope {
        TokenScope::Calendar(id) => ("calendar_id", id.0),
        TokenScope::Event(id) => ("event_id", id.0),
    }
}

fn find_active(
    conn: &Connection,
    tenant: TenantId,
    scope: TokenScope,
    subject: Option<&Subject>,
) -> Result<Option<ManagementToken>> {
    let (column, scope_id) = scope_column(scope);
    let mut values = vec![tenant.0, scope_id];
    let subject_sql = match subject {
        None => "user_id IS NULL AND external_attendee_id IS NULL",
        Some(Subject::User { id }) => {
            values.push(id.0);
            "user_id = ?"
        }
        Some(Subject::ExternalAttendee(identity)) => {
            values.push(identity.id.0);
            "external_attendee_id = ?"
        }
    };
    let sql = format!(
        "SELECT {TOKEN_COLUMNS} FROM management_tokens \
         WHERE tenant_id = ? AND {column} = ? AND {subject_sql} AND revoked_at IS NULL \
         ORDER BY created_at DESC LIMIT 1"
    );
    let row = conn
        .query_row(&sql, params_from_iter(values), TokenRow::from_row)
        .optional()?;
    row.map(|r| load_token(conn, r)).transpose()
}

fn replace_capabilities(
    conn: &Connection,
    tenant: TenantId,
    id: TokenId,
    capabilities: &CapabilitySet,
) -> Result<()> {
    conn.execute(
        "DELETE FROM token_capabilities WHERE token_id = ?1",
        params![id.to_string()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO token_capabilities (token_id, tenant_id, capability, position) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, capability) in capabilities.iter().enumerate() {
        stmt.execute(params![
            id.to_string(),
            tenant.0,
            capability.as_str(),
            position as i64
        ])?;
    }
    Ok(())
}

/// Raw column values, validated in [`TokenRow::into_token`].
struct TokenRow {
    id: String,
    tenant_id: i64,
    calendar_id: Option<i64>,
    event_id: Option<i64>,
    user_id: Option<i64>,
    external_attendee_id: Option<i64>,
    external_attendee_email: Option<String>,
    secret_hash: Option<String>,
    created_at: String,
    revoked_at: Option<String>,
}

impl TokenRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            calendar_id: row.get(2)?,
            event_id: row.get(3)?,
            user_id: row.get(4)?,
            external_attendee_id: row.get(5)?,
            external_attendee_email: row.get(6)?,
            secret_hash: row.get(7)?,
            created_at: row.get(8)?,
            revoked_at: row.get(9)?,
        })
    }

    fn into_token(self, capabilities: CapabilitySet) -> Result<ManagementToken> {
        let corrupt = |what: &str| Error::Corrupt(format!("{}: {what}", self.id));

        let id: TokenId = self.id.parse().map_err(|_| corrupt("malformed id"))?;
        let scope = match (self.calendar_id, self.event_id) {
            (Some(calendar), None) => TokenScope::Calendar(CalendarId(calendar)),
            (None, Some(event)) => TokenScope::Event(EventId(event)),
            _ => return Err(corrupt("scope must be exactly one of calendar or event")),
        };
        let subject = match (
            self.user_id,
            self.external_attendee_id,
            &self.external_attendee_email,
        ) {
            (None, None, None) => None,
            (Some(user), None, None) => Some(Subject::user(UserId(user))),
            (None, Some(attendee), Some(email)) => Some(Subject::ExternalAttendee(
                ExternalIdentity::new(ExternalAttendeeId(attendee), email.clone()),
            )),
            _ => return Err(corrupt("conflicting subject columns")),
        };
        let created_at = parse_timestamp(&self.created_at).ok_or_else(|| corrupt("created_at"))?;
        let revoked_at = match &self.revoked_at {
            Some(ts) => Some(parse_timestamp(ts).ok_or_else(|| corrupt("revoked_at"))?),
            None => None,
        };

        Ok(ManagementToken {
            id,
            tenant_id: TenantId(self.tenant_id),
            scope,
            subject,
            secret_hash: self.secret_hash,
            created_at,
            revoked_at,
            capabilities,
        })
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    value.parse().ok()
}

fn load_token(conn: &Connection, row: TokenRow) -> Result<ManagementToken> {
    let mut stmt = conn.prepare_cached(
        "SELECT capability FROM token_capabilities \
         WHERE token_id = ?1 AND tenant_id = ?2 ORDER BY position",
    )?;
    let names = stmt
        .query_map(params![row.id, row.tenant_id], |r| r.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let capabilities = names
        .iter()
        .map(|name| {
            name.parse::<Capability>()
                .map_err(|e| Error::Corrupt(format!("{}: {e}", row.id)))
        })
        .collect::<Result<CapabilitySet>>()?;
    row.into_token(capabilities)
}
