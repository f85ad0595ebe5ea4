//! Statement construction
//!
//! Every statement the storage layer runs is built here from the table
//! layout. Statements use positional `?` placeholders and carry an ordered
//! list of parameter sources, so binding is a lookup into the row plus, for
//! time-scoped statements, the instant the caller supplies.
//!
//! Identifiers are always quoted. Timestamps are bound as fixed-width text
//! so that `<=`/`>=` on the validity columns are chronological.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{StorageError, StorageResult};
use crate::fields::{FieldClassification, FieldKind, FieldNames};
use crate::value::{Row, Value};

/// Statement kinds cached per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Latest version of a record regardless of validity
    VersionSelect,
    /// Version whose interval contains an instant
    ActiveVersionSelect,
    /// New version row
    Insert,
    /// In-place update of update/lazy fields on a version
    Update,
    /// End the active interval at the incoming row's validFrom
    CloseActive,
    /// Refresh lastSeen on the active version
    UpdateLastSeen,
    /// End the active interval of a single record being purged
    PurgeOne,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::VersionSelect => "version_select",
            QueryKind::ActiveVersionSelect => "active_version_select",
            QueryKind::Insert => "insert",
            QueryKind::Update => "update",
            QueryKind::CloseActive => "close_active",
            QueryKind::UpdateLastSeen => "update_last_seen",
            QueryKind::PurgeOne => "purge_one",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a positional parameter takes its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Named field of the bound row
    Field(String),
    /// Instant supplied at execution time
    Instant,
    /// Purge cutoff supplied at execution time
    Cutoff,
}

/// A statement with its ordered parameter sources
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    kind: Option<QueryKind>,
    sql: String,
    params: Vec<Param>,
}

impl PreparedQuery {
    fn new(kind: Option<QueryKind>, sql: String, params: Vec<Param>) -> Self {
        Self { kind, sql, params }
    }

    /// Cache kind; `None` for one-off statements such as the purge scope
    pub fn kind(&self) -> Option<QueryKind> {
        self.kind
    }

    /// Label used in logs and error details
    pub fn label(&self) -> &'static str {
        self.kind.map_or("purge", |kind| kind.as_str())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Resolve parameters in placeholder order.
    ///
    /// Missing fields bind as null.
    pub fn bind(&self, row: &Row, instant: Option<DateTime<Utc>>) -> Vec<Value> {
        self.bind_with_cutoff(row, instant, None)
    }

    /// Resolve parameters, `Param::Cutoff` included.
    pub fn bind_with_cutoff(
        &self,
        row: &Row,
        instant: Option<DateTime<Utc>>,
        cutoff: Option<DateTime<Utc>>,
    ) -> Vec<Value> {
        self.params
            .iter()
            .map(|param| match param {
                Param::Field(name) => row.value(name).clone(),
                Param::Instant => Value::from(instant),
                Param::Cutoff => Value::from(cutoff),
            })
            .collect()
    }
}

/// Identifier quoting style of the target database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierQuote {
    /// `"name"`, standard SQL
    #[default]
    DoubleQuote,
    /// `` `name` ``, MySQL family
    Backtick,
}

impl IdentifierQuote {
    fn quote_char(&self) -> char {
        match self {
            IdentifierQuote::DoubleQuote => '"',
            IdentifierQuote::Backtick => '`',
        }
    }

    /// Quote an identifier, doubling embedded quote characters
    pub fn quote(&self, identifier: &str) -> String {
        let q = self.quote_char();
        let mut quoted = String::with_capacity(identifier.len() + 2);
        quoted.push(q);
        for c in identifier.chars() {
            if c == q {
                quoted.push(q);
            }
            quoted.push(c);
        }
        quoted.push(q);
        quoted
    }
}

/// Physical description of a versioned table
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub schema: Option<String>,
    pub table: String,
    pub quote: IdentifierQuote,
    pub fields: FieldClassification,
    pub names: FieldNames,
}

impl TableLayout {
    /// Fully qualified, quoted table path
    pub fn table_path(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", self.quote.quote(schema), self.quote.quote(&self.table)),
            None => self.quote.quote(&self.table),
        }
    }
}

/// Builds statements for one table layout
#[derive(Debug, Clone)]
pub struct QueryFactory {
    layout: TableLayout,
    table_path: String,
}

impl QueryFactory {
    pub fn new(layout: TableLayout) -> Self {
        let table_path = layout.table_path();
        Self { layout, table_path }
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// Build a cacheable statement
    pub fn build(&self, kind: QueryKind) -> StorageResult<PreparedQuery> {
        match kind {
            QueryKind::VersionSelect => Ok(self.version_select()),
            QueryKind::ActiveVersionSelect => Ok(self.active_version_select()),
            QueryKind::Insert => Ok(self.insert()),
            QueryKind::Update => Ok(self.update()),
            QueryKind::CloseActive => Ok(self.close_active(QueryKind::CloseActive)),
            QueryKind::UpdateLastSeen => self.update_last_seen(),
            QueryKind::PurgeOne => Ok(self.close_active(QueryKind::PurgeOne)),
        }
    }

    fn q(&self, identifier: &str) -> String {
        self.layout.quote.quote(identifier)
    }

    fn id_names(&self) -> Vec<&str> {
        self.layout.fields.names(FieldKind::Id)
    }

    /// `"a" = ? AND "b" = ?` over identifier fields
    fn id_predicate(&self, params: &mut Vec<Param>) -> String {
        self.id_names()
            .into_iter()
            .map(|name| {
                params.push(Param::Field(name.to_string()));
                format!("{} = ?", self.q(name))
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// `("validTo" >= ? OR "validTo" IS NULL)`
    fn open_at(&self) -> String {
        let valid_to = self.q(&self.layout.names.valid_to);
        format!("({} >= ? OR {} IS NULL)", valid_to, valid_to)
    }

    fn version_select(&self) -> PreparedQuery {
        let mut params = Vec::new();
        let ids = self.id_predicate(&mut params);
        let sql = [
            format!("SELECT * FROM {}", self.table_path),
            format!("WHERE {}", ids),
            format!("ORDER BY {} DESC", self.q(&self.layout.names.version)),
            "LIMIT 1".to_string(),
        ]
        .join("\n");
        PreparedQuery::new(Some(QueryKind::VersionSelect), sql, params)
    }

    fn active_version_select(&self) -> PreparedQuery {
        let mut params = Vec::new();
        let ids = self.id_predicate(&mut params);
        params.push(Param::Instant);
        params.push(Param::Instant);
        let sql = [
            format!("SELECT * FROM {}", self.table_path),
            format!("WHERE {}", ids),
            format!("AND {} <= ?", self.q(&self.layout.names.valid_from)),
            format!("AND {}", self.open_at()),
            format!("ORDER BY {} DESC", self.q(&self.layout.names.version)),
            "LIMIT 1".to_string(),
        ]
        .join("\n");
        PreparedQuery::new(Some(QueryKind::ActiveVersionSelect), sql, params)
    }

    fn insert(&self) -> PreparedQuery {
        let fields = &self.layout.fields;
        let names = &self.layout.names;
        let mut columns: Vec<&str> = Vec::new();
        for kind in [FieldKind::Id, FieldKind::Update, FieldKind::Compare, FieldKind::Lazy] {
            columns.extend(fields.names(kind));
        }
        columns.push(&names.valid_from);
        columns.push(&names.valid_to);
        columns.push(&names.version);
        if let Some(last_seen) = &names.last_seen {
            columns.push(last_seen);
        }

        let params = columns
            .iter()
            .map(|c| Param::Field(c.to_string()))
            .collect::<Vec<_>>();
        let quoted = columns.iter().map(|c| self.q(c)).collect::<Vec<_>>();
        let placeholders = vec!["?"; columns.len()];
        let sql = [
            format!("INSERT INTO {}", self.table_path),
            format!("({})", quoted.join(", ")),
            format!("VALUES ({})", placeholders.join(", ")),
        ]
        .join("\n");
        PreparedQuery::new(Some(QueryKind::Insert), sql, params)
    }

    fn update(&self) -> PreparedQuery {
        let fields = &self.layout.fields;
        let names = &self.layout.names;
        let mut columns: Vec<&str> = fields.names(FieldKind::Update);
        columns.extend(fields.names(FieldKind::Lazy));
        columns.push(&names.valid_from);
        if let Some(last_seen) = &names.last_seen {
            columns.push(last_seen);
        }

        let mut params = columns
            .iter()
            .map(|c| Param::Field(c.to_string()))
            .collect::<Vec<_>>();
        let assignments = columns
            .iter()
            .map(|c| format!("{} = ?", self.q(c)))
            .collect::<Vec<_>>();
        let ids = self.id_predicate(&mut params);
        params.push(Param::Field(names.version.clone()));
        let sql = [
            format!("UPDATE {}", self.table_path),
            format!("SET {}", assignments.join(", ")),
            format!("WHERE {}", ids),
            format!("AND {} = ?", self.q(&names.version)),
        ]
        .join("\n");
        PreparedQuery::new(Some(QueryKind::Update), sql, params)
    }

    /// Ends the active interval at the bound row's validFrom.
    ///
    /// Shared by `CloseActive` and `PurgeOne`; both are cached separately.
    fn close_active(&self, kind: QueryKind) -> PreparedQuery {
        let names = &self.layout.names;
        let mut params = vec![Param::Field(names.valid_from.clone())];
        let ids = self.id_predicate(&mut params);
        params.push(Param::Field(names.valid_from.clone()));
        let sql = [
            format!("UPDATE {}", self.table_path),
            format!("SET {} = ?", self.q(&names.valid_to)),
            format!("WHERE {}", ids),
            format!("AND {}", self.open_at()),
        ]
        .join("\n");
        PreparedQuery::new(Some(kind), sql, params)
    }

    fn update_last_seen(&self) -> StorageResult<PreparedQuery> {
        let names = &self.layout.names;
        let last_seen = names.last_seen.as_deref().ok_or_else(|| {
            StorageError::misconfigured("lastSeen field is not configured")
                .with_details(QueryKind::UpdateLastSeen.as_str())
        })?;
        let mut params = vec![Param::Field(last_seen.to_string())];
        let ids = self.id_predicate(&mut params);
        params.push(Param::Field(names.valid_from.clone()));
        let sql = [
            format!("UPDATE {}", self.table_path),
            format!("SET {} = ?", self.q(last_seen)),
            format!("WHERE {}", ids),
            format!("AND {}", self.open_at()),
        ]
        .join("\n");
        Ok(PreparedQuery::new(Some(QueryKind::UpdateLastSeen), sql, params))
    }

    /// Ends every version still open at execution time and not seen
    /// since `cutoff`.
    ///
    /// `validTo` and the lastSeen bound take the cutoff; the open-interval
    /// check takes the execution instant. `condition` is appended
    /// verbatim, parenthesized.
    pub fn purge_scope(&self, condition: Option<&str>) -> StorageResult<PreparedQuery> {
        let names = &self.layout.names;
        let last_seen = names.last_seen.as_deref().ok_or_else(|| {
            StorageError::misconfigured("purge requires a lastSeen field")
        })?;
        let mut lines = vec![
            format!("UPDATE {}", self.table_path),
            format!("SET {} = ?", self.q(&names.valid_to)),
            format!("WHERE {}", self.open_at()),
            format!("AND {} < ?", self.q(last_seen)),
        ];
        if let Some(condition) = condition.map(str::trim).filter(|c| !c.is_empty()) {
            lines.push(format!("AND ({})", condition));
        }
        Ok(PreparedQuery::new(
            None,
            lines.join("\n"),
            vec![Param::Cutoff, Param::Instant, Param::Cutoff],
        ))
    }
}
