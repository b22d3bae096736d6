use crate::db::traits::KnowledgeStore;
use crate::types::{
    AppError, DeleteFilters, EntryUpdate, KnowledgeEntry, NewKnowledgeEntry, Result,
    validate_tags,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params::Params;
use libsql::{Builder, Connection, Database, Row, Value};
use uuid::Uuid;

const ENTRY_COLUMNS: &str = "id, content, slack_username, slack_timestamp, source_url, tags, \
                             additional_metadata, embedding, created_at, updated_at";

/// libsql-backed knowledge store (in-memory, local file or remote Turso).
pub struct TursoClient {
    _db: Database,
    conn: Connection,
}

impl TursoClient {
    pub async fn new_remote(url: String, auth_token: String) -> Result<Self> {
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Turso: {}", e)))?;

        Self::from_database(db).await
    }

    pub async fn new_local(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database {}: {}", path, e)))?;

        Self::from_database(db).await
    }

    /// Ephemeral database living as long as this client.
    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to create in-memory database: {}", e)))?;

        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        // one shared connection keeps `:memory:` databases alive across calls
        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        let client = Self { _db: db, conn };
        client.initialize_schema().await?;

        Ok(client)
    }

    pub fn connection(&self) -> Connection {
        self.conn.clone()
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS knowledge_entries (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                slack_username TEXT NOT NULL,
                slack_timestamp TEXT NOT NULL,
                source_url TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                additional_metadata TEXT NOT NULL DEFAULT '{}',
                embedding TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to create knowledge_entries table: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_knowledge_source_url ON knowledge_entries(source_url)",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create source_url index: {}", e)))?;

        Ok(())
    }

    async fn fetch(&self, sql: &str, params: Params) -> Result<Vec<KnowledgeEntry>> {
        let mut rows = self
            .connection()
            .query(sql, params)
            .await
            .map_err(|e| AppError::Database(format!("Failed to query knowledge entries: {}", e)))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            entries.push(entry_from_row(&row)?);
        }

        Ok(entries)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str, column: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Database(format!("Corrupt {} column: {}", column, e)))
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Database(format!("Invalid timestamp: {}", millis)))
}

fn entry_from_row(row: &Row) -> Result<KnowledgeEntry> {
    let db_err = |e: libsql::Error| AppError::Database(e.to_string());

    let id: String = row.get(0).map_err(db_err)?;
    let tags: String = row.get(5).map_err(db_err)?;
    let metadata: String = row.get(6).map_err(db_err)?;
    let embedding: Option<String> = row.get(7).map_err(db_err)?;

    Ok(KnowledgeEntry {
        id: Uuid::parse_str(&id)
            .map_err(|e| AppError::Database(format!("Invalid entry id {}: {}", id, e)))?,
        content: row.get(1).map_err(db_err)?,
        slack_username: row.get(2).map_err(db_err)?,
        slack_timestamp: row.get(3).map_err(db_err)?,
        source_url: row.get(4).map_err(db_err)?,
        tags: from_json(&tags, "tags")?,
        additional_metadata: from_json(&metadata, "additional_metadata")?,
        embedding: embedding
            .map(|raw| from_json(&raw, "embedding"))
            .transpose()?,
        created_at: millis_to_datetime(row.get(8).map_err(db_err)?)?,
        updated_at: millis_to_datetime(row.get(9).map_err(db_err)?)?,
    })
}

/// `WHERE` conditions for the given filters with their positional values.
fn filter_conditions(filters: &DeleteFilters) -> (Vec<&'static str>, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(url) = &filters.url {
        conditions.push("source_url = ?");
        values.push(Value::Text(url.clone()));
    }
    if let Some(source) = &filters.source {
        conditions.push("json_extract(additional_metadata, '$.source') = ?");
        values.push(Value::Text(source.clone()));
    }
    if let Some(date) = &filters.date {
        conditions.push("json_extract(additional_metadata, '$.date') = ?");
        values.push(Value::Text(date.clone()));
    }

    (conditions, values)
}

#[async_trait]
impl KnowledgeStore for TursoClient {
    async fn create(&self, entry: NewKnowledgeEntry) -> Result<KnowledgeEntry> {
        entry.validate()?;

        // stored precision is milliseconds
        let now = millis_to_datetime(Utc::now().timestamp_millis())?;
        let stored = KnowledgeEntry {
            id: Uuid::new_v4(),
            content: entry.content,
            slack_username: entry.slack_username,
            slack_timestamp: entry.slack_timestamp,
            source_url: entry.source_url,
            tags: entry.tags,
            additional_metadata: entry.additional_metadata,
            embedding: None,
            created_at: now,
            updated_at: now,
        };

        self.connection()
            .execute(
                "INSERT INTO knowledge_entries
                    (id, content, slack_username, slack_timestamp, source_url, tags,
                     additional_metadata, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                Params::Positional(vec![
                    Value::Text(stored.id.to_string()),
                    Value::Text(stored.content.clone()),
                    Value::Text(stored.slack_username.clone()),
                    Value::Text(stored.slack_timestamp.clone()),
                    stored.source_url.clone().map(Value::Text).unwrap_or(Value::Null),
                    Value::Text(to_json(&stored.tags)?),
                    Value::Text(to_json(&stored.additional_metadata)?),
                    Value::Integer(now.timestamp_millis()),
                    Value::Integer(now.timestamp_millis()),
                ]),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to create knowledge entry: {}", e)))?;

        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<KnowledgeEntry>> {
        let sql = format!("SELECT {} FROM knowledge_entries WHERE id = ?", ENTRY_COLUMNS);
        let mut entries = self
            .fetch(&sql, Params::Positional(vec![Value::Text(id.to_string())]))
            .await?;
        Ok(entries.pop())
    }

    async fn update(&self, id: Uuid, update: EntryUpdate) -> Result<Option<KnowledgeEntry>> {
        let mut assignments = Vec::new();
        let mut values = Vec::new();

        if let Some(content) = update.content {
            assignments.push("content = ?");
            values.push(Value::Text(content));
        }
        if let Some(source_url) = update.source_url {
            assignments.push("source_url = ?");
            values.push(source_url.map(Value::Text).unwrap_or(Value::Null));
        }
        if let Some(tags) = update.tags {
            validate_tags(&tags)?;
            assignments.push("tags = ?");
            values.push(Value::Text(to_json(&tags)?));
        }
        if let Some(metadata) = update.additional_metadata {
            assignments.push("additional_metadata = ?");
            values.push(Value::Text(to_json(&metadata)?));
        }
        if let Some(embedding) = update.embedding {
            assignments.push("embedding = ?");
            values.push(Value::Text(to_json(&embedding)?));
        }

        assignments.push("updated_at = ?");
        values.push(Value::Integer(Utc::now().timestamp_millis()));
        values.push(Value::Text(id.to_string()));

        let sql = format!(
            "UPDATE knowledge_entries SET {} WHERE id = ?",
            assignments.join(", ")
        );
        let changed = self
            .connection()
            .execute(&sql, Params::Positional(values))
            .await
            .map_err(|e| AppError::Database(format!("Failed to update knowledge entry: {}", e)))?;

        if changed == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let changed = self
            .connection()
            .execute(
                "DELETE FROM knowledge_entries WHERE id = ?",
                [id.to_string()],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete knowledge entry: {}", e)))?;

        Ok(changed > 0)
    }

    async fn delete_where(&self, filters: &DeleteFilters) -> Result<(usize, Vec<String>)> {
        if filters.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one delete filter is required".into(),
            ));
        }

        let (conditions, values) = filter_conditions(filters);
        let sql = format!(
            "DELETE FROM knowledge_entries WHERE {} RETURNING id",
            conditions.join(" AND ")
        );

        let mut rows = self
            .connection()
            .query(&sql, Params::Positional(values))
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete knowledge entries: {}", e)))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            ids.push(
                row.get::<String>(0)
                    .map_err(|e| AppError::Database(e.to_string()))?,
            );
        }

        tracing::debug!(deleted = ids.len(), "Deleted knowledge entries by filter");
        Ok((ids.len(), ids))
    }

    async fn search_by_tags(&self, tags: &[String]) -> Result<Vec<KnowledgeEntry>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; tags.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM knowledge_entries
             WHERE EXISTS (SELECT 1 FROM json_each(knowledge_entries.tags) WHERE json_each.value IN ({}))
             ORDER BY created_at ASC",
            ENTRY_COLUMNS, placeholders
        );
        let values = tags.iter().cloned().map(Value::Text).collect();

        self.fetch(&sql, Params::Positional(values)).await
    }
}
