use crate::error::SourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, io, sync::Arc};

/// Where a source lives and how its bytes are shaped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<CsvConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvConfig {
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub comment: Option<char>,
    #[serde(default)]
    pub with_header: bool,
}

/// Primary key column of a paginated table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlId {
    #[serde(default = "default_id_name")]
    pub name: String,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub alias: Option<String>,
}

fn default_id_name() -> String {
    "id".to_string()
}

impl Default for SqlId {
    fn default() -> Self {
        Self {
            name: default_id_name(),
            index: 0,
            alias: None,
        }
    }
}

/// A relational table (or custom query) read page by page in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlTable {
    pub name: String,
    #[serde(default)]
    pub id: SqlId,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub count: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

impl SqlTable {
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.name.is_empty() {
            return Err(SourceError::InvalidConfig("table name is required".into()));
        }
        if self.query.is_none() && self.fields.is_empty() {
            return Err(SourceError::InvalidConfig(format!(
                "table '{}' needs fields when no query is given",
                self.name
            )));
        }
        if !self.fields.is_empty() && self.fields.get(self.id.index) != Some(&self.id.name) {
            return Err(SourceError::InvalidConfig(format!(
                "field {} of table '{}' must be the primary key '{}'",
                self.id.index, self.name, self.id.name
            )));
        }
        Ok(())
    }

    /// Column expression used for ordering and the watermark predicate.
    pub fn primary_key(&self) -> String {
        match &self.id.alias {
            Some(alias) if !alias.is_empty() => alias.clone(),
            _ => format!("`{}`", self.id.name),
        }
    }

    pub fn count_statement(&self) -> String {
        if let Some(count) = self.count.as_deref().filter(|c| !c.is_empty()) {
            return count.to_string();
        }
        if let Some(query) = self.custom_query() {
            return format!("SELECT COUNT(1) AS total FROM ({query}) AS t");
        }
        format!(
            "SELECT COUNT(1) AS total FROM `{}` WHERE {}",
            self.name,
            self.predicate()
        )
    }

    /// Next page after `watermark`, ordered by the primary key.
    pub fn page_statement(&self, watermark: Option<&str>, limit: usize) -> String {
        let mut stmt = match self.custom_query() {
            Some(query) => query,
            None => format!(
                "SELECT `{}` FROM `{}` WHERE {}",
                self.fields.join("`,`"),
                self.name,
                self.predicate()
            ),
        };

        let key = self.primary_key();
        if let Some(mark) = watermark.filter(|m| !m.is_empty()) {
            stmt.push_str(&format!(" AND {key} > '{}'", mark.replace('\'', "''")));
        }
        stmt.push_str(&format!(" ORDER BY {key} ASC LIMIT {limit}"));
        stmt
    }

    /// The custom query with the filter appended. It must end in a `WHERE` clause.
    fn custom_query(&self) -> Option<String> {
        let query = self.query.as_deref().filter(|q| !q.is_empty())?;
        Some(match self.filter.as_deref().filter(|f| !f.is_empty()) {
            Some(filter) => format!("{query} AND {filter}"),
            None => query.to_string(),
        })
    }

    fn predicate(&self) -> &str {
        self.filter
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or("1 = 1")
    }
}

/// An opened-on-demand input the import pipeline reads from.
///
/// Methods take `&self`; implementations keep their handles behind
/// interior mutability so one source can be shared by the orchestrator
/// (open/size/close) and the record reader (read).
#[async_trait]
pub trait Source: Send + Sync {
    fn config(&self) -> &SourceConfig;

    fn name(&self) -> String;

    async fn open(&self) -> Result<(), SourceError>;

    async fn size(&self) -> Result<u64, SourceError>;

    /// Byte-level read for file-like sources.
    fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("source '{}' is not byte readable", self.name()),
        ))
    }

    async fn close(&self) -> Result<(), SourceError>;
}

/// Sources that expand into several concrete ones (e.g. wildcard paths).
#[async_trait]
pub trait Globber: Send + Sync {
    async fn glob(&self) -> Result<Vec<SourceConfig>, SourceError>;
}

/// Relational sources queried page by page.
#[async_trait]
pub trait QuerySource: Source {
    fn table(&self) -> &SqlTable;

    /// Runs `statement` and returns every row as nullable string cells.
    async fn query(&self, statement: &str) -> Result<Vec<Vec<Option<String>>>, SourceError>;
}

/// `std::io::Read` view over a shared source.
#[derive(Clone)]
pub struct SourceReader {
    source: Arc<dyn Source>,
}

impl SourceReader {
    pub fn new(source: Arc<dyn Source>) -> Self {
        Self { source }
    }
}

impl io::Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.source.read(buf)
    }
}

impl fmt::Debug for SourceReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceReader")
            .field("source", &self.source.name())
            .finish()
    }
}
