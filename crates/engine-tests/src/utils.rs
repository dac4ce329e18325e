#![allow(dead_code)]

use async_trait::async_trait;
use engine_core::{
    connectors::{
        client::{Client, ClientOptions, ClientPool, Response},
        source::{CsvConfig, Globber, QuerySource, Source, SourceConfig, SqlId, SqlTable},
    },
    error::{BuildError, ClientError, SourceError},
    statement::StatementBuilder,
};
use engine_processing::reader::{
    BatchRecordReader,
    batch::StreamBatchReader,
    convert::{Convertor, IdentityConvertor},
    csv::CsvRecordReader,
};
use model::records::record::Record;
use parking_lot::Mutex;
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// A CSV file on local disk.
pub struct LocalFileSource {
    config: SourceConfig,
    file: Mutex<Option<File>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl LocalFileSource {
    pub fn new(path: &Path) -> Arc<Self> {
        Self::from_config(SourceConfig {
            location: path.display().to_string(),
            csv: Some(CsvConfig::default()),
            sql: None,
        })
    }

    pub fn from_config(config: SourceConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            file: Mutex::new(None),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        })
    }

    fn path(&self) -> PathBuf {
        PathBuf::from(&self.config.location)
    }
}

#[async_trait]
impl Source for LocalFileSource {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn name(&self) -> String {
        format!("local {}", self.config.location)
    }

    async fn open(&self) -> Result<(), SourceError> {
        let file = File::open(self.path()).map_err(|e| SourceError::Open {
            name: self.name(),
            message: e.to_string(),
        })?;
        *self.file.lock() = Some(file);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn size(&self) -> Result<u64, SourceError> {
        let file = self.file.lock();
        let file = file.as_ref().ok_or_else(|| SourceError::NotOpen(self.name()))?;
        file.metadata().map(|m| m.len()).map_err(|e| SourceError::Size {
            name: self.name(),
            message: e.to_string(),
        })
    }

    fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.file.lock().as_mut() {
            Some(file) => file.read(buf),
            None => Err(std::io::Error::other("source is not open")),
        }
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.file.lock().take();
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Expands `<dir>/*.<extension>` into one config per file, sorted by path.
pub struct DirGlob {
    pub dir: PathBuf,
    pub extension: String,
}

#[async_trait]
impl Globber for DirGlob {
    async fn glob(&self) -> Result<Vec<SourceConfig>, SourceError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| SourceError::Open {
            name: self.dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == self.extension.as_str()))
            .collect();
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|p| SourceConfig {
                location: p.display().to_string(),
                csv: Some(CsvConfig::default()),
                sql: None,
            })
            .collect())
    }
}

/// Streaming CSV job parts for `source`.
pub fn csv_reader(source: &Arc<LocalFileSource>, batch: usize) -> Box<dyn BatchRecordReader> {
    let source: Arc<dyn Source> = source.clone();
    Box::new(StreamBatchReader::new(
        Box::new(CsvRecordReader::new(source)),
        Arc::new(IdentityConvertor) as Arc<dyn Convertor>,
        batch,
    ))
}

/// Builds `INSERT VERTEX <tag>` / `INSERT EDGE <edge>` style statements.
///
/// Records with an empty first field are dropped.
pub struct EntityBuilder {
    keyword: &'static str,
    name: String,
}

impl EntityBuilder {
    pub fn vertex(tag: &str) -> Arc<dyn StatementBuilder> {
        Arc::new(Self {
            keyword: "VERTEX",
            name: tag.to_string(),
        })
    }

    pub fn edge(edge: &str) -> Arc<dyn StatementBuilder> {
        Arc::new(Self {
            keyword: "EDGE",
            name: edge.to_string(),
        })
    }
}

impl StatementBuilder for EntityBuilder {
    fn build(&self, records: &[Record]) -> Result<(String, usize), BuildError> {
        let values: Vec<String> = records
            .iter()
            .filter(|r| r.first().is_some_and(|k| !k.is_empty()))
            .map(|r| format!("\"{}\":({})", r[0], r[1..].join(",")))
            .collect();
        if values.is_empty() {
            return Ok((String::new(), 0));
        }
        let count = values.len();
        Ok((
            format!("INSERT {} {} VALUES {};", self.keyword, self.name, values.join(", ")),
            count,
        ))
    }
}

/// How the mock pool answers statements containing a marker.
#[derive(Debug, Clone)]
struct Failure {
    marker: String,
    remaining: usize,
}

/// In-memory client pool.
///
/// Statements succeed unless they contain a registered marker, in which
/// case they fail until the marker's failure budget is used up. Hook
/// statements go through dedicated clients and are logged separately.
#[derive(Default)]
pub struct MockClientPool {
    failures: Mutex<Vec<Failure>>,
    pub executed: Mutex<Vec<String>>,
    pub hooks: Mutex<Vec<String>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl MockClientPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The pool as the engine sees it.
    pub fn client_pool(self: &Arc<Self>) -> Arc<dyn ClientPool> {
        Arc::new(SharedPool(self.clone()))
    }

    /// Fails statements containing `marker` the next `times` times.
    pub fn fail(&self, marker: &str, times: usize) {
        self.failures.lock().push(Failure {
            marker: marker.to_string(),
            remaining: times,
        });
    }

    pub fn fail_always(&self, marker: &str) {
        self.fail(marker, usize::MAX);
    }

    pub fn executed_matching(&self, needle: &str) -> usize {
        self.executed.lock().iter().filter(|s| s.contains(needle)).count()
    }

    fn should_fail(&self, statement: &str) -> bool {
        let mut failures = self.failures.lock();
        match failures
            .iter_mut()
            .find(|f| f.remaining > 0 && statement.contains(&f.marker))
        {
            Some(f) => {
                f.remaining = f.remaining.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    fn answer(&self, statement: &str) -> Response {
        if self.should_fail(statement) {
            Response::failure(format!("mock failure for {statement}"))
        } else {
            Response::success(Duration::from_micros(100), Duration::from_micros(250))
        }
    }
}

struct MockClient {
    pool: Arc<MockClientPool>,
}

#[async_trait]
impl Client for MockClient {
    async fn execute(&self, statement: &str) -> Result<Response, ClientError> {
        self.pool.hooks.lock().push(statement.to_string());
        Ok(self.pool.answer(statement))
    }
}

/// Lets dedicated clients hold the pool they came from.
#[derive(Clone)]
pub struct SharedPool(pub Arc<MockClientPool>);

#[async_trait]
impl ClientPool for SharedPool {
    async fn open(&self) -> Result<(), ClientError> {
        self.0.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.0.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<Response, ClientError> {
        if self.0.opened.load(Ordering::SeqCst) == 0 {
            return Err(ClientError::PoolNotOpen);
        }
        self.0.executed.lock().push(statement.to_string());
        Ok(self.0.answer(statement))
    }

    async fn get_client(&self, _: &ClientOptions) -> Result<Box<dyn Client>, ClientError> {
        Ok(Box::new(MockClient {
            pool: self.0.clone(),
        }))
    }
}

/// A sorted in-memory table answering generated page statements.
pub struct MemoryTable {
    config: SourceConfig,
    rows: Vec<Vec<Option<String>>>,
    pub queries: AtomicUsize,
}

impl MemoryTable {
    pub fn players(n: usize) -> Arc<Self> {
        let table = SqlTable {
            name: "player".into(),
            id: SqlId {
                name: "id".into(),
                index: 0,
                alias: None,
            },
            fields: vec!["id".into(), "name".into(), "age".into()],
            ..Default::default()
        };
        let rows = (0..n)
            .map(|i| {
                vec![
                    Some(format!("player{i:04}")),
                    Some(format!("Name {i}")),
                    (i % 7 != 0).then(|| (20 + i % 20).to_string()),
                ]
            })
            .collect();
        Arc::new(Self {
            config: SourceConfig {
                location: "mysql://localhost/nba".into(),
                csv: None,
                sql: Some(table),
            },
            rows,
            queries: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Source for MemoryTable {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn name(&self) -> String {
        "sql player".into()
    }

    async fn open(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn size(&self) -> Result<u64, SourceError> {
        Ok(self.rows.len() as u64)
    }

    async fn close(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

#[async_trait]
impl QuerySource for MemoryTable {
    fn table(&self) -> &SqlTable {
        self.config.sql.as_ref().expect("sql table")
    }

    async fn query(&self, statement: &str) -> Result<Vec<Vec<Option<String>>>, SourceError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let after = statement
            .split("> '")
            .nth(1)
            .and_then(|rest| rest.split('\'').next())
            .map(str::to_string);
        let limit = statement
            .rsplit("LIMIT ")
            .next()
            .and_then(|n| n.trim().parse::<usize>().ok())
            .ok_or_else(|| SourceError::Query {
                name: self.name(),
                message: format!("no limit in '{statement}'"),
            })?;

        Ok(self
            .rows
            .iter()
            .filter(|row| match (&after, &row[0]) {
                (Some(mark), Some(key)) => key > mark,
                _ => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }
}
