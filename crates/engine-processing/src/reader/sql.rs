use super::{BatchRecordReader, convert::Convertor};
use crate::error::ReadError;
use async_trait::async_trait;
use engine_config::settings::DEFAULT_BATCH;
use engine_core::connectors::source::{QuerySource, Source};
use model::records::record::{Record, Records};
use std::sync::Arc;
use tracing::debug;

/// Pages through a queryable source in primary-key order.
///
/// Each page starts strictly after the key of the last row of the previous
/// one, so the key column must be unique and strictly increasing in the
/// order the source returns it.
pub struct QueryBatchReader {
    source: Arc<dyn Source>,
    query: Arc<dyn QuerySource>,
    convertor: Arc<dyn Convertor>,
    batch: usize,
    watermark: Option<String>,
}

impl QueryBatchReader {
    pub fn new<S>(source: Arc<S>, convertor: Arc<dyn Convertor>, batch: usize) -> Self
    where
        S: QuerySource + 'static,
    {
        Self {
            source: source.clone(),
            query: source,
            convertor,
            batch: if batch == 0 { DEFAULT_BATCH } else { batch },
            watermark: None,
        }
    }

    /// Key of the last row handed out so far.
    pub fn watermark(&self) -> Option<&str> {
        self.watermark.as_deref()
    }
}

#[async_trait]
impl BatchRecordReader for QueryBatchReader {
    fn source(&self) -> Arc<dyn Source> {
        self.source.clone()
    }

    async fn read_batch(&mut self) -> Result<(usize, Records), ReadError> {
        let table = self.query.table();
        let key = table.id.index;
        let statement = table.page_statement(self.watermark.as_deref(), self.batch);

        let rows = self.query.query(&statement).await?;
        if rows.is_empty() {
            return Err(ReadError::Eof);
        }

        let name = self.source.name();
        let last: Record = rows
            .last()
            .map(|row| row.iter().map(|c| c.clone().unwrap_or_default()).collect())
            .unwrap_or_default();
        let mark = last.get(key).cloned().ok_or_else(|| ReadError::Io {
            source_name: name.clone(),
            message: format!("row has no key column at index {key}"),
        })?;
        if self.watermark.as_deref() == Some(mark.as_str()) {
            return Err(ReadError::Io {
                source_name: name,
                message: format!("key '{mark}' does not advance past the previous page"),
            });
        }

        let count = rows.len();
        let mut records = Records::with_capacity(count);
        for row in rows {
            let raw: Record = row.into_iter().map(Option::unwrap_or_default).collect();
            records.extend(self.convertor.apply(raw)?);
        }

        debug!(source = %name, rows = count, watermark = %mark, "Read page");
        self.watermark = Some(mark);
        Ok((count, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::convert::{FnConvertor, IdentityConvertor};
    use crate::error::ConvertError;
    use engine_core::{
        connectors::source::{SourceConfig, SqlId, SqlTable},
        error::SourceError,
    };
    use parking_lot::Mutex;

    /// Serves pages of a sorted in-memory table by parsing the watermark
    /// and limit back out of the generated statement.
    struct MemoryTable {
        config: SourceConfig,
        rows: Vec<Vec<Option<String>>>,
        statements: Mutex<Vec<String>>,
    }

    impl MemoryTable {
        fn new(ids: &[&str]) -> Arc<Self> {
            let table = SqlTable {
                name: "people".into(),
                id: SqlId {
                    name: "id".into(),
                    index: 0,
                    alias: None,
                },
                fields: vec!["id".into(), "name".into()],
                ..Default::default()
            };
            let rows = ids
                .iter()
                .map(|id| vec![Some(id.to_string()), (*id != "b").then(|| format!("n{id}"))])
                .collect();
            Arc::new(Self {
                config: SourceConfig {
                    location: "db".into(),
                    csv: None,
                    sql: Some(table),
                },
                rows,
                statements: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Source for MemoryTable {
        fn config(&self) -> &SourceConfig {
            &self.config
        }

        fn name(&self) -> String {
            "people".into()
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
            self.config.sql.as_ref().unwrap()
        }

        async fn query(&self, statement: &str) -> Result<Vec<Vec<Option<String>>>, SourceError> {
            self.statements.lock().push(statement.to_string());
            let after = statement
                .split("> '")
                .nth(1)
                .and_then(|rest| rest.split('\'').next())
                .map(str::to_string);
            let limit: usize = statement
                .rsplit("LIMIT ")
                .next()
                .and_then(|n| n.trim().parse().ok())
                .unwrap();
            Ok(self
                .rows
                .iter()
                .filter(|row| match &after {
                    Some(mark) => row[0].as_deref().unwrap() > mark.as_str(),
                    None => true,
                })
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn pages_until_an_empty_result() {
        let table = MemoryTable::new(&["a", "b", "c", "d", "e"]);
        let mut reader = QueryBatchReader::new(table.clone(), Arc::new(IdentityConvertor), 2);

        let mut pages = Vec::new();
        loop {
            match reader.read_batch().await {
                Ok((rows, records)) => {
                    assert_eq!(rows, records.len());
                    pages.push(records.iter().map(|r| r[0].clone()).collect::<Vec<_>>());
                }
                Err(e) => {
                    assert!(e.is_eof());
                    break;
                }
            }
        }

        assert_eq!(pages, vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]);
        assert_eq!(reader.watermark(), Some("e"));

        let statements = table.statements.lock();
        assert_eq!(statements.len(), 4);
        assert!(!statements[0].contains(" > "));
        assert!(statements[1].contains("`id` > 'b'"));
    }

    #[tokio::test]
    async fn null_cells_become_empty_strings() {
        let table = MemoryTable::new(&["a", "b"]);
        let mut reader = QueryBatchReader::new(table, Arc::new(IdentityConvertor), 10);

        let (_, records) = reader.read_batch().await.unwrap();
        assert_eq!(records[1], vec!["b".to_string(), String::new()]);
    }

    #[tokio::test]
    async fn filtered_page_is_not_end_of_stream() {
        let table = MemoryTable::new(&["a", "b", "c"]);
        let drop_all = FnConvertor(|_: Record| -> Result<Records, ConvertError> { Ok(vec![]) });
        let mut reader = QueryBatchReader::new(table, Arc::new(drop_all), 2);

        let (rows, records) = reader.read_batch().await.unwrap();
        assert_eq!(rows, 2);
        assert!(records.is_empty());
        assert_eq!(reader.watermark(), Some("b"));
    }
}
