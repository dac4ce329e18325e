#[cfg(test)]
mod tests {
    use crate::{error::ManagerError, manager::Manager};
    use async_trait::async_trait;
    use engine_config::{
        hooks::{Hook, Hooks},
        settings::ManagerSettings,
    };
    use engine_core::{
        connectors::{
            client::{Client, ClientOptions, ClientPool, Response},
            source::{Source, SourceConfig},
        },
        error::{ClientError, SourceError},
        sync::{PendingUnit, PendingUnits},
    };
    use engine_processing::{
        error::{ImportError, ReadError},
        importer::{ImportResp, Importer},
        reader::BatchRecordReader,
    };
    use model::records::record::{Record, Records};
    use parking_lot::Mutex;
    use std::{
        collections::VecDeque,
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use tracing_test::traced_test;

    struct MemSource {
        config: SourceConfig,
        size: Option<u64>,
        closed: AtomicBool,
    }

    impl MemSource {
        fn new(size: u64) -> Arc<Self> {
            Arc::new(Self {
                config: SourceConfig::default(),
                size: Some(size),
                closed: AtomicBool::new(false),
            })
        }

        /// A source that opens but cannot report its size.
        fn without_size() -> Arc<Self> {
            Arc::new(Self {
                config: SourceConfig::default(),
                size: None,
                closed: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl Source for MemSource {
        fn config(&self) -> &SourceConfig {
            &self.config
        }

        fn name(&self) -> String {
            "mem".into()
        }

        async fn open(&self) -> Result<(), SourceError> {
            Ok(())
        }

        async fn size(&self) -> Result<u64, SourceError> {
            self.size.ok_or_else(|| SourceError::Size {
                name: "mem".into(),
                message: "stat failed".into(),
            })
        }

        async fn close(&self) -> Result<(), SourceError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Hands out pre-built batches, one byte per record.
    struct VecReader {
        source: Arc<dyn Source>,
        batches: VecDeque<Records>,
    }

    impl VecReader {
        fn new(source: Arc<dyn Source>, records: usize, batch: usize) -> Box<Self> {
            let all: Records = (0..records).map(|i| vec![i.to_string()]).collect();
            Box::new(Self {
                source,
                batches: all.chunks(batch).map(|c| c.to_vec()).collect(),
            })
        }
    }

    #[async_trait]
    impl BatchRecordReader for VecReader {
        fn source(&self) -> Arc<dyn Source> {
            self.source.clone()
        }

        async fn read_batch(&mut self) -> Result<(usize, Records), ReadError> {
            match self.batches.pop_front() {
                Some(batch) => Ok((batch.len(), batch)),
                None => Err(ReadError::Eof),
            }
        }
    }

    /// Importer that fails any sub-batch containing one of `poison`.
    struct MockImporter {
        batch: Option<usize>,
        poison: Vec<String>,
        calls: Mutex<Vec<usize>>,
        units: PendingUnits,
    }

    impl MockImporter {
        fn new(batch: Option<usize>, poison: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                batch,
                poison: poison.iter().map(|p| p.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
                units: PendingUnits::new(),
            })
        }
    }

    #[async_trait]
    impl Importer for MockImporter {
        async fn import(&self, records: &[Record]) -> Result<ImportResp, ImportError> {
            self.calls.lock().push(records.len());
            if records.iter().any(|r| self.poison.contains(&r[0])) {
                return Err(ImportError::Execute {
                    statement: "INSERT poison".into(),
                    attempts: 5,
                    source: ClientError::Rejected("poison".into()),
                });
            }
            Ok(ImportResp {
                records: records.len(),
                latency: Duration::from_micros(10),
                resp_time: Duration::from_micros(20),
            })
        }

        fn acquire(&self) -> PendingUnit {
            self.units.acquire()
        }

        async fn ready(&self) {}

        fn batch_size(&self) -> Option<usize> {
            self.batch
        }
    }

    #[derive(Default)]
    struct NoopPool {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    struct NoopClient;

    #[async_trait]
    impl Client for NoopClient {
        async fn execute(&self, statement: &str) -> Result<Response, ClientError> {
            if statement.starts_with("FAIL") {
                return Ok(Response::failure("hook rejected"));
            }
            Ok(Response::success(Duration::ZERO, Duration::ZERO))
        }
    }

    #[async_trait]
    impl ClientPool for NoopPool {
        async fn open(&self) -> Result<(), ClientError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) -> Result<(), ClientError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn execute(&self, _: &str) -> Result<Response, ClientError> {
            Ok(Response::success(Duration::ZERO, Duration::ZERO))
        }

        async fn get_client(&self, _: &ClientOptions) -> Result<Box<dyn Client>, ClientError> {
            Ok(Box::new(NoopClient))
        }
    }

    fn settings(batch: usize) -> ManagerSettings {
        ManagerSettings {
            graph_name: "g".into(),
            batch,
            reader_concurrency: 2,
            importer_concurrency: 4,
            stats_interval: None,
            hooks: Hooks::default(),
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn failures_in_one_importer_do_not_block_others() {
        let pool = Arc::new(NoopPool::default());
        let manager = Manager::new(settings(10), pool.clone());
        let source = MemSource::new(25);

        // Sub-batches of 4 over batches of 10: [0..4) [4..8) [8..10) ...
        let failing = MockImporter::new(Some(4), &["5"]);
        let healthy = MockImporter::new(None, &[]);
        let importers: Vec<Arc<dyn Importer>> = vec![failing.clone(), healthy.clone()];

        manager
            .import(source.clone(), VecReader::new(source.clone(), 25, 10), importers)
            .await
            .unwrap();
        manager.start().await.unwrap();
        manager.wait().await.unwrap();

        let stats = manager.stats();
        assert_eq!(stats.total, 25);
        assert_eq!(stats.processed, 25);
        assert_eq!(stats.total_records, 25);
        assert_eq!(stats.failed_records, 4);
        assert_eq!(stats.succeeded_records(), 21);
        // 3 + 3 + 2 sub-batches for the first importer, 3 for the second.
        assert_eq!(stats.total_request, 11);
        assert_eq!(stats.failed_request, 1);

        assert_eq!(healthy.calls.lock().len(), 3);
        assert_eq!(failing.calls.lock().len(), 8);
        assert!(source.closed.load(Ordering::SeqCst));
        assert_eq!(failing.units.pending(), 0);
        assert_eq!(pool.opened.load(Ordering::SeqCst), 1);
        assert_eq!(pool.closed.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Failed to import sub-batch"));
    }

    #[tokio::test]
    async fn no_importers_is_a_no_op() {
        let manager = Manager::new(settings(10), Arc::new(NoopPool::default()));
        let source = MemSource::new(5);

        manager
            .import(source.clone(), VecReader::new(source.clone(), 5, 10), vec![])
            .await
            .unwrap();
        assert_eq!(manager.stats().total, 0);
    }

    #[tokio::test]
    async fn stop_without_start_releases_jobs() {
        let pool = Arc::new(NoopPool::default());
        let manager = Manager::new(settings(10), pool.clone());
        let source = MemSource::new(5);
        let importer = MockImporter::new(None, &[]);

        manager
            .import(
                source.clone(),
                VecReader::new(source.clone(), 5, 10),
                vec![importer.clone() as Arc<dyn Importer>],
            )
            .await
            .unwrap();
        assert_eq!(importer.units.pending(), 1);

        manager.stop().await.unwrap();
        assert!(manager.is_stopped());
        assert!(importer.calls.lock().is_empty());
        assert_eq!(importer.units.pending(), 0);
        assert!(source.closed.load(Ordering::SeqCst));
        assert_eq!(pool.closed.load(Ordering::SeqCst), 0);

        let again = manager
            .import(
                source.clone(),
                VecReader::new(source.clone(), 5, 10),
                vec![importer as Arc<dyn Importer>],
            )
            .await;
        assert!(matches!(again, Err(ManagerError::Stopped { .. })));
    }

    #[tokio::test]
    async fn failed_before_hook_keeps_pool_closed() {
        let pool = Arc::new(NoopPool::default());
        let mut settings = settings(10);
        settings.hooks.before = vec![Hook::new(["FAIL here"])];
        let manager = Manager::new(settings, pool.clone());

        let err = manager.start().await.unwrap_err();
        assert!(matches!(err, ManagerError::Hook { .. }));
        assert_eq!(manager.start().await.unwrap_err(), err);
        assert_eq!(pool.opened.load(Ordering::SeqCst), 0);

        manager.stop().await.unwrap();
        assert_eq!(pool.closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn source_size_failure_closes_the_source() {
        let manager = Manager::new(settings(10), Arc::new(NoopPool::default()));
        let source = MemSource::without_size();
        let importer = MockImporter::new(None, &[]);

        let err = manager
            .import(
                source.clone(),
                VecReader::new(source.clone(), 5, 10),
                vec![importer.clone() as Arc<dyn Importer>],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ManagerError::SourceSize { ref source_name, .. } if source_name == "mem"
        ));
        assert!(source.closed.load(Ordering::SeqCst));
        assert_eq!(importer.units.pending(), 0);
        assert_eq!(manager.stats().total, 0);

        manager.start().await.unwrap();
        manager.wait().await.unwrap();
        assert!(importer.calls.lock().is_empty());
    }

    #[traced_test]
    #[tokio::test]
    async fn stats_loop_reports_once_right_after_start() {
        let mut settings = settings(10);
        settings.stats_interval = Some(Duration::from_secs(3600));
        let manager = Manager::new(settings, Arc::new(NoopPool::default()));

        manager.start().await.unwrap();
        manager.stop().await.unwrap();

        assert!(logs_contain("Progress"));
    }
}
