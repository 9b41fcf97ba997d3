//! Test configuration helpers for building runners against a temp output directory

use std::sync::Arc;
use std::time::Duration;

use autobatch::{BatchConfig, BatchRunner, HttpFetcher, ZipPackager};
use tempfile::TempDir;

/// Config with millisecond delays and a short network timeout
pub fn fast_config(batch_size: usize) -> BatchConfig {
    BatchConfig {
        batch_size,
        retry_delay: Duration::from_millis(1),
        download_delay: Duration::from_millis(1),
        network_timeout_threshold: Duration::from_secs(2),
        pause_poll_interval: Duration::from_millis(5),
        ..BatchConfig::default()
    }
}

/// A runner wired to the real HTTP fetcher and zip packager
pub struct TestRunner {
    /// The runner under test
    pub runner: BatchRunner,
    /// Packager shared with the runner, for inspecting held archives
    pub packager: Arc<ZipPackager>,
    /// Output directory (kept alive for the duration of the test)
    pub dir: TempDir,
}

/// Create a runner writing archives into a fresh temp directory
pub fn create_test_runner(config: BatchConfig) -> TestRunner {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
    let packager = Arc::new(ZipPackager::new(dir.path()));
    let runner = BatchRunner::new(config, fetcher, packager.clone()).unwrap();
    TestRunner {
        runner,
        packager,
        dir,
    }
}
