//! Shared test helpers: scripted collaborators and a fast runner config.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collab::{ArchiveBuilder, ItemFetcher, PackagedArtifact, Packager, ProgressReporter};
use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::runner::BatchRunner;
use crate::types::{ArtifactHandle, WorkItem};

/// Scripted behaviour of one `fetch` call
#[derive(Clone, Debug)]
pub(crate) enum FetchScript {
    /// Fetch every item
    All,
    /// Fetch only the first `n` items
    Partial(usize),
    /// Fetch nothing, without failing
    Empty,
    /// Fail the whole batch
    Fail(String),
    /// Fail the whole batch with an unclassified error
    Broken(String),
}

/// Fetcher that follows a script, one entry per call, and fetches everything once the script
/// runs out.
pub(crate) struct MockFetcher {
    script: Mutex<VecDeque<FetchScript>>,
    delay: Duration,
    calls: AtomicUsize,
    fetched_ids: Mutex<Vec<Vec<String>>>,
    timeouts: Mutex<Vec<Duration>>,
}

impl MockFetcher {
    pub(crate) fn new(script: impl IntoIterator<Item = FetchScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            fetched_ids: Mutex::new(Vec::new()),
            timeouts: Mutex::new(Vec::new()),
        })
    }

    /// Every call sleeps `delay` before returning.
    pub(crate) fn slow(script: impl IntoIterator<Item = FetchScript>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            delay,
            calls: AtomicUsize::new(0),
            fetched_ids: Mutex::new(Vec::new()),
            timeouts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Request timeout passed to each call, in call order
    pub(crate) fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }

    /// Item ids passed to each call, in call order
    pub(crate) fn requested(&self) -> Vec<Vec<String>> {
        self.fetched_ids.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ItemFetcher for MockFetcher {
    async fn fetch(
        &self,
        items: &[WorkItem],
        timeout: Duration,
        progress: ProgressReporter,
    ) -> Result<Vec<WorkItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.timeouts.lock().unwrap().push(timeout);
        self.fetched_ids
            .lock()
            .unwrap()
            .push(items.iter().map(|i| i.id.clone()).collect());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FetchScript::All);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let take = match step {
            FetchScript::All => items.len(),
            FetchScript::Partial(n) => n.min(items.len()),
            FetchScript::Empty => 0,
            FetchScript::Fail(message) => return Err(Error::Fetch(message)),
            FetchScript::Broken(message) => return Err(Error::Other(message)),
        };

        let mut fetched = Vec::with_capacity(take);
        for item in &items[..take] {
            fetched.push(item.clone().with_content(format!("<p>{}</p>", item.title)));
            progress.report(fetched.len()).await;
        }
        Ok(fetched)
    }
}

/// In-memory packager that counts opens and releases
pub(crate) struct MockPackager {
    next_handle: Arc<AtomicU64>,
    opened: Mutex<Vec<String>>,
    releases: Mutex<HashMap<ArtifactHandle, usize>>,
    reject_item: Option<String>,
}

impl MockPackager {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_handle: Arc::new(AtomicU64::new(1)),
            opened: Mutex::new(Vec::new()),
            releases: Mutex::new(HashMap::new()),
            reject_item: None,
        })
    }

    /// A packager whose archives fail to add the item with id `item_id`.
    pub(crate) fn rejecting(item_id: &str) -> Arc<Self> {
        Arc::new(Self {
            next_handle: Arc::new(AtomicU64::new(1)),
            opened: Mutex::new(Vec::new()),
            releases: Mutex::new(HashMap::new()),
            reject_item: Some(item_id.to_string()),
        })
    }

    /// Artifact names passed to `open`, in order
    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub(crate) fn release_count(&self, handle: &ArtifactHandle) -> usize {
        self.releases
            .lock()
            .unwrap()
            .get(handle)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_releases(&self) -> usize {
        self.releases.lock().unwrap().values().sum()
    }
}

#[async_trait::async_trait]
impl Packager for MockPackager {
    async fn open(&self, name: &str) -> Result<Box<dyn ArchiveBuilder>> {
        self.opened.lock().unwrap().push(name.to_string());
        Ok(Box::new(MockArchive {
            name: name.to_string(),
            items: Vec::new(),
            reject_item: self.reject_item.clone(),
            next_handle: Arc::clone(&self.next_handle),
        }))
    }

    async fn release(&self, handle: &ArtifactHandle) {
        *self.releases.lock().unwrap().entry(*handle).or_insert(0) += 1;
    }
}

struct MockArchive {
    name: String,
    items: Vec<String>,
    reject_item: Option<String>,
    next_handle: Arc<AtomicU64>,
}

#[async_trait::async_trait]
impl ArchiveBuilder for MockArchive {
    async fn add_item(&mut self, item: &WorkItem) -> Result<bool> {
        if self.reject_item.as_deref() == Some(item.id.as_str()) {
            return Err(Error::Package(format!("cannot pack {}", item.id)));
        }
        if !item.has_content() {
            return Ok(false);
        }
        self.items.push(item.id.clone());
        Ok(true)
    }

    async fn finish(self: Box<Self>) -> Result<PackagedArtifact> {
        Ok(PackagedArtifact {
            filename: format!("{}.zip", self.name),
            handle: ArtifactHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)),
            item_count: self.items.len(),
        })
    }
}

/// Default config with millisecond delays so tests run fast
pub(crate) fn fast_config() -> BatchConfig {
    BatchConfig {
        retry_delay: Duration::from_millis(1),
        download_delay: Duration::from_millis(1),
        pause_poll_interval: Duration::from_millis(5),
        ..BatchConfig::default()
    }
}

/// `n` items with urls and no content
pub(crate) fn items(n: usize) -> Vec<WorkItem> {
    (0..n)
        .map(|i| {
            WorkItem::new(format!("item-{i}"), format!("Item {i}"), 1_700_000_000)
                .with_url(format!("https://example.com/items/{i}"))
        })
        .collect()
}

pub(crate) fn create_test_runner(
    fetcher: Arc<MockFetcher>,
    packager: Arc<MockPackager>,
    config: BatchConfig,
) -> BatchRunner {
    BatchRunner::new(config, fetcher, packager).unwrap()
}

/// Poll `condition` every few milliseconds for up to five seconds.
pub(crate) async fn wait_until<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..1000 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
