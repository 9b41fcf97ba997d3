//! Custom assertions for archive output and run events

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use autobatch::{Event, WorkItem};
use tokio::sync::broadcast;

/// Names of all entries in the zip archive at `path`
pub fn zip_entries(path: &Path) -> Vec<String> {
    let bytes = std::fs::read(path).unwrap();
    zip_entries_from_bytes(&bytes)
}

/// Names of all entries in an in-memory zip archive
pub fn zip_entries_from_bytes(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Expected entry path of an item inside an archive
pub fn expected_entry(item: &WorkItem) -> String {
    let date = chrono::DateTime::from_timestamp(item.published_at, 0)
        .unwrap()
        .format("%Y-%m-%d");
    format!(
        "{} {}/{}.html",
        date,
        item.title.replace('/', "_"),
        item.title.replace(['.', '/'], "_")
    )
}

/// Wait for `RunCompleted` or `RunFailed`, collecting every event on the way
pub async fn collect_until_finished(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let finished = matches!(event, Event::RunCompleted { .. } | Event::RunFailed { .. });
            seen.push(event);
            if finished {
                break;
            }
        }
    })
    .await;
    seen
}
