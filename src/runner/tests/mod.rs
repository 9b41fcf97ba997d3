use super::test_helpers::*;
use super::*;
use crate::config::ConfigOverrides;
use crate::types::Status;


/// Everything broadcast so far
fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Spawn `start` on a clone of `runner`.
fn spawn_run(
    runner: &BatchRunner,
    items: Vec<crate::types::WorkItem>,
    base_name: &str,
) -> tokio::task::JoinHandle<Result<()>> {
    let runner = runner.clone();
    let base_name = base_name.to_string();
    tokio::spawn(async move {
        runner
            .start(items, &base_name, ConfigOverrides::default())
            .await
    })
}

/// Wait until the batch at `index` is in `status`.
async fn wait_for_batch(runner: &BatchRunner, index: usize, status: Status) {
    let reached = wait_until(|| async move {
        runner
            .batches()
            .await
            .get(index)
            .is_some_and(|b| b.status == status)
    })
    .await;
    assert!(reached, "batch {index} never reached {status:?}");
}
