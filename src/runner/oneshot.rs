//! One-shot packing of an entire item list into a single archive.

use crate::collab::PackagedArtifact;
use crate::error::{Error, Result};
use crate::types::WorkItem;

use super::BatchRunner;

impl BatchRunner {
    /// Pack every item that already carries content into one archive named `base_name`.
    ///
    /// Items without content are skipped, and so are items the packager rejects (logged at warn).
    /// `packing_count` and `packing_progress` of the overall state track the progress. The caller
    /// owns the returned handle and releases it through the packager when done.
    ///
    /// A cancellation raised while packing aborts with [`Error::Cancelled`]; a token that was
    /// already cancelled when the call started (a finished, cancelled run) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuccessfulItems`] when nothing could be packed.
    pub async fn pack_and_save(
        &self,
        items: &[WorkItem],
        base_name: &str,
    ) -> Result<PackagedArtifact> {
        let token = self.flags.cancel_token.lock().await.clone();
        let honor_cancel = !token.is_cancelled();

        {
            let mut state = self.state.write().await;
            state.overall.packing_count = Some(0);
            state.overall.packing_progress = Some(0.0);
        }

        tracing::info!(items = items.len(), name = %base_name, "Packing items into one archive");

        let mut archive = self.packager.open(base_name).await?;
        let mut packed = 0usize;

        for item in items {
            if honor_cancel && token.is_cancelled() {
                tracing::info!(packed, "Packing cancelled");
                return Err(Error::Cancelled);
            }
            if !item.has_content() {
                continue;
            }

            match archive.add_item(item).await {
                Ok(true) => {
                    packed += 1;
                    let mut state = self.state.write().await;
                    state.overall.packing_count = Some(packed);
                    state.overall.packing_progress =
                        Some(packed as f64 / items.len() as f64 * 100.0);
                    tracing::debug!(item_id = %item.id, packed, total = items.len(), "Packed item");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(item_id = %item.id, title = %item.title, error = %e, "Failed to pack item, skipping");
                }
            }
        }

        if packed == 0 {
            return Err(Error::NoSuccessfulItems);
        }

        let artifact = archive.finish().await?;
        tracing::info!(
            filename = %artifact.filename,
            packed,
            "Archive saved"
        );
        Ok(artifact)
    }
}
