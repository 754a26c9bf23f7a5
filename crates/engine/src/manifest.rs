//! Manifest commits and lookups.

use crate::error::{Error, Result};
use crate::records;
use crate::retry::RetryPolicy;
use std::sync::Arc;
use tessera_core::{Manifest, ResourceId};
use tessera_storage::{PutOutcome, Table, TableStore};
use tokio_util::sync::CancellationToken;

/// Result of a manifest commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The manifest is now current.
    Committed,
    /// An equal-or-newer write already won; the stored row is unchanged.
    Rejected { current: Option<Manifest> },
}

/// The single serialization point for what version of a resource is current.
#[derive(Clone)]
pub struct ManifestManager {
    store: Arc<dyn TableStore>,
    policy: RetryPolicy,
}

impl ManifestManager {
    pub fn new(store: Arc<dyn TableStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Conditionally write `manifest`. See [`Manifest::supersedes`] for the
    /// acceptance rule. A rejection is an outcome, not an error, and is
    /// never retried.
    pub async fn commit(&self, manifest: &Manifest) -> Result<CommitOutcome> {
        self.commit_with(manifest, None).await
    }

    /// Like [`commit`](Self::commit), but no attempt is started once
    /// `cancel` has fired.
    pub async fn commit_with(
        &self,
        manifest: &Manifest,
        cancel: Option<&CancellationToken>,
    ) -> Result<CommitOutcome> {
        let item = records::manifest_to_item(manifest);
        let condition = records::commit_condition(manifest);

        let outcome = self
            .policy
            .call_guarded("put manifest", cancel, || {
                self.store
                    .put_item(Table::Manifest, item.clone(), Some(condition.clone()))
            })
            .await?;

        match outcome {
            PutOutcome::Written => {
                tracing::info!(
                    resource_id = %manifest.resource_id,
                    version_id = %manifest.version_id,
                    chunk_count = manifest.chunk_count,
                    update_time = %manifest.update_time,
                    "manifest committed"
                );
                Ok(CommitOutcome::Committed)
            }
            PutOutcome::ConditionFailed { current } => {
                let current = current
                    .as_ref()
                    .map(records::manifest_from_item)
                    .transpose()?;
                tracing::warn!(
                    resource_id = %manifest.resource_id,
                    version_id = %manifest.version_id,
                    update_time = %manifest.update_time,
                    current_version = ?current.as_ref().map(|m| m.version_id),
                    "manifest commit rejected by a newer write"
                );
                Ok(CommitOutcome::Rejected { current })
            }
        }
    }

    /// Read the current manifest, failing with [`Error::NotFound`] if none.
    pub async fn fetch(&self, resource_id: &ResourceId) -> Result<Manifest> {
        self.try_fetch(resource_id)
            .await?
            .ok_or_else(|| Error::NotFound(resource_id.clone()))
    }

    /// Read the current manifest, if any.
    pub async fn try_fetch(&self, resource_id: &ResourceId) -> Result<Option<Manifest>> {
        let key = resource_id.to_key();
        let item = self
            .policy
            .call("get manifest", None, || {
                self.store.get_item(Table::Manifest, &key)
            })
            .await?;

        item.as_ref().map(records::manifest_from_item).transpose()
    }
}
