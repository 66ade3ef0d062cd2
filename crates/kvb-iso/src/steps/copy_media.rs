use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kvb_core::cluster::BundleStore;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::resources;
use crate::steps::{race, retain};

/// Stages installer files in a ConfigMap named after the machine.
pub struct StepCopyMediaFiles {
    config: Arc<BuildConfig>,
    store: Arc<dyn BundleStore>,
}

impl StepCopyMediaFiles {
    pub fn new(config: Arc<BuildConfig>, store: Arc<dyn BundleStore>) -> Self {
        Self { config, store }
    }

    /// File contents keyed by basename; inline content overrides files.
    async fn collect(&self) -> Result<BTreeMap<String, String>, StepError> {
        let mut data = BTreeMap::new();

        for path in &self.config.media_files {
            let name = basename(path)?;
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                StepError::Failed(format!("cannot read media file {}: {e}", path.display()))
            })?;
            debug!(file = %path.display(), key = %name, "staging media file");
            data.insert(name, content);
        }
        for (name, content) in &self.config.media_content {
            data.insert(name.clone(), content.clone());
        }
        Ok(data)
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<(), StepError> {
        info!(
            namespace = %self.config.namespace,
            name = %self.config.vm_name,
            "creating ConfigMap to store media files"
        );
        let data = self.collect().await?;
        let cm = resources::media_config_map(&self.config, data);
        race(cancel, "media ConfigMap creation", self.store.create_config_map(&cm)).await?;
        Ok(())
    }
}

fn basename(path: &Path) -> Result<String, StepError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| StepError::Failed(format!("media file {} has no file name", path.display())))
}

#[async_trait]
impl Step for StepCopyMediaFiles {
    fn name(&self) -> &'static str {
        "copy-media-files"
    }

    async fn run(&self, cancel: &CancellationToken, _state: &mut StateBag) -> StepAction {
        self.execute(cancel).await.into()
    }

    async fn cleanup(&self, state: &mut StateBag) -> Result<(), StepError> {
        let ns = &self.config.namespace;
        let name = &self.config.vm_name;

        if self.config.keep_media.is_enabled() {
            info!(namespace = %ns, name = %name, "keeping ConfigMap because keep_media = true");
            retain(state, "ConfigMap", ns, name);
            return Ok(());
        }

        info!(namespace = %ns, name = %name, "deleting ConfigMap");
        match self.store.delete_config_map(ns, name).await {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use kvb_core::testing::FakeCluster;
    use kvb_model::{Flag, ResourceRef, constants::STATE_RETAINED};

    use super::*;
    use crate::steps::fixtures;

    fn temp_file(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("kvb-media-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn inline_content_wins_over_file() {
        let cluster = FakeCluster::new();
        let mut config = fixtures::config();
        config.media_files = vec![
            temp_file("ks.cfg", "from file"),
            temp_file("extra.sh", "echo hi"),
        ];
        config.media_content.insert("ks.cfg".into(), "inline".into());

        let step = StepCopyMediaFiles::new(Arc::new(config), Arc::new(cluster.clone()));
        let action = step
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;
        assert!(action.is_continue());

        let cm = cluster.config_map("images", "fedora-42-builder").unwrap();
        assert_eq!(cm.data.get("ks.cfg").map(String::as_str), Some("inline"));
        assert_eq!(cm.data.get("extra.sh").map(String::as_str), Some("echo hi"));
    }

    #[tokio::test]
    async fn unreadable_file_halts_before_create() {
        let cluster = FakeCluster::new();
        let mut config = fixtures::config();
        config.media_files = vec!["/nonexistent/kvb/ks.cfg".into()];

        let step = StepCopyMediaFiles::new(Arc::new(config), Arc::new(cluster.clone()));
        let action = step
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;
        assert!(!action.is_continue());
        assert!(!cluster.called("create_config_map"));
    }

    #[tokio::test]
    async fn cleanup_deletes_unless_kept() {
        let cluster = FakeCluster::new();
        let step = StepCopyMediaFiles::new(Arc::new(fixtures::config()), Arc::new(cluster.clone()));
        let mut state = StateBag::new();
        step.run(&CancellationToken::new(), &mut state).await;

        step.cleanup(&mut state).await.unwrap();
        assert!(cluster.config_map("images", "fedora-42-builder").is_none());
    }

    #[tokio::test]
    async fn kept_media_is_reported() {
        let cluster = FakeCluster::new();
        let mut config = fixtures::config();
        config.keep_media = Flag::enabled();
        let step = StepCopyMediaFiles::new(Arc::new(config), Arc::new(cluster.clone()));
        let mut state = StateBag::new();
        step.run(&CancellationToken::new(), &mut state).await;

        step.cleanup(&mut state).await.unwrap();
        assert!(cluster.config_map("images", "fedora-42-builder").is_some());
        assert_eq!(
            state.get::<Vec<ResourceRef>>(STATE_RETAINED).unwrap()[0],
            ResourceRef::new("ConfigMap", "images", "fedora-42-builder")
        );
    }
}
