use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use image::DynamicImage;
use log::warn;
use serde::Serialize;

use crate::config::AutomationConfig;
use crate::db::Database;
use crate::device::DeviceDriver;
use crate::error::AutomationError;
use crate::matching::SimilarityScorer;
use crate::models::{Decision, RunInfo, RunStatus};
use crate::references::{ReferenceImageInfo, ReferenceStore};
use crate::settings::SettingsStore;
use crate::swiper::{LoopSnapshot, SwipeController};

/// How many recent decisions `get_stats` ships to the UI.
const RECENT_DECISIONS_LIMIT: usize = 10;

/// Loop snapshot plus the recent decision trail, as served to the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopStats {
    pub snapshot: LoopSnapshot,
    pub recent_decisions: Vec<Decision>,
}

/// Facade wiring the store, database, settings, and loop controller
/// together behind the control surface the shell calls. The transport (IPC,
/// HTTP, whatever the shell speaks) is the shell's business.
pub struct SwipeService {
    db: Database,
    references: ReferenceStore,
    controller: SwipeController,
    settings: SettingsStore,
    scorer: Arc<dyn SimilarityScorer>,
}

impl SwipeService {
    /// Open (or create) everything under `data_dir`: the database, the
    /// saved reference images, the capture dump, and the settings file.
    /// Runs left `Running` by a crashed process are marked interrupted.
    pub async fn new(
        data_dir: impl Into<PathBuf>,
        device: Arc<dyn DeviceDriver>,
        scorer: Arc<dyn SimilarityScorer>,
    ) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let images_dir = data_dir.join("reference_images");
        std::fs::create_dir_all(&images_dir)?;
        let captures_dir = data_dir.join("captures");
        std::fs::create_dir_all(&captures_dir)?;

        let db = Database::new(data_dir.join("autoswipe.sqlite3"))?;

        for run in db.get_incomplete_runs().await? {
            let now = Utc::now();
            warn!("Recovered incomplete run {}; marking as Interrupted", run.id);
            db.mark_run_status(&run.id, RunStatus::Interrupted, None, Some(now), now)
                .await?;
        }

        let references = ReferenceStore::new(Some(images_dir));
        references.load_from_disk()?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?;

        let controller = SwipeController::new(
            db.clone(),
            references.clone(),
            device,
            Arc::clone(&scorer),
            Some(captures_dir),
        );

        Ok(Self {
            db,
            references,
            controller,
            settings,
            scorer,
        })
    }

    // --- loop control -----------------------------------------------------

    pub async fn start_loop(
        &self,
        config: AutomationConfig,
    ) -> Result<LoopSnapshot, AutomationError> {
        self.controller.start(config).await
    }

    pub async fn pause_loop(&self) -> Result<LoopSnapshot, AutomationError> {
        self.controller.pause().await
    }

    pub async fn resume_loop(&self) -> Result<LoopSnapshot, AutomationError> {
        self.controller.resume().await
    }

    pub async fn stop_loop(&self) -> Result<LoopSnapshot, AutomationError> {
        self.controller.stop().await
    }

    pub async fn get_stats(&self) -> LoopStats {
        LoopStats {
            snapshot: self.controller.snapshot().await,
            recent_decisions: self
                .controller
                .recent_decisions(RECENT_DECISIONS_LIMIT)
                .await,
        }
    }

    // --- reference images -------------------------------------------------

    pub fn upload_reference_image(&self, bytes: &[u8]) -> Result<String, AutomationError> {
        self.references
            .add(bytes)
            .map_err(|err| AutomationError::Configuration(format!("{err:#}")))
    }

    pub fn remove_reference_image(&self, id: &str) -> Result<(), AutomationError> {
        self.references.remove(id).map_err(AutomationError::Other)
    }

    pub fn list_reference_images(&self) -> Vec<ReferenceImageInfo> {
        self.references
            .snapshot()
            .iter()
            .map(ReferenceImageInfo::from)
            .collect()
    }

    pub fn clear_reference_images(&self) {
        self.references.clear();
    }

    // --- standalone comparison (manual testing outside the loop) ----------

    pub async fn compare_images(&self, a: &[u8], b: &[u8]) -> Result<f64, AutomationError> {
        fn decode(bytes: &[u8], which: &str) -> Result<DynamicImage, AutomationError> {
            image::load_from_memory(bytes)
                .map_err(|err| AutomationError::Configuration(format!("image {which}: {err}")))
        }

        let image_a = decode(a, "a")?;
        let image_b = decode(b, "b")?;
        let scorer = Arc::clone(&self.scorer);

        let similarity = tokio::task::spawn_blocking(move || scorer.score(&image_a, &image_b))
            .await
            .map_err(|err| AutomationError::Other(anyhow::anyhow!("scoring worker join failed: {err}")))?
            .map_err(|err| AutomationError::ScoringUnavailable(format!("{err:#}")))?;

        Ok(similarity.clamp(0.0, 1.0))
    }

    // --- run history ------------------------------------------------------

    pub async fn list_runs(&self) -> Result<Vec<RunInfo>, AutomationError> {
        let runs = self.db.list_runs().await.map_err(AutomationError::Other)?;
        Ok(runs.into_iter().map(RunInfo::from).collect())
    }

    pub async fn get_run_decisions(&self, run_id: &str) -> Result<Vec<Decision>, AutomationError> {
        self.db
            .get_decisions_for_run(run_id)
            .await
            .map_err(AutomationError::Other)
    }

    // --- settings ---------------------------------------------------------

    pub fn automation_defaults(&self) -> AutomationConfig {
        self.settings.automation_defaults()
    }

    pub fn set_automation_defaults(
        &self,
        config: AutomationConfig,
    ) -> Result<(), AutomationError> {
        self.settings.update_automation_defaults(config)
    }
}
