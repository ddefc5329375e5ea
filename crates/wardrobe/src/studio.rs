//! Try-on orchestration.
//!
//! The [`Studio`] owns the wardrobe, outfit and result lists. Remote work runs
//! in detached tokio tasks that never touch those lists; each chain ends by
//! sending exactly one [`StudioUpdate`] back, which the owner folds in with
//! [`Studio::apply`].

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tryon::{Deadline, PollPolicy, TryOnApi, TryOnClient};
use wardrobe_common::{GarmentCategory, JobRecord, OutfitRecord, WardrobeItem};

use crate::{
    config::AppConfig,
    error::{Result, StudioError},
    store::{FileStore, JsonFileStore, LocalFileStore, ObjectStore},
    wardrobe::Wardrobe,
};

const INTERRUPTED: &str = "interrupted before it finished";

/// Terminal outcome of one background chain
#[derive(Debug, Clone, PartialEq)]
pub enum StudioUpdate {
    OutfitReady {
        id: String,
        image_url: String,
        local_path: String,
    },
    OutfitDiscarded {
        id: String,
        reason: String,
    },
    ResultCompleted {
        id: String,
        image_url: String,
        local_path: String,
    },
    ResultFailed {
        id: String,
        reason: String,
    },
}

impl StudioUpdate {
    /// Id of the record this update is about
    pub fn record_id(&self) -> &str {
        match self {
            Self::OutfitReady { id, .. }
            | Self::OutfitDiscarded { id, .. }
            | Self::ResultCompleted { id, .. }
            | Self::ResultFailed { id, .. } => id,
        }
    }
}

/// Everything a chain needs, detached from the owning [`Studio`]
#[derive(Clone)]
struct ChainContext {
    client: TryOnClient,
    files: Arc<dyn FileStore>,
    updates: mpsc::UnboundedSender<StudioUpdate>,
}

impl ChainContext {
    fn send(&self, update: StudioUpdate) {
        if self.updates.send(update).is_err() {
            debug!("Studio dropped before chain finished");
        }
    }

    /// Download `url` and keep it as a JPEG under `name`
    async fn persist_output(&self, url: &str, name: &str, deadline: &Deadline) -> Result<String> {
        let image = self.client.fetch_image(url, deadline).await?;
        let jpeg = encode_jpeg(&image)?;
        match self.files.save_file(&jpeg, name) {
            Ok(path) => Ok(path),
            Err(err) => {
                // The failed write may have left something behind
                if let Err(cleanup) = self.files.delete_file(name) {
                    warn!(path = name, error = %cleanup, "Could not delete file");
                }
                Err(err.into())
            }
        }
    }
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut bytes, ImageFormat::Jpeg)?;
    Ok(bytes.into_inner())
}

/// Owner of the wardrobe, outfit and result lists
pub struct Studio {
    wardrobe: Wardrobe,
    outfits: Vec<OutfitRecord>,
    results: Vec<JobRecord>,
    outfit_store: Arc<dyn ObjectStore<OutfitRecord>>,
    result_store: Arc<dyn ObjectStore<JobRecord>>,
    outfit_policy: PollPolicy,
    single_policy: PollPolicy,
    chains: HashMap<String, CancellationToken>,
    root: CancellationToken,
    context: ChainContext,
    updates: mpsc::UnboundedReceiver<StudioUpdate>,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("wardrobe", &self.wardrobe)
            .field("outfits", &self.outfits)
            .field("results", &self.results)
            .field("in_flight", &self.chains.len())
            .finish_non_exhaustive()
    }
}

impl Studio {
    /// Assemble a studio from injected collaborators, loading persisted records.
    ///
    /// Records left processing or pending by an earlier run have no chain to
    /// finish them: such outfits are discarded and such results marked failed.
    pub fn new(
        wardrobe: Wardrobe,
        outfit_store: Arc<dyn ObjectStore<OutfitRecord>>,
        result_store: Arc<dyn ObjectStore<JobRecord>>,
        client: TryOnClient,
    ) -> Result<Self> {
        let mut outfits = outfit_store.get_all()?;
        let mut results = result_store.get_all()?;
        outfits.sort_by_key(|outfit| outfit.created_at);
        results.sort_by_key(|result| result.created_at);

        let (sender, updates) = mpsc::unbounded_channel();
        let context = ChainContext {
            client,
            files: wardrobe.files().clone(),
            updates: sender,
        };

        let mut studio = Self {
            wardrobe,
            outfits,
            results,
            outfit_store,
            result_store,
            outfit_policy: PollPolicy::OUTFIT,
            single_policy: PollPolicy::SINGLE,
            chains: HashMap::new(),
            root: CancellationToken::new(),
            context,
            updates,
        };
        studio.recover_interrupted()?;
        Ok(studio)
    }

    fn recover_interrupted(&mut self) -> Result<()> {
        let (stale, outfits): (Vec<_>, Vec<_>) = std::mem::take(&mut self.outfits)
            .into_iter()
            .partition(OutfitRecord::is_processing);
        self.outfits = outfits;
        for outfit in stale {
            self.outfit_store.delete(&outfit.id)?;
            self.discard_file(&format!("outfits/{}.jpg", outfit.id));
            warn!(id = %outfit.id, "Discarded outfit interrupted while processing");
        }

        for result in self.results.iter_mut().filter(|result| result.is_pending()) {
            result.fail(INTERRUPTED)?;
            self.result_store.put(result)?;
            warn!(id = %result.id, "Marked interrupted try-on result failed");
        }
        Ok(())
    }

    /// File-backed studio rooted at `config.storage.root`
    pub fn open(config: &AppConfig, api: Arc<dyn TryOnApi>) -> Result<Self> {
        let root = &config.storage.root;
        let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(root));
        let wardrobe = Wardrobe::open(Arc::new(JsonFileStore::<WardrobeItem>::new(root.join("items.json"))), files)?;
        let client = TryOnClient::new(api).with_jpeg_quality(config.masking.jpeg_quality);

        Ok(Self::new(
            wardrobe,
            Arc::new(JsonFileStore::<OutfitRecord>::new(root.join("outfits.json"))),
            Arc::new(JsonFileStore::<JobRecord>::new(root.join("results.json"))),
            client,
        )?
        .with_policies(config.outfit_policy(), config.single_policy()))
    }

    pub fn with_policies(mut self, outfit: PollPolicy, single: PollPolicy) -> Self {
        self.outfit_policy = outfit;
        self.single_policy = single;
        self
    }

    pub fn wardrobe(&self) -> &Wardrobe {
        &self.wardrobe
    }

    pub fn wardrobe_mut(&mut self) -> &mut Wardrobe {
        &mut self.wardrobe
    }

    pub fn outfits(&self) -> &[OutfitRecord] {
        &self.outfits
    }

    pub fn outfit(&self, id: &str) -> Option<&OutfitRecord> {
        self.outfits.iter().find(|outfit| outfit.id == id)
    }

    pub fn results(&self) -> &[JobRecord] {
        &self.results
    }

    pub fn result(&self, id: &str) -> Option<&JobRecord> {
        self.results.iter().find(|result| result.id == id)
    }

    /// Number of chains still running
    pub fn in_flight(&self) -> usize {
        self.chains.len()
    }

    /// Compose `top_id` then `bottom_id` onto `base`.
    ///
    /// The processing placeholder is returned straight away; the chain runs
    /// in the background under the outfit budget.
    pub fn start_outfit(
        &mut self,
        base: DynamicImage,
        top_id: &str,
        bottom_id: &str,
        accessories: Vec<String>,
    ) -> Result<OutfitRecord> {
        let top = self.garment(top_id)?;
        let bottom = self.garment(bottom_id)?;

        let record = OutfitRecord::processing(top_id, bottom_id, accessories);
        self.outfit_store.put(&record)?;
        self.outfits.push(record.clone());
        info!(id = %record.id, top = top_id, bottom = bottom_id, "Outfit placeholder created");

        let token = self.root.child_token();
        self.chains.insert(record.id.clone(), token.clone());

        let context = self.context.clone();
        let policy = self.outfit_policy;
        let id = record.id.clone();
        tokio::spawn(async move {
            let deadline = Deadline::with_token(policy.budget, token);
            let update = match outfit_chain(&context, &id, base, top, bottom, policy, &deadline).await {
                Ok((image_url, local_path)) => StudioUpdate::OutfitReady {
                    id,
                    image_url,
                    local_path,
                },
                Err(err) => {
                    warn!(%id, error = %err, "Outfit chain failed");
                    StudioUpdate::OutfitDiscarded {
                        id,
                        reason: err.to_string(),
                    }
                }
            };
            context.send(update);
        });

        Ok(record)
    }

    /// Submit one garment onto one photo.
    ///
    /// A rejected submission creates no record. Otherwise a pending record is
    /// returned and polled in the background under the single-flow budget.
    pub async fn start_try_on(
        &mut self,
        model: DynamicImage,
        garment: DynamicImage,
        category: GarmentCategory,
    ) -> Result<JobRecord> {
        let token = self.root.child_token();
        let deadline = Deadline::with_token(self.single_policy.budget, token.clone());
        let job_id = deadline
            .guard(self.context.client.submit(&model, &garment, category))
            .await?;

        let record = JobRecord::pending(job_id, category);
        self.result_store.put(&record)?;
        self.results.push(record.clone());
        self.chains.insert(record.id.clone(), token);
        info!(id = %record.id, %category, "Try-on result pending");

        let context = self.context.clone();
        let interval = self.single_policy.interval;
        let id = record.id.clone();
        tokio::spawn(async move {
            let outcome = async {
                let report = context.client.poll(&id, interval, &deadline).await?;
                let local_path = context
                    .persist_output(report.output_url(), &format!("results/{id}.jpg"), &deadline)
                    .await?;
                Ok::<_, StudioError>((report.output_url().to_string(), local_path))
            }
            .await;

            let update = match outcome {
                Ok((image_url, local_path)) => StudioUpdate::ResultCompleted {
                    id,
                    image_url,
                    local_path,
                },
                Err(err) => {
                    warn!(%id, error = %err, "Try-on failed");
                    StudioUpdate::ResultFailed {
                        id,
                        reason: err.to_string(),
                    }
                }
            };
            context.send(update);
        });

        Ok(record)
    }

    /// Wait for the next chain to finish
    pub async fn next_update(&mut self) -> Option<StudioUpdate> {
        self.updates.recv().await
    }

    /// Fold a chain outcome into the lists and the stores
    pub fn apply(&mut self, update: StudioUpdate) -> Result<()> {
        self.chains.remove(update.record_id());

        match update {
            StudioUpdate::OutfitReady { id, image_url, local_path } => {
                let Some(index) = self.outfits.iter().position(|o| o.id == id) else {
                    info!(%id, "Outfit deleted while processing; dropping its image");
                    self.discard_file(&local_path);
                    return Ok(());
                };

                let mut ready = self.outfits[index].clone();
                ready.finish(image_url, local_path.clone())?;
                if let Err(err) = self.outfit_store.put(&ready) {
                    self.outfits.remove(index);
                    self.discard_file(&local_path);
                    if let Err(cleanup) = self.outfit_store.delete(&id) {
                        warn!(%id, error = %cleanup, "Could not discard outfit record");
                    }
                    return Err(err.into());
                }
                self.outfits[index] = ready;
                info!(%id, "Outfit ready");
            }
            StudioUpdate::OutfitDiscarded { id, reason } => {
                if let Some(index) = self.outfits.iter().position(|o| o.id == id) {
                    self.outfits.remove(index);
                    self.outfit_store.delete(&id)?;
                    info!(%id, %reason, "Outfit discarded");
                }
            }
            StudioUpdate::ResultCompleted { id, image_url, local_path } => {
                let Some(index) = self.results.iter().position(|r| r.id == id) else {
                    info!(%id, "Result deleted while pending; dropping its image");
                    self.discard_file(&local_path);
                    return Ok(());
                };

                let mut completed = self.results[index].clone();
                completed.complete(image_url, Some(local_path.clone()))?;
                if let Err(err) = self.result_store.put(&completed) {
                    self.discard_file(&local_path);
                    let record = &mut self.results[index];
                    record.fail(err.to_string())?;
                    if let Err(retry) = self.result_store.put(record) {
                        warn!(%id, error = %retry, "Could not persist failed result");
                    }
                    return Err(err.into());
                }
                self.results[index] = completed;
                info!(%id, "Try-on result completed");
            }
            StudioUpdate::ResultFailed { id, reason } => {
                if let Some(record) = self.results.iter_mut().find(|r| r.id == id) {
                    record.fail(reason)?;
                    self.result_store.put(record)?;
                    info!(%id, "Try-on result failed");
                }
            }
        }
        Ok(())
    }

    /// Remove an outfit and its image, cancelling it if still processing
    pub fn delete_outfit(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.outfits.iter().position(|o| o.id == id) else {
            return Ok(false);
        };
        self.cancel_chain(id);
        self.outfit_store.delete(id)?;
        let outfit = self.outfits.remove(index);
        if let Some(path) = outfit.local_path() {
            self.discard_file(path);
        }
        info!(%id, "Outfit deleted");
        Ok(true)
    }

    /// Remove a try-on result and its image, cancelling it if still pending
    pub fn delete_result(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.results.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        self.cancel_chain(id);
        self.result_store.delete(id)?;
        let result = self.results.remove(index);
        if let Some(path) = result.local_path() {
            self.discard_file(path);
        }
        info!(%id, "Try-on result deleted");
        Ok(true)
    }

    /// Cancel every in-flight chain
    pub fn shutdown(&self) {
        info!(in_flight = self.chains.len(), "Cancelling studio chains");
        self.root.cancel();
    }

    fn garment(&self, id: &str) -> Result<(WardrobeItem, DynamicImage)> {
        let item = self
            .wardrobe
            .item(id)
            .cloned()
            .ok_or_else(|| StudioError::UnknownItem(id.to_string()))?;
        let image = self.wardrobe.load_image(id)?;
        Ok((item, image))
    }

    fn cancel_chain(&mut self, id: &str) {
        if let Some(token) = self.chains.remove(id) {
            token.cancel();
        }
    }

    fn discard_file(&self, relative: &str) {
        if let Err(err) = self.context.files.delete_file(relative) {
            warn!(path = relative, error = %err, "Could not delete file");
        }
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Top onto the base photo, then bottom onto that intermediate
async fn outfit_chain(
    context: &ChainContext,
    id: &str,
    base: DynamicImage,
    (top, top_image): (WardrobeItem, DynamicImage),
    (bottom, bottom_image): (WardrobeItem, DynamicImage),
    policy: PollPolicy,
    deadline: &Deadline,
) -> Result<(String, String)> {
    let client = &context.client;

    let first = client
        .run(&base, &top_image, top.category, policy.interval, deadline)
        .await?;
    debug!(%id, job = %first.job_id, "Top layer rendered");
    let intermediate = client.fetch_image(first.output_url(), deadline).await?;

    let second = client
        .run(&intermediate, &bottom_image, bottom.category, policy.interval, deadline)
        .await?;
    debug!(%id, job = %second.job_id, "Bottom layer rendered");

    let local_path = context
        .persist_output(second.output_url(), &format!("outfits/{id}.jpg"), deadline)
        .await?;
    Ok((second.output_url().to_string(), local_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{LocalFileStore, MemoryStore};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::time::Instant;
    use tryon::TryOnError;
    use tryon::testing::{ScriptedApi, Step, png_bytes};
    use wardrobe_common::{JobStatus, OutfitState};

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        studio: Studio,
        api: Arc<ScriptedApi>,
    }

    fn fixture(api: ScriptedApi) -> Fixture {
        fixture_with_files(api, |root| Arc::new(LocalFileStore::new(root)))
    }

    fn fixture_with_files(
        api: ScriptedApi,
        files: impl FnOnce(&std::path::Path) -> Arc<dyn FileStore>,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let api = Arc::new(api);
        let wardrobe = Wardrobe::open(Arc::new(MemoryStore::<WardrobeItem>::new()), files(&root)).unwrap();
        let studio = Studio::new(
            wardrobe,
            Arc::new(MemoryStore::<OutfitRecord>::new()),
            Arc::new(MemoryStore::<JobRecord>::new()),
            TryOnClient::new(api.clone()),
        )
        .unwrap();
        Fixture { _dir: dir, root, studio, api }
    }

    fn photo(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([150, 120, 110, 255])))
    }

    fn add_items(studio: &mut Studio) -> (String, String) {
        let cutout = RgbaImage::from_pixel(6, 6, Rgba([10, 200, 10, 255]));
        let top = studio.wardrobe_mut().add_cutout(&cutout, GarmentCategory::Top).unwrap();
        let bottom = studio.wardrobe_mut().add_cutout(&cutout, GarmentCategory::Bottom).unwrap();
        (top.id, bottom.id)
    }

    fn data_uri_size(uri: &str) -> (u32, u32) {
        let payload = uri.split_once(',').unwrap().1;
        let image = image::load_from_memory(&STANDARD.decode(payload).unwrap()).unwrap();
        (image.width(), image.height())
    }

    #[tokio::test(start_paused = true)]
    async fn test_outfit_chains_top_then_bottom() {
        let step1 = "https://cdn.example/step1.png";
        let step2 = "https://cdn.example/step2.png";
        let api = ScriptedApi::new()
            .steps([
                Step::Processing,
                Step::Completed(vec![step1.into()]),
                Step::Processing,
                Step::Processing,
                Step::Completed(vec![step2.into()]),
            ])
            .serve(step1, png_bytes(30, 40))
            .serve(step2, png_bytes(30, 40));
        let mut fx = fixture(api);
        let (top, bottom) = add_items(&mut fx.studio);

        let placeholder = fx.studio.start_outfit(photo(20, 20), &top, &bottom, Vec::new()).unwrap();
        assert!(placeholder.is_processing());
        assert_eq!(fx.studio.outfits().len(), 1);

        let update = fx.studio.next_update().await.unwrap();
        assert!(matches!(&update, StudioUpdate::OutfitReady { image_url, .. } if image_url == step2));
        fx.studio.apply(update).unwrap();

        let outfit = fx.studio.outfit(&placeholder.id).unwrap();
        let path = outfit.local_path().unwrap();
        assert!(path.ends_with(".jpg"));
        assert!(fx.root.join(path).exists());
        assert!(matches!(&outfit.state, OutfitState::Ready { image_url, .. } if image_url == step2));

        let requests = fx.api.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].category, "tops");
        assert_eq!(requests[1].category, "bottoms");
        assert_eq!(data_uri_size(&requests[0].model_image), (20, 20));
        // Bottom goes onto the intermediate render, not the base photo
        assert_eq!(data_uri_size(&requests[1].model_image), (30, 40));
        assert_eq!(fx.studio.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_outfit_is_removed_within_budget() {
        let mut fx = fixture(ScriptedApi::new());
        let (top, bottom) = add_items(&mut fx.studio);
        let started = Instant::now();

        let placeholder = fx.studio.start_outfit(photo(20, 20), &top, &bottom, Vec::new()).unwrap();
        let update = fx.studio.next_update().await.unwrap();

        assert!(started.elapsed() <= PollPolicy::OUTFIT.budget + Duration::from_secs(1));
        assert!(matches!(&update, StudioUpdate::OutfitDiscarded { id, .. } if *id == placeholder.id));
        fx.studio.apply(update).unwrap();
        assert!(fx.studio.outfits().is_empty());
        assert!(!fx.root.join("outfits").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_second_step_discards_outfit() {
        let step1 = "https://cdn.example/step1.png";
        let api = ScriptedApi::new()
            .steps([Step::Completed(vec![step1.into()]), Step::Failed("pose not detected".into())])
            .serve(step1, png_bytes(20, 20));
        let mut fx = fixture(api);
        let (top, bottom) = add_items(&mut fx.studio);

        fx.studio.start_outfit(photo(20, 20), &top, &bottom, Vec::new()).unwrap();
        let update = fx.studio.next_update().await.unwrap();
        assert!(matches!(&update, StudioUpdate::OutfitDiscarded { reason, .. } if reason.contains("pose not detected")));

        fx.studio.apply(update).unwrap();
        assert!(fx.studio.outfits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_item_creates_no_placeholder() {
        let mut fx = fixture(ScriptedApi::new());
        let (top, _) = add_items(&mut fx.studio);

        let err = fx.studio.start_outfit(photo(20, 20), &top, "missing", Vec::new()).unwrap_err();
        assert!(matches!(err, StudioError::UnknownItem(_)));
        assert!(fx.studio.outfits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_try_on_completes() {
        let url = "https://cdn.example/result.png";
        let api = ScriptedApi::new()
            .accept("job-42")
            .steps([Step::Processing, Step::Completed(vec![url.into()])])
            .serve(url, png_bytes(12, 16));
        let mut fx = fixture(api);

        let record = fx
            .studio
            .start_try_on(photo(12, 16), photo(6, 6), GarmentCategory::Dress)
            .await
            .unwrap();
        assert_eq!(record.id, "job-42");
        assert!(record.is_pending());

        let update = fx.studio.next_update().await.unwrap();
        fx.studio.apply(update).unwrap();

        let result = fx.studio.result("job-42").unwrap();
        assert!(result.is_completed());
        assert!(fx.root.join(result.local_path().unwrap()).exists());
        assert_eq!(fx.api.requests()[0].category, "one-pieces");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_submission_creates_no_record() {
        let mut fx = fixture(ScriptedApi::new().reject("model photo has no person"));

        let err = fx
            .studio
            .start_try_on(photo(12, 16), photo(6, 6), GarmentCategory::Top)
            .await
            .unwrap_err();

        assert!(matches!(err, StudioError::TryOn(TryOnError::Submission { .. })));
        assert!(fx.studio.results().is_empty());
        assert_eq!(fx.api.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_try_on_times_out_as_failed() {
        let mut fx = fixture(ScriptedApi::new());
        let started = Instant::now();

        let record = fx
            .studio
            .start_try_on(photo(12, 16), photo(6, 6), GarmentCategory::Top)
            .await
            .unwrap();
        let update = fx.studio.next_update().await.unwrap();
        fx.studio.apply(update).unwrap();

        assert!(started.elapsed() <= PollPolicy::SINGLE.budget + Duration::from_secs(1));
        let result = fx.studio.result(&record.id).unwrap();
        assert!(matches!(&result.status, JobStatus::Failed { reason } if reason.contains("did not finish")));
    }

    #[derive(Debug)]
    struct ReadOnlyFiles(LocalFileStore);

    impl FileStore for ReadOnlyFiles {
        fn save_file(&self, _bytes: &[u8], _name: &str) -> crate::error::StoreResult<String> {
            Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only")))
        }
        fn read_file(&self, relative: &str) -> crate::error::StoreResult<Vec<u8>> {
            self.0.read_file(relative)
        }
        fn absolute_path(&self, relative: &str) -> PathBuf {
            self.0.absolute_path(relative)
        }
        fn delete_file(&self, relative: &str) -> crate::error::StoreResult<bool> {
            self.0.delete_file(relative)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_marks_result_failed() {
        let url = "https://cdn.example/result.png";
        let api = ScriptedApi::new()
            .steps([Step::Completed(vec![url.into()])])
            .serve(url, png_bytes(4, 4));
        let mut fx = fixture_with_files(api, |root| Arc::new(ReadOnlyFiles(LocalFileStore::new(root))));

        let record = fx
            .studio
            .start_try_on(photo(4, 4), photo(4, 4), GarmentCategory::Shoes)
            .await
            .unwrap();
        let update = fx.studio.next_update().await.unwrap();
        assert!(matches!(update, StudioUpdate::ResultFailed { .. }));
        fx.studio.apply(update).unwrap();

        assert!(matches!(fx.studio.result(&record.id).unwrap().status, JobStatus::Failed { .. }));
    }

    #[derive(Debug)]
    struct BrokenFiles(ReadOnlyFiles);

    impl FileStore for BrokenFiles {
        fn save_file(&self, bytes: &[u8], name: &str) -> crate::error::StoreResult<String> {
            self.0.save_file(bytes, name)
        }
        fn read_file(&self, relative: &str) -> crate::error::StoreResult<Vec<u8>> {
            self.0.read_file(relative)
        }
        fn absolute_path(&self, relative: &str) -> PathBuf {
            self.0.absolute_path(relative)
        }
        fn delete_file(&self, _relative: &str) -> crate::error::StoreResult<bool> {
            Err(StoreError::Io(std::io::Error::other("locked")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cleanup_keeps_save_error() {
        let url = "https://cdn.example/result.png";
        let api = ScriptedApi::new()
            .steps([Step::Completed(vec![url.into()])])
            .serve(url, png_bytes(4, 4));
        let mut fx =
            fixture_with_files(api, |root| Arc::new(BrokenFiles(ReadOnlyFiles(LocalFileStore::new(root)))));

        let record = fx
            .studio
            .start_try_on(photo(4, 4), photo(4, 4), GarmentCategory::Top)
            .await
            .unwrap();
        let update = fx.studio.next_update().await.unwrap();
        assert!(matches!(&update, StudioUpdate::ResultFailed { reason, .. } if reason.contains("read-only")));
        fx.studio.apply(update).unwrap();

        assert!(matches!(
            &fx.studio.result(&record.id).unwrap().status,
            JobStatus::Failed { reason } if !reason.contains("locked")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_result_removes_file() {
        let url = "https://cdn.example/result.png";
        let api = ScriptedApi::new()
            .steps([Step::Completed(vec![url.into()])])
            .serve(url, png_bytes(4, 4));
        let mut fx = fixture(api);

        let record = fx
            .studio
            .start_try_on(photo(4, 4), photo(4, 4), GarmentCategory::Top)
            .await
            .unwrap();
        let update = fx.studio.next_update().await.unwrap();
        fx.studio.apply(update).unwrap();
        let path = fx.root.join(fx.studio.result(&record.id).unwrap().local_path().unwrap());
        assert!(path.exists());

        assert!(fx.studio.delete_result(&record.id).unwrap());
        assert!(!path.exists());
        assert!(fx.studio.results().is_empty());
        assert!(!fx.studio.delete_result(&record.id).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_completion_for_deleted_outfit_drops_file() {
        let mut fx = fixture(ScriptedApi::new());
        let files = LocalFileStore::new(&fx.root);
        let orphan = files.save_file(b"jpeg", "outfits/gone.jpg").unwrap();

        fx.studio
            .apply(StudioUpdate::OutfitReady {
                id: "gone".into(),
                image_url: "https://cdn.example/gone.png".into(),
                local_path: orphan.clone(),
            })
            .unwrap();

        assert!(!fx.root.join(orphan).exists());
        assert!(fx.studio.outfits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_processing_outfit_cancels_chain() {
        let mut fx = fixture(ScriptedApi::new());
        let (top, bottom) = add_items(&mut fx.studio);
        let started = Instant::now();

        let placeholder = fx.studio.start_outfit(photo(20, 20), &top, &bottom, Vec::new()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(fx.studio.delete_outfit(&placeholder.id).unwrap());

        let update = fx.studio.next_update().await.unwrap();
        assert!(matches!(&update, StudioUpdate::OutfitDiscarded { reason, .. } if reason.contains("canceled")));
        assert!(started.elapsed() < Duration::from_secs(10));
        fx.studio.apply(update).unwrap();
        assert!(fx.studio.outfits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_all_chains() {
        let mut fx = fixture(ScriptedApi::new());
        let (top, bottom) = add_items(&mut fx.studio);

        fx.studio.start_outfit(photo(20, 20), &top, &bottom, Vec::new()).unwrap();
        fx.studio
            .start_try_on(photo(4, 4), photo(4, 4), GarmentCategory::Top)
            .await
            .unwrap();
        assert_eq!(fx.studio.in_flight(), 2);

        fx.studio.shutdown();
        for _ in 0..2 {
            let update = fx.studio.next_update().await.unwrap();
            fx.studio.apply(update).unwrap();
        }

        assert!(fx.studio.outfits().is_empty());
        assert!(matches!(fx.studio.results()[0].status, JobStatus::Failed { .. }));
        assert_eq!(fx.studio.in_flight(), 0);
    }

    #[test]
    fn test_reopen_recovers_interrupted_records() {
        let dir = tempfile::tempdir().unwrap();
        let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(dir.path()));
        let outfit_store = Arc::new(JsonFileStore::<OutfitRecord>::new(dir.path().join("outfits.json")));
        let result_store = Arc::new(JsonFileStore::<JobRecord>::new(dir.path().join("results.json")));

        let stale = OutfitRecord::processing("top", "bottom", Vec::new());
        outfit_store.put(&stale).unwrap();
        let partial = files.save_file(b"jpeg", &format!("outfits/{}.jpg", stale.id)).unwrap();
        let mut ready = OutfitRecord::processing("top", "bottom", Vec::new());
        ready.finish("https://cdn.example/done.png", "outfits/done.jpg").unwrap();
        outfit_store.put(&ready).unwrap();
        result_store.put(&JobRecord::pending("job-7", GarmentCategory::Top)).unwrap();

        let wardrobe = Wardrobe::open(Arc::new(MemoryStore::<WardrobeItem>::new()), files).unwrap();
        let studio = Studio::new(
            wardrobe,
            outfit_store.clone(),
            result_store.clone(),
            TryOnClient::new(Arc::new(ScriptedApi::new())),
        )
        .unwrap();

        assert_eq!(studio.outfits().len(), 1);
        assert_eq!(studio.outfits()[0].id, ready.id);
        assert!(!dir.path().join(partial).exists());
        assert!(matches!(
            &studio.result("job-7").unwrap().status,
            JobStatus::Failed { reason } if reason.contains("interrupted")
        ));
        assert_eq!(studio.in_flight(), 0);

        let persisted_outfits = outfit_store.get_all().unwrap();
        assert_eq!(persisted_outfits.len(), 1);
        assert!(!persisted_outfits[0].is_processing());
        assert!(matches!(result_store.get_all().unwrap()[0].status, JobStatus::Failed { .. }));
    }
}
