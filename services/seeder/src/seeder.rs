//! Seeding pipeline.
//!
//! A run has two phases:
//!
//! 1. **Packs**: every pack in `packs.json` gets its thumbnail uploaded (when
//!    absent from the store) and its record upserted. All packs settle before
//!    the phase ends; any failure here aborts the run.
//! 2. **Assets**: packs are processed one at a time, in fixture order. Within
//!    a pack, asset upserts and content syncs run together under the
//!    concurrency cap and are joined before the next pack starts. Failures in
//!    this phase are logged and counted, never fatal.
//!
//! Asset records and content files have no atomicity relationship: either
//! may succeed while the other fails.

use crate::config::Config;
use crate::content::ContentSource;
use crate::database::RecordStore;
use crate::error::{FetchError, SeedError, SeedResult};
use crate::fixtures::DataDir;
use crate::models::{AssetPackRecord, AssetRecord, FixturePack};
use crate::object_store::{thumbnail_filename, Acl, ObjectStore, PackThumbnails};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, instrument, warn};

/// Run-wide settings
#[derive(Debug, Clone)]
pub struct SeederOptions {
    /// Owner of every seeded pack
    pub default_owner: String,
    /// Maximum in-flight operations
    pub concurrency: usize,
    /// Key prefix for pack thumbnails
    pub thumbnail_prefix: String,
}

impl SeederOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_owner: config.seeding.default_owner.clone(),
            concurrency: config.seeding.concurrency,
            thumbnail_prefix: config.s3.thumbnail_prefix.clone(),
        }
    }
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub packs_upserted: usize,
    pub thumbnails_uploaded: usize,
    pub thumbnails_present: usize,
    pub assets_upserted: usize,
    pub assets_failed: usize,
    pub contents_uploaded: usize,
    pub contents_present: usize,
    /// Not attempted because the content host was unreachable
    pub contents_skipped: usize,
    pub contents_failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThumbnailOutcome {
    Uploaded,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentOutcome {
    Uploaded,
    Present,
    Skipped,
    Failed,
}

enum PackOperation<'p> {
    UpsertAsset(&'p AssetRecord),
    SyncContent(&'p str),
}

enum OperationOutcome {
    Asset(bool),
    Content(ContentOutcome),
}

/// Seeds records and content from one data directory
pub struct Seeder<'a, S: ?Sized, C: ?Sized, R: ?Sized> {
    store: &'a S,
    content: &'a C,
    records: &'a R,
    data: DataDir,
    options: SeederOptions,
}

impl<'a, S, C, R> Seeder<'a, S, C, R>
where
    S: ObjectStore + ?Sized,
    C: ContentSource + ?Sized,
    R: RecordStore + ?Sized,
{
    pub fn new(
        store: &'a S,
        content: &'a C,
        records: &'a R,
        data: DataDir,
        options: SeederOptions,
    ) -> Self {
        Self {
            store,
            content,
            records,
            data,
            options,
        }
    }

    fn concurrency(&self) -> usize {
        self.options.concurrency.max(1)
    }

    /// Run both phases
    pub async fn run(&self) -> SeedResult<SeedReport> {
        let packs = self.data.read_packs()?;
        let mut report = SeedReport::default();

        info!(pack_count = packs.len(), "Seeding asset packs");
        self.seed_packs(&packs, &mut report).await?;

        info!("Seeding assets");
        for pack in &packs {
            self.seed_pack_assets(&pack.id, &mut report).await?;
        }

        info!(
            packs_upserted = report.packs_upserted,
            thumbnails_uploaded = report.thumbnails_uploaded,
            thumbnails_present = report.thumbnails_present,
            assets_upserted = report.assets_upserted,
            assets_failed = report.assets_failed,
            contents_uploaded = report.contents_uploaded,
            contents_present = report.contents_present,
            contents_skipped = report.contents_skipped,
            contents_failed = report.contents_failed,
            "Seeding finished"
        );

        Ok(report)
    }

    /// Upsert every pack. Returns the first failure once all packs settled.
    pub async fn seed_packs(
        &self,
        packs: &[FixturePack],
        report: &mut SeedReport,
    ) -> SeedResult<()> {
        let now = Utc::now();

        let results: Vec<SeedResult<ThumbnailOutcome>> = stream::iter(packs)
            .map(|pack| self.seed_pack(pack, now))
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        let mut first_error = None;
        for result in results {
            match result {
                Ok(outcome) => {
                    report.packs_upserted += 1;
                    match outcome {
                        ThumbnailOutcome::Uploaded => report.thumbnails_uploaded += 1,
                        ThumbnailOutcome::Present => report.thumbnails_present += 1,
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to seed asset pack");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    #[instrument(skip(self, pack, now), fields(pack_id = %pack.id))]
    async fn seed_pack(
        &self,
        pack: &FixturePack,
        now: DateTime<Utc>,
    ) -> SeedResult<ThumbnailOutcome> {
        let thumbnails = PackThumbnails::new(self.store, &self.options.thumbnail_prefix);
        let thumbnail_error = |source| SeedError::Thumbnail {
            pack_id: pack.id.clone(),
            source,
        };

        let outcome = if thumbnails.exists(&pack.id).await.map_err(thumbnail_error)? {
            debug!("Thumbnail already stored");
            ThumbnailOutcome::Present
        } else {
            let body = self.data.read_bytes(&pack.thumbnail)?;
            thumbnails
                .put(&pack.id, Bytes::from(body), Acl::PublicRead)
                .await
                .map_err(thumbnail_error)?;
            info!(key = %thumbnails.key(&pack.id), "Thumbnail uploaded");
            ThumbnailOutcome::Uploaded
        };

        let record = AssetPackRecord::from_fixture(
            pack,
            thumbnail_filename(&pack.id),
            &self.options.default_owner,
            now,
        );
        self.records
            .upsert_asset_pack(&record)
            .await
            .map_err(|source| SeedError::PackUpsert {
                pack_id: pack.id.clone(),
                source,
            })?;

        info!(title = %pack.title, "Asset pack upserted");
        Ok(outcome)
    }

    /// Upsert a pack's assets and sync their content files.
    ///
    /// Only a missing or malformed fixture is fatal.
    #[instrument(skip(self, report))]
    pub async fn seed_pack_assets(&self, pack_id: &str, report: &mut SeedReport) -> SeedResult<()> {
        let fixture = self.data.read_pack_assets(pack_id)?;

        let records: Vec<AssetRecord> = fixture
            .assets
            .iter()
            .map(|asset| AssetRecord::from_fixture(asset, pack_id))
            .collect();

        // The same content file is often shared by several assets
        let content_ids: BTreeSet<&str> = fixture
            .assets
            .iter()
            .flat_map(|asset| asset.contents.values().map(String::as_str))
            .collect();

        info!(
            asset_count = records.len(),
            content_count = content_ids.len(),
            "Seeding pack assets"
        );

        let host_unreachable = AtomicBool::new(false);

        let operations = records
            .iter()
            .map(PackOperation::UpsertAsset)
            .chain(content_ids.into_iter().map(PackOperation::SyncContent));

        let outcomes: Vec<OperationOutcome> = stream::iter(operations)
            .map(|operation| self.run_operation(operation, &host_unreachable))
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                OperationOutcome::Asset(true) => report.assets_upserted += 1,
                OperationOutcome::Asset(false) => report.assets_failed += 1,
                OperationOutcome::Content(ContentOutcome::Uploaded) => {
                    report.contents_uploaded += 1
                }
                OperationOutcome::Content(ContentOutcome::Present) => {
                    report.contents_present += 1
                }
                OperationOutcome::Content(ContentOutcome::Skipped) => {
                    report.contents_skipped += 1
                }
                OperationOutcome::Content(ContentOutcome::Failed) => report.contents_failed += 1,
            }
        }

        Ok(())
    }

    async fn run_operation(
        &self,
        operation: PackOperation<'_>,
        host_unreachable: &AtomicBool,
    ) -> OperationOutcome {
        match operation {
            PackOperation::UpsertAsset(record) => {
                match self.records.upsert_asset(record).await {
                    Ok(()) => OperationOutcome::Asset(true),
                    Err(e) => {
                        error!(
                            asset_id = %record.id,
                            pack_id = %record.asset_pack_id,
                            error = %e,
                            "Failed to upsert asset"
                        );
                        OperationOutcome::Asset(false)
                    }
                }
            }
            PackOperation::SyncContent(content_id) => {
                OperationOutcome::Content(self.sync_content(content_id, host_unreachable).await)
            }
        }
    }

    /// Upload one content file unless it is already stored.
    ///
    /// A transport failure against the content host stops every remaining
    /// download of the current pack. Any other failure only affects this
    /// content id.
    async fn sync_content(&self, content_id: &str, host_unreachable: &AtomicBool) -> ContentOutcome {
        if host_unreachable.load(Ordering::Relaxed) {
            return ContentOutcome::Skipped;
        }

        match self.store.exists(content_id).await {
            Ok(true) => return ContentOutcome::Present,
            Ok(false) => {}
            Err(e) => {
                warn!(content_id = %content_id, error = %e, "Failed to check content");
                return ContentOutcome::Failed;
            }
        }

        if host_unreachable.load(Ordering::Relaxed) {
            return ContentOutcome::Skipped;
        }

        let body = match self.content.fetch(content_id).await {
            Ok(body) => body,
            Err(e @ FetchError::Unreachable { .. }) => {
                if !host_unreachable.swap(true, Ordering::Relaxed) {
                    warn!(
                        content_id = %content_id,
                        error = %e,
                        "Content host unreachable, skipping remaining content of this pack"
                    );
                }
                return ContentOutcome::Failed;
            }
            Err(e) => {
                warn!(content_id = %content_id, error = %e, "Failed to download content");
                return ContentOutcome::Failed;
            }
        };

        let size_bytes = body.len();
        match self.store.put(content_id, body, Acl::PublicRead).await {
            Ok(()) => {
                debug!(content_id = %content_id, size_bytes, "Content uploaded");
                ContentOutcome::Uploaded
            }
            Err(e) => {
                warn!(content_id = %content_id, error = %e, "Failed to upload content");
                ContentOutcome::Failed
            }
        }
    }
}
