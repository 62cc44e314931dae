//! Asset Seeder
//!
//! One-shot seeding tool for asset packs. It reads fixture files from the
//! latest dated data directory, upserts asset pack and asset records into
//! PostgreSQL, and mirrors thumbnails and content files into an S3 bucket,
//! skipping objects that are already stored.
//!
//! ## Pipeline
//!
//! ```text
//! data/<date>/                       S3 Bucket              PostgreSQL
//! ┌──────────────┐                 ┌──────────────┐       ┌──────────────┐
//! │ packs.json   │──── phase 1 ───▶│ asset_packs/ │       │ asset_packs  │
//! │ <thumbnails> │        │        │   {id}.png   │       │ assets       │
//! └──────────────┘        │        └──────────────┘       └──────────────┘
//!                         └───────────────────────────────────────▲
//! ┌──────────────┐                 ┌──────────────┐               │
//! │ <pack>.json  │──── phase 2 ───▶│ {content id} │               │
//! └──────────────┘        │        └──────────────┘               │
//!                         │               ▲                       │
//!                         │        ┌──────────────┐               │
//!                         │        │ Content host │               │
//!                         │        └──────────────┘               │
//!                         └───────────────────────────────────────┘
//! ```

pub mod config;
pub mod content;
pub mod database;
pub mod error;
pub mod fixtures;
pub mod models;
pub mod object_store;
pub mod seeder;

pub use config::Config;
pub use content::{ContentSource, HttpContentFetcher};
pub use database::{Database, Record, RecordStore};
pub use error::{DatabaseError, FetchError, FixtureError, SeedError, StoreError};
pub use fixtures::{DataDir, FixtureReader};
pub use models::{AssetPackRecord, AssetRecord, FixtureAsset, FixturePack};
pub use object_store::{Acl, ObjectStore, PackThumbnails, S3ObjectStore};
pub use seeder::{SeedReport, Seeder, SeederOptions};
