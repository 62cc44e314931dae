use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Envelope every fixture file is wrapped in
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub data: T,
}

/// Contents of `packs.json`
#[derive(Debug, Clone, Deserialize)]
pub struct PacksFixture {
    pub packs: Vec<FixturePack>,
}

/// Asset pack as described by `packs.json`
#[derive(Debug, Clone, Deserialize)]
pub struct FixturePack {
    pub id: String,
    pub title: String,
    /// Public URL of the thumbnail at the source
    pub url: String,
    /// Thumbnail file, relative to the data directory
    pub thumbnail: String,
}

/// Contents of `<pack-id>.json`
#[derive(Debug, Clone, Deserialize)]
pub struct PackAssetsFixture {
    pub id: String,
    #[serde(default)]
    pub version: serde_json::Value,
    pub title: String,
    pub assets: Vec<FixtureAsset>,
}

/// Asset as described by a pack fixture
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureAsset {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
    /// Model file URL
    pub url: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Not seeded
    #[serde(default)]
    pub variations: Vec<serde_json::Value>,
    /// Content role (file path inside the model) to content id
    #[serde(default)]
    pub contents: BTreeMap<String, String>,
}

/// Persisted asset pack
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetPackRecord {
    pub id: String,
    pub title: String,
    /// Filename of the thumbnail in the object store
    pub thumbnail: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetPackRecord {
    pub fn from_fixture(
        pack: &FixturePack,
        thumbnail: impl Into<String>,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: pack.id.clone(),
            title: pack.title.clone(),
            thumbnail: thumbnail.into(),
            user_id: owner.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persisted asset, keyed by `(id, asset_pack_id)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRecord {
    pub id: String,
    pub asset_pack_id: String,
    pub name: String,
    pub thumbnail: String,
    pub model: String,
    pub category: String,
    pub tags: Vec<String>,
    pub contents: BTreeMap<String, String>,
}

impl AssetRecord {
    pub fn from_fixture(asset: &FixtureAsset, pack_id: &str) -> Self {
        Self {
            id: asset.id.clone(),
            asset_pack_id: pack_id.to_string(),
            name: asset.name.clone(),
            thumbnail: basename(&asset.thumbnail).to_string(),
            model: asset.url.clone(),
            category: asset.category.clone(),
            tags: asset.tags.clone(),
            contents: asset.contents.clone(),
        }
    }
}

/// Last path segment of a URL or relative path
pub fn basename(path: &str) -> &str {
    let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or(path);
    path.rsplit('/').next().unwrap_or(path)
}
