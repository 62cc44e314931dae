use crate::config::S3Config;
use crate::error::StoreError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

/// Access control applied to written objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acl {
    Private,
    PublicRead,
}

impl Acl {
    fn canned(self) -> ObjectCannedAcl {
        match self {
            Acl::Private => ObjectCannedAcl::Private,
            Acl::PublicRead => ObjectCannedAcl::PublicRead,
        }
    }
}

/// Key-addressed blob storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether an object exists. A missing object is `Ok(false)`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Read an object, `None` if it does not exist. The seeding run only
    /// checks and writes; reads are part of the general client.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Write an object, replacing any existing one
    async fn put(&self, key: &str, body: Bytes, acl: Acl) -> Result<(), StoreError>;
}

/// S3-backed object store
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    config: S3Config,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    pub async fn new(config: &S3Config) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 object store initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            config: config.clone(),
        }
    }

    /// Single-part upload for small objects
    async fn simple_upload(&self, key: &str, body: Bytes, acl: Acl) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type_for(key))
            .acl(acl.canned())
            .send()
            .await
            .map_err(|e| StoreError::request(key, DisplayErrorContext(e)))?;

        Ok(())
    }

    /// Multipart upload for large model files
    async fn multipart_upload(&self, key: &str, body: Bytes, acl: Acl) -> Result<(), StoreError> {
        let create_response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(key))
            .acl(acl.canned())
            .send()
            .await
            .map_err(|e| StoreError::request(key, DisplayErrorContext(e)))?;

        let upload_id = create_response
            .upload_id()
            .ok_or_else(|| StoreError::request(key, "no upload id in response"))?;

        match self.upload_parts(key, upload_id, body).await {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|e| StoreError::request(key, DisplayErrorContext(e)))?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .send()
                    .await
                {
                    warn!(key = %key, error = %DisplayErrorContext(abort_err), "Failed to abort multipart upload");
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        body: Bytes,
    ) -> Result<Vec<CompletedPart>, StoreError> {
        let mut completed_parts = Vec::new();
        let part_size = self.config.part_size_bytes.max(1);
        let mut part_number = 1;

        let mut offset = 0;
        while offset < body.len() {
            let end = (offset + part_size).min(body.len());
            let chunk = body.slice(offset..end);

            let upload_part_response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| StoreError::request(key, DisplayErrorContext(e)))?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(upload_part_response.e_tag().unwrap_or_default())
                    .build(),
            );

            part_number += 1;
            offset = end;
        }

        Ok(completed_parts)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    Ok(false)
                } else {
                    Err(StoreError::request(key, DisplayErrorContext(e)))
                }
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if e.as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    return Ok(None);
                }
                return Err(StoreError::request(key, DisplayErrorContext(e)));
            }
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::request(key, DisplayErrorContext(e)))?;

        Ok(Some(body.into_bytes()))
    }

    #[instrument(skip(self, body), fields(size_bytes = body.len()))]
    async fn put(&self, key: &str, body: Bytes, acl: Acl) -> Result<(), StoreError> {
        if body.len() > self.config.multipart_threshold_bytes {
            self.multipart_upload(key, body, acl).await?;
        } else {
            self.simple_upload(key, body, acl).await?;
        }

        debug!(key = %key, "Object written");
        Ok(())
    }
}

/// Thumbnail storage scoped to asset packs
pub struct PackThumbnails<'a, S: ?Sized> {
    store: &'a S,
    prefix: &'a str,
}

impl<'a, S: ObjectStore + ?Sized> PackThumbnails<'a, S> {
    pub fn new(store: &'a S, prefix: &'a str) -> Self {
        Self { store, prefix }
    }

    /// Object key of a pack's thumbnail
    pub fn key(&self, pack_id: &str) -> String {
        let filename = thumbnail_filename(pack_id);
        if self.prefix.is_empty() {
            filename
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), filename)
        }
    }

    pub async fn exists(&self, pack_id: &str) -> Result<bool, StoreError> {
        self.store.exists(&self.key(pack_id)).await
    }

    pub async fn put(&self, pack_id: &str, body: Bytes, acl: Acl) -> Result<(), StoreError> {
        self.store.put(&self.key(pack_id), body, acl).await
    }
}

/// Thumbnail filename recorded on the asset pack.
///
/// The pack id is percent-encoded, so distinct ids never share a filename
/// and `/` cannot escape the prefix.
pub fn thumbnail_filename(pack_id: &str) -> String {
    format!("{}.png", urlencoding::encode(pack_id))
}

/// Content type from the key's extension
fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpeg" | "jpg" => "image/jpeg",
        "glb" => "model/gltf-binary",
        "gltf" => "model/gltf+json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_key() {
        let store = MockObjectStore::new();
        let thumbnails = PackThumbnails::new(&store, "asset_packs");

        assert_eq!(
            thumbnail_filename("e6fa9601-3e47-4dff-9a84-e8e017add15a"),
            "e6fa9601-3e47-4dff-9a84-e8e017add15a.png"
        );
        assert_eq!(thumbnails.key("p1"), "asset_packs/p1.png");
        assert_eq!(PackThumbnails::new(&store, "").key("p1"), "p1.png");
    }

    #[tokio::test]
    async fn test_thumbnail_put_uses_pack_key() {
        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .withf(|key, body, acl| {
                key == "asset_packs/p1.png" && &body[..] == b"png" && *acl == Acl::PublicRead
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        store
            .expect_exists()
            .withf(|key| key == "asset_packs/p1.png")
            .returning(|_| Ok(false));

        let thumbnails = PackThumbnails::new(&store, "asset_packs/");
        assert!(!thumbnails.exists("p1").await.unwrap());
        thumbnails
            .put("p1", Bytes::from_static(b"png"), Acl::PublicRead)
            .await
            .unwrap();
    }

    #[test]
    fn test_thumbnail_filename_is_injective() {
        assert_ne!(thumbnail_filename("pack.v2"), thumbnail_filename("pack_v2"));
        assert_ne!(thumbnail_filename("a/b"), thumbnail_filename("a_b"));
        assert_ne!(thumbnail_filename("a b"), thumbnail_filename("a%20b"));
        assert_eq!(thumbnail_filename("pack-001"), "pack-001.png");
        assert_eq!(thumbnail_filename("../etc"), "..%2Fetc.png");
        assert_eq!(thumbnail_filename("hello world"), "hello%20world.png");
    }

    #[tokio::test]
    async fn test_get_missing_object() {
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .withf(|key| key == "hash1")
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_get()
            .withf(|key| key == "hash2")
            .times(1)
            .returning(|_| Ok(Some(Bytes::from_static(b"model"))));

        let store: &dyn ObjectStore = &store;
        assert!(store.get("hash1").await.unwrap().is_none());
        assert_eq!(&store.get("hash2").await.unwrap().unwrap()[..], b"model");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("asset_packs/p1.png"), "image/png");
        assert_eq!(content_type_for("model.GLB"), "model/gltf-binary");
        assert_eq!(
            content_type_for("QmXoypizjW3WknFiJnKLwHCnL72vedxjQkDDP1mXWo6uco"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_acl_mapping() {
        assert_eq!(Acl::PublicRead.canned(), ObjectCannedAcl::PublicRead);
        assert_eq!(Acl::Private.canned(), ObjectCannedAcl::Private);
    }
}
