use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::signer::Signer;
use object_store::ObjectStore;

use crate::object::ObjectStorage;
use crate::scratch::ScratchDir;
use crate::traits::{StorageError, StorageResult};
use crate::StorageBackend;

impl ObjectStorage {
    /// Storage backed by an S3 bucket
    ///
    /// Credentials are read from the standard AWS environment variables.
    /// `endpoint_url` targets S3-compatible providers (e.g. "http://localhost:9000" for MinIO).
    pub fn s3(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        scratch: ScratchDir,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let s3 = Arc::new(
            builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?,
        );
        let signer: Arc<dyn Signer> = s3.clone();
        let store: Arc<dyn ObjectStore> = s3;

        Ok(ObjectStorage::from_store(
            store,
            Some(signer),
            StorageBackend::S3,
            bucket,
            scratch,
        ))
    }
}
