use std::sync::Arc;

use object_store::azure::MicrosoftAzureBuilder;
use object_store::signer::Signer;
use object_store::ObjectStore;

use crate::object::ObjectStorage;
use crate::scratch::ScratchDir;
use crate::traits::{StorageError, StorageResult};
use crate::StorageBackend;

impl ObjectStorage {
    /// Storage backed by an Azure Blob Storage container
    ///
    /// Credentials come from the standard `AZURE_*` environment variables (access key,
    /// SAS token, client secret or managed identity).
    pub fn azure(account: String, container: String, scratch: ScratchDir) -> StorageResult<Self> {
        let azure = Arc::new(
            MicrosoftAzureBuilder::from_env()
                .with_account(account)
                .with_container_name(container.clone())
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?,
        );
        let signer: Arc<dyn Signer> = azure.clone();
        let store: Arc<dyn ObjectStore> = azure;

        Ok(ObjectStorage::from_store(
            store,
            Some(signer),
            StorageBackend::Azure,
            container,
            scratch,
        ))
    }
}
