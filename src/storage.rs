//! Source object checks
//!
//! Optional pre-flight `HEAD` of the uploaded object, so a load is never
//! submitted for a file that has already disappeared.

use crate::error::{Error, Result};
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

enum Backend {
    /// One GCS client per bucket, built from the environment on first use
    Gcs(RwLock<HashMap<String, Arc<dyn ObjectStore>>>),
    /// A single store serving every bucket
    Fixed(Arc<dyn ObjectStore>),
}

/// Looks up source objects in object storage
pub struct SourceStore {
    backend: Backend,
}

impl SourceStore {
    /// Google Cloud Storage, configured from `GOOGLE_*` environment variables
    pub fn gcs() -> Self {
        Self {
            backend: Backend::Gcs(RwLock::new(HashMap::new())),
        }
    }

    /// Serve every bucket from the given store
    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            backend: Backend::Fixed(store),
        }
    }

    async fn store_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let cache = match &self.backend {
            Backend::Fixed(store) => return Ok(store.clone()),
            Backend::Gcs(cache) => cache,
        };

        if let Some(store) = cache.read().await.get(bucket) {
            return Ok(store.clone());
        }

        let store: Arc<dyn ObjectStore> = Arc::new(
            GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?,
        );
        cache
            .write()
            .await
            .insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    /// Confirm `gs://{bucket}/{name}` exists, returning its size in bytes
    pub async fn verify(&self, bucket: &str, name: &str) -> Result<u64> {
        let store = self.store_for(bucket).await?;
        let path = ObjectPath::from(name);

        match store.head(&path).await {
            Ok(meta) => {
                debug!(bucket, name, size = meta.size, "Source object found");
                Ok(meta.size as u64)
            }
            Err(object_store::Error::NotFound { .. }) => Err(Error::SourceNotFound {
                uri: format!("gs://{bucket}/{name}"),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for SourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend {
            Backend::Gcs(_) => "gcs",
            Backend::Fixed(_) => "fixed",
        };
        f.debug_struct("SourceStore").field("backend", &backend).finish()
    }
}
