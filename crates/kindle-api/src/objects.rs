use std::path::PathBuf;

use anyhow::Result;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// On-disk store for encrypted file bodies.
///
/// Each object is a single flat file at `{dir}/{id}`. Ids are UUIDs, which
/// keeps paths opaque and rules out traversal. The store only ever sees
/// ciphertext.
pub struct ObjectStore {
    dir: PathBuf,
}

impl ObjectStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Object storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn object_path(&self, id: &Uuid) -> PathBuf {
        self.dir.join(id.to_string())
    }

    /// Write an object. The body lands in a temporary file first and is
    /// renamed into place, so readers never observe a partial object. Each
    /// write gets its own temp name; concurrent writers never share one.
    pub async fn put(&self, id: &Uuid, data: &[u8]) -> Result<()> {
        let path = self.object_path(id);
        let tmp = self.dir.join(format!("{}.{}.part", id, Uuid::new_v4()));

        let written = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn get(&self, id: &Uuid) -> Result<Option<Vec<u8>>> {
        match fs::read(self.object_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, id: &Uuid) -> Result<()> {
        match fs::remove_file(self.object_path(id)).await {
            Ok(()) => {
                info!("Deleted object {}", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Object {} already gone", id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
