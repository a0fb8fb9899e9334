use crate::domain::ports::PortStore;
use crate::utils::error::{NatPmpError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Plain-text state file holding the current external port.
#[derive(Debug, Clone)]
pub struct PortFile {
    path: PathBuf,
}

impl PortFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the new value is staged in before the rename.
    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "port".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

impl PortStore for PortFile {
    async fn ensure_directory(&self) -> Result<()> {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        fs::create_dir_all(parent)
            .await
            .map_err(|source| NatPmpError::DirectoryCreation {
                path: parent.to_path_buf(),
                source,
            })?;
        tracing::info!("Port directory ensured: {}", parent.display());
        Ok(())
    }

    async fn publish(&self, port: u16) -> Result<()> {
        let staging = self.staging_path();
        let write_err = |source| NatPmpError::FileWrite {
            path: self.path.clone(),
            source,
        };

        // 先寫入暫存檔再 rename，讀取端不會看到寫到一半的內容
        if let Err(e) = fs::write(&staging, port.to_string()).await {
            return Err(write_err(e));
        }
        if let Err(e) = fs::rename(&staging, &self.path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(write_err(e));
        }

        tracing::info!("Port {} saved to {}", port, self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<bool> {
        // publish 中斷時可能留下暫存檔
        match fs::remove_file(self.staging_path()).await {
            Ok(()) => tracing::debug!("Removed leftover {}", self.staging_path().display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove {}: {}", self.staging_path().display(), e),
        }

        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!("Removed port file: {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(NatPmpError::FileRemove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_publish_overwrites_previous_value() {
        let temp_dir = TempDir::new().unwrap();
        let port_file = PortFile::new(temp_dir.path().join("port"));

        assert_ok!(port_file.publish(4000).await);
        assert_ok!(port_file.publish(51413).await);

        let content = std::fs::read_to_string(port_file.path()).unwrap();
        assert_eq!(content, "51413");
        assert!(!port_file.staging_path().exists());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let port_file = PortFile::new(temp_dir.path().join("port"));
        port_file.publish(4000).await.unwrap();

        assert!(port_file.clear().await.unwrap());
        assert!(!port_file.clear().await.unwrap());
        assert!(!port_file.path().exists());
    }

    #[tokio::test]
    async fn test_ensure_directory_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let port_file = PortFile::new(temp_dir.path().join("run/auto-natpmp/port"));

        assert_ok!(port_file.ensure_directory().await);
        assert_ok!(port_file.ensure_directory().await);

        assert!(temp_dir.path().join("run/auto-natpmp").is_dir());
    }

    #[tokio::test]
    async fn test_ensure_directory_fails_under_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let port_file = PortFile::new(blocker.join("port"));

        let err = assert_err!(port_file.ensure_directory().await);
        assert!(matches!(err, NatPmpError::DirectoryCreation { .. }));
    }

    #[tokio::test]
    async fn test_publish_into_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let port_file = PortFile::new(temp_dir.path().join("missing/port"));

        let err = assert_err!(port_file.publish(4000).await);
        assert!(matches!(err, NatPmpError::FileWrite { .. }));
        assert!(!port_file.path().exists());
    }

    #[tokio::test]
    async fn test_clear_removes_leftover_staging_file() {
        let temp_dir = TempDir::new().unwrap();
        let port_file = PortFile::new(temp_dir.path().join("port"));
        port_file.publish(4000).await.unwrap();
        std::fs::write(port_file.staging_path(), "4001").unwrap();

        assert!(port_file.clear().await.unwrap());

        assert!(!port_file.path().exists());
        assert!(!port_file.staging_path().exists());
    }

    #[tokio::test]
    async fn test_clear_without_port_file_still_removes_staging_file() {
        let temp_dir = TempDir::new().unwrap();
        let port_file = PortFile::new(temp_dir.path().join("port"));
        std::fs::write(port_file.staging_path(), "4001").unwrap();

        assert!(!port_file.clear().await.unwrap());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
