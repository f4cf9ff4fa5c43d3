//! Persisted login artifacts: one directory per tenant under the sessions root.
//!
//! The transport engine stores opaque token/session files in the tenant's
//! directory; its mere existence is the "already logged in" signal consulted
//! before opening a new connection.

use std::path::PathBuf;

/// Filesystem layout for per-tenant login artifacts.
#[derive(Debug, Clone)]
pub struct LoginArtifacts {
    root: PathBuf,
}

impl LoginArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the tenant's opaque login state.
    pub fn tenant_dir(&self, tenant_id: &str) -> PathBuf {
        self.root.join(tenant_id)
    }

    /// True when the tenant has persisted login state.
    pub fn exists(&self, tenant_id: &str) -> bool {
        self.tenant_dir(tenant_id).is_dir()
    }

    /// Create the tenant's artifact directory (and the root) if missing.
    pub async fn ensure(&self, tenant_id: &str) -> Result<PathBuf, String> {
        let dir = self.tenant_dir(tenant_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| format!("creating artifact dir {}: {}", dir.display(), e))?;
        Ok(dir)
    }

    /// Remove the tenant's artifact directory. Missing directory is a no-op.
    pub async fn remove(&self, tenant_id: &str) -> Result<(), String> {
        let dir = self.tenant_dir(tenant_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("removing artifact dir {}: {}", dir.display(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_then_exists_then_remove() {
        let root = std::env::temp_dir().join(format!("mozo-artifacts-{}", std::process::id()));
        let artifacts = LoginArtifacts::new(&root);
        assert!(!artifacts.exists("la-esquina"));

        artifacts.ensure("la-esquina").await.expect("ensure");
        assert!(artifacts.exists("la-esquina"));
        assert!(!artifacts.exists("otro"));

        artifacts.remove("la-esquina").await.expect("remove");
        assert!(!artifacts.exists("la-esquina"));
        // removing again is a no-op
        artifacts.remove("la-esquina").await.expect("remove twice");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
