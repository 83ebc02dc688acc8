//! Writes the active artifacts to disk, one file per catalog slot.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

use crate::core::artifact::Artifacts;

/// Writes via a temp file so readers never see a half-written artifact.
fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Writes every artifact to `dir/<name>`, creating `dir` if needed.
/// Returns the written paths in catalog order.
pub fn export_artifacts(dir: &Path, artifacts: &Artifacts) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts.iter() {
        // Names are plain file names; anything with a path component is refused.
        let file_name = Path::new(&artifact.name)
            .file_name()
            .filter(|f| f.to_str() == Some(artifact.name.as_str()))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid artifact name: {}", artifact.name),
                )
            })?;

        let path = dir.join(file_name);
        atomic_write(&path, &artifact.content)?;
        written.push(path);
    }

    info!("Exported {} artifacts to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::ArtifactCatalog;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("confcraft-export-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_export_writes_each_artifact() {
        let dir = scratch_dir().join("nested");
        let mut artifacts = ArtifactCatalog::default().empty_artifacts();
        artifacts.set("agents.yaml", "agents:\n  bot: {}\n".to_string());

        let paths = export_artifacts(&dir, &artifacts).unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], dir.join("agents.yaml"));
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "agents:\n  bot: {}\n");
        assert!(fs::read_to_string(&paths[1]).unwrap().contains("workflow:"));
        assert!(!dir.join("agents.tmp").exists());

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_export_overwrites_existing_files() {
        let dir = scratch_dir();
        let mut artifacts = ArtifactCatalog::default().empty_artifacts();
        export_artifacts(&dir, &artifacts).unwrap();

        artifacts.set("workflow.yaml", "workflow:\n  steps: []\n".to_string());
        export_artifacts(&dir, &artifacts).unwrap();

        assert_eq!(
            fs::read_to_string(dir.join("workflow.yaml")).unwrap(),
            "workflow:\n  steps: []\n"
        );
        fs::remove_dir_all(&dir).unwrap();
    }
}
