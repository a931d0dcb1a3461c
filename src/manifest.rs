use serde::Deserialize;
use std::io::Read;
use thiserror::Error;
use vfs::VfsPath;

pub const MANIFEST_NAME: &str = "Weft.toml";

/// A parsed Weft.toml manifest. Everything is optional; a target directory
/// without one uses the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    pub project: Option<Project>,
    #[serde(default)]
    pub generate: Generate,
}

/// Project metadata section.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: String,
}

/// Generation settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Generate {
    /// Directory generated files are written to, relative to the target
    /// directory. Defaults to the target directory itself.
    pub dir: Option<String>,
}

/// Errors that can occur during manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Vfs(#[from] vfs::VfsError),

    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Manifest {
    /// Loads `Weft.toml` from the target directory, if present.
    pub fn load(dir: &VfsPath) -> Result<Manifest, ManifestError> {
        let path = dir.join(MANIFEST_NAME)?;
        if !path.exists()? {
            return Ok(Manifest::default());
        }
        let mut content = String::new();
        path.open_file()?.read_to_string(&mut content)?;
        let manifest: Manifest = toml::from_str(&content)?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use vfs::MemoryFS;

    #[test]
    fn absent_manifest_uses_defaults() {
        let root: VfsPath = MemoryFS::new().into();
        let manifest = Manifest::load(&root).unwrap();
        assert!(manifest.project.is_none());
        assert!(manifest.generate.dir.is_none());
    }

    #[test]
    fn parses_project_and_generate_sections() {
        let root: VfsPath = MemoryFS::new().into();
        root.join(MANIFEST_NAME)
            .unwrap()
            .create_file()
            .unwrap()
            .write_all(b"[project]\nname = \"demo\"\n\n[generate]\ndir = \"gen\"\n")
            .unwrap();
        let manifest = Manifest::load(&root).unwrap();
        assert_eq!(manifest.project.unwrap().name, "demo");
        assert_eq!(manifest.generate.dir.as_deref(), Some("gen"));
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let root: VfsPath = MemoryFS::new().into();
        root.join(MANIFEST_NAME)
            .unwrap()
            .create_file()
            .unwrap()
            .write_all(b"[project\n")
            .unwrap();
        assert!(matches!(
            Manifest::load(&root),
            Err(ManifestError::Parse(_))
        ));
    }
}
