//! Unified diff between the on-disk manifest and what regeneration would write.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use crate::error::{io_err, SyncError};
use crate::unit::UnitManager;

/// Manifest drift for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Render what [`UnitManager::regenerate`] would write and diff it against
/// the manifest on disk. `None` when they match. Nothing is written.
pub fn diff_unit(manager: &UnitManager) -> Result<Option<ManifestDiff>, SyncError> {
    let rendered = manager.render_current()?;
    let path = manager.manifest_path();
    let existing = read_existing_or_empty(path)?;
    if existing == rendered {
        return Ok(None);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let old_header = format!("a/{name}");
    let new_header = format!("b/{name}");
    let unified = TextDiff::from_lines(&existing, &rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Ok(Some(ManifestDiff {
        path: path.to_path_buf(),
        unified_diff: unified,
    }))
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.replace("\r\n", "\n")),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;
    use variants_codec::TemplateEngine;
    use variants_core::Extension;

    use super::*;

    fn manager(dir: &Path) -> UnitManager {
        let engine = Arc::new(TemplateEngine::embedded().unwrap());
        UnitManager::new(dir.join("Widget.manifest.ts"), Extension::DEFAULT_PROBE_ORDER.to_vec(), engine)
            .unwrap()
    }

    #[test]
    fn no_diff_after_regenerate() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Widget.v1.tsx"), "").unwrap();
        let mut m = manager(tmp.path());
        m.regenerate().unwrap();
        assert_eq!(diff_unit(&m).unwrap(), None);
    }

    #[test]
    fn new_file_shows_up_without_writing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Widget.v1.tsx"), "").unwrap();
        let mut m = manager(tmp.path());
        m.regenerate().unwrap();
        let before = fs::read_to_string(m.manifest_path()).unwrap();

        fs::write(tmp.path().join("Widget.v2.tsx"), "").unwrap();
        let diff = diff_unit(&m).unwrap().expect("drift");
        assert!(diff.unified_diff.contains("--- a/Widget.manifest.ts"));
        assert!(diff.unified_diff.contains("+++ b/Widget.manifest.ts"));
        assert!(diff.unified_diff.contains("+import WidgetV2 from \"./Widget.v2\";"));
        assert_eq!(fs::read_to_string(m.manifest_path()).unwrap(), before);
    }
}
