use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::script::{RecordedScript, ScriptExport};
use crate::error::{AutomationError, Result};

/// JSON-file store for recorded scripts: one file per script, atomic
/// writes, tolerant loading. Corrupt entries are skipped with a warning
/// instead of poisoning the whole library.
pub struct ScriptLibrary {
    dir: PathBuf,
    scripts: RwLock<HashMap<String, RecordedScript>>,
}

impl ScriptLibrary {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("library dir: {e}")))?;
        let library = Self {
            dir,
            scripts: RwLock::new(HashMap::new()),
        };
        library.load_all()?;
        Ok(library)
    }

    fn script_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn load_all(&self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("library read: {e}")))?;
        let mut map = self.scripts.write();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match load_one(&path) {
                Ok(script) => {
                    map.insert(script.id.clone(), script);
                }
                Err(e) => {
                    tracing::warn!("skipping unreadable script {}: {e}", path.display());
                }
            }
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<RecordedScript> {
        let mut scripts: Vec<_> = self.scripts.read().values().cloned().collect();
        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        scripts
    }

    pub fn get(&self, id: &str) -> Option<RecordedScript> {
        self.scripts.read().get(id).cloned()
    }

    pub fn save(&self, script: RecordedScript) -> Result<()> {
        let path = self.script_path(&script.id);
        let payload = serde_json::to_string_pretty(&script)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("encode script: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("write script: {e}")))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("commit script: {e}")))?;

        self.scripts.write().insert(script.id.clone(), script);
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let path = self.script_path(id);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| AutomationError::Internal(anyhow::anyhow!("delete script: {e}")))?;
        }
        Ok(self.scripts.write().remove(id).is_some())
    }

    /// The `{version, exported_at, scripts}` interchange envelope.
    pub fn export_all(&self) -> ScriptExport {
        ScriptExport::new(self.list())
    }

    /// Import an export envelope; existing ids are overwritten. Returns
    /// how many scripts landed.
    pub fn import(&self, export: ScriptExport) -> Result<usize> {
        let mut imported = 0;
        for script in export.scripts {
            self.save(script)?;
            imported += 1;
        }
        Ok(imported)
    }
}

fn load_one(path: &Path) -> Result<RecordedScript> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("read: {e}")))?;
    serde_json::from_str(&raw)
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("parse: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::script::{ActionKind, ScriptAction};

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let library = ScriptLibrary::open(dir.path()).unwrap();

        let mut script = RecordedScript::new("checkout");
        let mut action = ScriptAction::new(ActionKind::Click);
        action.identifier = Some("@e1".into());
        script.actions.push(action);
        let id = script.id.clone();
        library.save(script).unwrap();

        // A second instance reads from disk
        let reopened = ScriptLibrary::open(dir.path()).unwrap();
        let loaded = reopened.get(&id).unwrap();
        assert_eq!(loaded.name, "checkout");
        assert_eq!(loaded.actions.len(), 1);
    }

    #[test]
    fn test_corrupt_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let library = ScriptLibrary::open(dir.path()).unwrap();
        assert!(library.list().is_empty());
    }

    #[test]
    fn test_delete_removes_file_and_entry() {
        let dir = tempfile::tempdir().unwrap();
        let library = ScriptLibrary::open(dir.path()).unwrap();
        let script = RecordedScript::new("temp");
        let id = script.id.clone();
        library.save(script).unwrap();

        assert!(library.delete(&id).unwrap());
        assert!(library.get(&id).is_none());
        assert!(!dir.path().join(format!("{id}.json")).exists());
    }

    #[test]
    fn test_export_import_round_trip() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = ScriptLibrary::open(source_dir.path()).unwrap();
        source.save(RecordedScript::new("a")).unwrap();
        source.save(RecordedScript::new("b")).unwrap();

        let target_dir = tempfile::tempdir().unwrap();
        let target = ScriptLibrary::open(target_dir.path()).unwrap();
        let imported = target.import(source.export_all()).unwrap();
        assert_eq!(imported, 2);
        assert_eq!(target.list().len(), 2);
    }
}
