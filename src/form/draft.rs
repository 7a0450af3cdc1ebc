use std::collections::BTreeMap;
use std::convert::Infallible;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use super::controller::{FormController, FormError, FormId, FormResult};
use crate::model::Node;

/// Persistence for whole-model snapshots, keyed by form id.
pub trait SnapshotStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save(&self, form_id: &FormId, snapshot: &Node) -> Result<(), Self::Error>;
    fn load(&self, form_id: &FormId) -> Result<Option<Node>, Self::Error>;
    fn clear(&self, form_id: &FormId) -> Result<(), Self::Error>;
}

#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    state: Arc<RwLock<BTreeMap<FormId, Node>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    type Error = Infallible;

    fn save(&self, form_id: &FormId, snapshot: &Node) -> Result<(), Self::Error> {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.insert(form_id.clone(), snapshot.clone());
        Ok(())
    }

    fn load(&self, form_id: &FormId) -> Result<Option<Node>, Self::Error> {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(state.get(form_id).cloned())
    }

    fn clear(&self, form_id: &FormId) -> Result<(), Self::Error> {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.remove(form_id);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotFileError {
    #[error("snapshot file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// One `<form id>.json` file per form under `dir`.
#[derive(Clone, Debug)]
pub struct JsonFileSnapshotStore {
    dir: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_for(&self, form_id: &FormId) -> PathBuf {
        let name = form_id
            .as_str()
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '_'
                }
            })
            .collect::<String>();
        self.dir.join(format!("{name}.json"))
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    type Error = SnapshotFileError;

    fn save(&self, form_id: &FormId, snapshot: &Node) -> Result<(), Self::Error> {
        std::fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        std::fs::write(self.file_for(form_id), bytes)?;
        Ok(())
    }

    fn load(&self, form_id: &FormId) -> Result<Option<Node>, Self::Error> {
        let bytes = match std::fs::read(self.file_for(form_id)) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn clear(&self, form_id: &FormId) -> Result<(), Self::Error> {
        match std::fs::remove_file(self.file_for(form_id)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

impl FormController {
    pub fn save_draft<S>(&self, store: &S) -> FormResult<()>
    where
        S: SnapshotStore,
    {
        let model = self.model()?;
        store
            .save(self.id(), &model)
            .map_err(|error| FormError::DraftSaveFailed(error.to_string()))
    }

    /// Replace the model with the stored draft, if there is one. The initial
    /// model is kept, so the restored edits show up as changes.
    pub fn load_draft<S>(&self, store: &S) -> FormResult<bool>
    where
        S: SnapshotStore,
    {
        let Some(draft) = store
            .load(self.id())
            .map_err(|error| FormError::DraftLoadFailed(error.to_string()))?
        else {
            return Ok(false);
        };
        tracing::debug!(form = %self.id(), "restoring draft");
        self.set_model(draft)?;
        Ok(true)
    }

    pub fn clear_draft<S>(&self, store: &S) -> FormResult<()>
    where
        S: SnapshotStore,
    {
        store
            .clear(self.id())
            .map_err(|error| FormError::DraftClearFailed(error.to_string()))
    }
}
