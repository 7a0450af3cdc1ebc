use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::task::Spawn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::container::{FieldErrors, ValidationContainer};
use super::field::{DEFAULT_DEFER, Field, FieldOptions};
use super::validation::FieldLens;
use crate::feedback::{CapturedError, ErrorCapture, ErrorSink};
use crate::model::{BranchPolicy, DiffEntry, Node, Path, leaf_diff, set};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

/// Names a form across sessions; drafts are stored under it.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct FormId(String);

impl FormId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn next() -> Self {
        Self(format!(
            "form-{}",
            FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst)
        ))
    }

    /// Derived from the caller's source location, so the same call site gets
    /// the same id in every run.
    #[track_caller]
    pub fn auto() -> Self {
        let location = std::panic::Location::caller();
        let seed = format!(
            "{}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        );
        Self(format!("form-{:016x}", fnv1a64(seed.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x00000100000001b3;

    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub show_errors: bool,
    pub defer: Duration,
    pub branch_policy: BranchPolicy,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            show_errors: false,
            defer: DEFAULT_DEFER,
            branch_policy: BranchPolicy::List,
        }
    }
}

impl FormOptions {
    pub fn show_errors(mut self, value: bool) -> Self {
        self.show_errors = value;
        self
    }

    pub fn defer(mut self, value: Duration) -> Self {
        self.defer = value;
        self
    }

    pub fn branch_policy(mut self, value: BranchPolicy) -> Self {
        self.branch_policy = value;
        self
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("failed to spawn validation task: {0}")]
    SpawnFailed(String),
    #[error("failed to convert form model: {0}")]
    Serialization(String),
    #[error("failed to load draft: {0}")]
    DraftLoadFailed(String),
    #[error("failed to save draft: {0}")]
    DraftSaveFailed(String),
    #[error("failed to clear draft: {0}")]
    DraftClearFailed(String),
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) struct FormState {
    pub(super) initial: Node,
    pub(super) model: Node,
    pub(super) show_errors: bool,
}

pub(super) struct FormInner {
    pub(super) id: FormId,
    pub(super) options: FormOptions,
    pub(super) state: RwLock<FormState>,
    pub(super) container: ValidationContainer,
    pub(super) errors: ErrorCapture,
    pub(super) fields: RwLock<Vec<Field>>,
    pub(super) spawner: Rc<dyn Spawn>,
}

/// Owns the root model of one form and the fields bound into it.
///
/// Field edits flow back through [`FormController::set_model`], which
/// re-syncs every mounted field against the new root.
#[derive(Clone)]
pub struct FormController {
    pub(super) inner: Rc<FormInner>,
}

impl FormController {
    pub fn new(initial: Node, options: FormOptions, spawner: Rc<dyn Spawn>) -> Self {
        Self::with_id(FormId::next(), initial, options, spawner)
    }

    pub fn with_id(
        id: FormId,
        initial: Node,
        options: FormOptions,
        spawner: Rc<dyn Spawn>,
    ) -> Self {
        Self {
            inner: Rc::new(FormInner {
                id,
                options,
                state: RwLock::new(FormState {
                    initial: initial.clone(),
                    model: initial,
                    show_errors: options.show_errors,
                }),
                container: ValidationContainer::new(),
                errors: ErrorCapture::new(),
                fields: RwLock::new(Vec::new()),
                spawner,
            }),
        }
    }

    pub fn from_model<T: Serialize>(
        model: &T,
        options: FormOptions,
        spawner: Rc<dyn Spawn>,
    ) -> FormResult<Self> {
        let initial =
            Node::from_model(model).map_err(|error| FormError::Serialization(error.to_string()))?;
        Ok(Self::new(initial, options, spawner))
    }

    pub fn id(&self) -> &FormId {
        &self.inner.id
    }

    pub fn options(&self) -> FormOptions {
        self.inner.options
    }

    pub fn container(&self) -> ValidationContainer {
        self.inner.container.clone()
    }

    pub fn errors(&self) -> ErrorCapture {
        self.inner.errors.clone()
    }

    pub fn model(&self) -> FormResult<Node> {
        Ok(read_lock(&self.inner.state, "reading form model")?
            .model
            .clone())
    }

    pub fn initial(&self) -> FormResult<Node> {
        Ok(read_lock(&self.inner.state, "reading initial model")?
            .initial
            .clone())
    }

    pub fn model_as<T: DeserializeOwned>(&self) -> FormResult<T> {
        self.model()?
            .to_model()
            .map_err(|error| FormError::Serialization(error.to_string()))
    }

    /// Mount a field bound to this form's model and container.
    pub fn field(&self, mut options: FieldOptions) -> FormResult<Field> {
        options.defer.get_or_insert(self.inner.options.defer);
        options
            .branch_policy
            .get_or_insert(self.inner.options.branch_policy);

        let weak = Rc::downgrade(&self.inner);
        let sink: Arc<dyn ErrorSink> = Arc::new(self.inner.errors.clone());
        let field = Field::new(options, self.inner.container.clone(), self.inner.spawner.clone())
            .with_error_sink(sink)
            .with_on_change(move |root| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let controller = FormController { inner };
                if let Err(error) = controller.set_model(root) {
                    controller
                        .inner
                        .errors
                        .capture(CapturedError::from_error(&error));
                }
            });

        let (model, show_errors) = {
            let state = read_lock(&self.inner.state, "reading model for new field")?;
            (state.model.clone(), state.show_errors)
        };
        if show_errors {
            field.show_errors_now()?;
        }
        field.mount(&model)?;
        write_lock(&self.inner.fields, "registering field")?.push(field.clone());
        Ok(field)
    }

    pub fn field_for<T, L: FieldLens<T>>(
        &self,
        lens: L,
        configure: impl FnOnce(FieldOptions) -> FieldOptions,
    ) -> FormResult<Field> {
        self.field(configure(FieldOptions::for_lens(lens)))
    }

    pub fn unmount(&self, field: &Field) -> FormResult<()> {
        write_lock(&self.inner.fields, "removing field")?.retain(|known| !known.is_same(field));
        field.unmount()
    }

    /// Replace the root model and re-sync every mounted field.
    pub fn set_model(&self, model: Node) -> FormResult<()> {
        write_lock(&self.inner.state, "replacing form model")?.model = model.clone();
        let fields = read_lock(&self.inner.fields, "reading fields for sync")?.clone();
        for field in fields {
            field.sync(&model)?;
        }
        Ok(())
    }

    pub fn update(&self, path: impl Into<Path>, value: impl Into<Node>) -> FormResult<Node> {
        let next = set(path)
            .to(value)
            .with_policy(self.inner.options.branch_policy)
            .within(&self.model()?);
        self.set_model(next.clone())?;
        Ok(next)
    }

    pub fn update_field<T, L: FieldLens<T>>(&self, lens: L, value: &L::Value) -> FormResult<()> {
        let next = lens.write(&self.model()?, value)?;
        self.set_model(next)
    }

    pub fn field_value<T, L: FieldLens<T>>(&self, lens: L) -> FormResult<Option<L::Value>> {
        lens.read(&self.model()?)
    }

    pub fn show_errors_now(&self) -> FormResult<()> {
        write_lock(&self.inner.state, "showing form errors")?.show_errors = true;
        let fields = read_lock(&self.inner.fields, "reading fields to show errors")?.clone();
        for field in fields {
            field.show_errors_now()?;
        }
        Ok(())
    }

    pub fn errors_for(&self, prefix: &str) -> FormResult<Vec<FieldErrors>> {
        self.inner
            .container
            .get_all_errors_for_location(Some(prefix))
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        Ok(self.errors_for("")?.is_empty())
    }

    pub fn is_validating(&self) -> FormResult<bool> {
        self.inner.container.is_validation_in_progress()
    }

    /// Leaf changes from the initial model, tagged new or changed.
    pub fn changes(&self) -> FormResult<Vec<DiffEntry>> {
        let state = read_lock(&self.inner.state, "diffing form model")?;
        Ok(leaf_diff(&state.initial)
            .specify_new_or_updated()
            .to(&state.model))
    }

    pub fn is_dirty(&self) -> FormResult<bool> {
        Ok(!self.changes()?.is_empty())
    }

    pub fn reset_to_initial(&self) -> FormResult<()> {
        let initial = {
            let mut state = write_lock(&self.inner.state, "resetting form")?;
            state.model = state.initial.clone();
            state.show_errors = self.inner.options.show_errors;
            state.initial.clone()
        };
        let fields = read_lock(&self.inner.fields, "reading fields for reset")?.clone();
        for field in &fields {
            field.reset_visibility()?;
        }
        for field in &fields {
            field.sync(&initial)?;
        }
        Ok(())
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
