use std::rc::Rc;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{AbortHandle, Abortable, try_join_all};
use futures::task::{Spawn, SpawnExt};
use futures_timer::Delay;

use super::container::{Namespace, ValidationContainer};
use super::controller::{FormError, FormResult, read_lock, write_lock};
use super::validation::{FieldLens, Validation, Validator, ValidatorError};
use crate::feedback::{CapturedError, ErrorSink};
use crate::model::{BranchPolicy, Node, Path, get, set};

pub const DEFAULT_DEFER: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

impl ValidationTicket {
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Clone)]
pub struct FieldOptions {
    pub(super) path: Path,
    pub(super) validators: Vec<Arc<dyn Validator>>,
    pub(super) deferred_validators: Vec<Arc<dyn Validator>>,
    pub(super) defer: Option<Duration>,
    pub(super) fail_over_paths: Vec<Path>,
    pub(super) show_errors: bool,
    pub(super) branch_policy: Option<BranchPolicy>,
}

impl FieldOptions {
    pub fn new(path: impl Into<Path>) -> Self {
        Self {
            path: path.into(),
            validators: Vec::new(),
            deferred_validators: Vec::new(),
            defer: None,
            fail_over_paths: Vec::new(),
            show_errors: false,
            branch_policy: None,
        }
    }

    pub fn for_lens<T, L: FieldLens<T>>(lens: L) -> Self {
        Self::new(lens.path())
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn deferred_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.deferred_validators.push(Arc::new(validator));
        self
    }

    pub fn defer(mut self, value: Duration) -> Self {
        self.defer = Some(value);
        self
    }

    pub fn defer_millis(self, value: u64) -> Self {
        self.defer(Duration::from_millis(value))
    }

    /// Read from `path` when every earlier path holds no value.
    pub fn fail_over(mut self, path: impl Into<Path>) -> Self {
        self.fail_over_paths.push(path.into());
        self
    }

    pub fn show_errors(mut self, value: bool) -> Self {
        self.show_errors = value;
        self
    }

    pub fn branch_policy(mut self, value: BranchPolicy) -> Self {
        self.branch_policy = Some(value);
        self
    }
}

struct FieldState {
    path: Path,
    root: Node,
    target: Node,
    ticket: ValidationTicket,
    touched: bool,
    show_errors: bool,
    deferred: Option<AbortHandle>,
    mounted: bool,
}

struct FieldShared {
    validators: Vec<Arc<dyn Validator>>,
    deferred_validators: Vec<Arc<dyn Validator>>,
    defer: Duration,
    fail_over_paths: Vec<Path>,
    show_errors: bool,
    branch_policy: BranchPolicy,
    container: ValidationContainer,
    state: RwLock<FieldState>,
}

impl FieldShared {
    fn resolve(&self, root: &Node, path: &Path) -> Node {
        std::iter::once(path)
            .chain(&self.fail_over_paths)
            .map(|candidate| get(candidate).from(root))
            .find(|value| !value.is_missing())
            .unwrap_or_default()
    }

    fn is_current(&self, ticket: ValidationTicket) -> FormResult<bool> {
        let state = read_lock(&self.state, "checking validation ticket")?;
        Ok(state.mounted && state.ticket == ticket)
    }

    fn finish(
        &self,
        namespace: Namespace,
        ticket: ValidationTicket,
        path: &Path,
        result: Result<Vec<String>, ValidatorError>,
        errors: Option<&dyn ErrorSink>,
    ) -> FormResult<()> {
        if !self.is_current(ticket)? {
            tracing::debug!(%path, %namespace, ticket = ticket.0, "dropping stale validation result");
            return Ok(());
        }

        match result {
            Ok(messages) => {
                tracing::debug!(%path, %namespace, count = messages.len(), "validation settled");
                self.container.set(|state| {
                    state
                        .with_messages(namespace, path, messages)
                        .without_in_flight(namespace, path)
                })
            }
            Err(error) => {
                self.container.set(|state| {
                    state
                        .without_entry(namespace, path)
                        .without_in_flight(namespace, path)
                })?;
                match errors {
                    Some(sink) => sink.report(CapturedError::from_error(&error)),
                    None => tracing::warn!(%path, %namespace, %error, "validator failed"),
                }
                Ok(())
            }
        }
    }
}

/// The validation lifecycle of one bound value.
///
/// Every change of the resolved value or of the path starts a new round and
/// bumps the field's ticket. Rounds resolving under an older ticket are
/// dropped without touching the container.
#[derive(Clone)]
pub struct Field {
    shared: Arc<FieldShared>,
    spawner: Rc<dyn Spawn>,
    errors: Option<Arc<dyn ErrorSink>>,
    on_change: Option<Rc<dyn Fn(Node)>>,
}

impl Field {
    pub fn new(options: FieldOptions, container: ValidationContainer, spawner: Rc<dyn Spawn>) -> Self {
        let FieldOptions {
            path,
            validators,
            deferred_validators,
            defer,
            fail_over_paths,
            show_errors,
            branch_policy,
        } = options;
        Self {
            shared: Arc::new(FieldShared {
                validators,
                deferred_validators,
                defer: defer.unwrap_or(DEFAULT_DEFER),
                fail_over_paths,
                show_errors,
                branch_policy: branch_policy.unwrap_or_default(),
                container,
                state: RwLock::new(FieldState {
                    path,
                    root: Node::Missing,
                    target: Node::Missing,
                    ticket: ValidationTicket::default(),
                    touched: false,
                    show_errors,
                    deferred: None,
                    mounted: false,
                }),
            }),
            spawner,
            errors: None,
            on_change: None,
        }
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.errors = Some(sink);
        self
    }

    pub fn with_on_change(mut self, on_change: impl Fn(Node) + 'static) -> Self {
        self.on_change = Some(Rc::new(on_change));
        self
    }

    pub fn is_same(&self, other: &Field) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn mount(&self, root: &Node) -> FormResult<()> {
        let (ticket, path, value) = {
            let mut state = write_lock(&self.shared.state, "mounting field")?;
            state.mounted = true;
            state.root = root.clone();
            state.target = self.shared.resolve(root, &state.path);
            state.ticket = state.ticket.next();
            (state.ticket, state.path.clone(), state.target.clone())
        };
        self.start_round(ticket, path, value)
    }

    /// Follow a new root. Starts a round only when the resolved value changed.
    pub fn sync(&self, root: &Node) -> FormResult<()> {
        let round = {
            let mut state = write_lock(&self.shared.state, "syncing field")?;
            state.root = root.clone();
            if !state.mounted {
                return Ok(());
            }
            let resolved = self.shared.resolve(root, &state.path);
            if resolved == state.target {
                None
            } else {
                state.target = resolved;
                state.ticket = state.ticket.next();
                Some((state.ticket, state.path.clone(), state.target.clone()))
            }
        };
        match round {
            Some((ticket, path, value)) => self.start_round(ticket, path, value),
            None => Ok(()),
        }
    }

    pub fn value(&self) -> FormResult<Node> {
        Ok(read_lock(&self.shared.state, "reading field value")?
            .target
            .clone())
    }

    pub fn path(&self) -> FormResult<Path> {
        Ok(read_lock(&self.shared.state, "reading field path")?
            .path
            .clone())
    }

    pub fn root(&self) -> FormResult<Node> {
        Ok(read_lock(&self.shared.state, "reading field root")?
            .root
            .clone())
    }

    /// Write `next` at the primary path and hand the new root to `on_change`.
    pub fn update_value(&self, next: impl Into<Node>) -> FormResult<Node> {
        let (root, path) = {
            let state = read_lock(&self.shared.state, "reading field before update")?;
            (state.root.clone(), state.path.clone())
        };
        let updated = set(&path)
            .to(next)
            .with_policy(self.shared.branch_policy)
            .within(&root);
        self.sync(&updated)?;
        if let Some(on_change) = &self.on_change {
            on_change(updated.clone());
        }
        Ok(updated)
    }

    pub fn mark_touched(&self) -> FormResult<()> {
        write_lock(&self.shared.state, "marking field touched")?.touched = true;
        Ok(())
    }

    pub fn is_touched(&self) -> FormResult<bool> {
        Ok(read_lock(&self.shared.state, "reading touched flag")?.touched)
    }

    pub fn show_errors_now(&self) -> FormResult<()> {
        write_lock(&self.shared.state, "showing field errors")?.show_errors = true;
        Ok(())
    }

    /// Forget touched and shown state, back to the mount-time configuration.
    pub fn reset_visibility(&self) -> FormResult<()> {
        let mut state = write_lock(&self.shared.state, "resetting field visibility")?;
        state.touched = false;
        state.show_errors = self.shared.show_errors;
        Ok(())
    }

    /// Messages for this field, empty until it was touched or errors were
    /// explicitly shown.
    pub fn visible_errors(&self) -> FormResult<Vec<String>> {
        let path = {
            let state = read_lock(&self.shared.state, "reading field visibility")?;
            if !(state.touched || state.show_errors) {
                return Ok(Vec::new());
            }
            state.path.clone()
        };
        self.shared.container.get(path)
    }

    pub fn is_validating(&self) -> FormResult<bool> {
        let path = self.path()?;
        let snapshot = self.shared.container.snapshot()?;
        Ok(Namespace::ALL
            .into_iter()
            .any(|namespace| snapshot.in_flight().contains(&(namespace, path.clone()))))
    }

    /// Move the field to `path`, evicting everything reported under the old one.
    pub fn set_path(&self, path: impl Into<Path>) -> FormResult<()> {
        let path = path.into();
        let (previous, round) = {
            let mut state = write_lock(&self.shared.state, "changing field path")?;
            if state.path == path {
                return Ok(());
            }
            if let Some(handle) = state.deferred.take() {
                handle.abort();
            }
            let previous = std::mem::replace(&mut state.path, path);
            state.target = self.shared.resolve(&state.root, &state.path);
            state.ticket = state.ticket.next();
            let round = state
                .mounted
                .then(|| (state.ticket, state.path.clone(), state.target.clone()));
            (previous, round)
        };
        self.shared
            .container
            .set(|state| state.without_field(&previous))?;
        match round {
            Some((ticket, path, value)) => self.start_round(ticket, path, value),
            None => Ok(()),
        }
    }

    /// Cancel the pending deferred round and evict this field's entries.
    /// Rounds still awaiting their validators resolve as stale.
    pub fn unmount(&self) -> FormResult<()> {
        let path = {
            let mut state = write_lock(&self.shared.state, "unmounting field")?;
            if let Some(handle) = state.deferred.take() {
                handle.abort();
            }
            state.mounted = false;
            state.ticket = state.ticket.next();
            state.path.clone()
        };
        tracing::debug!(%path, "unmounted field");
        self.shared.container.set(|state| state.without_field(&path))
    }

    fn start_round(&self, ticket: ValidationTicket, path: Path, value: Node) -> FormResult<()> {
        tracing::debug!(%path, ticket = ticket.0, "starting validation round");
        if !self.shared.validators.is_empty() {
            self.run_immediate(ticket, &path, &value)?;
        }
        if !self.shared.deferred_validators.is_empty() {
            self.schedule_deferred(ticket, path, value)?;
        }
        Ok(())
    }

    fn run_immediate(&self, ticket: ValidationTicket, path: &Path, value: &Node) -> FormResult<()> {
        let namespace = Namespace::NonDeferred;
        self.shared
            .container
            .set(|state| state.with_in_flight(namespace, path))?;

        let verdicts = self
            .shared
            .validators
            .iter()
            .map(|validator| validator.validate(value))
            .collect::<Vec<_>>();
        if !verdicts.iter().any(Validation::is_pending) {
            let result = combine(verdicts.iter().filter_map(Validation::ready));
            return self
                .shared
                .finish(namespace, ticket, path, result, self.errors.as_deref());
        }

        self.shared
            .container
            .set(|state| state.with_validating(namespace, path))?;
        let shared = self.shared.clone();
        let errors = self.errors.clone();
        let path = path.clone();
        self.spawn(async move {
            let result = settle_all(verdicts).await;
            if let Err(error) = shared.finish(namespace, ticket, &path, result, errors.as_deref()) {
                tracing::error!(%path, %error, "failed to record validation result");
            }
        })
    }

    fn schedule_deferred(&self, ticket: ValidationTicket, path: Path, value: Node) -> FormResult<()> {
        let namespace = Namespace::Deferred;
        self.shared
            .container
            .set(|state| state.with_in_flight(namespace, &path))?;

        let (handle, registration) = AbortHandle::new_pair();
        {
            let mut state = write_lock(&self.shared.state, "scheduling deferred validation")?;
            if let Some(previous) = state.deferred.replace(handle) {
                previous.abort();
            }
        }

        let shared = self.shared.clone();
        let errors = self.errors.clone();
        let round = async move {
            Delay::new(shared.defer).await;
            match shared.is_current(ticket) {
                Ok(true) => {}
                Ok(false) => return,
                Err(error) => {
                    tracing::error!(%path, %error, "failed to start deferred validation");
                    return;
                }
            }

            let verdicts = shared
                .deferred_validators
                .iter()
                .map(|validator| validator.validate(&value))
                .collect::<Vec<_>>();
            if verdicts.iter().any(Validation::is_pending) {
                if let Err(error) = shared
                    .container
                    .set(|state| state.with_validating(namespace, &path))
                {
                    tracing::error!(%path, %error, "failed to mark deferred validation");
                }
            }
            let result = settle_all(verdicts).await;
            if let Err(error) = shared.finish(namespace, ticket, &path, result, errors.as_deref()) {
                tracing::error!(%path, %error, "failed to record deferred validation result");
            }
        };
        self.spawn(Abortable::new(round, registration).map(|_| ()))
    }

    fn spawn(&self, task: impl std::future::Future<Output = ()> + Send + 'static) -> FormResult<()> {
        self.spawner
            .spawn(task)
            .map_err(|error| FormError::SpawnFailed(error.to_string()))
    }
}

fn combine(
    results: impl IntoIterator<Item = Result<Vec<String>, ValidatorError>>,
) -> Result<Vec<String>, ValidatorError> {
    let mut messages = Vec::new();
    for result in results {
        messages.extend(result?);
    }
    Ok(messages)
}

async fn settle_all(verdicts: Vec<Validation>) -> Result<Vec<String>, ValidatorError> {
    let settled = try_join_all(verdicts.into_iter().map(Validation::settle)).await?;
    Ok(settled.concat())
}
