use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use super::controller::{FormError, FormResult, read_lock, write_lock};
use crate::model::Path;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Namespace {
    NonDeferred,
    Deferred,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::NonDeferred, Namespace::Deferred];

    pub const fn as_str(self) -> &'static str {
        match self {
            Namespace::NonDeferred => "non-deferred",
            Namespace::Deferred => "deferred",
        }
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldMessages {
    /// A round is running and no result has been written yet.
    Validating,
    Reported(Vec<String>),
}

impl FieldMessages {
    pub fn messages(&self) -> &[String] {
        match self {
            FieldMessages::Validating => &[],
            FieldMessages::Reported(messages) => messages,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldErrors {
    pub location: Path,
    pub messages: Vec<String>,
}

/// One immutable snapshot of every namespace's results. Within a namespace,
/// locations keep the order they were first written in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationState {
    namespaces: BTreeMap<Namespace, Vec<(Path, FieldMessages)>>,
    in_flight: BTreeSet<(Namespace, Path)>,
}

fn find<'a>(entries: &'a [(Path, FieldMessages)], path: &Path) -> Option<&'a FieldMessages> {
    entries
        .iter()
        .find_map(|(known, messages)| (known == path).then_some(messages))
}

impl ValidationState {
    pub fn entry(&self, namespace: Namespace, path: &Path) -> Option<&FieldMessages> {
        find(self.namespaces.get(&namespace)?, path)
    }

    fn put(&mut self, namespace: Namespace, path: &Path, messages: FieldMessages) {
        let entries = self.namespaces.entry(namespace).or_default();
        match entries.iter_mut().find(|(known, _)| known == path) {
            Some((_, current)) => *current = messages,
            None => entries.push((path.clone(), messages)),
        }
    }

    pub fn in_flight(&self) -> &BTreeSet<(Namespace, Path)> {
        &self.in_flight
    }

    pub fn with_messages(mut self, namespace: Namespace, path: &Path, messages: Vec<String>) -> Self {
        self.put(namespace, path, FieldMessages::Reported(messages));
        self
    }

    pub fn with_validating(mut self, namespace: Namespace, path: &Path) -> Self {
        self.put(namespace, path, FieldMessages::Validating);
        self
    }

    pub fn without_entry(mut self, namespace: Namespace, path: &Path) -> Self {
        if let Some(entries) = self.namespaces.get_mut(&namespace) {
            entries.retain(|(known, _)| known != path);
            if entries.is_empty() {
                self.namespaces.remove(&namespace);
            }
        }
        self
    }

    pub fn with_in_flight(mut self, namespace: Namespace, path: &Path) -> Self {
        self.in_flight.insert((namespace, path.clone()));
        self
    }

    pub fn without_in_flight(mut self, namespace: Namespace, path: &Path) -> Self {
        self.in_flight.remove(&(namespace, path.clone()));
        self
    }

    /// Drop every entry and in-flight marker the field at `path` owns.
    pub fn without_field(self, path: &Path) -> Self {
        Namespace::ALL.into_iter().fold(self, |state, namespace| {
            state
                .without_entry(namespace, path)
                .without_in_flight(namespace, path)
        })
    }

    pub fn messages_for(&self, path: &Path) -> Vec<String> {
        self.namespaces
            .values()
            .filter_map(|entries| find(entries, path))
            .flat_map(|entry| entry.messages().iter().cloned())
            .collect()
    }

    pub fn errors_with_prefix(&self, prefix: &str) -> Vec<FieldErrors> {
        let mut grouped = Vec::<FieldErrors>::new();
        for entries in self.namespaces.values() {
            for (path, entry) in entries {
                if !path.has_prefix(prefix) {
                    continue;
                }
                match grouped.iter_mut().find(|known| known.location == *path) {
                    Some(known) => known.messages.extend(entry.messages().iter().cloned()),
                    None => grouped.push(FieldErrors {
                        location: path.clone(),
                        messages: entry.messages().to_vec(),
                    }),
                }
            }
        }
        grouped.retain(|errors| !errors.messages.is_empty());
        grouped
    }

    pub fn namespaces_currently_validating(&self) -> BTreeSet<Namespace> {
        self.in_flight.iter().map(|(namespace, _)| *namespace).collect()
    }
}

/// Shared handle to the current [`ValidationState`]. Every write replaces the
/// snapshot through an updater over the previous one.
#[derive(Clone, Default)]
pub struct ValidationContainer {
    state: Arc<RwLock<Arc<ValidationState>>>,
    writer: Arc<Mutex<()>>,
}

impl ValidationContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FormResult<Arc<ValidationState>> {
        Ok(read_lock(&self.state, "reading validation snapshot")?.clone())
    }

    /// Writers are applied one at a time. The updater runs without holding the
    /// state lock, so it may read the container, but it must not call `set`.
    pub fn set(&self, updater: impl FnOnce(ValidationState) -> ValidationState) -> FormResult<()> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| FormError::StatePoisoned("serializing validation writers"))?;
        let previous = ValidationState::clone(&*self.snapshot()?);
        let next = Arc::new(updater(previous));
        *write_lock(&self.state, "updating validation state")? = next;
        Ok(())
    }

    pub fn get(&self, path: impl Into<Path>) -> FormResult<Vec<String>> {
        Ok(self.snapshot()?.messages_for(&path.into()))
    }

    /// Messages grouped per location for every path starting with `prefix`;
    /// `None` means all paths.
    pub fn get_all_errors_for_location(&self, prefix: Option<&str>) -> FormResult<Vec<FieldErrors>> {
        Ok(self.snapshot()?.errors_with_prefix(prefix.unwrap_or_default()))
    }

    pub fn set_namespaces_currently_validating(
        &self,
        updater: impl FnOnce(BTreeSet<(Namespace, Path)>) -> BTreeSet<(Namespace, Path)>,
    ) -> FormResult<()> {
        self.set(|mut state| {
            state.in_flight = updater(std::mem::take(&mut state.in_flight));
            state
        })
    }

    pub fn namespaces_currently_validating(&self) -> FormResult<BTreeSet<Namespace>> {
        Ok(self.snapshot()?.namespaces_currently_validating())
    }

    pub fn is_validation_in_progress(&self) -> FormResult<bool> {
        Ok(!read_lock(&self.state, "checking validation progress")?
            .in_flight
            .is_empty())
    }
}
