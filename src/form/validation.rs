use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::controller::{FormError, FormResult};
use crate::model::{Node, Path, get, set};

/// A validator that failed to produce a verdict. Reported to the error sink,
/// never shown as a field message.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidatorError {
    message: String,
}

impl ValidatorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type PendingValidation = BoxFuture<'static, Result<Vec<String>, ValidatorError>>;

/// What a validator returns for one value.
pub enum Validation {
    Valid,
    Invalid(Vec<String>),
    Pending(PendingValidation),
    Failed(ValidatorError),
}

impl Validation {
    pub fn invalid(message: impl Into<String>) -> Self {
        Validation::Invalid(vec![message.into()])
    }

    /// Wrap an awaitable verdict. The output may be anything a synchronous
    /// validator could return.
    pub fn pending<F, R>(future: F) -> Self
    where
        F: Future<Output = R> + Send + 'static,
        R: Into<Validation>,
    {
        Validation::Pending(future.then(|verdict| verdict.into().settle()).boxed())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Validation::Pending(_))
    }

    /// Resolve to the message list, awaiting if necessary.
    pub fn settle(self) -> PendingValidation {
        match self {
            Validation::Valid => futures::future::ready(Ok(Vec::new())).boxed(),
            Validation::Invalid(messages) => futures::future::ready(Ok(messages)).boxed(),
            Validation::Failed(error) => futures::future::ready(Err(error)).boxed(),
            Validation::Pending(future) => future,
        }
    }

    /// The verdict if it is already known.
    pub fn ready(&self) -> Option<Result<Vec<String>, ValidatorError>> {
        match self {
            Validation::Valid => Some(Ok(Vec::new())),
            Validation::Invalid(messages) => Some(Ok(messages.clone())),
            Validation::Failed(error) => Some(Err(error.clone())),
            Validation::Pending(_) => None,
        }
    }
}

impl std::fmt::Debug for Validation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validation::Valid => f.write_str("Valid"),
            Validation::Invalid(messages) => f.debug_tuple("Invalid").field(messages).finish(),
            Validation::Pending(_) => f.write_str("Pending(..)"),
            Validation::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

impl From<()> for Validation {
    fn from((): ()) -> Self {
        Validation::Valid
    }
}

impl From<&str> for Validation {
    fn from(message: &str) -> Self {
        String::from(message).into()
    }
}

impl From<String> for Validation {
    fn from(message: String) -> Self {
        if message.is_empty() {
            Validation::Valid
        } else {
            Validation::Invalid(vec![message])
        }
    }
}

impl From<Vec<String>> for Validation {
    fn from(messages: Vec<String>) -> Self {
        let messages = messages
            .into_iter()
            .filter(|message| !message.is_empty())
            .collect::<Vec<_>>();
        if messages.is_empty() {
            Validation::Valid
        } else {
            Validation::Invalid(messages)
        }
    }
}

impl From<Vec<&str>> for Validation {
    fn from(messages: Vec<&str>) -> Self {
        messages
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
            .into()
    }
}

impl<T: Into<Validation>> From<Option<T>> for Validation {
    fn from(value: Option<T>) -> Self {
        value.map_or(Validation::Valid, Into::into)
    }
}

impl<T: Into<Validation>> From<Result<T, ValidatorError>> for Validation {
    fn from(value: Result<T, ValidatorError>) -> Self {
        match value {
            Ok(verdict) => verdict.into(),
            Err(error) => Validation::Failed(error),
        }
    }
}

pub trait Validator: Send + Sync {
    fn validate(&self, value: &Node) -> Validation;
}

impl<F, R> Validator for F
where
    F: Fn(&Node) -> R + Send + Sync,
    R: Into<Validation>,
{
    fn validate(&self, value: &Node) -> Validation {
        (self)(value).into()
    }
}

/// A struct usable as the typed face of a form model. Derive it with
/// `#[derive(FormModel)]` next to serde's derives.
pub trait FormModel: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Fields;

    fn fields() -> Self::Fields;
}

pub trait FieldLens<T>: Copy + Send + Sync + 'static {
    type Value: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static;

    fn key(self) -> &'static str;
    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);

    fn path(self) -> Path {
        Path::from(self.key())
    }

    fn read(self, root: &Node) -> FormResult<Option<Self::Value>> {
        let node = get(self.path()).from(root);
        if node.is_missing() {
            return Ok(None);
        }
        node.to_model()
            .map(Some)
            .map_err(|error| FormError::Serialization(error.to_string()))
    }

    fn write(self, root: &Node, value: &Self::Value) -> FormResult<Node> {
        let node =
            Node::from_model(value).map_err(|error| FormError::Serialization(error.to_string()))?;
        Ok(set(self.path()).to(node).within(root))
    }
}
