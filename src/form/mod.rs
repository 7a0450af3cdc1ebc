mod binding;
mod container;
mod controller;
mod draft;
mod field;
mod validation;


pub use binding::FieldView;
pub use container::{FieldErrors, FieldMessages, Namespace, ValidationContainer, ValidationState};
pub use controller::{FormController, FormError, FormId, FormOptions, FormResult};
pub use draft::{InMemorySnapshotStore, JsonFileSnapshotStore, SnapshotFileError, SnapshotStore};
pub use field::{DEFAULT_DEFER, Field, FieldOptions, ValidationTicket};
pub use formtree_derive::FormModel;
pub use validation::{
    FieldLens, FormModel, PendingValidation, Validation, Validator, ValidatorError,
};
