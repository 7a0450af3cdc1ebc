use serde::Serialize;

use super::controller::{FormController, FormResult, read_lock};
use super::field::Field;
use crate::model::{Node, Path};

/// Everything a widget needs to render one field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldView {
    pub path: Path,
    pub value: Node,
    pub errors: Vec<String>,
    pub touched: bool,
    pub validating: bool,
}

impl FieldView {
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Field {
    pub fn view(&self) -> FormResult<FieldView> {
        Ok(FieldView {
            path: self.path()?,
            value: self.value()?,
            errors: self.visible_errors()?,
            touched: self.is_touched()?,
            validating: self.is_validating()?,
        })
    }
}

impl FormController {
    /// The first visible message of the mounted field at `path`.
    pub fn field_error_for_display(&self, path: impl Into<Path>) -> FormResult<Option<String>> {
        let path = path.into();
        let fields = read_lock(&self.inner.fields, "reading fields for display")?.clone();
        for field in fields {
            if field.path()? == path {
                return Ok(field.visible_errors()?.into_iter().next());
            }
        }
        Ok(None)
    }

    pub fn views(&self) -> FormResult<Vec<FieldView>> {
        read_lock(&self.inner.fields, "reading fields for views")?
            .clone()
            .iter()
            .map(Field::view)
            .collect()
    }
}
