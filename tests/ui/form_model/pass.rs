use formtree::form::{FieldLens, FormModel};
use formtree::model::Node;
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, formtree::form::FormModel)]
struct SignupForm {
    email: String,
    #[serde(rename = "displayName")]
    display_name: String,
}

fn main() {
    let fields = SignupForm::fields();
    let lens = fields.email();
    let mut model = SignupForm {
        email: "a@x.com".to_string(),
        display_name: "Ada".to_string(),
    };
    lens.set(&mut model, "b@x.com".to_string());
    assert_eq!(lens.key(), "email");
    assert_eq!(lens.get(&model), "b@x.com");
    assert_eq!(fields.display_name().path().to_string(), "displayName");

    let root = Node::from_model(&model).expect("serialize model");
    let written = fields
        .display_name()
        .write(&root, &"Grace".to_string())
        .expect("write display name");
    assert_eq!(
        fields.display_name().read(&written).expect("read display name"),
        Some("Grace".to_string())
    );
}
