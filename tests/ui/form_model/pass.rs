use formtree::form::{ControlOptions, FormGroup, FormModel};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, formtree::form::FormModel)]
struct SignupForm {
    email: String,
    #[serde(rename = "displayName", default)]
    display_name: String,
    r#type: String,
}

fn main() {
    let fields = SignupForm::fields();
    assert_eq!(fields.email().as_str(), "email");
    assert_eq!(fields.display_name().as_str(), "displayName");
    assert_eq!(fields.r#type().as_str(), "type");
    assert_eq!(SignupForm::field_keys().len(), 3);

    let model = SignupForm {
        email: "a@example.com".to_string(),
        display_name: "A".to_string(),
        r#type: "trial".to_string(),
    };
    let form = FormGroup::from_model(&model, ControlOptions::default()).unwrap();
    assert_eq!(form.field(fields.display_name()).unwrap().value(), "A");
    form.field(fields.email())
        .unwrap()
        .set_value("b@example.com");
    let updated: SignupForm = form.model().unwrap();
    assert_eq!(updated.email, "b@example.com");
    assert_eq!(updated.display_name, "A");
}
