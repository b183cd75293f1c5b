use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::student::{Gender, Student, StudentId};

/// The editable fields of a student, i.e. a record without its identifier.
/// This is also the request body of `POST /students` and `PUT /students/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: Gender,
    pub country: String,
    pub avatar: String,
    pub btc_address: String,
}

impl StudentForm {
    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::FirstName => &self.first_name,
            FormField::LastName => &self.last_name,
            FormField::Email => &self.email,
            FormField::Gender => self.gender.as_str(),
            FormField::Country => &self.country,
            FormField::Avatar => &self.avatar,
            FormField::BtcAddress => &self.btc_address,
        }
    }

    pub fn into_student(self, id: StudentId) -> Student {
        Student {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            gender: self.gender,
            country: self.country,
            avatar: self.avatar,
            btc_address: self.btc_address,
        }
    }

    pub fn is_blank(&self) -> bool {
        *self == StudentForm::default()
    }
}

/// Fields of the student form in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormField {
    Email,
    Gender,
    FirstName,
    LastName,
    Country,
    Avatar,
    BtcAddress,
}

impl FormField {
    pub const ALL: [FormField; 7] = [
        FormField::Email,
        FormField::Gender,
        FormField::FirstName,
        FormField::LastName,
        FormField::Country,
        FormField::Avatar,
        FormField::BtcAddress,
    ];

    /// Name used on the wire and in validation error bodies.
    pub fn name(&self) -> &'static str {
        match self {
            FormField::FirstName => "first_name",
            FormField::LastName => "last_name",
            FormField::Email => "email",
            FormField::Gender => "gender",
            FormField::Country => "country",
            FormField::Avatar => "avatar",
            FormField::BtcAddress => "btc_address",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FormField::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormField::FirstName => "First Name",
            FormField::LastName => "Last Name",
            FormField::Email => "Email address",
            FormField::Gender => "Gender",
            FormField::Country => "Country",
            FormField::Avatar => "Avatar",
            FormField::BtcAddress => "BTC Address",
        }
    }

    /// Get the next field (wrapping around)
    pub fn next(&self) -> Self {
        let idx = FormField::ALL.iter().position(|f| f == self).unwrap_or(0);
        FormField::ALL[(idx + 1) % FormField::ALL.len()]
    }

    /// Get the previous field (wrapping around)
    pub fn prev(&self) -> Self {
        let idx = FormField::ALL.iter().position(|f| f == self).unwrap_or(0);
        FormField::ALL[(idx + FormField::ALL.len() - 1) % FormField::ALL.len()]
    }
}

/// Shallow-merge a single field value into the form.
pub fn update_field(mut form: StudentForm, field: FormField, value: impl Into<String>) -> StudentForm {
    let value = value.into();
    match field {
        FormField::FirstName => form.first_name = value,
        FormField::LastName => form.last_name = value,
        FormField::Email => form.email = value,
        FormField::Gender => form.gender = Gender::parse(&value),
        FormField::Country => form.country = value,
        FormField::Avatar => form.avatar = value,
        FormField::BtcAddress => form.btc_address = value,
    }
    form
}

/// Per-field messages from a 422 response.
///
/// The backend answers `{ "error": { "<field>": "<message>", ... } }`; a bare
/// field map is accepted as well. Keys that are not form fields are kept so
/// callers can still show them generically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<String, String>);

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: BTreeMap<String, String>,
}

impl FieldErrors {
    pub fn from_body(body: &str) -> Option<Self> {
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
            return Some(FieldErrors(envelope.error));
        }
        serde_json::from_str::<BTreeMap<String, String>>(body)
            .ok()
            .map(FieldErrors)
    }

    pub fn get(&self, field: FormField) -> Option<&str> {
        self.0.get(field.name()).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = FormField> + '_ {
        self.0.keys().filter_map(|k| FormField::from_name(k))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FieldErrors(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_form_defaults_gender_to_other() {
        let form = StudentForm::default();
        assert!(form.is_blank());
        assert_eq!(form.gender, Gender::Other);
        assert_eq!(form.email, "");
    }

    #[test]
    fn test_update_field_merges_one_field() {
        let form = StudentForm {
            first_name: "Ada".to_string(),
            ..Default::default()
        };
        let updated = update_field(form.clone(), FormField::Email, "ada@example.com");
        assert_eq!(updated.email, "ada@example.com");
        assert_eq!(updated.first_name, "Ada");
        assert_eq!(form.email, "");
    }

    #[test]
    fn test_update_field_gender() {
        let updated = update_field(StudentForm::default(), FormField::Gender, "female");
        assert_eq!(updated.gender, Gender::Female);
        assert_eq!(updated.value(FormField::Gender), "female");
    }

    #[test]
    fn test_form_field_names_round_trip() {
        for field in FormField::ALL {
            assert_eq!(FormField::from_name(field.name()), Some(field));
        }
        assert_eq!(FormField::from_name("id"), None);
    }

    #[test]
    fn test_form_field_cycle() {
        assert_eq!(FormField::Email.prev(), FormField::BtcAddress);
        assert_eq!(FormField::BtcAddress.next(), FormField::Email);
        assert_eq!(FormField::Email.next(), FormField::Gender);
    }

    #[test]
    fn test_field_errors_from_envelope() {
        let errors = FieldErrors::from_body(r#"{"error": {"email": "invalid"}}"#)
            .expect("envelope should parse");
        assert_eq!(errors.get(FormField::Email), Some("invalid"));
        assert_eq!(errors.get(FormField::FirstName), None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_field_errors_from_bare_map() {
        let errors = FieldErrors::from_body(r#"{"email": "invalid", "country": "required"}"#)
            .expect("bare map should parse");
        let fields: Vec<FormField> = errors.fields().collect();
        assert_eq!(fields, vec![FormField::Country, FormField::Email]);
    }

    #[test]
    fn test_field_errors_rejects_non_map() {
        assert!(FieldErrors::from_body("Unprocessable Entity").is_none());
    }

    #[test]
    fn test_into_student_keeps_fields() {
        let form = update_field(StudentForm::default(), FormField::LastName, "Lovelace");
        let student = form.into_student(9);
        assert_eq!(student.id, 9);
        assert_eq!(student.last_name, "Lovelace");
        assert_eq!(student.to_form().last_name, "Lovelace");
    }
}
