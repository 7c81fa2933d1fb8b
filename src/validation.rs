//! Shared form validation.
//!
//! Every form (listing schemas, guest details, profile sections) declares its rules with
//! `#[derive(Validate)]`. [`validate_form`] runs them and flattens the result into
//! [`FieldErrors`], keyed by dotted field path (`name`, `options.0.title`).

use std::{borrow::Cow, collections::BTreeMap, fmt};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Struct fields whose errors are reported without their own name as a prefix.
///
/// These are shared sub-structs that are `#[serde(flatten)]`ed into their parent, so the
/// form presents their fields at the top level.
const FLATTENED_FIELDS: &[&str] = &["basics"];

/// Key `validator` files struct-level (`schema`) errors under.
const STRUCT_ERRORS: &str = "__all__";
/// Error param naming the field a struct-level error belongs to, see [`field_error`].
const FIELD_PARAM: &str = "field";

/// Field-keyed validation messages, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Records a message, keeping the first one reported for a field.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Flattens nested `validator` output into dotted keys.
    pub fn from_validation(errors: &ValidationErrors) -> Self {
        let mut out = Self::new();
        collect(&mut out, "", errors);
        out
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

fn collect(out: &mut FieldErrors, prefix: &str, errors: &ValidationErrors) {
    for (field, kind) in errors.errors() {
        let path = if FLATTENED_FIELDS.contains(&field.as_ref()) {
            prefix.to_string()
        } else {
            join(prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) if AsRef::<str>::as_ref(field) == STRUCT_ERRORS => {
                for error in field_errors {
                    let field = error
                        .params
                        .get(FIELD_PARAM)
                        .and_then(|value| value.as_str())
                        .unwrap_or(STRUCT_ERRORS);
                    out.insert(join(prefix, field), message_of(error));
                }
            }
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(error) = field_errors.first() {
                    out.insert(path, message_of(error));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect(out, &path, nested),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(out, &join(&path, &index.to_string()), nested);
                }
            }
        }
    }
}

fn message_of(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => match error.code.as_ref() {
            "length" => "This field is required".to_string(),
            "range" => "Value is out of range".to_string(),
            "email" => "Enter a valid email address".to_string(),
            code => format!("Invalid value ({code})"),
        },
    }
}

/// Runs a form's declared rules.
pub fn validate_form<T: Validate>(form: &T) -> Result<(), FieldErrors> {
    form.validate()
        .map_err(|errors| FieldErrors::from_validation(&errors))
}

/// A struct-level error reported under `field`.
///
/// `validator` keeps one error kind per key, so a rule about a whole collection cannot be
/// added next to that collection's `nested` errors. Raise it from a
/// `#[validate(schema(...))]` function with this instead.
pub fn field_error(
    field: &'static str,
    code: &'static str,
    message: &'static str,
) -> ValidationError {
    let mut error = ValidationError::new(code).with_message(Cow::Borrowed(message));
    error.add_param(Cow::Borrowed(FIELD_PARAM), &field);
    error
}

/// Rejects empty and whitespace-only text.
pub fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required")
            .with_message(Cow::Borrowed("This field is required")));
    }
    Ok(())
}

/// Accepts 24-hour `HH:MM` times.
pub fn clock_time(value: &str) -> Result<(), ValidationError> {
    let valid = match value.split_once(':') {
        Some((h, m)) if h.len() == 2 && m.len() == 2 => {
            matches!((h.parse::<u8>(), m.parse::<u8>()), (Ok(h), Ok(m)) if h < 24 && m < 60)
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("clock_time")
            .with_message(Cow::Borrowed("Use a 24-hour HH:MM time")))
    }
}
