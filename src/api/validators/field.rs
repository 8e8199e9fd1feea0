use serde::{Deserialize, Serialize};

/// The seven supported input types for a form field.
pub const FIELD_TYPES: [&str; 7] = [
    "text", "number", "date", "select", "checkbox", "radio", "textarea",
];

/// Types that present a fixed set of choices and therefore require options.
const CHOICE_TYPES: [&str; 3] = ["select", "radio", "checkbox"];

/// A single configurable input descriptor, embedded in a subcategory.
/// Not independently persisted; stored as an ordered JSON array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub code: String,
    pub message: String,
    pub field: String,
    /// Position of the offending definition in the submitted sequence.
    pub index: usize,
}

pub struct FieldValidator;

impl FieldValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a candidate sequence of field definitions.
    /// Rules are applied per field in input order; the first violation wins.
    /// Pure function of the input, used identically on create and on full
    /// update (the whole replacement list is re-validated, never a diff).
    pub fn validate(&self, fields: &[FieldDefinition]) -> Result<(), FieldError> {
        for (index, field) in fields.iter().enumerate() {
            // F001: name required
            if field.name.trim().is_empty() {
                return Err(FieldError {
                    code: "F001".to_string(),
                    message: format!("Field name is required (field {})", index + 1),
                    field: "name".to_string(),
                    index,
                });
            }

            let field_type = field.field_type.trim();

            // F002: type required
            if field_type.is_empty() {
                return Err(FieldError {
                    code: "F002".to_string(),
                    message: format!("Field type is required for '{}'", field.name.trim()),
                    field: "field_type".to_string(),
                    index,
                });
            }

            // F003: type must be one of the supported values
            if !FIELD_TYPES.contains(&field_type) {
                return Err(FieldError {
                    code: "F003".to_string(),
                    message: format!(
                        "Invalid field type '{}' for '{}'. Must be one of: {}",
                        field_type,
                        field.name.trim(),
                        FIELD_TYPES.join(", ")
                    ),
                    field: "field_type".to_string(),
                    index,
                });
            }

            // F004: choice types need a non-empty options list
            if CHOICE_TYPES.contains(&field_type) {
                let has_options = field
                    .options
                    .as_ref()
                    .map(|opts| !opts.is_empty())
                    .unwrap_or(false);
                if !has_options {
                    return Err(FieldError {
                        code: "F004".to_string(),
                        message: format!(
                            "Options are required for field type '{}' ('{}')",
                            field_type,
                            field.name.trim()
                        ),
                        field: "options".to_string(),
                        index,
                    });
                }
            }
        }

        Ok(())
    }
}
