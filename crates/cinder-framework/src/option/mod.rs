//! Command option builders.
//!
//! Command-building code describes each handler parameter with an
//! [`OptionParameter`] and picks a builder for it:
//!
//! - [`SlashOptionBuilder`]: value typed by the user, with choices, ranges
//!   and an optional autocomplete service;
//! - [`CustomOptionBuilder`]: value supplied by a [`ParameterResolver`]
//!   service;
//! - [`GeneratedOptionBuilder`]: value produced by a [`ValueGenerator`]
//!   service.
//!
//! Builders may declare auxiliary services with
//! [`requires`](OptionBuilder::requires) / [`wants`](OptionBuilder::wants);
//! they are resolved from the [`ServiceContainer`](cinder_core::ServiceContainer)
//! when [`build`](OptionBuilder::build) runs.
//!
//! ```rust,ignore
//! let option = SlashOptionBuilder::new(OptionParameter::new("count", OptionType::Integer))
//!     .description("How many messages to delete")
//!     .range(1.0, 100.0)
//!     .requires::<dyn OptionValidator>()
//!     .build(&container, &ctx)?;
//!
//! option.check(&serde_json::json!(50))?;
//! ```

mod builder;
#[cfg(feature = "command")]
mod command;
mod custom;
mod generated;
mod slash;

use std::fmt;
use std::sync::Arc;

use cinder_core::{BoxError, Capability, ServiceInstance};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use builder::{OptionBase, OptionBuilder, Requirement};
#[cfg(feature = "command")]
pub use command::{OptionSet, shell_split};
pub use custom::CustomOptionBuilder;
pub use generated::GeneratedOptionBuilder;
pub use slash::SlashOptionBuilder;

/// Value type accepted by an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    String,
    Integer,
    Number,
    Boolean,
}

impl OptionType {
    /// Returns `true` for integer and number options.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Resolved description of a handler parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionParameter {
    /// Name declared in the handler signature.
    pub declared_name: String,
    /// Accepted value type.
    pub option_type: OptionType,
    /// Whether the parameter may be omitted.
    pub optional: bool,
}

impl OptionParameter {
    /// Creates a required parameter.
    pub fn new(declared_name: impl Into<String>, option_type: OptionType) -> Self {
        Self {
            declared_name: declared_name.into(),
            option_type,
            optional: false,
        }
    }

    /// Marks the parameter as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A predefined value offered to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub name: String,
    pub value: Value,
}

impl OptionChoice {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ── Service capabilities consumed by options ─────────────────────────────────

/// Produces an option's value from the raw input of an interaction.
pub trait ParameterResolver: Send + Sync {
    fn resolve(&self, parameter: &OptionParameter, input: Option<&str>) -> Result<Value, BoxError>;
}

/// Produces an option's value without any user input.
pub trait ValueGenerator: Send + Sync {
    fn generate(&self, parameter: &OptionParameter) -> Result<Value, BoxError>;
}

/// Suggests choices while the user is typing.
pub trait AutocompleteHandler: Send + Sync {
    fn suggest(&self, parameter: &OptionParameter, partial: &str) -> Vec<OptionChoice>;
}

/// Extra validation applied to a user-supplied value.
pub trait OptionValidator: Send + Sync {
    /// Returns the reason when `value` is rejected.
    fn validate(&self, parameter: &OptionParameter, value: &Value) -> Result<(), String>;
}

// ── Built options ────────────────────────────────────────────────────────────

/// How a built option obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Slash,
    Custom,
    Generated,
}

/// Services resolved for an option at build time.
#[derive(Clone, Default)]
pub struct OptionServices {
    entries: Vec<(Capability, ServiceInstance)>,
}

impl OptionServices {
    pub(crate) fn insert(&mut self, capability: Capability, instance: ServiceInstance) {
        self.entries.push((capability, instance));
    }

    /// The service resolved for capability `C`, if any.
    pub fn get<C: ?Sized + 'static>(&self) -> Option<Arc<C>> {
        let capability = Capability::of::<C>();
        self.entries
            .iter()
            .find(|(cap, _)| *cap == capability)
            .and_then(|(_, instance)| instance.get::<C>())
    }

    /// Returns `true` if a service was resolved for capability `C`.
    pub fn contains<C: ?Sized + 'static>(&self) -> bool {
        let capability = Capability::of::<C>();
        self.entries.iter().any(|(cap, _)| *cap == capability)
    }

    /// Number of resolved services.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no service was resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for OptionServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(cap, i)| (cap.name(), i.id())))
            .finish()
    }
}

/// Numeric bounds of a slash option.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Length bounds of a string slash option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LengthRange {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

/// A fully built command option.
#[derive(Debug, Clone)]
pub struct CommandOption {
    pub parameter: OptionParameter,
    pub kind: OptionKind,
    /// Name shown to users; defaults to the declared name.
    pub display_name: String,
    pub description: String,
    pub choices: Vec<OptionChoice>,
    pub range: Option<ValueRange>,
    pub length: Option<LengthRange>,
    pub autocomplete: bool,
    pub services: OptionServices,
}

impl CommandOption {
    /// Returns `true` when the user must supply a value.
    pub fn is_required(&self) -> bool {
        self.kind == OptionKind::Slash && !self.parameter.optional
    }

    /// Checks a user-supplied value against type, choices, range, length and
    /// the resolved [`OptionValidator`], returning the rejection reason.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let name = &self.display_name;
        let option_type = self.parameter.option_type;
        if !option_type.accepts(value) {
            return Err(format!("'{name}' expects a {option_type} value, got {value}"));
        }

        if !self.choices.is_empty() && !self.choices.iter().any(|c| c.value == *value) {
            return Err(format!("'{name}' must be one of the offered choices"));
        }

        if let (Some(range), Some(n)) = (self.range, value.as_f64()) {
            if range.min.is_some_and(|min| n < min) || range.max.is_some_and(|max| n > max) {
                return Err(format!("'{name}' is out of range"));
            }
        }

        if let (Some(length), Some(s)) = (self.length, value.as_str()) {
            let len = s.chars().count();
            if length.min.is_some_and(|min| len < min) || length.max.is_some_and(|max| len > max) {
                return Err(format!("'{name}' has an invalid length"));
            }
        }

        match self.services.get::<dyn OptionValidator>() {
            Some(validator) => validator.validate(&self.parameter, value),
            None => Ok(()),
        }
    }

    /// Produces the option's value for a non-slash option, or parses and
    /// checks `input` for a slash option.
    pub fn value(&self, input: Option<&str>) -> Result<Option<Value>, BoxError> {
        match self.kind {
            OptionKind::Custom => {
                let resolver = self
                    .services
                    .get::<dyn ParameterResolver>()
                    .ok_or("custom option has no parameter resolver")?;
                resolver.resolve(&self.parameter, input).map(Some)
            }
            OptionKind::Generated => {
                let generator = self
                    .services
                    .get::<dyn ValueGenerator>()
                    .ok_or("generated option has no value generator")?;
                generator.generate(&self.parameter).map(Some)
            }
            OptionKind::Slash => {
                let Some(raw) = input else {
                    if self.parameter.optional {
                        return Ok(None);
                    }
                    return Err(format!("'{}' is required", self.display_name).into());
                };
                let value = parse_input(self.parameter.option_type, raw)?;
                self.check(&value)?;
                Ok(Some(value))
            }
        }
    }

    /// Autocomplete suggestions for a partially typed value.
    pub fn suggest(&self, partial: &str) -> Vec<OptionChoice> {
        match self.services.get::<dyn AutocompleteHandler>() {
            Some(handler) => handler.suggest(&self.parameter, partial),
            None => Vec::new(),
        }
    }
}

fn parse_input(option_type: OptionType, raw: &str) -> Result<Value, BoxError> {
    let value = match option_type {
        OptionType::String => Value::String(raw.to_string()),
        OptionType::Integer => Value::from(raw.trim().parse::<i64>()?),
        OptionType::Number => {
            let n = raw.trim().parse::<f64>()?;
            serde_json::Number::from_f64(n)
                .map(Value::Number)
                .ok_or("number must be finite")?
        }
        OptionType::Boolean => Value::Bool(raw.trim().parse::<bool>()?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slash(option_type: OptionType) -> CommandOption {
        CommandOption {
            parameter: OptionParameter::new("value", option_type),
            kind: OptionKind::Slash,
            display_name: "value".into(),
            description: String::new(),
            choices: Vec::new(),
            range: None,
            length: None,
            autocomplete: false,
            services: OptionServices::default(),
        }
    }

    #[test]
    fn test_check_type() {
        let option = slash(OptionType::Integer);
        assert!(option.check(&json!(3)).is_ok());
        assert!(option.check(&json!("3")).is_err());
        assert!(option.check(&json!(3.5)).is_err());
    }

    #[test]
    fn test_check_range_and_length() {
        let mut number = slash(OptionType::Number);
        number.range = Some(ValueRange {
            min: Some(1.0),
            max: Some(10.0),
        });
        assert!(number.check(&json!(5.5)).is_ok());
        assert!(number.check(&json!(0.5)).is_err());
        assert!(number.check(&json!(11)).is_err());

        let mut text = slash(OptionType::String);
        text.length = Some(LengthRange {
            min: None,
            max: Some(3),
        });
        assert!(text.check(&json!("abc")).is_ok());
        assert!(text.check(&json!("abcd")).is_err());
    }

    #[test]
    fn test_check_choices() {
        let mut option = slash(OptionType::String);
        option.choices = vec![OptionChoice::new("Red", "red"), OptionChoice::new("Blue", "blue")];
        assert!(option.check(&json!("red")).is_ok());
        assert!(option.check(&json!("green")).is_err());
    }

    #[test]
    fn test_slash_value_parsing() {
        let option = slash(OptionType::Integer);
        assert_eq!(option.value(Some(" 42 ")).unwrap(), Some(json!(42)));
        assert!(option.value(Some("forty-two")).is_err());
        assert!(option.value(None).is_err());

        let mut optional = slash(OptionType::Boolean);
        optional.parameter = optional.parameter.optional();
        assert_eq!(optional.value(None).unwrap(), None);
        assert_eq!(optional.value(Some("true")).unwrap(), Some(json!(true)));
    }
}
