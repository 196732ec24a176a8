use super::{
    AutocompleteHandler, CommandOption, LengthRange, OptionBase, OptionBuilder, OptionChoice,
    OptionKind, OptionParameter, OptionServices, OptionType, ValueRange,
};
use crate::error::{OptionError, OptionResult};

/// Builder for an option whose value is typed by the user.
#[derive(Debug, Clone)]
pub struct SlashOptionBuilder {
    base: OptionBase,
    display_name: Option<String>,
    description: String,
    choices: Vec<OptionChoice>,
    range: Option<ValueRange>,
    length: Option<LengthRange>,
    autocomplete: bool,
}

impl SlashOptionBuilder {
    pub fn new(parameter: OptionParameter) -> Self {
        Self {
            base: OptionBase::new(parameter),
            display_name: None,
            description: "No description".to_string(),
            choices: Vec::new(),
            range: None,
            length: None,
            autocomplete: false,
        }
    }

    /// Overrides the name shown to users.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a predefined choice.
    pub fn choice(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.choices.push(OptionChoice::new(name, value));
        self
    }

    /// Bounds a numeric value (inclusive).
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(ValueRange {
            min: Some(min),
            max: Some(max),
        });
        self
    }

    /// Bounds the length of a string value (inclusive).
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.length = Some(LengthRange {
            min: Some(min),
            max: Some(max),
        });
        self
    }

    /// Suggests values through the active [`AutocompleteHandler`] service.
    pub fn autocomplete(mut self) -> Self {
        self.autocomplete = true;
        self.requires::<dyn AutocompleteHandler>()
    }
}

impl OptionBuilder for SlashOptionBuilder {
    fn base(&self) -> &OptionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OptionBase {
        &mut self.base
    }

    fn validate(&self) -> OptionResult<()> {
        let parameter = &self.base.parameter;
        let name = &parameter.declared_name;
        let option_type = parameter.option_type;

        if self.range.is_some() && !option_type.is_numeric() {
            return Err(OptionError::invalid(
                name,
                format!("ranges need an integer or number option, not {option_type}"),
            ));
        }
        if self.length.is_some() && option_type != OptionType::String {
            return Err(OptionError::invalid(
                name,
                format!("lengths need a string option, not {option_type}"),
            ));
        }
        if let Some(ValueRange {
            min: Some(min),
            max: Some(max),
        }) = self.range
        {
            if min > max {
                return Err(OptionError::invalid(name, "range minimum exceeds maximum"));
            }
        }
        if let Some(LengthRange {
            min: Some(min),
            max: Some(max),
        }) = self.length
        {
            if min > max {
                return Err(OptionError::invalid(name, "length minimum exceeds maximum"));
            }
        }
        if self.autocomplete && !self.choices.is_empty() {
            return Err(OptionError::invalid(
                name,
                "autocomplete and predefined choices are mutually exclusive",
            ));
        }
        Ok(())
    }

    fn finish(self, services: OptionServices) -> CommandOption {
        let display_name = self
            .display_name
            .unwrap_or_else(|| self.base.parameter.declared_name.clone());
        CommandOption {
            parameter: self.base.parameter,
            kind: OptionKind::Slash,
            display_name,
            description: self.description,
            choices: self.choices,
            range: self.range,
            length: self.length,
            autocomplete: self.autocomplete,
            services,
        }
    }
}
