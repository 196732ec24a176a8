//! Rendering built options as `clap` arguments.
//!
//! An [`OptionSet`] turns the slash options of one command into a
//! [`clap::Command`] and parses a plain-text invocation into option values.
//! Custom and generated options take no user input; their services supply
//! the value during [`OptionSet::parse`].

use std::collections::HashMap;

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command};
use cinder_core::BoxError;
use serde_json::Value;

use super::{CommandOption, OptionKind};

impl CommandOption {
    /// The `--name <VALUE>` argument for a slash option.
    ///
    /// Returns `None` for custom and generated options.
    pub fn to_arg(&self) -> Option<Arg> {
        if self.kind != OptionKind::Slash {
            return None;
        }

        let mut arg = Arg::new(self.display_name.clone())
            .long(self.display_name.clone())
            .help(self.description.clone())
            .required(self.is_required())
            .action(ArgAction::Set);

        if !self.choices.is_empty() {
            let values: Vec<String> = self
                .choices
                .iter()
                .map(|c| match &c.value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            arg = arg.value_parser(PossibleValuesParser::new(values));
        }
        Some(arg)
    }
}

/// The options of one command.
#[derive(Debug, Clone)]
pub struct OptionSet {
    name: String,
    about: Option<String>,
    options: Vec<CommandOption>,
}

impl OptionSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: None,
            options: Vec::new(),
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// Appends a built option.
    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    /// The options, in declaration order.
    pub fn options(&self) -> &[CommandOption] {
        &self.options
    }

    /// Builds the `clap` command for the slash options.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(self.name.clone());
        if let Some(about) = &self.about {
            command = command.about(about.clone());
        }
        self.options
            .iter()
            .filter_map(CommandOption::to_arg)
            .fold(command, |command, arg| command.arg(arg))
    }

    /// Parses a plain-text invocation (without the command name) into
    /// values keyed by declared parameter name.
    ///
    /// Omitted optional slash options are absent from the map.  Parse
    /// errors carry clap's rendered message, including `--help` output.
    pub fn parse(&self, line: &str) -> Result<HashMap<String, Value>, BoxError> {
        let args = std::iter::once(self.name.clone()).chain(shell_split(line));
        let matches = self.to_command().try_get_matches_from(args)?;

        let mut values = HashMap::new();
        for option in &self.options {
            let input = match option.kind {
                OptionKind::Slash => matches
                    .get_one::<String>(&option.display_name)
                    .map(String::as_str),
                OptionKind::Custom | OptionKind::Generated => None,
            };
            if let Some(value) = option.value(input)? {
                values.insert(option.parameter.declared_name.clone(), value);
            }
        }
        Ok(values)
    }
}

/// Splits plain text into arguments, honouring single and double quotes and
/// backslash escapes inside double quotes.
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_double => escaped = true,
            '\'' if !in_double => {
                in_single = !in_single;
                quoted = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                quoted = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() || quoted {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::{
        OptionBuilder, OptionParameter, OptionType, ParameterResolver, SlashOptionBuilder,
        CustomOptionBuilder,
    };
    use cinder_core::{ActivationContext, ServiceContainer, ServiceDescriptor};
    use serde_json::json;

    #[test]
    fn test_shell_split() {
        assert_eq!(shell_split("ban --user 42"), vec!["ban", "--user", "42"]);
        assert_eq!(
            shell_split(r#"--reason "spamming links" --note 'it''s fine'"#),
            vec!["--reason", "spamming links", "--note", "its fine"]
        );
        assert_eq!(shell_split(r#"--say "a \"quoted\" word""#), vec!["--say", r#"a "quoted" word"#]);
        assert_eq!(shell_split(r#"--empty """#), vec!["--empty", ""]);
        assert!(shell_split("  \t ").is_empty());
    }

    struct Caller;

    impl ParameterResolver for Caller {
        fn resolve(&self, _: &OptionParameter, _: Option<&str>) -> Result<Value, BoxError> {
            Ok(json!("user#1"))
        }
    }

    fn option_set() -> OptionSet {
        let container = ServiceContainer::new();
        container
            .register(
                ServiceDescriptor::builder::<Caller>("caller")
                    .provides::<dyn ParameterResolver>(|s| s)
                    .construct(|_| Ok(Caller)),
            )
            .unwrap();
        let ctx = ActivationContext::new();

        OptionSet::new("purge")
            .about("Delete recent messages")
            .option(
                SlashOptionBuilder::new(OptionParameter::new("count", OptionType::Integer))
                    .range(1.0, 100.0)
                    .build(&container, &ctx)
                    .unwrap(),
            )
            .option(
                SlashOptionBuilder::new(OptionParameter::new("scope", OptionType::String).optional())
                    .choice("Everyone", "all")
                    .choice("Bots", "bots")
                    .build(&container, &ctx)
                    .unwrap(),
            )
            .option(
                CustomOptionBuilder::new(OptionParameter::new("caller", OptionType::String))
                    .build(&container, &ctx)
                    .unwrap(),
            )
    }

    #[test]
    fn test_to_command_has_slash_args_only() {
        let command = option_set().to_command();
        let ids: Vec<_> = command.get_arguments().map(|a| a.get_id().as_str().to_string()).collect();
        assert!(ids.contains(&"count".to_string()));
        assert!(ids.contains(&"scope".to_string()));
        assert!(!ids.contains(&"caller".to_string()));
    }

    #[test]
    fn test_parse_values() {
        let values = option_set().parse("--count 25 --scope bots").unwrap();
        assert_eq!(values["count"], json!(25));
        assert_eq!(values["scope"], json!("bots"));
        assert_eq!(values["caller"], json!("user#1"));

        let values = option_set().parse("--count 5").unwrap();
        assert!(!values.contains_key("scope"));
    }

    #[test]
    fn test_parse_errors() {
        let set = option_set();
        assert!(set.parse("--scope all").is_err());
        assert!(set.parse("--count 500").is_err());
        assert!(set.parse("--count 5 --scope humans").is_err());
        assert!(set.parse("--help").unwrap_err().to_string().contains("Delete recent messages"));
    }
}
