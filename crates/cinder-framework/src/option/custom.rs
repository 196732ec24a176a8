use super::{
    CommandOption, OptionBase, OptionBuilder, OptionKind, OptionParameter, OptionServices,
    ParameterResolver,
};

/// Builder for an option whose value comes from a [`ParameterResolver`]
/// service instead of the user.
///
/// The resolver is required: building fails with
/// [`UnsatisfiedOptionDependency`](crate::OptionError::UnsatisfiedOptionDependency)
/// when no active service provides it.
#[derive(Debug, Clone)]
pub struct CustomOptionBuilder {
    base: OptionBase,
}

impl CustomOptionBuilder {
    pub fn new(parameter: OptionParameter) -> Self {
        Self {
            base: OptionBase::new(parameter),
        }
        .requires::<dyn ParameterResolver>()
    }
}

impl OptionBuilder for CustomOptionBuilder {
    fn base(&self) -> &OptionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OptionBase {
        &mut self.base
    }

    fn finish(self, services: OptionServices) -> CommandOption {
        let display_name = self.base.parameter.declared_name.clone();
        CommandOption {
            parameter: self.base.parameter,
            kind: OptionKind::Custom,
            display_name,
            description: String::new(),
            choices: Vec::new(),
            range: None,
            length: None,
            autocomplete: false,
            services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OptionError;
    use crate::option::OptionType;
    use cinder_core::{ActivationContext, ActivationPredicate, BoxError, ServiceContainer, ServiceDescriptor};
    use serde_json::{Value, json};

    struct GuildLocale;

    impl ParameterResolver for GuildLocale {
        fn resolve(&self, _: &OptionParameter, input: Option<&str>) -> Result<Value, BoxError> {
            Ok(json!(input.unwrap_or("en-US")))
        }
    }

    fn locale_option() -> CustomOptionBuilder {
        CustomOptionBuilder::new(OptionParameter::new("locale", OptionType::String))
    }

    #[test]
    fn test_missing_resolver_is_unsatisfied() {
        let err = locale_option()
            .build(&ServiceContainer::new(), &ActivationContext::new())
            .unwrap_err();
        match err {
            OptionError::UnsatisfiedOptionDependency { option, capability, source } => {
                assert_eq!(option, "locale");
                assert!(capability.is::<dyn ParameterResolver>());
                assert!(source.is_not_found());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolver_supplies_value() {
        let container = ServiceContainer::new();
        container
            .register(
                ServiceDescriptor::builder::<GuildLocale>("guild_locale")
                    .provides::<dyn ParameterResolver>(|s| s)
                    .construct(|_| Ok(GuildLocale)),
            )
            .unwrap();

        let option = locale_option().build(&container, &ActivationContext::new()).unwrap();
        assert_eq!(option.kind, OptionKind::Custom);
        assert!(!option.is_required());
        assert_eq!(option.value(None).unwrap(), Some(json!("en-US")));
        assert_eq!(option.value(Some("fr")).unwrap(), Some(json!("fr")));
    }

    #[test]
    fn test_inactive_resolver_is_unsatisfied() {
        let container = ServiceContainer::new();
        container
            .register(
                ServiceDescriptor::builder::<GuildLocale>("guild_locale")
                    .provides::<dyn ParameterResolver>(|s| s)
                    .when(ActivationPredicate::profile("dev"))
                    .construct(|_| Ok(GuildLocale)),
            )
            .unwrap();

        let prod = ActivationContext::new().with_profile("prod");
        assert!(locale_option().build(&container, &prod).is_err());

        let dev = ActivationContext::new().with_profile("dev");
        assert!(locale_option().build(&container, &dev).is_ok());
    }
}
