use super::{
    CommandOption, OptionBase, OptionBuilder, OptionKind, OptionParameter, OptionServices,
    ValueGenerator,
};

/// Builder for an option whose value is produced by a [`ValueGenerator`]
/// service on every invocation.
#[derive(Debug, Clone)]
pub struct GeneratedOptionBuilder {
    base: OptionBase,
}

impl GeneratedOptionBuilder {
    pub fn new(parameter: OptionParameter) -> Self {
        Self {
            base: OptionBase::new(parameter),
        }
        .requires::<dyn ValueGenerator>()
    }
}

impl OptionBuilder for GeneratedOptionBuilder {
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
            kind: OptionKind::Generated,
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
    use crate::option::OptionType;
    use cinder_core::{ActivationContext, BoxError, ServiceContainer, ServiceDescriptor};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicI64, Ordering};

    struct Sequence(AtomicI64);

    impl ValueGenerator for Sequence {
        fn generate(&self, _: &OptionParameter) -> Result<Value, BoxError> {
            Ok(json!(self.0.fetch_add(1, Ordering::SeqCst)))
        }
    }

    #[test]
    fn test_generated_value() {
        let container = ServiceContainer::new();
        container
            .register(
                ServiceDescriptor::builder::<Sequence>("sequence")
                    .provides::<dyn ValueGenerator>(|s| s)
                    .construct(|_| Ok(Sequence(AtomicI64::new(1)))),
            )
            .unwrap();

        let option = GeneratedOptionBuilder::new(OptionParameter::new("ticket", OptionType::Integer))
            .build(&container, &ActivationContext::new())
            .unwrap();

        assert_eq!(option.kind, OptionKind::Generated);
        assert_eq!(option.value(None).unwrap(), Some(json!(1)));
        assert_eq!(option.value(None).unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_missing_generator() {
        let result = GeneratedOptionBuilder::new(OptionParameter::new("ticket", OptionType::Integer))
            .build(&ServiceContainer::new(), &ActivationContext::new());
        assert!(result.is_err());
    }
}
