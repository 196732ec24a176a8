use cinder_core::{ActivationContext, Capability, ServiceContainer};
use tracing::debug;

use super::{CommandOption, OptionParameter, OptionServices};
use crate::error::{OptionError, OptionResult};

/// An auxiliary service declared on an option builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub capability: Capability,
    /// `false` for [`wants`](OptionBuilder::wants): a missing provider is
    /// not an error.
    pub required: bool,
}

/// State shared by every option builder.
#[derive(Debug, Clone)]
pub struct OptionBase {
    pub parameter: OptionParameter,
    pub requirements: Vec<Requirement>,
}

impl OptionBase {
    pub fn new(parameter: OptionParameter) -> Self {
        Self {
            parameter,
            requirements: Vec::new(),
        }
    }

    fn push(&mut self, capability: Capability, required: bool) {
        match self.requirements.iter_mut().find(|r| r.capability == capability) {
            Some(existing) => existing.required |= required,
            None => self.requirements.push(Requirement {
                capability,
                required,
            }),
        }
    }

    /// Resolves every requirement against `container`.
    pub(crate) fn resolve(
        &self,
        container: &ServiceContainer,
        ctx: &ActivationContext,
    ) -> OptionResult<OptionServices> {
        let mut services = OptionServices::default();
        for requirement in &self.requirements {
            let capability = requirement.capability;
            match container.resolve_capability(capability, ctx) {
                Ok(instance) => services.insert(capability, instance),
                Err(e) if e.is_not_found() && !requirement.required => {
                    debug!(
                        option = %self.parameter.declared_name,
                        %capability,
                        "Optional option service not available"
                    );
                }
                Err(source) => {
                    return Err(OptionError::UnsatisfiedOptionDependency {
                        option: self.parameter.declared_name.clone(),
                        capability,
                        source,
                    });
                }
            }
        }
        Ok(services)
    }
}

/// Common interface of the option builders.
///
/// Implementors only expose their [`OptionBase`] and turn themselves into a
/// [`CommandOption`]; dependency declaration and resolution are shared.
pub trait OptionBuilder: Sized {
    fn base(&self) -> &OptionBase;

    fn base_mut(&mut self) -> &mut OptionBase;

    /// Validates the builder's own settings before services are resolved.
    fn validate(&self) -> OptionResult<()> {
        Ok(())
    }

    /// Produces the option once its services are resolved.
    fn finish(self, services: OptionServices) -> CommandOption;

    /// The parameter this builder describes.
    fn parameter(&self) -> &OptionParameter {
        &self.base().parameter
    }

    /// Requires exactly one active provider of `C` at build time.
    fn requires<C: ?Sized + 'static>(mut self) -> Self {
        self.base_mut().push(Capability::of::<C>(), true);
        self
    }

    /// Uses a provider of `C` when one is active.
    fn wants<C: ?Sized + 'static>(mut self) -> Self {
        self.base_mut().push(Capability::of::<C>(), false);
        self
    }

    /// Resolves the declared services and builds the option.
    ///
    /// Fails with [`OptionError::UnsatisfiedOptionDependency`] when a
    /// required capability has no match (or is ambiguous).
    fn build(self, container: &ServiceContainer, ctx: &ActivationContext) -> OptionResult<CommandOption> {
        self.validate()?;
        let services = self.base().resolve(container, ctx)?;
        Ok(self.finish(services))
    }
}
