use std::sync::Arc;

use crate::{
    Argument, Arguments, Definition, Error, Executable, Injector, Introspector, Parameter,
    ParameterType, Provider,
};

/// Binds every parameter of an [`Executable`] to a provider.
///
/// For each parameter the first matching tier wins:
///
/// 1. a rule for its position,
/// 2. a rule for its name (a parameter bound by both position and name is
///    ambiguous),
/// 3. a rule for one of its markers,
/// 4. a rule for its declared type or a subtype of it,
/// 5. a fallback derived from the declaration itself.
///
/// More than one matching rule within tiers 3 and 4 fails with
/// [`Error::AmbiguousBinding`]. Variadic parameters without a rule are left
/// out. Nothing is constructed while binding.
#[derive(Clone)]
pub struct ArgumentResolver {
    introspector: Arc<dyn Introspector>,
}

impl ArgumentResolver {
    pub fn new(introspector: Arc<dyn Introspector>) -> Self {
        Self { introspector }
    }

    pub fn introspector(&self) -> &Arc<dyn Introspector> {
        &self.introspector
    }

    pub fn resolve(
        &self,
        injector: &Injector,
        executable: &Executable,
        arguments: &Arguments,
    ) -> Result<Vec<Argument>, Error> {
        let mut resolved = Vec::with_capacity(executable.parameters().len());
        for parameter in executable.parameters() {
            let provider = match self.find_rule(parameter, arguments)? {
                Some(definition) => definition.build(injector)?,
                None if parameter.is_variadic() => continue,
                None => fallback(executable, parameter)?,
            };
            resolved.push(Argument {
                parameter: parameter.clone(),
                provider,
            });
        }
        Ok(resolved)
    }

    fn find_rule<'a>(
        &self,
        parameter: &Parameter,
        arguments: &'a Arguments,
    ) -> Result<Option<&'a Definition>, Error> {
        let by_index = arguments.by_index(parameter.position());
        let by_name = arguments.by_name(parameter.name());
        match (by_index, by_name) {
            (Some(_), Some(_)) => {
                return Err(ambiguous(parameter, "bound both by position and by name".into()));
            }
            (Some(definition), None) | (None, Some(definition)) => return Ok(Some(definition)),
            (None, None) => {}
        }

        let marked: Vec<_> = parameter
            .markers()
            .iter()
            .filter_map(|marker| arguments.by_marker(marker).map(|d| (marker, d)))
            .collect();
        match marked.as_slice() {
            [] => {}
            [(_, definition)] => return Ok(Some(*definition)),
            many => {
                let markers: Vec<_> = many.iter().map(|(m, _)| format!("#[{m}]")).collect();
                return Err(ambiguous(
                    parameter,
                    format!("multiple marker rules apply: {}", markers.join(", ")),
                ));
            }
        }

        let members = parameter.declared_type().members();
        let typed: Vec<_> = arguments
            .type_rules()
            .filter(|(ty, _)| {
                members
                    .iter()
                    .any(|member| self.introspector.is_assignable(ty, member))
            })
            .collect();
        match typed.as_slice() {
            [] => Ok(None),
            [(_, definition)] => Ok(Some(*definition)),
            many => {
                let types: Vec<_> = many.iter().map(|(ty, _)| ty.to_string()).collect();
                Err(ambiguous(
                    parameter,
                    format!("multiple type rules apply: {}", types.join(", ")),
                ))
            }
        }
    }
}

fn fallback(executable: &Executable, parameter: &Parameter) -> Result<Provider, Error> {
    match (parameter.declared_type(), parameter.default_value()) {
        (ParameterType::Untyped, Some(default)) => Ok(Provider::value(default.clone())),
        (ParameterType::Untyped, None) => Err(Error::UnresolvedParameter {
            callable: executable.name().to_string(),
            parameter: parameter.name().to_string(),
            position: parameter.position(),
        }),
        (ParameterType::Named(ty), Some(default)) => Ok(Provider::optional_type_ref(
            ty,
            Provider::value(default.clone()),
        )),
        (ParameterType::Named(ty), None) => Ok(Provider::type_ref(ty)),
        (ParameterType::Union(_), Some(default)) => Ok(Provider::value(default.clone())),
        (ParameterType::Union(_), None) => Err(Error::AmbiguousType {
            callable: executable.name().to_string(),
            parameter: parameter.name().to_string(),
            position: parameter.position(),
        }),
    }
}

fn ambiguous(parameter: &Parameter, reason: String) -> Error {
    Error::AmbiguousBinding {
        parameter: parameter.name().to_string(),
        position: parameter.position(),
        reason,
    }
}
