use std::sync::Arc;

use rivet::{
    Arguments, Context, Definitions, Error, Executable, Injector, NotFound, Parameter, Provider,
    TypeName, TypeRegistry, Value, arguments, value,
};

/// Executable returning every argument it receives.
fn collect(parameters: Vec<Parameter>) -> Executable {
    let mut executable = Executable::new("collect", |mut args| {
        let mut values = Vec::new();
        while args.remaining() > 0 {
            values.push(args.next_value());
        }
        Ok(Value::new(values))
    });
    for parameter in parameters {
        executable = executable.param(parameter);
    }
    executable
}

fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .extends("app::Postgres", "app::Database")
        .extends("app::MySql", "app::Database")
        .extends("app::Database", "app::Storage")
}

fn injector() -> Injector {
    Injector::with_introspector(Definitions::new(), Arc::new(registry()))
}

fn invoke(
    context: &Context,
    parameters: Vec<Parameter>,
    arguments: &Arguments,
) -> Result<Vec<Value>, Error> {
    let provider = injector().executable_provider(&collect(parameters), arguments)?;
    let values = context.resolve(&provider)?;
    Ok(values.downcast::<Vec<Value>>()?.as_ref().clone())
}

fn string(value: &Value) -> String {
    value.downcast::<String>().unwrap().as_ref().clone()
}

#[test]
fn test_positional_and_name_rule_conflict() {
    let parameters = vec![Parameter::new("host")];
    let rules = arguments()
        .index(0, value("by-index".to_string()))
        .name("host", value("by-name".to_string()));

    let result = invoke(&Context::new(), parameters, &rules);
    assert!(matches!(
        result,
        Err(Error::AmbiguousBinding { parameter, position: 0, .. }) if parameter == "host"
    ));
}

#[test]
fn test_positional_or_name_rule_alone() {
    let context = Context::new();
    let by_index = arguments().index(0, value("by-index".to_string()));
    let values = invoke(&context, vec![Parameter::new("host")], &by_index).unwrap();
    assert_eq!(string(&values[0]), "by-index");

    let by_name = arguments().name("host", value("by-name".to_string()));
    let values = invoke(&context, vec![Parameter::new("host")], &by_name).unwrap();
    assert_eq!(string(&values[0]), "by-name");
}

#[test]
fn test_name_rule_beats_marker_and_type_rules() {
    let parameters = vec![Parameter::new("db").of_type("app::Database").marker("primary")];
    let rules = arguments()
        .name("db", value("by-name".to_string()))
        .marker("primary", value("by-marker".to_string()))
        .of_type("app::Database", value("by-type".to_string()));

    let values = invoke(&Context::new(), parameters, &rules).unwrap();
    assert_eq!(string(&values[0]), "by-name");
}

#[test]
fn test_marker_rules() {
    let context = Context::new();
    let parameter = || {
        Parameter::new("db")
            .of_type("app::Database")
            .marker("primary")
            .marker("readonly")
    };

    let single = arguments()
        .marker("primary", value("by-marker".to_string()))
        .of_type("app::Database", value("by-type".to_string()));
    let values = invoke(&context, vec![parameter()], &single).unwrap();
    assert_eq!(string(&values[0]), "by-marker");

    let both = arguments()
        .marker("primary", value("primary".to_string()))
        .marker("readonly", value("readonly".to_string()));
    let result = invoke(&context, vec![parameter()], &both);
    assert!(matches!(result, Err(Error::AmbiguousBinding { .. })));
}

#[test]
fn test_type_rules_match_subtypes() {
    let context = Context::new();
    let parameter = || Parameter::new("db").of_type("app::Database");

    let exact = arguments().of_type("app::Database", value("exact".to_string()));
    let values = invoke(&context, vec![parameter()], &exact).unwrap();
    assert_eq!(string(&values[0]), "exact");

    let subtype = arguments().of_type("app::Postgres", value("postgres".to_string()));
    let values = invoke(&context, vec![parameter()], &subtype).unwrap();
    assert_eq!(string(&values[0]), "postgres");

    let both = subtype.of_type("app::MySql", value("mysql".to_string()));
    let result = invoke(&context, vec![parameter()], &both);
    assert!(matches!(result, Err(Error::AmbiguousBinding { .. })));

    // A rule for a parent type does not satisfy a more specific parameter.
    let parent = arguments().of_type("app::Storage", value("storage".to_string()));
    let result = invoke(&context, vec![parameter()], &parent);
    assert!(matches!(
        result,
        Err(Error::NotFound(NotFound::Type(ty))) if ty == TypeName::new("app::Database")
    ));
}

#[test]
fn test_type_rules_conflict_regardless_of_depth() {
    let parameters = vec![Parameter::new("db").of_type("app::Storage")];
    let rules = arguments()
        .of_type("app::Database", value("database".to_string()))
        .of_type("app::Postgres", value("postgres".to_string()));

    let result = invoke(&Context::new(), parameters, &rules);
    assert!(matches!(result, Err(Error::AmbiguousBinding { .. })));
}

#[test]
fn test_union_parameters() {
    let context = Context::new();
    let union = || Parameter::new("store").union(["app::Postgres", "app::Cache"]);

    let single = arguments().of_type("app::Cache", value("cache".to_string()));
    let values = invoke(&context, vec![union()], &single).unwrap();
    assert_eq!(string(&values[0]), "cache");

    let both = single.of_type("app::Postgres", value("postgres".to_string()));
    let result = invoke(&context, vec![union()], &both);
    assert!(matches!(result, Err(Error::AmbiguousBinding { .. })));

    let result = invoke(&context, vec![union()], &arguments());
    assert!(matches!(
        result,
        Err(Error::AmbiguousType { parameter, position: 0, .. }) if parameter == "store"
    ));

    let optional = union().optional(Value::new("fallback".to_string()));
    let values = invoke(&context, vec![optional], &arguments()).unwrap();
    assert_eq!(string(&values[0]), "fallback");
}

#[test]
fn test_untyped_fallbacks() {
    let context = Context::new();
    let optional = Parameter::new("retries").optional(Value::new(3u32));
    let values = invoke(&context, vec![optional], &arguments()).unwrap();
    assert_eq!(*values[0].downcast::<u32>().unwrap(), 3);

    let result = invoke(
        &context,
        vec![Parameter::new("first"), Parameter::new("second")],
        &arguments().index(0, value(1u32)),
    );
    assert!(matches!(
        result,
        Err(Error::UnresolvedParameter { callable, parameter, position: 1 })
            if callable == "collect" && parameter == "second"
    ));
}

#[test]
fn test_unknown_name_rules_are_ignored() {
    let optional = Parameter::new("retries").optional(Value::new(3u32));
    let rules = arguments().name("unknown", value(10u32));
    let values = invoke(&Context::new(), vec![optional], &rules).unwrap();
    assert_eq!(*values[0].downcast::<u32>().unwrap(), 3);
}

#[test]
fn test_optional_type_with_null_default() {
    let parameter = Parameter::new("cache")
        .of_type("app::Cache")
        .optional(Value::null());
    let values = invoke(&Context::new(), vec![parameter], &arguments()).unwrap();
    assert_eq!(values.len(), 1);
    assert!(values[0].is_null());
}

#[test]
fn test_optional_type_prefers_registered_implementation() {
    let context = Context::new()
        .with("port", Provider::value_of(8080u16))
        .unwrap();
    let parameter = Parameter::new("port")
        .typed::<u16>()
        .optional(Value::new(80u16));
    let values = invoke(&context, vec![parameter], &arguments()).unwrap();
    assert_eq!(*values[0].downcast::<u16>().unwrap(), 8080);
}

#[test]
fn test_optional_type_propagates_ambiguity() {
    let context = Context::new()
        .with("first", Provider::value_of(1u16))
        .unwrap()
        .with("second", Provider::value_of(2u16))
        .unwrap();
    let parameter = Parameter::new("port")
        .typed::<u16>()
        .optional(Value::new(80u16));
    let result = invoke(&context, vec![parameter], &arguments());
    assert!(matches!(result, Err(Error::AmbiguousImplementation { .. })));
}

#[test]
fn test_required_type_resolved_at_use() {
    let parameters = vec![Parameter::new("port").typed::<u16>()];
    let injector = injector();
    let provider = injector
        .executable_provider(&collect(parameters), &arguments())
        .unwrap();

    let empty = Context::new();
    assert!(matches!(
        empty.resolve(&provider),
        Err(Error::NotFound(NotFound::Type(_)))
    ));

    let context = Context::new()
        .with("port", Provider::value_of(8080u16))
        .unwrap();
    let values = context.resolve(&provider).unwrap();
    let values = values.downcast::<Vec<Value>>().unwrap();
    assert_eq!(*values[0].downcast::<u16>().unwrap(), 8080);
}

#[test]
fn test_variadic_without_rule_is_omitted() {
    let parameters = vec![
        Parameter::new("first"),
        Parameter::new("rest").typed::<String>().variadic(),
    ];
    let rules = arguments().index(0, value("first".to_string()));
    let values = invoke(&Context::new(), parameters, &rules).unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(string(&values[0]), "first");
}

#[test]
fn test_resolver_reports_one_argument_per_parameter() {
    let injector = injector();
    let executable = collect(vec![
        Parameter::new("a").optional(Value::null()),
        Parameter::new("b").of_type("app::Database"),
        Parameter::new("c").variadic(),
    ]);
    let resolved = injector
        .argument_resolver()
        .resolve(&injector, &executable, &arguments())
        .unwrap();
    let names: Vec<_> = resolved.iter().map(|a| a.parameter.name()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(resolved[1].provider.result_type().is_none());
}

#[test]
fn test_arguments_are_immutable() {
    let base = arguments().name("host", value("localhost".to_string()));
    let extended = base.index(0, value(1u32));
    assert!(base.by_index(0).is_none());
    assert!(extended.by_index(0).is_some());

    let other = arguments().name("host", value("example.com".to_string()));
    let merged = extended.merge(&other);
    assert!(merged.by_index(0).is_some());
    assert!(!merged.is_empty());
    assert!(arguments().is_empty());
}
