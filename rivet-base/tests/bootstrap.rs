use std::sync::Arc;

use rivet::{Error, Executable, Parameter, Status, TypeRegistry, Value, arguments, factory, singleton, value};
use rivet_base::{Bootstrap, CONFIG_ID, Config, ContainerConfig, TRACING_ID, Tracing};

struct Listener {
    port: u16,
}

fn listener() -> Executable {
    Executable::new("Listener", |mut args| {
        let config = args.take::<Config>()?;
        let port = config.get("port")?;
        Ok(Value::new(Listener { port }))
    })
    .returns::<Listener>()
    .param(Parameter::new("config").typed::<Config>())
}

#[test]
fn test_bootstrap_registers_config() {
    let config = Config::new().with("port", 8080u16);
    let app = Bootstrap::new(config)
        .define("listener", factory(listener(), arguments()))
        .build()
        .unwrap();

    assert_eq!(app.status(), Status::None);
    let config = app.get(CONFIG_ID).unwrap();
    assert!(config.is::<Config>());
    let listener: Arc<Listener> = app.get_typed().unwrap();
    assert_eq!(listener.port, 8080);
    assert!(app.get(TRACING_ID).is_err());
}

#[test]
fn test_bootstrap_container_section() {
    let config = Config::parse(r#"{ "container": { "auto_start": true } }"#).unwrap();
    let container: ContainerConfig = config.section().unwrap();
    assert!(container.auto_start);
    assert!(container.cache_introspection);

    let app = Bootstrap::new(config)
        .define("port", singleton(value(8080u16)))
        .build()
        .unwrap();
    assert!(app.options().auto_start);
    app.get("port").unwrap();
    assert_eq!(app.status(), Status::Running);
}

#[test]
fn test_bootstrap_invalid_container_section() {
    let config = Config::parse(r#"{ "container": { "auto_start": "yes" } }"#).unwrap();
    assert!(Bootstrap::new(config).build().is_err());
}

#[test]
fn test_bootstrap_reports_conflicts() {
    let result = Bootstrap::new(Config::new())
        .define("port", value(8080u16))
        .define("port", value(80u16))
        .build();
    let err = result.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::DuplicateIdentifier(_))
    ));

    let result = Bootstrap::new(Config::new())
        .define(CONFIG_ID, value(1u32))
        .build();
    assert!(result.is_err());
}

#[test]
fn test_bootstrap_uses_introspector() {
    let registry = TypeRegistry::new().implements::<Listener>("app::Service");
    let config = Config::new().with("port", 9090u16);
    let app = Bootstrap::new(config)
        .introspector(Arc::new(registry))
        .define("listener", factory(listener(), arguments()))
        .build()
        .unwrap();

    let service = app
        .get_type(&rivet::TypeName::new("app::Service"))
        .unwrap();
    assert_eq!(service.downcast::<Listener>().unwrap().port, 9090);
}

#[test]
fn test_bootstrap_installs_tracing() {
    let config = Config::parse(
        r#"{ "tracing": { "level": "info", "directives": ["rivet=trace"] } }"#,
    )
    .unwrap();
    let app = Bootstrap::new(config).with_tracing(true).build().unwrap();

    let handle = app.get(TRACING_ID).unwrap().downcast::<Tracing>().unwrap();
    assert_eq!(handle.level(), tracing::Level::INFO);
    handle.set_level_str(Some("warn")).unwrap();
    assert_eq!(handle.level(), tracing::Level::WARN);
    handle.set_level_str(None).unwrap();
    assert_eq!(handle.level(), tracing::Level::INFO);
    assert!(handle.set_level_str(Some("loud")).is_err());
}
