use std::sync::Arc;

use rivet::{
    Application, Error, Injectable, Parameter, ParameterType, TypeName, arguments, injectable,
    object, object_with, singleton, value,
};

struct Database {
    url: String,
}

struct Cache;

struct Plugin {
    name: &'static str,
}

#[derive(Injectable)]
struct Repository {
    database: Arc<Database>,
    cache: Option<Arc<Cache>>,
    #[inject(default = 3)]
    retries: u32,
}

#[derive(Injectable)]
struct Replica {
    #[inject(marker = "replica")]
    database: Arc<Database>,
}

#[derive(Injectable)]
struct Registry {
    #[inject(variadic)]
    plugins: Vec<Arc<Plugin>>,
}

struct Service {
    repository: Arc<Repository>,
    name: String,
}

#[injectable]
impl Service {
    #[factory]
    fn new(repository: Arc<Repository>, #[inject(default = "service".to_string())] name: String) -> Self {
        Self { repository, name }
    }
}

struct Shared {
    database: Arc<Database>,
}

#[injectable]
impl Shared {
    #[factory]
    fn shared(database: Arc<Database>) -> Arc<Self> {
        Arc::new(Self { database })
    }
}

struct Connection {
    url: String,
}

#[injectable]
impl Connection {
    #[factory]
    fn connect(database: Arc<Database>) -> Result<Self, String> {
        if database.url.is_empty() {
            return Err("empty database url".to_string());
        }
        Ok(Self {
            url: database.url.clone(),
        })
    }
}

fn database(url: &str) -> Database {
    Database {
        url: url.to_string(),
    }
}

#[test]
fn test_derive_parameters() {
    let executable = Repository::executable();
    assert_eq!(executable.result_type(), Some(&TypeName::of::<Repository>()));

    let parameters = executable.parameters();
    let names: Vec<_> = parameters.iter().map(Parameter::name).collect();
    assert_eq!(names, vec!["database", "cache", "retries"]);
    assert!(matches!(
        parameters[0].declared_type(),
        ParameterType::Named(ty) if *ty == TypeName::of::<Database>()
    ));
    assert!(!parameters[0].is_optional());
    assert!(parameters[1].is_optional());
    assert!(parameters[1].default_value().unwrap().is_null());
    assert_eq!(
        *parameters[2].default_value().unwrap().downcast::<u32>().unwrap(),
        3
    );

    let replica = Replica::executable();
    assert!(replica.parameters()[0].has_marker("replica"));
    assert!(Registry::executable().parameters()[0].is_variadic());
}

#[test]
fn test_derive_autowires_fields() {
    let app = Application::builder()
        .define("database", value(database("postgres://main")))
        .define("repository", object::<Repository>())
        .build()
        .unwrap();

    let repository: Arc<Repository> = app.get_typed().unwrap();
    assert_eq!(repository.database.url, "postgres://main");
    assert!(repository.cache.is_none());
    assert_eq!(repository.retries, 3);

    let app = Application::builder()
        .define("database", value(database("postgres://main")))
        .define("cache", value(Cache))
        .define("retries", value(5u32))
        .define("repository", object::<Repository>())
        .build()
        .unwrap();

    let repository: Arc<Repository> = app.get_typed().unwrap();
    assert!(repository.cache.is_some());
    assert_eq!(repository.retries, 5);
}

#[test]
fn test_derive_marker_rule() {
    let app = Application::builder()
        .define(
            "replica",
            object_with::<Replica>(
                arguments().marker("replica", value(database("postgres://replica"))),
            ),
        )
        .build()
        .unwrap();

    let replica: Arc<Replica> = app.get_typed().unwrap();
    assert_eq!(replica.database.url, "postgres://replica");
}

#[test]
fn test_derive_variadic_without_rule() {
    let app = Application::builder()
        .define("plugin", value(Plugin { name: "metrics" }))
        .define("registry", object::<Registry>())
        .build()
        .unwrap();

    let registry: Arc<Registry> = app.get_typed().unwrap();
    assert!(registry.plugins.is_empty());
    let plugin: Arc<Plugin> = app.get_typed().unwrap();
    assert_eq!(plugin.name, "metrics");
}

#[test]
fn test_derive_missing_dependency() {
    let app = Application::builder()
        .define("repository", object::<Repository>())
        .build()
        .unwrap();

    assert!(matches!(
        app.get("repository"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_injectable_factory() {
    let executable = Service::executable();
    assert!(executable.name().ends_with("Service::new"));
    assert_eq!(executable.result_type(), Some(&TypeName::of::<Service>()));

    let app = Application::builder()
        .define("database", value(database("postgres://main")))
        .define("repository", singleton(object::<Repository>()))
        .define("service", object::<Service>())
        .build()
        .unwrap();

    let service: Arc<Service> = app.get_typed().unwrap();
    let repository: Arc<Repository> = app.get_typed().unwrap();
    assert_eq!(service.name, "service");
    assert!(Arc::ptr_eq(&service.repository, &repository));
}

#[test]
fn test_injectable_factory_returning_arc() {
    let app = Application::builder()
        .define("database", value(database("postgres://main")))
        .define("shared", object::<Shared>())
        .build()
        .unwrap();

    let shared: Arc<Shared> = app.get_typed().unwrap();
    assert_eq!(shared.database.url, "postgres://main");
}

#[test]
fn test_injectable_factory_returning_result() {
    let app = Application::builder()
        .define("database", value(database("postgres://main")))
        .define("connection", object::<Connection>())
        .build()
        .unwrap();
    let connection: Arc<Connection> = app.get_typed().unwrap();
    assert_eq!(connection.url, "postgres://main");

    let app = Application::builder()
        .define("database", value(database("")))
        .define("connection", object::<Connection>())
        .build()
        .unwrap();
    match app.get("connection").unwrap_err() {
        Error::ConstructionFailure { callable, source } => {
            assert!(callable.ends_with("Connection::connect"));
            assert_eq!(source.to_string(), "empty database url");
        }
        other => panic!("unexpected error: {other}"),
    }
}
