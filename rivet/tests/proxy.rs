use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rivet::{
    Application, Deferred, Error, Executable, Identifier, LazyProxyFactory, Provider, Supplier,
    TypeName, Value, arguments, factory, provider, proxy, proxy_with, singleton,
};

struct Mailer {
    id: usize,
}

fn mailer(counter: &Arc<AtomicUsize>) -> Executable {
    let counter = counter.clone();
    Executable::new("Mailer", move |_| {
        let id = counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::new(Mailer { id }))
    })
    .returns::<Mailer>()
}

#[test]
fn test_proxy_defers_construction() {
    let counter = Arc::new(AtomicUsize::new(0));
    let app = Application::builder()
        .define("mailer", proxy(factory(mailer(&counter), arguments())))
        .build()
        .unwrap();

    let value = app.get("mailer").unwrap();
    let deferred = value.downcast::<Deferred>().unwrap();
    assert_eq!(deferred.type_name(), &TypeName::of::<Mailer>());
    assert!(!deferred.is_initialized());
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    let first = deferred.downcast::<Mailer>().unwrap();
    let second = deferred.downcast::<Mailer>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.id, 0);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_proxy_autowired_by_wrapped_type() {
    let counter = Arc::new(AtomicUsize::new(0));
    let app = Application::builder()
        .define("mailer", proxy(factory(mailer(&counter), arguments())))
        .build()
        .unwrap();

    let value = app.get_type(&TypeName::of::<Mailer>()).unwrap();
    assert!(value.is::<Deferred>());
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_proxy_breaks_construction_cycle() {
    let a = Provider::delegate(|resolution| {
        let b = resolution.get(&Identifier::new("b"))?;
        Ok(Value::new(("a", b)))
    });
    let b = Provider::delegate(|resolution| {
        let a = resolution.get(&Identifier::new("a"))?;
        Ok(Value::new(("b", a)))
    });
    let app = Application::builder()
        .define("a", singleton(provider(a)))
        .define("b", proxy(provider(b)))
        .build()
        .unwrap();

    let a = app.get("a").unwrap();
    let pair = a.downcast::<(&'static str, Value)>().unwrap();
    assert_eq!(pair.0, "a");

    let deferred = pair.1.downcast::<Deferred>().unwrap();
    let inner = deferred.downcast::<(&'static str, Value)>().unwrap();
    assert_eq!(inner.0, "b");
    assert!(inner.1.ptr_eq(&a));
}

#[test]
fn test_deferred_failure_is_remembered() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let deferred = Deferred::new(
        TypeName::of::<Mailer>(),
        Box::new(move || -> Result<Value, Error> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::ConstructionFailure {
                callable: "Mailer".to_string(),
                source: "smtp unreachable".into(),
            })
        }),
    );

    assert!(deferred.get().is_err());
    assert!(deferred.get().is_err());
    assert!(deferred.is_initialized());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        deferred.downcast::<Mailer>(),
        Err(Error::ConstructionFailure { .. })
    ));
}

/// Builds the value right away and records requested types.
#[derive(Default)]
struct EagerFactory {
    requested: Mutex<Vec<TypeName>>,
}

impl LazyProxyFactory for EagerFactory {
    fn create_deferred(&self, ty: &TypeName, supplier: Supplier) -> Result<Value, Error> {
        self.requested.lock().unwrap().push(ty.clone());
        supplier()
    }
}

#[test]
fn test_proxy_with_custom_factory() {
    let counter = Arc::new(AtomicUsize::new(0));
    let proxies = Arc::new(EagerFactory::default());
    let app = Application::builder()
        .define(
            "mailer",
            proxy_with(factory(mailer(&counter), arguments()), proxies.clone()),
        )
        .build()
        .unwrap();

    let value = app.get("mailer").unwrap();
    assert!(value.is::<Mailer>());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(
        *proxies.requested.lock().unwrap(),
        vec![TypeName::of::<Mailer>()]
    );
}
