//! Type-erased plugin values.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

/// The value a plugin exports after a successful init.
///
/// Internally this is an `Arc<T>` (usually `Arc<dyn SomeTrait>`) upcast to
/// `Any`, so consumers must downcast with the *same* `T` the plugin used when
/// constructing the instance.  The concrete type name is kept alongside for
/// diagnostics when that downcast fails.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    /// Wraps a shared value.
    ///
    /// ```rust,ignore
    /// let svc: Arc<dyn CriService> = Arc::new(service);
    /// let instance = Instance::new(svc);
    /// assert!(instance.downcast::<dyn CriService>().is_some());
    /// ```
    pub fn new<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the stored `Arc<T>` if the plugin exported exactly `T`.
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.value.downcast_ref::<Arc<T>>().map(Arc::clone)
    }

    /// Returns `true` if [`downcast::<T>`](Self::downcast) would succeed.
    pub fn is<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.value.is::<Arc<T>>()
    }

    /// Name of the type the plugin exported.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct Hello;

    impl Greeter for Hello {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn test_downcast_trait_object() {
        let greeter: Arc<dyn Greeter> = Arc::new(Hello);
        let instance = Instance::new(greeter);

        let back = instance.downcast::<dyn Greeter>().unwrap();
        assert_eq!(back.greet(), "hello");
        assert!(instance.downcast::<Hello>().is_none());
        assert!(instance.type_name().contains("Greeter"));
    }
}
