use crate::error::HookError;
use crate::schema::Schema;
use std::any::Any;

/// Upcast helper so type-erased components can be downcast back by the host.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A piece of UI: a template over the component's own fields.
///
/// ```
/// use markup_core::{Component, Schema};
///
/// #[derive(Default)]
/// struct Hello {
///     name: String,
/// }
///
/// impl Component for Hello {
///     fn render(&self) -> &str {
///         "<p>Hello {{.Name}}</p>"
///     }
///
///     fn schema() -> Schema<Self> {
///         Schema::new().field("Name", |h: &Hello| &h.name, |h: &mut Hello| &mut h.name)
///     }
/// }
/// ```
pub trait Component: AsAny {
    /// Template source producing this component's markup. It must expand to
    /// exactly one standard element.
    fn render(&self) -> &str;

    /// Fields, computed values and methods exposed by this type.
    fn schema() -> Schema<Self>
    where
        Self: Sized;

    /// Called once the component's subtree is fully built. An error rolls the
    /// mount back.
    fn on_mount(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    /// Called after the component's subtree has been torn down.
    fn on_dismount(&mut self) -> Result<(), HookError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    impl Component for Dummy {
        fn render(&self) -> &str {
            "<div></div>"
        }

        fn schema() -> Schema<Self> {
            Schema::new()
        }
    }

    #[test]
    fn test_downcast_through_trait_object() {
        let boxed: Box<dyn Component> = Box::new(Dummy);
        let component: &dyn Component = &*boxed;
        assert!(component.as_any().downcast_ref::<Dummy>().is_some());
    }

    #[test]
    fn test_default_hooks() {
        let mut dummy = Dummy;
        assert!(dummy.on_mount().is_ok());
        assert!(dummy.on_dismount().is_ok());
    }
}
