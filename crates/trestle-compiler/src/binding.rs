//! The hosted runtime surface generated code links against
//!
//! The bridge compiler never executes hosted code; everything it needs
//! from the runtime is a set of class names and entry points to emit call
//! sites for. The entry-point names and shapes are fixed protocol; only
//! the class names vary by deployment, so only those are overridable.

use trestle_classfile::{method_descriptor, JavaType};

/// JVM class names (internal form) of the hosted runtime's collaborator
/// surface.
#[derive(Debug, Clone)]
pub struct RuntimeBinding {
    /// Runtime singleton: `getGlobalRuntime`, `findClass`,
    /// `getCurrentContext`, `getLoadService`
    pub runtime_class: String,
    /// Host object interface: `getRuntime`, `call`
    pub object_class: String,
    /// Superclass of generated classes; its constructor takes the runtime
    /// and the resolved host class
    pub base_class: String,
    /// Host class handle returned by `findClass`
    pub class_class: String,
    /// Execution context passed through dispatch
    pub context_class: String,
    /// Boxing/unboxing utility class
    pub marshal_class: String,
    /// Load service: `require`
    pub load_service_class: String,
}

impl RuntimeBinding {
    /// Static accessor for the runtime singleton.
    pub const GET_GLOBAL_RUNTIME: &'static str = "getGlobalRuntime";
    /// Class-by-path lookup on the runtime.
    pub const FIND_CLASS: &'static str = "findClass";
    /// Execution context accessor on the runtime.
    pub const GET_CURRENT_CONTEXT: &'static str = "getCurrentContext";
    /// Load service accessor on the runtime.
    pub const GET_LOAD_SERVICE: &'static str = "getLoadService";
    /// Require-by-path on the load service.
    pub const REQUIRE: &'static str = "require";
    /// Runtime handle accessor on a host object.
    pub const GET_RUNTIME: &'static str = "getRuntime";
    /// Dynamic call-method-by-name entry point on a host object.
    pub const CALL: &'static str = "call";
    /// Generic object-to-host conversion on the marshal class.
    pub const FROM_OBJECT: &'static str = "fromObject";

    /// The generic hosted object type.
    pub fn object_type(&self) -> JavaType {
        JavaType::Object(self.object_class.clone())
    }

    /// The runtime singleton type.
    pub fn runtime_type(&self) -> JavaType {
        JavaType::Object(self.runtime_class.clone())
    }

    /// The execution context type.
    pub fn context_type(&self) -> JavaType {
        JavaType::Object(self.context_class.clone())
    }

    /// The host class handle type.
    pub fn class_type(&self) -> JavaType {
        JavaType::Object(self.class_class.clone())
    }

    /// The load service type.
    pub fn load_service_type(&self) -> JavaType {
        JavaType::Object(self.load_service_class.clone())
    }

    /// `()Lruntime;`
    pub fn get_global_runtime_descriptor(&self) -> String {
        method_descriptor(&[], &self.runtime_type())
    }

    /// `(Ljava/lang/String;)Lclass;`
    pub fn find_class_descriptor(&self) -> String {
        method_descriptor(&[string_type()], &self.class_type())
    }

    /// `()Lcontext;`
    pub fn get_current_context_descriptor(&self) -> String {
        method_descriptor(&[], &self.context_type())
    }

    /// `()Lloadservice;`
    pub fn get_load_service_descriptor(&self) -> String {
        method_descriptor(&[], &self.load_service_type())
    }

    /// `(Ljava/lang/String;)Z`
    pub fn require_descriptor(&self) -> String {
        method_descriptor(&[string_type()], &JavaType::Boolean)
    }

    /// `()Lruntime;` on the host object interface.
    pub fn get_runtime_descriptor(&self) -> String {
        method_descriptor(&[], &self.runtime_type())
    }

    /// `(Lruntime;Lclass;)V` on the base class constructor.
    pub fn base_init_descriptor(&self) -> String {
        method_descriptor(
            &[self.runtime_type(), self.class_type()],
            &JavaType::Void,
        )
    }

    /// `(Lcontext;Ljava/lang/String;[Lobject;)Lobject;`
    pub fn call_descriptor(&self) -> String {
        method_descriptor(
            &[
                self.context_type(),
                string_type(),
                JavaType::array(self.object_type()),
            ],
            &self.object_type(),
        )
    }

    /// `(Lruntime;Ljava/lang/Object;)Lobject;`
    pub fn from_object_descriptor(&self) -> String {
        method_descriptor(
            &[self.runtime_type(), JavaType::object("java.lang.Object")],
            &self.object_type(),
        )
    }

    /// `(Lruntime;<prim>)Lobject;` for a primitive boxing entry point.
    pub fn box_descriptor(&self, primitive: &JavaType) -> String {
        method_descriptor(&[self.runtime_type(), primitive.clone()], &self.object_type())
    }

    /// `(Lobject;)<prim>` for a primitive unboxing entry point.
    pub fn unbox_descriptor(&self, primitive: &JavaType) -> String {
        method_descriptor(&[self.object_type()], primitive)
    }
}

impl Default for RuntimeBinding {
    fn default() -> Self {
        Self {
            runtime_class: "org/trestle/runtime/TrestleRuntime".to_string(),
            object_class: "org/trestle/runtime/HostObject".to_string(),
            base_class: "org/trestle/runtime/RuntimeObject".to_string(),
            class_class: "org/trestle/runtime/HostClass".to_string(),
            context_class: "org/trestle/runtime/ExecContext".to_string(),
            marshal_class: "org/trestle/runtime/Marshal".to_string(),
            load_service_class: "org/trestle/runtime/LoadService".to_string(),
        }
    }
}

fn string_type() -> JavaType {
    JavaType::object("java.lang.String")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_descriptors() {
        let binding = RuntimeBinding::default();
        assert_eq!(
            binding.get_global_runtime_descriptor(),
            "()Lorg/trestle/runtime/TrestleRuntime;"
        );
        assert_eq!(
            binding.call_descriptor(),
            "(Lorg/trestle/runtime/ExecContext;Ljava/lang/String;[Lorg/trestle/runtime/HostObject;)Lorg/trestle/runtime/HostObject;"
        );
        assert_eq!(
            binding.base_init_descriptor(),
            "(Lorg/trestle/runtime/TrestleRuntime;Lorg/trestle/runtime/HostClass;)V"
        );
    }

    #[test]
    fn test_box_and_unbox_descriptors() {
        let binding = RuntimeBinding::default();
        assert_eq!(
            binding.box_descriptor(&JavaType::Long),
            "(Lorg/trestle/runtime/TrestleRuntime;J)Lorg/trestle/runtime/HostObject;"
        );
        assert_eq!(
            binding.unbox_descriptor(&JavaType::Boolean),
            "(Lorg/trestle/runtime/HostObject;)Z"
        );
    }
}
