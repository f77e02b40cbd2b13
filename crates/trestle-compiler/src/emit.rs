//! Bridge class emission
//!
//! Turns a [`ClassSpec`] into a JVM class whose constructor binds an
//! instance to the hosted class and whose methods marshal between the
//! native calling convention and the hosted call-by-name protocol.

use crate::binding::RuntimeBinding;
use crate::error::{EmitError, EmitResult};
use crate::manifest::{AnnotationSpec, AnnotationValue, ClassSpec, MethodSpec};
use crate::marshal::conversion_for;
use crate::signature;
use std::path::PathBuf;
use trestle_classfile::AnnotationValue as ClassAnnotationValue;
use trestle_classfile::{
    access, method_descriptor, param_slots, verify_class, Annotation, ClassBuilder, ClassFile,
    CodeWriter, JavaType,
};

/// A generated bridge class, ready to serialize.
#[derive(Debug)]
pub struct GeneratedClass {
    /// Binary name, including the package (`com.geo.PointBridge`).
    pub binary_name: String,
    /// The verified class file model.
    pub class_file: ClassFile,
}

impl GeneratedClass {
    /// On-disk path of the artifact relative to the output root.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.class", self.binary_name.replace('.', "/")))
    }

    /// Serialize to class file bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.class_file.encode()
    }
}

/// The bridge class generator.
///
/// One instance per run; holds only the runtime binding and never mutates
/// shared state, so repeated compilations of the same spec are
/// byte-identical.
#[derive(Debug, Default)]
pub struct BridgeCompiler {
    binding: RuntimeBinding,
}

impl BridgeCompiler {
    /// Create a compiler against the given runtime binding.
    pub fn new(binding: RuntimeBinding) -> Self {
        Self { binding }
    }

    /// The binding this compiler emits call sites against.
    pub fn binding(&self) -> &RuntimeBinding {
        &self.binding
    }

    /// Generate the bridge class for a hosted class.
    ///
    /// Emits exactly one constructor, an optional static initializer for
    /// the init file, and one bridge method per spec entry, then runs the
    /// structural verifier over the result.
    pub fn compile(&self, spec: &ClassSpec) -> EmitResult<GeneratedClass> {
        if !is_java_identifier(&spec.native_name) {
            return Err(EmitError::InvalidClassName {
                name: spec.native_name.clone(),
            });
        }
        if let Some(package) = &spec.package {
            if package.split('.').any(|segment| !is_java_identifier(segment)) {
                return Err(EmitError::InvalidClassName {
                    name: package.clone(),
                });
            }
        }

        let binary_name = match &spec.package {
            Some(package) => format!("{}.{}", package, spec.native_name),
            None => spec.native_name.clone(),
        };
        let internal_name = binary_name.replace('.', "/");

        let mut builder = ClassBuilder::new(
            access::PUBLIC | access::SUPER,
            &internal_name,
            &self.binding.base_class,
        )?;
        if let Some(source) = &spec.source_file {
            builder.set_source_file(source)?;
        }

        if let Some(init_file) = &spec.init_file {
            self.emit_clinit(&mut builder, init_file)?;
        }
        self.emit_constructor(&mut builder, &spec.host_class)?;
        for method in &spec.methods {
            self.emit_method(&mut builder, method)?;
        }

        let class_file = builder.finish();
        verify_class(&class_file)?;
        Ok(GeneratedClass {
            binary_name,
            class_file,
        })
    }

    /// Static initializer: require the init file through the runtime's
    /// load service before any instance can be constructed.
    fn emit_clinit(&self, builder: &mut ClassBuilder, init_file: &str) -> EmitResult<()> {
        let binding = &self.binding;
        let pool = builder.pool_mut();
        let get_runtime = pool.method_ref(
            &binding.runtime_class,
            RuntimeBinding::GET_GLOBAL_RUNTIME,
            &binding.get_global_runtime_descriptor(),
        )?;
        let get_load_service = pool.method_ref(
            &binding.runtime_class,
            RuntimeBinding::GET_LOAD_SERVICE,
            &binding.get_load_service_descriptor(),
        )?;
        let require = pool.method_ref(
            &binding.load_service_class,
            RuntimeBinding::REQUIRE,
            &binding.require_descriptor(),
        )?;
        let path = pool.string(init_file)?;

        let mut code = CodeWriter::new();
        code.invokestatic(get_runtime, 0, 1);
        code.invokevirtual(get_load_service, 0, 1);
        code.ldc(path);
        code.invokevirtual(require, 1, 1);
        code.pop();
        code.emit_return(&JavaType::Void);

        builder.add_method(access::STATIC, "<clinit>", "()V", code, 0, &[])?;
        Ok(())
    }

    /// Constructor: resolve the runtime singleton, look up the hosted
    /// class by path, and initialize against the superclass.
    fn emit_constructor(&self, builder: &mut ClassBuilder, host_class: &str) -> EmitResult<()> {
        let binding = &self.binding;
        let pool = builder.pool_mut();
        let get_runtime = pool.method_ref(
            &binding.runtime_class,
            RuntimeBinding::GET_GLOBAL_RUNTIME,
            &binding.get_global_runtime_descriptor(),
        )?;
        let find_class = pool.method_ref(
            &binding.runtime_class,
            RuntimeBinding::FIND_CLASS,
            &binding.find_class_descriptor(),
        )?;
        let super_init = pool.method_ref(
            &binding.base_class,
            "<init>",
            &binding.base_init_descriptor(),
        )?;
        let path = pool.string(host_class)?;

        let mut code = CodeWriter::new();
        code.aload(0);
        code.invokestatic(get_runtime, 0, 1);
        code.dup();
        code.ldc(path);
        code.invokevirtual(find_class, 1, 1);
        code.invokespecial(super_init, 2, 0);
        code.emit_return(&JavaType::Void);

        builder.add_method(access::PUBLIC, "<init>", "()V", code, 1, &[])?;
        Ok(())
    }

    /// One bridge method: prologue, argument marshaling, dynamic
    /// dispatch, return conversion.
    fn emit_method(&self, builder: &mut ClassBuilder, spec: &MethodSpec) -> EmitResult<()> {
        let binding = &self.binding;
        let signature = signature::resolve(spec, binding)?;

        let java_name = spec.java_name.as_deref().unwrap_or(&spec.name);
        if !is_java_identifier(java_name) {
            return Err(EmitError::InvalidName {
                name: java_name.to_string(),
            });
        }

        let arg_slots = param_slots(&signature.params);
        if arg_slots > 254 {
            return Err(EmitError::TooManyParameters {
                method: spec.name.clone(),
            });
        }

        let descriptor = method_descriptor(&signature.params, &signature.ret);
        // The runtime handle lives in the first slot past the parameters.
        let runtime_slot = first_local_slot(&signature.params, true);
        let variadic = spec.arity < 0;

        // Resolve every call site up front; emission below only touches
        // the pool again for small-int constants.
        let pool = builder.pool_mut();
        let get_runtime = pool.interface_method_ref(
            &binding.object_class,
            RuntimeBinding::GET_RUNTIME,
            &binding.get_runtime_descriptor(),
        )?;
        let get_context = pool.method_ref(
            &binding.runtime_class,
            RuntimeBinding::GET_CURRENT_CONTEXT,
            &binding.get_current_context_descriptor(),
        )?;
        let call = pool.interface_method_ref(
            &binding.object_class,
            RuntimeBinding::CALL,
            &binding.call_descriptor(),
        )?;
        let dispatch_name = pool.string(&spec.name)?;
        let element_class = pool.class(&binding.object_class)?;

        let mut arg_conversions = Vec::with_capacity(signature.params.len());
        if !variadic {
            for param in &signature.params {
                let site = match conversion_for(param) {
                    Some(conversion) => pool.method_ref(
                        &binding.marshal_class,
                        conversion.box_method,
                        &binding.box_descriptor(param),
                    )?,
                    None => pool.method_ref(
                        &binding.marshal_class,
                        RuntimeBinding::FROM_OBJECT,
                        &binding.from_object_descriptor(),
                    )?,
                };
                arg_conversions.push(site);
            }
        }
        let ret_conversion = match conversion_for(&signature.ret) {
            Some(conversion) => Some(pool.method_ref(
                &binding.marshal_class,
                conversion.unbox_method,
                &binding.unbox_descriptor(&signature.ret),
            )?),
            None => None,
        };

        let mut code = CodeWriter::new();

        // Prologue: receiver, runtime handle (saved for marshaling),
        // context, dispatch name.
        code.aload(0);
        code.dup();
        code.invokeinterface(get_runtime, 0, 1);
        code.dup();
        code.astore(runtime_slot);
        code.invokevirtual(get_context, 0, 1);
        code.ldc(dispatch_name);

        if variadic {
            // The caller's pre-built argument array passes through as-is.
            code.aload(1);
        } else {
            code.push_int(signature.params.len() as i32, builder.pool_mut())?;
            code.anewarray(element_class);
            let mut slot = 1u16;
            for (index, (param, conversion)) in
                signature.params.iter().zip(&arg_conversions).enumerate()
            {
                code.dup();
                code.push_int(index as i32, builder.pool_mut())?;
                code.aload(runtime_slot);
                code.load(param, slot);
                code.invokestatic(*conversion, 1 + param.slots(), 1);
                code.aastore();
                slot += param.slots();
            }
        }

        // receiver + (context, name, args)
        code.invokeinterface(call, 3, 1);

        match ret_conversion {
            Some(conversion) => {
                code.invokestatic(conversion, 1, signature.ret.slots());
                code.emit_return(&signature.ret);
            }
            None if signature.ret == JavaType::Void => {
                code.pop();
                code.emit_return(&JavaType::Void);
            }
            None => code.emit_return(&signature.ret),
        }

        let annotations = convert_annotations(&spec.annotations);
        builder.add_method(
            access::PUBLIC,
            java_name,
            &descriptor,
            code,
            runtime_slot + 1,
            &annotations,
        )?;
        Ok(())
    }
}

/// First free local-variable slot after the receiver and parameters.
///
/// `long` and `double` parameters occupy two slots; slot 0 is the
/// receiver on instance methods.
pub fn first_local_slot(params: &[JavaType], is_instance: bool) -> u16 {
    is_instance as u16 + param_slots(params)
}

fn convert_annotations(specs: &[AnnotationSpec]) -> Vec<Annotation> {
    specs
        .iter()
        .map(|spec| Annotation {
            class_path: spec.class.clone(),
            values: spec
                .values
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        AnnotationValue::Bool(b) => ClassAnnotationValue::Boolean(*b),
                        AnnotationValue::Int(i) => ClassAnnotationValue::Int(*i),
                        AnnotationValue::Str(s) => ClassAnnotationValue::Str(s.clone()),
                    };
                    (name.clone(), value)
                })
                .collect(),
        })
        .collect()
}

/// Java identifier rule, since the emitted members exist to be called
/// from Java source.
fn is_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
