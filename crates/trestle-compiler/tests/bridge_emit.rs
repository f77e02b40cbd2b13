//! End-to-end bridge generation tests
//!
//! These are contract tests over generated output: descriptors, bodies,
//! and pool contents, not behavioral simulation of the hosted runtime.

use trestle_compiler::{
    first_local_slot, BridgeCompiler, BridgeManifest, EmitError, GeneratedClass,
};
use trestle_classfile::{Constant, JavaType, Opcode};

const HOST_OBJECT: &str = "Lorg/trestle/runtime/HostObject;";

fn generate(manifest_text: &str, native: &str, host: &str) -> GeneratedClass {
    try_generate(manifest_text, native, host).unwrap()
}

fn try_generate(
    manifest_text: &str,
    native: &str,
    host: &str,
) -> Result<GeneratedClass, EmitError> {
    let manifest = BridgeManifest::from_str(manifest_text)?;
    let compiler = BridgeCompiler::new(manifest.binding());
    let spec = manifest.class_spec(native, host, None, None)?;
    compiler.compile(&spec)
}

/// Resolve the invokestatic target three bytes before the final return.
fn tail_call_target(class: &GeneratedClass, method: &str) -> (String, String, String) {
    let method = class.class_file.find_method(method).unwrap();
    let code = &method.code.code;
    assert_eq!(code[code.len() - 4], Opcode::Invokestatic.to_u8());
    let index = u16::from_be_bytes([code[code.len() - 3], code[code.len() - 2]]);
    let (class_name, name, descriptor) = class.class_file.pool.method_ref_at(index).unwrap();
    (class_name.into(), name.into(), descriptor.into())
}

#[test]
fn test_arity_default_signature() {
    let class = generate(
        "[[methods]]\nname = \"combine\"\narity = 2\n",
        "Bridge",
        "Combiner",
    );
    let method = class.class_file.find_method("combine").unwrap();
    assert_eq!(
        class.class_file.method_descriptor(method).unwrap(),
        format!("({HOST_OBJECT}{HOST_OBJECT}){HOST_OBJECT}")
    );
}

#[test]
fn test_variadic_default_signature() {
    let class = generate(
        "[[methods]]\nname = \"apply\"\narity = -1\n",
        "Bridge",
        "Fn",
    );
    let method = class.class_file.find_method("apply").unwrap();
    assert_eq!(
        class.class_file.method_descriptor(method).unwrap(),
        format!("([{HOST_OBJECT}){HOST_OBJECT}")
    );

    // The pre-built array passes through: no array allocation in the body.
    assert!(!method.code.code.contains(&Opcode::Anewarray.to_u8()));
    assert!(method.code.code.contains(&Opcode::Aload1.to_u8()));
}

#[test]
fn test_signature_override() {
    let class = generate(
        concat!(
            "[[methods]]\n",
            "name = \"measure\"\n",
            "arity = 2\n",
            "params = [\"int\", \"object\"]\n",
            "returns = \"long\"\n",
        ),
        "Bridge",
        "Meter",
    );
    let method = class.class_file.find_method("measure").unwrap();
    assert_eq!(
        class.class_file.method_descriptor(method).unwrap(),
        format!("(I{HOST_OBJECT})J")
    );

    // Body ends with the long-unboxing call followed by lreturn.
    assert_eq!(
        *method.code.code.last().unwrap(),
        Opcode::Lreturn.to_u8()
    );
    let (marshal, name, descriptor) = tail_call_target(&class, "measure");
    assert_eq!(marshal, "org/trestle/runtime/Marshal");
    assert_eq!(name, "toLong");
    assert_eq!(descriptor, format!("({HOST_OBJECT})J"));
}

#[test]
fn test_arity_mismatch_rejected() {
    let err = try_generate(
        concat!(
            "[[methods]]\n",
            "name = \"narrow\"\n",
            "arity = 2\n",
            "params = [\"int\", \"int\", \"int\"]\n",
            "returns = \"void\"\n",
        ),
        "Bridge",
        "Narrow",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        EmitError::ArityMismatch {
            expected: 2,
            got: 3,
            ..
        }
    ));
}

#[test]
fn test_first_local_slot_property() {
    let params = [
        JavaType::Int,
        JavaType::Long,
        JavaType::object("org/trestle/runtime/HostObject"),
    ];
    assert_eq!(first_local_slot(&params, true), 5);
}

#[test]
fn test_generation_is_deterministic() {
    let manifest = concat!(
        "init = \"acc/ledger.tsl\"\n",
        "[[methods]]\n",
        "name = \"credit\"\n",
        "arity = 1\n",
        "[[methods]]\n",
        "name = \"balance\"\n",
        "arity = 0\n",
        "params = []\n",
        "returns = \"double\"\n",
    );
    let first = generate(manifest, "LedgerBridge", "Acc::Ledger").encode();
    let second = generate(manifest, "LedgerBridge", "Acc::Ledger").encode();
    assert_eq!(first, second);
}

#[test]
fn test_end_to_end_boolean_bridge() {
    let class = generate(
        concat!(
            "[[methods]]\n",
            "name = \"bar\"\n",
            "arity = 0\n",
            "params = []\n",
            "returns = \"boolean\"\n",
        ),
        "FooBridge",
        "Foo",
    );
    assert_eq!(class.binary_name, "FooBridge");
    assert_eq!(class.class_file.class_name(), Some("FooBridge"));

    let method = class.class_file.find_method("bar").unwrap();
    assert_eq!(class.class_file.method_descriptor(method).unwrap(), "()Z");

    let code = &method.code.code;
    // Prologue: receiver, dup, runtime via the host-object interface,
    // dup/save, context.
    assert_eq!(code[0], Opcode::Aload0.to_u8());
    assert_eq!(code[1], Opcode::Dup.to_u8());
    assert_eq!(code[2], Opcode::Invokeinterface.to_u8());
    assert_eq!(code[5], 1); // getRuntime: receiver only
    assert_eq!(code[7], Opcode::Dup.to_u8());
    assert_eq!(code[8], Opcode::Astore1.to_u8());

    // Dispatch with an empty argument array.
    assert!(code
        .windows(2)
        .any(|w| w[0] == Opcode::Iconst0.to_u8() && w[1] == Opcode::Anewarray.to_u8()));

    // The interface dispatch passes receiver + context + name + array.
    let dispatch = code
        .windows(5)
        .find(|w| w[0] == Opcode::Invokeinterface.to_u8() && w[3] == 4)
        .expect("dispatch call site");
    let call_index = u16::from_be_bytes([dispatch[1], dispatch[2]]);
    let (iface, name, _) = class.class_file.pool.method_ref_at(call_index).unwrap();
    assert_eq!(iface, "org/trestle/runtime/HostObject");
    assert_eq!(name, "call");

    // Result converted through the boolean table entry, then an
    // int-family return.
    assert_eq!(*code.last().unwrap(), Opcode::Ireturn.to_u8());
    let (marshal, unbox, descriptor) = tail_call_target(&class, "bar");
    assert_eq!(marshal, "org/trestle/runtime/Marshal");
    assert_eq!(unbox, "toBoolean");
    assert_eq!(descriptor, format!("({HOST_OBJECT})Z"));

    // The hosted class path is a string constant for the constructor.
    assert!(class
        .class_file
        .pool
        .iter()
        .any(|(_, c)| matches!(c, Constant::Utf8(s) if s == "Foo")));

    assert_eq!(method.code.max_stack, 4);
    assert_eq!(method.code.max_locals, 2);
}

#[test]
fn test_constructor_shape() {
    let class = generate("", "PointBridge", "Geo::Point");
    let ctor = class.class_file.find_method("<init>").unwrap();
    assert_eq!(class.class_file.method_descriptor(ctor).unwrap(), "()V");

    let code = &ctor.code.code;
    assert_eq!(code[0], Opcode::Aload0.to_u8());
    assert_eq!(code[1], Opcode::Invokestatic.to_u8());
    assert_eq!(*code.last().unwrap(), Opcode::Return.to_u8());

    // Super call binds runtime + resolved host class.
    let special = code
        .windows(3)
        .rev()
        .find(|w| w[0] == Opcode::Invokespecial.to_u8())
        .unwrap();
    let index = u16::from_be_bytes([special[1], special[2]]);
    let (base, name, descriptor) = class.class_file.pool.method_ref_at(index).unwrap();
    assert_eq!(base, "org/trestle/runtime/RuntimeObject");
    assert_eq!(name, "<init>");
    assert_eq!(
        descriptor,
        "(Lorg/trestle/runtime/TrestleRuntime;Lorg/trestle/runtime/HostClass;)V"
    );

    // The hosted class path is dispatchable via ldc.
    assert!(class
        .class_file
        .pool
        .iter()
        .any(|(_, c)| matches!(c, Constant::Utf8(s) if s == "Geo::Point")));
}

#[test]
fn test_init_file_emits_static_initializer() {
    let with_init = generate(
        "init = \"geo/point.tsl\"\n[[methods]]\nname = \"x\"\narity = 0\n",
        "PointBridge",
        "Geo::Point",
    );
    let clinit = with_init.class_file.find_method("<clinit>").unwrap();
    assert_eq!(
        with_init.class_file.method_descriptor(clinit).unwrap(),
        "()V"
    );
    // require returns a boolean the initializer discards.
    let code = &clinit.code.code;
    assert_eq!(code[code.len() - 2], Opcode::Pop.to_u8());
    assert_eq!(code[code.len() - 1], Opcode::Return.to_u8());

    let without_init = generate(
        "[[methods]]\nname = \"x\"\narity = 0\n",
        "PointBridge",
        "Geo::Point",
    );
    assert!(without_init.class_file.find_method("<clinit>").is_none());
}

#[test]
fn test_wide_parameters_use_two_slots() {
    let class = generate(
        concat!(
            "[[methods]]\n",
            "name = \"span\"\n",
            "arity = 2\n",
            "params = [\"long\", \"double\"]\n",
            "returns = \"void\"\n",
        ),
        "Bridge",
        "Span",
    );
    let method = class.class_file.find_method("span").unwrap();
    // receiver (1) + long (2) + double (2) + runtime handle (1)
    assert_eq!(method.code.max_locals, 6);

    let code = &method.code.code;
    assert!(code.contains(&Opcode::Lload1.to_u8()));
    assert!(code.contains(&Opcode::Dload3.to_u8()));

    // void: dispatch result discarded.
    assert_eq!(code[code.len() - 2], Opcode::Pop.to_u8());
    assert_eq!(code[code.len() - 1], Opcode::Return.to_u8());
}

#[test]
fn test_object_parameters_route_through_generic_conversion() {
    let class = generate(
        concat!(
            "[[methods]]\n",
            "name = \"accept\"\n",
            "arity = 1\n",
            "params = [\"object\"]\n",
            "returns = \"object\"\n",
        ),
        "Bridge",
        "Sink",
    );
    let method = class.class_file.find_method("accept").unwrap();
    let code = &method.code.code;

    // Generic object return comes back as-is.
    assert_eq!(*code.last().unwrap(), Opcode::Areturn.to_u8());

    // The single argument goes through fromObject.
    let from_object = class
        .class_file
        .pool
        .iter()
        .find_map(|(index, _)| {
            let (class_name, name, _) = class.class_file.pool.method_ref_at(index)?;
            (class_name == "org/trestle/runtime/Marshal" && name == "fromObject")
                .then_some(index)
        })
        .expect("fromObject call site");
    let target = from_object.to_be_bytes();
    assert!(code
        .windows(3)
        .any(|w| w[0] == Opcode::Invokestatic.to_u8() && w[1] == target[0] && w[2] == target[1]));
}

#[test]
fn test_dispatch_name_survives_java_name_override() {
    let class = generate(
        concat!(
            "[[methods]]\n",
            "name = \"scale!\"\n",
            "arity = 1\n",
            "java_name = \"scale\"\n",
        ),
        "Bridge",
        "Shape",
    );
    assert!(class.class_file.find_method("scale").is_some());
    assert!(class.class_file.find_method("scale!").is_none());
    // Dispatch still uses the hosted name.
    assert!(class
        .class_file
        .pool
        .iter()
        .any(|(_, c)| matches!(c, Constant::Utf8(s) if s == "scale!")));
}

#[test]
fn test_invalid_member_name_rejected() {
    let err = try_generate(
        "[[methods]]\nname = \"scale!\"\narity = 0\n",
        "Bridge",
        "Shape",
    )
    .unwrap_err();
    assert!(matches!(err, EmitError::InvalidName { name } if name == "scale!"));
}

#[test]
fn test_runtime_override_changes_emitted_types() {
    let class = generate(
        concat!(
            "[runtime]\n",
            "object_class = \"com.acme.host.Value\"\n",
            "[[methods]]\n",
            "name = \"get\"\n",
            "arity = 0\n",
        ),
        "Bridge",
        "Box",
    );
    let method = class.class_file.find_method("get").unwrap();
    assert_eq!(
        class.class_file.method_descriptor(method).unwrap(),
        "()Lcom/acme/host/Value;"
    );
}

#[test]
fn test_package_shapes_binary_name_and_path() {
    let manifest = BridgeManifest::from_str("").unwrap();
    let compiler = BridgeCompiler::new(manifest.binding());
    let spec = manifest
        .class_spec("PointBridge", "Geo::Point", Some("com.geo"), None)
        .unwrap();
    let class = compiler.compile(&spec).unwrap();
    assert_eq!(class.binary_name, "com.geo.PointBridge");
    assert_eq!(
        class.relative_path(),
        std::path::PathBuf::from("com/geo/PointBridge.class")
    );
    assert_eq!(class.class_file.class_name(), Some("com/geo/PointBridge"));
}
