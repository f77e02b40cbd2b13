//! Bridge manifest parsing
//!
//! The manifest is the tool's description of a hosted class's public
//! method table: names, arities, optional explicit signatures, and
//! optional annotation metadata. Method order in the manifest is emission
//! order.

use crate::binding::RuntimeBinding;
use crate::error::{EmitError, EmitResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level manifest document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeManifest {
    /// Hosted source file the generated class requires at class
    /// initialization, before any instance can be constructed.
    pub init: Option<String>,

    /// Overrides for the default runtime binding class names.
    pub runtime: Option<RuntimeOverrides>,

    /// The exposed methods, in emission order.
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
}

/// `[runtime]` section: deployment-specific class names.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeOverrides {
    pub runtime_class: Option<String>,
    pub object_class: Option<String>,
    pub base_class: Option<String>,
    pub class_class: Option<String>,
    pub context_class: Option<String>,
    pub marshal_class: Option<String>,
    pub load_service_class: Option<String>,
}

impl RuntimeOverrides {
    /// Apply the overrides onto a binding, normalizing dotted names.
    pub fn apply(&self, binding: &mut RuntimeBinding) {
        let fields = [
            (&self.runtime_class, &mut binding.runtime_class),
            (&self.object_class, &mut binding.object_class),
            (&self.base_class, &mut binding.base_class),
            (&self.class_class, &mut binding.class_class),
            (&self.context_class, &mut binding.context_class),
            (&self.marshal_class, &mut binding.marshal_class),
            (&self.load_service_class, &mut binding.load_service_class),
        ];
        for (override_name, slot) in fields {
            if let Some(name) = override_name {
                *slot = name.replace('.', "/");
            }
        }
    }
}

/// One `[[methods]]` entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodEntry {
    /// Hosted method name; also the dispatch name in the generated call.
    pub name: String,

    /// Declared arity; negative means variadic.
    pub arity: i32,

    /// JVM member name, when the hosted name is not a valid one.
    pub java_name: Option<String>,

    /// Explicit parameter type keywords; requires `returns`.
    pub params: Option<Vec<String>>,

    /// Explicit return type keyword; requires `params`.
    pub returns: Option<String>,

    /// Annotations to attach to the bridge method.
    #[serde(default)]
    pub annotations: Vec<AnnotationSpec>,
}

/// One `[[methods.annotations]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnotationSpec {
    /// Annotation class, dotted binary name.
    pub class: String,

    /// Named attribute values; BTreeMap keeps emission deterministic.
    #[serde(default)]
    pub values: BTreeMap<String, AnnotationValue>,
}

/// The closed set of annotation attribute value kinds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i32),
    Str(String),
}

/// A validated method, ready for emission.
#[derive(Debug)]
pub struct MethodSpec {
    pub name: String,
    pub java_name: Option<String>,
    pub arity: i32,
    pub signature: Option<SignatureSpec>,
    pub annotations: Vec<AnnotationSpec>,
}

/// An explicit signature as type keywords.
#[derive(Debug)]
pub struct SignatureSpec {
    pub params: Vec<String>,
    pub returns: String,
}

/// Everything `emit_class` needs for one generated class.
#[derive(Debug)]
pub struct ClassSpec {
    /// Simple name of the generated class.
    pub native_name: String,
    /// Package of the generated class.
    pub package: Option<String>,
    /// Hosted class path, resolved through the runtime at construction.
    pub host_class: String,
    /// Hosted source file required at class initialization.
    pub init_file: Option<String>,
    /// SourceFile attribute value for the generated class.
    pub source_file: Option<String>,
    /// Methods in emission order.
    pub methods: Vec<MethodSpec>,
}

impl BridgeManifest {
    /// Parse a manifest from TOML text.
    pub fn from_str(text: &str) -> EmitResult<Self> {
        toml::from_str(text).map_err(|err| EmitError::Manifest {
            message: err.message().to_string(),
        })
    }

    /// Read and parse a manifest file.
    pub fn from_path(path: &Path) -> EmitResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| EmitError::Manifest {
            message: format!("{}: {}", path.display(), err),
        })?;
        Self::from_str(&text)
    }

    /// The runtime binding this manifest selects.
    pub fn binding(&self) -> RuntimeBinding {
        let mut binding = RuntimeBinding::default();
        if let Some(overrides) = &self.runtime {
            overrides.apply(&mut binding);
        }
        binding
    }

    /// Validate and assemble the spec for one generated class.
    pub fn class_spec(
        &self,
        native_name: &str,
        host_class: &str,
        package: Option<&str>,
        source_file: Option<&str>,
    ) -> EmitResult<ClassSpec> {
        let mut methods = Vec::with_capacity(self.methods.len());
        for entry in &self.methods {
            let signature = match (&entry.params, &entry.returns) {
                (Some(params), Some(returns)) => Some(SignatureSpec {
                    params: params.clone(),
                    returns: returns.clone(),
                }),
                (None, None) => None,
                _ => {
                    return Err(EmitError::Manifest {
                        message: format!(
                            "method {}: params and returns must be given together",
                            entry.name
                        ),
                    })
                }
            };
            methods.push(MethodSpec {
                name: entry.name.clone(),
                java_name: entry.java_name.clone(),
                arity: entry.arity,
                signature,
                annotations: entry.annotations.clone(),
            });
        }
        Ok(ClassSpec {
            native_name: native_name.to_string(),
            package: package.map(str::to_string),
            host_class: host_class.to_string(),
            init_file: self.init.clone(),
            source_file: source_file.map(str::to_string),
            methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
init = "geo/point.tsl"

[[methods]]
name = "distance"
arity = 1
params = ["object"]
returns = "double"

[[methods]]
name = "scale!"
arity = 2
java_name = "scale"

[[methods]]
name = "describe"
arity = 0

[[methods.annotations]]
class = "org.example.Export"

[methods.annotations.values]
name = "describe"
priority = 3
enabled = true
"#;

    #[test]
    fn test_parse_sample() {
        let manifest = BridgeManifest::from_str(SAMPLE).unwrap();
        assert_eq!(manifest.init.as_deref(), Some("geo/point.tsl"));
        assert_eq!(manifest.methods.len(), 3);
        assert_eq!(manifest.methods[0].name, "distance");
        assert_eq!(manifest.methods[1].java_name.as_deref(), Some("scale"));

        let annotations = &manifest.methods[2].annotations;
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].class, "org.example.Export");
        assert_eq!(
            annotations[0].values.get("priority"),
            Some(&AnnotationValue::Int(3))
        );
        assert_eq!(
            annotations[0].values.get("enabled"),
            Some(&AnnotationValue::Bool(true))
        );
    }

    #[test]
    fn test_method_order_is_preserved() {
        let manifest = BridgeManifest::from_str(SAMPLE).unwrap();
        let spec = manifest.class_spec("PointBridge", "Geo::Point", None, None).unwrap();
        let names: Vec<_> = spec.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["distance", "scale!", "describe"]);
    }

    #[test]
    fn test_params_without_returns_rejected() {
        let text = r#"
[[methods]]
name = "half"
arity = 1
params = ["int"]
"#;
        let manifest = BridgeManifest::from_str(text).unwrap();
        let err = manifest.class_spec("X", "Y", None, None).unwrap_err();
        assert!(matches!(err, EmitError::Manifest { .. }));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(BridgeManifest::from_str("unknown_key = 1").is_err());
    }

    #[test]
    fn test_runtime_overrides_normalize_names() {
        let text = r#"
[runtime]
marshal_class = "com.acme.host.Conversions"
"#;
        let manifest = BridgeManifest::from_str(text).unwrap();
        let binding = manifest.binding();
        assert_eq!(binding.marshal_class, "com/acme/host/Conversions");
        // Untouched fields keep their defaults.
        assert_eq!(binding.object_class, "org/trestle/runtime/HostObject");
    }
}
