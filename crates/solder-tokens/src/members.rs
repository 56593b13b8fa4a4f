//! Member Registry
//!
//! Named static properties and methods that configuration can wire up as
//! tokens by `type` + `member` + parameter kinds. Resolution validates the
//! whole signature before handing back a [`DynamicValue`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, ResolutionError};
use crate::strategy::DynamicValue;

/// Parameter kinds a registered method can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Bool,
}

impl ValueKind {
    /// Convert a token argument to this kind.
    pub fn convert(self, raw: &str) -> Result<Value, BoxError> {
        Ok(match self {
            Self::String => Value::String(raw.to_string()),
            Self::Integer => Value::from(raw.trim().parse::<i64>()?),
            Self::Float => {
                let f = raw.trim().parse::<f64>()?;
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("'{raw}' is not a finite number"))?
            }
            Self::Bool => Value::Bool(raw.trim().parse::<bool>()?),
        })
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Internal,
}

type MemberFn = dyn Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync;

#[derive(Clone)]
enum MemberKind {
    Property,
    Method(Vec<ValueKind>),
}

impl MemberKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Method(_) => "method",
        }
    }
}

/// A registered property or method.
#[derive(Clone)]
pub struct Member {
    kind: MemberKind,
    visibility: Visibility,
    is_static: bool,
    func: Arc<MemberFn>,
}

impl Member {
    pub fn property<F>(func: F) -> Self
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            kind: MemberKind::Property,
            visibility: Visibility::Public,
            is_static: true,
            func: Arc::new(move |_: &[Value]| func()),
        }
    }

    pub fn method<F>(params: Vec<ValueKind>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            kind: MemberKind::Method(params),
            visibility: Visibility::Public,
            is_static: true,
            func: Arc::new(func),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Mark as an instance member; such members cannot be wired as tokens.
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    pub fn params(&self) -> &[ValueKind] {
        match &self.kind {
            MemberKind::Property => &[],
            MemberKind::Method(params) => params,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("kind", &self.kind.label())
            .field("params", &self.params())
            .field("visibility", &self.visibility)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// Registry of members grouped by type name.
#[derive(Debug, Clone, Default)]
pub struct MemberRegistry {
    types: BTreeMap<String, BTreeMap<String, Member>>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `DateTime` and `Environment` members.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(
            "DateTime",
            "Today",
            Member::property(|| Ok(Value::String(chrono::Utc::now().format("%Y-%m-%d").to_string()))),
        );
        registry.register(
            "DateTime",
            "UtcNow",
            Member::property(|| Ok(Value::String(chrono::Utc::now().to_rfc3339()))),
        );
        registry.register(
            "Environment",
            "CurrentDirectory",
            Member::property(|| {
                let dir = std::env::current_dir()?;
                Ok(Value::String(dir.to_string_lossy().into_owned()))
            }),
        );
        registry.register(
            "Environment",
            "MachineName",
            Member::property(|| {
                let name = std::env::var("HOSTNAME")
                    .or_else(|_| std::env::var("COMPUTERNAME"))
                    .unwrap_or_default();
                Ok(Value::String(name))
            }),
        );
        registry.register(
            "Environment",
            "GetEnvironmentVariable",
            Member::method(vec![ValueKind::String], |args| {
                let name = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(std::env::var(name).map(Value::String).unwrap_or(Value::Null))
            }),
        );

        registry
    }

    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        member_name: impl Into<String>,
        member: Member,
    ) {
        self.types
            .entry(type_name.into())
            .or_default()
            .insert(member_name.into(), member);
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Resolve a public static property as a token strategy.
    pub fn resolve_property(
        &self,
        type_name: &str,
        member_name: &str,
    ) -> Result<DynamicValue, ResolutionError> {
        let member = self.lookup(type_name, member_name)?;
        if !matches!(member.kind, MemberKind::Property) {
            return Err(kind_mismatch(type_name, member_name, "property", member));
        }

        let func = Arc::clone(&member.func);
        Ok(DynamicValue::named(
            format!("{type_name}.{member_name}"),
            move |_args| func(&[]),
        ))
    }

    /// Resolve a public static method whose parameters are exactly `params`.
    ///
    /// The returned strategy converts token arguments to the declared kinds
    /// before invoking the method.
    pub fn resolve_method(
        &self,
        type_name: &str,
        member_name: &str,
        params: &[ValueKind],
    ) -> Result<DynamicValue, ResolutionError> {
        let member = self.lookup(type_name, member_name)?;
        let declared = match &member.kind {
            MemberKind::Method(declared) => declared.clone(),
            MemberKind::Property => {
                return Err(kind_mismatch(type_name, member_name, "method", member));
            }
        };

        if declared.len() != params.len() {
            return Err(ResolutionError::ParameterCount {
                type_name: type_name.to_string(),
                member: member_name.to_string(),
                expected: declared.len(),
                actual: params.len(),
            });
        }
        if let Some((index, (expected, actual))) = declared
            .iter()
            .zip(params)
            .enumerate()
            .find(|(_, (expected, actual))| expected != actual)
        {
            return Err(ResolutionError::ParameterType {
                type_name: type_name.to_string(),
                member: member_name.to_string(),
                index,
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }

        let func = Arc::clone(&member.func);
        let label = format!("{type_name}.{member_name}");
        Ok(DynamicValue::named(label.clone(), move |args| {
            let args = args.unwrap_or_default();
            if args.len() != declared.len() {
                return Err(format!(
                    "{label} expects {} argument(s), got {}",
                    declared.len(),
                    args.len()
                )
                .into());
            }
            let converted = declared
                .iter()
                .zip(args)
                .map(|(kind, raw)| kind.convert(raw))
                .collect::<Result<Vec<_>, _>>()?;
            func(&converted)
        }))
    }

    fn lookup(&self, type_name: &str, member_name: &str) -> Result<&Member, ResolutionError> {
        let members = self
            .types
            .get(type_name)
            .ok_or_else(|| ResolutionError::UnknownType {
                type_name: type_name.to_string(),
            })?;
        let member = members
            .get(member_name)
            .ok_or_else(|| ResolutionError::UnknownMember {
                type_name: type_name.to_string(),
                member: member_name.to_string(),
            })?;

        if member.visibility != Visibility::Public {
            return Err(ResolutionError::NotPublic {
                type_name: type_name.to_string(),
                member: member_name.to_string(),
            });
        }
        if !member.is_static {
            return Err(ResolutionError::NotStatic {
                type_name: type_name.to_string(),
                member: member_name.to_string(),
            });
        }
        Ok(member)
    }
}

fn kind_mismatch(
    type_name: &str,
    member_name: &str,
    expected: &'static str,
    member: &Member,
) -> ResolutionError {
    ResolutionError::KindMismatch {
        type_name: type_name.to_string(),
        member: member_name.to_string(),
        expected,
        actual: member.kind.label(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::TokenReplacement;
    use serde_json::json;

    fn math() -> MemberRegistry {
        let mut registry = MemberRegistry::new();
        registry.register(
            "Math",
            "Max",
            Member::method(vec![ValueKind::Integer, ValueKind::Integer], |args| {
                let a = args[0].as_i64().unwrap_or_default();
                let b = args[1].as_i64().unwrap_or_default();
                Ok(json!(a.max(b)))
            }),
        );
        registry.register("Math", "Epsilon", Member::property(|| Ok(json!(0.001))));
        registry.register(
            "Math",
            "Secret",
            Member::property(|| Ok(json!(42))).with_visibility(Visibility::Internal),
        );
        registry.register("Math", "Abs", Member::property(|| Ok(json!(0))).instance());
        registry
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_method_and_invoke() {
        let max = math()
            .resolve_method("Math", "Max", &[ValueKind::Integer, ValueKind::Integer])
            .unwrap();
        assert_eq!(max.evaluate(Some(&args(&["3", "7"]))).unwrap(), json!(7));
    }

    #[test]
    fn test_method_call_argument_errors() {
        let max = math()
            .resolve_method("Math", "Max", &[ValueKind::Integer, ValueKind::Integer])
            .unwrap();
        assert!(max.evaluate(Some(&args(&["3"]))).is_err());
        assert!(max.evaluate(Some(&args(&["3", "seven"]))).is_err());
        assert!(max.evaluate(None).is_err());
    }

    #[test]
    fn test_resolve_property() {
        let epsilon = math().resolve_property("Math", "Epsilon").unwrap();
        assert_eq!(epsilon.evaluate(None).unwrap(), json!(0.001));
        assert_eq!(epsilon.name(), "Math.Epsilon");
    }

    #[test]
    fn test_resolution_errors() {
        let registry = math();

        assert!(matches!(
            registry.resolve_property("Trig", "Sin"),
            Err(ResolutionError::UnknownType { .. })
        ));
        assert!(matches!(
            registry.resolve_property("Math", "E"),
            Err(ResolutionError::UnknownMember { .. })
        ));
        assert!(matches!(
            registry.resolve_property("Math", "Secret"),
            Err(ResolutionError::NotPublic { .. })
        ));
        assert!(matches!(
            registry.resolve_property("Math", "Abs"),
            Err(ResolutionError::NotStatic { .. })
        ));
        assert!(matches!(
            registry.resolve_property("Math", "Max"),
            Err(ResolutionError::KindMismatch { expected: "property", .. })
        ));
        assert!(matches!(
            registry.resolve_method("Math", "Max", &[ValueKind::Integer]),
            Err(ResolutionError::ParameterCount { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            registry.resolve_method("Math", "Max", &[ValueKind::Integer, ValueKind::String]),
            Err(ResolutionError::ParameterType { index: 1, .. })
        ));
    }

    #[test]
    fn test_member_resolves_only_through_declaring_type() {
        let mut registry = math();
        registry.register("Text", "Empty", Member::property(|| Ok(json!(""))));

        assert!(registry.resolve_property("Text", "Empty").is_ok());
        assert_eq!(
            registry.resolve_property("Text", "Epsilon").unwrap_err(),
            ResolutionError::UnknownMember {
                type_name: "Text".into(),
                member: "Epsilon".into(),
            }
        );
        assert!(matches!(
            registry.resolve_property("Math", "Empty"),
            Err(ResolutionError::UnknownMember { .. })
        ));
    }

    #[test]
    fn test_parameter_type_error_message() {
        let err = math()
            .resolve_method("Math", "Max", &[ValueKind::Float, ValueKind::Integer])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "method 'Math.Max' parameter 0 is integer, float given"
        );
    }

    #[test]
    fn test_builtins() {
        let registry = MemberRegistry::with_builtins();
        let today = registry.resolve_property("DateTime", "Today").unwrap();
        let value = today.evaluate(None).unwrap();
        assert_eq!(value.as_str().map(str::len), Some(10));

        let getenv = registry
            .resolve_method("Environment", "GetEnvironmentVariable", &[ValueKind::String])
            .unwrap();
        let missing = getenv
            .evaluate(Some(&args(&["SOLDER_SURELY_UNSET_VARIABLE"])))
            .unwrap();
        assert_eq!(missing, Value::Null);
    }
}
