//! Config-file driven token wiring, end to end.

use pretty_assertions::assert_eq;
use std::sync::Arc;

use solder::tokens::{FailureReason, Member, MemberRegistry, ValueKind};
use solder::{
    AppSettings, ContextualStorage, SharedStorage, ThreadStorage, TokenConfig, WiringContext,
    WiringError,
};

const SETTINGS: &str = r#"
app:
  name: Solder
  env: staging
database:
  name: orders
  host: db.internal
"#;

const TOKENS: &str = r#"
strict: false
wildcard_settings: true
tokens:
  app: { kind: setting, key: app.name }
  tenant: { kind: context, key: tenant }
  greet: { kind: method, type: Text, member: Greet, params: [string, integer] }
"#;

fn members() -> MemberRegistry {
    let mut members = MemberRegistry::with_builtins();
    members.register(
        "Text",
        "Greet",
        Member::method(vec![ValueKind::String, ValueKind::Integer], |args| {
            let name = args[0].as_str().unwrap_or_default();
            let times = args[1].as_i64().unwrap_or(1).max(0) as usize;
            Ok(serde_json::Value::String(format!("hi {name}").repeat(times)))
        }),
    );
    members
}

#[test]
fn wires_from_files_and_expands() {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("settings.yaml");
    let tokens_path = dir.path().join("tokens.yaml");
    std::fs::write(&settings_path, SETTINGS).unwrap();
    std::fs::write(&tokens_path, TOKENS).unwrap();

    let settings = AppSettings::load(&settings_path).unwrap();
    let config = TokenConfig::load(&tokens_path).unwrap();

    let storage = Arc::new(SharedStorage::new());
    storage.set("tenant", serde_json::json!({ "id": 7, "name": "acme" }));
    let ctx = WiringContext::new(settings)
        .with_members(members())
        .with_storage(storage);
    let wired = config.build(&ctx).unwrap();

    let expansion = wired
        .expand(
            "${app}/${app.env}: ${tenant.name}#${tenant.id} @ ${database.host} ${greet(`bob`,`2`)} ${nope.x}",
        )
        .unwrap();

    // `app` is registered, so `${app.env}` walks into the string "Solder" and fails
    assert_eq!(
        expansion.output,
        "Solder/${app.env}: acme#7 @ db.internal hi bobhi bob ${nope.x}"
    );
    assert_eq!(expansion.unresolved, 2);
    assert_eq!(
        expansion.ordered_tokens(),
        vec!["app", "database", "greet", "nope", "tenant"]
    );
}

#[test]
fn strict_config_reports_the_offending_token() {
    let config = TokenConfig::from_yaml_str(
        "strict: true\ntokens:\n  greet: { kind: method, type: Text, member: Greet, params: [string, integer] }\n",
    )
    .unwrap();
    let ctx = WiringContext::new(AppSettings::new()).with_members(members());
    let wired = config.build(&ctx).unwrap();

    let err = wired.expand_tokens("${greet(`bob`,`lots`)}").unwrap_err();
    assert_eq!(err.matched(), Some("${greet(`bob`,`lots`)}"));
    assert!(matches!(
        err.reason(),
        Some(FailureReason::FunctionException(_))
    ));
}

#[test]
fn thread_storage_backs_context_tokens_per_thread() {
    let config =
        TokenConfig::from_yaml_str("strict: true\ntokens:\n  user: { kind: context, key: user }\n")
            .unwrap();
    let storage = Arc::new(ThreadStorage::new());
    let ctx = WiringContext::new(AppSettings::new()).with_storage(storage.clone());
    let wired = Arc::new(config.build(&ctx).unwrap());

    storage.set("user", serde_json::json!("main-thread"));
    assert_eq!(wired.expand_tokens("${user}").unwrap(), "main-thread");

    let worker = Arc::clone(&wired);
    let result = std::thread::spawn(move || {
        ThreadStorage::new().set("user", serde_json::json!("worker"));
        worker.expand_tokens("${user}").map_err(|e| e.to_string())
    })
    .join()
    .unwrap();
    assert_eq!(result.unwrap(), "worker");

    storage.clear();
    assert!(wired.expand_tokens("${user}").is_err());
}

#[test]
fn missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TokenConfig::load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, WiringError::Io { .. }));
}
