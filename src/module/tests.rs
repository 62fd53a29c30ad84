use super::*;
use crate::engine::{CancelToken, MethodCheckResult, Outcome, OutcomeKind};
use crate::inference::{FnOracle, InferenceError, InferenceOracle};
use crate::lattice::TypeRegistry;
use crate::types::{Signature, Type};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const NUMBERS: &str = include_str!("../../tests/fixtures/numbers.toml");
const DEMO: &str = include_str!("../../tests/fixtures/modules/demo.toml");

fn registry() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::parse(NUMBERS).unwrap())
}

fn demo() -> ScannedModule {
    ModuleFile::parse(DEMO).unwrap().resolve().unwrap()
}

fn rule_table(lattice: Arc<TypeRegistry>, module: &ScannedModule) -> RuleTable {
    let mut table = RuleTable::new(lattice);
    module.install_rules(&mut table);
    table
}

fn kinds(results: &[MethodCheckResult]) -> Vec<(String, OutcomeKind)> {
    results
        .iter()
        .map(|r| (r.method.name.clone(), r.outcome.kind()))
        .collect()
}

#[test]
fn test_resolve_demo_module() {
    let module = demo();
    assert_eq!(module.scope, "Demo");
    let names: Vec<_> = module.methods.iter().map(|m| m.id.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["inc", "bump", "describe", "total", "parse_num", "deref"]
    );
    assert_eq!(module.rule_count(), 6);

    let inc = &module.methods[0];
    assert!(inc.exported);
    assert_eq!(inc.id.file, "src/demo.jl");
    assert_eq!(inc.id.line, 3);
    assert_eq!(inc.id.signature.to_string(), "(Integer)");
}

#[test]
fn test_generic_signatures_are_set_aside() {
    let module = demo();
    assert_eq!(module.generic.len(), 1);
    assert_eq!(module.generic[0].id.name, "first_of");
    assert!(!module.generic[0].exported);
    assert_eq!(module.generic[0].id.signature.to_string(), "(AbstractVector{T})");
}

#[test]
fn test_set_aside_follows_scan_selection() {
    let module = demo();
    let listed = set_aside(&module, &SearchConfig::default(), None);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "first_of");

    let exported_only = SearchConfig {
        exported_only: true,
        ..SearchConfig::default()
    };
    assert!(set_aside(&module, &exported_only, None).is_empty());

    let filter = Regex::new("^inc$").unwrap();
    assert!(set_aside(&module, &SearchConfig::default(), Some(&filter)).is_empty());
}

#[test]
fn test_overload_lines_and_file_override() {
    let module = ModuleFile::parse(
        r#"
scope = "M"
file = "m.jl"

[[functions]]
name = "f"
line = 10
file = "other.jl"
signatures = [["Int64"], ["Float64"]]
"#,
    )
    .unwrap()
    .resolve()
    .unwrap();
    let lines: Vec<_> = module.methods.iter().map(|m| m.id.line).collect();
    assert_eq!(lines, vec![10, 11]);
    assert!(module.methods.iter().all(|m| m.id.file == "other.jl"));
}

#[test]
fn test_duplicate_callable_rejected() {
    let err = ModuleFile::parse(
        r#"
scope = "M"
[[functions]]
name = "f"
[[functions]]
name = "f"
"#,
    )
    .unwrap()
    .resolve()
    .unwrap_err();
    assert!(matches!(err, ModuleError::DuplicateCallable { ref name, .. } if name == "f"));
}

#[test]
fn test_bad_rules_rejected() {
    let cases = [
        r#"rules = [{ args = ["Int64"] }]"#,
        r#"rules = [{ args = ["Int64"], result = "Int64", fails = true }]"#,
        r#"rules = [{ args = ["Int64"], result = "$2" }]"#,
    ];
    for rules in cases {
        let text = format!("scope = \"M\"\n[[functions]]\nname = \"f\"\n{}\n", rules);
        let err = ModuleFile::parse(&text).unwrap().resolve().unwrap_err();
        assert!(matches!(err, ModuleError::BadRule { .. }), "{}", rules);
    }
}

#[test]
fn test_type_errors_name_the_callable() {
    let err = ModuleFile::parse(
        r#"
scope = "M"
[[functions]]
name = "f"
signatures = [["Complex{"]]
"#,
    )
    .unwrap()
    .resolve()
    .unwrap_err();
    assert!(matches!(err, ModuleError::Type { ref callable, .. } if callable == "M.f"));
}

#[test]
fn test_parse_error() {
    let err = ModuleFile::parse("functions = 3").unwrap_err();
    assert!(matches!(err, ModuleError::Parse { .. }));
}

#[test]
fn test_rule_table_from_module() {
    let lattice = registry();
    let module = demo();
    let table = rule_table(lattice, &module);
    let inc = &module.methods[0].id;

    let bool_sig = Signature::new(vec![Type::named("Bool")]);
    assert_eq!(table.infer(inc, &bool_sig).unwrap(), Type::named("Int64"));

    let int8 = Signature::new(vec![Type::named("Int8")]);
    assert_eq!(table.infer(inc, &int8).unwrap(), Type::named("Int8"));

    let parse_num = &module.methods[4].id;
    let string = Signature::new(vec![Type::named("String")]);
    assert_eq!(
        table.infer(parse_num, &string),
        Err(InferenceError::Failed(
            "result depends on the input text".to_string()
        ))
    );
}

#[test]
fn test_scan_respects_exported_only_and_filter() {
    let module = demo();
    let all = scan(&module, &SearchConfig::default(), None);
    assert_eq!(all.len(), 6);

    let config = SearchConfig {
        exported_only: true,
        ..SearchConfig::default()
    };
    let exported = scan(&module, &config, None);
    let names: Vec<_> = exported.iter().map(|(m, _)| m.name.as_str()).collect();
    assert_eq!(names, vec!["inc", "bump", "total", "deref"]);

    let filter = Regex::new("^(inc|parse_)").unwrap();
    let filtered = scan(&module, &SearchConfig::default(), Some(&filter));
    let names: Vec<_> = filtered.iter().map(|(m, _)| m.name.as_str()).collect();
    assert_eq!(names, vec!["inc", "parse_num"]);
}

#[test]
fn test_pending_checks_drain() {
    let module = demo();
    let mut pending = scan(&module, &SearchConfig::default(), None);
    let mut more = PendingChecks::new();
    more.register(module.methods[0].id.clone(), module.methods[0].id.signature.clone());
    pending.append(&mut more);
    assert!(more.is_empty());
    assert_eq!(pending.len(), 7);
    assert_eq!(pending.drain().count(), 7);
    assert!(pending.is_empty());
}

#[test]
fn test_batch_outcomes_in_registration_order() {
    let lattice = registry();
    let module = demo();
    let table = rule_table(lattice.clone(), &module);
    let pending = scan(&module, &SearchConfig::default(), None);

    for jobs in [1, 4] {
        let results = BatchChecker::new(lattice.as_ref(), &table, SearchConfig::default())
            .jobs(jobs)
            .check(pending.clone());
        assert_eq!(
            kinds(&results),
            vec![
                ("inc".to_string(), OutcomeKind::Stable),
                ("bump".to_string(), OutcomeKind::Unstable),
                ("describe".to_string(), OutcomeKind::AnyParam),
                ("total".to_string(), OutcomeKind::Vararg),
                ("parse_num".to_string(), OutcomeKind::InferenceFailure),
                ("deref".to_string(), OutcomeKind::Stable),
            ],
            "jobs = {}",
            jobs
        );
    }
}

#[test]
fn test_cancelled_batch_starts_nothing() {
    let lattice = registry();
    let module = demo();
    let table = rule_table(lattice.clone(), &module);
    let token = CancelToken::new();
    token.cancel();
    let results = BatchChecker::new(lattice.as_ref(), &table, SearchConfig::default())
        .with_cancel(token)
        .check(scan(&module, &SearchConfig::default(), None));
    assert!(results.is_empty());
}

#[test]
fn test_panicking_oracle_does_not_abort_batch() {
    let lattice = registry();
    let oracle = FnOracle(|m: &MethodId, s: &Signature| {
        if m.name == "boom" {
            panic!("oracle crashed");
        }
        Ok::<_, InferenceError>(s[0].clone())
    });
    let mut pending = PendingChecks::new();
    for name in ["boom", "fine"] {
        let id = MethodId::new(name, "M", Signature::new(vec![Type::named("Int64")]));
        pending.register(id.clone(), id.signature.clone());
    }
    let results = BatchChecker::new(lattice.as_ref(), &oracle, SearchConfig::default())
        .jobs(2)
        .check(pending);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].outcome.kind(), OutcomeKind::InferenceFailure);
    assert_eq!(
        results[1].outcome,
        Outcome::Stable {
            steps: 1,
            skipped: vec![]
        }
    );
}

#[test]
fn test_discover_finds_module_files() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).unwrap();
    std::fs::write(dir.path().join("b.toml"), DEMO).unwrap();
    std::fs::write(nested.join("a.toml"), DEMO).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let found = discover(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(found, vec![dir.path().join("b.toml"), nested.join("a.toml")]);
}

#[test]
fn test_load_missing_file() {
    let err = ModuleFile::load(Path::new("/nonexistent/module.toml")).unwrap_err();
    assert!(matches!(err, ModuleError::Io { .. }));
}
