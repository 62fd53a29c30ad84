use super::*;
use crate::engine::{MethodId, Outcome};
use crate::types::{parse_signature, Signature};
use pretty_assertions::assert_eq;

fn sig(parts: &[&str]) -> Signature {
    parse_signature(parts).unwrap()
}

fn result(scope: &str, name: &str, params: &[&str], line: u32, outcome: Outcome) -> MethodCheckResult {
    let file = if scope == "Demo" { "src/demo.jl" } else { "other.jl" };
    MethodCheckResult {
        method: MethodId::new(name, scope, sig(params)).at(file, line),
        outcome,
    }
}

fn sample() -> Vec<ScopeResults> {
    vec![
        ScopeResults {
            scope: "Demo".to_string(),
            results: vec![
                result(
                    "Demo",
                    "inc",
                    &["Integer"],
                    3,
                    Outcome::Stable {
                        steps: 10,
                        skipped: vec![],
                    },
                ),
                result(
                    "Demo",
                    "pair",
                    &["Real", "Int8"],
                    7,
                    Outcome::Unstable {
                        failing_instantiations: vec![
                            sig(&["Float16", "Int8"]),
                            sig(&["Float32", "Int8"]),
                        ],
                    },
                ),
                result(
                    "Demo",
                    "describe",
                    &["Any"],
                    12,
                    Outcome::GivesUpAnyParam { sig: sig(&["Any"]) },
                ),
                result(
                    "Demo",
                    "parse_num",
                    &["AbstractString"],
                    18,
                    Outcome::InferenceFailure {
                        instantiation: sig(&["String"]),
                        reason: "says \"no\"".to_string(),
                    },
                ),
            ],
        },
        ScopeResults {
            scope: "Other".to_string(),
            results: vec![result("Other", "big", &["Number"], 0, Outcome::FuelExhausted)],
        },
    ]
}

#[test]
fn test_csv_field_quoting() {
    assert_eq!(csv_field("plain"), "plain");
    assert_eq!(csv_field("a, b"), "\"a, b\"");
    assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    assert_eq!(csv_field(""), "");
}

#[test]
fn test_summarize_counts_every_kind() {
    let scopes = sample();
    let summary = scopes[0].summary();
    assert_eq!(
        summary,
        ScopeSummary {
            scope: "Demo".to_string(),
            total: 4,
            stable: 1,
            unstable: 1,
            any_param: 1,
            vararg: 0,
            inference_failure: 1,
            fuel_exhausted: 0,
        }
    );
    assert_eq!(summary.count(OutcomeKind::Unstable), 1);
    let total: usize = OutcomeKind::ALL.iter().map(|k| summary.count(*k)).sum();
    assert_eq!(total, summary.total);
}

#[test]
fn test_detailed_record_fields() {
    let scopes = sample();
    let record = DetailedRecord::from_result(&scopes[0].results[1]);
    assert_eq!(record.outcome_kind, OutcomeKind::Unstable);
    assert_eq!(record.extra, "(Float16, Int8); (Float32, Int8)");
    assert_eq!(record.signature_text, "pair(Real, Int8)");
    assert_eq!(record.scope_text, "Demo");
    assert_eq!(record.source_line, 7);
}

#[test]
fn test_detailed_csv() {
    let text = detailed_csv(&sample());
    insta::assert_snapshot!(text.trim_end(), @r###"
    outcome_kind,extra,signature_text,scope_text,source_file,source_line
    stable,steps=10,inc(Integer),Demo,src/demo.jl,3
    unstable,"(Float16, Int8); (Float32, Int8)","pair(Real, Int8)",Demo,src/demo.jl,7
    any_param,(Any),describe(Any),Demo,src/demo.jl,12
    inference_failure,"(String): says ""no""",parse_num(AbstractString),Demo,src/demo.jl,18
    fuel_exhausted,,big(Number),Other,other.jl,0
    "###);
}

#[test]
fn test_aggregate_csv() {
    let text = aggregate_csv(&sample());
    insta::assert_snapshot!(text.trim_end(), @r###"
    scope,total,stable,unstable,any_param,vararg,inference_failure,fuel_exhausted
    Demo,4,1,1,1,0,1,0
    Other,1,0,0,0,0,0,1
    "###);
}

#[test]
fn test_write_reports_creates_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("reports");
    let paths = write_reports(&out, "nightly", &sample()).unwrap();
    assert_eq!(paths.detailed, out.join("nightly-detailed.csv"));
    assert_eq!(paths.aggregate, out.join("nightly-aggregate.csv"));

    let detailed = std::fs::read_to_string(&paths.detailed).unwrap();
    assert_eq!(detailed.lines().count(), 6);
    assert!(detailed.starts_with("outcome_kind,extra,"));

    let aggregate = std::fs::read_to_string(&paths.aggregate).unwrap();
    assert_eq!(aggregate, aggregate_csv(&sample()));
}

#[test]
fn test_empty_batch_writes_headers_only() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_reports(dir.path(), "empty", &[]).unwrap();
    assert_eq!(
        std::fs::read_to_string(paths.aggregate).unwrap(),
        format!("{}\n", AGGREGATE_HEADER.join(","))
    );
}

#[test]
fn test_json_report() {
    let json = to_json(&sample()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let demo = &value["scopes"][0];
    assert_eq!(demo["summary"]["total"], 4);
    assert_eq!(demo["results"][0]["outcome"]["kind"], "stable");
    assert_eq!(demo["results"][0]["method"]["signature"], "(Integer)");
    assert_eq!(demo["results"][1]["outcome"]["failing_instantiations"][1], "(Float32, Int8)");
    assert_eq!(value["scopes"][1]["summary"]["fuel_exhausted"], 1);
}
