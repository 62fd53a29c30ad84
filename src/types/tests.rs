use super::*;
use pretty_assertions::assert_eq;

fn ty(text: &str) -> Type {
    parse_type(text).unwrap_or_else(|e| panic!("{}", e))
}

#[test]
fn test_parse_simple_names() {
    assert_eq!(ty("Int64"), Type::named("Int64"));
    assert_eq!(ty("Any"), Type::Any);
    assert_eq!(ty("Box"), Type::Boxed);
}

#[test]
fn test_parse_applied_type() {
    assert_eq!(
        ty("Complex{Float64}"),
        Type::applied("Complex", vec![Type::named("Float64")])
    );
    assert_eq!(
        ty("Pair{Int64, Vector{Bool}}"),
        Type::applied(
            "Pair",
            vec![
                Type::named("Int64"),
                Type::applied("Vector", vec![Type::named("Bool")])
            ]
        )
    );
}

#[test]
fn test_parse_union_flattens_and_dedups() {
    assert_eq!(
        ty("Union{Int64, Union{Nothing, Int64}}"),
        Type::Union(vec![Type::named("Int64"), Type::named("Nothing")])
    );
    assert_eq!(ty("Union{Int64}"), Type::named("Int64"));
    assert_eq!(ty("Union{}"), Type::Union(vec![]));
}

#[test]
fn test_parse_vararg() {
    assert_eq!(ty("Vararg{Int64}"), Type::vararg(Type::named("Int64")));
    assert_eq!(ty("Vararg"), Type::vararg(Type::Any));
}

#[test]
fn test_parse_where_binds_variable() {
    let parsed = ty("Complex{T} where T<:Real");
    assert_eq!(
        parsed,
        Type::exists(
            TypeVar::new("T", Type::named("Real")),
            Type::applied("Complex", vec![Type::Var("T".to_string())])
        )
    );
    assert!(parsed.is_existential());
    assert!(!parsed.is_unbounded_existential());
}

#[test]
fn test_parse_unbounded_where() {
    let parsed = ty("Ref{T} where T");
    assert!(parsed.is_unbounded_existential());
    assert_eq!(parsed.to_string(), "Ref{T} where T");
}

#[test]
fn test_nested_where_outermost_is_last() {
    let parsed = ty("Pair{A, B} where B<:Integer where A<:Real");
    let (vars, core) = parsed.peel_existentials();
    let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert_eq!(
        *core,
        Type::applied(
            "Pair",
            vec![Type::Var("A".to_string()), Type::Var("B".to_string())]
        )
    );
}

#[test]
fn test_display_round_trips() {
    for text in [
        "Int64",
        "Complex{Float64}",
        "Union{Int64, Nothing}",
        "Vararg{Int64}",
        "Complex{T} where T<:Real",
        "Pair{A, B} where B<:Integer where A<:Real",
        "Vector{Complex{T} where T<:Real}",
        "Ref{T} where T<:(Complex{S} where S<:Real)",
        "Box",
        "Any",
    ] {
        let parsed = ty(text);
        assert_eq!(parsed.to_string(), text);
        assert_eq!(ty(&parsed.to_string()), parsed);
    }
}

#[test]
fn test_placeholders() {
    let parsed = ty("Union{$1, Nothing}");
    assert_eq!(
        parsed,
        Type::Union(vec![Type::Var("$1".to_string()), Type::named("Nothing")])
    );
    assert_eq!(Type::Var("$2".to_string()).placeholder_index(), Some(2));
    assert_eq!(Type::Var("T".to_string()).placeholder_index(), None);
}

#[test]
fn test_substitute_respects_shadowing() {
    let inner = ty("Ref{T} where T");
    let outer = Type::applied("Pair", vec![Type::Var("T".to_string()), inner.clone()]);
    let result = outer.substitute("T", &Type::named("Int64"));
    assert_eq!(
        result,
        Type::applied("Pair", vec![Type::named("Int64"), inner])
    );
}

#[test]
fn test_substitute_flattens_unions() {
    let template = ty("Union{$1, Nothing}");
    let result = template.substitute("$1", &ty("Union{Int64, Missing}"));
    assert_eq!(result, ty("Union{Int64, Missing, Nothing}"));
}

#[test]
fn test_free_vars() {
    assert!(ty("Complex{T} where T<:Real").is_closed());
    let open = Type::applied("Complex", vec![Type::Var("T".to_string())]);
    assert_eq!(
        open.free_vars().into_iter().collect::<Vec<_>>(),
        vec!["T".to_string()]
    );
}

#[test]
fn test_head_looks_through_where() {
    assert_eq!(ty("Complex{T} where T<:Real").head(), Some("Complex"));
    assert_eq!(ty("Union{Int64, Nothing}").head(), None);
}

#[test]
fn test_parse_errors_report_offset() {
    let err = parse_type("Complex{Float64").unwrap_err();
    assert!(err.message.contains("unclosed"));

    let err = parse_type("Int64 Float64").unwrap_err();
    assert_eq!(err.offset, 6);

    let err = parse_type("Int64 + 1").unwrap_err();
    assert!(err.message.contains("unexpected character"));

    assert!(parse_type("Any{Int64}").is_err());
    assert!(parse_type("Union").is_err());
    assert!(parse_type("T where").is_err());
}

#[test]
fn test_signature_display_and_replace() {
    let sig = parse_signature(&["Integer", "Float64"]).unwrap();
    assert_eq!(sig.to_string(), "(Integer, Float64)");
    let replaced = sig.with_position(0, Type::named("Int64"));
    assert_eq!(replaced.to_string(), "(Int64, Float64)");
    assert_eq!(sig.len(), 2);
}

#[test]
fn test_type_serializes_as_text() {
    let json = serde_json::to_string(&ty("Complex{T} where T<:Real")).unwrap();
    assert_eq!(json, "\"Complex{T} where T<:Real\"");
}

#[test]
fn test_generic_signature_has_free_vars() {
    let sig = parse_generic_signature(&["T", "Vector{T}", "Int64"], &["T"]).unwrap();
    assert_eq!(sig[0], Type::Var("T".to_string()));
    assert_eq!(sig.free_vars().into_iter().collect::<Vec<_>>(), vec!["T".to_string()]);
    assert_eq!(sig.to_string(), "(T, Vector{T}, Int64)");

    let plain = parse_generic_signature::<_, &str>(&["Int64"], &[]).unwrap();
    assert!(plain.free_vars().is_empty());
}
