use super::*;
use crate::types::parse_type;
use pretty_assertions::assert_eq;

const NUMBERS: &str = include_str!("../../tests/fixtures/numbers.toml");

fn registry() -> TypeRegistry {
    TypeRegistry::parse(NUMBERS).unwrap()
}

fn ty(text: &str) -> Type {
    parse_type(text).unwrap()
}

fn names(types: &[Type]) -> Vec<String> {
    types.iter().map(|t| t.to_string()).collect()
}

#[test]
fn test_builtins_present() {
    let reg = TypeRegistry::new();
    assert!(reg.lookup("Any").is_some());
    assert!(reg.lookup("Function").is_some_and(|d| d.is_abstract));
    assert!(reg.is_dispatchable(&ty("Nothing")));
    assert!(reg.is_sentinel(&ty("Missing")));
}

#[test]
fn test_declared_subtypes_in_declaration_order() {
    let reg = registry();
    assert_eq!(
        names(&reg.declared_subtypes(&ty("Real"))),
        vec![
            "AbstractFloat".to_string(),
            "Integer".to_string(),
            "Rational{T} where T<:Integer".to_string(),
        ]
    );
    assert!(reg.declared_subtypes(&ty("Int64")).is_empty());
}

#[test]
fn test_applied_children_inherit_arguments() {
    let reg = registry();
    assert_eq!(
        reg.declared_subtypes(&ty("AbstractVector{Float64}")),
        vec![ty("Vector{Float64}")]
    );
    assert!(reg.declared_subtypes(&ty("Complex{T} where T<:Real")).is_empty());
}

#[test]
fn test_nominal_subtyping() {
    let reg = registry();
    assert!(reg.is_subtype(&ty("Int64"), &ty("Integer")));
    assert!(reg.is_subtype(&ty("Int64"), &ty("Number")));
    assert!(reg.is_subtype(&ty("Int64"), &ty("Any")));
    assert!(!reg.is_subtype(&ty("Float64"), &ty("Integer")));
    assert!(!reg.is_subtype(&ty("Number"), &ty("Real")));
}

#[test]
fn test_applied_types_are_invariant() {
    let reg = registry();
    assert!(reg.is_subtype(&ty("Complex{Int64}"), &ty("Number")));
    assert!(!reg.is_subtype(&ty("Complex{Int64}"), &ty("Complex{Integer}")));
    assert!(reg.is_subtype(&ty("Vector{Int64}"), &ty("AbstractVector{Int64}")));
    assert!(!reg.is_subtype(&ty("Vector{Int64}"), &ty("AbstractVector{Integer}")));
}

#[test]
fn test_existential_subtyping() {
    let reg = registry();
    let complex_real = ty("Complex{T} where T<:Real");
    assert!(reg.is_subtype(&ty("Complex{Int64}"), &complex_real));
    assert!(reg.is_subtype(&ty("Complex{Real}"), &complex_real));
    assert!(!reg.is_subtype(&ty("Complex{String}"), &complex_real));
    assert!(reg.is_subtype(&ty("Complex{T} where T<:Integer"), &complex_real));
    assert!(!reg.is_subtype(&complex_real, &ty("Complex{T} where T<:Integer")));
    assert!(reg.is_subtype(&complex_real, &ty("Number")));
    assert!(reg.is_subtype(&ty("Vector{Int64}"), &ty("AbstractVector{T} where T")));
}

#[test]
fn test_union_subtyping() {
    let reg = registry();
    let int_or_nothing = ty("Union{Int64, Nothing}");
    assert!(reg.is_subtype(&ty("Int64"), &int_or_nothing));
    assert!(reg.is_subtype(&ty("Nothing"), &int_or_nothing));
    assert!(!reg.is_subtype(&int_or_nothing, &ty("Integer")));
    assert!(reg.is_subtype(&ty("Union{Int64, Int8}"), &ty("Signed")));
    assert!(reg.is_subtype(&ty("Union{}"), &ty("Int64")));
}

#[test]
fn test_markers_only_relate_reflexively() {
    let reg = registry();
    assert!(reg.is_subtype(&ty("Box"), &ty("Box")));
    assert!(reg.is_subtype(&ty("Box"), &ty("Any")));
    assert!(!reg.is_subtype(&ty("Vararg{Int64}"), &ty("Int64")));
}

#[test]
fn test_dispatchable() {
    let reg = registry();
    assert!(reg.is_dispatchable(&ty("Int64")));
    assert!(reg.is_dispatchable(&ty("Complex{Float64}")));
    assert!(reg.is_dispatchable(&ty("Vector{Real}")));
    assert!(!reg.is_dispatchable(&ty("Complex")));
    assert!(!reg.is_dispatchable(&ty("Real")));
    assert!(!reg.is_dispatchable(&ty("Complex{T} where T<:Real")));
    // A closed existential argument has no open variables
    assert!(reg.is_dispatchable(&ty("Vector{Complex{T} where T<:Real}")));
    assert!(!reg.is_dispatchable(&ty("Vector{T}")));
    assert!(!reg.is_dispatchable(&ty("Unknown")));
    assert!(!reg.is_dispatchable(&ty("Box")));
    assert!(!reg.is_dispatchable(&ty("Union{Int64, Nothing}")));
}

#[test]
fn test_instantiate() {
    let reg = registry();
    let complex = ty("Complex{T} where T<:Real");
    assert_eq!(
        reg.instantiate(&complex, &ty("Float64")).unwrap(),
        ty("Complex{Float64}")
    );
    assert!(matches!(
        reg.instantiate(&complex, &ty("String")),
        Err(InstantiateError::BoundViolation { .. })
    ));
    assert!(matches!(
        reg.instantiate(&ty("Int64"), &ty("Int64")),
        Err(InstantiateError::NotExistential(_))
    ));
    assert!(matches!(
        reg.instantiate(&complex, &ty("Vararg{Int64}")),
        Err(InstantiateError::Variadic(_))
    ));
}

#[test]
fn test_instantiate_checks_declared_bound() {
    let reg = registry();
    // Wider than the declared `T<:Real` of Complex
    let loose = ty("Complex{T} where T<:Number");
    assert!(matches!(
        reg.instantiate(&loose, &ty("Complex{Int64}")),
        Err(InstantiateError::DeclaredBoundViolation { .. })
    ));
    assert!(reg.instantiate(&loose, &ty("Int64")).is_ok());
}

#[test]
fn test_instantiate_nested_keeps_inner_variable() {
    let reg = TypeRegistry::parse(
        r#"
[[types]]
name = "Pair"
params = [{ name = "A" }, { name = "B", upper = "Nothing" }]
"#,
    )
    .unwrap();
    let pair = reg.lookup("Pair").unwrap().closed_type();
    assert_eq!(pair.to_string(), "Pair{A, B} where B<:Nothing where A");
    let partially = reg.instantiate(&pair, &ty("Missing")).unwrap();
    assert_eq!(partially.to_string(), "Pair{Missing, B} where B<:Nothing");
    assert_eq!(
        reg.instantiate(&partially, &ty("Nothing")).unwrap(),
        ty("Pair{Missing, Nothing}")
    );
}

#[test]
fn test_declaration_order_is_free() {
    let reg = TypeRegistry::parse(
        r#"
[[types]]
name = "Leaf"
supertype = "Middle"

[[types]]
name = "Middle"
abstract = true
"#,
    )
    .unwrap();
    assert!(reg.is_subtype(&ty("Leaf"), &ty("Middle")));
}

#[test]
fn test_registry_errors() {
    let duplicate = r#"
[[types]]
name = "A"
[[types]]
name = "A"
"#;
    assert!(matches!(
        TypeRegistry::parse(duplicate),
        Err(LatticeError::Duplicate(name)) if name == "A"
    ));

    let unknown = r#"
[[types]]
name = "A"
supertype = "Missing2"
"#;
    assert!(matches!(
        TypeRegistry::parse(unknown),
        Err(LatticeError::UnknownSupertype { .. })
    ));

    let cycle = r#"
[[types]]
name = "A"
abstract = true
supertype = "B"
[[types]]
name = "B"
abstract = true
supertype = "A"
"#;
    assert!(matches!(
        TypeRegistry::parse(cycle),
        Err(LatticeError::Cycle(_))
    ));

    let concrete_parent = r#"
[[types]]
name = "A"
[[types]]
name = "B"
supertype = "A"
"#;
    assert!(matches!(
        TypeRegistry::parse(concrete_parent),
        Err(LatticeError::ConcreteSupertype { .. })
    ));

    let bad_bound = r#"
[[types]]
name = "A"
params = [{ name = "T", upper = "Real{" }]
"#;
    assert!(matches!(
        TypeRegistry::parse(bad_bound),
        Err(LatticeError::Type(_))
    ));

    let open_bound = r#"
[[types]]
name = "A"
params = [{ name = "T", upper = "$1" }]
"#;
    assert!(matches!(
        TypeRegistry::parse(open_bound),
        Err(LatticeError::OpenBound { .. })
    ));
}

#[test]
fn test_custom_sentinels() {
    let reg = TypeRegistry::parse(
        r#"
sentinels = ["Nothing"]
"#,
    )
    .unwrap();
    assert!(reg.is_sentinel(&ty("Nothing")));
    assert!(!reg.is_sentinel(&ty("Missing")));
}
