use crate::errors::*;
use crate::query::Operator;

/// Selector operator keyword for `operator`.
///
/// `NotEmpty` maps to `$gt` (compared against `null`) and `Empty` to
/// `$exists` (compared against `false`): documents may omit a field entirely,
/// and the backends only match missing fields through these two forms.
pub fn to_mango_operator(operator: Operator) -> &'static str {
    match operator {
        Operator::Equal => "$eq",
        Operator::NotEqual => "$ne",
        Operator::Contains => "$regex",
        Operator::LessThan => "$lt",
        Operator::LessThanOrEqual => "$lte",
        Operator::GreaterThan => "$gt",
        Operator::GreaterThanOrEqual => "$gte",
        Operator::Empty => "$exists",
        Operator::NotEmpty => "$gt",
        Operator::AnyOf => "$in",
        Operator::NoneOf => "$nin",
    }
}

pub fn operator_name_to_mango(name: &str) -> ApiResult<&'static str> {
    Ok(to_mango_operator(name.parse()?))
}

#[test]
fn test_every_operator_is_mapped() {
    for op in Operator::ALL.iter() {
        let symbol = to_mango_operator(*op);
        assert!(!symbol.is_empty(), "{} has no mapping", op);
        assert!(symbol.starts_with('$'));
    }
}

#[test]
fn test_empty_operators() {
    assert_eq!(to_mango_operator(Operator::Empty), "$exists");
    assert_eq!(to_mango_operator(Operator::NotEmpty), "$gt");
    assert_eq!(to_mango_operator(Operator::AnyOf), "$in");
    assert_eq!(to_mango_operator(Operator::NoneOf), "$nin");
}

#[test]
fn test_unknown_operator_name() {
    assert_eq!(operator_name_to_mango("NOT_EQUAL").unwrap(), "$ne");
    let err = operator_name_to_mango("BETWEEN").unwrap_err();
    assert_eq!(err.to_string(), "unsupported operator: BETWEEN");
}
