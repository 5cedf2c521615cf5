use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core::{AppError, AppResult};

/// Boolean predicate over an appeal evaluation context.
///
/// Field paths are dot separated and may carry a leading `$`, for example
/// `$appeal.resource.details.owner`. A path that does not resolve compares
/// unequal and never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expression {
    /// Constant result.
    Literal {
        /// Constant value.
        value: bool,
    },
    /// True when the field equals the value.
    Eq {
        /// Field path.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// True when the field is absent or differs from the value.
    NotEq {
        /// Field path.
        field: String,
        /// Compared value.
        value: Value,
    },
    /// True when the field resolves to a non-null value.
    Exists {
        /// Field path.
        field: String,
    },
    /// True when the field equals one of the values.
    In {
        /// Field path.
        field: String,
        /// Accepted values.
        values: Vec<Value>,
    },
    /// True when every nested expression is true.
    And {
        /// Nested expressions.
        all: Vec<Expression>,
    },
    /// True when any nested expression is true.
    Or {
        /// Nested expressions.
        any: Vec<Expression>,
    },
    /// Negation.
    Not {
        /// Negated expression.
        expr: Box<Expression>,
    },
}

impl Expression {
    /// Checks every field path in the expression tree.
    pub fn validate(&self) -> AppResult<()> {
        match self {
            Self::Literal { .. } => Ok(()),
            Self::Eq { field, .. }
            | Self::NotEq { field, .. }
            | Self::Exists { field }
            | Self::In { field, .. } => field_segments(field).map(|_| ()),
            Self::And { all: expressions } | Self::Or { any: expressions } => {
                if expressions.is_empty() {
                    return Err(AppError::Configuration(
                        "and/or expressions require at least one operand".to_owned(),
                    ));
                }

                expressions.iter().try_for_each(Self::validate)
            }
            Self::Not { expr } => expr.validate(),
        }
    }

    /// Evaluates the expression against a JSON context.
    pub fn evaluate(&self, context: &Value) -> AppResult<bool> {
        match self {
            Self::Literal { value } => Ok(*value),
            Self::Eq { field, value } => {
                Ok(value_at_path(context, field)?.is_some_and(|actual| actual == value))
            }
            Self::NotEq { field, value } => {
                Ok(value_at_path(context, field)?.is_none_or(|actual| actual != value))
            }
            Self::Exists { field } => {
                Ok(value_at_path(context, field)?.is_some_and(|actual| !actual.is_null()))
            }
            Self::In { field, values } => Ok(value_at_path(context, field)?
                .is_some_and(|actual| values.iter().any(|candidate| candidate == actual))),
            Self::And { all } => {
                for expression in all {
                    if !expression.evaluate(context)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or { any } => {
                for expression in any {
                    if expression.evaluate(context)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not { expr } => Ok(!expr.evaluate(context)?),
        }
    }
}

/// Resolves a dot-separated field path inside a JSON value.
///
/// Returns a configuration error for malformed paths and `None` for paths
/// that do not resolve.
pub fn value_at_path<'a>(context: &'a Value, field_path: &str) -> AppResult<Option<&'a Value>> {
    let mut current_value = context;
    for segment in field_segments(field_path)? {
        let next = match current_value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        };

        match next {
            Some(value) => current_value = value,
            None => return Ok(None),
        }
    }

    Ok(Some(current_value))
}

fn field_segments(field_path: &str) -> AppResult<Vec<&str>> {
    let trimmed = field_path.trim();
    let path = trimmed.strip_prefix('$').unwrap_or(trimmed);
    if path.is_empty() {
        return Err(AppError::Configuration(
            "expression field path must not be empty".to_owned(),
        ));
    }

    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(AppError::Configuration(format!(
            "malformed expression field path '{field_path}'"
        )));
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Expression, value_at_path};

    fn context() -> serde_json::Value {
        json!({
            "appeal": {
                "role": "viewer",
                "account_type": "user",
                "resource": {"details": {"owner": "owner@example.com", "tier": 2}}
            },
            "resource": {"type": "dataset", "labels": ["pii"]}
        })
    }

    #[test]
    fn equality_reads_nested_fields() {
        let expression = Expression::Eq {
            field: "$appeal.resource.details.tier".to_owned(),
            value: json!(2),
        };
        assert!(matches!(expression.evaluate(&context()), Ok(true)));
    }

    #[test]
    fn missing_fields_compare_unequal() {
        let eq = Expression::Eq {
            field: "appeal.details.missing".to_owned(),
            value: json!("x"),
        };
        let not_eq = Expression::NotEq {
            field: "appeal.details.missing".to_owned(),
            value: json!("x"),
        };
        let exists = Expression::Exists {
            field: "appeal.details.missing".to_owned(),
        };

        assert!(matches!(eq.evaluate(&context()), Ok(false)));
        assert!(matches!(not_eq.evaluate(&context()), Ok(true)));
        assert!(matches!(exists.evaluate(&context()), Ok(false)));
    }

    #[test]
    fn boolean_combinators_short_circuit() {
        let expression = Expression::And {
            all: vec![
                Expression::In {
                    field: "appeal.role".to_owned(),
                    values: vec![json!("viewer"), json!("editor")],
                },
                Expression::Or {
                    any: vec![
                        Expression::Literal { value: false },
                        Expression::Not {
                            expr: Box::new(Expression::Eq {
                                field: "appeal.account_type".to_owned(),
                                value: json!("service_account"),
                            }),
                        },
                    ],
                },
            ],
        };

        assert!(matches!(expression.evaluate(&context()), Ok(true)));
    }

    #[test]
    fn malformed_paths_are_configuration_errors() {
        let expression = Expression::Exists {
            field: "appeal..role".to_owned(),
        };
        assert!(expression.validate().is_err());
        assert!(expression.evaluate(&context()).is_err());
        assert!(Expression::And { all: Vec::new() }.validate().is_err());
    }

    #[test]
    fn array_segments_index_into_lists() {
        let context = context();
        let value = value_at_path(&context, "resource.labels.0");
        assert!(matches!(value, Ok(Some(found)) if found == "pii"));
    }

    #[test]
    fn expressions_deserialize_from_tagged_json() {
        let parsed: Result<Expression, _> = serde_json::from_value(json!({
            "op": "and",
            "all": [
                {"op": "eq", "field": "$appeal.role", "value": "viewer"},
                {"op": "not", "expr": {"op": "literal", "value": false}}
            ]
        }));
        assert!(parsed.is_ok());
        let parsed = parsed.unwrap_or_else(|_| unreachable!());
        assert!(matches!(parsed.evaluate(&context()), Ok(true)));
    }
}
