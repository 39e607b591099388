//! Conversions between JSON and GraphQL values.

use async_graphql::Value;

/// Converts a JSON value into a GraphQL value.
///
/// Falls back to `null` when the engine rejects the value.
#[must_use]
pub fn from_json(json: serde_json::Value) -> Value {
    Value::from_json(json).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "JSON value has no GraphQL form");
        Value::Null
    })
}

/// Reads a property of an object value.
#[must_use]
pub fn property<'v>(parent: &'v Value, name: &str) -> Option<&'v Value> {
    match parent {
        Value::Object(map) => map.get(name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(from_json(json!(null)), Value::Null);
        assert_eq!(from_json(json!(true)), Value::Boolean(true));
        assert_eq!(from_json(json!(-3)), Value::Number((-3i64).into()));
        assert_eq!(from_json(json!("x")), Value::String("x".into()));
    }

    #[test]
    fn test_from_json_nested() {
        let value = from_json(json!({"user": {"name": "ada", "tags": [1, 2]}}));
        let user = property(&value, "user").unwrap();
        assert_eq!(property(user, "name"), Some(&Value::String("ada".into())));
        assert_eq!(
            property(user, "tags"),
            Some(&Value::List(vec![
                Value::Number(1i64.into()),
                Value::Number(2i64.into())
            ]))
        );
    }

    #[test]
    fn test_property_of_non_object() {
        assert_eq!(property(&Value::Null, "x"), None);
    }
}
