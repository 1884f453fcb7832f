//! Write-side value for JSON columns that keeps "absent", JSON `null` and SQL
//! `NULL` apart.

use sea_orm::prelude::Json;
use sea_orm::ActiveValue::{self, NotSet, Set};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NullableJson {
    /// Leave the column untouched (or at its default on insert)
    #[default]
    Absent,
    /// Store the JSON literal `null`
    JsonNull,
    /// Store SQL `NULL`
    DbNull,
    Value(Json),
}

impl NullableJson {
    /// Active value for a nullable JSON column
    pub fn into_nullable(self) -> ActiveValue<Option<Json>> {
        match self {
            NullableJson::Absent => NotSet,
            NullableJson::JsonNull => Set(Some(Json::Null)),
            NullableJson::DbNull => Set(None),
            NullableJson::Value(value) => Set(Some(value)),
        }
    }

    /// Active value for a NOT NULL JSON column; `DbNull` has no representation
    /// there and yields `None`.
    pub fn into_required(self) -> Option<ActiveValue<Json>> {
        match self {
            NullableJson::Absent => Some(NotSet),
            NullableJson::JsonNull => Some(Set(Json::Null)),
            NullableJson::DbNull => None,
            NullableJson::Value(value) => Some(Set(value)),
        }
    }
}

impl From<Json> for NullableJson {
    fn from(value: Json) -> Self {
        match value {
            Json::Null => NullableJson::JsonNull,
            other => NullableJson::Value(other),
        }
    }
}

impl From<Option<Json>> for NullableJson {
    fn from(value: Option<Json>) -> Self {
        match value {
            Some(json) => json.into(),
            None => NullableJson::DbNull,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nullable_column_mapping() {
        assert_eq!(NullableJson::Absent.into_nullable(), NotSet);
        assert_eq!(NullableJson::DbNull.into_nullable(), Set(None));
        assert_eq!(
            NullableJson::JsonNull.into_nullable(),
            Set(Some(Json::Null))
        );
        assert_eq!(
            NullableJson::Value(json!({"a": 1})).into_nullable(),
            Set(Some(json!({"a": 1})))
        );
    }

    #[test]
    fn test_required_column_rejects_db_null() {
        assert!(NullableJson::DbNull.into_required().is_none());
        assert_eq!(
            NullableJson::JsonNull.into_required(),
            Some(Set(Json::Null))
        );
    }

    #[test]
    fn test_conversions() {
        assert_eq!(NullableJson::from(Json::Null), NullableJson::JsonNull);
        assert_eq!(NullableJson::from(None::<Json>), NullableJson::DbNull);
        assert_eq!(
            NullableJson::from(Some(json!([1, 2]))),
            NullableJson::Value(json!([1, 2]))
        );
    }
}
