use sea_orm::{Condition, EntityTrait, IdenStatic, Iterable};
use thiserror::Error;

/// Behaviour shared by every persisted entity, consumed by the generic
/// repository in `shipyard-database`.
pub trait Record: EntityTrait {
    /// Human readable entity name used in errors and logs
    const NAME: &'static str;

    /// Rows visible to normal reads. Soft-deletable entities narrow this.
    fn visible() -> Condition {
        Condition::all()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field '{field}' on {entity}")]
pub struct UnknownField {
    pub entity: &'static str,
    pub field: String,
}

/// Every column name of an entity, in declaration order
pub fn field_names<E: Record>() -> Vec<String> {
    E::Column::iter()
        .map(|column| column.as_str().to_string())
        .collect()
}

/// Resolve a snake_case field name to the entity's column
pub fn parse_field<E: Record>(name: &str) -> Result<E::Column, UnknownField> {
    E::Column::iter()
        .find(|column| column.as_str() == name)
        .ok_or_else(|| UnknownField {
            entity: E::NAME,
            field: name.to_string(),
        })
}
