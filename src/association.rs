//! Association resolution: (parent model, relation name, parent id) to the target model and the scope
//! that restricts it to rows related to that parent.

use crate::config::{ModelDescriptor, ModelRegistry, RelationDescriptor, RelationKind};
use crate::error::AppError;
use crate::store::Scope;
use serde_json::Value;

/// The parent side of an association call.
#[derive(Clone, Debug)]
pub struct ParentRef<'a> {
    pub model: &'a ModelDescriptor,
    pub id: Value,
}

/// A relation resolved for one parent.
#[derive(Clone, Debug)]
pub struct RelationHandle<'a> {
    pub name: &'a str,
    pub relation: &'a RelationDescriptor,
    pub target: &'a ModelDescriptor,
    /// Target rows belonging to the parent. `Scope::None` for `BelongsTo`, whose key lives on the parent row.
    pub scope: Scope,
}

impl RelationHandle<'_> {
    pub fn kind(&self) -> RelationKind {
        self.relation.kind()
    }
}

pub struct AssociationResolver<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> AssociationResolver<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        AssociationResolver { registry }
    }

    pub fn resolve(&self, parent_model: &str, relation: &str, parent_id: Value) -> Result<RelationHandle<'a>, AppError> {
        self.resolve_with_parent(parent_model, relation, parent_id)
            .map(|(handle, _)| handle)
    }

    pub fn resolve_with_parent(
        &self,
        parent_model: &str,
        relation: &str,
        parent_id: Value,
    ) -> Result<(RelationHandle<'a>, ParentRef<'a>), AppError> {
        let parent = self.registry.resolve(parent_model)?;
        let (name, descriptor) = parent
            .relations
            .get_key_value(relation)
            .ok_or_else(|| AppError::AssociationNotDefined {
                model: parent.name.clone(),
                relation: relation.to_string(),
            })?;
        check_parent_id(parent, &parent_id)?;
        let target = self.registry.resolve(descriptor.target())?;
        let scope = match descriptor {
            RelationDescriptor::BelongsTo { .. } => Scope::None,
            RelationDescriptor::HasOne { foreign_key, .. } | RelationDescriptor::HasMany { foreign_key, .. } => {
                Scope::Column {
                    column: foreign_key.clone(),
                    value: parent_id.clone(),
                }
            }
            RelationDescriptor::BelongsToManyThrough { pivot, .. } => Scope::Through {
                pivot: pivot.clone(),
                parent_id: parent_id.clone(),
            },
        };
        let handle = RelationHandle {
            name: name.as_str(),
            relation: descriptor,
            target,
            scope,
        };
        Ok((
            handle,
            ParentRef {
                model: parent,
                id: parent_id,
            },
        ))
    }
}

/// Association calls need one concrete parent id.
fn check_parent_id(parent: &ModelDescriptor, id: &Value) -> Result<(), AppError> {
    let usable = match id {
        Value::Number(_) => true,
        Value::String(s) => !s.is_empty(),
        _ => false,
    };
    if usable {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "{}: association calls require a parent {}",
            parent.name, parent.id_attribute
        )))
    }
}
