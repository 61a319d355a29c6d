//! Association operations, dispatched on the relation kind.

use super::{FootprintService, Records};
use crate::association::{AssociationResolver, ParentRef, RelationHandle};
use crate::config::RelationDescriptor;
use crate::criteria::{
    default_criteria, normalize_id_or_criteria, strip_auto_values, with_limit, IdOrCriteria, QueryOptions, Record,
};
use crate::error::AppError;
use crate::store::Scope;
use serde_json::Value;

impl FootprintService {
    fn resolve_relation<'a>(
        &'a self,
        parent_model: &str,
        relation: &str,
        parent_id: Value,
    ) -> Result<(RelationHandle<'a>, ParentRef<'a>), AppError> {
        AssociationResolver::new(&self.registry).resolve_with_parent(parent_model, relation, parent_id)
    }

    /// Foreign key value held by the parent row of a `BelongsTo`; None when the row or the key is missing.
    async fn owner_key(&self, parent: &ParentRef<'_>, foreign_key: &str) -> Result<Option<Value>, AppError> {
        let row = self.store_for(parent.model)?.fetch_by_id(parent.model, &parent.id).await?;
        Ok(row
            .and_then(|mut r| r.remove(foreign_key))
            .filter(|v| !v.is_null()))
    }

    fn missing_related(handle: &RelationHandle<'_>, parent: &ParentRef<'_>, options: QueryOptions) -> Result<Records, AppError> {
        if options.require {
            return Err(AppError::NotFound(format!(
                "{} of {} {}",
                handle.name, parent.model.name, parent.id
            )));
        }
        Ok(Records::One(None))
    }

    /// Create a record related to the parent: keyed to it, linked through the pivot, or attached as its owner.
    pub async fn create_association(
        &self,
        parent_model: &str,
        parent_id: impl Into<Value>,
        relation: &str,
        values: Record,
        _options: QueryOptions,
    ) -> Result<Record, AppError> {
        let (handle, parent) = self.resolve_relation(parent_model, relation, parent_id.into())?;
        let target = handle.target;
        let store = self.store_for(target)?;
        let mut values = strip_auto_values(target, values);
        let row = match handle.relation {
            RelationDescriptor::HasOne { foreign_key, .. } | RelationDescriptor::HasMany { foreign_key, .. } => {
                values.insert(foreign_key.clone(), parent.id.clone());
                store.insert(target, &values).await?
            }
            RelationDescriptor::BelongsToManyThrough { pivot, .. } => {
                store.insert_linked(target, &values, pivot, &parent.id).await?
            }
            RelationDescriptor::BelongsTo { foreign_key, .. } => {
                store
                    .insert_and_attach(target, &values, parent.model, &parent.id, foreign_key)
                    .await?
            }
        };
        tracing::debug!(model = %parent.model.name, relation = handle.name, "association created");
        Ok(row)
    }

    /// Find related records. Single-valued relations yield one record, the others a page.
    pub async fn find_association(
        &self,
        parent_model: &str,
        parent_id: impl Into<Value>,
        relation: &str,
        criteria: impl Into<IdOrCriteria>,
        options: QueryOptions,
    ) -> Result<Records, AppError> {
        let (handle, parent) = self.resolve_relation(parent_model, relation, parent_id.into())?;
        let target = handle.target;
        let store = self.store_for(target)?;
        match handle.relation {
            RelationDescriptor::BelongsTo { foreign_key, .. } => {
                let related = match self.owner_key(&parent, foreign_key).await? {
                    Some(key) => store.fetch_by_id(target, &key).await?,
                    None => None,
                };
                match related {
                    Some(row) => Ok(Records::One(Some(row))),
                    None => Self::missing_related(&handle, &parent, options),
                }
            }
            RelationDescriptor::HasOne { .. } => {
                let mut c = normalize_id_or_criteria(target, criteria.into());
                c.limit = Some(1);
                match store.fetch_all(target, &handle.scope, &c).await?.into_iter().next() {
                    Some(row) => Ok(Records::One(Some(row))),
                    None => Self::missing_related(&handle, &parent, options),
                }
            }
            RelationDescriptor::HasMany { .. } | RelationDescriptor::BelongsToManyThrough { .. } => {
                let c = with_limit(
                    normalize_id_or_criteria(target, criteria.into()),
                    &options,
                    Some(self.default_limit),
                );
                Ok(Records::Many(store.fetch_all(target, &handle.scope, &c).await?))
            }
        }
    }

    /// Patch related records matching criteria; returns the rows as updated. A `BelongsTo`
    /// updates the single record the parent points at and ignores criteria.
    pub async fn update_association(
        &self,
        parent_model: &str,
        parent_id: impl Into<Value>,
        relation: &str,
        criteria: impl Into<IdOrCriteria>,
        values: Record,
        options: QueryOptions,
    ) -> Result<Records, AppError> {
        let (handle, parent) = self.resolve_relation(parent_model, relation, parent_id.into())?;
        let target = handle.target;
        let store = self.store_for(target)?;
        let values = strip_auto_values(target, values);
        match handle.relation {
            RelationDescriptor::BelongsTo { foreign_key, .. } => {
                let updated = match self.owner_key(&parent, foreign_key).await? {
                    Some(key) => store.update_by_id(target, &key, &values).await?,
                    None => None,
                };
                match updated {
                    Some(row) => Ok(Records::One(Some(row))),
                    None => Self::missing_related(&handle, &parent, options),
                }
            }
            _ => {
                let c = default_criteria(target, normalize_id_or_criteria(target, criteria.into()));
                let rows = store.update_where(target, &handle.scope, &c, &values).await?;
                tracing::debug!(model = %parent.model.name, relation = handle.name, rows = rows.len(), "association updated");
                Ok(Records::Many(rows))
            }
        }
    }

    /// Delete related records matching criteria; returns the number removed. For a through relation
    /// this removes the parent's pivot rows only and accepts no criteria.
    pub async fn destroy_association(
        &self,
        parent_model: &str,
        parent_id: impl Into<Value>,
        relation: &str,
        criteria: impl Into<IdOrCriteria>,
        _options: QueryOptions,
    ) -> Result<u64, AppError> {
        let (handle, parent) = self.resolve_relation(parent_model, relation, parent_id.into())?;
        let target = handle.target;
        let store = self.store_for(target)?;
        let criteria = criteria.into();
        let deleted = match handle.relation {
            RelationDescriptor::BelongsToManyThrough { pivot, .. } => {
                let empty = matches!(&criteria, IdOrCriteria::Criteria(c) if c.is_empty());
                if !empty {
                    return Err(AppError::UnsupportedOperation(format!(
                        "{}.{}: criteria are not supported when unlinking a through relation",
                        parent.model.name, handle.name
                    )));
                }
                store.unlink_all(pivot, &parent.id).await?
            }
            RelationDescriptor::BelongsTo { foreign_key, .. } => match self.owner_key(&parent, foreign_key).await? {
                Some(key) => {
                    let scope = Scope::Column {
                        column: target.id_attribute.clone(),
                        value: key,
                    };
                    let c = default_criteria(target, normalize_id_or_criteria(target, criteria));
                    store.delete_where(target, &scope, &c).await?
                }
                None => 0,
            },
            RelationDescriptor::HasOne { .. } | RelationDescriptor::HasMany { .. } => {
                let c = default_criteria(target, normalize_id_or_criteria(target, criteria));
                store.delete_where(target, &handle.scope, &c).await?
            }
        };
        tracing::debug!(model = %parent.model.name, relation = handle.name, rows = deleted, "association destroyed");
        Ok(deleted)
    }
}
