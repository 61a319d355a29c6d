//! Bare-model operations: create, find, update, destroy.

use super::{FootprintService, Records};
use crate::criteria::{default_criteria, strip_auto_values, with_limit, Criteria, IdOrCriteria, QueryOptions, Record};
use crate::error::AppError;
use crate::store::Scope;

impl FootprintService {
    /// Insert one record. The id attribute and timestamp columns are generated, never taken from `values`.
    pub async fn create(&self, model_name: &str, values: Record, _options: QueryOptions) -> Result<Record, AppError> {
        let model = self.registry.resolve(model_name)?;
        let store = self.store_for(model)?;
        let values = strip_auto_values(model, values);
        let row = store.insert(model, &values).await?;
        tracing::debug!(model = %model.name, "created");
        Ok(row)
    }

    /// An id yields at most one record; criteria yield a page of records.
    pub async fn find(
        &self,
        model_name: &str,
        criteria: impl Into<IdOrCriteria>,
        options: QueryOptions,
    ) -> Result<Records, AppError> {
        let model = self.registry.resolve(model_name)?;
        let store = self.store_for(model)?;
        match criteria.into() {
            IdOrCriteria::Id(id) => {
                let row = store.fetch_by_id(model, &id).await?;
                Ok(Records::One(self.require(model, &id, row, options)?))
            }
            IdOrCriteria::Criteria(c) => {
                let c = with_limit(c, &options, Some(self.default_limit));
                Ok(Records::Many(store.fetch_all(model, &Scope::None, &c).await?))
            }
        }
    }

    /// Update by id, or every row matching criteria. A criteria update returns the rows that now
    /// hold the written values, which can include rows the criteria never matched.
    pub async fn update(
        &self,
        model_name: &str,
        criteria: impl Into<IdOrCriteria>,
        values: Record,
        options: QueryOptions,
    ) -> Result<Records, AppError> {
        let model = self.registry.resolve(model_name)?;
        let store = self.store_for(model)?;
        let values = strip_auto_values(model, values);
        match criteria.into() {
            IdOrCriteria::Id(id) => {
                let row = store.update_by_id(model, &id, &values).await?;
                Ok(Records::One(self.require(model, &id, row, options)?))
            }
            IdOrCriteria::Criteria(c) => {
                if !c.has_filter() {
                    tracing::warn!(model = %model.name, "update without filter applies to every row");
                }
                let c = with_limit(default_criteria(model, c), &options, Some(self.default_limit));
                let updated = store.update_where(model, &Scope::None, &c, &values).await?;
                tracing::debug!(model = %model.name, rows = updated.len(), "updated");
                if values.is_empty() {
                    return Ok(Records::Many(updated));
                }
                let refetch = Criteria::matching(values);
                Ok(Records::Many(store.fetch_all(model, &Scope::None, &refetch).await?))
            }
        }
    }

    /// Delete by id or criteria; returns the number of rows removed.
    pub async fn destroy(
        &self,
        model_name: &str,
        criteria: impl Into<IdOrCriteria>,
        options: QueryOptions,
    ) -> Result<u64, AppError> {
        let model = self.registry.resolve(model_name)?;
        let store = self.store_for(model)?;
        let deleted = match criteria.into() {
            IdOrCriteria::Id(id) => {
                let n = store.delete_by_id(model, &id).await?;
                if n == 0 && options.require {
                    return Err(AppError::NotFound(format!("{} {}", model.name, id)));
                }
                n
            }
            IdOrCriteria::Criteria(c) => {
                if !c.has_filter() {
                    tracing::warn!(model = %model.name, "destroy without filter applies to every row");
                }
                store.delete_where(model, &Scope::None, &default_criteria(model, c)).await?
            }
        };
        tracing::debug!(model = %model.name, rows = deleted, "destroyed");
        Ok(deleted)
    }
}
