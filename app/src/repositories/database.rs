//! SeaORM implementation of the ToolRecord store

use async_trait::async_trait;
use chrono::Utc;
use kit::{DbConnection, FrameworkError};
use sea_orm::sea_query::ValueType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};

use super::{ToolFilter, ToolStore};
use crate::models::entities::{
    alternatives, categories, stacks, tool_alternatives, tool_categories, tool_stacks,
};
use crate::models::{slugify, tools, NewTool, Term, TermKind, Tool, ToolPatch};

/// Expand `$body` once per taxonomy with `$terms` bound to the term entity
/// module, `$pivot` to the pivot entity module and `$fk` to the pivot's
/// term column
macro_rules! with_taxonomy {
    ($kind:expr, |$terms:ident, $pivot:ident, $fk:ident| $body:block) => {
        match $kind {
            TermKind::Category => {
                #[allow(unused_imports)]
                use categories as $terms;
                #[allow(unused_imports)]
                use tool_categories as $pivot;
                #[allow(unused_variables)]
                let $fk = tool_categories::Column::CategoryId;
                $body
            }
            TermKind::Alternative => {
                #[allow(unused_imports)]
                use alternatives as $terms;
                #[allow(unused_imports)]
                use tool_alternatives as $pivot;
                #[allow(unused_variables)]
                let $fk = tool_alternatives::Column::AlternativeId;
                $body
            }
            TermKind::Stack => {
                #[allow(unused_imports)]
                use stacks as $terms;
                #[allow(unused_imports)]
                use tool_stacks as $pivot;
                #[allow(unused_variables)]
                let $fk = tool_stacks::Column::StackId;
                $body
            }
        }
    };
}

#[derive(Clone)]
pub struct SeaOrmToolStore {
    db: DbConnection,
}

impl SeaOrmToolStore {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }
}

fn into_tools(models: Vec<tools::Model>) -> Result<Vec<Tool>, FrameworkError> {
    models.into_iter().map(Tool::try_from).collect()
}

#[async_trait]
impl ToolStore for SeaOrmToolStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Tool>, FrameworkError> {
        tools::Entity::find_by_id(id)
            .one(self.db.inner())
            .await?
            .map(Tool::try_from)
            .transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tool>, FrameworkError> {
        tools::Entity::find()
            .filter(tools::Column::Slug.eq(slug))
            .one(self.db.inner())
            .await?
            .map(Tool::try_from)
            .transpose()
    }

    async fn find_many(&self, filter: &ToolFilter) -> Result<Vec<Tool>, FrameworkError> {
        let mut query = tools::Entity::find();
        if !filter.statuses.is_empty() {
            let statuses: Vec<&str> = filter.statuses.iter().map(|s| s.as_str()).collect();
            query = query.filter(tools::Column::Status.is_in(statuses));
        }
        if let Some(cutoff) = filter.published_before {
            query = query.filter(tools::Column::PublishedAt.lte(cutoff.naive_utc()));
        }

        let models = query
            .order_by_asc(tools::Column::PublishedAt)
            .order_by_asc(tools::Column::Id)
            .all(self.db.inner())
            .await?;
        into_tools(models)
    }

    async fn create(&self, input: &NewTool) -> Result<Tool, FrameworkError> {
        let slug = input.slug();
        if slug.is_empty() {
            return Err(FrameworkError::validation("slug", "The slug cannot be empty."));
        }
        if self.find_by_slug(&slug).await?.is_some() {
            return Err(FrameworkError::validation(
                "slug",
                format!("The slug '{}' has already been taken.", slug),
            ));
        }

        let model = tools::ActiveModel::from_new(input, slug)
            .insert(self.db.inner())
            .await?;
        Tool::try_from(model)
    }

    async fn update(&self, id: i64, patch: &ToolPatch) -> Result<Tool, FrameworkError> {
        let mut current = self.find_or_fail(id).await?;
        // Validates status moves before anything is written
        current.apply(patch)?;

        if patch.is_empty() {
            return Ok(current);
        }

        let model = tools::ActiveModel::from_patch(id, patch)
            .update(self.db.inner())
            .await?;
        Tool::try_from(model)
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<Vec<Tool>, FrameworkError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.inner().begin().await?;
        let doomed = tools::Entity::find()
            .filter(tools::Column::Id.is_in(ids.to_vec()))
            .all(&txn)
            .await?;

        tool_categories::Entity::delete_many()
            .filter(tool_categories::Column::ToolId.is_in(ids.to_vec()))
            .exec(&txn)
            .await?;
        tool_alternatives::Entity::delete_many()
            .filter(tool_alternatives::Column::ToolId.is_in(ids.to_vec()))
            .exec(&txn)
            .await?;
        tool_stacks::Entity::delete_many()
            .filter(tool_stacks::Column::ToolId.is_in(ids.to_vec()))
            .exec(&txn)
            .await?;
        tools::Entity::delete_many()
            .filter(tools::Column::Id.is_in(ids.to_vec()))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        into_tools(doomed)
    }

    async fn resolve_terms(
        &self,
        kind: TermKind,
        names: &[String],
    ) -> Result<Vec<Term>, FrameworkError> {
        let mut resolved = Vec::with_capacity(names.len());

        for name in names {
            let name = name.trim();
            let slug = slugify(name);
            if slug.is_empty() {
                continue;
            }

            let term: Term = with_taxonomy!(kind, |terms, _pivot, _fk| {
                let existing = terms::Entity::find()
                    .filter(
                        Condition::any()
                            .add(terms::Column::Slug.eq(slug.as_str()))
                            .add(terms::Column::Name.eq(name)),
                    )
                    .one(self.db.inner())
                    .await?;

                match existing {
                    Some(model) => model.into(),
                    None => {
                        let now = Utc::now().naive_utc();
                        let model = terms::ActiveModel {
                            name: Set(name.to_string()),
                            slug: Set(slug.clone()),
                            created_at: Set(now),
                            updated_at: Set(now),
                            ..Default::default()
                        }
                        .insert(self.db.inner())
                        .await?;
                        tracing::info!(kind = kind.as_str(), slug = %model.slug, "term created");
                        model.into()
                    }
                }
            });

            if !resolved.iter().any(|t: &Term| t.id == term.id) {
                resolved.push(term);
            }
        }

        Ok(resolved)
    }

    async fn replace_terms(
        &self,
        kind: TermKind,
        tool_id: i64,
        term_ids: &[i64],
    ) -> Result<(), FrameworkError> {
        let txn = self.db.inner().begin().await?;

        with_taxonomy!(kind, |_terms, pivot, fk| {
            pivot::Entity::delete_many()
                .filter(pivot::Column::ToolId.eq(tool_id))
                .exec(&txn)
                .await?;

            let mut seen = Vec::with_capacity(term_ids.len());
            for id in term_ids.iter().copied() {
                if seen.contains(&id) {
                    continue;
                }
                seen.push(id);

                let mut link = pivot::ActiveModel {
                    tool_id: Set(tool_id),
                    ..Default::default()
                };
                link.set(fk, id.into());
                link.insert(&txn).await?;
            }
        });

        txn.commit().await?;
        Ok(())
    }

    async fn terms(&self, kind: TermKind, tool_id: i64) -> Result<Vec<Term>, FrameworkError> {
        with_taxonomy!(kind, |terms, pivot, fk| {
            let links = pivot::Entity::find()
                .filter(pivot::Column::ToolId.eq(tool_id))
                .all(self.db.inner())
                .await?;
            let ids: Vec<i64> = links
                .iter()
                .filter_map(|link| <i64 as ValueType>::try_from(link.get(fk)).ok())
                .collect();
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            let models = terms::Entity::find()
                .filter(terms::Column::Id.is_in(ids))
                .order_by_asc(terms::Column::Name)
                .all(self.db.inner())
                .await?;
            Ok(models.into_iter().map(Term::from).collect())
        })
    }
}
