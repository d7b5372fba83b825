use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tools")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub website_url: String,
    pub repository_url: String,
    pub tagline: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    pub status: String,
    pub published_at: Option<chrono::NaiveDateTime>,
    pub is_featured: bool,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub score: Option<i64>,
    pub license: Option<String>,
    pub first_commit_date: Option<chrono::NaiveDateTime>,
    pub last_commit_date: Option<chrono::NaiveDateTime>,
    pub favicon_url: Option<String>,
    pub screenshot_url: Option<String>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}
