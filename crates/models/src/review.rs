use sea_orm::{entity::prelude::*, ActiveValue::Unchanged, QueryOrder, Set, DatabaseConnection};
use uuid::Uuid;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{errors, user};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "review")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub author_id: Uuid,
    pub service_id: Uuid,
    pub rating: i16,
    #[sea_orm(column_type = "Text")]
    pub comment: String,
    /// JSON array of object-store references, in display order.
    #[sea_orm(column_type = "JsonBinary")]
    pub images: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { Author }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Author => Entity::belongs_to(user::Entity)
                .from(Column::AuthorId)
                .to(user::Column::Id)
                .into(),
        }
    }
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef { Relation::Author.def() }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode the `images` column; non-string entries are dropped.
    pub fn image_list(&self) -> Vec<String> {
        images_from_json(&self.images)
    }
}

pub fn validate_rating(rating: i16) -> Result<(), errors::ModelError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(errors::ModelError::Validation(format!(
            "rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

pub fn images_to_json(images: &[String]) -> Json {
    Json::Array(images.iter().cloned().map(Json::String).collect())
}

pub fn images_from_json(value: &Json) -> Vec<String> {
    match value {
        Json::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

pub async fn create(
    db: &DatabaseConnection,
    author_id: Uuid,
    service_id: Uuid,
    rating: i16,
    comment: &str,
    images: &[String],
) -> Result<Model, errors::ModelError> {
    validate_rating(rating)?;
    let now = Utc::now().into();
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        author_id: Set(author_id),
        service_id: Set(service_id),
        rating: Set(rating),
        comment: Set(comment.to_string()),
        images: Set(images_to_json(images)),
        created_at: Set(now),
        updated_at: Set(now),
    };
    am.insert(db).await.map_err(|e| errors::ModelError::Db(e.to_string()))
}

pub async fn find(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>, errors::ModelError> {
    Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))
}

/// Overwrite the mutable columns (rating, comment, images); author and service never change.
pub async fn save(
    db: &DatabaseConnection,
    id: Uuid,
    rating: i16,
    comment: &str,
    images: &[String],
) -> Result<Model, errors::ModelError> {
    validate_rating(rating)?;
    let am = ActiveModel {
        id: Unchanged(id),
        rating: Set(rating),
        comment: Set(comment.to_string()),
        images: Set(images_to_json(images)),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    am.update(db).await.map_err(|e| errors::ModelError::Db(e.to_string()))
}

/// Returns whether a row was removed.
pub async fn delete(db: &DatabaseConnection, id: Uuid) -> Result<bool, errors::ModelError> {
    let res = Entity::delete_by_id(id)
        .exec(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))?;
    Ok(res.rows_affected > 0)
}

/// Reviews of a service, newest first, joined with their author rows.
pub async fn list_by_service_with_authors(
    db: &DatabaseConnection,
    service_id: Uuid,
) -> Result<Vec<(Model, Option<user::Model>)>, errors::ModelError> {
    Entity::find()
        .filter(Column::ServiceId.eq(service_id))
        .order_by_desc(Column::CreatedAt)
        .find_also_related(user::Entity)
        .all(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))
}
