use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::image::{ImagePurpose, ImageRecord, ModelTier};

/// Wardrobe item fields the handlers care about.
#[derive(Debug, Clone)]
pub struct ItemSummary {
    pub id: Uuid,
    pub name: String,
    pub image_id: Option<Uuid>,
    pub attributes: Option<serde_json::Value>,
}

/// Outfit fields the handlers care about.
#[derive(Debug, Clone)]
pub struct OutfitRow {
    pub id: Uuid,
    pub item_ids: Vec<Uuid>,
    pub mannequin_image_id: Option<Uuid>,
}

/// Profile fields the handlers care about. A missing row behaves like an
/// empty profile on the standard tier.
#[derive(Debug, Clone, Default)]
pub struct ProfileRow {
    pub head_image_id: Option<Uuid>,
    pub body_image_id: Option<Uuid>,
    pub model_tier: Option<ModelTier>,
}

/// Create an image record pointing at freshly uploaded bytes.
pub async fn create_image_record(
    pool: &PgPool,
    owner_user_id: Uuid,
    storage_key: &str,
    mime_type: &str,
    purpose: ImagePurpose,
) -> Result<ImageRecord, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO images (owner_user_id, storage_key, mime_type, purpose)
        VALUES ($1, $2, $3, $4)
        RETURNING id, owner_user_id, storage_key, mime_type, purpose, created_at
        "#,
    )
    .bind(owner_user_id)
    .bind(storage_key)
    .bind(mime_type)
    .bind(purpose.to_string())
    .fetch_one(pool)
    .await?;

    Ok(ImageRecord {
        id: row.try_get("id")?,
        owner_user_id: row.try_get("owner_user_id")?,
        storage_key: row.try_get("storage_key")?,
        mime_type: row.try_get("mime_type")?,
        purpose: row.try_get("purpose")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Look up an image record, scoped to its owner.
pub async fn get_image(
    pool: &PgPool,
    image_id: Uuid,
    owner_user_id: Uuid,
) -> Result<Option<ImageRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, owner_user_id, storage_key, mime_type, purpose, created_at
        FROM images
        WHERE id = $1 AND owner_user_id = $2
        "#,
    )
    .bind(image_id)
    .bind(owner_user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(ImageRecord {
            id: r.try_get("id")?,
            owner_user_id: r.try_get("owner_user_id")?,
            storage_key: r.try_get("storage_key")?,
            mime_type: r.try_get("mime_type")?,
            purpose: r.try_get("purpose")?,
            created_at: r.try_get("created_at")?,
        })
    })
    .transpose()
}

pub async fn get_item(
    pool: &PgPool,
    item_id: Uuid,
    owner_user_id: Uuid,
) -> Result<Option<ItemSummary>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, name, image_id, attributes
        FROM wardrobe_items
        WHERE id = $1 AND owner_user_id = $2
        "#,
    )
    .bind(item_id)
    .bind(owner_user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(ItemSummary {
            id: r.try_get("id")?,
            name: r.try_get("name")?,
            image_id: r.try_get("image_id")?,
            attributes: r.try_get("attributes")?,
        })
    })
    .transpose()
}

/// Every item of the owner, for suggestion and reference matching.
pub async fn list_items(pool: &PgPool, owner_user_id: Uuid) -> Result<Vec<ItemSummary>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, image_id, attributes
        FROM wardrobe_items
        WHERE owner_user_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(owner_user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(ItemSummary {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                image_id: r.try_get("image_id")?,
                attributes: r.try_get("attributes")?,
            })
        })
        .collect()
}

/// Resolve the image ids of a selected set of items, preserving input order
/// and skipping items without a photo.
pub async fn item_image_ids(
    pool: &PgPool,
    owner_user_id: Uuid,
    item_ids: &[Uuid],
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, image_id
        FROM wardrobe_items
        WHERE owner_user_id = $1 AND id = ANY($2)
        "#,
    )
    .bind(owner_user_id)
    .bind(item_ids)
    .fetch_all(pool)
    .await?;

    let mut by_id = std::collections::HashMap::new();
    for r in rows {
        let id: Uuid = r.try_get("id")?;
        let image_id: Option<Uuid> = r.try_get("image_id")?;
        by_id.insert(id, image_id);
    }

    Ok(item_ids
        .iter()
        .filter_map(|id| by_id.get(id).copied().flatten())
        .collect())
}

pub async fn set_item_image(
    pool: &PgPool,
    item_id: Uuid,
    owner_user_id: Uuid,
    image_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE wardrobe_items
        SET image_id = $1, updated_at = NOW()
        WHERE id = $2 AND owner_user_id = $3
        "#,
    )
    .bind(image_id)
    .bind(item_id)
    .bind(owner_user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Merge freshly extracted attributes over whatever the item already has.
pub async fn upsert_item_attributes(
    pool: &PgPool,
    item_id: Uuid,
    owner_user_id: Uuid,
    attributes: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE wardrobe_items
        SET attributes = COALESCE(attributes, '{}'::jsonb) || $1, updated_at = NOW()
        WHERE id = $2 AND owner_user_id = $3
        "#,
    )
    .bind(attributes)
    .bind(item_id)
    .bind(owner_user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_outfit(
    pool: &PgPool,
    outfit_id: Uuid,
    owner_user_id: Uuid,
) -> Result<Option<OutfitRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, item_ids, mannequin_image_id
        FROM outfits
        WHERE id = $1 AND owner_user_id = $2
        "#,
    )
    .bind(outfit_id)
    .bind(owner_user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(OutfitRow {
            id: r.try_get("id")?,
            item_ids: r.try_get("item_ids")?,
            mannequin_image_id: r.try_get("mannequin_image_id")?,
        })
    })
    .transpose()
}

pub async fn set_outfit_mannequin_image(
    pool: &PgPool,
    outfit_id: Uuid,
    owner_user_id: Uuid,
    image_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE outfits
        SET mannequin_image_id = $1, updated_at = NOW()
        WHERE id = $2 AND owner_user_id = $3
        "#,
    )
    .bind(image_id)
    .bind(outfit_id)
    .bind(owner_user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_outfit_rendered_image(
    pool: &PgPool,
    outfit_id: Uuid,
    owner_user_id: Uuid,
    image_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE outfits
        SET rendered_image_id = $1, updated_at = NOW()
        WHERE id = $2 AND owner_user_id = $3
        "#,
    )
    .bind(image_id)
    .bind(outfit_id)
    .bind(owner_user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<ProfileRow, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT head_image_id, body_image_id, model_tier
        FROM profiles
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) => {
            let tier_str: String = r.try_get("model_tier")?;
            Ok(ProfileRow {
                head_image_id: r.try_get("head_image_id")?,
                body_image_id: r.try_get("body_image_id")?,
                model_tier: tier_str.parse().ok(),
            })
        }
        None => Ok(ProfileRow::default()),
    }
}

pub async fn set_profile_head_image(
    pool: &PgPool,
    user_id: Uuid,
    image_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, head_image_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET head_image_id = $2, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(image_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_profile_body_image(
    pool: &PgPool,
    user_id: Uuid,
    image_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, body_image_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET body_image_id = $2, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(image_id)
    .execute(pool)
    .await?;

    Ok(())
}
