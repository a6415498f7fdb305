//! Human-friendly, table-unique slugs for named records.

use crate::errors::ServiceError;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use slug::slugify;
use uuid::Uuid;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

/// Derives the base slug for `input`.
pub fn derive_slug(input: &str) -> Result<String, ServiceError> {
    if input.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "slug source text is empty".to_string(),
        ));
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "failed to derive slug from `{}`",
            input
        )));
    }

    Ok(candidate)
}

/// Picks `base`, `base-2`, `base-3`, ... until no other row of `E` holds it.
/// Trashed rows count, because the column is unique across the table.
pub async fn unique_slug<E, C>(
    conn: &C,
    input: &str,
    slug_column: E::Column,
    id_column: E::Column,
    exclude_id: Option<Uuid>,
) -> Result<String, ServiceError>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let base = derive_slug(input)?;

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = if attempt == 1 {
            base.clone()
        } else {
            format!("{}-{}", base, attempt)
        };

        let mut select = E::find().filter(slug_column.eq(candidate.as_str()));
        if let Some(id) = exclude_id {
            select = select.filter(id_column.ne(id));
        }

        if select.count(conn).await? == 0 {
            return Ok(candidate);
        }
    }

    Err(ServiceError::ValidationError(format!(
        "exhausted attempts to find a unique slug for `{}`",
        base
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercase_and_hyphenated() {
        assert_eq!(derive_slug("Basmati Rice 5kg").unwrap(), "basmati-rice-5kg");
    }

    #[test]
    fn blank_input_is_rejected() {
        assert!(matches!(
            derive_slug("   "),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
