use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stock batch that cannot cover what an order asks of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub kitchen_stock_id: Uuid,
    pub requested: Decimal,
    pub available: Decimal,
    pub shortfall: Decimal,
}

impl StockShortfall {
    pub fn new(kitchen_stock_id: Uuid, requested: Decimal, available: Decimal) -> Self {
        Self {
            kitchen_stock_id,
            requested,
            available,
            shortfall: requested - available,
        }
    }
}

fn describe_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| {
            format!(
                "stock {} short by {} (requested {}, available {})",
                s.kitchen_stock_id, s.shortfall, s.requested, s.available
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Kitchen order {0} is already approved")]
    AlreadyApproved(Uuid),

    #[error("Insufficient stock: {}", describe_shortfalls(.0))]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Not in trash: {0}")]
    NotInTrash(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    pub fn not_found(resource: &str, id: Uuid) -> Self {
        ServiceError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn not_in_trash(resource: &str, id: Uuid) -> Self {
        ServiceError::NotInTrash(format!("{} {} is not in trash", resource, id))
    }

    /// Short machine-readable reason, used when a bulk operation reports per-id failures.
    pub fn reason(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not found",
            ServiceError::NotInTrash(_) => "not in trash",
            ServiceError::AlreadyApproved(_) => "already approved",
            ServiceError::InsufficientStock(_) => "insufficient stock",
            ServiceError::ConcurrentModification(_) => "concurrent modification",
            ServiceError::ValidationError(_) => "validation error",
            ServiceError::DatabaseError(_) => "database error",
            ServiceError::CacheError(_) => "cache error",
            ServiceError::SerializationError(_) => "serialization error",
            ServiceError::InternalError(_) | ServiceError::Other(_) => "internal error",
        }
    }

    /// Stable error code for callers that surface failures to staff.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::AlreadyApproved(_) => "already_approved",
            ServiceError::InsufficientStock(_) => "insufficient_stock",
            ServiceError::ConcurrentModification(_) => "concurrent_modification",
            ServiceError::NotInTrash(_) => "not_in_trash",
            ServiceError::ValidationError(_) => "validation_error",
            _ => "internal_error",
        }
    }
}
