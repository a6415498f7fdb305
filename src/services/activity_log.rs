use crate::{
    entities::activity_log::{self, Entity as ActivityLog},
    errors::ServiceError,
    events::Event,
    queries::{fetch_page, ListQuery, Paginated},
};
use chrono::{Duration, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Audit trail over committed mutations, plus its retention sweep.
#[derive(Clone)]
pub struct ActivityLogService {
    db: Arc<DatabaseConnection>,
}

impl ActivityLogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Writes one row per subject of the event. Events without a subject
    /// still get a single row.
    pub async fn record(&self, event: &Event) -> Result<usize, ServiceError> {
        let description = event.describe();
        let subjects = event.subject_ids();
        let subjects: Vec<Option<Uuid>> = if subjects.is_empty() {
            vec![None]
        } else {
            subjects.into_iter().map(Some).collect()
        };

        let now = Utc::now();
        for subject_id in &subjects {
            activity_log::ActiveModel {
                id: Set(Uuid::new_v4()),
                action: Set(event.action().to_string()),
                subject_type: Set(event.subject_type().to_string()),
                subject_id: Set(*subject_id),
                description: Set(description.clone()),
                created_at: Set(now),
            }
            .insert(self.db.as_ref())
            .await?;
        }

        counter!("kitchen_ops.activity.recorded", subjects.len() as u64);
        Ok(subjects.len())
    }

    /// Newest entries first, optionally for one subject.
    pub async fn list(
        &self,
        query: &ListQuery,
        subject_id: Option<Uuid>,
    ) -> Result<Paginated<activity_log::Model>, ServiceError> {
        let query = query.normalize(crate::queries::DEFAULT_PAGE_SIZE, crate::queries::MAX_PAGE_SIZE);
        let mut select = ActivityLog::find();
        if let Some(id) = subject_id {
            select = select.filter(activity_log::Column::SubjectId.eq(id));
        }
        if let Some(pattern) = query.like_pattern() {
            select = select.filter(activity_log::Column::Description.like(pattern));
        }
        let select = select
            .order_by_desc(activity_log::Column::CreatedAt)
            .order_by_asc(activity_log::Column::Id);
        fetch_page(self.db.as_ref(), select, &query).await
    }

    /// Deletes entries older than `retention`. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn purge_older_than(&self, retention: Duration) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - retention;
        let res = ActivityLog::delete_many()
            .filter(activity_log::Column::CreatedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await?;

        counter!("kitchen_ops.activity.purged", res.rows_affected);
        info!(removed = res.rows_affected, %cutoff, "Purged old activity log entries");
        Ok(res.rows_affected)
    }
}
