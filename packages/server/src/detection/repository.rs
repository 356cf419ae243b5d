use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{AlertSeverity, AlertSource, AlertStatus};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entity::{alert, plot};

/// Fields that identify an alert for deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    pub plot_id: i32,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub percent_change: f64,
    pub source: AlertSource,
}

/// Everything needed to persist a new alert.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub candidate: AlertCandidate,
    pub detected_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
}

/// Optional filters for cross-plot listings.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub severity: Option<AlertSeverity>,
    pub status: Option<AlertStatus>,
    pub source: Option<AlertSource>,
}

/// Result of a status change request.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Updated(alert::Model),
    /// The alert already had the requested status.
    Unchanged(alert::Model),
    /// The alert is further along its lifecycle than the requested status.
    Rejected { current: AlertStatus },
    NotFound,
}

pub struct AlertRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> AlertRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Insert an alert with status `unread` and creation time now.
    pub async fn create(&self, new: NewAlert) -> Result<alert::Model, DbErr> {
        let candidate = new.candidate;
        alert::ActiveModel {
            plot_id: Set(candidate.plot_id),
            detected_at: Set(new.detected_at),
            alert_type: Set(candidate.alert_type),
            severity: Set(candidate.severity),
            percent_change: Set(candidate.percent_change),
            source: Set(candidate.source),
            status: Set(AlertStatus::Unread),
            title: Set(new.title),
            description: Set(new.description),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.conn)
        .await
    }

    /// Most recent alert created at or after `since` whose identity matches
    /// `candidate` exactly, including the percent change.
    pub async fn find_recent_match(
        &self,
        candidate: &AlertCandidate,
        since: DateTime<Utc>,
    ) -> Result<Option<alert::Model>, DbErr> {
        alert::Entity::find()
            .filter(alert::Column::PlotId.eq(candidate.plot_id))
            .filter(alert::Column::AlertType.eq(candidate.alert_type.as_str()))
            .filter(alert::Column::Severity.eq(candidate.severity))
            .filter(alert::Column::PercentChange.eq(candidate.percent_change))
            .filter(alert::Column::Source.eq(candidate.source))
            .filter(alert::Column::CreatedAt.gte(since))
            .order_by_desc(alert::Column::CreatedAt)
            .one(self.conn)
            .await
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<alert::Model>, DbErr> {
        alert::Entity::find_by_id(id).one(self.conn).await
    }

    /// Move an alert forward in its lifecycle.
    pub async fn set_status(&self, id: i32, status: AlertStatus) -> Result<StatusChange, DbErr> {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(StatusChange::NotFound);
        };

        if existing.status == status {
            return Ok(StatusChange::Unchanged(existing));
        }
        if !existing.status.can_transition_to(status) {
            return Ok(StatusChange::Rejected {
                current: existing.status,
            });
        }

        let mut active: alert::ActiveModel = existing.into();
        active.status = Set(status);
        Ok(StatusChange::Updated(active.update(self.conn).await?))
    }

    /// Alerts on any of `plot_ids`, newest first, each paired with its plot.
    ///
    /// Callers restrict `plot_ids` to plots the requester owns.
    pub async fn list_for_plots(
        &self,
        plot_ids: &[i32],
        filter: &AlertFilter,
    ) -> Result<Vec<(alert::Model, plot::Model)>, DbErr> {
        if plot_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut condition = Condition::all().add(alert::Column::PlotId.is_in(plot_ids.to_vec()));
        if let Some(severity) = filter.severity {
            condition = condition.add(alert::Column::Severity.eq(severity));
        }
        if let Some(status) = filter.status {
            condition = condition.add(alert::Column::Status.eq(status));
        }
        if let Some(source) = filter.source {
            condition = condition.add(alert::Column::Source.eq(source));
        }

        let alerts = alert::Entity::find()
            .filter(condition)
            .order_by_desc(alert::Column::CreatedAt)
            .order_by_desc(alert::Column::Id)
            .all(self.conn)
            .await?;

        let plots: HashMap<i32, plot::Model> = plot::Entity::find()
            .filter(plot::Column::Id.is_in(plot_ids.to_vec()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(alerts
            .into_iter()
            .filter_map(|a| plots.get(&a.plot_id).cloned().map(|p| (a, p)))
            .collect())
    }

    /// Alerts on one plot, newest first.
    pub async fn list_for_plot(&self, plot_id: i32) -> Result<Vec<alert::Model>, DbErr> {
        alert::Entity::find()
            .filter(alert::Column::PlotId.eq(plot_id))
            .order_by_desc(alert::Column::CreatedAt)
            .order_by_desc(alert::Column::Id)
            .all(self.conn)
            .await
    }

    pub async fn delete_for_plot(&self, plot_id: i32) -> Result<u64, DbErr> {
        let result = alert::Entity::delete_many()
            .filter(alert::Column::PlotId.eq(plot_id))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}
