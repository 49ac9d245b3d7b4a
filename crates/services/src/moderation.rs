//! # ModerationEngine
//!
//! User-filed reports and the admin actions that resolve them. Resolved
//! reports are deleted rather than flagged, so the reports collection is
//! always the open queue. Banning through a report also clears every other
//! report against the same user, in one batch.

use std::sync::Arc;

use domains::{
    decode, encode, CoreError, DocumentStore, OrderBy, Predicate, Report, ReportStatus,
    ReportView, Result, WriteOp,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{collection, UserDirectory};

pub struct ModerationEngine {
    store: Arc<dyn DocumentStore>,
    directory: Arc<UserDirectory>,
}

impl ModerationEngine {
    pub fn new(store: Arc<dyn DocumentStore>, directory: Arc<UserDirectory>) -> Self {
        ModerationEngine { store, directory }
    }

    /// Files a report by `reporting` against `reported`. Anyone may file;
    /// self-reports are refused, and the reported user must exist.
    pub async fn file_report(
        &self,
        reported: &str,
        reporting: &str,
        details: &str,
    ) -> Result<Report> {
        if reported == reporting {
            return Err(CoreError::SelfAction("you cannot report yourself".into()));
        }
        let details = details.trim();
        if details.is_empty() {
            return Err(CoreError::Validation(
                "report details must not be empty".into(),
            ));
        }
        self.directory.get_user(reported, false).await?;
        let report = Report {
            id: Uuid::new_v4().to_string(),
            reported_user_id: reported.to_string(),
            reporting_user_id: reporting.to_string(),
            details: details.to_string(),
            status: ReportStatus::Pending,
            created_at: chrono::Utc::now(),
        };
        self.store
            .set(collection::REPORTS, &report.id, encode(&report)?)
            .await?;
        debug!(report_id = %report.id, "report filed");
        Ok(report)
    }

    /// Admin upholds a report: bans the reported user, then deletes every
    /// report against them in one batch so none of them can be acted on
    /// twice. The ban itself carries the admin and self-action checks.
    pub async fn resolve_report_by_ban(&self, report_id: &str, admin: &str) -> Result<()> {
        let doc = self
            .store
            .get(collection::REPORTS, report_id)
            .await?
            .ok_or_else(|| CoreError::not_found("report", report_id))?;
        let report: Report = decode(doc)?;
        self.directory
            .set_banned(&report.reported_user_id, admin, true)
            .await?;
        let open = self
            .store
            .query(
                collection::REPORTS,
                &[Predicate::eq(
                    "reportedUserId",
                    report.reported_user_id.as_str(),
                )],
                None,
            )
            .await?;
        let ops: Vec<WriteOp> = open
            .iter()
            .filter_map(|doc| doc.get("id").and_then(|v| v.as_str()))
            .map(|id| WriteOp::Delete {
                collection: collection::REPORTS.to_string(),
                id: id.to_string(),
            })
            .collect();
        let cleared = ops.len();
        self.store.commit_batch(ops).await?;
        debug!(
            reported = %report.reported_user_id,
            cleared,
            "report upheld, user banned"
        );
        Ok(())
    }

    /// Admin dismisses a single report without touching the reported user.
    pub async fn resolve_report_by_reject(&self, report_id: &str, admin: &str) -> Result<()> {
        if !self.directory.is_admin(admin).await {
            return Err(CoreError::Authorization("admin privileges required".into()));
        }
        // Missing reports surface as NotFound instead of silently deleting.
        self.store
            .get(collection::REPORTS, report_id)
            .await?
            .ok_or_else(|| CoreError::not_found("report", report_id))?;
        self.store.delete(collection::REPORTS, report_id).await?;
        debug!(report_id, "report dismissed");
        Ok(())
    }

    /// The open report queue, newest first, joined with the display names
    /// an admin needs. Reports whose parties no longer resolve are skipped.
    pub async fn list_reports(&self, admin: &str) -> Result<Vec<ReportView>> {
        if !self.directory.is_admin(admin).await {
            return Err(CoreError::Authorization("admin privileges required".into()));
        }
        let docs = self
            .store
            .query(
                collection::REPORTS,
                &[],
                Some(&OrderBy::desc("createdAt")),
            )
            .await?;
        let mut views = Vec::with_capacity(docs.len());
        for doc in docs {
            let report: Report = match decode(doc) {
                Ok(report) => report,
                Err(e) => {
                    warn!(error = %e, "skipping malformed report document");
                    continue;
                }
            };
            let reported = self
                .directory
                .get_user(&report.reported_user_id, false)
                .await;
            let reporting = self
                .directory
                .get_user(&report.reporting_user_id, false)
                .await;
            match (reported, reporting) {
                (Ok(reported), Ok(reporting)) => views.push(ReportView {
                    report,
                    reported_name: reported.name,
                    reporting_name: reporting.name,
                }),
                _ => warn!(report_id = %report.id, "skipping report with unresolvable users"),
            }
        }
        Ok(views)
    }
}
