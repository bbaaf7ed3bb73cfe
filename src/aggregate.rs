//! Per-course assignment aggregation.
//!
//! For every configured course two buckets are listed (`upcoming` and
//! `unsubmitted`), each entry is windowed by its due date, its submission state
//! is looked up for the observed student, and the survivors are ordered
//! unsubmitted-first, then by due date. Nothing in here returns an error: a
//! failed or malformed listing degrades to a single explanatory line.
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::canvas::model::Assignment;
use crate::canvas::{Bucket, CanvasError, CanvasService};
use crate::config::Config;

pub const UPCOMING_DAYS: i64 = 7;
pub const MISSING_DAYS: i64 = 14;

/// Only this exact shape is accepted for `due_at`.
pub const DUE_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

pub const MALFORMED_LINE: &str = "API response malformed";
pub const NOTHING_UPCOMING_LINE: &str = "Nothing upcoming in the next 7 days";
pub const NO_MISSING_LINE: &str = "No missing assignments in the last 2 weeks";

/// Request-time windows, all derived from one `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub now: DateTime<Utc>,
    pub upcoming_end: DateTime<Utc>,
    pub missing_start: DateTime<Utc>,
}

impl TimeWindow {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            upcoming_end: now + Duration::days(UPCOMING_DAYS),
            missing_start: now - Duration::days(MISSING_DAYS),
        }
    }

    /// `[now, now+7d]`
    pub fn is_upcoming(&self, due: DateTime<Utc>) -> bool {
        self.now <= due && due <= self.upcoming_end
    }

    /// `[now-14d, now)`
    pub fn is_missing(&self, due: DateTime<Utc>) -> bool {
        self.missing_start <= due && due < self.now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Upcoming,
    Missing,
}

impl Branch {
    pub fn bucket(&self) -> Bucket {
        match self {
            Branch::Upcoming => Bucket::Upcoming,
            Branch::Missing => Bucket::Unsubmitted,
        }
    }

    fn contains(&self, window: &TimeWindow, due: DateTime<Utc>) -> bool {
        match self {
            Branch::Upcoming => window.is_upcoming(due),
            Branch::Missing => window.is_missing(due),
        }
    }

    pub fn empty_line(&self) -> &'static str {
        match self {
            Branch::Upcoming => NOTHING_UPCOMING_LINE,
            Branch::Missing => NO_MISSING_LINE,
        }
    }

    fn fetch_error_line(&self, err: &CanvasError) -> String {
        format!("Error fetching {} assignments: {}", self.bucket().as_str(), err)
    }

    fn label(&self) -> &'static str {
        match self {
            Branch::Upcoming => "upcoming",
            Branch::Missing => "missing",
        }
    }
}

/// One retained assignment, merged from the listing and its submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub name: String,
    pub due: DateTime<Utc>,
    pub submitted: bool,
}

impl AssignmentRecord {
    pub fn display_line(&self, branch: Branch) -> DisplayLine {
        let tag = match (branch, self.submitted) {
            (_, true) => " (Submitted)",
            (Branch::Upcoming, false) => " (Not Submitted)",
            (Branch::Missing, false) => "",
        };
        DisplayLine(format!(
            "{} (Due: {}){}",
            self.name,
            self.due.format(DISPLAY_FORMAT),
            tag
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DisplayLine(String);

impl DisplayLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one branch for one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// Ordered, never empty.
    Listed(Vec<DisplayLine>),
    Empty,
    /// The listing could not be used; carries the line to show instead.
    Degraded(String),
}

impl BranchOutcome {
    pub fn into_lines(self, branch: Branch) -> Vec<DisplayLine> {
        match self {
            BranchOutcome::Listed(lines) => lines,
            BranchOutcome::Empty => vec![DisplayLine(branch.empty_line().to_string())],
            BranchOutcome::Degraded(text) => vec![DisplayLine(text)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseFeed {
    pub id: String,
    pub name: String,
    pub upcoming: Vec<DisplayLine>,
    pub missing: Vec<DisplayLine>,
}

/// Everything the presentation layer needs for one page view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub window: TimeWindow,
    pub courses: Vec<CourseFeed>,
}

pub fn parse_due_at(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, DUE_AT_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Unsubmitted first, then ascending due date. The sort is stable, so equal
/// keys keep listing order.
pub fn order_records(mut records: Vec<AssignmentRecord>) -> Vec<AssignmentRecord> {
    records.sort_by_key(|record| (record.submitted, record.due));
    records
}

pub struct Aggregator<S> {
    service: S,
    student_id: String,
    course_names: BTreeMap<String, String>,
    submission_concurrency: usize,
}

impl<S: CanvasService> Aggregator<S> {
    pub fn new(service: S, student_id: impl Into<String>) -> Self {
        Self {
            service,
            student_id: student_id.into(),
            course_names: BTreeMap::new(),
            submission_concurrency: 1,
        }
    }

    pub fn from_config(service: S, cfg: &Config) -> Self {
        Self::new(service, cfg.canvas.student_id.clone())
            .with_course_names(cfg.courses.names.clone())
            .with_submission_concurrency(cfg.app.submission_concurrency)
    }

    pub fn with_course_names(mut self, names: BTreeMap<String, String>) -> Self {
        self.course_names = names;
        self
    }

    /// How many submission lookups may be in flight per branch; `1` keeps
    /// them strictly sequential.
    pub fn with_submission_concurrency(mut self, limit: usize) -> Self {
        self.submission_concurrency = limit.max(1);
        self
    }

    pub fn course_name(&self, course_id: &str) -> String {
        self.course_names
            .get(course_id)
            .cloned()
            .unwrap_or_else(|| format!("Course {}", course_id))
    }

    /// Build one feed per course id, in the given order.
    #[instrument(skip_all, fields(courses = course_ids.len()))]
    pub async fn dashboard(&self, course_ids: &[String], now: DateTime<Utc>) -> Dashboard {
        let window = TimeWindow::at(now);
        let mut courses = Vec::with_capacity(course_ids.len());
        for course_id in course_ids {
            courses.push(self.course_feed(course_id, &window).await);
        }
        Dashboard { window, courses }
    }

    #[instrument(skip(self, window))]
    pub async fn course_feed(&self, course_id: &str, window: &TimeWindow) -> CourseFeed {
        let upcoming = self.branch(course_id, Branch::Upcoming, window).await;
        let missing = self.branch(course_id, Branch::Missing, window).await;
        let feed = CourseFeed {
            id: course_id.to_string(),
            name: self.course_name(course_id),
            upcoming: upcoming.into_lines(Branch::Upcoming),
            missing: missing.into_lines(Branch::Missing),
        };
        info!(
            course = %feed.name,
            upcoming = feed.upcoming.len(),
            missing = feed.missing.len(),
            "course aggregated"
        );
        feed
    }

    #[instrument(skip(self, branch, window), fields(branch = branch.label()))]
    pub async fn branch(
        &self,
        course_id: &str,
        branch: Branch,
        window: &TimeWindow,
    ) -> BranchOutcome {
        let assignments = match self.service.list_assignments(course_id, branch.bucket()).await {
            Ok(list) => list,
            Err(CanvasError::Malformed(reason)) => {
                warn!(%reason, "assignment listing malformed");
                return BranchOutcome::Degraded(MALFORMED_LINE.to_string());
            }
            Err(err) => {
                warn!(error = %err, "assignment listing failed");
                return BranchOutcome::Degraded(branch.fetch_error_line(&err));
            }
        };

        let candidates: Vec<(Assignment, DateTime<Utc>)> = assignments
            .into_iter()
            .filter_map(|assignment| {
                let Some(raw) = assignment.due_at.as_deref() else {
                    debug!(name = %assignment.name, "skipped: no due date");
                    return None;
                };
                let Some(due) = parse_due_at(raw) else {
                    debug!(name = %assignment.name, due_at = raw, "skipped: invalid due date");
                    return None;
                };
                if !branch.contains(window, due) {
                    debug!(name = %assignment.name, %due, "skipped: outside window");
                    return None;
                }
                Some((assignment, due))
            })
            .collect();

        let records: Vec<AssignmentRecord> = stream::iter(candidates)
            .map(|(assignment, due)| async move {
                let submitted = self.is_submitted(course_id, &assignment).await;
                AssignmentRecord {
                    name: assignment.name,
                    due,
                    submitted,
                }
            })
            .buffered(self.submission_concurrency)
            .collect()
            .await;

        if records.is_empty() {
            return BranchOutcome::Empty;
        }
        BranchOutcome::Listed(
            order_records(records)
                .iter()
                .map(|record| record.display_line(branch))
                .collect(),
        )
    }

    /// A failed lookup counts as not submitted so the assignment stays visible.
    async fn is_submitted(&self, course_id: &str, assignment: &Assignment) -> bool {
        match self
            .service
            .get_submission(course_id, &assignment.id, &self.student_id)
            .await
        {
            Ok(submission) => submission.is_submitted(),
            Err(err) => {
                debug!(name = %assignment.name, error = %err, "submission lookup failed");
                false
            }
        }
    }
}
