//! Review queue: the lifecycle of staged raw records.
//!
//! pending -> approved | rejected (terminal); pending records may instead be
//! deleted outright ("ignore", no audit trail). Approval persists the
//! canonical attendee rows and flips the record's status inside one
//! transaction, guarded by a conditional update so two reviewers racing on
//! the same record cannot double-import it.

use crate::db::{self, PendingPage, Pool};
use crate::matcher;
use crate::model::{
    AttendeeDraft, DuplicateMatch, MatchConfidence, QueueStats, RecordStatus, TransformOutcome,
};
use crate::transform;
use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

/// How the caller wants a reported duplicate resolved on a follow-up call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateDecision {
    /// Stop and report the matches; nothing is written.
    #[default]
    Abort,
    /// Insert a new attendee despite the match.
    ImportAnyway,
    /// Overwrite the given existing attendee from the edited draft.
    Update { attendee_id: i64 },
}

#[derive(Debug, Clone)]
pub enum ApproveOutcome {
    Approved {
        attendee_id: i64,
        spouse_id: Option<i64>,
    },
    /// A high-confidence duplicate was found and the decision was `Abort`.
    /// The caller must decide and call again.
    DuplicateFound(Vec<DuplicateMatch>),
    ValidationFailed(Vec<String>),
    /// The record was no longer `pending`: another reviewer got there first
    /// or it is already terminal. Nothing was written.
    NotPending,
}

/// Paginated read of pending records, newest first.
#[instrument(skip_all)]
pub async fn list_pending(pool: &Pool, limit: i64, offset: i64) -> Result<PendingPage> {
    let records = db::list_raw_by_status(pool, RecordStatus::Pending, limit, offset).await?;
    let total = db::count_raw_by_status(pool, RecordStatus::Pending).await?;
    let has_more = offset + (records.len() as i64) < total;
    Ok(PendingPage {
        records,
        total,
        has_more,
    })
}

/// Transform a staged record for reviewer display. Read-only: the record's
/// status is untouched.
#[instrument(skip_all)]
pub async fn review(pool: &Pool, record_id: i64) -> Result<TransformOutcome> {
    let record = db::fetch_raw_record(pool, record_id).await?;
    let hotels = db::list_active_hotels(pool).await?;
    let breakouts = db::list_active_breakouts(pool).await?;
    Ok(transform::transform(&record, &hotels, &breakouts))
}

fn validate_draft(draft: &AttendeeDraft) -> Vec<String> {
    let mut errors = Vec::new();
    for (field, value) in [
        ("first_name", &draft.first_name),
        ("last_name", &draft.last_name),
        ("title", &draft.title),
        ("company", &draft.company),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("missing required field: {field}"));
        }
    }
    errors
}

/// Approve a reviewed record: re-validate the (possibly edited) draft, check
/// for duplicates, persist primary and spouse as one unit, and mark the
/// record approved.
///
/// On persistence failure the record stays `pending` and the failure is
/// appended to its `processing_errors`.
#[instrument(skip_all)]
pub async fn approve(
    pool: &Pool,
    record_id: i64,
    main: &AttendeeDraft,
    spouse: Option<&AttendeeDraft>,
    decision: DuplicateDecision,
) -> Result<ApproveOutcome> {
    let record = db::fetch_raw_record(pool, record_id).await?;
    if record.status != RecordStatus::Pending {
        return Ok(ApproveOutcome::NotPending);
    }

    let errors = validate_draft(main);
    if !errors.is_empty() {
        return Ok(ApproveOutcome::ValidationFailed(errors));
    }

    if decision == DuplicateDecision::Abort {
        let existing = db::list_attendees(pool).await?;
        let matches: Vec<DuplicateMatch> =
            matcher::find_duplicates(std::slice::from_ref(main), &existing)
                .into_iter()
                .filter(|m| m.confidence == MatchConfidence::High)
                .collect();
        if !matches.is_empty() {
            info!(record_id, hits = matches.len(), "duplicate candidates found");
            return Ok(ApproveOutcome::DuplicateFound(matches));
        }
    }

    match persist_approval(pool, record_id, main, spouse, decision).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            warn!(record_id, ?err, "approval failed; record stays pending");
            db::append_processing_error(pool, record_id, &format!("approval failed: {err:#}"))
                .await?;
            Err(err)
        }
    }
}

/// Write attendee rows and flip the record status as one transaction. The
/// conditional status update runs last; losing the race rolls everything
/// back.
async fn persist_approval(
    pool: &Pool,
    record_id: i64,
    main: &AttendeeDraft,
    spouse: Option<&AttendeeDraft>,
    decision: DuplicateDecision,
) -> Result<ApproveOutcome> {
    let mut tx = pool.begin().await?;

    let attendee_id = match decision {
        DuplicateDecision::Update { attendee_id } => {
            db::update_attendee_tx(&mut tx, attendee_id, main)
                .await
                .context("failed to update existing attendee")?;
            attendee_id
        }
        _ => db::insert_attendee_tx(&mut tx, main, false, None)
            .await
            .context("failed to persist attendee")?,
    };

    let mut spouse_id = None;
    if main.has_spouse {
        if let Some(spouse_draft) = spouse.filter(|s| !s.first_name.trim().is_empty()) {
            let mut linked = spouse_draft.clone();
            linked.has_spouse = false;
            let id = db::insert_attendee_tx(&mut tx, &linked, true, Some(attendee_id))
                .await
                .context("failed to persist spouse attendee")?;
            spouse_id = Some(id);
        }
    }

    if !db::mark_raw_status_if_pending_tx(&mut tx, record_id, RecordStatus::Approved).await? {
        tx.rollback().await?;
        return Ok(ApproveOutcome::NotPending);
    }

    tx.commit().await?;
    info!(record_id, attendee_id, ?spouse_id, "record approved");
    Ok(ApproveOutcome::Approved {
        attendee_id,
        spouse_id,
    })
}

/// Mark a pending record rejected, recording the optional reason on its
/// processing log. Attendee tables are untouched. Returns false when the
/// record was not pending.
#[instrument(skip_all)]
pub async fn reject(pool: &Pool, record_id: i64, reason: Option<&str>) -> Result<bool> {
    let mut tx = pool.begin().await?;
    if !db::mark_raw_status_if_pending_tx(&mut tx, record_id, RecordStatus::Rejected).await? {
        tx.rollback().await?;
        return Ok(false);
    }
    if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
        db::append_processing_error_tx(&mut tx, record_id, &format!("rejected: {reason}")).await?;
    }
    tx.commit().await?;
    info!(record_id, "record rejected");
    Ok(true)
}

/// Delete a raw record unconditionally. Used for junk/test registrations;
/// unlike reject, this leaves no audit trail.
#[instrument(skip_all)]
pub async fn ignore(pool: &Pool, record_id: i64) -> Result<bool> {
    let deleted = db::delete_raw_record(pool, record_id).await?;
    if deleted {
        info!(record_id, "record ignored (deleted)");
    }
    Ok(deleted)
}

/// Per-status counts, aggregated on read.
#[instrument(skip_all)]
pub async fn stats(pool: &Pool) -> Result<QueueStats> {
    db::status_counts(pool).await
}
