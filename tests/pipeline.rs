use anyhow::Result;
use idloom_review::db;
use idloom_review::model::{MatchConfidence, RecordStatus};
use idloom_review::queue::{self, ApproveOutcome, DuplicateDecision};
use serde_json::json;

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

async fn seed_reference_data(pool: &sqlx::SqlitePool) -> Result<()> {
    db::insert_hotel(pool, "h-hyatt", "Grand Hyatt Berlin", 1).await?;
    db::insert_hotel(pool, "h-ritz", "The Ritz", 2).await?;
    db::insert_breakout(pool, "value-creation-pricing", "Value Creation: Pricing").await?;
    db::insert_breakout(pool, "ai-portfolio", "AI in Practice (2026 edition)").await?;
    Ok(())
}

fn ana_lee_payload() -> serde_json::Value {
    json!({
        "first_name": "Ana",
        "last_name": "Lee",
        "email": "ana@co.com",
        "title": "CFO",
        "company": "Co",
        "mobile_phone": "+49 151 1234",
        "hotel": "Hyatt",
        "breakout1": "Value Creation: Pricing",
        "accompanying_person": "1",
        "spouse_first_name": "Max",
        "spouse_last_name": "Lee"
    })
}

#[tokio::test]
async fn end_to_end_approval_with_spouse() {
    let pool = setup_pool().await;
    seed_reference_data(&pool).await.unwrap();

    let record_id = db::insert_raw_record(&pool, "g-1", "e-1", "b-1", &ana_lee_payload())
        .await
        .unwrap();

    // Review is read-only and does not change status.
    let outcome = queue::review(&pool, record_id).await.unwrap();
    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert!(outcome.main_attendee.attributes.cfo);
    assert!(outcome.main_attendee.attributes.c_level_exec);
    assert!(outcome.main_attendee.has_spouse);
    assert_eq!(outcome.main_attendee.hotel_selection, "h-hyatt");
    assert_eq!(
        outcome.selected_breakouts,
        vec!["value-creation-pricing".to_string()]
    );
    let spouse = outcome.spouse_attendee.clone().expect("spouse draft");
    assert_eq!(spouse.first_name, "Max");
    let rec = db::fetch_raw_record(&pool, record_id).await.unwrap();
    assert_eq!(rec.status, RecordStatus::Pending);

    // Approve persists two linked rows and marks the record approved.
    let approved = queue::approve(
        &pool,
        record_id,
        &outcome.main_attendee,
        outcome.spouse_attendee.as_ref(),
        DuplicateDecision::Abort,
    )
    .await
    .unwrap();
    let (attendee_id, spouse_id) = match approved {
        ApproveOutcome::Approved {
            attendee_id,
            spouse_id,
        } => (attendee_id, spouse_id),
        other => panic!("expected approval, got {other:?}"),
    };
    let spouse_id = spouse_id.expect("spouse persisted");

    let primary = db::fetch_attendee(&pool, attendee_id).await.unwrap().unwrap();
    assert!(!primary.is_spouse);
    assert_eq!(primary.draft.first_name, "Ana");
    assert!(primary.draft.has_spouse);

    let spouse_row = db::fetch_attendee(&pool, spouse_id).await.unwrap().unwrap();
    assert!(spouse_row.is_spouse);
    assert_eq!(spouse_row.primary_attendee_id, Some(attendee_id));
    assert_eq!(spouse_row.draft.first_name, "Max");
    // The spouse row does not inherit the primary's registration/contact data.
    assert!(spouse_row.draft.company.is_empty());
    assert!(spouse_row.draft.email.is_empty());

    let rec = db::fetch_raw_record(&pool, record_id).await.unwrap();
    assert_eq!(rec.status, RecordStatus::Approved);
}

#[tokio::test]
async fn double_approval_imports_exactly_once() {
    let pool = setup_pool().await;
    seed_reference_data(&pool).await.unwrap();
    let record_id = db::insert_raw_record(&pool, "g-1", "e-1", "b-1", &ana_lee_payload())
        .await
        .unwrap();

    let outcome = queue::review(&pool, record_id).await.unwrap();
    let first = queue::approve(
        &pool,
        record_id,
        &outcome.main_attendee,
        outcome.spouse_attendee.as_ref(),
        DuplicateDecision::Abort,
    )
    .await
    .unwrap();
    assert!(matches!(first, ApproveOutcome::Approved { .. }));

    // Simulated race: a second reviewer approves the same record. Duplicate
    // checking is bypassed to exercise the status guard itself.
    let second = queue::approve(
        &pool,
        record_id,
        &outcome.main_attendee,
        outcome.spouse_attendee.as_ref(),
        DuplicateDecision::ImportAnyway,
    )
    .await
    .unwrap();
    assert!(matches!(second, ApproveOutcome::NotPending));

    let attendees = db::list_attendees(&pool).await.unwrap();
    assert_eq!(attendees.len(), 2); // primary + spouse, once
}

#[tokio::test]
async fn duplicate_is_reported_and_resolvable() {
    let pool = setup_pool().await;
    seed_reference_data(&pool).await.unwrap();

    // First registration goes straight through.
    let r1 = db::insert_raw_record(&pool, "g-1", "e-1", "b-1", &ana_lee_payload())
        .await
        .unwrap();
    let out1 = queue::review(&pool, r1).await.unwrap();
    queue::approve(&pool, r1, &out1.main_attendee, None, DuplicateDecision::Abort)
        .await
        .unwrap();

    // Second record with the same email is flagged, not silently imported.
    let payload = json!({
        "first_name": "Anna",
        "last_name": "Lee",
        "email": "ana@co.com",
        "title": "CFO",
        "company": "Co"
    });
    let r2 = db::insert_raw_record(&pool, "g-2", "e-1", "b-2", &payload)
        .await
        .unwrap();
    let out2 = queue::review(&pool, r2).await.unwrap();
    let result = queue::approve(&pool, r2, &out2.main_attendee, None, DuplicateDecision::Abort)
        .await
        .unwrap();
    let matches = match result {
        ApproveOutcome::DuplicateFound(matches) => matches,
        other => panic!("expected duplicate report, got {other:?}"),
    };
    assert_eq!(matches[0].confidence, MatchConfidence::High);
    let existing_id = matches[0].existing.id;

    // Record stays pending until the reviewer decides.
    let rec = db::fetch_raw_record(&pool, r2).await.unwrap();
    assert_eq!(rec.status, RecordStatus::Pending);

    // Resolve by updating the existing attendee.
    let result = queue::approve(
        &pool,
        r2,
        &out2.main_attendee,
        None,
        DuplicateDecision::Update {
            attendee_id: existing_id,
        },
    )
    .await
    .unwrap();
    assert!(matches!(result, ApproveOutcome::Approved { .. }));

    let attendees = db::list_attendees(&pool).await.unwrap();
    let non_spouse: Vec<_> = attendees.iter().filter(|a| !a.is_spouse).collect();
    assert_eq!(non_spouse.len(), 1);
    assert_eq!(non_spouse[0].draft.first_name, "Anna");
    let rec = db::fetch_raw_record(&pool, r2).await.unwrap();
    assert_eq!(rec.status, RecordStatus::Approved);
}

#[tokio::test]
async fn validation_failure_blocks_approval() {
    let pool = setup_pool().await;
    seed_reference_data(&pool).await.unwrap();
    let payload = json!({
        "first_name": "Ana",
        "title": "CFO",
        "company": "Co"
    });
    let record_id = db::insert_raw_record(&pool, "g-1", "e-1", "b-1", &payload)
        .await
        .unwrap();

    let outcome = queue::review(&pool, record_id).await.unwrap();
    assert!(!outcome.success);

    let result = queue::approve(
        &pool,
        record_id,
        &outcome.main_attendee,
        None,
        DuplicateDecision::Abort,
    )
    .await
    .unwrap();
    assert!(matches!(result, ApproveOutcome::ValidationFailed(_)));

    let rec = db::fetch_raw_record(&pool, record_id).await.unwrap();
    assert_eq!(rec.status, RecordStatus::Pending);
    assert!(db::list_attendees(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn reject_keeps_audit_trail_and_attendees_untouched() {
    let pool = setup_pool().await;
    let record_id = db::insert_raw_record(&pool, "g-1", "e-1", "b-1", &ana_lee_payload())
        .await
        .unwrap();

    assert!(queue::reject(&pool, record_id, Some("test registration"))
        .await
        .unwrap());

    let rec = db::fetch_raw_record(&pool, record_id).await.unwrap();
    assert_eq!(rec.status, RecordStatus::Rejected);
    assert_eq!(
        rec.processing_errors,
        vec!["rejected: test registration".to_string()]
    );
    assert!(db::list_attendees(&pool).await.unwrap().is_empty());

    // Terminal: a second reject is refused.
    assert!(!queue::reject(&pool, record_id, None).await.unwrap());
}

#[tokio::test]
async fn ignore_deletes_without_trace() {
    let pool = setup_pool().await;
    let record_id = db::insert_raw_record(&pool, "g-1", "e-1", "b-1", &json!({}))
        .await
        .unwrap();

    assert!(queue::ignore(&pool, record_id).await.unwrap());
    assert!(db::fetch_raw_record(&pool, record_id).await.is_err());
    assert!(!queue::ignore(&pool, record_id).await.unwrap());
}

#[tokio::test]
async fn pending_list_paginates_newest_first() {
    let pool = setup_pool().await;
    for i in 0..3 {
        db::insert_raw_record(&pool, &format!("g-{i}"), "e-1", "b-1", &json!({}))
            .await
            .unwrap();
    }

    let page = queue::list_pending(&pool, 2, 0).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.records.len(), 2);
    assert!(page.has_more);
    // Same-second inserts fall back to id ordering, newest first.
    assert!(page.records[0].id > page.records[1].id);

    let page = queue::list_pending(&pool, 2, 2).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert!(!page.has_more);
}

#[tokio::test]
async fn stats_track_the_queue() {
    let pool = setup_pool().await;
    seed_reference_data(&pool).await.unwrap();
    let r1 = db::insert_raw_record(&pool, "g-1", "e-1", "b-1", &ana_lee_payload())
        .await
        .unwrap();
    let _r2 = db::insert_raw_record(&pool, "g-2", "e-1", "b-1", &json!({}))
        .await
        .unwrap();
    let r3 = db::insert_raw_record(&pool, "g-3", "e-1", "b-1", &json!({}))
        .await
        .unwrap();

    let out = queue::review(&pool, r1).await.unwrap();
    queue::approve(
        &pool,
        r1,
        &out.main_attendee,
        out.spouse_attendee.as_ref(),
        DuplicateDecision::Abort,
    )
    .await
    .unwrap();
    queue::reject(&pool, r3, None).await.unwrap();

    let stats = queue::stats(&pool).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.approved, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.failed, 0);
}
