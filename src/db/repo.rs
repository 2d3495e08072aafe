use crate::model::{
    Attendee, AttendeeDraft, BreakoutSession, Hotel, QueueStats, RawRecord, RecordStatus,
    RegistrationStatus,
};
use anyhow::{anyhow, Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Transaction};
use sqlx::{Sqlite, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the
/// parent directory exists. Leaves in-memory URLs untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = if let Some(rest) = path_part.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        } else {
            path_part.to_string()
        }
    } else {
        path_part.to_string()
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// raw_attendee_data

#[instrument(skip_all)]
pub async fn insert_raw_record(
    pool: &Pool,
    guest_uid: &str,
    event_uid: &str,
    batch_id: &str,
    payload: &serde_json::Value,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO raw_attendee_data (guest_uid, event_uid, batch_id, payload, status) \
         VALUES (?, ?, ?, ?, 'pending') RETURNING id",
    )
    .bind(guest_uid)
    .bind(event_uid)
    .bind(batch_id)
    .bind(payload.to_string())
    .fetch_one(pool)
    .await
    .context("failed to stage raw record")?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn fetch_raw_record(pool: &Pool, id: i64) -> Result<RawRecord> {
    let row = sqlx::query("SELECT * FROM raw_attendee_data WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Err(anyhow!("raw record {} not found", id));
    };
    raw_record_from_row(&row)
}

#[instrument(skip_all)]
pub async fn list_raw_by_status(
    pool: &Pool,
    status: RecordStatus,
    limit: i64,
    offset: i64,
) -> Result<Vec<RawRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM raw_attendee_data WHERE status = ? \
         ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(status.as_str())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    rows.iter().map(raw_record_from_row).collect()
}

#[instrument(skip_all)]
pub async fn count_raw_by_status(pool: &Pool, status: RecordStatus) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_attendee_data WHERE status = ?")
        .bind(status.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Per-status counts, derived by aggregation so they cannot drift.
#[instrument(skip_all)]
pub async fn status_counts(pool: &Pool) -> Result<QueueStats> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM raw_attendee_data GROUP BY status")
        .fetch_all(pool)
        .await?;
    let mut stats = QueueStats::default();
    for row in rows {
        let status: String = row.get("status");
        let n: i64 = row.get("n");
        stats.total += n;
        match RecordStatus::parse_state(&status) {
            Some(RecordStatus::Pending) => stats.pending = n,
            Some(RecordStatus::Approved) => stats.approved = n,
            Some(RecordStatus::Rejected) => stats.rejected = n,
            Some(RecordStatus::Failed) => stats.failed = n,
            None => {}
        }
    }
    Ok(stats)
}

/// Conditionally transition a pending record to a terminal status. Returns
/// false when the record was no longer pending (lost race or already
/// terminal); the caller must then roll back any work done alongside it.
pub async fn mark_raw_status_if_pending_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    status: RecordStatus,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE raw_attendee_data SET status = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(status.as_str())
    .bind(id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Append one message to the record's `processing_errors` JSON array. The
/// column is append-only; existing entries are never rewritten.
#[instrument(skip_all)]
pub async fn append_processing_error(pool: &Pool, id: i64, message: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    append_processing_error_tx(&mut tx, id, message).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn append_processing_error_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    message: &str,
) -> Result<()> {
    let current: Option<String> =
        sqlx::query_scalar("SELECT processing_errors FROM raw_attendee_data WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
    let Some(current) = current else {
        return Err(anyhow!("raw record {} not found", id));
    };
    let mut errors: Vec<String> = serde_json::from_str(&current).unwrap_or_default();
    errors.push(message.to_string());
    sqlx::query("UPDATE raw_attendee_data SET processing_errors = ? WHERE id = ?")
        .bind(serde_json::to_string(&errors)?)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Delete a raw record unconditionally ("ignore"). Returns false when no such
/// record existed.
#[instrument(skip_all)]
pub async fn delete_raw_record(pool: &Pool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM raw_attendee_data WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

fn raw_record_from_row(row: &SqliteRow) -> Result<RawRecord> {
    let id: i64 = row.get("id");
    let status_str: String = row.get("status");
    let status = RecordStatus::parse_state(&status_str)
        .ok_or_else(|| anyhow!("raw record {} has unknown status {}", id, status_str))?;
    let payload_str: String = row.get("payload");
    let payload = serde_json::from_str(&payload_str)
        .with_context(|| format!("raw record {} has unparseable payload", id))?;
    let errors_str: String = row.get("processing_errors");
    let processing_errors: Vec<String> = serde_json::from_str(&errors_str).unwrap_or_default();
    Ok(RawRecord {
        id,
        guest_uid: row.get("guest_uid"),
        event_uid: row.get("event_uid"),
        batch_id: row.get("batch_id"),
        payload,
        status,
        processing_errors,
        created_at: row.get("created_at"),
    })
}

// ---------------------------------------------------------------------------
// attendees

const ATTENDEE_COLUMNS: &str = "salutation, first_name, last_name, email, title, company, \
     business_phone, mobile_phone, address1, address2, city, state, postal_code, country, \
     country_code, assistant_name, assistant_email, check_in_date, check_out_date, \
     hotel_selection, custom_hotel, hotel_notes, selected_breakouts, dining_selections, \
     registration_status, registration_id, access_code, idloom_id, attributes, has_spouse, \
     spouse_details, is_spouse, primary_attendee_id";

/// Insert a canonical attendee row inside the caller's transaction. Approval
/// writes primary and spouse through the same transaction so they land (or
/// fail) as one unit.
pub async fn insert_attendee_tx(
    tx: &mut Transaction<'_, Sqlite>,
    draft: &AttendeeDraft,
    is_spouse: bool,
    primary_attendee_id: Option<i64>,
) -> Result<i64> {
    let sql = format!(
        "INSERT INTO attendees ({ATTENDEE_COLUMNS}) VALUES \
         (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         RETURNING id"
    );
    let rec = bind_draft(sqlx::query(&sql), draft)
        .bind(is_spouse)
        .bind(primary_attendee_id)
        .fetch_one(&mut **tx)
        .await
        .context("failed to insert attendee")?;
    Ok(rec.get::<i64, _>("id"))
}

/// Overwrite an existing attendee row from a draft (duplicate resolution via
/// "update"). Identity/linkage columns are left untouched.
pub async fn update_attendee_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    draft: &AttendeeDraft,
) -> Result<()> {
    let sql = "UPDATE attendees SET \
         salutation = ?, first_name = ?, last_name = ?, email = ?, title = ?, company = ?, \
         business_phone = ?, mobile_phone = ?, address1 = ?, address2 = ?, city = ?, state = ?, \
         postal_code = ?, country = ?, country_code = ?, assistant_name = ?, assistant_email = ?, \
         check_in_date = ?, check_out_date = ?, hotel_selection = ?, custom_hotel = ?, \
         hotel_notes = ?, selected_breakouts = ?, dining_selections = ?, registration_status = ?, \
         registration_id = ?, access_code = ?, idloom_id = ?, attributes = ?, has_spouse = ?, \
         spouse_details = ? \
         WHERE id = ?";
    let result = bind_draft(sqlx::query(sql), draft)
        .bind(id)
        .execute(&mut **tx)
        .await
        .context("failed to update attendee")?;
    if result.rows_affected() != 1 {
        return Err(anyhow!("attendee {} not found", id));
    }
    Ok(())
}

fn bind_draft<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    draft: &'q AttendeeDraft,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(draft.salutation.as_str())
        .bind(draft.first_name.as_str())
        .bind(draft.last_name.as_str())
        .bind(draft.email.as_str())
        .bind(draft.title.as_str())
        .bind(draft.company.as_str())
        .bind(draft.business_phone.as_str())
        .bind(draft.mobile_phone.as_str())
        .bind(draft.address1.as_str())
        .bind(draft.address2.as_str())
        .bind(draft.city.as_str())
        .bind(draft.state.as_str())
        .bind(draft.postal_code.as_str())
        .bind(draft.country.as_str())
        .bind(draft.country_code.as_str())
        .bind(draft.assistant_name.as_str())
        .bind(draft.assistant_email.as_str())
        .bind(draft.check_in_date.as_str())
        .bind(draft.check_out_date.as_str())
        .bind(draft.hotel_selection.as_str())
        .bind(draft.custom_hotel.as_str())
        .bind(draft.hotel_notes.as_str())
        .bind(serde_json::to_string(&draft.selected_breakouts).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&draft.dining_selections).unwrap_or_else(|_| "{}".into()))
        .bind(draft.registration_status.as_str())
        .bind(draft.registration_id.as_str())
        .bind(draft.access_code.as_str())
        .bind(draft.idloom_id.as_str())
        .bind(serde_json::to_string(&draft.attributes).unwrap_or_else(|_| "{}".into()))
        .bind(draft.has_spouse)
        .bind(serde_json::to_string(&draft.spouse_details).unwrap_or_else(|_| "{}".into()))
}

#[instrument(skip_all)]
pub async fn list_attendees(pool: &Pool) -> Result<Vec<Attendee>> {
    let rows = sqlx::query("SELECT * FROM attendees ORDER BY id")
        .fetch_all(pool)
        .await?;
    rows.iter().map(attendee_from_row).collect()
}

#[instrument(skip_all)]
pub async fn fetch_attendee(pool: &Pool, id: i64) -> Result<Option<Attendee>> {
    let row = sqlx::query("SELECT * FROM attendees WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(attendee_from_row).transpose()
}

fn attendee_from_row(row: &SqliteRow) -> Result<Attendee> {
    let id: i64 = row.get("id");
    let status_str: String = row.get("registration_status");
    let registration_status = RegistrationStatus::parse_state(&status_str)
        .ok_or_else(|| anyhow!("attendee {} has unknown registration status {}", id, status_str))?;

    let selected_breakouts: Vec<String> =
        serde_json::from_str(row.get::<&str, _>("selected_breakouts")).unwrap_or_default();
    let dining_selections =
        serde_json::from_str(row.get::<&str, _>("dining_selections")).unwrap_or_default();
    let attributes = serde_json::from_str(row.get::<&str, _>("attributes")).unwrap_or_default();
    let spouse_details =
        serde_json::from_str(row.get::<&str, _>("spouse_details")).unwrap_or_default();

    let draft = AttendeeDraft {
        salutation: row.get("salutation"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        title: row.get("title"),
        company: row.get("company"),
        business_phone: row.get("business_phone"),
        mobile_phone: row.get("mobile_phone"),
        address1: row.get("address1"),
        address2: row.get("address2"),
        city: row.get("city"),
        state: row.get("state"),
        postal_code: row.get("postal_code"),
        country: row.get("country"),
        country_code: row.get("country_code"),
        assistant_name: row.get("assistant_name"),
        assistant_email: row.get("assistant_email"),
        check_in_date: row.get("check_in_date"),
        check_out_date: row.get("check_out_date"),
        hotel_selection: row.get("hotel_selection"),
        custom_hotel: row.get("custom_hotel"),
        hotel_notes: row.get("hotel_notes"),
        selected_breakouts,
        dining_selections,
        registration_status,
        registration_id: row.get("registration_id"),
        access_code: row.get("access_code"),
        idloom_id: row.get("idloom_id"),
        attributes,
        has_spouse: row.get("has_spouse"),
        spouse_details,
    };

    Ok(Attendee {
        id,
        is_spouse: row.get("is_spouse"),
        primary_attendee_id: row.get("primary_attendee_id"),
        created_at: row.get("created_at"),
        draft,
    })
}

// ---------------------------------------------------------------------------
// reference data

#[instrument(skip_all)]
pub async fn list_active_hotels(pool: &Pool) -> Result<Vec<Hotel>> {
    let rows = sqlx::query(
        "SELECT id, name, is_active, display_order FROM hotels \
         WHERE is_active = 1 ORDER BY display_order, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| Hotel {
            id: row.get("id"),
            name: row.get("name"),
            is_active: row.get("is_active"),
            display_order: row.get("display_order"),
        })
        .collect())
}

#[instrument(skip_all)]
pub async fn list_active_breakouts(pool: &Pool) -> Result<Vec<BreakoutSession>> {
    let rows = sqlx::query(
        "SELECT id, title, is_active FROM agenda_items \
         WHERE type = 'breakout' AND is_active = 1 ORDER BY date, start_time, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| BreakoutSession {
            id: row.get("id"),
            title: row.get("title"),
            is_active: row.get("is_active"),
        })
        .collect())
}

pub async fn insert_hotel(pool: &Pool, id: &str, name: &str, display_order: i64) -> Result<()> {
    sqlx::query("INSERT INTO hotels (id, name, is_active, display_order) VALUES (?, ?, 1, ?)")
        .bind(id)
        .bind(name)
        .bind(display_order)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_breakout(pool: &Pool, id: &str, title: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO agenda_items (id, title, type, is_active) VALUES (?, ?, 'breakout', 1)",
    )
    .bind(id)
    .bind(title)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn raw_record_round_trip() {
        let pool = setup_pool().await;
        let id = insert_raw_record(
            &pool,
            "g-1",
            "e-1",
            "b-1",
            &json!({"first_name": "Ana"}),
        )
        .await
        .unwrap();
        let rec = fetch_raw_record(&pool, id).await.unwrap();
        assert_eq!(rec.guest_uid, "g-1");
        assert_eq!(rec.status, RecordStatus::Pending);
        assert_eq!(rec.payload["first_name"], "Ana");
        assert!(rec.processing_errors.is_empty());
    }

    #[tokio::test]
    async fn processing_errors_are_appended_not_rewritten() {
        let pool = setup_pool().await;
        let id = insert_raw_record(&pool, "g-1", "e-1", "b-1", &json!({}))
            .await
            .unwrap();
        append_processing_error(&pool, id, "first failure").await.unwrap();
        append_processing_error(&pool, id, "second failure").await.unwrap();
        let rec = fetch_raw_record(&pool, id).await.unwrap();
        assert_eq!(
            rec.processing_errors,
            vec!["first failure".to_string(), "second failure".to_string()]
        );
    }

    #[tokio::test]
    async fn conditional_transition_only_fires_once() {
        let pool = setup_pool().await;
        let id = insert_raw_record(&pool, "g-1", "e-1", "b-1", &json!({}))
            .await
            .unwrap();

        let mut tx = pool.begin().await.unwrap();
        assert!(mark_raw_status_if_pending_tx(&mut tx, id, RecordStatus::Approved)
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        assert!(!mark_raw_status_if_pending_tx(&mut tx, id, RecordStatus::Rejected)
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let rec = fetch_raw_record(&pool, id).await.unwrap();
        assert_eq!(rec.status, RecordStatus::Approved);
    }

    #[tokio::test]
    async fn attendee_round_trip_preserves_attributes() {
        let pool = setup_pool().await;
        let mut draft = AttendeeDraft {
            first_name: "Ana".into(),
            last_name: "Lee".into(),
            email: "ana@co.com".into(),
            title: "CFO".into(),
            company: "Co".into(),
            ..Default::default()
        };
        draft.attributes.cfo = true;
        draft.attributes.c_level_exec = true;
        draft.selected_breakouts = vec!["value-creation-pricing".into()];

        let mut tx = pool.begin().await.unwrap();
        let id = insert_attendee_tx(&mut tx, &draft, false, None).await.unwrap();
        tx.commit().await.unwrap();

        let stored = fetch_attendee(&pool, id).await.unwrap().unwrap();
        assert!(stored.draft.attributes.cfo);
        assert!(!stored.is_spouse);
        assert_eq!(stored.draft.selected_breakouts, draft.selected_breakouts);
    }

    #[tokio::test]
    async fn status_counts_aggregate() {
        let pool = setup_pool().await;
        for i in 0..3 {
            insert_raw_record(&pool, &format!("g-{i}"), "e-1", "b-1", &json!({}))
                .await
                .unwrap();
        }
        let mut tx = pool.begin().await.unwrap();
        mark_raw_status_if_pending_tx(&mut tx, 1, RecordStatus::Approved)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stats = status_counts(&pool).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approved, 1);
    }

    #[test]
    fn sqlite_url_normalization() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgres://localhost/x"),
            "postgres://localhost/x"
        );
        assert_eq!(
            prepare_sqlite_url("sqlite://./data/review.db"),
            "sqlite://./data/review.db"
        );
    }
}
