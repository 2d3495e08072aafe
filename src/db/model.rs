//! View models returned by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

use crate::model::RawRecord;
use serde::Serialize;

/// One page of pending raw records, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct PendingPage {
    pub records: Vec<RawRecord>,
    pub total: i64,
    pub has_more: bool,
}
