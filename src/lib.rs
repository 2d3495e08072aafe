//! IDLoom registration ingestion and review pipeline.
//!
//! Raw vendor records are staged untouched in `raw_attendee_data`, transformed
//! on demand into canonical attendee drafts, checked for duplicates against
//! existing attendees, and only committed to the `attendees` table by an
//! explicit reviewer approval.

pub mod config;
pub mod db;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod queue;
pub mod transform;
