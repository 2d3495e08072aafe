use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a staged raw registration record.
///
/// `pending` records may also be deleted outright ("ignore"), which is not a
/// transition and leaves no audit trail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Approved => "approved",
            RecordStatus::Rejected => "rejected",
            RecordStatus::Failed => "failed",
        }
    }

    pub fn parse_state(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecordStatus::Pending),
            "approved" => Some(RecordStatus::Approved),
            "rejected" => Some(RecordStatus::Rejected),
            "failed" => Some(RecordStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse_state(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(RegistrationStatus::Confirmed),
            "pending" => Some(RegistrationStatus::Pending),
            "cancelled" => Some(RegistrationStatus::Cancelled),
            _ => None,
        }
    }
}

/// Canonical fund affiliation. The empty variant means "not stated".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FundAffiliation {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "buyout")]
    Buyout,
    #[serde(rename = "digital")]
    Digital,
    #[serde(rename = "impact")]
    Impact,
    #[serde(rename = "other")]
    Other,
}

impl FundAffiliation {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundAffiliation::None => "",
            FundAffiliation::Buyout => "buyout",
            FundAffiliation::Digital => "digital",
            FundAffiliation::Impact => "impact",
            FundAffiliation::Other => "other",
        }
    }
}

/// Fixed set of role/category flags. Modeled as a closed struct rather than an
/// open map so a misspelled flag is a compile error, not silent data loss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AttendeeAttributes {
    #[serde(rename = "apaxIP", default)]
    pub apax_ip: bool,
    #[serde(rename = "apaxEP", default)]
    pub apax_ep: bool,
    #[serde(rename = "apaxOEP", default)]
    pub apax_oep: bool,
    #[serde(rename = "apaxOther", default)]
    pub apax_other: bool,
    #[serde(rename = "portfolioCompanyExecutive", default)]
    pub portfolio_company_executive: bool,
    #[serde(rename = "sponsorAttendee", default)]
    pub sponsor_attendee: bool,
    #[serde(default)]
    pub speaker: bool,
    #[serde(default)]
    pub ceo: bool,
    #[serde(default)]
    pub cfo: bool,
    #[serde(default)]
    pub cmo: bool,
    #[serde(default)]
    pub cro: bool,
    #[serde(default)]
    pub coo: bool,
    #[serde(default)]
    pub chro: bool,
    #[serde(rename = "cto_cio", default)]
    pub cto_cio: bool,
    #[serde(rename = "cLevelExec", default)]
    pub c_level_exec: bool,
    #[serde(rename = "nonCLevelExec", default)]
    pub non_c_level_exec: bool,
    #[serde(rename = "otherAttendeeType", default)]
    pub other_attendee_type: bool,
    #[serde(rename = "fundAffiliation", default)]
    pub fund_affiliation: FundAffiliation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DiningSelection {
    pub attending: bool,
    #[serde(rename = "tableNumber", default, skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
}

/// Partial spouse record carried on the primary draft. A separate attendee row
/// is only created from it at approval time when `first_name` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SpouseDetails {
    #[serde(default)]
    pub salutation: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile_phone: String,
    #[serde(default)]
    pub dietary_requirements: String,
}

impl SpouseDetails {
    pub fn is_empty(&self) -> bool {
        self.salutation.is_empty()
            && self.first_name.is_empty()
            && self.last_name.is_empty()
            && self.email.is_empty()
            && self.mobile_phone.is_empty()
            && self.dietary_requirements.is_empty()
    }
}

/// Normalized attendee draft: transformer output, reviewer-editable, and the
/// shape persisted into the `attendees` table on approval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AttendeeDraft {
    #[serde(default)]
    pub salutation: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Optional: spouses and privacy-preferring registrants may have none.
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub business_phone: String,
    #[serde(default)]
    pub mobile_phone: String,
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub assistant_name: String,
    #[serde(default)]
    pub assistant_email: String,
    #[serde(default)]
    pub check_in_date: String,
    #[serde(default)]
    pub check_out_date: String,
    /// Hotel record id, `"custom"`, or empty (own arrangements).
    #[serde(default)]
    pub hotel_selection: String,
    /// Free text, populated only when `hotel_selection == "custom"`.
    #[serde(default)]
    pub custom_hotel: String,
    #[serde(default)]
    pub hotel_notes: String,
    /// Resolved breakout-session identifiers. Unresolved selections are kept
    /// as their raw string and surfaced as a warning by the transformer.
    #[serde(default)]
    pub selected_breakouts: Vec<String>,
    #[serde(default)]
    pub dining_selections: BTreeMap<String, DiningSelection>,
    #[serde(default)]
    pub registration_status: RegistrationStatus,
    #[serde(default)]
    pub registration_id: String,
    /// 6-digit code; generated by the transformer when the vendor omits it.
    #[serde(default)]
    pub access_code: String,
    /// External IDLoom id; immutable once set.
    #[serde(default)]
    pub idloom_id: String,
    #[serde(default)]
    pub attributes: AttendeeAttributes,
    #[serde(default)]
    pub has_spouse: bool,
    #[serde(default)]
    pub spouse_details: SpouseDetails,
}

/// Canonical persisted attendee row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attendee {
    pub id: i64,
    pub is_spouse: bool,
    pub primary_attendee_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub draft: AttendeeDraft,
}

/// One staged record from the external registration vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: i64,
    pub guest_uid: String,
    pub event_uid: String,
    pub batch_id: String,
    /// Vendor payload, stored untouched. Schema is not fixed; the vendor may
    /// add or remove fields between events.
    pub payload: serde_json::Value,
    pub status: RecordStatus,
    /// Append-only: failures accumulate across attempts, never rewritten.
    pub processing_errors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub display_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakoutSession {
    pub id: String,
    pub title: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Email,
    Name,
    Both,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    Low,
    Medium,
    High,
}

/// A confidence-tagged hit from the duplicate matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMatch {
    /// Index of the candidate within the batch passed to `find_duplicates`.
    pub candidate_index: usize,
    pub existing: Attendee,
    pub match_type: MatchType,
    pub confidence: MatchConfidence,
}

/// Result of transforming one raw record into reviewable drafts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformOutcome {
    pub success: bool,
    pub main_attendee: AttendeeDraft,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spouse_attendee: Option<AttendeeDraft>,
    pub selected_breakouts: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Per-status record counts, derived by aggregation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub failed: i64,
}
