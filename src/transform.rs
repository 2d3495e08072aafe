//! Conversion of one opaque vendor payload into reviewable attendee drafts.
//!
//! The vendor schema is not fixed: field names drift between events, so every
//! logical field is looked up under a list of historical aliases. The
//! transformation is pure; nothing here touches storage. Side effects happen
//! only in the review queue's approval step.

use crate::model::{
    AttendeeDraft, BreakoutSession, DiningSelection, Hotel, RawRecord, RegistrationStatus,
    SpouseDetails, TransformOutcome,
};
use crate::normalize::{
    self, coerce_bool, normalize_fund_affiliation, HotelResolution, HOTEL_SELECTION_CUSTOM,
};
use rand::Rng;
use serde_json::Value;

const FIRST_NAME_KEYS: &[&str] = &["first_name", "firstname", "firstName"];
const LAST_NAME_KEYS: &[&str] = &["last_name", "lastname", "lastName"];
const SALUTATION_KEYS: &[&str] = &["salutation", "title_prefix", "prefix"];
const EMAIL_KEYS: &[&str] = &["email", "email_address", "e_mail"];
const TITLE_KEYS: &[&str] = &["title", "job_title", "position"];
const COMPANY_KEYS: &[&str] = &["company", "cpy_name", "organization", "organisation"];
const BUSINESS_PHONE_KEYS: &[&str] = &["business_phone", "phone", "work_phone"];
const MOBILE_PHONE_KEYS: &[&str] = &["mobile_phone", "mobile", "cell_phone"];
const ADDRESS1_KEYS: &[&str] = &["address1", "address", "street"];
const ADDRESS2_KEYS: &[&str] = &["address2", "street2"];
const CITY_KEYS: &[&str] = &["city", "town"];
const STATE_KEYS: &[&str] = &["state", "region", "province"];
const POSTAL_KEYS: &[&str] = &["postal_code", "zip", "zip_code", "postcode"];
const COUNTRY_KEYS: &[&str] = &["country", "country_name"];
const COUNTRY_CODE_KEYS: &[&str] = &["country_code", "iso_country"];
const ASSISTANT_NAME_KEYS: &[&str] = &["assistant_name", "assistant"];
const ASSISTANT_EMAIL_KEYS: &[&str] = &["assistant_email"];
const CHECK_IN_KEYS: &[&str] = &["check_in_date", "check_in", "arrival_date"];
const CHECK_OUT_KEYS: &[&str] = &["check_out_date", "check_out", "departure_date"];
const HOTEL_KEYS: &[&str] = &["hotel", "hotel_name", "accommodation"];
const HOTEL_NOTES_KEYS: &[&str] = &["hotel_notes", "accommodation_notes"];
const REGISTRATION_STATUS_KEYS: &[&str] = &["registration_status", "status"];
const REGISTRATION_ID_KEYS: &[&str] = &["registration_id", "reg_id"];
const ACCESS_CODE_KEYS: &[&str] = &["access_code", "badge_code"];
const IDLOOM_ID_KEYS: &[&str] = &["idloom_id", "guest_uid", "uid"];
const FUND_KEYS: &[&str] = &["fund_affiliation", "fund", "fund_name"];

const SPOUSE_FLAG_KEYS: &[&str] = &["accompanying_person", "has_spouse", "spouse"];
const SPOUSE_SALUTATION_KEYS: &[&str] = &["spouse_salutation", "partner_salutation"];
const SPOUSE_FIRST_KEYS: &[&str] = &["spouse_first_name", "partner_first_name"];
const SPOUSE_LAST_KEYS: &[&str] = &["spouse_last_name", "partner_last_name"];
const SPOUSE_EMAIL_KEYS: &[&str] = &["spouse_email", "partner_email"];
const SPOUSE_MOBILE_KEYS: &[&str] = &["spouse_mobile_phone", "spouse_mobile", "partner_mobile"];
const SPOUSE_DIET_KEYS: &[&str] = &["spouse_dietary_requirements", "spouse_dietary", "partner_dietary"];

/// Session selections arrive either as numbered free-text fields or as a
/// `breakouts` array of titles.
const BREAKOUT_LIST_KEYS: &[&str] = &["breakouts", "breakout_sessions"];
const BREAKOUT_SLOT_KEYS: &[&str] = &[
    "breakout1", "breakout2", "breakout3", "breakout_1", "breakout_2", "breakout_3", "session1",
    "session2", "session3",
];

/// Dining options with their vendor flag aliases and optional table field.
const DINING_OPTIONS: &[(&str, &[&str], &[&str])] = &[
    (
        "welcome-dinner",
        &["welcome_dinner", "dinner_day1"],
        &["welcome_dinner_table", "dinner_day1_table"],
    ),
    (
        "gala-dinner",
        &["gala_dinner", "dinner_day2"],
        &["gala_dinner_table", "dinner_day2_table"],
    ),
];

/// Transform one raw record into an editable main draft, an optional spouse
/// draft, and accumulated warnings/errors. Pure: the record and the store are
/// never mutated here.
pub fn transform(
    raw: &RawRecord,
    hotels: &[Hotel],
    breakouts: &[BreakoutSession],
) -> TransformOutcome {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let Some(payload) = raw.payload.as_object() else {
        return TransformOutcome {
            success: false,
            main_attendee: AttendeeDraft::default(),
            spouse_attendee: None,
            selected_breakouts: Vec::new(),
            warnings,
            errors: vec!["payload is not a JSON object".to_string()],
        };
    };

    let mut draft = AttendeeDraft {
        salutation: get_str(payload, SALUTATION_KEYS),
        first_name: get_str(payload, FIRST_NAME_KEYS),
        last_name: get_str(payload, LAST_NAME_KEYS),
        email: get_str(payload, EMAIL_KEYS).trim().to_lowercase(),
        title: get_str(payload, TITLE_KEYS),
        company: get_str(payload, COMPANY_KEYS),
        business_phone: get_str(payload, BUSINESS_PHONE_KEYS),
        mobile_phone: get_str(payload, MOBILE_PHONE_KEYS),
        address1: get_str(payload, ADDRESS1_KEYS),
        address2: get_str(payload, ADDRESS2_KEYS),
        city: get_str(payload, CITY_KEYS),
        state: get_str(payload, STATE_KEYS),
        postal_code: get_str(payload, POSTAL_KEYS),
        country: get_str(payload, COUNTRY_KEYS),
        country_code: get_str(payload, COUNTRY_CODE_KEYS),
        assistant_name: get_str(payload, ASSISTANT_NAME_KEYS),
        assistant_email: get_str(payload, ASSISTANT_EMAIL_KEYS),
        check_in_date: get_str(payload, CHECK_IN_KEYS),
        check_out_date: get_str(payload, CHECK_OUT_KEYS),
        hotel_notes: get_str(payload, HOTEL_NOTES_KEYS),
        registration_id: get_str(payload, REGISTRATION_ID_KEYS),
        access_code: get_str(payload, ACCESS_CODE_KEYS),
        idloom_id: get_str(payload, IDLOOM_ID_KEYS),
        ..Default::default()
    };

    if draft.idloom_id.is_empty() {
        draft.idloom_id = raw.guest_uid.clone();
    }
    if draft.access_code.is_empty() {
        draft.access_code = generate_access_code();
    }

    draft.registration_status = match get_str(payload, REGISTRATION_STATUS_KEYS)
        .trim()
        .to_lowercase()
        .as_str()
    {
        "" => RegistrationStatus::Confirmed,
        s => RegistrationStatus::parse_state(s).unwrap_or(RegistrationStatus::Confirmed),
    };

    // Hotel: known record, custom fallback, or own arrangements.
    let hotel_name = get_str(payload, HOTEL_KEYS);
    match normalize::resolve_hotel(&hotel_name, hotels) {
        HotelResolution::OwnArrangements => {}
        HotelResolution::Known { hotel_id, ambiguous } => {
            draft.hotel_selection = hotel_id;
            if ambiguous {
                warnings.push(format!("ambiguous hotel match: {hotel_name}"));
            }
        }
        HotelResolution::Custom(name) => {
            draft.hotel_selection = HOTEL_SELECTION_CUSTOM.to_string();
            draft.custom_hotel = name;
        }
    }

    // Breakouts: resolve each selection; keep unresolved ones as raw strings.
    for selection in collect_breakout_selections(payload) {
        match normalize::resolve_breakout(&selection, breakouts) {
            Some(id) => {
                if !draft.selected_breakouts.contains(&id) {
                    draft.selected_breakouts.push(id);
                }
            }
            None => {
                warnings.push(format!("unresolved breakout selection: {selection}"));
                if !draft.selected_breakouts.contains(&selection) {
                    draft.selected_breakouts.push(selection);
                }
            }
        }
    }

    for (option_id, flag_keys, table_keys) in DINING_OPTIONS {
        let raw_flag = get_str(payload, flag_keys);
        if raw_flag.is_empty() {
            continue;
        }
        let table = get_str(payload, table_keys);
        draft.dining_selections.insert(
            (*option_id).to_string(),
            DiningSelection {
                attending: coerce_bool(&raw_flag),
                table_number: (!table.is_empty()).then_some(table),
            },
        );
    }

    infer_attributes(&mut draft, payload);

    // Spouse: a second draft only when the flag is set and a first name exists.
    let spouse_flag = coerce_bool(&get_str(payload, SPOUSE_FLAG_KEYS));
    let mut spouse_attendee = None;
    if spouse_flag {
        draft.has_spouse = true;
        let details = SpouseDetails {
            salutation: get_str(payload, SPOUSE_SALUTATION_KEYS),
            first_name: get_str(payload, SPOUSE_FIRST_KEYS),
            last_name: get_str(payload, SPOUSE_LAST_KEYS),
            email: get_str(payload, SPOUSE_EMAIL_KEYS).trim().to_lowercase(),
            mobile_phone: get_str(payload, SPOUSE_MOBILE_KEYS),
            dietary_requirements: get_str(payload, SPOUSE_DIET_KEYS),
        };
        if !details.first_name.is_empty() && !details.last_name.is_empty() {
            spouse_attendee = Some(AttendeeDraft {
                salutation: details.salutation.clone(),
                first_name: details.first_name.clone(),
                last_name: details.last_name.clone(),
                email: details.email.clone(),
                mobile_phone: details.mobile_phone.clone(),
                access_code: generate_access_code(),
                ..Default::default()
            });
            draft.spouse_details = details;
        }
        // Flag without a usable first+last name: keep has_spouse, produce no
        // spouse draft, and leave spouse_details empty.
    }

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
    if draft.business_phone.is_empty() && draft.mobile_phone.is_empty() {
        warnings.push("no phone number provided".to_string());
    }

    TransformOutcome {
        success: errors.is_empty(),
        selected_breakouts: draft.selected_breakouts.clone(),
        main_attendee: draft,
        spouse_attendee,
        warnings,
        errors,
    }
}

/// Look a logical field up under its historical aliases. Scalars other than
/// strings are stringified; objects/arrays and null read as absent.
fn get_str(payload: &serde_json::Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        match payload.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return s.trim().to_string(),
            Some(Value::Number(n)) => return n.to_string(),
            Some(Value::Bool(b)) => return b.to_string(),
            _ => continue,
        }
    }
    String::new()
}

fn collect_breakout_selections(payload: &serde_json::Map<String, Value>) -> Vec<String> {
    let mut selections = Vec::new();
    for key in BREAKOUT_LIST_KEYS {
        if let Some(Value::Array(items)) = payload.get(*key) {
            for item in items {
                if let Value::String(s) = item {
                    if !s.trim().is_empty() {
                        selections.push(s.trim().to_string());
                    }
                }
            }
        }
    }
    for key in BREAKOUT_SLOT_KEYS {
        let value = get_str(payload, &[*key]);
        if !value.is_empty() {
            selections.push(value);
        }
    }
    selections
}

/// Fill the fixed attribute flags from explicit vendor flags, title substring
/// heuristics, and the email domain.
fn infer_attributes(draft: &mut AttendeeDraft, payload: &serde_json::Map<String, Value>) {
    let attrs = &mut draft.attributes;

    attrs.fund_affiliation = normalize_fund_affiliation(&get_str(payload, FUND_KEYS));

    attrs.speaker = coerce_bool(&get_str(payload, &["speaker", "is_speaker"]));
    attrs.sponsor_attendee = coerce_bool(&get_str(payload, &["sponsor", "sponsor_attendee"]));
    attrs.portfolio_company_executive = coerce_bool(&get_str(
        payload,
        &["portfolio_company_executive", "portfolio_exec"],
    ));
    attrs.apax_ip = coerce_bool(&get_str(payload, &["apax_ip"]));
    attrs.apax_ep = coerce_bool(&get_str(payload, &["apax_ep"]));
    attrs.apax_oep = coerce_bool(&get_str(payload, &["apax_oep"]));

    // Anyone on the firm's own domain without an explicit team flag is still
    // firm-affiliated.
    if draft.email.ends_with("@apax.com") && !attrs.apax_ip && !attrs.apax_ep && !attrs.apax_oep {
        attrs.apax_other = true;
    }

    let title = draft.title.to_lowercase();
    let words: Vec<&str> = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has_word = |w: &str| words.iter().any(|x| *x == w);

    attrs.ceo = title.contains("chief executive") || has_word("ceo");
    attrs.cfo = title.contains("chief financial") || has_word("cfo");
    attrs.cmo = title.contains("chief marketing") || has_word("cmo");
    attrs.cro = title.contains("chief revenue") || has_word("cro");
    attrs.coo = title.contains("chief operating") || has_word("coo");
    attrs.chro =
        title.contains("chief human resources") || title.contains("chief people") || has_word("chro");
    attrs.cto_cio = title.contains("chief technology")
        || title.contains("chief information")
        || has_word("cto")
        || has_word("cio");

    attrs.c_level_exec = attrs.ceo
        || attrs.cfo
        || attrs.cmo
        || attrs.cro
        || attrs.coo
        || attrs.chro
        || attrs.cto_cio
        || title.contains("chief");
    attrs.non_c_level_exec = !attrs.c_level_exec && !title.is_empty();

    attrs.other_attendee_type = !(attrs.apax_ip
        || attrs.apax_ep
        || attrs.apax_oep
        || attrs.apax_other
        || attrs.portfolio_company_executive
        || attrs.sponsor_attendee);
}

fn generate_access_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}
