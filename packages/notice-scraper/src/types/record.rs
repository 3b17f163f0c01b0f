//! The notice record and its CSV shape.

use serde::{Deserialize, Serialize};

/// One procurement notice.
///
/// Every field is optional: a label missing from the detail page leaves its
/// field empty. Two records with the same non-null `ref_id` are the same
/// notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Reference ID taken from the detail URL (dedup key)
    #[serde(rename = "refID")]
    pub ref_id: Option<String>,

    /// Detail page URL
    pub url: Option<String>,

    pub reference_number: Option<String>,
    pub procuring_entity: Option<String>,
    pub title: Option<String>,
    pub area_of_delivery: Option<String>,
    pub solicitation_number: Option<String>,
    pub procurement_mode: Option<String>,
    pub classification: Option<String>,
    pub category: Option<String>,

    /// Approved budget with currency symbols and separators stripped
    pub abc_php: Option<String>,

    pub delivery_period: Option<String>,
    pub status: Option<String>,
    pub date_published: Option<String>,
    pub closing_datetime: Option<String>,
    pub last_updated: Option<String>,

    pub contact_person: Option<String>,
    pub contact_position: Option<String>,
    pub contact_address: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl Record {
    /// CSV column order.
    pub const HEADERS: [&'static str; 21] = [
        "refID",
        "url",
        "reference_number",
        "procuring_entity",
        "title",
        "area_of_delivery",
        "solicitation_number",
        "procurement_mode",
        "classification",
        "category",
        "abc_php",
        "delivery_period",
        "status",
        "date_published",
        "closing_datetime",
        "last_updated",
        "contact_person",
        "contact_position",
        "contact_address",
        "contact_email",
        "contact_phone",
    ];

    /// True when no field at all was recovered, including the URL.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
