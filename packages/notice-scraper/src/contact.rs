//! Contact-blob classification.
//!
//! A notice's contact field is one unstructured blob: some mix of a person's
//! name, a job title, an office address, an email and one or more phone
//! numbers, separated by newlines or (often) by commas on a single line.
//! [`classify_contact`] splits it with a pair of keyword tables; the tables
//! are plain data so they can be extended without touching control flow.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::{is_junk_text, PRINTABLE_CAPTION};

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"[\w.-]+@[\w.-]+\.\w+").unwrap();

    // Optional country/area prefix, then two digit groups.
    static ref PHONE: Regex =
        Regex::new(r"(?:(?:\+?63)?0?\d{1,3}[- .]?)?\d{3,}[- .]?\d{3,}").unwrap();

    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").unwrap();

    static ref DEFAULT_KEYWORDS: ContactKeywords =
        ContactKeywords::new(POSITION_KEYWORDS, ADDRESS_KEYWORDS);
}

/// Minimum digit count for a phone candidate.
const MIN_PHONE_DIGITS: usize = 7;

/// Longer candidates are never job titles.
const MAX_TITLE_LEN: usize = 80;

const PHONE_SEPARATOR: &str = " / ";
const ADDRESS_SEPARATOR: &str = ", ";

/// Role and title terms, including local-government and school titles and
/// the acronyms that appear in place of them.
pub const POSITION_KEYWORDS: &[&str] = &[
    // corporate / government
    "bac", "secretariat", "chairperson", "chairman", "vice-chairman", "vice chairman",
    "member", "officer", "director", "head", "chief", "manager", "supervisor",
    "coordinator", "administrator", "secretary", "clerk", "specialist", "accountant",
    "treasurer", "auditor", "engineer", "technician", "procurement", "admin",
    "administrative", "supply", "executive", "senior", "junior", "assistant",
    "associate", "consultant", "employee", "staff", "personnel", "representative",
    // departments used as titles
    "general services", "budget", "finance", "legal", "school", "office", "planning",
    "development", "assessor", "engineering", "accounting", "treasury", "social",
    "welfare", "health", "agriculture",
    // local government
    "mayor", "vice-mayor", "councilor", "captain", "capitan", "punong", "kagawad",
    "governor", "board", "sk", "barangay", "municipal", "city", "provincial", "gov",
    "chairwoman", "brgy",
    // education
    "principal", "teacher", "faculty", "instructor", "master", "custodian", "property",
    "guidance", "librarian", "tic",
    // other roles, including a frequent misspelling
    "aide", "operator", "buyer", "canvasser", "inspector", "driver", "utility",
    "messenger", "watchman", "guard", "cook", "charge", "treasure",
    // acronyms
    "ao", "sao", "aso", "ada", "adas", "lso", "eco", "cgdh", "pgdh", "mpdc", "mdrrmo",
    "pdrrmo", "cdrrmo", "oic", "deped", "dswd", "dpwh", "rspnco", "psms",
];

/// Street, barangay, city and province markers.
pub const ADDRESS_KEYWORDS: &[&str] = &[
    "street", "st.", "avenue", "ave.", "road", "rd.", "highway", "barangay", "brgy.",
    "brgy", "bgy.", "bgy", "poblacion", "purok", "sitio", "city", "municipality",
    "province", "region", "philippines", "pilipinas", "building", "bldg.", "bldg",
    "floor", "flr.", "compound", "village", "subdivision", "district", "zip", "postal",
];

/// Keyword tables used to tell titles from addresses.
///
/// Entries are normalized the same way candidate text is (lowercase,
/// punctuation to spaces), and multi-word entries match as whole phrases.
#[derive(Debug, Clone)]
pub struct ContactKeywords {
    position: Vec<Vec<String>>,
    address: Vec<Vec<String>>,
}

impl ContactKeywords {
    /// Build keyword tables from raw term lists.
    pub fn new(position: &[&str], address: &[&str]) -> Self {
        Self {
            position: normalize_terms(position),
            address: normalize_terms(address),
        }
    }

    /// The built-in tables.
    pub fn builtin() -> &'static ContactKeywords {
        &DEFAULT_KEYWORDS
    }

    /// True when `text` reads like a job title: short, mentions a role term,
    /// and mentions no address term.
    pub fn is_position_title(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || text.chars().count() > MAX_TITLE_LEN {
            return false;
        }
        let words = tokenize(text);
        if matches_any(&words, &self.address) {
            return false;
        }
        matches_any(&words, &self.position)
    }
}

fn normalize_terms(terms: &[&str]) -> Vec<Vec<String>> {
    let mut seen = HashSet::new();
    terms
        .iter()
        .map(|t| tokenize(t))
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    NON_WORD
        .replace_all(&text.to_lowercase(), " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn matches_any(words: &[String], terms: &[Vec<String>]) -> bool {
    terms
        .iter()
        .any(|term| words.windows(term.len()).any(|w| w == term.as_slice()))
}

/// The parts recovered from one contact blob. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactParts {
    pub name: Option<String>,
    pub position: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Split a contact blob using the built-in keyword tables.
pub fn parse_contact(text: &str) -> ContactParts {
    classify_contact(text, ContactKeywords::builtin())
}

/// Split a contact blob into name, position, address, email and phone.
pub fn classify_contact(text: &str, keywords: &ContactKeywords) -> ContactParts {
    if text.trim().is_empty() || is_junk_text(text) {
        return ContactParts::default();
    }

    let mut remaining = text.replace(PRINTABLE_CAPTION, "").trim().to_string();

    let email = EMAIL.find(&remaining).map(|m| m.as_str().to_string());
    if let Some(email) = &email {
        remaining = remaining.replace(email.as_str(), "");
    }

    let phones: Vec<&str> = PHONE
        .find_iter(&remaining)
        .map(|m| m.as_str())
        .filter(|p| p.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS)
        .collect();
    let phone = if phones.is_empty() {
        None
    } else {
        Some(phones.join(PHONE_SEPARATOR))
    };

    let mut lines: Vec<String> = remaining
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if lines.len() == 1 && lines[0].contains(',') {
        let parts: Vec<String> = lines[0]
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if parts.len() >= 2 {
            lines = parts;
        }
    }

    let mut parts = ContactParts {
        email,
        phone,
        ..Default::default()
    };

    let Some((first, rest)) = lines.split_first() else {
        return parts;
    };

    let is_phone_line = |line: &str| {
        parts
            .phone
            .as_deref()
            .is_some_and(|p| line.trim() == p.trim())
    };

    let mut address: Vec<&str> = Vec::new();
    let mut position = None;
    let mut name = None;

    if keywords.is_position_title(first) {
        position = Some(first.clone());
        address.extend(rest.iter().map(String::as_str).filter(|l| !is_phone_line(l)));
    } else {
        name = Some(first.clone());
        for line in rest.iter().filter(|l| !is_phone_line(l)) {
            if position.is_none() && address.is_empty() && keywords.is_position_title(line) {
                position = Some(line.clone());
            } else {
                address.push(line);
            }
        }
    }

    parts.name = name;
    parts.position = position;
    parts.address = if address.is_empty() {
        None
    } else {
        Some(address.join(ADDRESS_SEPARATOR))
    };
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_first_line() {
        let parts = parse_contact(
            "BAC Chairperson\n123 Rizal St, Quezon City\njuan@example.com\n0917-123-4567",
        );

        assert_eq!(parts.name, None);
        assert_eq!(parts.position.as_deref(), Some("BAC Chairperson"));
        assert_eq!(parts.address.as_deref(), Some("123 Rizal St, Quezon City"));
        assert_eq!(parts.email.as_deref(), Some("juan@example.com"));
        assert!(parts.phone.unwrap().contains("0917-123-4567"));
    }

    #[test]
    fn test_name_then_position_then_address() {
        let parts = parse_contact(
            "Maria Santos\nSupply Officer III\nProvincial Capitol, Tagbilaran\nmsantos@bohol.gov.ph",
        );

        assert_eq!(parts.name.as_deref(), Some("Maria Santos"));
        assert_eq!(parts.position.as_deref(), Some("Supply Officer III"));
        assert_eq!(
            parts.address.as_deref(),
            Some("Provincial Capitol, Tagbilaran")
        );
        assert_eq!(parts.email.as_deref(), Some("msantos@bohol.gov.ph"));
        assert_eq!(parts.phone, None);
    }

    #[test]
    fn test_single_line_comma_blob_is_split() {
        let parts = parse_contact("Jose Reyes, Administrative Officer, Poblacion, Tanauan");

        assert_eq!(parts.name.as_deref(), Some("Jose Reyes"));
        assert_eq!(parts.position.as_deref(), Some("Administrative Officer"));
        assert_eq!(parts.address.as_deref(), Some("Poblacion, Tanauan"));
    }

    #[test]
    fn test_position_after_address_is_address() {
        let parts = parse_contact("Ana Cruz\nRizal Avenue\nBudget Officer");

        assert_eq!(parts.name.as_deref(), Some("Ana Cruz"));
        assert_eq!(parts.position, None);
        assert_eq!(parts.address.as_deref(), Some("Rizal Avenue, Budget Officer"));
    }

    #[test]
    fn test_multiple_phones_joined() {
        let parts = parse_contact("Pedro Lim\n(02) 8123-4567 / 0917 555 1234");

        let phone = parts.phone.unwrap();
        assert!(phone.contains("8123-4567"));
        assert!(phone.contains("0917 555 1234"));
        assert_eq!(parts.name.as_deref(), Some("Pedro Lim"));
    }

    #[test]
    fn test_short_digit_runs_are_not_phones() {
        let parts = parse_contact("Lito Ramos\nUnit 12-345");
        assert_eq!(parts.phone, None);
    }

    #[test]
    fn test_junk_blob_is_rejected() {
        assert_eq!(parse_contact("Printable Version"), ContactParts::default());
        assert_eq!(parse_contact(""), ContactParts::default());
    }

    #[test]
    fn test_email_only() {
        let parts = parse_contact("bac@city.gov.ph");
        assert_eq!(parts.email.as_deref(), Some("bac@city.gov.ph"));
        assert_eq!(parts.name, None);
        assert_eq!(parts.address, None);
    }

    #[test]
    fn test_position_keywords_are_whole_word() {
        let keywords = ContactKeywords::builtin();
        // "head" must not match inside "Headley"
        assert!(!keywords.is_position_title("Ronald Headley"));
        assert!(keywords.is_position_title("Head, General Services"));
        assert!(keywords.is_position_title("MPDC"));
    }

    #[test]
    fn test_address_terms_veto_titles() {
        let keywords = ContactKeywords::builtin();
        assert!(!keywords.is_position_title("City Hall Building, Marikina"));
    }

    #[test]
    fn test_long_candidates_are_never_titles() {
        let keywords = ContactKeywords::builtin();
        let long = format!("Procurement Officer {}", "x".repeat(80));
        assert!(!keywords.is_position_title(&long));
    }

    #[test]
    fn test_multi_word_terms_match_as_phrase() {
        let keywords = ContactKeywords::new(&["general services"], &[]);
        assert!(keywords.is_position_title("General Services Unit"));
        assert!(!keywords.is_position_title("General Santos"));
    }
}
