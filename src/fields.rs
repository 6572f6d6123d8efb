//! Field extraction from Proquest ETD metadata (`*_DATA.xml`).
//!
//! Every output field is described by a [`FieldRule`] in a [`FieldMapping`]:
//! the element path to query and whether the field is expected to be present.
//! The defaults mirror the Proquest layout the repository team has been
//! uploading from. Keywords and department are deliberately overridable since
//! their source elements are not settled.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::xml::Element;

/// Committee members are counted for the log, never exported.
const COMMITTEE_MEMBER_PATH: &str = ".//DISS_description/DISS_cmte_member";
const AUTHOR_PATH: &str = ".//DISS_authorship/DISS_author";
const ABSTRACT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    FirstName,
    MiddleName,
    LastName,
    Suffix,
    Email,
    Institution,
    Department,
    Keywords,
    Degree,
    Advisor,
    Abstract,
    AcceptDate,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Title,
        Field::FirstName,
        Field::MiddleName,
        Field::LastName,
        Field::Suffix,
        Field::Email,
        Field::Institution,
        Field::Department,
        Field::Keywords,
        Field::Degree,
        Field::Advisor,
        Field::Abstract,
        Field::AcceptDate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::FirstName => "first_name",
            Field::MiddleName => "middle_name",
            Field::LastName => "last_name",
            Field::Suffix => "suffix",
            Field::Email => "email",
            Field::Institution => "institution",
            Field::Department => "department",
            Field::Keywords => "keywords",
            Field::Degree => "degree",
            Field::Advisor => "advisor",
            Field::Abstract => "abstract",
            Field::AcceptDate => "accept_date",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub path: String,
    #[serde(default)]
    pub required: bool,
}

impl FieldRule {
    pub fn required(path: &str) -> Self {
        Self { path: path.to_string(), required: true }
    }

    pub fn optional(path: &str) -> Self {
        Self { path: path.to_string(), required: false }
    }
}

/// Field name to element path table, applied uniformly to every document.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    rules: BTreeMap<Field, FieldRule>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        let rules = BTreeMap::from([
            (Field::Title, FieldRule::required(".//DISS_description/DISS_title")),
            (Field::FirstName, FieldRule::required(".//DISS_authorship/DISS_author/DISS_name/DISS_fname")),
            (Field::MiddleName, FieldRule::optional(".//DISS_authorship/DISS_author/DISS_name/DISS_middle")),
            (Field::LastName, FieldRule::required(".//DISS_authorship/DISS_author/DISS_name/DISS_surname")),
            (Field::Suffix, FieldRule::optional(".//DISS_authorship/DISS_author/DISS_name/DISS_suffix")),
            (Field::Email, FieldRule::optional(".//DISS_authorship/DISS_author/DISS_contact/DISS_email")),
            (Field::Institution, FieldRule::required(".//DISS_description/DISS_institution/DISS_inst_name")),
            // Proquest puts the department in the institution contact element.
            (Field::Department, FieldRule::optional(".//DISS_description/DISS_institution/DISS_inst_contact")),
            // Category description, not DISS_keyword; switch via config if needed.
            (Field::Keywords, FieldRule::optional(".//DISS_description/DISS_categorization/DISS_category/DISS_cat_desc")),
            (Field::Degree, FieldRule::required(".//DISS_description/DISS_degree")),
            (Field::Advisor, FieldRule::optional(".//DISS_description/DISS_advisor/DISS_name")),
            (Field::Abstract, FieldRule::optional(".//DISS_content/DISS_abstract/DISS_para")),
            (Field::AcceptDate, FieldRule::optional(".//DISS_description/DISS_dates/DISS_accept_date")),
        ]);
        Self { rules }
    }
}

impl FieldMapping {
    pub fn rule(&self, field: Field) -> Option<&FieldRule> {
        self.rules.get(&field)
    }

    pub fn set(&mut self, field: Field, rule: FieldRule) {
        self.rules.insert(field, rule);
    }

    /// Replace default rules with the given overrides.
    pub fn with_overrides(mut self, overrides: &BTreeMap<Field, FieldRule>) -> Self {
        for (field, rule) in overrides {
            debug!("Field {} mapped to {} (required: {})", field, rule.path, rule.required);
            self.set(*field, rule.clone());
        }
        self
    }

    pub fn is_required(&self, field: Field) -> bool {
        self.rule(field).is_some_and(|r| r.required)
    }
}

/// Values pulled from one metadata document. Absent values are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub title: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub suffix: String,
    pub email: String,
    pub institution: String,
    pub department: String,
    pub keywords: String,
    pub degree: String,
    pub advisor: String,
    pub abstract_text: String,
    pub accept_date: String,
}

impl ExtractedFields {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::FirstName => &self.first_name,
            Field::MiddleName => &self.middle_name,
            Field::LastName => &self.last_name,
            Field::Suffix => &self.suffix,
            Field::Email => &self.email,
            Field::Institution => &self.institution,
            Field::Department => &self.department,
            Field::Keywords => &self.keywords,
            Field::Degree => &self.degree,
            Field::Advisor => &self.advisor,
            Field::Abstract => &self.abstract_text,
            Field::AcceptDate => &self.accept_date,
        }
    }

    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::FirstName => &mut self.first_name,
            Field::MiddleName => &mut self.middle_name,
            Field::LastName => &mut self.last_name,
            Field::Suffix => &mut self.suffix,
            Field::Email => &mut self.email,
            Field::Institution => &mut self.institution,
            Field::Department => &mut self.department,
            Field::Keywords => &mut self.keywords,
            Field::Degree => &mut self.degree,
            Field::Advisor => &mut self.advisor,
            Field::Abstract => &mut self.abstract_text,
            Field::AcceptDate => &mut self.accept_date,
        };
        *slot = value;
    }
}

/// Result of applying a mapping to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub fields: ExtractedFields,
    /// Fields whose path matched nothing, in mapping order.
    pub unresolved: Vec<Field>,
}

impl Extraction {
    /// Extraction for a submission with no readable metadata document.
    pub fn unavailable(mapping: &FieldMapping) -> Self {
        Self {
            fields: ExtractedFields::default(),
            unresolved: Field::ALL
                .into_iter()
                .filter(|f| mapping.rule(*f).is_some())
                .collect(),
        }
    }

    pub fn missing_required(&self, mapping: &FieldMapping) -> Vec<Field> {
        self.unresolved
            .iter()
            .copied()
            .filter(|f| mapping.is_required(*f))
            .collect()
    }
}

/// Apply every rule in `mapping` to `root`.
pub fn extract_fields(root: &Element, mapping: &FieldMapping) -> Extraction {
    let mut extraction = Extraction::default();
    for field in Field::ALL {
        let Some(rule) = mapping.rule(field) else {
            continue;
        };
        let value = match field {
            Field::Advisor => extract_advisor(root, &rule.path),
            Field::Abstract => extract_abstract(root, &rule.path),
            _ => extract_text(root, &rule.path),
        };
        match value {
            Some(value) => extraction.fields.set(field, value),
            None => extraction.unresolved.push(field),
        }
    }
    extraction
}

/// Text of the first node at `path`, inline markup such as `<sub>` included.
pub fn extract_text(root: &Element, path: &str) -> Option<String> {
    root.find(path).map(Element::text_content)
}

/// First advisor only, as `"Last, First"`.
pub fn extract_advisor(root: &Element, path: &str) -> Option<String> {
    let advisors = root.find_all(path);
    let first = advisors.first()?;
    if advisors.len() > 1 {
        debug!("Dropping {} additional advisor(s)", advisors.len() - 1);
    }
    let committee = root.find_all(COMMITTEE_MEMBER_PATH).len();
    if committee > 0 {
        debug!("Dropping {} committee member(s)", committee);
    }

    let last = first.find("DISS_surname").map(Element::text_content);
    let given = first.find("DISS_fname").map(Element::text_content);
    match (last, given) {
        (Some(last), Some(given)) => Some(format_advisor(&last, &given)),
        (Some(name), None) | (None, Some(name)) => Some(name),
        (None, None) => None,
    }
}

pub fn format_advisor(last: &str, first: &str) -> String {
    format!("{}, {}", last, first)
}

/// Abstract paragraphs in document order separated by a blank line.
pub fn extract_abstract(root: &Element, path: &str) -> Option<String> {
    let paragraphs = root.find_all(path);
    if paragraphs.is_empty() {
        return None;
    }
    let texts: Vec<String> = paragraphs.iter().map(|p| p.text_content()).collect();
    Some(join_paragraphs(&texts))
}

pub fn join_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> String {
    paragraphs
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_empty())
        .collect::<Vec<&str>>()
        .join(ABSTRACT_SEPARATOR)
}

/// Count authors not marked primary; only the primary author is exported.
pub fn secondary_authors(root: &Element) -> usize {
    root.find_all(AUTHOR_PATH)
        .into_iter()
        .filter(|author| author.attr("type") != Some("primary"))
        .count()
}

/// Log when a document lists more than the primary author.
/// Warn when a submission names authors besides the primary one. Returns
/// how many there are.
pub fn check_authorship(root: &Element, identifier: &str) -> usize {
    let extra = secondary_authors(root);
    if extra > 0 {
        warn!("Submission {} lists {} non-primary author(s); only the primary is exported", identifier, extra);
    }
    extra
}
