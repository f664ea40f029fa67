// src/utils/ids.rs

//! Student and staff login IDs.
//!
//! Student: `{PREFIX}-{YY}-{SECTION}-{NNNN}`, e.g. `VSP-24-PR-0001`.
//! Staff, one of three formats:
//! * standard   `{PREFIX}-STF-{YY}-{NNNN}`
//! * department `{PREFIX}-{DEPT}-{NNNN}`
//! * simplified `STF-{NNNNN}`

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Creche,
    Nursery,
    Primary,
    College,
}

impl Section {
    pub fn code(&self) -> &'static str {
        match self {
            Section::Creche => "CR",
            Section::Nursery => "NS",
            Section::Primary => "PR",
            Section::College => "CL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "CR" => Some(Section::Creche),
            "NS" => Some(Section::Nursery),
            "PR" => Some(Section::Primary),
            "CL" => Some(Section::College),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Section::Creche => "Creche/Playgroup",
            Section::Nursery => "Nursery",
            Section::Primary => "Primary",
            Section::College => "College",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffIdFormat {
    #[default]
    Standard,
    Department,
    Simplified,
}

const DEFAULT_DEPARTMENT: &str = "GEN";
const STUDENT_SEQ_MAX: u32 = 9_999;
const SIMPLIFIED_SEQ_MAX: u32 = 99_999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedStudentId {
    pub year: String,
    pub section_code: String,
    /// `None` for a well-formed ID carrying an unknown section code.
    pub section: Option<Section>,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedStaffId {
    pub format: StaffIdFormat,
    pub year: Option<String>,
    pub department: Option<String>,
    pub sequence: u32,
}

/// ID formats for one institution prefix. Built once at startup.
#[derive(Debug, Clone)]
pub struct IdScheme {
    prefix: String,
    student_re: Regex,
    staff_standard_re: Regex,
    staff_department_re: Regex,
    staff_simplified_re: Regex,
}

impl IdScheme {
    pub fn new(prefix: &str) -> Result<Self, AppError> {
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(AppError::InternalServerError(format!(
                "ID prefix must be uppercase ASCII letters, got {:?}",
                prefix
            )));
        }
        let p = regex::escape(prefix);
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| AppError::InternalServerError(e.to_string()))
        };

        Ok(Self {
            prefix: prefix.to_string(),
            student_re: compile(format!(r"^{p}-(\d{{2}})-([A-Z]{{2}})-(\d{{4}})$"))?,
            staff_standard_re: compile(format!(r"^{p}-STF-(\d{{2}})-(\d{{4}})$"))?,
            staff_department_re: compile(format!(r"^{p}-([A-Z]{{3}})-(\d{{4}})$"))?,
            staff_simplified_re: compile(r"^STF-(\d{5})$".to_string())?,
        })
    }

    /// Everything before the sequence number; used to find the last issued ID.
    pub fn student_stem(&self, year: &str, section: Section) -> String {
        format!("{}-{}-{}-", self.prefix, year, section.code())
    }

    pub fn student_id(&self, year: &str, section: Section, sequence: u32) -> Result<String, AppError> {
        check_sequence(sequence, STUDENT_SEQ_MAX)?;
        Ok(format!("{}{:04}", self.student_stem(year, section), sequence))
    }

    pub fn bulk_student_ids(
        &self,
        year: &str,
        section: Section,
        start: u32,
        count: u32,
    ) -> Result<Vec<String>, AppError> {
        (0..count)
            .map(|i| self.student_id(year, section, start.saturating_add(i)))
            .collect()
    }

    pub fn parse_student_id(&self, id: &str) -> Option<ParsedStudentId> {
        let caps = self.student_re.captures(id)?;
        let section_code = caps[2].to_string();
        Some(ParsedStudentId {
            year: caps[1].to_string(),
            section: Section::from_code(&section_code),
            section_code,
            sequence: caps[3].parse().ok()?,
        })
    }

    pub fn staff_stem(&self, format: StaffIdFormat, year: &str, department: Option<&str>) -> String {
        match format {
            StaffIdFormat::Standard => format!("{}-STF-{}-", self.prefix, year),
            StaffIdFormat::Department => format!(
                "{}-{}-",
                self.prefix,
                department.unwrap_or(DEFAULT_DEPARTMENT)
            ),
            StaffIdFormat::Simplified => "STF-".to_string(),
        }
    }

    pub fn staff_id(
        &self,
        format: StaffIdFormat,
        year: &str,
        department: Option<&str>,
        sequence: u32,
    ) -> Result<String, AppError> {
        let stem = self.staff_stem(format, year, department);
        match format {
            StaffIdFormat::Simplified => {
                check_sequence(sequence, SIMPLIFIED_SEQ_MAX)?;
                Ok(format!("{}{:05}", stem, sequence))
            }
            _ => {
                check_sequence(sequence, STUDENT_SEQ_MAX)?;
                Ok(format!("{}{:04}", stem, sequence))
            }
        }
    }

    pub fn bulk_staff_ids(
        &self,
        format: StaffIdFormat,
        year: &str,
        department: Option<&str>,
        start: u32,
        count: u32,
    ) -> Result<Vec<String>, AppError> {
        (0..count)
            .map(|i| self.staff_id(format, year, department, start.saturating_add(i)))
            .collect()
    }

    pub fn parse_staff_id(&self, id: &str) -> Option<ParsedStaffId> {
        if let Some(caps) = self.staff_standard_re.captures(id) {
            return Some(ParsedStaffId {
                format: StaffIdFormat::Standard,
                year: Some(caps[1].to_string()),
                department: None,
                sequence: caps[2].parse().ok()?,
            });
        }
        if let Some(caps) = self.staff_department_re.captures(id) {
            return Some(ParsedStaffId {
                format: StaffIdFormat::Department,
                year: None,
                department: Some(caps[1].to_string()),
                sequence: caps[2].parse().ok()?,
            });
        }
        let caps = self.staff_simplified_re.captures(id)?;
        Some(ParsedStaffId {
            format: StaffIdFormat::Simplified,
            year: None,
            department: None,
            sequence: caps[1].parse().ok()?,
        })
    }
}

fn check_sequence(sequence: u32, max: u32) -> Result<(), AppError> {
    if sequence == 0 || sequence > max {
        return Err(AppError::Conflict(format!(
            "Sequence {} is outside 1..={}",
            sequence, max
        )));
    }
    Ok(())
}

/// Next sequence after the most recently issued ID sharing a stem.
pub fn next_sequence(last_id: Option<&str>) -> u32 {
    last_id
        .and_then(|id| id.rsplit('-').next())
        .and_then(|seq| seq.parse::<u32>().ok())
        .map_or(1, |seq| seq + 1)
}

/// Two-digit current year, e.g. `"24"`.
pub fn current_year() -> String {
    format!("{:02}", Utc::now().year() % 100)
}

pub fn student_email(login_id: &str, domain: &str) -> String {
    format!("{}@student.{}", login_id.to_lowercase(), domain)
}

pub fn staff_email(login_id: &str, domain: &str) -> String {
    format!("{}@{}", login_id.to_lowercase(), domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> IdScheme {
        IdScheme::new("VSP").unwrap()
    }

    #[test]
    fn formats_student_id() {
        let id = scheme().student_id("24", Section::Primary, 7).unwrap();
        assert_eq!(id, "VSP-24-PR-0007");
        assert!(scheme().parse_student_id(&id).is_some());
    }

    #[test]
    fn parses_student_id() {
        let parsed = scheme().parse_student_id("VSP-25-CL-0123").unwrap();
        assert_eq!(parsed.year, "25");
        assert_eq!(parsed.section, Some(Section::College));
        assert_eq!(parsed.sequence, 123);
    }

    #[test]
    fn unknown_section_code_still_parses() {
        let parsed = scheme().parse_student_id("VSP-25-ZZ-0001").unwrap();
        assert_eq!(parsed.section, None);
        assert_eq!(parsed.section_code, "ZZ");
    }

    #[test]
    fn rejects_malformed_student_ids() {
        let s = scheme();
        assert!(s.parse_student_id("VSP-2024-PR-0001").is_none());
        assert!(s.parse_student_id("ABC-24-PR-0001").is_none());
        assert!(s.parse_student_id("VSP-24-pr-0001").is_none());
        assert!(s.parse_student_id("VSP-24-PR-001").is_none());
    }

    #[test]
    fn bulk_student_ids_are_consecutive() {
        let ids = scheme().bulk_student_ids("24", Section::Nursery, 9, 3).unwrap();
        assert_eq!(ids, vec!["VSP-24-NS-0009", "VSP-24-NS-0010", "VSP-24-NS-0011"]);
    }

    #[test]
    fn student_sequence_overflow_is_rejected() {
        assert!(scheme().student_id("24", Section::Creche, 10_000).is_err());
    }

    #[test]
    fn staff_formats() {
        let s = scheme();
        assert_eq!(
            s.staff_id(StaffIdFormat::Standard, "24", None, 1).unwrap(),
            "VSP-STF-24-0001"
        );
        assert_eq!(
            s.staff_id(StaffIdFormat::Department, "24", Some("SCI"), 12).unwrap(),
            "VSP-SCI-0012"
        );
        assert_eq!(
            s.staff_id(StaffIdFormat::Department, "24", None, 1).unwrap(),
            "VSP-GEN-0001"
        );
        assert_eq!(
            s.staff_id(StaffIdFormat::Simplified, "24", None, 42).unwrap(),
            "STF-00042"
        );
    }

    #[test]
    fn parses_each_staff_format() {
        let s = scheme();
        let standard = s.parse_staff_id("VSP-STF-24-0001").unwrap();
        assert_eq!(standard.format, StaffIdFormat::Standard);
        assert_eq!(standard.year.as_deref(), Some("24"));

        let dept = s.parse_staff_id("VSP-ART-0003").unwrap();
        assert_eq!(dept.format, StaffIdFormat::Department);
        assert_eq!(dept.department.as_deref(), Some("ART"));

        let simple = s.parse_staff_id("STF-00042").unwrap();
        assert_eq!(simple.format, StaffIdFormat::Simplified);
        assert_eq!(simple.sequence, 42);

        assert!(s.parse_staff_id("VSP-24-PR-0001").is_none());
    }

    #[test]
    fn next_sequence_follows_last_issued() {
        assert_eq!(next_sequence(None), 1);
        assert_eq!(next_sequence(Some("VSP-24-PR-0041")), 42);
        assert_eq!(next_sequence(Some("STF-00009")), 10);
        assert_eq!(next_sequence(Some("garbage")), 1);
    }

    #[test]
    fn emails_are_lowercased() {
        assert_eq!(
            student_email("VSP-24-PR-0001", "school.edu"),
            "vsp-24-pr-0001@student.school.edu"
        );
        assert_eq!(staff_email("STF-00001", "school.edu"), "stf-00001@school.edu");
    }

    #[test]
    fn rejects_bad_prefix() {
        assert!(IdScheme::new("vsp").is_err());
        assert!(IdScheme::new("").is_err());
    }
}
