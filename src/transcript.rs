use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calc::CourseGradeResult;
use crate::error::GradeError;
use crate::scale::grade_points;

/// Upper bound on credits for one course or transcript entry.
pub const MAX_CREDITS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub credits: u32,
}

/// Finalized grade for one course in one semester. Replaced, never edited,
/// when the course is regraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub course_code: String,
    pub course_name: String,
    pub credits: u32,
    pub final_grade: String,
    pub semester: String,
}

impl TranscriptEntry {
    pub fn from_course_grade(course: &Course, result: &CourseGradeResult, semester: &str) -> Self {
        Self {
            course_code: course.code.clone(),
            course_name: course.name.clone(),
            credits: course.credits,
            final_grade: result.letter_grade.clone(),
            semester: semester.to_string(),
        }
    }

    pub fn grade_points(&self) -> f64 {
        grade_points(Some(&self.final_grade))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterGpa {
    pub semester: String,
    pub credits: u64,
    pub gpa: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpaSummary {
    pub gpa: f64,
    pub total_credits: u64,
    pub quality_points: f64,
    pub course_count: usize,
    pub semesters: Vec<SemesterGpa>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum GpaOutcome {
    #[serde(rename = "gpa")]
    Computed(GpaSummary),
    NoGpa,
}

impl GpaOutcome {
    pub fn gpa(&self) -> Option<f64> {
        match self {
            GpaOutcome::Computed(s) => Some(s.gpa),
            GpaOutcome::NoGpa => None,
        }
    }
}

#[derive(Default)]
struct CreditTotals {
    quality_points: f64,
    credits: u64,
    courses: usize,
}

impl CreditTotals {
    fn add(&mut self, entry: &TranscriptEntry) {
        // Zero-credit entries count toward neither side of the ratio.
        if entry.credits == 0 {
            return;
        }
        self.quality_points += entry.grade_points() * f64::from(entry.credits);
        self.credits += u64::from(entry.credits);
        self.courses += 1;
    }

    fn gpa(&self) -> Option<f64> {
        if self.credits == 0 {
            None
        } else {
            Some(self.quality_points / self.credits as f64)
        }
    }
}

/// Credit-weighted GPA. No entries, or no credits, is `NoGpa` rather than 0.0.
pub fn compute_gpa(entries: &[TranscriptEntry]) -> GpaOutcome {
    let mut overall = CreditTotals::default();
    let mut by_semester: BTreeMap<&str, CreditTotals> = BTreeMap::new();

    for e in entries {
        overall.add(e);
        by_semester.entry(e.semester.as_str()).or_default().add(e);
    }

    let Some(gpa) = overall.gpa() else {
        return GpaOutcome::NoGpa;
    };

    let semesters = by_semester
        .into_iter()
        .map(|(semester, t)| SemesterGpa {
            semester: semester.to_string(),
            credits: t.credits,
            gpa: t.gpa(),
        })
        .collect();

    GpaOutcome::Computed(GpaSummary {
        gpa,
        total_credits: overall.credits,
        quality_points: overall.quality_points,
        course_count: overall.courses,
        semesters,
    })
}

pub trait TranscriptSource {
    fn transcript_entries(&self, student_id: &str) -> anyhow::Result<Vec<TranscriptEntry>>;
}

pub fn compute_student_gpa<S: TranscriptSource + ?Sized>(
    source: &S,
    student_id: &str,
) -> Result<GpaOutcome, GradeError> {
    let entries = source.transcript_entries(student_id)?;
    Ok(compute_gpa(&entries))
}
