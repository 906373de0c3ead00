use serde::{Deserialize, Serialize};

use crate::error::GradeError;
use crate::scale::LetterScale;

/// Tolerance on the 100-point weight total.
pub const WEIGHT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Assignment,
    Quiz,
    Exam,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Assignment, Category::Quiz, Category::Exam];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Assignment => "assignment",
            Category::Quiz => "quiz",
            Category::Exam => "exam",
        }
    }

    /// Accepts singular or plural, any case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assignment" | "assignments" => Some(Category::Assignment),
            "quiz" | "quizzes" => Some(Category::Quiz),
            "exam" | "exams" => Some(Category::Exam),
            _ => None,
        }
    }
}

/// Earned/possible points for one graded item. `points_earned == None`
/// means the item exists but has not been graded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    points_earned: Option<f64>,
    points_possible: f64,
}

impl ScoreRecord {
    pub fn new(points_earned: Option<f64>, points_possible: f64) -> Result<Self, GradeError> {
        // NaN fails this check too.
        if !(points_possible > 0.0) {
            return Err(GradeError::InvalidScore { points_possible });
        }
        Ok(Self {
            points_earned,
            points_possible,
        })
    }

    pub fn graded(points_earned: f64, points_possible: f64) -> Result<Self, GradeError> {
        Self::new(Some(points_earned), points_possible)
    }

    /// Clamped at zero, not at 100: extra credit passes through.
    pub fn percentage(&self) -> Option<f64> {
        self.points_earned
            .map(|earned| (100.0 * earned / self.points_possible).max(0.0))
    }
}

/// Per-course category weights, each a percentage.
///
/// Any combination can be stored; `is_valid` is only enforced when a grade
/// is computed. Valid weights are each within 0..=100 and total 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeWeights {
    pub course_id: String,
    pub assignments_weight: f64,
    pub quizzes_weight: f64,
    pub exams_weight: f64,
}

impl GradeWeights {
    pub fn total_weight(&self) -> f64 {
        self.assignments_weight + self.quizzes_weight + self.exams_weight
    }

    pub fn is_valid(&self) -> bool {
        let in_range = Category::ALL
            .iter()
            .all(|&c| (0.0..=100.0).contains(&self.weight_for(c)));
        in_range && (self.total_weight() - 100.0).abs() < WEIGHT_TOLERANCE
    }

    pub fn weight_for(&self, category: Category) -> f64 {
        match category {
            Category::Assignment => self.assignments_weight,
            Category::Quiz => self.quizzes_weight,
            Category::Exam => self.exams_weight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: Category,
    /// `None` when nothing in the category has been graded yet.
    pub percentage: Option<f64>,
    pub item_count: usize,
    pub ungraded_count: usize,
}

/// Mean percentage over the gradable records of one category. Ungraded
/// records are counted but never treated as zero.
pub fn aggregate_category<'a, I>(category: Category, records: I) -> CategoryScore
where
    I: IntoIterator<Item = &'a ScoreRecord>,
{
    let mut sum = 0.0_f64;
    let mut item_count: usize = 0;
    let mut ungraded_count: usize = 0;

    for r in records {
        match r.percentage() {
            Some(p) => {
                sum += p;
                item_count += 1;
            }
            None => ungraded_count += 1,
        }
    }

    let percentage = if item_count > 0 {
        Some(sum / (item_count as f64))
    } else {
        None
    };

    CategoryScore {
        category,
        percentage,
        item_count,
        ungraded_count,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryPercentages {
    pub assignments: Option<f64>,
    pub quizzes: Option<f64>,
    pub exams: Option<f64>,
}

impl CategoryPercentages {
    pub fn get(&self, category: Category) -> Option<f64> {
        match category {
            Category::Assignment => self.assignments,
            Category::Quiz => self.quizzes,
            Category::Exam => self.exams,
        }
    }

    fn set(&mut self, category: Category, value: Option<f64>) {
        match category {
            Category::Assignment => self.assignments = value,
            Category::Quiz => self.quizzes = value,
            Category::Exam => self.exams = value,
        }
    }
}

impl FromIterator<CategoryScore> for CategoryPercentages {
    fn from_iter<T: IntoIterator<Item = CategoryScore>>(iter: T) -> Self {
        let mut out = CategoryPercentages::default();
        for score in iter {
            out.set(score.category, score.percentage);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGradeResult {
    pub student_id: String,
    pub course_id: String,
    pub assignments_pct: Option<f64>,
    pub quizzes_pct: Option<f64>,
    pub exams_pct: Option<f64>,
    pub final_percentage: f64,
    pub letter_grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CourseGrade {
    Graded(CourseGradeResult),
    #[serde(rename_all = "camelCase")]
    NoGradeYet { student_id: String, course_id: String },
}

impl CourseGrade {
    pub fn result(&self) -> Option<&CourseGradeResult> {
        match self {
            CourseGrade::Graded(r) => Some(r),
            CourseGrade::NoGradeYet { .. } => None,
        }
    }
}

/// Weighted course percentage over the categories that have a percentage.
///
/// Missing categories are dropped from the divisor rather than counted as
/// zero. If no weight remains, the student has no grade yet.
pub fn combine_categories(
    student_id: &str,
    weights: &GradeWeights,
    pcts: CategoryPercentages,
    scale: &LetterScale,
) -> Result<CourseGrade, GradeError> {
    if !weights.is_valid() {
        return Err(GradeError::InvalidWeights {
            course_id: weights.course_id.clone(),
            total: weights.total_weight(),
        });
    }

    let mut sum = 0.0_f64;
    let mut denom = 0.0_f64;
    for category in Category::ALL {
        let Some(pct) = pcts.get(category) else {
            continue;
        };
        let w = weights.weight_for(category);
        sum += pct * w;
        denom += w;
    }

    if denom <= 0.0 {
        return Ok(CourseGrade::NoGradeYet {
            student_id: student_id.to_string(),
            course_id: weights.course_id.clone(),
        });
    }

    let final_percentage = sum / denom;
    Ok(CourseGrade::Graded(CourseGradeResult {
        student_id: student_id.to_string(),
        course_id: weights.course_id.clone(),
        assignments_pct: pcts.assignments,
        quizzes_pct: pcts.quizzes,
        exams_pct: pcts.exams,
        final_percentage,
        letter_grade: scale.letter_for(final_percentage).to_string(),
    }))
}

/// Read side of the store the engine grades from.
pub trait GradeSource {
    fn score_records(
        &self,
        student_id: &str,
        course_id: &str,
        category: Category,
    ) -> anyhow::Result<Vec<ScoreRecord>>;

    fn active_weights(&self, course_id: &str) -> anyhow::Result<Option<GradeWeights>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGradeReport {
    pub categories: Vec<CategoryScore>,
    pub grade: CourseGrade,
}

pub fn compute_course_grade<S: GradeSource + ?Sized>(
    source: &S,
    scale: &LetterScale,
    student_id: &str,
    course_id: &str,
) -> Result<CourseGradeReport, GradeError> {
    let Some(weights) = source.active_weights(course_id)? else {
        return Err(GradeError::WeightsNotFound {
            course_id: course_id.to_string(),
        });
    };
    if !weights.is_valid() {
        return Err(GradeError::InvalidWeights {
            course_id: weights.course_id.clone(),
            total: weights.total_weight(),
        });
    }

    let mut categories: Vec<CategoryScore> = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let records = source.score_records(student_id, course_id, category)?;
        categories.push(aggregate_category(category, &records));
    }

    let pcts: CategoryPercentages = categories.iter().copied().collect();
    let grade = combine_categories(student_id, &weights, pcts, scale)?;
    log::debug!(
        "course grade student={} course={} graded={}",
        student_id,
        course_id,
        grade.result().is_some()
    );
    Ok(CourseGradeReport { categories, grade })
}
