use thiserror::Error;

/// Failures reported by the grading engine.
///
/// `NoGradeYet` and `NoGpa` are not here: insufficient data is a valid
/// result, carried by `calc::CourseGrade` and `transcript::GpaOutcome`.
#[derive(Debug, Error)]
pub enum GradeError {
    #[error("points possible must be greater than zero (got {points_possible})")]
    InvalidScore { points_possible: f64 },

    #[error("grade weights for course {course_id} are invalid (total {total}): each must be within 0..=100 and they must total 100")]
    InvalidWeights { course_id: String, total: f64 },

    #[error("no grade weights configured for course {course_id}")]
    WeightsNotFound { course_id: String },

    #[error("quiz attempt {attempt_id} is already {status}")]
    AttemptAlreadyFinalized { attempt_id: String, status: String },

    #[error("quiz attempt {attempt_id} cannot be submitted before it started")]
    SubmittedBeforeStart { attempt_id: String },

    #[error("invalid letter scale: {0}")]
    InvalidScale(String),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl GradeError {
    pub fn code(&self) -> &'static str {
        match self {
            GradeError::InvalidScore { .. } => "invalid_score",
            GradeError::InvalidWeights { .. } => "invalid_weights",
            GradeError::WeightsNotFound { .. } => "weights_not_found",
            GradeError::AttemptAlreadyFinalized { .. } => "attempt_already_finalized",
            GradeError::SubmittedBeforeStart { .. } => "bad_params",
            GradeError::InvalidScale(_) => "invalid_scale",
            GradeError::NotFound { .. } => "not_found",
            GradeError::Store(_) => "db_query_failed",
        }
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        GradeError::NotFound {
            what,
            id: id.into(),
        }
    }
}
