use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::calc::ScoreRecord;
use crate::error::GradeError;

/// Selected option per question: question id -> option id.
pub type Answers = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    pub points: f64,
    #[serde(default)]
    pub options: Vec<QuizQuestionOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".into());
        }
        if self.duration_minutes == 0 {
            return Err("durationMinutes must be > 0".into());
        }
        let mut question_ids: HashSet<&str> = HashSet::new();
        for (i, q) in self.questions.iter().enumerate() {
            if !question_ids.insert(q.id.as_str()) {
                return Err(format!("duplicate question id: {}", q.id));
            }
            if !(q.points > 0.0) || !q.points.is_finite() {
                return Err(format!("questions[{}].points must be > 0", i));
            }
            let mut option_ids: HashSet<&str> = HashSet::new();
            for o in &q.options {
                if !option_ids.insert(o.id.as_str()) {
                    return Err(format!("duplicate option id {} in question {}", o.id, q.id));
                }
            }
        }
        Ok(())
    }

    pub fn total_points(&self) -> f64 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub fn deadline(&self, started_at: DateTime<Utc>) -> DateTime<Utc> {
        started_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Points for the correctly answered questions.
    pub fn score_answers(&self, answers: &Answers) -> f64 {
        let mut score = 0.0_f64;
        for (question_id, option_id) in answers {
            let Some(q) = self.questions.iter().find(|q| &q.id == question_id) else {
                log::warn!(
                    "quiz {}: answer for unknown question {} ignored",
                    self.id,
                    question_id
                );
                continue;
            };
            let correct = q
                .options
                .iter()
                .any(|o| &o.id == option_id && o.is_correct);
            if correct {
                score += q.points;
            }
        }
        score
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    TimedOut,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "inProgress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::TimedOut => "timedOut",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inProgress" => Some(AttemptStatus::InProgress),
            "completed" => Some(AttemptStatus::Completed),
            "timedOut" => Some(AttemptStatus::TimedOut),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: String,
    pub quiz_id: String,
    pub student_id: String,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    /// Quiz total at finalization; later edits to the quiz leave it alone.
    #[serde(default)]
    pub points_possible: Option<f64>,
    pub status: AttemptStatus,
    #[serde(default)]
    pub answers: Answers,
}

impl QuizAttempt {
    pub fn start(quiz: &Quiz, student_id: &str, attempt_number: u32, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            quiz_id: quiz.id.clone(),
            student_id: student_id.to_string(),
            attempt_number: attempt_number.max(1),
            started_at: at,
            completed_at: None,
            score: None,
            points_possible: None,
            status: AttemptStatus::InProgress,
            answers: Answers::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_open(&self) -> Result<(), GradeError> {
        if self.is_finalized() {
            return Err(GradeError::AttemptAlreadyFinalized {
                attempt_id: self.id.clone(),
                status: self.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Records progress; later answers for a question replace earlier ones.
    pub fn save_answers(&mut self, answers: Answers) -> Result<(), GradeError> {
        self.ensure_open()?;
        self.answers.extend(answers);
        Ok(())
    }

    pub fn submit(
        &mut self,
        quiz: &Quiz,
        answers: Answers,
        at: DateTime<Utc>,
    ) -> Result<(), GradeError> {
        self.ensure_open()?;
        if at < self.started_at {
            return Err(GradeError::SubmittedBeforeStart {
                attempt_id: self.id.clone(),
            });
        }
        self.answers.extend(answers);
        self.finalize(quiz, AttemptStatus::Completed, at);
        Ok(())
    }

    /// Scores whatever was saved and closes the attempt at its deadline.
    pub fn time_out(&mut self, quiz: &Quiz) -> Result<(), GradeError> {
        self.ensure_open()?;
        let deadline = quiz.deadline(self.started_at);
        self.finalize(quiz, AttemptStatus::TimedOut, deadline);
        Ok(())
    }

    fn finalize(&mut self, quiz: &Quiz, status: AttemptStatus, at: DateTime<Utc>) {
        self.score = Some(quiz.score_answers(&self.answers));
        self.points_possible = Some(quiz.total_points());
        self.completed_at = Some(at);
        self.status = status;
    }
}

/// The score a student's attempts contribute to the quiz category: the
/// latest finalized attempt, or nothing while none is finalized.
pub fn eligible_score_record(quiz: &Quiz, attempts: &[QuizAttempt]) -> Option<ScoreRecord> {
    let latest = attempts
        .iter()
        .filter(|a| a.quiz_id == quiz.id && a.is_finalized())
        .max_by_key(|a| a.attempt_number)?;
    let earned = latest.score.unwrap_or(0.0);
    let possible = latest
        .points_possible
        .unwrap_or_else(|| quiz.total_points());
    match ScoreRecord::graded(earned, possible) {
        Ok(r) => Some(r),
        Err(e) => {
            log::warn!("quiz {} skipped: {}", quiz.id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn opt(id: &str, correct: bool) -> QuizQuestionOption {
        QuizQuestionOption {
            id: id.into(),
            text: id.to_uppercase(),
            is_correct: correct,
        }
    }

    fn quiz() -> Quiz {
        Quiz {
            id: "q1".into(),
            course_id: "c1".into(),
            title: "Week 1".into(),
            duration_minutes: 30,
            questions: vec![
                QuizQuestion {
                    id: "q1.1".into(),
                    prompt: "2+2?".into(),
                    points: 2.0,
                    options: vec![opt("a", false), opt("b", true)],
                },
                QuizQuestion {
                    id: "q1.2".into(),
                    prompt: "Capital of France?".into(),
                    points: 3.0,
                    options: vec![opt("c", true), opt("d", false)],
                },
            ],
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 15, 10, 0, 0).unwrap()
    }

    fn answers(pairs: &[(&str, &str)]) -> Answers {
        pairs
            .iter()
            .map(|(q, o)| (q.to_string(), o.to_string()))
            .collect()
    }

    #[test]
    fn scoring_counts_correct_options_only() {
        let q = quiz();
        assert_eq!(q.total_points(), 5.0);
        assert_eq!(q.score_answers(&answers(&[("q1.1", "b"), ("q1.2", "d")])), 2.0);
        assert_eq!(q.score_answers(&answers(&[("q1.1", "b"), ("q1.2", "c")])), 5.0);
        // option from another question does not count
        assert_eq!(q.score_answers(&answers(&[("q1.1", "c")])), 0.0);
        assert_eq!(q.score_answers(&answers(&[("nope", "b")])), 0.0);
    }

    #[test]
    fn submit_completes_and_scores() {
        let q = quiz();
        let mut a = QuizAttempt::start(&q, "s1", 1, t0());
        a.save_answers(answers(&[("q1.1", "a")])).unwrap();
        let at = t0() + Duration::minutes(12);
        a.submit(&q, answers(&[("q1.1", "b"), ("q1.2", "c")]), at)
            .unwrap();
        assert_eq!(a.status, AttemptStatus::Completed);
        assert_eq!(a.score, Some(5.0));
        assert_eq!(a.completed_at, Some(at));
    }

    #[test]
    fn time_out_scores_saved_answers_at_deadline() {
        let q = quiz();
        let mut a = QuizAttempt::start(&q, "s1", 1, t0());
        a.save_answers(answers(&[("q1.2", "c")])).unwrap();
        a.time_out(&q).unwrap();
        assert_eq!(a.status, AttemptStatus::TimedOut);
        assert_eq!(a.score, Some(3.0));
        assert_eq!(a.completed_at, Some(t0() + Duration::minutes(30)));
    }

    #[test]
    fn finalized_attempts_reject_further_writes() {
        let q = quiz();
        let mut done = QuizAttempt::start(&q, "s1", 1, t0());
        done.submit(&q, Answers::new(), t0()).unwrap();
        let before = done.clone();

        let e = done.submit(&q, answers(&[("q1.1", "b")]), t0()).unwrap_err();
        assert_eq!(e.code(), "attempt_already_finalized");
        assert!(done.time_out(&q).is_err());
        assert!(done.save_answers(answers(&[("q1.1", "b")])).is_err());
        assert_eq!(done, before);

        let mut timed = QuizAttempt::start(&q, "s1", 2, t0());
        timed.time_out(&q).unwrap();
        assert!(matches!(
            timed.time_out(&q),
            Err(GradeError::AttemptAlreadyFinalized { .. })
        ));
    }

    #[test]
    fn eligible_record_uses_latest_finalized_attempt() {
        let q = quiz();
        let mut first = QuizAttempt::start(&q, "s1", 1, t0());
        first.submit(&q, answers(&[("q1.1", "b"), ("q1.2", "c")]), t0()).unwrap();
        let mut second = QuizAttempt::start(&q, "s1", 2, t0());
        second.submit(&q, answers(&[("q1.1", "b")]), t0()).unwrap();
        let third = QuizAttempt::start(&q, "s1", 3, t0());

        let r = eligible_score_record(&q, &[first.clone(), second, third.clone()]).unwrap();
        assert_eq!(r.percentage(), Some(40.0));

        assert!(eligible_score_record(&q, &[third]).is_none());
        assert_eq!(
            eligible_score_record(&q, &[first]).and_then(|r| r.percentage()),
            Some(100.0)
        );
    }

    #[test]
    fn submit_before_start_is_rejected() {
        let q = quiz();
        let mut a = QuizAttempt::start(&q, "s1", 1, t0());
        let e = a
            .submit(&q, answers(&[("q1.1", "b")]), t0() - Duration::minutes(1))
            .unwrap_err();
        assert_eq!(e.code(), "bad_params");
        assert_eq!(a.status, AttemptStatus::InProgress);
        assert!(a.answers.is_empty());

        a.submit(&q, Answers::new(), t0()).unwrap();
        assert_eq!(a.completed_at, Some(t0()));
    }

    #[test]
    fn record_keeps_points_possible_from_finalization() {
        let q = quiz();
        let mut a = QuizAttempt::start(&q, "s1", 1, t0());
        a.submit(&q, answers(&[("q1.1", "b")]), t0()).unwrap();
        assert_eq!(a.points_possible, Some(5.0));

        // Shrinking the quiz afterwards must not inflate the old attempt.
        let mut edited = q.clone();
        edited.questions.truncate(1);
        edited.questions[0].points = 0.4;
        let r = eligible_score_record(&edited, &[a]).unwrap();
        assert_eq!(r.percentage(), Some(40.0));
    }

    #[test]
    fn quiz_without_points_yields_no_record() {
        let mut q = quiz();
        q.questions.clear();
        let mut a = QuizAttempt::start(&q, "s1", 1, t0());
        a.submit(&q, Answers::new(), t0()).unwrap();
        assert_eq!(a.score, Some(0.0));
        assert!(eligible_score_record(&q, &[a]).is_none());
    }

    #[test]
    fn validate_catches_bad_definitions() {
        assert!(quiz().validate().is_ok());

        let mut q = quiz();
        q.duration_minutes = 0;
        assert!(q.validate().is_err());

        let mut q = quiz();
        q.questions[1].id = "q1.1".into();
        assert!(q.validate().unwrap_err().contains("duplicate question"));

        let mut q = quiz();
        q.questions[0].points = 0.0;
        assert!(q.validate().is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            AttemptStatus::InProgress,
            AttemptStatus::Completed,
            AttemptStatus::TimedOut,
        ] {
            assert_eq!(AttemptStatus::parse(s.as_str()), Some(s));
        }
        assert!(!AttemptStatus::InProgress.is_terminal());
        assert!(AttemptStatus::TimedOut.is_terminal());
    }
}
