use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::calc::{Category, GradeSource, GradeWeights, ScoreRecord};
use crate::error::GradeError;
use crate::quiz::{
    eligible_score_record, Answers, AttemptStatus, Quiz, QuizAttempt, QuizQuestion,
    QuizQuestionOption,
};
use crate::scale::{LetterScale, LETTER_SCALE_SETTING};
use crate::transcript::{Course, TranscriptEntry, TranscriptSource};

/// One stored graded item, unique per (student, course, category, item).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRow {
    #[serde(default)]
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub category: Category,
    pub item_id: String,
    #[serde(default)]
    pub points_earned: Option<f64>,
    pub points_possible: f64,
}

impl ScoreRow {
    pub fn record(&self) -> Result<ScoreRecord, GradeError> {
        ScoreRecord::new(self.points_earned, self.points_possible)
    }
}

/// In-memory grade store. Nothing is written to disk.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    // -- courses

    pub fn course_get(&self, id: &str) -> anyhow::Result<Option<Course>> {
        let course = self
            .conn
            .query_row(
                "SELECT id, code, name, credits FROM courses WHERE id = ?",
                [id],
                |r| {
                    Ok(Course {
                        id: r.get(0)?,
                        code: r.get(1)?,
                        name: r.get(2)?,
                        credits: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(course)
    }

    pub fn course_list(&self) -> anyhow::Result<Vec<Course>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, code, name, credits FROM courses ORDER BY code, id")?;
        let courses = stmt
            .query_map([], |r| {
                Ok(Course {
                    id: r.get(0)?,
                    code: r.get(1)?,
                    name: r.get(2)?,
                    credits: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(courses)
    }

    pub fn course_upsert(&self, course: &Course) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO courses(id, code, name, credits) VALUES(?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               code = excluded.code,
               name = excluded.name,
               credits = excluded.credits",
            (&course.id, &course.code, &course.name, course.credits),
        )?;
        Ok(())
    }

    /// Deletes the course and the weights it owns.
    pub fn course_delete(&self, id: &str) -> anyhow::Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM grade_weights WHERE course_id = ?", [id])?;
        let n = tx.execute("DELETE FROM courses WHERE id = ?", [id])?;
        tx.commit()?;
        Ok(n > 0)
    }

    // -- grade weights

    pub fn weights_get(&self, course_id: &str) -> anyhow::Result<Option<GradeWeights>> {
        let weights = self
            .conn
            .query_row(
                "SELECT course_id, assignments_weight, quizzes_weight, exams_weight
                 FROM grade_weights
                 WHERE course_id = ?",
                [course_id],
                |r| {
                    Ok(GradeWeights {
                        course_id: r.get(0)?,
                        assignments_weight: r.get(1)?,
                        quizzes_weight: r.get(2)?,
                        exams_weight: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(weights)
    }

    pub fn weights_list(&self) -> anyhow::Result<Vec<GradeWeights>> {
        let mut stmt = self.conn.prepare(
            "SELECT course_id, assignments_weight, quizzes_weight, exams_weight
             FROM grade_weights
             ORDER BY course_id",
        )?;
        let all = stmt
            .query_map([], |r| {
                Ok(GradeWeights {
                    course_id: r.get(0)?,
                    assignments_weight: r.get(1)?,
                    quizzes_weight: r.get(2)?,
                    exams_weight: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(all)
    }

    pub fn weights_upsert(&self, w: &GradeWeights) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO grade_weights(course_id, assignments_weight, quizzes_weight, exams_weight)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(course_id) DO UPDATE SET
               assignments_weight = excluded.assignments_weight,
               quizzes_weight = excluded.quizzes_weight,
               exams_weight = excluded.exams_weight",
            (
                &w.course_id,
                w.assignments_weight,
                w.quizzes_weight,
                w.exams_weight,
            ),
        )?;
        Ok(())
    }

    pub fn weights_delete(&self, course_id: &str) -> anyhow::Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM grade_weights WHERE course_id = ?", [course_id])?;
        Ok(n > 0)
    }

    // -- scores

    pub fn score_get(&self, id: &str) -> anyhow::Result<Option<ScoreRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, student_id, course_id, category, item_id, points_earned, points_possible
                 FROM scores
                 WHERE id = ?",
                [id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, Option<f64>>(5)?,
                        r.get::<_, f64>(6)?,
                    ))
                },
            )
            .optional()?;
        row.map(score_row_from_parts).transpose()
    }

    /// Every filter is optional; `None` matches all.
    pub fn score_list(
        &self,
        student_id: Option<&str>,
        course_id: Option<&str>,
        category: Option<Category>,
    ) -> anyhow::Result<Vec<ScoreRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_id, course_id, category, item_id, points_earned, points_possible
             FROM scores
             WHERE (?1 IS NULL OR student_id = ?1)
               AND (?2 IS NULL OR course_id = ?2)
               AND (?3 IS NULL OR category = ?3)
             ORDER BY student_id, course_id, category, item_id",
        )?;
        let parts = stmt
            .query_map((student_id, course_id, category.map(|c| c.as_str())), |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, Option<f64>>(5)?,
                    r.get::<_, f64>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        parts.into_iter().map(score_row_from_parts).collect()
    }

    /// Inserts or regrades; returns the stored row id.
    pub fn score_upsert(&self, row: &ScoreRow) -> anyhow::Result<String> {
        let id = if row.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            row.id.clone()
        };
        self.conn.execute(
            "INSERT INTO scores(id, student_id, course_id, category, item_id, points_earned, points_possible)
             VALUES(?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, course_id, category, item_id) DO UPDATE SET
               points_earned = excluded.points_earned,
               points_possible = excluded.points_possible",
            (
                &id,
                &row.student_id,
                &row.course_id,
                row.category.as_str(),
                &row.item_id,
                row.points_earned,
                row.points_possible,
            ),
        )?;
        let stored: String = self.conn.query_row(
            "SELECT id FROM scores
             WHERE student_id = ? AND course_id = ? AND category = ? AND item_id = ?",
            (
                &row.student_id,
                &row.course_id,
                row.category.as_str(),
                &row.item_id,
            ),
            |r| r.get(0),
        )?;
        Ok(stored)
    }

    pub fn score_delete(&self, id: &str) -> anyhow::Result<bool> {
        let n = self.conn.execute("DELETE FROM scores WHERE id = ?", [id])?;
        Ok(n > 0)
    }

    // -- quizzes

    pub fn quiz_get(&self, id: &str) -> anyhow::Result<Option<Quiz>> {
        let head: Option<(String, String, String, u32)> = self
            .conn
            .query_row(
                "SELECT id, course_id, title, duration_minutes FROM quizzes WHERE id = ?",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;
        let Some((id, course_id, title, duration_minutes)) = head else {
            return Ok(None);
        };
        let questions = self.quiz_questions(&id)?;
        Ok(Some(Quiz {
            id,
            course_id,
            title,
            duration_minutes,
            questions,
        }))
    }

    pub fn quiz_list(&self, course_id: Option<&str>) -> anyhow::Result<Vec<Quiz>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM quizzes
             WHERE (?1 IS NULL OR course_id = ?1)
             ORDER BY course_id, title, id",
        )?;
        let ids = stmt
            .query_map([course_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut quizzes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(q) = self.quiz_get(&id)? {
                quizzes.push(q);
            }
        }
        Ok(quizzes)
    }

    fn quiz_questions(&self, quiz_id: &str) -> anyhow::Result<Vec<QuizQuestion>> {
        let mut q_stmt = self.conn.prepare(
            "SELECT id, prompt, points FROM quiz_questions
             WHERE quiz_id = ?
             ORDER BY sort_order",
        )?;
        let mut questions = q_stmt
            .query_map([quiz_id], |r| {
                Ok(QuizQuestion {
                    id: r.get(0)?,
                    prompt: r.get(1)?,
                    points: r.get(2)?,
                    options: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut o_stmt = self.conn.prepare(
            "SELECT id, text, is_correct FROM quiz_question_options
             WHERE quiz_id = ? AND question_id = ?
             ORDER BY sort_order",
        )?;
        for q in &mut questions {
            q.options = o_stmt
                .query_map((quiz_id, &q.id), |r| {
                    Ok(QuizQuestionOption {
                        id: r.get(0)?,
                        text: r.get(1)?,
                        is_correct: r.get::<_, i64>(2)? != 0,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
        }
        Ok(questions)
    }

    /// Replaces the quiz and its whole question set.
    pub fn quiz_upsert(&self, quiz: &Quiz) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO quizzes(id, course_id, title, duration_minutes) VALUES(?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               course_id = excluded.course_id,
               title = excluded.title,
               duration_minutes = excluded.duration_minutes",
            (&quiz.id, &quiz.course_id, &quiz.title, quiz.duration_minutes),
        )?;
        tx.execute("DELETE FROM quiz_question_options WHERE quiz_id = ?", [&quiz.id])?;
        tx.execute("DELETE FROM quiz_questions WHERE quiz_id = ?", [&quiz.id])?;
        for (qi, q) in quiz.questions.iter().enumerate() {
            tx.execute(
                "INSERT INTO quiz_questions(quiz_id, id, sort_order, prompt, points)
                 VALUES(?, ?, ?, ?, ?)",
                (&quiz.id, &q.id, qi as i64, &q.prompt, q.points),
            )?;
            for (oi, o) in q.options.iter().enumerate() {
                tx.execute(
                    "INSERT INTO quiz_question_options(quiz_id, question_id, id, sort_order, text, is_correct)
                     VALUES(?, ?, ?, ?, ?, ?)",
                    (
                        &quiz.id,
                        &q.id,
                        &o.id,
                        oi as i64,
                        &o.text,
                        if o.is_correct { 1_i64 } else { 0_i64 },
                    ),
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Attempts are kept; they stop counting once their quiz is gone.
    pub fn quiz_delete(&self, id: &str) -> anyhow::Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM quiz_question_options WHERE quiz_id = ?", [id])?;
        tx.execute("DELETE FROM quiz_questions WHERE quiz_id = ?", [id])?;
        let n = tx.execute("DELETE FROM quizzes WHERE id = ?", [id])?;
        tx.commit()?;
        Ok(n > 0)
    }

    // -- quiz attempts

    pub fn attempt_get(&self, id: &str) -> anyhow::Result<Option<QuizAttempt>> {
        let parts = self
            .conn
            .query_row(
                "SELECT id, quiz_id, student_id, attempt_number, started_at, completed_at, score, points_possible, status, answers_json
                 FROM quiz_attempts
                 WHERE id = ?",
                [id],
                attempt_parts,
            )
            .optional()?;
        parts.map(attempt_from_parts).transpose()
    }

    pub fn attempt_list(
        &self,
        student_id: Option<&str>,
        quiz_id: Option<&str>,
    ) -> anyhow::Result<Vec<QuizAttempt>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, quiz_id, student_id, attempt_number, started_at, completed_at, score, points_possible, status, answers_json
             FROM quiz_attempts
             WHERE (?1 IS NULL OR student_id = ?1)
               AND (?2 IS NULL OR quiz_id = ?2)
             ORDER BY quiz_id, student_id, attempt_number",
        )?;
        let parts = stmt
            .query_map((student_id, quiz_id), attempt_parts)?
            .collect::<Result<Vec<_>, _>>()?;
        parts.into_iter().map(attempt_from_parts).collect()
    }

    pub fn next_attempt_number(&self, quiz_id: &str, student_id: &str) -> anyhow::Result<u32> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(attempt_number) FROM quiz_attempts WHERE quiz_id = ? AND student_id = ?",
            (quiz_id, student_id),
            |r| r.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    pub fn attempt_insert(&self, a: &QuizAttempt) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO quiz_attempts(id, quiz_id, student_id, attempt_number, started_at, completed_at, score, points_possible, status, answers_json)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &a.id,
                &a.quiz_id,
                &a.student_id,
                a.attempt_number,
                a.started_at.to_rfc3339(),
                a.completed_at.map(|t| t.to_rfc3339()),
                a.score,
                a.points_possible,
                a.status.as_str(),
                serde_json::to_string(&a.answers)?,
            ),
        )?;
        Ok(())
    }

    /// Writes the attempt only if the stored copy is still in progress.
    /// Returns false when another writer already finalized it.
    pub fn attempt_update_open(&self, a: &QuizAttempt) -> anyhow::Result<bool> {
        let n = self.conn.execute(
            "UPDATE quiz_attempts
             SET completed_at = ?, score = ?, points_possible = ?, status = ?, answers_json = ?
             WHERE id = ? AND status = ?",
            (
                a.completed_at.map(|t| t.to_rfc3339()),
                a.score,
                a.points_possible,
                a.status.as_str(),
                serde_json::to_string(&a.answers)?,
                &a.id,
                AttemptStatus::InProgress.as_str(),
            ),
        )?;
        Ok(n > 0)
    }

    // -- transcript

    pub fn transcript_list(&self, student_id: &str) -> anyhow::Result<Vec<TranscriptEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT course_code, course_name, credits, final_grade, semester
             FROM transcript_entries
             WHERE student_id = ?
             ORDER BY semester, course_code",
        )?;
        let entries = stmt
            .query_map([student_id], |r| {
                Ok(TranscriptEntry {
                    course_code: r.get(0)?,
                    course_name: r.get(1)?,
                    credits: r.get(2)?,
                    final_grade: r.get(3)?,
                    semester: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Keyed by (student, course code, semester); a regrade replaces the entry.
    pub fn transcript_upsert(&self, student_id: &str, e: &TranscriptEntry) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO transcript_entries(student_id, course_code, semester, course_name, credits, final_grade)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, course_code, semester) DO UPDATE SET
               course_name = excluded.course_name,
               credits = excluded.credits,
               final_grade = excluded.final_grade",
            (
                student_id,
                &e.course_code,
                &e.semester,
                &e.course_name,
                e.credits,
                &e.final_grade,
            ),
        )?;
        Ok(())
    }

    pub fn transcript_delete(
        &self,
        student_id: &str,
        course_code: &str,
        semester: &str,
    ) -> anyhow::Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM transcript_entries WHERE student_id = ? AND course_code = ? AND semester = ?",
            (student_id, course_code, semester),
        )?;
        Ok(n > 0)
    }

    // -- settings

    pub fn settings_get_json(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
                r.get(0)
            })
            .optional()?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub fn settings_set_json(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO settings(key, value_json) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            (key, serde_json::to_string(value)?),
        )?;
        Ok(())
    }

    pub fn settings_delete(&self, key: &str) -> anyhow::Result<bool> {
        let n = self.conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
        Ok(n > 0)
    }

    /// Stored scale, or the conventional one when none is set.
    pub fn letter_scale(&self) -> anyhow::Result<LetterScale> {
        match self.settings_get_json(LETTER_SCALE_SETTING)? {
            Some(v) => Ok(serde_json::from_value(v)?),
            None => Ok(LetterScale::default()),
        }
    }
}

impl GradeSource for Store {
    fn score_records(
        &self,
        student_id: &str,
        course_id: &str,
        category: Category,
    ) -> anyhow::Result<Vec<ScoreRecord>> {
        let mut records = Vec::new();
        for row in self.score_list(Some(student_id), Some(course_id), Some(category))? {
            match row.record() {
                Ok(r) => records.push(r),
                Err(e) => log::warn!("score {} skipped: {}", row.id, e),
            }
        }

        if category == Category::Quiz {
            for quiz in self.quiz_list(Some(course_id))? {
                let attempts = self.attempt_list(Some(student_id), Some(&quiz.id))?;
                if let Some(r) = eligible_score_record(&quiz, &attempts) {
                    records.push(r);
                }
            }
        }
        Ok(records)
    }

    fn active_weights(&self, course_id: &str) -> anyhow::Result<Option<GradeWeights>> {
        self.weights_get(course_id)
    }
}

impl TranscriptSource for Store {
    fn transcript_entries(&self, student_id: &str) -> anyhow::Result<Vec<TranscriptEntry>> {
        self.transcript_list(student_id)
    }
}

type ScoreParts = (String, String, String, String, String, Option<f64>, f64);

fn score_row_from_parts(p: ScoreParts) -> anyhow::Result<ScoreRow> {
    let (id, student_id, course_id, category, item_id, points_earned, points_possible) = p;
    let category = Category::parse(&category)
        .ok_or_else(|| anyhow::anyhow!("score {}: unknown category {}", id, category))?;
    Ok(ScoreRow {
        id,
        student_id,
        course_id,
        category,
        item_id,
        points_earned,
        points_possible,
    })
}

type AttemptParts = (
    String,
    String,
    String,
    u32,
    String,
    Option<String>,
    Option<f64>,
    Option<f64>,
    String,
    String,
);

fn attempt_parts(r: &rusqlite::Row<'_>) -> rusqlite::Result<AttemptParts> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
        r.get(9)?,
    ))
}

fn attempt_from_parts(p: AttemptParts) -> anyhow::Result<QuizAttempt> {
    let (
        id,
        quiz_id,
        student_id,
        attempt_number,
        started_at,
        completed_at,
        score,
        points_possible,
        status,
        answers_json,
    ) = p;
    let status = AttemptStatus::parse(&status)
        .ok_or_else(|| anyhow::anyhow!("attempt {}: unknown status {}", id, status))?;
    let answers: Answers = serde_json::from_str(&answers_json)?;
    Ok(QuizAttempt {
        id,
        quiz_id,
        student_id,
        attempt_number,
        started_at: parse_ts(&started_at)?,
        completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
        score,
        points_possible,
        status,
        answers,
    })
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            credits INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_weights(
            course_id TEXT PRIMARY KEY,
            assignments_weight REAL NOT NULL,
            quizzes_weight REAL NOT NULL,
            exams_weight REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scores(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            category TEXT NOT NULL,
            item_id TEXT NOT NULL,
            points_earned REAL,
            points_possible REAL NOT NULL,
            UNIQUE(student_id, course_id, category, item_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_student_course ON scores(student_id, course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS quizzes(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quizzes_course ON quizzes(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS quiz_questions(
            quiz_id TEXT NOT NULL,
            id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            prompt TEXT NOT NULL,
            points REAL NOT NULL,
            PRIMARY KEY(quiz_id, id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS quiz_question_options(
            quiz_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            text TEXT NOT NULL,
            is_correct INTEGER NOT NULL,
            PRIMARY KEY(quiz_id, question_id, id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS quiz_attempts(
            id TEXT PRIMARY KEY,
            quiz_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            attempt_number INTEGER NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            score REAL,
            points_possible REAL,
            status TEXT NOT NULL,
            answers_json TEXT NOT NULL,
            UNIQUE(quiz_id, student_id, attempt_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quiz_attempts_student ON quiz_attempts(student_id, quiz_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transcript_entries(
            student_id TEXT NOT NULL,
            course_code TEXT NOT NULL,
            semester TEXT NOT NULL,
            course_name TEXT NOT NULL,
            credits INTEGER NOT NULL,
            final_grade TEXT NOT NULL,
            PRIMARY KEY(student_id, course_code, semester)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::compute_course_grade;
    use crate::transcript::compute_student_gpa;
    use chrono::TimeZone;

    fn store() -> Store {
        Store::open_in_memory().expect("open store")
    }

    fn score(student: &str, category: Category, item: &str, earned: Option<f64>, possible: f64) -> ScoreRow {
        ScoreRow {
            id: String::new(),
            student_id: student.into(),
            course_id: "c1".into(),
            category,
            item_id: item.into(),
            points_earned: earned,
            points_possible: possible,
        }
    }

    fn quiz() -> Quiz {
        Quiz {
            id: "qz".into(),
            course_id: "c1".into(),
            title: "Pop quiz".into(),
            duration_minutes: 10,
            questions: vec![QuizQuestion {
                id: "only".into(),
                prompt: "yes?".into(),
                points: 4.0,
                options: vec![
                    QuizQuestionOption {
                        id: "y".into(),
                        text: "yes".into(),
                        is_correct: true,
                    },
                    QuizQuestionOption {
                        id: "n".into(),
                        text: "no".into(),
                        is_correct: false,
                    },
                ],
            }],
        }
    }

    #[test]
    fn score_upsert_regrades_in_place() {
        let s = store();
        let id1 = s
            .score_upsert(&score("s1", Category::Exam, "mid", Some(40.0), 50.0))
            .unwrap();
        let id2 = s
            .score_upsert(&score("s1", Category::Exam, "mid", Some(45.0), 50.0))
            .unwrap();
        assert_eq!(id1, id2);
        let rows = s.score_list(Some("s1"), None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].points_earned, Some(45.0));
        assert_eq!(s.score_get(&id1).unwrap().unwrap().item_id, "mid");
        assert!(s.score_delete(&id1).unwrap());
        assert!(!s.score_delete(&id1).unwrap());
    }

    #[test]
    fn quiz_round_trips_with_options_in_order() {
        let s = store();
        s.quiz_upsert(&quiz()).unwrap();
        assert_eq!(s.quiz_get("qz").unwrap(), Some(quiz()));
        assert_eq!(s.quiz_list(Some("c1")).unwrap().len(), 1);
        assert!(s.quiz_list(Some("other")).unwrap().is_empty());
        assert!(s.quiz_delete("qz").unwrap());
        assert_eq!(s.quiz_get("qz").unwrap(), None);
    }

    #[test]
    fn attempt_update_is_refused_once_finalized() {
        let s = store();
        let q = quiz();
        s.quiz_upsert(&q).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let mut a = QuizAttempt::start(&q, "s1", s.next_attempt_number("qz", "s1").unwrap(), t0);
        assert_eq!(a.attempt_number, 1);
        s.attempt_insert(&a).unwrap();

        a.time_out(&q).unwrap();
        assert!(s.attempt_update_open(&a).unwrap());
        assert!(!s.attempt_update_open(&a).unwrap());

        let stored = s.attempt_get(&a.id).unwrap().unwrap();
        assert_eq!(stored, a);
        assert_eq!(s.next_attempt_number("qz", "s1").unwrap(), 2);
    }

    #[test]
    fn quiz_category_includes_latest_finalized_attempt() {
        let s = store();
        let q = quiz();
        s.quiz_upsert(&q).unwrap();
        s.score_upsert(&score("s1", Category::Quiz, "paper", Some(1.0), 2.0))
            .unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();

        let mut a = QuizAttempt::start(&q, "s1", 1, t0);
        s.attempt_insert(&a).unwrap();
        assert_eq!(s.score_records("s1", "c1", Category::Quiz).unwrap().len(), 1);

        let mut answers = Answers::new();
        answers.insert("only".into(), "y".into());
        a.submit(&q, answers, t0).unwrap();
        s.attempt_update_open(&a).unwrap();

        let records = s.score_records("s1", "c1", Category::Quiz).unwrap();
        let pcts: Vec<Option<f64>> = records.iter().map(|r| r.percentage()).collect();
        assert_eq!(pcts, vec![Some(50.0), Some(100.0)]);
    }

    #[test]
    fn quiz_edit_after_finalize_keeps_attempt_total() {
        let s = store();
        let q = quiz();
        s.quiz_upsert(&q).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let mut a = QuizAttempt::start(&q, "s1", 1, t0);
        s.attempt_insert(&a).unwrap();
        let mut answers = Answers::new();
        answers.insert("only".into(), "y".into());
        a.submit(&q, answers, t0).unwrap();
        assert!(s.attempt_update_open(&a).unwrap());

        let mut edited = q.clone();
        edited.questions[0].points = 1.0;
        s.quiz_upsert(&edited).unwrap();

        let stored = s.attempt_get(&a.id).unwrap().unwrap();
        assert_eq!(stored.points_possible, Some(4.0));
        let records = s.score_records("s1", "c1", Category::Quiz).unwrap();
        let pcts: Vec<Option<f64>> = records.iter().map(|r| r.percentage()).collect();
        assert_eq!(pcts, vec![Some(100.0)]);
    }

    #[test]
    fn store_backs_course_grade_and_gpa() {
        let s = store();
        s.weights_upsert(&GradeWeights {
            course_id: "c1".into(),
            assignments_weight: 40.0,
            quizzes_weight: 20.0,
            exams_weight: 40.0,
        })
        .unwrap();
        s.score_upsert(&score("s1", Category::Assignment, "hw1", Some(9.0), 10.0))
            .unwrap();
        s.score_upsert(&score("s1", Category::Exam, "final", Some(70.0), 100.0))
            .unwrap();

        let scale = s.letter_scale().unwrap();
        let report = compute_course_grade(&s, &scale, "s1", "c1").unwrap();
        let r = report.grade.result().expect("graded");
        assert!((r.final_percentage - 80.0).abs() < 1e-9);

        assert_eq!(compute_student_gpa(&s, "s1").unwrap().gpa(), None);
        s.transcript_upsert(
            "s1",
            &TranscriptEntry {
                course_code: "CS101".into(),
                course_name: "Intro".into(),
                credits: 3,
                final_grade: r.letter_grade.clone(),
                semester: "2025F".into(),
            },
        )
        .unwrap();
        let gpa = compute_student_gpa(&s, "s1").unwrap().gpa().expect("gpa");
        assert!((gpa - 2.7).abs() < 1e-9);
    }

    #[test]
    fn letter_scale_defaults_until_set() {
        let s = store();
        assert_eq!(s.letter_scale().unwrap(), LetterScale::default());
        let custom = serde_json::json!({
            "bands": [{ "letter": "P", "minPercent": 50.0 }],
            "floorLetter": "NP"
        });
        s.settings_set_json(LETTER_SCALE_SETTING, &custom).unwrap();
        let scale = s.letter_scale().unwrap();
        assert_eq!(scale.letter_for(49.0), "NP");
        assert_eq!(scale.letter_for(50.0), "P");
    }

    #[test]
    fn deleting_course_drops_its_weights() {
        let s = store();
        s.course_upsert(&Course {
            id: "c1".into(),
            code: "CS101".into(),
            name: "Intro".into(),
            credits: 3,
        })
        .unwrap();
        s.weights_upsert(&GradeWeights {
            course_id: "c1".into(),
            assignments_weight: 100.0,
            quizzes_weight: 0.0,
            exams_weight: 0.0,
        })
        .unwrap();
        assert!(s.course_delete("c1").unwrap());
        assert_eq!(s.weights_get("c1").unwrap(), None);
        assert!(s.course_list().unwrap().is_empty());
    }
}
