use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::store::{ProgressStore, StoreTx};
use crate::error::{Error, Result};
use crate::models::attempt::{AnswerSheet, AssessmentRef, AttemptRecord};
use crate::models::course::{Course, CourseOutline, Module};
use crate::models::enrollment::Enrollment;
use crate::models::module_progress::ModuleProgress;
use crate::models::question::{Question, QuestionOption, QuestionType};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }
}

struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| Error::storage("transaction already committed"))
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    question_number: i32,
    question_text: String,
    question_type: QuestionType,
    options: Json<Vec<QuestionOption>>,
    correct_answer: String,
    explanation: Option<String>,
    points: i32,
    source_module: Option<i32>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            question_number: row.question_number,
            question_text: row.question_text,
            question_type: row.question_type,
            options: row.options.0,
            correct_answer: row.correct_answer,
            explanation: row.explanation,
            points: row.points,
            source_module: row.source_module,
        }
    }
}

#[derive(FromRow)]
struct ModuleProgressRow {
    id: Uuid,
    learner_id: Uuid,
    course_id: Uuid,
    module_id: Uuid,
    enrollment_id: Uuid,
    completed_slides: Vec<i32>,
    current_slide: i32,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
    quiz_passed: bool,
    quiz_best_score: Option<i32>,
    quiz_attempts_count: i32,
    last_accessed_at: DateTime<Utc>,
}

impl From<ModuleProgressRow> for ModuleProgress {
    fn from(row: ModuleProgressRow) -> Self {
        ModuleProgress {
            id: row.id,
            learner_id: row.learner_id,
            course_id: row.course_id,
            module_id: row.module_id,
            enrollment_id: row.enrollment_id,
            completed_slides: row.completed_slides.into_iter().collect(),
            current_slide: row.current_slide,
            is_completed: row.is_completed,
            completed_at: row.completed_at,
            quiz_passed: row.quiz_passed,
            quiz_best_score: row.quiz_best_score,
            quiz_attempts_count: row.quiz_attempts_count,
            last_accessed_at: row.last_accessed_at,
        }
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    learner_id: Uuid,
    assessment_kind: String,
    assessment_id: Uuid,
    attempt_number: i32,
    answers: Json<AnswerSheet>,
    score: i32,
    earned_points: i32,
    total_points: i32,
    passed: bool,
    time_spent_seconds: Option<i32>,
    completed_at: DateTime<Utc>,
}

impl TryFrom<AttemptRow> for AttemptRecord {
    type Error = Error;

    fn try_from(row: AttemptRow) -> Result<Self> {
        let assessment = AssessmentRef::from_parts(&row.assessment_kind, row.assessment_id)
            .ok_or_else(|| {
                Error::storage(format!("unknown assessment kind '{}'", row.assessment_kind))
            })?;
        Ok(AttemptRecord {
            id: row.id,
            learner_id: row.learner_id,
            assessment,
            attempt_number: row.attempt_number,
            answers: row.answers.0,
            score: row.score,
            earned_points: row.earned_points,
            total_points: row.total_points,
            passed: row.passed,
            time_spent_seconds: row.time_spent_seconds,
            completed_at: row.completed_at,
        })
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn course_outline(&mut self, course_id: Uuid) -> Result<Option<CourseOutline>> {
        let conn = self.conn()?;
        let course = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, slug, certificate_enabled, has_final_exam,
                   final_exam_passing_score, final_exam_max_attempts, published_at
            FROM courses WHERE id = $1
            "#,
        )
        .bind(course_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(course) = course else {
            return Ok(None);
        };

        let modules = sqlx::query_as::<_, Module>(
            r#"
            SELECT id, course_id, module_number, total_slides, has_quiz, quiz_required,
                   quiz_passing_score, quiz_max_attempts
            FROM course_modules
            WHERE course_id = $1
            ORDER BY module_number
            "#,
        )
        .bind(course_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(CourseOutline::new(course, modules)))
    }

    async fn questions(&mut self, assessment: AssessmentRef) -> Result<Vec<Question>> {
        let sql = match assessment {
            AssessmentRef::ModuleQuiz(_) => {
                r#"SELECT id, question_number, question_text, question_type, options, correct_answer,
                          explanation, points, NULL::integer AS source_module
                   FROM module_quiz_questions WHERE module_id = $1 ORDER BY question_number"#
            }
            AssessmentRef::FinalExam(_) => {
                r#"SELECT id, question_number, question_text, question_type, options, correct_answer,
                          explanation, points, source_module
                   FROM final_exam_questions WHERE course_id = $1 ORDER BY question_number"#
            }
        };
        let rows = sqlx::query_as::<_, QuestionRow>(sql)
            .bind(assessment.target_id())
            .fetch_all(self.conn()?)
            .await?;
        Ok(rows.into_iter().map(Question::from).collect())
    }

    async fn enrollment_for_update(
        &mut self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        let row = sqlx::query_as::<_, Enrollment>(
            r#"SELECT * FROM course_enrollments WHERE learner_id = $1 AND course_id = $2 FOR UPDATE"#,
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn enrollment(&mut self, learner_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        let row = sqlx::query_as::<_, Enrollment>(
            r#"SELECT * FROM course_enrollments WHERE learner_id = $1 AND course_id = $2"#,
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn certified_enrollments(&mut self, id_prefix: &str) -> Result<Vec<Enrollment>> {
        let rows = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT * FROM course_enrollments
            WHERE certificate_issued = TRUE
              AND replace(id::text, '-', '') LIKE $1 || '%'
            "#,
        )
        .bind(id_prefix.to_lowercase())
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn insert_enrollment(&mut self, e: &Enrollment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO course_enrollments (
                id, learner_id, course_id, status, progress_percentage, current_module_number,
                final_exam_unlocked, final_exam_passed, final_exam_best_score, final_exam_attempts,
                certificate_issued, certificate_issued_at, enrolled_at, started_at, completed_at,
                last_accessed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(e.id)
        .bind(e.learner_id)
        .bind(e.course_id)
        .bind(e.status)
        .bind(e.progress_percentage)
        .bind(e.current_module_number)
        .bind(e.final_exam_unlocked)
        .bind(e.final_exam_passed)
        .bind(e.final_exam_best_score)
        .bind(e.final_exam_attempts)
        .bind(e.certificate_issued)
        .bind(e.certificate_issued_at)
        .bind(e.enrolled_at)
        .bind(e.started_at)
        .bind(e.completed_at)
        .bind(e.last_accessed_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn update_enrollment(&mut self, e: &Enrollment) -> Result<()> {
        // Monotonic flags are OR-ed so a stale writer can never clear them.
        sqlx::query(
            r#"
            UPDATE course_enrollments
            SET status = $2,
                progress_percentage = $3,
                current_module_number = $4,
                final_exam_unlocked = final_exam_unlocked OR $5,
                final_exam_passed = final_exam_passed OR $6,
                final_exam_best_score = $7,
                final_exam_attempts = $8,
                certificate_issued = certificate_issued OR $9,
                certificate_issued_at = COALESCE(certificate_issued_at, $10),
                started_at = $11,
                completed_at = $12,
                last_accessed_at = $13,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(e.id)
        .bind(e.status)
        .bind(e.progress_percentage)
        .bind(e.current_module_number)
        .bind(e.final_exam_unlocked)
        .bind(e.final_exam_passed)
        .bind(e.final_exam_best_score)
        .bind(e.final_exam_attempts)
        .bind(e.certificate_issued)
        .bind(e.certificate_issued_at)
        .bind(e.started_at)
        .bind(e.completed_at)
        .bind(e.last_accessed_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn delete_enrollment(&mut self, e: &Enrollment) -> Result<()> {
        let conn = self.conn()?;
        sqlx::query(r#"DELETE FROM user_module_progress WHERE enrollment_id = $1"#)
            .bind(e.id)
            .execute(&mut *conn)
            .await?;
        sqlx::query(r#"DELETE FROM course_enrollments WHERE id = $1"#)
            .bind(e.id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn module_progress(
        &mut self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<ModuleProgress>> {
        let rows = sqlx::query_as::<_, ModuleProgressRow>(
            r#"
            SELECT id, learner_id, course_id, module_id, enrollment_id, completed_slides,
                   current_slide, is_completed, completed_at, quiz_passed, quiz_best_score,
                   quiz_attempts_count, last_accessed_at
            FROM user_module_progress
            WHERE learner_id = $1 AND course_id = $2
            "#,
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows.into_iter().map(ModuleProgress::from).collect())
    }

    async fn upsert_module_progress(&mut self, p: &ModuleProgress) -> Result<()> {
        let slides: Vec<i32> = p.completed_slides.iter().copied().collect();
        sqlx::query(
            r#"
            INSERT INTO user_module_progress (
                id, learner_id, course_id, module_id, enrollment_id, completed_slides,
                current_slide, is_completed, completed_at, quiz_passed, quiz_best_score,
                quiz_attempts_count, last_accessed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (learner_id, module_id) DO UPDATE SET
                completed_slides = EXCLUDED.completed_slides,
                current_slide = EXCLUDED.current_slide,
                is_completed = user_module_progress.is_completed OR EXCLUDED.is_completed,
                completed_at = COALESCE(user_module_progress.completed_at, EXCLUDED.completed_at),
                quiz_passed = user_module_progress.quiz_passed OR EXCLUDED.quiz_passed,
                quiz_best_score = EXCLUDED.quiz_best_score,
                quiz_attempts_count = EXCLUDED.quiz_attempts_count,
                last_accessed_at = EXCLUDED.last_accessed_at,
                updated_at = NOW()
            "#,
        )
        .bind(p.id)
        .bind(p.learner_id)
        .bind(p.course_id)
        .bind(p.module_id)
        .bind(p.enrollment_id)
        .bind(slides)
        .bind(p.current_slide)
        .bind(p.is_completed)
        .bind(p.completed_at)
        .bind(p.quiz_passed)
        .bind(p.quiz_best_score)
        .bind(p.quiz_attempts_count)
        .bind(p.last_accessed_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn attempts(
        &mut self,
        learner_id: Uuid,
        assessment: AssessmentRef,
    ) -> Result<Vec<AttemptRecord>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT id, learner_id, assessment_kind, assessment_id, attempt_number, answers,
                   score, earned_points, total_points, passed, time_spent_seconds, completed_at
            FROM assessment_attempts
            WHERE learner_id = $1 AND assessment_kind = $2 AND assessment_id = $3
            ORDER BY attempt_number
            "#,
        )
        .bind(learner_id)
        .bind(assessment.kind())
        .bind(assessment.target_id())
        .fetch_all(self.conn()?)
        .await?;
        rows.into_iter().map(AttemptRecord::try_from).collect()
    }

    async fn insert_attempt(&mut self, r: &AttemptRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO assessment_attempts (
                id, learner_id, assessment_kind, assessment_id, attempt_number, answers,
                score, earned_points, total_points, passed, time_spent_seconds, completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(r.id)
        .bind(r.learner_id)
        .bind(r.assessment.kind())
        .bind(r.assessment.target_id())
        .bind(r.attempt_number)
        .bind(Json(&r.answers))
        .bind(r.score)
        .bind(r.earned_points)
        .bind(r.total_points)
        .bind(r.passed)
        .bind(r.time_spent_seconds)
        .bind(r.completed_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => {
                tx.commit().await?;
                Ok(())
            }
            None => Err(Error::storage("transaction already committed")),
        }
    }
}
