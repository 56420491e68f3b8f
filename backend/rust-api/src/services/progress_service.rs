use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use mongodb::{Client, ClientSession, Database};

use crate::error::ApiError;
use crate::metrics::{LESSONS_COMPLETED_TOTAL, QUIZZES_SUBMITTED_TOTAL};
use crate::models::course::{Course, Lesson, Question};
use crate::models::progress::{
    completion_percentage, Progress, QuizResult, QuizSubmissionResponse,
};
use crate::models::user::User;
use crate::services::economy_service::is_transient_txn_error;
use crate::utils::retry::{retry_if, RetryConfig};
use crate::utils::time::chrono_to_bson;

/// Coins credited for the first completion of a lesson.
pub const LESSON_REWARD: i64 = 10;
/// Quiz reward tiers by correct-answer ratio.
pub const QUIZ_REWARD_HIGH: i64 = 50;
pub const QUIZ_REWARD_MEDIUM: i64 = 30;
pub const QUIZ_HIGH_RATIO: f64 = 0.8;
pub const QUIZ_PASS_RATIO: f64 = 0.6;

/// Positional scoring: answer `i` is correct iff it equals question `i`'s
/// correct index. Missing answers score nothing.
pub fn score_quiz(questions: &[Question], answers: &[u32]) -> u32 {
    questions
        .iter()
        .enumerate()
        .filter(|(index, question)| answers.get(*index) == Some(&question.correct_answer))
        .count() as u32
}

pub fn quiz_reward(score: u32, total_questions: u32) -> i64 {
    if total_questions == 0 {
        return 0;
    }
    let ratio = score as f64 / total_questions as f64;
    if ratio >= QUIZ_HIGH_RATIO {
        QUIZ_REWARD_HIGH
    } else if ratio >= QUIZ_PASS_RATIO {
        QUIZ_REWARD_MEDIUM
    } else {
        0
    }
}

pub fn quiz_passed(score: u32, total_questions: u32) -> bool {
    total_questions > 0 && (score as f64 / total_questions as f64) >= QUIZ_PASS_RATIO
}

pub struct ProgressService {
    mongo: Database,
    client: Client,
}

pub struct LessonView {
    pub lesson: Lesson,
    pub course_title: String,
    pub teacher: ObjectId,
}

pub struct LessonCompletion {
    pub coins_added: i64,
    pub progress: i32,
}

impl ProgressService {
    pub fn new(mongo: Database, client: Client) -> Self {
        Self { mongo, client }
    }

    /// Progress records for a user, most recently accessed first.
    pub async fn list(&self, user_id: &ObjectId) -> Result<Vec<Progress>, ApiError> {
        let progress = self.mongo.collection::<Progress>("progress");
        let mut cursor = progress
            .find(doc! { "user": user_id })
            .sort(doc! { "lastAccessed": -1 })
            .await?;

        let mut result = Vec::new();
        while let Some(record) = cursor.try_next().await? {
            result.push(record);
        }
        Ok(result)
    }

    pub async fn get(
        &self,
        user_id: &ObjectId,
        course_id: &ObjectId,
    ) -> Result<Option<Progress>, ApiError> {
        let progress = self.mongo.collection::<Progress>("progress");
        Ok(progress
            .find_one(doc! { "user": user_id, "course": course_id })
            .await?)
    }

    /// Open a lesson: requires enrollment, moves the current-lesson marker
    /// and refreshes the last-accessed timestamp.
    pub async fn view_lesson(
        &self,
        course_id: &ObjectId,
        lesson_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<LessonView, ApiError> {
        let progress_coll = self.mongo.collection::<Progress>("progress");

        let progress = progress_coll
            .find_one(doc! { "user": user_id, "course": course_id })
            .await?;
        if progress.is_none() {
            return Err(ApiError::forbidden("Not enrolled in this course"));
        }

        let course = self.load_course(course_id).await?;
        let lesson = course
            .lessons
            .iter()
            .find(|lesson| &lesson.id == lesson_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Lesson not found"))?;

        progress_coll
            .update_one(
                doc! { "user": user_id, "course": course_id },
                doc! { "$set": {
                    "currentLesson": lesson_id,
                    "lastAccessed": chrono_to_bson(Utc::now()),
                } },
            )
            .await?;

        Ok(LessonView {
            lesson,
            course_title: course.title,
            teacher: course.teacher,
        })
    }

    /// Complete a lesson. Idempotent: a lesson already in the completed set
    /// changes nothing and re-awards nothing. The first completion updates
    /// the percentage and credits the reward atomically.
    pub async fn complete_lesson(
        &self,
        course_id: &ObjectId,
        lesson_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<LessonCompletion, ApiError> {
        let completion = retry_if(RetryConfig::default(), is_transient_txn_error, || {
            self.complete_lesson_txn(course_id, lesson_id, user_id)
        })
        .await?;

        LESSONS_COMPLETED_TOTAL
            .with_label_values(&[if completion.coins_added > 0 {
                "true"
            } else {
                "false"
            }])
            .inc();

        Ok(completion)
    }

    async fn complete_lesson_txn(
        &self,
        course_id: &ObjectId,
        lesson_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<LessonCompletion, ApiError> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        match self
            .complete_lesson_steps(&mut session, course_id, lesson_id, user_id)
            .await
        {
            Ok(completion) => {
                session.commit_transaction().await?;
                Ok(completion)
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }

    async fn complete_lesson_steps(
        &self,
        session: &mut ClientSession,
        course_id: &ObjectId,
        lesson_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<LessonCompletion, ApiError> {
        let progress_coll = self.mongo.collection::<Progress>("progress");
        let users = self.mongo.collection::<User>("users");

        let progress = progress_coll
            .find_one(doc! { "user": user_id, "course": course_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| ApiError::forbidden("Not enrolled in this course"))?;

        if progress.completed_lessons.contains(lesson_id) {
            return Ok(LessonCompletion {
                coins_added: 0,
                progress: progress.progress,
            });
        }

        let course = self.load_course(course_id).await?;
        if !course.lessons.iter().any(|lesson| &lesson.id == lesson_id) {
            return Err(ApiError::not_found("Lesson not found"));
        }

        let new_percentage = completion_percentage(
            progress.completed_lessons.len() + 1,
            course.lessons.len(),
        );

        progress_coll
            .update_one(
                doc! { "user": user_id, "course": course_id },
                doc! {
                    "$addToSet": { "completedLessons": lesson_id },
                    "$set": {
                        "progress": new_percentage,
                        "lastAccessed": chrono_to_bson(Utc::now()),
                    },
                },
            )
            .session(&mut *session)
            .await?;

        users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$inc": { "coins": LESSON_REWARD } },
            )
            .session(&mut *session)
            .await?;

        Ok(LessonCompletion {
            coins_added: LESSON_REWARD,
            progress: new_percentage,
        })
    }

    /// Score a quiz submission, replace any prior result for the quiz id and
    /// credit the tier reward, all in one transaction.
    pub async fn submit_quiz(
        &self,
        course_id: &ObjectId,
        quiz_id: &ObjectId,
        user_id: &ObjectId,
        answers: &[u32],
    ) -> Result<QuizSubmissionResponse, ApiError> {
        let response = retry_if(RetryConfig::default(), is_transient_txn_error, || {
            self.submit_quiz_txn(course_id, quiz_id, user_id, answers)
        })
        .await?;

        QUIZZES_SUBMITTED_TOTAL
            .with_label_values(&[if response.passed { "true" } else { "false" }])
            .inc();

        Ok(response)
    }

    async fn submit_quiz_txn(
        &self,
        course_id: &ObjectId,
        quiz_id: &ObjectId,
        user_id: &ObjectId,
        answers: &[u32],
    ) -> Result<QuizSubmissionResponse, ApiError> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        match self
            .submit_quiz_steps(&mut session, course_id, quiz_id, user_id, answers)
            .await
        {
            Ok(response) => {
                session.commit_transaction().await?;
                Ok(response)
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }

    async fn submit_quiz_steps(
        &self,
        session: &mut ClientSession,
        course_id: &ObjectId,
        quiz_id: &ObjectId,
        user_id: &ObjectId,
        answers: &[u32],
    ) -> Result<QuizSubmissionResponse, ApiError> {
        let progress_coll = self.mongo.collection::<Progress>("progress");
        let users = self.mongo.collection::<User>("users");

        let course = self.load_course(course_id).await?;
        let quiz = course
            .quizzes
            .iter()
            .find(|quiz| &quiz.id == quiz_id)
            .ok_or_else(|| ApiError::not_found("Quiz not found"))?;

        let progress = progress_coll
            .find_one(doc! { "user": user_id, "course": course_id })
            .session(&mut *session)
            .await?;
        if progress.is_none() {
            return Err(ApiError::forbidden("Not enrolled in this course"));
        }

        let total_questions = quiz.questions.len() as u32;
        let score = score_quiz(&quiz.questions, answers);
        let coins_earned = quiz_reward(score, total_questions);
        let passed = quiz_passed(score, total_questions);

        let result = QuizResult {
            quiz_id: *quiz_id,
            score,
            total_questions,
            answers: answers.to_vec(),
            completed_at: Utc::now(),
        };

        // Last-write-wins per quiz id: drop the old result, push the new one.
        progress_coll
            .update_one(
                doc! { "user": user_id, "course": course_id },
                doc! { "$pull": { "quizResults": { "quizId": quiz_id } } },
            )
            .session(&mut *session)
            .await?;
        progress_coll
            .update_one(
                doc! { "user": user_id, "course": course_id },
                doc! {
                    "$push": { "quizResults": to_bson(&result)
                        .map_err(|e| ApiError::Internal(e.into()))? },
                    "$set": { "lastAccessed": chrono_to_bson(Utc::now()) },
                },
            )
            .session(&mut *session)
            .await?;

        if coins_earned > 0 {
            users
                .update_one(
                    doc! { "_id": user_id },
                    doc! { "$inc": { "coins": coins_earned } },
                )
                .session(&mut *session)
                .await?;
        }

        let success_rate = if total_questions == 0 {
            0
        } else {
            ((score as f64 / total_questions as f64) * 100.0).round() as u32
        };

        Ok(QuizSubmissionResponse {
            score,
            total_questions,
            success_rate,
            coins_earned,
            passed,
        })
    }

    async fn load_course(&self, course_id: &ObjectId) -> Result<Course, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        courses
            .find_one(doc! { "_id": course_id })
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))
    }
}
