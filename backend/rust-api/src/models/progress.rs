use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Progress document: one per (user, course) pair, created on enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    pub course: ObjectId,
    #[serde(default)]
    pub completed_lessons: Vec<ObjectId>,
    #[serde(default)]
    pub quiz_results: Vec<QuizResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_lesson: Option<ObjectId>,
    /// Completion percentage, 0..=100.
    #[serde(default)]
    pub progress: i32,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub last_accessed: DateTime<Utc>,
}

impl Progress {
    pub fn new(user: ObjectId, course: ObjectId, current_lesson: Option<ObjectId>) -> Self {
        Progress {
            id: None,
            user,
            course,
            completed_lessons: Vec::new(),
            quiz_results: Vec::new(),
            current_lesson,
            progress: 0,
            last_accessed: Utc::now(),
        }
    }
}

/// Latest result for a quiz; resubmission replaces the previous entry, so at
/// most one result exists per quiz id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub quiz_id: ObjectId,
    pub score: u32,
    pub total_questions: u32,
    pub answers: Vec<u32>,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub completed_at: DateTime<Utc>,
}

/// Completion percentage: rounded share of completed lessons.
pub fn completion_percentage(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as i32
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmissionResponse {
    pub score: u32,
    pub total_questions: u32,
    /// Rounded percentage of correct answers.
    pub success_rate: u32,
    pub coins_earned: i64,
    pub passed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonResponse {
    pub message: String,
    pub coins_added: i64,
    pub progress: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareStats {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub completed_courses: usize,
    pub completed_lessons: usize,
    pub rating: i64,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub current: CompareStats,
    pub compare: CompareStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_percentage_rounds() {
        assert_eq!(completion_percentage(0, 3), 0);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 67);
        assert_eq!(completion_percentage(3, 3), 100);
        // A course with no lessons never divides by zero
        assert_eq!(completion_percentage(0, 0), 0);
    }

    #[test]
    fn fresh_progress_is_empty() {
        let progress = Progress::new(ObjectId::new(), ObjectId::new(), None);
        assert_eq!(progress.progress, 0);
        assert!(progress.completed_lessons.is_empty());
        assert!(progress.quiz_results.is_empty());
    }
}
