use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Course document stored in the MongoDB "courses" collection.
///
/// Lessons, quizzes, comments and replies are embedded child entities; each
/// carries its own ObjectId so it can be addressed within the parent
/// aggregate. Lesson ids are unique within a course by construction (they are
/// generated server-side at insert time).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub teacher: ObjectId,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub students: Vec<ObjectId>,
    #[serde(default)]
    pub likes: Vec<ObjectId>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub materials: Vec<String>,
    /// Duration in minutes.
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub lesson_id: ObjectId,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct_answer: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub text: String,
    pub user: ObjectId,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: Vec<ObjectId>,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub text: String,
    pub user: ObjectId,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: Vec<ObjectId>,
}

/// Course listing entry: metadata without lesson/quiz bodies.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub level: String,
    pub category: String,
    pub price: i64,
    pub image: Option<String>,
    pub teacher: TeacherSummary,
    pub lessons_count: usize,
    pub students_count: usize,
    pub likes_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSummary {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
}

/// Lesson payload accepted at course creation (ids are assigned server-side).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewLesson {
    #[validate(length(min = 1, message = "Lesson title must not be empty"))]
    pub title: String,
    pub video_url: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub duration: u32,
}

/// Quiz payload accepted at course creation. `lesson` is the zero-based index
/// of the lesson the quiz belongs to.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewQuiz {
    pub lesson: usize,
    #[validate(length(min = 1, message = "Quiz must contain at least one question"))]
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    #[validate(length(min = 1, message = "Question text must not be empty"))]
    pub question: String,
    #[validate(length(min = 2, message = "Question needs at least two options"))]
    pub options: Vec<String>,
    pub correct_answer: u32,
}

/// Metadata fields of the multipart course-creation form. Lessons and quizzes
/// arrive as JSON-encoded form fields, the image as a file part.
#[derive(Debug, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200, message = "Title must not be empty"))]
    pub title: String,
    pub description: String,
    pub level: String,
    pub category: String,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: i64,
    pub lessons: Vec<NewLesson>,
    pub quizzes: Vec<NewQuiz>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddCommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must not be empty"))]
    pub text: String,
    /// When set, the text becomes a reply to this comment id.
    #[serde(rename = "replyTo")]
    pub reply_to: Option<String>,
}

/// Admin-side course edits.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<String>,
    pub category: Option<String>,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: Option<i64>,
    pub is_active: Option<bool>,
    pub is_approved: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveCourseRequest {
    pub approved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_roundtrips_through_bson_with_embedded_children() {
        let teacher = ObjectId::new();
        let lesson = Lesson {
            id: ObjectId::new(),
            title: "Greetings".to_string(),
            video_url: None,
            content: "Hello, how are you?".to_string(),
            materials: vec![],
            duration: 30,
            order: 0,
        };
        let course = Course {
            id: Some(ObjectId::new()),
            title: "Beginner English".to_string(),
            description: String::new(),
            level: "beginner".to_string(),
            category: "General English".to_string(),
            price: 0,
            image: None,
            teacher,
            lessons: vec![lesson],
            quizzes: vec![Quiz {
                id: ObjectId::new(),
                lesson_id: ObjectId::new(),
                questions: vec![Question {
                    question: "Choose correct: I ___ happy.".to_string(),
                    options: vec!["am".to_string(), "is".to_string(), "are".to_string()],
                    correct_answer: 0,
                }],
            }],
            students: vec![],
            likes: vec![],
            comments: vec![],
            is_active: true,
            is_approved: false,
            created_at: Utc::now(),
        };

        let doc = mongodb::bson::to_document(&course).unwrap();
        let parsed: Course = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(parsed.lessons.len(), 1);
        assert_eq!(parsed.quizzes[0].questions[0].correct_answer, 0);
        assert!(!parsed.is_approved);
    }

    #[test]
    fn minimal_course_document_gets_defaults() {
        let doc = mongodb::bson::doc! {
            "title": "Bare",
            "teacher": ObjectId::new(),
            "createdAt": mongodb::bson::DateTime::now(),
        };
        let course: Course = mongodb::bson::from_document(doc).unwrap();
        assert!(course.is_active);
        assert!(!course.is_approved);
        assert_eq!(course.price, 0);
        assert!(course.students.is_empty());
    }
}
