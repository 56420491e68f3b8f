use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use mongodb::Database;

use crate::error::ApiError;
use crate::models::course::{
    Comment, Course, CreateCourseRequest, Lesson, Quiz, Question, Reply,
};
use crate::models::user::User;

pub struct CourseService {
    mongo: Database,
}

impl CourseService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Public catalogue: active, approved courses only.
    pub async fn list_public(&self) -> Result<Vec<Course>, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        let mut cursor = courses
            .find(doc! { "isActive": true, "isApproved": true })
            .sort(doc! { "createdAt": -1 })
            .await?;

        let mut result = Vec::new();
        while let Some(course) = cursor.try_next().await? {
            result.push(course);
        }
        Ok(result)
    }

    pub async fn get(&self, course_id: &ObjectId) -> Result<Course, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        courses
            .find_one(doc! { "_id": course_id })
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))
    }

    /// Create a course. Authoring requires the teacher (or admin) flag; new
    /// courses always await admin approval.
    pub async fn create_course(
        &self,
        author: &User,
        req: CreateCourseRequest,
    ) -> Result<Course, ApiError> {
        if !(author.is_teacher || author.is_admin) {
            return Err(ApiError::forbidden("Teacher role required"));
        }

        let teacher_id = author
            .id
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("User record without id")))?;

        // Child entities get their ids here so they are addressable later.
        let lessons: Vec<Lesson> = req
            .lessons
            .into_iter()
            .enumerate()
            .map(|(index, lesson)| Lesson {
                id: ObjectId::new(),
                title: lesson.title,
                video_url: lesson.video_url,
                content: lesson.content,
                materials: lesson.materials,
                duration: lesson.duration,
                order: index as u32,
            })
            .collect();

        let mut quizzes = Vec::new();
        for quiz in req.quizzes {
            let lesson = lessons.get(quiz.lesson).ok_or_else(|| {
                ApiError::validation(format!("Quiz references unknown lesson index {}", quiz.lesson))
            })?;
            for question in &quiz.questions {
                if (question.correct_answer as usize) >= question.options.len() {
                    return Err(ApiError::validation(
                        "Question correct answer is out of range",
                    ));
                }
            }
            quizzes.push(Quiz {
                id: ObjectId::new(),
                lesson_id: lesson.id,
                questions: quiz
                    .questions
                    .into_iter()
                    .map(|q| Question {
                        question: q.question,
                        options: q.options,
                        correct_answer: q.correct_answer,
                    })
                    .collect(),
            });
        }

        let mut course = Course {
            id: None,
            title: req.title,
            description: req.description,
            level: req.level,
            category: req.category,
            price: req.price,
            image: req.image,
            teacher: teacher_id,
            lessons,
            quizzes,
            students: Vec::new(),
            likes: Vec::new(),
            comments: Vec::new(),
            is_active: true,
            is_approved: false,
            created_at: Utc::now(),
        };

        let courses = self.mongo.collection::<Course>("courses");
        let insert_result = courses.insert_one(&course).await?;
        course.id = insert_result.inserted_id.as_object_id();

        Ok(course)
    }

    pub async fn teacher_courses(&self, teacher_id: &ObjectId) -> Result<Vec<Course>, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        let mut cursor = courses
            .find(doc! { "teacher": teacher_id })
            .sort(doc! { "createdAt": -1 })
            .await?;

        let mut result = Vec::new();
        while let Some(course) = cursor.try_next().await? {
            result.push(course);
        }
        Ok(result)
    }

    /// Toggle the caller's like on a course; returns the updated course.
    pub async fn toggle_like(
        &self,
        course_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Course, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        let course = self.get(course_id).await?;

        let update = if course.likes.contains(user_id) {
            doc! { "$pull": { "likes": user_id } }
        } else {
            doc! { "$addToSet": { "likes": user_id } }
        };

        courses.update_one(doc! { "_id": course_id }, update).await?;
        self.get(course_id).await
    }

    /// Append a comment, or a reply when `reply_to` names an existing comment.
    pub async fn add_comment(
        &self,
        course_id: &ObjectId,
        user_id: &ObjectId,
        text: &str,
        reply_to: Option<ObjectId>,
    ) -> Result<Course, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::validation("Comment must not be empty"));
        }

        let courses = self.mongo.collection::<Course>("courses");
        // Existence check up front so a missing course and a missing comment
        // are reported distinctly.
        let _ = self.get(course_id).await?;

        match reply_to {
            Some(comment_id) => {
                let reply = Reply {
                    id: ObjectId::new(),
                    text: text.to_string(),
                    user: *user_id,
                    created_at: Utc::now(),
                    likes: Vec::new(),
                };
                let result = courses
                    .update_one(
                        doc! { "_id": course_id, "comments._id": comment_id },
                        doc! { "$push": { "comments.$.replies": to_bson(&reply)
                            .map_err(|e| ApiError::Internal(e.into()))? } },
                    )
                    .await?;
                if result.matched_count == 0 {
                    return Err(ApiError::not_found("Comment not found"));
                }
            }
            None => {
                let comment = Comment {
                    id: ObjectId::new(),
                    text: text.to_string(),
                    user: *user_id,
                    created_at: Utc::now(),
                    likes: Vec::new(),
                    replies: Vec::new(),
                };
                courses
                    .update_one(
                        doc! { "_id": course_id },
                        doc! { "$push": { "comments": to_bson(&comment)
                            .map_err(|e| ApiError::Internal(e.into()))? } },
                    )
                    .await?;
            }
        }

        self.get(course_id).await
    }

    /// Toggle the caller's like on a single comment.
    pub async fn toggle_comment_like(
        &self,
        course_id: &ObjectId,
        comment_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Course, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        let course = self.get(course_id).await?;

        let comment = course
            .comments
            .iter()
            .find(|c| &c.id == comment_id)
            .ok_or_else(|| ApiError::not_found("Comment not found"))?;

        let update = if comment.likes.contains(user_id) {
            doc! { "$pull": { "comments.$.likes": user_id } }
        } else {
            doc! { "$addToSet": { "comments.$.likes": user_id } }
        };

        courses
            .update_one(doc! { "_id": course_id, "comments._id": comment_id }, update)
            .await?;

        self.get(course_id).await
    }
}
