use chrono::{Duration, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document, Regex};
use mongodb::Database;
use serde::Serialize;

use crate::error::ApiError;
use crate::models::course::{AdminUpdateCourseRequest, Course};
use crate::models::payment::{Payment, PaymentType};
use crate::models::progress::Progress;
use crate::models::user::{AdminUpdateUserRequest, User};
use crate::utils::time::{chrono_to_bson, start_of_month, start_of_week};

pub struct AdminService {
    mongo: Database,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    pub total_teachers: u64,
    pub total_courses: u64,
    pub total_premium_users: u64,
    pub monthly_revenue: i64,
    pub weekly_revenue: i64,
    pub courses_stats: Vec<LevelStats>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStats {
    pub level: String,
    pub count: i64,
    pub avg_students: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRow {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub avatar: Option<String>,
    pub english_level: String,
    pub progress: i32,
    pub completed_lessons: usize,
    pub last_accessed: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsPage {
    pub participants: Vec<ParticipantRow>,
    pub total: u64,
    pub course_title: String,
    pub total_lessons: usize,
}

pub fn total_pages(total: u64, limit: u32) -> u64 {
    let limit = limit.max(1) as u64;
    total.div_ceil(limit)
}

impl AdminService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn stats(&self) -> Result<AdminStats, ApiError> {
        let users = self.mongo.collection::<User>("users");
        let courses = self.mongo.collection::<Course>("courses");

        let total_users = users.count_documents(doc! {}).await?;
        let total_teachers = users.count_documents(doc! { "isTeacher": true }).await?;
        let total_premium_users = users.count_documents(doc! { "isPremium": true }).await?;
        let total_courses = courses.count_documents(doc! {}).await?;

        let now = Utc::now();
        let monthly_revenue = self.completed_revenue_since(start_of_month(now)).await?;
        let weekly_revenue = self.completed_revenue_since(start_of_week(now)).await?;

        let courses_stats = self.courses_by_level().await?;

        Ok(AdminStats {
            total_users,
            total_teachers,
            total_courses,
            total_premium_users,
            monthly_revenue,
            weekly_revenue,
            courses_stats,
        })
    }

    async fn completed_revenue_since(
        &self,
        since: chrono::DateTime<Utc>,
    ) -> Result<i64, ApiError> {
        let payments = self.mongo.collection::<Document>("payments");
        let pipeline = vec![
            doc! { "$match": {
                "createdAt": { "$gte": chrono_to_bson(since) },
                "status": "completed",
            } },
            doc! { "$group": { "_id": null, "total": { "$sum": "$amount" } } },
        ];

        let mut cursor = payments.aggregate(pipeline).await?;
        if let Some(row) = cursor.try_next().await? {
            return Ok(numeric(&row, "total"));
        }
        Ok(0)
    }

    async fn courses_by_level(&self) -> Result<Vec<LevelStats>, ApiError> {
        let courses = self.mongo.collection::<Document>("courses");
        let pipeline = vec![doc! { "$group": {
            "_id": "$level",
            "count": { "$sum": 1 },
            "avgStudents": { "$avg": { "$size": { "$ifNull": ["$students", []] } } },
        } }];

        let mut cursor = courses.aggregate(pipeline).await?;
        let mut stats = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            stats.push(LevelStats {
                level: row.get_str("_id").unwrap_or("unknown").to_string(),
                count: numeric(&row, "count"),
                avg_students: row.get_f64("avgStudents").unwrap_or(0.0),
            });
        }
        Ok(stats)
    }

    /// Revenue rows grouped by calendar period over a trailing window.
    pub async fn revenue(&self, period: &str) -> Result<Vec<serde_json::Value>, ApiError> {
        let now = Utc::now();
        let (group_format, date_filter) = match period {
            "daily" => (
                doc! {
                    "year": { "$year": "$createdAt" },
                    "month": { "$month": "$createdAt" },
                    "day": { "$dayOfMonth": "$createdAt" },
                },
                Some(now - Duration::days(30)),
            ),
            "weekly" => (
                doc! {
                    "year": { "$year": "$createdAt" },
                    "week": { "$week": "$createdAt" },
                },
                Some(now - Duration::days(365)),
            ),
            "yearly" => (doc! { "year": { "$year": "$createdAt" } }, None),
            // "monthly" and anything unrecognized
            _ => (
                doc! {
                    "year": { "$year": "$createdAt" },
                    "month": { "$month": "$createdAt" },
                },
                Some(now - Duration::days(365)),
            ),
        };

        let mut match_stage = doc! { "status": "completed" };
        if let Some(since) = date_filter {
            match_stage.insert("createdAt", doc! { "$gte": chrono_to_bson(since) });
        }

        let pipeline = vec![
            doc! { "$match": match_stage },
            doc! { "$group": {
                "_id": group_format,
                "totalRevenue": { "$sum": "$amount" },
                "transactionCount": { "$sum": 1 },
                "coursePurchases": {
                    "$sum": { "$cond": [ { "$eq": ["$type", "course_purchase"] }, 1, 0 ] }
                },
                "premiumSubscriptions": {
                    "$sum": { "$cond": [ { "$eq": ["$type", "premium_subscription"] }, 1, 0 ] }
                },
            } },
            doc! { "$sort": { "_id.year": 1, "_id.month": 1, "_id.week": 1, "_id.day": 1 } },
        ];

        let payments = self.mongo.collection::<Document>("payments");
        let mut cursor = payments.aggregate(pipeline).await?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            rows.push(Bson::Document(row).into_relaxed_extjson());
        }
        Ok(rows)
    }

    pub async fn list_users(
        &self,
        page: u32,
        limit: u32,
        search: Option<String>,
    ) -> Result<(Vec<User>, u64), ApiError> {
        let users = self.mongo.collection::<User>("users");

        let filter = match search {
            Some(search) if !search.is_empty() => {
                let regex = Regex {
                    pattern: search,
                    options: "i".to_string(),
                };
                doc! { "$or": [
                    { "firstName": &regex },
                    { "lastName": &regex },
                    { "email": &regex },
                    { "username": &regex },
                ] }
            }
            _ => doc! {},
        };

        let total = users.count_documents(filter.clone()).await?;
        let skip = (page.saturating_sub(1) as u64) * limit as u64;

        let mut cursor = users
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit as i64)
            .await?;

        let mut result = Vec::new();
        while let Some(user) = cursor.try_next().await? {
            result.push(user);
        }

        Ok((result, total))
    }

    pub async fn get_user(&self, user_id: &ObjectId) -> Result<User, ApiError> {
        let users = self.mongo.collection::<User>("users");
        users
            .find_one(doc! { "_id": user_id })
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Direct field overwrites, admin-only.
    pub async fn update_user(
        &self,
        user_id: &ObjectId,
        req: AdminUpdateUserRequest,
    ) -> Result<User, ApiError> {
        let users = self.mongo.collection::<User>("users");

        let mut set = Document::new();
        if let Some(first_name) = req.first_name {
            set.insert("firstName", first_name);
        }
        if let Some(last_name) = req.last_name {
            set.insert("lastName", last_name);
        }
        if let Some(level) = req.english_level {
            set.insert("englishLevel", level);
        }
        if let Some(age) = req.age {
            set.insert("age", age as i64);
        }
        if let Some(bio) = req.bio {
            set.insert("bio", bio);
        }
        if let Some(coins) = req.coins {
            set.insert("coins", coins);
        }
        if let Some(is_premium) = req.is_premium {
            set.insert("isPremium", is_premium);
        }
        if let Some(is_teacher) = req.is_teacher {
            set.insert("isTeacher", is_teacher);
        }
        if let Some(is_admin) = req.is_admin {
            set.insert("isAdmin", is_admin);
        }
        if let Some(is_active) = req.is_active {
            set.insert("isActive", is_active);
        }

        if set.is_empty() {
            return Err(ApiError::validation("No fields to update"));
        }

        let result = users
            .update_one(doc! { "_id": user_id }, doc! { "$set": set })
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::not_found("User not found"));
        }

        self.get_user(user_id).await
    }

    /// Delete a user. Fails while the user still owns courses; otherwise
    /// cascades progress, payments and refresh tokens and scrubs the user
    /// from friends/students/likes sets.
    pub async fn delete_user(&self, user_id: &ObjectId) -> Result<(), ApiError> {
        let users = self.mongo.collection::<User>("users");
        let courses = self.mongo.collection::<Course>("courses");

        let owned_courses = courses.count_documents(doc! { "teacher": user_id }).await?;
        if owned_courses > 0 {
            return Err(ApiError::conflict(
                "User still owns courses. Delete the courses first.",
            ));
        }

        let result = users.delete_one(doc! { "_id": user_id }).await?;
        if result.deleted_count == 0 {
            return Err(ApiError::not_found("User not found"));
        }

        self.mongo
            .collection::<Document>("progress")
            .delete_many(doc! { "user": user_id })
            .await?;
        self.mongo
            .collection::<Document>("payments")
            .delete_many(doc! { "user": user_id })
            .await?;
        self.mongo
            .collection::<Document>("refresh_tokens")
            .delete_many(doc! { "userId": user_id })
            .await?;

        // Scrub dangling references
        users
            .update_many(doc! {}, doc! { "$pull": { "friends": user_id } })
            .await?;
        courses
            .update_many(
                doc! {},
                doc! { "$pull": { "students": user_id, "likes": user_id } },
            )
            .await?;

        Ok(())
    }

    pub async fn list_courses(
        &self,
        page: u32,
        limit: u32,
        search: Option<String>,
        status: Option<String>,
    ) -> Result<(Vec<Course>, u64), ApiError> {
        let courses = self.mongo.collection::<Course>("courses");

        let mut filter = match search {
            Some(search) if !search.is_empty() => {
                let regex = Regex {
                    pattern: search,
                    options: "i".to_string(),
                };
                doc! { "$or": [ { "title": &regex }, { "description": &regex } ] }
            }
            _ => doc! {},
        };

        match status.as_deref() {
            Some("approved") => {
                filter.insert("isApproved", true);
            }
            Some("pending") => {
                filter.insert("isApproved", false);
            }
            Some("active") => {
                filter.insert("isActive", true);
            }
            Some("inactive") => {
                filter.insert("isActive", false);
            }
            _ => {}
        }

        let total = courses.count_documents(filter.clone()).await?;
        let skip = (page.saturating_sub(1) as u64) * limit as u64;

        let mut cursor = courses
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit as i64)
            .await?;

        let mut result = Vec::new();
        while let Some(course) = cursor.try_next().await? {
            result.push(course);
        }

        Ok((result, total))
    }

    pub async fn get_course(&self, course_id: &ObjectId) -> Result<Course, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        courses
            .find_one(doc! { "_id": course_id })
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))
    }

    pub async fn update_course(
        &self,
        course_id: &ObjectId,
        req: AdminUpdateCourseRequest,
    ) -> Result<Course, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");

        let mut set = Document::new();
        if let Some(title) = req.title {
            set.insert("title", title);
        }
        if let Some(description) = req.description {
            set.insert("description", description);
        }
        if let Some(level) = req.level {
            set.insert("level", level);
        }
        if let Some(category) = req.category {
            set.insert("category", category);
        }
        if let Some(price) = req.price {
            set.insert("price", price);
        }
        if let Some(is_active) = req.is_active {
            set.insert("isActive", is_active);
        }
        if let Some(is_approved) = req.is_approved {
            set.insert("isApproved", is_approved);
        }

        if set.is_empty() {
            return Err(ApiError::validation("No fields to update"));
        }

        let result = courses
            .update_one(doc! { "_id": course_id }, doc! { "$set": set })
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::not_found("Course not found"));
        }

        self.get_course(course_id).await
    }

    /// Delete a course and its dependent progress and payment records.
    pub async fn delete_course(&self, course_id: &ObjectId) -> Result<(), ApiError> {
        let courses = self.mongo.collection::<Course>("courses");

        let result = courses.delete_one(doc! { "_id": course_id }).await?;
        if result.deleted_count == 0 {
            return Err(ApiError::not_found("Course not found"));
        }

        self.mongo
            .collection::<Document>("progress")
            .delete_many(doc! { "course": course_id })
            .await?;
        self.mongo
            .collection::<Document>("payments")
            .delete_many(doc! { "course": course_id })
            .await?;

        Ok(())
    }

    pub async fn approve_course(
        &self,
        course_id: &ObjectId,
        approved: bool,
    ) -> Result<Course, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");

        let result = courses
            .update_one(
                doc! { "_id": course_id },
                doc! { "$set": { "isApproved": approved } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::not_found("Course not found"));
        }

        self.get_course(course_id).await
    }

    pub async fn list_payments(
        &self,
        page: u32,
        limit: u32,
        kind: Option<String>,
    ) -> Result<(Vec<Payment>, u64), ApiError> {
        let mut filter = doc! {};
        if let Some(kind) = kind {
            filter.insert("type", kind);
        }
        self.paged_payments(filter, page, limit).await
    }

    pub async fn list_premium_subscriptions(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Payment>, u64), ApiError> {
        self.paged_payments(
            doc! { "type": PaymentType::PremiumSubscription.as_str() },
            page,
            limit,
        )
        .await
    }

    async fn paged_payments(
        &self,
        filter: Document,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Payment>, u64), ApiError> {
        let payments = self.mongo.collection::<Payment>("payments");

        let total = payments.count_documents(filter.clone()).await?;
        let skip = (page.saturating_sub(1) as u64) * limit as u64;

        let mut cursor = payments
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit as i64)
            .await?;

        let mut result = Vec::new();
        while let Some(payment) = cursor.try_next().await? {
            result.push(payment);
        }

        Ok((result, total))
    }

    /// Paginated course roster merged with each student's progress.
    pub async fn participants(
        &self,
        course_id: &ObjectId,
        page: u32,
        limit: u32,
    ) -> Result<ParticipantsPage, ApiError> {
        let course = self.get_course(course_id).await?;

        let total = course.students.len() as u64;
        let skip = (page.saturating_sub(1) as usize) * limit as usize;
        let page_ids: Vec<ObjectId> = course
            .students
            .iter()
            .skip(skip)
            .take(limit as usize)
            .cloned()
            .collect();

        let mut participants = Vec::new();
        if !page_ids.is_empty() {
            let users = self.mongo.collection::<User>("users");
            let mut cursor = users.find(doc! { "_id": { "$in": &page_ids } }).await?;

            let mut students = Vec::new();
            while let Some(user) = cursor.try_next().await? {
                students.push(user);
            }

            let progress_coll = self.mongo.collection::<Progress>("progress");
            let mut progress_cursor = progress_coll
                .find(doc! { "course": course_id, "user": { "$in": &page_ids } })
                .await?;

            let mut progress_by_user = std::collections::HashMap::new();
            while let Some(record) = progress_cursor.try_next().await? {
                progress_by_user.insert(record.user, record);
            }

            for student in students {
                let Some(student_id) = student.id else {
                    continue;
                };
                let progress = progress_by_user.get(&student_id);
                participants.push(ParticipantRow {
                    id: student_id.to_hex(),
                    first_name: student.first_name,
                    last_name: student.last_name,
                    email: student.email,
                    avatar: student.avatar,
                    english_level: student.english_level,
                    progress: progress.map(|p| p.progress).unwrap_or(0),
                    completed_lessons: progress
                        .map(|p| p.completed_lessons.len())
                        .unwrap_or(0),
                    last_accessed: progress.map(|p| p.last_accessed),
                });
            }
        }

        Ok(ParticipantsPage {
            participants,
            total,
            course_title: course.title,
            total_lessons: course.lessons.len(),
        })
    }
}

/// Aggregation sums come back as i32, i64 or f64 depending on the stored
/// values; normalize to i64.
fn numeric(doc: &Document, key: &str) -> i64 {
    match doc.get(key) {
        Some(Bson::Int32(v)) => *v as i64,
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        // A zero limit must not panic
        assert_eq!(total_pages(5, 0), 5);
    }

    #[test]
    fn numeric_handles_all_bson_number_types() {
        let doc = doc! { "a": 5_i32, "b": 7_i64, "c": 9.5_f64 };
        assert_eq!(numeric(&doc, "a"), 5);
        assert_eq!(numeric(&doc, "b"), 7);
        assert_eq!(numeric(&doc, "c"), 9);
        assert_eq!(numeric(&doc, "missing"), 0);
    }
}
