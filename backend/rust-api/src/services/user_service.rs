use std::collections::HashMap;

use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document, Regex};
use mongodb::Database;

use crate::error::ApiError;
use crate::models::progress::{CompareResponse, CompareStats, Progress};
use crate::models::user::{
    LeaderboardEntry, UpdateProfileRequest, User, UserProfile, UserSummary,
};

pub struct UserService {
    mongo: Database,
}

/// Rating is derived, never stored: the floored average of the user's course
/// progress percentages. A user with no progress rates zero.
pub async fn derived_rating(mongo: &Database, user_id: &ObjectId) -> Result<i64, ApiError> {
    let progress = mongo.collection::<Progress>("progress");
    let mut cursor = progress.find(doc! { "user": user_id }).await?;

    let mut sum: i64 = 0;
    let mut count: i64 = 0;
    while let Some(record) = cursor.try_next().await? {
        sum += record.progress as i64;
        count += 1;
    }

    Ok(sum / count.max(1))
}

/// Batch-load compact user summaries, keyed by id. Handlers use this to
/// attach author/teacher details to responses.
pub async fn load_user_summaries(
    mongo: &Database,
    ids: Vec<ObjectId>,
) -> Result<HashMap<ObjectId, UserSummary>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users = mongo.collection::<User>("users");
    let mut cursor = users.find(doc! { "_id": { "$in": ids } }).await?;

    let mut map = HashMap::new();
    while let Some(user) = cursor.try_next().await? {
        if let Some(id) = user.id {
            map.insert(id, UserSummary::from(user));
        }
    }

    Ok(map)
}

impl UserService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn get_user(&self, user_id: &ObjectId) -> Result<User, ApiError> {
        let users = self.mongo.collection::<User>("users");
        users
            .find_one(doc! { "_id": user_id })
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn get_profile(&self, user_id: &ObjectId) -> Result<UserProfile, ApiError> {
        let user = self.get_user(user_id).await?;
        let rating = derived_rating(&self.mongo, user_id).await?;
        Ok(UserProfile::from_user(user, rating))
    }

    pub async fn update_profile(
        &self,
        user_id: &ObjectId,
        req: UpdateProfileRequest,
        avatar: Option<String>,
    ) -> Result<UserProfile, ApiError> {
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
        if let Some(avatar) = avatar {
            set.insert("avatar", avatar);
        }

        if !set.is_empty() {
            let result = users
                .update_one(doc! { "_id": user_id }, doc! { "$set": set })
                .await?;
            if result.matched_count == 0 {
                return Err(ApiError::not_found("User not found"));
            }
        }

        self.get_profile(user_id).await
    }

    /// Search users by first or last name (case-insensitive), capped at 20.
    pub async fn search_users(&self, search: Option<String>) -> Result<Vec<UserSummary>, ApiError> {
        let users = self.mongo.collection::<User>("users");

        let filter = match search {
            Some(search) if !search.is_empty() => {
                let regex = Regex {
                    pattern: search,
                    options: "i".to_string(),
                };
                doc! { "$or": [ { "firstName": &regex }, { "lastName": &regex } ] }
            }
            _ => doc! {},
        };

        let mut cursor = users.find(filter).limit(20).await?;
        let mut result = Vec::new();
        while let Some(user) = cursor.try_next().await? {
            result.push(UserSummary::from(user));
        }

        Ok(result)
    }

    pub async fn add_friend(
        &self,
        user_id: &ObjectId,
        friend_id: &ObjectId,
    ) -> Result<(), ApiError> {
        if user_id == friend_id {
            return Err(ApiError::validation("Cannot add yourself as a friend"));
        }

        let users = self.mongo.collection::<User>("users");

        let user = self.get_user(user_id).await?;
        let friend = users
            .find_one(doc! { "_id": friend_id })
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if user.friends.contains(friend_id) {
            return Err(ApiError::conflict("Already friends"));
        }

        // $addToSet keeps both sides idempotent under concurrent requests
        users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$addToSet": { "friends": friend_id } },
            )
            .await?;
        users
            .update_one(
                doc! { "_id": friend.id },
                doc! { "$addToSet": { "friends": user_id } },
            )
            .await?;

        Ok(())
    }

    pub async fn remove_friend(
        &self,
        user_id: &ObjectId,
        friend_id: &ObjectId,
    ) -> Result<(), ApiError> {
        let users = self.mongo.collection::<User>("users");

        users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$pull": { "friends": friend_id } },
            )
            .await?;
        users
            .update_one(
                doc! { "_id": friend_id },
                doc! { "$pull": { "friends": user_id } },
            )
            .await?;

        Ok(())
    }

    pub async fn list_friends(&self, user_id: &ObjectId) -> Result<Vec<UserSummary>, ApiError> {
        let user = self.get_user(user_id).await?;
        if user.friends.is_empty() {
            return Ok(Vec::new());
        }

        let users = self.mongo.collection::<User>("users");
        let mut cursor = users
            .find(doc! { "_id": { "$in": &user.friends } })
            .await?;

        let mut friends = Vec::new();
        while let Some(friend) = cursor.try_next().await? {
            friends.push(UserSummary::from(friend));
        }

        Ok(friends)
    }

    /// Top users by derived rating, computed from the progress collection.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let progress = self.mongo.collection::<Document>("progress");

        let pipeline = vec![
            doc! { "$group": { "_id": "$user", "rating": { "$avg": "$progress" } } },
            doc! { "$sort": { "rating": -1 } },
            doc! { "$limit": 10 },
        ];

        let mut cursor = progress.aggregate(pipeline).await?;
        let mut rows: Vec<(ObjectId, i64)> = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            let Ok(user_id) = row.get_object_id("_id") else {
                continue;
            };
            let rating = row.get_f64("rating").unwrap_or(0.0).floor() as i64;
            rows.push((user_id, rating));
        }

        let names = self
            .load_user_names(rows.iter().map(|(id, _)| *id).collect())
            .await?;

        let leaderboard = rows
            .into_iter()
            .enumerate()
            .map(|(idx, (user_id, rating))| {
                let name = names
                    .get(&user_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string());
                LeaderboardEntry {
                    name,
                    rating,
                    rank: idx + 1,
                }
            })
            .collect();

        Ok(leaderboard)
    }

    async fn load_user_names(
        &self,
        ids: Vec<ObjectId>,
    ) -> Result<HashMap<ObjectId, String>, ApiError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = self.mongo.collection::<User>("users");
        let mut cursor = users.find(doc! { "_id": { "$in": ids } }).await?;

        let mut names = HashMap::new();
        while let Some(user) = cursor.try_next().await? {
            if let Some(id) = user.id {
                let name = format!(
                    "{} {}",
                    user.first_name.unwrap_or_default(),
                    user.last_name.unwrap_or_default()
                )
                .trim()
                .to_string();
                names.insert(id, if name.is_empty() { user.username } else { name });
            }
        }

        Ok(names)
    }

    /// Head-to-head learning stats for two users.
    pub async fn compare(
        &self,
        user_id: &ObjectId,
        compare_id: &ObjectId,
    ) -> Result<CompareResponse, ApiError> {
        let current = self.compare_stats(user_id).await?;
        let compare = self.compare_stats(compare_id).await?;
        Ok(CompareResponse { current, compare })
    }

    async fn compare_stats(&self, user_id: &ObjectId) -> Result<CompareStats, ApiError> {
        let user = self.get_user(user_id).await?;

        let progress = self.mongo.collection::<Progress>("progress");
        let mut cursor = progress.find(doc! { "user": user_id }).await?;

        let mut completed_courses = 0;
        let mut completed_lessons = 0;
        let mut sum: i64 = 0;
        let mut count: i64 = 0;
        while let Some(record) = cursor.try_next().await? {
            if record.progress == 100 {
                completed_courses += 1;
            }
            completed_lessons += record.completed_lessons.len();
            sum += record.progress as i64;
            count += 1;
        }

        Ok(CompareStats {
            first_name: user.first_name,
            last_name: user.last_name,
            completed_courses,
            completed_lessons,
            rating: sum / count.max(1),
        })
    }

    /// Batch-derive ratings for a page of users (admin listings).
    pub async fn ratings_for(
        &self,
        ids: &[ObjectId],
    ) -> Result<HashMap<ObjectId, i64>, ApiError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let progress = self.mongo.collection::<Document>("progress");
        let pipeline = vec![
            doc! { "$match": { "user": { "$in": ids.to_vec() } } },
            doc! { "$group": { "_id": "$user", "rating": { "$avg": "$progress" } } },
        ];

        let mut cursor = progress.aggregate(pipeline).await?;
        let mut ratings = HashMap::new();
        while let Some(row) = cursor.try_next().await? {
            if let Ok(user_id) = row.get_object_id("_id") {
                ratings.insert(user_id, row.get_f64("rating").unwrap_or(0.0).floor() as i64);
            }
        }

        Ok(ratings)
    }
}
