use mongodb::bson::{doc, oid::ObjectId};
use mongodb::error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::{Client, ClientSession, Database};

use crate::error::ApiError;
use crate::metrics::{COIN_TRANSFERS_TOTAL, ENROLLMENTS_TOTAL};
use crate::models::course::Course;
use crate::models::payment::Payment;
use crate::models::progress::Progress;
use crate::models::user::User;
use crate::utils::retry::{retry_if, RetryConfig};
use crate::utils::time::chrono_to_bson;

/// One-time premium subscription cost in coins.
pub const PREMIUM_COST: i64 = 1200;

pub struct EconomyService {
    mongo: Database,
    client: Client,
}

pub struct EnrollmentOutcome {
    pub progress: Progress,
    pub already_enrolled: bool,
    pub charged: i64,
}

/// Transient transaction failures are safe to retry wholesale; everything
/// else (insufficient balance, not found, conflicts) is terminal.
pub(crate) fn is_transient_txn_error(err: &ApiError) -> bool {
    match err {
        ApiError::Internal(inner) => inner
            .downcast_ref::<mongodb::error::Error>()
            .map(|e| {
                e.contains_label(TRANSIENT_TRANSACTION_ERROR)
                    || e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
            })
            .unwrap_or(false),
        _ => false,
    }
}

/// Debit `from` and credit `to` inside an open transaction. The debit is a
/// conditional update filtered on `coins >= amount`, so two racing transfers
/// cannot both spend the same balance.
pub(crate) async fn transfer_in_session(
    mongo: &Database,
    session: &mut ClientSession,
    from: &ObjectId,
    to: &ObjectId,
    amount: i64,
) -> Result<(), ApiError> {
    let users = mongo.collection::<User>("users");

    let debit = users
        .update_one(
            doc! { "_id": from, "coins": { "$gte": amount } },
            doc! { "$inc": { "coins": -amount } },
        )
        .session(&mut *session)
        .await?;

    if debit.modified_count == 0 {
        let sender = users
            .find_one(doc! { "_id": from })
            .session(&mut *session)
            .await?;
        return Err(match sender {
            Some(_) => ApiError::validation("Insufficient coins"),
            None => ApiError::not_found("User not found"),
        });
    }

    let credit = users
        .update_one(doc! { "_id": to }, doc! { "$inc": { "coins": amount } })
        .session(&mut *session)
        .await?;

    if credit.matched_count == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(())
}

impl EconomyService {
    pub fn new(mongo: Database, client: Client) -> Self {
        Self { mongo, client }
    }

    /// Enroll a user in a course. Debit, payment record, student-set insert
    /// and progress creation commit as one transaction. Re-enrollment is a
    /// terminal no-charge outcome; insufficient balance aborts everything.
    pub async fn enroll(
        &self,
        course_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<EnrollmentOutcome, ApiError> {
        let outcome = retry_if(RetryConfig::default(), is_transient_txn_error, || {
            self.enroll_txn(course_id, user_id)
        })
        .await?;

        let kind = if outcome.already_enrolled {
            "repeat"
        } else if outcome.charged > 0 {
            "paid"
        } else {
            "free"
        };
        ENROLLMENTS_TOTAL.with_label_values(&[kind]).inc();

        Ok(outcome)
    }

    async fn enroll_txn(
        &self,
        course_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<EnrollmentOutcome, ApiError> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        match self.enroll_steps(&mut session, course_id, user_id).await {
            Ok(outcome) => {
                session.commit_transaction().await?;
                Ok(outcome)
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }

    async fn enroll_steps(
        &self,
        session: &mut ClientSession,
        course_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<EnrollmentOutcome, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        let users = self.mongo.collection::<User>("users");
        let payments = self.mongo.collection::<Payment>("payments");
        let progress_coll = self.mongo.collection::<Progress>("progress");

        let course = courses
            .find_one(doc! { "_id": course_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))?;

        let already_enrolled = course.students.contains(user_id);

        let mut charged = 0;
        if !already_enrolled && course.price > 0 {
            let debit = users
                .update_one(
                    doc! { "_id": user_id, "coins": { "$gte": course.price } },
                    doc! { "$inc": { "coins": -course.price } },
                )
                .session(&mut *session)
                .await?;

            if debit.modified_count == 0 {
                let user = users
                    .find_one(doc! { "_id": user_id })
                    .session(&mut *session)
                    .await?;
                return Err(match user {
                    Some(user) => ApiError::validation(format!(
                        "Insufficient coins: required {}, current {}",
                        course.price, user.coins
                    )),
                    None => ApiError::not_found("User not found"),
                });
            }

            payments
                .insert_one(Payment::course_purchase(*user_id, *course_id, course.price))
                .session(&mut *session)
                .await?;
            charged = course.price;
        }

        courses
            .update_one(
                doc! { "_id": course_id },
                doc! { "$addToSet": { "students": user_id } },
            )
            .session(&mut *session)
            .await?;

        // Create the progress record if absent; the filter supplies the
        // (user, course) key on insert.
        let first_lesson = course.lessons.first().map(|lesson| lesson.id);
        let mut on_insert = doc! {
            "completedLessons": [],
            "quizResults": [],
            "progress": 0,
            "lastAccessed": chrono_to_bson(chrono::Utc::now()),
        };
        if let Some(first_lesson) = first_lesson {
            on_insert.insert("currentLesson", first_lesson);
        }

        progress_coll
            .update_one(
                doc! { "user": user_id, "course": course_id },
                doc! { "$setOnInsert": on_insert },
            )
            .upsert(true)
            .session(&mut *session)
            .await?;

        let progress = progress_coll
            .find_one(doc! { "user": user_id, "course": course_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Progress missing after upsert")))?;

        Ok(EnrollmentOutcome {
            progress,
            already_enrolled,
            charged,
        })
    }

    /// Activate the one-time premium flag for 1200 coins.
    pub async fn subscribe_premium(&self, user_id: &ObjectId) -> Result<User, ApiError> {
        retry_if(RetryConfig::default(), is_transient_txn_error, || {
            self.subscribe_premium_txn(user_id)
        })
        .await
    }

    async fn subscribe_premium_txn(&self, user_id: &ObjectId) -> Result<User, ApiError> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        match self.subscribe_premium_steps(&mut session, user_id).await {
            Ok(user) => {
                session.commit_transaction().await?;
                Ok(user)
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }

    async fn subscribe_premium_steps(
        &self,
        session: &mut ClientSession,
        user_id: &ObjectId,
    ) -> Result<User, ApiError> {
        let users = self.mongo.collection::<User>("users");
        let payments = self.mongo.collection::<Payment>("payments");

        let user = users
            .find_one(doc! { "_id": user_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if user.is_premium {
            return Err(ApiError::conflict("Already a premium subscriber"));
        }

        let debit = users
            .update_one(
                doc! { "_id": user_id, "isPremium": false, "coins": { "$gte": PREMIUM_COST } },
                doc! { "$inc": { "coins": -PREMIUM_COST }, "$set": { "isPremium": true } },
            )
            .session(&mut *session)
            .await?;

        if debit.modified_count == 0 {
            return Err(ApiError::validation(format!(
                "Insufficient coins for premium subscription: required {}, current {}",
                PREMIUM_COST, user.coins
            )));
        }

        payments
            .insert_one(Payment::premium_subscription(*user_id, PREMIUM_COST))
            .session(&mut *session)
            .await?;

        users
            .find_one(doc! { "_id": user_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("User missing after update")))
    }

    /// Peer-to-peer coin transfer; debit and credit commit atomically.
    pub async fn send_coins(
        &self,
        sender_id: &ObjectId,
        receiver_id: &ObjectId,
        amount: i64,
    ) -> Result<(), ApiError> {
        if amount <= 0 {
            return Err(ApiError::validation("Amount must be positive"));
        }
        if sender_id == receiver_id {
            return Err(ApiError::validation("Cannot send coins to yourself"));
        }

        retry_if(RetryConfig::default(), is_transient_txn_error, || {
            self.send_coins_txn(sender_id, receiver_id, amount)
        })
        .await?;

        COIN_TRANSFERS_TOTAL.with_label_values(&["direct"]).inc();
        Ok(())
    }

    async fn send_coins_txn(
        &self,
        sender_id: &ObjectId,
        receiver_id: &ObjectId,
        amount: i64,
    ) -> Result<(), ApiError> {
        let users = self.mongo.collection::<User>("users");

        // Receiver existence is checked up front so a typo'd id fails with
        // 404 before any money moves.
        let receiver = users.find_one(doc! { "_id": receiver_id }).await?;
        if receiver.is_none() {
            return Err(ApiError::not_found("User not found"));
        }

        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        match transfer_in_session(&self.mongo, &mut session, sender_id, receiver_id, amount).await
        {
            Ok(()) => {
                session.commit_transaction().await?;
                Ok(())
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }
}
