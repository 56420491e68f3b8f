use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::{Client, Database};

use crate::error::ApiError;
use crate::metrics::COIN_TRANSFERS_TOTAL;
use crate::models::message::Message;
use crate::models::user::User;
use crate::services::economy_service::{is_transient_txn_error, transfer_in_session};
use crate::utils::retry::{retry_if, RetryConfig};

pub struct ChatService {
    mongo: Database,
    client: Client,
}

impl ChatService {
    pub fn new(mongo: Database, client: Client) -> Self {
        Self { mongo, client }
    }

    /// Both directions of the conversation, oldest first.
    pub async fn conversation(
        &self,
        user_id: &ObjectId,
        other_id: &ObjectId,
    ) -> Result<Vec<Message>, ApiError> {
        let messages = self.mongo.collection::<Message>("messages");
        let mut cursor = messages
            .find(doc! { "$or": [
                { "from": user_id, "to": other_id },
                { "from": other_id, "to": user_id },
            ] })
            .sort(doc! { "createdAt": 1 })
            .await?;

        let mut result = Vec::new();
        while let Some(message) = cursor.try_next().await? {
            result.push(message);
        }
        Ok(result)
    }

    /// Send a direct message. When coins are attached, the transfer and the
    /// message insert commit in one transaction so a crash cannot strand a
    /// debit without the message (or vice versa).
    pub async fn send(
        &self,
        sender_id: &ObjectId,
        receiver_id: &ObjectId,
        text: &str,
        coins: i64,
    ) -> Result<Message, ApiError> {
        if coins < 0 {
            return Err(ApiError::validation("Coin amount cannot be negative"));
        }
        if sender_id == receiver_id {
            return Err(ApiError::validation("Cannot message yourself"));
        }

        let users = self.mongo.collection::<User>("users");
        let receiver = users.find_one(doc! { "_id": receiver_id }).await?;
        if receiver.is_none() {
            return Err(ApiError::not_found("User not found"));
        }

        let message = Message {
            id: None,
            from: *sender_id,
            to: *receiver_id,
            text: text.to_string(),
            coins,
            created_at: Utc::now(),
        };

        let messages = self.mongo.collection::<Message>("messages");

        if coins == 0 {
            let insert = messages.insert_one(&message).await?;
            let mut message = message;
            message.id = insert.inserted_id.as_object_id();
            return Ok(message);
        }

        let stored = retry_if(RetryConfig::default(), is_transient_txn_error, || {
            self.send_with_coins_txn(&message)
        })
        .await?;

        COIN_TRANSFERS_TOTAL.with_label_values(&["chat"]).inc();
        Ok(stored)
    }

    async fn send_with_coins_txn(&self, message: &Message) -> Result<Message, ApiError> {
        let messages = self.mongo.collection::<Message>("messages");

        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let result = async {
            transfer_in_session(
                &self.mongo,
                &mut session,
                &message.from,
                &message.to,
                message.coins,
            )
            .await?;

            let insert = messages
                .insert_one(message)
                .session(&mut session)
                .await?;

            Ok::<_, ApiError>(insert.inserted_id.as_object_id())
        }
        .await;

        match result {
            Ok(inserted_id) => {
                session.commit_transaction().await?;
                let mut stored = message.clone();
                stored.id = inserted_id;
                Ok(stored)
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }
}
