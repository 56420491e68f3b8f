use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Immutable record of a coin-debit event. Written alongside the economy
/// mutation in the same transaction; never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<ObjectId>,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: PaymentType,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn course_purchase(user: ObjectId, course: ObjectId, amount: i64) -> Self {
        Payment {
            id: None,
            user,
            course: Some(course),
            amount,
            kind: PaymentType::CoursePurchase,
            status: PaymentStatus::Completed,
            created_at: Utc::now(),
        }
    }

    pub fn premium_subscription(user: ObjectId, amount: i64) -> Self {
        Payment {
            id: None,
            user,
            course: None,
            amount,
            kind: PaymentType::PremiumSubscription,
            status: PaymentStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    CoursePurchase,
    PremiumSubscription,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::CoursePurchase => "course_purchase",
            PaymentType::PremiumSubscription => "premium_subscription",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_type_serializes_snake_case() {
        let payment = Payment::course_purchase(ObjectId::new(), ObjectId::new(), 500);
        let doc = mongodb::bson::to_document(&payment).unwrap();
        assert_eq!(doc.get_str("type").unwrap(), "course_purchase");
        assert_eq!(doc.get_str("status").unwrap(), "completed");
    }

    #[test]
    fn premium_payment_has_no_course() {
        let payment = Payment::premium_subscription(ObjectId::new(), 1200);
        assert!(payment.course.is_none());
        assert_eq!(payment.amount, 1200);
    }
}
