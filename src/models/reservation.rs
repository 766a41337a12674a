use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::status::BookingStatus;

/// A rental booking. Never physically deleted; its lifecycle is the status
/// field only.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub vehicle: ObjectId,
    pub user: ObjectId,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime,
}

impl Reservation {
    /// Date range in the form used by notification emails.
    pub fn period(&self) -> String {
        format!(
            "from {} to {}",
            format_date(self.start_date),
            format_date(self.end_date)
        )
    }
}

pub fn format_date(date: DateTime) -> String {
    date.to_chrono().format("%Y-%m-%d").to_string()
}

pub fn format_date_time(date: DateTime) -> String {
    date.to_chrono().format("%Y-%m-%d %H:%M").to_string()
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationDto {
    /// Vehicle id, hex-encoded.
    pub vehicle: String,
    pub start_date: ChronoDateTime<Utc>,
    pub end_date: ChronoDateTime<Utc>,
    #[validate(length(max = 500, message = "Message cannot exceed 500 characters"))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusDto {
    pub status: BookingStatus,
}

/// `?user=` lets an admin scope the listing to one account. Plain users are
/// always scoped to themselves regardless of this parameter.
#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub user: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_renders_both_dates() {
        let reservation = Reservation {
            id: None,
            vehicle: ObjectId::new(),
            user: ObjectId::new(),
            start_date: DateTime::builder().year(2026).month(9).day(1).build().unwrap(),
            end_date: DateTime::builder().year(2026).month(9).day(4).build().unwrap(),
            status: BookingStatus::Pending,
            total_price: None,
            message: None,
            created_at: DateTime::from_millis(0),
        };
        assert_eq!(reservation.period(), "from 2026-09-01 to 2026-09-04");
    }

    #[test]
    fn message_over_500_chars_fails_validation() {
        let dto = CreateReservationDto {
            vehicle: ObjectId::new().to_hex(),
            start_date: Utc::now(),
            end_date: Utc::now(),
            message: Some("x".repeat(501)),
        };
        assert!(dto.validate().is_err());
    }
}
