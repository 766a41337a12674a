use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::status::BookingStatus;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TestDrive {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub vehicle: ObjectId,
    pub user: ObjectId,
    pub test_drive_date: DateTime,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime,
}

impl TestDrive {
    pub fn when(&self) -> String {
        super::reservation::format_date_time(self.test_drive_date)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestDriveDto {
    /// Vehicle id, hex-encoded.
    pub vehicle: String,
    pub test_drive_date: ChronoDateTime<Utc>,
    #[validate(length(max = 500, message = "Message cannot exceed 500 characters"))]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_includes_time_of_day() {
        let drive = TestDrive {
            id: None,
            vehicle: ObjectId::new(),
            user: ObjectId::new(),
            test_drive_date: DateTime::builder()
                .year(2026)
                .month(9)
                .day(1)
                .hour(14)
                .minute(30)
                .build()
                .unwrap(),
            status: BookingStatus::Pending,
            message: None,
            created_at: DateTime::from_millis(0),
        };
        assert_eq!(drive.when(), "2026-09-01 14:30");
    }
}
