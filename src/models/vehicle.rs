use std::collections::HashMap;

use chrono::{Datelike, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::ApiError;

/// Shown when a listing is created without any image.
pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/600x400?text=No+image";

/// Listing discriminant: for sale or for rent. Drives which fields are
/// required (see `Vehicle::from_payload`).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Buy,
    Rent,
}

impl VehicleType {
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleType::Buy => "buy",
            VehicleType::Rent => "rent",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Fuel {
    Petrol,
    Diesel,
    Electric,
    Hybrid,
    Other,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub brand: String,
    pub model: String,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage: Option<i64>,
    pub fuel: Fuel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passengers: Option<i32>,
    pub description: String,
    pub images: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<HashMap<String, String>>,
    /// The admin account that created the listing.
    pub user: ObjectId,
    pub created_at: DateTime,
}

impl Vehicle {
    /// Human-readable identity used in notification emails.
    pub fn label(&self) -> String {
        format!("{} ({} {} {})", self.name, self.brand, self.model, self.year)
    }

    /// Builds a persistable document from an API payload, enforcing the
    /// conditional requirements at the store boundary: mileage/price for
    /// `buy`, dailyRate/passengers for `rent`.
    pub fn from_payload(payload: VehiclePayload, owner: ObjectId) -> Result<Vehicle, ApiError> {
        payload.validate().map_err(ApiError::from)?;

        let current_year = Utc::now().year();
        if payload.year < 1900 || payload.year > current_year + 2 {
            return Err(ApiError::Validation("Year must be valid".to_string()));
        }

        match payload.vehicle_type {
            VehicleType::Buy => {
                if payload.mileage.is_none() || payload.price.is_none() {
                    return Err(ApiError::Validation(
                        "Mileage and price are required for vehicles for sale".to_string(),
                    ));
                }
            }
            VehicleType::Rent => {
                if payload.daily_rate.is_none() || payload.passengers.is_none() {
                    return Err(ApiError::Validation(
                        "Daily rate and passenger count are required for rental vehicles"
                            .to_string(),
                    ));
                }
            }
        }
        if payload.mileage.is_some_and(|m| m < 0) {
            return Err(ApiError::Validation("Mileage cannot be negative".to_string()));
        }
        if payload.price.is_some_and(|p| p < 0.0) {
            return Err(ApiError::Validation("Price cannot be negative".to_string()));
        }
        if payload.daily_rate.is_some_and(|r| r < 0.0) {
            return Err(ApiError::Validation(
                "Daily rate cannot be negative".to_string(),
            ));
        }
        if payload.passengers.is_some_and(|p| p < 1) {
            return Err(ApiError::Validation(
                "A rental vehicle must seat at least one passenger".to_string(),
            ));
        }

        let images = match payload.images {
            Some(images) if !images.is_empty() => {
                let valid = images
                    .iter()
                    .all(|url| url.starts_with("http") || url.starts_with("data:image"));
                if !valid {
                    return Err(ApiError::Validation(
                        "Images must be URLs or inline image data".to_string(),
                    ));
                }
                images
            }
            _ => vec![PLACEHOLDER_IMAGE.to_string()],
        };

        Ok(Vehicle {
            id: None,
            name: payload.name,
            vehicle_type: payload.vehicle_type,
            brand: payload.brand,
            model: payload.model,
            year: payload.year,
            mileage: payload.mileage,
            fuel: payload.fuel,
            price: payload.price,
            daily_rate: payload.daily_rate,
            passengers: payload.passengers,
            description: payload.description,
            images,
            is_featured: payload.is_featured.unwrap_or(false),
            specs: payload.specs,
            user: owner,
            created_at: DateTime::from_millis(Utc::now().timestamp_millis()),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePayload {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    #[validate(length(min = 1, max = 50, message = "Brand must be 1 to 50 characters"))]
    pub brand: String,
    #[validate(length(min = 1, max = 50, message = "Model must be 1 to 50 characters"))]
    pub model: String,
    pub year: i32,
    pub mileage: Option<i64>,
    pub fuel: Fuel,
    pub price: Option<f64>,
    pub daily_rate: Option<f64>,
    pub passengers: Option<i32>,
    #[validate(length(min = 1, max = 1000, message = "Description must be 1 to 1000 characters"))]
    pub description: String,
    pub images: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub specs: Option<HashMap<String, String>>,
}

/// Optional equality filters for the public listing endpoint. Full
/// query-string filtering/pagination is out of scope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleListQuery {
    #[serde(rename = "type")]
    pub vehicle_type: Option<VehicleType>,
    pub is_featured: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(vehicle_type: VehicleType) -> VehiclePayload {
        VehiclePayload {
            name: "Clio 5".into(),
            vehicle_type,
            brand: "Renault".into(),
            model: "Clio".into(),
            year: 2022,
            mileage: Some(42_000),
            fuel: Fuel::Petrol,
            price: Some(14_500.0),
            daily_rate: Some(39.0),
            passengers: Some(5),
            description: "City car in good condition".into(),
            images: Some(vec!["https://img.example/clio.jpg".into()]),
            is_featured: None,
            specs: None,
        }
    }

    #[test]
    fn buy_listing_requires_mileage_and_price() {
        let mut p = payload(VehicleType::Buy);
        p.price = None;
        assert!(matches!(
            Vehicle::from_payload(p, ObjectId::new()),
            Err(ApiError::Validation(_))
        ));

        let mut p = payload(VehicleType::Buy);
        p.mileage = None;
        assert!(Vehicle::from_payload(p, ObjectId::new()).is_err());
    }

    #[test]
    fn rent_listing_requires_daily_rate_and_passengers() {
        let mut p = payload(VehicleType::Rent);
        p.daily_rate = None;
        assert!(Vehicle::from_payload(p, ObjectId::new()).is_err());

        let mut p = payload(VehicleType::Rent);
        p.passengers = None;
        assert!(Vehicle::from_payload(p, ObjectId::new()).is_err());
    }

    #[test]
    fn missing_fields_for_the_other_type_are_fine() {
        let mut p = payload(VehicleType::Buy);
        p.daily_rate = None;
        p.passengers = None;
        let vehicle = Vehicle::from_payload(p, ObjectId::new()).unwrap();
        assert_eq!(vehicle.vehicle_type, VehicleType::Buy);

        let mut p = payload(VehicleType::Rent);
        p.mileage = None;
        p.price = None;
        assert!(Vehicle::from_payload(p, ObjectId::new()).is_ok());
    }

    #[test]
    fn empty_images_default_to_placeholder() {
        let mut p = payload(VehicleType::Buy);
        p.images = Some(vec![]);
        let vehicle = Vehicle::from_payload(p, ObjectId::new()).unwrap();
        assert_eq!(vehicle.images, vec![PLACEHOLDER_IMAGE.to_string()]);

        let mut p = payload(VehicleType::Buy);
        p.images = None;
        let vehicle = Vehicle::from_payload(p, ObjectId::new()).unwrap();
        assert_eq!(vehicle.images.len(), 1);
    }

    #[test]
    fn non_url_images_are_rejected() {
        let mut p = payload(VehicleType::Buy);
        p.images = Some(vec!["ftp://nope".into()]);
        assert!(Vehicle::from_payload(p, ObjectId::new()).is_err());
    }

    #[test]
    fn implausible_year_is_rejected() {
        let mut p = payload(VehicleType::Buy);
        p.year = 1850;
        assert!(Vehicle::from_payload(p, ObjectId::new()).is_err());
    }

    #[test]
    fn owner_is_recorded() {
        let owner = ObjectId::new();
        let vehicle = Vehicle::from_payload(payload(VehicleType::Rent), owner).unwrap();
        assert_eq!(vehicle.user, owner);
    }

    #[test]
    fn type_field_serializes_under_wire_name() {
        let vehicle = Vehicle::from_payload(payload(VehicleType::Rent), ObjectId::new()).unwrap();
        let json = serde_json::to_value(&vehicle).unwrap();
        assert_eq!(json["type"], "rent");
        assert_eq!(json["dailyRate"], 39.0);
    }
}
