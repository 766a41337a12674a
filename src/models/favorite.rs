use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Join document between an account and a vehicle. A unique compound index on
/// (user, vehicle) makes a duplicate insert surface as a conflict instead of a
/// silent double-insert, even under a concurrent-toggle race.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    pub vehicle: ObjectId,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFavoriteDto {
    pub vehicle_id: String,
}
