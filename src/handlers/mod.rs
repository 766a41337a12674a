pub mod auth;
pub mod favorites;
pub mod reservations;
pub mod testdrives;
pub mod users;
pub mod vehicles;
