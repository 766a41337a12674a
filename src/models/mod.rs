pub mod favorite;
pub mod reservation;
pub mod status;
pub mod test_drive;
pub mod user;
pub mod vehicle;
