pub mod admin;
pub mod cancellation;
pub mod messages;
pub mod schedules;
