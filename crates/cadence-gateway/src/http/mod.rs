pub mod health;
pub mod schedules;
