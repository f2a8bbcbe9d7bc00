pub mod admin;
pub mod health;
pub mod rate_limit;
