mod auth;
mod health_check;
mod users;

pub use auth::{login, logout, refresh, register};
pub use health_check::health_check;
pub use users::{delete_account, follow, followers, list_users, me, profile, update_profile};
