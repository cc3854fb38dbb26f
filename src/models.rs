pub mod orders;
pub mod referrals;
pub mod settings;
pub mod users;
