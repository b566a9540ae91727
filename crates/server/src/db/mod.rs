pub mod deviations;
pub mod pool;
pub mod studies;
pub mod users;
