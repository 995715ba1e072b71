pub mod audit;
pub mod order;
pub mod user;
