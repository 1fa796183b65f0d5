pub mod context;
pub mod hub;
pub mod intents;
pub mod merger;
pub mod notify;
pub mod orders;
pub mod tracker;
