mod macros;

pub mod category;
pub mod config;
pub mod events;
pub mod handler;
pub mod item;
pub mod search;
pub mod sys;
pub mod wheel;
