pub mod conversation;
pub mod property;
pub mod slots;
