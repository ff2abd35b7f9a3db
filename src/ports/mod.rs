pub mod catalog;
pub mod covers;
pub mod tagging;
