//! Read-only views of the vendor catalog tables.

pub mod list;
pub mod list_item;
pub mod music;
