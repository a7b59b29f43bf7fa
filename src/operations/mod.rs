pub mod construction;
pub mod data;
pub mod drop;
