pub mod engagement;
pub mod squad;
