pub mod input;
pub mod mode;
mod slider;
pub mod view;
