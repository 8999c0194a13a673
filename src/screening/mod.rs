pub mod controller;

pub use controller::{ScreeningController, ScreeningSnapshot};
