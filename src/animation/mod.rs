pub mod driver;

pub use driver::{AnimatedValue, Animation, Easing, Settled};
