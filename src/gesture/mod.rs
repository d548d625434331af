pub mod recognizer;
pub mod transform;

pub use recognizer::{
    GestureEvent, PanArbiter, PointerEvent, PointerPhase, PointerRecognizer, Recognized,
};
pub use transform::{Frame, Phase, TransformEvent, TransformMachine, TransformState};
