pub mod driver;
pub mod state;
pub mod timer;

pub use driver::AnimationDriver;
pub use state::{AnimationPhase, AnimationState};
pub use timer::FrameTimer;
