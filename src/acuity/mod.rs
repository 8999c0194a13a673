pub mod classifier;
pub mod engine;
pub mod run;
pub mod state;
pub mod stimulus;

pub use classifier::{ClassificationRequest, ClassificationResponse, Classifier};
pub use engine::{AcuitySessionEngine, EngineSnapshot};
pub use run::{AnswerOutcome, EyeRun};
pub use state::{SessionEvent, SessionState, Transition};
pub use stimulus::{StimulusSequencer, StimulusTrial, TRIALS_PER_EYE};
