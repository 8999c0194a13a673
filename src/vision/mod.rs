pub mod distance;
pub mod mailbox;
pub mod poller;
pub mod readiness;

pub use distance::{estimate, round_for_display, CalibrationProfile};
pub use mailbox::DetectionMailbox;
pub use poller::{detection_loop, DetectionPoller, PollSettings, VisionSource};
pub use readiness::{GatePolicy, Readiness};
