pub mod detection;
pub mod eye;
pub mod result;
pub mod subject;

pub use detection::{Detection, DetectionBatch, DetectionLabel, EyeStatus};
pub use eye::{Direction, Eye, YesNo};
pub use result::{AcuityOutcome, PassFail, ResultRecord, StoredResult, Tier};
pub use subject::{SubjectDraft, SubjectMetadata, SubjectRules};
