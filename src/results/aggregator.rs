use chrono::{DateTime, Utc};

use crate::astigmatism::AstigmatismOutcome;
use crate::models::{AcuityOutcome, PassFail, ResultRecord};

/// Merge the acuity classification and the astigmatism outcome into one record.
pub fn build(acuity: &AcuityOutcome, astigmatism: &AstigmatismOutcome) -> ResultRecord {
    build_at(acuity, astigmatism, Utc::now())
}

pub fn build_at(
    acuity: &AcuityOutcome,
    astigmatism: &AstigmatismOutcome,
    created_at: DateTime<Utc>,
) -> ResultRecord {
    ResultRecord {
        left_eye_score: acuity.left_score,
        right_eye_score: acuity.right_score,
        left_eye_result: PassFail::from_pass(acuity.left_pass),
        right_eye_result: PassFail::from_pass(acuity.right_pass),
        overall_result: acuity.tier,
        left_eye_answer: astigmatism.left_eye_clear,
        right_eye_answer: astigmatism.right_eye_clear,
        glaring_answer: astigmatism.glare,
        headache_answer: astigmatism.headache,
        astigmatism_result: astigmatism.verdict,
        schedule_follow_up: astigmatism.schedule_follow_up(),
        created_at,
    }
}
