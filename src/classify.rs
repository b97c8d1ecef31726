use crate::coupon::CouponImage;
use crate::detect::DuplicateDetector;
use crate::exec::ExecMode;

/// Result of checking every candidate against the reference set.
#[derive(Debug)]
pub struct Classification {
    /// Candidates with no match in the reference set, in candidate order.
    pub missing: Vec<CouponImage>,
    pub found_count: usize,
    pub total_candidates: usize,
    pub reference_count: usize,
}

/// Classify each candidate independently against the reference set.
///
/// Scans the reference set in its given order and stops at the first
/// duplicate verdict for a candidate; early exit is purely an efficiency
/// policy, since detection is symmetric. An empty reference set reports
/// every candidate missing; an empty candidate set reports nothing.
pub fn classify(
    detector: &DuplicateDetector,
    candidates: Vec<CouponImage>,
    reference: &[CouponImage],
    mode: ExecMode,
) -> Classification {
    let total_candidates = candidates.len();
    let reference_count = reference.len();

    let verdicts = mode.run(candidates, |candidate| {
        let found = reference
            .iter()
            .any(|known| detector.is_duplicate(&candidate, known));
        (candidate, found)
    });

    let mut missing = Vec::new();
    let mut found_count = 0;
    for (candidate, found) in verdicts {
        if found {
            found_count += 1;
        } else {
            missing.push(candidate);
        }
    }

    Classification {
        missing,
        found_count,
        total_candidates,
        reference_count,
    }
}
