use image::GrayImage;
use imageproc::template_matching::{MatchTemplateMethod, match_template};

use crate::coupon::CouponImage;

/// Minimum correlation coefficient for two images to count as the same
/// coupon.
pub const DEFAULT_THRESHOLD: f32 = 0.9;

/// Outcome of sliding one image over another in a single orientation.
///
/// `Undefined` is the geometric case: the template exceeds the search image
/// in at least one axis, so no correlation surface exists. Callers retry
/// with the roles reversed before collapsing `Undefined` to "not similar".
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TemplateMatch {
    Similar(f32),
    Dissimilar(f32),
    Undefined,
}

/// Decides whether two coupon images are the same coupon.
///
/// Exact fast path first: equal byte fingerprints short-circuit without
/// decoding. Otherwise both images are decoded to grayscale and matched by
/// normalized cross-correlation, so re-encoded or cropped copies still hit.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    threshold: f32,
}

impl DuplicateDetector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// True if `a` and `b` are byte-identical or visually similar.
    ///
    /// An undecodable buffer on either side degrades the pair to `false`;
    /// one bad image must not abort classification of the rest of a batch.
    pub fn is_duplicate(&self, a: &CouponImage, b: &CouponImage) -> bool {
        if a.fingerprint() == b.fingerprint() {
            return true;
        }
        let (Some(gray_a), Some(gray_b)) = (a.grayscale(), b.grayscale()) else {
            return false;
        };
        match self.match_once(gray_a, gray_b) {
            TemplateMatch::Similar(_) => true,
            TemplateMatch::Dissimilar(_) => false,
            // a doesn't fit inside b; try b as the template over a.
            TemplateMatch::Undefined => {
                matches!(self.match_once(gray_b, gray_a), TemplateMatch::Similar(_))
            }
        }
    }

    /// Best correlation coefficient between `a` and `b`, or `None` when
    /// either fails to decode or neither image fits inside the other.
    pub fn similarity(&self, a: &CouponImage, b: &CouponImage) -> Option<f32> {
        let gray_a = a.grayscale()?;
        let gray_b = b.grayscale()?;
        match self.match_once(gray_a, gray_b) {
            TemplateMatch::Similar(score) | TemplateMatch::Dissimilar(score) => Some(score),
            TemplateMatch::Undefined => match self.match_once(gray_b, gray_a) {
                TemplateMatch::Similar(score) | TemplateMatch::Dissimilar(score) => Some(score),
                TemplateMatch::Undefined => None,
            },
        }
    }

    /// Slide `template` over `search` and take the best coefficient from the
    /// correlation surface.
    pub(crate) fn match_once(&self, template: &GrayImage, search: &GrayImage) -> TemplateMatch {
        if template.width() > search.width() || template.height() > search.height() {
            return TemplateMatch::Undefined;
        }
        let surface = match_template(
            search,
            template,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let best = surface.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if best >= self.threshold {
            TemplateMatch::Similar(best)
        } else {
            TemplateMatch::Dissimilar(best)
        }
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
