use image::GrayImage;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// SHA-256 hex digest of an image's raw encoded bytes, used for exact
/// duplicate checks before any decoding happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A coupon image as fetched: raw encoded bytes, their fingerprint, and a
/// display name taken from the source URL. Immutable once built.
///
/// The grayscale decode is a derived view, computed on first use and cached,
/// since a candidate may be compared against the whole reference set. A
/// buffer that fails to decode caches `None` rather than erroring.
#[derive(Debug, Clone)]
pub struct CouponImage {
    name: String,
    bytes: Vec<u8>,
    fingerprint: Fingerprint,
    gray: OnceLock<Option<GrayImage>>,
}

impl CouponImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let fingerprint = Fingerprint::of(&bytes);
        Self {
            name: name.into(),
            bytes,
            fingerprint,
            gray: OnceLock::new(),
        }
    }

    /// Build from a source URL, naming the image after the path segment
    /// following the last `/`.
    pub fn from_url(url: &str, bytes: Vec<u8>) -> Self {
        Self::new(name_from_url(url), bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Grayscale pixel view of the encoded bytes, or `None` if the buffer is
    /// not a decodable image.
    pub fn grayscale(&self) -> Option<&GrayImage> {
        self.gray
            .get_or_init(|| {
                image::load_from_memory(&self.bytes)
                    .ok()
                    .map(|img| img.to_luma8())
            })
            .as_ref()
    }
}

/// Name an image after the final path segment of its URL, matching how the
/// database and retailer name their coupon files.
pub fn name_from_url(url: &str) -> String {
    match url.rfind('/') {
        Some(idx) => url[idx + 1..].to_string(),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = Fingerprint::of(b"Hello, World!");
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        // Stable across constructions.
        assert_eq!(fp, Fingerprint::of(b"Hello, World!"));
    }

    #[test]
    fn different_bytes_different_fingerprint() {
        assert_ne!(Fingerprint::of(b"coupon a"), Fingerprint::of(b"coupon b"));
    }

    #[test]
    fn name_taken_from_last_url_segment() {
        assert_eq!(
            name_from_url("https://www.hfqpdb.com/coupons/12345.png"),
            "12345.png"
        );
        assert_eq!(name_from_url("bare_name.jpg"), "bare_name.jpg");
    }

    #[test]
    fn undecodable_bytes_yield_no_grayscale() {
        let img = CouponImage::new("bogus.png", b"not an image at all".to_vec());
        assert!(img.grayscale().is_none());
        // Cached miss, second call is still None.
        assert!(img.grayscale().is_none());
    }

    #[test]
    fn valid_png_decodes_to_grayscale() {
        let img = CouponImage::new("gray.png", encode_png(&[10, 20, 30, 40], 2, 2));
        let gray = img.grayscale().expect("decodable");
        assert_eq!(gray.dimensions(), (2, 2));
        assert_eq!(gray.get_pixel(1, 1)[0], 40);
    }

    fn encode_png(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
        let img = GrayImage::from_raw(width, height, pixels.to_vec()).unwrap();
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }
}
