//! Checks whether coupon images advertised on a retailer's site already exist
//! in a community coupon database, and collects the ones that don't.
//!
//! The interesting part is near-duplicate detection: a byte-for-byte hash
//! comparison misses re-encoded, cropped, or resized copies, so an exact
//! SHA-256 fast path is backed by normalized cross-correlation template
//! matching over grayscale decodes.

pub mod classify;
pub mod coupon;
pub mod detect;
pub mod exec;
pub mod fetch;
