/// Job identifiers are opaque strings assigned by the backend.
pub type JobId = String;

/// Hard upper bound on images per generation request.
pub const MAX_IMAGES: usize = 8;
