pub mod nearest;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use nearest::NearestBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
