//! Detectors for build descriptors, Kubernetes manifests and compose files.
//!
//! Every detector works on a path plus file content and never touches the
//! filesystem itself, so each can be exercised with plain strings. Malformed
//! input is reported, never raised.

pub mod builder;
pub mod compose;
pub mod image;
pub mod manifest;
pub mod registry;

pub use builder::{explicit_artifact, BuilderDetector, Probe};
pub use compose::ComposeImport;
pub use image::ImageRef;
pub use manifest::ManifestProbe;
pub use registry::{Classification, DetectorSet};
