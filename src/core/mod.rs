//! Core vendoring types and logic

pub mod drift;
pub mod hash;
pub mod license;
pub mod links;
pub mod lock;
pub mod manifest;
pub mod reconcile;
pub mod vendor;

pub use drift::{DriftDetector, DriftState, SkillStatus};
pub use hash::{Checksum, ContentHasher, HashBudget, fingerprint};
pub use license::LicenseProbe;
pub use links::{LinkManager, Tool};
pub use lock::{License, LockEntry, Lockfile};
pub use manifest::{LocalSource, Manifest, ManifestEntry, RemoteSource, SkillSource};
pub use reconcile::{Policy, Reconciler, UpdateOutcome, UpdateSelection};
pub use vendor::{Limits, VendorStore};
