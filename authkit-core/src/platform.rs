//! Platform capability probe.
//!
//! The host application reports what the platform can actually do; everything
//! in the storage layer branches on this probe instead of sniffing globals.

use tracing::warn;

/// Operating-system family the client is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// iOS devices; Keychain-backed secret storage is available.
    Ios,
    /// Android devices; Keystore-backed secret storage is available.
    Android,
    /// Browser sandbox; no hardware-backed secret store.
    Web,
}

/// Capabilities of the platform the client runs on.
///
/// Implemented by the host shell; [`StaticCapabilities`] covers the common
/// case where the answers are known at startup.
pub trait PlatformCapabilities: Send + Sync {
    /// Operating-system family.
    fn os_family(&self) -> OsFamily;

    /// Whether a persistent key-value storage API is available.
    fn has_persistent_storage(&self) -> bool;

    /// Whether a cryptographically-secure random source is available.
    fn has_secure_random(&self) -> bool;

    /// Whether a hardware-backed secure secret store is available.
    fn has_hardware_keystore(&self) -> bool {
        self.os_family() != OsFamily::Web
    }
}

/// A capability probe with fixed answers.
#[derive(Debug, Clone, Copy)]
pub struct StaticCapabilities {
    os_family: OsFamily,
    persistent_storage: bool,
    secure_random: bool,
}

impl StaticCapabilities {
    /// Creates a probe reporting the given capabilities.
    #[must_use]
    pub const fn new(
        os_family: OsFamily,
        persistent_storage: bool,
        secure_random: bool,
    ) -> Self {
        Self {
            os_family,
            persistent_storage,
            secure_random,
        }
    }

    /// A fully-capable mobile platform.
    #[must_use]
    pub const fn mobile(os_family: OsFamily) -> Self {
        Self::new(os_family, true, true)
    }

    /// A web platform with the given storage/random support.
    #[must_use]
    pub const fn web(persistent_storage: bool, secure_random: bool) -> Self {
        Self::new(OsFamily::Web, persistent_storage, secure_random)
    }
}

impl PlatformCapabilities for StaticCapabilities {
    fn os_family(&self) -> OsFamily {
        self.os_family
    }

    fn has_persistent_storage(&self) -> bool {
        self.persistent_storage
    }

    fn has_secure_random(&self) -> bool {
        self.secure_random
    }
}

/// Whether the offline-queue domain must not be persisted on this platform.
///
/// On capability-limited platforms the queue may hold PII; without both a
/// persistent storage API and a secure random source there is no way to keep
/// it encrypted at rest, so persistence is disabled entirely rather than
/// written to an insecure medium.
pub fn should_disable_queue_persistence(probe: &dyn PlatformCapabilities) -> bool {
    if probe.os_family() != OsFamily::Web {
        return false;
    }

    let has_storage = probe.has_persistent_storage();
    let has_random = probe.has_secure_random();
    if !has_storage || !has_random {
        warn!(
            has_storage,
            has_random,
            "web environment lacks encryption support, disabling offline queue persistence"
        );
        return true;
    }

    false
}
