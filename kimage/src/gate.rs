use log::{debug, info, warn};

use crate::{error::RegistryLookupError, image::ImageIdentifier, registry::Registry};

/// What the registry told us about an image.
#[derive(Debug)]
pub enum Presence {
    Present,
    Absent,
    /// The lookup itself failed, so the image may or may not exist.
    Unknown(RegistryLookupError),
}

pub fn presence_of(registry: &dyn Registry, image: &ImageIdentifier) -> Presence {
    match registry.exists(image) {
        Ok(true) => Presence::Present,
        Ok(false) => Presence::Absent,
        Err(error) => Presence::Unknown(error),
    }
}

/// Decides whether `hash_qualified` has to be built. Only an image the registry confirms to exist is
/// skipped; a failed lookup means rebuilding, never skipping.
pub fn should_build(registry: &dyn Registry, hash_qualified: &ImageIdentifier, force: bool) -> bool {
    if force {
        debug!("building {hash_qualified} because a rebuild was forced");
        return true;
    }

    match presence_of(registry, hash_qualified) {
        Presence::Present => {
            info!("{hash_qualified} is up to date, skipping build");
            false
        }
        Presence::Absent => {
            debug!("did not find {hash_qualified} in the registry");
            true
        }
        Presence::Unknown(error) => {
            warn!("{error}; building it in case it does not exist");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        kernel::Arch,
        registry::fake::{Call, FakeRegistry},
    };

    fn image() -> ImageIdentifier {
        ImageIdentifier {
            organization: "org".to_owned(),
            image_name: "kernel".to_owned(),
            version_tag: "6.6.13".to_owned(),
            hash_suffix: Some("abc123".parse().unwrap()),
            arch_suffix: Some(Arch::X86_64),
        }
    }

    #[test]
    fn existing_image_is_skipped() {
        let registry = FakeRegistry::with_remote(["org/kernel:6.6.13-abc123-amd64"]);
        assert!(!should_build(&registry, &image(), false));
    }

    #[test]
    fn force_rebuilds_without_lookup() {
        let registry = FakeRegistry::with_remote(["org/kernel:6.6.13-abc123-amd64"]);
        assert!(should_build(&registry, &image(), true));
        assert!(registry.calls().is_empty());
    }

    #[test]
    fn missing_image_is_built() {
        let registry = FakeRegistry::default();
        assert!(should_build(&registry, &image(), false));
        assert_eq!(
            registry.calls(),
            vec![Call::Exists("org/kernel:6.6.13-abc123-amd64".to_owned())]
        );
    }

    #[test]
    fn failed_lookup_fails_open_toward_building() {
        let mut registry = FakeRegistry::with_remote(["org/kernel:6.6.13-abc123-amd64"]);
        registry
            .failing_lookups
            .insert("org/kernel:6.6.13-abc123-amd64".to_owned(), Duration::ZERO);
        assert!(should_build(&registry, &image(), false));
        assert!(matches!(
            presence_of(&registry, &image()),
            Presence::Unknown(RegistryLookupError { .. })
        ));
    }
}
