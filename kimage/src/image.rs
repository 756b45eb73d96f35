use std::{fmt, sync::LazyLock};

use regex::Regex;

use crate::{
    content_hash::ContentHash,
    error::InputError,
    kernel::Arch,
    target::{BuildTarget, Flavor, TargetKind},
};

/// Grammar for tags taken from
/// https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go.
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w][\w.-]{0,127}$").unwrap());

/// Grammar for `[domain '/'] path-component ['/' path-component]*` from the same file.
static REPOSITORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*(?::[0-9]+)?/)?",
        r"[a-z0-9]+(?:(?:[_.]|__|-+)[a-z0-9]+)*",
        r"(?:/[a-z0-9]+(?:(?:[_.]|__|-+)[a-z0-9]+)*)*$",
    ))
    .unwrap()
});

const DOCKER_HUB_REGISTRY: &str = "registry-1.docker.io";

/// Where images are published: `<organization>/<image>`. The organization may be or start with a
/// registry host, e.g. `ghcr.io/acme` or `localhost:5000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub organization: String,
    pub image: String,
}

impl Namespace {
    pub fn new(organization: &str, image: &str) -> Result<Self, InputError> {
        let repository = format!("{organization}/{image}");
        if image.contains('/') || !REPOSITORY.is_match(&repository) {
            return Err(InputError::Repository(repository));
        }
        Ok(Self {
            organization: organization.to_owned(),
            image: image.to_owned(),
        })
    }
}

/// Docker treats the first component of a name as a registry host when it could not be a path.
fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

/// A fully resolved image reference, split into the parts tags are derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageIdentifier {
    pub organization: String,
    pub image_name: String,
    pub version_tag: String,
    pub hash_suffix: Option<ContentHash>,
    pub arch_suffix: Option<Arch>,
}

impl ImageIdentifier {
    pub fn tag(&self) -> String {
        let mut tag = self.version_tag.clone();
        if let Some(hash) = &self.hash_suffix {
            tag.push('-');
            tag.push_str(&hash.to_string());
        }
        if let Some(arch) = self.arch_suffix {
            tag.push('-');
            tag.push_str(arch.image_suffix());
        }
        tag
    }

    /// The name of the manifest list that groups this image with its other architectures.
    pub fn multi_arch(&self) -> ImageIdentifier {
        ImageIdentifier {
            arch_suffix: None,
            ..self.clone()
        }
    }

    /// The same image for a different architecture.
    pub fn with_arch(&self, arch: Arch) -> ImageIdentifier {
        ImageIdentifier {
            arch_suffix: Some(arch),
            ..self.clone()
        }
    }

    /// Splits the repository into the registry host serving it and the path within the registry.
    /// Names without a registry host live on Docker Hub.
    pub fn registry_and_path(&self) -> (&str, String) {
        let (first, rest) = self
            .organization
            .split_once('/')
            .unwrap_or((self.organization.as_str(), ""));
        if !is_registry_host(first) {
            return (
                DOCKER_HUB_REGISTRY,
                format!("{}/{}", self.organization, self.image_name),
            );
        }
        let path = if rest.is_empty() {
            self.image_name.clone()
        } else {
            format!("{rest}/{}", self.image_name)
        };
        (first, path)
    }
}

impl fmt::Display for ImageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}",
            self.organization,
            self.image_name,
            self.tag()
        )
    }
}

/// Both names of one build target. They differ only in the presence of the content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTags {
    /// Changes whenever the build directory changes. Used to decide whether to rebuild.
    pub hash_qualified: ImageIdentifier,
    /// Stable public pointer to the most recently pushed hash-qualified image.
    pub floating: ImageIdentifier,
}

fn version_tag(target: &BuildTarget) -> String {
    let Flavor { debug, extra } = &target.flavor;
    let mut tag = target.kernel().as_str().to_owned();
    if let Some(extra) = extra {
        tag.push('-');
        tag.push_str(extra.as_str());
    }
    if *debug {
        tag.push('-');
        tag.push_str(Flavor::DEBUG_SUFFIX);
    }
    tag
}

/// Derives the hash-qualified and floating identifiers of `target`. Pure; equal inputs give equal
/// outputs.
pub fn resolve_tags(
    namespace: &Namespace,
    target: &BuildTarget,
    hash: &ContentHash,
) -> Result<ResolvedTags, InputError> {
    let image_name = match &target.kind {
        TargetKind::Plain(_) => namespace.image.clone(),
        TargetKind::Tooled(_, tool) => format!("{}-{tool}", namespace.image),
    };

    let floating = ImageIdentifier {
        organization: namespace.organization.clone(),
        image_name,
        version_tag: version_tag(target),
        hash_suffix: None,
        arch_suffix: Some(target.arch),
    };
    let hash_qualified = ImageIdentifier {
        hash_suffix: Some(hash.clone()),
        ..floating.clone()
    };

    let tag = hash_qualified.tag();
    if !TAG.is_match(&tag) {
        return Err(InputError::Tag(tag));
    }

    Ok(ResolvedTags {
        hash_qualified,
        floating,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kernel::KernelVersion,
        target::{Extra, ToolName},
    };

    fn namespace() -> Namespace {
        Namespace {
            organization: "org".to_owned(),
            image: "kernel".to_owned(),
        }
    }

    fn hash(value: &str) -> ContentHash {
        value.parse().unwrap()
    }

    fn kernel(value: &str) -> KernelVersion {
        KernelVersion::parse(value).unwrap()
    }

    #[test]
    fn plain_kernel_tags() {
        let target = BuildTarget::plain(kernel("6.6.13"), Arch::X86_64, Flavor::default());
        let tags = resolve_tags(&namespace(), &target, &hash("abc123")).unwrap();
        assert_eq!(
            tags.hash_qualified.to_string(),
            "org/kernel:6.6.13-abc123-amd64"
        );
        assert_eq!(tags.floating.to_string(), "org/kernel:6.6.13-amd64");
        assert_eq!(
            tags.hash_qualified.multi_arch().to_string(),
            "org/kernel:6.6.13-abc123"
        );
        assert_eq!(tags.floating.multi_arch().to_string(), "org/kernel:6.6.13");
    }

    #[test]
    fn tool_tags() {
        let target = BuildTarget::tooled(
            kernel("5.15.27"),
            ToolName::new("perf").unwrap(),
            Arch::Aarch64,
            Flavor::default(),
        );
        let tags = resolve_tags(&namespace(), &target, &hash("def456")).unwrap();
        assert_eq!(
            tags.hash_qualified.to_string(),
            "org/kernel-perf:5.15.27-def456-arm64"
        );
        assert_eq!(tags.floating.to_string(), "org/kernel-perf:5.15.27-arm64");
    }

    #[test]
    fn flavor_and_dirty_marker_are_encoded() {
        let target = BuildTarget::plain(
            kernel("6.1.55"),
            Arch::X86_64,
            Flavor {
                debug: true,
                extra: Some(Extra::new("rt").unwrap()),
            },
        );
        let tags = resolve_tags(&namespace(), &target, &hash("abc123-dirty")).unwrap();
        assert_eq!(
            tags.hash_qualified.to_string(),
            "org/kernel:6.1.55-rt-dbg-abc123-dirty-amd64"
        );
        assert_eq!(tags.floating.to_string(), "org/kernel:6.1.55-rt-dbg-amd64");
    }

    #[test]
    fn forms_differ_only_in_hash() {
        let target = BuildTarget::plain(kernel("6.6.13"), Arch::Aarch64, Flavor::default());
        let tags = resolve_tags(&namespace(), &target, &hash("abc123")).unwrap();
        assert_eq!(
            ImageIdentifier {
                hash_suffix: None,
                ..tags.hash_qualified.clone()
            },
            tags.floating
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let target = BuildTarget::tooled(
            kernel("6.6.13"),
            ToolName::new("bcc").unwrap(),
            Arch::X86_64,
            Flavor::default(),
        );
        let first = resolve_tags(&namespace(), &target, &hash("abc123")).unwrap();
        for _ in 0..10 {
            let again = resolve_tags(&namespace(), &target, &hash("abc123")).unwrap();
            assert_eq!(
                again.hash_qualified.to_string(),
                first.hash_qualified.to_string()
            );
            assert_eq!(again, first);
        }
    }

    #[test]
    fn overlong_tags_are_rejected() {
        let target = BuildTarget::plain(
            kernel("6.6.13"),
            Arch::X86_64,
            Flavor {
                debug: false,
                extra: Some(Extra::new(&"x".repeat(120)).unwrap()),
            },
        );
        assert!(matches!(
            resolve_tags(&namespace(), &target, &hash("abc123")),
            Err(InputError::Tag(_))
        ));
    }

    #[test]
    fn registry_is_split_from_organization() {
        let mut image = resolve_tags(
            &namespace(),
            &BuildTarget::plain(kernel("6.6.13"), Arch::X86_64, Flavor::default()),
            &hash("abc123"),
        )
        .unwrap()
        .floating;
        assert_eq!(
            image.registry_and_path(),
            ("registry-1.docker.io", "org/kernel".to_owned())
        );

        image.organization = "ghcr.io/acme/kernels".to_owned();
        assert_eq!(
            image.registry_and_path(),
            ("ghcr.io", "acme/kernels/kernel".to_owned())
        );

        image.organization = "localhost:5000/acme".to_owned();
        assert_eq!(
            image.registry_and_path(),
            ("localhost:5000", "acme/kernel".to_owned())
        );
    }

    #[test]
    fn organization_may_be_just_a_registry_host() {
        let mut image = resolve_tags(
            &namespace(),
            &BuildTarget::plain(kernel("6.6.13"), Arch::X86_64, Flavor::default()),
            &hash("abc123"),
        )
        .unwrap()
        .floating;

        image.organization = "localhost:5000".to_owned();
        assert_eq!(
            image.registry_and_path(),
            ("localhost:5000", "kernel".to_owned())
        );

        image.organization = "ghcr.io".to_owned();
        assert_eq!(image.registry_and_path(), ("ghcr.io", "kernel".to_owned()));

        image.organization = "localhost".to_owned();
        assert_eq!(image.registry_and_path(), ("localhost", "kernel".to_owned()));
    }

    #[test]
    fn namespace_follows_reference_grammar() {
        for (organization, image) in [
            ("org", "kernel"),
            ("ghcr.io/acme", "kernel"),
            ("localhost:5000", "kernel"),
            ("my-org/team_a", "linux.kernel"),
        ] {
            assert!(
                Namespace::new(organization, image).is_ok(),
                "{organization}/{image} should be accepted"
            );
        }
        for (organization, image) in [
            ("org/Team", "kernel"),
            ("org", "Kernel"),
            ("org/", "kernel"),
            ("", "kernel"),
            ("org", ""),
            ("org", "a/b"),
            ("org name", "kernel"),
            ("ghcr.io:port", "kernel"),
        ] {
            assert!(
                matches!(
                    Namespace::new(organization, image),
                    Err(InputError::Repository(_))
                ),
                "{organization}/{image} should be rejected"
            );
        }
    }
}
