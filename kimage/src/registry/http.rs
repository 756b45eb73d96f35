use std::time::Duration;

use log::debug;

use crate::{image::ImageIdentifier, Result};

// Account for different image types in the Registry API
// Authoritive list: https://github.com/google/go-containerregistry/blob/6bce25ecf0297c1aa9072bc665b5cf58d53e1c54/pkg/v1/types/types.go#L22
pub const ACCEPTABLE_MANIFEST_TYPES: &[&str] = &[
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.oci.image.index.v1+json",
    "application/vnd.docker.distribution.manifest.v2+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
];

pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Looks up manifests through the registry HTTP API without credentials.
pub struct HttpLookup {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl HttpLookup {
    pub fn new(client: reqwest::blocking::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Returns the digest of `image` if the registry has it, and `None` if the registry says it does
    /// not. Any other answer, including authentication challenges, is an error because we can not
    /// tell whether the image exists.
    pub fn query_image_digest(&self, image: &ImageIdentifier) -> Result<Option<String>> {
        let (registry, path) = image.registry_and_path();
        // Local registries rarely serve TLS.
        let scheme = if is_local(registry) { "http" } else { "https" };
        let url = format!(
            "{scheme}://{registry}/v2/{path}/manifests/{tag}",
            tag = image.tag()
        );
        debug!("looking up {url}");

        // Registry API requires mediaType Header
        // https://github.com/opencontainers/image-spec/blob/main/manifest.md#image-manifest
        let response = self
            .client
            .head(&url)
            .header("Accept", ACCEPTABLE_MANIFEST_TYPES.join(","))
            .timeout(self.timeout)
            .send()?;

        let status = response.status();
        if status.is_success() {
            // Registry API should always return a digest
            // https://distribution.github.io/distribution/spec/api/#digest-header
            let digest = response
                .headers()
                .get("Docker-Content-Digest")
                .ok_or("expected image digest not found")?
                .to_str()?;
            return Ok(Some(digest.to_owned()));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Err(format!("registry responded with `{status}` for {url}").into())
    }
}

fn is_local(registry: &str) -> bool {
    let host = registry.split(':').next().unwrap_or(registry);
    matches!(host, "localhost" | "127.0.0.1")
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Write},
        net::TcpListener,
        thread,
    };

    use super::*;
    use crate::kernel::Arch;

    /// Serves a single HTTP request with `response` and returns the registry address.
    fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            let mut stream = stream;
            stream.write_all(response.as_bytes()).unwrap();
        });
        address
    }

    fn image(registry: &str) -> ImageIdentifier {
        ImageIdentifier {
            organization: format!("{registry}/org"),
            image_name: "kernel".to_owned(),
            version_tag: "6.6.13".to_owned(),
            hash_suffix: Some("abc123".parse().unwrap()),
            arch_suffix: Some(Arch::X86_64),
        }
    }

    fn lookup() -> HttpLookup {
        HttpLookup::new(reqwest::blocking::Client::new(), LOOKUP_TIMEOUT)
    }

    #[test]
    fn present_image_returns_digest() {
        let registry = serve_once(
            "HTTP/1.1 200 OK\r\nDocker-Content-Digest: sha256:0123\r\nContent-Length: 0\r\n\r\n",
        );
        assert_eq!(
            lookup().query_image_digest(&image(&registry)).unwrap(),
            Some("sha256:0123".to_owned())
        );
    }

    #[test]
    fn missing_image_returns_none() {
        let registry = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(lookup().query_image_digest(&image(&registry)).unwrap(), None);
    }

    #[test]
    fn authentication_challenge_is_an_error() {
        let registry = serve_once("HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\n\r\n");
        let error = lookup()
            .query_image_digest(&image(&registry))
            .unwrap_err();
        assert!(error.to_string().contains("401"), "{error}");
    }

    #[test]
    fn unresponsive_registry_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = listener.local_addr().unwrap().to_string();
        let started = std::time::Instant::now();
        let result = HttpLookup::new(
            reqwest::blocking::Client::new(),
            Duration::from_millis(200),
        )
        .query_image_digest(&image(&registry));
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }
}
