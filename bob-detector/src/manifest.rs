//! Remote artifact manifests.
//!
//! The artifact store publishes `{url_prefix}/{project}/latest/manifest.json`
//! alongside every upload:
//!
//! ```json
//! {"unix_timestamp": 1700000000}
//! ```

use std::time::Duration;

use bob_core::ProjectName;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ManifestError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// When a project's artifact was last published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    #[serde(rename = "unix_timestamp")]
    pub timestamp: i64,
}

/// Where manifests come from.
pub trait ManifestSource {
    fn fetch(&self, name: &ProjectName) -> Result<ArtifactManifest, ManifestError>;
}

/// Fetches manifests over HTTP(S).
pub struct HttpManifestSource {
    agent: ureq::Agent,
    url_prefix: String,
}

impl HttpManifestSource {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(FETCH_TIMEOUT).build(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn url_for(&self, name: &ProjectName) -> String {
        format!(
            "{}/{}/latest/manifest.json",
            self.url_prefix.trim_end_matches('/'),
            name
        )
    }
}

impl ManifestSource for HttpManifestSource {
    fn fetch(&self, name: &ProjectName) -> Result<ArtifactManifest, ManifestError> {
        let url = self.url_for(name);
        match self.agent.get(&url).call() {
            Ok(resp) if resp.status() == 200 => {
                let manifest: ArtifactManifest = resp
                    .into_json()
                    .map_err(|source| ManifestError::Decode {
                        url: url.clone(),
                        source,
                    })?;
                debug!("{name} manifest: {manifest:?}");
                Ok(manifest)
            }
            Ok(resp) => Err(ManifestError::Status {
                url,
                status: resp.status(),
            }),
            Err(ureq::Error::Status(status, _)) => Err(ManifestError::Status { url, status }),
            Err(ureq::Error::Transport(transport)) => Err(ManifestError::Transport {
                url,
                source: Box::new(transport),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use super::*;

    /// Serve exactly one HTTP response; the handle yields the request line.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("read request");
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).expect("read header");
                if header == "\r\n" || header.is_empty() {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            request_line
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn manifest_ignores_extra_fields() {
        let manifest: ArtifactManifest = serde_json::from_str(
            r#"{"unix_timestamp": 42, "version": "abc123", "files": ["a.tar"]}"#,
        )
        .expect("decode");
        assert_eq!(manifest.timestamp, 42);
    }

    #[test]
    fn url_trims_trailing_slash() {
        let source = HttpManifestSource::new("https://artifacts.example.com/");
        assert_eq!(
            source.url_for(&ProjectName::from("foo")),
            "https://artifacts.example.com/foo/latest/manifest.json"
        );
    }

    #[test]
    fn fetches_and_decodes_manifest() {
        let (base, server) = serve_once("200 OK", r#"{"unix_timestamp": 1700000000}"#);
        let manifest = HttpManifestSource::new(format!("{base}/"))
            .fetch(&ProjectName::from("foo"))
            .expect("fetch");
        assert_eq!(manifest.timestamp, 1_700_000_000);

        let request_line = server.join().expect("server");
        assert!(request_line.starts_with("GET /foo/latest/manifest.json "), "got: {request_line}");
    }

    #[test]
    fn non_200_is_status_error() {
        let (base, server) = serve_once("404 Not Found", "{}");
        let err = HttpManifestSource::new(base)
            .fetch(&ProjectName::from("foo"))
            .unwrap_err();
        assert!(matches!(err, ManifestError::Status { status: 404, .. }), "got: {err}");
        server.join().expect("server");
    }

    #[test]
    fn garbage_body_is_decode_error() {
        let (base, server) = serve_once("200 OK", "not json");
        let err = HttpManifestSource::new(base)
            .fetch(&ProjectName::from("foo"))
            .unwrap_err();
        assert!(matches!(err, ManifestError::Decode { .. }), "got: {err}");
        server.join().expect("server");
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let err = HttpManifestSource::new(format!("http://{addr}"))
            .fetch(&ProjectName::from("foo"))
            .unwrap_err();
        assert!(matches!(err, ManifestError::Transport { .. }), "got: {err}");
    }
}
