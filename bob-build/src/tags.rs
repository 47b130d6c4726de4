//! Image tag and label derivation.
//!
//! | kind             | local tags (never pushed)                    | registry tags                                   |
//! |------------------|----------------------------------------------|-------------------------------------------------|
//! | `docker-public`  | `public/<name>:<rev>`, `public/<name>:latest`   | `<public_registry>/<name>:<rev>` [+ `:latest`]   |
//! | `docker-private` | `private/<name>:<rev>`, `private/<name>:latest` | `<private_registry>/<name>:<rev>` [+ `:latest`]  |
//! | `docker-local`   | `local/<name>:latest`                        | none                                            |

use std::collections::BTreeMap;

use bob_core::{BuildKind, OrchestratorConfig, ProjectName, Revision};

/// Placeholders recognised in label values.
pub const PLACEHOLDERS: [&str; 4] = [
    "${SECOND_TIMESTAMP}",
    "${TIMESTAMP}",
    "${GIT_REF}",
    "${GIT_SHORT_REF}",
];

/// Tags for one image build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagSet {
    /// Applied at build time only.
    pub local: Vec<String>,
    /// Applied at build time and pushed when the project is pushed.
    pub registry: Vec<String>,
}

impl TagSet {
    /// Local tags followed by registry tags.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.local
            .iter()
            .chain(self.registry.iter())
            .map(String::as_str)
    }
}

/// Tags for an image target, or `None` when `kind` does not produce a tagged image.
pub fn derive_tags(
    kind: &BuildKind,
    name: &ProjectName,
    short_rev: &str,
    latest: bool,
    config: &OrchestratorConfig,
) -> Option<TagSet> {
    let (scope, registry) = match kind {
        BuildKind::PublicImage => ("public", config.public_registry.as_str()),
        BuildKind::PrivateImage => ("private", config.private_registry.as_str()),
        BuildKind::LocalImage => {
            return Some(TagSet {
                local: vec![format!("local/{name}:latest")],
                registry: vec![],
            })
        }
        _ => return None,
    };

    let mut registry_tags = vec![format!("{registry}/{name}:{short_rev}")];
    if latest {
        registry_tags.push(format!("{registry}/{name}:latest"));
    }

    Some(TagSet {
        local: vec![
            format!("{scope}/{name}:{short_rev}"),
            format!("{scope}/{name}:latest"),
        ],
        registry: registry_tags,
    })
}

/// Tag of the throwaway image a bundle's `/build` script runs in.
///
/// Bundles after the first in a project (`slot > 0`) get a `-<slot>` suffix.
pub fn builder_tag(name: &ProjectName, short_rev: &str, slot: usize) -> String {
    match slot {
        0 => format!("builder/{name}:{short_rev}"),
        slot => format!("builder/{name}:{short_rev}-{slot}"),
    }
}

/// Render declared labels as `key=value` strings.
///
/// Placeholders are substituted in values only; `now` is used for both
/// timestamp placeholders so every label in one build agrees.
pub fn derive_labels(
    labels: &BTreeMap<String, String>,
    revision: &Revision,
    now: i64,
) -> Vec<String> {
    let now = now.to_string();
    let substitutions = [
        (PLACEHOLDERS[0], now.as_str()),
        (PLACEHOLDERS[1], now.as_str()),
        (PLACEHOLDERS[2], revision.full.as_str()),
        (PLACEHOLDERS[3], revision.short.as_str()),
    ];

    labels
        .iter()
        .map(|(key, template)| {
            let value = substitutions
                .iter()
                .fold(template.clone(), |value, (placeholder, replacement)| {
                    value.replace(placeholder, replacement)
                });
            format!("{key}={value}")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            public_registry: "reg.example.com".to_string(),
            private_registry: "priv.example.com".to_string(),
            ..OrchestratorConfig::default()
        }
    }

    fn revision() -> Revision {
        Revision {
            full: "abc123def456".to_string(),
            short: "abc123".to_string(),
        }
    }

    #[test]
    fn public_tags_with_latest() {
        let tags = derive_tags(
            &BuildKind::PublicImage,
            &ProjectName::from("foo"),
            "abc123",
            true,
            &config(),
        )
        .expect("image kind");
        assert_eq!(tags.local, vec!["public/foo:abc123", "public/foo:latest"]);
        assert_eq!(
            tags.registry,
            vec!["reg.example.com/foo:abc123", "reg.example.com/foo:latest"]
        );
    }

    #[test]
    fn private_tags_without_latest() {
        let tags = derive_tags(
            &BuildKind::PrivateImage,
            &ProjectName::from("foo"),
            "abc123",
            false,
            &config(),
        )
        .expect("image kind");
        assert_eq!(tags.local, vec!["private/foo:abc123", "private/foo:latest"]);
        assert_eq!(tags.registry, vec!["priv.example.com/foo:abc123"]);
    }

    #[test]
    fn local_tags_are_never_registry_tags() {
        let tags = derive_tags(
            &BuildKind::LocalImage,
            &ProjectName::from("foo"),
            "abc123",
            true,
            &config(),
        )
        .expect("image kind");
        assert_eq!(tags.local, vec!["local/foo:latest"]);
        assert!(tags.registry.is_empty());
    }

    #[rstest]
    #[case(BuildKind::PublicImage, false, 0)]
    #[case(BuildKind::PublicImage, true, 1)]
    #[case(BuildKind::PrivateImage, false, 0)]
    #[case(BuildKind::PrivateImage, true, 1)]
    fn registry_latest_count(
        #[case] kind: BuildKind,
        #[case] latest: bool,
        #[case] expected: usize,
    ) {
        let tags = derive_tags(&kind, &ProjectName::from("foo"), "abc123", latest, &config())
            .expect("image kind");
        let count = tags.registry.iter().filter(|t| t.ends_with(":latest")).count();
        assert_eq!(count, expected);
    }

    #[rstest]
    #[case(BuildKind::Bundle)]
    #[case(BuildKind::Oci)]
    #[case(BuildKind::Unknown("x".to_string()))]
    fn non_image_kinds_have_no_tags(#[case] kind: BuildKind) {
        assert!(derive_tags(&kind, &ProjectName::from("foo"), "abc123", true, &config()).is_none());
    }

    #[rstest]
    #[case(0, "builder/foo:abc123")]
    #[case(1, "builder/foo:abc123-1")]
    #[case(2, "builder/foo:abc123-2")]
    fn builder_tags_differ_per_slot(#[case] slot: usize, #[case] expected: &str) {
        assert_eq!(builder_tag(&ProjectName::from("foo"), "abc123", slot), expected);
    }

    #[test]
    fn labels_substitute_placeholders_in_values_only() {
        let labels = BTreeMap::from([
            ("org.revision".to_string(), "${GIT_REF}".to_string()),
            ("org.short".to_string(), "rev-${GIT_SHORT_REF}".to_string()),
            (
                "built".to_string(),
                "${TIMESTAMP}/${SECOND_TIMESTAMP}".to_string(),
            ),
            ("${GIT_REF}".to_string(), "static".to_string()),
        ]);

        let mut rendered = derive_labels(&labels, &revision(), 1_700_000_000);
        rendered.sort();
        assert_eq!(
            rendered,
            vec![
                "${GIT_REF}=static",
                "built=1700000000/1700000000",
                "org.revision=abc123def456",
                "org.short=rev-abc123",
            ]
        );
    }

    #[test]
    fn every_declared_label_is_emitted() {
        let labels = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        assert_eq!(derive_labels(&labels, &revision(), 0).len(), 2);
        assert!(derive_labels(&BTreeMap::new(), &revision(), 0).is_empty());
    }
}
