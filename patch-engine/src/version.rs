/// Hostname placement convention. Talos 1.12 moved the hostname out of
/// `machine.network` into its own `HostnameConfig` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    Legacy,
    Modern,
}

/// First `(major, minor)` that uses [`SchemaMode::Modern`].
pub const MODERN_SINCE: (u64, u64) = (1, 12);

/// Tag of an image reference with a leading `v` stripped.
/// `repo:v1.12.2` gives `1.12.2`; a reference without `:` gives `""`.
pub fn extract_version(image: &str) -> &str {
    match image.rfind(':') {
        Some(i) => {
            let tag = &image[i + 1..];
            tag.strip_prefix('v').unwrap_or(tag)
        }
        None => "",
    }
}

impl SchemaMode {
    /// Anything without two parseable leading components is Legacy.
    pub fn from_version(version: &str) -> SchemaMode {
        let mut parts = version.split('.');
        let major = parts.next().and_then(|x| x.parse::<u64>().ok());
        let minor = parts.next().and_then(|x| x.parse::<u64>().ok());
        match (major, minor) {
            (Some(major), Some(minor)) if (major, minor) >= MODERN_SINCE => SchemaMode::Modern,
            _ => SchemaMode::Legacy,
        }
    }
}

/// The one place an installer image is turned into a schema decision.
/// Generation calls it with the parameter set's image, appending with the
/// image stored in `patch.yaml`.
pub fn resolve_schema(image: &str) -> SchemaMode {
    let mode = SchemaMode::from_version(extract_version(image));
    tracing::debug!("image {image} resolves to {mode:?} schema");
    mode
}
