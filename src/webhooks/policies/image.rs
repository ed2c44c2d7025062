//! Image reference rewriting.

/// Minimum number of `/`-separated segments for the first one to be treated
/// as a registry host.
const MIN_SEGMENTS_WITH_HOST: usize = 3;

/// Point an image reference at `target_registry`.
///
/// References with fewer than three segments (`nginx`, `nginx:latest`,
/// `library/nginx`) are prefixed. Longer references have their first segment
/// replaced. Tags and digests are left as they are.
pub fn rewrite_image(image: &str, target_registry: &str) -> String {
    let mut segments: Vec<&str> = image.split('/').collect();
    if segments.len() < MIN_SEGMENTS_WITH_HOST {
        return format!("{}/{}", target_registry, image);
    }

    if let Some(host) = segments.first_mut() {
        *host = target_registry;
    }
    segments.join("/")
}
