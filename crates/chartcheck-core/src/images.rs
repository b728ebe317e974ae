//! Icon and promote image checks
//!
//! Image bytes come from an [`ImageSource`]. The bundled [`LocalImageSource`]
//! reads files relative to the bundle root and skips remote references.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::error::{CoreError, Result};
use crate::manifest::Manifest;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageViolation {
    #[error("invalid icon image format: {format}, only support png, webp")]
    InvalidIconFormat { format: String },

    #[error("invalid promote image format: {format}, only support png, jpeg, webp")]
    InvalidPromoteFormat { format: String },

    #[error("info not found in image")]
    InfoNotFound,

    #[error("image size {size} exceeds the limit: {limit}")]
    SizeExceeded { size: u64, limit: u64 },

    #[error("invalid image dimensions: {width}x{height}, should be: {expected_width}x{expected_height}")]
    InvalidDimensions {
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Icon,
    Promote,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Icon => write!(f, "icon"),
            ImageKind::Promote => write!(f, "promote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    fn detect(kind: imagesize::ImageType) -> Option<Self> {
        match kind {
            imagesize::ImageType::Png => Some(ImageFormat::Png),
            imagesize::ImageType::Jpeg => Some(ImageFormat::Jpeg),
            imagesize::ImageType::Webp => Some(ImageFormat::Webp),
            _ => None,
        }
    }
}

/// Constraints for one kind of image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRule {
    pub formats: Vec<ImageFormat>,
    pub max_bytes: u64,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePolicy {
    pub icon: ImageRule,
    pub promote: ImageRule,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            icon: ImageRule {
                formats: vec![ImageFormat::Png, ImageFormat::Webp],
                max_bytes: 512 * 1024,
                width: 256,
                height: 256,
            },
            promote: ImageRule {
                formats: vec![ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Webp],
                max_bytes: 8 * 1024 * 1024,
                width: 1440,
                height: 900,
            },
        }
    }
}

impl ImagePolicy {
    pub fn rule(&self, kind: ImageKind) -> &ImageRule {
        match kind {
            ImageKind::Icon => &self.icon,
            ImageKind::Promote => &self.promote,
        }
    }
}

/// Resolves an image reference to its bytes
pub trait ImageSource {
    /// `Ok(None)` means the reference is not checkable from this source
    fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>>;
}

/// Reads images from files under a bundle root
#[derive(Debug, Clone)]
pub struct LocalImageSource {
    root: PathBuf,
}

impl LocalImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LocalImageSource {
    /// Resolve a reference to a file inside the bundle root
    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let requested = Path::new(reference);
        if requested.is_absolute() {
            return Err(CoreError::format(format!(
                "image path must be relative to the bundle: '{}'",
                reference
            )));
        }
        if requested.components().any(|c| c == Component::ParentDir) {
            return Err(CoreError::format(format!(
                "image path must not leave the bundle: '{}'",
                reference
            )));
        }

        let path = self.root.join(requested);
        if !path.is_file() {
            return Err(CoreError::format(format!(
                "image file not found: '{}'",
                path.display()
            )));
        }

        let canonical_root = self.root.canonicalize()?;
        let canonical = path.canonicalize()?;
        if !canonical.starts_with(&canonical_root) {
            return Err(CoreError::format(format!(
                "image path must not leave the bundle: '{}'",
                reference
            )));
        }
        Ok(canonical)
    }
}

impl ImageSource for LocalImageSource {
    fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>> {
        if reference.contains("://") {
            tracing::warn!(reference, "skipping remote image");
            return Ok(None);
        }

        let path = self.resolve(reference)?;
        Ok(Some(std::fs::read(&path)?))
    }
}

/// Check raw image bytes against a rule
pub fn check_image_bytes(
    bytes: &[u8],
    kind: ImageKind,
    rule: &ImageRule,
) -> std::result::Result<(), ImageViolation> {
    let size = bytes.len() as u64;
    if size > rule.max_bytes {
        return Err(ImageViolation::SizeExceeded {
            size,
            limit: rule.max_bytes,
        });
    }

    let detected = imagesize::image_type(bytes).map_err(|_| ImageViolation::InfoNotFound)?;
    let allowed = ImageFormat::detect(detected).is_some_and(|f| rule.formats.contains(&f));
    if !allowed {
        let format = format!("{:?}", detected).to_lowercase();
        return Err(match kind {
            ImageKind::Icon => ImageViolation::InvalidIconFormat { format },
            ImageKind::Promote => ImageViolation::InvalidPromoteFormat { format },
        });
    }

    let dims = imagesize::blob_size(bytes).map_err(|_| ImageViolation::InfoNotFound)?;
    if dims.width != rule.width || dims.height != rule.height {
        return Err(ImageViolation::InvalidDimensions {
            width: dims.width,
            height: dims.height,
            expected_width: rule.width,
            expected_height: rule.height,
        });
    }

    Ok(())
}

/// Check the manifest icon and every promote image
pub fn check_images(
    manifest: &Manifest,
    source: &dyn ImageSource,
    policy: &ImagePolicy,
) -> Result<()> {
    let icon = std::iter::once((ImageKind::Icon, manifest.metadata.icon.as_str()));
    let promote = manifest
        .spec
        .promote_image
        .iter()
        .map(|p| (ImageKind::Promote, p.as_str()));

    for (kind, reference) in icon.chain(promote) {
        if reference.is_empty() {
            continue;
        }
        let Some(bytes) = source.fetch(reference)? else {
            continue;
        };
        tracing::debug!(%kind, reference, bytes = bytes.len(), "checking image");
        check_image_bytes(&bytes, kind, policy.rule(kind))
            .map_err(crate::error::SemanticViolation::from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend([0, 0, 0, 13]);
        bytes.extend(b"IHDR");
        bytes.extend(width.to_be_bytes());
        bytes.extend(height.to_be_bytes());
        bytes.extend([8, 6, 0, 0, 0]);
        bytes.extend([0, 0, 0, 0]);
        bytes
    }

    fn gif(width: u16, height: u16) -> Vec<u8> {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend(width.to_le_bytes());
        bytes.extend(height.to_le_bytes());
        bytes.resize(32, 0);
        bytes
    }

    #[test]
    fn test_valid_icon() {
        let policy = ImagePolicy::default();
        assert!(check_image_bytes(&png(256, 256), ImageKind::Icon, &policy.icon).is_ok());
    }

    #[test]
    fn test_wrong_dimensions() {
        let policy = ImagePolicy::default();
        let err = check_image_bytes(&png(128, 128), ImageKind::Icon, &policy.icon).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"invalid image dimensions: 128x128, should be: 256x256");
    }

    #[test]
    fn test_unsupported_format() {
        let policy = ImagePolicy::default();
        let err = check_image_bytes(&gif(256, 256), ImageKind::Icon, &policy.icon).unwrap_err();
        assert_eq!(
            err,
            ImageViolation::InvalidIconFormat {
                format: "gif".to_string()
            }
        );

        let err =
            check_image_bytes(&gif(1440, 900), ImageKind::Promote, &policy.promote).unwrap_err();
        assert!(err.to_string().contains("only support png, jpeg, webp"));
    }

    #[test]
    fn test_size_limit() {
        let rule = ImageRule {
            max_bytes: 16,
            ..ImagePolicy::default().icon
        };
        let err = check_image_bytes(&png(256, 256), ImageKind::Icon, &rule).unwrap_err();
        assert_eq!(err, ImageViolation::SizeExceeded { size: 33, limit: 16 });
    }

    #[test]
    fn test_local_source_skips_remote() {
        let source = LocalImageSource::new("/nonexistent");
        assert!(source.fetch("https://example.com/icon.png").unwrap().is_none());
        assert!(source.fetch("missing.png").is_err());
    }

    #[test]
    fn test_local_source_stays_inside_bundle() {
        let outer = TempDir::new().unwrap();
        let bundle = outer.path().join("firefox");
        std::fs::create_dir(&bundle).unwrap();
        std::fs::write(bundle.join("icon.png"), png(256, 256)).unwrap();
        std::fs::write(outer.path().join("secret.png"), png(256, 256)).unwrap();

        let source = LocalImageSource::new(&bundle);
        assert!(source.fetch("icon.png").unwrap().is_some());
        assert!(source.fetch("./icon.png").unwrap().is_some());

        let absolute = outer.path().join("secret.png");
        let err = source.fetch(absolute.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("relative to the bundle"));

        let err = source.fetch("../secret.png").unwrap_err();
        assert!(err.to_string().contains("must not leave the bundle"));
    }

    #[cfg(unix)]
    #[test]
    fn test_local_source_rejects_symlink_escape() {
        let outer = TempDir::new().unwrap();
        let bundle = outer.path().join("firefox");
        std::fs::create_dir(&bundle).unwrap();
        std::fs::write(outer.path().join("secret.png"), png(256, 256)).unwrap();
        std::os::unix::fs::symlink(outer.path().join("secret.png"), bundle.join("icon.png"))
            .unwrap();

        let source = LocalImageSource::new(&bundle);
        let err = source.fetch("icon.png").unwrap_err();
        assert!(err.to_string().contains("must not leave the bundle"));
    }

    #[test]
    fn test_check_images_from_bundle() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("icon.png"), png(256, 256)).unwrap();
        std::fs::write(dir.path().join("promote.png"), png(1440, 900)).unwrap();
        std::fs::write(dir.path().join("small.png"), png(100, 100)).unwrap();

        let mut manifest = Manifest::default();
        manifest.metadata.icon = "icon.png".to_string();
        manifest.spec.promote_image = vec![
            "promote.png".to_string(),
            "https://cdn.example.com/remote.webp".to_string(),
        ];

        let source = LocalImageSource::new(dir.path());
        let policy = ImagePolicy::default();
        assert!(check_images(&manifest, &source, &policy).is_ok());

        manifest.spec.promote_image.push("./small.png".to_string());
        let err = check_images(&manifest, &source, &policy).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Semantic(crate::error::SemanticViolation::InvalidImage(
                ImageViolation::InvalidDimensions { width: 100, .. }
            ))
        ));
    }
}
