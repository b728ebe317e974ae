//! Lint orchestration
//!
//! [`Linter`] runs the checks of this crate against one bundle directory in a
//! fixed order and stops at the first failing phase. The resource phase is the
//! exception inside a phase: it collects every budget, namespace and RBAC
//! problem before failing.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::chart::Bundle;
use crate::error::{CoreError, Result, ViolationList};
use crate::identity::{TitleInfo, check_identity};
use crate::images::{ImagePolicy, LocalImageSource, check_images};
use crate::manifest::{MANIFEST_FILE, Manifest};
use crate::resource::{RenderedResource, check_budget, check_namespaces, check_rbac};
use crate::rules;
use crate::schema::FieldValidator;

pub const DEFAULT_OWNER: &str = "default";
pub const DEFAULT_ADMIN: &str = "default";

/// Who the bundle is rendered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderIdentity {
    pub owner: String,
    pub admin: String,
}

impl Default for RenderIdentity {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            admin: DEFAULT_ADMIN.to_string(),
        }
    }
}

/// Template rendering needed by the linter
pub trait BundleRenderer {
    /// Resolve placeholders in raw manifest text
    fn render_manifest(&self, content: &str, identity: &RenderIdentity) -> Result<String>;

    /// Render the bundle templates into the objects they would create
    fn render_resources(
        &self,
        root: &Path,
        manifest: &Manifest,
        identity: &RenderIdentity,
    ) -> Result<Vec<RenderedResource>>;
}

/// Caller-supplied check run after the manifest phase
pub type CustomValidator = Arc<dyn Fn(&Path, &Manifest) -> Result<()> + Send + Sync>;

/// Immutable lint configuration, built with [`LintOptions::builder`]
#[derive(Clone, Default)]
pub struct LintOptions {
    owner: Option<String>,
    admin: Option<String>,
    skip_manifest: bool,
    skip_resources: bool,
    skip_folder: bool,
    validators: Vec<CustomValidator>,
}

impl LintOptions {
    pub fn builder() -> LintOptionsBuilder {
        LintOptionsBuilder::default()
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn admin(&self) -> Option<&str> {
        self.admin.as_deref()
    }

    pub fn skip_manifest(&self) -> bool {
        self.skip_manifest
    }

    pub fn skip_resources(&self) -> bool {
        self.skip_resources
    }

    pub fn skip_folder(&self) -> bool {
        self.skip_folder
    }

    pub fn validators(&self) -> &[CustomValidator] {
        &self.validators
    }

    /// Identity used for rendering, with defaults filled in
    pub fn identity(&self) -> RenderIdentity {
        let defaults = RenderIdentity::default();
        RenderIdentity {
            owner: self.owner.clone().unwrap_or(defaults.owner),
            admin: self.admin.clone().unwrap_or(defaults.admin),
        }
    }
}

impl fmt::Debug for LintOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LintOptions")
            .field("owner", &self.owner)
            .field("admin", &self.admin)
            .field("skip_manifest", &self.skip_manifest)
            .field("skip_resources", &self.skip_resources)
            .field("skip_folder", &self.skip_folder)
            .field("validators", &self.validators.len())
            .finish()
    }
}

#[derive(Default)]
pub struct LintOptionsBuilder {
    options: LintOptions,
}

impl LintOptionsBuilder {
    /// Empty values leave the default in place
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.options.owner = non_empty(owner.into());
        self
    }

    pub fn admin(mut self, admin: impl Into<String>) -> Self {
        self.options.admin = non_empty(admin.into());
        self
    }

    pub fn same_owner_admin(self, user: impl Into<String>) -> Self {
        let user = user.into();
        self.owner(user.clone()).admin(user)
    }

    pub fn skip_manifest(mut self) -> Self {
        self.options.skip_manifest = true;
        self
    }

    pub fn skip_resources(mut self) -> Self {
        self.options.skip_resources = true;
        self
    }

    pub fn skip_folder(mut self) -> Self {
        self.options.skip_folder = true;
        self
    }

    /// Validators run in registration order
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Path, &Manifest) -> Result<()> + Send + Sync + 'static,
    {
        self.options.validators.push(Arc::new(validator));
        self
    }

    /// Register the template scan for app data usage without permission
    pub fn app_data_validator(self) -> Self {
        self.validator(rules::check_app_data)
    }

    pub fn build(self) -> LintOptions {
        self.options
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Runs the checks against bundles with a given renderer and configuration
pub struct Linter<R> {
    renderer: R,
    options: LintOptions,
    fields: FieldValidator,
    images: ImagePolicy,
}

impl<R: BundleRenderer> Linter<R> {
    pub fn new(renderer: R, options: LintOptions) -> Self {
        Self {
            renderer,
            options,
            fields: FieldValidator::new(),
            images: ImagePolicy::default(),
        }
    }

    pub fn with_field_validator(mut self, fields: FieldValidator) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_image_policy(mut self, images: ImagePolicy) -> Self {
        self.images = images;
        self
    }

    pub fn options(&self) -> &LintOptions {
        &self.options
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Full lint of a bundle directory
    pub fn lint<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let root = path.as_ref();
        let identity = self.options.identity();
        tracing::debug!(bundle = %root.display(), owner = %identity.owner, admin = %identity.admin, "linting bundle");

        let manifest = self.load_manifest(root, &identity)?;

        if self.options.skip_manifest {
            tracing::debug!("skipping manifest checks");
        } else {
            self.check_manifest(&manifest)?;
        }

        for (i, validator) in self.options.validators.iter().enumerate() {
            tracing::debug!(index = i, "running custom validator");
            validator(root, &manifest)?;
        }

        if self.options.skip_resources {
            tracing::debug!("skipping resource checks");
        } else {
            self.check_resources(root, &manifest, &identity)?;
        }

        if self.options.skip_folder {
            tracing::debug!("skipping folder checks");
        } else {
            let bundle = Bundle::open(root)?;
            check_identity(&bundle.chart, &bundle.folder_name, &manifest.metadata, None)?;
        }

        tracing::debug!(bundle = %root.display(), "lint passed");
        Ok(())
    }

    /// Field constraints, architecture and entrance uniqueness
    pub fn check_manifest(&self, manifest: &Manifest) -> Result<()> {
        tracing::debug!(app = %manifest.metadata.name, "checking manifest fields");
        self.fields.validate(manifest)?;
        rules::check_architecture(manifest)?;
        rules::check_entrances(manifest)?;
        Ok(())
    }

    /// Render, parse and check a manifest file
    pub fn check_manifest_file<P: AsRef<Path>>(&self, path: P) -> Result<Manifest> {
        let content = std::fs::read_to_string(path.as_ref())?;
        self.check_manifest_content(&content)
    }

    /// Render, parse and check manifest text
    pub fn check_manifest_content(&self, content: &str) -> Result<Manifest> {
        let rendered = self
            .renderer
            .render_manifest(content, &self.options.identity())?;
        let manifest = Manifest::from_yaml(&rendered)?;
        self.check_manifest(&manifest)?;
        Ok(manifest)
    }

    /// Layout, identity, manifest rules, app data usage and resources
    pub fn check_chart<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let identity = self.options.identity();
        let bundle = Bundle::open(path.as_ref())?;
        let manifest = self.load_manifest(&bundle.root, &identity)?;

        check_identity(&bundle.chart, &bundle.folder_name, &manifest.metadata, None)?;
        self.fields.validate(&manifest)?;
        rules::check_architecture(&manifest)?;
        rules::check_app_data(&bundle.root, &manifest)?;
        self.check_resources(&bundle.root, &manifest, &identity)
    }

    /// Submission checks keyed by a parsed title
    pub fn check_chart_with_title<P: AsRef<Path>>(&self, path: P, title: &TitleInfo) -> Result<()> {
        let identity = self.options.identity();
        let bundle = Bundle::open(path.as_ref())?;
        let manifest = self.load_manifest(&bundle.root, &identity)?;

        tracing::debug!(kind = %title.kind, folder = %title.folder, version = %title.version, "checking chart against title");
        check_identity(
            &bundle.chart,
            &bundle.folder_name,
            &manifest.metadata,
            Some(title),
        )?;
        rules::check_categories(&manifest)?;
        rules::check_reserved_folder_name(&bundle.folder_name)?;
        check_images(
            &manifest,
            &LocalImageSource::new(&bundle.root),
            &self.images,
        )
    }

    /// Read and render the bundle manifest
    pub fn load_manifest(&self, root: &Path, identity: &RenderIdentity) -> Result<Manifest> {
        let path = root.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CoreError::format(format!(
                "failed to read {} in folder '{}': {}",
                MANIFEST_FILE,
                root.display(),
                e
            ))
        })?;
        let rendered = self.renderer.render_manifest(&content, identity)?;
        Manifest::from_yaml(&rendered)
    }

    fn check_resources(
        &self,
        root: &Path,
        manifest: &Manifest,
        identity: &RenderIdentity,
    ) -> Result<()> {
        let resources = self.renderer.render_resources(root, manifest, identity)?;
        tracing::debug!(count = resources.len(), "checking rendered resources");

        // Namespace and RBAC findings join the budget ones so lint reports them together
        let mut violations = ViolationList::new();
        for result in [
            check_budget(&manifest.spec, &resources),
            check_namespaces(&resources),
            check_rbac(&resources),
        ] {
            if let Err(found) = result {
                violations.extend(found);
            }
        }
        violations.into_result()?;

        rules::check_upload_mount(manifest.options.upload.as_ref(), &resources)?;
        Ok(())
    }
}
