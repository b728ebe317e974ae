//! Template engine based on MiniJinja

use indexmap::IndexMap;
use minijinja::Environment;
use std::path::Path;

use crate::context::RenderContext;
use crate::error::{Result, TemplateError};
use crate::filters;

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn build(self) -> Engine {
        Engine::new(self.strict_mode)
    }
}

/// The template engine
#[derive(Debug, Clone, Default)]
pub struct Engine {
    strict_mode: bool,
}

impl Engine {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Create a configured MiniJinja environment
    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
        }

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);
        env.add_filter("trunc", filters::trunc);

        env
    }

    /// Render a single template string
    pub fn render_string(
        &self,
        template: &str,
        context: &RenderContext,
        template_name: &str,
    ) -> Result<String> {
        let mut env = self.create_environment();
        env.add_template_owned(template_name.to_string(), template.to_string())
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template))?;

        let tmpl = env
            .get_template(template_name)
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template))?;

        tmpl.render(context)
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template).into())
    }

    /// Render every template under `templates_dir`
    ///
    /// Files whose name starts with `_` are loaded as helpers but not
    /// rendered, `NOTES.txt` is skipped, and templates that render to nothing
    /// are dropped. Output keeps template path order.
    pub fn render_dir(
        &self,
        templates_dir: &Path,
        context: &RenderContext,
    ) -> Result<IndexMap<String, String>> {
        let files = chartcheck_core::chart::template_files(templates_dir);
        let mut env = self.create_environment();
        let mut sources = IndexMap::new();

        for file_path in &files {
            let name = file_path
                .strip_prefix(templates_dir)
                .unwrap_or(file_path)
                .to_string_lossy()
                .replace('\\', "/");
            let content = std::fs::read_to_string(file_path)?;

            env.add_template_owned(name.clone(), content.clone())
                .map_err(|e| TemplateError::from_minijinja(e, &name, &content))?;
            sources.insert(name, content);
        }

        let mut rendered = IndexMap::new();

        for (name, content) in &sources {
            let file_name = name.rsplit('/').next().unwrap_or(name);
            if file_name.starts_with('_') || file_name.eq_ignore_ascii_case("NOTES.txt") {
                continue;
            }

            let tmpl = env
                .get_template(name)
                .map_err(|e| TemplateError::from_minijinja(e, name, content))?;
            let output = tmpl
                .render(context)
                .map_err(|e| TemplateError::from_minijinja(e, name, content))?;

            let trimmed = output.trim();
            if trimmed.is_empty() || trimmed == "---" {
                tracing::debug!(template = %name, "template rendered empty");
                continue;
            }
            rendered.insert(name.clone(), output);
        }

        Ok(rendered)
    }
}
