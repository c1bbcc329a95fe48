//! `template`: render a Jinja2-compatible template (via the shared
//! [`crate::template::TemplateEngine`]) against `ctx.scope()` and write the
//! result to a path on the target.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

pub struct TemplateModule;

impl TemplateModule {
    async fn template_source(params: &ModuleParams) -> Result<(String, String)> {
        if let Some(content) = params.get_string("content") {
            return Ok((content, "<inline>".to_string()));
        }
        if let Some(src) = params.get_string("src") {
            let content = tokio::fs::read_to_string(&src)
                .await
                .map_err(|e| Error::config(format!("cannot read template source '{src}': {e}")))?;
            return Ok((content, src));
        }
        Err(Error::config("template: either 'src' or 'content' must be provided"))
    }
}

#[async_trait]
impl super::Module for TemplateModule {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        if params.get("src").is_none() && params.get("content").is_none() {
            return Err(Error::config("template: either 'src' or 'content' must be provided"));
        }
        params.get_string_required("dest")?;
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let dest = params.get_string_required("dest")?;
        let mode = params.get_u32("mode");
        let backup = params.get_bool_or("backup", false);
        let backup_suffix = params.get_string("backup_suffix").unwrap_or_else(|| "~".to_string());

        let (template_content, src_name) = Self::template_source(params).await?;

        let mut scope = ctx.scope();
        if let (Some(scope_obj), Some(serde_json::Value::Object(extra))) =
            (scope.as_object_mut(), params.get("vars"))
        {
            for (k, v) in extra {
                scope_obj.insert(k.clone(), v.clone());
            }
        }

        let rendered = ctx.templates.render_template(&template_content, &scope)?;

        let existing = ctx.read_file(&dest).await.ok();
        let needs_update = existing.as_deref() != Some(rendered.as_bytes());

        if !needs_update {
            return Ok(ModuleResult::ok(format!("template '{dest}' is already up to date")));
        }

        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!(
                "would render template '{src_name}' to '{dest}'"
            )));
        }

        if backup {
            if let Some(previous) = &existing {
                let backup_path = format!("{dest}{backup_suffix}");
                ctx.write_file(&backup_path, previous, mode).await?;
            }
        }

        ctx.write_file(&dest, rendered.as_bytes(), mode).await?;

        Ok(ModuleResult::changed(format!("rendered template '{src_name}' to '{dest}'"))
            .with_data("dest", serde_json::json!(dest))
            .with_data("src", serde_json::json!(src_name)))
    }
}
