//! `copy`: push a local file (or inline `content`) to a path on the target,
//! through the bound provider's `write_file`/`read_file`, so it works
//! identically over the local and SSH transports.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

pub struct CopyModule;

impl CopyModule {
    async fn source_bytes(params: &ModuleParams) -> Result<(Vec<u8>, String)> {
        if let Some(content) = params.get_string("content") {
            return Ok((content.into_bytes(), "(content)".to_string()));
        }
        if let Some(src) = params.get_string("src") {
            let bytes = tokio::fs::read(&src)
                .await
                .map_err(|e| Error::config(format!("cannot read source '{src}': {e}")))?;
            return Ok((bytes, src));
        }
        Err(Error::config("copy: either 'src' or 'content' must be provided"))
    }
}

#[async_trait]
impl super::Module for CopyModule {
    fn name(&self) -> &'static str {
        "copy"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        if params.get("src").is_none() && params.get("content").is_none() {
            return Err(Error::config("copy: either 'src' or 'content' must be provided"));
        }
        params.get_string_required("dest")?;
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let dest = params.get_string_required("dest")?;
        let mode = params.get_u32("mode");
        let backup = params.get_bool_or("backup", false);
        let backup_suffix = params.get_string("backup_suffix").unwrap_or_else(|| "~".to_string());

        let (content, src_display) = Self::source_bytes(params).await?;

        let existing = ctx.read_file(&dest).await.ok();
        let needs_copy = existing.as_deref() != Some(content.as_slice());

        if !needs_copy {
            return Ok(ModuleResult::ok(format!("'{dest}' is already up to date")));
        }

        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!("would copy {src_display} to '{dest}'")));
        }

        if backup {
            if let Some(previous) = &existing {
                let backup_path = format!("{dest}{backup_suffix}");
                ctx.write_file(&backup_path, previous, mode).await?;
            }
        }

        ctx.write_file(&dest, &content, mode).await?;

        let mut result = ModuleResult::changed(format!("copied {src_display} to '{dest}'"));
        result = result
            .with_data("dest", serde_json::json!(dest))
            .with_data("size", serde_json::json!(content.len()));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_source_or_content() {
        let mut params = ModuleParams::new();
        params.insert("dest".to_string(), serde_json::json!("/tmp/x"));
        assert!(tokio_test::block_on(CopyModule::source_bytes(&params)).is_err());
    }
}
