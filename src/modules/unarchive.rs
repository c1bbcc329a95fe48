//! `unarchive`: extract a tar/tar.gz/zip archive already present on the
//! target into a destination directory, via `tar`/`unzip` over `ctx.exec`.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Tar,
    TarGz,
    Zip,
}

impl ArchiveFormat {
    fn infer(src: &str) -> Result<Self> {
        if src.ends_with(".zip") {
            Ok(ArchiveFormat::Zip)
        } else if src.ends_with(".tar.gz") || src.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else if src.ends_with(".tar") {
            Ok(ArchiveFormat::Tar)
        } else {
            Err(Error::config(format!("unarchive: cannot infer format from '{src}'")))
        }
    }

    fn extract_command(&self, src: &str, dest: &str) -> String {
        let src_quoted = shell_words::quote(src);
        let dest_quoted = shell_words::quote(dest);
        match self {
            ArchiveFormat::Tar => format!("tar -xf {src_quoted} -C {dest_quoted}"),
            ArchiveFormat::TarGz => format!("tar -xzf {src_quoted} -C {dest_quoted}"),
            ArchiveFormat::Zip => format!("unzip -o {src_quoted} -d {dest_quoted}"),
        }
    }
}

pub struct UnarchiveModule;

#[async_trait]
impl super::Module for UnarchiveModule {
    fn name(&self) -> &'static str {
        "unarchive"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        let src = params.get_string_required("src")?;
        params.get_string_required("dest")?;
        if let Some(format) = params.get_string("format") {
            if !matches!(format.as_str(), "tar" | "gz" | "tar.gz" | "tgz" | "zip") {
                return Err(Error::config(format!("unarchive: unsupported format '{format}'")));
            }
        } else {
            ArchiveFormat::infer(&src)?;
        }
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let src = params.get_string_required("src")?;
        let dest = params.get_string_required("dest")?;
        let format = match params.get_string("format").as_deref() {
            Some("tar") => ArchiveFormat::Tar,
            Some("gz") | Some("tar.gz") | Some("tgz") => ArchiveFormat::TarGz,
            Some("zip") => ArchiveFormat::Zip,
            _ => ArchiveFormat::infer(&src)?,
        };

        let marker = format!("{dest}/.katmer_unarchived_from");
        let marker_quoted = shell_words::quote(&marker);
        let already = ctx
            .read_file(&marker)
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).trim() == src)
            .unwrap_or(false);

        if already && !params.get_bool_or("force", false) {
            return Ok(ModuleResult::ok(format!("'{src}' already extracted into '{dest}'")));
        }

        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!("would extract '{src}' into '{dest}'")));
        }

        ctx.exec(&format!("mkdir -p {}", shell_words::quote(&dest))).await?;
        let result = ctx.exec(&format.extract_command(&src, &dest)).await?;
        if !result.is_success() {
            return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
        }
        ctx.exec(&format!("echo {} > {marker_quoted}", shell_words::quote(&src))).await?;

        Ok(ModuleResult::changed(format!("extracted '{src}' into '{dest}'"))
            .with_data("dest", serde_json::json!(dest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(ArchiveFormat::infer("backup.tar.gz").unwrap(), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::infer("site.zip").unwrap(), ArchiveFormat::Zip);
        assert!(ArchiveFormat::infer("notes.txt").is_err());
    }
}
