//! `archive`: create a compressed archive (tar, tar.gz, zip) from a path on
//! the target, via the target's own `tar`/`zip` binaries over `ctx.exec` so
//! it works the same locally and over SSH.

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
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tar" => Ok(ArchiveFormat::Tar),
            "gz" | "tar.gz" | "tgz" | "gzip" => Ok(ArchiveFormat::TarGz),
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(Error::config(format!(
                "archive: unsupported format '{other}' (expected tar, gz, zip)"
            ))),
        }
    }

    fn infer(dest: &str) -> Self {
        if dest.ends_with(".zip") {
            ArchiveFormat::Zip
        } else if dest.ends_with(".tar.gz") || dest.ends_with(".tgz") {
            ArchiveFormat::TarGz
        } else {
            ArchiveFormat::Tar
        }
    }

    fn build_command(&self, path: &str, dest: &str, excludes: &[String]) -> String {
        let path_quoted = shell_words::quote(path);
        let dest_quoted = shell_words::quote(dest);
        match self {
            ArchiveFormat::Tar | ArchiveFormat::TarGz => {
                let flags = if *self == ArchiveFormat::TarGz { "-czf" } else { "-cf" };
                let exclude_flags: String = excludes
                    .iter()
                    .map(|e| format!(" --exclude={}", shell_words::quote(e)))
                    .collect();
                format!("tar {flags} {dest_quoted}{exclude_flags} -C {path_quoted} .")
            }
            ArchiveFormat::Zip => {
                let exclude_flags: String = if excludes.is_empty() {
                    String::new()
                } else {
                    format!(" -x {}", excludes.iter().map(|e| shell_words::quote(e)).collect::<Vec<_>>().join(" "))
                };
                format!("cd {path_quoted} && zip -r {dest_quoted} .{exclude_flags}")
            }
        }
    }
}

pub struct ArchiveModule;

#[async_trait]
impl super::Module for ArchiveModule {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        params.get_string_required("path")?;
        params.get_string_required("dest")?;
        if let Some(format) = params.get_string("format") {
            ArchiveFormat::parse(&format)?;
        }
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let path = params.get_string_required("path")?;
        let dest = params.get_string_required("dest")?;
        let format = match params.get_string("format") {
            Some(f) => ArchiveFormat::parse(&f)?,
            None => ArchiveFormat::infer(&dest),
        };
        let excludes = params.get_vec_string("exclude_path").unwrap_or_default();

        if ctx.exec_safe(&format!("test -e {}", shell_words::quote(&dest))).await.is_success()
            && !params.get_bool_or("force", false)
        {
            return Ok(ModuleResult::ok(format!("archive '{dest}' already exists")));
        }

        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!("would create archive '{dest}' from '{path}'")));
        }

        let command = format.build_command(&path, &dest, &excludes);
        let result = ctx.exec(&command).await?;
        if !result.is_success() {
            return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
        }

        Ok(ModuleResult::changed(format!("created archive '{dest}' from '{path}'"))
            .with_data("dest", serde_json::json!(dest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(ArchiveFormat::infer("backup.tar.gz"), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::infer("site.zip"), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::infer("dump.tar"), ArchiveFormat::Tar);
    }

    #[test]
    fn build_command_includes_excludes_for_tar() {
        let cmd = ArchiveFormat::TarGz.build_command("/src", "/tmp/out.tar.gz", &["*.log".to_string()]);
        assert!(cmd.contains("--exclude="));
    }
}
