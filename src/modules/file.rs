//! `file`: manage file/directory/symlink state on the target, driven
//! entirely through POSIX shell probes and actions over `ctx.exec` so it
//! works identically over the local and SSH transports.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileState {
    File,
    Directory,
    Link,
    Absent,
    Touch,
}

impl FileState {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" => Ok(FileState::File),
            "directory" | "dir" => Ok(FileState::Directory),
            "link" | "symlink" => Ok(FileState::Link),
            "absent" => Ok(FileState::Absent),
            "touch" => Ok(FileState::Touch),
            other => Err(Error::config(format!(
                "file: invalid state '{other}' (expected file, directory, link, absent, touch)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrentKind {
    File,
    Directory,
    Link,
    Absent,
}

pub struct FileModule;

impl FileModule {
    async fn probe(ctx: &TaskContext, path: &str) -> CurrentKind {
        let quoted = shell_words::quote(path);
        if !ctx.exec_safe(&format!("test -e {quoted} -o -L {quoted}")).await.is_success() {
            return CurrentKind::Absent;
        }
        if ctx.exec_safe(&format!("test -L {quoted}")).await.is_success() {
            CurrentKind::Link
        } else if ctx.exec_safe(&format!("test -d {quoted}")).await.is_success() {
            CurrentKind::Directory
        } else {
            CurrentKind::File
        }
    }

    async fn apply_mode_owner(ctx: &TaskContext, path: &str, params: &ModuleParams) -> Result<bool> {
        let quoted = shell_words::quote(path);
        let mut changed = false;
        if let Some(mode) = params.get_u32("mode") {
            ctx.exec(&format!("chmod {mode:o} {quoted}")).await?;
            changed = true;
        }
        if let Some(owner) = params.get_string("owner") {
            let group = params.get_string("group").unwrap_or_default();
            let spec = if group.is_empty() { owner } else { format!("{owner}:{group}") };
            ctx.exec(&format!("chown {spec} {quoted}")).await?;
            changed = true;
        }
        Ok(changed)
    }
}

#[async_trait]
impl super::Module for FileModule {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        params.get_string_required("path")?;
        let state = params.get_string("state").unwrap_or_else(|| "file".to_string());
        FileState::parse(&state)?;
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let path = params.get_string_required("path")?;
        let quoted = shell_words::quote(&path);
        let state = FileState::parse(&params.get_string("state").unwrap_or_else(|| "file".to_string()))?;
        let force = params.get_bool_or("force", false);
        let recurse = params.get_bool_or("recurse", false);
        let current = Self::probe(ctx, &path).await;

        match state {
            FileState::Absent => {
                if current == CurrentKind::Absent {
                    return Ok(ModuleResult::ok(format!("'{path}' already absent")));
                }
                if ctx.check_mode {
                    return Ok(ModuleResult::changed(format!("would remove '{path}'")));
                }
                let flag = if recurse || current == CurrentKind::Directory { "-rf" } else { "-f" };
                ctx.exec(&format!("rm {flag} {quoted}")).await?;
                Ok(ModuleResult::changed(format!("removed '{path}'")))
            }

            FileState::Directory => {
                if current == CurrentKind::Directory {
                    if ctx.check_mode {
                        return Ok(ModuleResult::ok(format!("directory '{path}' already exists")));
                    }
                    let changed = Self::apply_mode_owner(ctx, &path, params).await?;
                    return Ok(if changed {
                        ModuleResult::changed(format!("updated attributes on '{path}'"))
                    } else {
                        ModuleResult::ok(format!("directory '{path}' already exists"))
                    });
                }
                if current != CurrentKind::Absent {
                    return Err(Error::config(format!("'{path}' exists and is not a directory")));
                }
                if ctx.check_mode {
                    return Ok(ModuleResult::changed(format!("would create directory '{path}'")));
                }
                ctx.exec(&format!("mkdir -p {quoted}")).await?;
                Self::apply_mode_owner(ctx, &path, params).await?;
                Ok(ModuleResult::changed(format!("created directory '{path}'")))
            }

            FileState::File => {
                if current == CurrentKind::File {
                    if ctx.check_mode {
                        return Ok(ModuleResult::ok(format!("file '{path}' already exists")));
                    }
                    let changed = Self::apply_mode_owner(ctx, &path, params).await?;
                    return Ok(if changed {
                        ModuleResult::changed(format!("updated attributes on '{path}'"))
                    } else {
                        ModuleResult::ok(format!("file '{path}' already exists"))
                    });
                }
                if current != CurrentKind::Absent {
                    return Err(Error::config(format!("'{path}' exists and is not a file")));
                }
                if ctx.check_mode {
                    return Ok(ModuleResult::changed(format!("would create file '{path}'")));
                }
                ctx.exec(&format!("touch {quoted}")).await?;
                Self::apply_mode_owner(ctx, &path, params).await?;
                Ok(ModuleResult::changed(format!("created file '{path}'")))
            }

            FileState::Link => {
                let src = params.get_string_required("src")?;
                let src_quoted = shell_words::quote(&src);

                if current == CurrentKind::Link {
                    let target = ctx.exec_safe(&format!("readlink {quoted}")).await.stdout.trim().to_string();
                    if target == src {
                        return Ok(ModuleResult::ok(format!("'{path}' already points to '{src}'")));
                    }
                }
                if current != CurrentKind::Absent && current != CurrentKind::Link && !force {
                    return Err(Error::config(format!(
                        "'{path}' already exists and is not a symlink (set force to overwrite)"
                    )));
                }
                if ctx.check_mode {
                    return Ok(ModuleResult::changed(format!("would link '{path}' -> '{src}'")));
                }
                ctx.exec(&format!("ln -sfn {src_quoted} {quoted}")).await?;
                Ok(ModuleResult::changed(format!("linked '{path}' -> '{src}'")))
            }

            FileState::Touch => {
                if ctx.check_mode {
                    return Ok(ModuleResult::changed(format!("would touch '{path}'")));
                }
                ctx.exec(&format!("touch {quoted}")).await?;
                Self::apply_mode_owner(ctx, &path, params).await?;
                Ok(ModuleResult::changed(format!("touched '{path}'")))
            }
        }
    }
}
