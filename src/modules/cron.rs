//! `cron`: manage a named entry in a user's crontab, identified by a
//! `KATMER_CRON_NAME=<name>` marker comment placed on the line above the
//! schedule so the entry can be found and rewritten idempotently.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

fn marker(name: &str) -> String {
    format!("#KATMER_CRON_NAME={name}")
}

fn render_entry(name: &str, schedule: &str, job: &str, disabled: bool) -> String {
    let prefix = if disabled { "#" } else { "" };
    format!("{}\n{prefix}{schedule} {job}", marker(name))
}

fn schedule_from(params: &ModuleParams) -> String {
    if let Some(special) = params.get_string("special_time") {
        return format!("@{special}");
    }
    let field = |key: &str| params.get_string(key).unwrap_or_else(|| "*".to_string());
    format!(
        "{} {} {} {} {}",
        field("minute"),
        field("hour"),
        field("day"),
        field("month"),
        field("weekday"),
    )
}

/// Strips an existing `name`'s marker + entry lines out of `crontab`, returning
/// the remainder and whether anything was removed.
fn strip_entry(crontab: &str, name: &str) -> (String, bool) {
    let needle = marker(name);
    let lines: Vec<&str> = crontab.lines().collect();
    let mut kept = Vec::new();
    let mut i = 0;
    let mut removed = false;
    while i < lines.len() {
        if lines[i].trim() == needle {
            removed = true;
            i += 2; // marker line + schedule line
            continue;
        }
        kept.push(lines[i]);
        i += 1;
    }
    (kept.join("\n"), removed)
}

async fn read_crontab(ctx: &TaskContext, user: Option<&str>) -> String {
    let cmd = match user {
        Some(u) => format!("crontab -l -u {} 2>/dev/null || true", shell_words::quote(u)),
        None => "crontab -l 2>/dev/null || true".to_string(),
    };
    ctx.exec_safe(&cmd).await.stdout
}

async fn write_crontab(ctx: &TaskContext, user: Option<&str>, content: &str) -> Result<()> {
    let user_flag = user.map(|u| format!("-u {}", shell_words::quote(u))).unwrap_or_default();
    let script = format!("crontab {user_flag} << 'KATMER_CRON_EOF'\n{}\nKATMER_CRON_EOF", content.trim_end());
    let result = ctx.exec(&script).await?;
    if !result.is_success() {
        return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
    }
    Ok(())
}

pub struct CronModule;

#[async_trait]
impl super::Module for CronModule {
    fn name(&self) -> &'static str {
        "cron"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        params.get_string_required("name")?;
        let state = params.get_string("state").unwrap_or_else(|| "present".to_string());
        if state != "present" && state != "absent" {
            return Err(Error::config(format!("cron: invalid state '{state}'")));
        }
        if state == "present" && params.get_string("job").is_none() {
            return Err(Error::config("cron: 'job' is required when state is present"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let name = params.get_string_required("name")?;
        let user = params.get_string("user");
        let state = params.get_string("state").unwrap_or_else(|| "present".to_string());

        let crontab = read_crontab(ctx, user.as_deref()).await;
        let (stripped, had_entry) = strip_entry(&crontab, &name);

        if state == "absent" {
            if !had_entry {
                return Ok(ModuleResult::ok(format!("cron entry '{name}' already absent")));
            }
            if ctx.check_mode {
                return Ok(ModuleResult::changed(format!("would remove cron entry '{name}'")));
            }
            write_crontab(ctx, user.as_deref(), &stripped).await?;
            return Ok(ModuleResult::changed(format!("removed cron entry '{name}'")));
        }

        let job = params.get_string_required("job")?;
        let schedule = schedule_from(params);
        let disabled = params.get_bool_or("disabled", false);
        let new_entry = render_entry(&name, &schedule, &job, disabled);

        let existing_entry = crontab
            .lines()
            .collect::<Vec<_>>()
            .windows(2)
            .find(|w| w[0].trim() == marker(&name))
            .map(|w| format!("{}\n{}", w[0], w[1]));

        if existing_entry.as_deref() == Some(new_entry.as_str()) {
            return Ok(ModuleResult::ok(format!("cron entry '{name}' already up to date")));
        }

        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!("would update cron entry '{name}'")));
        }

        let updated = if stripped.trim().is_empty() {
            new_entry
        } else {
            format!("{stripped}\n{new_entry}")
        };
        write_crontab(ctx, user.as_deref(), &updated).await?;

        let verb = if had_entry { "updated" } else { "added" };
        Ok(ModuleResult::changed(format!("{verb} cron entry '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_entry_removes_marker_and_schedule_line() {
        let crontab = "#KATMER_CRON_NAME=backup\n0 2 * * * /usr/bin/backup.sh\n";
        let (remaining, removed) = strip_entry(crontab, "backup");
        assert!(removed);
        assert!(remaining.is_empty());
    }

    #[test]
    fn schedule_from_prefers_special_time() {
        let mut params = ModuleParams::new();
        params.insert("special_time".to_string(), serde_json::json!("daily"));
        assert_eq!(schedule_from(&params), "@daily");
    }
}
