//! `gather_facts`: probe the target's OS, architecture, and current user,
//! then fold the results into a `facts` variable on the task's scope for
//! later tasks to read.

use async_trait::async_trait;

use crate::error::Result;
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult};

pub struct GatherFactsModule;

#[async_trait]
impl super::Module for GatherFactsModule {
    fn name(&self) -> &'static str {
        "gather_facts"
    }

    async fn execute(&self, ctx: &TaskContext, _params: &ModuleParams) -> Result<ModuleResult> {
        let os = ctx.os_info().await;
        let hostname = ctx.exec_safe("hostname").await.stdout.trim().to_string();
        let whoami = ctx.exec_safe("id -un").await.stdout.trim().to_string();
        let uid = ctx.exec_safe("id -u").await.stdout.trim().to_string();

        let facts = serde_json::json!({
            "family": os.family.as_str(),
            "arch": os.arch.as_str(),
            "kernel": os.kernel,
            "distro_id": os.distro_id,
            "version_id": os.version_id,
            "hostname": hostname,
            "user": whoami,
            "uid": uid,
        });

        ctx.set_variable("facts", facts.clone());

        Ok(ModuleResult::ok(format!("gathered facts for '{hostname}'")).with_data("facts", facts))
    }
}
