use std::{collections::HashMap, path::Path};

use anyhow::Result;
use common::{
    command::command,
    provider::{Provisioner, ToolStep, TALOSCTL},
};
use tracing::debug;

/// Runs steps with the `talosctl` binary found on `PATH`.
pub struct Talosctl {
    pub verbose: bool,
}

impl Talosctl {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait::async_trait]
impl Provisioner for Talosctl {
    async fn run(&self, step: &ToolStep, dir: &Path) -> Result<()> {
        let args = step.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let [ongoing, failed, done] = step.messages();
        debug!("{}", step.command_line());

        command(
            TALOSCTL,
            &args,
            self.verbose,
            [ongoing.as_str(), failed.as_str(), done.as_str()],
            dir,
            HashMap::<String, String>::new(),
        )
        .await
    }

    fn name(&self) -> String {
        TALOSCTL.to_owned()
    }
}
