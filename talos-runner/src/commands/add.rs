use anyhow::Result;
use common::command::GREEN_TICK;
use patch_engine::appender::{append_node, AppendRequest};
use talosctl::Talosctl;

use super::failed;
use crate::args::{AddArgs, Cli};

pub async fn add(cli: &Cli, args: &AddArgs) -> Result<()> {
    let run = cli.run_config();
    let (role, index) = args.role_and_index();
    let request = AppendRequest {
        role,
        index,
        address: args.address.clone(),
        auto_apply: args.auto_apply,
    };

    let outcome = match append_node(&run, &request, &Talosctl::new(run.verbose)).await {
        Ok(o) => o,
        Err(err) => return failed(err, &format!("Adding {role} {index}")),
    };

    println!(
        "{} Created {} and {}",
        GREEN_TICK.to_string(),
        outcome.patch_file.display(),
        outcome.config_file.display()
    );
    if outcome.applied {
        println!(
            "{} Applied config to {}",
            GREEN_TICK.to_string(),
            args.address.trim()
        );
    } else {
        println!(
            "To apply it, run from {}:\n{}",
            run.config_dir.display(),
            outcome.apply_step.command_line()
        );
    }
    Ok(())
}
