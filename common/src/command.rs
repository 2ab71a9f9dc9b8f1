use std::{
    collections::HashMap,
    path::Path,
    process::Stdio,
    time::{Duration, Instant},
};

use anyhow::Result;
use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::process::Command;

use crate::exit;

lazy_static::lazy_static! {
    static ref DOTS_STYLE: ProgressStyle = ProgressStyle::with_template("{spinner} {msg} {elapsed_precise}").unwrap().tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pub static ref GREEN_TICK: StyledObject<&'static str> = style("✔").green();
    pub static ref RED_CROSS: StyledObject<&'static str> = style("✗").red();
    pub static ref YELLOW_WARN: StyledObject<&'static str> = style("!").yellow();
}

pub fn progress(msg: &str) -> ProgressBar {
    let w = ProgressBar::new_spinner();
    w.set_style(DOTS_STYLE.clone());
    w.enable_steady_tick(Duration::from_millis(80));
    w.set_message(msg.to_owned());
    w
}

/// Renders `cmd args...` the way an operator would type it, quoting arguments
/// that contain whitespace.
pub fn command_line(cmd: &str, args: &[impl AsRef<str>]) -> String {
    let mut line = cmd.to_owned();
    for arg in args {
        let arg = arg.as_ref();
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push_str(&format!("'{arg}'"));
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Runs `cmd` inside `dir` and waits for it. In non-verbose mode the child's
/// stdout is captured behind a spinner and only surfaced when it fails.
pub async fn command(
    cmd: &str,
    args: &[&str],
    verbose: bool,
    msgs: [&str; 3],
    dir: &Path,
    env: HashMap<
        impl AsRef<str> + std::convert::AsRef<std::ffi::OsStr>,
        impl AsRef<str> + std::convert::AsRef<std::ffi::OsStr>,
    >,
) -> Result<()> {
    tracing::info!("{cmd} {args:?} in {}", dir.display());
    let mut cmd = Command::new(cmd);
    let mut _cmd = cmd.current_dir(dir).args(args);

    env.iter().for_each(|(k, v)| {
        _cmd.env(k, v);
    });

    let mut pb = None;
    if !verbose {
        _cmd = _cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        pb = Some(progress(msgs[0]));
    }

    let start_time = Instant::now();
    let cmd_spawn = _cmd.spawn()?;
    let output = cmd_spawn.wait_with_output().await?;
    let dur = start_time.elapsed();
    if !output.status.success() {
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        exit!(
            format!("{} ({})", msgs[1], captured.trim()),
            "{} {}",
            RED_CROSS.to_string(),
            msgs[1]
        );
    }

    finish_progress(msgs[2], &dir.display().to_string(), dur, pb);
    Ok(())
}

fn elapsed_time_str(dur: &Duration) -> String {
    let seconds = dur.as_secs() % 60;
    let minutes = (dur.as_secs() / 60) % 60;
    let hours = (dur.as_secs() / 60) / 60;
    format!("{:0>2}:{:0>2}:{:0>2}", hours, minutes, seconds)
}

pub fn finish_progress(
    status_message: &str,
    context: &str,
    dur: Duration,
    pb: Option<ProgressBar>,
) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    println!(
        "{} {} ({}) took, {}",
        GREEN_TICK.to_string(),
        status_message,
        context,
        elapsed_time_str(&dur)
    );
}
