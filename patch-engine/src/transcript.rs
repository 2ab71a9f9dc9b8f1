use std::{fmt, fs, path::Path};

use common::provider::{Provisioner, ToolStep};
use tracing::warn;

use crate::{
    error::{PatchError, Result},
    layout::COMMANDS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptLine {
    Step(ToolStep),
    Note(String),
}

/// Commands the operator runs by hand, in order, from inside the config
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualTranscript {
    pub title: String,
    pub lines: Vec<TranscriptLine>,
}

impl ManualTranscript {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn step(&mut self, step: ToolStep) -> &mut Self {
        self.lines.push(TranscriptLine::Step(step));
        self
    }

    pub fn note(&mut self, note: impl Into<String>) -> &mut Self {
        self.lines.push(TranscriptLine::Note(note.into()));
        self
    }

    pub fn steps(&self) -> impl Iterator<Item = &ToolStep> {
        self.lines.iter().filter_map(|l| match l {
            TranscriptLine::Step(s) => Some(s),
            TranscriptLine::Note(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n```sh\n", self.title);
        for line in &self.lines {
            match line {
                TranscriptLine::Step(step) => out.push_str(&step.command_line()),
                TranscriptLine::Note(note) => {
                    out.push_str("# ");
                    out.push_str(note);
                }
            }
            out.push('\n');
        }
        out.push_str("```\n");
        out
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_markdown())?;
        Ok(())
    }
}

impl fmt::Display for ManualTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                TranscriptLine::Step(step) => writeln!(f, "{}", step.command_line())?,
                TranscriptLine::Note(note) => writeln!(f, "# {note}")?,
            }
        }
        Ok(())
    }
}

/// Runs `steps` in order inside `dir`. When one fails, the failed step,
/// everything after it and `then` become the recovery transcript, which is
/// written to `commands.md` and returned inside the error.
pub(crate) async fn run_or_transcribe(
    provisioner: &dyn Provisioner,
    dir: &Path,
    steps: &[ToolStep],
    then: &ManualTranscript,
) -> Result<()> {
    for (i, step) in steps.iter().enumerate() {
        if let Err(err) = provisioner.run(step, dir).await {
            let mut transcript = ManualTranscript::new("Manual recovery commands");
            transcript.note(format!(
                "{} failed, run the remaining commands from {}",
                provisioner.name(),
                dir.display()
            ));
            for remaining in &steps[i..] {
                transcript.step(remaining.clone());
            }
            transcript.lines.extend(then.lines.iter().cloned());

            let path = dir.join(COMMANDS);
            if let Err(persist_err) = transcript.persist(&path) {
                warn!("Failed to save {}: {persist_err}", path.display());
            }
            return Err(PatchError::ExternalTool {
                step: step.command_line(),
                reason: format!("{err:#}"),
                transcript,
            });
        }
    }
    Ok(())
}
