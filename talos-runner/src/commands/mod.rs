use anyhow::Result;
use common::{
    command::{RED_CROSS, YELLOW_WARN},
    exit,
};
use console::style;
use patch_engine::{transcript::ManualTranscript, PatchError};

pub mod add;
pub mod generate;

pub fn print_transcript(transcript: &ManualTranscript) {
    println!("\n{}", style(&transcript.title).bold());
    print!("{transcript}");
}

/// Shows what is left to run by hand, if anything, then fails.
fn failed(err: PatchError, what: &str) -> Result<()> {
    if let Some(transcript) = err.transcript() {
        eprintln!(
            "{} {} failed, finish by hand:",
            YELLOW_WARN.to_string(),
            what
        );
        print_transcript(transcript);
    }
    exit!(err, "{} {}", RED_CROSS.to_string(), what)
}
