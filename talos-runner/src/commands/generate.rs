use anyhow::Result;
use common::{
    command::{GREEN_TICK, YELLOW_WARN},
    config::parse_cluster_file,
};
use patch_engine::{endpoints::EndpointOutcome, layout::COMMANDS};
use talosctl::Talosctl;

use super::{failed, print_transcript};
use crate::args::{Cli, GenerateArgs};

pub async fn generate(cli: &Cli, args: &GenerateArgs) -> Result<()> {
    let run = cli.run_config();
    let cluster = parse_cluster_file(&args.file)?;
    let talosctl = Talosctl::new(run.verbose);

    let report = match patch_engine::generate::generate(&run, &cluster, args.force, &talosctl).await {
        Ok(r) => r,
        Err(err) => return failed(err, "Cluster generation"),
    };

    println!(
        "{} Wrote {} patches to {} ({:?} hostname format)",
        GREEN_TICK.to_string(),
        report.written.len(),
        run.config_dir.display(),
        report.mode
    );
    match report.endpoint_outcome {
        EndpointOutcome::Patched => println!(
            "{} talosconfig endpoints: [{}]",
            GREEN_TICK.to_string(),
            report.endpoints.join(", ")
        ),
        EndpointOutcome::MarkerNotFound | EndpointOutcome::FileMissing => println!(
            "{} talosconfig endpoints were not set, add them by hand: [{}]",
            YELLOW_WARN.to_string(),
            report.endpoints.join(", ")
        ),
    }

    for conflict in &report.address_conflicts {
        println!("{} {conflict}", YELLOW_WARN.to_string());
    }

    print_transcript(&report.transcript);
    println!(
        "\nRun these from {}, they are saved in {}",
        run.config_dir.display(),
        run.config_dir.join(COMMANDS).display()
    );
    Ok(())
}
