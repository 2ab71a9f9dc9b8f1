use std::{fs, path::Path};

use common::config::ParameterSet;
use tracing::{info, warn};

use crate::error::Result;

pub const ENDPOINTS_MARKER: &str = "endpoints: []";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointOutcome {
    Patched,
    MarkerNotFound,
    FileMissing,
}

/// Control plane addresses, then the VIP, then balancer addresses.
pub fn collect_endpoints(params: &ParameterSet, cp_ips: &[String]) -> Vec<String> {
    let mut endpoints: Vec<String> = cp_ips.iter().map(|x| x.trim().to_owned()).collect();
    if let Some(vip) = params.vip() {
        endpoints.push(vip.trim().to_owned());
    }
    endpoints.extend(params.ext_balancer_addresses());
    endpoints
}

/// Replaces the marker on the first line that has it. Returns `None` when
/// no line does, leaving the caller's lines untouched.
pub fn substitute_endpoints<S: AsRef<str>>(lines: &[S], endpoints: &[String]) -> Option<Vec<String>> {
    let target = lines.iter().position(|l| l.as_ref().contains(ENDPOINTS_MARKER))?;
    let replacement = format!("endpoints: [{}]", endpoints.join(", "));
    Some(
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| {
                if i == target {
                    l.as_ref().replacen(ENDPOINTS_MARKER, &replacement, 1)
                } else {
                    l.as_ref().to_owned()
                }
            })
            .collect(),
    )
}

/// Rewrites the `talosconfig` endpoint list in place. A missing file or
/// marker is reported through the outcome and logged, never an error.
pub fn patch_credentials_file(path: &Path, endpoints: &[String]) -> Result<EndpointOutcome> {
    if !path.exists() {
        warn!("File {} not found, endpoints not set", path.display());
        return Ok(EndpointOutcome::FileMissing);
    }

    let contents = fs::read_to_string(path)?;
    let lines: Vec<&str> = contents.lines().collect();
    let Some(patched) = substitute_endpoints(&lines, endpoints) else {
        warn!(
            "No `{ENDPOINTS_MARKER}` line in {}, endpoints not set",
            path.display()
        );
        return Ok(EndpointOutcome::MarkerNotFound);
    };

    let mut out = patched.join("\n");
    out.push('\n');
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, out)?;
    fs::rename(&tmp, path)?;
    info!(
        "Updated {} with endpoints: [{}]",
        path.display(),
        endpoints.join(", ")
    );
    Ok(EndpointOutcome::Patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_patch::tests::params;

    fn ips(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn replaces_marker_line() {
        let out = substitute_endpoints(&["a", "endpoints: []", "b"], &ips(&["10.0.0.1", "10.0.0.2"]));
        assert_eq!(
            out,
            Some(ips(&["a", "endpoints: [10.0.0.1, 10.0.0.2]", "b"]))
        );
    }

    #[test]
    fn only_first_marker_is_replaced() {
        let out = substitute_endpoints(
            &["    endpoints: []", "    endpoints: []"],
            &ips(&["10.0.0.1"]),
        )
        .unwrap();
        assert_eq!(out, ips(&["    endpoints: [10.0.0.1]", "    endpoints: []"]));
    }

    #[test]
    fn missing_marker_is_reported() {
        assert_eq!(
            substitute_endpoints(&["a", "endpoints: [10.0.0.9]"], &ips(&["10.0.0.1"])),
            None
        );
    }

    #[test]
    fn endpoints_order_is_cps_vip_balancers() {
        let mut p = params();
        p.use_vip = true;
        p.vip_ip = "10.0.0.50".into();
        p.use_ext_balancer = true;
        p.ext_balancer_ip = "1.1.1.1, 2.2.2.2".into();
        assert_eq!(
            collect_endpoints(&p, &ips(&["10.0.0.11", " 10.0.0.12"])),
            ips(&["10.0.0.11", "10.0.0.12", "10.0.0.50", "1.1.1.1", "2.2.2.2"])
        );
    }

    #[test]
    fn patches_file_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("talosconfig");
        fs::write(
            &path,
            "context: demo\ncontexts:\n    demo:\n        endpoints: []\n        ca: abc\n",
        )
        .unwrap();

        let outcome = patch_credentials_file(&path, &ips(&["10.0.0.11", "10.0.0.50"])).unwrap();
        assert_eq!(outcome, EndpointOutcome::Patched);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "context: demo\ncontexts:\n    demo:\n        endpoints: [10.0.0.11, 10.0.0.50]\n        ca: abc\n"
        );
        assert!(!tmp.path().join("talosconfig.tmp").exists());

        // second run finds no empty list and leaves the file alone
        let before = fs::read_to_string(&path).unwrap();
        assert_eq!(
            patch_credentials_file(&path, &ips(&["10.9.9.9"])).unwrap(),
            EndpointOutcome::MarkerNotFound
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(
            patch_credentials_file(&tmp.path().join("talosconfig"), &[]).unwrap(),
            EndpointOutcome::FileMissing
        );
    }
}
