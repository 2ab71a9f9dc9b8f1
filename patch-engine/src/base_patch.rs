use common::config::ParameterSet;
use serde_yaml::Value;

use crate::{
    document::{mapping, Document},
    error::Result,
};

pub const MIRRORED_REGISTRY: &str = "docker.io";
pub const MIRROR_ENDPOINTS: [&str; 2] = ["https://dockerhub.timeweb.cloud", "https://mirror.gcr.io"];

/// Kernel modules for DRBD backed storage, followed by the optional ones in
/// a fixed order.
pub fn kernel_modules(params: &ParameterSet) -> Value {
    let mut modules = vec![
        mapping([
            ("name", Value::from("drbd")),
            ("parameters", Value::from(vec!["usermode_helper=disabled"])),
        ]),
        mapping([("name", "drbd_transport_tcp")]),
        mapping([("name", "dm-thin-pool")]),
    ];

    let optional = [
        (params.use_zfs, "zfs"),
        (params.use_spl, "spl"),
        (params.use_vfio_pci, "vfio_pci"),
        (params.use_vfio_iommu, "vfio_iommu_type1"),
        (params.use_ovs, "openvswitch"),
    ];
    modules.extend(
        optional
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, name)| mapping([("name", name)])),
    );
    Value::Sequence(modules)
}

/// The cluster-wide patch shared by every node (`patch.yaml`).
pub fn build_base_patch(params: &ParameterSet) -> Result<Document> {
    let mut doc = Document::new();

    doc.set(
        "machine.network.nameservers",
        vec![params.dns1.as_str(), params.dns2.as_str()],
    )?;
    doc.set("machine.install.disk", params.disk.as_str())?;
    doc.set("machine.install.image", params.image.as_str())?;
    doc.set(
        "machine.time.servers",
        vec![params.ntp1.as_str(), params.ntp2.as_str(), params.ntp3.as_str()],
    )?;

    if params.use_mirrors {
        let mut mirrors = serde_yaml::Mapping::new();
        mirrors.insert(
            Value::from(MIRRORED_REGISTRY),
            mapping([("endpoints", Value::from(MIRROR_ENDPOINTS.to_vec()))]),
        );
        doc.set("machine.registries.mirrors", mirrors)?;
    }

    let balancers = params.ext_balancer_addresses();
    if !balancers.is_empty() {
        doc.set("machine.certSANs", balancers.clone())?;
    }

    if params.use_drbd && params.worker_count == 0 {
        doc.set("machine.kernel.modules", kernel_modules(params))?;
    }

    if params.worker_count == 0 {
        doc.set("cluster.allowSchedulingOnControlPlanes", true)?;
    }
    doc.set("cluster.network.cni.name", "none")?;
    doc.set("cluster.proxy.disabled", true)?;

    let api_sans: Vec<String> = balancers.into_iter().filter(|x| !x.is_empty()).collect();
    if !api_sans.is_empty() {
        doc.set("cluster.apiServer.certSANs", api_sans)?;
    }

    Ok(doc)
}
