use std::fmt;

use common::config::ParameterSet;
use serde_yaml::Value;

use crate::{
    base_patch::kernel_modules,
    document::{mapping, render_stream, Document},
    error::Result,
    version::SchemaMode,
};

pub const DEFAULT_ROUTE: &str = "0.0.0.0/0";
pub const MAX_PODS: u64 = 512;

pub const INTERFACE_PATH: &str = "machine.network.interfaces.0";
pub const HOSTNAME_PATH: &str = "machine.network.hostname";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    ControlPlane,
    Worker,
}

impl NodeRole {
    /// Prefix shared by hostnames (`cp-1`) and file names (`cp1.patch`).
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeRole::ControlPlane => "cp",
            NodeRole::Worker => "worker",
        }
    }

    /// Role-wide machine config written by `talosctl gen config`.
    pub fn template_config(&self) -> &'static str {
        match self {
            NodeRole::ControlPlane => "controlplane.yaml",
            NodeRole::Worker => "worker.yaml",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::ControlPlane => write!(f, "control plane"),
            NodeRole::Worker => write!(f, "worker"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub role: NodeRole,
    /// 1-based.
    pub index: usize,
    pub address: String,
}

impl NodeRecord {
    pub fn new(role: NodeRole, index: usize, address: impl Into<String>) -> Self {
        Self {
            role,
            index,
            address: address.into(),
        }
    }

    pub fn hostname(&self) -> String {
        format!("{}-{}", self.role.prefix(), self.index)
    }
}

/// A node's patch file: the machine document plus, under the modern
/// schema, a sibling `HostnameConfig` document.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePatch {
    pub machine: Document,
    pub hostname: Option<Document>,
}

impl NodePatch {
    pub fn documents(&self) -> Vec<&Document> {
        let mut docs = vec![&self.machine];
        if let Some(hostname) = &self.hostname {
            docs.push(hostname);
        }
        docs
    }

    pub fn render(&self) -> Result<String> {
        render_stream(&self.documents())
    }

    /// Puts `hostname` where `mode` expects it, removing it from the other
    /// place.
    pub(crate) fn place_hostname(
        mut machine: Document,
        hostname: &str,
        mode: SchemaMode,
    ) -> Result<NodePatch> {
        match mode {
            SchemaMode::Legacy => {
                machine.set(HOSTNAME_PATH, hostname)?;
                Ok(NodePatch {
                    machine,
                    hostname: None,
                })
            }
            SchemaMode::Modern => {
                machine.remove(HOSTNAME_PATH)?;
                Ok(NodePatch {
                    machine,
                    hostname: Some(hostname_config(hostname)),
                })
            }
        }
    }
}

pub fn hostname_config(hostname: &str) -> Document {
    Document::from_value(mapping([
        ("apiVersion", "v1alpha1"),
        ("kind", "HostnameConfig"),
        ("hostname", hostname),
    ]))
}

fn interface(params: &ParameterSet, record: &NodeRecord) -> Value {
    let selector = match record.role {
        NodeRole::ControlPlane => ("interface", Value::from(params.iface.as_str())),
        // workers are assumed to be identical hardware
        NodeRole::Worker => ("deviceSelector", mapping([("physical", true)])),
    };
    let mut iface = mapping([
        selector,
        ("dhcp", Value::Bool(false)),
        (
            "addresses",
            Value::from(vec![format!("{}/{}", record.address, params.netmask)]),
        ),
        (
            "routes",
            Value::Sequence(vec![mapping([
                ("network", DEFAULT_ROUTE),
                ("gateway", params.gateway.as_str()),
            ])]),
        ),
    ]);

    if record.role == NodeRole::ControlPlane {
        if let (Some(vip), Value::Mapping(map)) = (params.vip(), &mut iface) {
            map.insert(Value::from("vip"), mapping([("ip", vip)]));
        }
    }
    iface
}

pub fn build_node_patch(params: &ParameterSet, record: &NodeRecord, mode: SchemaMode) -> Result<NodePatch> {
    let mut machine = Document::new();
    machine.set(
        "machine.network.interfaces",
        Value::Sequence(vec![interface(params, record)]),
    )?;

    match record.role {
        NodeRole::ControlPlane => {
            if params.use_max_pods {
                machine.set("machine.kubelet.extraConfig.maxPods", MAX_PODS)?;
            }
        }
        NodeRole::Worker => {
            if params.use_drbd {
                machine.set("machine.kernel.modules", kernel_modules(params))?;
            }
        }
    }

    NodePatch::place_hostname(machine, &record.hostname(), mode)
}
