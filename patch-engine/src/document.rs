use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{PatchError, Result};

/// An ordered YAML tree. Paths are dot separated; numeric segments index
/// into sequences, so `machine.network.interfaces.0.addresses.0` is the
/// first address of the first interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Default for Document {
    fn default() -> Self {
        Document(Value::Mapping(Mapping::new()))
    }
}

fn step<'a>(node: &'a Value, seg: &str) -> Option<&'a Value> {
    match node {
        Value::Mapping(map) => map.get(seg),
        Value::Sequence(seq) => seg.parse::<usize>().ok().and_then(|i| seq.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(node: &'a mut Value, seg: &str) -> Option<&'a mut Value> {
    match node {
        Value::Mapping(map) => map.get_mut(seg),
        Value::Sequence(seq) => seg.parse::<usize>().ok().and_then(|i| seq.get_mut(i)),
        _ => None,
    }
}

fn split_parent(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((parent, key)) => (Some(parent), key),
        None => (None, path),
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Self {
        Document(value)
    }

    /// Parses the first YAML document of `text`. Any further documents
    /// (e.g. a trailing `HostnameConfig`) are ignored.
    pub fn parse(text: &str) -> Result<Document> {
        let first = match serde_yaml::Deserializer::from_str(text).next() {
            Some(de) => de,
            None => return Err(PatchError::mismatch("", "a YAML document")),
        };
        let value = Value::deserialize(first)?;
        if !value.is_mapping() {
            return Err(PatchError::mismatch("", "mapping"));
        }
        Ok(Document(value))
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut node = &self.0;
        for seg in path.split('.') {
            node = step(node, seg)?;
        }
        Some(node)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Like [`Document::get`] but a missing node is a structural mismatch.
    pub fn value(&self, path: &str) -> Result<&Value> {
        self.get(path)
            .ok_or_else(|| PatchError::mismatch(path, "an existing node"))
    }

    pub fn value_mut(&mut self, path: &str) -> Result<&mut Value> {
        let mut node = &mut self.0;
        for seg in path.split('.') {
            node = step_mut(node, seg).ok_or_else(|| PatchError::mismatch(path, "an existing node"))?;
        }
        Ok(node)
    }

    pub fn str_at(&self, path: &str) -> Result<&str> {
        self.value(path)?
            .as_str()
            .ok_or_else(|| PatchError::mismatch(path, "string"))
    }

    pub fn sequence(&self, path: &str) -> Result<&Vec<Value>> {
        self.value(path)?
            .as_sequence()
            .ok_or_else(|| PatchError::mismatch(path, "sequence"))
    }

    pub fn mapping_mut(&mut self, path: &str) -> Result<&mut Mapping> {
        match self.value_mut(path)? {
            Value::Mapping(map) => Ok(map),
            _ => Err(PatchError::mismatch(path, "mapping")),
        }
    }

    /// Sets `path` to `value`, creating missing intermediate mappings.
    /// Walking through an existing scalar is a structural mismatch.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let (parent, key) = split_parent(path);
        let mut node = &mut self.0;
        if let Some(parent) = parent {
            for seg in parent.split('.') {
                node = match node {
                    Value::Mapping(map) => map
                        .entry(Value::from(seg))
                        .or_insert_with(|| Value::Mapping(Mapping::new())),
                    Value::Sequence(seq) => seg
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| seq.get_mut(i))
                        .ok_or_else(|| PatchError::mismatch(path, "an existing sequence item"))?,
                    _ => return Err(PatchError::mismatch(path, "mapping")),
                };
            }
        }

        match node {
            Value::Mapping(map) => {
                map.insert(Value::from(key), value.into());
                Ok(())
            }
            Value::Sequence(seq) => {
                let slot = key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| seq.get_mut(i))
                    .ok_or_else(|| PatchError::mismatch(path, "an existing sequence item"))?;
                *slot = value.into();
                Ok(())
            }
            _ => Err(PatchError::mismatch(path, "mapping")),
        }
    }

    /// Removes a mapping key. The parent has to exist and be a mapping; a
    /// missing key is not an error.
    pub fn remove(&mut self, path: &str) -> Result<Option<Value>> {
        let (parent, key) = split_parent(path);
        let map = match parent {
            Some(parent) => self.mapping_mut(parent)?,
            None => match &mut self.0 {
                Value::Mapping(map) => map,
                _ => return Err(PatchError::mismatch("", "mapping")),
            },
        };
        Ok(map.remove(key))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

/// Builds a mapping from `(key, value)` pairs, keeping their order.
pub fn mapping<I, V>(entries: I) -> Value
where
    I: IntoIterator<Item = (&'static str, V)>,
    V: Into<Value>,
{
    let mut map = Mapping::new();
    for (k, v) in entries {
        map.insert(Value::from(k), v.into());
    }
    Value::Mapping(map)
}

/// Concatenates documents into one YAML stream separated by `---`.
pub fn render_stream(documents: &[&Document]) -> Result<String> {
    let mut out = String::new();
    for (i, doc) in documents.iter().enumerate() {
        if i > 0 {
            out.push_str("---\n");
        }
        out.push_str(&doc.to_yaml()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: &str = r#"
machine:
  network:
    hostname: cp-1
    interfaces:
      - interface: ens18
        dhcp: false
        addresses: [10.0.0.1/24]
---
apiVersion: v1alpha1
kind: HostnameConfig
hostname: cp-1
"#;

    #[test]
    fn parse_keeps_only_first_document() {
        let doc = Document::parse(NODE).unwrap();
        assert!(doc.contains("machine.network.interfaces"));
        assert!(!doc.contains("kind"));
    }

    #[test]
    fn walks_sequences_by_index() {
        let doc = Document::parse(NODE).unwrap();
        assert_eq!(
            doc.str_at("machine.network.interfaces.0.addresses.0").unwrap(),
            "10.0.0.1/24"
        );
        assert!(doc.get("machine.network.interfaces.1").is_none());
    }

    #[test]
    fn typed_accessors_report_the_failing_path() {
        let doc = Document::parse(NODE).unwrap();
        let err = doc.str_at("machine.network.interfaces").unwrap_err();
        match err {
            PatchError::StructuralMismatch { path, expected } => {
                assert_eq!(path, "machine.network.interfaces");
                assert_eq!(expected, "string");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            doc.value("machine.install.image"),
            Err(PatchError::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn set_creates_intermediate_mappings() {
        let mut doc = Document::new();
        doc.set("cluster.proxy.disabled", true).unwrap();
        doc.set("cluster.network.cni.name", "none").unwrap();
        assert_eq!(doc.get("cluster.proxy.disabled"), Some(&Value::Bool(true)));
        assert_eq!(doc.str_at("cluster.network.cni.name").unwrap(), "none");
    }

    #[test]
    fn set_through_scalar_is_a_mismatch() {
        let mut doc = Document::new();
        doc.set("machine", "flat").unwrap();
        assert!(matches!(
            doc.set("machine.network.hostname", "cp-1"),
            Err(PatchError::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn set_and_remove_inside_sequence_items() {
        let mut doc = Document::parse(NODE).unwrap();
        doc.set("machine.network.interfaces.0.addresses.0", "10.0.0.9/24")
            .unwrap();
        doc.set("machine.network.interfaces.0.vip.ip", "10.0.0.50")
            .unwrap();
        assert_eq!(
            doc.str_at("machine.network.interfaces.0.addresses.0").unwrap(),
            "10.0.0.9/24"
        );
        assert_eq!(
            doc.str_at("machine.network.interfaces.0.vip.ip").unwrap(),
            "10.0.0.50"
        );

        let removed = doc.remove("machine.network.hostname").unwrap();
        assert_eq!(removed, Some(Value::from("cp-1")));
        assert_eq!(doc.remove("machine.network.hostname").unwrap(), None);
    }

    #[test]
    fn stream_separates_documents() {
        let a = Document::from_value(mapping([("a", 1)]));
        let b = Document::from_value(mapping([("b", 2)]));
        assert_eq!(render_stream(&[&a, &b]).unwrap(), "a: 1\n---\nb: 2\n");
    }
}
