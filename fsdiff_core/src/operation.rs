//! The operation tree: typed patch steps produced by the diff engine.

use std::fmt;
use std::time::SystemTime;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::explain::rfc3339;
use crate::tree::EntryKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    CreateFile,
    RemoveFile,
    ChangeFile,
    CreateDir,
    RemoveDir,
    ChangeDir,
    CreateLink,
    RemoveLink,
    Noop,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operand::CreateFile => "CreateFile",
            Operand::RemoveFile => "RemoveFile",
            Operand::ChangeFile => "ChangeFile",
            Operand::CreateDir => "CreateDir",
            Operand::RemoveDir => "RemoveDir",
            Operand::ChangeDir => "ChangeDir",
            Operand::CreateLink => "CreateLink",
            Operand::RemoveLink => "RemoveLink",
            Operand::Noop => "Noop",
        };
        f.write_str(name)
    }
}

/// Classifies why a change operation exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonKind {
    TypeChanged,
    ModeChanged,
    ContentChanged,
    SizeChanged,
    MTimeChanged,
    Missing,
    /// A comparison could not be performed soundly (missing checksum,
    /// algorithm mismatch, incompatible exclude sets).
    Because,
}

impl fmt::Display for ReasonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReasonKind::TypeChanged => "TypeChanged",
            ReasonKind::ModeChanged => "ModeChanged",
            ReasonKind::ContentChanged => "ContentChanged",
            ReasonKind::SizeChanged => "SizeChanged",
            ReasonKind::MTimeChanged => "MTimeChanged",
            ReasonKind::Missing => "Missing",
            ReasonKind::Because => "Because",
        };
        f.write_str(name)
    }
}

/// Compact stand-in for file content that is too large to inline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentSummary {
    pub size: u64,
    pub digest_prefix: Option<String>,
    pub algorithm: Option<String>,
}

/// A before/after witness carried by a [`Reason`].
#[derive(Debug, Clone, PartialEq)]
pub enum Witness {
    None,
    Bytes(Vec<u8>),
    Text(String),
    Mode(u32),
    Int(i64),
    Time(SystemTime),
    Summary(ContentSummary),
    Kind(EntryKind),
    Globs(Vec<String>),
}

impl Witness {
    /// Content length when the witness carries one.
    pub fn len(&self) -> Option<u64> {
        match self {
            Witness::Bytes(bytes) => Some(bytes.len() as u64),
            Witness::Text(text) => Some(text.len() as u64),
            Witness::Summary(summary) => Some(summary.size),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reason {
    pub kind: ReasonKind,
    pub before: Witness,
    pub after: Witness,
}

impl Reason {
    pub fn new(kind: ReasonKind, before: Witness, after: Witness) -> Self {
        Reason {
            kind,
            before,
            after,
        }
    }

    pub fn because(before: Witness, after: Witness) -> Self {
        Reason::new(ReasonKind::Because, before, after)
    }

    pub fn type_changed(before: EntryKind, after: EntryKind) -> Self {
        Reason::new(
            ReasonKind::TypeChanged,
            Witness::Kind(before),
            Witness::Kind(after),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirValue {
    pub operations: Vec<Operation>,
    pub reason: Option<Reason>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileChangedValue {
    pub reason: Reason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkValue {
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Dir(DirValue),
    FileChanged(FileChangedValue),
    Link(LinkValue),
}

/// One step of the patch. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub relative_path: String,
    pub operand: Operand,
    pub value: Value,
    /// Set on remove/create pairs that stand in for a change, e.g. a kind
    /// mismatch or a retargeted symlink.
    pub reason: Option<Reason>,
}

impl Operation {
    pub fn noop() -> Self {
        Operation {
            relative_path: String::new(),
            operand: Operand::Noop,
            value: Value::None,
            reason: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.operand == Operand::Noop
    }

    pub fn create_file(relative_path: &str) -> Self {
        Operation {
            relative_path: relative_path.to_string(),
            operand: Operand::CreateFile,
            value: Value::None,
            reason: None,
        }
    }

    pub fn remove_file(relative_path: &str) -> Self {
        Operation {
            relative_path: relative_path.to_string(),
            operand: Operand::RemoveFile,
            value: Value::None,
            reason: None,
        }
    }

    pub fn change_file(relative_path: &str, reason: Reason) -> Self {
        Operation {
            relative_path: relative_path.to_string(),
            operand: Operand::ChangeFile,
            value: Value::FileChanged(FileChangedValue { reason }),
            reason: None,
        }
    }

    pub fn create_dir(relative_path: &str, operations: Vec<Operation>) -> Self {
        Operation {
            relative_path: relative_path.to_string(),
            operand: Operand::CreateDir,
            value: Value::Dir(DirValue {
                operations,
                reason: None,
            }),
            reason: None,
        }
    }

    pub fn remove_dir(relative_path: &str, operations: Vec<Operation>) -> Self {
        Operation {
            relative_path: relative_path.to_string(),
            operand: Operand::RemoveDir,
            value: Value::Dir(DirValue {
                operations,
                reason: None,
            }),
            reason: None,
        }
    }

    pub fn change_dir(relative_path: &str, operations: Vec<Operation>) -> Self {
        Operation {
            relative_path: relative_path.to_string(),
            operand: Operand::ChangeDir,
            value: Value::Dir(DirValue {
                operations,
                reason: None,
            }),
            reason: None,
        }
    }

    pub fn change_dir_with_reason(
        relative_path: &str,
        operations: Vec<Operation>,
        reason: Reason,
    ) -> Self {
        Operation {
            relative_path: relative_path.to_string(),
            operand: Operand::ChangeDir,
            value: Value::Dir(DirValue {
                operations,
                reason: Some(reason),
            }),
            reason: None,
        }
    }

    pub fn create_link(relative_path: &str, target: &str) -> Self {
        Operation {
            relative_path: relative_path.to_string(),
            operand: Operand::CreateLink,
            value: Value::Link(LinkValue {
                target: target.to_string(),
            }),
            reason: None,
        }
    }

    pub fn remove_link(relative_path: &str, target: &str) -> Self {
        Operation {
            relative_path: relative_path.to_string(),
            operand: Operand::RemoveLink,
            value: Value::Link(LinkValue {
                target: target.to_string(),
            }),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: Reason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Child operations, empty for non-directory operations.
    pub fn children(&self) -> &[Operation] {
        match &self.value {
            Value::Dir(dir) => &dir.operations,
            _ => &[],
        }
    }

    /// The reason attached to this operation, wherever it lives.
    pub fn effective_reason(&self) -> Option<&Reason> {
        match &self.value {
            Value::FileChanged(file) => Some(&file.reason),
            Value::Dir(dir) => dir.reason.as_ref().or(self.reason.as_ref()),
            _ => self.reason.as_ref(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            return f.write_str("Noop");
        }
        write!(f, "{}: {}", self.operand, self.relative_path)
    }
}

// JSON encoding: {"relativePath", "operand", "value"?, "reason"?} with the
// value object shaped by the operand family.

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("relativePath", &self.relative_path)?;
        map.serialize_entry("operand", &self.operand.to_string())?;
        match &self.value {
            Value::None => {}
            value => map.serialize_entry("value", value)?,
        }
        if let Some(reason) = &self.reason {
            map.serialize_entry("reason", reason)?;
        }
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_none(),
            Value::Dir(dir) => {
                let mut map = serializer.serialize_map(None)?;
                if let Some(reason) = &dir.reason {
                    map.serialize_entry("reason", reason)?;
                }
                map.serialize_entry("operations", &dir.operations)?;
                map.end()
            }
            Value::FileChanged(file) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("reason", &file.reason)?;
                map.end()
            }
            Value::Link(link) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("target", &link.target)?;
                map.end()
            }
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("kind", &self.kind.to_string())?;
        map.serialize_entry("before", &self.before)?;
        map.serialize_entry("after", &self.after)?;
        map.end()
    }
}

impl Serialize for Witness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Witness::None => serializer.serialize_none(),
            Witness::Bytes(bytes) => {
                serializer.serialize_str(&String::from_utf8_lossy(bytes))
            }
            Witness::Text(text) => serializer.serialize_str(text),
            Witness::Mode(mode) => serializer.serialize_str(&format!("0o{:o}", mode)),
            Witness::Int(value) => serializer.serialize_i64(*value),
            Witness::Time(time) => serializer.serialize_str(&rfc3339(time)),
            Witness::Summary(summary) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("size", &summary.size)?;
                if let Some(prefix) = &summary.digest_prefix {
                    map.serialize_entry("digestPrefix", prefix)?;
                }
                if let Some(algorithm) = &summary.algorithm {
                    map.serialize_entry("algorithm", algorithm)?;
                }
                map.end()
            }
            Witness::Kind(kind) => serializer.serialize_str(kind.as_str()),
            Witness::Globs(globs) => {
                let mut seq = serializer.serialize_seq(Some(globs.len()))?;
                for glob in globs {
                    seq.serialize_element(glob)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_is_noop() {
        assert!(Operation::noop().is_noop());
        assert!(!Operation::create_file("a.txt").is_noop());
    }

    #[test]
    fn json_shapes_follow_operand_family() {
        let op = Operation::change_dir(
            ".",
            vec![
                Operation::change_file(
                    "a.txt",
                    Reason::new(
                        ReasonKind::ContentChanged,
                        Witness::Bytes(b"hi".to_vec()),
                        Witness::Bytes(b"bye".to_vec()),
                    ),
                ),
                Operation::create_link("b", "a.txt"),
                Operation::remove_file("c.txt"),
            ],
        );

        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["relativePath"], ".");
        assert_eq!(json["operand"], "ChangeDir");

        let children = json["value"]["operations"].as_array().unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0]["value"]["reason"]["kind"], "ContentChanged");
        assert_eq!(children[0]["value"]["reason"]["before"], "hi");
        assert_eq!(children[1]["value"]["target"], "a.txt");
        assert!(children[2].get("value").is_none());
    }

    #[test]
    fn witness_mode_renders_octal() {
        let reason = Reason::new(
            ReasonKind::ModeChanged,
            Witness::Mode(0o644),
            Witness::Mode(0o755),
        );
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["before"], "0o644");
        assert_eq!(json["after"], "0o755");
    }
}
