//! Tool & operation registry
//!
//! First pass over the records: every `TOOL PATH` opens an operation, and
//! tools are deduplicated by name into machine tool-table slots.

use crate::ast::{Record, RecordKind, ToolSpec};
use crate::machine::{MachineProfile, ToolSettings};
use std::collections::{BTreeMap, HashMap};

/// Speed and compensation for a tool, or an explicit absence of them
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Settings {
    Specified(ToolSettings),
    Unspecified,
}

/// A physical cutter in the machine tool table
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub slot: u32,
    pub spec: ToolSpec,
    pub settings: Settings,
}

impl Tool {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Tool length offset register; the UMC keeps it equal to the slot
    pub fn offset(&self) -> u32 {
        self.slot
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// 1-based position in the program
    pub index: usize,
    pub name: String,
    pub line: usize,
    pub slot: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub tools: BTreeMap<u32, Tool>,
    pub operations: BTreeMap<usize, Operation>,
}

impl Registry {
    pub fn tool(&self, slot: u32) -> Option<&Tool> {
        self.tools.get(&slot)
    }

    pub fn operation(&self, index: usize) -> Option<&Operation> {
        self.operations.get(&index)
    }

    /// Tool used by operation `index`
    pub fn tool_for(&self, index: usize) -> Option<&Tool> {
        self.operation(index).and_then(|op| self.tool(op.slot))
    }

    /// The first tool after operation `index` that differs from its tool,
    /// so the changer can stage it early.
    pub fn next_different_tool(&self, index: usize) -> Option<u32> {
        let current = self.operation(index)?.slot;
        self.operations
            .range(index + 1..)
            .map(|(_, op)| op.slot)
            .find(|&slot| slot != current)
    }
}

/// Index tools and operations from a parsed CLSF.
pub fn index_operations(records: &[Record], profile: &MachineProfile) -> Registry {
    let mut registry = Registry::default();
    let mut slots_by_name: HashMap<String, u32> = HashMap::new();

    for record in records {
        let RecordKind::ToolPath(path) = &record.kind else {
            continue;
        };

        let index = registry.operations.len() + 1;
        let slot = match slots_by_name.get(&path.tool.name) {
            Some(&slot) => slot,
            None => {
                let slot = registry.tools.len() as u32 + 1;
                let settings = match profile.tool_settings(&path.tool.name) {
                    Some(settings) => Settings::Specified(settings),
                    None => {
                        tracing::warn!(
                            tool = %path.tool.name,
                            line = record.line,
                            "tool not in machine profile, speed and compensation unspecified"
                        );
                        Settings::Unspecified
                    }
                };
                registry.tools.insert(
                    slot,
                    Tool {
                        slot,
                        spec: path.tool.clone(),
                        settings,
                    },
                );
                slots_by_name.insert(path.tool.name.clone(), slot);
                slot
            }
        };

        registry.operations.insert(
            index,
            Operation {
                index,
                name: path.operation.clone(),
                line: record.line,
                slot,
            },
        );
    }

    tracing::debug!(
        tools = registry.tools.len(),
        operations = registry.operations.len(),
        "indexed tool paths"
    );
    registry
}
