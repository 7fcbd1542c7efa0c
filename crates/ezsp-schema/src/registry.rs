use std::collections::HashMap;

use tracing::debug;

use crate::commands::{CommandSchema, COMMANDS};
use crate::error::{Result, SchemaError};
use crate::value::Record;

/// Immutable lookup over a command table, by name and by frame id.
///
/// Built once and shared (typically as `Arc<SchemaRegistry>`) by the frame
/// codec and the client.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    commands: &'static [CommandSchema],
    by_name: HashMap<&'static str, usize>,
    by_id: HashMap<u16, Vec<usize>>,
}

impl SchemaRegistry {
    /// Registry over the built-in command table.
    pub fn builtin() -> Self {
        Self::index(COMMANDS)
    }

    /// Registry over a custom table.
    ///
    /// Rejects duplicate names and entries sharing an id with overlapping
    /// version ranges.
    pub fn from_table(commands: &'static [CommandSchema]) -> Result<Self> {
        for (i, command) in commands.iter().enumerate() {
            for other in &commands[..i] {
                if other.name == command.name {
                    return Err(SchemaError::DuplicateCommand(command.name));
                }
                if other.id == command.id && other.overlaps(command) {
                    return Err(SchemaError::OverlappingVersions {
                        id: command.id,
                        first: other.name,
                        second: command.name,
                    });
                }
            }
        }
        Ok(Self::index(commands))
    }

    fn index(commands: &'static [CommandSchema]) -> Self {
        let mut by_name = HashMap::with_capacity(commands.len());
        let mut by_id: HashMap<u16, Vec<usize>> = HashMap::with_capacity(commands.len());
        for (i, command) in commands.iter().enumerate() {
            by_name.entry(command.name).or_insert(i);
            by_id.entry(command.id).or_default().push(i);
        }
        Self {
            commands,
            by_name,
            by_id,
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static CommandSchema> {
        let commands = self.commands;
        self.by_name.get(name).map(|&i| &commands[i])
    }

    /// Look up a command by name, failing with `UnknownCommand`.
    pub fn command(&self, name: &str) -> Result<&'static CommandSchema> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownCommand(name.to_string()))
    }

    /// Every entry for `id`, in table order, regardless of version.
    pub fn candidates(&self, id: u16) -> impl Iterator<Item = &'static CommandSchema> + '_ {
        let commands = self.commands;
        self.by_id
            .get(&id)
            .into_iter()
            .flatten()
            .map(move |&i| &commands[i])
    }

    /// The first entry for `id` that applies at `version`.
    pub fn resolve(&self, id: u16, version: u8) -> Option<&'static CommandSchema> {
        self.candidates(id).find(|c| c.applies_to(version))
    }

    /// Decode a response body for `id` at `version`.
    ///
    /// Candidates that apply at `version` are tried in table order and the
    /// first successful decode wins.
    pub fn decode_response(
        &self,
        id: u16,
        version: u8,
        body: &[u8],
    ) -> Result<(&'static CommandSchema, Record)> {
        let mut last_error = None;
        for command in self.candidates(id).filter(|c| c.applies_to(version)) {
            match command.decode_response(body) {
                Ok(record) => return Ok((command, record)),
                Err(err) => {
                    debug!(command = command.name, error = %err, "candidate schema rejected frame");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(SchemaError::UnknownFrameId { id, version }))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static CommandSchema> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, U8};

    #[test]
    fn test_builtin_table_is_consistent() {
        let registry = SchemaRegistry::from_table(COMMANDS).unwrap();
        assert_eq!(registry.len(), COMMANDS.len());
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.command("networkInit").unwrap().id, 0x0017);
        assert!(matches!(
            registry.command("doesNotExist"),
            Err(SchemaError::UnknownCommand(name)) if name == "doesNotExist"
        ));
    }

    #[test]
    fn test_resolve_by_version() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(
            registry.resolve(0x00C4, 8).unwrap().name,
            "changeSourceRouteHandler"
        );
        assert_eq!(
            registry.resolve(0x00C4, 9).unwrap().name,
            "incomingNetworkStatusHandler"
        );
        assert_eq!(registry.candidates(0x00C4).count(), 2);
        assert!(registry.resolve(0x7FFF, 8).is_none());
    }

    #[test]
    fn test_decode_0x00c4_under_version_8() {
        let registry = SchemaRegistry::builtin();
        let (command, record) = registry
            .decode_response(0x00C4, 8, &[0x05, 0xE3, 0x99, 0xA0, 0x00])
            .unwrap();
        assert_eq!(command.name, "changeSourceRouteHandler");
        assert_eq!(record.get_u64("newChildId"), Some(0xE305));
        assert_eq!(record.get_u64("newParentId"), Some(0xA099));
    }

    #[test]
    fn test_decode_0x00c4_under_version_9() {
        let registry = SchemaRegistry::builtin();
        let (command, record) = registry
            .decode_response(0x00C4, 9, &[0x05, 0xE3, 0x99, 0xA0, 0x00])
            .unwrap();
        assert_eq!(command.name, "incomingNetworkStatusHandler");
        assert_eq!(record.get_u64("errorCode"), Some(0x05));
        assert_eq!(record.get_u64("target"), Some(0x99E3));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_decode_unknown_id() {
        let registry = SchemaRegistry::builtin();
        let err = registry.decode_response(0x7FFF, 8, &[]).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnknownFrameId {
                id: 0x7FFF,
                version: 8
            }
        ));
    }

    #[test]
    fn test_decode_underrun_reported() {
        let registry = SchemaRegistry::builtin();
        let err = registry.decode_response(0x0000, 8, &[0x08]).unwrap_err();
        assert!(matches!(err, SchemaError::Underrun { .. }));
    }

    static DUPLICATE: &[CommandSchema] = &[
        CommandSchema {
            name: "ping",
            id: 0x0001,
            request: &[],
            response: &[],
            callback: false,
            min_version: None,
            max_version: None,
        },
        CommandSchema {
            name: "ping",
            id: 0x0002,
            request: &[],
            response: &[],
            callback: false,
            min_version: None,
            max_version: None,
        },
    ];

    static OVERLAPPING: &[CommandSchema] = &[
        CommandSchema {
            name: "old",
            id: 0x0010,
            request: &[],
            response: &[Field {
                name: "a",
                ty: &U8,
            }],
            callback: false,
            min_version: None,
            max_version: Some(9),
        },
        CommandSchema {
            name: "new",
            id: 0x0010,
            request: &[],
            response: &[],
            callback: false,
            min_version: Some(9),
            max_version: None,
        },
    ];

    #[test]
    fn test_from_table_rejects_duplicates() {
        assert!(matches!(
            SchemaRegistry::from_table(DUPLICATE),
            Err(SchemaError::DuplicateCommand("ping"))
        ));
        assert!(matches!(
            SchemaRegistry::from_table(OVERLAPPING),
            Err(SchemaError::OverlappingVersions { id: 0x0010, .. })
        ));
    }

    #[test]
    fn test_first_successful_candidate_wins() {
        let registry = SchemaRegistry::builtin();
        let (_, record) = registry
            .decode_response(0x00C4, 4, &[0x01, 0x00, 0x02, 0x00])
            .unwrap();
        assert_eq!(record.get_u64("newChildId"), Some(1));
    }
}
