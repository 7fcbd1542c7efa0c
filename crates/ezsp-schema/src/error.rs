/// Errors raised while encoding or decoding schema values.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Decode ran out of input before the field was complete.
    #[error("buffer underrun: needed {needed} bytes, {remaining} remaining")]
    Underrun { needed: usize, remaining: usize },

    /// The value does not have the shape the field type expects.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An integer does not fit the declared width and signedness.
    #[error("value {value} out of range for {type_name}")]
    OutOfRange { value: i128, type_name: String },

    /// A length-prefixed byte string or list is longer than its prefix allows.
    #[error("length {len} exceeds maximum {max}")]
    LengthOverflow { len: usize, max: usize },

    /// A fixed-length list was given the wrong number of elements.
    #[error("fixed list expects {expected} elements, got {actual}")]
    FixedLength { expected: usize, actual: usize },

    /// A record is missing a declared field.
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// An argument object names a field the command does not declare.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// Positional arguments do not match the request field list.
    #[error("'{command}' takes {expected} arguments, got {actual}")]
    ArgumentCount {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    /// No command with this name exists in the table.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// No schema entry applies to this frame id at this protocol version.
    #[error("unknown frame id 0x{id:04X} for protocol version {version}")]
    UnknownFrameId { id: u16, version: u8 },

    /// The table holds two entries with the same name.
    #[error("duplicate command '{0}'")]
    DuplicateCommand(&'static str),

    /// Two entries share an id and overlapping version ranges.
    #[error("commands '{first}' and '{second}' overlap on frame id 0x{id:04X}")]
    OverlappingVersions {
        id: u16,
        first: &'static str,
        second: &'static str,
    },

    /// Arguments given as JSON could not be parsed.
    #[error("arguments are not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
