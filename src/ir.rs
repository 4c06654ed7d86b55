// Strongly-typed schema IR: what lowering produces and what the compiler renders.
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WireType {
    String,
    Int32,
    Int64,
    Double,
    Bool,
    /// Nested message, by its (unqualified) name.
    Message(String),
}

impl WireType {
    /// The type as written in a `.proto` field line.
    pub fn proto_name(&self) -> &str {
        match self {
            WireType::String => "string",
            WireType::Int32 => "int32",
            WireType::Int64 => "int64",
            WireType::Double => "double",
            WireType::Bool => "bool",
            WireType::Message(name) => name,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, WireType::Message(_))
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proto_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Proto identifier, unique within the owning message.
    pub name: String,
    /// Key the value is read from (and restored to) in JSON.
    pub json_key: String,
    pub wire_type: WireType,
    pub repeated: bool,
    /// Field number; strictly increasing within a message.
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Synthetic message boxing a non-object value under its single field.
    pub wrapper: bool,
}

impl MessageDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub package: Option<String>,
    /// Name of the root message; always `messages[0]`.
    pub root: String,
    pub messages: Vec<MessageDescriptor>,
}

impl Schema {
    pub fn message(&self, name: &str) -> Option<&MessageDescriptor> {
        self.messages.iter().find(|m| m.name == name)
    }

    pub fn root_message(&self) -> Option<&MessageDescriptor> {
        self.message(&self.root)
    }
}
