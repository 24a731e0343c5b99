// Strongly-typed IR for codegen. No serde_json::Value here.
//
// Mirrors the fragment of the TypeScript type grammar the renderer can emit.
// Pure data: the builder (`lower`) produces it, `codegen` prints it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Any,
    Null,
    Never,
    This,
}

impl Primitive {
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Any => "any",
            Primitive::Null => "null",
            Primitive::Never => "never",
            Primitive::This => "this",
        }
    }
}

/// Literal type. `null` is never a literal here; it lowers to `Primitive::Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(serde_json::Number),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    Primitive(Primitive),
    Reference {
        name: String,
        type_arguments: Vec<TypeNode>,
    },
    Array(Box<TypeNode>),
    Tuple(Vec<TypeNode>),
    /// Members are kept as produced; flattening and dedup happen when rendering.
    Union(Vec<TypeNode>),
    Literal(Literal),
}

impl TypeNode {
    pub const STRING: TypeNode = TypeNode::Primitive(Primitive::String);
    pub const NUMBER: TypeNode = TypeNode::Primitive(Primitive::Number);
    pub const BOOLEAN: TypeNode = TypeNode::Primitive(Primitive::Boolean);
    pub const ANY: TypeNode = TypeNode::Primitive(Primitive::Any);
    pub const NULL: TypeNode = TypeNode::Primitive(Primitive::Null);
    pub const NEVER: TypeNode = TypeNode::Primitive(Primitive::Never);
    pub const THIS: TypeNode = TypeNode::Primitive(Primitive::This);

    pub fn reference(name: impl Into<String>, type_arguments: Vec<TypeNode>) -> Self {
        TypeNode::Reference { name: name.into(), type_arguments }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypeNode::Primitive(Primitive::Null))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub optional: bool,
    pub doc: String,      // empty when undocumented
    pub ty: TypeNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Property(Property),
    IndexSignature { key_type: TypeNode, value_type: TypeNode },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDeclaration {
    pub name: String,
    pub type_parameters: Vec<String>,
    pub doc: String,
    pub base_types: Vec<TypeNode>,
    pub members: Vec<Member>,    // stable order for deterministic codegen
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDeclaration {
    pub name: String,
    pub type_parameters: Vec<String>,
    pub doc: String,
    pub target: TypeNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Record(RecordDeclaration),
    Alias(AliasDeclaration),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Record(r) => &r.name,
            Declaration::Alias(a) => &a.name,
        }
    }
}
