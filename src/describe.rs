//! Abstract type descriptions: the reflection boundary.
//!
//! A host environment describes its data shapes as [`TypeDef`]s keyed by
//! [`TypeKey`] and hands them over through [`TypeSource`]. The schema builder
//! (`lower`) and the instance validator (`validate`) only ever see this
//! vocabulary, never host types directly.
//!
//! Two ways to produce descriptions ship with the crate:
//! - JSON description files, via the serde impls on [`TypeRegistry`];
//! - Rust types, via the [`Describe`] trait (see `describe::std_impls` for
//!   the blanket impls on std containers and scalars).
pub mod std_impls;

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Identity of a described type. Equal keys mean the same logical type;
/// the rendered name lives on the definition and may differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

/// A type annotation as the host reports it, before lowering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    String,
    Number,
    /// Renders as `number`; validates integral JSON numbers only.
    Integer,
    Boolean,
    Any,
    Null,
    Never,
    #[serde(rename = "self")]
    SelfType,
    /// Generic type variable, bound by the enclosing declaration.
    Var(String),
    Named {
        key: TypeKey,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Annotation>,
    },
    /// list / set / frozenset; a missing element type means `any`.
    List(Option<Box<Annotation>>),
    /// dict-like; missing arguments default to `string` keys and `any` values.
    Map {
        #[serde(default)]
        key: Option<Box<Annotation>>,
        #[serde(default)]
        value: Option<Box<Annotation>>,
    },
    Tuple(Vec<Annotation>),
    /// Homogeneous tuple of any length, `tuple[T, ...]`.
    VariadicTuple(Box<Annotation>),
    Union(Vec<Annotation>),
    Literal(Vec<LiteralValue>),
    Required(Box<Annotation>),
    NotRequired(Box<Annotation>),
    Documented { doc: String, inner: Box<Annotation> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub annotation: Annotation,
    /// Default optionality; `required`/`not_required` wrappers override it.
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<Annotation>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Value type of properties not listed in `fields`. `None` = closed shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<String>,
    pub target: Annotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDef {
    Record(RecordDef),
    Alias(AliasDef),
    /// A host type outside the record/alias vocabulary.
    Opaque { name: String },
}

/// The reflection contract: resolve a key to its description.
pub trait TypeSource: Send + Sync {
    fn lookup(&self, key: &TypeKey) -> Option<&TypeDef>;
}

/// Host adapter for Rust types.
///
/// Scalars and containers return structural annotations; user records
/// register themselves with [`TypeRegistry::register_with`] and return a
/// named reference.
pub trait Describe {
    fn describe(registry: &mut TypeRegistry) -> Annotation;
}

/// Ordered `TypeKey -> TypeDef` store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: IndexMap<TypeKey, TypeDef>,
    /// Keys whose definition is still being built.
    #[serde(skip)]
    reserved: IndexSet<TypeKey>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TypeKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        LiteralValue::String(value.to_string())
    }
}

impl From<bool> for LiteralValue {
    fn from(value: bool) -> Self {
        LiteralValue::Bool(value)
    }
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        LiteralValue::Number(value.into())
    }
}

impl Annotation {
    pub fn named(key: impl Into<TypeKey>) -> Self {
        Annotation::Named { key: key.into(), args: Vec::new() }
    }
    pub fn generic(key: impl Into<TypeKey>, args: Vec<Annotation>) -> Self {
        Annotation::Named { key: key.into(), args }
    }
    pub fn var(name: impl Into<String>) -> Self {
        Annotation::Var(name.into())
    }
    pub fn list(element: Annotation) -> Self {
        Annotation::List(Some(Box::new(element)))
    }
    pub fn map(key: Annotation, value: Annotation) -> Self {
        Annotation::Map { key: Some(Box::new(key)), value: Some(Box::new(value)) }
    }
    /// `T | null`
    pub fn nullable(inner: Annotation) -> Self {
        Annotation::Union(vec![inner, Annotation::Null])
    }
    pub fn literals<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<LiteralValue>,
    {
        Annotation::Literal(values.into_iter().map(Into::into).collect())
    }
    pub fn documented(doc: impl Into<String>, inner: Annotation) -> Self {
        Annotation::Documented { doc: doc.into(), inner: Box::new(inner) }
    }
    pub fn required(inner: Annotation) -> Self {
        Annotation::Required(Box::new(inner))
    }
    pub fn not_required(inner: Annotation) -> Self {
        Annotation::NotRequired(Box::new(inner))
    }

    /// Strip wrappers that carry no shape (docs, optionality overrides).
    pub fn unwrapped(&self) -> &Annotation {
        let mut current = self;
        loop {
            match current {
                Annotation::Required(inner) | Annotation::NotRequired(inner) => current = inner,
                Annotation::Documented { inner, .. } => current = inner,
                _ => return current,
            }
        }
    }
}

impl FieldDef {
    pub fn new(name: impl Into<String>, annotation: Annotation) -> Self {
        Self { name: name.into(), annotation, optional: false, doc: None }
    }
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

impl RecordDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            type_params: Vec::new(),
            bases: Vec::new(),
            fields: Vec::new(),
            extra: None,
        }
    }
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }
    pub fn base(mut self, base: Annotation) -> Self {
        self.bases.push(base);
        self
    }
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
    pub fn extra(mut self, value: Annotation) -> Self {
        self.extra = Some(value);
        self
    }
}

impl AliasDef {
    pub fn new(name: impl Into<String>, target: Annotation) -> Self {
        Self { name: name.into(), doc: None, type_params: Vec::new(), target }
    }
    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Record(r) => &r.name,
            TypeDef::Alias(a) => &a.name,
            TypeDef::Opaque { name } => name,
        }
    }
    pub fn type_params(&self) -> &[String] {
        match self {
            TypeDef::Record(r) => &r.type_params,
            TypeDef::Alias(a) => &a.type_params,
            TypeDef::Opaque { .. } => &[],
        }
    }
}

impl From<RecordDef> for TypeDef {
    fn from(value: RecordDef) -> Self {
        TypeDef::Record(value)
    }
}

impl From<AliasDef> for TypeDef {
    fn from(value: AliasDef) -> Self {
        TypeDef::Alias(value)
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a definition.
    pub fn insert(&mut self, key: impl Into<TypeKey>, def: impl Into<TypeDef>) -> Annotation {
        let key = key.into();
        self.reserved.shift_remove(&key);
        self.types.insert(key.clone(), def.into());
        Annotation::named(key)
    }

    /// Register a definition once. While `build` runs the key is reserved,
    /// so a type that mentions itself gets a plain named reference back
    /// instead of recursing.
    pub fn register_with<F>(&mut self, key: impl Into<TypeKey>, build: F) -> Annotation
    where
        F: FnOnce(&mut Self) -> TypeDef,
    {
        let key = key.into();
        if self.types.contains_key(&key) || !self.reserved.insert(key.clone()) {
            return Annotation::named(key);
        }
        let def = build(self);
        self.insert(key, def)
    }

    pub fn describe<T: Describe + ?Sized>(&mut self) -> Annotation {
        T::describe(self)
    }

    pub fn get(&self, key: &TypeKey) -> Option<&TypeDef> {
        self.types.get(key)
    }
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.types.contains_key(key)
    }
    pub fn len(&self) -> usize {
        self.types.len()
    }
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &TypeDef)> {
        self.types.iter()
    }
}

impl TypeSource for TypeRegistry {
    fn lookup(&self, key: &TypeKey) -> Option<&TypeDef> {
        self.types.get(key)
    }
}

// ------------------------------- Tests ------------------------------------ //
