//! Lower abstract type descriptions into IR declarations.
//!
//! Walks everything reachable from a root key and produces one declaration
//! per named type. Named types are never inlined: a reference enqueues the
//! key, and the declaration is produced when the key is popped. Each key is
//! `unvisited` (absent), `reserved` (being declared) or `declared`, so
//! self-referential types terminate.
//!
//! Unsupported shapes never abort the walk; they add a message to
//! `errors` and degrade (to `any`, or to an empty record).
use indexmap::{IndexMap, IndexSet};

use crate::describe::{Annotation, FieldDef, LiteralValue, RecordDef, TypeDef, TypeKey, TypeSource};
use crate::ir::{AliasDeclaration, Declaration, Literal, Member, Property, RecordDeclaration, TypeNode};

#[derive(Debug, Clone)]
enum Slot {
    Reserved,
    Declared(Declaration),
    /// Its name is already taken by an earlier declaration.
    Shadowed,
}

/// Deduplicated declarations reachable from one root, in first-reference
/// order, plus any conversion diagnostics.
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    declarations: IndexMap<TypeKey, Declaration>,
    errors: Vec<String>,
}

impl SchemaGraph {
    pub fn build(source: &dyn TypeSource, root: &TypeKey) -> Self {
        GraphBuilder::new(source).run(root)
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }
    pub fn get(&self, key: &TypeKey) -> Option<&Declaration> {
        self.declarations.get(key)
    }
    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.declarations.keys()
    }
    pub fn len(&self) -> usize {
        self.declarations.len()
    }
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

struct GraphBuilder<'a> {
    source: &'a dyn TypeSource,
    slots: IndexMap<TypeKey, Slot>,
    pending: IndexSet<TypeKey>, // just a set, really; FIFO
    names: IndexMap<String, TypeKey>,
    errors: Vec<String>,
}

impl<'a> GraphBuilder<'a> {
    fn new(source: &'a dyn TypeSource) -> Self {
        Self {
            source,
            slots: IndexMap::new(),
            pending: IndexSet::new(),
            names: IndexMap::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self, root: &TypeKey) -> SchemaGraph {
        self.pending.insert(root.clone());
        while let Some(key) = self.pending.shift_remove_index(0) {
            if self.slots.contains_key(&key) {
                continue;
            }
            self.slots.insert(key.clone(), Slot::Reserved);
            let declaration = self.declare(&key);
            let slot = match self.names.get(declaration.name()) {
                Some(owner) => {
                    self.errors.push(format!(
                        "'{}' is declared by both '{owner}' and '{key}'; only the first is kept.",
                        declaration.name()
                    ));
                    Slot::Shadowed
                }
                None => {
                    self.names.insert(declaration.name().to_string(), key.clone());
                    Slot::Declared(declaration)
                }
            };
            // same key: keeps its position in the map
            self.slots.insert(key, slot);
        }

        let declarations = self
            .slots
            .into_iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Declared(declaration) => Some((key, declaration)),
                Slot::Reserved | Slot::Shadowed => None,
            })
            .collect::<IndexMap<_, _>>();

        tracing::debug!(
            root = %root,
            declarations = declarations.len(),
            errors = self.errors.len(),
            "schema graph built"
        );
        SchemaGraph { declarations, errors: self.errors }
    }

    // -------------------------- declarations --------------------------- //

    fn declare(&mut self, key: &TypeKey) -> Declaration {
        let source = self.source;
        match source.lookup(key) {
            Some(TypeDef::Record(record)) => Declaration::Record(self.declare_record(record)),
            Some(TypeDef::Alias(alias)) => Declaration::Alias(AliasDeclaration {
                name: alias.name.clone(),
                type_parameters: alias.type_params.clone(),
                doc: alias.doc.clone().unwrap_or_default(),
                target: self.convert(&alias.target),
            }),
            Some(TypeDef::Opaque { name }) => {
                self.errors.push(format!(
                    "'{name}' is neither a record nor an alias; only record and alias declarations are supported."
                ));
                Declaration::Record(empty_record(name))
            }
            None => {
                self.errors.push(format!("Type '{key}' is not described."));
                Declaration::Record(empty_record(key.as_str()))
            }
        }
    }

    fn declare_record(&mut self, record: &RecordDef) -> RecordDeclaration {
        let inherited = self.inherited_fields(&record.bases);
        let base_types = record.bases.iter().map(|base| self.convert(base)).collect();

        let mut members = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            if identical_in_all_bases(field, &inherited) {
                continue;
            }
            members.push(Member::Property(self.declare_property(field)));
        }
        if let Some(extra) = &record.extra {
            members.push(Member::IndexSignature {
                key_type: TypeNode::STRING,
                value_type: self.convert(extra),
            });
        }

        RecordDeclaration {
            name: record.name.clone(),
            type_parameters: record.type_params.clone(),
            doc: record.doc.clone().unwrap_or_default(),
            base_types,
            members,
        }
    }

    /// Hoist doc and optionality wrappers onto the property, then convert
    /// what remains.
    fn declare_property(&mut self, field: &FieldDef) -> Property {
        let mut current = &field.annotation;
        let mut optional: Option<bool> = None;
        let mut wrapper_doc: Option<&str> = None;
        loop {
            match current {
                Annotation::Documented { doc, inner } => {
                    wrapper_doc.get_or_insert(doc.as_str());
                    current = inner;
                }
                Annotation::Required(inner) | Annotation::NotRequired(inner) => {
                    let not_required = matches!(current, Annotation::NotRequired(_));
                    if optional.is_some() {
                        self.errors.push(format!(
                            "Optionality of '{}' is specified more than once; the outermost annotation wins.",
                            field.name
                        ));
                    } else {
                        optional = Some(not_required);
                    }
                    current = inner;
                }
                _ => break,
            }
        }

        Property {
            name: field.name.clone(),
            optional: optional.unwrap_or(field.optional),
            doc: field
                .doc
                .as_deref()
                .or(wrapper_doc)
                .unwrap_or_default()
                .to_string(),
            ty: self.convert(current),
        }
    }

    /// Fields visible through the bases (transitively), by name, with every
    /// distinct annotation seen for that name.
    fn inherited_fields(&self, bases: &[Annotation]) -> IndexMap<String, Vec<Annotation>> {
        let mut out = IndexMap::<String, Vec<Annotation>>::new();
        let mut visited = IndexSet::<TypeKey>::new();
        let mut stack: Vec<&Annotation> = bases.iter().rev().collect();
        while let Some(base) = stack.pop() {
            let Annotation::Named { key, .. } = base.unwrapped() else {
                continue;
            };
            if !visited.insert(key.clone()) {
                continue;
            }
            let Some(TypeDef::Record(record)) = self.source.lookup(key) else {
                continue;
            };
            for field in &record.fields {
                let seen = out.entry(field.name.clone()).or_default();
                if !seen.contains(&field.annotation) {
                    seen.push(field.annotation.clone());
                }
            }
            stack.extend(record.bases.iter().rev());
        }
        out
    }

    // ---------------------------- type nodes ---------------------------- //

    fn convert(&mut self, annotation: &Annotation) -> TypeNode {
        match annotation {
            Annotation::Required(inner) | Annotation::NotRequired(inner) => self.convert(inner),
            Annotation::Documented { inner, .. } => self.convert(inner),
            Annotation::String => TypeNode::STRING,
            Annotation::Number | Annotation::Integer => TypeNode::NUMBER,
            Annotation::Boolean => TypeNode::BOOLEAN,
            Annotation::Any => TypeNode::ANY,
            Annotation::Null => TypeNode::NULL,
            Annotation::Never => TypeNode::NEVER,
            Annotation::SelfType => TypeNode::THIS,
            Annotation::Var(name) => TypeNode::reference(name.clone(), Vec::new()),
            Annotation::Named { key, args } => self.reference(key, args),
            Annotation::List(element) => {
                let element = match element {
                    Some(element) => self.convert(element),
                    None => TypeNode::ANY,
                };
                TypeNode::Array(Box::new(element))
            }
            Annotation::Map { key, value } => {
                // only numeric keys survive; everything else is a string key
                let key = match key {
                    Some(key) => self.convert(key),
                    None => TypeNode::STRING,
                };
                let key = if key == TypeNode::NUMBER { key } else { TypeNode::STRING };
                let value = match value {
                    Some(value) => self.convert(value),
                    None => TypeNode::ANY,
                };
                TypeNode::reference("Record", vec![key, value])
            }
            Annotation::Tuple(elements) => {
                TypeNode::Tuple(elements.iter().map(|e| self.convert(e)).collect())
            }
            Annotation::VariadicTuple(element) => TypeNode::Array(Box::new(self.convert(element))),
            Annotation::Union(members) => {
                if members.is_empty() {
                    self.errors.push("An empty union cannot be used as a type annotation.".to_string());
                    return TypeNode::NEVER;
                }
                TypeNode::Union(members.iter().map(|m| self.convert(m)).collect())
            }
            Annotation::Literal(values) => {
                if values.is_empty() {
                    self.errors.push("A literal annotation needs at least one value.".to_string());
                    return TypeNode::NEVER;
                }
                TypeNode::Union(values.iter().map(literal_node).collect())
            }
        }
    }

    fn reference(&mut self, key: &TypeKey, args: &[Annotation]) -> TypeNode {
        let source = self.source;
        let Some(def) = source.lookup(key) else {
            self.errors.push(format!("Type '{key}' is referenced but not described."));
            return TypeNode::ANY;
        };
        let params = def.type_params();
        if params.len() != args.len() {
            self.errors.push(format!(
                "Expected {} type argument(s) for '{}', got {}.",
                params.len(),
                def.name(),
                args.len()
            ));
        }
        if !self.slots.contains_key(key) {
            self.pending.insert(key.clone());
        }
        let type_arguments = args.iter().map(|arg| self.convert(arg)).collect();
        TypeNode::reference(def.name(), type_arguments)
    }
}

fn empty_record(name: &str) -> RecordDeclaration {
    RecordDeclaration {
        name: name.to_string(),
        type_parameters: Vec::new(),
        doc: String::new(),
        base_types: Vec::new(),
        members: Vec::new(),
    }
}

fn literal_node(value: &LiteralValue) -> TypeNode {
    match value {
        LiteralValue::Null => TypeNode::NULL,
        LiteralValue::Bool(b) => TypeNode::Literal(Literal::Boolean(*b)),
        LiteralValue::Number(n) => TypeNode::Literal(Literal::Number(n.clone())),
        LiteralValue::String(s) => TypeNode::Literal(Literal::String(s.clone())),
    }
}

/// A field redeclared with the very same annotation in every base that has
/// it is left to the base.
fn identical_in_all_bases(field: &FieldDef, inherited: &IndexMap<String, Vec<Annotation>>) -> bool {
    match inherited.get(&field.name) {
        Some(seen) => seen.len() == 1 && seen[0] == field.annotation,
        None => false,
    }
}

// ------------------------------- Tests ------------------------------------ //
