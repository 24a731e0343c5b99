//! IR → TypeScript-flavored interface-description text.
//!
//! Output is embedded verbatim in prompts, so it must be byte-for-byte
//! stable: declarations in graph order, members in declaration order.
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::{AliasDeclaration, Declaration, Literal, Member, RecordDeclaration, TypeNode};
use crate::lower::SchemaGraph;

static BARE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid identifier regex"));

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct Codegen {
    chunks: Vec<String>,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, declaration: &Declaration) {
        let chunk = match declaration {
            Declaration::Record(record) => record_to_str(record),
            Declaration::Alias(alias) => alias_to_str(alias),
        };
        self.chunks.push(chunk);
    }

    pub fn emit_graph(&mut self, graph: &SchemaGraph) {
        for declaration in graph.declarations() {
            self.emit(declaration);
        }
    }

    pub fn into_string(self) -> String {
        self.chunks.join("\n")
    }
}

/// Render every declaration of `graph`, in graph order.
pub fn render_schema(graph: &SchemaGraph) -> String {
    let mut cg = Codegen::new();
    cg.emit_graph(graph);
    cg.into_string()
}

pub fn render_type(node: &TypeNode) -> String {
    match node {
        TypeNode::Primitive(p) => p.keyword().to_string(),
        TypeNode::Reference { name, type_arguments } => {
            if type_arguments.is_empty() {
                name.clone()
            } else {
                format!("{name}<{}>", join_types(type_arguments))
            }
        }
        // `A | B[]` would bind the brackets to `B` only
        TypeNode::Array(element) => match element.as_ref() {
            TypeNode::Union(_) => format!("Array<{}>", render_type(element)),
            other => format!("{}[]", render_type(other)),
        },
        TypeNode::Tuple(elements) => format!("[{}]", join_types(elements)),
        TypeNode::Union(members) => union_to_str(members),
        TypeNode::Literal(literal) => literal_to_str(literal),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn join_types(nodes: &[TypeNode]) -> String {
    nodes.iter().map(render_type).collect::<Vec<_>>().join(", ")
}

/// Flatten nested unions, drop textual duplicates (first one wins) and move
/// `null` to the end.
fn union_to_str(members: &[TypeNode]) -> String {
    fn collect(members: &[TypeNode], seen: &mut IndexSet<String>, nullable: &mut bool) {
        for member in members {
            match member {
                TypeNode::Union(inner) => collect(inner, seen, nullable),
                m if m.is_null() => *nullable = true,
                m => {
                    seen.insert(render_type(m));
                }
            }
        }
    }

    let mut seen = IndexSet::new();
    let mut nullable = false;
    collect(members, &mut seen, &mut nullable);

    let mut parts: Vec<String> = seen.into_iter().collect();
    if nullable {
        parts.push("null".to_string());
    }
    if parts.is_empty() {
        return "never".to_string();
    }
    parts.join(" | ")
}

fn literal_to_str(literal: &Literal) -> String {
    match literal {
        Literal::String(s) => quote(s),
        Literal::Number(n) => n.to_string(),
        Literal::Boolean(b) => b.to_string(),
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn comment_to_str(doc: &str, indentation: &str) -> String {
    let doc = doc.trim();
    if doc.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for line in doc.lines() {
        let line = line.trim();
        if line.is_empty() {
            out.push_str(&format!("{indentation}//\n"));
        } else {
            out.push_str(&format!("{indentation}// {line}\n"));
        }
    }
    out
}

fn type_params_to_str(params: &[String]) -> String {
    if params.is_empty() {
        String::new()
    } else {
        format!("<{}>", params.join(", "))
    }
}

fn member_to_str(member: &Member) -> String {
    match member {
        Member::Property(p) => {
            let comment = comment_to_str(&p.doc, INDENT);
            let name = if BARE_IDENTIFIER.is_match(&p.name) { p.name.clone() } else { quote(&p.name) };
            let marker = if p.optional { "?" } else { "" };
            format!("{comment}{INDENT}{name}{marker}: {};", render_type(&p.ty))
        }
        Member::IndexSignature { key_type, value_type } => {
            format!("{INDENT}[key: {}]: {};", render_type(key_type), render_type(value_type))
        }
    }
}

fn record_to_str(record: &RecordDeclaration) -> String {
    let comment = comment_to_str(&record.doc, "");
    let params = type_params_to_str(&record.type_parameters);
    let extends = if record.base_types.is_empty() {
        String::new()
    } else {
        format!(" extends {}", join_types(&record.base_types))
    };
    let members = record
        .members
        .iter()
        .map(|m| format!("{}\n", member_to_str(m)))
        .collect::<String>();
    format!("{comment}interface {}{params}{extends} {{\n{members}}}\n", record.name)
}

fn alias_to_str(alias: &AliasDeclaration) -> String {
    let comment = comment_to_str(&alias.doc, "");
    let params = type_params_to_str(&alias.type_parameters);
    format!("{comment}type {}{params} = {}\n", alias.name, render_type(&alias.target))
}

// ------------------------------- Tests ------------------------------------ //
