//! A compiled schema: the graph, its rendered text, and the description
//! source it came from. Built once, then shared read-only.
use std::fmt;
use std::sync::Arc;

use crate::codegen::render_schema;
use crate::describe::{Annotation, Describe, TypeKey, TypeRegistry, TypeSource};
use crate::error::SchemaError;
use crate::lower::SchemaGraph;

#[derive(Clone)]
pub struct TypeSchema {
    source: Arc<dyn TypeSource>,
    root: TypeKey,
    type_name: String,
    graph: SchemaGraph,
    text: String,
}

impl TypeSchema {
    pub fn compile<S>(source: S, root: impl Into<TypeKey>) -> Self
    where
        S: TypeSource + 'static,
    {
        Self::compile_shared(Arc::new(source), root)
    }

    pub fn compile_shared(source: Arc<dyn TypeSource>, root: impl Into<TypeKey>) -> Self {
        let root = root.into();
        let graph = SchemaGraph::build(source.as_ref(), &root);
        let text = render_schema(&graph);
        let type_name = source
            .lookup(&root)
            .map(|def| def.name().to_string())
            .unwrap_or_else(|| root.to_string());

        for error in graph.errors() {
            tracing::warn!(type_name = %type_name, "schema conversion: {error}");
        }

        Self { source, root, type_name, graph, text }
    }

    /// Describe a Rust type into a fresh registry and compile it. The type
    /// must describe itself as a named record or alias.
    pub fn of<T: Describe + ?Sized>() -> Result<Self, SchemaError> {
        let mut registry = TypeRegistry::new();
        match registry.describe::<T>() {
            Annotation::Named { key, args } if args.is_empty() => Ok(Self::compile(registry, key)),
            other => Err(SchemaError::UnnamedRoot { annotation: format!("{other:?}") }),
        }
    }

    /// Rendered declarations, as embedded in prompts.
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
    pub fn root(&self) -> &TypeKey {
        &self.root
    }
    pub fn root_annotation(&self) -> Annotation {
        Annotation::named(self.root.clone())
    }
    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }
    pub fn errors(&self) -> &[String] {
        self.graph.errors()
    }
    pub fn source(&self) -> &dyn TypeSource {
        self.source.as_ref()
    }
}

impl fmt::Debug for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSchema")
            .field("root", &self.root)
            .field("type_name", &self.type_name)
            .field("declarations", &self.graph.len())
            .field("errors", &self.graph.errors())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{FieldDef, RecordDef};

    struct Sentiment;

    impl Describe for Sentiment {
        fn describe(registry: &mut TypeRegistry) -> Annotation {
            registry.register_with("Sentiment", |_| {
                RecordDef::new("Sentiment")
                    .doc("The following is a schema definition for determining the sentiment of a some user input.")
                    .field(
                        FieldDef::new("sentiment", Annotation::literals(["negative", "neutral", "positive"]))
                            .doc("The sentiment for the text"),
                    )
                    .into()
            })
        }
    }

    #[test]
    fn compiles_a_described_rust_type() {
        let schema = TypeSchema::of::<Sentiment>().unwrap();
        assert_eq!(schema.type_name(), "Sentiment");
        assert_eq!(
            schema.text(),
            "// The following is a schema definition for determining the sentiment of a some user input.\n\
             interface Sentiment {\n    \
             // The sentiment for the text\n    \
             sentiment: \"negative\" | \"neutral\" | \"positive\";\n}\n"
        );
        assert!(schema.errors().is_empty());
    }

    #[test]
    fn compiling_twice_is_byte_identical() {
        let a = TypeSchema::of::<Sentiment>().unwrap();
        let b = TypeSchema::of::<Sentiment>().unwrap();
        assert_eq!(a.text(), b.text());
    }

    #[test]
    fn unnamed_root_is_rejected() {
        assert!(matches!(TypeSchema::of::<Vec<String>>(), Err(SchemaError::UnnamedRoot { .. })));
    }
}
