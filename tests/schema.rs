use std::marker::PhantomData;
use std::path::Path;

use json_tx::describe::AliasDef;
use json_tx::{Annotation, Describe, FieldDef, RecordDef, TypeRegistry, TypeSchema};
use pretty_assertions::assert_eq;
use serde::Deserialize;

// ————————————————————————————————————————————————————————————————————————————
// DESCRIBED TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, PartialEq, Deserialize)]
pub struct Order {
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub note: Option<String>,
    pub favorite: Option<Product>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct LineItem {
    pub product: Product,
    pub quantity: u32,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Product {
    Coffee { size: String },
    Muffin { warmed: bool },
}

impl Describe for Order {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        registry.register_with("Order", |reg| {
            RecordDef::new("Order")
                .doc("A customer order.")
                .field(FieldDef::new("items", reg.describe::<Vec<LineItem>>()))
                .field(
                    FieldDef::new("note", reg.describe::<Option<String>>())
                        .optional()
                        .doc("Anything the barista should know"),
                )
                .field(FieldDef::new("favorite", reg.describe::<Option<Product>>()))
                .into()
        })
    }
}

impl Describe for LineItem {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        registry.register_with("LineItem", |reg| {
            RecordDef::new("LineItem")
                .field(FieldDef::new("product", reg.describe::<Product>()))
                .field(FieldDef::new("quantity", reg.describe::<u32>()))
                .into()
        })
    }
}

impl Describe for Product {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        registry.register_with("Product", |reg| {
            let coffee = reg.insert(
                "Coffee",
                RecordDef::new("Coffee")
                    .field(FieldDef::new("type", Annotation::literals(["Coffee"])))
                    .field(FieldDef::new("size", Annotation::literals(["small", "large"]))),
            );
            let warmed = reg.describe::<bool>();
            let muffin = reg.insert(
                "Muffin",
                RecordDef::new("Muffin")
                    .field(FieldDef::new("type", Annotation::literals(["Muffin"])))
                    .field(FieldDef::new("warmed", warmed)),
            );
            AliasDef::new("Product", Annotation::Union(vec![coffee, muffin])).into()
        })
    }
}

struct Page<T>(PhantomData<T>);

impl<T: Describe> Describe for Page<T> {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        registry.register_with("Page", |_| {
            RecordDef::new("Page")
                .type_param("T")
                .field(FieldDef::new("items", Annotation::list(Annotation::var("T"))))
                .field(FieldDef::new("total", Annotation::Integer))
                .into()
        });
        Annotation::generic("Page", vec![T::describe(registry)])
    }
}

struct Search;

impl Describe for Search {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        registry.register_with("Search", |reg| {
            RecordDef::new("Search")
                .field(FieldDef::new("orders", reg.describe::<Page<Order>>()))
                .field(FieldDef::new("lines", reg.describe::<Page<LineItem>>()))
                .into()
        })
    }
}

struct Category;

impl Describe for Category {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        registry.register_with("Category", |reg| {
            RecordDef::new("Category")
                .field(FieldDef::new("name", reg.describe::<String>()))
                .field(FieldDef::new("subcategories", reg.describe::<Vec<Category>>()))
                .into()
        })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

const ORDER_SCHEMA: &str = r#"// A customer order.
interface Order {
    items: LineItem[];
    // Anything the barista should know
    note?: string | null;
    favorite: Product | null;
}

interface LineItem {
    product: Product;
    quantity: number;
}

type Product = Coffee | Muffin

interface Coffee {
    type: "Coffee";
    size: "small" | "large";
}

interface Muffin {
    type: "Muffin";
    warmed: boolean;
}
"#;

#[test]
fn described_rust_types_render_in_first_reference_order() {
    let schema = TypeSchema::of::<Order>().unwrap();
    assert_eq!(schema.type_name(), "Order");
    assert_eq!(schema.text(), ORDER_SCHEMA);
    assert!(schema.errors().is_empty());
}

#[test]
fn shared_types_are_declared_once() {
    let schema = TypeSchema::of::<Order>().unwrap();
    assert_eq!(schema.text().matches("type Product =").count(), 1);
    assert_eq!(schema.graph().len(), 5);
}

#[test]
fn compiling_is_deterministic() {
    let first = TypeSchema::of::<Order>().unwrap();
    for _ in 0..5 {
        assert_eq!(TypeSchema::of::<Order>().unwrap().text(), first.text());
    }
}

#[test]
fn generic_uses_share_one_declaration() {
    let schema = TypeSchema::of::<Search>().unwrap();
    let text = schema.text();
    assert!(text.starts_with("interface Search {\n    orders: Page<Order>;\n    lines: Page<LineItem>;\n}\n"));
    assert!(text.contains("interface Page<T> {\n    items: T[];\n    total: number;\n}\n"));
    assert_eq!(text.matches("interface Page").count(), 1);
}

#[test]
fn self_referential_record_terminates() {
    let schema = TypeSchema::of::<Category>().unwrap();
    assert_eq!(
        schema.text(),
        "interface Category {\n    name: string;\n    subcategories: Category[];\n}\n"
    );
}

#[derive(Debug, Deserialize)]
struct Fixture {
    root: String,
    #[serde(flatten)]
    registry: TypeRegistry,
}

#[test]
fn fixtures_match_their_snapshots() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let mut seen = 0;
    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        let Some(name) = file_name.strip_suffix(".types.json") else { continue };

        let fixture: Fixture = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let schema = TypeSchema::compile(fixture.registry, fixture.root.as_str());
        let expected = std::fs::read_to_string(dir.join(format!("{name}.schema.d.ts"))).unwrap();
        assert_eq!(schema.text(), expected, "snapshot mismatch for {name}");
        assert!(schema.errors().is_empty(), "{name}: {:?}", schema.errors());
        seen += 1;
    }
    assert!(seen >= 4);
}
