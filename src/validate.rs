//! Check JSON values against the abstract type descriptions a schema was
//! compiled from.
//!
//! The check is strict: kinds never coerce into each other, and records
//! without an `extra` annotation are closed. Every violation is collected
//! with its dotted path; [`report`] turns them into the failure text that
//! is fed back to the model.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

use crate::describe::{Annotation, FieldDef, LiteralValue, RecordDef, TypeDef, TypeKey, TypeSource};
use crate::error::ValidationError;
use crate::path_de::from_value_with_path;
use crate::schema::TypeSchema;

/// Named-type expansions allowed without descending into the data.
const MAX_HOPS: usize = 64;

const SEVERAL_ISSUES: &str = "Several possible issues may have occurred with the given data.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Dotted path from the root, empty at the root.
    pub path: String,
    pub value: Value,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str("Root validation ")?;
        } else {
            write!(f, "Validation path `{}` ", self.path)?;
        }
        write!(f, "failed for value `{}` because:\n  {}", self.value, self.message)
    }
}

/// One paragraph per violation; more than one gets a leading note.
pub fn report(violations: &[Violation]) -> String {
    let paragraphs = violations.iter().map(ToString::to_string).collect::<Vec<_>>();
    match paragraphs.len() {
        0 | 1 => paragraphs.concat(),
        _ => format!("{SEVERAL_ISSUES}\n\n{}", paragraphs.join("\n\n")),
    }
}

/// Structural check only. An empty result means `value` conforms.
pub fn check_value(source: &dyn TypeSource, annotation: &Annotation, value: &Value) -> Vec<Violation> {
    let mut checker = Checker { source, path: Vec::new(), violations: Vec::new() };
    checker.check(annotation, value, &Rc::new(Scope::default()), 0);
    checker.violations
}

/// Validates against a compiled schema's root type, then converts into `T`.
pub struct JsonValidator<T> {
    schema: Arc<TypeSchema>,
    _target: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonValidator<T> {
    fn clone(&self) -> Self {
        Self { schema: Arc::clone(&self.schema), _target: PhantomData }
    }
}

impl<T> fmt::Debug for JsonValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonValidator").field("type_name", &self.schema.type_name()).finish()
    }
}

impl<T: DeserializeOwned> JsonValidator<T> {
    pub fn new(schema: Arc<TypeSchema>) -> Self {
        Self { schema, _target: PhantomData }
    }

    pub fn schema(&self) -> &Arc<TypeSchema> {
        &self.schema
    }

    pub fn check(&self, value: &Value) -> Result<(), ValidationError> {
        let violations = check_value(self.schema.source(), &self.schema.root_annotation(), value);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Shape { message: report(&violations), violations })
        }
    }

    pub fn validate_value(&self, value: Value) -> Result<T, ValidationError> {
        self.check(&value)?;
        from_value_with_path(value)
    }

    pub fn validate_str(&self, text: &str) -> Result<T, ValidationError> {
        let value: Value = serde_json::from_str(text).map_err(|err| ValidationError::Parse(err.to_string()))?;
        self.validate_value(value)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CHECKER
// ————————————————————————————————————————————————————————————————————————————

/// Generic bindings and the innermost enclosing record (`self`). Bound
/// annotations are already substituted, so they never mention outer vars.
#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Annotation>,
    this: Option<Annotation>,
}

struct ShapeField<'a> {
    name: &'a str,
    annotation: &'a Annotation,
    optional: bool,
    scope: Rc<Scope>,
}

/// A record's own fields followed by inherited ones; the subtype wins on
/// name clashes.
struct Shape<'a> {
    fields: Vec<ShapeField<'a>>,
    extra: Option<(&'a Annotation, Rc<Scope>)>,
}

struct Checker<'a> {
    source: &'a dyn TypeSource,
    path: Vec<String>,
    violations: Vec<Violation>,
}

impl<'a> Checker<'a> {
    fn fail(&mut self, value: &Value, message: impl Into<String>) {
        self.violations.push(Violation {
            path: self.path.join("."),
            value: value.clone(),
            message: message.into(),
        });
    }

    fn check(&mut self, annotation: &Annotation, value: &Value, scope: &Rc<Scope>, hops: usize) {
        match annotation {
            Annotation::Required(inner) | Annotation::NotRequired(inner) => self.check(inner, value, scope, hops),
            Annotation::Documented { inner, .. } => self.check(inner, value, scope, hops),
            Annotation::Any => {}
            Annotation::String => {
                if !value.is_string() {
                    self.fail(value, "Input should be a valid string");
                }
            }
            Annotation::Number => {
                if !value.is_number() {
                    self.fail(value, "Input should be a valid number");
                }
            }
            Annotation::Integer => {
                if !(value.is_i64() || value.is_u64()) {
                    self.fail(value, "Input should be a valid integer");
                }
            }
            Annotation::Boolean => {
                if !value.is_boolean() {
                    self.fail(value, "Input should be a valid boolean");
                }
            }
            Annotation::Null => {
                if !value.is_null() {
                    self.fail(value, "Input should be null");
                }
            }
            Annotation::Never => self.fail(value, "No value is allowed here"),
            Annotation::SelfType => {
                if let Some(this) = &scope.this {
                    self.check(this, value, scope, hops + 1);
                }
            }
            // unbound variables accept anything
            Annotation::Var(name) => {
                if let Some(bound) = scope.bindings.get(name) {
                    self.check(bound, value, scope, hops + 1);
                }
            }
            Annotation::Named { key, args } => self.check_named(key, args, value, scope, hops),
            Annotation::List(element) => self.check_items(element.as_deref(), value, scope),
            Annotation::VariadicTuple(element) => self.check_items(Some(&**element), value, scope),
            Annotation::Tuple(elements) => self.check_tuple(elements, value, scope),
            Annotation::Map { key, value: value_type } => {
                self.check_map(key.as_deref(), value_type.as_deref(), value, scope)
            }
            Annotation::Union(members) => self.check_union(members, value, scope, hops),
            Annotation::Literal(choices) => {
                if !choices.iter().any(|choice| literal_matches(choice, value)) {
                    let expected = choices.iter().map(literal_to_value).collect::<Vec<_>>();
                    self.fail(value, expected_literals(&expected));
                }
            }
        }
    }

    fn check_items(&mut self, element: Option<&Annotation>, value: &Value, scope: &Rc<Scope>) {
        let Some(items) = value.as_array() else {
            self.fail(value, "Input should be a valid array");
            return;
        };
        let Some(element) = element else { return };
        for (index, item) in items.iter().enumerate() {
            self.path.push(index.to_string());
            self.check(element, item, scope, 0);
            self.path.pop();
        }
    }

    fn check_tuple(&mut self, elements: &[Annotation], value: &Value, scope: &Rc<Scope>) {
        let Some(items) = value.as_array() else {
            self.fail(value, "Input should be a valid array");
            return;
        };
        if items.len() != elements.len() {
            self.fail(
                value,
                format!("Tuple should have exactly {} items, got {}", elements.len(), items.len()),
            );
        }
        for (index, (element, item)) in elements.iter().zip(items).enumerate() {
            self.path.push(index.to_string());
            self.check(element, item, scope, 0);
            self.path.pop();
        }
    }

    fn check_map(
        &mut self,
        key_type: Option<&Annotation>,
        value_type: Option<&Annotation>,
        value: &Value,
        scope: &Rc<Scope>,
    ) {
        let Some(object) = value.as_object() else {
            self.fail(value, "Input should be a valid object");
            return;
        };
        for (key, item) in object {
            self.path.push(key.clone());
            match key_type.map(Annotation::unwrapped) {
                Some(Annotation::Number) => {
                    if Number::from_str(key).is_err() {
                        self.fail(&Value::String(key.clone()), "Key should be a valid number");
                    }
                }
                Some(Annotation::Integer) => {
                    if key.parse::<i64>().is_err() && key.parse::<u64>().is_err() {
                        self.fail(&Value::String(key.clone()), "Key should be a valid integer");
                    }
                }
                // keys render as `string` otherwise; only narrower string shapes are checked
                Some(narrow)
                    if matches!(narrow, Annotation::Literal(_) | Annotation::Named { .. } | Annotation::Union(_)) =>
                {
                    self.check(narrow, &Value::String(key.clone()), scope, 0);
                }
                _ => {}
            }
            if let Some(value_type) = value_type {
                self.check(value_type, item, scope, 0);
            }
            self.path.pop();
        }
    }

    fn check_named(&mut self, key: &TypeKey, args: &[Annotation], value: &Value, scope: &Rc<Scope>, hops: usize) {
        if hops >= MAX_HOPS {
            self.fail(value, format!("Type `{key}` does not resolve to a concrete shape"));
            return;
        }
        let source = self.source;
        // dangling references render as `any`
        let Some(def) = source.lookup(key) else { return };
        match def {
            TypeDef::Opaque { .. } => {
                if !value.is_object() {
                    self.fail(value, "Input should be a valid object");
                }
            }
            TypeDef::Alias(alias) => {
                let inner = Rc::new(Scope {
                    bindings: bind_params(&alias.type_params, args, scope),
                    this: scope.this.clone(),
                });
                self.check(&alias.target, value, &inner, hops + 1);
            }
            TypeDef::Record(record) => {
                let inner = record_scope(key, record, args, scope);
                self.check_record(record, value, &inner);
            }
        }
    }

    fn check_record(&mut self, record: &'a RecordDef, value: &Value, scope: &Rc<Scope>) {
        let Some(object) = value.as_object() else {
            self.fail(value, "Input should be a valid object");
            return;
        };
        let shape = self.shape_of(record, scope);

        for field in &shape.fields {
            self.path.push(field.name.to_string());
            match object.get(field.name) {
                Some(item) => self.check(field.annotation, item, &field.scope, 0),
                None if !field.optional => self.fail(value, "Field required"),
                None => {}
            }
            self.path.pop();
        }

        for (name, item) in object {
            if shape.fields.iter().any(|field| field.name == name) {
                continue;
            }
            self.path.push(name.clone());
            match &shape.extra {
                Some((extra, extra_scope)) => self.check(extra, item, extra_scope, 0),
                None => self.fail(item, "Extra inputs are not permitted"),
            }
            self.path.pop();
        }
    }

    fn shape_of(&self, record: &'a RecordDef, scope: &Rc<Scope>) -> Shape<'a> {
        let mut shape = Shape { fields: Vec::new(), extra: None };
        let mut visited = HashSet::new();
        self.collect_shape(record, scope, &mut shape, &mut visited);
        shape
    }

    fn collect_shape(
        &self,
        record: &'a RecordDef,
        scope: &Rc<Scope>,
        shape: &mut Shape<'a>,
        visited: &mut HashSet<&'a TypeKey>,
    ) {
        for field in &record.fields {
            if shape.fields.iter().any(|seen| seen.name == field.name) {
                continue;
            }
            shape.fields.push(ShapeField {
                name: &field.name,
                annotation: &field.annotation,
                optional: is_optional(field),
                scope: Rc::clone(scope),
            });
        }
        if shape.extra.is_none() {
            if let Some(extra) = &record.extra {
                shape.extra = Some((extra, Rc::clone(scope)));
            }
        }

        let source = self.source;
        for base in &record.bases {
            let Annotation::Named { key, args } = base.unwrapped() else { continue };
            if !visited.insert(key) {
                continue;
            }
            if let Some(TypeDef::Record(parent)) = source.lookup(key) {
                // inherited fields still see the derived record as `self`
                let parent_scope = Rc::new(Scope {
                    bindings: bind_params(&parent.type_params, args, scope),
                    this: scope.this.clone(),
                });
                self.collect_shape(parent, &parent_scope, shape, visited);
            }
        }
    }

    // ------------------------------ unions ------------------------------ //

    fn check_union(&mut self, members: &[Annotation], value: &Value, scope: &Rc<Scope>, hops: usize) {
        // each member is walked once; the chosen member's findings are replayed
        let mut attempts = Vec::with_capacity(members.len());
        for member in members {
            let found = self.attempt(member, value, scope, hops);
            if found.is_empty() {
                return;
            }
            attempts.push((member, found));
        }

        if let Some(choices) = self.literal_choices(members, scope, hops) {
            self.fail(value, expected_literals(&choices));
            return;
        }

        // narrow by JSON kind, then by discriminator properties
        let mut candidates = attempts
            .into_iter()
            .filter(|(member, _)| self.kind_matches(member, value, scope, hops))
            .collect::<Vec<_>>();
        if candidates.len() != 1 {
            candidates.retain(|(member, _)| self.discriminates(member, value, scope, hops) == Some(true));
        }
        match candidates.pop() {
            Some((_, found)) if candidates.is_empty() => self.violations.extend(found),
            _ => self.fail(value, "Input does not match any member of the union"),
        }
    }

    /// Run a check in isolation and hand back what it found.
    fn attempt(
        &mut self,
        annotation: &Annotation,
        value: &Value,
        scope: &Rc<Scope>,
        hops: usize,
    ) -> Vec<Violation> {
        let mark = self.violations.len();
        self.check(annotation, value, scope, hops + 1);
        self.violations.split_off(mark)
    }

    /// All allowed values when every member is a literal, `null`, or an
    /// alias of those.
    fn literal_choices(&self, members: &[Annotation], scope: &Rc<Scope>, hops: usize) -> Option<Vec<Value>> {
        if hops >= MAX_HOPS {
            return None;
        }
        let mut out = Vec::new();
        for member in members {
            match member.unwrapped() {
                Annotation::Literal(choices) => out.extend(choices.iter().map(literal_to_value)),
                Annotation::Null => out.push(Value::Null),
                Annotation::Union(inner) => out.extend(self.literal_choices(inner, scope, hops + 1)?),
                Annotation::Named { key, args } => match self.source.lookup(key) {
                    Some(TypeDef::Alias(alias)) => {
                        let inner = Rc::new(Scope {
                            bindings: bind_params(&alias.type_params, args, scope),
                            this: scope.this.clone(),
                        });
                        out.extend(self.literal_choices(std::slice::from_ref(&alias.target), &inner, hops + 1)?);
                    }
                    _ => return None,
                },
                _ => return None,
            }
        }
        Some(out)
    }

    /// Could `annotation` accept a value of this JSON kind at all?
    fn kind_matches(&self, annotation: &Annotation, value: &Value, scope: &Rc<Scope>, hops: usize) -> bool {
        if hops >= MAX_HOPS {
            return false;
        }
        match annotation.unwrapped() {
            Annotation::Any => true,
            Annotation::String => value.is_string(),
            Annotation::Number | Annotation::Integer => value.is_number(),
            Annotation::Boolean => value.is_boolean(),
            Annotation::Null => value.is_null(),
            Annotation::Never => false,
            Annotation::SelfType => match &scope.this {
                Some(this) => self.kind_matches(this, value, scope, hops + 1),
                None => true,
            },
            Annotation::Var(name) => match scope.bindings.get(name) {
                Some(bound) => self.kind_matches(bound, value, scope, hops + 1),
                None => true,
            },
            Annotation::Named { key, args } => match self.source.lookup(key) {
                None => true,
                Some(TypeDef::Record(_) | TypeDef::Opaque { .. }) => value.is_object(),
                Some(TypeDef::Alias(alias)) => {
                    let inner = Rc::new(Scope {
                        bindings: bind_params(&alias.type_params, args, scope),
                        this: scope.this.clone(),
                    });
                    self.kind_matches(&alias.target, value, &inner, hops + 1)
                }
            },
            Annotation::List(_) | Annotation::VariadicTuple(_) | Annotation::Tuple(_) => value.is_array(),
            Annotation::Map { .. } => value.is_object(),
            Annotation::Union(members) => members.iter().any(|m| self.kind_matches(m, value, scope, hops + 1)),
            Annotation::Literal(choices) => choices.iter().any(|choice| {
                matches!(
                    (choice, value),
                    (LiteralValue::Null, Value::Null)
                        | (LiteralValue::Bool(_), Value::Bool(_))
                        | (LiteralValue::Number(_), Value::Number(_))
                        | (LiteralValue::String(_), Value::String(_))
                )
            }),
            Annotation::Required(_) | Annotation::NotRequired(_) | Annotation::Documented { .. } => true,
        }
    }

    /// `None` when `annotation` is not a record with literal-typed fields;
    /// otherwise whether `value` agrees with all of them.
    fn discriminates(&self, annotation: &Annotation, value: &Value, scope: &Rc<Scope>, hops: usize) -> Option<bool> {
        let object = value.as_object()?;
        let (record, record_scope) = self.resolve_record(annotation, scope, hops)?;
        let shape = self.shape_of(record, &record_scope);
        let mut seen_literal = false;
        for field in &shape.fields {
            let Annotation::Literal(choices) = field.annotation.unwrapped() else { continue };
            seen_literal = true;
            let agrees = object
                .get(field.name)
                .is_some_and(|item| choices.iter().any(|choice| literal_matches(choice, item)));
            if !agrees {
                return Some(false);
            }
        }
        seen_literal.then_some(true)
    }

    fn resolve_record(
        &self,
        annotation: &Annotation,
        scope: &Rc<Scope>,
        hops: usize,
    ) -> Option<(&'a RecordDef, Rc<Scope>)> {
        if hops >= MAX_HOPS {
            return None;
        }
        let source = self.source;
        match annotation.unwrapped() {
            Annotation::Named { key, args } => match source.lookup(key)? {
                TypeDef::Record(record) => Some((record, record_scope(key, record, args, scope))),
                TypeDef::Alias(alias) => {
                    let inner = Rc::new(Scope {
                        bindings: bind_params(&alias.type_params, args, scope),
                        this: scope.this.clone(),
                    });
                    self.resolve_record(&alias.target, &inner, hops + 1)
                }
                TypeDef::Opaque { .. } => None,
            },
            Annotation::SelfType => self.resolve_record(scope.this.as_ref()?, scope, hops + 1),
            Annotation::Var(name) => self.resolve_record(scope.bindings.get(name)?, scope, hops + 1),
            _ => None,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn record_scope(key: &TypeKey, record: &RecordDef, args: &[Annotation], scope: &Scope) -> Rc<Scope> {
    let bound = args.iter().map(|arg| substitute(arg, scope)).collect::<Vec<_>>();
    let bindings = record.type_params.iter().cloned().zip(bound.iter().cloned()).collect();
    Rc::new(Scope {
        bindings,
        this: Some(Annotation::Named { key: key.clone(), args: bound }),
    })
}

/// Missing arguments leave the parameter unbound.
fn bind_params(params: &[String], args: &[Annotation], scope: &Scope) -> HashMap<String, Annotation> {
    params.iter().cloned().zip(args.iter().map(|arg| substitute(arg, scope))).collect()
}

/// Replace variables and `self` with what they mean in `scope`. Unbound
/// ones become `any` so they cannot be captured by a callee's parameters.
fn substitute(annotation: &Annotation, scope: &Scope) -> Annotation {
    let boxed = |inner: &Annotation| Box::new(substitute(inner, scope));
    match annotation {
        Annotation::Var(name) => scope.bindings.get(name).cloned().unwrap_or(Annotation::Any),
        Annotation::SelfType => scope.this.clone().unwrap_or(Annotation::Any),
        Annotation::Named { key, args } => Annotation::Named {
            key: key.clone(),
            args: args.iter().map(|arg| substitute(arg, scope)).collect(),
        },
        Annotation::List(element) => Annotation::List(element.as_deref().map(boxed)),
        Annotation::Map { key, value } => Annotation::Map {
            key: key.as_deref().map(boxed),
            value: value.as_deref().map(boxed),
        },
        Annotation::Tuple(elements) => Annotation::Tuple(elements.iter().map(|e| substitute(e, scope)).collect()),
        Annotation::VariadicTuple(element) => Annotation::VariadicTuple(Box::new(substitute(element, scope))),
        Annotation::Union(members) => Annotation::Union(members.iter().map(|m| substitute(m, scope)).collect()),
        Annotation::Required(inner) => Annotation::Required(Box::new(substitute(inner, scope))),
        Annotation::NotRequired(inner) => Annotation::NotRequired(Box::new(substitute(inner, scope))),
        Annotation::Documented { doc, inner } => Annotation::Documented {
            doc: doc.clone(),
            inner: Box::new(substitute(inner, scope)),
        },
        other => other.clone(),
    }
}

/// Outermost optionality wrapper wins over the field default.
fn is_optional(field: &FieldDef) -> bool {
    let mut current = &field.annotation;
    loop {
        match current {
            Annotation::Required(_) => return false,
            Annotation::NotRequired(_) => return true,
            Annotation::Documented { inner, .. } => current = inner,
            _ => return field.optional,
        }
    }
}

fn literal_matches(choice: &LiteralValue, value: &Value) -> bool {
    match (choice, value) {
        (LiteralValue::Null, Value::Null) => true,
        (LiteralValue::Bool(a), Value::Bool(b)) => a == b,
        (LiteralValue::String(a), Value::String(b)) => a == b,
        (LiteralValue::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => false,
    }
}

fn literal_to_value(choice: &LiteralValue) -> Value {
    match choice {
        LiteralValue::Null => Value::Null,
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Number(n) => Value::Number(n.clone()),
        LiteralValue::String(s) => Value::String(s.clone()),
    }
}

fn expected_literals(choices: &[Value]) -> String {
    let rendered = choices.iter().map(ToString::to_string).collect::<Vec<_>>();
    match rendered.as_slice() {
        [] => "No value is allowed here".to_string(),
        [only] => format!("Input should be {only}"),
        [init @ .., last] => format!("Input should be {} or {last}", init.join(", ")),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{AliasDef, TypeRegistry};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    fn order_registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.insert(
            "Order",
            RecordDef::new("Order").field(FieldDef::new("items", Annotation::list(Annotation::named("Item")))),
        );
        reg.insert(
            "Item",
            RecordDef::new("Item")
                .field(FieldDef::new("name", Annotation::String))
                .field(FieldDef::new("quantity", Annotation::Number))
                .field(FieldDef::new("size", Annotation::literals(["short", "tall", "grande"])).optional()),
        );
        reg
    }

    fn check(reg: &TypeRegistry, root: &str, value: Value) -> Vec<Violation> {
        check_value(reg, &Annotation::named(root), &value)
    }

    #[test]
    fn nested_violation_is_path_qualified() {
        let reg = order_registry();
        let violations = check(&reg, "Order", json!({"items": [{"name": "latte", "quantity": "not-a-number"}]}));
        assert_eq!(violations.len(), 1);
        assert_eq!(
            report(&violations),
            "Validation path `items.0.quantity` failed for value `\"not-a-number\"` because:\n  \
             Input should be a valid number"
        );
    }

    #[test]
    fn every_violation_is_reported() {
        let reg = order_registry();
        let violations = check(
            &reg,
            "Order",
            json!({"items": [{"quantity": 1, "size": "venti", "milk": true}]}),
        );
        let paths = violations.iter().map(|v| v.path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, vec!["items.0.name", "items.0.size", "items.0.milk"]);
        let text = report(&violations);
        assert!(text.starts_with("Several possible issues may have occurred with the given data.\n\n"));
        assert!(text.contains("Field required"));
        assert!(text.contains(r#"Input should be "short", "tall" or "grande""#));
        assert!(text.contains("Extra inputs are not permitted"));
    }

    #[test]
    fn root_failures_say_root() {
        let reg = order_registry();
        let text = report(&check(&reg, "Order", json!([1, 2])));
        assert_eq!(text, "Root validation failed for value `[1,2]` because:\n  Input should be a valid object");
    }

    #[test]
    fn kinds_never_coerce() {
        let reg = TypeRegistry::new();
        assert_eq!(check_value(&reg, &Annotation::Number, &json!("3")).len(), 1);
        assert_eq!(check_value(&reg, &Annotation::Boolean, &json!(1)).len(), 1);
        assert_eq!(check_value(&reg, &Annotation::Integer, &json!(1.5)).len(), 1);
        assert!(check_value(&reg, &Annotation::Integer, &json!(-4)).is_empty());
        assert_eq!(check_value(&reg, &Annotation::String, &json!(null)).len(), 1);
        assert!(check_value(&reg, &Annotation::Any, &json!({"x": [1]})).is_empty());
    }

    #[test]
    fn open_records_check_unlisted_properties() {
        let mut reg = TypeRegistry::new();
        reg.insert(
            "Tags",
            RecordDef::new("Tags")
                .field(FieldDef::new("id", Annotation::String))
                .extra(Annotation::Number),
        );
        assert!(check(&reg, "Tags", json!({"id": "a", "x": 1, "y": 2.5})).is_empty());
        let violations = check(&reg, "Tags", json!({"id": "a", "x": "1"}));
        assert_eq!(violations[0].path, "x");
    }

    #[test]
    fn nullable_record_reports_the_record_violation() {
        let mut reg = order_registry();
        reg.insert(
            "Cart",
            RecordDef::new("Cart").field(FieldDef::new("current", Annotation::nullable(Annotation::named("Item")))),
        );
        assert!(check(&reg, "Cart", json!({"current": null})).is_empty());
        let violations = check(&reg, "Cart", json!({"current": {"name": "mocha"}}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "current.quantity");
    }

    #[test]
    fn discriminated_union_reports_the_matching_member() {
        let mut reg = TypeRegistry::new();
        reg.insert(
            "Shape",
            AliasDef::new("Shape", Annotation::Union(vec![Annotation::named("Circle"), Annotation::named("Square")])),
        );
        reg.insert(
            "Circle",
            RecordDef::new("Circle")
                .field(FieldDef::new("kind", Annotation::literals(["circle"])))
                .field(FieldDef::new("radius", Annotation::Number)),
        );
        reg.insert(
            "Square",
            RecordDef::new("Square")
                .field(FieldDef::new("kind", Annotation::literals(["square"])))
                .field(FieldDef::new("side", Annotation::Number)),
        );
        let violations = check(&reg, "Shape", json!({"kind": "square", "side": "big"}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "side");

        let violations = check(&reg, "Shape", json!({"kind": "triangle"}));
        assert_eq!(violations[0].message, "Input does not match any member of the union");
    }

    #[test]
    fn union_of_literal_aliases_lists_choices() {
        let mut reg = TypeRegistry::new();
        reg.insert("Size", AliasDef::new("Size", Annotation::literals(["S", "M"])));
        let ann = Annotation::Union(vec![Annotation::named("Size"), Annotation::literals(["XL"]), Annotation::Null]);
        let violations = check_value(&reg, &ann, &json!("XS"));
        assert_eq!(violations[0].message, r#"Input should be "S", "M", "XL" or null"#);
    }

    #[test]
    fn inherited_fields_bind_generic_arguments() {
        let mut reg = TypeRegistry::new();
        reg.insert(
            "Box",
            RecordDef::new("Box")
                .type_param("T")
                .field(FieldDef::new("value", Annotation::var("T"))),
        );
        reg.insert(
            "Labeled",
            RecordDef::new("Labeled")
                .base(Annotation::generic("Box", vec![Annotation::String]))
                .field(FieldDef::new("label", Annotation::String)),
        );
        assert!(check(&reg, "Labeled", json!({"label": "a", "value": "b"})).is_empty());
        let violations = check(&reg, "Labeled", json!({"label": "a", "value": 3}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "value");
        assert_eq!(check(&reg, "Labeled", json!({"label": "a"}))[0].message, "Field required");
    }

    #[test]
    fn self_checks_the_enclosing_record() {
        let mut reg = TypeRegistry::new();
        reg.insert(
            "Node",
            RecordDef::new("Node")
                .field(FieldDef::new("name", Annotation::String))
                .field(FieldDef::new("children", Annotation::list(Annotation::SelfType))),
        );
        let tree = json!({"name": "a", "children": [{"name": "b", "children": [{"name": 1, "children": []}]}]});
        let violations = check(&reg, "Node", tree);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "children.0.children.0.name");
    }

    #[test]
    fn self_referential_alias_is_bounded() {
        let mut reg = TypeRegistry::new();
        reg.insert("Loop", AliasDef::new("Loop", Annotation::named("Loop")));
        let violations = check(&reg, "Loop", json!(1));
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn tuples_check_length_and_positions() {
        let reg = TypeRegistry::new();
        let pair = Annotation::Tuple(vec![Annotation::String, Annotation::Number]);
        assert!(check_value(&reg, &pair, &json!(["a", 1])).is_empty());
        let violations = check_value(&reg, &pair, &json!(["a", "b", 3]));
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[1].path, "1");
    }

    #[test]
    fn numeric_map_keys_are_checked() {
        let reg = TypeRegistry::new();
        let ann = Annotation::map(Annotation::Integer, Annotation::Boolean);
        assert!(check_value(&reg, &ann, &json!({"1": true})).is_empty());
        assert_eq!(check_value(&reg, &ann, &json!({"one": true}))[0].path, "one");

        let fractional = check_value(&reg, &ann, &json!({"1.5": true, "NaN": true, "-7": true}));
        let paths = fractional.iter().map(|v| v.path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, ["1.5", "NaN"]);
        assert_eq!(fractional[0].message, "Key should be a valid integer");

        let ann = Annotation::map(Annotation::Number, Annotation::Boolean);
        assert!(check_value(&reg, &ann, &json!({"1.5": true, "-2e3": true})).is_empty());
        let rejected = check_value(&reg, &ann, &json!({"inf": true, "NaN": true}));
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].message, "Key should be a valid number");
    }

    fn linked_list_registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.insert(
            "Node",
            RecordDef::new("Node")
                .field(FieldDef::new("value", Annotation::Number))
                .field(FieldDef::new("next", Annotation::nullable(Annotation::named("Node")))),
        );
        reg
    }

    fn chain(depth: usize, tail: Value) -> Value {
        (0..depth).fold(json!({"value": tail, "next": null}), |next, i| json!({"value": i, "next": next}))
    }

    #[test]
    fn deep_failing_chain_is_checked_in_linear_time() {
        let reg = linked_list_registry();
        let started = std::time::Instant::now();
        let violations = check(&reg, "Node", chain(40, json!("bad")));
        assert!(started.elapsed() < std::time::Duration::from_secs(2), "took {:?}", started.elapsed());

        assert_eq!(violations.len(), 1);
        let expected_path = std::iter::repeat_n("next", 40).chain(["value"]).collect::<Vec<_>>().join(".");
        assert_eq!(violations[0].path, expected_path);
        assert_eq!(violations[0].message, "Input should be a valid number");
    }

    #[test]
    fn recursive_discriminated_union_reports_the_deep_leaf_once() {
        let mut reg = TypeRegistry::new();
        reg.insert(
            "Expr",
            AliasDef::new("Expr", Annotation::Union(vec![Annotation::named("Num"), Annotation::named("Add")])),
        );
        reg.insert(
            "Num",
            RecordDef::new("Num")
                .field(FieldDef::new("kind", Annotation::literals(["num"])))
                .field(FieldDef::new("value", Annotation::Number)),
        );
        reg.insert(
            "Add",
            RecordDef::new("Add")
                .field(FieldDef::new("kind", Annotation::literals(["add"])))
                .field(FieldDef::new("left", Annotation::named("Expr")))
                .field(FieldDef::new("right", Annotation::named("Expr"))),
        );

        let leaf = json!({"kind": "num", "value": 1});
        let tree = (0..30).fold(json!({"kind": "num", "value": "x"}), |inner, _| {
            json!({"kind": "add", "left": inner, "right": leaf.clone()})
        });

        let started = std::time::Instant::now();
        let violations = check(&reg, "Expr", tree);
        assert!(started.elapsed() < std::time::Duration::from_secs(2), "took {:?}", started.elapsed());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].path.ends_with("left.left.value"));
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Item {
        name: String,
        quantity: f64,
        size: Option<String>,
    }

    #[test]
    fn typed_validation_is_idempotent() {
        let schema = Arc::new(TypeSchema::compile(order_registry(), "Item"));
        let validator = JsonValidator::<Item>::new(schema);
        let value = json!({"name": "latte", "quantity": 2, "size": "tall"});
        let first = validator.validate_value(value.clone()).unwrap();
        let second = validator.validate_value(value).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.size.as_deref(), Some("tall"));
    }

    #[test]
    fn text_that_is_not_json_is_a_parse_failure() {
        let schema = Arc::new(TypeSchema::compile(order_registry(), "Item"));
        let validator = JsonValidator::<Value>::new(schema);
        let err = validator.validate_str("{\"name\": ").unwrap_err();
        assert!(matches!(err, ValidationError::Parse(_)));
        assert!(err.to_string().starts_with("Failed to parse JSON:"));
    }
}
