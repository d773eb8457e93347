//! Structured class model: kind, fields, methods, markers.

use serde::{Deserialize, Serialize};

use crate::core::QualifiedName;

/// What kind of type a model describes. Only concrete classes are eligible
/// for enhancement; the pipeline skips the rest silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Annotation,
}

/// Field or parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    Bool,
    Int,
    Str,
    Named(String),
    /// Lazy-provider wrapper produced by the lazy-binding stage.
    Provider(Box<TypeRef>),
}

impl TypeRef {
    pub fn is_provider(&self) -> bool {
        matches!(self, TypeRef::Provider(_))
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldModel {
    pub name: String,
    pub ty: TypeRef,
    pub is_final: bool,
    /// Marked for deferred dependency injection (`inject` keyword).
    pub inject: bool,
}

/// One instruction in a method body. Deliberately small: enough structure
/// for access rewriting and helper synthesis, opaque beyond that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Read a field by name.
    GetField(String),
    /// Write a field by name.
    SetField(String),
    /// Invoke a method by name (same class or external, dotted).
    Call(String),
}

/// One declared or synthesized method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodModel {
    pub name: String,
    pub body: Vec<Op>,
    /// Synthesized by a pipeline stage, not written by the developer.
    #[serde(default)]
    pub synthetic: bool,
}

impl MethodModel {
    pub fn new(name: impl Into<String>, body: Vec<Op>) -> Self {
        Self {
            name: name.into(),
            body,
            synthetic: false,
        }
    }

    pub fn synthetic(name: impl Into<String>, body: Vec<Op>) -> Self {
        Self {
            name: name.into(),
            body,
            synthetic: true,
        }
    }

    /// Internal methods (leading underscore) are exempt from access
    /// redirection.
    pub fn is_internal(&self) -> bool {
        self.name.starts_with('_')
    }
}

/// Structured in-memory class representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassModel {
    pub name: QualifiedName,
    pub kind: ClassKind,
    pub superclass: Option<QualifiedName>,
    /// Recognized persistent-entity class (`entity` modifier).
    #[serde(default)]
    pub entity: bool,
    pub fields: Vec<FieldModel>,
    pub methods: Vec<MethodModel>,
    /// Stage application markers (`rekindle.<stage>`), checked for
    /// idempotency before a stage mutates.
    #[serde(default)]
    pub markers: Vec<String>,
}

impl ClassModel {
    pub fn new(name: QualifiedName, kind: ClassKind) -> Self {
        Self {
            name,
            kind,
            superclass: None,
            entity: false,
            fields: Vec::new(),
            methods: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Concrete classes are the only enhancement targets.
    pub fn is_concrete_class(&self) -> bool {
        self.kind == ClassKind::Class
    }

    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodModel> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.method(name).is_some()
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }

    pub fn add_marker(&mut self, marker: impl Into<String>) {
        let marker = marker.into();
        if !self.has_marker(&marker) {
            self.markers.push(marker);
        }
    }

    /// Accessor reader name for a field: `isActive` for bools, `getCount`
    /// otherwise.
    pub fn reader_name(field: &FieldModel) -> String {
        let prefix = if field.ty == TypeRef::Bool { "is" } else { "get" };
        format!("{prefix}{}", capitalize(&field.name))
    }

    /// Accessor writer name for a field: `setCount`.
    pub fn writer_name(field: &FieldModel) -> String {
        format!("set{}", capitalize(&field.name))
    }

    /// Structural shape used for redefinition compatibility: everything
    /// except method bodies and markers.
    pub fn shape(&self) -> ClassShape {
        ClassShape {
            kind: self.kind,
            superclass: self.superclass.clone(),
            entity: self.entity,
            fields: self.fields.clone(),
            method_names: {
                let mut names: Vec<String> =
                    self.methods.iter().map(|m| m.name.clone()).collect();
                names.sort();
                names
            },
        }
    }
}

/// Shape summary compared by the in-process redefinition gateway. Two models
/// with equal shapes differ at most in method bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassShape {
    pub kind: ClassKind,
    pub superclass: Option<QualifiedName>,
    pub entity: bool,
    pub fields: Vec<FieldModel>,
    pub method_names: Vec<String>,
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: TypeRef) -> FieldModel {
        FieldModel {
            name: name.to_string(),
            ty,
            is_final: false,
            inject: false,
        }
    }

    #[test]
    fn test_accessor_names() {
        assert_eq!(
            ClassModel::reader_name(&field("count", TypeRef::Int)),
            "getCount"
        );
        assert_eq!(
            ClassModel::reader_name(&field("active", TypeRef::Bool)),
            "isActive"
        );
        assert_eq!(
            ClassModel::writer_name(&field("count", TypeRef::Int)),
            "setCount"
        );
    }

    #[test]
    fn test_shape_ignores_bodies() {
        let mut a = ClassModel::new(QualifiedName::new("com.example.Foo"), ClassKind::Class);
        a.methods
            .push(MethodModel::new("tick", vec![Op::GetField("x".into())]));
        let mut b = a.clone();
        b.methods[0].body = vec![Op::Call("refresh".into())];
        assert_eq!(a.shape(), b.shape());

        b.fields.push(field("extra", TypeRef::Int));
        assert_ne!(a.shape(), b.shape());
    }

    #[test]
    fn test_markers_dedup() {
        let mut model = ClassModel::new(QualifiedName::new("Foo"), ClassKind::Class);
        model.add_marker("rekindle.accessors");
        model.add_marker("rekindle.accessors");
        assert_eq!(model.markers.len(), 1);
    }
}
