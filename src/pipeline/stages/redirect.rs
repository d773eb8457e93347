//! Field access redirection: raw `get`/`set` ops become accessor calls
//! wherever the matching accessor exists.
//!
//! The accessors themselves are exempt whether synthesized or hand-written
//! (their raw ops are the implementation), as are other synthetic methods
//! and internal methods, which opt out by the leading underscore
//! convention.

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use crate::model::{ClassModel, Op};
use crate::pipeline::{Stage, StageContext, StageError, StageOutcome};

pub struct FieldAccessRedirection;

impl Stage for FieldAccessRedirection {
    fn name(&self) -> &'static str {
        "field-access-redirection"
    }

    fn version(&self) -> u32 {
        2
    }

    fn apply(
        &self,
        model: &mut ClassModel,
        _ctx: &StageContext<'_>,
    ) -> Result<StageOutcome, StageError> {
        let method_names: FxHashSet<&str> =
            model.methods.iter().map(|m| m.name.as_str()).collect();

        let mut readers = FxHashMap::default();
        let mut writers = FxHashMap::default();
        for field in &model.fields {
            let reader = ClassModel::reader_name(field);
            if method_names.contains(reader.as_str()) {
                readers.insert(field.name.clone(), reader);
            }
            if !field.is_final {
                let writer = ClassModel::writer_name(field);
                if method_names.contains(writer.as_str()) {
                    writers.insert(field.name.clone(), writer);
                }
            }
        }

        // Redirecting inside an accessor body would turn it into a call to
        // itself; hand-written accessors are exempt like synthesized ones.
        let accessor_names: FxHashSet<&String> =
            readers.values().chain(writers.values()).collect();

        let mut changed = false;
        for method in &mut model.methods {
            if method.synthetic
                || method.is_internal()
                || accessor_names.contains(&method.name)
            {
                continue;
            }
            for op in &mut method.body {
                let target = match op {
                    Op::GetField(f) => readers.get(f),
                    Op::SetField(f) => writers.get(f),
                    Op::Call(_) => None,
                };
                if let Some(accessor) = target {
                    *op = Op::Call(accessor.clone());
                    changed = true;
                }
            }
        }
        Ok(if changed {
            StageOutcome::Changed
        } else {
            StageOutcome::Unchanged
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::QualifiedName;
    use crate::model::{ClassKind, FieldModel, MethodModel, TypeRef};

    fn apply(model: &mut ClassModel) -> StageOutcome {
        let config = Config::rooted_at(".");
        FieldAccessRedirection
            .apply(model, &StageContext { config: &config })
            .unwrap()
    }

    fn model_with_accessors() -> ClassModel {
        let mut model = ClassModel::new(QualifiedName::new("a.Foo"), ClassKind::Class);
        model.fields.push(FieldModel {
            name: "count".into(),
            ty: TypeRef::Int,
            is_final: false,
            inject: false,
        });
        model.methods.push(MethodModel::synthetic(
            "getCount",
            vec![Op::GetField("count".into())],
        ));
        model.methods.push(MethodModel::synthetic(
            "setCount",
            vec![Op::SetField("count".into())],
        ));
        model
    }

    #[test]
    fn test_rewrites_raw_ops_to_calls() {
        let mut model = model_with_accessors();
        model.methods.push(MethodModel::new(
            "tick",
            vec![Op::GetField("count".into()), Op::SetField("count".into())],
        ));

        assert_eq!(apply(&mut model), StageOutcome::Changed);
        assert_eq!(
            model.method("tick").unwrap().body,
            vec![Op::Call("getCount".into()), Op::Call("setCount".into())]
        );
        // The accessors keep their raw ops.
        assert_eq!(
            model.method("getCount").unwrap().body,
            vec![Op::GetField("count".into())]
        );
    }

    #[test]
    fn test_hand_written_accessor_kept_raw() {
        let mut model = ClassModel::new(QualifiedName::new("a.Foo"), ClassKind::Class);
        model.fields.push(FieldModel {
            name: "count".into(),
            ty: TypeRef::Int,
            is_final: false,
            inject: false,
        });
        // Developer-written accessor pair, not synthesized.
        model.methods.push(MethodModel::new(
            "getCount",
            vec![Op::GetField("count".into())],
        ));
        model.methods.push(MethodModel::new(
            "setCount",
            vec![Op::SetField("count".into())],
        ));
        model
            .methods
            .push(MethodModel::new("tick", vec![Op::GetField("count".into())]));

        assert_eq!(apply(&mut model), StageOutcome::Changed);
        assert_eq!(
            model.method("tick").unwrap().body,
            vec![Op::Call("getCount".into())]
        );
        // The accessors themselves keep their raw ops.
        assert_eq!(
            model.method("getCount").unwrap().body,
            vec![Op::GetField("count".into())]
        );
        assert_eq!(
            model.method("setCount").unwrap().body,
            vec![Op::SetField("count".into())]
        );
    }

    #[test]
    fn test_internal_methods_exempt() {
        let mut model = model_with_accessors();
        model
            .methods
            .push(MethodModel::new("_raw", vec![Op::GetField("count".into())]));

        apply(&mut model);
        assert_eq!(
            model.method("_raw").unwrap().body,
            vec![Op::GetField("count".into())]
        );
    }

    #[test]
    fn test_missing_accessor_leaves_op() {
        let mut model = ClassModel::new(QualifiedName::new("a.Foo"), ClassKind::Class);
        model.fields.push(FieldModel {
            name: "x".into(),
            ty: TypeRef::Int,
            is_final: false,
            inject: false,
        });
        model
            .methods
            .push(MethodModel::new("tick", vec![Op::GetField("x".into())]));

        assert_eq!(apply(&mut model), StageOutcome::Unchanged);
    }

    #[test]
    fn test_idempotent() {
        let mut model = model_with_accessors();
        model
            .methods
            .push(MethodModel::new("tick", vec![Op::GetField("count".into())]));
        apply(&mut model);
        assert_eq!(apply(&mut model), StageOutcome::Unchanged);
    }
}
