//! Accessor synthesis: a reader per field, a writer per mutable field.
//!
//! Hand-written methods always win: a developer-provided `getCount` is left
//! alone. `inject` fields are owned by the lazy-binding stage and skipped
//! here.

use crate::model::{ClassModel, MethodModel, Op};
use crate::pipeline::{Stage, StageContext, StageError, StageOutcome};

pub struct AccessorSynthesis;

impl Stage for AccessorSynthesis {
    fn name(&self) -> &'static str {
        "accessor-synthesis"
    }

    fn version(&self) -> u32 {
        3
    }

    fn apply(
        &self,
        model: &mut ClassModel,
        _ctx: &StageContext<'_>,
    ) -> Result<StageOutcome, StageError> {
        let planned: Vec<MethodModel> = model
            .fields
            .iter()
            .filter(|f| !f.inject)
            .flat_map(|field| {
                let mut methods = Vec::new();
                let reader = ClassModel::reader_name(field);
                if !model.has_method(&reader) {
                    methods.push(MethodModel::synthetic(
                        reader,
                        vec![Op::GetField(field.name.clone())],
                    ));
                }
                if !field.is_final {
                    let writer = ClassModel::writer_name(field);
                    if !model.has_method(&writer) {
                        methods.push(MethodModel::synthetic(
                            writer,
                            vec![Op::SetField(field.name.clone())],
                        ));
                    }
                }
                methods
            })
            .collect();

        if planned.is_empty() {
            return Ok(StageOutcome::Unchanged);
        }
        model.methods.extend(planned);
        Ok(StageOutcome::Changed)
    }
}
