//! Pluggable codec between class models and their on-disk bytes.

use thiserror::Error;

use super::ClassModel;

/// Codec failure: the bytes did not round-trip through the class structure.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode class bytes")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode class model")]
    Encode(#[source] serde_json::Error),
}

/// Serialize class models to bytes and back. The default implementation is
/// JSON; a real class-file parser drops in behind this trait without
/// touching the pipeline or cache.
pub trait ClassCodec: Send + Sync {
    fn encode(&self, model: &ClassModel) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<ClassModel, CodecError>;
}

/// Default serde_json-backed codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ClassCodec for JsonCodec {
    fn encode(&self, model: &ClassModel) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(model).map_err(CodecError::Encode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<ClassModel, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::QualifiedName;
    use crate::model::{ClassKind, ClassModel};

    #[test]
    fn test_roundtrip() {
        let codec = JsonCodec;
        let model = ClassModel::new(QualifiedName::new("com.example.Foo"), ClassKind::Class);
        let bytes = codec.encode(&model).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(model, decoded);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(JsonCodec.decode(b"not a class").is_err());
    }
}
