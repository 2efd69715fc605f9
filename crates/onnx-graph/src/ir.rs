use strum::{AsRefStr, Display, EnumString};

use crate::error::Error;
use crate::protos::tensor_proto::DataType;

/// The element type of a tensor.
///
/// Codes follow `TensorProto.DataType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ElementType {
    Float32,
    Float64,
    Int32,
    Int64,
    String,
    Float16,
    Bool,
    Uint16,
    Uint8,
    Int8,
}

impl ElementType {
    /// Decode a `TensorProto.DataType` code.
    pub fn from_proto(code: i32) -> Result<Self, Error> {
        use protobuf::Enum;

        match DataType::from_i32(code).ok_or(Error::UnknownElementType(code))? {
            DataType::FLOAT => Ok(Self::Float32),
            DataType::DOUBLE => Ok(Self::Float64),
            DataType::FLOAT16 => Ok(Self::Float16),
            DataType::INT64 => Ok(Self::Int64),
            DataType::INT32 => Ok(Self::Int32),
            DataType::UINT16 => Ok(Self::Uint16),
            DataType::UINT8 => Ok(Self::Uint8),
            DataType::INT8 => Ok(Self::Int8),
            DataType::BOOL => Ok(Self::Bool),
            DataType::STRING => Ok(Self::String),
            _ => Err(Error::UnknownElementType(code)),
        }
    }

    /// The `TensorProto.DataType` code for this type.
    pub fn proto_code(&self) -> i32 {
        use protobuf::Enum;

        let dt = match self {
            Self::Float32 => DataType::FLOAT,
            Self::Float64 => DataType::DOUBLE,
            Self::Float16 => DataType::FLOAT16,
            Self::Int64 => DataType::INT64,
            Self::Int32 => DataType::INT32,
            Self::Uint16 => DataType::UINT16,
            Self::Uint8 => DataType::UINT8,
            Self::Int8 => DataType::INT8,
            Self::Bool => DataType::BOOL,
            Self::String => DataType::STRING,
        };
        dt.value()
    }

    /// Size of one element in bytes, `None` for strings.
    pub fn byte_size(&self) -> Option<usize> {
        match self {
            Self::Float64 | Self::Int64 => Some(8),
            Self::Float32 | Self::Int32 => Some(4),
            Self::Float16 | Self::Uint16 => Some(2),
            Self::Uint8 | Self::Int8 | Self::Bool => Some(1),
            Self::String => None,
        }
    }
}

/// ONNX operator vocabulary.
///
/// See: <https://github.com/onnx/onnx/blob/main/docs/Operators.md>
#[derive(Debug, Hash, Eq, PartialEq, EnumString, Clone, Display, AsRefStr)]
pub enum NodeType {
    Abs,
    Acos,
    Acosh,
    Add,
    And,
    ArgMax,
    ArgMin,
    Asin,
    Asinh,
    Atan,
    Atanh,
    AveragePool,
    BatchNormalization,
    Bernoulli,
    BitShift,
    BitwiseAnd,
    BitwiseNot,
    BitwiseOr,
    BitwiseXor,
    BlackmanWindow,
    Cast,
    CastLike,
    Ceil,
    Celu,
    CenterCropPad,
    Clip,
    Compress,
    Concat,
    ConcatFromSequence,
    Constant,
    ConstantOfShape,
    Conv,
    ConvInteger,
    ConvTranspose,
    Cos,
    Cosh,
    CumSum,
    DepthToSpace,
    DequantizeLinear,
    Det,
    DFT,
    Div,
    Dropout,
    DynamicQuantizeLinear,
    Einsum,
    Elu,
    Equal,
    Erf,
    Exp,
    Expand,
    EyeLike,
    Flatten,
    Floor,
    Gather,
    GatherElements,
    GatherND,
    Gelu,
    Gemm,
    GlobalAveragePool,
    GlobalLpPool,
    GlobalMaxPool,
    Greater,
    GreaterOrEqual,
    GridSample,
    GroupNormalization,
    GRU,
    HammingWindow,
    HannWindow,
    Hardmax,
    HardSigmoid,
    HardSwish,
    Identity,
    If,
    InstanceNormalization,
    IsInf,
    IsNaN,
    LayerNormalization,
    LeakyRelu,
    Less,
    LessOrEqual,
    Log,
    LogSoftmax,
    Loop,
    LpNormalization,
    LpPool,
    LRN,
    LSTM,
    MatMul,
    MatMulInteger,
    Max,
    MaxPool,
    MaxRoiPool,
    MaxUnpool,
    Mean,
    MeanVarianceNormalization,
    MelWeightMatrix,
    Min,
    Mish,
    Mod,
    Mul,
    Multinomial,
    Neg,
    NonMaxSuppression,
    NonZero,
    Not,
    OneHot,
    Or,
    Pad,
    Pow,
    PRelu,
    QLinearConv,
    QLinearMatMul,
    QuantizeLinear,
    RandomNormal,
    RandomNormalLike,
    RandomUniform,
    RandomUniformLike,
    Range,
    Reciprocal,
    ReduceL1,
    ReduceL2,
    ReduceLogSum,
    ReduceLogSumExp,
    ReduceMax,
    ReduceMean,
    ReduceMin,
    ReduceProd,
    ReduceSum,
    ReduceSumSquare,
    Relu,
    Reshape,
    Resize,
    ReverseSequence,
    RNN,
    RoiAlign,
    Round,
    Scan,
    ScatterElements,
    ScatterND,
    Selu,
    Shape,
    Shrink,
    Sigmoid,
    Sign,
    Sin,
    Sinh,
    Size,
    Slice,
    Softmax,
    Softplus,
    Softsign,
    SpaceToDepth,
    Split,
    Sqrt,
    Squeeze,
    STFT,
    Sub,
    Sum,
    Tan,
    Tanh,
    ThresholdedRelu,
    Tile,
    TopK,
    Transpose,
    Trilu,
    Unique,
    Unsqueeze,
    Upsample,
    Where,
    Xor,
}

impl NodeType {
    /// Whether `op_type` names this operator.
    pub fn matches(&self, op_type: &str) -> bool {
        self.as_ref() == op_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn element_type_codes_round_trip() {
        for ty in [
            ElementType::Float32,
            ElementType::Float64,
            ElementType::Float16,
            ElementType::Int64,
            ElementType::Int32,
            ElementType::Uint16,
            ElementType::Uint8,
            ElementType::Int8,
            ElementType::Bool,
            ElementType::String,
        ] {
            assert_eq!(ElementType::from_proto(ty.proto_code()).unwrap(), ty);
        }
    }

    #[test]
    fn unknown_element_type_is_rejected() {
        assert!(matches!(
            ElementType::from_proto(9999),
            Err(crate::Error::UnknownElementType(9999))
        ));
    }

    #[test]
    fn node_type_matches_op_type_strings() {
        assert!(NodeType::Einsum.matches("Einsum"));
        assert!(!NodeType::Einsum.matches("einsum"));
        assert_eq!(NodeType::from_str("Cast").unwrap(), NodeType::Cast);
    }
}
