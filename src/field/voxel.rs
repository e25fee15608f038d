use crate::foundation::error::{VoxfuseError, VoxfuseResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
/// Closed set of element kinds a fused destination image may carry.
///
/// Packed ARGB pixels are treated as `I32`, matching their storage width.
pub enum VoxelKind {
    /// Unsigned 8-bit.
    U8,
    /// Signed 8-bit.
    I8,
    /// Unsigned 16-bit.
    U16,
    /// Signed 16-bit.
    I16,
    /// Unsigned 32-bit.
    U32,
    /// Signed 32-bit (also packed ARGB).
    I32,
    /// Unsigned 64-bit.
    U64,
    /// Signed 64-bit.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl VoxelKind {
    /// Parse a kind name, failing fast on anything outside the supported set.
    pub fn parse(name: &str) -> VoxfuseResult<Self> {
        Ok(match name {
            "u8" => Self::U8,
            "i8" => Self::I8,
            "u16" => Self::U16,
            "i16" => Self::I16,
            "u32" => Self::U32,
            "i32" | "argb" => Self::I32,
            "u64" => Self::U64,
            "i64" => Self::I64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            other => return Err(VoxfuseError::UnsupportedKind(other.to_string())),
        })
    }

    /// Storage width of one voxel in bytes.
    pub fn bytes_per_voxel(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }
}

impl std::fmt::Display for VoxelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(s)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Element type of a volumetric field.
///
/// The set of implementors is closed ([`VoxelKind`]); each kind carries its
/// zero value and its conversion from the f64 blending accumulator. Integer
/// kinds saturate on conversion, float kinds pass through.
pub trait Voxel:
    sealed::Sealed + Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static
{
    /// Kind tag for this element type.
    const KIND: VoxelKind;
    /// Additive identity, used to fill absent regions.
    const ZERO: Self;

    /// Widen to the f64 accumulator domain.
    fn to_f64(self) -> f64;

    /// Narrow a finished accumulator value into this type.
    fn from_accum(v: f64) -> Self;
}

macro_rules! int_voxel {
    ($t:ty, $kind:expr) => {
        impl sealed::Sealed for $t {}
        impl Voxel for $t {
            const KIND: VoxelKind = $kind;
            const ZERO: Self = 0;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_accum(v: f64) -> Self {
                // `as` saturates on overflow and maps NaN to zero.
                v.round() as $t
            }
        }
    };
}

macro_rules! float_voxel {
    ($t:ty, $kind:expr) => {
        impl sealed::Sealed for $t {}
        impl Voxel for $t {
            const KIND: VoxelKind = $kind;
            const ZERO: Self = 0.0;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_accum(v: f64) -> Self {
                v as $t
            }
        }
    };
}

int_voxel!(u8, VoxelKind::U8);
int_voxel!(i8, VoxelKind::I8);
int_voxel!(u16, VoxelKind::U16);
int_voxel!(i16, VoxelKind::I16);
int_voxel!(u32, VoxelKind::U32);
int_voxel!(i32, VoxelKind::I32);
int_voxel!(u64, VoxelKind::U64);
int_voxel!(i64, VoxelKind::I64);
float_voxel!(f32, VoxelKind::F32);
float_voxel!(f64, VoxelKind::F64);
