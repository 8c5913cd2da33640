//! Enumerations of the C API and the cell types the binding can marshal.

use crate::error::{Error, Result};
use crate::sys;

/// Generates a Rust enum over a set of native constants.
macro_rules! native_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $raw:ty { $($(#[$vmeta:meta])* $variant:ident = $value:path),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn to_raw(self) -> $raw {
                match self {
                    $(Self::$variant => $value),+
                }
            }

            pub fn from_raw(raw: $raw) -> Result<Self> {
                match raw {
                    $(v if v == $value => Ok(Self::$variant),)+
                    other => Err(Error::InvalidArgument {
                        name: stringify!($name),
                        reason: format!("unknown value {other}"),
                    }),
                }
            }
        }
    };
}

native_enum! {
    /// Element type of attributes, dimensions, buffers and metadata.
    Datatype: sys::tiledb_datatype_t {
        Int32 = sys::TILEDB_INT32,
        Int64 = sys::TILEDB_INT64,
        Float32 = sys::TILEDB_FLOAT32,
        Float64 = sys::TILEDB_FLOAT64,
        Char = sys::TILEDB_CHAR,
        Int8 = sys::TILEDB_INT8,
        UInt8 = sys::TILEDB_UINT8,
        Int16 = sys::TILEDB_INT16,
        UInt16 = sys::TILEDB_UINT16,
        UInt32 = sys::TILEDB_UINT32,
        UInt64 = sys::TILEDB_UINT64,
        StringAscii = sys::TILEDB_STRING_ASCII,
        StringUtf8 = sys::TILEDB_STRING_UTF8,
        Blob = sys::TILEDB_BLOB,
        Boolean = sys::TILEDB_BOOL,
    }
}

impl Datatype {
    /// Size in bytes of one value.
    pub fn size(self) -> usize {
        match self {
            Self::Int8
            | Self::UInt8
            | Self::Char
            | Self::StringAscii
            | Self::StringUtf8
            | Self::Blob
            | Self::Boolean => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::Char | Self::StringAscii | Self::StringUtf8)
    }

    /// Short name of the Rust-side value type, used in type mismatch errors.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Int8 => "i8",
            Self::UInt8 => "u8",
            Self::Int16 => "i16",
            Self::UInt16 => "u16",
            Self::Int32 => "i32",
            Self::UInt32 => "u32",
            Self::Int64 => "i64",
            Self::UInt64 => "u64",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Boolean => "bool",
            Self::Char | Self::StringAscii | Self::StringUtf8 => "string",
            Self::Blob => "blob",
        }
    }
}

native_enum! {
    ArrayType: sys::tiledb_array_type_t {
        Dense = sys::TILEDB_DENSE,
        Sparse = sys::TILEDB_SPARSE,
    }
}

native_enum! {
    /// Mode an array is opened in; queries must match it.
    QueryType: sys::tiledb_query_type_t {
        Read = sys::TILEDB_READ,
        Write = sys::TILEDB_WRITE,
        Delete = sys::TILEDB_DELETE,
        Update = sys::TILEDB_UPDATE,
        ModifyExclusive = sys::TILEDB_MODIFY_EXCLUSIVE,
    }
}

native_enum! {
    Layout: sys::tiledb_layout_t {
        RowMajor = sys::TILEDB_ROW_MAJOR,
        ColMajor = sys::TILEDB_COL_MAJOR,
        GlobalOrder = sys::TILEDB_GLOBAL_ORDER,
        Unordered = sys::TILEDB_UNORDERED,
        Hilbert = sys::TILEDB_HILBERT,
    }
}

native_enum! {
    QueryStatus: sys::tiledb_query_status_t {
        Failed = sys::TILEDB_FAILED,
        Completed = sys::TILEDB_COMPLETED,
        InProgress = sys::TILEDB_INPROGRESS,
        /// More results are available; submit again to fetch them
        Incomplete = sys::TILEDB_INCOMPLETE,
        Uninitialized = sys::TILEDB_UNINITIALIZED,
        Initialized = sys::TILEDB_INITIALIZED,
    }
}

native_enum! {
    FilterType: sys::tiledb_filter_type_t {
        None = sys::TILEDB_FILTER_NONE,
        Gzip = sys::TILEDB_FILTER_GZIP,
        Zstd = sys::TILEDB_FILTER_ZSTD,
        Lz4 = sys::TILEDB_FILTER_LZ4,
        Rle = sys::TILEDB_FILTER_RLE,
        Bzip2 = sys::TILEDB_FILTER_BZIP2,
        DoubleDelta = sys::TILEDB_FILTER_DOUBLE_DELTA,
        BitWidthReduction = sys::TILEDB_FILTER_BIT_WIDTH_REDUCTION,
        BitShuffle = sys::TILEDB_FILTER_BITSHUFFLE,
        ByteShuffle = sys::TILEDB_FILTER_BYTESHUFFLE,
        PositiveDelta = sys::TILEDB_FILTER_POSITIVE_DELTA,
        ChecksumMd5 = sys::TILEDB_FILTER_CHECKSUM_MD5,
        ChecksumSha256 = sys::TILEDB_FILTER_CHECKSUM_SHA256,
        Dictionary = sys::TILEDB_FILTER_DICTIONARY,
        ScaleFloat = sys::TILEDB_FILTER_SCALE_FLOAT,
        Xor = sys::TILEDB_FILTER_XOR,
        Webp = sys::TILEDB_FILTER_WEBP,
        Delta = sys::TILEDB_FILTER_DELTA,
    }
}

native_enum! {
    FilterOption: sys::tiledb_filter_option_t {
        CompressionLevel = sys::TILEDB_COMPRESSION_LEVEL,
        BitWidthMaxWindow = sys::TILEDB_BIT_WIDTH_MAX_WINDOW,
        PositiveDeltaMaxWindow = sys::TILEDB_POSITIVE_DELTA_MAX_WINDOW,
        ScaleFloatBytewidth = sys::TILEDB_SCALE_FLOAT_BYTEWIDTH,
        ScaleFloatFactor = sys::TILEDB_SCALE_FLOAT_FACTOR,
        ScaleFloatOffset = sys::TILEDB_SCALE_FLOAT_OFFSET,
        WebpQuality = sys::TILEDB_WEBP_QUALITY,
        WebpInputFormat = sys::TILEDB_WEBP_INPUT_FORMAT,
        WebpLossless = sys::TILEDB_WEBP_LOSSLESS,
        CompressionReinterpretDatatype = sys::TILEDB_COMPRESSION_REINTERPRET_DATATYPE,
    }
}

native_enum! {
    VfsMode: sys::tiledb_vfs_mode_t {
        Read = sys::TILEDB_VFS_READ,
        Write = sys::TILEDB_VFS_WRITE,
        Append = sys::TILEDB_VFS_APPEND,
    }
}

native_enum! {
    Filesystem: sys::tiledb_filesystem_t {
        Hdfs = sys::TILEDB_HDFS,
        S3 = sys::TILEDB_S3,
        Azure = sys::TILEDB_AZURE,
        Gcs = sys::TILEDB_GCS,
        Memfs = sys::TILEDB_MEMFS,
    }
}

native_enum! {
    /// Ordering of dimension label values.
    DataOrder: sys::tiledb_data_order_t {
        Unordered = sys::TILEDB_UNORDERED_DATA,
        Increasing = sys::TILEDB_INCREASING_DATA,
        Decreasing = sys::TILEDB_DECREASING_DATA,
    }
}

native_enum! {
    /// Comparison applied by a query condition.
    ConditionOp: sys::tiledb_query_condition_op_t {
        Lt = sys::TILEDB_LT,
        Le = sys::TILEDB_LE,
        Gt = sys::TILEDB_GT,
        Ge = sys::TILEDB_GE,
        Eq = sys::TILEDB_EQ,
        Ne = sys::TILEDB_NE,
    }
}

native_enum! {
    CombinationOp: sys::tiledb_query_condition_combination_op_t {
        And = sys::TILEDB_AND,
        Or = sys::TILEDB_OR,
        Not = sys::TILEDB_NOT,
    }
}

native_enum! {
    /// Kind of object stored at a URI.
    ObjectType: sys::tiledb_object_t {
        Invalid = sys::TILEDB_INVALID,
        Group = sys::TILEDB_GROUP,
        Array = sys::TILEDB_ARRAY,
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Fixed-size element types that can cross the boundary as raw bytes.
pub trait CellType: sealed::Sealed + Copy + Default + PartialEq + Send + Sync + 'static {
    const DATATYPE: Datatype;
}

macro_rules! cell_type {
    ($($ty:ty => $datatype:ident),+ $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl CellType for $ty {
                const DATATYPE: Datatype = Datatype::$datatype;
            }
        )+
    };
}

cell_type! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

/// Decode native bytes as `T` cells.
///
/// The element count is derived once from the byte length. Trailing bytes
/// that do not form a whole cell are an error, and unaligned input is copied
/// cell by cell.
pub fn cells_from_bytes<T: CellType>(bytes: &[u8]) -> Result<Vec<T>> {
    let size = std::mem::size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(Error::InvalidArgument {
            name: "bytes",
            reason: format!(
                "{} bytes is not a whole number of {}-byte cells",
                bytes.len(),
                size
            ),
        });
    }
    let count = bytes.len() / size;
    let ptr = bytes.as_ptr().cast::<T>();
    // Every T here is plain old data, so any bit pattern of the right size is valid.
    Ok((0..count)
        .map(|i| unsafe { ptr.add(i).read_unaligned() })
        .collect())
}

/// Borrow native memory as bytes. Empty for a null pointer.
///
/// # Safety
///
/// When non-null, `ptr` must be valid for `len` bytes for the lifetime `'a`.
pub(crate) unsafe fn native_bytes<'a>(ptr: *const sys::c_void, len: u64) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        return &[];
    }
    unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize) }
}

/// View `T` cells as bytes for passing into the engine.
pub(crate) fn cells_as_bytes<T: CellType>(values: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_through_raw() {
        assert_eq!(Datatype::from_raw(sys::TILEDB_BOOL).unwrap(), Datatype::Boolean);
        assert_eq!(Layout::GlobalOrder.to_raw(), sys::TILEDB_GLOBAL_ORDER);
        assert!(matches!(
            QueryStatus::from_raw(99),
            Err(Error::InvalidArgument { name: "QueryStatus", .. })
        ));
    }

    #[test]
    fn test_cells_from_bytes() {
        let values = [1i32, -2, 3];
        let decoded: Vec<i32> = cells_from_bytes(cells_as_bytes(&values)).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_cells_from_bytes_rejects_partial_cell() {
        let err = cells_from_bytes::<u32>(&[0, 1, 2]).unwrap_err();
        assert!(err.to_string().contains("3 bytes"));
    }

    #[test]
    fn test_cells_from_unaligned_bytes() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&7u64.to_ne_bytes());
        let decoded: Vec<u64> = cells_from_bytes(&bytes[1..]).unwrap();
        assert_eq!(decoded, vec![7]);
    }

    #[test]
    fn test_object_type_from_raw() {
        assert_eq!(ObjectType::from_raw(sys::TILEDB_GROUP).unwrap(), ObjectType::Group);
        assert_eq!(ConditionOp::Ne.to_raw(), sys::TILEDB_NE);
        assert!(CombinationOp::from_raw(7).is_err());
    }

    #[test]
    fn test_datatype_sizes() {
        assert_eq!(Datatype::Float64.size(), 8);
        assert_eq!(<u16 as CellType>::DATATYPE.size(), std::mem::size_of::<u16>());
    }
}
