//! Raw TileDB C API.
//!
//! Type aliases and enum constants are shared by both backends. The functions
//! and opaque handle types come from either the linked native library
//! (`native` feature, the default) or the in-process engine in `sim`, which
//! replaces it under the `sim` feature and in the crate's own tests.
//!
//! Nothing in here is safe to call directly; the rest of the crate wraps every
//! handle in a [`crate::handle::NativeHandle`] before using it.

#![allow(non_camel_case_types)]

pub use libc::{c_char, c_void};

/// Status code returned by every fallible C API function.
pub type capi_return_t = i32;

pub const TILEDB_OK: capi_return_t = 0;
pub const TILEDB_ERR: capi_return_t = -1;
pub const TILEDB_OOM: capi_return_t = -2;

/// Completion callback for asynchronous query submission.
pub type tiledb_completion_cb = Option<unsafe extern "C" fn(*mut c_void)>;

pub type tiledb_datatype_t = u32;
pub const TILEDB_INT32: tiledb_datatype_t = 0;
pub const TILEDB_INT64: tiledb_datatype_t = 1;
pub const TILEDB_FLOAT32: tiledb_datatype_t = 2;
pub const TILEDB_FLOAT64: tiledb_datatype_t = 3;
pub const TILEDB_CHAR: tiledb_datatype_t = 4;
pub const TILEDB_INT8: tiledb_datatype_t = 5;
pub const TILEDB_UINT8: tiledb_datatype_t = 6;
pub const TILEDB_INT16: tiledb_datatype_t = 7;
pub const TILEDB_UINT16: tiledb_datatype_t = 8;
pub const TILEDB_UINT32: tiledb_datatype_t = 9;
pub const TILEDB_UINT64: tiledb_datatype_t = 10;
pub const TILEDB_STRING_ASCII: tiledb_datatype_t = 11;
pub const TILEDB_STRING_UTF8: tiledb_datatype_t = 12;
pub const TILEDB_BLOB: tiledb_datatype_t = 40;
pub const TILEDB_BOOL: tiledb_datatype_t = 41;

pub type tiledb_array_type_t = u32;
pub const TILEDB_DENSE: tiledb_array_type_t = 0;
pub const TILEDB_SPARSE: tiledb_array_type_t = 1;

pub type tiledb_query_type_t = u32;
pub const TILEDB_READ: tiledb_query_type_t = 0;
pub const TILEDB_WRITE: tiledb_query_type_t = 1;
pub const TILEDB_DELETE: tiledb_query_type_t = 2;
pub const TILEDB_UPDATE: tiledb_query_type_t = 3;
pub const TILEDB_MODIFY_EXCLUSIVE: tiledb_query_type_t = 4;

pub type tiledb_layout_t = u32;
pub const TILEDB_ROW_MAJOR: tiledb_layout_t = 0;
pub const TILEDB_COL_MAJOR: tiledb_layout_t = 1;
pub const TILEDB_GLOBAL_ORDER: tiledb_layout_t = 2;
pub const TILEDB_UNORDERED: tiledb_layout_t = 3;
pub const TILEDB_HILBERT: tiledb_layout_t = 4;

pub type tiledb_query_status_t = u32;
pub const TILEDB_FAILED: tiledb_query_status_t = 0;
pub const TILEDB_COMPLETED: tiledb_query_status_t = 1;
pub const TILEDB_INPROGRESS: tiledb_query_status_t = 2;
pub const TILEDB_INCOMPLETE: tiledb_query_status_t = 3;
pub const TILEDB_UNINITIALIZED: tiledb_query_status_t = 4;
pub const TILEDB_INITIALIZED: tiledb_query_status_t = 5;

pub type tiledb_filter_type_t = u32;
pub const TILEDB_FILTER_NONE: tiledb_filter_type_t = 0;
pub const TILEDB_FILTER_GZIP: tiledb_filter_type_t = 1;
pub const TILEDB_FILTER_ZSTD: tiledb_filter_type_t = 2;
pub const TILEDB_FILTER_LZ4: tiledb_filter_type_t = 3;
pub const TILEDB_FILTER_RLE: tiledb_filter_type_t = 4;
pub const TILEDB_FILTER_BZIP2: tiledb_filter_type_t = 5;
pub const TILEDB_FILTER_DOUBLE_DELTA: tiledb_filter_type_t = 6;
pub const TILEDB_FILTER_BIT_WIDTH_REDUCTION: tiledb_filter_type_t = 7;
pub const TILEDB_FILTER_BITSHUFFLE: tiledb_filter_type_t = 8;
pub const TILEDB_FILTER_BYTESHUFFLE: tiledb_filter_type_t = 9;
pub const TILEDB_FILTER_POSITIVE_DELTA: tiledb_filter_type_t = 10;
pub const TILEDB_FILTER_CHECKSUM_MD5: tiledb_filter_type_t = 12;
pub const TILEDB_FILTER_CHECKSUM_SHA256: tiledb_filter_type_t = 13;
pub const TILEDB_FILTER_DICTIONARY: tiledb_filter_type_t = 14;
pub const TILEDB_FILTER_SCALE_FLOAT: tiledb_filter_type_t = 15;
pub const TILEDB_FILTER_XOR: tiledb_filter_type_t = 16;
pub const TILEDB_FILTER_WEBP: tiledb_filter_type_t = 18;
pub const TILEDB_FILTER_DELTA: tiledb_filter_type_t = 19;

pub type tiledb_filter_option_t = u32;
pub const TILEDB_COMPRESSION_LEVEL: tiledb_filter_option_t = 0;
pub const TILEDB_BIT_WIDTH_MAX_WINDOW: tiledb_filter_option_t = 1;
pub const TILEDB_POSITIVE_DELTA_MAX_WINDOW: tiledb_filter_option_t = 2;
pub const TILEDB_SCALE_FLOAT_BYTEWIDTH: tiledb_filter_option_t = 3;
pub const TILEDB_SCALE_FLOAT_FACTOR: tiledb_filter_option_t = 4;
pub const TILEDB_SCALE_FLOAT_OFFSET: tiledb_filter_option_t = 5;
pub const TILEDB_WEBP_QUALITY: tiledb_filter_option_t = 6;
pub const TILEDB_WEBP_INPUT_FORMAT: tiledb_filter_option_t = 7;
pub const TILEDB_WEBP_LOSSLESS: tiledb_filter_option_t = 8;
pub const TILEDB_COMPRESSION_REINTERPRET_DATATYPE: tiledb_filter_option_t = 9;

pub type tiledb_vfs_mode_t = u32;
pub const TILEDB_VFS_READ: tiledb_vfs_mode_t = 0;
pub const TILEDB_VFS_WRITE: tiledb_vfs_mode_t = 1;
pub const TILEDB_VFS_APPEND: tiledb_vfs_mode_t = 2;

pub type tiledb_filesystem_t = u32;
pub const TILEDB_HDFS: tiledb_filesystem_t = 0;
pub const TILEDB_S3: tiledb_filesystem_t = 1;
pub const TILEDB_AZURE: tiledb_filesystem_t = 2;
pub const TILEDB_GCS: tiledb_filesystem_t = 3;
pub const TILEDB_MEMFS: tiledb_filesystem_t = 4;

pub type tiledb_data_order_t = u32;
pub const TILEDB_UNORDERED_DATA: tiledb_data_order_t = 0;
pub const TILEDB_INCREASING_DATA: tiledb_data_order_t = 1;
pub const TILEDB_DECREASING_DATA: tiledb_data_order_t = 2;

pub type tiledb_query_condition_op_t = u32;
pub const TILEDB_LT: tiledb_query_condition_op_t = 0;
pub const TILEDB_LE: tiledb_query_condition_op_t = 1;
pub const TILEDB_GT: tiledb_query_condition_op_t = 2;
pub const TILEDB_GE: tiledb_query_condition_op_t = 3;
pub const TILEDB_EQ: tiledb_query_condition_op_t = 4;
pub const TILEDB_NE: tiledb_query_condition_op_t = 5;

pub type tiledb_query_condition_combination_op_t = u32;
pub const TILEDB_AND: tiledb_query_condition_combination_op_t = 0;
pub const TILEDB_OR: tiledb_query_condition_combination_op_t = 1;
pub const TILEDB_NOT: tiledb_query_condition_combination_op_t = 2;

pub type tiledb_object_t = u32;
pub const TILEDB_INVALID: tiledb_object_t = 0;
pub const TILEDB_GROUP: tiledb_object_t = 1;
pub const TILEDB_ARRAY: tiledb_object_t = 2;

#[cfg(all(feature = "native", not(any(test, feature = "sim"))))]
mod native;
#[cfg(all(feature = "native", not(any(test, feature = "sim"))))]
pub use native::*;

#[cfg(any(test, feature = "sim"))]
pub(crate) mod sim;
#[cfg(any(test, feature = "sim"))]
pub use sim::*;

#[cfg(not(any(test, feature = "native", feature = "sim")))]
compile_error!("enable the `native` feature to link libtiledb or `sim` for the in-process engine");

#[cfg(test)]
mod tests {
    #[test]
    fn test_unit_tests_use_in_process_engine() {
        // `native` is on by default; tests must still not need the library.
        let (mut major, mut minor, mut rev) = (0, 0, 0);
        unsafe { super::tiledb_version(&mut major, &mut minor, &mut rev) };
        assert_eq!((major, minor, rev), super::sim::VERSION);
    }
}
