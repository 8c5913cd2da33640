//! Typed key-value metadata shared by arrays and groups.

use super::*;

#[derive(Debug, Clone)]
pub(crate) struct Metadatum {
    datatype: tiledb_datatype_t,
    num: u32,
    bytes: Vec<u8>,
}

impl Metadatum {
    /// Copy the value passed to a `*_put_metadata` call.
    ///
    /// # Safety
    ///
    /// When non-null, `value` must point to `value_num` values of `value_type`.
    pub(crate) unsafe fn from_raw(
        value_type: tiledb_datatype_t,
        value_num: u32,
        value: *const c_void,
    ) -> Result<Self, String> {
        let Some(size) = datatype_size(value_type) else {
            return Err(format!("Unsupported datatype {value_type}"));
        };
        if value.is_null() && value_num > 0 {
            return Err("Value is null".into());
        }
        let len = (size * value_num as u64) as usize;
        let bytes = if len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(value.cast::<u8>(), len) }.to_vec()
        };
        Ok(Self {
            datatype: value_type,
            num: value_num,
            bytes,
        })
    }
}

/// Fill the out-parameters of a `*_get_metadata` call. A missing key yields
/// a null value and a count of zero; the returned pointer borrows `datum`.
pub(crate) unsafe fn write_metadatum(
    ctx: &tiledb_ctx_t,
    datum: Option<&Metadatum>,
    value_type: *mut tiledb_datatype_t,
    value_num: *mut u32,
    value: *mut *const c_void,
) -> capi_return_t {
    match datum {
        Some(datum) => {
            sim_out!(ctx, value_type, datum.datatype);
            sim_out!(ctx, value_num, datum.num);
            sim_out!(ctx, value, datum.bytes.as_ptr().cast());
        }
        None => {
            sim_out!(ctx, value_num, 0);
            sim_out!(ctx, value, std::ptr::null());
        }
    }
    TILEDB_OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_value_needs_zero_count() {
        let err = unsafe { Metadatum::from_raw(TILEDB_INT32, 2, std::ptr::null()) }.unwrap_err();
        assert!(err.contains("null"));
        let empty = unsafe { Metadatum::from_raw(TILEDB_INT32, 0, std::ptr::null()) }.unwrap();
        assert!(empty.bytes.is_empty());
    }

    #[test]
    fn test_unknown_datatype_is_rejected() {
        let value = 1u8;
        let err = unsafe { Metadatum::from_raw(999, 1, (&value as *const u8).cast()) }.unwrap_err();
        assert!(err.contains("999"));
    }
}
