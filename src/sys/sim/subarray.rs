//! Subarrays: per-dimension lists of inclusive ranges selecting cells.
//!
//! A dimension with no explicit range selects its whole domain. The first
//! range added to a dimension replaces that default. Range bounds are kept as
//! raw bytes of the dimension's datatype so accessors can hand out pointers
//! that stay valid while the subarray lives.

use super::array::tiledb_array_t;
use super::schema::DimensionDef;
use super::*;
use parking_lot::Mutex;

macro_rules! decode_as {
    ($ty:ty, $bytes:expr) => {
        <$ty>::from_ne_bytes($bytes.get(..std::mem::size_of::<$ty>())?.try_into().ok()?)
    };
}

/// Decode one integer coordinate. `None` for non-integer datatypes and for
/// unsigned values beyond `i64::MAX`.
pub(crate) fn decode_coord(datatype: tiledb_datatype_t, bytes: &[u8]) -> Option<i64> {
    Some(match datatype {
        TILEDB_INT8 => decode_as!(i8, bytes) as i64,
        TILEDB_UINT8 => decode_as!(u8, bytes) as i64,
        TILEDB_INT16 => decode_as!(i16, bytes) as i64,
        TILEDB_UINT16 => decode_as!(u16, bytes) as i64,
        TILEDB_INT32 => decode_as!(i32, bytes) as i64,
        TILEDB_UINT32 => decode_as!(u32, bytes) as i64,
        TILEDB_INT64 => decode_as!(i64, bytes),
        TILEDB_UINT64 => i64::try_from(decode_as!(u64, bytes)).ok()?,
        _ => return None,
    })
}

/// Encode an integer coordinate as bytes of `datatype`.
pub(crate) fn encode_coord(datatype: tiledb_datatype_t, value: i64) -> Vec<u8> {
    match datatype {
        TILEDB_INT8 => (value as i8).to_ne_bytes().to_vec(),
        TILEDB_UINT8 => (value as u8).to_ne_bytes().to_vec(),
        TILEDB_INT16 => (value as i16).to_ne_bytes().to_vec(),
        TILEDB_UINT16 => (value as u16).to_ne_bytes().to_vec(),
        TILEDB_INT32 => (value as i32).to_ne_bytes().to_vec(),
        TILEDB_UINT32 => (value as u32).to_ne_bytes().to_vec(),
        TILEDB_UINT64 => (value as u64).to_ne_bytes().to_vec(),
        _ => value.to_ne_bytes().to_vec(),
    }
}

/// Any numeric coordinate as `f64`, for ordering checks.
fn decode_number(datatype: tiledb_datatype_t, bytes: &[u8]) -> Option<f64> {
    match datatype {
        TILEDB_FLOAT32 => Some(decode_as!(f32, bytes) as f64),
        TILEDB_FLOAT64 => Some(decode_as!(f64, bytes)),
        TILEDB_UINT64 => Some(decode_as!(u64, bytes) as f64),
        other => decode_coord(other, bytes).map(|v| v as f64),
    }
}

/// Integer bounds of a dimension's domain.
pub(crate) fn dim_bounds(dim: &DimensionDef) -> Option<(i64, i64)> {
    let size = datatype_size(dim.datatype)? as usize;
    let low = decode_coord(dim.datatype, dim.domain.get(..size)?)?;
    let high = decode_coord(dim.datatype, dim.domain.get(size..2 * size)?)?;
    Some((low, high))
}

type RawRange = (Box<[u8]>, Box<[u8]>);

struct DimRanges {
    ranges: Vec<RawRange>,
    is_default: bool,
}

struct SubarrayState {
    coalesce: bool,
    dims: Vec<DimRanges>,
}

pub struct tiledb_subarray_t {
    array_uri: String,
    dims: Vec<DimensionDef>,
    state: Mutex<SubarrayState>,
}

impl tiledb_subarray_t {
    /// Ranges of every dimension decoded as integers.
    pub(crate) fn integer_ranges(&self) -> Result<Vec<Vec<(i64, i64)>>, String> {
        let state = self.state.lock();
        self.dims
            .iter()
            .zip(&state.dims)
            .map(|(dim, ranges)| {
                ranges
                    .ranges
                    .iter()
                    .map(|(start, end)| {
                        match (decode_coord(dim.datatype, start), decode_coord(dim.datatype, end)) {
                            (Some(start), Some(end)) => Ok((start, end)),
                            _ => Err(format!(
                                "Subarray: Dimension '{}' does not have integer coordinates",
                                dim.name
                            )),
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn add_range(&self, dim_idx: usize, start: *const c_void, end: *const c_void, stride: *const c_void) -> Result<(), String> {
        let Some(dim) = self.dims.get(dim_idx) else {
            return Err(format!("Subarray: Cannot add range; Invalid dimension index {dim_idx}"));
        };
        if start.is_null() || end.is_null() {
            return Err(format!("Subarray: Cannot add range to dimension '{}'; Invalid range", dim.name));
        }
        if !stride.is_null() {
            return Err("Subarray: Cannot add range; Setting range stride is currently unsupported".into());
        }
        let size = datatype_size(dim.datatype).unwrap_or(1) as usize;
        let start: Box<[u8]> = unsafe { std::slice::from_raw_parts(start.cast::<u8>(), size) }.into();
        let end: Box<[u8]> = unsafe { std::slice::from_raw_parts(end.cast::<u8>(), size) }.into();
        let (Some(low), Some(high)) = (decode_number(dim.datatype, &start), decode_number(dim.datatype, &end)) else {
            return Err(format!("Subarray: Cannot add range to dimension '{}'; Unsupported datatype", dim.name));
        };
        if low > high {
            return Err(format!(
                "Subarray: Cannot add range to dimension '{}'; Lower range bound {low} cannot be larger than the higher bound {high}",
                dim.name
            ));
        }
        let domain_low = decode_number(dim.datatype, &dim.domain[..size]).unwrap_or(f64::MIN);
        let domain_high = decode_number(dim.datatype, &dim.domain[size..]).unwrap_or(f64::MAX);
        if low < domain_low || high > domain_high {
            return Err(format!(
                "Subarray: Cannot add range to dimension '{}'; Range [{low}, {high}] is out of domain bounds [{domain_low}, {domain_high}]",
                dim.name
            ));
        }

        let mut state = self.state.lock();
        let coalesce = state.coalesce;
        let ranges = &mut state.dims[dim_idx];
        if ranges.is_default {
            ranges.ranges.clear();
            ranges.is_default = false;
        }
        if coalesce {
            if let Some(last) = ranges.ranges.last_mut() {
                let adjacent = match (decode_coord(dim.datatype, &last.1), decode_coord(dim.datatype, &start)) {
                    (Some(last_end), Some(next)) => last_end.checked_add(1) == Some(next),
                    _ => false,
                };
                if adjacent {
                    last.1 = end;
                    return Ok(());
                }
            }
        }
        ranges.ranges.push((start, end));
        Ok(())
    }

    fn dim_index(&self, name: &str) -> Result<usize, String> {
        self.dims
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| format!("Subarray: Dimension '{name}' does not exist in array '{}'", self.array_uri))
    }

    unsafe fn write_range(
        &self,
        ctx: &tiledb_ctx_t,
        dim_idx: usize,
        range_idx: u64,
        start: *mut *const c_void,
        end: *mut *const c_void,
        stride: *mut *const c_void,
    ) -> capi_return_t {
        let state = self.state.lock();
        let Some(range) = state
            .dims
            .get(dim_idx)
            .and_then(|ranges| ranges.ranges.get(range_idx as usize))
        else {
            return ctx.fail(format!(
                "Subarray: Cannot get range {range_idx} of dimension {dim_idx}; Range index out of bounds"
            ));
        };
        sim_out!(ctx, start, range.0.as_ptr().cast());
        sim_out!(ctx, end, range.1.as_ptr().cast());
        if let Some(slot) = unsafe { stride.as_mut() } {
            *slot = std::ptr::null();
        }
        TILEDB_OK
    }

    fn range_num(&self, dim_idx: usize) -> Option<u64> {
        self.state.lock().dims.get(dim_idx).map(|r| r.ranges.len() as u64)
    }
}

pub unsafe extern "C" fn tiledb_subarray_alloc(
    ctx: *mut tiledb_ctx_t,
    array: *const tiledb_array_t,
    subarray: *mut *mut tiledb_subarray_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    let Some(open) = array.opened() else {
        return ctx.fail("Subarray: Cannot create subarray; Array is not open");
    };
    let dims = open
        .schema
        .dims
        .iter()
        .map(|dim| {
            let size = datatype_size(dim.datatype).unwrap_or(1) as usize;
            DimRanges {
                ranges: vec![(dim.domain[..size].into(), dim.domain[size..2 * size].into())],
                is_default: true,
            }
        })
        .collect();
    let value = tiledb_subarray_t {
        array_uri: open.uri.clone(),
        dims: open.schema.dims.clone(),
        state: Mutex::new(SubarrayState { coalesce: true, dims }),
    };
    sim_out!(ctx, subarray, boxed(value, "subarray"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_subarray_free(subarray: *mut *mut tiledb_subarray_t) {
    unsafe { release(subarray, "subarray") }
}

pub unsafe extern "C" fn tiledb_subarray_set_coalesce_ranges(
    ctx: *mut tiledb_ctx_t,
    subarray: *mut tiledb_subarray_t,
    coalesce_ranges: i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let subarray = sim_arg!(ctx, subarray, "subarray");
    subarray.state.lock().coalesce = coalesce_ranges != 0;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_subarray_add_range(
    ctx: *mut tiledb_ctx_t,
    subarray: *mut tiledb_subarray_t,
    dim_idx: u32,
    start: *const c_void,
    end: *const c_void,
    stride: *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let subarray = sim_arg!(ctx, subarray, "subarray");
    match subarray.add_range(dim_idx as usize, start, end, stride) {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_subarray_add_range_by_name(
    ctx: *mut tiledb_ctx_t,
    subarray: *mut tiledb_subarray_t,
    dim_name: *const c_char,
    start: *const c_void,
    end: *const c_void,
    stride: *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let subarray = sim_arg!(ctx, subarray, "subarray");
    let name = sim_str!(ctx, dim_name, "dimension name");
    match subarray
        .dim_index(name)
        .and_then(|index| subarray.add_range(index, start, end, stride))
    {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_subarray_get_range_num(
    ctx: *mut tiledb_ctx_t,
    subarray: *const tiledb_subarray_t,
    dim_idx: u32,
    range_num: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let subarray = sim_arg!(ctx, subarray, "subarray");
    let Some(num) = subarray.range_num(dim_idx as usize) else {
        return ctx.fail(format!("Subarray: Cannot get number of ranges; Invalid dimension index {dim_idx}"));
    };
    sim_out!(ctx, range_num, num);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_subarray_get_range_num_from_name(
    ctx: *mut tiledb_ctx_t,
    subarray: *const tiledb_subarray_t,
    dim_name: *const c_char,
    range_num: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let subarray = sim_arg!(ctx, subarray, "subarray");
    let name = sim_str!(ctx, dim_name, "dimension name");
    let num = match subarray.dim_index(name) {
        Ok(index) => subarray.range_num(index).unwrap_or(0),
        Err(message) => return ctx.fail(message),
    };
    sim_out!(ctx, range_num, num);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_subarray_get_range(
    ctx: *mut tiledb_ctx_t,
    subarray: *const tiledb_subarray_t,
    dim_idx: u32,
    range_idx: u64,
    start: *mut *const c_void,
    end: *mut *const c_void,
    stride: *mut *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let subarray = sim_arg!(ctx, subarray, "subarray");
    unsafe { subarray.write_range(ctx, dim_idx as usize, range_idx, start, end, stride) }
}

pub unsafe extern "C" fn tiledb_subarray_get_range_from_name(
    ctx: *mut tiledb_ctx_t,
    subarray: *const tiledb_subarray_t,
    dim_name: *const c_char,
    range_idx: u64,
    start: *mut *const c_void,
    end: *mut *const c_void,
    stride: *mut *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let subarray = sim_arg!(ctx, subarray, "subarray");
    let name = sim_str!(ctx, dim_name, "dimension name");
    match subarray.dim_index(name) {
        Ok(index) => unsafe { subarray.write_range(ctx, index, range_idx, start, end, stride) },
        Err(message) => ctx.fail(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coords_round_trip_through_datatype() {
        for datatype in [TILEDB_INT8, TILEDB_UINT16, TILEDB_INT32, TILEDB_UINT64] {
            let bytes = encode_coord(datatype, 42);
            assert_eq!(decode_coord(datatype, &bytes), Some(42));
        }
        assert_eq!(decode_coord(TILEDB_FLOAT64, &1.0f64.to_ne_bytes()), None);
        assert_eq!(decode_coord(TILEDB_UINT64, &u64::MAX.to_ne_bytes()), None);
    }

    #[test]
    fn test_dim_bounds() {
        let domain = [3i32, 9].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let dim = DimensionDef {
            name: "x".into(),
            datatype: TILEDB_INT32,
            domain,
            tile_extent: None,
        };
        assert_eq!(dim_bounds(&dim), Some((3, 9)));
    }
}
