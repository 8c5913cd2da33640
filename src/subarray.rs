//! Subarrays: the cells a query reads or writes, as ranges per dimension.

use std::ops::RangeInclusive;

use crate::array::Array;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::{CapiHandle, SubarrayHandle};
use crate::sys;
use crate::types::{CellType, Datatype, cells_from_bytes, native_bytes};
use crate::util::cstring;

/// Ranges selected on each dimension of one array.
///
/// A dimension without ranges selects its whole domain. Ranges are checked
/// against the dimension's datatype before they reach the engine.
#[derive(Debug, Clone)]
pub struct Subarray {
    context: Context,
    array: Array,
    handle: SubarrayHandle,
    dims: Vec<(String, Datatype)>,
}

impl Subarray {
    /// Create a subarray for `array`, which must be open.
    pub fn new(array: &Array) -> Result<Self> {
        let context = array.context().clone();
        let domain = array.schema()?.domain()?;
        let dims = (0..domain.ndim()?)
            .map(|index| {
                let dim = domain.dimension(index)?;
                Ok((dim.name()?, dim.datatype()?))
            })
            .collect::<Result<Vec<_>>>()?;
        let handle = context.capi_alloc::<SubarrayHandle, _>(|ctx, out| unsafe {
            sys::tiledb_subarray_alloc(ctx, array.raw(), out)
        })?;
        Ok(Self {
            context,
            array: array.clone(),
            handle,
            dims,
        })
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_subarray_t {
        self.handle.get().as_ptr()
    }

    pub fn array(&self) -> &Array {
        &self.array
    }

    /// Merge adjacent ranges as they are added. On by default.
    pub fn set_coalesce_ranges(&self, coalesce: bool) -> Result<()> {
        self.context.capi_call(
            || "set subarray range coalescing".into(),
            |ctx| unsafe { sys::tiledb_subarray_set_coalesce_ranges(ctx, self.raw(), coalesce as i32) },
        )
    }

    fn dim_index(&self, name: &str) -> Result<u32> {
        self.dims
            .iter()
            .position(|(dim, _)| dim == name)
            .map(|index| index as u32)
            .ok_or_else(|| Error::InvalidArgument {
                name: "dimension",
                reason: format!("array '{}' has no dimension '{name}'", self.array.uri()),
            })
    }

    fn check_type<T: CellType>(&self, dim_idx: u32, operation: &str) -> Result<()> {
        let Some((name, datatype)) = self.dims.get(dim_idx as usize) else {
            return Err(Error::InvalidArgument {
                name: "dimension",
                reason: format!("dimension index {dim_idx} out of bounds ({} dimensions)", self.dims.len()),
            });
        };
        if *datatype != T::DATATYPE {
            return Err(Error::TypeMismatch {
                operation: format!("{operation} on dimension '{name}'"),
                expected: datatype.type_name(),
                actual: T::DATATYPE.type_name(),
            });
        }
        Ok(())
    }

    /// Select the inclusive `range` on dimension `dim_idx`.
    pub fn add_range<T: CellType>(&self, dim_idx: u32, range: RangeInclusive<T>) -> Result<()> {
        self.check_type::<T>(dim_idx, "add range")?;
        let (start, end) = (*range.start(), *range.end());
        self.context.capi_call(
            || format!("add range to dimension {dim_idx}"),
            |ctx| unsafe {
                sys::tiledb_subarray_add_range(
                    ctx,
                    self.raw(),
                    dim_idx,
                    (&start as *const T).cast(),
                    (&end as *const T).cast(),
                    std::ptr::null(),
                )
            },
        )
    }

    pub fn add_range_by_name<T: CellType>(&self, name: &str, range: RangeInclusive<T>) -> Result<()> {
        let dim_idx = self.dim_index(name)?;
        self.check_type::<T>(dim_idx, "add range")?;
        let c_name = cstring("name", name)?;
        let (start, end) = (*range.start(), *range.end());
        self.context.capi_call(
            || format!("add range to dimension '{name}'"),
            |ctx| unsafe {
                sys::tiledb_subarray_add_range_by_name(
                    ctx,
                    self.raw(),
                    c_name.as_ptr(),
                    (&start as *const T).cast(),
                    (&end as *const T).cast(),
                    std::ptr::null(),
                )
            },
        )
    }

    pub fn range_num(&self, dim_idx: u32) -> Result<u64> {
        let mut num = 0;
        self.context.capi_call(
            || format!("get range count of dimension {dim_idx}"),
            |ctx| unsafe { sys::tiledb_subarray_get_range_num(ctx, self.raw(), dim_idx, &mut num) },
        )?;
        Ok(num)
    }

    pub fn range_num_by_name(&self, name: &str) -> Result<u64> {
        let c_name = cstring("name", name)?;
        let mut num = 0;
        self.context.capi_call(
            || format!("get range count of dimension '{name}'"),
            |ctx| unsafe { sys::tiledb_subarray_get_range_num_from_name(ctx, self.raw(), c_name.as_ptr(), &mut num) },
        )?;
        Ok(num)
    }

    /// Range `range_idx` of dimension `dim_idx`.
    pub fn range<T: CellType>(&self, dim_idx: u32, range_idx: u64) -> Result<RangeInclusive<T>> {
        self.check_type::<T>(dim_idx, "get range")?;
        let (mut start, mut end, mut stride) = (std::ptr::null(), std::ptr::null(), std::ptr::null());
        self.context.capi_call(
            || format!("get range {range_idx} of dimension {dim_idx}"),
            |ctx| unsafe {
                sys::tiledb_subarray_get_range(ctx, self.raw(), dim_idx, range_idx, &mut start, &mut end, &mut stride)
            },
        )?;
        Self::decode_range(start, end)
    }

    pub fn range_by_name<T: CellType>(&self, name: &str, range_idx: u64) -> Result<RangeInclusive<T>> {
        let dim_idx = self.dim_index(name)?;
        self.check_type::<T>(dim_idx, "get range")?;
        let c_name = cstring("name", name)?;
        let (mut start, mut end, mut stride) = (std::ptr::null(), std::ptr::null(), std::ptr::null());
        self.context.capi_call(
            || format!("get range {range_idx} of dimension '{name}'"),
            |ctx| unsafe {
                sys::tiledb_subarray_get_range_from_name(
                    ctx,
                    self.raw(),
                    c_name.as_ptr(),
                    range_idx,
                    &mut start,
                    &mut end,
                    &mut stride,
                )
            },
        )?;
        Self::decode_range(start, end)
    }

    fn decode_range<T: CellType>(start: *const sys::c_void, end: *const sys::c_void) -> Result<RangeInclusive<T>> {
        let size = std::mem::size_of::<T>() as u64;
        // Both pointers borrow the subarray, which outlives this copy.
        let start = cells_from_bytes::<T>(unsafe { native_bytes(start, size) })?;
        let end = cells_from_bytes::<T>(unsafe { native_bytes(end, size) })?;
        match (start.first(), end.first()) {
            (Some(&start), Some(&end)) => Ok(start..=end),
            _ => Err(Error::InvalidState("engine returned an empty range".into())),
        }
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::tests::dense_array;
    use crate::types::QueryType;

    fn open_subarray(name: &str) -> Subarray {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, name);
        array.open(QueryType::Read).unwrap();
        Subarray::new(&array).unwrap()
    }

    #[test]
    fn test_default_range_is_whole_domain() {
        let subarray = open_subarray("subarray-default");
        assert_eq!(subarray.range_num(0).unwrap(), 1);
        assert_eq!(subarray.range::<i64>(0, 0).unwrap(), 1..=100);
    }

    #[test]
    fn test_ranges_replace_default_and_coalesce() {
        let subarray = open_subarray("subarray-coalesce");
        subarray.add_range(0, 3i64..=5).unwrap();
        subarray.add_range_by_name("rows", 6i64..=8).unwrap();
        subarray.add_range(0, 20i64..=21).unwrap();
        assert_eq!(subarray.range_num_by_name("rows").unwrap(), 2);
        assert_eq!(subarray.range::<i64>(0, 0).unwrap(), 3..=8);
        assert_eq!(subarray.range_by_name::<i64>("rows", 1).unwrap(), 20..=21);
        assert!(subarray.range::<i64>(0, 2).is_err());
    }

    #[test]
    fn test_coalescing_can_be_disabled() {
        let subarray = open_subarray("subarray-no-coalesce");
        subarray.set_coalesce_ranges(false).unwrap();
        subarray.add_range(0, 1i64..=2).unwrap();
        subarray.add_range(0, 3i64..=4).unwrap();
        assert_eq!(subarray.range_num(0).unwrap(), 2);
    }

    #[test]
    fn test_invalid_ranges_are_rejected() {
        let subarray = open_subarray("subarray-invalid");
        let err = subarray.add_range(0, 50i64..=200).unwrap_err();
        assert!(err.native_message().unwrap().contains("out of domain"));
        assert!(subarray.add_range(0, 9i64..=2).is_err());
        assert!(matches!(
            subarray.add_range(0, 1i32..=2),
            Err(Error::TypeMismatch { expected: "i64", actual: "i32", .. })
        ));
        assert!(matches!(
            subarray.add_range(3, 1i64..=2),
            Err(Error::InvalidArgument { name: "dimension", .. })
        ));
        assert!(subarray.add_range_by_name("cols", 1i64..=2).unwrap_err().to_string().contains("cols"));
    }

    #[test]
    fn test_closed_array_has_no_subarray() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "subarray-closed");
        assert!(Subarray::new(&array).is_err());
    }
}
