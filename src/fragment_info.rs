//! Fragment listings: what each write to an array left on storage.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::{ArraySchemaHandle, CapiHandle, FragmentInfoHandle};
use crate::schema::ArraySchema;
use crate::sys;
use crate::types::CellType;
use crate::util::{cstr_to_string, cstring};

/// Information about the fragments of the array at a URI.
///
/// Nothing is available until [`FragmentInfo::load`] succeeds; loading again
/// refreshes the listing.
#[derive(Debug, Clone)]
pub struct FragmentInfo {
    context: Context,
    handle: FragmentInfoHandle,
    uri: Arc<str>,
    // Strings handed out by the engine live until the next load.
    load_state: Arc<RwLock<()>>,
}

impl FragmentInfo {
    pub fn new(context: &Context, array_uri: &str) -> Result<Self> {
        let c_uri = cstring("uri", array_uri)?;
        let handle = context.capi_alloc::<FragmentInfoHandle, _>(|ctx, out| unsafe {
            sys::tiledb_fragment_info_alloc(ctx, c_uri.as_ptr(), out)
        })?;
        Ok(Self {
            context: context.clone(),
            handle,
            uri: array_uri.into(),
            load_state: Arc::new(RwLock::new(())),
        })
    }

    fn raw(&self) -> *mut sys::tiledb_fragment_info_t {
        self.handle.get().as_ptr()
    }

    pub fn array_uri(&self) -> &str {
        &self.uri
    }

    pub fn load(&self) -> Result<()> {
        let _state = self.load_state.write();
        self.context.capi_call(
            || format!("load fragment info of array '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_fragment_info_load(ctx, self.raw()) },
        )?;
        tracing::trace!(uri = %self.uri, "loaded fragment info");
        Ok(())
    }

    pub fn fragment_num(&self) -> Result<u32> {
        let mut num = 0;
        self.context.capi_call(
            || format!("get fragment count of array '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_fragment_info_get_fragment_num(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    pub fn fragment_uri(&self, fid: u32) -> Result<String> {
        let mut uri = std::ptr::null();
        let _state = self.load_state.read();
        self.context.capi_call(
            || format!("get uri of fragment {fid}"),
            |ctx| unsafe { sys::tiledb_fragment_info_get_fragment_uri(ctx, self.raw(), fid, &mut uri) },
        )?;
        unsafe { cstr_to_string(uri, "uri") }
    }

    /// Size of fragment `fid` on storage, in bytes.
    pub fn fragment_size(&self, fid: u32) -> Result<u64> {
        let mut size = 0;
        self.context.capi_call(
            || format!("get size of fragment {fid}"),
            |ctx| unsafe { sys::tiledb_fragment_info_get_fragment_size(ctx, self.raw(), fid, &mut size) },
        )?;
        Ok(size)
    }

    pub fn is_dense(&self, fid: u32) -> Result<bool> {
        let mut dense = 0;
        self.context.capi_call(
            || format!("check whether fragment {fid} is dense"),
            |ctx| unsafe { sys::tiledb_fragment_info_get_dense(ctx, self.raw(), fid, &mut dense) },
        )?;
        Ok(dense != 0)
    }

    pub fn is_sparse(&self, fid: u32) -> Result<bool> {
        let mut sparse = 0;
        self.context.capi_call(
            || format!("check whether fragment {fid} is sparse"),
            |ctx| unsafe { sys::tiledb_fragment_info_get_sparse(ctx, self.raw(), fid, &mut sparse) },
        )?;
        Ok(sparse != 0)
    }

    /// Inclusive range of timestamps the fragment was written at.
    pub fn timestamp_range(&self, fid: u32) -> Result<(u64, u64)> {
        let (mut start, mut end) = (0, 0);
        self.context.capi_call(
            || format!("get timestamp range of fragment {fid}"),
            |ctx| unsafe { sys::tiledb_fragment_info_get_timestamp_range(ctx, self.raw(), fid, &mut start, &mut end) },
        )?;
        Ok((start, end))
    }

    fn check_type<T: CellType>(&self, fid: u32, dim: &str) -> Result<()> {
        let schema = self.array_schema(fid)?;
        let datatype = schema.domain()?.dimension_by_name(dim)?.datatype()?;
        if datatype != T::DATATYPE {
            return Err(Error::TypeMismatch {
                operation: format!("get non-empty domain of fragment {fid} on dimension '{dim}'"),
                expected: datatype.type_name(),
                actual: T::DATATYPE.type_name(),
            });
        }
        Ok(())
    }

    /// Bounds of the cells fragment `fid` holds on dimension `did`.
    pub fn non_empty_domain<T: CellType>(&self, fid: u32, did: u32) -> Result<[T; 2]> {
        let dim = self.array_schema(fid)?.domain()?.dimension(did)?.name()?;
        self.check_type::<T>(fid, &dim)?;
        let mut bounds = [T::default(); 2];
        self.context.capi_call(
            || format!("get non-empty domain of fragment {fid} on dimension {did}"),
            |ctx| unsafe {
                sys::tiledb_fragment_info_get_non_empty_domain_from_index(
                    ctx,
                    self.raw(),
                    fid,
                    did,
                    bounds.as_mut_ptr().cast(),
                )
            },
        )?;
        Ok(bounds)
    }

    pub fn non_empty_domain_by_name<T: CellType>(&self, fid: u32, dim: &str) -> Result<[T; 2]> {
        self.check_type::<T>(fid, dim)?;
        let c_name = cstring("name", dim)?;
        let mut bounds = [T::default(); 2];
        self.context.capi_call(
            || format!("get non-empty domain of fragment {fid} on dimension '{dim}'"),
            |ctx| unsafe {
                sys::tiledb_fragment_info_get_non_empty_domain_from_name(
                    ctx,
                    self.raw(),
                    fid,
                    c_name.as_ptr(),
                    bounds.as_mut_ptr().cast(),
                )
            },
        )?;
        Ok(bounds)
    }

    pub fn cell_num(&self, fid: u32) -> Result<u64> {
        let mut num = 0;
        self.context.capi_call(
            || format!("get cell count of fragment {fid}"),
            |ctx| unsafe { sys::tiledb_fragment_info_get_cell_num(ctx, self.raw(), fid, &mut num) },
        )?;
        Ok(num)
    }

    /// On-disk format version of fragment `fid`.
    pub fn version(&self, fid: u32) -> Result<u32> {
        let mut version = 0;
        self.context.capi_call(
            || format!("get format version of fragment {fid}"),
            |ctx| unsafe { sys::tiledb_fragment_info_get_version(ctx, self.raw(), fid, &mut version) },
        )?;
        Ok(version)
    }

    pub fn has_consolidated_metadata(&self, fid: u32) -> Result<bool> {
        let mut has = 0;
        self.context.capi_call(
            || format!("check consolidated metadata of fragment {fid}"),
            |ctx| unsafe { sys::tiledb_fragment_info_has_consolidated_metadata(ctx, self.raw(), fid, &mut has) },
        )?;
        Ok(has != 0)
    }

    pub fn unconsolidated_metadata_num(&self) -> Result<u32> {
        let mut num = 0;
        self.context.capi_call(
            || "get unconsolidated metadata count".into(),
            |ctx| unsafe { sys::tiledb_fragment_info_get_unconsolidated_metadata_num(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    /// Number of consolidated-away fragments awaiting vacuuming.
    pub fn to_vacuum_num(&self) -> Result<u32> {
        let mut num = 0;
        self.context.capi_call(
            || "get count of fragments to vacuum".into(),
            |ctx| unsafe { sys::tiledb_fragment_info_get_to_vacuum_num(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    pub fn to_vacuum_uri(&self, fid: u32) -> Result<String> {
        let mut uri = std::ptr::null();
        let _state = self.load_state.read();
        self.context.capi_call(
            || format!("get uri of fragment to vacuum {fid}"),
            |ctx| unsafe { sys::tiledb_fragment_info_get_to_vacuum_uri(ctx, self.raw(), fid, &mut uri) },
        )?;
        unsafe { cstr_to_string(uri, "uri") }
    }

    /// Schema fragment `fid` was written with.
    pub fn array_schema(&self, fid: u32) -> Result<ArraySchema> {
        let handle = self.context.capi_handle::<ArraySchemaHandle, _>(
            || format!("get array schema of fragment {fid}"),
            |ctx, out| unsafe { sys::tiledb_fragment_info_get_array_schema(ctx, self.raw(), fid, out) },
        )?;
        Ok(ArraySchema::from_handle(&self.context, handle))
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::array::tests::dense_array;
    use crate::liveness::SharedBuffer;
    use crate::query::Query;
    use crate::query::tests::rows;
    use crate::types::{Datatype, QueryType};

    fn write_rows(array: &Array, first: i64, last: i64) {
        let cells = (last - first + 1) as usize;
        array.open(QueryType::Write).unwrap();
        let query = Query::new(array, QueryType::Write).unwrap();
        query.set_subarray(&rows(array, first, last)).unwrap();
        query.set_data_buffer("a", SharedBuffer::new(vec![1i32; cells])).unwrap();
        query.set_data_buffer("b", SharedBuffer::new(vec![0.0f64; cells])).unwrap();
        query.submit().unwrap();
        array.close().unwrap();
    }

    #[test]
    fn test_lists_written_fragments() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "fragment-info");
        write_rows(&array, 1, 4);
        write_rows(&array, 10, 12);

        let info = FragmentInfo::new(&ctx, array.uri()).unwrap();
        assert!(info.fragment_num().is_err());
        info.load().unwrap();
        assert_eq!(info.fragment_num().unwrap(), 2);
        assert!(info.fragment_uri(0).unwrap().starts_with(array.uri()));
        assert!(info.is_dense(1).unwrap());
        assert!(!info.is_sparse(1).unwrap());
        assert_eq!(info.cell_num(0).unwrap(), 4);
        assert_eq!(info.fragment_size(1).unwrap(), 3 * (4 + 8));
        assert_eq!(info.non_empty_domain::<i64>(1, 0).unwrap(), [10, 12]);
        assert_eq!(info.non_empty_domain_by_name::<i64>(0, "rows").unwrap(), [1, 4]);
        let (first, _) = info.timestamp_range(0).unwrap();
        let (_, second) = info.timestamp_range(1).unwrap();
        assert!(first < second);
        assert!(info.version(0).unwrap() > 0);
        assert!(!info.has_consolidated_metadata(0).unwrap());
        assert_eq!(info.unconsolidated_metadata_num().unwrap(), 2);
        assert_eq!(info.to_vacuum_num().unwrap(), 0);
        assert!(info.to_vacuum_uri(0).is_err());
        let schema = info.array_schema(0).unwrap();
        assert_eq!(schema.attribute("b").unwrap().datatype().unwrap(), Datatype::Float64);
    }

    #[test]
    fn test_out_of_range_fragment_is_an_error() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "fragment-info-bounds");
        write_rows(&array, 1, 1);
        let info = FragmentInfo::new(&ctx, array.uri()).unwrap();
        info.load().unwrap();
        assert!(info.cell_num(1).is_err());
        assert!(matches!(
            info.non_empty_domain::<i32>(0, 0),
            Err(Error::TypeMismatch { expected: "i64", actual: "i32", .. })
        ));
    }

    #[test]
    fn test_load_of_missing_array_fails() {
        let ctx = Context::new().unwrap();
        let info = FragmentInfo::new(&ctx, "mem://tests/no-fragments-here").unwrap();
        let err = info.load().unwrap_err();
        assert!(err.to_string().contains("no-fragments-here"));
    }
}
