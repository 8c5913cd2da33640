//! Arrays: creation, opening, schema access, metadata and consolidation plans.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::consolidation::ConsolidationPlan;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::{ArrayHandle, ArraySchemaHandle, CapiHandle, ConsolidationPlanHandle};
use crate::schema::ArraySchema;
use crate::schema_evolution::ArraySchemaEvolution;
use crate::sys;
use crate::types::{CellType, Datatype, QueryType, cells_as_bytes, cells_from_bytes, native_bytes};
use crate::util::cstring;

/// An array at a URI. Clones refer to the same native array object.
#[derive(Debug, Clone)]
pub struct Array {
    context: Context,
    handle: ArrayHandle,
    uri: Arc<str>,
    // Metadata values returned by the engine point into the open array's
    // state; readers hold this shared while copying, open and close take it
    // exclusively.
    open_state: Arc<RwLock<()>>,
}

impl Array {
    /// Create a new array at `uri`.
    pub fn create(context: &Context, uri: &str, schema: &ArraySchema) -> Result<()> {
        let c_uri = cstring("uri", uri)?;
        context.capi_call(
            || format!("create array '{uri}'"),
            |ctx| unsafe { sys::tiledb_array_create(ctx, c_uri.as_ptr(), schema.raw()) },
        )
    }

    /// Apply staged schema changes to the array at `uri`.
    pub fn evolve(context: &Context, uri: &str, evolution: &ArraySchemaEvolution) -> Result<()> {
        let c_uri = cstring("uri", uri)?;
        context.capi_call(
            || format!("evolve array '{uri}'"),
            |ctx| unsafe { sys::tiledb_array_evolve(ctx, c_uri.as_ptr(), evolution.raw()) },
        )
    }

    /// Allocate an array object for `uri`. The array is not opened.
    pub fn new(context: &Context, uri: &str) -> Result<Self> {
        let c_uri = cstring("uri", uri)?;
        let handle = context
            .capi_alloc::<ArrayHandle, _>(|ctx, out| unsafe { sys::tiledb_array_alloc(ctx, c_uri.as_ptr(), out) })?;
        Ok(Self {
            context: context.clone(),
            handle,
            uri: uri.into(),
            open_state: Arc::new(RwLock::new(())),
        })
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_array_t {
        self.handle.get().as_ptr()
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Open the array at its latest state.
    pub fn open(&self, query_type: QueryType) -> Result<()> {
        self.open_at(query_type, 0, u64::MAX)
    }

    /// Open the array seeing only fragments written within `[start, end]`.
    ///
    /// Writes through an array opened with a finite `end` are stamped with
    /// `end`.
    pub fn open_at(&self, query_type: QueryType, start: u64, end: u64) -> Result<()> {
        let _state = self.open_state.write();
        self.context.capi_call(
            || format!("set open timestamp start of array '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_array_set_open_timestamp_start(ctx, self.raw(), start) },
        )?;
        self.context.capi_call(
            || format!("set open timestamp end of array '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_array_set_open_timestamp_end(ctx, self.raw(), end) },
        )?;
        self.context.capi_call(
            || format!("open array '{}' for {query_type:?}", self.uri),
            |ctx| unsafe { sys::tiledb_array_open(ctx, self.raw(), query_type.to_raw()) },
        )?;
        tracing::trace!(uri = %self.uri, ?query_type, start, end, "opened array");
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        let _state = self.open_state.write();
        self.context.capi_call(
            || format!("close array '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_array_close(ctx, self.raw()) },
        )
    }

    pub fn is_open(&self) -> Result<bool> {
        let mut open = 0;
        self.context.capi_call(
            || format!("check whether array '{}' is open", self.uri),
            |ctx| unsafe { sys::tiledb_array_is_open(ctx, self.raw(), &mut open) },
        )?;
        Ok(open != 0)
    }

    pub fn query_type(&self) -> Result<QueryType> {
        let mut raw = 0;
        self.context.capi_call(
            || format!("get query type of array '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_array_get_query_type(ctx, self.raw(), &mut raw) },
        )?;
        QueryType::from_raw(raw)
    }

    /// The schema of the open array.
    pub fn schema(&self) -> Result<ArraySchema> {
        let handle = self.context.capi_handle::<ArraySchemaHandle, _>(
            || format!("get schema of array '{}'", self.uri),
            |ctx, out| unsafe { sys::tiledb_array_get_schema(ctx, self.raw(), out) },
        )?;
        Ok(ArraySchema::from_handle(&self.context, handle))
    }

    fn put_metadata_raw(&self, key: &str, datatype: Datatype, num: usize, bytes: &[u8]) -> Result<()> {
        let c_key = cstring("key", key)?;
        let num = u32::try_from(num).map_err(|_| Error::InvalidArgument {
            name: "value",
            reason: format!("{num} values do not fit in one metadata item"),
        })?;
        self.context.capi_call(
            || format!("put metadata '{key}' on array '{}'", self.uri),
            |ctx| unsafe {
                sys::tiledb_array_put_metadata(
                    ctx,
                    self.raw(),
                    c_key.as_ptr(),
                    datatype.to_raw(),
                    num,
                    bytes.as_ptr().cast(),
                )
            },
        )
    }

    /// Store `values` under `key`. The array must be open for writing.
    pub fn put_metadata<T: CellType>(&self, key: &str, values: &[T]) -> Result<()> {
        self.put_metadata_raw(key, T::DATATYPE, values.len(), cells_as_bytes(values))
    }

    pub fn put_metadata_str(&self, key: &str, value: &str) -> Result<()> {
        self.put_metadata_raw(key, Datatype::StringUtf8, value.len(), value.as_bytes())
    }

    /// Copy the stored type and bytes of `key`, `None` when absent.
    fn get_metadata_raw(&self, key: &str) -> Result<Option<(Datatype, Vec<u8>)>> {
        let c_key = cstring("key", key)?;
        let mut datatype = 0;
        let mut num = 0u32;
        let mut value = std::ptr::null();
        let _state = self.open_state.read();
        self.context.capi_call(
            || format!("get metadata '{key}' from array '{}'", self.uri),
            |ctx| unsafe {
                sys::tiledb_array_get_metadata(ctx, self.raw(), c_key.as_ptr(), &mut datatype, &mut num, &mut value)
            },
        )?;
        if value.is_null() {
            return Ok(None);
        }
        let datatype = Datatype::from_raw(datatype)?;
        let len = datatype.size() as u64 * u64::from(num);
        Ok(Some((datatype, unsafe { native_bytes(value, len) }.to_vec())))
    }

    /// Read the values under `key`. The array must be open for reading.
    ///
    /// A value stored with a different type is a [`Error::TypeMismatch`].
    pub fn get_metadata<T: CellType>(&self, key: &str) -> Result<Option<Vec<T>>> {
        let Some((datatype, bytes)) = self.get_metadata_raw(key)? else {
            return Ok(None);
        };
        if datatype != T::DATATYPE {
            return Err(Error::TypeMismatch {
                operation: format!("get metadata '{key}'"),
                expected: datatype.type_name(),
                actual: T::DATATYPE.type_name(),
            });
        }
        cells_from_bytes(&bytes).map(Some)
    }

    pub fn get_metadata_str(&self, key: &str) -> Result<Option<String>> {
        let Some((datatype, bytes)) = self.get_metadata_raw(key)? else {
            return Ok(None);
        };
        if !datatype.is_string() {
            return Err(Error::TypeMismatch {
                operation: format!("get metadata '{key}'"),
                expected: datatype.type_name(),
                actual: "string",
            });
        }
        String::from_utf8(bytes).map(Some).map_err(|_| Error::InvalidArgument {
            name: "key",
            reason: format!("metadata '{key}' is not valid UTF-8"),
        })
    }

    pub fn delete_metadata(&self, key: &str) -> Result<()> {
        let c_key = cstring("key", key)?;
        self.context.capi_call(
            || format!("delete metadata '{key}' from array '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_array_delete_metadata(ctx, self.raw(), c_key.as_ptr()) },
        )
    }

    pub fn metadata_num(&self) -> Result<u64> {
        let mut num = 0;
        self.context.capi_call(
            || format!("count metadata of array '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_array_get_metadata_num(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    /// Plan which fragments of the open array to consolidate together, aiming
    /// for `fragment_size` bytes per result.
    pub fn consolidation_plan(&self, fragment_size: u64) -> Result<ConsolidationPlan> {
        let handle = self.context.capi_handle::<ConsolidationPlanHandle, _>(
            || format!("create consolidation plan for array '{}'", self.uri),
            |ctx, out| unsafe { sys::tiledb_consolidation_plan_create_with_mbr(ctx, self.raw(), fragment_size, out) },
        )?;
        Ok(ConsolidationPlan::from_handle(&self.context, handle))
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::tests::dense_schema;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A URI no other test uses.
    pub(crate) fn unique_uri(name: &str) -> String {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        format!("mem://tests/{name}-{}", NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a dense array with attributes `a` (i32) and `b` (f64).
    pub(crate) fn dense_array(ctx: &Context, name: &str) -> Array {
        let uri = unique_uri(name);
        Array::create(ctx, &uri, &dense_schema(ctx)).unwrap();
        Array::new(ctx, &uri).unwrap()
    }

    #[test]
    fn test_open_close() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "open-close");
        assert!(!array.is_open().unwrap());
        array.open(QueryType::Read).unwrap();
        assert!(array.is_open().unwrap());
        assert_eq!(array.query_type().unwrap(), QueryType::Read);
        assert!(array.open(QueryType::Read).is_err());
        array.close().unwrap();
        assert!(!array.is_open().unwrap());
        assert!(array.query_type().is_err());
    }

    #[test]
    fn test_create_twice() {
        let ctx = Context::new().unwrap();
        let uri = unique_uri("twice");
        Array::create(&ctx, &uri, &dense_schema(&ctx)).unwrap();
        let err = Array::create(&ctx, &uri, &dense_schema(&ctx)).unwrap_err();
        assert!(err.to_string().contains(&uri));
    }

    #[test]
    fn test_open_missing_names_uri() {
        let ctx = Context::new().unwrap();
        let array = Array::new(&ctx, "mem://tests/never-created").unwrap();
        let err = array.open(QueryType::Read).unwrap_err();
        assert!(err.native_message().unwrap().contains("never-created"));
    }

    #[test]
    fn test_schema_of_open_array() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "schema");
        assert!(array.schema().is_err());
        array.open(QueryType::Read).unwrap();
        let schema = array.schema().unwrap();
        assert_eq!(schema.attribute_num().unwrap(), 2);
        assert_eq!(schema.attribute("a").unwrap().datatype().unwrap(), Datatype::Int32);
    }

    #[test]
    fn test_metadata_round_trip() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "metadata");
        array.open(QueryType::Write).unwrap();
        array.put_metadata("scale", &[0.5f64, 2.0]).unwrap();
        array.put_metadata_str("unit", "kelvin").unwrap();
        array.put_metadata("stale", &[1u8]).unwrap();
        array.delete_metadata("stale").unwrap();
        array.close().unwrap();

        array.open(QueryType::Read).unwrap();
        assert_eq!(array.metadata_num().unwrap(), 2);
        assert_eq!(array.get_metadata::<f64>("scale").unwrap(), Some(vec![0.5, 2.0]));
        assert_eq!(array.get_metadata_str("unit").unwrap().as_deref(), Some("kelvin"));
        assert_eq!(array.get_metadata::<u8>("stale").unwrap(), None);
    }

    #[test]
    fn test_metadata_type_mismatch() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "metadata-type");
        array.open(QueryType::Write).unwrap();
        array.put_metadata("count", &[7i64]).unwrap();
        array.close().unwrap();

        array.open(QueryType::Read).unwrap();
        let err = array.get_metadata::<i32>("count").unwrap_err();
        match err {
            Error::TypeMismatch {
                operation,
                expected,
                actual,
            } => {
                assert!(operation.contains("count"));
                assert_eq!(expected, "i64");
                assert_eq!(actual, "i32");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(array.get_metadata_str("count"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_metadata_requires_matching_mode() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "metadata-mode");
        array.open(QueryType::Read).unwrap();
        let err = array.put_metadata("k", &[1u32]).unwrap_err();
        assert!(err.native_message().unwrap().contains("WRITE"));
        assert!(err.to_string().contains("'k'"));
    }
}
