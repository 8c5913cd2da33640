//! Read and write queries.
//!
//! Buffers are registered as [`SharedBuffer`]s and handed to the engine only
//! while a submission runs. Each submission pins every registered buffer with
//! an owned write guard and boxes a size cell per buffer; synchronous
//! submissions release them when the call returns, asynchronous ones move
//! them into an [`InFlight`] record released by the completion callback.

use std::collections::BTreeMap;
use std::ffi::CString;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::array::Array;
use crate::context::Context;
use crate::error::{Error, ErrorCode, Result};
use crate::handle::{CapiHandle, QueryHandle};
use crate::liveness::{Completion, InFlight, PinnedField, SharedBuffer, complete_in_flight, release_later};
use crate::query_condition::QueryCondition;
use crate::schema::VAR_NUM;
use crate::subarray::Subarray;
use crate::sys;
use crate::types::{CellType, Datatype, Layout, QueryStatus, QueryType};
use crate::util::cstring;

/// A registered buffer with its cell type erased.
trait FieldBuffer: Send + Sync {
    fn pin(&self) -> PinnedField;
    fn cell_size(&self) -> usize;
    fn storage_id(&self) -> usize;
}

impl<T: CellType> FieldBuffer for SharedBuffer<T> {
    fn pin(&self) -> PinnedField {
        SharedBuffer::pin(self)
    }

    fn cell_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn storage_id(&self) -> usize {
        SharedBuffer::storage_id(self)
    }
}

/// What a registered buffer holds for its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BufferRole {
    Data,
    Offsets,
    Validity,
}

impl BufferRole {
    fn label(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Offsets => "offsets",
            Self::Validity => "validity",
        }
    }
}

type BufferKey = (String, BufferRole);

/// A buffer pinned for one submission, with the size cell the engine
/// reads capacity from and writes result sizes to.
struct PinnedBuffer {
    key: BufferKey,
    _pin: PinnedField,
    size: Box<u64>,
}

#[derive(Default)]
struct QueryState {
    buffers: BTreeMap<BufferKey, Arc<dyn FieldBuffer>>,
    result_bytes: BTreeMap<BufferKey, u64>,
    subarray: Option<Subarray>,
    condition: Option<QueryCondition>,
    in_flight: Option<Arc<Completion>>,
    // Captured by the completion callback so later calls on the context
    // cannot replace it.
    async_failure: Option<String>,
}

impl QueryState {
    fn check_idle(&self, what: &str) -> Result<()> {
        match self.in_flight {
            Some(_) => Err(Error::InvalidState(format!(
                "cannot set {what} while a submission is in flight"
            ))),
            None => Ok(()),
        }
    }
}

struct QueryInner {
    context: Context,
    array: Array,
    query_type: QueryType,
    handle: QueryHandle,
    state: Mutex<QueryState>,
}

impl QueryInner {
    fn raw(&self) -> *mut sys::tiledb_query_t {
        self.handle.get().as_ptr()
    }

    /// Pin every registered buffer and point the engine at it.
    fn pin_buffers(&self, state: &QueryState) -> Result<Vec<PinnedBuffer>> {
        if state.buffers.is_empty() {
            return Err(Error::InvalidState(format!(
                "no buffers set on query for array '{}'",
                self.array.uri()
            )));
        }
        let mut pinned = Vec::with_capacity(state.buffers.len());
        for ((name, role), buffer) in &state.buffers {
            let c_name: CString = cstring("name", name)?;
            let pin = buffer.pin();
            let mut size = Box::new(pin.bytes());
            let size_ptr: *mut u64 = &mut *size;
            self.context.capi_call(
                || format!("set {} buffer '{name}'", role.label()),
                |ctx| unsafe {
                    match role {
                        BufferRole::Data => sys::tiledb_query_set_data_buffer(
                            ctx,
                            self.raw(),
                            c_name.as_ptr(),
                            pin.as_ptr(),
                            size_ptr,
                        ),
                        BufferRole::Offsets => sys::tiledb_query_set_offsets_buffer(
                            ctx,
                            self.raw(),
                            c_name.as_ptr(),
                            pin.as_ptr().cast(),
                            size_ptr,
                        ),
                        BufferRole::Validity => sys::tiledb_query_set_validity_buffer(
                            ctx,
                            self.raw(),
                            c_name.as_ptr(),
                            pin.as_ptr().cast(),
                            size_ptr,
                        ),
                    }
                },
            )?;
            pinned.push(PinnedBuffer {
                key: (name.clone(), *role),
                _pin: pin,
                size,
            });
        }
        Ok(pinned)
    }

    fn record_sizes(state: &mut QueryState, pinned: &[PinnedBuffer]) {
        for buffer in pinned {
            state.result_bytes.insert(buffer.key.clone(), *buffer.size);
        }
    }

    /// Whether the engine marked the query failed; read under the context's
    /// error channel so the message captured with it is this query's.
    fn async_failure(&self) -> Option<String> {
        self.context.failure_message(|ctx| {
            let mut status = 0;
            let read = unsafe { sys::tiledb_query_get_status(ctx, self.raw(), &mut status) };
            read == sys::TILEDB_OK && status == sys::TILEDB_FAILED
        })
    }

    fn register(&self, name: &str, role: BufferRole, buffer: Arc<dyn FieldBuffer>) -> Result<()> {
        let mut state = self.state.lock();
        state.check_idle(&format!("buffer '{name}'"))?;
        let id = buffer.storage_id();
        if let Some(((other, other_role), _)) = state
            .buffers
            .iter()
            .find(|((other, other_role), existing)| {
                (other.as_str() != name || *other_role != role) && existing.storage_id() == id
            })
        {
            return Err(Error::InvalidArgument {
                name: "buffer",
                reason: format!(
                    "{} buffer for '{name}' is already registered as the {} buffer for '{other}'",
                    role.label(),
                    other_role.label()
                ),
            });
        }
        let key = (name.to_string(), role);
        state.result_bytes.remove(&key);
        state.buffers.insert(key, buffer);
        Ok(())
    }
}

/// A query against an open array. Clones share the same native query.
#[derive(Clone)]
pub struct Query {
    inner: Arc<QueryInner>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("array", &self.inner.array.uri())
            .field("query_type", &self.inner.query_type)
            .field("handle", &self.inner.handle)
            .finish()
    }
}

impl Query {
    /// Create a query on `array`, which must be open in `query_type` mode.
    pub fn new(array: &Array, query_type: QueryType) -> Result<Self> {
        let context = array.context().clone();
        let handle = context.capi_alloc::<QueryHandle, _>(|ctx, out| unsafe {
            sys::tiledb_query_alloc(ctx, array.raw(), query_type.to_raw(), out)
        })?;
        Ok(Self {
            inner: Arc::new(QueryInner {
                context,
                array: array.clone(),
                query_type,
                handle,
                state: Mutex::new(QueryState::default()),
            }),
        })
    }

    pub fn query_type(&self) -> QueryType {
        self.inner.query_type
    }

    pub fn set_layout(&self, layout: Layout) -> Result<()> {
        self.inner.context.capi_call(
            || format!("set query layout to {layout:?}"),
            |ctx| unsafe { sys::tiledb_query_set_layout(ctx, self.inner.raw(), layout.to_raw()) },
        )
    }

    pub fn layout(&self) -> Result<Layout> {
        let mut raw = 0;
        self.inner.context.capi_call(
            || "get query layout".into(),
            |ctx| unsafe { sys::tiledb_query_get_layout(ctx, self.inner.raw(), &mut raw) },
        )?;
        Layout::from_raw(raw)
    }

    /// Register `buffer` for attribute `name`.
    ///
    /// For writes the buffer holds the cells to write; for reads its length is
    /// the capacity and results are written into it. The attribute's type
    /// must match `T`; string attributes take `u8` or `i8` bytes. The query
    /// keeps a clone of the buffer.
    pub fn set_data_buffer<T: CellType>(&self, name: &str, buffer: SharedBuffer<T>) -> Result<()> {
        let datatype = self.inner.array.schema()?.attribute(name)?.datatype()?;
        let bytes_for_string = datatype.is_string() && matches!(T::DATATYPE, Datatype::Int8 | Datatype::UInt8);
        if datatype != T::DATATYPE && !bytes_for_string {
            return Err(Error::TypeMismatch {
                operation: format!("set data buffer '{name}'"),
                expected: datatype.type_name(),
                actual: T::DATATYPE.type_name(),
            });
        }
        self.inner.register(name, BufferRole::Data, Arc::new(buffer))
    }

    /// Register the start offset, in bytes of the data buffer, of each cell
    /// of var-sized attribute `name`.
    pub fn set_offsets_buffer(&self, name: &str, buffer: SharedBuffer<u64>) -> Result<()> {
        if self.inner.array.schema()?.attribute(name)?.cell_val_num()? != VAR_NUM {
            return Err(Error::InvalidArgument {
                name: "name",
                reason: format!("attribute '{name}' is not var-sized"),
            });
        }
        self.inner.register(name, BufferRole::Offsets, Arc::new(buffer))
    }

    /// Register one validity byte per cell of nullable attribute `name`;
    /// zero marks a null cell.
    pub fn set_validity_buffer(&self, name: &str, buffer: SharedBuffer<u8>) -> Result<()> {
        if !self.inner.array.schema()?.attribute(name)?.nullable()? {
            return Err(Error::InvalidArgument {
                name: "name",
                reason: format!("attribute '{name}' is not nullable"),
            });
        }
        self.inner.register(name, BufferRole::Validity, Arc::new(buffer))
    }

    /// Restrict the query to the cells `subarray` selects. Without one, a
    /// query covers the whole domain. The engine copies the ranges, so later
    /// changes to `subarray` need another call.
    pub fn set_subarray(&self, subarray: &Subarray) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.check_idle("subarray")?;
        self.inner.context.capi_call(
            || format!("set subarray on query for array '{}'", self.inner.array.uri()),
            |ctx| unsafe { sys::tiledb_query_set_subarray_t(ctx, self.inner.raw(), subarray.raw()) },
        )?;
        state.subarray = Some(subarray.clone());
        Ok(())
    }

    pub fn subarray(&self) -> Option<Subarray> {
        self.inner.state.lock().subarray.clone()
    }

    /// Only return cells matching `condition`. Read queries only; on dense
    /// arrays cells that do not match come back as fill values.
    pub fn set_condition(&self, condition: &QueryCondition) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.check_idle("condition")?;
        self.inner.context.capi_call(
            || format!("set condition on query for array '{}'", self.inner.array.uri()),
            |ctx| unsafe { sys::tiledb_query_set_condition(ctx, self.inner.raw(), condition.raw()) },
        )?;
        state.condition = Some(condition.clone());
        Ok(())
    }

    /// Submit and block until the engine is done.
    ///
    /// Registered buffers stay pinned for the whole call: other clones can be
    /// dropped freely, and readers or writers of the buffer wait.
    pub fn submit(&self) -> Result<QueryStatus> {
        let mut state = self.inner.state.lock();
        if state.in_flight.is_some() {
            return Err(Error::InvalidState("query already has a submission in flight".into()));
        }
        let pinned = self.inner.pin_buffers(&state)?;
        let result = self.inner.context.capi_call(
            || format!("submit query on array '{}'", self.inner.array.uri()),
            |ctx| unsafe { sys::tiledb_query_submit(ctx, self.inner.raw()) },
        );
        QueryInner::record_sizes(&mut state, &pinned);
        drop(pinned);
        drop(state);
        result?;
        self.status()
    }

    /// Submit without blocking.
    ///
    /// The query, its array and context, and pins on every registered buffer
    /// are kept alive until the engine's completion callback fires, even if
    /// the caller drops all of its own references in the meantime. The
    /// callback releases the pins itself and hands the rest to the release
    /// thread, since the engine cannot free its own objects from a worker.
    pub fn submit_async(&self) -> Result<AsyncSubmission> {
        let completion = Completion::new();
        let pinned = {
            let mut state = self.inner.state.lock();
            if state.in_flight.is_some() {
                return Err(Error::InvalidState("query already has a submission in flight".into()));
            }
            let pinned = self.inner.pin_buffers(&state)?;
            state.in_flight = Some(Arc::clone(&completion));
            state.async_failure = None;
            pinned
        };

        let keep_alive = Arc::clone(&self.inner);
        let in_flight = InFlight::new(
            move || {
                // Takes the error channel, so it must run before the state lock.
                let failure = keep_alive.async_failure();
                let mut state = keep_alive.state.lock();
                QueryInner::record_sizes(&mut state, &pinned);
                state.async_failure = failure;
                state.in_flight = None;
                drop(state);
                drop(pinned);
                tracing::trace!(uri = %keep_alive.array.uri(), "asynchronous submission completed");
                release_later(keep_alive);
            },
            Arc::clone(&completion),
        );
        let data = in_flight.into_raw();
        let submitted = self.inner.context.capi_call(
            || format!("submit query asynchronously on array '{}'", self.inner.array.uri()),
            |ctx| unsafe { sys::tiledb_query_submit_async(ctx, self.inner.raw(), Some(complete_in_flight), data) },
        );
        if let Err(err) = submitted {
            // The callback will never fire; release the pins here.
            drop(unsafe { InFlight::reclaim(data) });
            self.inner.state.lock().in_flight = None;
            return Err(err);
        }
        Ok(AsyncSubmission {
            query: self.clone(),
            completion,
        })
    }

    pub fn status(&self) -> Result<QueryStatus> {
        let mut raw = 0;
        self.inner.context.capi_call(
            || "get query status".into(),
            |ctx| unsafe { sys::tiledb_query_get_status(ctx, self.inner.raw(), &mut raw) },
        )?;
        QueryStatus::from_raw(raw)
    }

    /// Whether the last read produced any cells.
    pub fn has_results(&self) -> Result<bool> {
        let mut has_results = 0;
        self.inner.context.capi_call(
            || "check query results".into(),
            |ctx| unsafe { sys::tiledb_query_has_results(ctx, self.inner.raw(), &mut has_results) },
        )?;
        Ok(has_results != 0)
    }

    fn result_elements(&self, name: &str, role: BufferRole) -> Result<usize> {
        let state = self.inner.state.lock();
        let key = (name.to_string(), role);
        let Some(buffer) = state.buffers.get(&key) else {
            return Err(Error::InvalidArgument {
                name: "name",
                reason: format!("no {} buffer registered for '{name}'", role.label()),
            });
        };
        let bytes = state.result_bytes.get(&key).copied().unwrap_or(0);
        Ok(bytes as usize / buffer.cell_size())
    }

    /// Number of elements the last submission produced in the data buffer
    /// for `name`. For var-sized attributes this counts bytes, not cells.
    pub fn result_len(&self, name: &str) -> Result<usize> {
        self.result_elements(name, BufferRole::Data)
    }

    /// Number of offsets, one per cell, the last submission produced for
    /// var-sized attribute `name`.
    pub fn result_offsets_len(&self, name: &str) -> Result<usize> {
        self.result_elements(name, BufferRole::Offsets)
    }

    /// Number of validity bytes the last submission produced for `name`.
    pub fn result_validity_len(&self, name: &str) -> Result<usize> {
        self.result_elements(name, BufferRole::Validity)
    }

    pub fn finalize(&self) -> Result<()> {
        self.inner.context.capi_call(
            || format!("finalize query on array '{}'", self.inner.array.uri()),
            |ctx| unsafe { sys::tiledb_query_finalize(ctx, self.inner.raw()) },
        )
    }

    /// Release the native query, first waiting for any submission in flight.
    pub fn free(&self) {
        let pending = self.inner.state.lock().in_flight.clone();
        if let Some(completion) = pending {
            completion.wait();
        }
        self.inner.handle.free();
    }
}

/// A pending asynchronous submission.
///
/// Dropping it does not cancel the submission; the engine still completes
/// it and the kept-alive state is released then.
pub struct AsyncSubmission {
    query: Query,
    completion: Arc<Completion>,
}

impl AsyncSubmission {
    pub fn is_complete(&self) -> bool {
        self.completion.is_complete()
    }

    /// Block until the engine completes the submission and report its status.
    pub fn wait(self) -> Result<QueryStatus> {
        self.completion.wait();
        self.finished_status()
    }

    /// Wait at most `timeout`. Returns the submission back if it is still
    /// running.
    pub fn wait_for(self, timeout: Duration) -> std::result::Result<Result<QueryStatus>, Self> {
        if self.completion.wait_for(timeout) {
            Ok(self.finished_status())
        } else {
            Err(self)
        }
    }

    fn finished_status(&self) -> Result<QueryStatus> {
        match self.query.status()? {
            QueryStatus::Failed => {
                let inner = &self.query.inner;
                let message = inner.state.lock().async_failure.clone();
                Err(Error::Operation {
                    operation: format!("submit query on array '{}'", inner.array.uri()),
                    code: ErrorCode::Err,
                    message: message.unwrap_or_else(|| "no error message available".to_string()),
                })
            }
            status => Ok(status),
        }
    }
}

impl std::fmt::Debug for AsyncSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSubmission")
            .field("query", &self.query)
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::array::tests::{dense_array, unique_uri};
    use crate::config::Config;
    use crate::schema::{ArraySchema, Attribute, Dimension, Domain};
    use crate::types::{ArrayType, ConditionOp};
    use std::thread;
    use std::time::Instant;

    /// Subarray selecting rows `first..=last` of a one-dimensional array.
    pub(crate) fn rows(array: &Array, first: i64, last: i64) -> Subarray {
        let subarray = Subarray::new(array).unwrap();
        subarray.add_range(0, first..=last).unwrap();
        subarray
    }

    fn write_cells(array: &Array, a: Vec<i32>, b: Vec<f64>) {
        array.open(QueryType::Write).unwrap();
        let query = Query::new(array, QueryType::Write).unwrap();
        query.set_subarray(&rows(array, 1, a.len() as i64)).unwrap();
        query.set_data_buffer("a", SharedBuffer::new(a)).unwrap();
        query.set_data_buffer("b", SharedBuffer::new(b)).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        query.finalize().unwrap();
        array.close().unwrap();
    }

    /// Writable single-cell query on a fresh dense array.
    fn one_cell_write(ctx: &Context, name: &str) -> (Array, Query) {
        let array = dense_array(ctx, name);
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_subarray(&rows(&array, 1, 1)).unwrap();
        query.set_data_buffer("a", SharedBuffer::new(vec![5i32])).unwrap();
        query.set_data_buffer("b", SharedBuffer::new(vec![5.0f64])).unwrap();
        (array, query)
    }

    fn delayed_context(delay_ms: u64) -> Context {
        let config = Config::new().unwrap();
        config.set("sim.submit_delay_ms", &delay_ms.to_string()).unwrap();
        Context::with_config(&config).unwrap()
    }

    /// Rows 1..=100 with a var-sized string `name` and a nullable i32 `score`.
    fn labelled_array(ctx: &Context, name: &str) -> Array {
        let rows = Dimension::new(ctx, "rows", [1i64, 100], Some(10)).unwrap();
        let domain = Domain::new(ctx).unwrap();
        domain.add_dimension(&rows).unwrap();
        let schema = ArraySchema::new(ctx, ArrayType::Dense).unwrap();
        schema.set_domain(&domain).unwrap();
        let label = Attribute::new(ctx, "name", Datatype::StringUtf8).unwrap();
        label.set_cell_val_num(VAR_NUM).unwrap();
        schema.add_attribute(&label).unwrap();
        let score = Attribute::new(ctx, "score", Datatype::Int32).unwrap();
        score.set_nullable(true).unwrap();
        schema.add_attribute(&score).unwrap();
        let uri = unique_uri(name);
        Array::create(ctx, &uri, &schema).unwrap();
        Array::new(ctx, &uri).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-round-trip");
        write_cells(&array, vec![1, 2, 3], vec![0.5, 1.5, 2.5]);

        array.open(QueryType::Read).unwrap();
        let query = Query::new(&array, QueryType::Read).unwrap();
        query.set_layout(Layout::RowMajor).unwrap();
        assert_eq!(query.layout().unwrap(), Layout::RowMajor);
        query.set_subarray(&rows(&array, 1, 3)).unwrap();
        let a = SharedBuffer::<i32>::zeroed(8);
        let b = SharedBuffer::<f64>::zeroed(8);
        query.set_data_buffer("a", a.clone()).unwrap();
        query.set_data_buffer("b", b.clone()).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        assert!(query.has_results().unwrap());
        assert_eq!(query.result_len("a").unwrap(), 3);
        assert_eq!(a.to_vec(query.result_len("a").unwrap()), vec![1, 2, 3]);
        assert_eq!(b.to_vec(query.result_len("b").unwrap()), vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_incomplete_read_resumes() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-incomplete");
        write_cells(&array, vec![10, 20, 30, 40, 50], vec![0.0; 5]);

        array.open(QueryType::Read).unwrap();
        let query = Query::new(&array, QueryType::Read).unwrap();
        query.set_subarray(&rows(&array, 1, 5)).unwrap();
        let a = SharedBuffer::<i32>::zeroed(2);
        query.set_data_buffer("a", a.clone()).unwrap();

        let mut seen = Vec::new();
        loop {
            let status = query.submit().unwrap();
            seen.extend(a.to_vec(query.result_len("a").unwrap()));
            if status == QueryStatus::Completed {
                break;
            }
            assert_eq!(status, QueryStatus::Incomplete);
        }
        assert_eq!(seen, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_unwritten_dense_cells_read_as_fill() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-fill");
        write_cells(&array, vec![7, 8], vec![0.0; 2]);

        array.open(QueryType::Read).unwrap();
        let query = Query::new(&array, QueryType::Read).unwrap();
        query.set_subarray(&rows(&array, 2, 4)).unwrap();
        let a = SharedBuffer::<i32>::zeroed(8);
        query.set_data_buffer("a", a.clone()).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        assert_eq!(a.to_vec(query.result_len("a").unwrap()), vec![8, 0, 0]);
    }

    #[test]
    fn test_write_count_must_match_subarray() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-count");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_subarray(&rows(&array, 1, 4)).unwrap();
        query.set_data_buffer("a", SharedBuffer::new(vec![1i32, 2])).unwrap();
        query.set_data_buffer("b", SharedBuffer::new(vec![1.0f64, 2.0])).unwrap();
        let err = query.submit().unwrap_err();
        assert!(err.native_message().unwrap().contains("selects 4"));
    }

    #[test]
    fn test_var_sized_and_nullable_cells() {
        let ctx = Context::new().unwrap();
        let array = labelled_array(&ctx, "query-var-nullable");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_subarray(&rows(&array, 1, 3)).unwrap();
        query
            .set_data_buffer("name", SharedBuffer::new(b"alphabetagamma".to_vec()))
            .unwrap();
        query.set_offsets_buffer("name", SharedBuffer::new(vec![0u64, 5, 9])).unwrap();
        query.set_data_buffer("score", SharedBuffer::new(vec![1i32, 2, 3])).unwrap();
        query.set_validity_buffer("score", SharedBuffer::new(vec![1u8, 0, 1])).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        array.close().unwrap();

        array.open(QueryType::Read).unwrap();
        let query = Query::new(&array, QueryType::Read).unwrap();
        query.set_subarray(&rows(&array, 1, 4)).unwrap();
        let names = SharedBuffer::<u8>::zeroed(64);
        let offsets = SharedBuffer::<u64>::zeroed(8);
        let scores = SharedBuffer::<i32>::zeroed(8);
        let validity = SharedBuffer::<u8>::zeroed(8);
        query.set_data_buffer("name", names.clone()).unwrap();
        query.set_offsets_buffer("name", offsets.clone()).unwrap();
        query.set_data_buffer("score", scores.clone()).unwrap();
        query.set_validity_buffer("score", validity.clone()).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);

        assert_eq!(query.result_len("name").unwrap(), 14);
        assert_eq!(names.to_vec(14), b"alphabetagamma".to_vec());
        // The unwritten fourth cell is an empty string.
        assert_eq!(offsets.to_vec(query.result_offsets_len("name").unwrap()), vec![0, 5, 9, 14]);
        assert_eq!(validity.to_vec(query.result_validity_len("score").unwrap()), vec![1, 0, 1, 0]);
        let scores = scores.to_vec(query.result_len("score").unwrap());
        assert_eq!((scores[0], scores[2]), (1, 3));
        assert!(matches!(
            query.result_offsets_len("score"),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_offsets_and_validity_need_matching_attribute() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-roles");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        let err = query.set_offsets_buffer("a", SharedBuffer::new(vec![0u64])).unwrap_err();
        assert!(err.to_string().contains("not var-sized"));
        let err = query.set_validity_buffer("b", SharedBuffer::new(vec![1u8])).unwrap_err();
        assert!(err.to_string().contains("not nullable"));
    }

    #[test]
    fn test_var_write_without_offsets_fails() {
        let ctx = Context::new().unwrap();
        let array = labelled_array(&ctx, "query-var-no-offsets");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_subarray(&rows(&array, 1, 1)).unwrap();
        query.set_data_buffer("name", SharedBuffer::new(b"x".to_vec())).unwrap();
        query.set_data_buffer("score", SharedBuffer::new(vec![1i32])).unwrap();
        query.set_validity_buffer("score", SharedBuffer::new(vec![1u8])).unwrap();
        let err = query.submit().unwrap_err();
        assert!(err.native_message().unwrap().contains("Offsets buffer"));
    }

    #[test]
    fn test_condition_fills_unmatched_dense_cells() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-condition");
        write_cells(&array, vec![1, 2, 3, 4], vec![0.5, 1.5, 2.5, 3.5]);

        array.open(QueryType::Read).unwrap();
        let query = Query::new(&array, QueryType::Read).unwrap();
        query.set_subarray(&rows(&array, 1, 4)).unwrap();
        let above = QueryCondition::new(&ctx, "a", 2i32, ConditionOp::Gt).unwrap();
        let below = QueryCondition::new(&ctx, "b", 3.0f64, ConditionOp::Lt).unwrap();
        query.set_condition(&above.and(&below).unwrap()).unwrap();
        let a = SharedBuffer::<i32>::zeroed(8);
        query.set_data_buffer("a", a.clone()).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        assert_eq!(a.to_vec(query.result_len("a").unwrap()), vec![0, 0, 3, 0]);
    }

    #[test]
    fn test_condition_rejected_on_writes_and_unknown_attributes() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-condition-write");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        let cond = QueryCondition::new(&ctx, "a", 1i32, ConditionOp::Eq).unwrap();
        let err = query.set_condition(&cond).unwrap_err();
        assert!(err.native_message().unwrap().contains("read queries"));
        array.close().unwrap();

        array.open(QueryType::Read).unwrap();
        let query = Query::new(&array, QueryType::Read).unwrap();
        let cond = QueryCondition::new(&ctx, "humidity", 1i32, ConditionOp::Eq).unwrap();
        let err = query.set_condition(&cond).unwrap_err();
        assert!(err.native_message().unwrap().contains("humidity"));
    }

    #[test]
    fn test_col_major_write_reads_back_row_major() {
        let ctx = Context::new().unwrap();
        let domain = Domain::new(&ctx).unwrap();
        domain
            .add_dimension(&Dimension::new(&ctx, "rows", [1i64, 4], Some(2)).unwrap())
            .unwrap();
        domain
            .add_dimension(&Dimension::new(&ctx, "cols", [1i64, 4], Some(2)).unwrap())
            .unwrap();
        let schema = ArraySchema::new(&ctx, ArrayType::Dense).unwrap();
        schema.set_domain(&domain).unwrap();
        schema
            .add_attribute(&Attribute::new(&ctx, "v", Datatype::Int32).unwrap())
            .unwrap();
        let uri = unique_uri("query-col-major");
        Array::create(&ctx, &uri, &schema).unwrap();
        let array = Array::new(&ctx, &uri).unwrap();

        let square = |array: &Array| {
            let subarray = Subarray::new(array).unwrap();
            subarray.add_range(0, 1i64..=2).unwrap();
            subarray.add_range(1, 1i64..=2).unwrap();
            subarray
        };
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_layout(Layout::ColMajor).unwrap();
        query.set_subarray(&square(&array)).unwrap();
        query.set_data_buffer("v", SharedBuffer::new(vec![11i32, 21, 12, 22])).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        array.close().unwrap();

        array.open(QueryType::Read).unwrap();
        let query = Query::new(&array, QueryType::Read).unwrap();
        query.set_subarray(&square(&array)).unwrap();
        let v = SharedBuffer::<i32>::zeroed(4);
        query.set_data_buffer("v", v.clone()).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        assert_eq!(v.to_vec(4), vec![11, 12, 21, 22]);
    }

    #[test]
    fn test_buffer_type_mismatch() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-type");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        let err = query.set_data_buffer("a", SharedBuffer::new(vec![1.0f32])).unwrap_err();
        match err {
            Error::TypeMismatch {
                operation,
                expected,
                actual,
            } => {
                assert!(operation.contains("'a'"));
                assert_eq!(expected, "i32");
                assert_eq!(actual, "f32");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_attribute_is_named() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-unknown");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        let err = query.set_data_buffer("humidity", SharedBuffer::new(vec![1i32])).unwrap_err();
        assert!(err.to_string().contains("humidity"));
    }

    #[test]
    fn test_same_storage_for_two_buffers() {
        let ctx = Context::new().unwrap();
        let uri = unique_uri("query-shared-storage");
        let schema = crate::schema::tests::dense_schema(&ctx);
        schema
            .add_attribute(&Attribute::new(&ctx, "c", Datatype::Int32).unwrap())
            .unwrap();
        Array::create(&ctx, &uri, &schema).unwrap();
        let array = Array::new(&ctx, &uri).unwrap();
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        let shared = SharedBuffer::new(vec![1i32, 2]);
        query.set_data_buffer("a", shared.clone()).unwrap();
        assert!(matches!(
            query.set_data_buffer("c", shared.clone()),
            Err(Error::InvalidArgument { .. })
        ));
        // Registering the same storage again for the same field replaces it.
        query.set_data_buffer("a", shared).unwrap();
    }

    #[test]
    fn test_query_type_must_match_open_mode() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-mode");
        array.open(QueryType::Read).unwrap();
        let err = Query::new(&array, QueryType::Write).unwrap_err();
        assert!(matches!(err, Error::Allocation { kind: "query", .. }));
    }

    #[test]
    fn test_submit_without_buffers() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-empty");
        array.open(QueryType::Read).unwrap();
        let query = Query::new(&array, QueryType::Read).unwrap();
        assert!(matches!(query.submit(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_write_missing_attribute_fails() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-partial-write");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_subarray(&rows(&array, 1, 1)).unwrap();
        query.set_data_buffer("a", SharedBuffer::new(vec![1i32])).unwrap();
        let err = query.submit().unwrap_err();
        assert!(err.native_message().unwrap().contains("'b'"));
        assert_eq!(query.status().unwrap(), QueryStatus::Failed);
    }

    #[test]
    fn test_second_submit_while_in_flight() {
        let ctx = delayed_context(200);
        let (array, query) = one_cell_write(&ctx, "query-in-flight");

        let pending = query.submit_async().unwrap();
        assert!(matches!(query.submit(), Err(Error::InvalidState(_))));
        assert!(matches!(
            query.set_data_buffer("a", SharedBuffer::new(vec![2i32])),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            query.set_subarray(&rows(&array, 2, 2)),
            Err(Error::InvalidState(_))
        ));
        assert_eq!(pending.wait().unwrap(), QueryStatus::Completed);
        assert_eq!(query.result_len("a").unwrap(), 1);
    }

    #[test]
    fn test_async_failure_is_reported() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-async-failure");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_subarray(&rows(&array, 1, 1)).unwrap();
        query.set_data_buffer("b", SharedBuffer::new(vec![1.0f64])).unwrap();
        let err = query.submit_async().unwrap().wait().unwrap_err();
        assert!(err.native_message().unwrap().contains("'a'"));
    }

    #[test]
    fn test_async_failure_survives_later_errors_on_context() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "query-async-failure-kept");
        array.open(QueryType::Write).unwrap();
        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_subarray(&rows(&array, 1, 1)).unwrap();
        query.set_data_buffer("b", SharedBuffer::new(vec![1.0f64])).unwrap();
        let pending = query.submit_async().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !pending.is_complete() {
            assert!(Instant::now() < deadline, "submission never completed");
            thread::sleep(Duration::from_millis(1));
        }

        // An unrelated failure replaces the context's last error.
        let missing = Array::new(&ctx, &unique_uri("query-never-created")).unwrap();
        assert!(missing.open(QueryType::Read).is_err());
        assert!(!ctx.last_error().unwrap().contains("'a'"));

        let err = pending.wait().unwrap_err();
        assert!(err.native_message().unwrap().contains("'a'"));
    }

    #[test]
    fn test_async_keep_alive_released_off_engine_thread() {
        let ctx = delayed_context(100);
        let (array, query) = one_cell_write(&ctx, "query-released-off-engine");
        let inner = Arc::downgrade(&query.inner);
        let pending = query.submit_async().unwrap();
        drop(pending);
        drop(query);
        drop(array);
        drop(ctx);

        let deadline = Instant::now() + Duration::from_secs(5);
        while inner.strong_count() > 0 {
            assert!(Instant::now() < deadline, "query was never released");
            crate::liveness::flush_releases();
            thread::sleep(Duration::from_millis(5));
        }
        crate::liveness::flush_releases();
        assert_eq!(crate::sys::sim::engine_thread_releases(), 0);
    }

    #[test]
    fn test_wait_for_returns_pending_submission() {
        let ctx = delayed_context(300);
        let (_array, query) = one_cell_write(&ctx, "query-wait-for");

        let pending = query.submit_async().unwrap();
        let pending = match pending.wait_for(Duration::from_millis(1)) {
            Err(pending) => pending,
            Ok(status) => panic!("finished too early: {status:?}"),
        };
        assert!(!pending.is_complete());
        assert_eq!(pending.wait().unwrap(), QueryStatus::Completed);
    }

    #[test]
    fn test_free_waits_for_in_flight_submission() {
        let ctx = delayed_context(100);
        let (_array, query) = one_cell_write(&ctx, "query-free-in-flight");

        let _pending = query.submit_async().unwrap();
        query.free();
        assert!(query.inner.handle.is_freed());
        assert_eq!(query.result_len("a").unwrap(), 1);
    }
}
