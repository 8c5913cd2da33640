//! Queries over the array registry.
//!
//! Buffers are recorded as raw pointers and only touched during submission,
//! matching the native contract: the caller must keep every registered buffer
//! and size cell alive until the submission finishes. Asynchronous submission
//! runs on an engine thread that invokes the completion callback last and
//! never touches the query afterwards.
//!
//! A write stores one rectangle given by the query's subarray, or the whole
//! domain when none is set. A read walks the selected cells in layout order,
//! taking each from the newest fragment that covers it.

use super::array::{AttrData, Fragment, OpenArray, commit_fragment, row_major_index, tiledb_array_t};
use super::query_condition::{CellSource, ConditionDef, tiledb_query_condition_t};
use super::schema::AttributeDef;
use super::subarray::{dim_bounds, tiledb_subarray_t};
use super::*;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Clone, Copy)]
struct RawBuffer {
    data: *mut c_void,
    size: *mut u64,
}

impl RawBuffer {
    fn new(data: *mut c_void, size: *mut u64) -> Option<Self> {
        if size.is_null() || (data.is_null() && unsafe { *size } > 0) {
            return None;
        }
        Some(Self { data, size })
    }

    fn len(&self) -> u64 {
        unsafe { *self.size }
    }

    /// The bytes the caller registered, as many as the size cell says.
    fn bytes(&self) -> &[u8] {
        match self.len() {
            0 => &[],
            len => unsafe { std::slice::from_raw_parts(self.data.cast::<u8>(), len as usize) },
        }
    }

    fn u64s(&self) -> Vec<u64> {
        self.bytes()
            .chunks_exact(8)
            .map(|c| u64::from_ne_bytes(c.try_into().unwrap_or_default()))
            .collect()
    }

    /// Overwrite the buffer with `bytes` and record the new size.
    fn fill(&self, bytes: &[u8]) {
        unsafe {
            if !bytes.is_empty() {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.data.cast::<u8>(), bytes.len());
            }
            *self.size = bytes.len() as u64;
        }
    }
}

#[derive(Clone, Copy, Default)]
struct FieldBuffers {
    data: Option<RawBuffer>,
    offsets: Option<RawBuffer>,
    validity: Option<RawBuffer>,
}

struct QueryState {
    layout: tiledb_layout_t,
    status: tiledb_query_status_t,
    buffers: BTreeMap<String, FieldBuffers>,
    /// Ranges per dimension; the whole domain when unset.
    ranges: Option<Vec<Vec<(i64, i64)>>>,
    condition: Option<ConditionDef>,
    /// Cells already visited by previous incomplete reads.
    cursor: u64,
    has_results: bool,
}

pub struct tiledb_query_t {
    array: OpenArray,
    state: Mutex<QueryState>,
}

/// Raw pointer moved onto the completion thread.
struct SendPtr<T>(*mut T);

unsafe impl<T> Send for SendPtr<T> {}

impl<T> SendPtr<T> {
    fn get(self) -> *mut T {
        self.0
    }
}

fn range_len(low: i64, high: i64) -> Option<u64> {
    u64::try_from(high as i128 - low as i128 + 1).ok()
}

/// Cells selected by per-dimension range lists, enumerated in layout order.
struct CellGrid {
    ranges: Vec<Vec<(i64, i64)>>,
    lens: Vec<u64>,
    col_major: bool,
}

impl CellGrid {
    fn new(ranges: Vec<Vec<(i64, i64)>>, col_major: bool) -> Result<Self, String> {
        let lens = ranges
            .iter()
            .map(|dim| {
                dim.iter()
                    .try_fold(0u64, |total, &(low, high)| total.checked_add(range_len(low, high)?))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or("Query: Subarray selects too many cells")?;
        lens.iter()
            .try_fold(1u64, |total, &len| total.checked_mul(len))
            .ok_or("Query: Subarray selects too many cells")?;
        Ok(Self {
            ranges,
            lens,
            col_major,
        })
    }

    fn len(&self) -> u64 {
        self.lens.iter().product()
    }

    fn coord(&self, mut index: u64) -> Vec<i64> {
        let mut coord = vec![0; self.lens.len()];
        let mut visit = |dim: usize| {
            let len = self.lens[dim].max(1);
            coord[dim] = self.nth(dim, index % len);
            index /= len;
        };
        if self.col_major {
            (0..self.lens.len()).for_each(&mut visit);
        } else {
            (0..self.lens.len()).rev().for_each(&mut visit);
        }
        coord
    }

    fn nth(&self, dim: usize, mut k: u64) -> i64 {
        for &(low, high) in &self.ranges[dim] {
            let len = range_len(low, high).unwrap_or(u64::MAX);
            if k < len {
                return (low as i128 + k as i128) as i64;
            }
            k -= len;
        }
        self.ranges[dim].last().map_or(0, |&(_, high)| high)
    }
}

/// A cell as seen by a read: taken from a fragment, or filled.
struct ResolvedCell<'a> {
    source: Option<(&'a Fragment, usize)>,
    attributes: &'a [AttributeDef],
    fill: &'a [u8],
}

impl CellSource for ResolvedCell<'_> {
    fn value(&self, name: &str) -> (&[u8], bool) {
        let attr = self.attributes.iter().find(|a| a.name == name);
        let stored = self
            .source
            .and_then(|(fragment, index)| Some((fragment.data.get(name)?, index)));
        match (attr, stored) {
            (Some(attr), Some((data, index))) => (data.cell(index, attr.cell_size()), data.is_valid(index)),
            (Some(attr), None) => {
                let len = attr.cell_size().unwrap_or(0) as usize;
                (&self.fill[..len.min(self.fill.len())], !attr.nullable)
            }
            (None, _) => (&[], false),
        }
    }
}

/// Output of one attribute being assembled by a read.
struct ReadField<'a> {
    attr: &'a AttributeDef,
    buffers: FieldBuffers,
    values: Vec<u8>,
    offsets: Vec<u64>,
    validity: Vec<u8>,
}

impl ReadField<'_> {
    fn fits(&self, bytes: usize) -> bool {
        let data_ok = self
            .buffers
            .data
            .is_some_and(|b| (self.values.len() + bytes) as u64 <= b.len());
        let offsets_ok = self
            .buffers
            .offsets
            .is_none_or(|b| (self.offsets.len() as u64 + 1) * 8 <= b.len());
        let validity_ok = self
            .buffers
            .validity
            .is_none_or(|b| self.validity.len() as u64 + 1 <= b.len());
        data_ok && offsets_ok && validity_ok
    }

    fn push(&mut self, bytes: &[u8], valid: bool) {
        if self.buffers.offsets.is_some() {
            self.offsets.push(self.values.len() as u64);
        }
        if self.buffers.validity.is_some() {
            self.validity.push(valid as u8);
        }
        self.values.extend_from_slice(bytes);
    }

    fn flush(&self) {
        if let Some(data) = self.buffers.data {
            data.fill(&self.values);
        }
        if let Some(offsets) = self.buffers.offsets {
            let bytes: Vec<u8> = self.offsets.iter().flat_map(|o| o.to_ne_bytes()).collect();
            offsets.fill(&bytes);
        }
        if let Some(validity) = self.buffers.validity {
            validity.fill(&self.validity);
        }
    }
}

/// Arrange cells given in `grid` order into row-major order over `rect`.
fn to_row_major(data: AttrData, cell_size: Option<u64>, grid: &CellGrid, rect: &[(i64, i64)]) -> AttrData {
    let cells = grid.len() as usize;
    let mut order = vec![0usize; cells];
    for input in 0..cells {
        if let Some(slot) = row_major_index(rect, &grid.coord(input as u64)).and_then(|i| order.get_mut(i)) {
            *slot = input;
        }
    }
    let mut out = AttrData {
        offsets: data.offsets.as_ref().map(|_| Vec::with_capacity(cells)),
        validity: data.validity.as_ref().map(|_| Vec::with_capacity(cells)),
        ..AttrData::default()
    };
    for &input in &order {
        if let Some(offsets) = out.offsets.as_mut() {
            offsets.push(out.values.len() as u64);
        }
        if let Some(validity) = out.validity.as_mut() {
            validity.push(data.is_valid(input) as u8);
        }
        out.values.extend_from_slice(data.cell(input, cell_size));
    }
    out
}

impl tiledb_query_t {
    fn attribute(&self, name: &str) -> Result<&AttributeDef, String> {
        self.array
            .schema
            .attribute(name)
            .ok_or_else(|| format!("Query: Attribute '{name}' does not exist"))
    }

    fn full_domain(&self) -> Result<Vec<Vec<(i64, i64)>>, String> {
        self.array
            .schema
            .dims
            .iter()
            .map(|dim| {
                dim_bounds(dim)
                    .map(|bounds| vec![bounds])
                    .ok_or_else(|| format!("Query: Dimension '{}' does not have integer coordinates", dim.name))
            })
            .collect()
    }

    fn grid(&self, state: &QueryState) -> Result<CellGrid, String> {
        let ranges = match &state.ranges {
            Some(ranges) => ranges.clone(),
            None => self.full_domain()?,
        };
        CellGrid::new(ranges, state.layout == TILEDB_COL_MAJOR)
    }

    /// Run one submission against the buffers currently registered.
    fn execute(&self) -> Result<(), String> {
        let mut state = self.state.lock();
        if state.buffers.is_empty() {
            return Err(format!(
                "Query: Cannot submit query on array '{}'; No buffers set",
                self.array.uri
            ));
        }
        let outcome = match self.array.query_type {
            TILEDB_WRITE => self.write(&state).map(|()| TILEDB_COMPLETED),
            TILEDB_READ => self.read(&mut state),
            other => Err(format!("Query: Query type {other} is not supported")),
        };
        state.status = match &outcome {
            Ok(status) => *status,
            Err(_) => TILEDB_FAILED,
        };
        outcome.map(|_| ())
    }

    fn write(&self, state: &QueryState) -> Result<(), String> {
        let grid = self.grid(state)?;
        if grid.ranges.iter().any(|dim| dim.len() != 1) {
            return Err("Query: Cannot submit write; Multi-range dense writes are not supported".into());
        }
        let rect: Vec<(i64, i64)> = grid.ranges.iter().map(|dim| dim[0]).collect();
        let cells = grid.len();
        let mut data = BTreeMap::new();
        for attr in &self.array.schema.attributes {
            let Some((buffers, values)) = state
                .buffers
                .get(&attr.name)
                .and_then(|b| Some((b, b.data?)))
            else {
                return Err(format!(
                    "Query: Cannot submit write; Buffer for attribute '{}' is not set",
                    attr.name
                ));
            };
            let values = values.bytes();
            let (count, offsets) = match attr.cell_size() {
                Some(cell_size) => {
                    if values.len() as u64 % cell_size != 0 {
                        return Err(format!(
                            "Query: Buffer size of attribute '{}' is not a multiple of its cell size",
                            attr.name
                        ));
                    }
                    (values.len() as u64 / cell_size, None)
                }
                None => {
                    let Some(offsets) = buffers.offsets else {
                        return Err(format!(
                            "Query: Cannot submit write; Offsets buffer for var-sized attribute '{}' is not set",
                            attr.name
                        ));
                    };
                    let offsets = offsets.u64s();
                    let ascending = offsets.windows(2).all(|w| w[0] <= w[1]);
                    if !ascending || offsets.last().is_some_and(|&o| o > values.len() as u64) {
                        return Err(format!("Query: Invalid offsets for attribute '{}'", attr.name));
                    }
                    (offsets.len() as u64, Some(offsets))
                }
            };
            if count != cells {
                return Err(format!(
                    "Query: Cannot submit write; Buffer for attribute '{}' holds {count} cells but the subarray selects {cells}",
                    attr.name
                ));
            }
            let validity = match (attr.nullable, buffers.validity) {
                (false, _) => None,
                (true, None) => {
                    return Err(format!(
                        "Query: Cannot submit write; Validity buffer for nullable attribute '{}' is not set",
                        attr.name
                    ));
                }
                (true, Some(validity)) if validity.len() != cells => {
                    return Err(format!(
                        "Query: Cannot submit write; Validity buffer for attribute '{}' holds {} cells but the subarray selects {cells}",
                        attr.name,
                        validity.len()
                    ));
                }
                (true, Some(validity)) => Some(validity.bytes().to_vec()),
            };
            let mut stored = AttrData {
                values: values.to_vec(),
                offsets,
                validity,
            };
            if grid.col_major {
                stored = to_row_major(stored, attr.cell_size(), &grid, &rect);
            }
            data.insert(attr.name.clone(), stored);
        }
        commit_fragment(&self.array.uri, self.array.write_timestamp, rect, cells, data)
    }

    /// Newest visible fragment covering `coord`, with the cell's position in it.
    fn locate(&self, coord: &[i64]) -> Option<(&Fragment, usize)> {
        self.array
            .fragments
            .iter()
            .enumerate()
            .filter_map(|(order, f)| Some((f.timestamp, order, f.as_ref(), f.position(coord)?)))
            .max_by_key(|&(timestamp, order, _, _)| (timestamp, order))
            .map(|(_, _, fragment, position)| (fragment, position))
    }

    fn read(&self, state: &mut QueryState) -> Result<tiledb_query_status_t, String> {
        let mut fields = Vec::new();
        for (name, buffers) in &state.buffers {
            let attr = self.attribute(name)?;
            if buffers.data.is_none() {
                return Err(format!("Query: Cannot submit read; Data buffer for '{name}' is not set"));
            }
            if attr.is_var() && buffers.offsets.is_none() {
                return Err(format!(
                    "Query: Cannot submit read; Offsets buffer for var-sized attribute '{name}' is not set"
                ));
            }
            if attr.nullable && buffers.validity.is_none() {
                return Err(format!(
                    "Query: Cannot submit read; Validity buffer for nullable attribute '{name}' is not set"
                ));
            }
            fields.push(ReadField {
                attr,
                buffers: *buffers,
                values: Vec::new(),
                offsets: Vec::new(),
                validity: Vec::new(),
            });
        }

        let grid = self.grid(state)?;
        let total = grid.len();
        let dense = self.array.schema.array_type == TILEDB_DENSE;
        let attributes = &self.array.schema.attributes;
        let widest = attributes.iter().filter_map(AttributeDef::cell_size).max().unwrap_or(0);
        let fill = vec![0u8; widest as usize];

        let mut index = state.cursor;
        let mut emitted = 0u64;
        while index < total {
            let coord = grid.coord(index);
            let mut cell = ResolvedCell {
                source: self.locate(&coord),
                attributes,
                fill: &fill,
            };
            let passes = cell.source.is_some()
                && state
                    .condition
                    .as_ref()
                    .is_none_or(|c| c.matches(&self.array.schema, &cell));
            if !passes {
                if !dense {
                    index += 1;
                    continue;
                }
                cell.source = None;
            }
            let values: Vec<(&[u8], bool)> = fields.iter().map(|f| cell.value(&f.attr.name)).collect();
            if !fields.iter().zip(&values).all(|(f, (bytes, _))| f.fits(bytes.len())) {
                break;
            }
            for (field, (bytes, valid)) in fields.iter_mut().zip(values) {
                field.push(bytes, valid);
            }
            emitted += 1;
            index += 1;
        }

        for field in &fields {
            field.flush();
        }
        state.cursor = index;
        state.has_results = emitted > 0;
        Ok(if index >= total {
            TILEDB_COMPLETED
        } else {
            TILEDB_INCOMPLETE
        })
    }

    /// Register one buffer of `name`, rejecting changes while a submission runs.
    fn set_buffer(
        &self,
        name: &str,
        register: impl FnOnce(&mut FieldBuffers),
    ) -> Result<(), String> {
        let mut state = self.state.lock();
        if state.status == TILEDB_INPROGRESS {
            return Err(format!("Query: Cannot set buffer '{name}'; Query is in progress"));
        }
        register(state.buffers.entry(name.to_string()).or_default());
        if state.status == TILEDB_UNINITIALIZED {
            state.status = TILEDB_INITIALIZED;
        }
        Ok(())
    }
}

fn known_layout(layout: tiledb_layout_t) -> bool {
    matches!(
        layout,
        TILEDB_ROW_MAJOR | TILEDB_COL_MAJOR | TILEDB_GLOBAL_ORDER | TILEDB_UNORDERED | TILEDB_HILBERT
    )
}

pub unsafe extern "C" fn tiledb_query_alloc(
    ctx: *mut tiledb_ctx_t,
    array: *mut tiledb_array_t,
    query_type: tiledb_query_type_t,
    query: *mut *mut tiledb_query_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let array = sim_arg!(ctx, array, "array");
    let Some(open) = array.opened() else {
        return ctx.fail("Query: Cannot create query; Input array is not open");
    };
    if open.query_type != query_type {
        return ctx.fail(format!(
            "Query: Cannot create query; Array '{}' query type does not match declared query type",
            open.uri
        ));
    }
    let value = tiledb_query_t {
        array: open,
        state: Mutex::new(QueryState {
            layout: TILEDB_ROW_MAJOR,
            status: TILEDB_UNINITIALIZED,
            buffers: BTreeMap::new(),
            ranges: None,
            condition: None,
            cursor: 0,
            has_results: false,
        }),
    };
    sim_out!(ctx, query, boxed(value, "query"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_free(query: *mut *mut tiledb_query_t) {
    unsafe { release(query, "query") }
}

pub unsafe extern "C" fn tiledb_query_set_layout(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    layout: tiledb_layout_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    if !known_layout(layout) {
        return ctx.fail(format!("Query: Cannot set layout; Unknown layout {layout}"));
    }
    query.state.lock().layout = layout;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_get_layout(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    layout: *mut tiledb_layout_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    sim_out!(ctx, layout, query.state.lock().layout);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_set_data_buffer(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    name: *const c_char,
    buffer: *mut c_void,
    buffer_size: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    let name = sim_str!(ctx, name, "buffer name");
    if let Err(message) = query.attribute(name) {
        return ctx.fail(format!("Cannot set buffer '{name}'; {message}"));
    }
    let Some(raw) = RawBuffer::new(buffer, buffer_size) else {
        return ctx.fail(format!("Query: Cannot set buffer '{name}'; Buffer is null"));
    };
    match query.set_buffer(name, |b| b.data = Some(raw)) {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_query_set_offsets_buffer(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    name: *const c_char,
    buffer: *mut u64,
    buffer_size: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    let name = sim_str!(ctx, name, "buffer name");
    match query.attribute(name) {
        Ok(attr) if attr.is_var() => {}
        Ok(_) => {
            return ctx.fail(format!(
                "Query: Cannot set offsets buffer '{name}'; Attribute is fixed-sized"
            ));
        }
        Err(message) => return ctx.fail(format!("Cannot set buffer '{name}'; {message}")),
    }
    let Some(raw) = RawBuffer::new(buffer.cast(), buffer_size) else {
        return ctx.fail(format!("Query: Cannot set offsets buffer '{name}'; Buffer is null"));
    };
    match query.set_buffer(name, |b| b.offsets = Some(raw)) {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_query_set_validity_buffer(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    name: *const c_char,
    buffer: *mut u8,
    buffer_size: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    let name = sim_str!(ctx, name, "buffer name");
    match query.attribute(name) {
        Ok(attr) if attr.nullable => {}
        Ok(_) => {
            return ctx.fail(format!(
                "Query: Cannot set validity buffer '{name}'; Attribute is not nullable"
            ));
        }
        Err(message) => return ctx.fail(format!("Cannot set buffer '{name}'; {message}")),
    }
    let Some(raw) = RawBuffer::new(buffer.cast(), buffer_size) else {
        return ctx.fail(format!("Query: Cannot set validity buffer '{name}'; Buffer is null"));
    };
    match query.set_buffer(name, |b| b.validity = Some(raw)) {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_query_set_subarray_t(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    subarray: *const tiledb_subarray_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    let subarray = sim_arg!(ctx, subarray, "subarray");
    let ranges = match subarray.integer_ranges() {
        Ok(ranges) => ranges,
        Err(message) => return ctx.fail(message),
    };
    if ranges.len() != query.array.schema.dims.len() {
        return ctx.fail("Query: Cannot set subarray; Subarray belongs to a different array");
    }
    let mut state = query.state.lock();
    if state.status == TILEDB_INPROGRESS {
        return ctx.fail("Query: Cannot set subarray; Query is in progress");
    }
    state.ranges = Some(ranges);
    state.cursor = 0;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_set_condition(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    cond: *const tiledb_query_condition_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    let cond = sim_arg!(ctx, cond, "query condition");
    if query.array.query_type != TILEDB_READ {
        return ctx.fail("Query: Cannot set query condition; Operation only applicable to read queries");
    }
    let Some(def) = cond.def() else {
        return ctx.fail("Query: Cannot set query condition; Condition is not initialized");
    };
    if let Err(message) = def.check(&query.array.schema) {
        return ctx.fail(message);
    }
    query.state.lock().condition = Some(def);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_submit(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    {
        let mut state = query.state.lock();
        if state.status == TILEDB_INPROGRESS {
            return ctx.fail("Query: Cannot submit query; Query is already in progress");
        }
        state.status = TILEDB_INPROGRESS;
    }
    std::thread::sleep(ctx.submit_delay());
    match query.execute() {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_query_submit_async(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    callback: tiledb_completion_cb,
    callback_data: *mut c_void,
) -> capi_return_t {
    let context = sim_ctx!(ctx);
    let handle = sim_arg!(context, query, "query");
    {
        let mut state = handle.state.lock();
        if state.status == TILEDB_INPROGRESS {
            return context.fail("Query: Cannot submit query; Query is already in progress");
        }
        state.status = TILEDB_INPROGRESS;
    }
    let ctx = SendPtr(ctx);
    let query = SendPtr(query);
    let data = SendPtr(callback_data);
    std::thread::spawn(move || {
        enter_engine_thread();
        let (ctx, query, data) = (ctx.get(), query.get(), data.get());
        // SAFETY: the caller keeps the context, query and buffers alive until
        // the callback has run.
        let ctx = unsafe { &*ctx };
        let query = unsafe { &*query };
        std::thread::sleep(ctx.submit_delay());
        if let Err(message) = query.execute() {
            ctx.fail(message);
        }
        if let Some(callback) = callback {
            unsafe { callback(data) };
        }
    });
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_get_status(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    status: *mut tiledb_query_status_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    sim_out!(ctx, status, query.state.lock().status);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_has_results(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
    has_results: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    sim_out!(ctx, has_results, query.state.lock().has_results as i32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_finalize(
    ctx: *mut tiledb_ctx_t,
    query: *mut tiledb_query_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let query = sim_arg!(ctx, query, "query");
    let mut state = query.state.lock();
    if state.status == TILEDB_INPROGRESS {
        return ctx.fail("Query: Cannot finalize query; Query is in progress");
    }
    if state.status != TILEDB_FAILED && state.status != TILEDB_INCOMPLETE {
        state.status = TILEDB_COMPLETED;
    }
    TILEDB_OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_orders_cells_by_layout() {
        let ranges = vec![vec![(1, 2)], vec![(10, 11)]];
        let rows = CellGrid::new(ranges.clone(), false).unwrap();
        let cols = CellGrid::new(ranges, true).unwrap();
        assert_eq!(rows.len(), 4);
        let by_row: Vec<_> = (0..4).map(|i| rows.coord(i)).collect();
        let by_col: Vec<_> = (0..4).map(|i| cols.coord(i)).collect();
        assert_eq!(by_row, vec![vec![1, 10], vec![1, 11], vec![2, 10], vec![2, 11]]);
        assert_eq!(by_col, vec![vec![1, 10], vec![2, 10], vec![1, 11], vec![2, 11]]);
    }

    #[test]
    fn test_grid_walks_multiple_ranges() {
        let grid = CellGrid::new(vec![vec![(1, 2), (7, 8)]], false).unwrap();
        let coords: Vec<_> = (0..grid.len()).map(|i| grid.coord(i)[0]).collect();
        assert_eq!(coords, vec![1, 2, 7, 8]);
    }

    #[test]
    fn test_grid_rejects_overflowing_selection() {
        assert!(CellGrid::new(vec![vec![(i64::MIN, i64::MAX)]], false).is_err());
    }

    #[test]
    fn test_col_major_input_is_stored_row_major() {
        let grid = CellGrid::new(vec![vec![(1, 2)], vec![(1, 2)]], true).unwrap();
        let data = AttrData {
            values: b"acbd".to_vec(),
            ..AttrData::default()
        };
        let stored = to_row_major(data, Some(1), &grid, &[(1, 2), (1, 2)]);
        assert_eq!(stored.values, b"abcd");
    }
}
