//! Filters and filter lists. Options are stored as raw bytes; nothing is
//! ever compressed.

use super::*;
use parking_lot::Mutex;
use std::collections::BTreeMap;

const DEFAULT_MAX_CHUNK_SIZE: u32 = 64 * 1024;
const DATATYPE_ANY: u8 = 39;

#[derive(Debug, Clone)]
pub(crate) struct FilterDef {
    filter_type: tiledb_filter_type_t,
    options: BTreeMap<tiledb_filter_option_t, Vec<u8>>,
}

impl FilterDef {
    fn new(filter_type: tiledb_filter_type_t) -> Self {
        let options = supported_options(filter_type)
            .iter()
            .map(|&option| (option, default_value(option)))
            .collect();
        Self { filter_type, options }
    }
}

pub struct tiledb_filter_t {
    def: Mutex<FilterDef>,
}

pub struct tiledb_filter_list_t {
    filters: Mutex<Vec<FilterDef>>,
    max_chunk_size: Mutex<u32>,
}

impl tiledb_filter_list_t {
    pub(crate) fn snapshot(&self) -> (Vec<FilterDef>, u32) {
        (self.filters.lock().clone(), *self.max_chunk_size.lock())
    }

    pub(crate) fn from_parts(filters: Vec<FilterDef>, max_chunk_size: u32) -> Self {
        Self {
            filters: Mutex::new(filters),
            max_chunk_size: Mutex::new(max_chunk_size),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::from_parts(Vec::new(), DEFAULT_MAX_CHUNK_SIZE)
    }
}

fn known_filter_type(filter_type: tiledb_filter_type_t) -> bool {
    matches!(
        filter_type,
        TILEDB_FILTER_NONE
            | TILEDB_FILTER_GZIP
            | TILEDB_FILTER_ZSTD
            | TILEDB_FILTER_LZ4
            | TILEDB_FILTER_RLE
            | TILEDB_FILTER_BZIP2
            | TILEDB_FILTER_DOUBLE_DELTA
            | TILEDB_FILTER_BIT_WIDTH_REDUCTION
            | TILEDB_FILTER_BITSHUFFLE
            | TILEDB_FILTER_BYTESHUFFLE
            | TILEDB_FILTER_POSITIVE_DELTA
            | TILEDB_FILTER_CHECKSUM_MD5
            | TILEDB_FILTER_CHECKSUM_SHA256
            | TILEDB_FILTER_DICTIONARY
            | TILEDB_FILTER_SCALE_FLOAT
            | TILEDB_FILTER_XOR
            | TILEDB_FILTER_WEBP
            | TILEDB_FILTER_DELTA
    )
}

fn supported_options(filter_type: tiledb_filter_type_t) -> &'static [tiledb_filter_option_t] {
    match filter_type {
        TILEDB_FILTER_GZIP
        | TILEDB_FILTER_ZSTD
        | TILEDB_FILTER_LZ4
        | TILEDB_FILTER_RLE
        | TILEDB_FILTER_BZIP2
        | TILEDB_FILTER_DICTIONARY => &[TILEDB_COMPRESSION_LEVEL],
        TILEDB_FILTER_DOUBLE_DELTA | TILEDB_FILTER_DELTA => {
            &[TILEDB_COMPRESSION_LEVEL, TILEDB_COMPRESSION_REINTERPRET_DATATYPE]
        }
        TILEDB_FILTER_BIT_WIDTH_REDUCTION => &[TILEDB_BIT_WIDTH_MAX_WINDOW],
        TILEDB_FILTER_POSITIVE_DELTA => &[TILEDB_POSITIVE_DELTA_MAX_WINDOW],
        TILEDB_FILTER_SCALE_FLOAT => &[
            TILEDB_SCALE_FLOAT_BYTEWIDTH,
            TILEDB_SCALE_FLOAT_FACTOR,
            TILEDB_SCALE_FLOAT_OFFSET,
        ],
        TILEDB_FILTER_WEBP => &[TILEDB_WEBP_QUALITY, TILEDB_WEBP_INPUT_FORMAT, TILEDB_WEBP_LOSSLESS],
        _ => &[],
    }
}

fn option_size(option: tiledb_filter_option_t) -> usize {
    match option {
        TILEDB_WEBP_INPUT_FORMAT | TILEDB_WEBP_LOSSLESS | TILEDB_COMPRESSION_REINTERPRET_DATATYPE => 1,
        TILEDB_SCALE_FLOAT_BYTEWIDTH | TILEDB_SCALE_FLOAT_FACTOR | TILEDB_SCALE_FLOAT_OFFSET => 8,
        _ => 4,
    }
}

fn default_value(option: tiledb_filter_option_t) -> Vec<u8> {
    match option {
        TILEDB_COMPRESSION_LEVEL => (-1i32).to_ne_bytes().to_vec(),
        TILEDB_BIT_WIDTH_MAX_WINDOW => 256u32.to_ne_bytes().to_vec(),
        TILEDB_POSITIVE_DELTA_MAX_WINDOW => 1024u32.to_ne_bytes().to_vec(),
        TILEDB_SCALE_FLOAT_BYTEWIDTH => 8u64.to_ne_bytes().to_vec(),
        TILEDB_SCALE_FLOAT_FACTOR => 1.0f64.to_ne_bytes().to_vec(),
        TILEDB_SCALE_FLOAT_OFFSET => 0.0f64.to_ne_bytes().to_vec(),
        TILEDB_WEBP_QUALITY => 100.0f32.to_ne_bytes().to_vec(),
        TILEDB_COMPRESSION_REINTERPRET_DATATYPE => vec![DATATYPE_ANY],
        _ => vec![0; option_size(option)],
    }
}

fn check_level(filter_type: tiledb_filter_type_t, level: i32) -> Result<(), String> {
    let range = match filter_type {
        TILEDB_FILTER_GZIP => -1..=9,
        TILEDB_FILTER_ZSTD => -7..=22,
        TILEDB_FILTER_BZIP2 => -1..=9,
        _ => return Ok(()),
    };
    if range.contains(&level) {
        Ok(())
    } else {
        Err(format!("Filter: Compression level {level} is out of range {range:?}"))
    }
}

pub unsafe extern "C" fn tiledb_filter_alloc(
    ctx: *mut tiledb_ctx_t,
    filter_type: tiledb_filter_type_t,
    filter: *mut *mut tiledb_filter_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    if !known_filter_type(filter_type) {
        return ctx.fail(format!("Filter: Unknown filter type {filter_type}"));
    }
    let value = tiledb_filter_t {
        def: Mutex::new(FilterDef::new(filter_type)),
    };
    sim_out!(ctx, filter, boxed(value, "filter"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_filter_free(filter: *mut *mut tiledb_filter_t) {
    unsafe { release(filter, "filter") }
}

pub unsafe extern "C" fn tiledb_filter_get_type(
    ctx: *mut tiledb_ctx_t,
    filter: *mut tiledb_filter_t,
    filter_type: *mut tiledb_filter_type_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let filter = sim_arg!(ctx, filter, "filter");
    sim_out!(ctx, filter_type, filter.def.lock().filter_type);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_filter_set_option(
    ctx: *mut tiledb_ctx_t,
    filter: *mut tiledb_filter_t,
    option: tiledb_filter_option_t,
    value: *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let filter = sim_arg!(ctx, filter, "filter");
    if value.is_null() {
        return ctx.fail("Filter: Cannot set option; value is null");
    }
    let mut def = filter.def.lock();
    if !def.options.contains_key(&option) {
        return ctx.fail(format!(
            "Filter: Option {option} is not supported by filter type {}",
            def.filter_type
        ));
    }
    let size = option_size(option);
    let bytes = unsafe { std::slice::from_raw_parts(value.cast::<u8>(), size) }.to_vec();
    if option == TILEDB_COMPRESSION_LEVEL {
        let level = i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if let Err(message) = check_level(def.filter_type, level) {
            return ctx.fail(message);
        }
    }
    def.options.insert(option, bytes);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_filter_get_option(
    ctx: *mut tiledb_ctx_t,
    filter: *mut tiledb_filter_t,
    option: tiledb_filter_option_t,
    value: *mut c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let filter = sim_arg!(ctx, filter, "filter");
    if value.is_null() {
        return ctx.fail("Filter: Cannot get option; value is null");
    }
    let def = filter.def.lock();
    let Some(bytes) = def.options.get(&option) else {
        return ctx.fail(format!(
            "Filter: Option {option} is not supported by filter type {}",
            def.filter_type
        ));
    };
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), value.cast::<u8>(), bytes.len()) };
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_filter_list_alloc(
    ctx: *mut tiledb_ctx_t,
    filter_list: *mut *mut tiledb_filter_list_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_out!(ctx, filter_list, boxed(tiledb_filter_list_t::empty(), "filter_list"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_filter_list_free(filter_list: *mut *mut tiledb_filter_list_t) {
    unsafe { release(filter_list, "filter_list") }
}

pub unsafe extern "C" fn tiledb_filter_list_add_filter(
    ctx: *mut tiledb_ctx_t,
    filter_list: *mut tiledb_filter_list_t,
    filter: *mut tiledb_filter_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let list = sim_arg!(ctx, filter_list, "filter list");
    let filter = sim_arg!(ctx, filter, "filter");
    let def = filter.def.lock().clone();
    list.filters.lock().push(def);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_filter_list_get_nfilters(
    ctx: *mut tiledb_ctx_t,
    filter_list: *mut tiledb_filter_list_t,
    num_filters: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let list = sim_arg!(ctx, filter_list, "filter list");
    sim_out!(ctx, num_filters, list.filters.lock().len() as u32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_filter_list_get_filter_from_index(
    ctx: *mut tiledb_ctx_t,
    filter_list: *mut tiledb_filter_list_t,
    index: u32,
    filter: *mut *mut tiledb_filter_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let list = sim_arg!(ctx, filter_list, "filter list");
    let filters = list.filters.lock();
    let Some(def) = filters.get(index as usize) else {
        return ctx.fail(format!(
            "FilterPipeline: Filter index {index} out of bounds; list has {} filters",
            filters.len()
        ));
    };
    let value = tiledb_filter_t {
        def: Mutex::new(def.clone()),
    };
    sim_out!(ctx, filter, boxed(value, "filter"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_filter_list_set_max_chunk_size(
    ctx: *mut tiledb_ctx_t,
    filter_list: *mut tiledb_filter_list_t,
    max_chunk_size: u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let list = sim_arg!(ctx, filter_list, "filter list");
    *list.max_chunk_size.lock() = max_chunk_size;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_filter_list_get_max_chunk_size(
    ctx: *mut tiledb_ctx_t,
    filter_list: *mut tiledb_filter_list_t,
    max_chunk_size: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let list = sim_arg!(ctx, filter_list, "filter list");
    sim_out!(ctx, max_chunk_size, *list.max_chunk_size.lock());
    TILEDB_OK
}
