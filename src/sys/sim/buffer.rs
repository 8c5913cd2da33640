//! Generic buffers. Like the native engine, `set_data` borrows the caller's
//! memory without copying it.

use super::*;
use parking_lot::Mutex;

pub struct tiledb_buffer_t {
    datatype: Mutex<tiledb_datatype_t>,
    // (address, size in bytes) of caller-owned memory.
    data: Mutex<(usize, u64)>,
}

pub unsafe extern "C" fn tiledb_buffer_alloc(
    ctx: *mut tiledb_ctx_t,
    buffer: *mut *mut tiledb_buffer_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let value = tiledb_buffer_t {
        datatype: Mutex::new(TILEDB_UINT8),
        data: Mutex::new((0, 0)),
    };
    sim_out!(ctx, buffer, boxed(value, "buffer"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_buffer_free(buffer: *mut *mut tiledb_buffer_t) {
    unsafe { release(buffer, "buffer") }
}

pub unsafe extern "C" fn tiledb_buffer_set_type(
    ctx: *mut tiledb_ctx_t,
    buffer: *mut tiledb_buffer_t,
    datatype: tiledb_datatype_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let buffer = sim_arg!(ctx, buffer, "buffer");
    if datatype_size(datatype).is_none() {
        return ctx.fail(format!("Buffer: Unsupported datatype {datatype}"));
    }
    *buffer.datatype.lock() = datatype;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_buffer_get_type(
    ctx: *mut tiledb_ctx_t,
    buffer: *mut tiledb_buffer_t,
    datatype: *mut tiledb_datatype_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let buffer = sim_arg!(ctx, buffer, "buffer");
    sim_out!(ctx, datatype, *buffer.datatype.lock());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_buffer_get_data(
    ctx: *mut tiledb_ctx_t,
    buffer: *mut tiledb_buffer_t,
    data: *mut *mut c_void,
    num_bytes: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let buffer = sim_arg!(ctx, buffer, "buffer");
    let (address, size) = *buffer.data.lock();
    sim_out!(ctx, data, address as *mut c_void);
    sim_out!(ctx, num_bytes, size);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_buffer_set_data(
    ctx: *mut tiledb_ctx_t,
    buffer: *mut tiledb_buffer_t,
    data: *mut c_void,
    size: u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let buffer = sim_arg!(ctx, buffer, "buffer");
    if data.is_null() && size > 0 {
        return ctx.fail("Buffer: Cannot set data; null pointer with non-zero size");
    }
    *buffer.data.lock() = (data as usize, size);
    TILEDB_OK
}
