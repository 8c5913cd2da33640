//! Engine-owned byte buffers.
//!
//! The engine does not copy data passed to `set_data`; it keeps the pointer.
//! [`Buffer`] therefore owns the bytes it hands over and keeps them until
//! they are replaced or the last clone is dropped.

use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::Context;
use crate::error::Result;
use crate::handle::{BufferHandle, CapiHandle};
use crate::sys;
use crate::types::{CellType, Datatype, cells_as_bytes, cells_from_bytes, native_bytes};

#[derive(Debug, Clone)]
pub struct Buffer {
    context: Context,
    handle: BufferHandle,
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Buffer {
    pub fn new(context: &Context) -> Result<Self> {
        let handle =
            context.capi_alloc::<BufferHandle, _>(|ctx, out| unsafe { sys::tiledb_buffer_alloc(ctx, out) })?;
        Ok(Self {
            context: context.clone(),
            handle,
            bytes: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn raw(&self) -> *mut sys::tiledb_buffer_t {
        self.handle.get().as_ptr()
    }

    pub fn set_type(&self, datatype: Datatype) -> Result<()> {
        self.context.capi_call(
            || format!("set buffer type to {datatype:?}"),
            |ctx| unsafe { sys::tiledb_buffer_set_type(ctx, self.raw(), datatype.to_raw()) },
        )
    }

    pub fn datatype(&self) -> Result<Datatype> {
        let mut raw = 0;
        self.context.capi_call(
            || "get buffer type".into(),
            |ctx| unsafe { sys::tiledb_buffer_get_type(ctx, self.raw(), &mut raw) },
        )?;
        Datatype::from_raw(raw)
    }

    /// Hand `data` to the engine. The buffer keeps it alive.
    pub fn set_data(&self, mut data: Vec<u8>) -> Result<()> {
        let mut held = self.bytes.lock();
        let len = data.len() as u64;
        let data_ptr = if data.is_empty() {
            ptr::null_mut()
        } else {
            data.as_mut_ptr().cast()
        };
        self.context.capi_call(
            || format!("set {len} bytes of buffer data"),
            |ctx| unsafe { sys::tiledb_buffer_set_data(ctx, self.raw(), data_ptr, len) },
        )?;
        // The previous bytes are released only after the engine stopped
        // pointing at them.
        *held = data;
        Ok(())
    }

    /// Set typed cells and the matching datatype.
    pub fn set_cells<T: CellType>(&self, values: &[T]) -> Result<()> {
        self.set_type(T::DATATYPE)?;
        self.set_data(cells_as_bytes(values).to_vec())
    }

    /// Copy of the bytes the engine currently exposes.
    pub fn data(&self) -> Result<Vec<u8>> {
        let _held = self.bytes.lock();
        let mut data = ptr::null_mut();
        let mut len = 0u64;
        self.context.capi_call(
            || "get buffer data".into(),
            |ctx| unsafe { sys::tiledb_buffer_get_data(ctx, self.raw(), &mut data, &mut len) },
        )?;
        Ok(unsafe { native_bytes(data, len) }.to_vec())
    }

    /// The buffer contents decoded as `T` cells.
    pub fn data_as<T: CellType>(&self) -> Result<Vec<T>> {
        cells_from_bytes(&self.data()?)
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_type_is_uint8() {
        let ctx = Context::new().unwrap();
        let buffer = Buffer::new(&ctx).unwrap();
        assert_eq!(buffer.datatype().unwrap(), Datatype::UInt8);
        assert!(buffer.data().unwrap().is_empty());
    }

    #[test]
    fn test_typed_data_round_trip() {
        let ctx = Context::new().unwrap();
        let buffer = Buffer::new(&ctx).unwrap();
        buffer.set_cells(&[1.5f64, -2.0, 8.25]).unwrap();
        assert_eq!(buffer.datatype().unwrap(), Datatype::Float64);
        assert_eq!(buffer.data_as::<f64>().unwrap(), vec![1.5, -2.0, 8.25]);
    }

    #[test]
    fn test_data_survives_caller_drop() {
        let ctx = Context::new().unwrap();
        let buffer = Buffer::new(&ctx).unwrap();
        {
            let bytes = vec![9u8; 32];
            buffer.set_data(bytes).unwrap();
        }
        let clone = buffer.clone();
        drop(buffer);
        assert_eq!(clone.data().unwrap(), vec![9u8; 32]);
    }

    #[test]
    fn test_partial_cells_are_rejected() {
        let ctx = Context::new().unwrap();
        let buffer = Buffer::new(&ctx).unwrap();
        buffer.set_data(vec![1, 2, 3]).unwrap();
        assert!(matches!(buffer.data_as::<u16>(), Err(Error::InvalidArgument { .. })));
    }
}
