//! Enumerations: named value lists that attributes can refer to.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::{CapiHandle, EnumerationHandle};
use crate::schema::VAR_NUM;
use crate::sys;
use crate::types::{CellType, Datatype, cells_as_bytes, cells_from_bytes, native_bytes};
use crate::util::{cstring, take_string};

#[derive(Debug, Clone)]
pub struct Enumeration {
    context: Context,
    handle: EnumerationHandle,
}

impl Enumeration {
    /// An enumeration of fixed-size values.
    pub fn from_values<T: CellType>(context: &Context, name: &str, values: &[T], ordered: bool) -> Result<Self> {
        Self::alloc(context, name, T::DATATYPE, 1, ordered, cells_as_bytes(values), &[])
    }

    /// An enumeration of UTF-8 strings, stored variable-length.
    pub fn from_strings<S: AsRef<str>>(context: &Context, name: &str, values: &[S], ordered: bool) -> Result<Self> {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(values.len());
        for value in values {
            offsets.push(data.len() as u64);
            data.extend_from_slice(value.as_ref().as_bytes());
        }
        Self::alloc(
            context,
            name,
            Datatype::StringUtf8,
            VAR_NUM,
            ordered,
            &data,
            cells_as_bytes(&offsets),
        )
    }

    fn alloc(
        context: &Context,
        name: &str,
        datatype: Datatype,
        cell_val_num: u32,
        ordered: bool,
        data: &[u8],
        offsets: &[u8],
    ) -> Result<Self> {
        let c_name = cstring("name", name)?;
        let offsets_ptr = if offsets.is_empty() {
            std::ptr::null()
        } else {
            offsets.as_ptr().cast()
        };
        let handle = context.capi_alloc::<EnumerationHandle, _>(|ctx, out| unsafe {
            sys::tiledb_enumeration_alloc(
                ctx,
                c_name.as_ptr(),
                datatype.to_raw(),
                cell_val_num,
                ordered as i32,
                data.as_ptr().cast(),
                data.len() as u64,
                offsets_ptr,
                offsets.len() as u64,
                out,
            )
        })?;
        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_enumeration_t {
        self.handle.get().as_ptr()
    }

    pub fn name(&self) -> Result<String> {
        let mut name = std::ptr::null_mut();
        self.context.capi_call(
            || "get enumeration name".into(),
            |ctx| unsafe { sys::tiledb_enumeration_get_name(ctx, self.raw(), &mut name) },
        )?;
        unsafe { take_string(name) }
    }

    pub fn datatype(&self) -> Result<Datatype> {
        let mut raw = 0;
        self.context.capi_call(
            || "get enumeration type".into(),
            |ctx| unsafe { sys::tiledb_enumeration_get_type(ctx, self.raw(), &mut raw) },
        )?;
        Datatype::from_raw(raw)
    }

    pub fn cell_val_num(&self) -> Result<u32> {
        let mut num = 0;
        self.context.capi_call(
            || "get enumeration cell value count".into(),
            |ctx| unsafe { sys::tiledb_enumeration_get_cell_val_num(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    pub fn ordered(&self) -> Result<bool> {
        let mut ordered = 0;
        self.context.capi_call(
            || "get enumeration ordered flag".into(),
            |ctx| unsafe { sys::tiledb_enumeration_get_ordered(ctx, self.raw(), &mut ordered) },
        )?;
        Ok(ordered != 0)
    }

    fn data(&self) -> Result<Vec<u8>> {
        let mut data = std::ptr::null();
        let mut size = 0;
        self.context.capi_call(
            || "get enumeration data".into(),
            |ctx| unsafe { sys::tiledb_enumeration_get_data(ctx, self.raw(), &mut data, &mut size) },
        )?;
        Ok(unsafe { native_bytes(data, size) }.to_vec())
    }

    fn offsets(&self) -> Result<Vec<u64>> {
        let mut offsets = std::ptr::null();
        let mut size = 0;
        self.context.capi_call(
            || "get enumeration offsets".into(),
            |ctx| unsafe { sys::tiledb_enumeration_get_offsets(ctx, self.raw(), &mut offsets, &mut size) },
        )?;
        cells_from_bytes(unsafe { native_bytes(offsets, size) })
    }

    /// The values of a fixed-size enumeration.
    pub fn values<T: CellType>(&self) -> Result<Vec<T>> {
        let datatype = self.datatype()?;
        if datatype != T::DATATYPE {
            return Err(Error::TypeMismatch {
                operation: "read enumeration values".into(),
                expected: datatype.type_name(),
                actual: T::DATATYPE.type_name(),
            });
        }
        cells_from_bytes(&self.data()?)
    }

    /// The values of a string enumeration.
    pub fn strings(&self) -> Result<Vec<String>> {
        let datatype = self.datatype()?;
        if !datatype.is_string() {
            return Err(Error::TypeMismatch {
                operation: "read enumeration strings".into(),
                expected: datatype.type_name(),
                actual: "string",
            });
        }
        let data = self.data()?;
        let offsets = self.offsets()?;
        let mut values = Vec::with_capacity(offsets.len());
        for (i, &start) in offsets.iter().enumerate() {
            let end = offsets.get(i + 1).copied().unwrap_or(data.len() as u64);
            if start > end || end > data.len() as u64 {
                return Err(Error::InvalidState(format!(
                    "enumeration offset {start}..{end} is outside {} bytes of data",
                    data.len()
                )));
            }
            let bytes = &data[start as usize..end as usize];
            let value = String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidArgument {
                name: "values",
                reason: format!("enumeration value {i} is not valid UTF-8"),
            })?;
            values.push(value);
        }
        Ok(values)
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_size_values() {
        let ctx = Context::new().unwrap();
        let levels = Enumeration::from_values(&ctx, "levels", &[10u16, 20, 30], true).unwrap();
        assert_eq!(levels.name().unwrap(), "levels");
        assert_eq!(levels.datatype().unwrap(), Datatype::UInt16);
        assert_eq!(levels.cell_val_num().unwrap(), 1);
        assert!(levels.ordered().unwrap());
        assert_eq!(levels.values::<u16>().unwrap(), vec![10, 20, 30]);
        assert!(matches!(levels.values::<i64>(), Err(Error::TypeMismatch { .. })));
        assert!(matches!(levels.strings(), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_string_values() {
        let ctx = Context::new().unwrap();
        let colors = Enumeration::from_strings(&ctx, "colors", &["red", "", "green", "blue"], false).unwrap();
        assert_eq!(colors.cell_val_num().unwrap(), VAR_NUM);
        assert!(!colors.ordered().unwrap());
        assert_eq!(colors.strings().unwrap(), vec!["red", "", "green", "blue"]);
    }

    #[test]
    fn test_empty_enumeration_is_rejected() {
        let ctx = Context::new().unwrap();
        let err = Enumeration::from_values::<i32>(&ctx, "nothing", &[], false).unwrap_err();
        assert!(matches!(err, Error::Allocation { kind: "enumeration", .. }));
        assert!(err.to_string().contains("nothing"));
    }

    #[test]
    fn test_schema_rejects_duplicate_enumeration() {
        let ctx = Context::new().unwrap();
        let schema = crate::schema::tests::dense_schema(&ctx);
        let first = Enumeration::from_values(&ctx, "codes", &[1i8, 2], false).unwrap();
        schema.add_enumeration(&first).unwrap();
        let err = schema.add_enumeration(&first).unwrap_err();
        assert!(err.native_message().unwrap().contains("codes"));
    }
}
