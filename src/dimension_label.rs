//! Read-only view of a dimension label stored in an array schema.

use crate::context::Context;
use crate::error::Result;
use crate::handle::{CapiHandle, DimensionLabelHandle};
use crate::sys;
use crate::types::{DataOrder, Datatype};
use crate::util::cstr_to_string;

#[derive(Debug, Clone)]
pub struct DimensionLabel {
    context: Context,
    handle: DimensionLabelHandle,
}

impl DimensionLabel {
    pub(crate) fn from_handle(context: &Context, handle: DimensionLabelHandle) -> Self {
        Self {
            context: context.clone(),
            handle,
        }
    }

    fn raw(&self) -> *mut sys::tiledb_dimension_label_t {
        self.handle.get().as_ptr()
    }

    pub fn name(&self) -> Result<String> {
        let mut name = std::ptr::null();
        self.context.capi_call(
            || "get dimension label name".into(),
            |ctx| unsafe { sys::tiledb_dimension_label_get_name(ctx, self.raw(), &mut name) },
        )?;
        unsafe { cstr_to_string(name, "name") }
    }

    /// Index of the dimension this label applies to.
    pub fn dimension_index(&self) -> Result<u32> {
        let mut index = 0;
        self.context.capi_call(
            || "get dimension label dimension index".into(),
            |ctx| unsafe { sys::tiledb_dimension_label_get_dimension_index(ctx, self.raw(), &mut index) },
        )?;
        Ok(index)
    }

    pub fn label_type(&self) -> Result<Datatype> {
        let mut raw = 0;
        self.context.capi_call(
            || "get dimension label type".into(),
            |ctx| unsafe { sys::tiledb_dimension_label_get_label_type(ctx, self.raw(), &mut raw) },
        )?;
        Datatype::from_raw(raw)
    }

    pub fn label_order(&self) -> Result<DataOrder> {
        let mut raw = 0;
        self.context.capi_call(
            || "get dimension label order".into(),
            |ctx| unsafe { sys::tiledb_dimension_label_get_label_order(ctx, self.raw(), &mut raw) },
        )?;
        DataOrder::from_raw(raw)
    }

    /// Location of the label data, relative to the array.
    pub fn uri(&self) -> Result<String> {
        let mut uri = std::ptr::null();
        self.context.capi_call(
            || "get dimension label uri".into(),
            |ctx| unsafe { sys::tiledb_dimension_label_get_uri(ctx, self.raw(), &mut uri) },
        )?;
        unsafe { cstr_to_string(uri, "uri") }
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::dense_schema;

    #[test]
    fn test_label_properties() {
        let ctx = Context::new().unwrap();
        let schema = dense_schema(&ctx);
        schema
            .add_dimension_label(0, "timestamps", DataOrder::Increasing, Datatype::Float64)
            .unwrap();
        assert!(schema.has_dimension_label("timestamps").unwrap());
        assert!(!schema.has_dimension_label("depth").unwrap());
        assert_eq!(schema.dimension_label_num().unwrap(), 1);

        let label = schema.dimension_label("timestamps").unwrap();
        assert_eq!(label.name().unwrap(), "timestamps");
        assert_eq!(label.dimension_index().unwrap(), 0);
        assert_eq!(label.label_type().unwrap(), Datatype::Float64);
        assert_eq!(label.label_order().unwrap(), DataOrder::Increasing);
        assert!(!label.uri().unwrap().is_empty());
    }

    #[test]
    fn test_label_outlives_schema_handle() {
        let ctx = Context::new().unwrap();
        let schema = dense_schema(&ctx);
        schema
            .add_dimension_label(0, "ids", DataOrder::Decreasing, Datatype::UInt32)
            .unwrap();
        let label = schema.dimension_label("ids").unwrap();
        schema.free();
        assert_eq!(label.label_order().unwrap(), DataOrder::Decreasing);
    }

    #[test]
    fn test_label_on_missing_dimension() {
        let ctx = Context::new().unwrap();
        let schema = dense_schema(&ctx);
        let err = schema
            .add_dimension_label(3, "depth", DataOrder::Increasing, Datatype::Int64)
            .unwrap_err();
        assert!(err.native_message().unwrap().contains("Dimension index 3"));
        assert!(schema.dimension_label("depth").is_err());
    }
}
