//! Staged schema changes applied to an existing array with [`Array::evolve`].
//!
//! [`Array::evolve`]: crate::array::Array::evolve

use crate::context::Context;
use crate::enumeration::Enumeration;
use crate::error::Result;
use crate::handle::{ArraySchemaEvolutionHandle, CapiHandle};
use crate::schema::Attribute;
use crate::sys;
use crate::util::cstring;

#[derive(Debug, Clone)]
pub struct ArraySchemaEvolution {
    context: Context,
    handle: ArraySchemaEvolutionHandle,
}

impl ArraySchemaEvolution {
    pub fn new(context: &Context) -> Result<Self> {
        let handle = context.capi_alloc::<ArraySchemaEvolutionHandle, _>(|ctx, out| unsafe {
            sys::tiledb_array_schema_evolution_alloc(ctx, out)
        })?;
        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_array_schema_evolution_t {
        self.handle.get().as_ptr()
    }

    pub fn add_attribute(&self, attribute: &Attribute) -> Result<()> {
        self.context.capi_call(
            || "stage attribute addition".into(),
            |ctx| unsafe { sys::tiledb_array_schema_evolution_add_attribute(ctx, self.raw(), attribute.raw()) },
        )
    }

    pub fn drop_attribute(&self, name: &str) -> Result<()> {
        let c_name = cstring("name", name)?;
        self.context.capi_call(
            || format!("stage drop of attribute '{name}'"),
            |ctx| unsafe { sys::tiledb_array_schema_evolution_drop_attribute(ctx, self.raw(), c_name.as_ptr()) },
        )
    }

    pub fn add_enumeration(&self, enumeration: &Enumeration) -> Result<()> {
        self.context.capi_call(
            || "stage enumeration addition".into(),
            |ctx| unsafe {
                sys::tiledb_array_schema_evolution_add_enumeration(ctx, self.raw(), enumeration.raw())
            },
        )
    }

    pub fn drop_enumeration(&self, name: &str) -> Result<()> {
        let c_name = cstring("name", name)?;
        self.context.capi_call(
            || format!("stage drop of enumeration '{name}'"),
            |ctx| unsafe {
                sys::tiledb_array_schema_evolution_drop_enumeration(ctx, self.raw(), c_name.as_ptr())
            },
        )
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Datatype;

    #[test]
    fn test_duplicate_staged_attribute() {
        let ctx = Context::new().unwrap();
        let evolution = ArraySchemaEvolution::new(&ctx).unwrap();
        let attr = Attribute::new(&ctx, "c", Datatype::UInt8).unwrap();
        evolution.add_attribute(&attr).unwrap();
        let err = evolution.add_attribute(&attr).unwrap_err();
        assert!(err.native_message().unwrap().contains("'c'"));
    }

    #[test]
    fn test_staging_drops() {
        let ctx = Context::new().unwrap();
        let evolution = ArraySchemaEvolution::new(&ctx).unwrap();
        evolution.drop_attribute("b").unwrap();
        evolution.drop_enumeration("codes").unwrap();
        let labels = Enumeration::from_strings(&ctx, "labels", &["lo", "hi"], true).unwrap();
        evolution.add_enumeration(&labels).unwrap();
    }
}
