//! Filters applied to the cells a read returns.

use crate::context::Context;
use crate::error::Result;
use crate::handle::{CapiHandle, QueryConditionHandle};
use crate::sys;
use crate::types::{CellType, CombinationOp, ConditionOp, cells_as_bytes};
use crate::util::cstring;

/// A comparison on one attribute, or a combination of conditions.
#[derive(Debug, Clone)]
pub struct QueryCondition {
    context: Context,
    handle: QueryConditionHandle,
}

impl QueryCondition {
    fn compare_bytes(context: &Context, attribute: &str, value: &[u8], op: ConditionOp) -> Result<Self> {
        let c_name = cstring("attribute", attribute)?;
        // A null value with zero size asks for a null test.
        let value_ptr = if value.is_empty() {
            std::ptr::null()
        } else {
            value.as_ptr().cast()
        };
        let handle = context
            .capi_alloc::<QueryConditionHandle, _>(|ctx, out| unsafe { sys::tiledb_query_condition_alloc(ctx, out) })?;
        context.capi_call(
            || format!("initialize condition on attribute '{attribute}'"),
            |ctx| unsafe {
                sys::tiledb_query_condition_init(
                    ctx,
                    handle.get().as_ptr(),
                    c_name.as_ptr(),
                    value_ptr,
                    value.len() as u64,
                    op.to_raw(),
                )
            },
        )?;
        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    /// Compare attribute `attribute` with `value`.
    pub fn new<T: CellType>(context: &Context, attribute: &str, value: T, op: ConditionOp) -> Result<Self> {
        Self::compare_bytes(context, attribute, cells_as_bytes(&[value]), op)
    }

    /// Compare a string attribute with `value`, byte by byte.
    pub fn new_str(context: &Context, attribute: &str, value: &str, op: ConditionOp) -> Result<Self> {
        Self::compare_bytes(context, attribute, value.as_bytes(), op)
    }

    /// Match null cells of a nullable attribute.
    pub fn is_null(context: &Context, attribute: &str) -> Result<Self> {
        Self::compare_bytes(context, attribute, &[], ConditionOp::Eq)
    }

    /// Match non-null cells of a nullable attribute.
    pub fn is_not_null(context: &Context, attribute: &str) -> Result<Self> {
        Self::compare_bytes(context, attribute, &[], ConditionOp::Ne)
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_query_condition_t {
        self.handle.get().as_ptr()
    }

    /// Join two conditions with [`CombinationOp::And`] or [`CombinationOp::Or`].
    pub fn combine(&self, other: &QueryCondition, op: CombinationOp) -> Result<Self> {
        let handle = self.context.capi_handle::<QueryConditionHandle, _>(
            || format!("combine query conditions with {op:?}"),
            |ctx, out| unsafe { sys::tiledb_query_condition_combine(ctx, self.raw(), other.raw(), op.to_raw(), out) },
        )?;
        Ok(Self {
            context: self.context.clone(),
            handle,
        })
    }

    pub fn and(&self, other: &QueryCondition) -> Result<Self> {
        self.combine(other, CombinationOp::And)
    }

    pub fn or(&self, other: &QueryCondition) -> Result<Self> {
        self.combine(other, CombinationOp::Or)
    }

    pub fn negate(&self) -> Result<Self> {
        let handle = self.context.capi_handle::<QueryConditionHandle, _>(
            || "negate query condition".into(),
            |ctx, out| unsafe { sys::tiledb_query_condition_negate(ctx, self.raw(), out) },
        )?;
        Ok(Self {
            context: self.context.clone(),
            handle,
        })
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_is_not_a_combination() {
        let ctx = Context::new().unwrap();
        let left = QueryCondition::new(&ctx, "a", 1i32, ConditionOp::Gt).unwrap();
        let right = QueryCondition::new(&ctx, "a", 9i32, ConditionOp::Lt).unwrap();
        left.and(&right).unwrap();
        left.or(&right).unwrap().negate().unwrap();
        let err = left.combine(&right, CombinationOp::Not).unwrap_err();
        assert!(err.native_message().unwrap().contains("negate"));
    }

    #[test]
    fn test_condition_outlives_its_operands() {
        let ctx = Context::new().unwrap();
        let left = QueryCondition::new(&ctx, "a", 1i32, ConditionOp::Ge).unwrap();
        let right = QueryCondition::new_str(&ctx, "name", "m", ConditionOp::Lt).unwrap();
        let both = left.and(&right).unwrap();
        left.free();
        right.free();
        both.negate().unwrap();
    }
}
