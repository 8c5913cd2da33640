//! One handle type per native destructor.
//!
//! Each wrapper is generated with the exact `*_free` function for its kind, so
//! a pointer can never be released through the wrong destructor. Wrappers are
//! cheap to clone; clones share the same [`NativeHandle`].

use std::fmt;
use std::sync::Arc;

use super::NativeHandle;
use crate::liveness::BorrowedPtr;
use crate::sys;

/// Common surface of the typed handle wrappers.
pub trait CapiHandle: Clone + Send + Sync + Sized {
    /// Opaque native type the handle points to.
    type Raw;

    /// Human-readable resource kind used in logs and panics.
    const KIND: &'static str;

    /// Wrap a freshly allocated pointer. Returns `None` when it is null.
    ///
    /// # Safety
    ///
    /// `raw` must come from the allocation call of this kind and must not be
    /// owned by anything else.
    unsafe fn from_raw(raw: *mut Self::Raw) -> Option<Self>;

    fn native(&self) -> &NativeHandle<Self::Raw>;

    /// Borrow the live pointer. Panics once freed.
    fn get(&self) -> BorrowedPtr<'_, Self::Raw> {
        self.native().get()
    }

    /// Release the native object for every clone of this handle.
    fn free(&self) {
        self.native().free()
    }

    fn is_freed(&self) -> bool {
        self.native().is_freed()
    }
}

macro_rules! capi_handle {
    ($(#[$meta:meta])* $name:ident, $raw:ty, $free:path, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Arc<NativeHandle<$raw>>);

        impl CapiHandle for $name {
            type Raw = $raw;
            const KIND: &'static str = $kind;

            unsafe fn from_raw(raw: *mut $raw) -> Option<Self> {
                unsafe fn release(ptr: *mut $raw) {
                    let mut ptr = ptr;
                    #[allow(clippy::let_unit_value)]
                    let _ = unsafe { $free(&mut ptr) };
                }
                unsafe { NativeHandle::new(raw, release, $kind) }.map(|h| Self(Arc::new(h)))
            }

            fn native(&self) -> &NativeHandle<$raw> {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&*self.0).finish()
            }
        }
    };
}

capi_handle!(ErrorHandle, sys::tiledb_error_t, sys::tiledb_error_free, "error");
capi_handle!(StringHandle, sys::tiledb_string_t, sys::tiledb_string_free, "string");
capi_handle!(ConfigHandle, sys::tiledb_config_t, sys::tiledb_config_free, "config");
capi_handle!(
    ConfigIterHandle,
    sys::tiledb_config_iter_t,
    sys::tiledb_config_iter_free,
    "config iterator"
);
capi_handle!(ContextHandle, sys::tiledb_ctx_t, sys::tiledb_ctx_free, "context");
capi_handle!(FilterHandle, sys::tiledb_filter_t, sys::tiledb_filter_free, "filter");
capi_handle!(
    FilterListHandle,
    sys::tiledb_filter_list_t,
    sys::tiledb_filter_list_free,
    "filter list"
);
capi_handle!(BufferHandle, sys::tiledb_buffer_t, sys::tiledb_buffer_free, "buffer");
capi_handle!(
    DimensionHandle,
    sys::tiledb_dimension_t,
    sys::tiledb_dimension_free,
    "dimension"
);
capi_handle!(DomainHandle, sys::tiledb_domain_t, sys::tiledb_domain_free, "domain");
capi_handle!(
    AttributeHandle,
    sys::tiledb_attribute_t,
    sys::tiledb_attribute_free,
    "attribute"
);
capi_handle!(
    ArraySchemaHandle,
    sys::tiledb_array_schema_t,
    sys::tiledb_array_schema_free,
    "array schema"
);
capi_handle!(
    DimensionLabelHandle,
    sys::tiledb_dimension_label_t,
    sys::tiledb_dimension_label_free,
    "dimension label"
);
capi_handle!(
    EnumerationHandle,
    sys::tiledb_enumeration_t,
    sys::tiledb_enumeration_free,
    "enumeration"
);
capi_handle!(
    ArraySchemaEvolutionHandle,
    sys::tiledb_array_schema_evolution_t,
    sys::tiledb_array_schema_evolution_free,
    "array schema evolution"
);
capi_handle!(ArrayHandle, sys::tiledb_array_t, sys::tiledb_array_free, "array");
capi_handle!(
    ConsolidationPlanHandle,
    sys::tiledb_consolidation_plan_t,
    sys::tiledb_consolidation_plan_free,
    "consolidation plan"
);
capi_handle!(QueryHandle, sys::tiledb_query_t, sys::tiledb_query_free, "query");
capi_handle!(SubarrayHandle, sys::tiledb_subarray_t, sys::tiledb_subarray_free, "subarray");
capi_handle!(
    QueryConditionHandle,
    sys::tiledb_query_condition_t,
    sys::tiledb_query_condition_free,
    "query condition"
);
capi_handle!(
    FragmentInfoHandle,
    sys::tiledb_fragment_info_t,
    sys::tiledb_fragment_info_free,
    "fragment info"
);
capi_handle!(GroupHandle, sys::tiledb_group_t, sys::tiledb_group_free, "group");
capi_handle!(VfsHandle, sys::tiledb_vfs_t, sys::tiledb_vfs_free, "vfs");
capi_handle!(VfsFileHandle, sys::tiledb_vfs_fh_t, sys::tiledb_vfs_fh_free, "vfs file");

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn new_config() -> ConfigHandle {
        let mut raw = ptr::null_mut();
        let mut err = ptr::null_mut();
        let status = unsafe { sys::tiledb_config_alloc(&mut raw, &mut err) };
        assert_eq!(status, sys::TILEDB_OK);
        unsafe { ConfigHandle::from_raw(raw) }.expect("config handle")
    }

    #[test]
    fn test_clones_share_one_handle() {
        let first = new_config();
        let second = first.clone();
        assert_eq!(first.get().as_ptr(), second.get().as_ptr());
        second.free();
        assert!(first.is_freed());
    }

    #[test]
    fn test_null_raw_is_rejected() {
        assert!(unsafe { ConfigHandle::from_raw(ptr::null_mut()) }.is_none());
    }

    #[test]
    #[should_panic(expected = "cannot use freed config handle")]
    fn test_typed_get_after_free_panics() {
        let config = new_config();
        config.free();
        let _ = config.get();
    }
}
