//! Array schemas and their parts: dimensions, domains and attributes.

use crate::context::Context;
use crate::dimension_label::DimensionLabel;
use crate::enumeration::Enumeration;
use crate::error::{Error, Result};
use crate::filter::FilterList;
use crate::handle::{
    ArraySchemaHandle, AttributeHandle, CapiHandle, DimensionHandle, DimensionLabelHandle, DomainHandle,
    FilterListHandle,
};
use crate::sys;
use crate::types::{ArrayType, CellType, DataOrder, Datatype, cells_from_bytes, native_bytes};
use crate::util::{cstr_to_string, cstring};

/// Cell value count marking a variable-length attribute.
pub const VAR_NUM: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct Dimension {
    context: Context,
    handle: DimensionHandle,
}

impl Dimension {
    /// Create a dimension over the inclusive range `bounds`.
    pub fn new<T: CellType>(context: &Context, name: &str, bounds: [T; 2], tile_extent: Option<T>) -> Result<Self> {
        let c_name = cstring("name", name)?;
        let extent_ptr = tile_extent
            .as_ref()
            .map_or(std::ptr::null(), |extent| (extent as *const T).cast());
        let handle = context.capi_alloc::<DimensionHandle, _>(|ctx, out| unsafe {
            sys::tiledb_dimension_alloc(
                ctx,
                c_name.as_ptr(),
                T::DATATYPE.to_raw(),
                bounds.as_ptr().cast(),
                extent_ptr,
                out,
            )
        })?;
        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_dimension_t {
        self.handle.get().as_ptr()
    }

    pub fn name(&self) -> Result<String> {
        let mut name = std::ptr::null();
        self.context.capi_call(
            || "get dimension name".into(),
            |ctx| unsafe { sys::tiledb_dimension_get_name(ctx, self.raw(), &mut name) },
        )?;
        unsafe { cstr_to_string(name, "name") }
    }

    pub fn datatype(&self) -> Result<Datatype> {
        let mut raw = 0;
        self.context.capi_call(
            || "get dimension type".into(),
            |ctx| unsafe { sys::tiledb_dimension_get_type(ctx, self.raw(), &mut raw) },
        )?;
        Datatype::from_raw(raw)
    }

    /// The inclusive bounds, read as `T`.
    pub fn domain<T: CellType>(&self) -> Result<[T; 2]> {
        let datatype = self.datatype()?;
        if datatype != T::DATATYPE {
            return Err(Error::TypeMismatch {
                operation: "get dimension domain".into(),
                expected: datatype.type_name(),
                actual: T::DATATYPE.type_name(),
            });
        }
        let mut domain = std::ptr::null();
        self.context.capi_call(
            || "get dimension domain".into(),
            |ctx| unsafe { sys::tiledb_dimension_get_domain(ctx, self.raw(), &mut domain) },
        )?;
        let bytes = unsafe { native_bytes(domain, 2 * std::mem::size_of::<T>() as u64) };
        match cells_from_bytes::<T>(bytes)?.as_slice() {
            [low, high] => Ok([*low, *high]),
            _ => Err(Error::InvalidState("dimension domain is not set".into())),
        }
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

/// The set of dimensions of an array.
#[derive(Debug, Clone)]
pub struct Domain {
    context: Context,
    handle: DomainHandle,
}

impl Domain {
    pub fn new(context: &Context) -> Result<Self> {
        let handle =
            context.capi_alloc::<DomainHandle, _>(|ctx, out| unsafe { sys::tiledb_domain_alloc(ctx, out) })?;
        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    fn raw(&self) -> *mut sys::tiledb_domain_t {
        self.handle.get().as_ptr()
    }

    pub fn add_dimension(&self, dimension: &Dimension) -> Result<()> {
        self.context.capi_call(
            || "add dimension to domain".into(),
            |ctx| unsafe { sys::tiledb_domain_add_dimension(ctx, self.raw(), dimension.raw()) },
        )
    }

    pub fn ndim(&self) -> Result<u32> {
        let mut ndim = 0;
        self.context.capi_call(
            || "get domain dimension count".into(),
            |ctx| unsafe { sys::tiledb_domain_get_ndim(ctx, self.raw(), &mut ndim) },
        )?;
        Ok(ndim)
    }

    /// A copy of the dimension at `index`.
    pub fn dimension(&self, index: u32) -> Result<Dimension> {
        let handle = self.context.capi_handle::<DimensionHandle, _>(
            || format!("get dimension {index}"),
            |ctx, out| unsafe { sys::tiledb_domain_get_dimension_from_index(ctx, self.raw(), index, out) },
        )?;
        Ok(Dimension {
            context: self.context.clone(),
            handle,
        })
    }

    pub fn dimension_by_name(&self, name: &str) -> Result<Dimension> {
        let c_name = cstring("name", name)?;
        let handle = self.context.capi_handle::<DimensionHandle, _>(
            || format!("get dimension '{name}'"),
            |ctx, out| unsafe { sys::tiledb_domain_get_dimension_from_name(ctx, self.raw(), c_name.as_ptr(), out) },
        )?;
        Ok(Dimension {
            context: self.context.clone(),
            handle,
        })
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    context: Context,
    handle: AttributeHandle,
}

impl Attribute {
    pub fn new(context: &Context, name: &str, datatype: Datatype) -> Result<Self> {
        let c_name = cstring("name", name)?;
        let handle = context.capi_alloc::<AttributeHandle, _>(|ctx, out| unsafe {
            sys::tiledb_attribute_alloc(ctx, c_name.as_ptr(), datatype.to_raw(), out)
        })?;
        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_attribute_t {
        self.handle.get().as_ptr()
    }

    pub fn name(&self) -> Result<String> {
        let mut name = std::ptr::null();
        self.context.capi_call(
            || "get attribute name".into(),
            |ctx| unsafe { sys::tiledb_attribute_get_name(ctx, self.raw(), &mut name) },
        )?;
        unsafe { cstr_to_string(name, "name") }
    }

    pub fn datatype(&self) -> Result<Datatype> {
        let mut raw = 0;
        self.context.capi_call(
            || "get attribute type".into(),
            |ctx| unsafe { sys::tiledb_attribute_get_type(ctx, self.raw(), &mut raw) },
        )?;
        Datatype::from_raw(raw)
    }

    pub fn set_filter_list(&self, filters: &FilterList) -> Result<()> {
        self.context.capi_call(
            || "set attribute filter list".into(),
            |ctx| unsafe { sys::tiledb_attribute_set_filter_list(ctx, self.raw(), filters.raw()) },
        )
    }

    pub fn filter_list(&self) -> Result<FilterList> {
        let handle = self.context.capi_handle::<FilterListHandle, _>(
            || "get attribute filter list".into(),
            |ctx, out| unsafe { sys::tiledb_attribute_get_filter_list(ctx, self.raw(), out) },
        )?;
        Ok(FilterList::from_handle(&self.context, handle))
    }

    /// Set the number of values per cell; [`VAR_NUM`] makes it variable-length.
    pub fn set_cell_val_num(&self, num: u32) -> Result<()> {
        self.context.capi_call(
            || format!("set attribute cell value count to {num}"),
            |ctx| unsafe { sys::tiledb_attribute_set_cell_val_num(ctx, self.raw(), num) },
        )
    }

    pub fn cell_val_num(&self) -> Result<u32> {
        let mut num = 0;
        self.context.capi_call(
            || "get attribute cell value count".into(),
            |ctx| unsafe { sys::tiledb_attribute_get_cell_val_num(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    /// Allow null cells. Writes and reads then need a validity buffer.
    pub fn set_nullable(&self, nullable: bool) -> Result<()> {
        self.context.capi_call(
            || "set attribute nullable".into(),
            |ctx| unsafe { sys::tiledb_attribute_set_nullable(ctx, self.raw(), nullable as u8) },
        )
    }

    pub fn nullable(&self) -> Result<bool> {
        let mut nullable = 0;
        self.context.capi_call(
            || "get attribute nullable".into(),
            |ctx| unsafe { sys::tiledb_attribute_get_nullable(ctx, self.raw(), &mut nullable) },
        )?;
        Ok(nullable != 0)
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

/// Description of an array: its type, domain, attributes, enumerations and
/// dimension labels.
#[derive(Debug, Clone)]
pub struct ArraySchema {
    context: Context,
    handle: ArraySchemaHandle,
}

impl ArraySchema {
    pub fn new(context: &Context, array_type: ArrayType) -> Result<Self> {
        let handle = context.capi_alloc::<ArraySchemaHandle, _>(|ctx, out| unsafe {
            sys::tiledb_array_schema_alloc(ctx, array_type.to_raw(), out)
        })?;
        Ok(Self::from_handle(context, handle))
    }

    pub(crate) fn from_handle(context: &Context, handle: ArraySchemaHandle) -> Self {
        Self {
            context: context.clone(),
            handle,
        }
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_array_schema_t {
        self.handle.get().as_ptr()
    }

    pub fn array_type(&self) -> Result<ArrayType> {
        let mut raw = 0;
        self.context.capi_call(
            || "get array type".into(),
            |ctx| unsafe { sys::tiledb_array_schema_get_array_type(ctx, self.raw(), &mut raw) },
        )?;
        ArrayType::from_raw(raw)
    }

    pub fn set_domain(&self, domain: &Domain) -> Result<()> {
        self.context.capi_call(
            || "set array schema domain".into(),
            |ctx| unsafe { sys::tiledb_array_schema_set_domain(ctx, self.raw(), domain.raw()) },
        )
    }

    pub fn domain(&self) -> Result<Domain> {
        let handle = self.context.capi_handle::<DomainHandle, _>(
            || "get array schema domain".into(),
            |ctx, out| unsafe { sys::tiledb_array_schema_get_domain(ctx, self.raw(), out) },
        )?;
        Ok(Domain {
            context: self.context.clone(),
            handle,
        })
    }

    pub fn add_attribute(&self, attribute: &Attribute) -> Result<()> {
        self.context.capi_call(
            || "add attribute to array schema".into(),
            |ctx| unsafe { sys::tiledb_array_schema_add_attribute(ctx, self.raw(), attribute.raw()) },
        )
    }

    pub fn attribute_num(&self) -> Result<u32> {
        let mut num = 0;
        self.context.capi_call(
            || "get attribute count".into(),
            |ctx| unsafe { sys::tiledb_array_schema_get_attribute_num(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    /// Look up an attribute by name. A missing name is reported with the
    /// name in the error.
    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        let c_name = cstring("name", name)?;
        let handle = self.context.capi_handle::<AttributeHandle, _>(
            || format!("get attribute '{name}'"),
            |ctx, out| unsafe {
                sys::tiledb_array_schema_get_attribute_from_name(ctx, self.raw(), c_name.as_ptr(), out)
            },
        )?;
        Ok(Attribute {
            context: self.context.clone(),
            handle,
        })
    }

    /// Validate the schema before creating an array from it.
    pub fn check(&self) -> Result<()> {
        self.context.capi_call(
            || "check array schema".into(),
            |ctx| unsafe { sys::tiledb_array_schema_check(ctx, self.raw()) },
        )
    }

    pub fn add_enumeration(&self, enumeration: &Enumeration) -> Result<()> {
        self.context.capi_call(
            || "add enumeration to array schema".into(),
            |ctx| unsafe { sys::tiledb_array_schema_add_enumeration(ctx, self.raw(), enumeration.raw()) },
        )
    }

    /// Add a label over dimension `dim_index`.
    pub fn add_dimension_label(
        &self,
        dim_index: u32,
        name: &str,
        order: DataOrder,
        label_type: Datatype,
    ) -> Result<()> {
        let c_name = cstring("name", name)?;
        self.context.capi_call(
            || format!("add dimension label '{name}' on dimension {dim_index}"),
            |ctx| unsafe {
                sys::tiledb_array_schema_add_dimension_label(
                    ctx,
                    self.raw(),
                    dim_index,
                    c_name.as_ptr(),
                    order.to_raw(),
                    label_type.to_raw(),
                )
            },
        )
    }

    pub fn has_dimension_label(&self, name: &str) -> Result<bool> {
        let c_name = cstring("name", name)?;
        let mut found = 0;
        self.context.capi_call(
            || format!("check for dimension label '{name}'"),
            |ctx| unsafe {
                sys::tiledb_array_schema_has_dimension_label(ctx, self.raw(), c_name.as_ptr(), &mut found)
            },
        )?;
        Ok(found != 0)
    }

    pub fn dimension_label_num(&self) -> Result<u64> {
        let mut num = 0;
        self.context.capi_call(
            || "get dimension label count".into(),
            |ctx| unsafe { sys::tiledb_array_schema_get_dimension_label_num(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    pub fn dimension_label(&self, name: &str) -> Result<DimensionLabel> {
        let c_name = cstring("name", name)?;
        let handle = self.context.capi_handle::<DimensionLabelHandle, _>(
            || format!("get dimension label '{name}'"),
            |ctx, out| unsafe {
                sys::tiledb_array_schema_get_dimension_label_from_name(ctx, self.raw(), c_name.as_ptr(), out)
            },
        )?;
        Ok(DimensionLabel::from_handle(&self.context, handle))
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::types::FilterType;

    /// A dense schema over `rows` in `[1, 100]` with attributes `a` (i32)
    /// and `b` (f64).
    pub(crate) fn dense_schema(ctx: &Context) -> ArraySchema {
        let rows = Dimension::new(ctx, "rows", [1i64, 100], Some(10)).unwrap();
        let domain = Domain::new(ctx).unwrap();
        domain.add_dimension(&rows).unwrap();
        let schema = ArraySchema::new(ctx, ArrayType::Dense).unwrap();
        schema.set_domain(&domain).unwrap();
        schema
            .add_attribute(&Attribute::new(ctx, "a", Datatype::Int32).unwrap())
            .unwrap();
        schema
            .add_attribute(&Attribute::new(ctx, "b", Datatype::Float64).unwrap())
            .unwrap();
        schema
    }

    #[test]
    fn test_dimension_accessors() {
        let ctx = Context::new().unwrap();
        let dim = Dimension::new(&ctx, "x", [-5i32, 5], Some(2)).unwrap();
        assert_eq!(dim.name().unwrap(), "x");
        assert_eq!(dim.datatype().unwrap(), Datatype::Int32);
        assert_eq!(dim.domain::<i32>().unwrap(), [-5, 5]);
    }

    #[test]
    fn test_dimension_domain_wrong_type() {
        let ctx = Context::new().unwrap();
        let dim = Dimension::new(&ctx, "x", [0u64, 9], None).unwrap();
        let err = dim.domain::<i32>().unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: "u64", actual: "i32", .. }));
    }

    #[test]
    fn test_inverted_domain_is_rejected() {
        let ctx = Context::new().unwrap();
        let err = Dimension::new(&ctx, "y", [10i64, 1], None).unwrap_err();
        assert!(matches!(err, Error::Allocation { kind: "dimension", .. }));
        assert!(err.to_string().contains("'y'"));
    }

    #[test]
    fn test_domain_counts_dimensions() {
        let ctx = Context::new().unwrap();
        let domain = Domain::new(&ctx).unwrap();
        domain
            .add_dimension(&Dimension::new(&ctx, "r", [0i32, 3], None).unwrap())
            .unwrap();
        domain
            .add_dimension(&Dimension::new(&ctx, "c", [0i32, 3], None).unwrap())
            .unwrap();
        assert_eq!(domain.ndim().unwrap(), 2);
        let err = domain
            .add_dimension(&Dimension::new(&ctx, "r", [0i32, 1], None).unwrap())
            .unwrap_err();
        assert!(err.native_message().unwrap().contains("'r'"));
    }

    #[test]
    fn test_attribute_properties() {
        let ctx = Context::new().unwrap();
        let attr = Attribute::new(&ctx, "temperature", Datatype::Float32).unwrap();
        assert_eq!(attr.name().unwrap(), "temperature");
        assert_eq!(attr.datatype().unwrap(), Datatype::Float32);
        assert_eq!(attr.cell_val_num().unwrap(), 1);
        attr.set_cell_val_num(VAR_NUM).unwrap();
        assert_eq!(attr.cell_val_num().unwrap(), VAR_NUM);
        assert!(attr.set_cell_val_num(0).is_err());
    }

    #[test]
    fn test_attribute_nullable() {
        let ctx = Context::new().unwrap();
        let attr = Attribute::new(&ctx, "maybe", Datatype::Int32).unwrap();
        assert!(!attr.nullable().unwrap());
        attr.set_nullable(true).unwrap();
        assert!(attr.nullable().unwrap());
    }

    #[test]
    fn test_schema_domain_lists_dimensions() {
        let ctx = Context::new().unwrap();
        let schema = dense_schema(&ctx);
        let domain = schema.domain().unwrap();
        assert_eq!(domain.ndim().unwrap(), 1);
        let rows = domain.dimension(0).unwrap();
        assert_eq!(rows.name().unwrap(), "rows");
        assert_eq!(rows.domain::<i64>().unwrap(), [1, 100]);
        assert_eq!(domain.dimension_by_name("rows").unwrap().datatype().unwrap(), Datatype::Int64);
        assert!(domain.dimension(1).is_err());
        assert!(domain.dimension_by_name("cols").unwrap_err().to_string().contains("cols"));
    }

    #[test]
    fn test_dense_schema_needs_integer_dimensions() {
        let ctx = Context::new().unwrap();
        let domain = Domain::new(&ctx).unwrap();
        domain
            .add_dimension(&Dimension::new(&ctx, "x", [0.0f64, 1.0], None).unwrap())
            .unwrap();
        let schema = ArraySchema::new(&ctx, ArrayType::Dense).unwrap();
        schema.set_domain(&domain).unwrap();
        schema
            .add_attribute(&Attribute::new(&ctx, "a", Datatype::Int32).unwrap())
            .unwrap();
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_attribute_filter_list_is_copied_in() {
        let ctx = Context::new().unwrap();
        let attr = Attribute::new(&ctx, "a", Datatype::Int32).unwrap();
        let filters = FilterList::new(&ctx).unwrap();
        filters.add_filter(&Filter::new(&ctx, FilterType::Zstd).unwrap()).unwrap();
        attr.set_filter_list(&filters).unwrap();
        filters.free();
        let copy = attr.filter_list().unwrap();
        assert_eq!(copy.num_filters().unwrap(), 1);
        assert_eq!(copy.filter(0).unwrap().filter_type().unwrap(), FilterType::Zstd);
    }

    #[test]
    fn test_schema_lookup_by_name() {
        let ctx = Context::new().unwrap();
        let schema = dense_schema(&ctx);
        schema.check().unwrap();
        assert_eq!(schema.array_type().unwrap(), ArrayType::Dense);
        assert_eq!(schema.attribute_num().unwrap(), 2);
        assert_eq!(schema.attribute("b").unwrap().datatype().unwrap(), Datatype::Float64);

        let err = schema.attribute("pressure").unwrap_err();
        assert!(err.native_message().unwrap().contains("pressure"));
        assert!(err.to_string().contains("pressure"));
    }

    #[test]
    fn test_schema_check_requires_attributes() {
        let ctx = Context::new().unwrap();
        let schema = ArraySchema::new(&ctx, ArrayType::Sparse).unwrap();
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_duplicate_attribute_is_rejected() {
        let ctx = Context::new().unwrap();
        let schema = dense_schema(&ctx);
        let err = schema
            .add_attribute(&Attribute::new(&ctx, "a", Datatype::Int64).unwrap())
            .unwrap_err();
        assert!(err.native_message().unwrap().contains("'a'"));
    }
}
