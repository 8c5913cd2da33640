//! Schema objects: dimensions, domains, attributes, array schemas, dimension
//! labels, enumerations and schema evolutions.

use super::filter::FilterDef;
use super::*;
use parking_lot::Mutex;

/// Cell value number marking variable-length cells.
pub(crate) const VAR_NUM: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub(crate) struct DimensionDef {
    pub(crate) name: String,
    pub(crate) datatype: tiledb_datatype_t,
    pub(crate) domain: Vec<u8>,
    pub(crate) tile_extent: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeDef {
    pub(crate) name: String,
    pub(crate) datatype: tiledb_datatype_t,
    pub(crate) cell_val_num: u32,
    pub(crate) filters: Vec<FilterDef>,
    pub(crate) max_chunk_size: u32,
    pub(crate) nullable: bool,
}

impl AttributeDef {
    /// Size in bytes of one cell, `None` for variable-length attributes.
    pub(crate) fn cell_size(&self) -> Option<u64> {
        if self.cell_val_num == VAR_NUM {
            return None;
        }
        datatype_size(self.datatype).map(|size| size * self.cell_val_num as u64)
    }

    pub(crate) fn is_var(&self) -> bool {
        self.cell_val_num == VAR_NUM
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LabelDef {
    pub(crate) name: String,
    pub(crate) dim_index: u32,
    pub(crate) order: tiledb_data_order_t,
    pub(crate) label_type: tiledb_datatype_t,
    pub(crate) uri: String,
}

#[derive(Debug, Clone)]
pub(crate) struct EnumerationDef {
    pub(crate) name: String,
    pub(crate) datatype: tiledb_datatype_t,
    pub(crate) cell_val_num: u32,
    pub(crate) ordered: bool,
    pub(crate) data: Vec<u8>,
    pub(crate) offsets: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct SchemaDef {
    pub(crate) array_type: tiledb_array_type_t,
    pub(crate) dims: Vec<DimensionDef>,
    pub(crate) attributes: Vec<AttributeDef>,
    pub(crate) labels: Vec<LabelDef>,
    pub(crate) enumerations: Vec<EnumerationDef>,
}

impl SchemaDef {
    pub(crate) fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub(crate) fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        if self.dims.is_empty() {
            return Err("ArraySchema: Array schema check failed; Domain not set".into());
        }
        if self.attributes.is_empty() {
            return Err("ArraySchema: Array schema check failed; No attributes".into());
        }
        if self.array_type == TILEDB_DENSE && self.dims.iter().any(|d| !is_integer(d.datatype)) {
            return Err("ArraySchema: Array schema check failed; Dense arrays require integer dimensions".into());
        }
        Ok(())
    }
}

pub struct tiledb_dimension_t {
    def: DimensionDef,
    name: CString,
}

impl tiledb_dimension_t {
    fn from_def(def: DimensionDef) -> Self {
        let name = c_string(&def.name);
        Self { def, name }
    }
}

pub struct tiledb_domain_t {
    dims: Mutex<Vec<DimensionDef>>,
}

pub struct tiledb_attribute_t {
    def: Mutex<AttributeDef>,
    name: CString,
}

impl tiledb_attribute_t {
    fn from_def(def: AttributeDef) -> Self {
        let name = c_string(&def.name);
        Self {
            def: Mutex::new(def),
            name,
        }
    }

    pub(crate) fn def(&self) -> AttributeDef {
        self.def.lock().clone()
    }
}

pub struct tiledb_array_schema_t {
    def: Mutex<SchemaDef>,
}

impl tiledb_array_schema_t {
    pub(crate) fn from_def(def: SchemaDef) -> Self {
        Self { def: Mutex::new(def) }
    }

    pub(crate) fn def(&self) -> SchemaDef {
        self.def.lock().clone()
    }
}

pub struct tiledb_dimension_label_t {
    def: LabelDef,
    name: CString,
    uri: CString,
}

pub struct tiledb_enumeration_t {
    def: EnumerationDef,
}

impl tiledb_enumeration_t {
    pub(crate) fn def(&self) -> EnumerationDef {
        self.def.clone()
    }
}

#[derive(Default)]
pub(crate) struct EvolutionDef {
    pub(crate) add_attributes: Vec<AttributeDef>,
    pub(crate) drop_attributes: Vec<String>,
    pub(crate) add_enumerations: Vec<EnumerationDef>,
    pub(crate) drop_enumerations: Vec<String>,
}

pub struct tiledb_array_schema_evolution_t {
    def: Mutex<EvolutionDef>,
}

impl tiledb_array_schema_evolution_t {
    pub(crate) fn apply(&self, schema: &mut SchemaDef) -> Result<(), String> {
        let evolution = self.def.lock();
        for name in &evolution.drop_attributes {
            let before = schema.attributes.len();
            schema.attributes.retain(|a| &a.name != name);
            if schema.attributes.len() == before {
                return Err(format!(
                    "ArraySchemaEvolution: Cannot drop attribute; Attribute '{name}' does not exist"
                ));
            }
        }
        for attr in &evolution.add_attributes {
            if schema.attribute(&attr.name).is_some() {
                return Err(format!(
                    "ArraySchemaEvolution: Cannot add attribute; Attribute '{}' already exists",
                    attr.name
                ));
            }
            schema.attributes.push(attr.clone());
        }
        for name in &evolution.drop_enumerations {
            schema.enumerations.retain(|e| &e.name != name);
        }
        for enumeration in &evolution.add_enumerations {
            if schema.enumerations.iter().any(|e| e.name == enumeration.name) {
                return Err(format!(
                    "ArraySchemaEvolution: Cannot add enumeration; Enumeration '{}' already exists",
                    enumeration.name
                ));
            }
            schema.enumerations.push(enumeration.clone());
        }
        schema.check()
    }
}

/// Read the two domain bounds as f64 and check `low <= high`.
fn domain_is_valid(datatype: tiledb_datatype_t, bytes: &[u8]) -> bool {
    fn pair<const N: usize>(bytes: &[u8]) -> ([u8; N], [u8; N]) {
        let mut low = [0; N];
        let mut high = [0; N];
        low.copy_from_slice(&bytes[..N]);
        high.copy_from_slice(&bytes[N..2 * N]);
        (low, high)
    }
    let (low, high) = match datatype {
        TILEDB_INT8 => (bytes[0] as i8 as f64, bytes[1] as i8 as f64),
        TILEDB_UINT8 => (bytes[0] as f64, bytes[1] as f64),
        TILEDB_INT16 => {
            let (l, h) = pair::<2>(bytes);
            (i16::from_ne_bytes(l) as f64, i16::from_ne_bytes(h) as f64)
        }
        TILEDB_UINT16 => {
            let (l, h) = pair::<2>(bytes);
            (u16::from_ne_bytes(l) as f64, u16::from_ne_bytes(h) as f64)
        }
        TILEDB_INT32 => {
            let (l, h) = pair::<4>(bytes);
            (i32::from_ne_bytes(l) as f64, i32::from_ne_bytes(h) as f64)
        }
        TILEDB_UINT32 => {
            let (l, h) = pair::<4>(bytes);
            (u32::from_ne_bytes(l) as f64, u32::from_ne_bytes(h) as f64)
        }
        TILEDB_FLOAT32 => {
            let (l, h) = pair::<4>(bytes);
            (f32::from_ne_bytes(l) as f64, f32::from_ne_bytes(h) as f64)
        }
        TILEDB_INT64 => {
            let (l, h) = pair::<8>(bytes);
            return i64::from_ne_bytes(l) <= i64::from_ne_bytes(h);
        }
        TILEDB_UINT64 => {
            let (l, h) = pair::<8>(bytes);
            return u64::from_ne_bytes(l) <= u64::from_ne_bytes(h);
        }
        TILEDB_FLOAT64 => {
            let (l, h) = pair::<8>(bytes);
            (f64::from_ne_bytes(l), f64::from_ne_bytes(h))
        }
        _ => return false,
    };
    low <= high
}

pub unsafe extern "C" fn tiledb_dimension_alloc(
    ctx: *mut tiledb_ctx_t,
    name: *const c_char,
    datatype: tiledb_datatype_t,
    dim_domain: *const c_void,
    tile_extent: *const c_void,
    dim: *mut *mut tiledb_dimension_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let name = sim_str!(ctx, name, "dimension name");
    let Some(size) = datatype_size(datatype) else {
        return ctx.fail(format!("Dimension: Unsupported datatype {datatype} for dimension '{name}'"));
    };
    if dim_domain.is_null() {
        return ctx.fail(format!("Dimension: Domain of dimension '{name}' is not set"));
    }
    let domain =
        unsafe { std::slice::from_raw_parts(dim_domain.cast::<u8>(), 2 * size as usize) }.to_vec();
    if !domain_is_valid(datatype, &domain) {
        return ctx.fail(format!(
            "Dimension: Domain check failed for dimension '{name}'; lower bound exceeds upper bound"
        ));
    }
    let tile_extent = (!tile_extent.is_null()).then(|| {
        unsafe { std::slice::from_raw_parts(tile_extent.cast::<u8>(), size as usize) }.to_vec()
    });
    let value = tiledb_dimension_t::from_def(DimensionDef {
        name: name.to_string(),
        datatype,
        domain,
        tile_extent,
    });
    sim_out!(ctx, dim, boxed(value, "dimension"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_dimension_free(dim: *mut *mut tiledb_dimension_t) {
    unsafe { release(dim, "dimension") }
}

pub unsafe extern "C" fn tiledb_dimension_get_name(
    ctx: *mut tiledb_ctx_t,
    dim: *mut tiledb_dimension_t,
    name: *mut *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let dim = sim_arg!(ctx, dim, "dimension");
    sim_out!(ctx, name, dim.name.as_ptr());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_dimension_get_type(
    ctx: *mut tiledb_ctx_t,
    dim: *mut tiledb_dimension_t,
    datatype: *mut tiledb_datatype_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let dim = sim_arg!(ctx, dim, "dimension");
    sim_out!(ctx, datatype, dim.def.datatype);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_dimension_get_domain(
    ctx: *mut tiledb_ctx_t,
    dim: *mut tiledb_dimension_t,
    domain: *mut *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let dim = sim_arg!(ctx, dim, "dimension");
    sim_out!(ctx, domain, dim.def.domain.as_ptr().cast());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_domain_alloc(
    ctx: *mut tiledb_ctx_t,
    domain: *mut *mut tiledb_domain_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let value = tiledb_domain_t {
        dims: Mutex::new(Vec::new()),
    };
    sim_out!(ctx, domain, boxed(value, "domain"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_domain_free(domain: *mut *mut tiledb_domain_t) {
    unsafe { release(domain, "domain") }
}

pub unsafe extern "C" fn tiledb_domain_add_dimension(
    ctx: *mut tiledb_ctx_t,
    domain: *mut tiledb_domain_t,
    dim: *mut tiledb_dimension_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let domain = sim_arg!(ctx, domain, "domain");
    let dim = sim_arg!(ctx, dim, "dimension");
    let mut dims = domain.dims.lock();
    if let Some(first) = dims.first() {
        if first.datatype != dim.def.datatype {
            return ctx.fail(format!(
                "Domain: Cannot add dimension '{}'; all dimensions must have the same datatype",
                dim.def.name
            ));
        }
    }
    if dims.iter().any(|d| d.name == dim.def.name) {
        return ctx.fail(format!(
            "Domain: Cannot add dimension; Dimension name '{}' already exists",
            dim.def.name
        ));
    }
    dims.push(dim.def.clone());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_domain_get_ndim(
    ctx: *mut tiledb_ctx_t,
    domain: *mut tiledb_domain_t,
    ndim: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let domain = sim_arg!(ctx, domain, "domain");
    sim_out!(ctx, ndim, domain.dims.lock().len() as u32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_domain_get_dimension_from_index(
    ctx: *mut tiledb_ctx_t,
    domain: *mut tiledb_domain_t,
    index: u32,
    dim: *mut *mut tiledb_dimension_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let domain = sim_arg!(ctx, domain, "domain");
    let Some(def) = domain.dims.lock().get(index as usize).cloned() else {
        return ctx.fail(format!("Domain: Cannot get dimension; Dimension index {index} out of bounds"));
    };
    sim_out!(ctx, dim, boxed(tiledb_dimension_t::from_def(def), "dimension"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_domain_get_dimension_from_name(
    ctx: *mut tiledb_ctx_t,
    domain: *mut tiledb_domain_t,
    name: *const c_char,
    dim: *mut *mut tiledb_dimension_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let domain = sim_arg!(ctx, domain, "domain");
    let name = sim_str!(ctx, name, "dimension name");
    let Some(def) = domain.dims.lock().iter().find(|d| d.name == name).cloned() else {
        return ctx.fail(format!("Domain: Cannot get dimension; Dimension '{name}' does not exist"));
    };
    sim_out!(ctx, dim, boxed(tiledb_dimension_t::from_def(def), "dimension"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_attribute_alloc(
    ctx: *mut tiledb_ctx_t,
    name: *const c_char,
    datatype: tiledb_datatype_t,
    attr: *mut *mut tiledb_attribute_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let name = sim_str!(ctx, name, "attribute name");
    if datatype_size(datatype).is_none() {
        return ctx.fail(format!("Attribute: Unsupported datatype {datatype} for attribute '{name}'"));
    }
    let (filters, max_chunk_size) = tiledb_filter_list_t::empty().snapshot();
    let value = tiledb_attribute_t::from_def(AttributeDef {
        name: name.to_string(),
        datatype,
        cell_val_num: 1,
        filters,
        max_chunk_size,
        nullable: false,
    });
    sim_out!(ctx, attr, boxed(value, "attribute"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_attribute_free(attr: *mut *mut tiledb_attribute_t) {
    unsafe { release(attr, "attribute") }
}

pub unsafe extern "C" fn tiledb_attribute_get_name(
    ctx: *mut tiledb_ctx_t,
    attr: *mut tiledb_attribute_t,
    name: *mut *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let attr = sim_arg!(ctx, attr, "attribute");
    sim_out!(ctx, name, attr.name.as_ptr());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_attribute_get_type(
    ctx: *mut tiledb_ctx_t,
    attr: *mut tiledb_attribute_t,
    datatype: *mut tiledb_datatype_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let attr = sim_arg!(ctx, attr, "attribute");
    sim_out!(ctx, datatype, attr.def.lock().datatype);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_attribute_set_filter_list(
    ctx: *mut tiledb_ctx_t,
    attr: *mut tiledb_attribute_t,
    filter_list: *mut tiledb_filter_list_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let attr = sim_arg!(ctx, attr, "attribute");
    let list = sim_arg!(ctx, filter_list, "filter list");
    let (filters, max_chunk_size) = list.snapshot();
    let mut def = attr.def.lock();
    def.filters = filters;
    def.max_chunk_size = max_chunk_size;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_attribute_get_filter_list(
    ctx: *mut tiledb_ctx_t,
    attr: *mut tiledb_attribute_t,
    filter_list: *mut *mut tiledb_filter_list_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let attr = sim_arg!(ctx, attr, "attribute");
    let def = attr.def();
    let list = tiledb_filter_list_t::from_parts(def.filters, def.max_chunk_size);
    sim_out!(ctx, filter_list, boxed(list, "filter_list"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_attribute_set_cell_val_num(
    ctx: *mut tiledb_ctx_t,
    attr: *mut tiledb_attribute_t,
    cell_val_num: u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let attr = sim_arg!(ctx, attr, "attribute");
    if cell_val_num == 0 {
        return ctx.fail("Attribute: Cannot set number of values per cell; cell val num cannot be zero");
    }
    attr.def.lock().cell_val_num = cell_val_num;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_attribute_get_cell_val_num(
    ctx: *mut tiledb_ctx_t,
    attr: *mut tiledb_attribute_t,
    cell_val_num: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let attr = sim_arg!(ctx, attr, "attribute");
    sim_out!(ctx, cell_val_num, attr.def.lock().cell_val_num);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_attribute_set_nullable(
    ctx: *mut tiledb_ctx_t,
    attr: *mut tiledb_attribute_t,
    nullable: u8,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let attr = sim_arg!(ctx, attr, "attribute");
    attr.def.lock().nullable = nullable != 0;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_attribute_get_nullable(
    ctx: *mut tiledb_ctx_t,
    attr: *mut tiledb_attribute_t,
    nullable: *mut u8,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let attr = sim_arg!(ctx, attr, "attribute");
    sim_out!(ctx, nullable, attr.def.lock().nullable as u8);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_alloc(
    ctx: *mut tiledb_ctx_t,
    array_type: tiledb_array_type_t,
    array_schema: *mut *mut tiledb_array_schema_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    if array_type != TILEDB_DENSE && array_type != TILEDB_SPARSE {
        return ctx.fail(format!("ArraySchema: Unknown array type {array_type}"));
    }
    let value = tiledb_array_schema_t::from_def(SchemaDef {
        array_type,
        dims: Vec::new(),
        attributes: Vec::new(),
        labels: Vec::new(),
        enumerations: Vec::new(),
    });
    sim_out!(ctx, array_schema, boxed(value, "array_schema"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_free(array_schema: *mut *mut tiledb_array_schema_t) {
    unsafe { release(array_schema, "array_schema") }
}

pub unsafe extern "C" fn tiledb_array_schema_get_array_type(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    array_type: *mut tiledb_array_type_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    sim_out!(ctx, array_type, schema.def.lock().array_type);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_set_domain(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    domain: *mut tiledb_domain_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    let domain = sim_arg!(ctx, domain, "domain");
    let dims = domain.dims.lock().clone();
    if dims.is_empty() {
        return ctx.fail("ArraySchema: Cannot set domain; Domain must contain at least one dimension");
    }
    schema.def.lock().dims = dims;
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_add_attribute(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    attr: *mut tiledb_attribute_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    let attr = sim_arg!(ctx, attr, "attribute").def();
    let mut def = schema.def.lock();
    if def.attribute(&attr.name).is_some() {
        return ctx.fail(format!(
            "ArraySchema: Cannot add attribute; Attribute name '{}' already exists",
            attr.name
        ));
    }
    def.attributes.push(attr);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_get_domain(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    domain: *mut *mut tiledb_domain_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    let dims = schema.def.lock().dims.clone();
    let value = tiledb_domain_t { dims: Mutex::new(dims) };
    sim_out!(ctx, domain, boxed(value, "domain"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_get_attribute_num(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    attribute_num: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    sim_out!(ctx, attribute_num, schema.def.lock().attributes.len() as u32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_get_attribute_from_name(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    name: *const c_char,
    attr: *mut *mut tiledb_attribute_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    let name = sim_str!(ctx, name, "attribute name");
    let Some(def) = schema.def.lock().attribute(name).cloned() else {
        return ctx.fail(format!("ArraySchema: Attribute name '{name}' does not exist"));
    };
    sim_out!(ctx, attr, boxed(tiledb_attribute_t::from_def(def), "attribute"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_check(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    match schema.def.lock().check() {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_array_schema_add_enumeration(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    enumeration: *mut tiledb_enumeration_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    let enumeration = sim_arg!(ctx, enumeration, "enumeration").def();
    let mut def = schema.def.lock();
    if def.enumerations.iter().any(|e| e.name == enumeration.name) {
        return ctx.fail(format!(
            "ArraySchema: Cannot add enumeration; Enumeration '{}' already exists",
            enumeration.name
        ));
    }
    def.enumerations.push(enumeration);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_add_dimension_label(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    dim_index: u32,
    name: *const c_char,
    label_order: tiledb_data_order_t,
    label_type: tiledb_datatype_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    let name = sim_str!(ctx, name, "dimension label name");
    let mut def = schema.def.lock();
    if dim_index as usize >= def.dims.len() {
        return ctx.fail(format!(
            "ArraySchema: Cannot add dimension label '{name}'; Dimension index {dim_index} is out of bounds"
        ));
    }
    if label_order == TILEDB_UNORDERED_DATA {
        return ctx.fail(format!(
            "ArraySchema: Cannot add dimension label '{name}'; Unordered dimension labels are not yet supported"
        ));
    }
    if def.labels.iter().any(|l| l.name == name) {
        return ctx.fail(format!(
            "ArraySchema: Cannot add dimension label; Dimension label '{name}' already exists"
        ));
    }
    let uri = format!("__labels/l{}", def.labels.len());
    def.labels.push(LabelDef {
        name: name.to_string(),
        dim_index,
        order: label_order,
        label_type,
        uri,
    });
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_has_dimension_label(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    name: *const c_char,
    has_dim_label: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    let name = sim_str!(ctx, name, "dimension label name");
    let found = schema.def.lock().labels.iter().any(|l| l.name == name);
    sim_out!(ctx, has_dim_label, found as i32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_get_dimension_label_num(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    dim_label_num: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    sim_out!(ctx, dim_label_num, schema.def.lock().labels.len() as u64);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_get_dimension_label_from_name(
    ctx: *mut tiledb_ctx_t,
    array_schema: *mut tiledb_array_schema_t,
    label_name: *const c_char,
    dim_label: *mut *mut tiledb_dimension_label_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let schema = sim_arg!(ctx, array_schema, "array schema");
    let name = sim_str!(ctx, label_name, "dimension label name");
    let Some(def) = schema.def.lock().labels.iter().find(|l| l.name == name).cloned() else {
        return ctx.fail(format!("ArraySchema: No dimension label with the name '{name}'"));
    };
    let value = tiledb_dimension_label_t {
        name: c_string(&def.name),
        uri: c_string(&def.uri),
        def,
    };
    sim_out!(ctx, dim_label, boxed(value, "dimension_label"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_dimension_label_free(dim_label: *mut *mut tiledb_dimension_label_t) {
    unsafe { release(dim_label, "dimension_label") }
}

pub unsafe extern "C" fn tiledb_dimension_label_get_name(
    ctx: *mut tiledb_ctx_t,
    dim_label: *mut tiledb_dimension_label_t,
    name: *mut *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let label = sim_arg!(ctx, dim_label, "dimension label");
    sim_out!(ctx, name, label.name.as_ptr());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_dimension_label_get_dimension_index(
    ctx: *mut tiledb_ctx_t,
    dim_label: *mut tiledb_dimension_label_t,
    dim_index: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let label = sim_arg!(ctx, dim_label, "dimension label");
    sim_out!(ctx, dim_index, label.def.dim_index);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_dimension_label_get_label_type(
    ctx: *mut tiledb_ctx_t,
    dim_label: *mut tiledb_dimension_label_t,
    label_type: *mut tiledb_datatype_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let label = sim_arg!(ctx, dim_label, "dimension label");
    sim_out!(ctx, label_type, label.def.label_type);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_dimension_label_get_label_order(
    ctx: *mut tiledb_ctx_t,
    dim_label: *mut tiledb_dimension_label_t,
    label_order: *mut tiledb_data_order_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let label = sim_arg!(ctx, dim_label, "dimension label");
    sim_out!(ctx, label_order, label.def.order);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_dimension_label_get_uri(
    ctx: *mut tiledb_ctx_t,
    dim_label: *mut tiledb_dimension_label_t,
    uri: *mut *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let label = sim_arg!(ctx, dim_label, "dimension label");
    sim_out!(ctx, uri, label.uri.as_ptr());
    TILEDB_OK
}

#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn tiledb_enumeration_alloc(
    ctx: *mut tiledb_ctx_t,
    name: *const c_char,
    datatype: tiledb_datatype_t,
    cell_val_num: u32,
    ordered: i32,
    data: *const c_void,
    data_size: u64,
    offsets: *const c_void,
    offsets_size: u64,
    enumeration: *mut *mut tiledb_enumeration_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let name = sim_str!(ctx, name, "enumeration name");
    let Some(size) = datatype_size(datatype) else {
        return ctx.fail(format!("Enumeration: Unsupported datatype {datatype} for enumeration '{name}'"));
    };
    if cell_val_num == 0 {
        return ctx.fail(format!("Enumeration: Invalid cell_val_num for enumeration '{name}'"));
    }
    if data.is_null() || data_size == 0 {
        return ctx.fail(format!("Enumeration: No data provided for enumeration '{name}'"));
    }
    let var = cell_val_num == VAR_NUM;
    if var && (offsets.is_null() || offsets_size == 0) {
        return ctx.fail(format!(
            "Enumeration: Variable length enumeration '{name}' requires offsets"
        ));
    }
    if !var && data_size % (size * cell_val_num as u64) != 0 {
        return ctx.fail(format!(
            "Enumeration: Data size of enumeration '{name}' is not a multiple of the cell size"
        ));
    }
    let data = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), data_size as usize) }.to_vec();
    let offsets = if var {
        unsafe { std::slice::from_raw_parts(offsets.cast::<u8>(), offsets_size as usize) }.to_vec()
    } else {
        Vec::new()
    };
    let value = tiledb_enumeration_t {
        def: EnumerationDef {
            name: name.to_string(),
            datatype,
            cell_val_num,
            ordered: ordered != 0,
            data,
            offsets,
        },
    };
    sim_out!(ctx, enumeration, boxed(value, "enumeration"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_enumeration_free(enumeration: *mut *mut tiledb_enumeration_t) {
    unsafe { release(enumeration, "enumeration") }
}

pub unsafe extern "C" fn tiledb_enumeration_get_name(
    ctx: *mut tiledb_ctx_t,
    enumeration: *mut tiledb_enumeration_t,
    name: *mut *mut tiledb_string_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let enumeration = sim_arg!(ctx, enumeration, "enumeration");
    sim_out!(ctx, name, new_string(&enumeration.def.name));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_enumeration_get_type(
    ctx: *mut tiledb_ctx_t,
    enumeration: *mut tiledb_enumeration_t,
    datatype: *mut tiledb_datatype_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let enumeration = sim_arg!(ctx, enumeration, "enumeration");
    sim_out!(ctx, datatype, enumeration.def.datatype);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_enumeration_get_cell_val_num(
    ctx: *mut tiledb_ctx_t,
    enumeration: *mut tiledb_enumeration_t,
    cell_val_num: *mut u32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let enumeration = sim_arg!(ctx, enumeration, "enumeration");
    sim_out!(ctx, cell_val_num, enumeration.def.cell_val_num);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_enumeration_get_ordered(
    ctx: *mut tiledb_ctx_t,
    enumeration: *mut tiledb_enumeration_t,
    ordered: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let enumeration = sim_arg!(ctx, enumeration, "enumeration");
    sim_out!(ctx, ordered, enumeration.def.ordered as i32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_enumeration_get_data(
    ctx: *mut tiledb_ctx_t,
    enumeration: *mut tiledb_enumeration_t,
    data: *mut *const c_void,
    data_size: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let enumeration = sim_arg!(ctx, enumeration, "enumeration");
    sim_out!(ctx, data, enumeration.def.data.as_ptr().cast());
    sim_out!(ctx, data_size, enumeration.def.data.len() as u64);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_enumeration_get_offsets(
    ctx: *mut tiledb_ctx_t,
    enumeration: *mut tiledb_enumeration_t,
    offsets: *mut *const c_void,
    offsets_size: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let enumeration = sim_arg!(ctx, enumeration, "enumeration");
    let pointer = if enumeration.def.offsets.is_empty() {
        std::ptr::null()
    } else {
        enumeration.def.offsets.as_ptr().cast()
    };
    sim_out!(ctx, offsets, pointer);
    sim_out!(ctx, offsets_size, enumeration.def.offsets.len() as u64);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_evolution_alloc(
    ctx: *mut tiledb_ctx_t,
    evolution: *mut *mut tiledb_array_schema_evolution_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let value = tiledb_array_schema_evolution_t {
        def: Mutex::new(EvolutionDef::default()),
    };
    sim_out!(ctx, evolution, boxed(value, "array_schema_evolution"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_evolution_free(
    evolution: *mut *mut tiledb_array_schema_evolution_t,
) {
    unsafe { release(evolution, "array_schema_evolution") }
}

pub unsafe extern "C" fn tiledb_array_schema_evolution_add_attribute(
    ctx: *mut tiledb_ctx_t,
    evolution: *mut tiledb_array_schema_evolution_t,
    attr: *mut tiledb_attribute_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let evolution = sim_arg!(ctx, evolution, "array schema evolution");
    let attr = sim_arg!(ctx, attr, "attribute").def();
    let mut def = evolution.def.lock();
    if def.add_attributes.iter().any(|a| a.name == attr.name) {
        return ctx.fail(format!(
            "ArraySchemaEvolution: Cannot add attribute; Attribute '{}' already added",
            attr.name
        ));
    }
    def.add_attributes.push(attr);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_evolution_drop_attribute(
    ctx: *mut tiledb_ctx_t,
    evolution: *mut tiledb_array_schema_evolution_t,
    attribute_name: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let evolution = sim_arg!(ctx, evolution, "array schema evolution");
    let name = sim_str!(ctx, attribute_name, "attribute name");
    evolution.def.lock().drop_attributes.push(name.to_string());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_evolution_add_enumeration(
    ctx: *mut tiledb_ctx_t,
    evolution: *mut tiledb_array_schema_evolution_t,
    enumeration: *mut tiledb_enumeration_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let evolution = sim_arg!(ctx, evolution, "array schema evolution");
    let enumeration = sim_arg!(ctx, enumeration, "enumeration").def();
    evolution.def.lock().add_enumerations.push(enumeration);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_array_schema_evolution_drop_enumeration(
    ctx: *mut tiledb_ctx_t,
    evolution: *mut tiledb_array_schema_evolution_t,
    enumeration_name: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let evolution = sim_arg!(ctx, evolution, "array schema evolution");
    let name = sim_str!(ctx, enumeration_name, "enumeration name");
    evolution.def.lock().drop_enumerations.push(name.to_string());
    TILEDB_OK
}
