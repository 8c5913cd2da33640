//! Query conditions: attribute comparisons combined with AND, OR and NOT.

use super::schema::SchemaDef;
use super::*;
use parking_lot::Mutex;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub(crate) enum ConditionDef {
    Compare {
        attribute: String,
        op: tiledb_query_condition_op_t,
        value: Vec<u8>,
    },
    Combine {
        op: tiledb_query_condition_combination_op_t,
        operands: Vec<ConditionDef>,
    },
}

/// Attribute values of the cell being filtered.
pub(crate) trait CellSource {
    /// Bytes of attribute `name` and whether the cell is non-null.
    fn value(&self, name: &str) -> (&[u8], bool);
}

macro_rules! compare_as {
    ($ty:ty, $cell:expr, $value:expr) => {{
        let size = std::mem::size_of::<$ty>();
        match ($cell.get(..size), $value.get(..size)) {
            (Some(cell), Some(value)) => {
                let cell = <$ty>::from_ne_bytes(cell.try_into().ok()?);
                let value = <$ty>::from_ne_bytes(value.try_into().ok()?);
                cell.partial_cmp(&value)
            }
            _ => None,
        }
    }};
}

fn compare(datatype: tiledb_datatype_t, is_var: bool, cell: &[u8], value: &[u8]) -> Option<Ordering> {
    if is_var {
        return Some(cell.cmp(value));
    }
    match datatype {
        TILEDB_INT8 => compare_as!(i8, cell, value),
        TILEDB_UINT8 | TILEDB_BOOL => compare_as!(u8, cell, value),
        TILEDB_INT16 => compare_as!(i16, cell, value),
        TILEDB_UINT16 => compare_as!(u16, cell, value),
        TILEDB_INT32 => compare_as!(i32, cell, value),
        TILEDB_UINT32 => compare_as!(u32, cell, value),
        TILEDB_INT64 => compare_as!(i64, cell, value),
        TILEDB_UINT64 => compare_as!(u64, cell, value),
        TILEDB_FLOAT32 => compare_as!(f32, cell, value),
        TILEDB_FLOAT64 => compare_as!(f64, cell, value),
        _ => Some(cell.cmp(value)),
    }
}

fn satisfies(op: tiledb_query_condition_op_t, ordering: Ordering) -> bool {
    match op {
        TILEDB_LT => ordering == Ordering::Less,
        TILEDB_LE => ordering != Ordering::Greater,
        TILEDB_GT => ordering == Ordering::Greater,
        TILEDB_GE => ordering != Ordering::Less,
        TILEDB_EQ => ordering == Ordering::Equal,
        TILEDB_NE => ordering != Ordering::Equal,
        _ => false,
    }
}

impl ConditionDef {
    /// Validate every comparison against `schema`.
    pub(crate) fn check(&self, schema: &SchemaDef) -> Result<(), String> {
        match self {
            Self::Compare { attribute, value, .. } => {
                let Some(attr) = schema.attribute(attribute) else {
                    return Err(format!("QueryCondition: Attribute '{attribute}' does not exist"));
                };
                if value.is_empty() && attr.nullable {
                    return Ok(());
                }
                match attr.cell_size() {
                    None => Ok(()),
                    Some(size) if size == value.len() as u64 => Ok(()),
                    Some(size) => Err(format!(
                        "QueryCondition: Value size {} does not match the cell size {size} of attribute '{attribute}'",
                        value.len()
                    )),
                }
            }
            Self::Combine { operands, .. } => operands.iter().try_for_each(|c| c.check(schema)),
        }
    }

    pub(crate) fn matches(&self, schema: &SchemaDef, cell: &dyn CellSource) -> bool {
        match self {
            Self::Compare { attribute, op, value } => {
                let Some(attr) = schema.attribute(attribute) else {
                    return false;
                };
                let (bytes, valid) = cell.value(attribute);
                if attr.nullable && value.is_empty() {
                    return match *op {
                        TILEDB_EQ => !valid,
                        TILEDB_NE => valid,
                        _ => false,
                    };
                }
                if !valid {
                    return false;
                }
                compare(attr.datatype, attr.is_var(), bytes, value).is_some_and(|o| satisfies(*op, o))
            }
            Self::Combine { op: TILEDB_AND, operands } => operands.iter().all(|c| c.matches(schema, cell)),
            Self::Combine { op: TILEDB_OR, operands } => operands.iter().any(|c| c.matches(schema, cell)),
            Self::Combine { operands, .. } => !operands.iter().all(|c| c.matches(schema, cell)),
        }
    }
}

pub struct tiledb_query_condition_t {
    def: Mutex<Option<ConditionDef>>,
}

impl tiledb_query_condition_t {
    pub(crate) fn def(&self) -> Option<ConditionDef> {
        self.def.lock().clone()
    }
}

fn initialized(condition: &tiledb_query_condition_t) -> Result<ConditionDef, &'static str> {
    condition
        .def()
        .ok_or("QueryCondition: Cannot combine; Condition is not initialized")
}

pub unsafe extern "C" fn tiledb_query_condition_alloc(
    ctx: *mut tiledb_ctx_t,
    cond: *mut *mut tiledb_query_condition_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let value = tiledb_query_condition_t { def: Mutex::new(None) };
    sim_out!(ctx, cond, boxed(value, "query_condition"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_condition_free(cond: *mut *mut tiledb_query_condition_t) {
    unsafe { release(cond, "query_condition") }
}

pub unsafe extern "C" fn tiledb_query_condition_init(
    ctx: *mut tiledb_ctx_t,
    cond: *mut tiledb_query_condition_t,
    attribute_name: *const c_char,
    condition_value: *const c_void,
    condition_value_size: u64,
    op: tiledb_query_condition_op_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let cond = sim_arg!(ctx, cond, "query condition");
    let attribute = sim_str!(ctx, attribute_name, "attribute name");
    if op > TILEDB_NE {
        return ctx.fail(format!("QueryCondition: Unknown comparison operator {op}"));
    }
    if condition_value.is_null() && condition_value_size > 0 {
        return ctx.fail("QueryCondition: Condition value is null");
    }
    let value = if condition_value_size == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(condition_value.cast::<u8>(), condition_value_size as usize) }.to_vec()
    };
    let mut def = cond.def.lock();
    if def.is_some() {
        return ctx.fail("QueryCondition: Cannot initialize; Condition is already initialized");
    }
    *def = Some(ConditionDef::Compare {
        attribute: attribute.to_string(),
        op,
        value,
    });
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_condition_combine(
    ctx: *mut tiledb_ctx_t,
    left_cond: *const tiledb_query_condition_t,
    right_cond: *const tiledb_query_condition_t,
    combination_op: tiledb_query_condition_combination_op_t,
    combined_cond: *mut *mut tiledb_query_condition_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let left = sim_arg!(ctx, left_cond, "query condition");
    let right = sim_arg!(ctx, right_cond, "query condition");
    match combination_op {
        TILEDB_AND | TILEDB_OR => {}
        TILEDB_NOT => return ctx.fail("QueryCondition: Cannot combine with NOT; Use negate instead"),
        other => return ctx.fail(format!("QueryCondition: Unknown combination operator {other}")),
    }
    let operands = match (initialized(left), initialized(right)) {
        (Ok(left), Ok(right)) => vec![left, right],
        (Err(message), _) | (_, Err(message)) => return ctx.fail(message),
    };
    let combined = ConditionDef::Combine {
        op: combination_op,
        operands,
    };
    let value = tiledb_query_condition_t {
        def: Mutex::new(Some(combined)),
    };
    sim_out!(ctx, combined_cond, boxed(value, "query_condition"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_query_condition_negate(
    ctx: *mut tiledb_ctx_t,
    cond: *const tiledb_query_condition_t,
    negated_cond: *mut *mut tiledb_query_condition_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let cond = sim_arg!(ctx, cond, "query condition");
    let inner = match initialized(cond) {
        Ok(inner) => inner,
        Err(message) => return ctx.fail(message),
    };
    let negated = ConditionDef::Combine {
        op: TILEDB_NOT,
        operands: vec![inner],
    };
    let value = tiledb_query_condition_t {
        def: Mutex::new(Some(negated)),
    };
    sim_out!(ctx, negated_cond, boxed(value, "query_condition"));
    TILEDB_OK
}

#[cfg(test)]
mod tests {
    use super::super::schema::{AttributeDef, DimensionDef};
    use super::*;
    use std::collections::HashMap;

    struct Cell(HashMap<&'static str, (Vec<u8>, bool)>);

    impl CellSource for Cell {
        fn value(&self, name: &str) -> (&[u8], bool) {
            self.0
                .get(name)
                .map_or((&[][..], false), |(bytes, valid)| (bytes.as_slice(), *valid))
        }
    }

    fn schema() -> SchemaDef {
        let attr = |name: &str, datatype, cell_val_num, nullable| AttributeDef {
            name: name.to_string(),
            datatype,
            cell_val_num,
            filters: Vec::new(),
            max_chunk_size: 0,
            nullable,
        };
        SchemaDef {
            array_type: TILEDB_DENSE,
            dims: vec![DimensionDef {
                name: "rows".into(),
                datatype: TILEDB_INT64,
                domain: [1i64, 10].iter().flat_map(|v| v.to_ne_bytes()).collect(),
                tile_extent: None,
            }],
            attributes: vec![
                attr("a", TILEDB_INT32, 1, false),
                attr("name", TILEDB_STRING_UTF8, VAR_NUM, true),
            ],
            labels: Vec::new(),
            enumerations: Vec::new(),
        }
    }

    fn compare(attribute: &str, op: tiledb_query_condition_op_t, value: &[u8]) -> ConditionDef {
        ConditionDef::Compare {
            attribute: attribute.to_string(),
            op,
            value: value.to_vec(),
        }
    }

    fn cell(a: i32, name: Option<&str>) -> Cell {
        Cell(HashMap::from([
            ("a", (a.to_ne_bytes().to_vec(), true)),
            ("name", (name.unwrap_or("").as_bytes().to_vec(), name.is_some())),
        ]))
    }

    #[test]
    fn test_numeric_comparisons() {
        let schema = schema();
        let below = compare("a", TILEDB_LT, &(-5i32).to_ne_bytes());
        assert!(below.matches(&schema, &cell(-7, None)));
        assert!(!below.matches(&schema, &cell(3, None)));

        let either = ConditionDef::Combine {
            op: TILEDB_OR,
            operands: vec![below.clone(), compare("a", TILEDB_GE, &10i32.to_ne_bytes())],
        };
        assert!(either.matches(&schema, &cell(12, None)));
        assert!(!either.matches(&schema, &cell(0, None)));

        let negated = ConditionDef::Combine {
            op: TILEDB_NOT,
            operands: vec![either],
        };
        assert!(negated.matches(&schema, &cell(0, None)));
    }

    #[test]
    fn test_strings_and_nulls() {
        let schema = schema();
        let is_null = compare("name", TILEDB_EQ, b"");
        assert!(is_null.matches(&schema, &cell(0, None)));
        assert!(!is_null.matches(&schema, &cell(0, Some("x"))));

        let after_b = compare("name", TILEDB_GT, b"b");
        assert!(after_b.matches(&schema, &cell(0, Some("carrot"))));
        assert!(!after_b.matches(&schema, &cell(0, Some("apple"))));
        assert!(!after_b.matches(&schema, &cell(0, None)));
    }

    #[test]
    fn test_check_rejects_bad_values() {
        let schema = schema();
        assert!(compare("a", TILEDB_EQ, &1i32.to_ne_bytes()).check(&schema).is_ok());
        assert!(compare("a", TILEDB_EQ, &1i64.to_ne_bytes()).check(&schema).is_err());
        assert!(compare("missing", TILEDB_EQ, b"x").check(&schema).is_err());
        assert!(compare("name", TILEDB_EQ, b"").check(&schema).is_ok());
    }
}
