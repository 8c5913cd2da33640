//! Filters and filter pipelines.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::{CapiHandle, FilterHandle, FilterListHandle};
use crate::sys;
use crate::types::{FilterOption, FilterType};
use crate::value::Value;

/// Kind of value each filter option takes.
fn option_kind(option: FilterOption) -> &'static str {
    match option {
        FilterOption::CompressionLevel => "i32",
        FilterOption::BitWidthMaxWindow | FilterOption::PositiveDeltaMaxWindow => "u32",
        FilterOption::ScaleFloatBytewidth => "u64",
        FilterOption::ScaleFloatFactor | FilterOption::ScaleFloatOffset => "f64",
        FilterOption::WebpQuality => "f32",
        FilterOption::WebpInputFormat | FilterOption::CompressionReinterpretDatatype => "u8",
        FilterOption::WebpLossless => "bool",
    }
}

/// Encode an option value the way the engine reads it, or reject the pair.
fn encode_option(option: FilterOption, value: &Value) -> Result<Vec<u8>> {
    use FilterOption as O;
    let bytes = match (option, value) {
        (O::CompressionLevel, Value::I32(v)) => v.to_ne_bytes().to_vec(),
        (O::BitWidthMaxWindow | O::PositiveDeltaMaxWindow, Value::U32(v)) => v.to_ne_bytes().to_vec(),
        (O::ScaleFloatBytewidth, Value::U64(v)) => v.to_ne_bytes().to_vec(),
        (O::ScaleFloatFactor | O::ScaleFloatOffset, Value::F64(v)) => v.to_ne_bytes().to_vec(),
        (O::WebpQuality, Value::F32(v)) => v.to_ne_bytes().to_vec(),
        (O::WebpInputFormat | O::CompressionReinterpretDatatype, Value::U8(v)) => vec![*v],
        (O::WebpLossless, Value::Bool(v)) => vec![u8::from(*v)],
        (option, value) => {
            return Err(Error::TypeMismatch {
                operation: format!("set filter option {option:?}"),
                expected: option_kind(option),
                actual: value.type_name(),
            });
        }
    };
    Ok(bytes)
}

fn decode_option(option: FilterOption, raw: [u8; 8]) -> Value {
    let [b0, b1, b2, b3, ..] = raw;
    let word = [b0, b1, b2, b3];
    match option {
        FilterOption::CompressionLevel => Value::I32(i32::from_ne_bytes(word)),
        FilterOption::BitWidthMaxWindow | FilterOption::PositiveDeltaMaxWindow => {
            Value::U32(u32::from_ne_bytes(word))
        }
        FilterOption::ScaleFloatBytewidth => Value::U64(u64::from_ne_bytes(raw)),
        FilterOption::ScaleFloatFactor | FilterOption::ScaleFloatOffset => {
            Value::F64(f64::from_ne_bytes(raw))
        }
        FilterOption::WebpQuality => Value::F32(f32::from_ne_bytes(word)),
        FilterOption::WebpInputFormat | FilterOption::CompressionReinterpretDatatype => Value::U8(b0),
        FilterOption::WebpLossless => Value::Bool(b0 != 0),
    }
}

/// One stage of a filter pipeline.
#[derive(Debug, Clone)]
pub struct Filter {
    context: Context,
    handle: FilterHandle,
}

impl Filter {
    pub fn new(context: &Context, filter_type: FilterType) -> Result<Self> {
        let handle = context.capi_alloc::<FilterHandle, _>(|ctx, out| unsafe {
            sys::tiledb_filter_alloc(ctx, filter_type.to_raw(), out)
        })?;
        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_filter_t {
        self.handle.get().as_ptr()
    }

    pub fn filter_type(&self) -> Result<FilterType> {
        let mut raw = 0;
        self.context.capi_call(
            || "get filter type".into(),
            |ctx| unsafe { sys::tiledb_filter_get_type(ctx, self.raw(), &mut raw) },
        )?;
        FilterType::from_raw(raw)
    }

    /// Set a filter option. A value of the wrong kind for `option` is
    /// rejected before anything reaches the engine.
    pub fn set_option(&self, option: FilterOption, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let bytes = encode_option(option, &value)?;
        self.context.capi_call(
            || format!("set filter option {option:?} to {value}"),
            |ctx| unsafe {
                sys::tiledb_filter_set_option(ctx, self.raw(), option.to_raw(), bytes.as_ptr().cast())
            },
        )
    }

    pub fn option(&self, option: FilterOption) -> Result<Value> {
        let mut raw = [0u8; 8];
        self.context.capi_call(
            || format!("get filter option {option:?}"),
            |ctx| unsafe {
                sys::tiledb_filter_get_option(ctx, self.raw(), option.to_raw(), raw.as_mut_ptr().cast())
            },
        )?;
        Ok(decode_option(option, raw))
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

/// Ordered list of filters applied to attribute data.
#[derive(Debug, Clone)]
pub struct FilterList {
    context: Context,
    handle: FilterListHandle,
}

impl FilterList {
    pub fn new(context: &Context) -> Result<Self> {
        let handle = context
            .capi_alloc::<FilterListHandle, _>(|ctx, out| unsafe { sys::tiledb_filter_list_alloc(ctx, out) })?;
        Ok(Self::from_handle(context, handle))
    }

    pub(crate) fn from_handle(context: &Context, handle: FilterListHandle) -> Self {
        Self {
            context: context.clone(),
            handle,
        }
    }

    pub(crate) fn raw(&self) -> *mut sys::tiledb_filter_list_t {
        self.handle.get().as_ptr()
    }

    /// Append a copy of `filter`; later changes to `filter` do not affect the list.
    pub fn add_filter(&self, filter: &Filter) -> Result<()> {
        self.context.capi_call(
            || "add filter to filter list".into(),
            |ctx| unsafe { sys::tiledb_filter_list_add_filter(ctx, self.raw(), filter.raw()) },
        )
    }

    pub fn num_filters(&self) -> Result<u32> {
        let mut count = 0;
        self.context.capi_call(
            || "get number of filters".into(),
            |ctx| unsafe { sys::tiledb_filter_list_get_nfilters(ctx, self.raw(), &mut count) },
        )?;
        Ok(count)
    }

    pub fn filter(&self, index: u32) -> Result<Filter> {
        let handle = self.context.capi_handle::<FilterHandle, _>(
            || format!("get filter at index {index}"),
            |ctx, out| unsafe { sys::tiledb_filter_list_get_filter_from_index(ctx, self.raw(), index, out) },
        )?;
        Ok(Filter {
            context: self.context.clone(),
            handle,
        })
    }

    pub fn set_max_chunk_size(&self, size: u32) -> Result<()> {
        self.context.capi_call(
            || format!("set max chunk size to {size}"),
            |ctx| unsafe { sys::tiledb_filter_list_set_max_chunk_size(ctx, self.raw(), size) },
        )
    }

    pub fn max_chunk_size(&self) -> Result<u32> {
        let mut size = 0;
        self.context.capi_call(
            || "get max chunk size".into(),
            |ctx| unsafe { sys::tiledb_filter_list_get_max_chunk_size(ctx, self.raw(), &mut size) },
        )?;
        Ok(size)
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new().unwrap()
    }

    #[test]
    fn test_compression_level_round_trip() {
        let ctx = ctx();
        let filter = Filter::new(&ctx, FilterType::Zstd).unwrap();
        assert_eq!(filter.filter_type().unwrap(), FilterType::Zstd);
        assert_eq!(filter.option(FilterOption::CompressionLevel).unwrap(), Value::I32(-1));
        filter.set_option(FilterOption::CompressionLevel, 5i32).unwrap();
        assert_eq!(filter.option(FilterOption::CompressionLevel).unwrap(), Value::I32(5));
    }

    #[test]
    fn test_wrong_value_kind_is_type_mismatch() {
        let ctx = ctx();
        let filter = Filter::new(&ctx, FilterType::Gzip).unwrap();
        let err = filter.set_option(FilterOption::CompressionLevel, 5.0f64).unwrap_err();
        match err {
            Error::TypeMismatch { expected, actual, .. } => {
                assert_eq!(expected, "i32");
                assert_eq!(actual, "f64");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Nothing reached the engine, so there is no native error recorded.
        assert!(ctx.last_error().is_none());
    }

    #[test]
    fn test_engine_rejects_out_of_range_level() {
        let ctx = ctx();
        let filter = Filter::new(&ctx, FilterType::Gzip).unwrap();
        let err = filter.set_option(FilterOption::CompressionLevel, 42i32).unwrap_err();
        assert!(err.native_message().unwrap().contains("42"));
    }

    #[test]
    fn test_scale_float_and_webp_options() {
        let ctx = ctx();
        let scale = Filter::new(&ctx, FilterType::ScaleFloat).unwrap();
        scale.set_option(FilterOption::ScaleFloatFactor, 0.5f64).unwrap();
        scale.set_option(FilterOption::ScaleFloatBytewidth, 4u64).unwrap();
        assert_eq!(scale.option(FilterOption::ScaleFloatFactor).unwrap(), Value::F64(0.5));
        assert_eq!(scale.option(FilterOption::ScaleFloatBytewidth).unwrap(), Value::U64(4));

        let webp = Filter::new(&ctx, FilterType::Webp).unwrap();
        webp.set_option(FilterOption::WebpLossless, true).unwrap();
        webp.set_option(FilterOption::WebpQuality, 80.0f32).unwrap();
        assert_eq!(webp.option(FilterOption::WebpLossless).unwrap(), Value::Bool(true));
        assert_eq!(webp.option(FilterOption::WebpQuality).unwrap(), Value::F32(80.0));
    }

    #[test]
    fn test_filter_list() {
        let ctx = ctx();
        let list = FilterList::new(&ctx).unwrap();
        let gzip = Filter::new(&ctx, FilterType::Gzip).unwrap();
        gzip.set_option(FilterOption::CompressionLevel, 9i32).unwrap();
        list.add_filter(&gzip).unwrap();
        list.add_filter(&Filter::new(&ctx, FilterType::ChecksumMd5).unwrap()).unwrap();
        list.set_max_chunk_size(1 << 20).unwrap();

        assert_eq!(list.num_filters().unwrap(), 2);
        assert_eq!(list.max_chunk_size().unwrap(), 1 << 20);
        let first = list.filter(0).unwrap();
        assert_eq!(first.option(FilterOption::CompressionLevel).unwrap(), Value::I32(9));
        assert_eq!(list.filter(1).unwrap().filter_type().unwrap(), FilterType::ChecksumMd5);

        let err = list.filter(7).unwrap_err();
        assert!(err.to_string().contains("index 7"));
    }
}
