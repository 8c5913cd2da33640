//! Safe Rust bindings for the TileDB C API.
//!
//! Every engine object (context, config, schema, array, query, VFS file and
//! so on) is owned by a typed handle. A handle releases its native object
//! exactly once, either through an explicit `free()` or when the last clone
//! is dropped, and any use after `free()` panics instead of touching released
//! memory.
//!
//! Queries select cells with a [`Subarray`] of ranges per dimension, may be
//! filtered by a [`QueryCondition`], and carry offsets and validity buffers
//! for var-sized and nullable attributes. Arrays can be collected into
//! [`Group`]s, and [`FragmentInfo`] reports what each write produced.
//!
//! # Lifetimes
//!
//! Objects keep alive whatever they depend on: a query holds its array and
//! context, an array holds its context, and a schema read back from an array
//! stays valid after the array is closed. Bulk cell data is passed as a
//! [`SharedBuffer`], which stays pinned for as long as the engine may write
//! into it, including across [`Query::submit_async`].
//!
//! # Threading
//!
//! All wrapper types are `Send + Sync`. Calls made through one [`Context`]
//! are serialized with the read of its last-error slot, so the message
//! attached to an [`Error::Operation`] always belongs to the call that
//! failed.
//!
//! # Feature Flags
//!
//! - `native` (default): link against the system `libtiledb`. Set
//!   `TILEDB_LIB_DIR` when the library is not on the linker search path.
//! - `sim`: route every call to an in-process engine with the same C
//!   signatures instead, so nothing is linked. It takes precedence over
//!   `native`, and the crate's own unit tests always run against it.

#![allow(clippy::missing_safety_doc)]

pub mod sys;

pub mod error;
pub mod handle;
pub mod liveness;
pub mod types;
mod util;
pub mod value;

pub mod buffer;
pub mod config;
pub mod context;
pub mod filter;

pub mod dimension_label;
pub mod enumeration;
pub mod schema;
pub mod schema_evolution;

pub mod array;
pub mod consolidation;
pub mod fragment_info;
pub mod group;
pub mod query;
pub mod query_condition;
pub mod subarray;

pub mod stats;
pub mod vfs;

pub use array::Array;
pub use buffer::Buffer;
pub use config::{Config, ConfigIter};
pub use consolidation::{ConsolidationPlan, PlanDump, PlanNode};
pub use context::Context;
pub use dimension_label::DimensionLabel;
pub use enumeration::Enumeration;
pub use error::{Error, ErrorCode, Result};
pub use filter::{Filter, FilterList};
pub use fragment_info::FragmentInfo;
pub use group::{Group, GroupMember, object_type};
pub use handle::CapiHandle;
pub use liveness::SharedBuffer;
pub use query::{AsyncSubmission, Query};
pub use query_condition::QueryCondition;
pub use schema::{ArraySchema, Attribute, Dimension, Domain, VAR_NUM};
pub use schema_evolution::ArraySchemaEvolution;
pub use stats::StatsSnapshot;
pub use subarray::Subarray;
pub use types::{
    ArrayType, CellType, CombinationOp, ConditionOp, DataOrder, Datatype, Filesystem, FilterOption,
    FilterType, Layout, ObjectType, QueryStatus, QueryType, VfsMode,
};
pub use value::Value;
pub use vfs::{Vfs, VfsFile};

/// Version of the engine this crate is talking to, as `(major, minor, patch)`.
pub fn version() -> (i32, i32, i32) {
    let (mut major, mut minor, mut rev) = (0, 0, 0);
    unsafe { sys::tiledb_version(&mut major, &mut minor, &mut rev) };
    (major, minor, rev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::tests::{dense_array, unique_uri};
    use crate::query::tests::rows;
    use crate::schema::tests::dense_schema;
    use std::sync::Once;
    use std::thread;
    use std::time::Duration;

    fn init_tracing() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    /// Write `a` to rows starting at `first`.
    fn write_rows(array: &Array, first: i64, a: Vec<i32>) {
        let b = vec![0.0f64; a.len()];
        let query = Query::new(array, QueryType::Write).unwrap();
        query.set_subarray(&rows(array, first, first + a.len() as i64 - 1)).unwrap();
        query.set_data_buffer("a", SharedBuffer::new(a)).unwrap();
        query.set_data_buffer("b", SharedBuffer::new(b)).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        query.finalize().unwrap();
    }

    fn read_a(array: &Array, first: i64, last: i64) -> Vec<i32> {
        let query = Query::new(array, QueryType::Read).unwrap();
        query.set_subarray(&rows(array, first, last)).unwrap();
        let a = SharedBuffer::<i32>::zeroed(64);
        query.set_data_buffer("a", a.clone()).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        a.to_vec(query.result_len("a").unwrap())
    }

    #[test]
    fn test_version() {
        let (major, _, _) = version();
        assert!(major >= 2);
    }

    #[test]
    fn test_package_metadata() {
        assert_eq!(env!("CARGO_PKG_NAME"), "tiledb-binding");
        assert_eq!(env!("CARGO_PKG_REPOSITORY"), "");
    }

    #[test]
    fn test_buffers_outlive_dropped_clones_during_submit() {
        init_tracing();
        let config = Config::new().unwrap();
        config.set("sim.submit_delay_ms", "200").unwrap();
        let ctx = Context::with_config(&config).unwrap();
        let array = dense_array(&ctx, "scenario-sync");
        array.open(QueryType::Write).unwrap();

        let a = SharedBuffer::new(vec![7, 8, 9]);
        let b = SharedBuffer::new(vec![0.25, 0.5, 0.75]);
        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_subarray(&rows(&array, 1, 3)).unwrap();
        query.set_data_buffer("a", a.clone()).unwrap();
        query.set_data_buffer("b", b.clone()).unwrap();

        let dropper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(a);
            drop(b);
        });
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        dropper.join().unwrap();
        query.free();
        array.close().unwrap();

        array.open(QueryType::Read).unwrap();
        assert_eq!(read_a(&array, 1, 3), vec![7, 8, 9]);
    }

    #[test]
    fn test_async_write_survives_dropped_query_and_buffers() {
        init_tracing();
        let config = Config::new().unwrap();
        config.set("sim.submit_delay_ms", "100").unwrap();
        let ctx = Context::with_config(&config).unwrap();
        let array = dense_array(&ctx, "scenario-async");
        array.open(QueryType::Write).unwrap();

        let query = Query::new(&array, QueryType::Write).unwrap();
        query.set_subarray(&rows(&array, 1, 2)).unwrap();
        query.set_data_buffer("a", SharedBuffer::new(vec![4, 5])).unwrap();
        query.set_data_buffer("b", SharedBuffer::new(vec![1.0, 2.0])).unwrap();
        let pending = query.submit_async().unwrap();
        drop(query);

        assert_eq!(pending.wait().unwrap(), QueryStatus::Completed);
        array.close().unwrap();
        array.open(QueryType::Read).unwrap();
        assert_eq!(read_a(&array, 1, 2), vec![4, 5]);
    }

    #[test]
    fn test_evolved_array_reads_old_cells() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "scenario-evolve");
        array.open(QueryType::Write).unwrap();
        write_rows(&array, 1, vec![1, 2, 3]);
        array.close().unwrap();

        let evolution = ArraySchemaEvolution::new(&ctx).unwrap();
        evolution
            .add_attribute(&Attribute::new(&ctx, "c", Datatype::Int64).unwrap())
            .unwrap();
        evolution.drop_attribute("b").unwrap();
        Array::evolve(&ctx, array.uri(), &evolution).unwrap();

        array.open(QueryType::Read).unwrap();
        let schema = array.schema().unwrap();
        assert_eq!(schema.attribute_num().unwrap(), 2);
        assert!(schema.attribute("b").is_err());
        assert_eq!(schema.attribute("c").unwrap().datatype().unwrap(), Datatype::Int64);

        let query = Query::new(&array, QueryType::Read).unwrap();
        query.set_subarray(&rows(&array, 1, 3)).unwrap();
        let a = SharedBuffer::<i32>::zeroed(8);
        let c = SharedBuffer::<i64>::zeroed(8);
        query.set_data_buffer("a", a.clone()).unwrap();
        query.set_data_buffer("c", c.clone()).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        assert_eq!(a.to_vec(query.result_len("a").unwrap()), vec![1, 2, 3]);
        assert_eq!(c.to_vec(query.result_len("c").unwrap()), vec![0, 0, 0]);
    }

    #[test]
    fn test_consolidation_plan_matches_dump() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "scenario-plan");
        for (first, chunk) in [(1, vec![1, 2]), (3, vec![3, 4]), (5, vec![5, 6])] {
            array.open(QueryType::Write).unwrap();
            write_rows(&array, first, chunk);
            array.close().unwrap();
        }

        array.open(QueryType::Read).unwrap();
        let plan = array.consolidation_plan(1 << 20).unwrap();
        assert_eq!(plan.num_nodes().unwrap(), 1);
        assert_eq!(plan.num_fragments(0).unwrap(), 3);

        let listed: Vec<String> = (0..3).map(|i| plan.fragment_uri(0, i).unwrap()).collect();
        assert!(listed.iter().all(|uri| uri.starts_with(array.uri())));
        let dump = plan.dump().unwrap();
        assert_eq!(dump.nodes.len(), 1);
        assert_eq!(dump.nodes[0].uris, listed);

        let err = plan.fragment_uri(0, 3).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Err));
    }

    #[test]
    fn test_open_at_limits_visible_fragments() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "scenario-time-travel");
        array.open_at(QueryType::Write, 0, 5).unwrap();
        write_rows(&array, 1, vec![10]);
        array.close().unwrap();
        array.open_at(QueryType::Write, 0, 10).unwrap();
        write_rows(&array, 1, vec![20]);
        array.close().unwrap();

        array.open_at(QueryType::Read, 0, 7).unwrap();
        assert_eq!(read_a(&array, 1, 2), vec![10, 0]);
        array.close().unwrap();

        array.open(QueryType::Read).unwrap();
        assert_eq!(read_a(&array, 1, 2), vec![20, 0]);
    }

    #[test]
    fn test_schema_with_enumeration() {
        let ctx = Context::new().unwrap();
        let schema = dense_schema(&ctx);
        let colors = Enumeration::from_strings(&ctx, "colors", &["red", "green"], false).unwrap();
        schema.add_enumeration(&colors).unwrap();
        let uri = unique_uri("scenario-enumeration");
        Array::create(&ctx, &uri, &schema).unwrap();

        let evolution = ArraySchemaEvolution::new(&ctx).unwrap();
        evolution.add_enumeration(&colors).unwrap();
        let err = Array::evolve(&ctx, &uri, &evolution).unwrap_err();
        assert!(err.native_message().unwrap().contains("colors"));

        let evolution = ArraySchemaEvolution::new(&ctx).unwrap();
        evolution.drop_enumeration("colors").unwrap();
        Array::evolve(&ctx, &uri, &evolution).unwrap();
    }

    #[test]
    fn test_metadata_visible_from_another_context() {
        let writer_ctx = Context::new().unwrap();
        let reader_ctx = Context::new().unwrap();
        let array = dense_array(&writer_ctx, "scenario-metadata");
        let early = Array::new(&reader_ctx, array.uri()).unwrap();
        early.open(QueryType::Read).unwrap();

        array.open(QueryType::Write).unwrap();
        array.put_metadata("scale", &[0.5f64, 2.0]).unwrap();
        array.put_metadata_str("units", "metres").unwrap();
        array.close().unwrap();

        let reader = Array::new(&reader_ctx, array.uri()).unwrap();
        reader.open(QueryType::Read).unwrap();
        assert_eq!(reader.metadata_num().unwrap(), 2);
        assert_eq!(reader.get_metadata::<f64>("scale").unwrap(), Some(vec![0.5, 2.0]));
        assert_eq!(reader.get_metadata_str("units").unwrap().as_deref(), Some("metres"));
        assert_eq!(early.get_metadata::<f64>("scale").unwrap(), None);
    }

    #[test]
    fn test_group_members_report_their_fragments() {
        init_tracing();
        let ctx = Context::new().unwrap();
        let root = unique_uri("scenario-group");
        Group::create(&ctx, &root).unwrap();
        let group = Group::new(&ctx, &root).unwrap();
        let left = dense_array(&ctx, "scenario-group-left");
        let right = dense_array(&ctx, "scenario-group-right");
        for (array, writes) in [(&left, 1), (&right, 2)] {
            for first in 0..writes {
                array.open(QueryType::Write).unwrap();
                write_rows(array, 1 + first * 10, vec![first as i32; 3]);
                array.close().unwrap();
            }
        }

        group.open(QueryType::Write).unwrap();
        group.add_member(left.uri(), false, Some("left")).unwrap();
        group.add_member(right.uri(), false, Some("right")).unwrap();
        group.put_metadata_str("purpose", "calibration").unwrap();
        group.close().unwrap();

        group.open(QueryType::Read).unwrap();
        let mut fragments = Vec::new();
        for member in group.members().unwrap() {
            assert_eq!(member.object_type, ObjectType::Array);
            assert_eq!(object_type(&ctx, &member.uri).unwrap(), ObjectType::Array);
            let info = FragmentInfo::new(&ctx, &member.uri).unwrap();
            info.load().unwrap();
            fragments.push((member.name.unwrap(), info.fragment_num().unwrap()));
        }
        assert_eq!(fragments, vec![("left".to_string(), 1), ("right".to_string(), 2)]);
        assert_eq!(group.get_metadata_str("purpose").unwrap().as_deref(), Some("calibration"));
    }

    #[test]
    fn test_filtered_read_of_selected_rows() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "scenario-filtered");
        array.open(QueryType::Write).unwrap();
        write_rows(&array, 1, (1..=10).collect());
        array.close().unwrap();

        array.open(QueryType::Read).unwrap();
        let subarray = Subarray::new(&array).unwrap();
        subarray.add_range(0, 2i64..=3).unwrap();
        subarray.add_range(0, 8i64..=9).unwrap();
        let three_or_large = QueryCondition::new(&ctx, "a", 3i32, ConditionOp::Eq)
            .unwrap()
            .or(&QueryCondition::new(&ctx, "a", 9i32, ConditionOp::Ge).unwrap())
            .unwrap();
        let query = Query::new(&array, QueryType::Read).unwrap();
        query.set_subarray(&subarray).unwrap();
        query.set_condition(&three_or_large).unwrap();
        let a = SharedBuffer::<i32>::zeroed(8);
        query.set_data_buffer("a", a.clone()).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
        assert_eq!(a.to_vec(query.result_len("a").unwrap()), vec![0, 3, 0, 9]);
    }

    #[test]
    fn test_schema_survives_closed_array() {
        let ctx = Context::new().unwrap();
        let array = dense_array(&ctx, "scenario-schema");
        array.open(QueryType::Read).unwrap();
        let schema = array.schema().unwrap();
        array.close().unwrap();
        drop(array);
        assert_eq!(schema.array_type().unwrap(), ArrayType::Dense);
        assert_eq!(schema.attribute("a").unwrap().name().unwrap(), "a");
    }
}
