//! Declarations for the C API of the linked native library.

use super::*;

macro_rules! opaque {
    ($($name:ident),* $(,)?) => {
        $(
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }
        )*
    };
}

opaque!(
    tiledb_error_t,
    tiledb_string_t,
    tiledb_config_t,
    tiledb_config_iter_t,
    tiledb_ctx_t,
    tiledb_filter_t,
    tiledb_filter_list_t,
    tiledb_buffer_t,
    tiledb_dimension_t,
    tiledb_domain_t,
    tiledb_attribute_t,
    tiledb_array_schema_t,
    tiledb_dimension_label_t,
    tiledb_enumeration_t,
    tiledb_array_schema_evolution_t,
    tiledb_array_t,
    tiledb_consolidation_plan_t,
    tiledb_query_t,
    tiledb_subarray_t,
    tiledb_query_condition_t,
    tiledb_fragment_info_t,
    tiledb_group_t,
    tiledb_vfs_t,
    tiledb_vfs_fh_t,
);

#[link(name = "tiledb")]
unsafe extern "C" {
    pub fn tiledb_version(major: *mut i32, minor: *mut i32, rev: *mut i32);

    pub fn tiledb_error_message(err: *mut tiledb_error_t, errmsg: *mut *const c_char) -> capi_return_t;
    pub fn tiledb_error_free(err: *mut *mut tiledb_error_t);

    pub fn tiledb_string_view(
        s: *mut tiledb_string_t,
        data: *mut *const c_char,
        length: *mut usize,
    ) -> capi_return_t;
    pub fn tiledb_string_free(s: *mut *mut tiledb_string_t) -> capi_return_t;

    pub fn tiledb_config_alloc(config: *mut *mut tiledb_config_t, error: *mut *mut tiledb_error_t) -> capi_return_t;
    pub fn tiledb_config_free(config: *mut *mut tiledb_config_t);
    pub fn tiledb_config_set(
        config: *mut tiledb_config_t,
        param: *const c_char,
        value: *const c_char,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;
    pub fn tiledb_config_get(
        config: *mut tiledb_config_t,
        param: *const c_char,
        value: *mut *const c_char,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;
    pub fn tiledb_config_unset(
        config: *mut tiledb_config_t,
        param: *const c_char,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;
    pub fn tiledb_config_load_from_file(
        config: *mut tiledb_config_t,
        filename: *const c_char,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;
    pub fn tiledb_config_save_to_file(
        config: *mut tiledb_config_t,
        filename: *const c_char,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;
    pub fn tiledb_config_compare(
        lhs: *mut tiledb_config_t,
        rhs: *mut tiledb_config_t,
        equal: *mut u8,
    ) -> capi_return_t;
    pub fn tiledb_config_iter_alloc(
        config: *mut tiledb_config_t,
        prefix: *const c_char,
        config_iter: *mut *mut tiledb_config_iter_t,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;
    pub fn tiledb_config_iter_free(config_iter: *mut *mut tiledb_config_iter_t);
    pub fn tiledb_config_iter_here(
        config_iter: *mut tiledb_config_iter_t,
        param: *mut *const c_char,
        value: *mut *const c_char,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;
    pub fn tiledb_config_iter_next(
        config_iter: *mut tiledb_config_iter_t,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;
    pub fn tiledb_config_iter_done(
        config_iter: *mut tiledb_config_iter_t,
        done: *mut i32,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;

    pub fn tiledb_ctx_alloc_with_error(
        config: *mut tiledb_config_t,
        ctx: *mut *mut tiledb_ctx_t,
        error: *mut *mut tiledb_error_t,
    ) -> capi_return_t;
    pub fn tiledb_ctx_free(ctx: *mut *mut tiledb_ctx_t);
    pub fn tiledb_ctx_get_last_error(ctx: *mut tiledb_ctx_t, err: *mut *mut tiledb_error_t) -> capi_return_t;
    pub fn tiledb_ctx_get_config(ctx: *mut tiledb_ctx_t, config: *mut *mut tiledb_config_t) -> capi_return_t;
    pub fn tiledb_ctx_set_tag(ctx: *mut tiledb_ctx_t, key: *const c_char, value: *const c_char) -> capi_return_t;
    pub fn tiledb_ctx_is_supported_fs(
        ctx: *mut tiledb_ctx_t,
        fs: tiledb_filesystem_t,
        is_supported: *mut i32,
    ) -> capi_return_t;

    pub fn tiledb_filter_alloc(
        ctx: *mut tiledb_ctx_t,
        filter_type: tiledb_filter_type_t,
        filter: *mut *mut tiledb_filter_t,
    ) -> capi_return_t;
    pub fn tiledb_filter_free(filter: *mut *mut tiledb_filter_t);
    pub fn tiledb_filter_get_type(
        ctx: *mut tiledb_ctx_t,
        filter: *mut tiledb_filter_t,
        filter_type: *mut tiledb_filter_type_t,
    ) -> capi_return_t;
    pub fn tiledb_filter_set_option(
        ctx: *mut tiledb_ctx_t,
        filter: *mut tiledb_filter_t,
        option: tiledb_filter_option_t,
        value: *const c_void,
    ) -> capi_return_t;
    pub fn tiledb_filter_get_option(
        ctx: *mut tiledb_ctx_t,
        filter: *mut tiledb_filter_t,
        option: tiledb_filter_option_t,
        value: *mut c_void,
    ) -> capi_return_t;

    pub fn tiledb_filter_list_alloc(ctx: *mut tiledb_ctx_t, filter_list: *mut *mut tiledb_filter_list_t) -> capi_return_t;
    pub fn tiledb_filter_list_free(filter_list: *mut *mut tiledb_filter_list_t);
    pub fn tiledb_filter_list_add_filter(
        ctx: *mut tiledb_ctx_t,
        filter_list: *mut tiledb_filter_list_t,
        filter: *mut tiledb_filter_t,
    ) -> capi_return_t;
    pub fn tiledb_filter_list_get_nfilters(
        ctx: *mut tiledb_ctx_t,
        filter_list: *mut tiledb_filter_list_t,
        num_filters: *mut u32,
    ) -> capi_return_t;
    pub fn tiledb_filter_list_get_filter_from_index(
        ctx: *mut tiledb_ctx_t,
        filter_list: *mut tiledb_filter_list_t,
        index: u32,
        filter: *mut *mut tiledb_filter_t,
    ) -> capi_return_t;
    pub fn tiledb_filter_list_set_max_chunk_size(
        ctx: *mut tiledb_ctx_t,
        filter_list: *mut tiledb_filter_list_t,
        max_chunk_size: u32,
    ) -> capi_return_t;
    pub fn tiledb_filter_list_get_max_chunk_size(
        ctx: *mut tiledb_ctx_t,
        filter_list: *mut tiledb_filter_list_t,
        max_chunk_size: *mut u32,
    ) -> capi_return_t;

    pub fn tiledb_buffer_alloc(ctx: *mut tiledb_ctx_t, buffer: *mut *mut tiledb_buffer_t) -> capi_return_t;
    pub fn tiledb_buffer_free(buffer: *mut *mut tiledb_buffer_t);
    pub fn tiledb_buffer_set_type(
        ctx: *mut tiledb_ctx_t,
        buffer: *mut tiledb_buffer_t,
        datatype: tiledb_datatype_t,
    ) -> capi_return_t;
    pub fn tiledb_buffer_get_type(
        ctx: *mut tiledb_ctx_t,
        buffer: *mut tiledb_buffer_t,
        datatype: *mut tiledb_datatype_t,
    ) -> capi_return_t;
    pub fn tiledb_buffer_get_data(
        ctx: *mut tiledb_ctx_t,
        buffer: *mut tiledb_buffer_t,
        data: *mut *mut c_void,
        num_bytes: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_buffer_set_data(
        ctx: *mut tiledb_ctx_t,
        buffer: *mut tiledb_buffer_t,
        data: *mut c_void,
        size: u64,
    ) -> capi_return_t;

    pub fn tiledb_dimension_alloc(
        ctx: *mut tiledb_ctx_t,
        name: *const c_char,
        datatype: tiledb_datatype_t,
        dim_domain: *const c_void,
        tile_extent: *const c_void,
        dim: *mut *mut tiledb_dimension_t,
    ) -> capi_return_t;
    pub fn tiledb_dimension_free(dim: *mut *mut tiledb_dimension_t);
    pub fn tiledb_dimension_get_name(
        ctx: *mut tiledb_ctx_t,
        dim: *mut tiledb_dimension_t,
        name: *mut *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_dimension_get_type(
        ctx: *mut tiledb_ctx_t,
        dim: *mut tiledb_dimension_t,
        datatype: *mut tiledb_datatype_t,
    ) -> capi_return_t;
    pub fn tiledb_dimension_get_domain(
        ctx: *mut tiledb_ctx_t,
        dim: *mut tiledb_dimension_t,
        domain: *mut *const c_void,
    ) -> capi_return_t;

    pub fn tiledb_domain_alloc(ctx: *mut tiledb_ctx_t, domain: *mut *mut tiledb_domain_t) -> capi_return_t;
    pub fn tiledb_domain_free(domain: *mut *mut tiledb_domain_t);
    pub fn tiledb_domain_add_dimension(
        ctx: *mut tiledb_ctx_t,
        domain: *mut tiledb_domain_t,
        dim: *mut tiledb_dimension_t,
    ) -> capi_return_t;
    pub fn tiledb_domain_get_ndim(ctx: *mut tiledb_ctx_t, domain: *mut tiledb_domain_t, ndim: *mut u32) -> capi_return_t;
    pub fn tiledb_domain_get_dimension_from_index(
        ctx: *mut tiledb_ctx_t,
        domain: *mut tiledb_domain_t,
        index: u32,
        dim: *mut *mut tiledb_dimension_t,
    ) -> capi_return_t;
    pub fn tiledb_domain_get_dimension_from_name(
        ctx: *mut tiledb_ctx_t,
        domain: *mut tiledb_domain_t,
        name: *const c_char,
        dim: *mut *mut tiledb_dimension_t,
    ) -> capi_return_t;

    pub fn tiledb_attribute_alloc(
        ctx: *mut tiledb_ctx_t,
        name: *const c_char,
        datatype: tiledb_datatype_t,
        attr: *mut *mut tiledb_attribute_t,
    ) -> capi_return_t;
    pub fn tiledb_attribute_free(attr: *mut *mut tiledb_attribute_t);
    pub fn tiledb_attribute_get_name(
        ctx: *mut tiledb_ctx_t,
        attr: *mut tiledb_attribute_t,
        name: *mut *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_attribute_get_type(
        ctx: *mut tiledb_ctx_t,
        attr: *mut tiledb_attribute_t,
        datatype: *mut tiledb_datatype_t,
    ) -> capi_return_t;
    pub fn tiledb_attribute_set_filter_list(
        ctx: *mut tiledb_ctx_t,
        attr: *mut tiledb_attribute_t,
        filter_list: *mut tiledb_filter_list_t,
    ) -> capi_return_t;
    pub fn tiledb_attribute_get_filter_list(
        ctx: *mut tiledb_ctx_t,
        attr: *mut tiledb_attribute_t,
        filter_list: *mut *mut tiledb_filter_list_t,
    ) -> capi_return_t;
    pub fn tiledb_attribute_set_cell_val_num(
        ctx: *mut tiledb_ctx_t,
        attr: *mut tiledb_attribute_t,
        cell_val_num: u32,
    ) -> capi_return_t;
    pub fn tiledb_attribute_get_cell_val_num(
        ctx: *mut tiledb_ctx_t,
        attr: *mut tiledb_attribute_t,
        cell_val_num: *mut u32,
    ) -> capi_return_t;
    pub fn tiledb_attribute_set_nullable(
        ctx: *mut tiledb_ctx_t,
        attr: *mut tiledb_attribute_t,
        nullable: u8,
    ) -> capi_return_t;
    pub fn tiledb_attribute_get_nullable(
        ctx: *mut tiledb_ctx_t,
        attr: *mut tiledb_attribute_t,
        nullable: *mut u8,
    ) -> capi_return_t;

    pub fn tiledb_array_schema_alloc(
        ctx: *mut tiledb_ctx_t,
        array_type: tiledb_array_type_t,
        array_schema: *mut *mut tiledb_array_schema_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_free(array_schema: *mut *mut tiledb_array_schema_t);
    pub fn tiledb_array_schema_get_array_type(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        array_type: *mut tiledb_array_type_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_set_domain(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        domain: *mut tiledb_domain_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_add_attribute(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        attr: *mut tiledb_attribute_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_get_domain(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        domain: *mut *mut tiledb_domain_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_get_attribute_num(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        attribute_num: *mut u32,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_get_attribute_from_name(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        name: *const c_char,
        attr: *mut *mut tiledb_attribute_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_check(ctx: *mut tiledb_ctx_t, array_schema: *mut tiledb_array_schema_t) -> capi_return_t;
    pub fn tiledb_array_schema_add_enumeration(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        enumeration: *mut tiledb_enumeration_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_add_dimension_label(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        dim_index: u32,
        name: *const c_char,
        label_order: tiledb_data_order_t,
        label_type: tiledb_datatype_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_has_dimension_label(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        name: *const c_char,
        has_dim_label: *mut i32,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_get_dimension_label_num(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        dim_label_num: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_get_dimension_label_from_name(
        ctx: *mut tiledb_ctx_t,
        array_schema: *mut tiledb_array_schema_t,
        label_name: *const c_char,
        dim_label: *mut *mut tiledb_dimension_label_t,
    ) -> capi_return_t;

    pub fn tiledb_dimension_label_free(dim_label: *mut *mut tiledb_dimension_label_t);
    pub fn tiledb_dimension_label_get_name(
        ctx: *mut tiledb_ctx_t,
        dim_label: *mut tiledb_dimension_label_t,
        name: *mut *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_dimension_label_get_dimension_index(
        ctx: *mut tiledb_ctx_t,
        dim_label: *mut tiledb_dimension_label_t,
        dim_index: *mut u32,
    ) -> capi_return_t;
    pub fn tiledb_dimension_label_get_label_type(
        ctx: *mut tiledb_ctx_t,
        dim_label: *mut tiledb_dimension_label_t,
        label_type: *mut tiledb_datatype_t,
    ) -> capi_return_t;
    pub fn tiledb_dimension_label_get_label_order(
        ctx: *mut tiledb_ctx_t,
        dim_label: *mut tiledb_dimension_label_t,
        label_order: *mut tiledb_data_order_t,
    ) -> capi_return_t;
    pub fn tiledb_dimension_label_get_uri(
        ctx: *mut tiledb_ctx_t,
        dim_label: *mut tiledb_dimension_label_t,
        uri: *mut *const c_char,
    ) -> capi_return_t;

    pub fn tiledb_enumeration_alloc(
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
    ) -> capi_return_t;
    pub fn tiledb_enumeration_free(enumeration: *mut *mut tiledb_enumeration_t);
    pub fn tiledb_enumeration_get_name(
        ctx: *mut tiledb_ctx_t,
        enumeration: *mut tiledb_enumeration_t,
        name: *mut *mut tiledb_string_t,
    ) -> capi_return_t;
    pub fn tiledb_enumeration_get_type(
        ctx: *mut tiledb_ctx_t,
        enumeration: *mut tiledb_enumeration_t,
        datatype: *mut tiledb_datatype_t,
    ) -> capi_return_t;
    pub fn tiledb_enumeration_get_cell_val_num(
        ctx: *mut tiledb_ctx_t,
        enumeration: *mut tiledb_enumeration_t,
        cell_val_num: *mut u32,
    ) -> capi_return_t;
    pub fn tiledb_enumeration_get_ordered(
        ctx: *mut tiledb_ctx_t,
        enumeration: *mut tiledb_enumeration_t,
        ordered: *mut i32,
    ) -> capi_return_t;
    pub fn tiledb_enumeration_get_data(
        ctx: *mut tiledb_ctx_t,
        enumeration: *mut tiledb_enumeration_t,
        data: *mut *const c_void,
        data_size: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_enumeration_get_offsets(
        ctx: *mut tiledb_ctx_t,
        enumeration: *mut tiledb_enumeration_t,
        offsets: *mut *const c_void,
        offsets_size: *mut u64,
    ) -> capi_return_t;

    pub fn tiledb_array_schema_evolution_alloc(
        ctx: *mut tiledb_ctx_t,
        evolution: *mut *mut tiledb_array_schema_evolution_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_evolution_free(evolution: *mut *mut tiledb_array_schema_evolution_t);
    pub fn tiledb_array_schema_evolution_add_attribute(
        ctx: *mut tiledb_ctx_t,
        evolution: *mut tiledb_array_schema_evolution_t,
        attr: *mut tiledb_attribute_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_evolution_drop_attribute(
        ctx: *mut tiledb_ctx_t,
        evolution: *mut tiledb_array_schema_evolution_t,
        attribute_name: *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_evolution_add_enumeration(
        ctx: *mut tiledb_ctx_t,
        evolution: *mut tiledb_array_schema_evolution_t,
        enumeration: *mut tiledb_enumeration_t,
    ) -> capi_return_t;
    pub fn tiledb_array_schema_evolution_drop_enumeration(
        ctx: *mut tiledb_ctx_t,
        evolution: *mut tiledb_array_schema_evolution_t,
        enumeration_name: *const c_char,
    ) -> capi_return_t;

    pub fn tiledb_array_create(
        ctx: *mut tiledb_ctx_t,
        array_uri: *const c_char,
        array_schema: *mut tiledb_array_schema_t,
    ) -> capi_return_t;
    pub fn tiledb_array_evolve(
        ctx: *mut tiledb_ctx_t,
        array_uri: *const c_char,
        evolution: *mut tiledb_array_schema_evolution_t,
    ) -> capi_return_t;
    pub fn tiledb_array_alloc(
        ctx: *mut tiledb_ctx_t,
        array_uri: *const c_char,
        array: *mut *mut tiledb_array_t,
    ) -> capi_return_t;
    pub fn tiledb_array_free(array: *mut *mut tiledb_array_t);
    pub fn tiledb_array_open(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        query_type: tiledb_query_type_t,
    ) -> capi_return_t;
    pub fn tiledb_array_close(ctx: *mut tiledb_ctx_t, array: *mut tiledb_array_t) -> capi_return_t;
    pub fn tiledb_array_is_open(ctx: *mut tiledb_ctx_t, array: *mut tiledb_array_t, is_open: *mut i32) -> capi_return_t;
    pub fn tiledb_array_get_query_type(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        query_type: *mut tiledb_query_type_t,
    ) -> capi_return_t;
    pub fn tiledb_array_set_open_timestamp_start(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        timestamp_start: u64,
    ) -> capi_return_t;
    pub fn tiledb_array_set_open_timestamp_end(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        timestamp_end: u64,
    ) -> capi_return_t;
    pub fn tiledb_array_get_schema(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        array_schema: *mut *mut tiledb_array_schema_t,
    ) -> capi_return_t;
    pub fn tiledb_array_put_metadata(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        key: *const c_char,
        value_type: tiledb_datatype_t,
        value_num: u32,
        value: *const c_void,
    ) -> capi_return_t;
    pub fn tiledb_array_get_metadata(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        key: *const c_char,
        value_type: *mut tiledb_datatype_t,
        value_num: *mut u32,
        value: *mut *const c_void,
    ) -> capi_return_t;
    pub fn tiledb_array_delete_metadata(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        key: *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_array_get_metadata_num(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        num: *mut u64,
    ) -> capi_return_t;

    pub fn tiledb_consolidation_plan_create_with_mbr(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        fragment_size: u64,
        consolidation_plan: *mut *mut tiledb_consolidation_plan_t,
    ) -> capi_return_t;
    pub fn tiledb_consolidation_plan_free(consolidation_plan: *mut *mut tiledb_consolidation_plan_t);
    pub fn tiledb_consolidation_plan_get_num_nodes(
        ctx: *mut tiledb_ctx_t,
        consolidation_plan: *mut tiledb_consolidation_plan_t,
        num_nodes: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_consolidation_plan_get_num_fragments(
        ctx: *mut tiledb_ctx_t,
        consolidation_plan: *mut tiledb_consolidation_plan_t,
        node_index: u64,
        num_fragments: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_consolidation_plan_get_fragment_uri(
        ctx: *mut tiledb_ctx_t,
        consolidation_plan: *mut tiledb_consolidation_plan_t,
        node_index: u64,
        fragment_index: u64,
        uri: *mut *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_consolidation_plan_dump_json_str(
        ctx: *mut tiledb_ctx_t,
        consolidation_plan: *const tiledb_consolidation_plan_t,
        out: *mut *mut c_char,
    ) -> capi_return_t;
    pub fn tiledb_consolidation_plan_free_json_str(out: *mut *mut c_char) -> capi_return_t;

    pub fn tiledb_query_alloc(
        ctx: *mut tiledb_ctx_t,
        array: *mut tiledb_array_t,
        query_type: tiledb_query_type_t,
        query: *mut *mut tiledb_query_t,
    ) -> capi_return_t;
    pub fn tiledb_query_free(query: *mut *mut tiledb_query_t);
    pub fn tiledb_query_set_layout(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        layout: tiledb_layout_t,
    ) -> capi_return_t;
    pub fn tiledb_query_get_layout(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        layout: *mut tiledb_layout_t,
    ) -> capi_return_t;
    pub fn tiledb_query_set_data_buffer(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        name: *const c_char,
        buffer: *mut c_void,
        buffer_size: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_query_submit(ctx: *mut tiledb_ctx_t, query: *mut tiledb_query_t) -> capi_return_t;
    pub fn tiledb_query_submit_async(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        callback: tiledb_completion_cb,
        callback_data: *mut c_void,
    ) -> capi_return_t;
    pub fn tiledb_query_get_status(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        status: *mut tiledb_query_status_t,
    ) -> capi_return_t;
    pub fn tiledb_query_has_results(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        has_results: *mut i32,
    ) -> capi_return_t;
    pub fn tiledb_query_finalize(ctx: *mut tiledb_ctx_t, query: *mut tiledb_query_t) -> capi_return_t;
    pub fn tiledb_query_set_offsets_buffer(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        name: *const c_char,
        buffer: *mut u64,
        buffer_size: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_query_set_validity_buffer(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        name: *const c_char,
        buffer: *mut u8,
        buffer_size: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_query_set_subarray_t(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        subarray: *const tiledb_subarray_t,
    ) -> capi_return_t;
    pub fn tiledb_query_set_condition(
        ctx: *mut tiledb_ctx_t,
        query: *mut tiledb_query_t,
        cond: *const tiledb_query_condition_t,
    ) -> capi_return_t;

    pub fn tiledb_subarray_alloc(
        ctx: *mut tiledb_ctx_t,
        array: *const tiledb_array_t,
        subarray: *mut *mut tiledb_subarray_t,
    ) -> capi_return_t;
    pub fn tiledb_subarray_free(subarray: *mut *mut tiledb_subarray_t);
    pub fn tiledb_subarray_set_coalesce_ranges(
        ctx: *mut tiledb_ctx_t,
        subarray: *mut tiledb_subarray_t,
        coalesce_ranges: i32,
    ) -> capi_return_t;
    pub fn tiledb_subarray_add_range(
        ctx: *mut tiledb_ctx_t,
        subarray: *mut tiledb_subarray_t,
        dim_idx: u32,
        start: *const c_void,
        end: *const c_void,
        stride: *const c_void,
    ) -> capi_return_t;
    pub fn tiledb_subarray_add_range_by_name(
        ctx: *mut tiledb_ctx_t,
        subarray: *mut tiledb_subarray_t,
        dim_name: *const c_char,
        start: *const c_void,
        end: *const c_void,
        stride: *const c_void,
    ) -> capi_return_t;
    pub fn tiledb_subarray_get_range_num(
        ctx: *mut tiledb_ctx_t,
        subarray: *const tiledb_subarray_t,
        dim_idx: u32,
        range_num: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_subarray_get_range_num_from_name(
        ctx: *mut tiledb_ctx_t,
        subarray: *const tiledb_subarray_t,
        dim_name: *const c_char,
        range_num: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_subarray_get_range(
        ctx: *mut tiledb_ctx_t,
        subarray: *const tiledb_subarray_t,
        dim_idx: u32,
        range_idx: u64,
        start: *mut *const c_void,
        end: *mut *const c_void,
        stride: *mut *const c_void,
    ) -> capi_return_t;
    pub fn tiledb_subarray_get_range_from_name(
        ctx: *mut tiledb_ctx_t,
        subarray: *const tiledb_subarray_t,
        dim_name: *const c_char,
        range_idx: u64,
        start: *mut *const c_void,
        end: *mut *const c_void,
        stride: *mut *const c_void,
    ) -> capi_return_t;

    pub fn tiledb_query_condition_alloc(
        ctx: *mut tiledb_ctx_t,
        cond: *mut *mut tiledb_query_condition_t,
    ) -> capi_return_t;
    pub fn tiledb_query_condition_free(cond: *mut *mut tiledb_query_condition_t);
    pub fn tiledb_query_condition_init(
        ctx: *mut tiledb_ctx_t,
        cond: *mut tiledb_query_condition_t,
        attribute_name: *const c_char,
        condition_value: *const c_void,
        condition_value_size: u64,
        op: tiledb_query_condition_op_t,
    ) -> capi_return_t;
    pub fn tiledb_query_condition_combine(
        ctx: *mut tiledb_ctx_t,
        left_cond: *const tiledb_query_condition_t,
        right_cond: *const tiledb_query_condition_t,
        combination_op: tiledb_query_condition_combination_op_t,
        combined_cond: *mut *mut tiledb_query_condition_t,
    ) -> capi_return_t;
    pub fn tiledb_query_condition_negate(
        ctx: *mut tiledb_ctx_t,
        cond: *const tiledb_query_condition_t,
        negated_cond: *mut *mut tiledb_query_condition_t,
    ) -> capi_return_t;

    pub fn tiledb_fragment_info_alloc(
        ctx: *mut tiledb_ctx_t,
        array_uri: *const c_char,
        fragment_info: *mut *mut tiledb_fragment_info_t,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_free(fragment_info: *mut *mut tiledb_fragment_info_t);
    pub fn tiledb_fragment_info_load(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_fragment_num(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fragment_num: *mut u32,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_fragment_uri(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        uri: *mut *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_fragment_size(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        size: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_dense(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        dense: *mut i32,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_sparse(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        sparse: *mut i32,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_timestamp_range(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        start: *mut u64,
        end: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_non_empty_domain_from_index(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        did: u32,
        domain: *mut c_void,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_non_empty_domain_from_name(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        dim_name: *const c_char,
        domain: *mut c_void,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_cell_num(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        cell_num: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_version(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        version: *mut u32,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_has_consolidated_metadata(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        has: *mut i32,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_unconsolidated_metadata_num(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        unconsolidated: *mut u32,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_to_vacuum_num(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        to_vacuum_num: *mut u32,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_to_vacuum_uri(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        uri: *mut *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_fragment_info_get_array_schema(
        ctx: *mut tiledb_ctx_t,
        fragment_info: *mut tiledb_fragment_info_t,
        fid: u32,
        array_schema: *mut *mut tiledb_array_schema_t,
    ) -> capi_return_t;

    pub fn tiledb_object_type(ctx: *mut tiledb_ctx_t, path: *const c_char, object_type: *mut tiledb_object_t) -> capi_return_t;

    pub fn tiledb_group_create(ctx: *mut tiledb_ctx_t, group_uri: *const c_char) -> capi_return_t;
    pub fn tiledb_group_alloc(
        ctx: *mut tiledb_ctx_t,
        group_uri: *const c_char,
        group: *mut *mut tiledb_group_t,
    ) -> capi_return_t;
    pub fn tiledb_group_free(group: *mut *mut tiledb_group_t);
    pub fn tiledb_group_open(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        query_type: tiledb_query_type_t,
    ) -> capi_return_t;
    pub fn tiledb_group_close(ctx: *mut tiledb_ctx_t, group: *mut tiledb_group_t) -> capi_return_t;
    pub fn tiledb_group_is_open(ctx: *mut tiledb_ctx_t, group: *mut tiledb_group_t, is_open: *mut i32) -> capi_return_t;
    pub fn tiledb_group_get_query_type(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        query_type: *mut tiledb_query_type_t,
    ) -> capi_return_t;
    pub fn tiledb_group_add_member(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        uri: *const c_char,
        relative: u8,
        name: *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_group_remove_member(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        name_or_uri: *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_group_get_member_count(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        count: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_group_get_member_by_index_v2(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        index: u64,
        uri: *mut *mut tiledb_string_t,
        object_type: *mut tiledb_object_t,
        name: *mut *mut tiledb_string_t,
    ) -> capi_return_t;
    pub fn tiledb_group_put_metadata(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        key: *const c_char,
        value_type: tiledb_datatype_t,
        value_num: u32,
        value: *const c_void,
    ) -> capi_return_t;
    pub fn tiledb_group_get_metadata(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        key: *const c_char,
        value_type: *mut tiledb_datatype_t,
        value_num: *mut u32,
        value: *mut *const c_void,
    ) -> capi_return_t;
    pub fn tiledb_group_delete_metadata(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        key: *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_group_get_metadata_num(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        num: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_group_dump_str_v2(
        ctx: *mut tiledb_ctx_t,
        group: *mut tiledb_group_t,
        dump_ascii: *mut *mut tiledb_string_t,
        recursive: u8,
    ) -> capi_return_t;

    pub fn tiledb_vfs_alloc(
        ctx: *mut tiledb_ctx_t,
        config: *mut tiledb_config_t,
        vfs: *mut *mut tiledb_vfs_t,
    ) -> capi_return_t;
    pub fn tiledb_vfs_free(vfs: *mut *mut tiledb_vfs_t);
    pub fn tiledb_vfs_create_dir(ctx: *mut tiledb_ctx_t, vfs: *mut tiledb_vfs_t, uri: *const c_char) -> capi_return_t;
    pub fn tiledb_vfs_is_dir(
        ctx: *mut tiledb_ctx_t,
        vfs: *mut tiledb_vfs_t,
        uri: *const c_char,
        is_dir: *mut i32,
    ) -> capi_return_t;
    pub fn tiledb_vfs_remove_dir(ctx: *mut tiledb_ctx_t, vfs: *mut tiledb_vfs_t, uri: *const c_char) -> capi_return_t;
    pub fn tiledb_vfs_is_file(
        ctx: *mut tiledb_ctx_t,
        vfs: *mut tiledb_vfs_t,
        uri: *const c_char,
        is_file: *mut i32,
    ) -> capi_return_t;
    pub fn tiledb_vfs_remove_file(ctx: *mut tiledb_ctx_t, vfs: *mut tiledb_vfs_t, uri: *const c_char) -> capi_return_t;
    pub fn tiledb_vfs_file_size(
        ctx: *mut tiledb_ctx_t,
        vfs: *mut tiledb_vfs_t,
        uri: *const c_char,
        size: *mut u64,
    ) -> capi_return_t;
    pub fn tiledb_vfs_move_file(
        ctx: *mut tiledb_ctx_t,
        vfs: *mut tiledb_vfs_t,
        old_uri: *const c_char,
        new_uri: *const c_char,
    ) -> capi_return_t;
    pub fn tiledb_vfs_touch(ctx: *mut tiledb_ctx_t, vfs: *mut tiledb_vfs_t, uri: *const c_char) -> capi_return_t;
    pub fn tiledb_vfs_open(
        ctx: *mut tiledb_ctx_t,
        vfs: *mut tiledb_vfs_t,
        uri: *const c_char,
        mode: tiledb_vfs_mode_t,
        fh: *mut *mut tiledb_vfs_fh_t,
    ) -> capi_return_t;
    pub fn tiledb_vfs_close(ctx: *mut tiledb_ctx_t, fh: *mut tiledb_vfs_fh_t) -> capi_return_t;
    pub fn tiledb_vfs_read(
        ctx: *mut tiledb_ctx_t,
        fh: *mut tiledb_vfs_fh_t,
        offset: u64,
        buffer: *mut c_void,
        nbytes: u64,
    ) -> capi_return_t;
    pub fn tiledb_vfs_write(
        ctx: *mut tiledb_ctx_t,
        fh: *mut tiledb_vfs_fh_t,
        buffer: *const c_void,
        nbytes: u64,
    ) -> capi_return_t;
    pub fn tiledb_vfs_sync(ctx: *mut tiledb_ctx_t, fh: *mut tiledb_vfs_fh_t) -> capi_return_t;
    pub fn tiledb_vfs_fh_is_closed(ctx: *mut tiledb_ctx_t, fh: *mut tiledb_vfs_fh_t, is_closed: *mut i32) -> capi_return_t;
    pub fn tiledb_vfs_fh_free(fh: *mut *mut tiledb_vfs_fh_t);

    pub fn tiledb_stats_enable() -> capi_return_t;
    pub fn tiledb_stats_disable() -> capi_return_t;
    pub fn tiledb_stats_reset() -> capi_return_t;
    pub fn tiledb_stats_is_enabled(enabled: *mut u8) -> capi_return_t;
    pub fn tiledb_stats_raw_dump_str(out: *mut *mut c_char) -> capi_return_t;
    pub fn tiledb_stats_free_str(out: *mut *mut c_char) -> capi_return_t;
}
