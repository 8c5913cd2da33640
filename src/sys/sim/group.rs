//! Groups: named collections of arrays and other groups, with metadata.
//!
//! Member and metadata changes made while a group is open for writing are
//! staged on the handle and written back when it is closed. Opening for
//! reading takes a snapshot.

use super::array::array_exists;
use super::metadata::{Metadatum, write_metadatum};
use super::*;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

#[derive(Debug, Clone)]
struct MemberDef {
    uri: String,
    name: Option<String>,
    object_type: tiledb_object_t,
}

#[derive(Debug, Clone, Default)]
struct StoredGroup {
    members: Vec<MemberDef>,
    metadata: BTreeMap<String, Metadatum>,
}

static GROUPS: LazyLock<Mutex<HashMap<String, StoredGroup>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn object_type_of(uri: &str) -> tiledb_object_t {
    if GROUPS.lock().contains_key(uri) {
        TILEDB_GROUP
    } else if array_exists(uri) {
        TILEDB_ARRAY
    } else {
        TILEDB_INVALID
    }
}

fn type_name(object_type: tiledb_object_t) -> &'static str {
    match object_type {
        TILEDB_GROUP => "GROUP",
        TILEDB_ARRAY => "ARRAY",
        _ => "INVALID",
    }
}

struct OpenGroup {
    query_type: tiledb_query_type_t,
    contents: StoredGroup,
}

pub struct tiledb_group_t {
    uri: String,
    open: Mutex<Option<OpenGroup>>,
}

impl tiledb_group_t {
    /// Run `f` on the open group when it was opened with `query_type`.
    fn with_open<R>(
        &self,
        query_type: tiledb_query_type_t,
        action: &str,
        f: impl FnOnce(&mut StoredGroup) -> Result<R, String>,
    ) -> Result<R, String> {
        let mut open = self.open.lock();
        match open.as_mut() {
            Some(group) if group.query_type == query_type => f(&mut group.contents),
            _ => {
                let mode = if query_type == TILEDB_READ { "READ" } else { "WRITE" };
                Err(format!("Group: Cannot {action}; Group '{}' must be opened in {mode} mode", self.uri))
            }
        }
    }
}

/// Render `uri` and its members, descending into member groups when
/// `recursive` is set.
fn dump(uri: &str, recursive: bool, depth: usize, out: &mut String) {
    let Some(group) = GROUPS.lock().get(uri).cloned() else {
        return;
    };
    for member in &group.members {
        let label = member.name.as_deref().unwrap_or(&member.uri);
        out.push_str(&"|   ".repeat(depth));
        out.push_str(&format!("|-- {label} {}\n", type_name(member.object_type)));
        if recursive && member.object_type == TILEDB_GROUP && depth < 32 {
            dump(&member.uri, recursive, depth + 1, out);
        }
    }
}

pub unsafe extern "C" fn tiledb_object_type(
    ctx: *mut tiledb_ctx_t,
    path: *const c_char,
    object_type: *mut tiledb_object_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let path = sim_str!(ctx, path, "path");
    sim_out!(ctx, object_type, object_type_of(path));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_group_create(ctx: *mut tiledb_ctx_t, group_uri: *const c_char) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let uri = sim_str!(ctx, group_uri, "group URI");
    if object_type_of(uri) != TILEDB_INVALID {
        return ctx.fail(format!("Cannot create group; An object already exists at '{uri}'"));
    }
    GROUPS.lock().insert(uri.to_string(), StoredGroup::default());
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_group_alloc(
    ctx: *mut tiledb_ctx_t,
    group_uri: *const c_char,
    group: *mut *mut tiledb_group_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let uri = sim_str!(ctx, group_uri, "group URI");
    let value = tiledb_group_t {
        uri: uri.to_string(),
        open: Mutex::new(None),
    };
    sim_out!(ctx, group, boxed(value, "group"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_group_free(group: *mut *mut tiledb_group_t) {
    unsafe { release(group, "group") }
}

pub unsafe extern "C" fn tiledb_group_open(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    query_type: tiledb_query_type_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    if query_type != TILEDB_READ && query_type != TILEDB_WRITE {
        return ctx.fail(format!("Group: Cannot open group; Unsupported query type {query_type}"));
    }
    let mut open = group.open.lock();
    if open.is_some() {
        return ctx.fail(format!("Group: Cannot open group '{}'; Group is already open", group.uri));
    }
    let Some(contents) = GROUPS.lock().get(&group.uri).cloned() else {
        return ctx.fail(format!("Group: Cannot open group; Group '{}' does not exist", group.uri));
    };
    *open = Some(OpenGroup { query_type, contents });
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_group_close(ctx: *mut tiledb_ctx_t, group: *mut tiledb_group_t) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    let Some(open) = group.open.lock().take() else {
        return ctx.fail(format!("Group: Cannot close group '{}'; Group is not open", group.uri));
    };
    if open.query_type == TILEDB_WRITE {
        tracing::trace!(uri = %group.uri, members = open.contents.members.len(), "writing group");
        GROUPS.lock().insert(group.uri.clone(), open.contents);
    }
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_group_is_open(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    is_open: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    sim_out!(ctx, is_open, group.open.lock().is_some() as i32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_group_get_query_type(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    query_type: *mut tiledb_query_type_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    let Some(current) = group.open.lock().as_ref().map(|g| g.query_type) else {
        return ctx.fail(format!("Group: Cannot get query type; Group '{}' is not open", group.uri));
    };
    sim_out!(ctx, query_type, current);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_group_add_member(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    uri: *const c_char,
    relative: u8,
    name: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    let member_uri = sim_str!(ctx, uri, "member URI");
    let name = if name.is_null() {
        None
    } else {
        Some(sim_str!(ctx, name, "member name").to_string())
    };
    let resolved = if relative != 0 {
        format!("{}/{member_uri}", group.uri.trim_end_matches('/'))
    } else {
        member_uri.to_string()
    };
    let object_type = object_type_of(&resolved);
    if object_type == TILEDB_INVALID {
        return ctx.fail(format!("Group: Cannot add member '{resolved}'; Not a valid array or group"));
    }
    let result = group.with_open(TILEDB_WRITE, "add member", |contents| {
        if let Some(name) = &name {
            if contents.members.iter().any(|m| m.name.as_ref() == Some(name)) {
                return Err(format!("Group: Cannot add member; A member named '{name}' already exists"));
            }
        }
        contents.members.push(MemberDef {
            uri: resolved,
            name,
            object_type,
        });
        Ok(())
    });
    match result {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_group_remove_member(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    name_or_uri: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    let key = sim_str!(ctx, name_or_uri, "member name");
    let result = group.with_open(TILEDB_WRITE, "remove member", |contents| {
        let found = contents
            .members
            .iter()
            .position(|m| m.name.as_deref() == Some(key) || m.uri == key);
        match found {
            Some(index) => {
                contents.members.remove(index);
                Ok(())
            }
            None => Err(format!("Group: Cannot remove member; Member '{key}' does not exist")),
        }
    });
    match result {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_group_get_member_count(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    count: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    match group.with_open(TILEDB_READ, "get member count", |c| Ok(c.members.len() as u64)) {
        Ok(num) => {
            sim_out!(ctx, count, num);
            TILEDB_OK
        }
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_group_get_member_by_index_v2(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    index: u64,
    uri: *mut *mut tiledb_string_t,
    object_type: *mut tiledb_object_t,
    name: *mut *mut tiledb_string_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    let member = group.with_open(TILEDB_READ, "get member", |contents| {
        contents
            .members
            .get(index as usize)
            .cloned()
            .ok_or_else(|| format!("Group: Cannot get member; Member index {index} out of bounds"))
    });
    let member = match member {
        Ok(member) => member,
        Err(message) => return ctx.fail(message),
    };
    if uri.is_null() || object_type.is_null() || name.is_null() {
        return ctx.fail("Invalid output pointer");
    }
    sim_out!(ctx, uri, new_string(&member.uri));
    sim_out!(ctx, object_type, member.object_type);
    sim_out!(ctx, name, member.name.as_deref().map_or(std::ptr::null_mut(), new_string));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_group_put_metadata(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    key: *const c_char,
    value_type: tiledb_datatype_t,
    value_num: u32,
    value: *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    let key = sim_str!(ctx, key, "metadata key");
    let datum = match unsafe { Metadatum::from_raw(value_type, value_num, value) } {
        Ok(datum) => datum,
        Err(message) => return ctx.fail(format!("Cannot put metadata '{key}'; {message}")),
    };
    let result = group.with_open(TILEDB_WRITE, "put metadata", |contents| {
        contents.metadata.insert(key.to_string(), datum);
        Ok(())
    });
    match result {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_group_get_metadata(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    key: *const c_char,
    value_type: *mut tiledb_datatype_t,
    value_num: *mut u32,
    value: *mut *const c_void,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    let key = sim_str!(ctx, key, "metadata key");
    let open = group.open.lock();
    let contents = match open.as_ref() {
        Some(open) if open.query_type == TILEDB_READ => &open.contents,
        _ => {
            return ctx.fail(format!(
                "Group: Cannot get metadata '{key}'; Group '{}' must be opened in READ mode",
                group.uri
            ));
        }
    };
    // The returned pointer stays valid until the group is closed.
    unsafe { write_metadatum(ctx, contents.metadata.get(key), value_type, value_num, value) }
}

pub unsafe extern "C" fn tiledb_group_delete_metadata(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    key: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    let key = sim_str!(ctx, key, "metadata key");
    let result = group.with_open(TILEDB_WRITE, "delete metadata", |contents| {
        contents.metadata.remove(key);
        Ok(())
    });
    match result {
        Ok(()) => TILEDB_OK,
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_group_get_metadata_num(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    num: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    match group.with_open(TILEDB_READ, "get number of metadata", |c| Ok(c.metadata.len() as u64)) {
        Ok(count) => {
            sim_out!(ctx, num, count);
            TILEDB_OK
        }
        Err(message) => ctx.fail(message),
    }
}

pub unsafe extern "C" fn tiledb_group_dump_str_v2(
    ctx: *mut tiledb_ctx_t,
    group: *mut tiledb_group_t,
    dump_ascii: *mut *mut tiledb_string_t,
    recursive: u8,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let group = sim_arg!(ctx, group, "group");
    if group.open.lock().is_none() {
        return ctx.fail(format!("Group: Cannot dump group '{}'; Group is not open", group.uri));
    }
    let mut out = format!("{} GROUP\n", group.uri);
    dump(&group.uri, recursive != 0, 0, &mut out);
    sim_out!(ctx, dump_ascii, new_string(&out));
    TILEDB_OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_indents_nested_groups() {
        let root = "mem://dump-root";
        let child = "mem://dump-root/child";
        let mut groups = GROUPS.lock();
        groups.insert(
            root.to_string(),
            StoredGroup {
                members: vec![MemberDef {
                    uri: child.to_string(),
                    name: Some("child".into()),
                    object_type: TILEDB_GROUP,
                }],
                metadata: BTreeMap::new(),
            },
        );
        groups.insert(
            child.to_string(),
            StoredGroup {
                members: vec![MemberDef {
                    uri: "mem://elsewhere".into(),
                    name: None,
                    object_type: TILEDB_ARRAY,
                }],
                metadata: BTreeMap::new(),
            },
        );
        drop(groups);

        let mut flat = String::new();
        dump(root, false, 0, &mut flat);
        assert_eq!(flat, "|-- child GROUP\n");

        let mut nested = String::new();
        dump(root, true, 0, &mut nested);
        assert_eq!(nested, "|-- child GROUP\n|   |-- mem://elsewhere ARRAY\n");
    }
}
