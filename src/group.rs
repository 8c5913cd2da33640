//! Groups: named collections of arrays and other groups, with metadata.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::{CapiHandle, GroupHandle};
use crate::sys;
use crate::types::{CellType, Datatype, ObjectType, QueryType, cells_as_bytes, cells_from_bytes, native_bytes};
use crate::util::{cstring, take_string};

/// Kind of object stored at `uri`; [`ObjectType::Invalid`] when nothing is.
pub fn object_type(context: &Context, uri: &str) -> Result<ObjectType> {
    let c_uri = cstring("uri", uri)?;
    let mut raw = 0;
    context.capi_call(
        || format!("get object type of '{uri}'"),
        |ctx| unsafe { sys::tiledb_object_type(ctx, c_uri.as_ptr(), &mut raw) },
    )?;
    ObjectType::from_raw(raw)
}

/// One entry of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub uri: String,
    pub object_type: ObjectType,
    pub name: Option<String>,
}

/// A group at a URI. Clones refer to the same native group object.
///
/// Member and metadata changes are made with the group open for writing and
/// become visible to readers once it is closed.
#[derive(Debug, Clone)]
pub struct Group {
    context: Context,
    handle: GroupHandle,
    uri: Arc<str>,
    // Metadata values point into the open group; see `Array`.
    open_state: Arc<RwLock<()>>,
}

impl Group {
    /// Create an empty group at `uri`.
    pub fn create(context: &Context, uri: &str) -> Result<()> {
        let c_uri = cstring("uri", uri)?;
        context.capi_call(
            || format!("create group '{uri}'"),
            |ctx| unsafe { sys::tiledb_group_create(ctx, c_uri.as_ptr()) },
        )
    }

    /// Allocate a group object for `uri`. The group is not opened.
    pub fn new(context: &Context, uri: &str) -> Result<Self> {
        let c_uri = cstring("uri", uri)?;
        let handle = context
            .capi_alloc::<GroupHandle, _>(|ctx, out| unsafe { sys::tiledb_group_alloc(ctx, c_uri.as_ptr(), out) })?;
        Ok(Self {
            context: context.clone(),
            handle,
            uri: uri.into(),
            open_state: Arc::new(RwLock::new(())),
        })
    }

    fn raw(&self) -> *mut sys::tiledb_group_t {
        self.handle.get().as_ptr()
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn open(&self, query_type: QueryType) -> Result<()> {
        let _state = self.open_state.write();
        self.context.capi_call(
            || format!("open group '{}' for {query_type:?}", self.uri),
            |ctx| unsafe { sys::tiledb_group_open(ctx, self.raw(), query_type.to_raw()) },
        )?;
        tracing::trace!(uri = %self.uri, ?query_type, "opened group");
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        let _state = self.open_state.write();
        self.context.capi_call(
            || format!("close group '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_group_close(ctx, self.raw()) },
        )
    }

    pub fn is_open(&self) -> Result<bool> {
        let mut open = 0;
        self.context.capi_call(
            || format!("check whether group '{}' is open", self.uri),
            |ctx| unsafe { sys::tiledb_group_is_open(ctx, self.raw(), &mut open) },
        )?;
        Ok(open != 0)
    }

    pub fn query_type(&self) -> Result<QueryType> {
        let mut raw = 0;
        self.context.capi_call(
            || format!("get query type of group '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_group_get_query_type(ctx, self.raw(), &mut raw) },
        )?;
        QueryType::from_raw(raw)
    }

    /// Add the array or group at `uri`. A `relative` URI is resolved against
    /// the group's own URI.
    pub fn add_member(&self, uri: &str, relative: bool, name: Option<&str>) -> Result<()> {
        let c_uri = cstring("uri", uri)?;
        let c_name = name.map(|name| cstring("name", name)).transpose()?;
        self.context.capi_call(
            || format!("add member '{uri}' to group '{}'", self.uri),
            |ctx| unsafe {
                sys::tiledb_group_add_member(
                    ctx,
                    self.raw(),
                    c_uri.as_ptr(),
                    relative as u8,
                    c_name.as_ref().map_or(std::ptr::null(), |name| name.as_ptr()),
                )
            },
        )
    }

    /// Remove the member with the given name or URI.
    pub fn remove_member(&self, name_or_uri: &str) -> Result<()> {
        let c_key = cstring("name_or_uri", name_or_uri)?;
        self.context.capi_call(
            || format!("remove member '{name_or_uri}' from group '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_group_remove_member(ctx, self.raw(), c_key.as_ptr()) },
        )
    }

    pub fn member_count(&self) -> Result<u64> {
        let mut count = 0;
        self.context.capi_call(
            || format!("count members of group '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_group_get_member_count(ctx, self.raw(), &mut count) },
        )?;
        Ok(count)
    }

    pub fn member(&self, index: u64) -> Result<GroupMember> {
        let mut uri = std::ptr::null_mut();
        let mut name = std::ptr::null_mut();
        let mut raw_type = 0;
        self.context.capi_call(
            || format!("get member {index} of group '{}'", self.uri),
            |ctx| unsafe {
                sys::tiledb_group_get_member_by_index_v2(ctx, self.raw(), index, &mut uri, &mut raw_type, &mut name)
            },
        )?;
        // Take both strings before checking either so neither leaks.
        let uri = unsafe { take_string(uri) };
        let name = (!name.is_null()).then(|| unsafe { take_string(name) }).transpose();
        Ok(GroupMember {
            uri: uri?,
            object_type: ObjectType::from_raw(raw_type)?,
            name: name?,
        })
    }

    /// Every member, in insertion order.
    pub fn members(&self) -> Result<Vec<GroupMember>> {
        (0..self.member_count()?).map(|index| self.member(index)).collect()
    }

    fn put_metadata_raw(&self, key: &str, datatype: Datatype, num: usize, bytes: &[u8]) -> Result<()> {
        let c_key = cstring("key", key)?;
        let num = u32::try_from(num).map_err(|_| Error::InvalidArgument {
            name: "value",
            reason: format!("{num} values do not fit in one metadata item"),
        })?;
        self.context.capi_call(
            || format!("put metadata '{key}' on group '{}'", self.uri),
            |ctx| unsafe {
                sys::tiledb_group_put_metadata(
                    ctx,
                    self.raw(),
                    c_key.as_ptr(),
                    datatype.to_raw(),
                    num,
                    bytes.as_ptr().cast(),
                )
            },
        )
    }

    /// Store `values` under `key`. The group must be open for writing.
    pub fn put_metadata<T: CellType>(&self, key: &str, values: &[T]) -> Result<()> {
        self.put_metadata_raw(key, T::DATATYPE, values.len(), cells_as_bytes(values))
    }

    pub fn put_metadata_str(&self, key: &str, value: &str) -> Result<()> {
        self.put_metadata_raw(key, Datatype::StringUtf8, value.len(), value.as_bytes())
    }

    fn get_metadata_raw(&self, key: &str) -> Result<Option<(Datatype, Vec<u8>)>> {
        let c_key = cstring("key", key)?;
        let mut datatype = 0;
        let mut num = 0u32;
        let mut value = std::ptr::null();
        let _state = self.open_state.read();
        self.context.capi_call(
            || format!("get metadata '{key}' from group '{}'", self.uri),
            |ctx| unsafe {
                sys::tiledb_group_get_metadata(ctx, self.raw(), c_key.as_ptr(), &mut datatype, &mut num, &mut value)
            },
        )?;
        if value.is_null() {
            return Ok(None);
        }
        let datatype = Datatype::from_raw(datatype)?;
        let len = datatype.size() as u64 * u64::from(num);
        Ok(Some((datatype, unsafe { native_bytes(value, len) }.to_vec())))
    }

    /// Read the values under `key`. The group must be open for reading.
    pub fn get_metadata<T: CellType>(&self, key: &str) -> Result<Option<Vec<T>>> {
        let Some((datatype, bytes)) = self.get_metadata_raw(key)? else {
            return Ok(None);
        };
        if datatype != T::DATATYPE {
            return Err(Error::TypeMismatch {
                operation: format!("get metadata '{key}'"),
                expected: datatype.type_name(),
                actual: T::DATATYPE.type_name(),
            });
        }
        cells_from_bytes(&bytes).map(Some)
    }

    pub fn get_metadata_str(&self, key: &str) -> Result<Option<String>> {
        let Some((datatype, bytes)) = self.get_metadata_raw(key)? else {
            return Ok(None);
        };
        if !datatype.is_string() {
            return Err(Error::TypeMismatch {
                operation: format!("get metadata '{key}'"),
                expected: datatype.type_name(),
                actual: "string",
            });
        }
        String::from_utf8(bytes).map(Some).map_err(|_| Error::InvalidArgument {
            name: "key",
            reason: format!("metadata '{key}' is not valid UTF-8"),
        })
    }

    pub fn delete_metadata(&self, key: &str) -> Result<()> {
        let c_key = cstring("key", key)?;
        self.context.capi_call(
            || format!("delete metadata '{key}' from group '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_group_delete_metadata(ctx, self.raw(), c_key.as_ptr()) },
        )
    }

    pub fn metadata_num(&self) -> Result<u64> {
        let mut num = 0;
        self.context.capi_call(
            || format!("count metadata of group '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_group_get_metadata_num(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    /// Text tree of the group's members, descending into member groups when
    /// `recursive` is set.
    pub fn dump(&self, recursive: bool) -> Result<String> {
        let mut out = std::ptr::null_mut();
        self.context.capi_call(
            || format!("dump group '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_group_dump_str_v2(ctx, self.raw(), &mut out, recursive as u8) },
        )?;
        unsafe { take_string(out) }
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::tests::{dense_array, unique_uri};

    fn new_group(ctx: &Context, name: &str) -> Group {
        let uri = unique_uri(name);
        Group::create(ctx, &uri).unwrap();
        Group::new(ctx, &uri).unwrap()
    }

    #[test]
    fn test_members_visible_after_close() {
        let ctx = Context::new().unwrap();
        let group = new_group(&ctx, "group-members");
        let array = dense_array(&ctx, "group-member-array");
        let child = unique_uri("group-child");
        Group::create(&ctx, &child).unwrap();

        group.open(QueryType::Write).unwrap();
        assert_eq!(group.query_type().unwrap(), QueryType::Write);
        group.add_member(array.uri(), false, Some("temps")).unwrap();
        group.add_member(&child, false, None).unwrap();
        assert!(group.add_member(array.uri(), false, Some("temps")).is_err());
        group.close().unwrap();

        group.open(QueryType::Read).unwrap();
        assert_eq!(
            group.members().unwrap(),
            vec![
                GroupMember {
                    uri: array.uri().to_string(),
                    object_type: ObjectType::Array,
                    name: Some("temps".into()),
                },
                GroupMember {
                    uri: child.clone(),
                    object_type: ObjectType::Group,
                    name: None,
                },
            ]
        );
        assert!(group.member(2).is_err());
        let dump = group.dump(false).unwrap();
        assert!(dump.starts_with(&format!("{} GROUP\n", group.uri())));
        assert!(dump.contains("|-- temps ARRAY"));
        group.close().unwrap();

        group.open(QueryType::Write).unwrap();
        group.remove_member("temps").unwrap();
        assert!(group.remove_member("temps").is_err());
        group.close().unwrap();
        group.open(QueryType::Read).unwrap();
        assert_eq!(group.member_count().unwrap(), 1);
    }

    #[test]
    fn test_relative_member_resolves_under_group() {
        let ctx = Context::new().unwrap();
        let group = new_group(&ctx, "group-relative");
        let nested = format!("{}/nested", group.uri());
        Group::create(&ctx, &nested).unwrap();
        group.open(QueryType::Write).unwrap();
        group.add_member("nested", true, Some("nested")).unwrap();
        let err = group.add_member("missing", true, None).unwrap_err();
        assert!(err.to_string().contains("missing"));
        group.close().unwrap();
        group.open(QueryType::Read).unwrap();
        assert_eq!(group.member(0).unwrap().uri, nested);
    }

    #[test]
    fn test_group_metadata() {
        let ctx = Context::new().unwrap();
        let group = new_group(&ctx, "group-metadata");
        group.open(QueryType::Write).unwrap();
        group.put_metadata("version", &[3u32]).unwrap();
        group.put_metadata_str("owner", "lab").unwrap();
        group.put_metadata("stale", &[1u8]).unwrap();
        group.delete_metadata("stale").unwrap();
        assert!(group.get_metadata::<u32>("version").is_err());
        group.close().unwrap();

        group.open(QueryType::Read).unwrap();
        assert_eq!(group.metadata_num().unwrap(), 2);
        assert_eq!(group.get_metadata::<u32>("version").unwrap(), Some(vec![3]));
        assert_eq!(group.get_metadata_str("owner").unwrap().as_deref(), Some("lab"));
        assert_eq!(group.get_metadata::<u8>("stale").unwrap(), None);
        assert!(matches!(group.get_metadata::<i64>("version"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_object_type_and_create_conflicts() {
        let ctx = Context::new().unwrap();
        let group = new_group(&ctx, "group-object-type");
        let array = dense_array(&ctx, "group-object-type-array");
        assert_eq!(object_type(&ctx, group.uri()).unwrap(), ObjectType::Group);
        assert_eq!(object_type(&ctx, array.uri()).unwrap(), ObjectType::Array);
        assert_eq!(object_type(&ctx, "mem://tests/nothing").unwrap(), ObjectType::Invalid);
        assert!(Group::create(&ctx, group.uri()).is_err());
        assert!(Group::create(&ctx, array.uri()).is_err());
    }

    #[test]
    fn test_members_need_open_group() {
        let ctx = Context::new().unwrap();
        let group = new_group(&ctx, "group-closed");
        assert!(!group.is_open().unwrap());
        assert!(group.member_count().is_err());
        group.open(QueryType::Read).unwrap();
        assert!(group.is_open().unwrap());
        let array = dense_array(&ctx, "group-closed-array");
        assert!(group.add_member(array.uri(), false, None).is_err());
    }
}
