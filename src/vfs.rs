//! Virtual filesystem access through the engine.
//!
//! [`VfsFile`] implements the standard io traits. The engine reads at explicit
//! offsets and only appends on write, so the file position lives here: reads
//! may seek anywhere within the file, writes only move forward.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::config::Config;
use crate::context::Context;
use crate::error::Result;
use crate::handle::{CapiHandle, VfsFileHandle, VfsHandle};
use crate::sys;
use crate::types::VfsMode;
use crate::util::cstring;

#[derive(Debug, Clone)]
pub struct Vfs {
    context: Context,
    handle: VfsHandle,
}

impl Vfs {
    /// A VFS using the context's configuration.
    pub fn new(context: &Context) -> Result<Self> {
        Self::alloc(context, None)
    }

    pub fn with_config(context: &Context, config: &Config) -> Result<Self> {
        Self::alloc(context, Some(config))
    }

    fn alloc(context: &Context, config: Option<&Config>) -> Result<Self> {
        let config_ptr = config.map_or(std::ptr::null_mut(), Config::raw);
        let handle =
            context.capi_alloc::<VfsHandle, _>(|ctx, out| unsafe { sys::tiledb_vfs_alloc(ctx, config_ptr, out) })?;
        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    fn raw(&self) -> *mut sys::tiledb_vfs_t {
        self.handle.get().as_ptr()
    }

    fn uri_call(
        &self,
        action: &str,
        uri: &str,
        call: impl FnOnce(*mut sys::tiledb_ctx_t, *const sys::c_char) -> sys::capi_return_t,
    ) -> Result<()> {
        let c_uri = cstring("uri", uri)?;
        self.context
            .capi_call(|| format!("{action} '{uri}'"), |ctx| call(ctx, c_uri.as_ptr()))
    }

    pub fn create_dir(&self, uri: &str) -> Result<()> {
        self.uri_call("create directory", uri, |ctx, c_uri| unsafe {
            sys::tiledb_vfs_create_dir(ctx, self.raw(), c_uri)
        })
    }

    pub fn is_dir(&self, uri: &str) -> Result<bool> {
        let mut is_dir = 0;
        self.uri_call("check directory", uri, |ctx, c_uri| unsafe {
            sys::tiledb_vfs_is_dir(ctx, self.raw(), c_uri, &mut is_dir)
        })?;
        Ok(is_dir != 0)
    }

    /// Remove a directory and everything below it.
    pub fn remove_dir(&self, uri: &str) -> Result<()> {
        self.uri_call("remove directory", uri, |ctx, c_uri| unsafe {
            sys::tiledb_vfs_remove_dir(ctx, self.raw(), c_uri)
        })
    }

    pub fn is_file(&self, uri: &str) -> Result<bool> {
        let mut is_file = 0;
        self.uri_call("check file", uri, |ctx, c_uri| unsafe {
            sys::tiledb_vfs_is_file(ctx, self.raw(), c_uri, &mut is_file)
        })?;
        Ok(is_file != 0)
    }

    pub fn remove_file(&self, uri: &str) -> Result<()> {
        self.uri_call("remove file", uri, |ctx, c_uri| unsafe {
            sys::tiledb_vfs_remove_file(ctx, self.raw(), c_uri)
        })
    }

    pub fn file_size(&self, uri: &str) -> Result<u64> {
        let mut size = 0;
        self.uri_call("get size of file", uri, |ctx, c_uri| unsafe {
            sys::tiledb_vfs_file_size(ctx, self.raw(), c_uri, &mut size)
        })?;
        Ok(size)
    }

    pub fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let c_from = cstring("from", from)?;
        let c_to = cstring("to", to)?;
        self.context.capi_call(
            || format!("move file '{from}' to '{to}'"),
            |ctx| unsafe { sys::tiledb_vfs_move_file(ctx, self.raw(), c_from.as_ptr(), c_to.as_ptr()) },
        )
    }

    /// Create an empty file, or leave an existing one untouched.
    pub fn touch(&self, uri: &str) -> Result<()> {
        self.uri_call("touch file", uri, |ctx, c_uri| unsafe {
            sys::tiledb_vfs_touch(ctx, self.raw(), c_uri)
        })
    }

    pub fn open(&self, uri: &str, mode: VfsMode) -> Result<VfsFile> {
        let c_uri = cstring("uri", uri)?;
        let handle = self.context.capi_handle::<VfsFileHandle, _>(
            || format!("open file '{uri}' for {mode:?}"),
            |ctx, out| unsafe { sys::tiledb_vfs_open(ctx, self.raw(), c_uri.as_ptr(), mode.to_raw(), out) },
        )?;
        let len = match mode {
            VfsMode::Write => 0,
            VfsMode::Read | VfsMode::Append => self.file_size(uri)?,
        };
        // Appends continue after the existing contents.
        let position = if mode == VfsMode::Append { len } else { 0 };
        Ok(VfsFile {
            vfs: self.clone(),
            handle,
            uri: uri.to_string(),
            mode,
            len,
            position,
        })
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

/// An open file. Closing it flushes pending writes.
#[derive(Debug)]
pub struct VfsFile {
    vfs: Vfs,
    handle: VfsFileHandle,
    uri: String,
    mode: VfsMode,
    len: u64,
    position: u64,
}

impl VfsFile {
    fn raw(&self) -> *mut sys::tiledb_vfs_fh_t {
        self.handle.get().as_ptr()
    }

    pub fn mode(&self) -> VfsMode {
        self.mode
    }

    /// Fill `buf` from `offset`. The range must lie within the file.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let len = buf.len() as u64;
        self.vfs.context.capi_call(
            || format!("read {len} bytes at offset {offset} from '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_vfs_read(ctx, self.raw(), offset, buf.as_mut_ptr().cast(), len) },
        )
    }

    /// Append `data` to the file.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let len = data.len() as u64;
        self.vfs.context.capi_call(
            || format!("write {len} bytes to '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_vfs_write(ctx, self.raw(), data.as_ptr().cast(), len) },
        )?;
        self.position += len;
        self.len = self.len.max(self.position);
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.vfs.context.capi_call(
            || format!("sync '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_vfs_sync(ctx, self.raw()) },
        )
    }

    pub fn close(&self) -> Result<()> {
        self.vfs.context.capi_call(
            || format!("close '{}'", self.uri),
            |ctx| unsafe { sys::tiledb_vfs_close(ctx, self.raw()) },
        )
    }

    pub fn is_closed(&self) -> Result<bool> {
        let mut closed = 0;
        self.vfs.context.capi_call(
            || format!("check whether '{}' is closed", self.uri),
            |ctx| unsafe { sys::tiledb_vfs_fh_is_closed(ctx, self.raw(), &mut closed) },
        )?;
        Ok(closed != 0)
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

impl Read for VfsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.position);
        let count = remaining.min(buf.len() as u64) as usize;
        if count == 0 {
            return Ok(0);
        }
        self.read_at(self.position, &mut buf[..count]).map_err(io::Error::other)?;
        self.position += count as u64;
        Ok(count)
    }
}

impl Write for VfsFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.mode == VfsMode::Read {
            return Ok(());
        }
        self.sync().map_err(io::Error::other)
    }
}

impl Seek for VfsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file"));
        };
        if self.mode != VfsMode::Read && target != self.position {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("files opened for {:?} can only be written sequentially", self.mode),
            ));
        }
        self.position = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn uri(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_directories_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new().unwrap();
        let vfs = Vfs::new(&ctx).unwrap();

        let nested = uri(&dir, "nested");
        vfs.create_dir(&nested).unwrap();
        assert!(vfs.is_dir(&nested).unwrap());
        assert!(vfs.create_dir(&nested).is_err());

        let file = format!("{nested}/empty.bin");
        vfs.touch(&file).unwrap();
        assert!(vfs.is_file(&file).unwrap());
        assert_eq!(vfs.file_size(&file).unwrap(), 0);

        let moved = format!("{nested}/moved.bin");
        vfs.move_file(&file, &moved).unwrap();
        assert!(!vfs.is_file(&file).unwrap());
        vfs.remove_file(&moved).unwrap();
        vfs.remove_dir(&nested).unwrap();
        assert!(!vfs.is_dir(&nested).unwrap());
    }

    #[test]
    fn test_write_then_read_with_io_traits() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new().unwrap();
        let vfs = Vfs::new(&ctx).unwrap();
        let path = uri(&dir, "data.txt");

        let mut out = vfs.open(&path, VfsMode::Write).unwrap();
        out.write_all(b"hello ").unwrap();
        write!(out, "vfs {}", 42).unwrap();
        out.flush().unwrap();
        out.close().unwrap();
        assert!(out.is_closed().unwrap());
        assert_eq!(vfs.file_size(&path).unwrap(), 12);

        let mut input = vfs.open(&path, VfsMode::Read).unwrap();
        let mut text = String::new();
        input.read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello vfs 42");

        input.seek(SeekFrom::End(-2)).unwrap();
        let mut tail = [0u8; 2];
        input.read_exact(&mut tail).unwrap();
        assert_eq!(&tail, b"42");
        assert!(input.seek(SeekFrom::Current(-20)).is_err());
    }

    #[test]
    fn test_append_extends_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new().unwrap();
        let vfs = Vfs::new(&ctx).unwrap();
        let path = uri(&dir, "log.txt");

        let mut first = vfs.open(&path, VfsMode::Write).unwrap();
        first.write_all(b"one;").unwrap();
        first.close().unwrap();

        let mut second = vfs.open(&path, VfsMode::Append).unwrap();
        assert_eq!(second.stream_position().unwrap(), 4);
        second.write_all(b"two;").unwrap();
        assert!(second.seek(SeekFrom::Start(0)).is_err());
        second.close().unwrap();

        let input = vfs.open(&path, VfsMode::Read).unwrap();
        let mut all = [0u8; 8];
        input.read_at(0, &mut all).unwrap();
        assert_eq!(&all, b"one;two;");
    }

    #[test]
    fn test_mode_violations_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new().unwrap();
        let vfs = Vfs::new(&ctx).unwrap();
        let path = uri(&dir, "ro.bin");
        vfs.touch(&path).unwrap();

        let mut input = vfs.open(&path, VfsMode::Read).unwrap();
        let err = input.write_bytes(b"x").unwrap_err();
        assert!(err.native_message().unwrap().contains("ro.bin"));

        let mut past_end = [0u8; 4];
        assert!(matches!(input.read_at(0, &mut past_end), Err(Error::Operation { .. })));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new().unwrap();
        let vfs = Vfs::new(&ctx).unwrap();
        let err = vfs.open(&uri(&dir, "absent.bin"), VfsMode::Read).unwrap_err();
        assert!(err.to_string().contains("absent.bin"));
    }
}
