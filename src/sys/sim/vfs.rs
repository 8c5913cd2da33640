//! Virtual filesystem over local paths.

use super::*;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub struct tiledb_vfs_t {
    #[allow(dead_code)]
    config: tiledb_config_t,
}

pub struct tiledb_vfs_fh_t {
    uri: String,
    mode: tiledb_vfs_mode_t,
    file: Mutex<Option<File>>,
}

/// Resolve a URI to a local path, rejecting schemes the engine cannot serve.
fn resolve<'a>(ctx: &tiledb_ctx_t, uri: &'a str) -> Result<&'a Path, capi_return_t> {
    let path = local_path(uri);
    if path.contains("://") {
        return Err(ctx.fail(format!("VFS: Unsupported filesystem for URI '{uri}'")));
    }
    Ok(Path::new(path))
}

macro_rules! sim_path {
    ($ctx:expr, $uri:expr) => {
        match resolve($ctx, $uri) {
            Ok(path) => path,
            Err(code) => return code,
        }
    };
}

pub unsafe extern "C" fn tiledb_vfs_alloc(
    ctx: *mut tiledb_ctx_t,
    config: *mut tiledb_config_t,
    vfs: *mut *mut tiledb_vfs_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let params = match unsafe { config.as_ref() } {
        Some(config) => config.snapshot(),
        None => ctx.config().snapshot(),
    };
    let value = tiledb_vfs_t {
        config: tiledb_config_t::from_params(params),
    };
    sim_out!(ctx, vfs, boxed(value, "vfs"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_vfs_free(vfs: *mut *mut tiledb_vfs_t) {
    unsafe { release(vfs, "vfs") }
}

pub unsafe extern "C" fn tiledb_vfs_create_dir(
    ctx: *mut tiledb_ctx_t,
    vfs: *mut tiledb_vfs_t,
    uri: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_arg!(ctx, vfs, "VFS");
    let uri = sim_str!(ctx, uri, "URI");
    let path = sim_path!(ctx, uri);
    if path.is_dir() {
        return ctx.fail(format!("VFS: Cannot create directory '{uri}'; Directory already exists"));
    }
    match fs::create_dir_all(path) {
        Ok(()) => TILEDB_OK,
        Err(err) => ctx.fail(format!("VFS: Cannot create directory '{uri}'; {err}")),
    }
}

pub unsafe extern "C" fn tiledb_vfs_is_dir(
    ctx: *mut tiledb_ctx_t,
    vfs: *mut tiledb_vfs_t,
    uri: *const c_char,
    is_dir: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_arg!(ctx, vfs, "VFS");
    let uri = sim_str!(ctx, uri, "URI");
    let path = sim_path!(ctx, uri);
    sim_out!(ctx, is_dir, path.is_dir() as i32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_vfs_remove_dir(
    ctx: *mut tiledb_ctx_t,
    vfs: *mut tiledb_vfs_t,
    uri: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_arg!(ctx, vfs, "VFS");
    let uri = sim_str!(ctx, uri, "URI");
    let path = sim_path!(ctx, uri);
    match fs::remove_dir_all(path) {
        Ok(()) => TILEDB_OK,
        Err(err) => ctx.fail(format!("VFS: Cannot remove directory '{uri}'; {err}")),
    }
}

pub unsafe extern "C" fn tiledb_vfs_is_file(
    ctx: *mut tiledb_ctx_t,
    vfs: *mut tiledb_vfs_t,
    uri: *const c_char,
    is_file: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_arg!(ctx, vfs, "VFS");
    let uri = sim_str!(ctx, uri, "URI");
    let path = sim_path!(ctx, uri);
    sim_out!(ctx, is_file, path.is_file() as i32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_vfs_remove_file(
    ctx: *mut tiledb_ctx_t,
    vfs: *mut tiledb_vfs_t,
    uri: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_arg!(ctx, vfs, "VFS");
    let uri = sim_str!(ctx, uri, "URI");
    let path = sim_path!(ctx, uri);
    match fs::remove_file(path) {
        Ok(()) => TILEDB_OK,
        Err(err) => ctx.fail(format!("VFS: Cannot remove file '{uri}'; {err}")),
    }
}

pub unsafe extern "C" fn tiledb_vfs_file_size(
    ctx: *mut tiledb_ctx_t,
    vfs: *mut tiledb_vfs_t,
    uri: *const c_char,
    size: *mut u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_arg!(ctx, vfs, "VFS");
    let uri = sim_str!(ctx, uri, "URI");
    let path = sim_path!(ctx, uri);
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            sim_out!(ctx, size, meta.len());
            TILEDB_OK
        }
        Ok(_) => ctx.fail(format!("VFS: Cannot get file size of '{uri}'; Not a file")),
        Err(err) => ctx.fail(format!("VFS: Cannot get file size of '{uri}'; {err}")),
    }
}

pub unsafe extern "C" fn tiledb_vfs_move_file(
    ctx: *mut tiledb_ctx_t,
    vfs: *mut tiledb_vfs_t,
    old_uri: *const c_char,
    new_uri: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_arg!(ctx, vfs, "VFS");
    let old_uri = sim_str!(ctx, old_uri, "URI");
    let new_uri = sim_str!(ctx, new_uri, "URI");
    let from = sim_path!(ctx, old_uri);
    let to = sim_path!(ctx, new_uri);
    if !from.is_file() {
        return ctx.fail(format!("VFS: Cannot move file '{old_uri}'; File does not exist"));
    }
    match fs::rename(from, to) {
        Ok(()) => TILEDB_OK,
        Err(err) => ctx.fail(format!("VFS: Cannot move file '{old_uri}' to '{new_uri}'; {err}")),
    }
}

pub unsafe extern "C" fn tiledb_vfs_touch(
    ctx: *mut tiledb_ctx_t,
    vfs: *mut tiledb_vfs_t,
    uri: *const c_char,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_arg!(ctx, vfs, "VFS");
    let uri = sim_str!(ctx, uri, "URI");
    let path = sim_path!(ctx, uri);
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(_) => TILEDB_OK,
        Err(err) => ctx.fail(format!("VFS: Cannot touch file '{uri}'; {err}")),
    }
}

pub unsafe extern "C" fn tiledb_vfs_open(
    ctx: *mut tiledb_ctx_t,
    vfs: *mut tiledb_vfs_t,
    uri: *const c_char,
    mode: tiledb_vfs_mode_t,
    fh: *mut *mut tiledb_vfs_fh_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    sim_arg!(ctx, vfs, "VFS");
    let uri = sim_str!(ctx, uri, "URI");
    let path = sim_path!(ctx, uri);
    let opened = match mode {
        TILEDB_VFS_READ => File::open(path),
        TILEDB_VFS_WRITE => File::create(path),
        TILEDB_VFS_APPEND => OpenOptions::new().create(true).append(true).open(path),
        other => return ctx.fail(format!("VFS: Cannot open file '{uri}'; Unknown mode {other}")),
    };
    let file = match opened {
        Ok(file) => file,
        Err(err) => return ctx.fail(format!("VFS: Cannot open file '{uri}'; {err}")),
    };
    let value = tiledb_vfs_fh_t {
        uri: uri.to_string(),
        mode,
        file: Mutex::new(Some(file)),
    };
    sim_out!(ctx, fh, boxed(value, "vfs_fh"));
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_vfs_close(
    ctx: *mut tiledb_ctx_t,
    fh: *mut tiledb_vfs_fh_t,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let fh = sim_arg!(ctx, fh, "VFS file handle");
    let Some(file) = fh.file.lock().take() else {
        return ctx.fail(format!("VFS: Cannot close file '{}'; File is already closed", fh.uri));
    };
    if fh.mode != TILEDB_VFS_READ {
        if let Err(err) = file.sync_all() {
            return ctx.fail(format!("VFS: Cannot close file '{}'; {err}", fh.uri));
        }
    }
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_vfs_read(
    ctx: *mut tiledb_ctx_t,
    fh: *mut tiledb_vfs_fh_t,
    offset: u64,
    buffer: *mut c_void,
    nbytes: u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let fh = sim_arg!(ctx, fh, "VFS file handle");
    if fh.mode != TILEDB_VFS_READ {
        return ctx.fail(format!("VFS: Cannot read from file '{}'; File not opened in read mode", fh.uri));
    }
    let mut guard = fh.file.lock();
    let Some(file) = guard.as_mut() else {
        return ctx.fail(format!("VFS: Cannot read from file '{}'; File is closed", fh.uri));
    };
    if nbytes == 0 {
        return TILEDB_OK;
    }
    if buffer.is_null() {
        return ctx.fail(format!("VFS: Cannot read from file '{}'; Buffer is null", fh.uri));
    }
    let out = unsafe { std::slice::from_raw_parts_mut(buffer.cast::<u8>(), nbytes as usize) };
    let result = file
        .seek(SeekFrom::Start(offset))
        .and_then(|_| file.read_exact(out));
    match result {
        Ok(()) => TILEDB_OK,
        Err(err) => ctx.fail(format!(
            "VFS: Cannot read {nbytes} bytes at offset {offset} from file '{}'; {err}",
            fh.uri
        )),
    }
}

pub unsafe extern "C" fn tiledb_vfs_write(
    ctx: *mut tiledb_ctx_t,
    fh: *mut tiledb_vfs_fh_t,
    buffer: *const c_void,
    nbytes: u64,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let fh = sim_arg!(ctx, fh, "VFS file handle");
    if fh.mode == TILEDB_VFS_READ {
        return ctx.fail(format!("VFS: Cannot write to file '{}'; File opened in read mode", fh.uri));
    }
    let mut guard = fh.file.lock();
    let Some(file) = guard.as_mut() else {
        return ctx.fail(format!("VFS: Cannot write to file '{}'; File is closed", fh.uri));
    };
    if nbytes == 0 {
        return TILEDB_OK;
    }
    if buffer.is_null() {
        return ctx.fail(format!("VFS: Cannot write to file '{}'; Buffer is null", fh.uri));
    }
    let data = unsafe { std::slice::from_raw_parts(buffer.cast::<u8>(), nbytes as usize) };
    match file.write_all(data) {
        Ok(()) => TILEDB_OK,
        Err(err) => ctx.fail(format!("VFS: Cannot write to file '{}'; {err}", fh.uri)),
    }
}

pub unsafe extern "C" fn tiledb_vfs_sync(ctx: *mut tiledb_ctx_t, fh: *mut tiledb_vfs_fh_t) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let fh = sim_arg!(ctx, fh, "VFS file handle");
    let guard = fh.file.lock();
    let Some(file) = guard.as_ref() else {
        return ctx.fail(format!("VFS: Cannot sync file '{}'; File is closed", fh.uri));
    };
    match file.sync_all() {
        Ok(()) => TILEDB_OK,
        Err(err) => ctx.fail(format!("VFS: Cannot sync file '{}'; {err}", fh.uri)),
    }
}

pub unsafe extern "C" fn tiledb_vfs_fh_is_closed(
    ctx: *mut tiledb_ctx_t,
    fh: *mut tiledb_vfs_fh_t,
    is_closed: *mut i32,
) -> capi_return_t {
    let ctx = sim_ctx!(ctx);
    let fh = sim_arg!(ctx, fh, "VFS file handle");
    sim_out!(ctx, is_closed, fh.file.lock().is_none() as i32);
    TILEDB_OK
}

pub unsafe extern "C" fn tiledb_vfs_fh_free(fh: *mut *mut tiledb_vfs_fh_t) {
    unsafe { release(fh, "vfs_fh") }
}
