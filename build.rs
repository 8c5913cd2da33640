// Build script for tiledb-binding
//
// The extern block in `src/sys/native.rs` links libtiledb by name. Point
// TILEDB_LIB_DIR at a directory containing the shared library when it is not
// on the default linker search path. Builds with the `sim` feature, and the
// crate's unit tests, use the in-process engine in `src/sys/sim` and link
// nothing.

fn main() {
    println!("cargo:rerun-if-changed=src/sys/");
    println!("cargo:rerun-if-env-changed=TILEDB_LIB_DIR");

    if std::env::var_os("CARGO_FEATURE_NATIVE").is_none() || std::env::var_os("CARGO_FEATURE_SIM").is_some() {
        return;
    }

    if let Some(dir) = std::env::var_os("TILEDB_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir.to_string_lossy());
    }
}
