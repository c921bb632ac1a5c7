/// Builds the gRPC client and server code for `quill.proto` using
/// `tonic-prost-build`.
///
/// The vendored `protoc` binary (and its bundled well-known types, needed for
/// `google/protobuf/empty.proto`) is used so no system installation is
/// required.
///
/// # Files and Paths
///
/// - Proto file: `proto/quill.proto`
/// - Includes: `proto/` and the vendored well-known types
///
/// # Output
///
/// Generated code is exposed as `quill_tonic_core::proto`, together with the
/// encoded `FILE_DESCRIPTOR_SET` used by server reflection.
///
/// `google.protobuf.Empty` maps to `()` in the generated service traits.
///
/// # Panics
///
/// Panics if code generation fails.
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("quill_descriptor.bin");

    // SAFETY: build scripts are single threaded.
    unsafe {
        env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path().unwrap());
    }
    let well_known = protoc_bin_vendored::include_path().unwrap();

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(
            config,
            &[PathBuf::from("proto/quill.proto")],
            &[PathBuf::from("proto"), well_known],
        )
        .unwrap();

    println!("cargo:rerun-if-changed=proto/quill.proto");
}
