//! Build script for proto compilation.
//!
//! The host protocol types are only generated when the `grpc` feature is
//! enabled, which needs `protoc` on the build machine.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/provider.proto");

    #[cfg(feature = "grpc")]
    tonic_prost_build::configure()
        .build_client(false)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    Ok(())
}
