use std::env::var;
use std::io::{Error, Result};

fn main() -> Result<()> {
    let proto_files = &[
        "proto/echo.proto",
        "proto/echo_v2.proto",
        "proto/everything.proto",
    ];

    let proto_folder = "proto";
    let out_dir = var("OUT_DIR").map_err(Error::other)?;
    let descriptors_path = format!("{out_dir}/descriptors.bin");

    tonic_prost_build::configure()
        .file_descriptor_set_path(descriptors_path)
        .build_client(false)
        .compile_protos(proto_files, &[proto_folder])?;

    Ok(())
}
