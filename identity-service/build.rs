use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    let proto_root = PathBuf::from("../proto");

    println!("cargo:rerun-if-changed=../proto/storefront/identity/v1/");

    // Server side only; the client lives in service-core.
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_protos(
            &["../proto/storefront/identity/v1/identity.proto"],
            &[&proto_root],
        )?;

    Ok(())
}
