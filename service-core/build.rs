use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    let proto_root = PathBuf::from("../proto");

    // Tell cargo to recompile if any proto files change
    println!("cargo:rerun-if-changed=../proto/storefront/identity/v1/");
    println!("cargo:rerun-if-changed=../proto/storefront/catalog/v1/");

    // Compile the client side of both internal APIs; server code is
    // built in the owning service crates.
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(
            &[
                "../proto/storefront/identity/v1/identity.proto",
                "../proto/storefront/catalog/v1/catalog.proto",
            ],
            &[&proto_root],
        )?;

    Ok(())
}
