fn main() {
    // Use the vendored protoc binary so no system installation is required.
    let protoc = protoc_bin_vendored::protoc_bin_path().expect("vendored protoc not found");
    std::env::set_var("PROTOC", protoc);

    println!("cargo:rerun-if-changed=proto/groupcache.proto");
    tonic_build::compile_protos("proto/groupcache.proto")
        .expect("failed to compile proto/groupcache.proto");
}
