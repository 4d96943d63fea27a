// Build script to compile Protocol Buffer definitions

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tell Cargo to rerun if proto files change
    println!("cargo:rerun-if-changed=../../proto/basic.proto");

    #[cfg(feature = "regenerate")]
    tonic_build::configure()
        .out_dir("src/generated")
        .compile_protos(&["../../proto/basic.proto"], &["../../proto/"])?;

    Ok(())
}
