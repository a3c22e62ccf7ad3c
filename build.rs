use anyhow::Result;
use vergen::EmitBuilder;

// VERGEN_GIT_SHA ends up in `--version` and the GUI About window
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    EmitBuilder::builder().git_sha(true).emit()?;
    Ok(())
}
