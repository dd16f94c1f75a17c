use std::error::Error;

use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn Error>> {
    // Exposes VERGEN_GIT_SHA for `--version`.
    EmitBuilder::builder().git_sha(true).emit()?;
    Ok(())
}
