use anyhow::Result;
use vergen_gix::{BuildBuilder, Emitter, GixBuilder};

// Emits VERGEN_BUILD_DATE and VERGEN_GIT_SHA for `jarvis_setup::core::version`.
fn main() -> Result<()> {
    let build = BuildBuilder::default().build_date(true).build()?;
    let gix = GixBuilder::default().sha(true).build()?;

    Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&gix)?
        .emit()?;
    Ok(())
}
