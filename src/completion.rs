use std::io::{self, Write};

/// Render the completion script for `bin_name` into `out`.
pub fn write_completions(
    shell: clap_complete::Shell,
    cmd: &mut clap::Command,
    bin_name: &str,
    out: &mut impl Write,
) -> io::Result<()> {
    let mut buf = Vec::<u8>::new();
    clap_complete::generate(shell, cmd, bin_name, &mut buf);
    out.write_all(&buf)
}

/// Like [`write_completions`] on stdout. A closed pipe (`| head`) is not an error.
pub fn generate_to_stdout(
    shell: clap_complete::Shell,
    cmd: &mut clap::Command,
    bin_name: &str,
) -> anyhow::Result<()> {
    match write_completions(shell, cmd, bin_name, &mut io::stdout()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(e.into()),
    }
}
