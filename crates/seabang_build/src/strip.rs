//! Removal of the `#!` launcher line.
//!
//! The compiler never sees the launcher line: the source is copied with its
//! first line dropped and every other byte preserved, line endings and a
//! missing final newline included.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::artifact::ArtifactPaths;
use crate::error::BuildError;

/// The two bytes a launcher line starts with.
pub const DIRECTIVE_MARKER: &[u8] = b"#!";

/// Writes the stripped copy of the source described by `paths`.
///
/// The copy is written to a `.partial` file and renamed over the stripped
/// path only once complete, so an interrupted launch never leaves a
/// truncated copy behind. If the source does not start with `#!`, nothing
/// is written and [`BuildError::MalformedSource`] is returned.
///
/// Returns the number of lines copied.
pub fn write_stripped_copy(paths: &ArtifactPaths) -> Result<usize, BuildError> {
    let source = paths.source();
    let file = File::open(source).map_err(|e| BuildError::SourceNotFound {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);

    let mut first = Vec::new();
    reader
        .read_until(b'\n', &mut first)
        .map_err(|e| BuildError::io(source, e))?;
    if !first.starts_with(DIRECTIVE_MARKER) {
        return Err(BuildError::MalformedSource {
            path: source.to_path_buf(),
        });
    }

    let partial = paths.partial_stripped();
    let lines = copy_remaining(&mut reader, source, &partial).inspect_err(|_| {
        let _ = std::fs::remove_file(&partial);
    })?;
    std::fs::rename(&partial, paths.stripped()).map_err(|e| {
        let _ = std::fs::remove_file(&partial);
        BuildError::io(paths.stripped(), e)
    })?;

    debug!(
        stripped = %paths.stripped().display(),
        lines,
        "wrote stripped copy"
    );
    Ok(lines)
}

fn copy_remaining(
    reader: &mut impl BufRead,
    source: &Path,
    dest: &Path,
) -> Result<usize, BuildError> {
    let out = File::create(dest).map_err(|e| BuildError::io(dest, e))?;
    let mut writer = BufWriter::new(out);
    let mut lines = 0;
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| BuildError::io(source, e))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&line)
            .map_err(|e| BuildError::io(dest, e))?;
        lines += 1;
    }
    writer
        .into_inner()
        .map_err(|e| BuildError::io(dest, e.into_error()))?
        .sync_all()
        .map_err(|e| BuildError::io(dest, e))?;
    Ok(lines)
}
