//! Textual `#include` extraction.
//!
//! The scanner does not run the preprocessor: it reports every line that
//! looks like an include directive, including ones inside `#if 0` blocks or
//! behind macros that would never be defined. Extra edges only cost an
//! occasional unnecessary rebuild; a missed edge would cost a stale binary.

use std::path::Path;

/// How the include target was delimited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeForm {
    /// `#include "file.h"`: looked up next to the including file first.
    Quoted,
    /// `#include <file.h>`: looked up only in the search directories.
    Angled,
}

/// One include directive found in a file, not yet resolved to a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IncludeEdge<'a> {
    /// The file containing the directive.
    pub source: &'a Path,
    /// The target exactly as written between the delimiters.
    pub target: &'a str,
    /// Quoted or angle-bracket form.
    pub form: IncludeForm,
    /// 1-based line number of the directive.
    pub line: usize,
}

/// Lazily yields the include edges of one file's text, in line order.
pub struct Includes<'a> {
    source: &'a Path,
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Iterator for Includes<'a> {
    type Item = IncludeEdge<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, line) in self.lines.by_ref() {
            if let Some((target, form)) = parse_include_line(line) {
                return Some(IncludeEdge {
                    source: self.source,
                    target,
                    form,
                    line: idx + 1,
                });
            }
        }
        None
    }
}

/// Scans `text`, the contents of `source`, for include directives.
pub fn scan_includes<'a>(source: &'a Path, text: &'a str) -> Includes<'a> {
    Includes {
        source,
        lines: text.lines().enumerate(),
    }
}

/// Parses a single line as an include directive.
///
/// Accepts leading whitespace, whitespace between `#` and `include`, and
/// anything after the closing delimiter. `#include_next`, `#import` and
/// macro-valued includes are not recognized.
pub fn parse_include_line(line: &str) -> Option<(&str, IncludeForm)> {
    let rest = line.trim_start().strip_prefix('#')?;
    let rest = rest.trim_start().strip_prefix("include")?;
    let rest = rest.trim_start();

    let (form, close) = match rest.chars().next()? {
        '"' => (IncludeForm::Quoted, '"'),
        '<' => (IncludeForm::Angled, '>'),
        _ => return None,
    };
    let body = &rest[1..];
    let end = body.find(close)?;
    let target = &body[..end];
    if target.is_empty() {
        return None;
    }
    Some((target, form))
}
