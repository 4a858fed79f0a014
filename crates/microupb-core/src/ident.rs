//! C identifier transforms for generated code.

/// Convert a dotted or path-like name to a C identifier.
///
/// Dots, slashes and dashes become underscores; everything else is kept.
///
/// # Examples
/// ```
/// use microupb_core::ident::to_c_ident;
/// assert_eq!(to_c_ident("google.protobuf.Any"), "google_protobuf_Any");
/// assert_eq!(to_c_ident("a/b-c.proto"), "a_b_c_proto");
/// ```
pub fn to_c_ident(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '.' | '/' | '-') { '_' } else { c })
        .collect()
}

/// Convert a file name to a preprocessor-safe guard name (uppercased C ident).
pub fn to_preproc(s: &str) -> String {
    to_c_ident(s).to_ascii_uppercase()
}

/// Strip a trailing `.proto` extension, if present.
pub fn strip_extension(fname: &str) -> &str {
    fname.strip_suffix(".proto").unwrap_or(fname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_ident_replaces_separators() {
        assert_eq!(to_c_ident("foo.bar.Baz"), "foo_bar_Baz");
        assert_eq!(to_c_ident("dir/file-name.proto"), "dir_file_name_proto");
        assert_eq!(to_c_ident("already_fine"), "already_fine");
    }

    #[test]
    fn preproc_uppercases() {
        assert_eq!(to_preproc("google/protobuf/any.proto"), "GOOGLE_PROTOBUF_ANY_PROTO");
    }

    #[test]
    fn strips_proto_extension_only() {
        assert_eq!(strip_extension("foo/bar.proto"), "foo/bar");
        assert_eq!(strip_extension("foo/bar.txt"), "foo/bar.txt");
        assert_eq!(strip_extension("bar"), "bar");
    }
}
