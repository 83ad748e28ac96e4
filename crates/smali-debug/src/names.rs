//! Conversions between the two spellings of a class name.
//!
//! The VM reports binary names (`com.example.Foo`, `com.example.Foo$Bar`)
//! while smali files spell them as descriptors (`Lcom/example/Foo;`). Every
//! name-keyed lookup in this crate goes through [`binary_name`] first so both
//! spellings hit the same key.

/// Returns the dotted binary name for a class name in descriptor, internal
/// (`com/example/Foo`) or binary form.
///
/// Array descriptors and malformed names yield `None`.
pub fn binary_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.starts_with('[') {
        return None;
    }

    let inner = match name.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        Some(inner) => inner,
        None if name.contains(';') => return None,
        None => name,
    };
    if inner.is_empty() || inner.contains(';') || inner.contains('[') {
        return None;
    }

    let out = inner.replace('/', ".");
    if out.starts_with('.') || out.ends_with('.') || out.contains("..") {
        return None;
    }
    Some(out)
}

/// Returns the `L...;` descriptor for a class name in any accepted form.
pub fn descriptor(name: &str) -> Option<String> {
    binary_name(name).map(|binary| format!("L{};", binary.replace('.', "/")))
}
