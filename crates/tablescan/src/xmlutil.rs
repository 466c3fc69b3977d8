use quick_xml::events::BytesStart;

/// Fetch an attribute by local name (namespace prefixes don't matter),
/// unescaped. Returns `None` when absent or unreadable.
pub(crate) fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name {
            return attr.unescape_value().ok().map(|value| value.into_owned());
        }
    }
    None
}
