pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 3500;

/// Splits `text` into paragraph-aligned chunks of at most `max_length` chars.
///
/// Paragraphs are accumulated greedily and never split, so a single paragraph
/// longer than `max_length` becomes its own oversized chunk, and a blank
/// paragraph may carry a chunk past the limit by one separator. Joining the
/// result with [`PARAGRAPH_SEPARATOR`] yields `text` again.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let separator_len = PARAGRAPH_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut current: Option<(String, usize)> = None;

    for paragraph in text.split(PARAGRAPH_SEPARATOR) {
        let paragraph_len = paragraph.chars().count();
        // An empty buffer always absorbs the next paragraph so no chunk is empty.
        let fits = current.as_ref().is_some_and(|(buffer, len)| {
            buffer.is_empty() || len + separator_len + paragraph_len <= max_length
        });

        if fits {
            if let Some((buffer, len)) = current.as_mut() {
                buffer.push_str(PARAGRAPH_SEPARATOR);
                buffer.push_str(paragraph);
                *len += separator_len + paragraph_len;
            }
        } else {
            if let Some((buffer, _)) = current.take() {
                chunks.push(buffer);
            }
            current = Some((paragraph.to_string(), paragraph_len));
        }
    }

    if let Some((buffer, _)) = current {
        match chunks.last_mut() {
            // A trailing empty paragraph stays on the previous chunk.
            Some(last) if buffer.is_empty() => last.push_str(PARAGRAPH_SEPARATOR),
            _ => chunks.push(buffer),
        }
    }

    chunks
}
