/// Decode plain-text uploads as UTF-8, falling back to ISO-8859-1.
///
/// The fallback maps every byte to the code point with the same value, so it never fails.
pub(super) fn decode(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(error) => {
            tracing::debug!(
                valid_up_to = error.valid_up_to(),
                "Upload is not valid UTF-8; decoding as Latin-1"
            );
            latin1(data)
        }
    }
}

pub(super) fn latin1(data: &[u8]) -> String {
    data.iter().map(|&byte| char::from(byte)).collect()
}
