//! Extraction of delimited message bodies from a raw upload buffer.

/// Collect the bodies between `<` and `>` pairs, left to right.
///
/// A `<` always opens a fresh message, discarding any unclosed one; a
/// `>` with no open message is ignored, as is every byte seen outside
/// a message. Devices pad uploads with retransmit markers and stray
/// line noise, so this never fails; broken framing just yields fewer
/// messages. Bodies are decoded lossily, replacing invalid UTF-8.
pub fn extract_messages(buf: &[u8]) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current: Option<Vec<u8>> = None;

    for &b in buf {
        match b {
            b'>' => {
                if let Some(body) = current.take() {
                    messages.push(String::from_utf8_lossy(&body).into_owned());
                }
            }
            b'<' => {
                current = Some(Vec::new());
            }
            _ => {
                if let Some(body) = current.as_mut() {
                    body.push(b);
                }
            }
        }
    }

    messages
}
