//! Content comparison between two raw messages

use encoding_rs::Encoding;
use log::debug;
use mailparse::ParsedMail;

use super::Fingerprint;
use crate::models::Message;

/// Charset assumed when a part does not declare one
const FALLBACK_CHARSET: &str = "utf-8";

/// Decide whether `a` and `b` are the same message
///
/// - Identical raw bytes are always duplicates.
/// - Two single-part messages are duplicates when their decoded bodies are
///   equal.
/// - Two multipart messages must have the same number of parts, and the
///   SimHash fingerprints of their first parts must be less than
///   `threshold` bits apart.
/// - A single-part and a multipart message are never duplicates.
///
/// Anything that cannot be parsed or decoded counts as "not a duplicate".
pub fn is_duplicate(a: &Message, b: &Message, threshold: u32) -> bool {
    if a.raw == b.raw {
        return true;
    }

    let (Ok(parsed_a), Ok(parsed_b)) = (a.parse(), b.parse()) else {
        return false;
    };

    match (is_multipart(&parsed_a), is_multipart(&parsed_b)) {
        (false, false) => match (parsed_a.get_body_raw(), parsed_b.get_body_raw()) {
            (Ok(body_a), Ok(body_b)) => body_a == body_b,
            _ => false,
        },
        (true, true) => {
            if parsed_a.subparts.len() != parsed_b.subparts.len() {
                return false;
            }
            let (Some(text_a), Some(text_b)) =
                (first_part_text(&parsed_a), first_part_text(&parsed_b))
            else {
                return false;
            };
            let distance = Fingerprint::of(&text_a).distance(Fingerprint::of(&text_b));
            debug!(
                "Similarity distance between {} and {} is {}",
                a.id, b.id, distance
            );
            distance < threshold
        }
        _ => false,
    }
}

fn is_multipart(mail: &ParsedMail<'_>) -> bool {
    mail.ctype.mimetype.starts_with("multipart/")
}

/// Strictly decode the first subpart with its declared charset
///
/// Returns `None` for unknown charsets and for bytes that are not valid in
/// the charset.
fn first_part_text(mail: &ParsedMail<'_>) -> Option<String> {
    let part = mail.subparts.first()?;
    let label = part
        .ctype
        .params
        .get("charset")
        .map(String::as_str)
        .unwrap_or(FALLBACK_CHARSET);
    let encoding = Encoding::for_label(label.trim().as_bytes())?;
    let body = part.get_body_raw().ok()?;
    encoding
        .decode_without_bom_handling_and_without_replacement(&body)
        .map(|text| text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageId, ThreadId};

    fn message(id: &str, raw: &str) -> Message {
        Message::builder(MessageId::new(id), ThreadId::new("t"))
            .raw(raw.as_bytes())
            .build()
    }

    fn multipart(id: &str, first_text: &str, charset: &str, parts: usize) -> Message {
        let mut raw = format!(
            "Message-ID: <{}@example.com>\r\nSubject: Report\r\nMIME-Version: 1.0\r\n\
             Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\r\n\
             --XYZ\r\nContent-Type: text/plain; charset={}\r\n\r\n{}\r\n",
            id, charset, first_text
        );
        for i in 1..parts {
            raw.push_str(&format!(
                "--XYZ\r\nContent-Type: text/html\r\n\r\n<p>part {}</p>\r\n",
                i
            ));
        }
        raw.push_str("--XYZ--\r\n");
        message(id, &raw)
    }

    const BODY: &str = "Hi Sam, thanks for sending over the quarterly numbers. I had a \
        look through them this morning and everything lines up with what we discussed.";

    #[test]
    fn test_identical_raw_is_duplicate() {
        let a = multipart("a", BODY, "utf-8", 2);
        let b = Message { id: MessageId::new("b"), ..a.clone() };
        assert!(is_duplicate(&a, &b, 0));
    }

    #[test]
    fn test_single_part_compares_bodies() {
        let a = message("a", "Message-ID: <a@x>\r\nSubject: Hi\r\n\r\nSame body\r\n");
        let b = message("b", "Message-ID: <b@x>\r\nSubject: Hi\r\n\r\nSame body\r\n");
        let c = message("c", "Message-ID: <c@x>\r\nSubject: Hi\r\n\r\nOther body\r\n");
        assert!(is_duplicate(&a, &b, 3));
        assert!(!is_duplicate(&a, &c, 3));
    }

    #[test]
    fn test_single_part_compares_transfer_decoded_bodies() {
        let plain = message("a", "Subject: Hi\r\n\r\nCaf\u{e9}\r\n");
        let encoded = message(
            "b",
            "Subject: Hi\r\nContent-Transfer-Encoding: base64\r\n\r\nQ2Fmw6kNCg==\r\n",
        );
        assert!(is_duplicate(&plain, &encoded, 3));
    }

    #[test]
    fn test_multipart_similar_first_part_is_duplicate() {
        let a = multipart("a", BODY, "utf-8", 2);
        let reflowed = BODY.replace(". ", ".\r\n");
        let b = multipart("b", &reflowed, "us-ascii", 2);
        assert!(is_duplicate(&a, &b, 3));
    }

    #[test]
    fn test_multipart_different_part_counts_never_match() {
        let a = multipart("a", BODY, "utf-8", 2);
        let b = multipart("b", BODY, "utf-8", 3);
        assert!(!is_duplicate(&a, &b, 64));
    }

    #[test]
    fn test_multipart_unknown_charset_is_not_duplicate() {
        let a = multipart("a", BODY, "utf-8", 2);
        let b = multipart("b", BODY, "x-made-up-charset", 2);
        assert!(!is_duplicate(&a, &b, 64));
    }

    #[test]
    fn test_multipart_threshold_is_strict() {
        let a = multipart("a", BODY, "utf-8", 2);
        let b = multipart("b", BODY, "utf-8", 2);
        assert!(is_duplicate(&a, &b, 1));
        assert!(!is_duplicate(&a, &b, 0));
    }

    #[test]
    fn test_mixed_structure_is_not_duplicate() {
        let a = multipart("a", BODY, "utf-8", 2);
        let b = message("b", &format!("Subject: Report\r\n\r\n{}\r\n", BODY));
        assert!(!is_duplicate(&a, &b, 64));
        assert!(!is_duplicate(&b, &a, 64));
    }
}
