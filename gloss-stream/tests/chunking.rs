//! Property tests: frame decoding is independent of how the underlying
//! transport chunks the byte stream.

use gloss_stream::FrameAssembler;
use gloss_types::SseEvent;
use proptest::prelude::*;

/// Decode a document delivered as the given byte slices.
fn decode(chunks: &[&[u8]]) -> Vec<SseEvent> {
    let mut assembler = FrameAssembler::new();
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(assembler.push(chunk).expect("push"));
    }
    events.extend(assembler.finish().expect("finish"));
    events
}

/// Decode a document split at the given byte positions.
fn decode_split(doc: &[u8], cuts: &[usize]) -> Vec<SseEvent> {
    let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (doc.len() + 1)).collect();
    cuts.sort_unstable();
    let mut chunks: Vec<&[u8]> = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(&doc[start..cut]);
        start = cut;
    }
    chunks.push(&doc[start..]);
    decode(&chunks)
}

/// A document exercising CRLF pairs, multi-byte UTF-8, multi-line data,
/// custom event names, keep-alives, and an unterminated trailing frame.
const DOC: &str = "event: delta\r\ndata: hëllo\r\ndata: wörld\r\n\r\n\
: keep-alive\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"早上好\"}}]}\n\n\
data: [DONE]\n\ndata: trailing";

proptest! {
    #[test]
    fn fixed_document_survives_any_cuts(cuts in proptest::collection::vec(0usize..1024, 0..8)) {
        let whole = decode(&[DOC.as_bytes()]);
        let split = decode_split(DOC.as_bytes(), &cuts);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn arbitrary_text_survives_any_cuts(
        doc in "(?s).{0,200}",
        cuts in proptest::collection::vec(0usize..1024, 0..6),
    ) {
        let whole = decode(&[doc.as_bytes()]);
        let split = decode_split(doc.as_bytes(), &cuts);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn byte_at_a_time_matches_one_shot(doc in "[a-z:\r\n ]{0,120}") {
        let whole = decode(&[doc.as_bytes()]);
        let bytes: Vec<&[u8]> = doc.as_bytes().chunks(1).collect();
        let trickled = decode(&bytes);
        prop_assert_eq!(whole, trickled);
    }
}
