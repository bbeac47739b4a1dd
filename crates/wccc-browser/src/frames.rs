//! Frame lookup by index, name or URL

use crate::page::FrameInfo;

/// Resolve a frame reference against the frames of a page.
///
/// An integer within range selects by position. Anything else is matched as
/// a case-insensitive substring, scanning frames in document order and
/// checking each frame's name before its URL. The first frame that matches
/// either way wins.
pub fn resolve<'a>(frame_ref: &str, frames: &'a [FrameInfo]) -> Option<&'a FrameInfo> {
    let frame_ref = frame_ref.trim();
    if frame_ref.is_empty() {
        return None;
    }

    if let Ok(index) = frame_ref.parse::<usize>() {
        if let Some(frame) = frames.get(index) {
            return Some(frame);
        }
    }

    let needle = frame_ref.to_lowercase();
    frames.iter().find(|f| {
        (!f.name.is_empty() && f.name.to_lowercase().contains(&needle))
            || f.url.to_lowercase().contains(&needle)
    })
}

/// One line per frame, for tool output and not-found hints.
pub fn describe(frames: &[FrameInfo]) -> String {
    if frames.is_empty() {
        return "No frames found".to_string();
    }
    frames
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Error message for an unresolved frame reference.
pub fn not_found_message(frame_ref: &str, frames: &[FrameInfo]) -> String {
    format!(
        "no frame matches '{}'. Available frames:\n{}",
        frame_ref,
        describe(frames)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<FrameInfo> {
        vec![
            FrameInfo::new(0, "F0", "a", "https://host/u1"),
            FrameInfo::new(1, "F1", "b", "https://host/u2"),
        ]
    }

    #[test]
    fn test_resolve_by_index() {
        let frames = sample();
        assert_eq!(resolve("1", &frames).map(|f| f.name.as_str()), Some("b"));
        assert_eq!(resolve("0", &frames).map(|f| f.name.as_str()), Some("a"));
    }

    #[test]
    fn test_resolve_by_url_substring() {
        let frames = sample();
        assert_eq!(resolve("u1", &frames).map(|f| f.name.as_str()), Some("a"));
        assert_eq!(resolve("U2", &frames).map(|f| f.name.as_str()), Some("b"));
    }

    #[test]
    fn test_resolve_not_found() {
        let frames = sample();
        assert!(resolve("zzz", &frames).is_none());
        assert!(resolve("", &frames).is_none());
        assert!(resolve("  ", &frames).is_none());
        assert!(resolve("anything", &[]).is_none());
    }

    #[test]
    fn test_earlier_url_match_beats_later_name_match() {
        let frames = vec![
            FrameInfo::new(0, "F0", "", "https://host/checkout"),
            FrameInfo::new(1, "F1", "checkout-frame", "https://pay.example/embed"),
        ];
        assert_eq!(resolve("checkout", &frames).map(|f| f.index), Some(0));
    }

    #[test]
    fn test_first_frame_matching_name_or_url_wins() {
        let frames = vec![
            FrameInfo::new(0, "F0", "", "https://host/"),
            FrameInfo::new(1, "F1", "pay", "https://pay.example/embed"),
            FrameInfo::new(2, "F2", "embed", "https://other.example/"),
        ];
        assert_eq!(resolve("pay", &frames).map(|f| f.index), Some(1));
        assert_eq!(resolve("embed", &frames).map(|f| f.index), Some(1));
    }

    #[test]
    fn test_out_of_range_index_falls_back_to_substring() {
        let frames = vec![
            FrameInfo::new(0, "F0", "", "https://host/"),
            FrameInfo::new(1, "F1", "ad", "https://ads.example/slot/7"),
        ];
        assert_eq!(resolve("7", &frames).map(|f| f.index), Some(1));
        assert!(resolve("9", &frames).is_none());
    }

    #[test]
    fn test_describe() {
        let frames = sample();
        let text = describe(&frames);
        assert!(text.contains("[0] name=a url=https://host/u1 (main)"));
        assert!(text.contains("[1] name=b url=https://host/u2"));
        assert_eq!(describe(&[]), "No frames found");
        assert!(not_found_message("zzz", &frames).contains("'zzz'"));
    }
}
