use crate::models::{RawFormat, VideoFormat};

/// Maximum number of formats offered to the user.
pub const MAX_FORMATS: usize = 5;

/// Turns yt-dlp's raw format list into a short menu: video-bearing mp4 only,
/// best quality first, at most [`MAX_FORMATS`] entries, never empty.
pub fn select_formats(raw: &[RawFormat]) -> Vec<VideoFormat> {
    let mut formats: Vec<VideoFormat> = raw
        .iter()
        .filter(|f| is_eligible(f))
        .map(|f| VideoFormat {
            format_id: f.format_id.clone().unwrap_or_default(),
            quality: quality_label(f),
            ext: "mp4".to_string(),
            filesize: f.filesize.or(f.filesize_approx),
        })
        .collect();

    // sort_by_key is stable, so equal qualities keep source order
    formats.sort_by_key(|f| std::cmp::Reverse(quality_rank(&f.quality)));
    formats.truncate(MAX_FORMATS);

    if formats.is_empty() {
        formats.push(VideoFormat::best());
    }
    formats
}

fn is_eligible(format: &RawFormat) -> bool {
    let has_video = matches!(format.vcodec.as_deref(), Some(codec) if !codec.is_empty() && codec != "none");
    has_video && format.ext.as_deref() == Some("mp4")
}

fn quality_label(format: &RawFormat) -> String {
    match (format.height, format.format_note.as_deref()) {
        (Some(height), _) => format!("{}p", height),
        (None, Some(note)) if !note.is_empty() => note.to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Leading integer of a label ("1080p" -> 1080). Labels without one rank 0.
fn quality_rank(label: &str) -> u32 {
    let digits: String = label
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}
