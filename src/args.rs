//! Application flags and the single-dash argument surface.
//!
//! `-show` and `-max_frames` belong to the application and are stripped
//! before anything else looks at the arguments. Everything left over is
//! forwarded untouched to the capture and tracker configuration.

/// Options owned by the application itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppOptions {
    pub show: bool,
    /// Values <= 0 mean unlimited
    pub max_frames: Option<i64>,
}

impl AppOptions {
    /// Remove the application flags from `arguments`, keeping the order of
    /// everything else. The last occurrence of a flag wins. A trailing
    /// `-max_frames` without a value is left in place.
    pub fn consume(arguments: &mut Vec<String>) -> Self {
        let mut opts = AppOptions::default();
        let mut keep = vec![true; arguments.len()];

        let mut i = 0;
        while i < arguments.len() {
            if arguments[i] == "-show" {
                opts.show = true;
                keep[i] = false;
            } else if arguments[i] == "-max_frames" && i + 1 < arguments.len() {
                opts.max_frames = Some(parse_leading_int(&arguments[i + 1]));
                keep[i] = false;
                keep[i + 1] = false;
                i += 1;
            }
            i += 1;
        }

        let mut flags = keep.into_iter();
        arguments.retain(|_| flags.next().unwrap_or(true));
        opts
    }

    /// Frame budget, if one is in force
    pub fn frame_limit(&self) -> Option<u64> {
        match self.max_frames {
            Some(n) if n > 0 => Some(n as u64),
            _ => None,
        }
    }
}

/// Lenient integer read: leading whitespace, optional sign, then as many
/// digits as are there. No digits gives 0, which disables the budget.
fn parse_leading_int(token: &str) -> i64 {
    let s = token.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for c in digits.chars() {
        let Some(d) = c.to_digit(10) else { break };
        value = value.saturating_mul(10).saturating_add(d as i64);
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Pick the given single-dash flags (each followed by one value) out of
/// `tokens` and rewrite them as long options, ready for a clap parser.
/// Anything else is skipped, so foreign flags never reach clap.
pub fn extract_flags(tokens: &[String], names: &[&str]) -> Vec<String> {
    let mut out = vec![env!("CARGO_PKG_NAME").to_string()];
    let mut i = 0;
    while i < tokens.len() {
        let name = tokens[i].strip_prefix('-').filter(|n| !n.starts_with('-'));
        match name {
            Some(n) if names.contains(&n) && i + 1 < tokens.len() => {
                out.push(format!("--{}={}", n, tokens[i + 1]));
                i += 2;
            }
            _ => i += 1,
        }
    }
    out
}

pub fn usage(exe: &str) -> String {
    format!(
        "Usage:\n  \
         {exe} [input args] [-mloc <model dir>] [-show] [-max_frames N]\n\n\
         Input args (each opens one sequence, in order):\n  \
         -device 0                Webcam index\n  \
         -f <path>                Video or image file\n  \
         -fdir <image_dir>        Image sequence directory\n  \
         -fx/-fy/-cx/-cy <float>  Camera intrinsics (optional)\n  \
         -fps <float>             Frame rate of image sequences (optional)\n\n\
         Required for gaze:\n  \
         -mloc models             Directory with face_detection.onnx, face_mesh.onnx\n                           \
         and iris_landmark.onnx (the iris model enables gaze)\n\n\
         App-only args:\n  \
         -show              Show a preview window (press 'q' to quit, 'r' to reset)\n  \
         -max_frames N      Stop after N frames (useful for webcam)\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_consume_strips_app_flags_and_keeps_order() {
        let mut args = argv(&["exe", "-f", "a.mp4", "-show", "-max_frames", "10", "-mloc", "m"]);
        let opts = AppOptions::consume(&mut args);
        assert!(opts.show);
        assert_eq!(opts.max_frames, Some(10));
        assert_eq!(args, argv(&["exe", "-f", "a.mp4", "-mloc", "m"]));
    }

    #[test]
    fn test_last_max_frames_wins() {
        let mut args = argv(&["exe", "-max_frames", "3", "-max_frames", "7"]);
        let opts = AppOptions::consume(&mut args);
        assert_eq!(opts.max_frames, Some(7));
        assert_eq!(args, argv(&["exe"]));
    }

    #[test]
    fn test_trailing_max_frames_is_left_alone() {
        let mut args = argv(&["exe", "-device", "0", "-max_frames"]);
        let opts = AppOptions::consume(&mut args);
        assert_eq!(opts.max_frames, None);
        assert_eq!(args, argv(&["exe", "-device", "0", "-max_frames"]));
    }

    #[test]
    fn test_malformed_max_frames_disables_budget() {
        let mut args = argv(&["exe", "-max_frames", "abc"]);
        let opts = AppOptions::consume(&mut args);
        assert_eq!(opts.max_frames, Some(0));
        assert_eq!(opts.frame_limit(), None);
        assert!(args.len() == 1);
    }

    #[test]
    fn test_partial_number_is_applied() {
        assert_eq!(parse_leading_int("12abc"), 12);
        assert_eq!(parse_leading_int(" -4"), -4);
        assert_eq!(parse_leading_int("+9"), 9);
        assert_eq!(parse_leading_int(""), 0);
    }

    #[test]
    fn test_frame_limit_requires_positive() {
        let opts = AppOptions { show: false, max_frames: Some(-1) };
        assert_eq!(opts.frame_limit(), None);
        let opts = AppOptions { show: false, max_frames: Some(5) };
        assert_eq!(opts.frame_limit(), Some(5));
    }

    #[test]
    fn test_extract_flags_rewrites_known_names() {
        let tokens = argv(&["-f", "x.mp4", "-fx", "600", "-verbose", "-fy", "610", "-fx"]);
        let out = extract_flags(&tokens, &["fx", "fy"]);
        assert_eq!(&out[1..], &["--fx=600".to_string(), "--fy=610".to_string()]);
    }
}
