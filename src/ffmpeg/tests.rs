use std::path::Path;

use crate::process::ProcessError;

use super::{faststart_args, FfMpeg, RemuxError, RemuxTool};

#[test]
fn stream_copy_with_faststart() {
    let args = faststart_args("/tmp/in", "/tmp/in.processed");

    let input_pos = args.iter().position(|a| *a == "-i").expect("input flag");
    assert_eq!(args[input_pos + 1], "/tmp/in");
    assert_eq!(args.last(), Some(&"/tmp/in.processed"));

    for pair in [
        ["-movflags", "faststart"],
        ["-map_metadata", "0"],
        ["-codec", "copy"],
        ["-f", "mp4"],
    ] {
        assert!(
            args.windows(2).any(|w| w == pair),
            "missing {pair:?} in {args:?}"
        );
    }
}

#[tokio::test]
async fn missing_ffmpeg_is_reported() {
    let ffmpeg = FfMpeg::new("vid-rs-missing-ffmpeg", 5);

    let res = ffmpeg
        .remux_faststart(Path::new("/tmp/in"), Path::new("/tmp/out"))
        .await;

    assert!(matches!(
        res,
        Err(RemuxError::Process(ProcessError::NotFound(_)))
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn non_utf8_path_is_rejected() {
    use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

    let ffmpeg = FfMpeg::new("ffmpeg", 5);
    let input = Path::new(OsStr::from_bytes(b"/tmp/\xff.mp4"));

    let res = ffmpeg.remux_faststart(input, Path::new("/tmp/out")).await;

    assert!(matches!(res, Err(RemuxError::Path)));
}
