pub(crate) const VIDEO_MP4: &str = "video/mp4";

pub(crate) fn video_mp4() -> mime::Mime {
    VIDEO_MP4.parse().expect("Valid media type")
}

/// File extension for a declared media type, `bin` when it isn't `type/subtype`
pub(crate) fn media_type_to_ext(media_type: &str) -> &str {
    let mut split = media_type.split('/');

    match (split.next(), split.next(), split.next()) {
        (Some(_), Some(subtype), None) if !subtype.is_empty() => subtype,
        _ => "bin",
    }
}

pub(crate) fn ext_to_content_type(ext: &str) -> mime::Mime {
    match ext {
        "mp4" => video_mp4(),
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "webp" => "image/webp".parse().expect("Valid media type"),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::{ext_to_content_type, media_type_to_ext};

    #[test]
    fn extension_from_media_type() {
        assert_eq!(media_type_to_ext("video/mp4"), "mp4");
        assert_eq!(media_type_to_ext("image/png"), "png");
        assert_eq!(media_type_to_ext("mp4"), "bin");
        assert_eq!(media_type_to_ext("video/mp4/extra"), "bin");
        assert_eq!(media_type_to_ext("video/"), "bin");
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(ext_to_content_type("mp4").essence_str(), "video/mp4");
        assert_eq!(ext_to_content_type("jpeg"), mime::IMAGE_JPEG);
        assert_eq!(ext_to_content_type("exe"), mime::APPLICATION_OCTET_STREAM);
    }
}
